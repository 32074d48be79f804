//! NBCPL compiler front end CLI.
//!
//! Runs the front end (lex, parse, symbol/class resolution, analysis, CFG,
//! liveness) over a source file and reports diagnostics. Code generation
//! is out of scope (spec.md §1) — this binary never produces an
//! executable, only the exported artifact described in spec.md §6.

use std::path::PathBuf;
use std::process;

use clap::Parser as ClapParser;

use nbcplc::config::PipelineConfig;
use nbcplc::pipeline;

#[derive(ClapParser)]
#[command(name = "nbcplc")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "NBCPL front end - lex, parse, and analyse a source file", long_about = None)]
struct Cli {
    /// Input source file
    input: PathBuf,

    /// Runtime manifest file(s) to load into the global scope before
    /// analysis (spec.md §6)
    #[arg(long = "runtime-manifest", value_name = "PATH")]
    runtime_manifests: Vec<PathBuf>,

    /// Emit trace-level logging for each pass
    #[arg(long)]
    trace: bool,

    /// Ceiling on liveness fixpoint iterations (0 uses the built-in default)
    #[arg(long, default_value_t = 0)]
    max_liveness_iterations: usize,
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let source = match std::fs::read_to_string(&cli.input) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error reading {}: {}", cli.input.display(), e);
            process::exit(1);
        }
    };

    let mut config = PipelineConfig::new().with_trace(cli.trace);
    for manifest in cli.runtime_manifests {
        config = config.with_runtime_manifest(manifest);
    }
    config.max_liveness_iterations = cli.max_liveness_iterations;

    match pipeline::run(&source, &config) {
        Ok(outcome) => {
            for diagnostic in outcome.diagnostics.iter() {
                eprintln!("{diagnostic}");
            }
            if outcome.is_fatal() {
                process::exit(1);
            }
            println!(
                "OK: {} function(s)/routine(s) analysed, {} diagnostic(s)",
                outcome.cfgs.len(),
                outcome.diagnostics.len()
            );
        }
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}
