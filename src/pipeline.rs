//! End-to-end pipeline orchestration, mirroring the teacher's
//! `compile_file_with_config`: one function that drives every stage in
//! order and hands back a single outcome value, so `main.rs` (and tests)
//! never have to know the stage order themselves.
//!
//! spec.md §6's exported artifact: `{AST (immutable), SymbolTable (final),
//! ClassTable (final), function_metrics, per-function CFG with
//! {use,def,in,out}}`.

use std::collections::HashMap;

use crate::analysis::{AstAnalysis, TypeTable};
use crate::ast::Program;
use crate::cfg::{CfgConstruction, ControlFlowGraph};
use crate::classes::{ClassPass, ClassTable};
use crate::config::PipelineConfig;
use crate::diagnostics::DiagnosticBag;
use crate::liveness::{LivenessAnalysis, LivenessResult};
use crate::parser::Parser;
use crate::runtime_interface::{import_runtime_manifest, RuntimeManifest};
use crate::signature::{FunctionMetricsTable, SignatureAnalysis};
use crate::symbols::{SymbolDiscovery, SymbolTable};

/// Per-function liveness, keyed the same way as the CFG map (function or
/// routine name, or `"Class::method"`).
pub struct PipelineOutcome {
    pub program: Program,
    pub symbols: SymbolTable,
    pub classes: ClassTable,
    pub function_metrics: FunctionMetricsTable,
    pub types: TypeTable,
    pub cfgs: HashMap<String, ControlFlowGraph>,
    pub liveness: HashMap<String, LivenessResult>,
    pub diagnostics: DiagnosticBag,
}

impl PipelineOutcome {
    /// `fatal_error_`: true if any accumulated diagnostic is not a warning.
    pub fn is_fatal(&self) -> bool {
        self.diagnostics.is_fatal()
    }
}

/// Runs every stage (lex, parse, Pass A-D, CFG, liveness) over one
/// translation unit, loading `config.runtime_manifest_paths` into the
/// global scope before any pass consults the symbol table.
///
/// Diagnostics from every stage accumulate into one bag rather than
/// aborting at the first failing stage, matching spec.md §6's
/// recoverable-diagnostic model; later stages still run against whatever
/// partial state earlier stages produced, since each stage is built to
/// degrade to `Unknown`/empty rather than panic.
pub fn run(source: &str, config: &PipelineConfig) -> Result<PipelineOutcome, String> {
    if config.trace {
        tracing::trace!("pipeline: starting parse");
    }

    let (program, mut diagnostics) = Parser::with_trace(source, config.trace).parse();

    let (mut symbols, pass_a_diagnostics) = SymbolDiscovery::run(&program);
    diagnostics.extend(pass_a_diagnostics);

    for path in &config.runtime_manifest_paths {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read runtime manifest {}: {e}", path.display()))?;
        let manifest = RuntimeManifest::parse(&content)?;
        import_runtime_manifest(&mut symbols, &manifest)?;
    }

    let (classes, pass_b_diagnostics) = ClassPass::run(&program);
    diagnostics.extend(pass_b_diagnostics);

    let mut function_metrics = SignatureAnalysis::run(&program, &symbols);

    let (types, pass_d_diagnostics) =
        AstAnalysis::run(&program, &symbols, &mut function_metrics, &classes);
    diagnostics.extend(pass_d_diagnostics);

    let (cfgs, cfg_diagnostics) = CfgConstruction::run(&program);
    diagnostics.extend(cfg_diagnostics);

    if config.trace {
        tracing::trace!(functions = cfgs.len(), "pipeline: CFGs built");
    }

    let max_iterations = config.max_liveness_iterations();
    let liveness: HashMap<String, LivenessResult> = cfgs
        .iter()
        .map(|(name, cfg)| (name.clone(), LivenessAnalysis::run(cfg, max_iterations)))
        .collect();

    Ok(PipelineOutcome {
        program,
        symbols,
        classes,
        function_metrics,
        types,
        cfgs,
        liveness,
        diagnostics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_a_trivial_function_with_no_diagnostics() {
        let source = "LET start() = VALOF $( RESULTIS 0 $)";
        let config = PipelineConfig::new();
        let outcome = run(source, &config).unwrap();
        assert!(!outcome.is_fatal());
        assert!(outcome.cfgs.contains_key("start"));
        assert!(outcome.liveness.contains_key("start"));
    }

    #[test]
    fn undefined_function_call_is_a_fatal_diagnostic() {
        let source = "LET start() = VALOF $( RESULTIS unknown_fn() $)";
        let config = PipelineConfig::new();
        let outcome = run(source, &config).unwrap();
        assert!(outcome.is_fatal());
    }

    #[test]
    fn missing_runtime_manifest_path_is_an_error_not_a_panic() {
        let source = "LET start() = VALOF $( RESULTIS 0 $)";
        let config = PipelineConfig::new()
            .with_runtime_manifest(std::path::PathBuf::from("/nonexistent/manifest.toml"));
        assert!(run(source, &config).is_err());
    }

    #[test]
    fn runtime_manifest_loaded_from_a_real_file_resolves_calls() {
        use std::io::Write;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            [[function]]
            veneer_name = "rt_print"
            linker_symbol = "nbcpl_rt_print"
            function_pointer = "0x0"
            arg_count = 1
            function_type = "STANDARD"
            return_type = "INTEGER"
            "#
        )
        .unwrap();

        let source = "LET start() = VALOF $( RESULTIS rt_print(1) $)";
        let config = PipelineConfig::new().with_runtime_manifest(file.path().to_path_buf());
        let outcome = run(source, &config).unwrap();
        assert!(!outcome.is_fatal());
    }
}
