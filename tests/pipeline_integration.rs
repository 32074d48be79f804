//! End-to-end pipeline tests driving the full front end over small NBCPL
//! source snippets and asserting on the shape of the exported artifact
//! spec.md §6 describes: symbol table, class table, function metrics, and
//! per-function CFG/liveness sets.

use std::io::Write;

use nbcplc::config::PipelineConfig;
use nbcplc::pipeline;
use nbcplc::symbols::GLOBAL_SCOPE;

#[test]
fn simple_function_produces_a_complete_artifact() {
    let source = r#"
        LET add(a, b) = VALOF $( RESULTIS a + b $)
    "#;
    let outcome = pipeline::run(source, &PipelineConfig::new()).unwrap();

    assert!(!outcome.is_fatal());
    assert!(outcome.symbols.resolve("add", "a").is_some());
    assert!(outcome.symbols.resolve("add", "b").is_some());

    let cfg = outcome.cfgs.get("add").expect("CFG for 'add'");
    assert!(!cfg.is_empty());

    let liveness = outcome.liveness.get("add").expect("liveness for 'add'");
    let sets = liveness
        .get(cfg.entry_block_id)
        .expect("liveness sets for entry block");
    assert!(sets.use_.contains("a"));
    assert!(sets.use_.contains("b"));
}

#[test]
fn globals_block_flattens_into_global_scope() {
    let source = r#"
        GLOBALS { counter: 1; total: 2 }
        LET start() = VALOF $( RESULTIS counter $)
    "#;
    let outcome = pipeline::run(source, &PipelineConfig::new()).unwrap();
    assert!(!outcome.is_fatal());
    assert!(outcome.symbols.resolve(GLOBAL_SCOPE, "counter").is_some());
    assert!(outcome.symbols.resolve(GLOBAL_SCOPE, "total").is_some());
}

#[test]
fn class_cycle_is_reported_once_per_cycle() {
    let source = "CLASS A EXTENDS B { LET x = 0 } CLASS B EXTENDS A { LET y = 0 }";
    let outcome = pipeline::run(source, &PipelineConfig::new()).unwrap();
    assert!(outcome.is_fatal());
    let cycle_diagnostics = outcome
        .diagnostics
        .iter()
        .filter(|d| d.message.contains("circular inheritance"))
        .count();
    assert_eq!(cycle_diagnostics, 1);
}

#[test]
fn valof_without_resultis_on_every_path_is_a_semantic_error() {
    let source =
        "LET broken() = VALOF $( TEST 1 = 1 THEN $( RESULTIS 0 $) ELSE $( RETURN $) $)";
    let outcome = pipeline::run(source, &PipelineConfig::new()).unwrap();
    assert!(outcome.is_fatal());
}

#[test]
fn runtime_manifest_loaded_from_disk_resolves_a_call_to_it() {
    let mut manifest_file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        manifest_file,
        r#"
        [[function]]
        veneer_name = "rt_write"
        linker_symbol = "nbcpl_rt_write"
        function_pointer = "0x0"
        arg_count = 1
        function_type = "STANDARD"
        return_type = "INTEGER"
        description = "writes an integer to stdout"
        category = "io"
        "#
    )
    .unwrap();

    let source = "LET start() = VALOF $( RESULTIS rt_write(7) $)";
    let config =
        PipelineConfig::new().with_runtime_manifest(manifest_file.path().to_path_buf());
    let outcome = pipeline::run(source, &config).unwrap();

    assert!(!outcome.is_fatal());
    assert!(outcome.symbols.resolve_global("rt_write").is_some());
}

#[test]
fn destructuring_a_non_destructurable_rhs_is_rejected() {
    let source = r#"
        LET start() = VALOF $(
            LET p = 0
            LET a, b = p
            RESULTIS a
        $)
    "#;
    let outcome = pipeline::run(source, &PipelineConfig::new()).unwrap();
    assert!(outcome.is_fatal());
}
