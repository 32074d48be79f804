//! NBCPL front end: lexing, parsing, symbol/class resolution, signature
//! and AST type analysis, CFG construction, and liveness analysis.
//!
//! Code generation, the JIT, the runtime heap manager, and the runtime
//! function library are out of scope (spec.md §1) — this crate exports the
//! artifact spec.md §6 describes and stops there.

pub mod analysis;
pub mod ast;
pub mod cfg;
pub mod classes;
pub mod config;
pub mod diagnostics;
pub mod lexer;
pub mod liveness;
pub mod parser;
pub mod pipeline;
pub mod runtime_interface;
pub mod signature;
pub mod symbols;
pub mod token;
pub mod types;

pub use ast::Program;
pub use cfg::ControlFlowGraph;
pub use classes::ClassTable;
pub use config::PipelineConfig;
pub use diagnostics::{Diagnostic, DiagnosticBag, DiagnosticKind};
pub use liveness::LivenessResult;
pub use parser::Parser;
pub use pipeline::PipelineOutcome;
pub use runtime_interface::RuntimeManifest;
pub use signature::FunctionMetricsTable;
pub use symbols::SymbolTable;
