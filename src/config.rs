//! Pipeline configuration (SPEC_FULL.md — "Ambient Configuration"),
//! mirroring the teacher's `CompilerConfig` builder pattern: a plain struct
//! constructed once and threaded immutably through every pass, rather than
//! a process-wide flag any stage can reach around.

use std::path::PathBuf;

#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    /// Emit `tracing::trace!` events for every lexed token and pass
    /// entry/exit.
    pub trace: bool,
    /// Runtime manifests to load into the `"Global"` scope before Pass A
    /// sees user code, so runtime calls resolve during analysis.
    pub runtime_manifest_paths: Vec<PathBuf>,
    /// Ceiling on liveness fixpoint iterations; 0 means "use the default".
    pub max_liveness_iterations: usize,
}

/// Default iteration ceiling: far beyond what any real function's CFG
/// needs to converge, just a backstop against a malformed graph hanging
/// the pipeline.
const DEFAULT_MAX_LIVENESS_ITERATIONS: usize = 1000;

impl PipelineConfig {
    pub fn new() -> Self {
        PipelineConfig {
            trace: false,
            runtime_manifest_paths: Vec::new(),
            max_liveness_iterations: DEFAULT_MAX_LIVENESS_ITERATIONS,
        }
    }

    pub fn with_trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }

    pub fn with_runtime_manifest(mut self, path: PathBuf) -> Self {
        self.runtime_manifest_paths.push(path);
        self
    }

    pub fn max_liveness_iterations(&self) -> usize {
        if self.max_liveness_iterations == 0 {
            DEFAULT_MAX_LIVENESS_ITERATIONS
        } else {
            self.max_liveness_iterations
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_no_manifests_and_tracing_off() {
        let config = PipelineConfig::new();
        assert!(!config.trace);
        assert!(config.runtime_manifest_paths.is_empty());
    }

    #[test]
    fn builder_methods_compose() {
        let config = PipelineConfig::new()
            .with_trace(true)
            .with_runtime_manifest(PathBuf::from("runtime.toml"));
        assert!(config.trace);
        assert_eq!(config.runtime_manifest_paths.len(), 1);
    }

    #[test]
    fn zero_iteration_limit_falls_back_to_default() {
        let config = PipelineConfig::new();
        assert_eq!(config.max_liveness_iterations(), DEFAULT_MAX_LIVENESS_ITERATIONS);
    }
}
