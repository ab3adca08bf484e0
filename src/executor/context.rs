use crate::cache::ArtifactCache;
use crate::environment::{Environment, RunFiles};
use crate::procedures::ProcedureContext;

/// Per-run state threaded through step execution: which environment the run
/// belongs to and where its files go.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    environment: Environment,
    run_id: i64,
    cache: ArtifactCache,
    run_files: RunFiles,
}

impl ExecutionContext {
    pub fn new(environment: Environment, run_id: i64) -> Self {
        let cache = environment.cache();
        let run_files = environment.run_files();
        Self {
            environment,
            run_id,
            cache,
            run_files,
        }
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn run_id(&self) -> i64 {
        self.run_id
    }

    pub fn cache(&self) -> &ArtifactCache {
        &self.cache
    }

    pub fn run_files(&self) -> &RunFiles {
        &self.run_files
    }

    pub fn procedure_context(&self, run_order: u32, proc_name: &str) -> ProcedureContext {
        ProcedureContext::new(
            self.cache.clone(),
            self.run_files.clone(),
            self.run_id,
            run_order,
            proc_name,
        )
    }

    /// Appends a `[steplog]` line to the run log. Log failures never fail the
    /// run.
    pub fn log(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        if let Err(err) = self
            .run_files
            .append_log(self.run_id, &format!("[steplog] {message}"))
        {
            tracing::warn!(run_id = self.run_id, "failed to append run log: {err}");
        }
    }
}
