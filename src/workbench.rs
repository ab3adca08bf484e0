use crate::config::Settings;
use crate::environment::{Environment, EnvironmentManager};
use crate::executor::{ExecutorError, RunExecutor, RunSpec};
use crate::procedures::ProcedureRegistry;
use crate::runtime::{QueueOptions, RunQueue, RuntimeError, WorkerHandle};
use crate::store::{CacheEntry, RunRecord};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;

/// Everything a front end needs: settings, the bootstrapped state root and an
/// executor over a fixed procedure registry.
#[derive(Debug, Clone)]
pub struct Workbench {
    settings: Settings,
    executor: RunExecutor,
}

impl Workbench {
    /// Validates the settings, creates the state root and the default
    /// environment. The registry is frozen from here on.
    pub fn open(settings: Settings, registry: ProcedureRegistry) -> Result<Self, RuntimeError> {
        settings.validate()?;
        let mut environments = EnvironmentManager::new(settings.state_root.clone());
        environments.bootstrap(&settings.default_environment)?;
        let executor = RunExecutor::new(environments, Arc::new(registry))
            .with_default_environment(settings.default_environment.clone());
        Ok(Self { settings, executor })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn executor(&self) -> &RunExecutor {
        &self.executor
    }

    pub fn environments(&self) -> &EnvironmentManager {
        self.executor.environments()
    }

    pub fn registry(&self) -> &ProcedureRegistry {
        self.executor.registry()
    }

    pub fn start_queue(&self) -> Result<(RunQueue, WorkerHandle), RuntimeError> {
        RunQueue::start(
            self.executor.clone(),
            QueueOptions::with_poll_ms(self.settings.queue_poll_ms),
        )
    }

    pub fn run(&self, spec: RunSpec) -> Result<RunRecord, ExecutorError> {
        self.executor.execute_run(spec)
    }

    /// `None` resolves to the configured default environment.
    pub fn environment(&self, name: Option<&str>) -> Result<Environment, ExecutorError> {
        let name = name.unwrap_or(&self.settings.default_environment);
        Ok(self.environments().open(name)?)
    }

    pub fn create_environment(&self, name: &str) -> Result<(String, bool), ExecutorError> {
        let (environment, created) = self.environments().create(name)?;
        Ok((environment.name().to_string(), created))
    }

    pub fn reset_environment(&self, name: &str) -> Result<String, ExecutorError> {
        let environment = self.environments().reset(name)?;
        Ok(environment.name().to_string())
    }

    pub fn list_environments(&self) -> Result<Vec<String>, ExecutorError> {
        Ok(self.environments().list()?)
    }

    pub fn list_runs(&self, environment: Option<&str>) -> Result<Vec<RunRecord>, ExecutorError> {
        let environment = self.environment(environment)?;
        let name = environment.name().to_string();
        Ok(environment.store().list_runs(Some(&name))?)
    }

    pub fn get_run(&self, environment: Option<&str>, run_id: i64) -> Result<RunRecord, ExecutorError> {
        let environment = self.environment(environment)?;
        environment
            .store()
            .get_run(run_id)?
            .ok_or_else(|| ExecutorError::RunNotFound {
                run_id,
                environment: environment.name().to_string(),
            })
    }

    pub fn read_log(&self, environment: Option<&str>, run_id: i64) -> Result<String, ExecutorError> {
        self.get_run(environment, run_id)?;
        let environment = self.environment(environment)?;
        Ok(environment.run_files().read_log(run_id)?)
    }

    pub fn list_figures(
        &self,
        environment: Option<&str>,
        run_id: i64,
    ) -> Result<Vec<String>, ExecutorError> {
        self.get_run(environment, run_id)?;
        let environment = self.environment(environment)?;
        Ok(environment.run_files().list_figures(run_id)?)
    }

    pub fn figure_path(
        &self,
        environment: Option<&str>,
        run_id: i64,
        name: &str,
    ) -> Result<PathBuf, ExecutorError> {
        let environment = self.environment(environment)?;
        Ok(environment.run_files().figure_path(run_id, name)?)
    }

    pub fn load_artifact(&self, environment: Option<&str>, filename: &str) -> Result<Value, ExecutorError> {
        Ok(self.environment(environment)?.cache().load(filename)?)
    }

    pub fn list_artifacts(&self, environment: Option<&str>) -> Result<Vec<CacheEntry>, ExecutorError> {
        Ok(self.environment(environment)?.cache().list()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::procedures::ProcedureDef;
    use crate::store::{ArgumentBinding, RunStatus};
    use serde_json::json;
    use tempfile::tempdir;

    fn registry() -> ProcedureRegistry {
        let mut registry = ProcedureRegistry::new();
        registry
            .register(
                ProcedureDef::new("double", |_ctx, args| Ok(json!(args.i64("x")? * 2))).param("x"),
            )
            .expect("register double");
        registry
    }

    #[test]
    fn open_bootstraps_default_environment() {
        let temp = tempdir().expect("temp dir");
        let workbench = Workbench::open(Settings::with_state_root(temp.path()), registry())
            .expect("open workbench");
        assert_eq!(workbench.list_environments().expect("list"), vec!["default"]);
        assert!(temp.path().join("envs/default/steplog.db").is_file());
    }

    #[test]
    fn queries_resolve_default_environment_and_report_missing_runs() {
        let temp = tempdir().expect("temp dir");
        let workbench = Workbench::open(Settings::with_state_root(temp.path()), registry())
            .expect("open workbench");
        let run = workbench
            .run(RunSpec::new("double").step("double", vec![ArgumentBinding::literal("x", 4)]))
            .expect("run");
        assert_eq!(run.status, RunStatus::Complete);

        let run_id = run.id.expect("run id");
        let fetched = workbench.get_run(None, run_id).expect("fetch run");
        assert_eq!(fetched.steps[0].result.display(), "8");
        assert!(workbench
            .read_log(Some("default"), run_id)
            .expect("log")
            .contains("complete"));

        let err = workbench.get_run(None, run_id + 10).expect_err("missing run");
        assert!(err.is_not_found());
        let err = workbench.list_runs(Some("missing")).expect_err("missing env");
        assert!(err.is_not_found());
    }
}
