use super::context::ExecutionContext;
use super::error::ExecutorError;
use super::run_spec::{ProcInit, RunSpec};
use crate::environment::{Environment, EnvironmentManager};
use crate::procedures::{Arguments, ProcedureRegistry};
use crate::shared::{now_millis, now_millis_not_before, validate_cache_filename};
use crate::store::{ArgumentSource, RunRecord, RunStatus, StepRecord, StepResult};
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;

pub const DEFAULT_ENVIRONMENT: &str = "default";

/// Drives runs: validates a [`RunSpec`], records the run, executes its steps
/// in order and leaves the run `complete` or `failed`.
#[derive(Debug, Clone)]
pub struct RunExecutor {
    environments: EnvironmentManager,
    registry: Arc<ProcedureRegistry>,
    default_environment: String,
}

impl RunExecutor {
    pub fn new(environments: EnvironmentManager, registry: Arc<ProcedureRegistry>) -> Self {
        Self {
            environments,
            registry,
            default_environment: DEFAULT_ENVIRONMENT.to_string(),
        }
    }

    pub fn with_default_environment(mut self, name: impl Into<String>) -> Self {
        self.default_environment = name.into();
        self
    }

    pub fn registry(&self) -> &ProcedureRegistry {
        &self.registry
    }

    pub fn environments(&self) -> &EnvironmentManager {
        &self.environments
    }

    pub fn default_environment(&self) -> &str {
        &self.default_environment
    }

    /// Fills in the environment, renumbers steps, opens the environment and
    /// validates the spec against it. Nothing is written.
    pub fn prepare(&self, mut spec: RunSpec) -> Result<(Environment, RunSpec), ExecutorError> {
        let environment_name = spec
            .environment_name
            .clone()
            .unwrap_or_else(|| self.default_environment.clone());
        let environment = self.environments.open(&environment_name)?;
        spec.environment_name = Some(environment_name);
        spec.normalize();
        self.validate(&spec, &environment)?;
        Ok((environment, spec))
    }

    pub fn validate(&self, spec: &RunSpec, environment: &Environment) -> Result<(), ExecutorError> {
        if spec.proc_inits.is_empty() {
            return Err(ExecutorError::EmptyRun);
        }
        let cache = environment.cache();
        let mut planned_outputs = BTreeSet::new();

        for (run_order, init) in spec.proc_inits.iter().enumerate() {
            let def = self.registry.get(&init.proc_name).map_err(|_| {
                ExecutorError::UnknownProcedure {
                    run_order,
                    proc_name: init.proc_name.clone(),
                }
            })?;
            def.check_argument_names(init.arguments.iter().map(|binding| binding.name.as_str()))
                .map_err(|source| ExecutorError::InvalidArguments {
                    run_order,
                    proc_name: init.proc_name.clone(),
                    source,
                })?;

            for binding in &init.arguments {
                let Some(filename) = binding.cache_reference() else {
                    continue;
                };
                validate_cache_filename(filename).map_err(|reason| {
                    ExecutorError::InvalidCacheReference {
                        run_order,
                        argument: binding.name.clone(),
                        filename: filename.to_string(),
                        reason,
                    }
                })?;
                if !planned_outputs.contains(filename) && !cache.exists(filename)? {
                    return Err(ExecutorError::UnknownCacheReference {
                        run_order,
                        proc_name: init.proc_name.clone(),
                        argument: binding.name.clone(),
                        filename: filename.to_string(),
                        environment: environment.name().to_string(),
                    });
                }
            }
            planned_outputs.extend(def.cache_output_names().iter().cloned());
        }
        Ok(())
    }

    /// Executes a run synchronously and returns it with its steps. A failing
    /// procedure leaves the run `failed` and is returned as
    /// [`ExecutorError::ProcedureFailed`].
    pub fn execute_run(&self, spec: RunSpec) -> Result<RunRecord, ExecutorError> {
        let (environment, spec) = self.prepare(spec)?;
        let mut run = RunRecord::new(
            environment.name().as_str(),
            spec.description.clone(),
            RunStatus::Running,
        );
        run.timestamp_start = Some(now_millis());
        let run_id = environment
            .store()
            .insert_run_with_spec(&run, Some(&encode_spec(&spec)?))?
            .ok_or(ExecutorError::NotCreated { what: "run record" })?;
        run.id = Some(run_id);
        self.write_description_or_fail(&environment, &mut run, &spec.description)?;
        self.drive(environment, run, &spec)
    }

    /// Validates and records the run as `pending` without executing it.
    pub fn admit(&self, spec: RunSpec) -> Result<RunRecord, ExecutorError> {
        let (environment, spec) = self.prepare(spec)?;
        let mut run = RunRecord::new(
            environment.name().as_str(),
            spec.description.clone(),
            RunStatus::Pending,
        );
        let run_id = environment
            .store()
            .insert_run_with_spec(&run, Some(&encode_spec(&spec)?))?
            .ok_or(ExecutorError::NotCreated { what: "run record" })?;
        run.id = Some(run_id);
        self.write_description_or_fail(&environment, &mut run, &spec.description)?;
        ExecutionContext::new(environment, run_id).log(format!(
            "run {run_id} admitted with {} step(s)",
            spec.proc_inits.len()
        ));
        Ok(run)
    }

    /// Executes a run previously recorded by [`RunExecutor::admit`].
    pub fn execute_admitted(
        &self,
        environment_name: &str,
        run_id: i64,
    ) -> Result<RunRecord, ExecutorError> {
        let environment = self.environments.open(environment_name)?;
        let mut run = environment
            .store()
            .get_run(run_id)?
            .ok_or_else(|| ExecutorError::RunNotFound {
                run_id,
                environment: environment_name.to_string(),
            })?;
        if run.status != RunStatus::Pending {
            return Err(ExecutorError::NotPending {
                run_id,
                status: run.status,
            });
        }

        let spec = match self.stored_spec(&environment, run_id) {
            Ok(spec) => spec,
            Err(err) => {
                let context = ExecutionContext::new(environment.clone(), run_id);
                self.mark_failed(&context, &mut run, now_millis(), &err.to_string());
                return Err(err);
            }
        };
        run.status = RunStatus::Running;
        run.timestamp_start = Some(now_millis());
        environment.store().update_run(&run)?;
        self.drive(environment, run, &spec)
    }

    /// Marks a run `failed` with `message` without executing anything.
    pub fn fail_run(
        &self,
        environment_name: &str,
        run_id: i64,
        message: &str,
    ) -> Result<RunRecord, ExecutorError> {
        let environment = self.environments.open(environment_name)?;
        let mut run = environment
            .store()
            .get_run(run_id)?
            .ok_or_else(|| ExecutorError::RunNotFound {
                run_id,
                environment: environment_name.to_string(),
            })?;
        let floor = run
            .steps
            .iter()
            .map(|step| step.timestamp_stop)
            .chain(run.timestamp_start)
            .max()
            .unwrap_or_else(now_millis);
        let stop = now_millis_not_before(floor);
        run.status = RunStatus::Failed;
        run.timestamp_start.get_or_insert(stop);
        run.timestamp_stop = Some(stop);
        run.error = Some(message.to_string());
        environment.store().update_run(&run)?;
        ExecutionContext::new(environment, run_id).log(format!("run {run_id} failed: {message}"));
        Ok(run)
    }

    /// The run row is already committed here, so a failed write leaves it
    /// `failed` instead of `pending` or `running`.
    fn write_description_or_fail(
        &self,
        environment: &Environment,
        run: &mut RunRecord,
        description: &str,
    ) -> Result<(), ExecutorError> {
        let run_id = run.id.ok_or(ExecutorError::NotCreated { what: "run id" })?;
        if let Err(err) = environment.run_files().write_description(run_id, description) {
            let context = ExecutionContext::new(environment.clone(), run_id);
            let floor = run.timestamp_start.unwrap_or_else(now_millis);
            self.mark_failed(&context, run, floor, &err.to_string());
            return Err(err.into());
        }
        Ok(())
    }

    fn stored_spec(&self, environment: &Environment, run_id: i64) -> Result<RunSpec, ExecutorError> {
        let raw = environment
            .store()
            .load_run_spec(run_id)?
            .ok_or(ExecutorError::MissingRunSpec { run_id })?;
        let spec: RunSpec = serde_json::from_value(raw)
            .map_err(|source| ExecutorError::InvalidRunSpec { run_id, source })?;
        self.validate(&spec, environment)?;
        Ok(spec)
    }

    fn drive(
        &self,
        environment: Environment,
        mut run: RunRecord,
        spec: &RunSpec,
    ) -> Result<RunRecord, ExecutorError> {
        let run_id = run.id.ok_or(ExecutorError::NotCreated { what: "run id" })?;
        let context = ExecutionContext::new(environment, run_id);
        context.log(format!("run {run_id} started: {}", spec.description));
        tracing::info!(run_id, environment = %context.environment().name(), "run started");

        let mut clock_floor = run.timestamp_start.unwrap_or_else(now_millis);
        for (run_order, init) in (0u32..).zip(spec.proc_inits.iter()) {
            match self.execute_step(&context, run_order, init, clock_floor) {
                Ok(step) => {
                    clock_floor = step.timestamp_stop;
                    run.steps.push(step);
                }
                Err(StepFailure { message, cause }) => {
                    context.log(format!(
                        "step {run_order} `{}` failed: {message}",
                        init.proc_name
                    ));
                    tracing::warn!(run_id, run_order, procedure = %init.proc_name, "step failed: {message}");
                    self.mark_failed(&context, &mut run, clock_floor, &message);
                    return Err(cause.unwrap_or_else(|| ExecutorError::ProcedureFailed {
                        run_id,
                        proc_name: init.proc_name.clone(),
                        run_order,
                        message,
                    }));
                }
            }
        }

        run.status = RunStatus::Complete;
        run.timestamp_stop = Some(now_millis_not_before(clock_floor));
        context.environment().store().update_run(&run)?;
        context.log(format!("run {run_id} complete"));
        tracing::info!(run_id, steps = run.steps.len(), "run complete");
        Ok(run)
    }

    fn execute_step(
        &self,
        context: &ExecutionContext,
        run_order: u32,
        init: &ProcInit,
        clock_floor: i64,
    ) -> Result<StepRecord, StepFailure> {
        let cache = context.cache();
        let mut arguments = Arguments::new();
        for binding in &init.arguments {
            let value = match &binding.source {
                ArgumentSource::Literal(value) => value.clone(),
                ArgumentSource::Cache(filename) => cache.load(filename).map_err(|err| {
                    StepFailure::procedure(format!(
                        "argument `{}` could not be loaded: {err}",
                        binding.name
                    ))
                })?,
            };
            arguments.insert(binding.name.clone(), value);
        }

        let def = self
            .registry
            .get(&init.proc_name)
            .map_err(|err| StepFailure::procedure(err.to_string()))?;
        let outputs = def.cache_output_names().to_vec();
        context.log(format!(
            "step {run_order} `{}` started ({})",
            init.proc_name, init.arguments_str
        ));

        let procedure_context = context.procedure_context(run_order, &init.proc_name);
        let timestamp_start = now_millis_not_before(clock_floor);
        let value = self
            .registry
            .invoke(&init.proc_name, &procedure_context, arguments)
            .map_err(|err| StepFailure::procedure(err.to_string()))?;
        let timestamp_stop = now_millis_not_before(timestamp_start);

        let result = match outputs.len() {
            0 => StepResult::Value {
                value: value.clone(),
            },
            1 => StepResult::Cached {
                filenames: outputs.clone(),
            },
            expected => match &value {
                Value::Array(items) if items.len() == expected => StepResult::Cached {
                    filenames: outputs.clone(),
                },
                _ => {
                    return Err(StepFailure::procedure(format!(
                        "declared {expected} cache outputs but returned {}",
                        describe_shape(&value)
                    )))
                }
            },
        };

        let mut step = StepRecord {
            id: None,
            proc_name: init.proc_name.clone(),
            run_order,
            timestamp_start,
            timestamp_stop,
            result,
            arguments: init.arguments.clone(),
            arguments_str: init.arguments_str.clone(),
            run_id: Some(context.run_id()),
        };
        let store = context.environment().store();
        let step_id = store
            .insert_step(&step)
            .map_err(|err| StepFailure::from(ExecutorError::from(err)))?
            .ok_or_else(|| {
                StepFailure::from(ExecutorError::NotCreated {
                    what: "step record",
                })
            })?;
        step.id = Some(step_id);

        for write in procedure_context.take_cache_writes() {
            if outputs.contains(&write.filename) {
                continue;
            }
            cache
                .save(&write.filename, &write.value, Some(step_id))
                .map_err(|err| StepFailure::from(ExecutorError::from(err)))?;
        }
        match (outputs.as_slice(), value) {
            ([], _) => {}
            ([filename], value) => {
                cache
                    .save(filename, &value, Some(step_id))
                    .map_err(|err| StepFailure::from(ExecutorError::from(err)))?;
            }
            (filenames, Value::Array(items)) => {
                for (filename, item) in filenames.iter().zip(items.iter()) {
                    cache
                        .save(filename, item, Some(step_id))
                        .map_err(|err| StepFailure::from(ExecutorError::from(err)))?;
                }
            }
            (_, other) => {
                return Err(StepFailure::procedure(format!(
                    "declared cache outputs but returned {}",
                    describe_shape(&other)
                )))
            }
        }

        context.log(format!(
            "step {run_order} `{}` finished: {}",
            init.proc_name,
            step.result.display()
        ));
        Ok(step)
    }

    fn mark_failed(
        &self,
        context: &ExecutionContext,
        run: &mut RunRecord,
        clock_floor: i64,
        message: &str,
    ) {
        let stop = now_millis_not_before(clock_floor);
        run.status = RunStatus::Failed;
        run.timestamp_start.get_or_insert(stop);
        run.timestamp_stop = Some(stop);
        run.error = Some(message.to_string());
        if let Err(err) = context.environment().store().update_run(run) {
            tracing::error!(run_id = context.run_id(), "failed to record run failure: {err}");
        }
        context.log(format!("run {} failed: {message}", context.run_id()));
    }
}

/// Why a step did not produce a record. `cause` is set for infrastructure
/// errors, which are returned as-is instead of as a procedure failure.
struct StepFailure {
    message: String,
    cause: Option<ExecutorError>,
}

impl StepFailure {
    fn procedure(message: String) -> Self {
        Self {
            message,
            cause: None,
        }
    }
}

impl From<ExecutorError> for StepFailure {
    fn from(err: ExecutorError) -> Self {
        Self {
            message: err.to_string(),
            cause: Some(err),
        }
    }
}

fn describe_shape(value: &Value) -> String {
    match value {
        Value::Array(items) => format!("an array of {}", items.len()),
        Value::Null => "null".to_string(),
        Value::Bool(_) => "a boolean".to_string(),
        Value::Number(_) => "a number".to_string(),
        Value::String(_) => "a string".to_string(),
        Value::Object(_) => "an object".to_string(),
    }
}

fn encode_spec(spec: &RunSpec) -> Result<Value, ExecutorError> {
    serde_json::to_value(spec).map_err(|source| ExecutorError::EncodeRunSpec { source })
}
