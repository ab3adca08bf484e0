use crate::cache::CacheError;
use crate::environment::EnvironmentError;
use crate::procedures::RegistryError;
use crate::store::{RunStatus, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    #[error("run has no procedures")]
    EmptyRun,
    #[error("step {run_order}: unknown procedure `{proc_name}`")]
    UnknownProcedure { run_order: usize, proc_name: String },
    #[error("step {run_order}: invalid arguments for `{proc_name}`: {source}")]
    InvalidArguments {
        run_order: usize,
        proc_name: String,
        #[source]
        source: RegistryError,
    },
    #[error("step {run_order}: invalid cache reference `{filename}` in argument `{argument}`: {reason}")]
    InvalidCacheReference {
        run_order: usize,
        argument: String,
        filename: String,
        reason: String,
    },
    #[error(
        "step {run_order}: argument `{argument}` of `{proc_name}` references cache entry `{filename}` which does not exist in environment `{environment}`"
    )]
    UnknownCacheReference {
        run_order: usize,
        proc_name: String,
        argument: String,
        filename: String,
        environment: String,
    },
    #[error("cannot expand `{proc_name}`: argument `{argument}` has {actual} values, expected {expected}")]
    ExpansionLength {
        proc_name: String,
        argument: String,
        expected: usize,
        actual: usize,
    },
    #[error("cannot expand `{proc_name}`: argument `{argument}` is an empty list")]
    ExpansionEmpty { proc_name: String, argument: String },
    #[error("run `{run_id}` not found in environment `{environment}`")]
    RunNotFound { run_id: i64, environment: String },
    #[error("run `{run_id}` is `{status}`, expected `pending`")]
    NotPending { run_id: i64, status: RunStatus },
    #[error("run `{run_id}` has no stored specification")]
    MissingRunSpec { run_id: i64 },
    #[error("stored specification of run `{run_id}` is invalid: {source}")]
    InvalidRunSpec {
        run_id: i64,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode run specification: {source}")]
    EncodeRunSpec {
        #[source]
        source: serde_json::Error,
    },
    #[error("record store did not create {what}")]
    NotCreated { what: &'static str },
    #[error("run `{run_id}` step {run_order} `{proc_name}` failed: {message}")]
    ProcedureFailed {
        run_id: i64,
        proc_name: String,
        run_order: u32,
        message: String,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error(transparent)]
    Environment(#[from] EnvironmentError),
}

impl ExecutorError {
    /// Malformed run requests, rejected before any record is written.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ExecutorError::EmptyRun
                | ExecutorError::UnknownProcedure { .. }
                | ExecutorError::InvalidArguments { .. }
                | ExecutorError::InvalidCacheReference { .. }
                | ExecutorError::UnknownCacheReference { .. }
                | ExecutorError::ExpansionLength { .. }
                | ExecutorError::ExpansionEmpty { .. }
                | ExecutorError::Environment(EnvironmentError::InvalidName { .. })
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ExecutorError::RunNotFound { .. }
                | ExecutorError::Environment(EnvironmentError::NotFound { .. })
                | ExecutorError::Cache(CacheError::NotFound { .. })
        )
    }

    /// The run id a failed run can be looked up by, when one was created.
    pub fn failed_run_id(&self) -> Option<i64> {
        match self {
            ExecutorError::ProcedureFailed { run_id, .. } => Some(*run_id),
            _ => None,
        }
    }
}
