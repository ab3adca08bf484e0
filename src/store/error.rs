use super::records::RunStatus;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sqlite open failed at {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: rusqlite::Error,
    },
    #[error("failed to create record store parent {path}: {source}")]
    CreateParent {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("sqlite statement failed: {source}")]
    Sql {
        #[source]
        source: rusqlite::Error,
    },
    #[error("run `{run_id}` not found")]
    RunNotFound { run_id: i64 },
    #[error("run update requires an id; insert the run first")]
    RunIdMissing,
    #[error("step `{proc_name}` has no run id")]
    StepRunIdMissing { proc_name: String },
    #[error("run `{run_id}` already has a step at run_order {run_order}")]
    DuplicateRunOrder { run_id: i64, run_order: u32 },
    #[error("run `{run_id}` status transition `{from}` -> `{to}` is invalid")]
    InvalidTransition {
        run_id: i64,
        from: RunStatus,
        to: RunStatus,
    },
    #[error("run `{run_id}` stops at {stop} before it starts at {start}")]
    InvalidTimestamps { run_id: i64, start: i64, stop: i64 },
    #[error("environment `{environment}` is not registered in this store")]
    UnknownEnvironment { environment: String },
    #[error("failed to encode {what}: {source}")]
    Encode {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid {column} in database: {reason}")]
    Decode { column: &'static str, reason: String },
}

pub(crate) fn sql_error(source: rusqlite::Error) -> StoreError {
    StoreError::Sql { source }
}
