use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum EnvironmentError {
    #[error("invalid environment name `{name}`: {reason}")]
    InvalidName { name: String, reason: String },
    #[error("environment `{name}` not found under {root}")]
    NotFound { name: String, root: String },
    #[error("no environment selected")]
    NoneSelected,
    #[error("failed to create directory {path}: {source}")]
    CreateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to remove directory {path}: {source}")]
    RemoveDir {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("run `{run_id}` has no {what}")]
    RunFileMissing { run_id: i64, what: &'static str },
    #[error("invalid figure name `{name}`: {reason}")]
    InvalidFigureName { name: String, reason: String },
    #[error("environment record store failed: {source}")]
    Store {
        #[source]
        source: StoreError,
    },
}
