use crate::config::ConfigError;
use crate::environment::EnvironmentError;
use crate::executor::ExecutorError;

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("failed to create runtime path {path}: {source}")]
    CreateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to spawn queue worker: {source}")]
    SpawnWorker {
        #[source]
        source: std::io::Error,
    },
    #[error("queue worker is not running; run `{run_id}` was marked failed")]
    WorkerStopped { run_id: i64 },
    #[error("queue worker thread panicked")]
    WorkerPanicked,
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Executor(#[from] ExecutorError),
    #[error(transparent)]
    Environment(#[from] EnvironmentError),
}
