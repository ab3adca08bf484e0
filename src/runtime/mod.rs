pub mod error;
pub mod logging;
pub mod queue_worker;
pub mod recovery;
pub mod worker_primitives;

pub use error::RuntimeError;
pub use logging::append_runtime_log;
pub use queue_worker::{QueuedRun, RunQueue, WorkerHandle};
pub use recovery::{recover_interrupted_runs, RecoveryReport, INTERRUPTED_MESSAGE};
pub use worker_primitives::{QueueOptions, WorkerEvent};
