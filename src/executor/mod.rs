pub mod context;
pub mod engine;
pub mod error;
pub mod expansion;
pub mod run_spec;

pub use context::ExecutionContext;
pub use engine::{RunExecutor, DEFAULT_ENVIRONMENT};
pub use error::ExecutorError;
pub use expansion::expand_proc;
pub use run_spec::{to_number, ProcInit, RunSpec};
