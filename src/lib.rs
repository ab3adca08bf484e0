pub mod api;
pub mod app;
pub mod cache;
pub mod config;
pub mod environment;
pub mod executor;
pub mod procedures;
pub mod runtime;
pub mod shared;
pub mod store;
pub mod workbench;

pub use executor::{RunExecutor, RunSpec};
pub use procedures::{Arguments, ProcedureContext, ProcedureDef, ProcedureRegistry};
pub use store::{ArgumentBinding, RunRecord, RunStatus};
pub use workbench::Workbench;
