pub mod arguments;
pub mod context;
pub mod error;
pub mod registry;

pub use arguments::Arguments;
pub use context::{CacheWrite, ProcedureContext};
pub use error::RegistryError;
pub use registry::{ParamSpec, ProcedureDef, ProcedureFn, ProcedureRegistry};
