pub mod clock;
pub mod fs_atomic;
pub mod ids;
pub mod logging;

pub use clock::{now_millis, now_millis_not_before};
pub use ids::{validate_cache_filename, EnvironmentName, ProcedureName};
