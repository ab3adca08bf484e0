pub mod error;
pub mod records;
pub mod repository;

pub use error::StoreError;
pub use records::{
    arguments_str, ArgumentBinding, ArgumentSource, CacheEntry, RunRecord, RunStatus, StepRecord,
    StepResult,
};
pub use repository::RecordStore;
