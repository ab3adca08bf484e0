pub mod artifact_cache;
pub mod codec;
pub mod error;

pub use artifact_cache::ArtifactCache;
pub use codec::BlobFormat;
pub use error::CacheError;
