use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("invalid cache filename `{filename}`: {reason}")]
    InvalidFilename { filename: String, reason: String },
    #[error("cache entry `{filename}` not found in environment `{environment}`")]
    NotFound {
        environment: String,
        filename: String,
    },
    #[error("io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode cache entry `{filename}`: {reason}")]
    Encode { filename: String, reason: String },
    #[error("failed to decode cache entry `{filename}`: {reason}")]
    Decode { filename: String, reason: String },
    #[error("cache entry `{filename}` is corrupt: digest {actual} does not match recorded {expected}")]
    Corrupt {
        filename: String,
        expected: String,
        actual: String,
    },
    #[error("cache record store failed: {source}")]
    Store {
        #[source]
        source: StoreError,
    },
}
