use super::codec;
use super::error::CacheError;
use crate::shared::fs_atomic::atomic_write_file;
use crate::shared::validate_cache_filename;
use crate::store::{CacheEntry, RecordStore};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

/// Named, overwritable blobs for one environment. Blobs live as files under
/// the environment's `cache/` directory; the record store keeps one entry per
/// name with the digest and producing step.
#[derive(Debug, Clone)]
pub struct ArtifactCache {
    environment: String,
    cache_dir: PathBuf,
    store: RecordStore,
}

impl ArtifactCache {
    pub fn new(environment: impl Into<String>, cache_dir: PathBuf, store: RecordStore) -> Self {
        Self {
            environment: environment.into(),
            cache_dir,
            store,
        }
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn blob_path(&self, filename: &str) -> Result<PathBuf, CacheError> {
        validate_cache_filename(filename).map_err(|reason| CacheError::InvalidFilename {
            filename: filename.to_string(),
            reason,
        })?;
        Ok(self.cache_dir.join(filename))
    }

    /// Writes the blob and upserts its entry in one call.
    pub fn save(
        &self,
        filename: &str,
        value: &Value,
        producing_step: Option<i64>,
    ) -> Result<CacheEntry, CacheError> {
        let digest = self.write_blob(filename, value)?;
        self.record_entry(filename, producing_step, &digest)
    }

    /// Writes only the blob and returns its digest.
    pub fn write_blob(&self, filename: &str, value: &Value) -> Result<String, CacheError> {
        let path = self.blob_path(filename)?;
        let bytes = codec::encode(filename, value).map_err(|err| CacheError::Encode {
            filename: filename.to_string(),
            reason: err.to_string(),
        })?;
        fs::create_dir_all(&self.cache_dir).map_err(|source| CacheError::Io {
            path: self.cache_dir.display().to_string(),
            source,
        })?;
        atomic_write_file(&path, &bytes).map_err(|source| CacheError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Ok(blob_digest(&bytes))
    }

    pub fn record_entry(
        &self,
        filename: &str,
        producing_step: Option<i64>,
        digest: &str,
    ) -> Result<CacheEntry, CacheError> {
        self.store
            .upsert_cache_entry(&self.environment, filename, producing_step, digest)
            .map_err(|source| CacheError::Store { source })
    }

    pub fn load(&self, filename: &str) -> Result<Value, CacheError> {
        let path = self.blob_path(filename)?;
        let entry = self.entry(filename)?.ok_or_else(|| CacheError::NotFound {
            environment: self.environment.clone(),
            filename: filename.to_string(),
        })?;
        let bytes = fs::read(&path).map_err(|source| CacheError::Io {
            path: path.display().to_string(),
            source,
        })?;

        let actual = blob_digest(&bytes);
        if actual != entry.digest {
            return Err(CacheError::Corrupt {
                filename: filename.to_string(),
                expected: entry.digest,
                actual,
            });
        }
        codec::decode(&bytes).map_err(|err| CacheError::Decode {
            filename: filename.to_string(),
            reason: err.to_string(),
        })
    }

    pub fn exists(&self, filename: &str) -> Result<bool, CacheError> {
        self.blob_path(filename)?;
        Ok(self.entry(filename)?.is_some())
    }

    pub fn entry(&self, filename: &str) -> Result<Option<CacheEntry>, CacheError> {
        self.store
            .get_cache_entry(&self.environment, filename)
            .map_err(|source| CacheError::Store { source })
    }

    pub fn list(&self) -> Result<Vec<CacheEntry>, CacheError> {
        self.store
            .list_cache_entries(&self.environment)
            .map_err(|source| CacheError::Store { source })
    }
}

fn blob_digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher
        .finalize()
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect()
}
