use crate::cache::ArtifactCache;
use crate::environment::{RunFiles, DEFAULT_FIGURE_EXTENSION};
use serde_json::Value;
use std::cell::RefCell;

/// A cache write requested by a procedure. It is held until the step is
/// recorded and dropped if the procedure fails.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheWrite {
    pub filename: String,
    pub value: Value,
}

/// Everything a procedure may touch while it runs. Handed to the procedure by
/// reference for the duration of one step.
#[derive(Debug)]
pub struct ProcedureContext {
    environment_name: String,
    run_id: i64,
    run_order: u32,
    proc_name: String,
    cache: ArtifactCache,
    run_files: RunFiles,
    cache_writes: RefCell<Vec<CacheWrite>>,
}

impl ProcedureContext {
    pub fn new(
        cache: ArtifactCache,
        run_files: RunFiles,
        run_id: i64,
        run_order: u32,
        proc_name: impl Into<String>,
    ) -> Self {
        Self {
            environment_name: cache.environment().to_string(),
            run_id,
            run_order,
            proc_name: proc_name.into(),
            cache,
            run_files,
            cache_writes: RefCell::new(Vec::new()),
        }
    }

    pub fn environment_name(&self) -> &str {
        &self.environment_name
    }

    pub fn run_id(&self) -> i64 {
        self.run_id
    }

    pub fn run_order(&self) -> u32 {
        self.run_order
    }

    pub fn proc_name(&self) -> &str {
        &self.proc_name
    }

    /// Appends a `[user]` line to the run log.
    pub fn log(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        tracing::info!(run_id = self.run_id, procedure = %self.proc_name, "{message}");
        if let Err(err) = self
            .run_files
            .append_log(self.run_id, &format!("[user] {message}"))
        {
            tracing::warn!(run_id = self.run_id, "failed to append run log: {err}");
        }
    }

    /// Sees this step's own pending writes before the stored cache.
    pub fn read_cache(&self, filename: &str) -> anyhow::Result<Value> {
        if let Some(write) = self
            .cache_writes
            .borrow()
            .iter()
            .find(|write| write.filename == filename)
        {
            return Ok(write.value.clone());
        }
        Ok(self.cache.load(filename)?)
    }

    /// Buffers the value; it reaches the cache, owned by this step, once the
    /// step has been recorded. A later write of the same name replaces it.
    pub fn write_cache(&self, filename: &str, value: &Value) -> anyhow::Result<()> {
        self.cache.blob_path(filename)?;
        let mut writes = self.cache_writes.borrow_mut();
        match writes.iter_mut().find(|write| write.filename == filename) {
            Some(write) => write.value = value.clone(),
            None => writes.push(CacheWrite {
                filename: filename.to_string(),
                value: value.clone(),
            }),
        }
        drop(writes);
        self.log(format!("{filename} staged for the cache"));
        Ok(())
    }

    pub fn save_figure(&self, title: &str, bytes: &[u8]) -> anyhow::Result<String> {
        self.save_figure_as(title, DEFAULT_FIGURE_EXTENSION, bytes)
    }

    pub fn save_figure_as(
        &self,
        title: &str,
        extension: &str,
        bytes: &[u8],
    ) -> anyhow::Result<String> {
        Ok(self
            .run_files
            .save_figure(self.run_id, &self.proc_name, title, extension, bytes)?)
    }

    pub(crate) fn take_cache_writes(&self) -> Vec<CacheWrite> {
        std::mem::take(&mut *self.cache_writes.borrow_mut())
    }
}
