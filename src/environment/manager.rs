use super::error::EnvironmentError;
use super::paths::{EnvironmentPaths, StatePaths};
use super::run_files::RunFiles;
use crate::cache::ArtifactCache;
use crate::shared::EnvironmentName;
use crate::store::RecordStore;
use std::fs;
use std::path::{Path, PathBuf};

/// An initialized environment: its directory, record store and cache.
#[derive(Debug, Clone)]
pub struct Environment {
    name: EnvironmentName,
    paths: EnvironmentPaths,
    store: RecordStore,
}

impl Environment {
    pub fn name(&self) -> &EnvironmentName {
        &self.name
    }

    pub fn paths(&self) -> &EnvironmentPaths {
        &self.paths
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn cache(&self) -> ArtifactCache {
        ArtifactCache::new(
            self.name.as_str(),
            self.paths.cache_dir(),
            self.store.clone(),
        )
    }

    pub fn run_files(&self) -> RunFiles {
        RunFiles::new(self.paths.runs_dir())
    }
}

#[derive(Debug, Clone)]
pub struct EnvironmentManager {
    paths: StatePaths,
    current: Option<EnvironmentName>,
}

impl EnvironmentManager {
    pub fn new(state_root: impl Into<PathBuf>) -> Self {
        Self {
            paths: StatePaths::new(state_root),
            current: None,
        }
    }

    pub fn state_paths(&self) -> &StatePaths {
        &self.paths
    }

    /// Creates the state root directories and the default environment, then
    /// selects it.
    pub fn bootstrap(&mut self, default_environment: &str) -> Result<Environment, EnvironmentError> {
        for path in self.paths.required_directories() {
            create_dir(&path)?;
        }
        let (environment, _) = self.create(default_environment)?;
        self.current = Some(environment.name.clone());
        Ok(environment)
    }

    /// Idempotent. The flag reports whether the environment was new.
    pub fn create(&self, name: &str) -> Result<(Environment, bool), EnvironmentError> {
        let name = parse_name(name)?;
        let paths = self.paths.environment(name.as_str());
        for path in paths.required_directories() {
            create_dir(&path)?;
        }
        let store = open_store(&paths.db_path())?;
        let created = store
            .create_environment(name.as_str())
            .map_err(|source| EnvironmentError::Store { source })?;
        if created {
            tracing::info!(environment = %name, "created environment");
        }
        Ok((Environment { name, paths, store }, created))
    }

    pub fn open(&self, name: &str) -> Result<Environment, EnvironmentError> {
        let name = parse_name(name)?;
        let paths = self.paths.environment(name.as_str());
        if !paths.is_initialized() {
            return Err(self.not_found(&name));
        }
        let store = open_store(&paths.db_path())?;
        let known = store
            .list_environments()
            .map_err(|source| EnvironmentError::Store { source })?;
        if !known.iter().any(|known| known == name.as_str()) {
            return Err(self.not_found(&name));
        }
        Ok(Environment { name, paths, store })
    }

    /// Selects an existing environment as the current one.
    pub fn use_environment(&mut self, name: &str) -> Result<Environment, EnvironmentError> {
        let environment = self.open(name)?;
        self.current = Some(environment.name.clone());
        Ok(environment)
    }

    pub fn current(&self) -> Result<Environment, EnvironmentError> {
        let name = self.current.as_ref().ok_or(EnvironmentError::NoneSelected)?;
        self.open(name.as_str())
    }

    pub fn current_name(&self) -> Option<&EnvironmentName> {
        self.current.as_ref()
    }

    /// Names of initialized environments, sorted.
    pub fn list(&self) -> Result<Vec<String>, EnvironmentError> {
        let envs_dir = self.paths.envs_dir();
        if !envs_dir.is_dir() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(&envs_dir).map_err(|source| EnvironmentError::Io {
            path: envs_dir.display().to_string(),
            source,
        })?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| EnvironmentError::Io {
                path: envs_dir.display().to_string(),
                source,
            })?;
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if EnvironmentName::parse(&name).is_ok()
                && EnvironmentPaths::new(entry.path()).is_initialized()
            {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    /// Destroys the environment's directory, store and cache, then recreates
    /// it empty under the same name.
    pub fn reset(&self, name: &str) -> Result<Environment, EnvironmentError> {
        let parsed = parse_name(name)?;
        let root = self.paths.environment(parsed.as_str()).root;
        if root.exists() {
            fs::remove_dir_all(&root).map_err(|source| EnvironmentError::RemoveDir {
                path: root.display().to_string(),
                source,
            })?;
        }
        tracing::info!(environment = %parsed, "reset environment");
        let (environment, _) = self.create(name)?;
        Ok(environment)
    }

    pub fn path_for<S: AsRef<str>>(
        &self,
        name: &str,
        segments: &[S],
    ) -> Result<PathBuf, EnvironmentError> {
        let name = parse_name(name)?;
        Ok(self.paths.environment(name.as_str()).join(segments))
    }

    fn not_found(&self, name: &EnvironmentName) -> EnvironmentError {
        EnvironmentError::NotFound {
            name: name.to_string(),
            root: self.paths.envs_dir().display().to_string(),
        }
    }
}

fn parse_name(name: &str) -> Result<EnvironmentName, EnvironmentError> {
    EnvironmentName::parse(name).map_err(|reason| EnvironmentError::InvalidName {
        name: name.to_string(),
        reason,
    })
}

fn open_store(db_path: &Path) -> Result<RecordStore, EnvironmentError> {
    let store = RecordStore::open(db_path).map_err(|source| EnvironmentError::Store { source })?;
    store
        .ensure_schema()
        .map_err(|source| EnvironmentError::Store { source })?;
    Ok(store)
}

fn create_dir(path: &Path) -> Result<(), EnvironmentError> {
    fs::create_dir_all(path).map_err(|source| EnvironmentError::CreateDir {
        path: path.display().to_string(),
        source,
    })
}
