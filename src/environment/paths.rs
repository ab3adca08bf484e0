use std::path::PathBuf;

pub const DEFAULT_STATE_ROOT_DIR: &str = ".steplog";
pub const ENVIRONMENT_DB_FILE_NAME: &str = "steplog.db";

/// Layout of the state root shared by every environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatePaths {
    pub root: PathBuf,
}

impl StatePaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn required_directories(&self) -> Vec<PathBuf> {
        vec![self.envs_dir(), self.logs_dir()]
    }

    pub fn envs_dir(&self) -> PathBuf {
        self.root.join("envs")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    pub fn runtime_log_path(&self) -> PathBuf {
        self.logs_dir().join("runtime.log")
    }

    pub fn environment(&self, name: &str) -> EnvironmentPaths {
        EnvironmentPaths::new(self.envs_dir().join(name))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentPaths {
    pub root: PathBuf,
}

impl EnvironmentPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn required_directories(&self) -> Vec<PathBuf> {
        vec![self.root.clone(), self.runs_dir(), self.cache_dir()]
    }

    pub fn db_path(&self) -> PathBuf {
        self.root.join(ENVIRONMENT_DB_FILE_NAME)
    }

    pub fn runs_dir(&self) -> PathBuf {
        self.root.join("runs")
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.root.join("cache")
    }

    pub fn join<S: AsRef<str>>(&self, segments: &[S]) -> PathBuf {
        segments
            .iter()
            .fold(self.root.clone(), |path, segment| path.join(segment.as_ref()))
    }

    pub fn is_initialized(&self) -> bool {
        self.root.is_dir() && self.db_path().is_file()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_paths_nest_under_envs() {
        let state = StatePaths::new("/state");
        let env = state.environment("default");
        assert_eq!(env.root, PathBuf::from("/state/envs/default"));
        assert_eq!(env.db_path(), PathBuf::from("/state/envs/default/steplog.db"));
        assert_eq!(
            env.join(&["runs", "3", "run_3.log"]),
            PathBuf::from("/state/envs/default/runs/3/run_3.log")
        );
        assert_eq!(
            state.runtime_log_path(),
            PathBuf::from("/state/logs/runtime.log")
        );
    }
}
