use super::error::EnvironmentError;
use crate::shared::logging::append_run_log_line;
use std::fs;
use std::path::{Path, PathBuf};

pub const FIGURE_PREFIX: &str = "figure_";
pub const DEFAULT_FIGURE_EXTENSION: &str = "png";

/// Files kept beside the record store for each run: `runs/<id>/` holds the
/// description, the run log and any saved figures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunFiles {
    runs_dir: PathBuf,
}

impl RunFiles {
    pub fn new(runs_dir: impl Into<PathBuf>) -> Self {
        Self {
            runs_dir: runs_dir.into(),
        }
    }

    pub fn run_dir(&self, run_id: i64) -> PathBuf {
        self.runs_dir.join(run_id.to_string())
    }

    pub fn description_path(&self, run_id: i64) -> PathBuf {
        self.run_dir(run_id).join("description.txt")
    }

    pub fn log_path(&self, run_id: i64) -> PathBuf {
        self.run_dir(run_id).join(format!("run_{run_id}.log"))
    }

    pub fn ensure_run_dir(&self, run_id: i64) -> Result<PathBuf, EnvironmentError> {
        let dir = self.run_dir(run_id);
        fs::create_dir_all(&dir).map_err(|source| EnvironmentError::CreateDir {
            path: dir.display().to_string(),
            source,
        })?;
        Ok(dir)
    }

    pub fn write_description(&self, run_id: i64, description: &str) -> Result<(), EnvironmentError> {
        self.ensure_run_dir(run_id)?;
        let path = self.description_path(run_id);
        fs::write(&path, description).map_err(|source| io_error(&path, source))
    }

    pub fn read_description(&self, run_id: i64) -> Result<String, EnvironmentError> {
        read_run_text(&self.description_path(run_id), run_id, "description")
    }

    pub fn append_log(&self, run_id: i64, message: &str) -> Result<(), EnvironmentError> {
        self.ensure_run_dir(run_id)?;
        let path = self.log_path(run_id);
        append_run_log_line(&path, message).map_err(|source| io_error(&path, source))
    }

    pub fn read_log(&self, run_id: i64) -> Result<String, EnvironmentError> {
        read_run_text(&self.log_path(run_id), run_id, "log")
    }

    /// Stores figure bytes as `figure_<proc>_<title>.<ext>` and returns the
    /// file name.
    pub fn save_figure(
        &self,
        run_id: i64,
        proc_name: &str,
        title: &str,
        extension: &str,
        bytes: &[u8],
    ) -> Result<String, EnvironmentError> {
        let name = figure_file_name(proc_name, title, extension)?;
        let path = self.ensure_run_dir(run_id)?.join(&name);
        fs::write(&path, bytes).map_err(|source| io_error(&path, source))?;
        Ok(name)
    }

    pub fn list_figures(&self, run_id: i64) -> Result<Vec<String>, EnvironmentError> {
        let dir = self.run_dir(run_id);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(&dir).map_err(|source| io_error(&dir, source))?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| io_error(&dir, source))?;
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if entry.path().is_file() && is_figure_name(&name) {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    pub fn figure_path(&self, run_id: i64, name: &str) -> Result<PathBuf, EnvironmentError> {
        if !is_figure_name(name) {
            return Err(EnvironmentError::InvalidFigureName {
                name: name.to_string(),
                reason: format!("expected `{FIGURE_PREFIX}<proc>_<title>.<ext>`"),
            });
        }
        let path = self.run_dir(run_id).join(name);
        if !path.is_file() {
            return Err(EnvironmentError::RunFileMissing {
                run_id,
                what: "such figure",
            });
        }
        Ok(path)
    }
}

pub fn figure_file_name(
    proc_name: &str,
    title: &str,
    extension: &str,
) -> Result<String, EnvironmentError> {
    let extension = extension.trim_start_matches('.');
    let name = format!("{FIGURE_PREFIX}{proc_name}_{title}.{extension}");
    if proc_name.is_empty() || title.trim().is_empty() || extension.is_empty() {
        return Err(EnvironmentError::InvalidFigureName {
            name,
            reason: "procedure, title and extension must be non-empty".to_string(),
        });
    }
    if !is_figure_name(&name) {
        return Err(EnvironmentError::InvalidFigureName {
            name,
            reason: "must be a single path segment".to_string(),
        });
    }
    Ok(name)
}

fn is_figure_name(name: &str) -> bool {
    let Some(rest) = name.strip_prefix(FIGURE_PREFIX) else {
        return false;
    };
    if name.contains(|ch: char| matches!(ch, '/' | '\\' | '\0')) || name.contains("..") {
        return false;
    }
    match rest.rsplit_once('.') {
        Some((stem, ext)) => stem.contains('_') && !ext.is_empty(),
        None => false,
    }
}

fn read_run_text(path: &Path, run_id: i64, what: &'static str) -> Result<String, EnvironmentError> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(text),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            Err(EnvironmentError::RunFileMissing { run_id, what })
        }
        Err(source) => Err(io_error(path, source)),
    }
}

fn io_error(path: &Path, source: std::io::Error) -> EnvironmentError {
    EnvironmentError::Io {
        path: path.display().to_string(),
        source,
    }
}
