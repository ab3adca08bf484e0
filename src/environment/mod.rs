pub mod error;
pub mod manager;
pub mod paths;
pub mod run_files;

pub use error::EnvironmentError;
pub use manager::{Environment, EnvironmentManager};
pub use paths::{EnvironmentPaths, StatePaths, DEFAULT_STATE_ROOT_DIR};
pub use run_files::{figure_file_name, RunFiles, DEFAULT_FIGURE_EXTENSION};
