use super::{default_global_config_path, default_state_root, ConfigError, Settings};
use std::path::Path;

/// Loads settings from the global config path; a missing file yields the
/// defaults rooted at `~/.steplog`.
pub fn load_global_settings() -> Result<Settings, ConfigError> {
    let path = default_global_config_path()?;
    load_settings_from(&path)
}

pub fn load_settings_from(path: &Path) -> Result<Settings, ConfigError> {
    let settings = if path.exists() {
        Settings::from_path(path)?
    } else {
        Settings::with_state_root(default_state_root()?)
    };
    settings.validate()?;
    Ok(settings)
}
