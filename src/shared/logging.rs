use chrono::Local;
use std::fs;
use std::io::Write;
use std::path::Path;

pub const RUN_LOG_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Appends `<local time> <message>` to a run log, creating parents as needed.
pub fn append_run_log_line(path: &Path, message: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    writeln!(
        file,
        "{} {}",
        Local::now().format(RUN_LOG_TIME_FORMAT),
        message
    )
}
