//! Path utilities for rewind data directories

use std::path::PathBuf;
use std::sync::OnceLock;

/// Global storage for custom data directory path
static DATA_DIR: OnceLock<PathBuf> = OnceLock::new();

/// Initialize the data directory with an optional custom path.
/// Must be called before any other path function.
/// If custom_path is None, uses the default ~/.rewind location.
pub fn init_data_dir(custom_path: Option<PathBuf>) {
    let path = custom_path.unwrap_or_else(default_data_dir);
    if DATA_DIR.set(path.clone()).is_err() {
        let existing = DATA_DIR
            .get()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<unknown>".to_string());
        tracing::debug!(
            path = %path.display(),
            existing = %existing,
            "Data directory already initialized"
        );
    }
}

/// Get the default data directory path (~/.rewind)
fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".rewind"))
        .unwrap_or_else(|| PathBuf::from(".rewind"))
}

/// Get the base data directory.
/// Returns the custom path if set via init_data_dir(), otherwise ~/.rewind
pub fn data_dir() -> PathBuf {
    DATA_DIR.get().cloned().unwrap_or_else(default_data_dir)
}

/// Get the logs directory (~/.rewind/logs)
pub fn logs_dir() -> PathBuf {
    data_dir().join("logs")
}

/// Get the default log file path (~/.rewind/logs/rewind.log)
pub fn log_file_path() -> PathBuf {
    logs_dir().join("rewind.log")
}

/// Get the config file path (~/.rewind/config.toml)
pub fn config_path() -> PathBuf {
    data_dir().join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_paths_live_under_the_data_dir() {
        let base = data_dir();
        assert_eq!(logs_dir(), base.join("logs"));
        assert_eq!(log_file_path(), base.join("logs").join("rewind.log"));
        assert_eq!(config_path(), base.join("config.toml"));
    }
}
