//! Platform-specific configuration paths.
//!
//! - **User config dir**: `~/.config/mixgraph/` (Linux), `~/Library/Application Support/mixgraph/` (macOS), `%APPDATA%\mixgraph\` (Windows)
//! - **Default config file**: `mixgraph.toml` inside that directory

use std::path::PathBuf;

/// Application name used for directory paths.
const APP_NAME: &str = "mixgraph";

/// File name of the default graph configuration.
pub const CONFIG_FILE_NAME: &str = "mixgraph.toml";

/// Returns the user-specific configuration directory.
///
/// Returns a fallback path if the config directory cannot be determined.
pub fn user_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Path the CLI reads when no config file is given.
pub fn default_config_path() -> PathBuf {
    user_config_dir().join(CONFIG_FILE_NAME)
}
