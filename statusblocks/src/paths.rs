//! Config file location

use std::path::PathBuf;

/// Get the default config file path
///
/// Priority order:
/// 1. $XDG_CONFIG_HOME/statusblocks/blocks.toml
/// 2. ~/.config/statusblocks/blocks.toml
/// 3. /etc/statusblocks/blocks.toml (system-wide fallback)
pub fn get_config_path() -> PathBuf {
    if let Some(config_dir) = dirs_next::config_dir() {
        config_dir.join("statusblocks/blocks.toml")
    } else if let Some(home) = dirs_next::home_dir() {
        home.join(".config/statusblocks/blocks.toml")
    } else {
        PathBuf::from("/etc/statusblocks/blocks.toml")
    }
}
