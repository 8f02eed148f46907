//! Status line configuration
//!
//! Read from a TOML file when one exists, otherwise the built-in block set is
//! used. Example:
//!
//! ```toml
//! delimiter = " | "
//!
//! [[block]]
//! icon = "🔊 "
//! command = "sb-volume"
//! signal = 10
//!
//! [[block]]
//! command = "date '+%H:%M'"
//! interval = 60
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::blocks::BlockSpec;
use crate::error::{Error, Result};
use crate::executor::DEFAULT_SHELL;
use crate::paths;

/// Buffer size a block's text historically had to fit in
pub const DEFAULT_COMMAND_LENGTH: usize = 50;

/// Everything read from the config file
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Text placed between two visible blocks
    pub delimiter: String,

    /// Read bound for one command, including room for the delimiter
    pub command_length: usize,

    /// Shell used to run block commands
    pub shell: String,

    /// Real-time signal number of trigger 0, `SIGRTMIN` when unset
    pub signal_base: Option<i32>,

    #[serde(rename = "block")]
    pub blocks: Vec<BlockSpec>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            delimiter: " ".to_string(),
            command_length: DEFAULT_COMMAND_LENGTH,
            shell: DEFAULT_SHELL.to_string(),
            signal_base: None,
            blocks: default_blocks(),
        }
    }
}

impl Config {
    /// Parse a config document; `path` is only used in error messages
    pub fn from_toml(text: &str, path: &Path) -> Result<Self> {
        toml::from_str(text).map_err(|source| Error::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Read the config file at `path`
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| Error::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text, path)
    }

    /// Load an explicit config, else the default file if present, else the
    /// built-in blocks
    pub fn discover(explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>)> {
        if let Some(path) = explicit {
            return Ok((Self::load(path)?, Some(path.to_path_buf())));
        }

        let path = paths::get_config_path();
        if path.exists() {
            Ok((Self::load(&path)?, Some(path)))
        } else {
            Ok((Self::default(), None))
        }
    }
}

/// The stock block set
pub fn default_blocks() -> Vec<BlockSpec> {
    vec![
        BlockSpec::new("", "cat /tmp/recordingicon 2>/dev/null", 0, 9),
        BlockSpec::new("", "sb-tasks", 10, 26),
        BlockSpec::new("", "sb-music", 0, 11),
        BlockSpec::new("", "sb-pacpackages", 0, 8),
        BlockSpec::new("", "sb-torrent", 20, 7),
        BlockSpec::new("", "sb-memory", 10, 14),
        BlockSpec::new("", "sb-cpu", 10, 18),
        BlockSpec::new("", "sb-forecast", 18000, 5),
        BlockSpec::new("", "sb-nettraf", 1, 16),
        BlockSpec::new("", "sb-volume", 0, 10),
        BlockSpec::new("", "sb-battery", 5, 3),
        BlockSpec::new("", "sb-clock", 60, 1),
        BlockSpec::new("", "sb-internet", 5, 4),
        BlockSpec::new("", "sb-help-icon", 0, 15),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::BlockRegistry;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert_eq!(config.delimiter, " ");
        assert_eq!(config.command_length, 50);
        let registry = BlockRegistry::new(config.blocks, 30).unwrap();
        assert_eq!(registry.base_tick(), Some(1));
    }

    #[test]
    fn test_parse_blocks() {
        let text = r#"
            delimiter = " | "
            signal_base = 40

            [[block]]
            icon = "A"
            command = "echo x"
            interval = 10

            [[block]]
            icon = "B"
            command = "echo y"
            trigger = 5
        "#;
        let config = Config::from_toml(text, Path::new("blocks.toml")).unwrap();
        assert_eq!(config.delimiter, " | ");
        assert_eq!(config.signal_base, Some(40));
        assert_eq!(config.shell, DEFAULT_SHELL);
        assert_eq!(
            config.blocks,
            vec![
                BlockSpec::new("A", "echo x", 10, 0),
                BlockSpec::new("B", "echo y", 0, 5),
            ]
        );
    }

    #[test]
    fn test_missing_keys_use_defaults() {
        let config = Config::from_toml("command_length = 80", Path::new("x.toml")).unwrap();
        assert_eq!(config.command_length, 80);
        assert_eq!(config.blocks, default_blocks());
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = Config::from_toml("colour = 1", Path::new("bad.toml")).unwrap_err();
        assert!(matches!(err, Error::ConfigParse { .. }));
        assert!(err.to_string().contains("bad.toml"));

        let err = Config::from_toml("[[block]]\nicon = \"x\"", Path::new("bad.toml")).unwrap_err();
        assert!(matches!(err, Error::ConfigParse { .. }));
    }

    #[test]
    fn test_load_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[[block]]\ncommand = \"date\"\ninterval = 60").unwrap();

        let (config, path) = Config::discover(Some(file.path())).unwrap();
        assert_eq!(path.as_deref(), Some(file.path()));
        assert_eq!(config.blocks, vec![BlockSpec::new("", "date", 60, 0)]);
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(matches!(
            Config::discover(Some(&missing)),
            Err(Error::ConfigRead { .. })
        ));
    }
}
