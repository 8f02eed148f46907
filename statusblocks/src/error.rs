//! Error type shared by the status line library

use std::path::PathBuf;

use crate::blocks::MAX_BLOCKS;

/// Errors raised while configuring or running the status line
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("too many blocks: {0} configured, at most {} supported", MAX_BLOCKS)]
    TooManyBlocks(usize),

    #[error("block {index} has an empty command")]
    EmptyCommand { index: usize },

    #[error("signal {signal} is used by both block {first} and block {second}")]
    DuplicateTrigger {
        signal: u32,
        first: usize,
        second: usize,
    },

    #[error("signal {signal} of block {index} is out of range (at most {max})")]
    TriggerOutOfRange { signal: u32, index: usize, max: u32 },

    #[error("no block is bound to signal {0}")]
    UnknownTrigger(u32),

    #[error("failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("unable to open display: {0}")]
    DisplayUnavailable(String),

    #[error("failed to write status: {0}")]
    Output(#[from] std::io::Error),

    #[error("failed to read config {}: {source}", .path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {}: {source}", .path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("signal base {base} is outside the real-time range {min}..={max}")]
    SignalBaseOutOfRange { base: i32, min: i32, max: i32 },

    #[error("failed to install handler for signal {signal}: {source}")]
    Signal {
        signal: i32,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
