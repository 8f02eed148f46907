//! statusblocks library
//!
//! Builds a status line out of shell command "blocks" and keeps it up to
//! date on a timer, on signal triggers and on bar clicks.

pub mod bar;
pub mod blocks;
pub mod click;
pub mod config;
pub mod error;
pub mod executor;
pub mod paths;
pub mod scheduler;
pub mod signals;
pub mod sink;

pub use bar::{ChangeSet, StatusBar};
pub use blocks::{BlockRegistry, BlockSpec};
pub use config::Config;
pub use error::{Error, Result};
pub use paths::get_config_path;
pub use scheduler::Scheduler;
