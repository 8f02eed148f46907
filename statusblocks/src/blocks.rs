//! Block descriptors and the ordered registry they live in
//!
//! The registry is validated once at startup and never changes afterwards.
//! Block indices are stable and double as bit positions in the change set.

use serde::Deserialize;

use crate::error::{Error, Result};

/// Upper bound on the number of blocks, one bit each in a `u32` change set
pub const MAX_BLOCKS: usize = 32;

/// One status block: an icon plus the shell command producing its text
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BlockSpec {
    /// Text placed in front of the command output
    #[serde(default)]
    pub icon: String,

    /// Command line handed to the shell
    pub command: String,

    /// Refresh interval in seconds, 0 disables timed refreshes
    #[serde(default)]
    pub interval: u64,

    /// Trigger id, 0 means the block cannot be refreshed on demand
    #[serde(default, alias = "trigger")]
    pub signal: u32,
}

impl BlockSpec {
    pub fn new(icon: &str, command: &str, interval: u64, signal: u32) -> Self {
        Self {
            icon: icon.to_string(),
            command: command.to_string(),
            interval,
            signal,
        }
    }

    /// Whether the block runs at `elapsed` seconds into the timer loop
    pub fn is_due(&self, elapsed: u64) -> bool {
        elapsed == 0 || (self.interval != 0 && elapsed % self.interval == 0)
    }
}

/// Fixed, ordered set of blocks
#[derive(Debug, Clone)]
pub struct BlockRegistry {
    blocks: Vec<BlockSpec>,
}

impl BlockRegistry {
    /// Validate `blocks` and build the registry
    ///
    /// `max_signal` is the highest trigger id the platform can deliver.
    pub fn new(blocks: Vec<BlockSpec>, max_signal: u32) -> Result<Self> {
        if blocks.len() > MAX_BLOCKS {
            return Err(Error::TooManyBlocks(blocks.len()));
        }

        for (index, block) in blocks.iter().enumerate() {
            if block.command.trim().is_empty() {
                return Err(Error::EmptyCommand { index });
            }

            if block.signal == 0 {
                continue;
            }

            if block.signal > max_signal {
                return Err(Error::TriggerOutOfRange {
                    signal: block.signal,
                    index,
                    max: max_signal,
                });
            }

            if let Some(first) = blocks[..index]
                .iter()
                .position(|other| other.signal == block.signal)
            {
                return Err(Error::DuplicateTrigger {
                    signal: block.signal,
                    first,
                    second: index,
                });
            }
        }

        Ok(Self { blocks })
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&BlockSpec> {
        self.blocks.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, BlockSpec> {
        self.blocks.iter()
    }

    /// Index of the block bound to trigger `signal`
    pub fn find_by_signal(&self, signal: u32) -> Option<usize> {
        if signal == 0 {
            return None;
        }
        self.blocks.iter().position(|block| block.signal == signal)
    }

    /// Trigger ids in use, in registry order
    pub fn signals(&self) -> impl Iterator<Item = u32> + '_ {
        self.blocks
            .iter()
            .map(|block| block.signal)
            .filter(|&signal| signal != 0)
    }

    /// Indices of the blocks due at `elapsed` seconds
    pub fn due(&self, elapsed: u64) -> impl Iterator<Item = usize> + '_ {
        self.blocks
            .iter()
            .enumerate()
            .filter(move |(_, block)| block.is_due(elapsed))
            .map(|(index, _)| index)
    }

    /// Length in seconds of one scheduler tick
    ///
    /// `None` when no block refreshes on a timer.
    pub fn base_tick(&self) -> Option<u64> {
        self.blocks
            .iter()
            .map(|block| block.interval)
            .filter(|&interval| interval != 0)
            .reduce(gcd)
    }
}

pub fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}
