//! Runs block commands and turns their output into slot text

use std::io::{BufRead, BufReader, Read};
use std::process::{Command, Stdio};

use crate::blocks::BlockSpec;
use crate::error::{Error, Result};

/// Shell used when the configuration does not name one
pub const DEFAULT_SHELL: &str = "/bin/sh";

/// Spawns block commands through a shell
#[derive(Debug, Clone)]
pub struct Executor {
    shell: String,
    read_limit: usize,
}

impl Executor {
    /// `read_limit` is the maximum number of bytes kept from a command's
    /// first output line.
    pub fn new(shell: impl Into<String>, read_limit: usize) -> Self {
        Self {
            shell: shell.into(),
            read_limit,
        }
    }

    /// Byte bound for one command, leaving room for the delimiter and the
    /// terminating byte of a `command_length` sized buffer
    pub fn read_limit_for(command_length: usize, delimiter: &str) -> usize {
        command_length.saturating_sub(1 + delimiter.len())
    }

    pub fn read_limit(&self) -> usize {
        self.read_limit
    }

    /// Run `command` and return at most `read_limit` bytes of its first line
    ///
    /// The trailing newline, if it fit in the bound, is part of the result.
    pub fn first_line(&self, command: &str) -> Result<Vec<u8>> {
        let mut child = Command::new(&self.shell)
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .spawn()
            .map_err(|source| Error::Spawn {
                command: command.to_string(),
                source,
            })?;

        let mut line = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            // read_until retries reads interrupted by signal delivery
            let mut reader = BufReader::new(stdout.take(self.read_limit as u64));
            if let Err(e) = reader.read_until(b'\n', &mut line) {
                log::debug!("reading output of `{}` failed: {}", command, e);
            }
        }

        // The pipe is closed here so a chatty command cannot block the wait.
        // With SA_NOCLDWAIT in effect the kernel reaps the child and wait
        // reports ECHILD, which is expected.
        if let Err(e) = child.wait() {
            log::trace!("wait for `{}`: {}", command, e);
        }

        Ok(line)
    }

    /// Run the block's command and build its new slot text
    ///
    /// `Ok(None)` means the command asked for the slot to be left alone.
    pub fn execute(&self, block: &BlockSpec) -> Result<Option<SlotText>> {
        let line = self.first_line(&block.command)?;
        Ok(format_slot(block, &line))
    }
}

/// Rendered content of one block
///
/// Output bytes are kept as the command printed them. They are never decoded,
/// so a multi-byte character cut by the read bound reaches the sink as is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlotText {
    /// Raw trigger id byte used by clickable bars, empty for untriggered blocks
    pub prefix: Vec<u8>,
    /// Icon followed by the command output without newlines
    pub body: Vec<u8>,
}

impl SlotText {
    /// A slot is shown only when it has an icon or output
    pub fn is_visible(&self) -> bool {
        !self.body.is_empty()
    }

    pub fn push_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.prefix);
        out.extend_from_slice(&self.body);
    }
}

/// Whether `line` is the "leave this block alone" sentinel
pub fn is_sentinel(line: &[u8]) -> bool {
    matches!(line.first(), Some(&byte) if byte > 0 && byte < b' ')
}

/// Build slot text for `block` from the first line its command printed
pub fn format_slot(block: &BlockSpec, line: &[u8]) -> Option<SlotText> {
    if is_sentinel(line) {
        return None;
    }

    let line = match line.iter().position(|&byte| byte == 0) {
        Some(nul) => &line[..nul],
        None => line,
    };

    let mut body = Vec::with_capacity(block.icon.len() + line.len());
    body.extend_from_slice(block.icon.as_bytes());
    body.extend(line.iter().copied().filter(|&byte| byte != b'\n'));

    let prefix = match u8::try_from(block.signal) {
        Ok(0) | Err(_) => Vec::new(),
        Ok(signal) => vec![signal],
    };

    Some(SlotText { prefix, body })
}
