//! Launching block commands in response to bar clicks

use std::io;
use std::os::unix::process::CommandExt;
use std::process::{Command, Stdio};

use crate::blocks::BlockSpec;

/// Environment variable telling a block script which button was pressed
pub const BUTTON_ENV: &str = "BLOCK_BUTTON";

/// Runs a block's command on behalf of a click
pub trait ClickLauncher {
    fn launch(&self, block: &BlockSpec, button: u32) -> io::Result<()>;
}

/// Signal sent back to this process once a click command finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completion {
    pub pid: u32,
    pub signal: i32,
}

/// Shell script for a click: the block command, then the completion notice
pub fn click_script(command: &str, completion: Option<Completion>) -> String {
    match completion {
        Some(Completion { pid, signal }) => format!("{} && kill -{} {}", command, signal, pid),
        None => command.to_string(),
    }
}

/// Build the detached shell invocation for a click on `block`
pub fn click_command(
    shell: &str,
    block: &BlockSpec,
    button: u32,
    completion: Option<Completion>,
) -> Command {
    let mut command = Command::new(shell);
    command
        .arg("-c")
        .arg(click_script(&block.command, completion))
        .env(BUTTON_ENV, button.to_string())
        .stdin(Stdio::null());

    unsafe {
        command.pre_exec(|| {
            if libc::setsid() == -1 {
                return Err(io::Error::last_os_error());
            }
            Ok(())
        });
    }
    command
}

/// Spawns click commands through the shell and never waits for them
///
/// Finished children are reaped by the kernel (`SA_NOCLDWAIT`).
#[derive(Debug, Clone)]
pub struct ShellLauncher {
    shell: String,
    signal_base: i32,
    pid: u32,
}

impl ShellLauncher {
    pub fn new(shell: impl Into<String>, signal_base: i32) -> Self {
        Self {
            shell: shell.into(),
            signal_base,
            pid: std::process::id(),
        }
    }
}

impl ClickLauncher for ShellLauncher {
    fn launch(&self, block: &BlockSpec, button: u32) -> io::Result<()> {
        let completion = Completion {
            pid: self.pid,
            signal: self.signal_base + block.signal as i32,
        };
        let child = click_command(&self.shell, block, button, Some(completion)).spawn()?;
        log::debug!(
            "click {} on `{}` running as pid {}",
            button,
            block.command,
            child.id()
        );
        Ok(())
    }
}
