use crate::child::{self, PreparedCommand};
use crate::command::ParsedCommand;
use anyhow::{Context, Result};
use log::debug;
use nix::sys::wait::WaitStatus;
use nix::unistd::{ForkResult, Pid};
use std::io::Write;

/// Whether the interpreter waits for a spawned command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Foreground,
    Background,
}

impl Mode {
    pub fn from_background_flag(background: bool) -> Self {
        if background {
            Mode::Background
        } else {
            Mode::Foreground
        }
    }
}

/// What the parent knows after a spawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Spawned {
    /// Foreground child ran to completion.
    Finished(WaitStatus),
    /// Background child left running; nothing else tracks it.
    Detached(Pid),
}

/// Run one external command in a child process.
///
/// The child applies `cmd`'s redirections and execs the program; any failure
/// there is reported by the child itself and ends it with a non-zero status.
/// In the foreground the call blocks until that child terminates. In the
/// background the pid is announced on `stdout` and the call returns at once.
///
/// Errors come only from the parent side: an argument that cannot become a C
/// string, a failed fork, or a failed wait.
pub fn spawn(cmd: &ParsedCommand, mode: Mode, stdout: &mut dyn Write) -> Result<Spawned> {
    let prepared = PreparedCommand::new(cmd)?;

    match child::fork_child().context("fork")? {
        ForkResult::Child => child::exec_child(&prepared, None, None),
        ForkResult::Parent { child } => {
            debug!("spawned {:?} as pid {} ({:?})", cmd.args, child, mode);
            match mode {
                Mode::Foreground => {
                    let status = child::wait_for(child)
                        .with_context(|| format!("waitpid {}", child))?;
                    Ok(Spawned::Finished(status))
                }
                Mode::Background => {
                    writeln!(stdout, "[Running in background] PID: {}", child)?;
                    stdout.flush()?;
                    Ok(Spawned::Detached(child))
                }
            }
        }
    }
}
