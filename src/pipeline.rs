use crate::child::{self, PreparedCommand};
use crate::command::PipelineRequest;
use anyhow::{Context, Result};
use log::{debug, warn};
use nix::fcntl::OFlag;
use nix::sys::wait::WaitStatus;
use nix::unistd::{self, ForkResult};
use std::error::Error;
use std::fmt;

/// Problems detected before anything is forked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineError {
    /// One side of the pipe has no program name.
    NullCommand,
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            PipelineError::NullCommand => write!(f, "invalid null command in pipe"),
        }
    }
}

impl Error for PipelineError {}

/// Termination status of both sides of a finished pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineStatus {
    pub left: WaitStatus,
    pub right: WaitStatus,
}

/// Run `left | right` and wait for both processes.
///
/// Validation and pipe creation happen before the first fork, so a bad
/// request never starts half a pipeline. The parent drops both pipe ends as
/// soon as the two children exist: the reader only sees end-of-file once
/// every copy of the write end is closed.
pub fn run_pipeline(request: &PipelineRequest) -> Result<PipelineStatus> {
    if request.left.is_empty() || request.right.is_empty() {
        return Err(PipelineError::NullCommand.into());
    }
    let left = PreparedCommand::new(&request.left)?;
    let right = PreparedCommand::new(&request.right)?;

    // Close-on-exec keeps stray copies out of unrelated programs; the dup2'd
    // stdio descriptors in the two children do not inherit the flag.
    let (read_end, write_end) = unistd::pipe2(OFlag::O_CLOEXEC).context("pipe")?;

    let writer = match child::fork_child().context("fork")? {
        ForkResult::Child => {
            drop(read_end);
            child::exec_child(&left, None, Some(write_end))
        }
        ForkResult::Parent { child } => child,
    };

    let reader = match child::fork_child() {
        Ok(ForkResult::Child) => {
            drop(write_end);
            child::exec_child(&right, Some(read_end), None)
        }
        Ok(ForkResult::Parent { child }) => child,
        Err(e) => {
            drop(read_end);
            drop(write_end);
            if let Err(wait_err) = child::wait_for(writer) {
                warn!("waitpid {} after failed fork: {}", writer, wait_err);
            }
            return Err(e).context("fork");
        }
    };
    debug!("pipeline started: writer {} reader {}", writer, reader);

    drop(read_end);
    drop(write_end);

    let left = child::wait_for(writer).with_context(|| format!("waitpid {}", writer))?;
    let right = child::wait_for(reader).with_context(|| format!("waitpid {}", reader))?;
    Ok(PipelineStatus { left, right })
}
