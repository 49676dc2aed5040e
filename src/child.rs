//! Process plumbing shared by the spawner and the pipeline orchestrator.
//!
//! Everything that runs between `fork` and `exec` lives here. That code never
//! returns to the caller: it either replaces the process image or ends the
//! child with `_exit`.

use crate::command::ParsedCommand;
use crate::signals;
use anyhow::{Context, Result, bail};
use log::debug;
use nix::errno::Errno;
use nix::fcntl::{self, FcntlArg, FdFlag, OFlag};
use nix::sys::stat::Mode;
use nix::sys::wait::{self, WaitStatus};
use nix::unistd::{self, ForkResult, Pid};
use std::ffi::{CStr, CString};
use std::io::{self, Write};
use std::os::fd::{AsRawFd, FromRawFd, IntoRawFd, OwnedFd, RawFd};

/// Exit status of a child whose program could not be found.
pub const STATUS_NOT_FOUND: i32 = 127;
/// Exit status of a child whose program was found but could not be executed.
pub const STATUS_NOT_EXECUTABLE: i32 = 126;
/// Exit status of a child that failed before exec (redirection, signals).
pub const STATUS_SETUP_FAILED: i32 = 1;

/// A [`ParsedCommand`] converted to the C strings `execvp` and `open` need.
///
/// Built in the parent so the child does not have to allocate before exec.
#[derive(Debug)]
pub struct PreparedCommand {
    argv: Vec<CString>,
    input: Option<CString>,
    output: Option<CString>,
}

impl PreparedCommand {
    pub fn new(cmd: &ParsedCommand) -> Result<Self> {
        if cmd.is_empty() {
            bail!("empty command");
        }
        let argv = cmd
            .args
            .iter()
            .map(|a| to_cstring(a))
            .collect::<Result<Vec<_>>>()?;
        let input = cmd.input.as_deref().map(to_cstring).transpose()?;
        let output = cmd.output.as_deref().map(to_cstring).transpose()?;
        Ok(Self {
            argv,
            input,
            output,
        })
    }

    pub fn program(&self) -> &CStr {
        &self.argv[0]
    }
}

fn to_cstring(s: &str) -> Result<CString> {
    CString::new(s).with_context(|| format!("{:?} contains a NUL byte", s))
}

/// Fork, restoring the default `SIGINT` action in the child first thing.
///
/// Pending stdout is flushed beforehand so the child starts with an empty
/// copy of the buffer.
pub fn fork_child() -> nix::Result<ForkResult> {
    let _ = io::stdout().flush();
    // SAFETY: other threads may exist (the test harness does), so the child
    // takes no std locks and does no formatting. It only calls sigaction,
    // open, dup2, fcntl, close, write and execvp before exec or _exit; the one
    // allocation is the pointer array nix builds inside execvp.
    let result = unsafe { unistd::fork() }?;
    if let ForkResult::Child = result {
        if let Err(e) = signals::restore_default_interrupt() {
            fail(&[&b"sigaction: "[..], e.desc().as_bytes()], STATUS_SETUP_FAILED);
        }
    }
    Ok(result)
}

/// Wire the child's standard streams and replace its image.
///
/// `stdin`/`stdout` are pipe ends handed over by the orchestrator; the file
/// redirections of `cmd` are opened here, inside the child, so the parent
/// never holds them.
pub fn exec_child(cmd: &PreparedCommand, stdin: Option<OwnedFd>, stdout: Option<OwnedFd>) -> ! {
    if let Some(fd) = stdin {
        attach(fd, libc::STDIN_FILENO);
    }
    if let Some(fd) = stdout {
        attach(fd, libc::STDOUT_FILENO);
    }
    if let Some(path) = &cmd.output {
        let flags = OFlag::O_WRONLY | OFlag::O_CREAT | OFlag::O_TRUNC;
        attach(open_or_fail(path, flags), libc::STDOUT_FILENO);
    }
    if let Some(path) = &cmd.input {
        attach(open_or_fail(path, OFlag::O_RDONLY), libc::STDIN_FILENO);
    }

    let errno = match unistd::execvp(cmd.program(), &cmd.argv) {
        Ok(never) => match never {},
        Err(errno) => errno,
    };
    let name = cmd.program().to_bytes();
    match errno {
        Errno::ENOENT => fail(&[name, &b": command not found"[..]], STATUS_NOT_FOUND),
        e => fail(&[name, &b": "[..], e.desc().as_bytes()], STATUS_NOT_EXECUTABLE),
    }
}

fn open_or_fail(path: &CStr, flags: OFlag) -> OwnedFd {
    let mode = Mode::from_bits_truncate(0o644);
    match fcntl::open(path, flags, mode) {
        // SAFETY: `open` just returned this descriptor and nothing else owns it.
        Ok(fd) => unsafe { OwnedFd::from_raw_fd(fd) },
        Err(e) => fail(
            &[path.to_bytes(), &b": "[..], e.desc().as_bytes()],
            STATUS_SETUP_FAILED,
        ),
    }
}

/// Duplicate `fd` onto `target` and close the original.
fn attach(fd: OwnedFd, target: RawFd) {
    if fd.as_raw_fd() == target {
        // Already in place; dropping it would close the target.
        let fd = fd.into_raw_fd();
        if let Err(e) = fcntl::fcntl(fd, FcntlArg::F_SETFD(FdFlag::empty())) {
            fail(&[&b"fcntl: "[..], e.desc().as_bytes()], STATUS_SETUP_FAILED);
        }
        return;
    }
    if let Err(e) = unistd::dup2(fd.as_raw_fd(), target) {
        fail(&[&b"dup2: "[..], e.desc().as_bytes()], STATUS_SETUP_FAILED);
    }
}

/// Print `tinysh: <parts>` on stderr and end the child.
///
/// Raw `write` calls only: a thread of the parent may have held the stderr
/// lock or the allocator at fork time.
fn fail(parts: &[&[u8]], status: i32) -> ! {
    write_stderr(b"tinysh: ");
    for part in parts {
        write_stderr(part);
    }
    write_stderr(b"\n");
    // SAFETY: _exit skips atexit handlers and stdio flushing, which belong to
    // the parent's copy of this process.
    unsafe { libc::_exit(status) }
}

fn write_stderr(bytes: &[u8]) {
    // SAFETY: the pointer and length come from a live slice.
    unsafe {
        libc::write(libc::STDERR_FILENO, bytes.as_ptr().cast(), bytes.len());
    }
}

/// Block until `pid` terminates.
pub fn wait_for(pid: Pid) -> nix::Result<WaitStatus> {
    loop {
        match wait::waitpid(pid, None) {
            Ok(status @ (WaitStatus::Exited(..) | WaitStatus::Signaled(..))) => {
                debug!("child finished: {:?}", status);
                return Ok(status);
            }
            Ok(other) => debug!("child {} changed state: {:?}", pid, other),
            Err(Errno::EINTR) => continue,
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prepared_command_keeps_argv_order() {
        let mut cmd = ParsedCommand::new(["ls", "-l", "/tmp"]);
        cmd.output = Some("out.txt".into());
        let prepared = PreparedCommand::new(&cmd).unwrap();
        assert_eq!(prepared.program(), c"ls");
        assert_eq!(prepared.argv.len(), 3);
        assert_eq!(prepared.output.as_deref(), Some(c"out.txt"));
        assert!(prepared.input.is_none());
    }

    #[test]
    fn empty_command_cannot_be_prepared() {
        assert!(PreparedCommand::new(&ParsedCommand::default()).is_err());
    }

    #[test]
    fn nul_byte_is_rejected() {
        let cmd = ParsedCommand::new(["echo", "a\0b"]);
        let err = PreparedCommand::new(&cmd).unwrap_err();
        assert!(err.to_string().contains("NUL"));
    }
}
