//! Interrupt handling for the interpreter and its children.
//!
//! The interpreter survives `SIGINT`: its handler only moves the cursor to a
//! fresh line. Children get the default disposition back right after fork
//! (see [`crate::child::fork_child`]) so an interrupt kills a runaway
//! foreground program instead of being swallowed.

use log::{debug, warn};
use nix::errno::Errno;
use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, Signal};
use nix::sys::wait::{self, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;

extern "C" fn on_interrupt(_: libc::c_int) {
    const NEWLINE: &[u8] = b"\n";
    // Only async-signal-safe calls in here.
    unsafe {
        libc::write(libc::STDOUT_FILENO, NEWLINE.as_ptr().cast(), NEWLINE.len());
    }
}

fn set_interrupt_action(handler: SigHandler, flags: SaFlags) -> nix::Result<()> {
    let action = SigAction::new(handler, flags, SigSet::empty());
    // SAFETY: the handler is either SIG_DFL or `on_interrupt`, which touches no
    // Rust state and only calls write(2).
    unsafe { signal::sigaction(Signal::SIGINT, &action) }.map(drop)
}

/// Install the interpreter-wide `SIGINT` handler.
///
/// `SA_RESTART` keeps blocking reads and `waitpid` going after the handler
/// returns.
pub fn install_interrupt_handler() -> nix::Result<()> {
    set_interrupt_action(SigHandler::Handler(on_interrupt), SaFlags::SA_RESTART)
}

/// Put `SIGINT` back to its default action. Called in every forked child.
pub fn restore_default_interrupt() -> nix::Result<()> {
    set_interrupt_action(SigHandler::SigDfl, SaFlags::empty())
}

/// Collect background children that have already exited.
///
/// Never blocks. Meant to run while the interpreter sits at the prompt, when
/// no foreground child is outstanding, so every child it finds was started
/// with `&`. Returns how many were reaped.
pub fn reap_finished_background() -> usize {
    let mut reaped = 0;
    loop {
        match wait::waitpid(Pid::from_raw(-1), Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::StillAlive) | Err(Errno::ECHILD) => break,
            Ok(status) => {
                debug!("reaped background child: {:?}", status);
                reaped += 1;
            }
            Err(Errno::EINTR) => continue,
            Err(e) => {
                warn!("waitpid while reaping background children: {}", e);
                break;
            }
        }
    }
    reaped
}
