//! A small interactive shell.
//!
//! Each input line is either a built-in (`cd`, `exit`, `history`, `help`,
//! `sysinfo`), a single external program with optional `<`/`>` redirections
//! and a trailing `&`, or two programs joined by one `|`. External programs
//! run in forked children that get the default `SIGINT` action back before
//! exec, while the shell itself ignores interrupts apart from printing a
//! newline.
//!
//! The main entry point is [`Interpreter`]. The [`parser`] and [`command`]
//! modules are pure and usable on their own; [`spawn`] and [`pipeline`] do the
//! process work.

mod builtin;
mod child;
pub mod command;
pub mod config;
pub mod env;
pub mod history;
mod interpreter;
pub mod logging;
pub mod parser;
pub mod pipeline;
pub mod prompt;
pub mod signals;
pub mod spawn;
pub mod sysinfo;

pub use interpreter::{
    BufferedSource, EditorSource, Flow, Interpreter, LineSource, ReadOutcome, Settings,
};
