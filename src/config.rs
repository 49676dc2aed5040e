use crate::history::DEFAULT_CAPACITY;
use crate::interpreter::Settings;
use argh::FromArgs;
use log::LevelFilter;
use std::io::{self, IsTerminal};
use std::path::PathBuf;

#[derive(FromArgs, Debug)]
/// A small interactive shell: built-ins, one pipe, redirections and background jobs.
pub struct Args {
    #[argh(option, default = "DEFAULT_CAPACITY")]
    /// number of command lines kept for the `history` built-in (default 10)
    pub history_size: usize,

    #[argh(option, default = "LevelFilter::Warn")]
    /// log verbosity: off, error, warn, info, debug or trace (default warn)
    pub log_level: LevelFilter,

    #[argh(option)]
    /// append log records to this file instead of standard error
    pub log_file: Option<PathBuf>,

    #[argh(switch)]
    /// do not print the greeting at startup
    pub no_banner: bool,

    #[argh(switch)]
    /// never color the prompt
    pub no_color: bool,
}

impl Args {
    /// Interpreter settings, taking the terminal into account for colors.
    pub fn settings(&self) -> Settings {
        self.settings_for(io::stdout().is_terminal())
    }

    fn settings_for(&self, stdout_is_terminal: bool) -> Settings {
        Settings {
            history_capacity: self.history_size.max(1),
            color: stdout_is_terminal && !self.no_color,
            banner: !self.no_banner,
        }
    }
}
