use anyhow::{Context, Result};
use log::LevelFilter;
use simplelog::{ColorChoice, ConfigBuilder, TermLogger, TerminalMode, WriteLogger};
use std::fs::OpenOptions;
use std::path::Path;

/// Install the global logger.
///
/// Records go to standard error, or are appended to `file` when one is given.
/// Diagnostics meant for the user are printed directly and do not depend on
/// the level chosen here.
pub fn init(level: LevelFilter, file: Option<&Path>) -> Result<()> {
    let config = ConfigBuilder::new()
        .set_thread_level(LevelFilter::Off)
        .set_target_level(LevelFilter::Off)
        .build();

    match file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("can't open log file {}", path.display()))?;
            WriteLogger::init(level, config, file)
        }
        None => TermLogger::init(level, config, TerminalMode::Stderr, ColorChoice::Auto),
    }
    .context("logger already installed")
}
