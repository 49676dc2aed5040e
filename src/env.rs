use std::collections::HashMap;
use std::env as stdenv;
use std::path::PathBuf;

/// User-level view of the process environment used by the interpreter.
///
/// The environment contains:
/// - `vars`: variables captured at startup (HOME and USER are the ones read).
/// - `current_dir`: the working directory shown in the prompt.
///
/// Children inherit the real process environment and working directory; this
/// value only mirrors them for lookups and display.
#[derive(Debug, Clone)]
pub struct Environment {
    pub vars: HashMap<String, String>,
    pub current_dir: PathBuf,
}

impl Environment {
    /// Capture the current process state.
    pub fn new() -> Self {
        let vars = stdenv::vars().collect();
        let current_dir = stdenv::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self { vars, current_dir }
    }

    /// Get the value of an environment variable.
    ///
    /// Looks up the key in `self.vars` first, falling back to `std::env::var`.
    pub fn get_var(&self, key: &str) -> Option<String> {
        self.vars
            .get(key)
            .cloned()
            .or_else(|| stdenv::var(key).ok())
    }

    /// Set or override a variable in `self.vars`.
    pub fn set_var(&mut self, key: impl Into<String>, val: impl Into<String>) {
        self.vars.insert(key.into(), val.into());
    }

    /// Home directory, ignoring an empty `HOME`.
    pub fn home(&self) -> Option<PathBuf> {
        self.get_var("HOME")
            .filter(|h| !h.is_empty())
            .map(PathBuf::from)
    }

    /// Login name for the prompt.
    pub fn user(&self) -> String {
        self.get_var("USER").unwrap_or_else(|| "user".to_string())
    }

    /// Re-read the working directory after it was changed.
    pub fn refresh_current_dir(&mut self) {
        if let Ok(dir) = stdenv::current_dir() {
            self.current_dir = dir;
        }
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}
