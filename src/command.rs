/// Conventional process exit code type used by this crate.
///
/// A value of 0 indicates success; any non-zero value indicates failure.
/// This mirrors the convention used by POSIX shells and many command-line tools.
pub type ExitCode = i32;

/// Upper bound on the number of argument tokens a single command may carry.
pub const MAX_ARGS: usize = 64;

/// Literal token that requests background execution when it ends a command.
pub const BACKGROUND_MARKER: &str = "&";

/// One simple command as produced by the tokenizer.
///
/// `args[0]` is the program name. Redirection paths are kept apart from the
/// argument vector and are applied by the child process right before exec.
/// The value owns no OS resources and is dropped after execution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedCommand {
    /// Program name followed by its arguments.
    pub args: Vec<String>,
    /// Path given after `<`.
    pub input: Option<String>,
    /// Path given after `>`.
    pub output: Option<String>,
}

impl ParsedCommand {
    /// Build a command without redirections.
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
            input: None,
            output: None,
        }
    }

    /// The program to run, if any token was collected.
    pub fn program(&self) -> Option<&str> {
        self.args.first().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    pub fn has_redirection(&self) -> bool {
        self.input.is_some() || self.output.is_some()
    }

    /// Strip a trailing `&` from the argument vector.
    ///
    /// Returns `true` when the marker was present, i.e. the command should run
    /// in the background.
    pub fn take_background_marker(&mut self) -> bool {
        if self.args.last().map(String::as_str) == Some(BACKGROUND_MARKER) {
            self.args.pop();
            true
        } else {
            false
        }
    }
}

/// Two commands joined by a single pipe: `left`'s stdout feeds `right`'s stdin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineRequest {
    pub left: ParsedCommand,
    pub right: ParsedCommand,
}
