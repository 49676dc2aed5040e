//! Line tokenizer and pipe splitter.
//!
//! Everything here is pure: no OS calls, no output. Diagnostics are returned
//! as [`ParseError`] values and printed by the caller.

use crate::command::{MAX_ARGS, ParsedCommand, PipelineRequest};
use std::error::Error;
use std::fmt;

const DELIMITERS: &[char] = &[' ', '\t', '\n'];
const PIPE: char = '|';

/// Errors that can occur while turning a raw line into commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// `<` was the last token of the line.
    MissingInputPath,
    /// `>` was the last token of the line.
    MissingOutputPath,
    /// Nothing but whitespace follows the pipe separator.
    MissingPipeTarget,
    /// More than [`MAX_ARGS`] argument tokens.
    TooManyArguments,
    /// A `<` or `>` appeared inside one half of a pipeline.
    RedirectInPipeline,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            ParseError::MissingInputPath => write!(f, "No input file specified after <"),
            ParseError::MissingOutputPath => write!(f, "No output file specified after >"),
            ParseError::MissingPipeTarget => write!(f, "Missing command after pipe"),
            ParseError::TooManyArguments => {
                write!(f, "too many arguments (at most {} allowed)", MAX_ARGS)
            }
            ParseError::RedirectInPipeline => {
                write!(f, "redirection is not supported inside a pipeline")
            }
        }
    }
}

impl Error for ParseError {}

/// Result of tokenizing one command.
///
/// A dangling redirection marker does not discard the work done so far:
/// `command` holds the arguments collected before the marker and `error`
/// says what went wrong.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tokenized {
    pub command: ParsedCommand,
    pub error: Option<ParseError>,
}

impl Tokenized {
    /// Collapse into a `Result`, treating any diagnostic as failure.
    pub fn into_result(self) -> Result<ParsedCommand, ParseError> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.command),
        }
    }
}

/// How a raw line should be executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route<'a> {
    /// No pipe separator: a single command (or a builtin).
    Single(&'a str),
    /// Text before and after the first `|`.
    Pipeline(&'a str, &'a str),
}

/// Split `line` at the first `|`.
///
/// Only the first separator counts; any later `|` stays part of the right
/// half. An empty right half is rejected so that nothing gets spawned.
pub fn split_pipe(line: &str) -> Result<Route<'_>, ParseError> {
    match line.split_once(PIPE) {
        None => Ok(Route::Single(line)),
        Some((_, right)) if right.trim().is_empty() => Err(ParseError::MissingPipeTarget),
        Some((left, right)) => Ok(Route::Pipeline(left, right)),
    }
}

/// Tokenize a single command into arguments and redirection paths.
///
/// Tokens are separated by spaces and tabs; quotes and escapes have no
/// special meaning. A token equal to `<` or `>` consumes the next token as the
/// input or output path. If the marker is the last token, tokenization stops
/// and the partial argument vector is returned along with the diagnostic.
pub fn tokenize(line: &str) -> Tokenized {
    let mut command = ParsedCommand::default();
    let mut tokens = line.split(DELIMITERS).filter(|t| !t.is_empty());

    while let Some(token) = tokens.next() {
        match token {
            "<" => match tokens.next() {
                Some(path) => command.input = Some(path.to_string()),
                None => {
                    return Tokenized {
                        command,
                        error: Some(ParseError::MissingInputPath),
                    };
                }
            },
            ">" => match tokens.next() {
                Some(path) => command.output = Some(path.to_string()),
                None => {
                    return Tokenized {
                        command,
                        error: Some(ParseError::MissingOutputPath),
                    };
                }
            },
            word => {
                if command.args.len() == MAX_ARGS {
                    return Tokenized {
                        command,
                        error: Some(ParseError::TooManyArguments),
                    };
                }
                command.args.push(word.to_string());
            }
        }
    }

    Tokenized {
        command,
        error: None,
    }
}

/// Tokenize a command, failing on any diagnostic.
pub fn parse_command(line: &str) -> Result<ParsedCommand, ParseError> {
    tokenize(line).into_result()
}

/// Tokenize both halves of a pipeline.
///
/// Redirections are not part of the pipeline grammar: the pipe owns the
/// left side's stdout and the right side's stdin, so a `<` or `>` in either
/// half is reported instead of being silently dropped.
pub fn parse_pipeline(left: &str, right: &str) -> Result<PipelineRequest, ParseError> {
    let left = parse_command(left)?;
    let right = parse_command(right)?;
    if left.has_redirection() || right.has_redirection() {
        return Err(ParseError::RedirectInPipeline);
    }
    Ok(PipelineRequest { left, right })
}
