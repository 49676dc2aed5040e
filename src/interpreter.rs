use crate::builtin::{self, Action};
use crate::command::ParsedCommand;
use crate::env::Environment;
use crate::history::{DEFAULT_CAPACITY, History};
use crate::parser::{self, Route};
use crate::pipeline;
use crate::prompt;
use crate::signals;
use crate::spawn::{self, Mode};
use anyhow::Result;
use log::{debug, info, warn};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::io::{self, BufRead, IsTerminal, Write};

/// Knobs the interpreter is built with; see [`crate::config`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub history_capacity: usize,
    pub color: bool,
    pub banner: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            history_capacity: DEFAULT_CAPACITY,
            color: false,
            banner: false,
        }
    }
}

/// Whether the loop keeps going after a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// One attempt to read a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    Line(String),
    /// Ctrl-C while editing the line.
    Interrupted,
    Eof,
}

/// Where input lines come from.
pub trait LineSource {
    /// Show `prompt` and read one line without its trailing newline.
    fn read_line(&mut self, prompt: &str) -> Result<ReadOutcome>;
}

/// Line editor for interactive terminals.
pub struct EditorSource {
    editor: DefaultEditor,
}

impl EditorSource {
    pub fn new() -> Result<Self> {
        Ok(Self {
            editor: DefaultEditor::new()?,
        })
    }
}

impl LineSource for EditorSource {
    fn read_line(&mut self, prompt: &str) -> Result<ReadOutcome> {
        match self.editor.readline(prompt) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    self.editor.add_history_entry(line.as_str())?;
                }
                Ok(ReadOutcome::Line(line))
            }
            Err(ReadlineError::Interrupted) => Ok(ReadOutcome::Interrupted),
            Err(ReadlineError::Eof) => Ok(ReadOutcome::Eof),
            Err(err) => Err(err.into()),
        }
    }
}

/// Plain buffered reader for pipes, files and tests.
pub struct BufferedSource<R, W> {
    reader: R,
    prompt_out: W,
}

impl<R: BufRead, W: Write> BufferedSource<R, W> {
    pub fn new(reader: R, prompt_out: W) -> Self {
        Self { reader, prompt_out }
    }
}

impl<R: BufRead, W: Write> LineSource for BufferedSource<R, W> {
    fn read_line(&mut self, prompt: &str) -> Result<ReadOutcome> {
        write!(self.prompt_out, "{}", prompt)?;
        self.prompt_out.flush()?;

        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Ok(ReadOutcome::Eof);
        }
        if line.ends_with('\n') {
            line.pop();
        }
        Ok(ReadOutcome::Line(line))
    }
}

/// The read-eval loop.
///
/// Owns the [`History`] and the [`Environment`] snapshot. Each line is routed
/// to the pipeline orchestrator, a built-in, or the process spawner.
///
/// Example
/// ```no_run
/// use tinysh::{Interpreter, Settings};
/// let mut sh = Interpreter::new(Settings::default());
/// sh.repl().unwrap();
/// ```
pub struct Interpreter {
    env: Environment,
    history: History,
    settings: Settings,
}

impl Interpreter {
    pub fn new(settings: Settings) -> Self {
        Self {
            env: Environment::new(),
            history: History::with_capacity(settings.history_capacity),
            settings,
        }
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// Current prompt string.
    pub fn prompt(&self) -> String {
        prompt::render(
            &self.env.user(),
            &self.env.current_dir,
            self.env.home().as_deref(),
            self.settings.color,
        )
    }

    /// Run until end of input or `exit`, reading from the terminal when
    /// stdin is one and from a plain buffered reader otherwise.
    pub fn repl(&mut self) -> Result<()> {
        if self.settings.banner {
            print!("{}", prompt::banner(self.settings.color));
        }
        if io::stdin().is_terminal() {
            match EditorSource::new() {
                Ok(mut source) => return self.run(&mut source),
                Err(e) => warn!("line editor unavailable, reading plain lines: {:#}", e),
            }
        }
        let mut source = BufferedSource::new(io::stdin().lock(), io::stdout());
        self.run(&mut source)
    }

    /// Drive the loop with any [`LineSource`].
    pub fn run(&mut self, source: &mut dyn LineSource) -> Result<()> {
        loop {
            let reaped = signals::reap_finished_background();
            if reaped > 0 {
                debug!("reaped {} background children", reaped);
            }

            match source.read_line(&self.prompt())? {
                ReadOutcome::Eof => {
                    println!("\nGoodbye!");
                    info!("end of input");
                    return Ok(());
                }
                ReadOutcome::Interrupted => println!(),
                ReadOutcome::Line(line) => {
                    if self.execute_line(&line) == Flow::Exit {
                        info!("exit requested");
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Interpret one line with the process's stdout and stderr.
    pub fn execute_line(&mut self, line: &str) -> Flow {
        self.execute_line_with_output(line, &mut io::stdout(), &mut io::stderr())
    }

    /// Interpret one line, sending the interpreter's own output to the given
    /// writers. Spawned programs always use the real standard streams.
    pub fn execute_line_with_output(
        &mut self,
        line: &str,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
    ) -> Flow {
        if line.trim().is_empty() {
            return Flow::Continue;
        }
        self.history.push(line);

        match parser::split_pipe(line) {
            Err(e) => {
                let _ = writeln!(stderr, "tinysh: {}", e);
                Flow::Continue
            }
            Ok(Route::Pipeline(left, right)) => {
                let request = match parser::parse_pipeline(left, right) {
                    Ok(request) => request,
                    Err(e) => {
                        let _ = writeln!(stderr, "tinysh: {}", e);
                        return Flow::Continue;
                    }
                };
                let _ = stdout.flush();
                match pipeline::run_pipeline(&request) {
                    Ok(status) => debug!("pipeline finished: {:?}", status),
                    Err(e) => {
                        let _ = writeln!(stderr, "tinysh: {:#}", e);
                    }
                }
                Flow::Continue
            }
            Ok(Route::Single(text)) => match parser::parse_command(text) {
                Err(e) => {
                    let _ = writeln!(stderr, "tinysh: {}", e);
                    Flow::Continue
                }
                Ok(cmd) if cmd.is_empty() => Flow::Continue,
                Ok(cmd) => self.execute_command(cmd, stdout, stderr),
            },
        }
    }

    fn execute_command(
        &mut self,
        mut cmd: ParsedCommand,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
    ) -> Flow {
        let mut ctx = builtin::Context {
            env: &mut self.env,
            history: &self.history,
        };
        match builtin::dispatch(&cmd.args, &mut ctx, stdout, stderr) {
            Some(Action::Exit) => return Flow::Exit,
            Some(Action::Done(code)) => {
                debug!("builtin {:?} returned {}", cmd.program(), code);
                return Flow::Continue;
            }
            None => {}
        }

        let mode = Mode::from_background_flag(cmd.take_background_marker());
        if cmd.is_empty() {
            return Flow::Continue;
        }
        let _ = stdout.flush();
        match spawn::spawn(&cmd, mode, stdout) {
            Ok(spawned) => debug!("{:?}", spawned),
            Err(e) => {
                let _ = writeln!(stderr, "tinysh: {:#}", e);
            }
        }
        Flow::Continue
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::tests::lock_current_dir;
    use std::fs;
    use std::io::Cursor;

    fn run_line(sh: &mut Interpreter, line: &str) -> (Flow, String, String) {
        let mut out = Vec::new();
        let mut err = Vec::new();
        let flow = sh.execute_line_with_output(line, &mut out, &mut err);
        (
            flow,
            String::from_utf8(out).unwrap(),
            String::from_utf8(err).unwrap(),
        )
    }

    #[test]
    fn blank_lines_are_not_recorded() {
        let mut sh = Interpreter::default();
        for line in ["", "   ", "\t \t"] {
            let (flow, out, err) = run_line(&mut sh, line);
            assert_eq!(flow, Flow::Continue);
            assert!(out.is_empty() && err.is_empty());
        }
        assert!(sh.history().is_empty());
    }

    #[test]
    fn non_blank_lines_are_recorded_verbatim() {
        let mut sh = Interpreter::default();
        run_line(&mut sh, "help");
        run_line(&mut sh, "  history  ");
        assert_eq!(
            sh.history().iter().collect::<Vec<_>>(),
            vec!["help", "  history  "]
        );
    }

    #[test]
    fn exit_stops_the_loop() {
        let mut sh = Interpreter::default();
        assert_eq!(run_line(&mut sh, "exit").0, Flow::Exit);
    }

    #[test]
    fn exit_with_a_status_argument_still_stops() {
        let mut sh = Interpreter::default();
        let (flow, _, err) = run_line(&mut sh, "exit 0");
        assert_eq!(flow, Flow::Exit);
        assert_eq!(err, "");
    }

    #[test]
    fn empty_pipe_target_is_reported() {
        let mut sh = Interpreter::default();
        let (flow, _, err) = run_line(&mut sh, "ls |");
        assert_eq!(flow, Flow::Continue);
        assert_eq!(err, "tinysh: Missing command after pipe\n");
        assert_eq!(sh.history().len(), 1);
    }

    #[test]
    fn null_pipe_source_is_reported() {
        let mut sh = Interpreter::default();
        let (_, _, err) = run_line(&mut sh, "| wc");
        assert_eq!(err, "tinysh: invalid null command in pipe\n");
    }

    #[test]
    fn dangling_redirection_aborts_the_line() {
        let mut sh = Interpreter::default();
        let (flow, out, err) = run_line(&mut sh, "echo hi >");
        assert_eq!(flow, Flow::Continue);
        assert!(out.is_empty());
        assert_eq!(err, "tinysh: No output file specified after >\n");
    }

    #[test]
    fn lone_background_marker_runs_nothing() {
        let mut sh = Interpreter::default();
        let (flow, out, err) = run_line(&mut sh, "&");
        assert_eq!(flow, Flow::Continue);
        assert!(out.is_empty() && err.is_empty());
    }

    #[test]
    fn redirected_command_writes_file() {
        let path = std::env::temp_dir().join(format!("tinysh_loop_{}", std::process::id()));
        let mut sh = Interpreter::default();
        let (_, _, err) = run_line(&mut sh, &format!("echo routed > {}", path.display()));
        assert!(err.is_empty(), "stderr: {}", err);
        assert_eq!(fs::read_to_string(&path).unwrap(), "routed\n");
        let _ = fs::remove_file(path);
    }

    #[test]
    fn cd_changes_directory_for_later_commands() {
        let _lock = lock_current_dir();
        let orig = std::env::current_dir().unwrap();
        let tmp = fs::canonicalize(std::env::temp_dir()).unwrap();
        let marker = format!("tinysh_cd_marker_{}", std::process::id());

        let mut sh = Interpreter::default();
        run_line(&mut sh, &format!("cd {}", tmp.display()));
        run_line(&mut sh, &format!("touch {}", marker));
        std::env::set_current_dir(&orig).unwrap();

        assert!(tmp.join(&marker).exists());
        let _ = fs::remove_file(tmp.join(marker));
    }

    #[test]
    fn buffered_source_strips_newline_and_prints_prompt() {
        let mut prompts = Vec::new();
        let mut source = BufferedSource::new(Cursor::new("ls -l\nlast"), &mut prompts);
        assert_eq!(
            source.read_line("> ").unwrap(),
            ReadOutcome::Line("ls -l".into())
        );
        assert_eq!(
            source.read_line("> ").unwrap(),
            ReadOutcome::Line("last".into())
        );
        assert_eq!(source.read_line("> ").unwrap(), ReadOutcome::Eof);
        drop(source);
        assert_eq!(String::from_utf8(prompts).unwrap(), "> > > ");
    }
}
