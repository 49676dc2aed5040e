use crate::command::ExitCode;
use crate::env::Environment;
use crate::history::History;
use crate::prompt;
use crate::sysinfo::SystemInfo;
use anyhow::{Context as _, Result, anyhow};
use argh::{EarlyExit, FromArgs};
use std::env;
use std::io::Write;
use std::path::PathBuf;

/// State a built-in may read or change.
pub struct Context<'a> {
    pub env: &'a mut Environment,
    pub history: &'a History,
}

/// What the loop should do after a built-in ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Keep reading lines.
    Done(ExitCode),
    /// Leave the interpreter with status 0.
    Exit,
}

/// Built-in commands known to the shell at compile time.
///
/// Builtins are parsed using the [`argh`] crate (`FromArgs`) and executed directly
/// in-process without spawning a child process.
pub(crate) trait BuiltinCommand: Sized + FromArgs {
    /// Canonical name of the command, e.g. "cd".
    fn name() -> &'static str;

    /// Executes the command, writing regular output to `stdout`.
    ///
    /// An `Err` is a diagnostic for the user; it never ends the interpreter.
    fn execute(self, ctx: &mut Context<'_>, stdout: &mut dyn Write) -> Result<Action>;
}

/// Run `args` as a built-in if its first word names one.
///
/// Returns `None` when it is not a built-in, in which case the caller spawns a
/// process. Diagnostics and argh usage errors go to `stderr`.
pub fn dispatch(
    args: &[String],
    ctx: &mut Context<'_>,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
) -> Option<Action> {
    let (name, rest) = args.split_first()?;
    let rest: Vec<&str> = rest.iter().map(String::as_str).collect();
    let action = match name.as_str() {
        "exit" => run::<Exit>(&rest, ctx, stdout, stderr),
        "cd" => run::<Cd>(&rest, ctx, stdout, stderr),
        "history" => run::<HistoryCmd>(&rest, ctx, stdout, stderr),
        "help" => run::<Help>(&rest, ctx, stdout, stderr),
        "sysinfo" => run::<Sysinfo>(&rest, ctx, stdout, stderr),
        _ => return None,
    };
    Some(action)
}

fn run<T: BuiltinCommand>(
    args: &[&str],
    ctx: &mut Context<'_>,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
) -> Action {
    let cmd = match T::from_args(&[T::name()], args) {
        Ok(cmd) => cmd,
        Err(EarlyExit { output, status }) => {
            return match status {
                Ok(()) => {
                    let _ = write!(stdout, "{}", output);
                    Action::Done(0)
                }
                Err(()) => {
                    let _ = write!(stderr, "{}", output);
                    Action::Done(1)
                }
            };
        }
    };
    match cmd.execute(ctx, stdout) {
        Ok(action) => action,
        Err(e) => {
            let _ = writeln!(stderr, "{:#}", e);
            Action::Done(1)
        }
    }
}

#[derive(FromArgs)]
/// Leave the shell.
pub struct Exit {
    #[argh(positional, greedy)]
    /// ignored; the shell always leaves with status 0
    pub _args: Vec<String>,
}

impl BuiltinCommand for Exit {
    fn name() -> &'static str {
        "exit"
    }

    fn execute(self, _ctx: &mut Context<'_>, _stdout: &mut dyn Write) -> Result<Action> {
        Ok(Action::Exit)
    }
}

#[derive(FromArgs)]
/// Change the current working directory.
/// If no target is provided, changes to the directory specified by the HOME environment variable.
pub struct Cd {
    #[argh(positional, greedy)]
    /// directory to switch to; absolute or relative to the current directory. Defaults to $HOME when omitted. Words after the first are ignored.
    pub args: Vec<String>,
}

impl BuiltinCommand for Cd {
    fn name() -> &'static str {
        "cd"
    }

    fn execute(self, ctx: &mut Context<'_>, _stdout: &mut dyn Write) -> Result<Action> {
        let target = match self.args.into_iter().next() {
            Some(t) if !t.is_empty() => PathBuf::from(t),
            _ => ctx
                .env
                .home()
                .ok_or_else(|| anyhow!("cd: HOME not set"))?,
        };

        env::set_current_dir(&target).with_context(|| format!("cd: {}", target.display()))?;
        ctx.env.refresh_current_dir();
        Ok(Action::Done(0))
    }
}

#[derive(FromArgs)]
/// Show the most recent command lines, oldest first.
pub struct HistoryCmd {}

impl BuiltinCommand for HistoryCmd {
    fn name() -> &'static str {
        "history"
    }

    fn execute(self, ctx: &mut Context<'_>, stdout: &mut dyn Write) -> Result<Action> {
        ctx.history.write_to(stdout)?;
        Ok(Action::Done(0))
    }
}

#[derive(FromArgs)]
/// Describe the built-in commands and the line syntax.
pub struct Help {}

impl BuiltinCommand for Help {
    fn name() -> &'static str {
        "help"
    }

    fn execute(self, _ctx: &mut Context<'_>, stdout: &mut dyn Write) -> Result<Action> {
        stdout.write_all(prompt::HELP.as_bytes())?;
        Ok(Action::Done(0))
    }
}

#[derive(FromArgs)]
/// Print a short summary of this machine.
pub struct Sysinfo {}

impl BuiltinCommand for Sysinfo {
    fn name() -> &'static str {
        "sysinfo"
    }

    fn execute(self, _ctx: &mut Context<'_>, stdout: &mut dyn Write) -> Result<Action> {
        SystemInfo::collect().write_to(stdout)?;
        Ok(Action::Done(0))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::env as stdenv;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, MutexGuard, OnceLock};
    use std::time::{SystemTime, UNIX_EPOCH};

    /// Serialises tests that touch the process working directory.
    pub(crate) fn lock_current_dir() -> MutexGuard<'static, ()> {
        static MUTEX: OnceLock<Mutex<()>> = OnceLock::new();
        MUTEX
            .get_or_init(|| Mutex::new(()))
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn test_env() -> Environment {
        Environment {
            vars: HashMap::new(),
            current_dir: stdenv::current_dir().unwrap(),
        }
    }

    fn make_unique_temp_dir() -> io::Result<PathBuf> {
        let mut p = stdenv::temp_dir();
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        p.push(format!("tinysh_test_cd_{}_{}", std::process::id(), nanos));
        fs::create_dir_all(&p)?;
        Ok(p)
    }

    fn words(line: &str) -> Vec<String> {
        line.split_whitespace().map(String::from).collect()
    }

    fn run_line(line: &str, env: &mut Environment, history: &History) -> (Option<Action>, String, String) {
        let mut ctx = Context { env, history };
        let mut out = Vec::new();
        let mut err = Vec::new();
        let action = dispatch(&words(line), &mut ctx, &mut out, &mut err);
        (
            action,
            String::from_utf8(out).unwrap(),
            String::from_utf8(err).unwrap(),
        )
    }

    #[test]
    fn test_unknown_name_is_not_builtin() {
        let mut env = test_env();
        let (action, out, err) = run_line("ls -l", &mut env, &History::default());
        assert_eq!(action, None);
        assert!(out.is_empty() && err.is_empty());
    }

    #[test]
    fn test_names_are_case_sensitive() {
        let mut env = test_env();
        let (action, _, _) = run_line("EXIT", &mut env, &History::default());
        assert_eq!(action, None);
    }

    #[test]
    fn test_exit_requests_exit() {
        let mut env = test_env();
        let (action, _, _) = run_line("exit", &mut env, &History::default());
        assert_eq!(action, Some(Action::Exit));
    }

    #[test]
    fn test_exit_ignores_arguments() {
        let mut env = test_env();
        for line in ["exit 0", "exit 3 extra", "exit &"] {
            let (action, _, err) = run_line(line, &mut env, &History::default());
            assert_eq!(action, Some(Action::Exit), "line: {}", line);
            assert!(err.is_empty(), "stderr: {}", err);
        }
    }

    #[test]
    fn test_cd_ignores_trailing_arguments() {
        let _lock = lock_current_dir();
        let temp = make_unique_temp_dir().expect("failed to create temp dir");
        let canonical_temp = fs::canonicalize(&temp).expect("canonicalize failed");
        let orig = stdenv::current_dir().unwrap();

        let mut env = test_env();
        let line = format!("cd {} extra &", canonical_temp.display());
        let (action, _, err) = run_line(&line, &mut env, &History::default());

        assert_eq!(action, Some(Action::Done(0)), "stderr: {}", err);
        let new_cwd = fs::canonicalize(stdenv::current_dir().unwrap()).unwrap();
        assert_eq!(new_cwd, canonical_temp);

        stdenv::set_current_dir(orig).expect("failed to restore cwd");
        let _ = fs::remove_dir_all(&temp);
    }

    #[test]
    fn test_cd_to_absolute_path() {
        let _lock = lock_current_dir();
        let temp = make_unique_temp_dir().expect("failed to create temp dir");
        let canonical_temp = fs::canonicalize(&temp).expect("canonicalize failed");
        let orig = stdenv::current_dir().unwrap();

        let mut env = test_env();
        let line = format!("cd {}", canonical_temp.display());
        let (action, _, err) = run_line(&line, &mut env, &History::default());

        assert_eq!(action, Some(Action::Done(0)), "stderr: {}", err);
        let new_cwd = fs::canonicalize(stdenv::current_dir().unwrap()).unwrap();
        assert_eq!(new_cwd, canonical_temp);
        assert_eq!(fs::canonicalize(&env.current_dir).unwrap(), canonical_temp);

        stdenv::set_current_dir(orig).expect("failed to restore cwd");
        let _ = fs::remove_dir_all(&temp);
    }

    #[test]
    fn test_cd_to_home_when_none() {
        let _lock = lock_current_dir();
        let temp = make_unique_temp_dir().expect("failed to create temp dir");
        let canonical_temp = fs::canonicalize(&temp).expect("canonicalize failed");
        let orig = stdenv::current_dir().unwrap();

        let mut env = test_env();
        env.set_var("HOME", canonical_temp.to_string_lossy().to_string());
        let (action, _, _) = run_line("cd", &mut env, &History::default());

        assert_eq!(action, Some(Action::Done(0)));
        let new_cwd = fs::canonicalize(stdenv::current_dir().unwrap()).unwrap();
        assert_eq!(new_cwd, canonical_temp);

        stdenv::set_current_dir(orig).expect("failed to restore cwd");
        let _ = fs::remove_dir_all(&temp);
    }

    #[test]
    fn test_cd_nonexistent_path_reports_and_stays() {
        let _lock = lock_current_dir();
        let orig = stdenv::current_dir().unwrap();

        let mut env = test_env();
        let target = format!("/nonexistent_dir_for_tinysh_test_{}", std::process::id());
        let (action, _, err) = run_line(&format!("cd {}", target), &mut env, &History::default());

        assert_eq!(action, Some(Action::Done(1)));
        assert!(err.starts_with(&format!("cd: {}", target)), "stderr: {}", err);
        assert_eq!(stdenv::current_dir().unwrap(), orig);
    }

    #[test]
    fn test_history_lists_entries() {
        let mut env = test_env();
        let mut history = History::default();
        history.push("echo one");
        history.push("history");
        let (action, out, _) = run_line("history", &mut env, &history);
        assert_eq!(action, Some(Action::Done(0)));
        assert_eq!(out, "   1  echo one\n   2  history\n");
    }

    #[test]
    fn test_help_prints_help_text() {
        let mut env = test_env();
        let (action, out, _) = run_line("help", &mut env, &History::default());
        assert_eq!(action, Some(Action::Done(0)));
        assert_eq!(out, prompt::HELP);
    }

    #[test]
    fn test_sysinfo_never_fails() {
        let mut env = test_env();
        let (action, _, err) = run_line("sysinfo", &mut env, &History::default());
        assert_eq!(action, Some(Action::Done(0)));
        assert!(err.is_empty());
    }

    #[test]
    fn test_usage_error_is_handled() {
        let mut env = test_env();
        let (action, out, err) = run_line("history --bogus", &mut env, &History::default());
        assert_eq!(action, Some(Action::Done(1)));
        assert!(out.is_empty());
        assert!(!err.is_empty());
    }
}
