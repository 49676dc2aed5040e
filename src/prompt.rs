//! Prompt, banner and help text.

use std::path::Path;

const RESET: &str = "\x1b[0m";
const BOLD_GREEN: &str = "\x1b[1;32m";
const BOLD_BLUE: &str = "\x1b[1;34m";
const BOLD_CYAN: &str = "\x1b[1;36m";

/// Show `cwd` with the home directory abbreviated to `~`.
pub fn display_dir(cwd: &Path, home: Option<&Path>) -> String {
    if let Some(home) = home {
        if let Ok(rest) = cwd.strip_prefix(home) {
            if rest.as_os_str().is_empty() {
                return "~".to_string();
            }
            return format!("~/{}", rest.display());
        }
    }
    cwd.display().to_string()
}

/// Render `user:dir$ `, optionally with ANSI colors.
pub fn render(user: &str, cwd: &Path, home: Option<&Path>, color: bool) -> String {
    let dir = display_dir(cwd, home);
    if color {
        format!("{BOLD_GREEN}{user}{RESET}:{BOLD_BLUE}{dir}{RESET}$ ")
    } else {
        format!("{user}:{dir}$ ")
    }
}

/// Greeting printed once at startup.
pub fn banner(color: bool) -> String {
    let title = concat!("tinysh ", env!("CARGO_PKG_VERSION"));
    let hint = "Type 'help' for built-in commands, 'exit' or Ctrl-D to quit.";
    if color {
        format!("{BOLD_CYAN}{title}{RESET}\n{hint}\n")
    } else {
        format!("{title}\n{hint}\n")
    }
}

pub const HELP: &str = "\
Built-in commands:
  cd [dir]     change directory (default: $HOME)
  history      show the most recent commands
  sysinfo      show host, kernel, CPU, memory and uptime
  help         show this text
  exit         leave the shell

Anything else runs as a program found on $PATH:
  cmd args < in > out     redirect standard input / output
  cmd args &              run in the background
  cmd1 args | cmd2 args   connect two commands with a pipe
";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn home_is_abbreviated() {
        let home = Path::new("/home/alice");
        assert_eq!(display_dir(Path::new("/home/alice"), Some(home)), "~");
        assert_eq!(
            display_dir(Path::new("/home/alice/src/tinysh"), Some(home)),
            "~/src/tinysh"
        );
    }

    #[test]
    fn paths_outside_home_are_unchanged() {
        let home = Path::new("/home/alice");
        assert_eq!(display_dir(Path::new("/tmp"), Some(home)), "/tmp");
        assert_eq!(
            display_dir(Path::new("/home/alice2"), Some(home)),
            "/home/alice2"
        );
        assert_eq!(display_dir(Path::new("/etc"), None), "/etc");
    }

    #[test]
    fn plain_prompt() {
        let p = render("bob", Path::new("/tmp"), None, false);
        assert_eq!(p, "bob:/tmp$ ");
    }

    #[test]
    fn colored_prompt_wraps_parts() {
        let p = render("bob", Path::new("/tmp"), None, true);
        assert!(p.starts_with(BOLD_GREEN));
        assert!(p.contains("bob"));
        assert!(p.ends_with("$ "));
    }

    #[test]
    fn help_lists_every_builtin() {
        for name in ["cd", "history", "sysinfo", "help", "exit"] {
            assert!(HELP.contains(name), "help is missing {}", name);
        }
    }
}
