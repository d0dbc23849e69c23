#![allow(dead_code)]

use std::path::Path;

use startbench::command::{Command, ShellCommand};

pub use startbench_test_utils::{init_tracing, read_lines, with_timeout};

/// Shell step that appends `line` to `log`.
pub fn append_line(log: &Path, line: &str) -> Command {
    Command::Shell(ShellCommand::new(format!(
        "echo {line} >> '{}'",
        log.display()
    )))
}

pub fn shell(cmd: &str) -> Command {
    Command::Shell(ShellCommand::new(cmd))
}
