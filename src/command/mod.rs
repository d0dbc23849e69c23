// src/command/mod.rs

//! The closed set of benchmark steps.
//!
//! Every step a [`Service`](crate::service::Service) runs is a [`Command`].
//! They share one capability, [`Command::execute`], which returns a
//! [`CommandStatus`]: a process exit code for shell commands, or
//! `Completed` for in-process steps such as timers and sleeps.
//!
//! - [`shell`] holds the shell runner with readiness detection.
//! - [`signal`] delivers signals to the process group being watched.

pub mod shell;
pub mod signal;

use std::fmt;
use std::fs;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::time::Duration;

use nix::sys::signal::Signal;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::timer::TimerHandle;

pub use shell::{Readiness, ShellCommand, Stream};

/// Result of executing a single [`Command`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandStatus {
    /// In-process step finished; there is no exit code.
    Completed,
    /// A shell command was reaped. `ready` is true when its readiness marker
    /// was observed and the cleanup commands ran. `killed_by_cleanup` is true
    /// when the process died from a signal one of those cleanup commands sent.
    Exited {
        code: i32,
        ready: bool,
        killed_by_cleanup: bool,
    },
    /// A signal was delivered to the watched process group.
    Signalled(Signal),
    /// The readiness marker did not appear in time; the process was killed.
    TimedOut { after: Duration },
}

impl CommandStatus {
    /// A step fails when it exits non-zero or times out.
    ///
    /// The only forgiven non-zero status is a death caused by the step's own
    /// cleanup signalling the process group.
    pub fn is_failure(&self) -> bool {
        match self {
            CommandStatus::Completed | CommandStatus::Signalled(_) => false,
            CommandStatus::Exited {
                code,
                killed_by_cleanup,
                ..
            } => *code != 0 && !killed_by_cleanup,
            CommandStatus::TimedOut { .. } => true,
        }
    }
}

/// Context a command is executed in.
///
/// Top-level steps run with the default context. Cleanup commands run with
/// the pid of the shell command whose readiness line triggered them.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecContext {
    watched_pid: Option<u32>,
}

impl ExecContext {
    pub fn watching(pid: Option<u32>) -> Self {
        Self { watched_pid: pid }
    }

    pub fn watched_pid(&self) -> Option<u32> {
        self.watched_pid
    }
}

/// One benchmark step.
#[derive(Debug, Clone)]
pub enum Command {
    Shell(ShellCommand),
    StartTimer(TimerHandle),
    /// Record a sample (the "print timer" step).
    MarkTimer(TimerHandle),
    StopTimer(TimerHandle),
    Sleep(Duration),
    /// Signal the watched process group. Only meaningful as a cleanup step.
    Signal(Signal),
    /// Create directories (bind-mount sources) if they do not exist yet.
    EnsureDirs(Vec<PathBuf>),
}

impl Command {
    /// Run this step to completion.
    ///
    /// Boxed because shell commands execute their cleanup commands, which
    /// makes the future recursive.
    pub fn execute<'a>(
        &'a self,
        ctx: &'a ExecContext,
    ) -> Pin<Box<dyn Future<Output = Result<CommandStatus>> + 'a>> {
        Box::pin(async move {
            match self {
                Command::Shell(shell) => shell.run(ctx).await,
                Command::StartTimer(timer) => {
                    timer.start()?;
                    Ok(CommandStatus::Completed)
                }
                Command::MarkTimer(timer) => {
                    timer.mark()?;
                    Ok(CommandStatus::Completed)
                }
                Command::StopTimer(timer) => {
                    timer.stop()?;
                    Ok(CommandStatus::Completed)
                }
                Command::Sleep(duration) => {
                    debug!(duration_ms = duration.as_millis() as u64, "sleeping");
                    tokio::time::sleep(*duration).await;
                    Ok(CommandStatus::Completed)
                }
                Command::Signal(sig) => match ctx.watched_pid() {
                    Some(pid) => {
                        if signal::signal_group(pid, *sig)? {
                            Ok(CommandStatus::Signalled(*sig))
                        } else {
                            Ok(CommandStatus::Completed)
                        }
                    }
                    None => {
                        warn!(
                            signal = sig.as_str(),
                            "signal step outside a readiness cleanup; nothing to signal"
                        );
                        Ok(CommandStatus::Completed)
                    }
                },
                Command::EnsureDirs(dirs) => {
                    for dir in dirs {
                        fs::create_dir_all(dir)?;
                        debug!(dir = %dir.display(), "ensured directory exists");
                    }
                    Ok(CommandStatus::Completed)
                }
            }
        })
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Shell(shell) => write!(f, "{shell}"),
            Command::StartTimer(timer) => write!(f, "start timer '{}'", timer.id()),
            Command::MarkTimer(timer) => write!(f, "mark timer '{}'", timer.id()),
            Command::StopTimer(timer) => write!(f, "stop timer '{}'", timer.id()),
            Command::Sleep(duration) => write!(f, "sleep {:?}", duration),
            Command::Signal(sig) => write!(f, "signal {}", sig.as_str()),
            Command::EnsureDirs(dirs) => {
                let dirs: Vec<String> = dirs.iter().map(|d| d.display().to_string()).collect();
                write!(f, "ensure dirs [{}]", dirs.join(", "))
            }
        }
    }
}
