// src/command/shell.rs

//! Shell command runner with readiness detection.
//!
//! A [`ShellCommand`] spawns `sh -c <cmd>` in its own process group and reads
//! the child's stdout and stderr as one merged line stream. When a readiness
//! marker is configured, the first line containing it triggers the cleanup
//! commands immediately, without waiting for the child to exit. This is what
//! lets a benchmark measure "launch → ready" for servers that never exit on
//! their own.

use std::fmt;
use std::os::unix::process::ExitStatusExt;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use nix::sys::signal::Signal;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdout, Command as ProcessCommand};
use tokio::time::{sleep_until, timeout_at, Instant};
use tracing::{debug, info, warn};

use crate::command::signal::signal_group;
use crate::command::{Command, CommandStatus, ExecContext};
use crate::errors::{BenchError, Result};

/// Environment variable exported to cleanup shell commands, holding the pid
/// (and process group id) of the command being watched.
pub const WATCHED_PID_ENV: &str = "STARTBENCH_WATCHED_PID";

/// How long to keep reading already-buffered output once the child exited.
const DRAIN_GRACE: Duration = Duration::from_millis(250);

/// Readiness marker plus the commands to run once it is observed.
#[derive(Debug, Clone)]
pub struct Readiness {
    wait_for: String,
    cleanup: Vec<Command>,
    timeout: Option<Duration>,
}

impl Readiness {
    pub fn wait_for(&self) -> &str {
        &self.wait_for
    }

    pub fn cleanup(&self) -> &[Command] {
        &self.cleanup
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

#[derive(Debug, Clone)]
pub struct ShellCommand {
    cmd: String,
    readiness: Option<Readiness>,
}

impl ShellCommand {
    /// Plain command: run to completion and report its exit code.
    pub fn new(cmd: impl Into<String>) -> Self {
        Self {
            cmd: cmd.into(),
            readiness: None,
        }
    }

    /// Command that runs `cleanup` as soon as a line containing `wait_for`
    /// shows up in its output.
    pub fn with_readiness(
        cmd: impl Into<String>,
        wait_for: impl Into<String>,
        cleanup: Vec<Command>,
    ) -> Result<Self> {
        let wait_for = wait_for.into();
        if wait_for.is_empty() {
            return Err(BenchError::ConfigError(
                "wait_for must not be empty (it would match every line)".to_string(),
            ));
        }

        Ok(Self {
            cmd: cmd.into(),
            readiness: Some(Readiness {
                wait_for,
                cleanup,
                timeout: None,
            }),
        })
    }

    /// Build from optional parts, enforcing that `wait_for` and
    /// `cleanup_commands` are either both present or both absent.
    pub fn from_parts(
        cmd: impl Into<String>,
        wait_for: Option<String>,
        cleanup_commands: Option<Vec<Command>>,
    ) -> Result<Self> {
        let cmd = cmd.into();
        match (wait_for, cleanup_commands) {
            (None, None) => Ok(Self::new(cmd)),
            (Some(wait_for), Some(cleanup)) => Self::with_readiness(cmd, wait_for, cleanup),
            (Some(_), None) => Err(BenchError::ConfigError(format!(
                "shell command '{cmd}' has wait_for but no cleanup commands"
            ))),
            (None, Some(_)) => Err(BenchError::ConfigError(format!(
                "shell command '{cmd}' has cleanup commands but no wait_for"
            ))),
        }
    }

    /// Give up waiting for the readiness marker after `timeout`.
    pub fn with_ready_timeout(mut self, timeout: Duration) -> Result<Self> {
        match self.readiness.as_mut() {
            Some(readiness) => {
                readiness.timeout = Some(timeout);
                Ok(self)
            }
            None => Err(BenchError::ConfigError(format!(
                "shell command '{}' has a ready timeout but no wait_for",
                self.cmd
            ))),
        }
    }

    pub fn cmd(&self) -> &str {
        &self.cmd
    }

    pub fn readiness(&self) -> Option<&Readiness> {
        self.readiness.as_ref()
    }

    pub(crate) async fn run(&self, ctx: &ExecContext) -> Result<CommandStatus> {
        info!(cmd = %self.cmd, "[run]");
        if let Some(readiness) = &self.readiness {
            info!(wait_for = %readiness.wait_for, "[wait for]");
        }

        let mut child = self.spawn(ctx)?;
        let pid = child.id();
        let mut lines = MergedLines::take_from(&mut child);

        let deadline = self
            .readiness
            .as_ref()
            .and_then(|r| r.timeout)
            .map(|t| Instant::now() + t);

        // Signals delivered by the cleanup, once the marker has been seen.
        let mut cleanup_signals: Option<Vec<Signal>> = None;
        let mut exited: Option<ExitStatus> = None;

        loop {
            let event = tokio::select! {
                biased;
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    Event::TimedOut
                }
                line = lines.next_line() => match line? {
                    Some((stream, line)) => Event::Line(stream, line),
                    None => Event::Eof,
                },
                status = child.wait() => Event::Exited(status?),
            };

            match event {
                Event::Line(stream, line) => {
                    cleanup_signals = self.on_line(stream, &line, pid).await?;
                    if cleanup_signals.is_some() {
                        break;
                    }
                }
                Event::Eof => {
                    debug!(cmd = %self.cmd, "output streams closed");
                    break;
                }
                Event::Exited(status) => {
                    exited = Some(status);
                    cleanup_signals = self.drain_after_exit(&mut lines, pid).await?;
                    break;
                }
                Event::TimedOut => return self.time_out(child, pid).await,
            }
        }

        // Keep the pipes flowing so a child that outlives the readiness line
        // never blocks on a full buffer while we wait for it.
        let cmd = self.cmd.clone();
        tokio::spawn(async move {
            while let Ok(Some((stream, line))) = lines.next_line().await {
                debug!(target: "startbench::output", cmd = %cmd, %stream, "{}", line);
            }
        });

        let status = match exited {
            Some(status) => status,
            None => child.wait().await?,
        };
        let code = exit_code(status);
        let ready = cleanup_signals.is_some();
        let killed_by_cleanup = cleanup_signals
            .as_deref()
            .is_some_and(|sent| killed_by(code, sent));

        info!(
            cmd = %self.cmd,
            exit_code = code,
            ready,
            killed_by_cleanup,
            "shell command finished"
        );
        Ok(CommandStatus::Exited {
            code,
            ready,
            killed_by_cleanup,
        })
    }

    fn spawn(&self, ctx: &ExecContext) -> Result<Child> {
        let mut cmd = ProcessCommand::new("sh");
        cmd.arg("-c")
            .arg(&self.cmd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0)
            .kill_on_drop(true);

        if let Some(pid) = ctx.watched_pid() {
            cmd.env(WATCHED_PID_ENV, pid.to_string());
        }

        cmd.spawn().map_err(|source| BenchError::SpawnError {
            cmd: self.cmd.clone(),
            source,
        })
    }

    /// Log one output line. For the readiness line, run the cleanup commands
    /// and return the signals they delivered.
    async fn on_line(
        &self,
        stream: Stream,
        line: &str,
        pid: Option<u32>,
    ) -> Result<Option<Vec<Signal>>> {
        if line.is_empty() {
            return Ok(None);
        }

        info!(target: "startbench::output", %stream, "{}", line);

        let Some(readiness) = &self.readiness else {
            return Ok(None);
        };
        if !line.contains(readiness.wait_for.as_str()) {
            return Ok(None);
        }

        info!(cmd = %self.cmd, wait_for = %readiness.wait_for, "readiness marker observed");
        run_cleanup(readiness, pid).await.map(Some)
    }

    /// Read whatever the child wrote before exiting, bounded by
    /// [`DRAIN_GRACE`] so a grandchild holding the pipe cannot stall us.
    async fn drain_after_exit(
        &self,
        lines: &mut MergedLines,
        pid: Option<u32>,
    ) -> Result<Option<Vec<Signal>>> {
        let drain_deadline = Instant::now() + DRAIN_GRACE;
        loop {
            match timeout_at(drain_deadline, lines.next_line()).await {
                Ok(Ok(Some((stream, line)))) => {
                    if let Some(sent) = self.on_line(stream, &line, pid).await? {
                        return Ok(Some(sent));
                    }
                }
                Ok(Ok(None)) | Err(_) => return Ok(None),
                Ok(Err(e)) => return Err(e.into()),
            }
        }
    }

    async fn time_out(&self, mut child: Child, pid: Option<u32>) -> Result<CommandStatus> {
        let after = self
            .readiness
            .as_ref()
            .and_then(|r| r.timeout)
            .unwrap_or_default();

        warn!(
            cmd = %self.cmd,
            timeout_ms = after.as_millis() as u64,
            "readiness marker not observed before timeout; killing process group"
        );

        match pid {
            Some(pid) => {
                signal_group(pid, Signal::SIGKILL)?;
            }
            None => child.start_kill()?,
        }
        let status = child.wait().await?;
        debug!(cmd = %self.cmd, exit_code = exit_code(status), "timed-out process reaped");

        Ok(CommandStatus::TimedOut { after })
    }
}

impl fmt::Display for ShellCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "run '{}'", self.cmd)?;
        if let Some(readiness) = &self.readiness {
            write!(f, " until '{}'", readiness.wait_for)?;
        }
        Ok(())
    }
}

async fn run_cleanup(readiness: &Readiness, pid: Option<u32>) -> Result<Vec<Signal>> {
    let ctx = ExecContext::watching(pid);
    let mut sent = Vec::new();
    for command in &readiness.cleanup {
        match command.execute(&ctx).await? {
            CommandStatus::Signalled(sig) => sent.push(sig),
            status if status.is_failure() => {
                warn!(command = %command, ?status, "cleanup command did not succeed");
            }
            _ => {}
        }
    }
    Ok(sent)
}

/// Signals that count as the cleanup stopping the process, once the cleanup
/// has signalled the group at least once.
const STOP_SIGNALS: [Signal; 3] = [Signal::SIGTERM, Signal::SIGINT, Signal::SIGKILL];

/// Whether exit `code` is a death by a signal the cleanup is responsible for.
fn killed_by(code: i32, sent: &[Signal]) -> bool {
    if sent.is_empty() || code >= 0 {
        return false;
    }
    sent.iter()
        .chain(STOP_SIGNALS.iter())
        .any(|sig| *sig as i32 == -code)
}

/// Exit code of a reaped child; a signal-terminated child reports `-signal`.
pub fn exit_code(status: ExitStatus) -> i32 {
    status
        .code()
        .or_else(|| status.signal().map(|sig| -sig))
        .unwrap_or(-1)
}

enum Event {
    Line(Stream, String),
    Eof,
    Exited(ExitStatus),
    TimedOut,
}

/// Which pipe a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stream::Stdout => f.write_str("stdout"),
            Stream::Stderr => f.write_str("stderr"),
        }
    }
}

/// Line reader over one pipe.
///
/// Uses `read_until` with a persistent buffer, so a read cancelled inside
/// `select!` loses nothing, and invalid UTF-8 is replaced instead of failing.
struct LineSource<R> {
    reader: BufReader<R>,
    buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin> LineSource<R> {
    fn new(inner: R) -> Self {
        Self {
            reader: BufReader::new(inner),
            buf: Vec::new(),
        }
    }

    async fn next_line(&mut self) -> std::io::Result<Option<String>> {
        let n = self.reader.read_until(b'\n', &mut self.buf).await?;
        if n == 0 && self.buf.is_empty() {
            return Ok(None);
        }

        let line = String::from_utf8_lossy(&self.buf)
            .trim_end_matches(['\n', '\r'])
            .to_string();
        self.buf.clear();
        Ok(Some(line))
    }
}

/// stdout and stderr of a child, read as one stream of lines.
struct MergedLines {
    stdout: Option<LineSource<ChildStdout>>,
    stderr: Option<LineSource<ChildStderr>>,
}

impl MergedLines {
    fn take_from(child: &mut Child) -> Self {
        Self {
            stdout: child.stdout.take().map(LineSource::new),
            stderr: child.stderr.take().map(LineSource::new),
        }
    }

    /// Next line from whichever pipe has one; `None` once both are closed.
    async fn next_line(&mut self) -> std::io::Result<Option<(Stream, String)>> {
        loop {
            let (stream, line) = match (self.stdout.as_mut(), self.stderr.as_mut()) {
                (None, None) => return Ok(None),
                (Some(out), None) => (Stream::Stdout, out.next_line().await),
                (None, Some(err)) => (Stream::Stderr, err.next_line().await),
                (Some(out), Some(err)) => tokio::select! {
                    line = out.next_line() => (Stream::Stdout, line),
                    line = err.next_line() => (Stream::Stderr, line),
                },
            };

            match line? {
                Some(line) => return Ok(Some((stream, line))),
                None => match stream {
                    Stream::Stdout => self.stdout = None,
                    Stream::Stderr => self.stderr = None,
                },
            }
        }
    }
}
