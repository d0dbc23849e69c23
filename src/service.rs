// src/service.rs

use std::path::PathBuf;

use tracing::{debug, error, info};

use crate::command::{Command, CommandStatus, ExecContext};
use crate::errors::Result;

/// Overall result of running a [`Service`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceOutcome {
    Success,
    /// Step `step` (0-based) exited with non-zero `code` that its own cleanup
    /// did not cause.
    Failed { step: usize, code: i32 },
    /// Step `step` never printed its readiness marker in time.
    TimedOut { step: usize },
}

impl ServiceOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ServiceOutcome::Success)
    }

    /// Process exit code for this outcome.
    ///
    /// Signal deaths (negative codes) map to `128 + signal` like a shell
    /// does; timeouts use 124 like `timeout(1)`.
    pub fn exit_code(&self) -> i32 {
        match self {
            ServiceOutcome::Success => 0,
            ServiceOutcome::Failed { code, .. } if *code < 0 => 128 - code,
            ServiceOutcome::Failed { code, .. } => *code,
            ServiceOutcome::TimedOut { .. } => 124,
        }
    }
}

/// An ordered, fixed sequence of commands run front to back.
#[derive(Debug, Clone)]
pub struct Service {
    name: String,
    commands: Vec<Command>,
}

impl Service {
    pub fn new(name: impl Into<String>, commands: Vec<Command>) -> Self {
        Self {
            name: name.into(),
            commands,
        }
    }

    /// Service whose first step creates the bind-mount source directories.
    pub fn with_setup(
        name: impl Into<String>,
        mount_sources: Vec<PathBuf>,
        commands: Vec<Command>,
    ) -> Self {
        if mount_sources.is_empty() {
            return Self::new(name, commands);
        }

        let mut all = Vec::with_capacity(commands.len() + 1);
        all.push(Command::EnsureDirs(mount_sources));
        all.extend(commands);
        Self::new(name, all)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Run every command in order, stopping at the first failing step.
    ///
    /// A failing exit code is reported through [`ServiceOutcome`]; `Err` is
    /// reserved for fatal problems (spawn failures, timer misuse, I/O).
    pub async fn run(&self) -> Result<ServiceOutcome> {
        info!(service = %self.name, steps = self.commands.len(), "service starting");
        let ctx = ExecContext::default();

        for (step, command) in self.commands.iter().enumerate() {
            debug!(service = %self.name, step, command = %command, "executing step");

            let status = command.execute(&ctx).await?;
            if !status.is_failure() {
                continue;
            }

            let outcome = match status {
                CommandStatus::TimedOut { after } => {
                    error!(
                        service = %self.name,
                        step,
                        command = %command,
                        timeout_ms = after.as_millis() as u64,
                        "step timed out waiting for readiness"
                    );
                    ServiceOutcome::TimedOut { step }
                }
                CommandStatus::Exited { code, .. } => {
                    error!(
                        service = %self.name,
                        step,
                        command = %command,
                        exit_code = code,
                        "step failed; stopping service"
                    );
                    ServiceOutcome::Failed { step, code }
                }
                CommandStatus::Completed | CommandStatus::Signalled(_) => continue,
            };
            return Ok(outcome);
        }

        info!(service = %self.name, "service finished successfully");
        Ok(ServiceOutcome::Success)
    }
}
