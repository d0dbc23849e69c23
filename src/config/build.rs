// src/config/build.rs

//! Turn a validated [`PlanFile`] into runnable commands.
//!
//! Timers are created once per plan and shared by handle between every step
//! that names them, so a `start_timer` and a `mark_timer` nested in a cleanup
//! list drive the same clock.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use crate::command::signal::parse_signal;
use crate::command::{Command, ShellCommand};
use crate::config::model::{PlanFile, StepAction, StepConfig};
use crate::config::validate::parse_duration;
use crate::errors::{BenchError, Result};
use crate::service::Service;
use crate::timer::{Timer, TimerHandle};

/// Create one shared handle per `[timer.<name>]`.
///
/// Relative output paths are resolved against `output_dir` when given.
pub fn build_timers(plan: &PlanFile, output_dir: Option<&Path>) -> BTreeMap<String, TimerHandle> {
    plan.timer
        .iter()
        .map(|(name, cfg)| {
            let timer = match &cfg.output {
                Some(path) => {
                    let path = match output_dir {
                        Some(dir) if path.is_relative() => dir.join(path),
                        _ => path.clone(),
                    };
                    Timer::with_output(name.as_str(), path)
                }
                None => Timer::new(name.as_str()),
            };
            (name.clone(), TimerHandle::new(timer))
        })
        .collect()
}

/// Build the named service, prepending its mount setup step.
pub fn build_service(
    plan: &PlanFile,
    name: &str,
    timers: &BTreeMap<String, TimerHandle>,
) -> Result<Service> {
    let service = plan
        .service
        .get(name)
        .ok_or_else(|| BenchError::ServiceNotFound(name.to_string()))?;

    let default_timeout = plan
        .defaults
        .ready_timeout
        .as_deref()
        .map(parse_duration)
        .transpose()
        .map_err(BenchError::ConfigError)?;

    let builder = StepBuilder {
        timers,
        default_timeout,
    };
    let commands = builder.build_steps(&service.steps)?;

    Ok(Service::with_setup(name, service.mounts.clone(), commands))
}

struct StepBuilder<'a> {
    timers: &'a BTreeMap<String, TimerHandle>,
    default_timeout: Option<Duration>,
}

impl StepBuilder<'_> {
    fn build_steps(&self, steps: &[StepConfig]) -> Result<Vec<Command>> {
        steps.iter().map(|step| self.build_step(step)).collect()
    }

    fn build_step(&self, step: &StepConfig) -> Result<Command> {
        let command = match step.action()? {
            StepAction::Run {
                cmd,
                wait_for,
                cleanup,
                ready_timeout,
            } => {
                let cleanup = cleanup.map(|c| self.build_steps(c)).transpose()?;
                let mut shell = ShellCommand::from_parts(cmd, wait_for.map(String::from), cleanup)?;

                if shell.readiness().is_some() {
                    let timeout = match ready_timeout {
                        Some(t) => Some(parse_duration(t).map_err(BenchError::ConfigError)?),
                        None => self.default_timeout,
                    };
                    if let Some(timeout) = timeout {
                        shell = shell.with_ready_timeout(timeout)?;
                    }
                }
                Command::Shell(shell)
            }
            StepAction::StartTimer(name) => Command::StartTimer(self.timer(name)?),
            StepAction::MarkTimer(name) => Command::MarkTimer(self.timer(name)?),
            StepAction::StopTimer(name) => Command::StopTimer(self.timer(name)?),
            StepAction::Sleep(duration) => {
                Command::Sleep(parse_duration(duration).map_err(BenchError::ConfigError)?)
            }
            StepAction::Signal(signal) => Command::Signal(parse_signal(signal)?),
        };
        Ok(command)
    }

    fn timer(&self, name: &str) -> Result<TimerHandle> {
        self.timers
            .get(name)
            .cloned()
            .ok_or_else(|| BenchError::ConfigError(format!("unknown timer '{name}'")))
    }
}
