// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::errors::{BenchError, Result};

/// Benchmark plan exactly as read from TOML.
///
/// ```toml
/// [defaults]
/// ready_timeout = "120s"
///
/// [timer.starlight]
/// output = "results/starlight.csv"
///
/// [service.redis]
/// mounts = ["/tmp/test-redis-data"]
/// steps = [
///   { start_timer = "starlight" },
///   { run = "sudo ctr task start instance",
///     wait_for = "Ready to accept connections",
///     cleanup = [{ mark_timer = "starlight" }, { signal = "INT" }] },
///   { stop_timer = "starlight" },
/// ]
/// ```
///
/// All sections are optional at the parsing stage; [`PlanFile`] is the
/// validated form the rest of the crate works with.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawPlanFile {
    #[serde(default)]
    pub defaults: DefaultsSection,

    /// Timers from `[timer.<name>]`, keyed by name.
    #[serde(default)]
    pub timer: BTreeMap<String, TimerConfig>,

    /// Services from `[service.<name>]`, keyed by name.
    #[serde(default)]
    pub service: BTreeMap<String, ServiceConfig>,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct DefaultsSection {
    /// Readiness timeout applied to every `run` step with a `wait_for` that
    /// does not set its own. No timeout when absent.
    #[serde(default)]
    pub ready_timeout: Option<String>,
}

/// `[timer.<name>]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct TimerConfig {
    /// Append-only CSV log for this timer's marks.
    #[serde(default)]
    pub output: Option<PathBuf>,
}

/// `[service.<name>]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ServiceConfig {
    /// Bind-mount source directories created before the first step.
    #[serde(default)]
    pub mounts: Vec<PathBuf>,

    pub steps: Vec<StepConfig>,
}

/// One entry of a `steps` (or `cleanup`) list.
///
/// Exactly one action key must be set. `wait_for`, `cleanup` and
/// `ready_timeout` only go with `run`.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct StepConfig {
    #[serde(default)]
    pub run: Option<String>,

    #[serde(default)]
    pub wait_for: Option<String>,

    #[serde(default)]
    pub cleanup: Option<Vec<StepConfig>>,

    #[serde(default)]
    pub ready_timeout: Option<String>,

    #[serde(default)]
    pub start_timer: Option<String>,

    #[serde(default, alias = "print_timer")]
    pub mark_timer: Option<String>,

    #[serde(default)]
    pub stop_timer: Option<String>,

    /// Duration string such as `"5s"` or `"250ms"`.
    #[serde(default)]
    pub sleep: Option<String>,

    /// Signal name (`"TERM"`, `"SIGINT"`) or number.
    #[serde(default)]
    pub signal: Option<String>,
}

/// The single action a [`StepConfig`] describes.
#[derive(Debug, Clone, Copy)]
pub enum StepAction<'a> {
    Run {
        cmd: &'a str,
        wait_for: Option<&'a str>,
        cleanup: Option<&'a [StepConfig]>,
        ready_timeout: Option<&'a str>,
    },
    StartTimer(&'a str),
    MarkTimer(&'a str),
    StopTimer(&'a str),
    Sleep(&'a str),
    Signal(&'a str),
}

impl StepConfig {
    /// Resolve which action this step performs.
    pub fn action(&self) -> Result<StepAction<'_>> {
        let mut actions = Vec::new();
        if let Some(cmd) = &self.run {
            actions.push(StepAction::Run {
                cmd,
                wait_for: self.wait_for.as_deref(),
                cleanup: self.cleanup.as_deref(),
                ready_timeout: self.ready_timeout.as_deref(),
            });
        }
        if let Some(t) = &self.start_timer {
            actions.push(StepAction::StartTimer(t));
        }
        if let Some(t) = &self.mark_timer {
            actions.push(StepAction::MarkTimer(t));
        }
        if let Some(t) = &self.stop_timer {
            actions.push(StepAction::StopTimer(t));
        }
        if let Some(d) = &self.sleep {
            actions.push(StepAction::Sleep(d));
        }
        if let Some(s) = &self.signal {
            actions.push(StepAction::Signal(s));
        }

        if actions.len() != 1 {
            return Err(BenchError::ConfigError(format!(
                "step must have exactly one of run, start_timer, mark_timer, stop_timer, sleep, signal (found {})",
                actions.len()
            )));
        }

        let action = actions[0];
        let has_run_options =
            self.wait_for.is_some() || self.cleanup.is_some() || self.ready_timeout.is_some();
        if has_run_options && !matches!(action, StepAction::Run { .. }) {
            return Err(BenchError::ConfigError(
                "wait_for, cleanup and ready_timeout are only allowed on run steps".to_string(),
            ));
        }

        Ok(action)
    }
}

/// A validated benchmark plan.
///
/// Construct via `PlanFile::try_from(raw)` or
/// [`load_and_validate`](crate::config::load_and_validate).
#[derive(Debug, Clone)]
pub struct PlanFile {
    pub defaults: DefaultsSection,
    pub timer: BTreeMap<String, TimerConfig>,
    pub service: BTreeMap<String, ServiceConfig>,
}

impl TryFrom<RawPlanFile> for PlanFile {
    type Error = BenchError;

    fn try_from(raw: RawPlanFile) -> Result<Self> {
        crate::config::validate::validate_plan(&raw)?;
        Ok(PlanFile {
            defaults: raw.defaults,
            timer: raw.timer,
            service: raw.service,
        })
    }
}

impl PlanFile {
    /// Pick the service to run.
    ///
    /// With no name given, a plan with exactly one service selects it.
    pub fn resolve_service_name<'a>(&'a self, requested: Option<&'a str>) -> Result<&'a str> {
        match requested {
            Some(name) if self.service.contains_key(name) => Ok(name),
            Some(name) => Err(BenchError::ServiceNotFound(format!(
                "no service named '{name}' (available: {})",
                self.service_names().join(", ")
            ))),
            None if self.service.len() == 1 => Ok(self
                .service
                .keys()
                .next()
                .map(String::as_str)
                .unwrap_or_default()),
            None => Err(BenchError::ServiceNotFound(format!(
                "plan defines several services; pick one of: {}",
                self.service_names().join(", ")
            ))),
        }
    }

    pub fn service_names(&self) -> Vec<&str> {
        self.service.keys().map(String::as_str).collect()
    }
}
