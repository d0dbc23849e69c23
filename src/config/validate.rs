// src/config/validate.rs

use std::collections::BTreeMap;
use std::time::Duration;

use crate::command::signal::parse_signal;
use crate::config::model::{RawPlanFile, StepAction, StepConfig, TimerConfig};
use crate::errors::{BenchError, Result};

/// Run semantic validation against a freshly parsed plan.
///
/// This checks:
/// - there is at least one service, and each has at least one step
/// - `[defaults].ready_timeout` parses
/// - timer names are usable as the first column of the timer log
/// - every step has exactly one action and only `run` carries run options
/// - `wait_for` and `cleanup` appear together, and `wait_for` is not empty
/// - timers referenced by steps are declared
/// - durations and signal names parse
/// - `signal` steps only appear inside a `cleanup` list
pub fn validate_plan(plan: &RawPlanFile) -> Result<()> {
    ensure_has_services(plan)?;
    if let Some(ref timeout) = plan.defaults.ready_timeout {
        parse_duration(timeout).map_err(|e| config_err(format!("[defaults].ready_timeout: {e}")))?;
    }
    validate_timer_names(&plan.timer)?;

    for (name, service) in plan.service.iter() {
        if service.steps.is_empty() {
            return Err(config_err(format!("service '{name}' has no steps")));
        }
        validate_steps(name, &service.steps, &plan.timer, false)?;
    }
    Ok(())
}

fn ensure_has_services(plan: &RawPlanFile) -> Result<()> {
    if plan.service.is_empty() {
        return Err(config_err(
            "plan must contain at least one [service.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_timer_names(timers: &BTreeMap<String, TimerConfig>) -> Result<()> {
    for name in timers.keys() {
        if name.is_empty() || name.contains([',', '\n', '\r']) {
            return Err(config_err(format!(
                "timer name {name:?} must be non-empty and contain no commas or newlines"
            )));
        }
    }
    Ok(())
}

fn validate_steps(
    service: &str,
    steps: &[StepConfig],
    timers: &BTreeMap<String, TimerConfig>,
    in_cleanup: bool,
) -> Result<()> {
    for (idx, step) in steps.iter().enumerate() {
        let at = || {
            if in_cleanup {
                format!("service '{service}', cleanup step {idx}")
            } else {
                format!("service '{service}', step {idx}")
            }
        };

        let action = step
            .action()
            .map_err(|e| config_err(format!("{}: {}", at(), strip_prefix(e))))?;

        match action {
            StepAction::Run {
                cmd,
                wait_for,
                cleanup,
                ready_timeout,
            } => {
                if cmd.trim().is_empty() {
                    return Err(config_err(format!("{}: run command is empty", at())));
                }
                match (wait_for, cleanup) {
                    (Some(""), _) => {
                        return Err(config_err(format!("{}: wait_for must not be empty", at())));
                    }
                    (Some(_), Some(cleanup)) => {
                        validate_steps(service, cleanup, timers, true)?;
                    }
                    (None, None) => {}
                    (Some(_), None) => {
                        return Err(config_err(format!(
                            "{}: wait_for requires a cleanup list",
                            at()
                        )));
                    }
                    (None, Some(_)) => {
                        return Err(config_err(format!(
                            "{}: cleanup requires wait_for",
                            at()
                        )));
                    }
                }
                if let Some(timeout) = ready_timeout {
                    if wait_for.is_none() {
                        return Err(config_err(format!(
                            "{}: ready_timeout requires wait_for",
                            at()
                        )));
                    }
                    parse_duration(timeout)
                        .map_err(|e| config_err(format!("{}: ready_timeout: {e}", at())))?;
                }
            }
            StepAction::StartTimer(timer)
            | StepAction::MarkTimer(timer)
            | StepAction::StopTimer(timer) => {
                if !timers.contains_key(timer) {
                    return Err(config_err(format!(
                        "{}: unknown timer '{timer}' (declare it as [timer.{timer}])",
                        at()
                    )));
                }
            }
            StepAction::Sleep(duration) => {
                parse_duration(duration).map_err(|e| config_err(format!("{}: sleep: {e}", at())))?;
            }
            StepAction::Signal(signal) => {
                if !in_cleanup {
                    return Err(config_err(format!(
                        "{}: signal steps are only allowed inside a cleanup list",
                        at()
                    )));
                }
                parse_signal(signal).map_err(|e| config_err(format!("{}: {}", at(), strip_prefix(e))))?;
            }
        }
    }
    Ok(())
}

/// Parse a simple duration string like `"3s"`, `"250ms"`, `"1m"`, `"2h"`.
///
/// Seconds may be fractional (`"1.5s"`).
pub fn parse_duration(s: &str) -> std::result::Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    // Find the boundary between the number and the unit suffix.
    let idx = s
        .chars()
        .position(|c| !(c.is_ascii_digit() || c == '.'))
        .ok_or_else(|| "duration missing unit suffix".to_string())?;

    let (num_part, unit_part) = s.split_at(idx);
    let unit = unit_part.trim().to_lowercase();

    if unit == "s" {
        let secs: f64 = num_part
            .parse()
            .map_err(|e| format!("invalid duration number '{}': {}", num_part, e))?;
        return Duration::try_from_secs_f64(secs)
            .map_err(|e| format!("invalid duration '{}': {}", s, e));
    }

    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{}': {}", num_part, e))?;

    let secs_per_unit = match unit.as_str() {
        "ms" => return Ok(Duration::from_millis(value)),
        "m" => 60,
        "h" => 60 * 60,
        _ => {
            return Err(format!(
                "unsupported duration unit '{}'; expected ms, s, m, or h",
                unit
            ));
        }
    };

    value
        .checked_mul(secs_per_unit)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("duration '{}' is too large", s))
}

fn config_err(msg: String) -> BenchError {
    BenchError::ConfigError(msg)
}

/// Inner message of a nested config error, so prefixes don't stack up.
fn strip_prefix(err: BenchError) -> String {
    match err {
        BenchError::ConfigError(msg) => msg,
        other => other.to_string(),
    }
}
