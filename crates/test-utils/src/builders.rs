#![allow(dead_code)]

use std::path::PathBuf;

use startbench::config::{PlanFile, RawPlanFile, ServiceConfig, StepConfig, TimerConfig};

/// Builder for `PlanFile` to simplify test setup.
pub struct PlanBuilder {
    plan: RawPlanFile,
}

impl PlanBuilder {
    pub fn new() -> Self {
        Self {
            plan: RawPlanFile::default(),
        }
    }

    pub fn with_timer(mut self, name: &str) -> Self {
        self.plan.timer.insert(name.to_string(), TimerConfig::default());
        self
    }

    pub fn with_timer_output(mut self, name: &str, output: impl Into<PathBuf>) -> Self {
        self.plan.timer.insert(
            name.to_string(),
            TimerConfig {
                output: Some(output.into()),
            },
        );
        self
    }

    pub fn with_service(mut self, name: &str, steps: Vec<StepConfig>) -> Self {
        self.plan.service.insert(
            name.to_string(),
            ServiceConfig {
                mounts: vec![],
                steps,
            },
        );
        self
    }

    pub fn with_mount(mut self, service: &str, dir: impl Into<PathBuf>) -> Self {
        self.plan
            .service
            .entry(service.to_string())
            .or_default()
            .mounts
            .push(dir.into());
        self
    }

    pub fn with_default_ready_timeout(mut self, timeout: &str) -> Self {
        self.plan.defaults.ready_timeout = Some(timeout.to_string());
        self
    }

    /// The raw plan, for tests that exercise validation failures.
    pub fn raw(self) -> RawPlanFile {
        self.plan
    }

    pub fn build(self) -> PlanFile {
        PlanFile::try_from(self.plan).expect("Failed to build valid plan from builder")
    }
}

impl Default for PlanBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for a single `StepConfig`.
pub struct StepBuilder {
    step: StepConfig,
}

impl StepBuilder {
    pub fn run(cmd: &str) -> Self {
        Self {
            step: StepConfig {
                run: Some(cmd.to_string()),
                ..StepConfig::default()
            },
        }
    }

    pub fn start_timer(name: &str) -> Self {
        Self {
            step: StepConfig {
                start_timer: Some(name.to_string()),
                ..StepConfig::default()
            },
        }
    }

    pub fn mark_timer(name: &str) -> Self {
        Self {
            step: StepConfig {
                mark_timer: Some(name.to_string()),
                ..StepConfig::default()
            },
        }
    }

    pub fn stop_timer(name: &str) -> Self {
        Self {
            step: StepConfig {
                stop_timer: Some(name.to_string()),
                ..StepConfig::default()
            },
        }
    }

    pub fn sleep(duration: &str) -> Self {
        Self {
            step: StepConfig {
                sleep: Some(duration.to_string()),
                ..StepConfig::default()
            },
        }
    }

    pub fn signal(name: &str) -> Self {
        Self {
            step: StepConfig {
                signal: Some(name.to_string()),
                ..StepConfig::default()
            },
        }
    }

    pub fn wait_for(mut self, marker: &str) -> Self {
        self.step.wait_for = Some(marker.to_string());
        self
    }

    pub fn cleanup(mut self, steps: Vec<StepConfig>) -> Self {
        self.step.cleanup = Some(steps);
        self
    }

    pub fn ready_timeout(mut self, timeout: &str) -> Self {
        self.step.ready_timeout = Some(timeout.to_string());
        self
    }

    pub fn build(self) -> StepConfig {
        self.step
    }
}
