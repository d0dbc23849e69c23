// src/config/mod.rs

//! Benchmark plan loading, validation and building.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a plan file from disk (`loader.rs`).
//! - Validate step shapes and references (`validate.rs`).
//! - Turn a validated plan into a [`Service`](crate::service::Service)
//!   (`build.rs`).

pub mod build;
pub mod loader;
pub mod model;
pub mod validate;

pub use build::{build_service, build_timers};
pub use loader::{default_plan_path, load_and_validate, load_from_path};
pub use model::{
    DefaultsSection, PlanFile, RawPlanFile, ServiceConfig, StepAction, StepConfig, TimerConfig,
};
pub use validate::{parse_duration, validate_plan};
