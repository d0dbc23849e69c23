// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BenchError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to spawn shell command '{cmd}': {source}")]
    SpawnError {
        cmd: String,
        #[source]
        source: std::io::Error,
    },

    /// `mark()` / `elapsed()` called on a timer that was never started.
    #[error("timer '{0}' used before start()")]
    TimerNotStarted(String),

    #[error("Service not found: {0}")]
    ServiceNotFound(String),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, BenchError>;
