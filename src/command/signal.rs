// src/command/signal.rs

//! Signal delivery to the process group of a watched shell command.
//!
//! Shell commands are spawned in their own process group, so signalling the
//! group reaches the `sh -c` wrapper and everything it started.

use std::str::FromStr;

use nix::errno::Errno;
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use tracing::{debug, warn};

use crate::errors::{BenchError, Result};

/// Parse a signal name (`"TERM"`, `"SIGINT"`, `"int"`) or number (`"15"`).
pub fn parse_signal(name: &str) -> Result<Signal> {
    let trimmed = name.trim();

    if let Ok(num) = trimmed.parse::<i32>() {
        return Signal::try_from(num)
            .map_err(|_| BenchError::ConfigError(format!("unknown signal number {num}")));
    }

    let upper = trimmed.to_uppercase();
    let full = if upper.starts_with("SIG") {
        upper
    } else {
        format!("SIG{upper}")
    };

    Signal::from_str(&full)
        .map_err(|_| BenchError::ConfigError(format!("unknown signal name '{trimmed}'")))
}

/// Send `signal` to the process group led by `pgid`.
///
/// Returns whether the signal was delivered. A group that no longer exists
/// is not an error: the process may have exited between the readiness line
/// and the cleanup.
pub fn signal_group(pgid: u32, signal: Signal) -> Result<bool> {
    let pid = i32::try_from(pgid)
        .map_err(|_| BenchError::ConfigError(format!("process group id {pgid} out of range")))?;

    match killpg(Pid::from_raw(pid), signal) {
        Ok(()) => {
            debug!(pgid, signal = signal.as_str(), "signal delivered to process group");
            Ok(true)
        }
        Err(Errno::ESRCH) => {
            warn!(pgid, signal = signal.as_str(), "process group already gone; signal not delivered");
            Ok(false)
        }
        Err(errno) => Err(std::io::Error::from(errno).into()),
    }
}
