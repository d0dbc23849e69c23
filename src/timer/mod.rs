// src/timer/mod.rs

//! Wall-clock timers used to measure start-up latency.
//!
//! A [`Timer`] is created inert, started once per measurement, marked one or
//! more times and finally stopped. Marks print a human-readable line on
//! stdout and, if an output path is configured, append a [`TimerRecord`] to
//! an append-only CSV log.
//!
//! Several commands (start / mark / stop) need to touch the same timer, so
//! timers are passed around as a [`TimerHandle`]. The handle is `Rc`-based:
//! timers are only ever driven from the single control flow that runs a
//! service, and a borrow is never held across an `.await`.

pub mod record;

use std::cell::RefCell;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use tracing::{debug, info};

use crate::errors::{BenchError, Result};

pub use record::TimerRecord;

/// Identity of a timer: either a name (e.g. `"starlight"`) or a numeric index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TimerId {
    Name(String),
    Index(u32),
}

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimerId::Name(name) => f.write_str(name),
            TimerId::Index(idx) => write!(f, "{idx}"),
        }
    }
}

impl From<&str> for TimerId {
    fn from(s: &str) -> Self {
        TimerId::Name(s.to_string())
    }
}

impl From<u32> for TimerId {
    fn from(idx: u32) -> Self {
        TimerId::Index(idx)
    }
}

#[derive(Debug, Clone, Copy)]
struct Started {
    instant: Instant,
    epoch_secs: f64,
}

#[derive(Debug)]
pub struct Timer {
    id: TimerId,
    output: Option<PathBuf>,
    started: Option<Started>,
    sink: Option<File>,
}

impl Timer {
    pub fn new(id: impl Into<TimerId>) -> Self {
        Self {
            id: id.into(),
            output: None,
            started: None,
            sink: None,
        }
    }

    /// Timer that appends every mark to the file at `output`.
    pub fn with_output(id: impl Into<TimerId>, output: impl Into<PathBuf>) -> Self {
        Self {
            output: Some(output.into()),
            ..Self::new(id)
        }
    }

    pub fn id(&self) -> &TimerId {
        &self.id
    }

    pub fn output(&self) -> Option<&Path> {
        self.output.as_deref()
    }

    pub fn is_started(&self) -> bool {
        self.started.is_some()
    }

    /// Capture the reference instant and open the sink, if any.
    ///
    /// Calling this again resets the reference instant.
    pub fn start(&mut self) -> Result<()> {
        if let Some(path) = self.output.clone() {
            // A restart reopens the sink; flush whatever the previous one had.
            self.stop()?;
            self.sink = Some(open_sink(&path)?);
        }

        let epoch_secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs_f64();
        self.started = Some(Started {
            instant: Instant::now(),
            epoch_secs,
        });

        debug!(timer = %self.id, started_at = epoch_secs, "timer started");
        Ok(())
    }

    pub fn elapsed(&self) -> Result<Duration> {
        let started = self.started_or_err()?;
        Ok(started.instant.elapsed())
    }

    /// Emit one sample: a stdout line plus, if a sink is open, a log record.
    pub fn mark(&mut self) -> Result<TimerRecord> {
        let started = self.started_or_err()?;
        let elapsed = started.instant.elapsed().as_secs_f64();

        println!("[timer - {}] {:.4}s", self.id, elapsed);
        info!(timer = %self.id, elapsed_secs = elapsed, "timer mark");

        let record = TimerRecord {
            id: self.id.clone(),
            started_at: started.epoch_secs,
            elapsed,
        };

        if let Some(sink) = self.sink.as_mut() {
            writeln!(sink, "{record}")?;
            sink.flush()?;
        }

        Ok(record)
    }

    /// Flush and close the sink. No-op when nothing is open.
    pub fn stop(&mut self) -> Result<()> {
        if let Some(mut sink) = self.sink.take() {
            sink.flush()?;
            sink.sync_all()?;
            debug!(timer = %self.id, "timer sink closed");
        }
        Ok(())
    }

    fn started_or_err(&self) -> Result<Started> {
        self.started
            .ok_or_else(|| BenchError::TimerNotStarted(self.id.to_string()))
    }
}

fn open_sink(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    Ok(file)
}

/// Shared handle to a [`Timer`], handed to every command that drives it.
#[derive(Debug, Clone)]
pub struct TimerHandle(Rc<RefCell<Timer>>);

impl TimerHandle {
    pub fn new(timer: Timer) -> Self {
        Self(Rc::new(RefCell::new(timer)))
    }

    pub fn id(&self) -> TimerId {
        self.0.borrow().id().clone()
    }

    pub fn output(&self) -> Option<PathBuf> {
        self.0.borrow().output().map(Path::to_path_buf)
    }

    pub fn start(&self) -> Result<()> {
        self.0.borrow_mut().start()
    }

    pub fn elapsed(&self) -> Result<Duration> {
        self.0.borrow().elapsed()
    }

    pub fn mark(&self) -> Result<TimerRecord> {
        self.0.borrow_mut().mark()
    }

    pub fn stop(&self) -> Result<()> {
        self.0.borrow_mut().stop()
    }

    pub fn is_started(&self) -> bool {
        self.0.borrow().is_started()
    }
}
