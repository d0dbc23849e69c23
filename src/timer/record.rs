// src/timer/record.rs

use std::fmt;
use std::str::FromStr;

use crate::timer::TimerId;

/// One sample in a timer log.
///
/// The on-disk form is a single comma-separated line with no header:
///
/// ```text
/// starlight,1718031234.512345,3.201877
/// ```
///
/// Columns are `id`, the start instant in epoch seconds, and the elapsed
/// seconds at the time of the mark. Plotting scripts read the columns by
/// position, so the order is fixed. The id column is text, so it is always
/// read back as [`TimerId::Name`].
#[derive(Debug, Clone, PartialEq)]
pub struct TimerRecord {
    pub id: TimerId,
    pub started_at: f64,
    pub elapsed: f64,
}

impl fmt::Display for TimerRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{:.6},{:.6}", self.id, self.started_at, self.elapsed)
    }
}

impl FromStr for TimerRecord {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Split from the right so the numeric columns are always the last two.
        let mut parts = s.trim_end_matches(['\r', '\n']).rsplitn(3, ',');
        let elapsed = parts.next();
        let started_at = parts.next();
        let id = parts.next();

        let (Some(id), Some(started_at), Some(elapsed)) = (id, started_at, elapsed) else {
            return Err(format!("malformed timer record '{s}': expected 3 columns"));
        };

        let started_at: f64 = started_at
            .trim()
            .parse()
            .map_err(|e| format!("invalid start instant '{started_at}': {e}"))?;
        let elapsed: f64 = elapsed
            .trim()
            .parse()
            .map_err(|e| format!("invalid elapsed seconds '{elapsed}': {e}"))?;

        Ok(TimerRecord {
            id: TimerId::from(id.trim()),
            started_at,
            elapsed,
        })
    }
}
