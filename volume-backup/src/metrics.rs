//! Metrics lines printed after a store when `--metrics` is set.
//!
//! One sample per line: `name{container="<id>"} <value> <unix-timestamp>`.

use chrono::{DateTime, Utc};
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct StoreMetrics {
    pub container: String,
    pub duration: Duration,
    pub bytes: u64,
    pub finished_at: DateTime<Utc>,
}

impl fmt::Display for StoreMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ts = self.finished_at.timestamp();
        writeln!(
            f,
            "duration_store{{container=\"{}\"}} {:.6} {}",
            self.container,
            self.duration.as_secs_f64(),
            ts
        )?;
        writeln!(
            f,
            "bytes_stored{{container=\"{}\"}} {} {}",
            self.container, self.bytes, ts
        )
    }
}
