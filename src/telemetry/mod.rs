pub mod store;

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use thiserror::Error;

pub use store::{CurrentView, HistoricalAverages, TelemetrySnapshot, TelemetryStore};

/// Number of readings kept for historical averages.
pub const HISTORY_CAPACITY: usize = 10;

/// A reading (or device state report) older than this is considered stale.
pub const FRESHNESS_WINDOW_SECS: i64 = 60;

/// `true` if something captured at `captured_at` is still current at `now`.
pub fn is_fresh(captured_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now.signed_duration_since(captured_at).num_milliseconds() < FRESHNESS_WINDOW_SECS * 1000
}

/// One environment snapshot reported by the device.
///
/// Replaced wholesale on each ingestion; never mutated once stored.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvironmentReading {
    /// Degrees Celsius
    pub temperature: f64,
    /// Relative humidity percentage
    pub humidity: f64,
    /// Raw value as reported by the device's light sensor
    pub luminosity: i64,
    pub occupant_count: i64,
    pub presence_tags: BTreeSet<String>,
    pub captured_at: DateTime<Utc>,
}

impl EnvironmentReading {
    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        is_fresh(self.captured_at, now)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MalformedTelemetry {
    #[error("malformed telemetry: missing required field `{0}`")]
    MissingField(&'static str),
}
