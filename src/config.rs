//! Click configuration for the clicker engine

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::events::MouseButton;
use crate::{ClickweaveError, Result};

/// Largest accepted jitter magnitude (one hour)
pub const MAX_JITTER_MS: f64 = 3_600_000.0;

/// When a clicker run ends on its own
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum ClickLimit {
    /// Run until stopped
    #[default]
    None,
    /// Stop after this many clicks
    Count(u64),
    /// Stop once this much time has elapsed since start
    Duration(Duration),
}

impl ClickLimit {
    /// Time limit from a number of seconds, rejecting negative, non-finite
    /// and out-of-range values
    pub fn from_secs(secs: f64) -> Result<Self> {
        Duration::try_from_secs_f64(secs)
            .map(ClickLimit::Duration)
            .map_err(|e| {
                ClickweaveError::InvalidConfig(format!("invalid duration {}s: {}", secs, e))
            })
    }

    /// Whether a run with these totals has reached the limit
    pub fn is_reached(&self, clicks_done: u64, elapsed: Duration) -> bool {
        match *self {
            ClickLimit::None => false,
            ClickLimit::Count(n) => clicks_done >= n,
            ClickLimit::Duration(d) => elapsed >= d,
        }
    }
}

/// Configuration for a clicker run
///
/// The engine takes a snapshot of this at `start()`, so changing it while a
/// run is in flight only affects the next run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClickConfig {
    /// Target clicks per second
    pub rate_hz: f64,

    /// Button to click
    pub button: MouseButton,

    /// Maximum random offset added to each interval, in milliseconds
    pub jitter_ms: f64,

    /// Optional end condition
    pub limit: ClickLimit,
}

impl Default for ClickConfig {
    fn default() -> Self {
        Self {
            rate_hz: 10.0,
            button: MouseButton::Left,
            jitter_ms: 0.0,
            limit: ClickLimit::None,
        }
    }
}

impl ClickConfig {
    /// Set the click rate in clicks per second
    pub fn with_rate(mut self, rate_hz: f64) -> Self {
        self.rate_hz = rate_hz;
        self
    }

    /// Set the button to click
    pub fn with_button(mut self, button: MouseButton) -> Self {
        self.button = button;
        self
    }

    /// Set the jitter magnitude in milliseconds
    pub fn with_jitter_ms(mut self, jitter_ms: f64) -> Self {
        self.jitter_ms = jitter_ms;
        self
    }

    /// Set the run limit
    pub fn with_limit(mut self, limit: ClickLimit) -> Self {
        self.limit = limit;
        self
    }

    /// Check that the values can drive a timing loop
    pub fn validate(&self) -> Result<()> {
        if !self.rate_hz.is_finite() || self.rate_hz <= 0.0 {
            return Err(ClickweaveError::InvalidConfig(format!(
                "rate must be a positive number of clicks per second, got {}",
                self.rate_hz
            )));
        }
        if !self.jitter_ms.is_finite() || self.jitter_ms < 0.0 || self.jitter_ms > MAX_JITTER_MS {
            return Err(ClickweaveError::InvalidConfig(format!(
                "jitter must be between 0 and {} milliseconds, got {}",
                MAX_JITTER_MS,
                self.jitter_ms
            )));
        }
        Ok(())
    }
}
