//! Session countdown clock.
//!
//! The clock holds only the monotonic start instant and the level's time
//! budget. Elapsed and remaining time are always derived from the start
//! reference, never stored independently.
//!
//! Remaining time is reported in whole seconds, floored and clamped at
//! zero: with a 60 second budget the reading at the start is 60, and it
//! drops to 59 only once a full second has elapsed.

use std::time::Duration;

use hideout_types::ClockSnapshot;
use tokio::time::Instant;

/// Errors that can occur when creating a session clock.
#[derive(Debug, thiserror::Error)]
pub enum ClockError {
    /// The time budget is not a positive, finite number of seconds.
    #[error("invalid time budget: {seconds} seconds")]
    InvalidBudget {
        /// The rejected budget.
        seconds: f64,
    },
}

/// Countdown for one session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionClock {
    /// Monotonic instant the session started.
    started_at: Instant,
    /// Level time budget in seconds.
    budget_seconds: f64,
}

impl SessionClock {
    /// Create a clock started at `started_at`.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::InvalidBudget`] unless the budget is finite
    /// and strictly positive.
    pub fn new(budget_seconds: f64, started_at: Instant) -> Result<Self, ClockError> {
        if !budget_seconds.is_finite() || budget_seconds <= 0.0 {
            return Err(ClockError::InvalidBudget {
                seconds: budget_seconds,
            });
        }
        Ok(Self {
            started_at,
            budget_seconds,
        })
    }

    /// The monotonic start instant.
    pub const fn started_at(&self) -> Instant {
        self.started_at
    }

    /// The time budget in seconds.
    pub const fn budget_seconds(&self) -> f64 {
        self.budget_seconds
    }

    /// Time elapsed since the start. Instants before the start read as zero.
    pub fn elapsed_at(&self, at: Instant) -> Duration {
        at.saturating_duration_since(self.started_at)
    }

    /// Whole seconds remaining at `at`, floored and never negative.
    pub fn remaining_at(&self, at: Instant) -> u32 {
        let remaining = (self.budget_seconds - self.elapsed_at(at).as_secs_f64()).floor();
        if remaining <= 0.0 {
            0
        } else if remaining >= f64::from(u32::MAX) {
            u32::MAX
        } else {
            // In range and non-negative per the checks above.
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let whole = remaining as u32;
            whole
        }
    }

    /// Full clock reading at `at`.
    pub fn snapshot(&self, at: Instant) -> ClockSnapshot {
        ClockSnapshot {
            elapsed_seconds: self.elapsed_at(at).as_secs_f64(),
            remaining_seconds: self.remaining_at(at),
        }
    }

    /// Scheduled instant of tick `index` (tick 0 is the start itself).
    ///
    /// Returns `None` if the instant is not representable.
    pub fn tick_due(&self, index: u32, interval: Duration) -> Option<Instant> {
        interval
            .checked_mul(index)
            .and_then(|offset| self.started_at.checked_add(offset))
    }

    /// Index of the latest tick scheduled at or before `at`.
    ///
    /// Returns 0 for a zero interval.
    pub fn tick_index_at(&self, at: Instant, interval: Duration) -> u32 {
        let elapsed = self.elapsed_at(at).as_nanos();
        let index = elapsed.checked_div(interval.as_nanos()).unwrap_or(0);
        u32::try_from(index).unwrap_or(u32::MAX)
    }
}
