//! Listener that writes every session notification to the log.
//!
//! Stands in for the presentation layer in the headless engine. Countdown
//! readings go to `debug` except on every tenth second and the final ten,
//! so an `info` log stays readable for long budgets.

use hideout_core::bus::SessionListener;
use hideout_types::SessionEvent;
use tracing::{debug, info};

/// Countdown readings at or below this are always logged at `info`.
const FINAL_COUNTDOWN_SECONDS: u32 = 10;

/// Logs session notifications with structured fields.
#[derive(Debug, Default)]
pub struct LogListener;

impl LogListener {
    /// Create a logging listener.
    pub const fn new() -> Self {
        Self
    }
}

impl SessionListener for LogListener {
    fn on_event(&self, event: &SessionEvent) {
        match event {
            SessionEvent::GameStarted { session_id, level } => info!(
                %session_id,
                level = %level.id,
                objects = level.object_count(),
                budget_seconds = level.time_budget_seconds,
                "Game started"
            ),
            SessionEvent::ObjectFound {
                found_count,
                total_count,
                object_id,
            } => info!(%object_id, found_count, total_count, "Object found"),
            SessionEvent::AllFound => info!("All objects found"),
            SessionEvent::TimeElapsed { remaining_seconds } => {
                if *remaining_seconds <= FINAL_COUNTDOWN_SECONDS
                    || remaining_seconds.checked_rem(FINAL_COUNTDOWN_SECONDS) == Some(0)
                {
                    info!(remaining_seconds, "Time remaining");
                } else {
                    debug!(remaining_seconds, "Time remaining");
                }
            }
            SessionEvent::GameComplete { success } => info!(success, "Game complete"),
        }
    }
}
