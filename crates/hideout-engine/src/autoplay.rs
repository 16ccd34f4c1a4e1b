//! Scripted seeker that plays sessions without a player.
//!
//! The seeker takes the objects that are findable after each arrangement,
//! visits them in random order with a random pause before each attempt,
//! and misses some attempts, putting the object back at the end of its
//! queue. A round ends when the session announces game-complete, whether
//! the seeker finished in time or not.

use std::collections::VecDeque;
use std::time::Duration;

use hideout_core::FoundOutcome;
use hideout_core::config::AutoplayConfig;
use hideout_core::runner::SessionHandle;
use hideout_core::session::SessionError;
use hideout_types::{ObjectId, PlacedObject, SessionEvent};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::{Instant, sleep};
use tracing::{debug, warn};

use crate::error::EngineError;

/// Result of one autoplay round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundSummary {
    /// Whether game-complete reported success.
    pub success: bool,
    /// Objects found.
    pub found: u32,
    /// Objects that were findable.
    pub total: u32,
    /// Find attempts made, hits and misses.
    pub attempts: u32,
    /// Time from start to the game-complete announcement.
    pub elapsed: Duration,
}

/// Drives sessions through a [`SessionHandle`] like an unhurried player.
#[derive(Debug)]
pub struct AutoplaySeeker {
    handle: SessionHandle,
    rng: StdRng,
    min_delay: Duration,
    max_delay: Duration,
    miss_chance: f64,
}

impl AutoplaySeeker {
    /// Create a seeker from the autoplay settings.
    pub fn new(handle: SessionHandle, config: &AutoplayConfig) -> Self {
        let rng = config
            .seed
            .map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64);
        Self {
            handle,
            rng,
            min_delay: Duration::from_millis(config.min_find_delay_ms),
            max_delay: Duration::from_millis(config.max_find_delay_ms.max(config.min_find_delay_ms)),
            miss_chance: config.miss_chance.clamp(0.0, 1.0),
        }
    }

    /// Start (or restart) a session and play it until game-complete.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Session`] if the session fails to start or
    /// the runner stops mid-round.
    pub async fn play_round(&mut self, restart: bool) -> Result<RoundSummary, EngineError> {
        let mut events = self.handle.bus().receiver();
        if restart {
            self.handle.restart().await?;
        } else {
            self.handle.start().await?;
        }
        let started = Instant::now();

        let mut targets: Vec<ObjectId> = self
            .handle
            .status()
            .findable_objects()
            .map(PlacedObject::object_id)
            .collect();
        targets.shuffle(&mut self.rng);

        let mut attempts = 0_u32;
        let success = tokio::select! {
            outcome = wait_for_outcome(&mut events) => outcome?,
            seeking = self.seek(targets.into(), &mut attempts) => {
                seeking?;
                wait_for_outcome(&mut events).await?
            }
        };

        let status = self.handle.status();
        Ok(RoundSummary {
            success,
            found: status.found_count,
            total: status.total_count,
            attempts,
            elapsed: started.elapsed(),
        })
    }

    /// Report every target, retrying misses, until the queue is empty or
    /// the session stops accepting finds.
    async fn seek(
        &mut self,
        mut queue: VecDeque<ObjectId>,
        attempts: &mut u32,
    ) -> Result<(), SessionError> {
        while let Some(object_id) = queue.pop_front() {
            sleep(self.pause()).await;
            *attempts = attempts.saturating_add(1);

            if self.rng.random_bool(self.miss_chance) {
                debug!(%object_id, "Seeker missed");
                queue.push_back(object_id);
                continue;
            }
            match self.handle.record_found(object_id).await? {
                FoundOutcome::Recorded(_) | FoundOutcome::Duplicate { .. } => {}
                FoundOutcome::Unknown { .. } => {
                    warn!(%object_id, "Seeker reported an object that is not in play");
                }
                FoundOutcome::Closed { .. } => {
                    debug!("Session closed before the seeker finished");
                    return Ok(());
                }
            }
        }
        Ok(())
    }

    /// Random pause before the next attempt.
    fn pause(&mut self) -> Duration {
        self.rng.random_range(self.min_delay..=self.max_delay)
    }
}

/// Wait for the game-complete announcement and return its outcome.
async fn wait_for_outcome(
    events: &mut broadcast::Receiver<SessionEvent>,
) -> Result<bool, SessionError> {
    loop {
        match events.recv().await {
            Ok(SessionEvent::GameComplete { success }) => return Ok(success),
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "Autoplay fell behind the event stream");
            }
            Err(RecvError::Closed) => return Err(SessionError::RunnerStopped),
        }
    }
}
