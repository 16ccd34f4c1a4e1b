//! The session state machine.
//!
//! [`SessionMachine`] is the sole authority over the session lifecycle:
//!
//! ```text
//! Idle --start--> Playing --all found--> Complete
//!                    |                       (grace) -> game complete(true)
//!                    +--time out--> (grace) -> Failed -> game complete(false)
//! any state --start/restart--> Playing
//! ```
//!
//! The machine is synchronous and deterministic. Every operation takes the
//! current [`Instant`] explicitly and returns the notifications it produced
//! in publication order; nothing is published from here. Timers are plain
//! deadlines: [`next_deadline`](SessionMachine::next_deadline) tells the
//! driver when to call [`advance`](SessionMachine::advance) next.
//!
//! Countdown ticks are scheduled against the session start, not against
//! the previous tick, so late wake-ups never skip a reading or drift. Each
//! tick reports the remaining time at its scheduled instant. When the
//! driver wakes late by more than one cadence, the overdue ticks collapse
//! into a single reading for the latest one.
//!
//! Terminal announcements go through a grace deadline tagged with the
//! session epoch. Starting a session bumps the epoch and drops pending
//! deadlines, and a firing deadline re-checks both epoch and state before
//! announcing. Together with the `announced` latch this publishes
//! game-complete exactly once per session.

use std::collections::BTreeSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use hideout_ledger::DiscoveryLedger;
use hideout_placement::{ObjectPools, PlacementError, PlacementPlanner};
use hideout_types::{
    CapacityShortfall, ClockSnapshot, ObjectId, SessionEvent, SessionId, SessionState,
    SessionStatus,
};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::FoundOutcome;
use crate::clock::{ClockError, SessionClock};
use crate::config::SessionConfig;
use crate::level::Level;

/// Default countdown cadence.
const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Default pause between a terminal trigger and its announcement.
const DEFAULT_GRACE_DELAY: Duration = Duration::from_millis(500);

/// Shortest accepted tick cadence.
const MIN_TICK_INTERVAL: Duration = Duration::from_millis(1);

/// Errors raised by session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The level's objects could not be pooled.
    #[error("placement error: {0}")]
    Placement(#[from] PlacementError),

    /// The level's time budget could not start a clock.
    #[error("clock error: {0}")]
    Clock(#[from] ClockError),

    /// The session runner task is no longer running.
    #[error("session runner has stopped")]
    RunnerStopped,
}

/// Countdown cadence and grace delay for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTiming {
    tick_interval: Duration,
    grace_delay: Duration,
}

impl SessionTiming {
    /// Create a timing. Cadences below one millisecond are raised to it.
    pub fn new(tick_interval: Duration, grace_delay: Duration) -> Self {
        Self {
            tick_interval: tick_interval.max(MIN_TICK_INTERVAL),
            grace_delay,
        }
    }

    /// Time between countdown ticks.
    pub const fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    /// Time between a terminal trigger and its announcement.
    pub const fn grace_delay(&self) -> Duration {
        self.grace_delay
    }
}

impl Default for SessionTiming {
    fn default() -> Self {
        Self::new(DEFAULT_TICK_INTERVAL, DEFAULT_GRACE_DELAY)
    }
}

impl From<&SessionConfig> for SessionTiming {
    fn from(config: &SessionConfig) -> Self {
        Self::new(config.tick_interval(), config.grace_delay())
    }
}

/// Which announcement a grace deadline leads to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EndOutcome {
    Success,
    Failure,
}

/// A scheduled terminal announcement.
#[derive(Debug, Clone, Copy)]
struct PendingEnd {
    outcome: EndOutcome,
    due: Instant,
    /// Session epoch the deadline was scheduled in.
    epoch: u64,
}

/// Bookkeeping for the session in progress (or the last one played).
#[derive(Debug, Clone, Copy)]
struct ActiveSession {
    id: SessionId,
    clock: SessionClock,
    started_wall: DateTime<Utc>,
    /// Index of the next countdown tick, `None` once ticking stopped.
    next_tick: Option<u32>,
}

/// Deterministic state machine for one game session at a time.
///
/// Owns the level, the object pools, the planner, and the discovery
/// ledger. Pools are built lazily on the first start and re-arranged in
/// place on every later one.
#[derive(Debug)]
pub struct SessionMachine {
    level: Level,
    timing: SessionTiming,
    planner: PlacementPlanner,
    pools: Option<ObjectPools>,
    ledger: DiscoveryLedger,
    state: SessionState,
    /// Bumped on every start and level change.
    epoch: u64,
    active: Option<ActiveSession>,
    pending_end: Option<PendingEnd>,
    /// Latched once game-complete is emitted for the current session.
    announced: bool,
    /// Last countdown value emitted this session.
    remaining_seconds: Option<u32>,
    shortfall: Option<CapacityShortfall>,
}

impl SessionMachine {
    /// Create an idle machine for `level`.
    pub const fn new(level: Level, timing: SessionTiming, planner: PlacementPlanner) -> Self {
        Self {
            level,
            timing,
            planner,
            pools: None,
            ledger: DiscoveryLedger::new(),
            state: SessionState::Idle,
            epoch: 0,
            active: None,
            pending_end: None,
            announced: false,
            remaining_seconds: None,
            shortfall: None,
        }
    }

    /// Start a new session at `now`.
    ///
    /// Legal from every state; from a non-idle state it is an implicit
    /// restart. In order: pending ticks and grace deadlines are cancelled,
    /// the pools are arranged, the ledger is armed with the active objects,
    /// the clock starts, the state becomes [`SessionState::Playing`], and
    /// the game-started notification is followed by the first tick, which
    /// reports the full budget.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Placement`] if the level's objects cannot be
    /// pooled or [`SessionError::Clock`] for an unusable time budget. Level
    /// loading runs the same checks, so a loaded [`Level`] reaches neither.
    /// The machine is left idle in both cases.
    pub fn start(&mut self, now: Instant) -> Result<Vec<SessionEvent>, SessionError> {
        self.cancel_pending();
        self.state = SessionState::Idle;
        self.active = None;

        let clock = SessionClock::new(self.level.time_budget_seconds(), now)?;
        let pools = match self.pools.take() {
            Some(pools) => pools,
            None => ObjectPools::build(self.level.descriptor(), self.level.scene())?,
        };
        let pools = self.pools.insert(pools);

        let report = self
            .planner
            .arrange(pools, &self.level.scene().candidate_positions);
        self.ledger.reset(report.active_ids);
        self.shortfall = report.shortfall;

        let session_id = SessionId::new();
        self.active = Some(ActiveSession {
            id: session_id,
            clock,
            started_wall: Utc::now(),
            next_tick: Some(0),
        });
        self.state = SessionState::Playing;
        self.announced = false;
        self.remaining_seconds = None;

        info!(
            %session_id,
            level = self.level.id(),
            total = self.ledger.total_count(),
            budget_seconds = clock.budget_seconds(),
            "Session started"
        );

        let mut events = vec![SessionEvent::GameStarted {
            session_id,
            level: self.level.descriptor_arc(),
        }];
        events.extend(self.advance(now));
        Ok(events)
    }

    /// Restart the session. Identical to [`start`](Self::start): a full
    /// re-arrangement followed by a fresh game-started notification.
    ///
    /// # Errors
    ///
    /// Same as [`start`](Self::start).
    pub fn restart(&mut self, now: Instant) -> Result<Vec<SessionEvent>, SessionError> {
        debug!(state = ?self.state, "Restart requested");
        self.start(now)
    }

    /// Report that the player found `object_id` at `now`.
    ///
    /// Deadlines due at or before `now` fire first, so a find that arrives
    /// after the failure announcement is closed out. Finds are accepted
    /// while [`SessionState::Playing`], including the grace window after
    /// the countdown reached zero; completing the set there pre-empts the
    /// failure. The last find sets the state to [`SessionState::Complete`]
    /// at once, stops ticking, and schedules the success announcement one
    /// grace delay later.
    pub fn record_found(
        &mut self,
        object_id: ObjectId,
        now: Instant,
    ) -> (FoundOutcome, Vec<SessionEvent>) {
        let mut events = self.advance(now);

        if self.state != SessionState::Playing {
            debug!(%object_id, state = ?self.state, "Find reported outside play, ignored");
            return (FoundOutcome::Closed { object_id }, events);
        }

        let outcome = self.ledger.record_found(object_id);
        if let FoundOutcome::Recorded(progress) = outcome {
            let marked = self
                .pools
                .as_mut()
                .is_some_and(|pools| pools.mark_found(object_id));
            if !marked {
                warn!(%object_id, "Ledger recorded a find the pools could not mark");
            }
            debug!(
                %object_id,
                found = progress.found_count,
                total = progress.total_count,
                "Object found"
            );
            events.extend(progress.notifications());
            if progress.is_now_complete {
                self.complete(now);
            }
        }
        (outcome, events)
    }

    /// Evaluate the countdown at `at`.
    ///
    /// A no-op unless playing with the countdown still running. Emits the
    /// remaining whole seconds, never more than the previous reading. On
    /// reaching zero, ticking stops and the failure announcement is
    /// scheduled one grace delay after `at`.
    pub fn tick(&mut self, at: Instant) -> Vec<SessionEvent> {
        if self.state != SessionState::Playing || self.pending_end.is_some() {
            return Vec::new();
        }
        let Some(active) = self.active.as_mut() else {
            return Vec::new();
        };

        let mut remaining = active.clock.remaining_at(at);
        if let Some(previous) = self.remaining_seconds {
            remaining = remaining.min(previous);
        }
        self.remaining_seconds = Some(remaining);

        if remaining == 0 {
            active.next_tick = None;
            let due = at.checked_add(self.timing.grace_delay).unwrap_or(at);
            self.pending_end = Some(PendingEnd {
                outcome: EndOutcome::Failure,
                due,
                epoch: self.epoch,
            });
            info!(session_id = %active.id, "Time ran out, failure pending");
        }
        vec![SessionEvent::TimeElapsed {
            remaining_seconds: remaining,
        }]
    }

    /// Fire every tick and grace deadline due at or before `now`, in
    /// order, and return the notifications they produced.
    pub fn advance(&mut self, now: Instant) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        loop {
            if let Some((index, due)) = self.next_tick_due().filter(|&(_, due)| due <= now) {
                events.extend(self.fire_tick(index, due, now));
            } else if self.pending_end.is_some_and(|pending| pending.due <= now) {
                events.extend(self.fire_end());
            } else {
                break;
            }
        }
        events
    }

    /// Replace the level. Cancels anything pending and returns to idle;
    /// the pools are rebuilt at the next start.
    pub fn load_level(&mut self, level: Level) {
        self.cancel_pending();
        info!(from = self.level.id(), to = level.id(), "Level loaded");
        self.level = level;
        self.pools = None;
        self.ledger.reset(BTreeSet::new());
        self.state = SessionState::Idle;
        self.active = None;
        self.announced = false;
        self.remaining_seconds = None;
        self.shortfall = None;
    }

    /// The earliest instant at which [`advance`](Self::advance) has work.
    pub fn next_deadline(&self) -> Option<Instant> {
        let tick = self.next_tick_due().map(|(_, due)| due);
        let end = self.pending_end.map(|pending| pending.due);
        match (tick, end) {
            (Some(tick), Some(end)) => Some(tick.min(end)),
            (tick, end) => tick.or(end),
        }
    }

    /// Current lifecycle state.
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Distinct objects found this session.
    pub fn found_count(&self) -> u32 {
        self.ledger.found_count()
    }

    /// Objects that can be found this session.
    pub fn total_count(&self) -> u32 {
        self.ledger.total_count()
    }

    /// The session in progress or last played.
    pub fn session_id(&self) -> Option<SessionId> {
        self.active.map(|active| active.id)
    }

    /// Last countdown value emitted this session.
    pub const fn remaining_seconds(&self) -> Option<u32> {
        self.remaining_seconds
    }

    /// The loaded level.
    pub const fn level(&self) -> &Level {
        &self.level
    }

    /// Clock reading at `now`, if a session has started.
    pub fn clock_snapshot(&self, now: Instant) -> Option<ClockSnapshot> {
        self.active.map(|active| active.clock.snapshot(now))
    }

    /// Read-only projection of the machine.
    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            state: self.state,
            session_id: self.session_id(),
            started_at: self.active.map(|active| active.started_wall),
            level_id: self.level.id().to_owned(),
            found_count: self.found_count(),
            total_count: self.total_count(),
            remaining_seconds: self.remaining_seconds,
            objects: self
                .pools
                .as_ref()
                .map(ObjectPools::snapshot)
                .unwrap_or_default(),
            shortfall: self.shortfall,
        }
    }

    /// Drop every scheduled tick and grace deadline.
    fn cancel_pending(&mut self) {
        self.epoch = self.epoch.wrapping_add(1);
        if let Some(dropped) = self.pending_end.take() {
            debug!(outcome = ?dropped.outcome, "Pending announcement cancelled");
        }
        if let Some(active) = self.active.as_mut() {
            active.next_tick = None;
        }
    }

    /// Index and scheduled instant of the next tick.
    fn next_tick_due(&self) -> Option<(u32, Instant)> {
        let active = self.active.as_ref()?;
        let index = active.next_tick?;
        let due = active.clock.tick_due(index, self.timing.tick_interval)?;
        Some((index, due))
    }

    /// Fire the tick due at `due`, collapsing any later overdue ticks.
    fn fire_tick(&mut self, index: u32, due: Instant, now: Instant) -> Vec<SessionEvent> {
        let Some(active) = self.active.as_ref() else {
            return Vec::new();
        };
        let clock = active.clock;
        let latest = clock.tick_index_at(now, self.timing.tick_interval).max(index);
        let at = if latest == index {
            due
        } else {
            debug!(skipped = latest.saturating_sub(index), "Overdue ticks collapsed");
            clock.tick_due(latest, self.timing.tick_interval).unwrap_or(due)
        };

        let events = self.tick(at);
        if let Some(active) = self.active.as_mut() {
            // `tick` clears the schedule when the countdown ran out.
            if active.next_tick.is_some() {
                active.next_tick = latest.checked_add(1);
            }
        }
        if events.is_empty() {
            // Nothing left to tick for; stop rather than spin.
            if let Some(active) = self.active.as_mut() {
                active.next_tick = None;
            }
        }
        events
    }

    /// Fire the pending grace deadline, announcing the outcome if it is
    /// still current.
    fn fire_end(&mut self) -> Vec<SessionEvent> {
        let Some(pending) = self.pending_end.take() else {
            return Vec::new();
        };
        if pending.epoch != self.epoch || self.announced {
            debug!(outcome = ?pending.outcome, "Stale announcement dropped");
            return Vec::new();
        }
        let session_id = self.session_id();
        match (pending.outcome, self.state) {
            (EndOutcome::Success, SessionState::Complete) => {
                self.announced = true;
                info!(session_id = ?session_id, "Game complete: success");
                vec![SessionEvent::GameComplete { success: true }]
            }
            (EndOutcome::Failure, SessionState::Playing) => {
                self.state = SessionState::Failed;
                self.announced = true;
                info!(session_id = ?session_id, "Game complete: failure");
                vec![SessionEvent::GameComplete { success: false }]
            }
            (outcome, state) => {
                warn!(?outcome, ?state, "Announcement no longer matches state, dropped");
                Vec::new()
            }
        }
    }

    /// Latch completion after the last find.
    fn complete(&mut self, now: Instant) {
        self.state = SessionState::Complete;
        if let Some(active) = self.active.as_mut() {
            active.next_tick = None;
        }
        let due = now.checked_add(self.timing.grace_delay).unwrap_or(now);
        if self.pending_end.take().is_some() {
            debug!("Completion pre-empted pending failure");
        }
        self.pending_end = Some(PendingEnd {
            outcome: EndOutcome::Success,
            due,
            epoch: self.epoch,
        });
        info!(session_id = ?self.session_id(), "All objects found, success pending");
    }
}
