//! Async driver for a [`SessionMachine`].
//!
//! [`SessionRunner`] is a single tokio task that owns the machine. Commands
//! from [`SessionHandle`]s and the machine's own deadlines are handled one
//! at a time in a `select!` loop, so the completion trigger and the
//! countdown can never interleave. Before every command the machine is
//! advanced to the current instant, which keeps time-driven transitions
//! ahead of commands that arrive later.
//!
//! After each step the runner refreshes the [`SessionStatus`] watch channel
//! and only then publishes the step's notifications on the [`EventBus`], so
//! a listener querying the handle sees the state that produced the event.
//! Listeners run on the runner task; they must not block, and should use
//! [`WeakSessionHandle::report_found`] rather than awaiting a command.
//!
//! The runner stops on [`SessionHandle::shutdown`] or once every
//! [`SessionHandle`] is dropped. The bus is owned by the runner, so a
//! listener that needs to talk back to the session holds a
//! [`WeakSessionHandle`] instead; a strong handle inside a listener would
//! keep the runner alive forever.

use std::future;
use std::sync::Arc;

use hideout_types::{EventKind, ObjectId, SessionEvent, SessionState, SessionStatus};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, warn};

use crate::FoundOutcome;
use crate::bus::{EventBus, SessionListener, Subscription};
use crate::level::Level;
use crate::session::{SessionError, SessionMachine};

/// Requests handled by the runner task.
enum Command {
    /// Start, or restart when `restart` is set.
    Start {
        restart: bool,
        ack: oneshot::Sender<Result<(), SessionError>>,
    },
    /// A found report, acknowledged with the outcome when `ack` is set.
    RecordFound {
        object_id: ObjectId,
        ack: Option<oneshot::Sender<FoundOutcome>>,
    },
    /// Replace the level and return to idle.
    LoadLevel {
        level: Box<Level>,
        ack: oneshot::Sender<()>,
    },
    /// Stop the runner.
    Shutdown,
}

/// The task that owns a [`SessionMachine`].
pub struct SessionRunner {
    machine: SessionMachine,
    bus: EventBus,
    commands: mpsc::UnboundedReceiver<Command>,
    status: watch::Sender<SessionStatus>,
}

impl SessionRunner {
    /// Spawn a runner for `machine` publishing on `bus`.
    ///
    /// The task runs until [`SessionHandle::shutdown`] is called or every
    /// [`SessionHandle`] is dropped. [`WeakSessionHandle`]s do not count.
    pub fn spawn(machine: SessionMachine, bus: EventBus) -> (SessionHandle, JoinHandle<()>) {
        let (command_tx, commands) = mpsc::unbounded_channel();
        let (status, status_rx) = watch::channel(machine.status());
        let runner = Self {
            machine,
            bus: bus.clone(),
            commands,
            status,
        };
        let task = tokio::spawn(runner.run());
        let handle = SessionHandle {
            commands: command_tx,
            status: status_rx,
            bus,
        };
        (handle, task)
    }

    /// Serve commands and deadlines until shutdown.
    async fn run(mut self) {
        info!(level = self.machine.level().id(), "Session runner started");
        loop {
            let deadline = self.machine.next_deadline();
            tokio::select! {
                biased;
                command = self.commands.recv() => {
                    let Some(command) = command else {
                        debug!("All session handles dropped");
                        break;
                    };
                    let now = Instant::now();
                    let events = self.machine.advance(now);
                    self.publish(&events);
                    if !self.handle(command, now) {
                        break;
                    }
                }
                () = wait_until(deadline) => {
                    let events = self.machine.advance(Instant::now());
                    self.publish(&events);
                }
            }
        }
        info!(state = ?self.machine.state(), "Session runner stopped");
    }

    /// Apply one command. Returns `false` on shutdown.
    fn handle(&mut self, command: Command, now: Instant) -> bool {
        match command {
            Command::Start { restart, ack } => {
                let result = if restart {
                    self.machine.restart(now)
                } else {
                    self.machine.start(now)
                };
                let reply = match result {
                    Ok(events) => {
                        self.publish(&events);
                        Ok(())
                    }
                    Err(e) => {
                        warn!(error = %e, "Session failed to start");
                        self.refresh_status();
                        Err(e)
                    }
                };
                let _ = ack.send(reply);
            }
            Command::RecordFound { object_id, ack } => {
                let (outcome, events) = self.machine.record_found(object_id, now);
                self.publish(&events);
                if let Some(ack) = ack {
                    let _ = ack.send(outcome);
                }
            }
            Command::LoadLevel { level, ack } => {
                self.machine.load_level(*level);
                self.refresh_status();
                let _ = ack.send(());
            }
            Command::Shutdown => {
                debug!("Shutdown requested");
                return false;
            }
        }
        true
    }

    /// Refresh the status, then deliver `events` in order.
    fn publish(&self, events: &[SessionEvent]) {
        self.refresh_status();
        self.bus.publish_all(events);
    }

    fn refresh_status(&self) {
        let next = self.machine.status();
        self.status.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }
}

impl core::fmt::Debug for SessionRunner {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SessionRunner")
            .field("machine", &self.machine)
            .field("bus", &self.bus)
            .finish_non_exhaustive()
    }
}

/// Sleep until `deadline`, or forever without one.
async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => future::pending().await,
    }
}

/// Cloneable handle to a running session.
///
/// This is what collaborators are given: the interaction layer reports
/// finds through it, the presentation layer subscribes through it, and
/// queries read the latest [`SessionStatus`] without a round trip.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<SessionStatus>,
    bus: EventBus,
}

impl SessionHandle {
    /// Start a session. Returns once the game-started notification and the
    /// first tick have been published.
    ///
    /// # Errors
    ///
    /// Returns the machine's [`SessionError`] if the session could not
    /// start, or [`SessionError::RunnerStopped`].
    pub async fn start(&self) -> Result<(), SessionError> {
        self.start_command(false).await
    }

    /// Restart the session; same semantics as [`start`](Self::start).
    ///
    /// # Errors
    ///
    /// Same as [`start`](Self::start).
    pub async fn restart(&self) -> Result<(), SessionError> {
        self.start_command(true).await
    }

    async fn start_command(&self, restart: bool) -> Result<(), SessionError> {
        let (ack, reply) = oneshot::channel();
        self.send(Command::Start { restart, ack })?;
        reply.await.map_err(|_dropped| SessionError::RunnerStopped)?
    }

    /// Report a find and wait for its outcome.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::RunnerStopped`] if the runner is gone.
    pub async fn record_found(&self, object_id: ObjectId) -> Result<FoundOutcome, SessionError> {
        let (ack, reply) = oneshot::channel();
        self.send(Command::RecordFound {
            object_id,
            ack: Some(ack),
        })?;
        reply.await.map_err(|_dropped| SessionError::RunnerStopped)
    }

    /// Report a find without waiting. Safe to call from inside a listener.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::RunnerStopped`] if the runner is gone.
    pub fn report_found(&self, object_id: ObjectId) -> Result<(), SessionError> {
        self.send(Command::RecordFound {
            object_id,
            ack: None,
        })
    }

    /// Replace the level; the session returns to idle.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::RunnerStopped`] if the runner is gone.
    pub async fn load_level(&self, level: Level) -> Result<(), SessionError> {
        let (ack, reply) = oneshot::channel();
        self.send(Command::LoadLevel {
            level: Box::new(level),
            ack,
        })?;
        reply.await.map_err(|_dropped| SessionError::RunnerStopped)
    }

    /// Ask the runner to stop. Pending deadlines are dropped unannounced.
    pub fn shutdown(&self) {
        if self.send(Command::Shutdown).is_err() {
            debug!("Shutdown requested after the runner stopped");
        }
    }

    fn send(&self, command: Command) -> Result<(), SessionError> {
        self.commands
            .send(command)
            .map_err(|_closed| SessionError::RunnerStopped)
    }

    /// A handle for listeners that does not keep the runner alive.
    pub fn downgrade(&self) -> WeakSessionHandle {
        WeakSessionHandle {
            commands: self.commands.downgrade(),
            status: self.status.clone(),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.status.borrow().state
    }

    /// Distinct objects found this session.
    pub fn found_count(&self) -> u32 {
        self.status.borrow().found_count
    }

    /// Objects that can be found this session.
    pub fn total_count(&self) -> u32 {
        self.status.borrow().total_count
    }

    /// Latest full status.
    pub fn status(&self) -> SessionStatus {
        self.status.borrow().clone()
    }

    /// The bus this session publishes on.
    pub const fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Register a listener for one kind of notification.
    pub fn subscribe(&self, kind: EventKind, listener: Arc<dyn SessionListener>) -> Subscription {
        self.bus.subscribe(kind, listener)
    }

    /// Register a listener for every notification.
    pub fn subscribe_all(&self, listener: Arc<dyn SessionListener>) -> Subscription {
        self.bus.subscribe_all(listener)
    }

    /// Wait until the state differs from the state at the time of the call.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::RunnerStopped`] if the runner stops first.
    pub async fn wait_for_state_change(&self) -> Result<SessionState, SessionError> {
        let mut status = self.status.clone();
        let initial = status.borrow_and_update().state;
        status
            .wait_for(|current| current.state != initial)
            .await
            .map(|current| current.state)
            .map_err(|_closed| SessionError::RunnerStopped)
    }

    /// Wait until `predicate` holds for the status, checking the current
    /// value first.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::RunnerStopped`] if the runner stops first.
    pub async fn wait_until(
        &self,
        predicate: impl FnMut(&SessionStatus) -> bool,
    ) -> Result<SessionStatus, SessionError> {
        let mut status = self.status.clone();
        status
            .wait_for(predicate)
            .await
            .map(|current| current.clone())
            .map_err(|_closed| SessionError::RunnerStopped)
    }
}

/// Handle that lets a listener report finds without owning the runner.
#[derive(Debug, Clone)]
pub struct WeakSessionHandle {
    commands: mpsc::WeakUnboundedSender<Command>,
    status: watch::Receiver<SessionStatus>,
}

impl WeakSessionHandle {
    /// Report a find without waiting, like [`SessionHandle::report_found`].
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::RunnerStopped`] once every strong handle is
    /// gone or the runner has stopped.
    pub fn report_found(&self, object_id: ObjectId) -> Result<(), SessionError> {
        let commands = self.commands.upgrade().ok_or(SessionError::RunnerStopped)?;
        commands
            .send(Command::RecordFound {
                object_id,
                ack: None,
            })
            .map_err(|_closed| SessionError::RunnerStopped)
    }

    /// Latest status published by the runner.
    pub fn status(&self) -> SessionStatus {
        self.status.borrow().clone()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use hideout_placement::PlacementPlanner;
    use hideout_types::{LevelDescriptor, ObjectSpec, Scene, Vec3};

    use super::*;
    use crate::session::SessionTiming;

    fn level(budget: f64) -> Level {
        let descriptor = LevelDescriptor {
            id: "runner".to_owned(),
            display_name: "Runner".to_owned(),
            time_budget_seconds: budget,
            objects: vec![ObjectSpec {
                object_id: ObjectId(1),
                display_name: "key".to_owned(),
                visual_ref: Default::default(),
            }],
        };
        let scene = Scene {
            fixed: Vec::new(),
            candidate_positions: vec![Vec3::new(0.0, 0.0, 0.0)],
        };
        Level::new(descriptor, scene).unwrap()
    }

    fn spawn(budget: f64) -> (SessionHandle, JoinHandle<()>) {
        let machine = SessionMachine::new(
            level(budget),
            SessionTiming::default(),
            PlacementPlanner::seeded(1),
        );
        SessionRunner::spawn(machine, EventBus::new())
    }

    #[tokio::test(start_paused = true)]
    async fn start_updates_status_before_returning() {
        let (handle, _task) = spawn(30.0);
        assert_eq!(handle.state(), SessionState::Idle);

        handle.start().await.unwrap();
        let status = handle.status();
        assert_eq!(status.state, SessionState::Playing);
        assert_eq!(status.total_count, 1);
        assert_eq!(status.remaining_seconds, Some(30));
    }

    #[tokio::test(start_paused = true)]
    async fn record_found_returns_outcome() {
        let (handle, _task) = spawn(30.0);
        handle.start().await.unwrap();

        let outcome = handle.record_found(ObjectId(1)).await.unwrap();
        assert!(outcome.progress().unwrap().is_now_complete);
        assert_eq!(handle.state(), SessionState::Complete);

        let late = handle.record_found(ObjectId(1)).await.unwrap();
        assert_eq!(late, FoundOutcome::Closed { object_id: ObjectId(1) });
    }

    #[tokio::test(start_paused = true)]
    async fn listener_can_report_finds_reentrantly() {
        let (handle, _task) = spawn(30.0);
        let reporter = handle.downgrade();
        let _sub = handle.subscribe(
            EventKind::GameStarted,
            Arc::new(move |_: &SessionEvent| {
                reporter.report_found(ObjectId(1)).unwrap();
            }),
        );

        handle.start().await.unwrap();
        let status = handle
            .wait_until(|status| status.state == SessionState::Complete)
            .await
            .unwrap();
        assert_eq!(status.found_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn detached_listener_does_not_keep_runner_alive() {
        let (handle, task) = spawn(30.0);
        let reporter = handle.downgrade();
        let observer = reporter.clone();
        handle
            .subscribe_all(Arc::new(move |_: &SessionEvent| {
                let _ = reporter.report_found(ObjectId(1));
            }))
            .detach();
        handle.start().await.unwrap();
        handle
            .wait_until(|status| status.state == SessionState::Complete)
            .await
            .unwrap();

        drop(handle);
        tokio::time::timeout(Duration::from_secs(100), task)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(observer.status().state, SessionState::Complete);
        assert!(matches!(
            observer.report_found(ObjectId(1)),
            Err(SessionError::RunnerStopped)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_fails_the_session() {
        let (handle, _task) = spawn(10.0);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _sub = handle.subscribe(
            EventKind::GameComplete,
            Arc::new(move |event: &SessionEvent| sink.lock().unwrap().push(event.clone())),
        );

        handle.start().await.unwrap();
        let status = handle
            .wait_until(|status| status.state.is_terminal())
            .await
            .unwrap();
        assert_eq!(status.state, SessionState::Failed);
        assert_eq!(status.remaining_seconds, Some(0));
        assert_eq!(
            *seen.lock().unwrap(),
            vec![SessionEvent::GameComplete { success: false }]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn state_change_is_observed() {
        let (handle, _task) = spawn(10.0);
        let (changed, started) = tokio::join!(handle.wait_for_state_change(), handle.start());
        started.unwrap();
        assert_eq!(changed.unwrap(), SessionState::Playing);
    }

    #[tokio::test(start_paused = true)]
    async fn load_level_returns_to_idle() {
        let (handle, _task) = spawn(10.0);
        handle.start().await.unwrap();
        handle.load_level(level(60.0)).await.unwrap();
        assert_eq!(handle.state(), SessionState::Idle);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(handle.state(), SessionState::Idle);

        handle.start().await.unwrap();
        assert_eq!(handle.status().remaining_seconds, Some(60));
    }

    #[tokio::test(start_paused = true)]
    async fn commands_fail_after_shutdown() {
        let (handle, task) = spawn(10.0);
        handle.shutdown();
        task.await.unwrap();

        assert!(matches!(
            handle.start().await,
            Err(SessionError::RunnerStopped)
        ));
        assert!(handle.report_found(ObjectId(1)).is_err());
    }
}
