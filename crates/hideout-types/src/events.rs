//! Notifications published by the session controller.
//!
//! Presentation layers subscribe to these; none of them expects a reply.

use std::sync::Arc;

use crate::enums::EventKind;
use crate::ids::{ObjectId, SessionId};
use crate::level::LevelDescriptor;

/// A notification emitted by the session controller.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A session started (or restarted) on a level.
    GameStarted {
        /// The freshly minted session.
        session_id: SessionId,
        /// The level being played.
        level: Arc<LevelDescriptor>,
    },
    /// A previously unfound object was found.
    ObjectFound {
        /// Distinct objects found so far, including this one.
        found_count: u32,
        /// Objects that can be found this session.
        total_count: u32,
        /// The object that was found.
        object_id: ObjectId,
    },
    /// The last outstanding object was found. Fires at most once per session.
    AllFound,
    /// Countdown update, published once per tick.
    TimeElapsed {
        /// Whole seconds left, floored and never negative.
        remaining_seconds: u32,
    },
    /// Terminal outcome, published exactly once per session.
    GameComplete {
        /// `true` when every object was found in time.
        success: bool,
    },
}

impl SessionEvent {
    /// The kind of this event, for filtered subscriptions.
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::GameStarted { .. } => EventKind::GameStarted,
            Self::ObjectFound { .. } => EventKind::ObjectFound,
            Self::AllFound => EventKind::AllFound,
            Self::TimeElapsed { .. } => EventKind::TimeElapsed,
            Self::GameComplete { .. } => EventKind::GameComplete,
        }
    }
}
