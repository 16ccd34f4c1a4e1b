//! Runtime records produced and consumed during a session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::enums::{ObjectCategory, SessionState};
use crate::geometry::Transform;
use crate::ids::{ObjectId, SessionId};
use crate::level::ObjectSpec;

/// Runtime instance of an [`ObjectSpec`] for the current session.
///
/// One exists per spec; instances are created once when the object pools
/// are first built and reset in place on every (re)start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacedObject {
    /// The authored object.
    pub spec: ObjectSpec,
    /// Fixed or randomized placement.
    pub category: ObjectCategory,
    /// Current position and yaw.
    pub transform: Transform,
    /// Visible and interactable this session.
    pub active: bool,
    /// Found by the player this session.
    pub is_found: bool,
}

impl PlacedObject {
    /// Shorthand for the object's id.
    pub const fn object_id(&self) -> ObjectId {
        self.spec.object_id
    }

    /// Whether the player can still find this object.
    pub const fn is_findable(&self) -> bool {
        self.active && !self.is_found
    }
}

/// Clock reading derived from the session's monotonic start reference.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClockSnapshot {
    /// Seconds since the session started.
    pub elapsed_seconds: f64,
    /// Whole seconds left, floored and clamped at zero.
    pub remaining_seconds: u32,
}

/// Report of randomized objects that could not be placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapacityShortfall {
    /// Randomized objects that wanted a position.
    pub requested: u32,
    /// Candidate positions that were available.
    pub available: u32,
}

impl CapacityShortfall {
    /// Number of randomized objects left inactive.
    pub const fn deactivated(&self) -> u32 {
        self.requested.saturating_sub(self.available)
    }
}

/// Read-only projection of the session controller, refreshed after every
/// controller step.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SessionStatus {
    /// Current lifecycle state.
    pub state: SessionState,
    /// The session in progress or last played, if any.
    pub session_id: Option<SessionId>,
    /// Wall-clock time the current session started.
    pub started_at: Option<DateTime<Utc>>,
    /// Identifier of the loaded level.
    pub level_id: String,
    /// Distinct objects found this session.
    pub found_count: u32,
    /// Objects that can be found this session.
    pub total_count: u32,
    /// Last countdown value published, if the session has ticked.
    pub remaining_seconds: Option<u32>,
    /// Every object of the level with its current placement.
    pub objects: Vec<PlacedObject>,
    /// Capacity shortfall reported by the last placement pass.
    pub shortfall: Option<CapacityShortfall>,
}

impl SessionStatus {
    /// Objects the player can still find.
    pub fn findable_objects(&self) -> impl Iterator<Item = &PlacedObject> {
        self.objects.iter().filter(|object| object.is_findable())
    }
}
