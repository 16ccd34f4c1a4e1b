//! Shared type definitions for the Hideout hidden-object game.
//!
//! This crate is the single source of truth for the data that flows between
//! the session engine and its collaborators (level loading, placement,
//! presentation).
//!
//! # Modules
//!
//! - [`ids`] -- Strongly-typed identifiers for objects and sessions
//! - [`geometry`] -- Positions and transforms used by placement
//! - [`level`] -- Immutable level data ([`LevelDescriptor`], [`Scene`])
//! - [`enums`] -- Session state, object category, notification kinds
//! - [`structs`] -- Runtime records ([`PlacedObject`], [`ClockSnapshot`], [`SessionStatus`])
//! - [`events`] -- Notifications published by the session controller

pub mod enums;
pub mod events;
pub mod geometry;
pub mod ids;
pub mod level;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::{EventKind, ObjectCategory, SessionState};
pub use events::SessionEvent;
pub use geometry::{Transform, Vec3};
pub use ids::{ObjectId, SessionId};
pub use level::{FixedAnchor, LevelDescriptor, ObjectSpec, Scene, VisualRef};
pub use structs::{CapacityShortfall, ClockSnapshot, PlacedObject, SessionStatus};
