//! Object pools and randomized placement for the Hideout hidden-object game.
//!
//! Every (re)start of a session re-arranges the level's objects:
//!
//! - **Fixed** objects return to their authored transform.
//! - **Randomized** objects are dealt shuffled candidate positions and a
//!   uniformly random yaw. When there are more randomized objects than
//!   positions, the surplus is left inactive and a
//!   [`CapacityShortfall`](hideout_types::CapacityShortfall) is reported.
//!
//! # Modules
//!
//! - [`pools`] -- [`ObjectPools`]: the per-level object instances, built
//!   once and reset in place on every arrangement, and
//!   [`check_structure`], the id and anchor check shared with level loading.
//! - [`planner`] -- [`PlacementPlanner`]: the shuffling arrangement pass.
//! - [`error`] -- [`PlacementError`] for inconsistent pool input.

pub mod error;
pub mod planner;
pub mod pools;

pub use error::PlacementError;
pub use planner::{PlacementPlanner, PlacementReport};
pub use pools::{ObjectPools, check_structure};
