//! Error types for the `hideout-placement` crate.

use hideout_types::ObjectId;

/// Errors raised while building object pools from level data.
#[derive(Debug, thiserror::Error)]
pub enum PlacementError {
    /// A fixed anchor names an object the level does not define.
    #[error("fixed anchor references unknown object {0}")]
    UnknownAnchor(ObjectId),

    /// Two fixed anchors pin the same object.
    #[error("object {0} has more than one fixed anchor")]
    DuplicateAnchor(ObjectId),

    /// The level defines the same object id twice.
    #[error("duplicate object id: {0}")]
    DuplicateObject(ObjectId),
}
