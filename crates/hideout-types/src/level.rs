//! Immutable level data.
//!
//! A [`LevelDescriptor`] is loaded once per level choice and outlives every
//! session played on it. The accompanying [`Scene`] carries the authored
//! placement geometry: which objects stay at a fixed transform and which
//! positions are eligible to host the randomized ones.
//!
//! These types are plain data. Validation (unique ids, time budget bounds,
//! anchor consistency) happens when a level is loaded by `hideout-core`.

use serde::{Deserialize, Serialize};

use crate::geometry::{Transform, Vec3};
use crate::ids::ObjectId;

/// Opaque handle to the presentation asset for an object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VisualRef(pub String);

impl VisualRef {
    /// Borrow the handle as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One findable object as authored in the level data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectSpec {
    /// Identifier, unique within the level.
    pub object_id: ObjectId,
    /// Name shown to the player.
    pub display_name: String,
    /// Asset handle for the presentation layer.
    #[serde(default)]
    pub visual_ref: VisualRef,
}

/// Per-level parameters: time budget and the ordered object list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelDescriptor {
    /// Stable level identifier.
    pub id: String,
    /// Name shown to the player.
    pub display_name: String,
    /// Seconds the player has to find every object.
    pub time_budget_seconds: f64,
    /// The objects to find, in authored order.
    pub objects: Vec<ObjectSpec>,
}

impl LevelDescriptor {
    /// Look up an object spec by id.
    pub fn object(&self, object_id: ObjectId) -> Option<&ObjectSpec> {
        self.objects.iter().find(|spec| spec.object_id == object_id)
    }

    /// Number of authored objects.
    pub const fn object_count(&self) -> usize {
        self.objects.len()
    }
}

/// An object pinned to its authored transform on every replay.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FixedAnchor {
    /// The pinned object.
    pub object_id: ObjectId,
    /// Where it always appears.
    pub transform: Transform,
}

/// Authored placement geometry for a level.
///
/// Objects with a [`FixedAnchor`] form the fixed pool; every other object
/// of the level is randomized over `candidate_positions`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Scene {
    /// Objects that never move between replays.
    #[serde(default)]
    pub fixed: Vec<FixedAnchor>,
    /// Locations eligible to host a randomized object.
    #[serde(default)]
    pub candidate_positions: Vec<Vec3>,
}

impl Scene {
    /// Return the anchor for an object, if it is fixed.
    pub fn anchor(&self, object_id: ObjectId) -> Option<&FixedAnchor> {
        self.fixed.iter().find(|anchor| anchor.object_id == object_id)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn scene_defaults_when_sections_missing() {
        let scene: Scene = serde_yml::from_str("{}").unwrap();
        assert!(scene.fixed.is_empty());
        assert!(scene.candidate_positions.is_empty());
    }

    #[test]
    fn candidate_positions_accept_partial_points() {
        let yaml = "candidate_positions:\n  - { x: 0.0 }\n  - { x: 1.0, z: -2.0 }\n";
        let scene: Scene = serde_yml::from_str(yaml).unwrap();
        assert_eq!(
            scene.candidate_positions,
            vec![Vec3::new(0.0, 0.0, 0.0), Vec3::new(1.0, 0.0, -2.0)]
        );
    }

    #[test]
    fn descriptor_parses_from_yaml() {
        let yaml = r#"
id: attic
display_name: "The Attic"
time_budget_seconds: 90
objects:
  - object_id: 1
    display_name: Key
    visual_ref: icons/key
  - object_id: 2
    display_name: Candle
"#;
        let level: LevelDescriptor = serde_yml::from_str(yaml).unwrap();
        assert_eq!(level.object_count(), 2);
        assert_eq!(level.object(ObjectId(1)).unwrap().visual_ref.as_str(), "icons/key");
        assert_eq!(level.object(ObjectId(2)).unwrap().visual_ref, VisualRef::default());
        assert!(level.object(ObjectId(3)).is_none());
    }
}
