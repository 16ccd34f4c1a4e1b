//! Per-level object instances, built once and reused across replays.

use std::collections::BTreeSet;

use hideout_types::{
    LevelDescriptor, ObjectCategory, ObjectId, PlacedObject, Scene, Transform,
};

use crate::PlacementError;

/// Check that object ids are unique and that fixed anchors match the
/// level's objects at most once each.
///
/// This is the single structural check for pool input; level loading in
/// `hideout-core` calls it too.
///
/// # Errors
///
/// Returns the first [`PlacementError`] found, in authored order.
pub fn check_structure(level: &LevelDescriptor, scene: &Scene) -> Result<(), PlacementError> {
    let mut seen = BTreeSet::new();
    for spec in &level.objects {
        if !seen.insert(spec.object_id) {
            return Err(PlacementError::DuplicateObject(spec.object_id));
        }
    }

    let mut anchored = BTreeSet::new();
    for anchor in &scene.fixed {
        if !seen.contains(&anchor.object_id) {
            return Err(PlacementError::UnknownAnchor(anchor.object_id));
        }
        if !anchored.insert(anchor.object_id) {
            return Err(PlacementError::DuplicateAnchor(anchor.object_id));
        }
    }
    Ok(())
}

/// A fixed-pool object together with the transform it resets to.
#[derive(Debug, Clone)]
pub(crate) struct FixedSlot {
    pub(crate) object: PlacedObject,
    pub(crate) authored: Transform,
}

/// The runtime objects of one level, split into fixed and randomized pools.
///
/// Pools are created once for a level (lazily, at the first session
/// setup) and mutated in place by
/// [`PlacementPlanner::arrange`](crate::PlacementPlanner::arrange) and by
/// find reports. They never grow or shrink after construction.
#[derive(Debug, Clone)]
pub struct ObjectPools {
    level_id: String,
    pub(crate) fixed: Vec<FixedSlot>,
    pub(crate) randomized: Vec<PlacedObject>,
}

impl ObjectPools {
    /// Build the pools for a level.
    ///
    /// Objects with an anchor in `scene` go to the fixed pool, all others
    /// to the randomized pool, both in authored order. Every object starts
    /// inactive until the first arrangement.
    ///
    /// # Errors
    ///
    /// Returns [`PlacementError`] if [`check_structure`] rejects the
    /// level. A level that passed validation in `hideout-core` already went
    /// through the same check, so this only fails for unvalidated input.
    pub fn build(level: &LevelDescriptor, scene: &Scene) -> Result<Self, PlacementError> {
        check_structure(level, scene)?;

        let mut fixed = Vec::new();
        let mut randomized = Vec::new();
        for spec in &level.objects {
            match scene.anchor(spec.object_id) {
                Some(anchor) => fixed.push(FixedSlot {
                    object: PlacedObject {
                        spec: spec.clone(),
                        category: ObjectCategory::Fixed,
                        transform: anchor.transform,
                        active: false,
                        is_found: false,
                    },
                    authored: anchor.transform,
                }),
                None => randomized.push(PlacedObject {
                    spec: spec.clone(),
                    category: ObjectCategory::Randomized,
                    transform: Transform::default(),
                    active: false,
                    is_found: false,
                }),
            }
        }

        Ok(Self {
            level_id: level.id.clone(),
            fixed,
            randomized,
        })
    }

    /// The level these pools were built for.
    pub fn level_id(&self) -> &str {
        &self.level_id
    }

    /// Number of fixed objects.
    pub const fn fixed_len(&self) -> usize {
        self.fixed.len()
    }

    /// Number of randomized objects.
    pub const fn randomized_len(&self) -> usize {
        self.randomized.len()
    }

    /// Total number of objects in both pools.
    pub const fn len(&self) -> usize {
        self.fixed.len().saturating_add(self.randomized.len())
    }

    /// Whether the level has no objects at all.
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate over every object, fixed pool first.
    pub fn objects(&self) -> impl Iterator<Item = &PlacedObject> {
        self.fixed
            .iter()
            .map(|slot| &slot.object)
            .chain(self.randomized.iter())
    }

    /// Look up an object by id.
    pub fn get(&self, object_id: ObjectId) -> Option<&PlacedObject> {
        self.objects().find(|object| object.object_id() == object_id)
    }

    /// Ids of the objects that are active this session.
    pub fn active_ids(&self) -> BTreeSet<ObjectId> {
        self.objects()
            .filter(|object| object.active)
            .map(PlacedObject::object_id)
            .collect()
    }

    /// Mark an active object as found and take it out of play.
    ///
    /// Returns `false` if the object does not exist, is inactive, or was
    /// already found.
    pub fn mark_found(&mut self, object_id: ObjectId) -> bool {
        let object = self
            .fixed
            .iter_mut()
            .map(|slot| &mut slot.object)
            .chain(self.randomized.iter_mut())
            .find(|object| object.object_id() == object_id);
        match object {
            Some(object) if object.is_findable() => {
                object.is_found = true;
                object.active = false;
                true
            }
            _ => false,
        }
    }

    /// Clone every object, fixed pool first, for status projections.
    pub fn snapshot(&self) -> Vec<PlacedObject> {
        self.objects().cloned().collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use hideout_types::{FixedAnchor, ObjectSpec, Vec3, VisualRef};

    use super::*;

    fn spec(id: u32) -> ObjectSpec {
        ObjectSpec {
            object_id: ObjectId(id),
            display_name: format!("object-{id}"),
            visual_ref: VisualRef::default(),
        }
    }

    fn level(ids: &[u32]) -> LevelDescriptor {
        LevelDescriptor {
            id: String::from("test"),
            display_name: String::from("Test"),
            time_budget_seconds: 60.0,
            objects: ids.iter().copied().map(spec).collect(),
        }
    }

    fn anchor(id: u32) -> FixedAnchor {
        FixedAnchor {
            object_id: ObjectId(id),
            transform: Transform::new(Vec3::new(1.0, 2.0, 3.0), 45.0),
        }
    }

    #[test]
    fn objects_split_by_anchor() {
        let scene = Scene {
            fixed: vec![anchor(2)],
            candidate_positions: Vec::new(),
        };
        let pools = ObjectPools::build(&level(&[1, 2, 3]), &scene).unwrap();
        assert_eq!(pools.fixed_len(), 1);
        assert_eq!(pools.randomized_len(), 2);
        assert_eq!(pools.len(), 3);
        assert_eq!(pools.get(ObjectId(2)).unwrap().category, ObjectCategory::Fixed);
        assert_eq!(
            pools.get(ObjectId(3)).unwrap().category,
            ObjectCategory::Randomized
        );
        assert!(pools.active_ids().is_empty());
    }

    #[test]
    fn unknown_anchor_is_rejected() {
        let scene = Scene {
            fixed: vec![anchor(9)],
            candidate_positions: Vec::new(),
        };
        let result = ObjectPools::build(&level(&[1]), &scene);
        assert!(matches!(result, Err(PlacementError::UnknownAnchor(ObjectId(9)))));
    }

    #[test]
    fn duplicate_anchor_is_rejected() {
        let scene = Scene {
            fixed: vec![anchor(1), anchor(1)],
            candidate_positions: Vec::new(),
        };
        let result = ObjectPools::build(&level(&[1]), &scene);
        assert!(matches!(result, Err(PlacementError::DuplicateAnchor(ObjectId(1)))));
    }

    #[test]
    fn duplicate_object_is_rejected() {
        let result = ObjectPools::build(&level(&[4, 4]), &Scene::default());
        assert!(matches!(result, Err(PlacementError::DuplicateObject(ObjectId(4)))));
    }

    #[test]
    fn consistent_level_passes_structure_check() {
        let scene = Scene {
            fixed: vec![anchor(1), anchor(3)],
            candidate_positions: Vec::new(),
        };
        assert!(check_structure(&level(&[1, 2, 3]), &scene).is_ok());
        assert!(matches!(
            check_structure(&level(&[1, 2, 1]), &scene),
            Err(PlacementError::DuplicateObject(ObjectId(1)))
        ));
    }

    #[test]
    fn inactive_objects_cannot_be_found() {
        let mut pools = ObjectPools::build(&level(&[1]), &Scene::default()).unwrap();
        assert!(!pools.mark_found(ObjectId(1)));
        assert!(!pools.mark_found(ObjectId(2)));
    }
}
