//! The arrangement pass run on every session (re)start.

use std::collections::BTreeSet;

use hideout_types::{CapacityShortfall, ObjectId, Transform, Vec3};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::{debug, warn};

use crate::ObjectPools;

/// Upper bound (exclusive) of a randomized yaw, in degrees.
const FULL_TURN_DEGREES: f32 = 360.0;

/// Outcome of one arrangement pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacementReport {
    /// Ids of every object made active, fixed and randomized.
    pub active_ids: BTreeSet<ObjectId>,
    /// Randomized objects that received a position.
    pub placed_randomized: u32,
    /// Set when randomized objects outnumbered candidate positions.
    pub shortfall: Option<CapacityShortfall>,
}

impl PlacementReport {
    /// Number of objects the player can find after this pass.
    pub fn active_count(&self) -> u32 {
        u32::try_from(self.active_ids.len()).unwrap_or(u32::MAX)
    }
}

/// Deals shuffled positions and random yaws to the randomized pool.
///
/// Both the order of the randomized objects and the order of the
/// candidate positions go through a Fisher-Yates shuffle, so every
/// assignment of positions to objects is equally likely. A planner built
/// with [`seeded`](Self::seeded) reproduces the same sequence of
/// arrangements for the same inputs.
#[derive(Debug, Clone)]
pub struct PlacementPlanner {
    rng: StdRng,
}

impl PlacementPlanner {
    /// Create a planner with a fixed seed.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Create a planner seeded from operating-system entropy.
    pub fn from_os_rng() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }

    /// Create a planner from an optional seed.
    pub fn new(seed: Option<u64>) -> Self {
        seed.map_or_else(Self::from_os_rng, Self::seeded)
    }

    /// Arrange the pools for a new session.
    ///
    /// Every object's found flag is cleared. Fixed objects go back to their
    /// authored transform and become active. Randomized objects are dealt
    /// candidate positions in shuffle order; objects left without a
    /// position stay inactive, and the shortfall is logged and reported
    /// rather than treated as an error. Prior placement state is fully
    /// overwritten.
    pub fn arrange(&mut self, pools: &mut ObjectPools, candidates: &[Vec3]) -> PlacementReport {
        for slot in &mut pools.fixed {
            slot.object.transform = slot.authored;
            slot.object.active = true;
            slot.object.is_found = false;
        }

        for object in &mut pools.randomized {
            object.transform = Transform::default();
            object.active = false;
            object.is_found = false;
        }

        let mut order: Vec<usize> = (0..pools.randomized.len()).collect();
        order.shuffle(&mut self.rng);

        let mut positions = candidates.to_vec();
        positions.shuffle(&mut self.rng);

        let mut placed_randomized: u32 = 0;
        for (&index, &position) in order.iter().zip(positions.iter()) {
            let rotation_degrees = self.rng.random_range(0.0..FULL_TURN_DEGREES);
            if let Some(object) = pools.randomized.get_mut(index) {
                object.transform = Transform::new(position, rotation_degrees);
                object.active = true;
                placed_randomized = placed_randomized.saturating_add(1);
            }
        }

        let requested = u32::try_from(pools.randomized.len()).unwrap_or(u32::MAX);
        let available = u32::try_from(candidates.len()).unwrap_or(u32::MAX);
        let shortfall = (requested > available).then(|| {
            let shortfall = CapacityShortfall {
                requested,
                available,
            };
            warn!(
                level = pools.level_id(),
                requested,
                available,
                deactivated = shortfall.deactivated(),
                "Not enough candidate positions, surplus objects left inactive"
            );
            shortfall
        });

        let active_ids = pools.active_ids();
        debug!(
            level = pools.level_id(),
            fixed = pools.fixed_len(),
            placed_randomized,
            active = active_ids.len(),
            "Objects arranged"
        );

        PlacementReport {
            active_ids,
            placed_randomized,
            shortfall,
        }
    }
}
