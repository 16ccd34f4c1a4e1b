//! Level loading and validation.
//!
//! A [`Level`] is a [`LevelDescriptor`] plus its [`Scene`] that has passed
//! every load-time check. Configuration errors are fatal here, before any
//! session can start on the level:
//!
//! - object ids must be unique
//! - the time budget must be finite and within
//!   [`MIN_TIME_BUDGET_SECONDS`]..=[`MAX_TIME_BUDGET_SECONDS`]
//! - the level must define at least one object
//! - fixed anchors must name existing objects, each at most once

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use hideout_placement::{PlacementError, check_structure};
use hideout_types::{LevelDescriptor, ObjectId, ObjectSpec, Scene};
use serde::Deserialize;
use tracing::{debug, info};

/// Shortest time budget a level may declare, in seconds.
pub const MIN_TIME_BUDGET_SECONDS: f64 = 10.0;

/// Longest time budget a level may declare, in seconds.
pub const MAX_TIME_BUDGET_SECONDS: f64 = 600.0;

/// Errors that can occur when loading a level.
#[derive(Debug, thiserror::Error)]
pub enum LevelError {
    /// Failed to read a level file or directory.
    #[error("failed to read level data: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse level YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// Two objects share an id.
    #[error("level {level_id}: duplicate object id {object_id}")]
    DuplicateObjectId {
        /// The offending level.
        level_id: String,
        /// The repeated id.
        object_id: ObjectId,
    },

    /// The time budget is not a positive, finite number.
    #[error("level {level_id}: invalid time budget {seconds}")]
    InvalidTimeBudget {
        /// The offending level.
        level_id: String,
        /// The rejected budget.
        seconds: f64,
    },

    /// The time budget is outside the supported range.
    #[error("level {level_id}: time budget {seconds}s outside [10, 600]")]
    TimeBudgetOutOfRange {
        /// The offending level.
        level_id: String,
        /// The rejected budget.
        seconds: f64,
    },

    /// The level defines no objects.
    #[error("level {level_id} has no objects")]
    NoObjects {
        /// The offending level.
        level_id: String,
    },

    /// A fixed anchor names an object the level does not define.
    #[error("level {level_id}: fixed anchor references unknown object {object_id}")]
    UnknownAnchor {
        /// The offending level.
        level_id: String,
        /// The unknown id.
        object_id: ObjectId,
    },

    /// An object is anchored more than once.
    #[error("level {level_id}: object {object_id} anchored more than once")]
    DuplicateAnchor {
        /// The offending level.
        level_id: String,
        /// The repeated id.
        object_id: ObjectId,
    },

    /// Two level files in a catalog share a level id.
    #[error("duplicate level id in catalog: {0}")]
    DuplicateLevel(String),
}

impl From<serde_yml::Error> for LevelError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// On-disk layout of a level file.
#[derive(Debug, Deserialize)]
struct LevelFile {
    id: String,
    display_name: String,
    time_budget_seconds: f64,
    objects: Vec<ObjectSpec>,
    #[serde(default)]
    scene: Scene,
}

/// A validated level: immutable descriptor plus placement geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct Level {
    descriptor: Arc<LevelDescriptor>,
    scene: Scene,
}

impl Level {
    /// Validate a descriptor and scene.
    ///
    /// # Errors
    ///
    /// Returns the first [`LevelError`] configuration error found.
    pub fn new(descriptor: LevelDescriptor, scene: Scene) -> Result<Self, LevelError> {
        validate(&descriptor, &scene)?;
        Ok(Self {
            descriptor: Arc::new(descriptor),
            scene,
        })
    }

    /// Parse and validate a level from YAML.
    ///
    /// # Errors
    ///
    /// Returns [`LevelError::Yaml`] for malformed YAML, or a validation
    /// error.
    pub fn parse(yaml: &str) -> Result<Self, LevelError> {
        let file: LevelFile = serde_yml::from_str(yaml)?;
        let descriptor = LevelDescriptor {
            id: file.id,
            display_name: file.display_name,
            time_budget_seconds: file.time_budget_seconds,
            objects: file.objects,
        };
        Self::new(descriptor, file.scene)
    }

    /// Read, parse, and validate a level file.
    ///
    /// # Errors
    ///
    /// Returns [`LevelError::Io`] if the file cannot be read, otherwise as
    /// [`Level::parse`].
    pub fn from_file(path: &Path) -> Result<Self, LevelError> {
        let contents = std::fs::read_to_string(path)?;
        let level = Self::parse(&contents)?;
        debug!(path = %path.display(), level = level.id(), "Level file loaded");
        Ok(level)
    }

    /// The level's identifier.
    pub fn id(&self) -> &str {
        &self.descriptor.id
    }

    /// The immutable descriptor.
    pub fn descriptor(&self) -> &LevelDescriptor {
        &self.descriptor
    }

    /// Shared handle to the descriptor, as carried by notifications.
    pub fn descriptor_arc(&self) -> Arc<LevelDescriptor> {
        Arc::clone(&self.descriptor)
    }

    /// The authored placement geometry.
    pub const fn scene(&self) -> &Scene {
        &self.scene
    }

    /// The time budget in seconds.
    pub fn time_budget_seconds(&self) -> f64 {
        self.descriptor.time_budget_seconds
    }
}

/// Run every load-time check on a descriptor and scene.
fn validate(descriptor: &LevelDescriptor, scene: &Scene) -> Result<(), LevelError> {
    let level_id = || descriptor.id.clone();
    let seconds = descriptor.time_budget_seconds;

    if !seconds.is_finite() || seconds <= 0.0 {
        return Err(LevelError::InvalidTimeBudget {
            level_id: level_id(),
            seconds,
        });
    }
    if !(MIN_TIME_BUDGET_SECONDS..=MAX_TIME_BUDGET_SECONDS).contains(&seconds) {
        return Err(LevelError::TimeBudgetOutOfRange {
            level_id: level_id(),
            seconds,
        });
    }
    if descriptor.objects.is_empty() {
        return Err(LevelError::NoObjects {
            level_id: level_id(),
        });
    }

    check_structure(descriptor, scene).map_err(|source| match source {
        PlacementError::DuplicateObject(object_id) => LevelError::DuplicateObjectId {
            level_id: level_id(),
            object_id,
        },
        PlacementError::UnknownAnchor(object_id) => LevelError::UnknownAnchor {
            level_id: level_id(),
            object_id,
        },
        PlacementError::DuplicateAnchor(object_id) => LevelError::DuplicateAnchor {
            level_id: level_id(),
            object_id,
        },
    })?;

    Ok(())
}

/// Every level available to the level-choice collaborator, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct LevelCatalog {
    levels: BTreeMap<String, Level>,
}

impl LevelCatalog {
    /// Create an empty catalog.
    pub const fn new() -> Self {
        Self {
            levels: BTreeMap::new(),
        }
    }

    /// Load every `.yaml` / `.yml` file in a directory.
    ///
    /// # Errors
    ///
    /// Returns the first load or validation error, or
    /// [`LevelError::DuplicateLevel`] if two files declare the same id.
    pub fn load_dir(dir: &Path) -> Result<Self, LevelError> {
        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            let is_yaml = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext == "yaml" || ext == "yml");
            if is_yaml {
                paths.push(path);
            }
        }
        paths.sort();

        let mut catalog = Self::new();
        for path in paths {
            catalog.insert(Level::from_file(&path)?)?;
        }
        info!(dir = %dir.display(), levels = catalog.len(), "Level catalog loaded");
        Ok(catalog)
    }

    /// Add a level.
    ///
    /// # Errors
    ///
    /// Returns [`LevelError::DuplicateLevel`] if the id is already present.
    pub fn insert(&mut self, level: Level) -> Result<(), LevelError> {
        let id = level.id().to_owned();
        if self.levels.contains_key(&id) {
            return Err(LevelError::DuplicateLevel(id));
        }
        self.levels.insert(id, level);
        Ok(())
    }

    /// Look up a level by id.
    pub fn get(&self, id: &str) -> Option<&Level> {
        self.levels.get(id)
    }

    /// Level ids in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.levels.keys().map(String::as_str)
    }

    /// Number of levels.
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    /// Whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use hideout_types::{FixedAnchor, Transform, Vec3};

    use super::*;

    const ATTIC: &str = r#"
id: attic
display_name: "The Attic"
time_budget_seconds: 90
objects:
  - object_id: 1
    display_name: Key
  - object_id: 2
    display_name: Candle
  - object_id: 3
    display_name: Map
scene:
  fixed:
    - object_id: 2
      transform:
        position: { x: 1.0, y: 0.5, z: -2.0 }
        rotation_degrees: 30.0
  candidate_positions:
    - { x: 0.0, y: 0.0 }
    - { x: 3.0, y: 1.0, z: 2.0 }
"#;

    fn descriptor(budget: f64, ids: &[u32]) -> LevelDescriptor {
        LevelDescriptor {
            id: String::from("test"),
            display_name: String::from("Test"),
            time_budget_seconds: budget,
            objects: ids
                .iter()
                .map(|&id| ObjectSpec {
                    object_id: ObjectId(id),
                    display_name: format!("object-{id}"),
                    visual_ref: hideout_types::VisualRef::default(),
                })
                .collect(),
        }
    }

    #[test]
    fn parses_level_with_scene() {
        let level = Level::parse(ATTIC).unwrap();
        assert_eq!(level.id(), "attic");
        assert_eq!(level.descriptor().object_count(), 3);
        assert_eq!(level.scene().fixed.len(), 1);
        assert_eq!(level.scene().candidate_positions.len(), 2);
        assert_eq!(
            level.scene().candidate_positions.first().copied(),
            Some(Vec3::ZERO)
        );
    }

    #[test]
    fn scene_section_is_optional() {
        let yaml = "id: a\ndisplay_name: A\ntime_budget_seconds: 30\nobjects:\n  - object_id: 1\n    display_name: Cup\n";
        let level = Level::parse(yaml).unwrap();
        assert!(level.scene().fixed.is_empty());
    }

    #[test]
    fn duplicate_object_ids_fail_fast() {
        let result = Level::new(descriptor(60.0, &[1, 2, 1]), Scene::default());
        assert!(matches!(
            result,
            Err(LevelError::DuplicateObjectId {
                object_id: ObjectId(1),
                ..
            })
        ));
    }

    #[test]
    fn non_positive_budget_fails_fast() {
        for budget in [0.0, -1.0, f64::NAN] {
            let result = Level::new(descriptor(budget, &[1]), Scene::default());
            assert!(
                matches!(result, Err(LevelError::InvalidTimeBudget { .. })),
                "budget {budget}"
            );
        }
    }

    #[test]
    fn budget_outside_range_fails_fast() {
        for budget in [5.0, 601.0] {
            let result = Level::new(descriptor(budget, &[1]), Scene::default());
            assert!(matches!(
                result,
                Err(LevelError::TimeBudgetOutOfRange { .. })
            ));
        }
        assert!(Level::new(descriptor(MIN_TIME_BUDGET_SECONDS, &[1]), Scene::default()).is_ok());
        assert!(Level::new(descriptor(MAX_TIME_BUDGET_SECONDS, &[1]), Scene::default()).is_ok());
    }

    #[test]
    fn empty_level_fails_fast() {
        let result = Level::new(descriptor(60.0, &[]), Scene::default());
        assert!(matches!(result, Err(LevelError::NoObjects { .. })));
    }

    #[test]
    fn anchors_must_match_objects() {
        let anchor = |id| FixedAnchor {
            object_id: ObjectId(id),
            transform: Transform::default(),
        };
        let unknown = Scene {
            fixed: vec![anchor(7)],
            candidate_positions: Vec::new(),
        };
        assert!(matches!(
            Level::new(descriptor(60.0, &[1]), unknown),
            Err(LevelError::UnknownAnchor { .. })
        ));

        let repeated = Scene {
            fixed: vec![anchor(1), anchor(1)],
            candidate_positions: Vec::new(),
        };
        assert!(matches!(
            Level::new(descriptor(60.0, &[1]), repeated),
            Err(LevelError::DuplicateAnchor { .. })
        ));
    }

    #[test]
    fn malformed_yaml_is_reported() {
        assert!(matches!(
            Level::parse("id: [unterminated"),
            Err(LevelError::Yaml { .. })
        ));
    }

    #[test]
    fn catalog_rejects_duplicate_ids() {
        let mut catalog = LevelCatalog::new();
        catalog.insert(Level::parse(ATTIC).unwrap()).unwrap();
        let again = catalog.insert(Level::parse(ATTIC).unwrap());
        assert!(matches!(again, Err(LevelError::DuplicateLevel(id)) if id == "attic"));
        assert_eq!(catalog.ids().collect::<Vec<_>>(), vec!["attic"]);
        assert!(catalog.get("attic").is_some());
        assert!(catalog.get("cellar").is_none());
    }

    #[test]
    fn load_project_levels() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("levels");
        if dir.exists() {
            let catalog = LevelCatalog::load_dir(&dir);
            assert!(catalog.is_ok(), "Failed to load project levels: {catalog:?}");
        }
    }
}
