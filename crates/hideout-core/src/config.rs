//! Configuration loading and typed config structures.
//!
//! The configuration lives in `hideout-config.yaml` at the project root.
//! Every field has a default, so a missing file or an empty document
//! yields a working setup.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A value parsed but is not usable.
    #[error("invalid config value for {field}: {reason}")]
    InvalidValue {
        /// Dotted path of the offending field.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct HideoutConfig {
    /// Session timing.
    #[serde(default)]
    pub session: SessionConfig,

    /// Placement randomness.
    #[serde(default)]
    pub placement: PlacementConfig,

    /// Which level to play.
    #[serde(default)]
    pub level: LevelConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Headless autoplay used by the engine binary.
    #[serde(default)]
    pub autoplay: AutoplayConfig,
}

impl HideoutConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values:
    /// - `HIDEOUT_LEVEL` overrides `level.path`
    /// - `HIDEOUT_SEED` overrides `placement.seed`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::InvalidValue`] if validation fails.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string, apply environment
    /// overrides, and validate.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::InvalidValue`] if validation fails.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yml::from_str(yaml)?
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Override values with environment variables when set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if `HIDEOUT_SEED` is not an
    /// unsigned integer.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(path) = std::env::var("HIDEOUT_LEVEL") {
            self.level.path = PathBuf::from(path);
        }
        if let Ok(seed) = std::env::var("HIDEOUT_SEED") {
            let seed = seed.trim().parse().map_err(|e| ConfigError::InvalidValue {
                field: "placement.seed",
                reason: format!("HIDEOUT_SEED is not an unsigned integer: {e}"),
            })?;
            self.placement.seed = Some(seed);
        }
        Ok(())
    }

    /// Check cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for the first violated rule.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.session.tick_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "session.tick_interval_ms",
                reason: "must be at least 1".to_owned(),
            });
        }
        if self.autoplay.min_find_delay_ms > self.autoplay.max_find_delay_ms {
            return Err(ConfigError::InvalidValue {
                field: "autoplay.min_find_delay_ms",
                reason: format!(
                    "{} exceeds autoplay.max_find_delay_ms ({})",
                    self.autoplay.min_find_delay_ms, self.autoplay.max_find_delay_ms
                ),
            });
        }
        if !(0.0..=1.0).contains(&self.autoplay.miss_chance) {
            return Err(ConfigError::InvalidValue {
                field: "autoplay.miss_chance",
                reason: format!("{} is outside [0, 1]", self.autoplay.miss_chance),
            });
        }
        Ok(())
    }
}

/// Session timing configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SessionConfig {
    /// Milliseconds between countdown ticks.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Milliseconds between a terminal trigger and the game-complete
    /// notification, leaving room for an end-of-round animation.
    #[serde(default = "default_grace_delay_ms")]
    pub grace_delay_ms: u64,
}

impl SessionConfig {
    /// Tick cadence as a [`Duration`].
    pub const fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Grace delay as a [`Duration`].
    pub const fn grace_delay(&self) -> Duration {
        Duration::from_millis(self.grace_delay_ms)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            grace_delay_ms: default_grace_delay_ms(),
        }
    }
}

/// Placement randomness configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PlacementConfig {
    /// Seed for reproducible arrangements. Unset draws from OS entropy.
    #[serde(default)]
    pub seed: Option<u64>,
}

/// Level selection.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LevelConfig {
    /// Level file to play.
    #[serde(default = "default_level_path")]
    pub path: PathBuf,

    /// Optional directory of level files to index at startup.
    #[serde(default)]
    pub catalog_dir: Option<PathBuf>,
}

impl Default for LevelConfig {
    fn default() -> Self {
        Self {
            path: default_level_path(),
            catalog_dir: None,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error) used when `RUST_LOG`
    /// is not set.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Headless autoplay: a scripted seeker standing in for the player.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AutoplayConfig {
    /// Whether the engine drives sessions on its own.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Sessions to play; every session after the first is a restart.
    #[serde(default = "default_rounds")]
    pub rounds: u32,

    /// Shortest pause before each find attempt.
    #[serde(default = "default_min_find_delay_ms")]
    pub min_find_delay_ms: u64,

    /// Longest pause before each find attempt.
    #[serde(default = "default_max_find_delay_ms")]
    pub max_find_delay_ms: u64,

    /// Probability that an attempt misses and the object is retried later.
    #[serde(default = "default_miss_chance")]
    pub miss_chance: f64,

    /// Seed for the seeker's choices. Unset draws from OS entropy.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for AutoplayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            rounds: default_rounds(),
            min_find_delay_ms: default_min_find_delay_ms(),
            max_find_delay_ms: default_max_find_delay_ms(),
            miss_chance: default_miss_chance(),
            seed: None,
        }
    }
}

const fn default_tick_interval_ms() -> u64 {
    1000
}

const fn default_grace_delay_ms() -> u64 {
    500
}

fn default_level_path() -> PathBuf {
    PathBuf::from("levels/attic.yaml")
}

fn default_log_level() -> String {
    "info".to_owned()
}

const fn default_true() -> bool {
    true
}

const fn default_rounds() -> u32 {
    2
}

const fn default_min_find_delay_ms() -> u64 {
    400
}

const fn default_max_find_delay_ms() -> u64 {
    2500
}

const fn default_miss_chance() -> f64 {
    0.25
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = HideoutConfig::default();
        assert_eq!(config.session.tick_interval(), Duration::from_secs(1));
        assert_eq!(config.session.grace_delay(), Duration::from_millis(500));
        assert_eq!(config.level.path, PathBuf::from("levels/attic.yaml"));
        assert_eq!(config.logging.level, "info");
        assert!(config.autoplay.enabled);
        assert_eq!(config.autoplay.rounds, 2);
    }

    #[test]
    fn parse_full_yaml() {
        let yaml = r#"
session:
  tick_interval_ms: 250
  grace_delay_ms: 0
placement:
  seed: 99
level:
  path: "levels/cellar.yaml"
  catalog_dir: "levels"
logging:
  level: "debug"
autoplay:
  enabled: false
  rounds: 5
  min_find_delay_ms: 10
  max_find_delay_ms: 20
  miss_chance: 0.5
  seed: 3
"#;
        let config = HideoutConfig::parse(yaml).unwrap();
        assert_eq!(config.session.tick_interval_ms, 250);
        assert_eq!(config.session.grace_delay(), Duration::ZERO);
        assert_eq!(config.level.catalog_dir, Some(PathBuf::from("levels")));
        assert_eq!(config.logging.level, "debug");
        assert!(!config.autoplay.enabled);
        assert_eq!(config.autoplay.rounds, 5);
        assert_eq!(config.autoplay.seed, Some(3));
    }

    #[test]
    fn parse_minimal_yaml() {
        let config = HideoutConfig::parse("session:\n  grace_delay_ms: 750\n").unwrap();
        assert_eq!(config.session.grace_delay_ms, 750);
        assert_eq!(config.session.tick_interval_ms, 1000);
        assert_eq!(config.autoplay, AutoplayConfig::default());
    }

    #[test]
    fn parse_empty_yaml() {
        assert!(HideoutConfig::parse("").is_ok());
    }

    #[test]
    fn zero_tick_interval_is_rejected() {
        let result = HideoutConfig::parse("session:\n  tick_interval_ms: 0\n");
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue {
                field: "session.tick_interval_ms",
                ..
            })
        ));
    }

    #[test]
    fn inverted_find_delays_are_rejected() {
        let yaml = "autoplay:\n  min_find_delay_ms: 900\n  max_find_delay_ms: 100\n";
        assert!(HideoutConfig::parse(yaml).is_err());
    }

    #[test]
    fn miss_chance_must_be_a_probability() {
        assert!(HideoutConfig::parse("autoplay:\n  miss_chance: 1.5\n").is_err());
    }

    #[test]
    fn load_project_config_file() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("hideout-config.yaml");
        if path.exists() {
            let config = HideoutConfig::from_file(&path);
            assert!(config.is_ok(), "Failed to load project config: {config:?}");
        }
    }
}
