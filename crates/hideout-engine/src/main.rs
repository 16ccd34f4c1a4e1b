//! Headless engine for the Hideout hidden-object game.
//!
//! Wires configuration, level data, the session runner, a logging listener
//! in place of the presentation layer, and an autoplay seeker in place of
//! the player.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `hideout-config.yaml` (defaults if absent)
//! 2. Initialize structured logging (tracing)
//! 3. Load the configured level, and the level catalog if one is set
//! 4. Build the session machine and spawn its runner
//! 5. Subscribe the logging listener to every notification
//! 6. Play `autoplay.rounds` sessions per level, restarting after the first
//! 7. Shut the runner down

mod autoplay;
mod error;
mod log_listener;

use std::path::Path;
use std::sync::Arc;

use hideout_core::bus::EventBus;
use hideout_core::config::HideoutConfig;
use hideout_core::level::{Level, LevelCatalog};
use hideout_core::runner::{SessionHandle, SessionRunner};
use hideout_core::session::{SessionMachine, SessionTiming};
use hideout_placement::PlacementPlanner;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::autoplay::AutoplaySeeker;
use crate::error::EngineError;
use crate::log_listener::LogListener;

/// Configuration file read from the working directory.
const CONFIG_PATH: &str = "hideout-config.yaml";

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration, level loading, or a session fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration. Logging is not up yet, so only remember
    // where the values came from.
    let (config, from_file) = load_config()?;

    // 2. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with_target(true)
        .init();

    info!("hideout-engine starting");
    if from_file {
        info!(path = CONFIG_PATH, "Configuration loaded");
    } else {
        info!("Config file not found, using defaults");
    }
    info!(
        tick_interval_ms = config.session.tick_interval_ms,
        grace_delay_ms = config.session.grace_delay_ms,
        seed = ?config.placement.seed,
        level = %config.level.path.display(),
        "Session settings"
    );

    // 3. Load levels.
    let levels = load_levels(&config)?;
    let Some(first) = levels.first().cloned() else {
        warn!("No levels to play");
        return Ok(());
    };

    // 4. Build the machine and spawn the runner.
    let machine = SessionMachine::new(
        first,
        SessionTiming::from(&config.session),
        PlacementPlanner::new(config.placement.seed),
    );
    let bus = EventBus::new();

    // 5. Log every notification.
    let logging = bus.subscribe_all(Arc::new(LogListener::new()));
    let (handle, task) = SessionRunner::spawn(machine, bus);

    // 6. Play.
    if config.autoplay.enabled {
        play(&handle, &config, &levels).await?;
    } else {
        info!("Autoplay disabled, nothing to drive");
    }

    // 7. Shut down.
    handle.shutdown();
    task.await.map_err(|e| EngineError::Join {
        message: e.to_string(),
    })?;
    drop(logging);
    info!("hideout-engine stopped");
    Ok(())
}

/// Load `hideout-config.yaml`, falling back to defaults when it is absent.
///
/// Returns the configuration and whether it came from the file.
fn load_config() -> Result<(HideoutConfig, bool), EngineError> {
    let config_path = Path::new(CONFIG_PATH);
    if config_path.exists() {
        Ok((HideoutConfig::from_file(config_path)?, true))
    } else {
        let mut config = HideoutConfig::default();
        config.apply_env_overrides()?;
        config.validate()?;
        Ok((config, false))
    }
}

/// Levels to play in order: the configured level, then every other level
/// of the catalog, if a catalog directory is set.
fn load_levels(config: &HideoutConfig) -> Result<Vec<Level>, EngineError> {
    let primary = Level::from_file(&config.level.path)?;
    info!(
        level = primary.id(),
        objects = primary.descriptor().object_count(),
        budget_seconds = primary.time_budget_seconds(),
        candidate_positions = primary.scene().candidate_positions.len(),
        "Level loaded"
    );

    let mut levels = vec![primary];
    if let Some(dir) = &config.level.catalog_dir {
        let catalog = LevelCatalog::load_dir(dir)?;
        info!(dir = %dir.display(), levels = catalog.len(), "Level catalog loaded");
        let primary_id = levels.first().map(|level| level.id().to_owned());
        let others: Vec<Level> = catalog
            .ids()
            .filter(|id| primary_id.as_deref() != Some(*id))
            .filter_map(|id| catalog.get(id).cloned())
            .collect();
        levels.extend(others);
    }
    Ok(levels)
}

/// Play every level for the configured number of rounds.
async fn play(
    handle: &SessionHandle,
    config: &HideoutConfig,
    levels: &[Level],
) -> Result<(), EngineError> {
    let mut seeker = AutoplaySeeker::new(handle.clone(), &config.autoplay);
    let mut wins = 0_u32;
    let mut played = 0_u32;

    for (index, level) in levels.iter().enumerate() {
        if index > 0 {
            handle.load_level(level.clone()).await?;
        }
        for round in 1..=config.autoplay.rounds {
            let summary = seeker.play_round(round > 1).await?;
            played = played.saturating_add(1);
            if summary.success {
                wins = wins.saturating_add(1);
            }
            info!(
                level = level.id(),
                round,
                success = summary.success,
                found = summary.found,
                total = summary.total,
                attempts = summary.attempts,
                elapsed_ms = summary.elapsed.as_millis(),
                "Round finished"
            );
        }
    }

    info!(played, wins, "Autoplay finished");
    Ok(())
}
