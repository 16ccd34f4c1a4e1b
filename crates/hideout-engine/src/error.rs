//! Error types for the engine binary.
//!
//! [`EngineError`] wraps every failure mode of startup and autoplay so
//! `main` can propagate with `?`.

/// Top-level error for the engine binary.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: hideout_core::config::ConfigError,
    },

    /// A level file was rejected.
    #[error("level error: {source}")]
    Level {
        /// The underlying level error.
        #[from]
        source: hideout_core::level::LevelError,
    },

    /// A session command failed.
    #[error("session error: {source}")]
    Session {
        /// The underlying session error.
        #[from]
        source: hideout_core::session::SessionError,
    },

    /// The session runner task panicked or was cancelled.
    #[error("runner task failed: {message}")]
    Join {
        /// Description of the join failure.
        message: String,
    },
}
