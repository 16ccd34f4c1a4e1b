//! Session clock, state machine, and orchestration for the Hideout
//! hidden-object game.
//!
//! This crate owns the game loop: a level defines a time budget and a set
//! of objects; the player finds them; the session ends in success (all
//! found in time) or failure (time ran out first).
//!
//! # Modules
//!
//! - [`bus`] -- [`EventBus`]: listener registry and broadcast channel for
//!   session notifications.
//! - [`clock`] -- [`SessionClock`]: countdown derived from a monotonic start.
//! - [`config`] -- Configuration loading from `hideout-config.yaml`.
//! - [`level`] -- Validated [`Level`] loading and the [`LevelCatalog`].
//! - [`session`] -- [`SessionMachine`]: the deterministic state machine.
//! - [`runner`] -- [`SessionRunner`] and [`SessionHandle`]: the async
//!   driver that serialises commands and timers for one machine, plus the
//!   [`WeakSessionHandle`] given to listeners.
//!
//! [`EventBus`]: bus::EventBus
//! [`SessionClock`]: clock::SessionClock
//! [`Level`]: level::Level
//! [`LevelCatalog`]: level::LevelCatalog
//! [`SessionMachine`]: session::SessionMachine
//! [`SessionRunner`]: runner::SessionRunner
//! [`SessionHandle`]: runner::SessionHandle
//! [`WeakSessionHandle`]: runner::WeakSessionHandle

pub mod bus;
pub mod clock;
pub mod config;
pub mod level;
pub mod runner;
pub mod session;

pub use hideout_ledger::FoundOutcome;
