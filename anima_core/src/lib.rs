#![forbid(unsafe_code)]

//! Core domain model and business logic for the Anima wellness companion.
//!
//! This crate provides:
//! - Domain types (activities, progression state, breath patterns)
//! - Progression engine (XP, levels, streaks)
//! - Breath timing engine driven by an injected scheduler
//! - Persistence (key-value store, activity journal, CSV export)
//! - Configuration and logging

pub mod types;
pub mod error;
pub mod catalog;
pub mod config;
pub mod logging;
pub mod storage;
pub mod clock;
pub mod progression;
pub mod engine;
pub mod scheduler;
pub mod breath;
pub mod journal;
pub mod export;
pub mod history;
pub mod welcome;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use catalog::{get_default_catalog, Catalog};
pub use config::{BreathConfig, Config};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
pub use clock::{Clock, FixedClock, SystemClock};
pub use engine::ProgressionEngine;
pub use scheduler::{ManualScheduler, Scheduler, SystemScheduler, TimerId, TimerSource};
pub use breath::{credits_activity, BreathEvent, BreathTimer, SessionOutcome};
pub use journal::{ActivitySink, JsonlJournal};
pub use welcome::check_daily_welcome;
