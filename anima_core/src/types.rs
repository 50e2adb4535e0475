//! Core domain types for the Anima wellness companion.
//!
//! This module defines the fundamental types used throughout the system:
//! - Activity kinds and the records they produce
//! - Persisted progression state and unlocks
//! - Breath patterns, phases and per-session state

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// Activities
// ============================================================================

/// Kind of activity that earns progression credit
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Journal,
    Breathwork,
    Meditation,
    Recipe,
    Plant,
}

impl ActivityKind {
    pub const ALL: [ActivityKind; 5] = [
        ActivityKind::Journal,
        ActivityKind::Breathwork,
        ActivityKind::Meditation,
        ActivityKind::Recipe,
        ActivityKind::Plant,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::Journal => "journal",
            ActivityKind::Breathwork => "breathwork",
            ActivityKind::Meditation => "meditation",
            ActivityKind::Recipe => "recipe",
            ActivityKind::Plant => "plant",
        }
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivityKind {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        let wanted = s.trim().to_lowercase();
        ActivityKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == wanted)
            .ok_or_else(|| crate::Error::Other(format!("Unknown activity kind: {}", s)))
    }
}

/// A credited activity, as appended to the activity journal
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ActivityRecord {
    pub id: Uuid,
    pub kind: ActivityKind,
    pub recorded_on: NaiveDate,
    pub recorded_at: DateTime<Utc>,
    pub xp_gained: u64,
    /// Streak after this activity was applied
    pub streak: u32,
}

/// Per-day rollup of which rituals were completed
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DailyActivity {
    pub date: NaiveDate,
    pub journal_complete: bool,
    pub breathwork_complete: bool,
    pub meditation_complete: bool,
}

impl DailyActivity {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            ..Default::default()
        }
    }

    /// A full ritual day: journaling plus breathwork or meditation
    pub fn is_ritual_day(&self) -> bool {
        self.journal_complete && (self.breathwork_complete || self.meditation_complete)
    }
}

// ============================================================================
// Progression
// ============================================================================

/// Content unlock record. Not produced by any current flow; kept so the
/// persisted shape survives a load/save cycle.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Unlock {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub ref_id: String,
    pub name: String,
}

/// Persisted progression singleton
///
/// `level` is stored for readers of the raw record but is always
/// recomputed from `xp` by the engine.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProgressionState {
    pub xp: u64,
    pub level: u8,
    pub streak: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_active_date: Option<NaiveDate>,
    #[serde(default)]
    pub unlocks: Vec<Unlock>,
}

// ============================================================================
// Breathwork
// ============================================================================

/// One of the four phases of a breathing cycle
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BreathPhase {
    Inhale,
    Hold1,
    Exhale,
    Hold2,
}

impl BreathPhase {
    pub const ORDER: [BreathPhase; 4] = [
        BreathPhase::Inhale,
        BreathPhase::Hold1,
        BreathPhase::Exhale,
        BreathPhase::Hold2,
    ];

    /// Position within `[inhale, hold1, exhale, hold2]`
    pub fn index(&self) -> usize {
        match self {
            BreathPhase::Inhale => 0,
            BreathPhase::Hold1 => 1,
            BreathPhase::Exhale => 2,
            BreathPhase::Hold2 => 3,
        }
    }

    /// Next phase in cyclic order
    pub fn next(&self) -> BreathPhase {
        Self::ORDER[(self.index() + 1) % Self::ORDER.len()]
    }

    /// Short cue shown while the phase is active
    pub fn instruction(&self) -> &'static str {
        match self {
            BreathPhase::Inhale => "Breathe in deeply",
            BreathPhase::Hold1 => "Hold gently",
            BreathPhase::Exhale => "Release slowly",
            BreathPhase::Hold2 => "Rest in stillness",
        }
    }
}

impl fmt::Display for BreathPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BreathPhase::Inhale => "inhale",
            BreathPhase::Hold1 => "hold1",
            BreathPhase::Exhale => "exhale",
            BreathPhase::Hold2 => "hold2",
        };
        f.pad(name)
    }
}

/// A guided breathing pattern
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct BreathPattern {
    pub id: String,
    pub name: String,
    pub description: String,
    /// Seconds for `[inhale, hold1, exhale, hold2]`; 0 skips the phase
    pub pattern: [u32; 4],
    pub cycles: u32,
    pub instructions: String,
}

impl BreathPattern {
    /// Configured duration of a phase in whole seconds
    pub fn duration_secs(&self, phase: BreathPhase) -> u32 {
        self.pattern[phase.index()]
    }

    /// Length of one full cycle in seconds
    pub fn cycle_secs(&self) -> u32 {
        self.pattern.iter().sum()
    }

    /// Check the pattern can drive a session without spinning
    pub fn validate(&self) -> crate::Result<()> {
        if self.cycles == 0 {
            return Err(crate::Error::InvalidPattern(format!(
                "{}: cycles must be at least 1",
                self.id
            )));
        }
        if self.cycle_secs() == 0 {
            return Err(crate::Error::InvalidPattern(format!(
                "{}: all phase durations are zero",
                self.id
            )));
        }
        Ok(())
    }
}

/// Observable state of an active breath session
#[derive(Clone, Debug, PartialEq)]
pub struct BreathSessionState {
    pub current_cycle: u32,
    pub phase: BreathPhase,
    /// Seconds left in the current phase, derived from the session clock
    pub time_left_in_phase: f64,
    pub running: bool,
}

impl BreathSessionState {
    pub fn initial(pattern: &BreathPattern) -> Self {
        Self {
            current_cycle: 0,
            phase: BreathPhase::Inhale,
            time_left_in_phase: f64::from(pattern.duration_secs(BreathPhase::Inhale)),
            running: false,
        }
    }
}
