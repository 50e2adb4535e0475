//! Progression rules: XP awards, level thresholds and streak transitions.
//!
//! Everything here is a pure function of its inputs. The engine calls these
//! on every mutation so `level` can never drift from `xp`.

use crate::ActivityKind;
use chrono::{Duration, NaiveDate};

/// XP required to reach each level
pub const LEVEL_THRESHOLDS: [u64; 5] = [0, 100, 300, 700, 1200];

/// Display names for each level
pub const LEVEL_TITLES: [&str; 5] = ["Seed", "Sprout", "Bloom", "Grove", "Sacred Sanctuary"];

/// Highest reachable level
pub const MAX_LEVEL: u8 = (LEVEL_THRESHOLDS.len() - 1) as u8;

/// XP every activity earns before its bonus
pub const BASE_ACTIVITY_XP: u64 = 25;

/// XP per collectible token
pub const XP_PER_COLLECTIBLE: u64 = 120;

/// Level for a given XP total
///
/// Highest index whose threshold is at or below `xp`.
pub fn level_of(xp: u64) -> u8 {
    LEVEL_THRESHOLDS
        .iter()
        .rposition(|&threshold| xp >= threshold)
        .map(|idx| idx as u8)
        .unwrap_or(0)
        .min(MAX_LEVEL)
}

pub fn level_title(level: u8) -> &'static str {
    LEVEL_TITLES[usize::from(level.min(MAX_LEVEL))]
}

/// Fraction of the way from the current level to the next, in `[0, 1]`
///
/// The bar reads full once the last level is reached.
pub fn progress_to_next(xp: u64) -> f64 {
    let level = level_of(xp);
    if level == MAX_LEVEL {
        return 1.0;
    }
    let current = LEVEL_THRESHOLDS[usize::from(level)];
    let next = LEVEL_THRESHOLDS[usize::from(level) + 1];
    let span = next.saturating_sub(current).max(1);
    let within = xp.saturating_sub(current).min(span);
    within as f64 / span as f64
}

/// Tokens shown on the collectibles bar
pub fn collectibles(xp: u64) -> u64 {
    xp / XP_PER_COLLECTIBLE
}

/// Fixed XP for completing an activity
pub fn xp_for(kind: ActivityKind) -> u64 {
    let bonus = match kind {
        ActivityKind::Breathwork | ActivityKind::Meditation => 15,
        ActivityKind::Journal | ActivityKind::Recipe | ActivityKind::Plant => 10,
    };
    BASE_ACTIVITY_XP + bonus
}

/// Apply a signed XP delta, clamping at zero
pub fn apply_xp_delta(xp: u64, amount: i64) -> u64 {
    if amount >= 0 {
        xp.saturating_add(amount.unsigned_abs())
    } else {
        xp.saturating_sub(amount.unsigned_abs())
    }
}

/// Streak after an activity on `today`
///
/// Only the relationship between the previous active day and today
/// matters; a missed day is noticed on the next activity, not in the
/// background.
pub fn next_streak(last_active: Option<NaiveDate>, today: NaiveDate, streak: u32) -> u32 {
    match last_active {
        None => 1,
        Some(last) if last == today => streak,
        Some(last) if last + Duration::days(1) == today => streak.saturating_add(1),
        // Gap of two or more days, or a future date from clock skew
        Some(_) => 1,
    }
}
