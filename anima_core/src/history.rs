//! Daily activity summaries derived from the journal.
//!
//! The progression streak counts days with *any* activity. The summaries
//! here answer a stricter question: on which days was the full ritual
//! (journal plus breathwork or meditation) done.

use crate::{ActivityKind, ActivityRecord, DailyActivity};
use chrono::{Duration, NaiveDate};
use std::collections::BTreeMap;

/// Longest window a summary covers
pub const MAX_HISTORY_DAYS: i64 = 366;

/// One summary per day in the `days`-long window ending on `today`
///
/// Days without any activity are included. Sorted newest first. `days` is
/// clamped to `1..=MAX_HISTORY_DAYS`.
pub fn daily_summaries(
    records: &[ActivityRecord],
    today: NaiveDate,
    days: i64,
) -> Vec<DailyActivity> {
    let span = Duration::days(days.clamp(1, MAX_HISTORY_DAYS) - 1);
    let cutoff = today.checked_sub_signed(span).unwrap_or(NaiveDate::MIN);
    let mut by_day: BTreeMap<NaiveDate, DailyActivity> = BTreeMap::new();

    let mut next = Some(cutoff);
    while let Some(date) = next.filter(|date| *date <= today) {
        by_day.insert(date, DailyActivity::new(date));
        next = date.succ_opt();
    }

    for record in records {
        if let Some(day) = by_day.get_mut(&record.recorded_on) {
            match record.kind {
                ActivityKind::Journal => day.journal_complete = true,
                ActivityKind::Breathwork => day.breathwork_complete = true,
                ActivityKind::Meditation => day.meditation_complete = true,
                ActivityKind::Recipe | ActivityKind::Plant => {}
            }
        }
    }

    tracing::debug!(
        "Summarized {} records over {} days",
        records.len(),
        by_day.len()
    );
    by_day.into_values().rev().collect()
}

/// Consecutive full ritual days counting back from the newest summary
pub fn ritual_streak(summaries: &[DailyActivity]) -> usize {
    summaries
        .iter()
        .take_while(|day| day.is_ritual_day())
        .count()
}
