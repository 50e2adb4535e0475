//! Progression engine: the single owner of XP, level and streak.
//!
//! The engine is constructed explicitly by the composition root with its
//! storage and calendar collaborators. Every mutation:
//! - recomputes `level` from `xp` in the same step
//! - rewrites the full `ProgressionState` record
//! - notifies subscribed observers
//!
//! Storage failures are logged and swallowed; the in-memory state stays
//! authoritative so the app keeps working in a degraded mode.

use crate::clock::Clock;
use crate::progression::{apply_xp_delta, level_of, level_title, next_streak, xp_for};
use crate::storage::KeyValueStore;
use crate::{ActivityKind, ActivityRecord, ProgressionState, Unlock};
use chrono::{NaiveDate, Utc};
use uuid::Uuid;

/// Storage key for the persisted progression record
pub const PROGRESSION_STATE_KEY: &str = "progression-state";

type Observer = Box<dyn FnMut(&ProgressionState)>;

pub struct ProgressionEngine<S, C> {
    store: S,
    clock: C,
    state: ProgressionState,
    observers: Vec<Observer>,
}

impl<S: KeyValueStore, C: Clock> ProgressionEngine<S, C> {
    /// Build an engine, loading whatever state the store holds
    pub fn new(store: S, clock: C) -> Self {
        let state = load_state(&store);
        Self {
            store,
            clock,
            state,
            observers: Vec::new(),
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn xp(&self) -> u64 {
        self.state.xp
    }

    pub fn level(&self) -> u8 {
        self.state.level
    }

    pub fn streak(&self) -> u32 {
        self.state.streak
    }

    pub fn last_active_date(&self) -> Option<NaiveDate> {
        self.state.last_active_date
    }

    pub fn unlocks(&self) -> &[Unlock] {
        &self.state.unlocks
    }

    pub fn state(&self) -> &ProgressionState {
        &self.state
    }

    pub fn level_title(&self) -> &'static str {
        level_title(self.state.level)
    }

    pub fn progress_to_next(&self) -> f64 {
        crate::progression::progress_to_next(self.state.xp)
    }

    pub fn collectibles(&self) -> u64 {
        crate::progression::collectibles(self.state.xp)
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Register a callback run after every persisted mutation
    pub fn subscribe<F>(&mut self, observer: F)
    where
        F: FnMut(&ProgressionState) + 'static,
    {
        self.observers.push(Box::new(observer));
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Add (or, for corrections, subtract) XP. Never fails.
    pub fn award_xp(&mut self, amount: i64) {
        self.apply_xp(amount);
        tracing::info!("Awarded {} XP, total {}", amount, self.state.xp);
        self.commit();
    }

    /// Credit a completed activity for today
    ///
    /// Repeating an activity on the same day earns XP each time but never
    /// advances the streak twice.
    pub fn record_activity(&mut self, kind: ActivityKind) -> ActivityRecord {
        let today = self.clock.today();

        self.state.streak = next_streak(self.state.last_active_date, today, self.state.streak);
        let gained = xp_for(kind);
        self.apply_xp(gained as i64);
        self.state.last_active_date = Some(today);

        tracing::info!(
            "Recorded {} on {}: +{} XP (total {}), streak {}",
            kind,
            today,
            gained,
            self.state.xp,
            self.state.streak
        );
        self.commit();

        ActivityRecord {
            id: Uuid::new_v4(),
            kind,
            recorded_on: today,
            recorded_at: Utc::now(),
            xp_gained: gained,
            streak: self.state.streak,
        }
    }

    /// Wipe all progress back to a fresh start
    pub fn reset_progress(&mut self) {
        self.state = ProgressionState::default();
        tracing::info!("Progress reset");
        self.commit();
    }

    // ── Internal ─────────────────────────────────────────────────────

    /// The only place `xp` changes; `level` follows in the same step.
    fn apply_xp(&mut self, amount: i64) {
        let previous_level = self.state.level;
        self.state.xp = apply_xp_delta(self.state.xp, amount);
        self.state.level = level_of(self.state.xp);

        if self.state.level != previous_level {
            tracing::info!(
                "Level changed {} -> {} ({})",
                previous_level,
                self.state.level,
                level_title(self.state.level)
            );
        }
    }

    fn commit(&mut self) {
        save_state(&mut self.store, &self.state);
        for observer in self.observers.iter_mut() {
            observer(&self.state);
        }
    }
}

/// Read the progression record, falling back to a fresh state
///
/// A missing, unreadable or malformed record is never an error. The stored
/// `level` is ignored in favour of one derived from `xp`.
pub fn load_state<S: KeyValueStore>(store: &S) -> ProgressionState {
    let raw = match store.get(PROGRESSION_STATE_KEY) {
        Ok(Some(raw)) => raw,
        Ok(None) => {
            tracing::info!("No progression state found, using default state");
            return ProgressionState::default();
        }
        Err(e) => {
            tracing::warn!("Failed to read progression state: {}. Using defaults.", e);
            return ProgressionState::default();
        }
    };

    match serde_json::from_str::<ProgressionState>(&raw) {
        Ok(mut state) => {
            let derived = level_of(state.xp);
            if state.level != derived {
                tracing::warn!(
                    "Stored level {} disagrees with xp {}; using {}",
                    state.level,
                    state.xp,
                    derived
                );
                state.level = derived;
            }
            tracing::debug!("Loaded progression state: {:?}", state);
            state
        }
        Err(e) => {
            tracing::warn!("Failed to parse progression state: {}. Using defaults.", e);
            ProgressionState::default()
        }
    }
}

/// Rewrite the full progression record, logging failures
pub fn save_state<S: KeyValueStore>(store: &mut S, state: &ProgressionState) {
    let contents = match serde_json::to_string(state) {
        Ok(contents) => contents,
        Err(e) => {
            tracing::warn!("Failed to serialize progression state: {}", e);
            return;
        }
    };

    if let Err(e) = store.set(PROGRESSION_STATE_KEY, &contents) {
        tracing::warn!("Failed to persist progression state: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::storage::MemoryStore;
    use crate::{Error, Result};
    use proptest::prelude::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    fn engine_on(d: u32) -> (ProgressionEngine<MemoryStore, FixedClock>, FixedClock) {
        crate::logging::init_test();
        let clock = FixedClock::new(day(d));
        (
            ProgressionEngine::new(MemoryStore::new(), clock.clone()),
            clock,
        )
    }

    fn assert_level_consistent<S: KeyValueStore, C: Clock>(engine: &ProgressionEngine<S, C>) {
        assert_eq!(engine.level(), level_of(engine.xp()));
    }

    /// Store whose every operation fails
    struct BrokenStore;

    impl KeyValueStore for BrokenStore {
        fn get(&self, _key: &str) -> Result<Option<String>> {
            Err(Error::Other("disk unavailable".into()))
        }

        fn set(&mut self, _key: &str, _value: &str) -> Result<()> {
            Err(Error::Other("disk unavailable".into()))
        }
    }

    #[test]
    fn test_fresh_engine_defaults() {
        let (engine, _) = engine_on(1);
        assert_eq!(engine.xp(), 0);
        assert_eq!(engine.level(), 0);
        assert_eq!(engine.streak(), 0);
        assert_eq!(engine.last_active_date(), None);
        assert!(engine.unlocks().is_empty());
        assert_eq!(engine.level_title(), "Seed");
    }

    #[test]
    fn test_first_activity_starts_streak() {
        let (mut engine, _) = engine_on(1);

        let record = engine.record_activity(ActivityKind::Breathwork);

        assert_eq!(record.xp_gained, 40);
        assert_eq!(record.recorded_on, day(1));
        assert_eq!(record.streak, 1);
        assert_eq!(engine.xp(), 40);
        assert_eq!(engine.streak(), 1);
        assert_eq!(engine.last_active_date(), Some(day(1)));
        assert_level_consistent(&engine);
    }

    #[test]
    fn test_streak_continuity() {
        let (mut engine, clock) = engine_on(1);
        engine.record_activity(ActivityKind::Journal);
        assert_eq!(engine.streak(), 1);

        clock.advance_days(1);
        engine.record_activity(ActivityKind::Journal);
        assert_eq!(engine.streak(), 2);

        // Same day again: XP still accrues, streak stays put
        engine.record_activity(ActivityKind::Meditation);
        assert_eq!(engine.streak(), 2);
        assert_eq!(engine.xp(), 35 + 35 + 40);

        clock.advance_days(3);
        engine.record_activity(ActivityKind::Plant);
        assert_eq!(engine.streak(), 1);
        assert_eq!(engine.last_active_date(), Some(day(5)));
    }

    #[test]
    fn test_missed_day_not_decayed_until_next_activity() {
        let (mut engine, clock) = engine_on(1);
        engine.record_activity(ActivityKind::Journal);
        clock.advance_days(1);
        engine.record_activity(ActivityKind::Journal);

        clock.advance_days(5);
        let reloaded = ProgressionEngine::new(engine.store().clone(), clock.clone());
        assert_eq!(reloaded.streak(), 2);
    }

    #[test]
    fn test_award_xp_clamps_and_relevels() {
        let (mut engine, _) = engine_on(1);

        engine.award_xp(320);
        assert_eq!(engine.level(), 2);

        engine.award_xp(-250);
        assert_eq!(engine.xp(), 70);
        assert_eq!(engine.level(), 0);

        engine.award_xp(-500);
        assert_eq!(engine.xp(), 0);
        assert_level_consistent(&engine);
    }

    #[test]
    fn test_award_xp_does_not_touch_streak() {
        let (mut engine, _) = engine_on(1);
        engine.award_xp(20);
        assert_eq!(engine.streak(), 0);
        assert_eq!(engine.last_active_date(), None);
    }

    #[test]
    fn test_reset_progress() {
        let (mut engine, _) = engine_on(1);
        engine.award_xp(800);
        engine.record_activity(ActivityKind::Journal);

        engine.reset_progress();

        assert_eq!(engine.state(), &ProgressionState::default());
        let reloaded = ProgressionEngine::new(engine.store().clone(), FixedClock::new(day(1)));
        assert_eq!(reloaded.state(), &ProgressionState::default());
    }

    #[test]
    fn test_persistence_roundtrip() {
        let (mut engine, clock) = engine_on(1);
        engine.record_activity(ActivityKind::Journal);
        clock.advance_days(1);
        engine.record_activity(ActivityKind::Breathwork);
        engine.award_xp(90);
        let before = engine.state().clone();

        let reloaded = ProgressionEngine::new(engine.into_store(), clock);

        assert_eq!(reloaded.state(), &before);
        assert_level_consistent(&reloaded);
    }

    #[test]
    fn test_unlocks_survive_roundtrip() {
        let mut store = MemoryStore::new();
        store
            .set(
                PROGRESSION_STATE_KEY,
                r#"{"xp":120,"level":1,"streak":3,"lastActiveDate":"2026-03-01",
                   "unlocks":[{"id":"u1","type":"plant","refId":"7","name":"Reishi"}]}"#,
            )
            .unwrap();

        let mut engine = ProgressionEngine::new(store.clone(), FixedClock::new(day(2)));
        engine.record_activity(ActivityKind::Plant);

        let reloaded = ProgressionEngine::new(store, FixedClock::new(day(2)));
        assert_eq!(reloaded.unlocks().len(), 1);
        assert_eq!(reloaded.unlocks()[0].kind, "plant");
        assert_eq!(reloaded.unlocks()[0].ref_id, "7");
        assert_eq!(reloaded.streak(), 4);
    }

    #[test]
    fn test_malformed_record_falls_back_to_default() {
        let mut store = MemoryStore::new();
        store.set(PROGRESSION_STATE_KEY, "{ invalid json }").unwrap();

        let engine = ProgressionEngine::new(store, FixedClock::new(day(1)));
        assert_eq!(engine.state(), &ProgressionState::default());
    }

    #[test]
    fn test_stale_level_normalized_on_load() {
        let mut store = MemoryStore::new();
        store
            .set(
                PROGRESSION_STATE_KEY,
                r#"{"xp":750,"level":0,"streak":0,"unlocks":[]}"#,
            )
            .unwrap();

        let engine = ProgressionEngine::new(store, FixedClock::new(day(1)));
        assert_eq!(engine.level(), 3);
    }

    #[test]
    fn test_missing_unlocks_field_defaults() {
        let mut store = MemoryStore::new();
        store
            .set(PROGRESSION_STATE_KEY, r#"{"xp":10,"level":0,"streak":1}"#)
            .unwrap();

        let engine = ProgressionEngine::new(store, FixedClock::new(day(1)));
        assert_eq!(engine.xp(), 10);
        assert!(engine.unlocks().is_empty());
    }

    #[test]
    fn test_storage_failures_are_swallowed() {
        let mut engine = ProgressionEngine::new(BrokenStore, FixedClock::new(day(1)));
        assert_eq!(engine.state(), &ProgressionState::default());

        engine.record_activity(ActivityKind::Meditation);
        assert_eq!(engine.xp(), 40);
        assert_eq!(engine.streak(), 1);
    }

    #[test]
    fn test_observers_see_every_mutation() {
        let (mut engine, _) = engine_on(1);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        engine.subscribe(move |state| sink.borrow_mut().push(state.xp));

        engine.record_activity(ActivityKind::Journal);
        engine.award_xp(5);
        engine.reset_progress();

        assert_eq!(*seen.borrow(), vec![35, 40, 0]);
    }

    #[derive(Clone, Debug)]
    enum Step {
        Award(i64),
        Activity(ActivityKind),
        NextDay,
    }

    fn step() -> impl Strategy<Value = Step> {
        prop_oneof![
            (0i64..500).prop_map(Step::Award),
            prop::sample::select(ActivityKind::ALL.to_vec()).prop_map(Step::Activity),
            Just(Step::NextDay),
        ]
    }

    proptest! {
        #[test]
        fn level_is_monotonic_under_non_negative_awards(steps in prop::collection::vec(step(), 1..40)) {
            let clock = FixedClock::new(day(1));
            let mut engine = ProgressionEngine::new(MemoryStore::new(), clock.clone());
            let mut last_level = engine.level();

            for step in steps {
                match step {
                    Step::Award(amount) => engine.award_xp(amount),
                    Step::Activity(kind) => { engine.record_activity(kind); }
                    Step::NextDay => clock.advance_days(1),
                }
                prop_assert!(engine.level() >= last_level);
                prop_assert_eq!(engine.level(), level_of(engine.xp()));
                last_level = engine.level();
            }

            let reloaded = ProgressionEngine::new(engine.store().clone(), clock);
            prop_assert_eq!(reloaded.level(), level_of(reloaded.xp()));
        }
    }
}
