//! Once-per-day welcome gate.

use crate::clock::Clock;
use crate::storage::KeyValueStore;
use chrono::NaiveDate;

pub const LAST_LOGIN_KEY: &str = "last-login-date";

/// Returns `true` the first time it is called on a given local day
///
/// The day is recorded under `last-login-date` as a JSON date string.
/// An unreadable record counts as "not seen today"; a failed write is
/// logged and the welcome is still shown.
pub fn check_daily_welcome<S: KeyValueStore, C: Clock>(store: &mut S, clock: &C) -> bool {
    let today = clock.today();

    if last_login(store) == Some(today) {
        return false;
    }

    match serde_json::to_string(&today) {
        Ok(value) => {
            if let Err(e) = store.set(LAST_LOGIN_KEY, &value) {
                tracing::warn!("Failed to record login date: {}", e);
            }
        }
        Err(e) => tracing::warn!("Failed to encode login date: {}", e),
    }

    tracing::debug!("Daily welcome for {}", today);
    true
}

fn last_login<S: KeyValueStore>(store: &S) -> Option<NaiveDate> {
    let raw = match store.get(LAST_LOGIN_KEY) {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(e) => {
            tracing::warn!("Failed to read login date: {}", e);
            return None;
        }
    };

    match serde_json::from_str(&raw) {
        Ok(date) => Some(date),
        Err(e) => {
            tracing::warn!("Ignoring malformed login date {:?}: {}", raw, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::storage::MemoryStore;
    use crate::{Error, Result};

    fn clock() -> FixedClock {
        FixedClock::new(NaiveDate::from_ymd_opt(2026, 5, 1).unwrap())
    }

    #[test]
    fn test_first_call_each_day_welcomes() {
        let mut store = MemoryStore::new();
        let clock = clock();

        assert!(check_daily_welcome(&mut store, &clock));
        assert!(!check_daily_welcome(&mut store, &clock));

        clock.advance_days(1);
        assert!(check_daily_welcome(&mut store, &clock));
        assert!(!check_daily_welcome(&mut store, &clock));
    }

    #[test]
    fn test_stored_as_json_date_string() {
        let mut store = MemoryStore::new();
        check_daily_welcome(&mut store, &clock());

        assert_eq!(
            store.get(LAST_LOGIN_KEY).unwrap().as_deref(),
            Some("\"2026-05-01\"")
        );
    }

    #[test]
    fn test_malformed_record_welcomes_and_repairs() {
        let mut store = MemoryStore::new();
        store.set(LAST_LOGIN_KEY, "yesterday-ish").unwrap();
        let clock = clock();

        assert!(check_daily_welcome(&mut store, &clock));
        assert!(!check_daily_welcome(&mut store, &clock));
    }

    struct BrokenStore;

    impl KeyValueStore for BrokenStore {
        fn get(&self, _key: &str) -> Result<Option<String>> {
            Err(Error::Other("read failed".into()))
        }

        fn set(&mut self, _key: &str, _value: &str) -> Result<()> {
            Err(Error::Other("write failed".into()))
        }
    }

    #[test]
    fn test_storage_failures_swallowed() {
        let mut store = BrokenStore;
        let clock = clock();
        assert!(check_daily_welcome(&mut store, &clock));
        assert!(check_daily_welcome(&mut store, &clock));
    }
}
