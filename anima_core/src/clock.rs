//! Calendar collaborator: "what day is it" at day granularity.

use chrono::{Duration, Local, NaiveDate};
use std::cell::Cell;
use std::rc::Rc;

pub trait Clock {
    /// Today's date in the device's local time zone
    fn today(&self) -> NaiveDate;
}

/// Wall clock in the local time zone
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// Settable date; clones observe the same day
#[derive(Clone, Debug)]
pub struct FixedClock {
    today: Rc<Cell<NaiveDate>>,
}

impl FixedClock {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            today: Rc::new(Cell::new(today)),
        }
    }

    pub fn set(&self, today: NaiveDate) {
        self.today.set(today);
    }

    pub fn advance_days(&self, days: i64) {
        self.today.set(self.today.get() + Duration::days(days));
    }
}

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.today.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_clock_advance_is_shared() {
        let clock = FixedClock::new(NaiveDate::from_ymd_opt(2026, 2, 28).unwrap());
        let handle = clock.clone();

        handle.advance_days(1);
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2026, 3, 1).unwrap());
    }
}
