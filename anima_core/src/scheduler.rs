//! Scheduling collaborator for the breath timing engine.
//!
//! Timers are plain tokens. A scheduler never calls back into the engine;
//! the host asks it which timer is due next and dispatches that id to the
//! owner. Cancelling a timer removes it from the queue, so a cancelled id
//! can never be handed out again.
//!
//! Two implementations share one queue:
//! - `ManualScheduler`: virtual time, advanced explicitly (tests, simulation)
//! - `SystemScheduler`: `std::time::Instant`, sleeps until timers are due

use crate::{Error, Result};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Handle for a scheduled timer
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

pub trait Scheduler {
    /// Current reading of the scheduler's monotonic clock
    fn now(&self) -> Duration;

    /// Fire once after `delay`
    fn schedule_once(&mut self, delay: Duration) -> Result<TimerId>;

    /// Fire every `interval`, first after one interval
    fn schedule_repeating(&mut self, interval: Duration) -> Result<TimerId>;

    /// Cancel a one-shot or repeating timer. Unknown ids are ignored.
    fn cancel(&mut self, id: TimerId);

    /// Number of timers still live
    fn pending(&self) -> usize;
}

/// A scheduler the host can drive forward
pub trait TimerSource: Scheduler {
    /// Pop the earliest timer due at or before `until`, moving the clock to
    /// its due time. When nothing is due the clock moves to `until` and
    /// `None` is returned.
    fn fire_next(&mut self, until: Duration) -> Option<TimerId>;
}

impl<T: Scheduler + ?Sized> Scheduler for &mut T {
    fn now(&self) -> Duration {
        (**self).now()
    }

    fn schedule_once(&mut self, delay: Duration) -> Result<TimerId> {
        (**self).schedule_once(delay)
    }

    fn schedule_repeating(&mut self, interval: Duration) -> Result<TimerId> {
        (**self).schedule_repeating(interval)
    }

    fn cancel(&mut self, id: TimerId) {
        (**self).cancel(id)
    }

    fn pending(&self) -> usize {
        (**self).pending()
    }
}

impl<T: TimerSource + ?Sized> TimerSource for &mut T {
    fn fire_next(&mut self, until: Duration) -> Option<TimerId> {
        (**self).fire_next(until)
    }
}

#[derive(Clone, Debug)]
struct Entry {
    due: Duration,
    interval: Option<Duration>,
}

/// Due-time ordered timer table
#[derive(Clone, Debug, Default)]
struct TimerQueue {
    next_id: u64,
    entries: BTreeMap<TimerId, Entry>,
}

impl TimerQueue {
    fn insert(&mut self, due: Duration, interval: Option<Duration>) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.entries.insert(id, Entry { due, interval });
        id
    }

    fn cancel(&mut self, id: TimerId) -> bool {
        self.entries.remove(&id).is_some()
    }

    /// Earliest (due, id); ties resolve in scheduling order
    fn peek(&self) -> Option<(Duration, TimerId)> {
        self.entries
            .iter()
            .map(|(id, entry)| (entry.due, *id))
            .min()
    }

    /// Remove or re-arm the timer, returning it
    fn pop(&mut self, id: TimerId) -> Option<TimerId> {
        let entry = self.entries.get_mut(&id)?;
        match entry.interval {
            // Re-arm from the due time, not from when it was observed
            Some(interval) => entry.due += interval,
            None => {
                self.entries.remove(&id);
            }
        }
        Some(id)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

fn check_interval(interval: Duration) -> Result<()> {
    if interval.is_zero() {
        return Err(Error::Scheduler(
            "repeating timer interval must be non-zero".into(),
        ));
    }
    Ok(())
}

/// Virtual-time scheduler
#[derive(Clone, Debug, Default)]
pub struct ManualScheduler {
    now: Duration,
    queue: TimerQueue,
    refuse: bool,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// A scheduler that rejects every request, for exercising failure paths
    pub fn refusing() -> Self {
        Self {
            refuse: true,
            ..Self::default()
        }
    }

    /// Start or stop rejecting new timers; live timers are unaffected
    pub fn set_refusing(&mut self, refuse: bool) {
        self.refuse = refuse;
    }

    /// Move the clock forward without dispatching anything, as a host that
    /// was suspended would observe
    pub fn skip(&mut self, by: Duration) {
        self.now += by;
    }

    fn check_accepting(&self) -> Result<()> {
        if self.refuse {
            return Err(Error::Scheduler("scheduler is not accepting timers".into()));
        }
        Ok(())
    }
}

impl Scheduler for ManualScheduler {
    fn now(&self) -> Duration {
        self.now
    }

    fn schedule_once(&mut self, delay: Duration) -> Result<TimerId> {
        self.check_accepting()?;
        Ok(self.queue.insert(self.now + delay, None))
    }

    fn schedule_repeating(&mut self, interval: Duration) -> Result<TimerId> {
        self.check_accepting()?;
        check_interval(interval)?;
        Ok(self.queue.insert(self.now + interval, Some(interval)))
    }

    fn cancel(&mut self, id: TimerId) {
        self.queue.cancel(id);
    }

    fn pending(&self) -> usize {
        self.queue.len()
    }
}

impl TimerSource for ManualScheduler {
    fn fire_next(&mut self, until: Duration) -> Option<TimerId> {
        match self.queue.peek() {
            Some((due, id)) if due <= until => {
                self.now = self.now.max(due);
                self.queue.pop(id)
            }
            _ => {
                self.now = self.now.max(until);
                None
            }
        }
    }
}

/// Wall-clock scheduler backed by `Instant`
#[derive(Clone, Debug)]
pub struct SystemScheduler {
    origin: Instant,
    queue: TimerQueue,
}

impl SystemScheduler {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            queue: TimerQueue::default(),
        }
    }

    fn sleep_until(&self, target: Duration) {
        let now = self.now();
        if target > now {
            std::thread::sleep(target - now);
        }
    }
}

impl Default for SystemScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for SystemScheduler {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn schedule_once(&mut self, delay: Duration) -> Result<TimerId> {
        Ok(self.queue.insert(self.now() + delay, None))
    }

    fn schedule_repeating(&mut self, interval: Duration) -> Result<TimerId> {
        check_interval(interval)?;
        Ok(self.queue.insert(self.now() + interval, Some(interval)))
    }

    fn cancel(&mut self, id: TimerId) {
        self.queue.cancel(id);
    }

    fn pending(&self) -> usize {
        self.queue.len()
    }
}

impl TimerSource for SystemScheduler {
    fn fire_next(&mut self, until: Duration) -> Option<TimerId> {
        match self.queue.peek() {
            Some((due, id)) if due <= until => {
                self.sleep_until(due);
                self.queue.pop(id)
            }
            _ => {
                self.sleep_until(until);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    #[test]
    fn test_once_fires_at_due_time() {
        let mut sched = ManualScheduler::new();
        let id = sched.schedule_once(secs(3)).unwrap();

        assert_eq!(sched.fire_next(secs(2)), None);
        assert_eq!(sched.now(), secs(2));

        assert_eq!(sched.fire_next(secs(10)), Some(id));
        assert_eq!(sched.now(), secs(3));
        assert_eq!(sched.pending(), 0);
    }

    #[test]
    fn test_repeating_rearms_without_drift() {
        let mut sched = ManualScheduler::new();
        let id = sched.schedule_repeating(secs(1)).unwrap();

        for expected in 1..=3 {
            assert_eq!(sched.fire_next(secs(100)), Some(id));
            assert_eq!(sched.now(), secs(expected));
        }
        assert_eq!(sched.pending(), 1);
    }

    #[test]
    fn test_ties_fire_in_scheduling_order() {
        let mut sched = ManualScheduler::new();
        let tick = sched.schedule_repeating(secs(4)).unwrap();
        let deadline = sched.schedule_once(secs(4)).unwrap();

        assert_eq!(sched.fire_next(secs(4)), Some(tick));
        assert_eq!(sched.fire_next(secs(4)), Some(deadline));
    }

    #[test]
    fn test_cancelled_timer_never_fires() {
        let mut sched = ManualScheduler::new();
        let id = sched.schedule_once(secs(1)).unwrap();
        sched.cancel(id);
        sched.cancel(id);

        assert_eq!(sched.fire_next(secs(5)), None);
        assert_eq!(sched.pending(), 0);
    }

    #[test]
    fn test_zero_interval_refused() {
        let mut sched = ManualScheduler::new();
        assert!(matches!(
            sched.schedule_repeating(Duration::ZERO),
            Err(Error::Scheduler(_))
        ));

        let mut system = SystemScheduler::new();
        assert!(system.schedule_repeating(Duration::ZERO).is_err());
    }

    #[test]
    fn test_refusing_scheduler() {
        let mut sched = ManualScheduler::refusing();
        assert!(sched.schedule_once(secs(1)).is_err());
        assert!(sched.schedule_repeating(secs(1)).is_err());
    }

    #[test]
    fn test_system_scheduler_fires_after_delay() {
        let mut sched = SystemScheduler::new();
        let id = sched.schedule_once(Duration::from_millis(5)).unwrap();

        let fired = sched.fire_next(sched.now() + Duration::from_secs(1));
        assert_eq!(fired, Some(id));
        assert!(sched.now() >= Duration::from_millis(5));
    }
}
