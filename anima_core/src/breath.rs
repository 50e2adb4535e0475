//! Breath timing engine.
//!
//! Drives `inhale -> hold1 -> exhale -> hold2` for a pattern's durations and
//! cycle count, with no knowledge of rendering.
//!
//! ## Timing model
//!
//! The scheduler's monotonic clock is the only source of truth. Two timers
//! are armed while a session runs:
//! - a repeating display tick (1 Hz by default)
//! - a single one-shot deadline for the end of the current phase
//!
//! Neither timer carries state. Whichever fires, the engine re-derives the
//! time left and any due phase transitions from the clock. Each phase's start
//! is advanced by its configured duration rather than by the moment a
//! callback ran, so late callbacks never accumulate drift.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Running <-> Paused
//!           |            |
//!           v            v
//!      Completed      Cancelled   (both reset to Idle)
//! ```

use crate::config::BreathConfig;
use crate::scheduler::{Scheduler, TimerId, TimerSource};
use crate::{BreathPattern, BreathPhase, BreathSessionState, Error, Result};
use std::time::Duration;

/// Default display countdown interval
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Notifications emitted by the timer
#[derive(Clone, Debug, PartialEq)]
pub enum BreathEvent {
    /// A phase with a non-zero duration began
    PhaseChanged { phase: BreathPhase, cycle: u32 },
    /// Display countdown, ceiling-rounded seconds left in the phase
    Tick { seconds_left: u32 },
    Paused,
    Resumed,
    /// All cycles ran to the end
    Completed,
    /// The session was stopped before finishing
    Cancelled { cycles_completed: u32 },
}

/// How a session ended
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionOutcome {
    Completed,
    Cancelled { cycles_completed: u32 },
}

impl SessionOutcome {
    pub fn from_event(event: &BreathEvent) -> Option<Self> {
        match event {
            BreathEvent::Completed => Some(SessionOutcome::Completed),
            BreathEvent::Cancelled { cycles_completed } => Some(SessionOutcome::Cancelled {
                cycles_completed: *cycles_completed,
            }),
            _ => None,
        }
    }
}

/// Whether a finished session earns breathwork credit
pub fn credits_activity(outcome: SessionOutcome, config: &BreathConfig) -> bool {
    match outcome {
        SessionOutcome::Completed => true,
        SessionOutcome::Cancelled { .. } => config.credit_cancelled_sessions,
    }
}

/// Phase-based interval timer for one breathing pattern
pub struct BreathTimer<S: Scheduler> {
    pattern: BreathPattern,
    scheduler: S,
    tick_interval: Duration,
    state: BreathSessionState,
    started: bool,
    /// Clock reading at which the current phase began (pause-adjusted)
    phase_started_at: Duration,
    /// Elapsed time within the phase, frozen while paused
    paused_elapsed: Option<Duration>,
    tick_timer: Option<TimerId>,
    phase_timer: Option<TimerId>,
}

impl<S: Scheduler> BreathTimer<S> {
    pub fn new(pattern: BreathPattern, scheduler: S) -> Self {
        let state = BreathSessionState::initial(&pattern);
        Self {
            pattern,
            scheduler,
            tick_interval: DEFAULT_TICK_INTERVAL,
            state,
            started: false,
            phase_started_at: Duration::ZERO,
            paused_elapsed: None,
            tick_timer: None,
            phase_timer: None,
        }
    }

    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn pattern(&self) -> &BreathPattern {
        &self.pattern
    }

    pub fn state(&self) -> &BreathSessionState {
        &self.state
    }

    pub fn phase(&self) -> BreathPhase {
        self.state.phase
    }

    pub fn current_cycle(&self) -> u32 {
        self.state.current_cycle
    }

    /// Seconds left in the phase as of the last tick or transition
    pub fn time_left_in_phase(&self) -> f64 {
        self.state.time_left_in_phase
    }

    /// Time left rounded up for display
    pub fn display_seconds_left(&self) -> u32 {
        self.state.time_left_in_phase.ceil() as u32
    }

    pub fn running(&self) -> bool {
        self.state.running
    }

    /// True from `start()` until completion or `stop()`, including while paused
    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Ids of timers currently armed by this session
    pub fn live_timers(&self) -> Vec<TimerId> {
        self.tick_timer.into_iter().chain(self.phase_timer).collect()
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Begin a session from the initial state
    ///
    /// Fails without starting when the pattern cannot drive a session or
    /// the scheduler refuses a timer. A no-op while a session is underway.
    pub fn start(&mut self) -> Result<Vec<BreathEvent>> {
        if self.started {
            return Ok(Vec::new());
        }
        self.pattern.validate()?;

        self.state = BreathSessionState::initial(&self.pattern);
        self.state.running = true;
        self.started = true;
        self.paused_elapsed = None;
        self.phase_started_at = self.scheduler.now();

        let mut events = Vec::new();
        if self.pattern.duration_secs(BreathPhase::Inhale) > 0 {
            events.push(BreathEvent::PhaseChanged {
                phase: BreathPhase::Inhale,
                cycle: 0,
            });
        }
        // Passes over a zero-length inhale
        self.sync(&mut events);

        if let Err(e) = self.arm() {
            self.halt();
            return Err(e);
        }

        tracing::info!(
            "Breath session started: {} ({:?} x {})",
            self.pattern.name,
            self.pattern.pattern,
            self.pattern.cycles
        );
        Ok(events)
    }

    /// Pause a running session, or resume a paused one
    ///
    /// Phase, cycle and time left are preserved across the pause.
    pub fn toggle_pause(&mut self) -> Result<Vec<BreathEvent>> {
        if !self.started {
            return Ok(Vec::new());
        }

        let mut events = Vec::new();
        match self.paused_elapsed {
            None => {
                self.sync(&mut events);
                if !self.started {
                    // Finished on the final flush
                    return Ok(events);
                }
                self.disarm();
                self.paused_elapsed =
                    Some(self.scheduler.now().saturating_sub(self.phase_started_at));
                self.state.running = false;
                events.push(BreathEvent::Paused);
                tracing::debug!("Breath session paused in {}", self.state.phase);
            }
            Some(elapsed) => {
                self.phase_started_at = self.scheduler.now().saturating_sub(elapsed);
                self.paused_elapsed = None;
                self.state.running = true;
                if let Err(e) = self.arm() {
                    self.halt();
                    return Err(e);
                }
                events.push(BreathEvent::Resumed);
                tracing::debug!("Breath session resumed in {}", self.state.phase);
            }
        }
        Ok(events)
    }

    /// Abandon the session immediately
    ///
    /// Cancels every timer before returning and resets to the initial
    /// state. Ids issued before the stop are stale from then on.
    pub fn stop(&mut self) -> Vec<BreathEvent> {
        if !self.started {
            self.disarm();
            return Vec::new();
        }
        let cycles_completed = self.state.current_cycle;
        self.halt();
        tracing::info!(
            "Breath session cancelled after {} of {} cycles",
            cycles_completed,
            self.pattern.cycles
        );
        vec![BreathEvent::Cancelled { cycles_completed }]
    }

    /// Dispatch a fired timer
    ///
    /// Ids this session did not arm, or has since cancelled, are ignored.
    pub fn on_timer(&mut self, id: TimerId) -> Result<Vec<BreathEvent>> {
        let is_tick = self.tick_timer == Some(id);
        let is_deadline = self.phase_timer == Some(id);
        if !is_tick && !is_deadline {
            return Ok(Vec::new());
        }
        if is_deadline {
            self.phase_timer = None;
        }

        let before = (self.state.current_cycle, self.state.phase);
        let mut events = Vec::new();
        self.sync(&mut events);
        if !self.started {
            return Ok(events);
        }

        let moved = before != (self.state.current_cycle, self.state.phase);
        if moved || self.phase_timer.is_none() {
            if let Err(e) = self.arm_phase_deadline() {
                self.halt();
                return Err(e);
            }
        }

        if is_tick {
            events.push(BreathEvent::Tick {
                seconds_left: self.display_seconds_left(),
            });
        }
        Ok(events)
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn phase_duration(&self, phase: BreathPhase) -> Duration {
        Duration::from_secs(u64::from(self.pattern.duration_secs(phase)))
    }

    /// Bring the state up to the scheduler's clock
    ///
    /// Commits every phase that has fully elapsed, zero-length ones
    /// included, then recomputes time left in the phase it rests on.
    fn sync(&mut self, events: &mut Vec<BreathEvent>) {
        let now = self.scheduler.now();
        loop {
            let duration = self.phase_duration(self.state.phase);
            let elapsed = now.saturating_sub(self.phase_started_at);
            if elapsed < duration {
                self.state.time_left_in_phase = (duration - elapsed).as_secs_f64();
                return;
            }

            self.phase_started_at += duration;
            let next = self.state.phase.next();
            if next == BreathPhase::Inhale {
                self.state.current_cycle += 1;
                if self.state.current_cycle >= self.pattern.cycles {
                    self.complete();
                    events.push(BreathEvent::Completed);
                    return;
                }
            }
            self.state.phase = next;

            if self.pattern.duration_secs(next) > 0 {
                tracing::debug!(
                    "Breath phase {} (cycle {})",
                    next,
                    self.state.current_cycle
                );
                events.push(BreathEvent::PhaseChanged {
                    phase: next,
                    cycle: self.state.current_cycle,
                });
            }
        }
    }

    fn complete(&mut self) {
        self.halt();
        tracing::info!(
            "Breath session completed: {} cycles of {}",
            self.pattern.cycles,
            self.pattern.name
        );
    }

    /// Cancel timers and return to the initial state
    fn halt(&mut self) {
        self.disarm();
        self.state = BreathSessionState::initial(&self.pattern);
        self.started = false;
        self.paused_elapsed = None;
    }

    fn arm(&mut self) -> Result<()> {
        self.tick_timer = Some(self.scheduler.schedule_repeating(self.tick_interval)?);
        self.arm_phase_deadline()
    }

    /// Replace the phase deadline; at most one is ever live
    fn arm_phase_deadline(&mut self) -> Result<()> {
        if let Some(old) = self.phase_timer.take() {
            self.scheduler.cancel(old);
        }
        let end = self.phase_started_at + self.phase_duration(self.state.phase);
        let delay = end.saturating_sub(self.scheduler.now());
        if delay.is_zero() {
            return Err(Error::Scheduler(format!(
                "phase {} has no time left to schedule",
                self.state.phase
            )));
        }
        self.phase_timer = Some(self.scheduler.schedule_once(delay)?);
        Ok(())
    }

    fn disarm(&mut self) {
        if let Some(id) = self.tick_timer.take() {
            self.scheduler.cancel(id);
        }
        if let Some(id) = self.phase_timer.take() {
            self.scheduler.cancel(id);
        }
    }
}

impl<S: TimerSource> BreathTimer<S> {
    /// Let `duration` pass on the scheduler's clock, dispatching every timer
    /// that falls due along the way
    pub fn run_for(&mut self, duration: Duration) -> Result<Vec<BreathEvent>> {
        let until = self.scheduler.now() + duration;
        let mut events = Vec::new();
        while let Some(id) = self.scheduler.fire_next(until) {
            events.extend(self.on_timer(id)?);
        }
        Ok(events)
    }

    /// Dispatch timers as they fall due until the session ends or `limit`
    /// passes, handing each event over as it happens
    ///
    /// Returns early once the session is no longer underway, so a host
    /// waiting on real time does not sleep past completion.
    pub fn drive<F>(&mut self, limit: Duration, mut on_event: F) -> Result<()>
    where
        F: FnMut(&BreathEvent),
    {
        let until = self.scheduler.now() + limit;
        while self.started {
            let id = match self.scheduler.fire_next(until) {
                Some(id) => id,
                None => break,
            };
            for event in self.on_timer(id)? {
                on_event(&event);
            }
        }
        Ok(())
    }
}

impl<S: Scheduler> Drop for BreathTimer<S> {
    fn drop(&mut self) {
        self.disarm();
    }
}
