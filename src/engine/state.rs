//! Run/stop state, countdown and cycle counter.

use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Interval used when the requested value is unparsable or below one second.
pub const DEFAULT_INTERVAL_SECONDS: u64 = 5;

/// Turn user-entered interval text into an effective interval in seconds.
///
/// Anything that is not an integer of at least 1 falls back to
/// [`DEFAULT_INTERVAL_SECONDS`].
pub fn parse_interval(text: &str) -> u64 {
    match text.trim().parse::<i64>() {
        Ok(value) if value >= 1 => value as u64,
        _ => DEFAULT_INTERVAL_SECONDS,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Idle,
    Running,
}

/// What a single one-second tick produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Countdown advanced; the new remaining value is attached.
    Countdown(u64),
    /// Countdown is exhausted and a cycle must run now.
    CycleDue,
    /// Engine is idle; nothing happened.
    Idle,
}

/// The single mutable record shared between control and worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineState {
    phase: Phase,
    interval_seconds: u64,
    remaining_seconds: u64,
    cycle_count: u64,
    /// Bumped on every start so stale workers can tell they were replaced.
    generation: u64,
}

impl Default for EngineState {
    fn default() -> Self {
        Self::new(DEFAULT_INTERVAL_SECONDS)
    }
}

impl EngineState {
    pub fn new(interval_seconds: u64) -> Self {
        let interval_seconds = interval_seconds.max(1);
        Self {
            phase: Phase::Idle,
            interval_seconds,
            remaining_seconds: interval_seconds,
            cycle_count: 0,
            generation: 0,
        }
    }

    pub const fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_running(&self) -> bool {
        self.phase == Phase::Running
    }

    pub const fn interval_seconds(&self) -> u64 {
        self.interval_seconds
    }

    pub const fn remaining_seconds(&self) -> u64 {
        self.remaining_seconds
    }

    pub const fn cycle_count(&self) -> u64 {
        self.cycle_count
    }

    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Set the interval used by the next start. Returns the effective value.
    pub fn configure(&mut self, interval_text: &str) -> u64 {
        self.interval_seconds = parse_interval(interval_text);
        self.interval_seconds
    }

    /// Enter `Running`, resetting countdown and counter regardless of prior state.
    ///
    /// Returns the new generation.
    pub fn start(&mut self) -> u64 {
        self.phase = Phase::Running;
        self.remaining_seconds = self.interval_seconds;
        self.cycle_count = 0;
        self.generation = self.generation.wrapping_add(1);
        self.generation
    }

    /// Enter `Idle`. Counters stay as they are. Returns false if already idle.
    pub fn stop(&mut self) -> bool {
        let was_running = self.is_running();
        self.phase = Phase::Idle;
        was_running
    }

    /// Advance the countdown by one second.
    pub fn tick(&mut self) -> TickOutcome {
        if !self.is_running() {
            return TickOutcome::Idle;
        }
        if self.remaining_seconds > 0 {
            self.remaining_seconds -= 1;
        }
        if self.remaining_seconds == 0 {
            TickOutcome::CycleDue
        } else {
            TickOutcome::Countdown(self.remaining_seconds)
        }
    }

    /// Record a finished cycle and rearm the countdown. Returns the new count.
    pub fn complete_cycle(&mut self) -> u64 {
        self.cycle_count = self.cycle_count.saturating_add(1);
        self.remaining_seconds = self.interval_seconds;
        self.cycle_count
    }
}

/// Engine state shared between the control surface and the worker.
pub type SharedState = Arc<Mutex<EngineState>>;

/// Lock the shared record, recovering it if a holder panicked.
pub fn lock_state(state: &Mutex<EngineState>) -> MutexGuard<'_, EngineState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}
