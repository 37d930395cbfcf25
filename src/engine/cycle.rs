//! One cycle of simulated activity and the per-second tick that triggers it.

use rand::Rng;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::planner::{MovementPlan, MovementPlanner};
use super::state::{lock_state, SharedState, TickOutcome};
use crate::config::ActionConfig;
use crate::input::{InputError, InputSimulator};
use crate::logging::CycleLogger;

/// Essential successes needed for a cycle to count as healthy.
const HEALTHY_THRESHOLD: u8 = 2;

/// Failure of a single action. Never escapes the cycle.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error(transparent)]
    Input(#[from] InputError),
    #[error("primary key failed ({primary}); fallback key failed ({fallback})")]
    Fallback {
        primary: InputError,
        fallback: InputError,
    },
}

/// Result of an optional action that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionalOutcome {
    Performed,
    /// Deliberately not attempted; not an error.
    Skipped(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum OptionalAction {
    UiClick,
    KeepActive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleHealth {
    Successful,
    Degraded,
}

impl CycleHealth {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Successful => "success",
            Self::Degraded => "degraded",
        }
    }
}

/// Tally of one cycle, used only to classify it for logging.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleOutcome {
    pub essential_successes: u8,
    pub mouse_moved: bool,
    pub key_pressed: bool,
    pub optional_actions_attempted: BTreeSet<OptionalAction>,
}

impl CycleOutcome {
    pub fn health(&self) -> CycleHealth {
        if self.essential_successes >= HEALTHY_THRESHOLD {
            CycleHealth::Successful
        } else {
            CycleHealth::Degraded
        }
    }
}

/// What the worker observed on one tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickReport {
    /// Countdown moved to the attached value.
    Countdown(u64),
    /// A cycle ran and was counted as cycle number `count`.
    Cycle { count: u64, outcome: CycleOutcome },
    /// Engine is idle; the worker should exit.
    Idle,
    /// A newer start replaced this worker's run; the worker should exit.
    Superseded,
}

/// The activity engine as seen by its worker thread.
///
/// Owns the input simulator and random source; shares only the engine
/// state record with the controller.
pub struct ActivityCycle<S, R> {
    state: SharedState,
    generation: u64,
    simulator: S,
    rng: R,
    planner: MovementPlanner,
    actions: ActionConfig,
    logger: Arc<CycleLogger>,
}

impl<S: InputSimulator, R: Rng> ActivityCycle<S, R> {
    /// Build an engine bound to the run identified by `generation`.
    pub fn new(
        state: SharedState,
        generation: u64,
        simulator: S,
        rng: R,
        actions: ActionConfig,
        logger: Arc<CycleLogger>,
    ) -> Self {
        Self {
            state,
            generation,
            simulator,
            rng,
            planner: MovementPlanner::default(),
            actions,
            logger,
        }
    }

    pub fn simulator(&self) -> &S {
        &self.simulator
    }

    /// Advance one second, running a cycle when the countdown is exhausted.
    ///
    /// The state lock is released while actions run.
    pub fn tick(&mut self) -> TickReport {
        let outcome = {
            let mut state = lock_state(&self.state);
            if state.generation() != self.generation {
                return TickReport::Superseded;
            }
            state.tick()
        };

        match outcome {
            TickOutcome::Idle => TickReport::Idle,
            TickOutcome::Countdown(remaining) => TickReport::Countdown(remaining),
            TickOutcome::CycleDue => {
                let outcome = self.run_cycle();
                let count = {
                    let mut state = lock_state(&self.state);
                    if state.generation() != self.generation {
                        None
                    } else {
                        Some(state.complete_cycle())
                    }
                };
                match count {
                    Some(count) => {
                        self.record(count, &outcome);
                        TickReport::Cycle { count, outcome }
                    }
                    None => {
                        debug!("Engine restarted during cycle; result not counted");
                        TickReport::Superseded
                    }
                }
            }
        }
    }

    /// Perform the four actions in order. Nothing here can fail the cycle.
    pub fn run_cycle(&mut self) -> CycleOutcome {
        let mut outcome = CycleOutcome::default();

        match self.move_mouse() {
            Ok(movements) => {
                outcome.mouse_moved = true;
                outcome.essential_successes += 1;
                debug!("Mouse moved ({} movement(s))", movements);
            }
            Err(e) => {
                warn!("Mouse movement failed: {}", e);
                self.note(&format!("Mouse movement failed: {}", e));
            }
        }

        match self.press_key() {
            Ok(()) => {
                outcome.key_pressed = true;
                outcome.essential_successes += 1;
            }
            Err(e) => {
                warn!("Key press failed: {}", e);
                self.note(&format!("Key press failed: {}", e));
            }
        }

        match self.click_target() {
            Ok(OptionalOutcome::Performed) => {
                outcome.optional_actions_attempted.insert(OptionalAction::UiClick);
                debug!("UI click performed");
            }
            Ok(OptionalOutcome::Skipped(reason)) => {
                debug!("UI click skipped: {}", reason);
                self.note(&format!("UI click skipped: {}", reason));
            }
            Err(e) => {
                outcome.optional_actions_attempted.insert(OptionalAction::UiClick);
                info!("UI click failed: {}", e);
                self.note(&format!("UI click failed: {}", e));
            }
        }

        outcome.optional_actions_attempted.insert(OptionalAction::KeepActive);
        match self.keep_active() {
            Ok(key) => self.note(&format!("Keep-active signal sent ({}).", key)),
            Err(e) => {
                info!("Keep-active failed: {}", e);
                self.note(&format!("Keep-active failed: {}", e));
            }
        }

        outcome
    }

    /// Append the cycle total and health lines for a counted cycle.
    fn record(&self, count: u64, outcome: &CycleOutcome) {
        if let Err(e) = self.logger.cycle_count(count) {
            warn!("Failed to write cycle log: {}", e);
        }
        let health = outcome.health();
        self.note(&format!(
            "Automatic cycle executed: {} ({}/{} essential actions).",
            health.as_str(),
            outcome.essential_successes,
            HEALTHY_THRESHOLD
        ));
        info!("Cycle {} complete: {}", count, health.as_str());
    }

    /// One movement, or with `burst_probability` a burst of several.
    fn move_mouse(&mut self) -> Result<u32, ActionError> {
        let count = if self.rng.gen_bool(self.actions.burst_probability) {
            self.rng.gen_range(self.actions.burst_min..=self.actions.burst_max)
        } else {
            1
        };

        for index in 0..count {
            if index > 0 {
                let (low, high) = self.actions.burst_pause_range();
                thread::sleep(self.rng.gen_range(low..=high));
            }
            let plan = self.single_movement()?;
            debug!("Movement {}/{}: {}", index + 1, count, plan);
        }
        Ok(count)
    }

    fn single_movement(&mut self) -> Result<MovementPlan, ActionError> {
        let from = self.simulator.position()?;
        let screen = self.simulator.screen_size()?;
        let plan = self.planner.plan(from, screen, &mut self.rng);
        for (point, duration) in plan.segments() {
            self.simulator.move_to(point, duration)?;
        }
        Ok(plan)
    }

    fn press_key(&mut self) -> Result<(), ActionError> {
        self.simulator.press(&self.actions.key)?;
        Ok(())
    }

    /// Click the configured target if it is on screen, then put the pointer back.
    fn click_target(&mut self) -> Result<OptionalOutcome, ActionError> {
        let Some(target) = self.actions.click_target else {
            return Ok(OptionalOutcome::Skipped("no click target configured".into()));
        };

        let screen = self.simulator.screen_size()?;
        if !screen.contains(target) {
            return Ok(OptionalOutcome::Skipped(format!(
                "target ({}, {}) outside {}x{} screen",
                target.x, target.y, screen.width, screen.height
            )));
        }

        let original = self.simulator.position()?;
        self.simulator.move_to(target, Duration::ZERO)?;
        let clicked = self.simulator.click();
        let restored = self.simulator.move_to(original, Duration::ZERO);
        clicked?;
        restored?;
        Ok(OptionalOutcome::Performed)
    }

    /// Send an innocuous key, then nudge the pointer one step and back.
    ///
    /// Returns the key that was accepted.
    fn keep_active(&mut self) -> Result<String, ActionError> {
        let key = match self.simulator.press(&self.actions.keep_active_key) {
            Ok(()) => self.actions.keep_active_key.clone(),
            Err(primary) => {
                debug!(
                    "Keep-active key {} failed ({}), trying {}",
                    self.actions.keep_active_key, primary, self.actions.keep_active_fallback_key
                );
                self.simulator
                    .press(&self.actions.keep_active_fallback_key)
                    .map_err(|fallback| ActionError::Fallback { primary, fallback })?;
                self.actions.keep_active_fallback_key.clone()
            }
        };

        let origin = self.simulator.position()?;
        // Nudge toward the interior so the pointer never leaves the screen.
        let step = if origin.x > 0 {
            -self.actions.nudge_pixels
        } else {
            self.actions.nudge_pixels
        };
        self.simulator.move_to(origin.offset(step, 0), Duration::ZERO)?;
        self.simulator.move_to(origin, Duration::ZERO)?;
        Ok(key)
    }

    /// Best-effort event line; logging failures never reach the cycle.
    fn note(&self, message: &str) {
        if let Err(e) = self.logger.event(message) {
            warn!("Failed to write cycle log: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::state::EngineState;
    use crate::input::scripted::{Call, ScriptedSimulator};
    use crate::input::{Point, ScreenSize};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::Mutex;

    const SCREEN: ScreenSize = ScreenSize::new(1920, 1080);

    struct Harness {
        _dir: tempfile::TempDir,
        logger: Arc<CycleLogger>,
        state: SharedState,
    }

    impl Harness {
        fn new(interval: u64) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let logger = Arc::new(CycleLogger::new(dir.path().join("cycle_log.txt")).unwrap());
            Self {
                _dir: dir,
                logger,
                state: Arc::new(Mutex::new(EngineState::new(interval))),
            }
        }

        fn engine(
            &self,
            sim: ScriptedSimulator,
            actions: ActionConfig,
        ) -> ActivityCycle<ScriptedSimulator, StdRng> {
            let generation = lock_state(&self.state).start();
            ActivityCycle::new(
                self.state.clone(),
                generation,
                sim,
                StdRng::seed_from_u64(1),
                actions,
                self.logger.clone(),
            )
        }

        fn log(&self) -> String {
            std::fs::read_to_string(self.logger.path()).unwrap()
        }
    }

    fn quiet_actions() -> ActionConfig {
        ActionConfig {
            burst_pause_ms_min: 0,
            burst_pause_ms_max: 0,
            ..ActionConfig::default()
        }
    }

    #[test]
    fn healthy_cycle_counts_both_essentials() {
        let h = Harness::new(1);
        let mut engine = h.engine(ScriptedSimulator::new(SCREEN), quiet_actions());

        let outcome = engine.run_cycle();
        assert_eq!(outcome.essential_successes, 2);
        assert!(outcome.mouse_moved && outcome.key_pressed);
        assert_eq!(outcome.health(), CycleHealth::Successful);
        assert_eq!(
            outcome.optional_actions_attempted,
            BTreeSet::from([OptionalAction::KeepActive])
        );
        assert_eq!(engine.simulator().presses(), vec!["shift", "control"]);
    }

    #[test]
    fn only_tried_clicks_are_marked_attempted() {
        let h = Harness::new(1);
        let on_screen = ActionConfig {
            click_target: Some(Point::new(50, 1050)),
            ..quiet_actions()
        };
        let mut engine = h.engine(ScriptedSimulator::new(SCREEN), on_screen.clone());
        let outcome = engine.run_cycle();
        assert!(outcome.optional_actions_attempted.contains(&OptionalAction::UiClick));

        let small = ScriptedSimulator::new(ScreenSize::new(1280, 720));
        let mut engine = h.engine(small, on_screen);
        let outcome = engine.run_cycle();
        assert!(!outcome.optional_actions_attempted.contains(&OptionalAction::UiClick));
        assert!(outcome.optional_actions_attempted.contains(&OptionalAction::KeepActive));
    }

    #[test]
    fn failing_provider_degrades_but_still_counts() {
        let h = Harness::new(1);
        let mut sim = ScriptedSimulator::new(SCREEN);
        sim.fail_moves = true;
        sim.fail_key("shift");
        let mut engine = h.engine(sim, quiet_actions());

        match engine.tick() {
            TickReport::Cycle { count, outcome } => {
                assert_eq!(count, 1);
                assert_eq!(outcome.essential_successes, 0);
                assert_eq!(outcome.health(), CycleHealth::Degraded);
            }
            other => panic!("expected a cycle, got {other:?}"),
        }
        assert_eq!(lock_state(&h.state).cycle_count(), 1);

        let log = h.log();
        assert!(log.contains("EVENTO: Mouse movement failed"));
        assert!(log.contains("EVENTO: Key press failed"));
        assert!(log.contains("Total de ciclos: 1"));
        assert!(log.contains("Automatic cycle executed: degraded"));
    }

    #[test]
    fn one_essential_failure_is_degraded() {
        let h = Harness::new(1);
        let mut sim = ScriptedSimulator::new(SCREEN);
        sim.fail_key("shift");
        let mut engine = h.engine(sim, quiet_actions());

        let outcome = engine.run_cycle();
        assert_eq!(outcome.essential_successes, 1);
        assert!(outcome.mouse_moved);
        assert_eq!(outcome.health(), CycleHealth::Degraded);
    }

    #[test]
    fn tick_runs_cycle_once_per_interval() {
        let h = Harness::new(3);
        let mut engine = h.engine(ScriptedSimulator::new(SCREEN), quiet_actions());

        assert_eq!(engine.tick(), TickReport::Countdown(2));
        assert_eq!(engine.tick(), TickReport::Countdown(1));
        assert!(matches!(engine.tick(), TickReport::Cycle { count: 1, .. }));
        assert_eq!(lock_state(&h.state).remaining_seconds(), 3);
        assert_eq!(engine.tick(), TickReport::Countdown(2));
    }

    #[test]
    fn stale_worker_is_superseded() {
        let h = Harness::new(3);
        let mut engine = h.engine(ScriptedSimulator::new(SCREEN), quiet_actions());
        lock_state(&h.state).start();
        assert_eq!(engine.tick(), TickReport::Superseded);
    }

    #[test]
    fn stopped_engine_reports_idle() {
        let h = Harness::new(3);
        let mut engine = h.engine(ScriptedSimulator::new(SCREEN), quiet_actions());
        lock_state(&h.state).stop();
        assert_eq!(engine.tick(), TickReport::Idle);
    }

    #[test]
    fn burst_moves_several_times() {
        let h = Harness::new(1);
        let actions = ActionConfig {
            burst_probability: 1.0,
            ..quiet_actions()
        };
        let mut engine = h.engine(ScriptedSimulator::new(SCREEN), actions);

        let movements = engine.move_mouse().unwrap();
        assert!((2..=4).contains(&movements));
        // Circular plans add a waypoint segment, so moves >= movements.
        assert!(engine.simulator().moves().len() >= movements as usize);
    }

    #[test]
    fn no_burst_means_single_movement() {
        let h = Harness::new(1);
        let actions = ActionConfig {
            burst_probability: 0.0,
            ..quiet_actions()
        };
        let mut engine = h.engine(ScriptedSimulator::new(SCREEN), actions);
        assert_eq!(engine.move_mouse().unwrap(), 1);
    }

    #[test]
    fn click_restores_pointer() {
        let h = Harness::new(1);
        let actions = ActionConfig {
            click_target: Some(Point::new(50, 1050)),
            ..quiet_actions()
        };
        let mut sim = ScriptedSimulator::new(SCREEN);
        sim.pointer = Point::new(700, 300);
        let mut engine = h.engine(sim, actions);

        assert_eq!(engine.click_target().unwrap(), OptionalOutcome::Performed);
        let calls = &engine.simulator().calls;
        assert_eq!(
            calls.as_slice(),
            &[
                Call::Move(Point::new(50, 1050)),
                Call::Click(Point::new(50, 1050)),
                Call::Move(Point::new(700, 300)),
            ]
        );
    }

    #[test]
    fn off_screen_click_is_skipped_not_failed() {
        let h = Harness::new(1);
        let actions = ActionConfig {
            click_target: Some(Point::new(50, 1050)),
            ..quiet_actions()
        };
        let mut engine = h.engine(ScriptedSimulator::new(ScreenSize::new(1280, 720)), actions);

        assert!(matches!(
            engine.click_target().unwrap(),
            OptionalOutcome::Skipped(_)
        ));
        assert!(engine.simulator().calls.is_empty());
    }

    #[test]
    fn click_failure_is_contained() {
        let h = Harness::new(1);
        let actions = ActionConfig {
            click_target: Some(Point::new(50, 50)),
            ..quiet_actions()
        };
        let mut sim = ScriptedSimulator::new(SCREEN);
        sim.fail_clicks = true;
        let mut engine = h.engine(sim, actions);

        let outcome = engine.run_cycle();
        assert_eq!(outcome.health(), CycleHealth::Successful);
        assert!(h.log().contains("UI click failed"));
    }

    #[test]
    fn keep_active_falls_back_to_alternate_key() {
        let h = Harness::new(1);
        let mut sim = ScriptedSimulator::new(SCREEN);
        sim.fail_key("control");
        let start = sim.pointer;
        let mut engine = h.engine(sim, quiet_actions());

        assert_eq!(engine.keep_active().unwrap(), "shift");
        let moves = engine.simulator().moves();
        assert_eq!(moves, vec![start.offset(-1, 0), start]);
    }

    #[test]
    fn keep_active_double_failure_is_contained() {
        let h = Harness::new(1);
        let mut sim = ScriptedSimulator::new(SCREEN);
        sim.fail_key("control");
        sim.fail_key("shift");
        let mut engine = h.engine(sim, quiet_actions());

        assert!(matches!(
            engine.keep_active(),
            Err(ActionError::Fallback { .. })
        ));
        let outcome = engine.run_cycle();
        assert_eq!(outcome.essential_successes, 1);
        assert!(h.log().contains("Keep-active failed"));
    }

    #[test]
    fn nudge_moves_inward_at_left_edge() {
        let h = Harness::new(1);
        let mut sim = ScriptedSimulator::new(SCREEN);
        sim.pointer = Point::new(0, 10);
        let mut engine = h.engine(sim, quiet_actions());

        engine.keep_active().unwrap();
        assert_eq!(
            engine.simulator().moves(),
            vec![Point::new(1, 10), Point::new(0, 10)]
        );
    }

    #[test]
    fn logging_failure_does_not_break_cycle() {
        let h = Harness::new(1);
        let mut engine = h.engine(ScriptedSimulator::new(SCREEN), quiet_actions());
        std::fs::remove_file(h.logger.path()).unwrap();
        std::fs::create_dir(h.logger.path()).unwrap();

        assert!(matches!(engine.tick(), TickReport::Cycle { count: 1, .. }));
    }
}
