//! Start/stop/configure surface consumed by the presentation layer.

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::config::{ActionConfig, Config};
use crate::engine::{lock_state, ActivityCycle, CycleHealth, EngineState, SharedState, TickReport};
use crate::input::{InputError, InputSimulator, UnavailableSimulator};
use crate::logging::CycleLogger;

/// Builds the input simulator inside the worker thread.
pub type SimulatorFactory =
    Arc<dyn Fn() -> Result<Box<dyn InputSimulator>, InputError> + Send + Sync>;

/// Updates pushed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    Started { interval_seconds: u64 },
    Countdown { remaining_seconds: u64 },
    CycleCompleted {
        cycle_count: u64,
        health: CycleHealth,
        /// Whether an audible cue should accompany this cycle.
        audible: bool,
    },
    Stopped { cycle_count: u64 },
}

/// Point-in-time view of the engine for polling displays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineSnapshot {
    pub running: bool,
    pub interval_seconds: u64,
    pub remaining_seconds: u64,
    pub cycle_count: u64,
    pub sound_enabled: bool,
}

/// Owns the engine state and the single worker thread that ticks it.
pub struct CycleController {
    state: SharedState,
    logger: Arc<CycleLogger>,
    actions: ActionConfig,
    seed: Option<u64>,
    factory: SimulatorFactory,
    sound: Arc<AtomicBool>,
    events: broadcast::Sender<EngineEvent>,
    tick_interval: Duration,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl CycleController {
    /// Create an idle controller from configuration.
    ///
    /// Fails if the configuration does not pass [`Config::validate`].
    pub fn new(
        config: &Config,
        logger: Arc<CycleLogger>,
        factory: SimulatorFactory,
    ) -> Result<Self> {
        config.validate().context("Invalid engine configuration")?;
        let (events, _) = broadcast::channel(64);
        let controller = Self {
            state: Arc::new(Mutex::new(EngineState::default())),
            logger,
            actions: config.actions.clone(),
            seed: config.engine.seed,
            factory,
            sound: Arc::new(AtomicBool::new(config.sound.enabled)),
            events,
            tick_interval: Duration::from_secs(1),
            worker: Mutex::new(None),
        };
        controller.configure(&config.engine.interval_seconds.to_string());
        Ok(controller)
    }

    /// Override the one-second tick (tests run faster clocks).
    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval;
        self
    }

    /// Subscribe to countdown and cycle updates.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    /// Set the interval from user text; invalid or sub-1 values become 5.
    pub fn configure(&self, interval_text: &str) -> u64 {
        let effective = lock_state(&self.state).configure(interval_text);
        debug!("Interval configured: {:?} -> {}s", interval_text, effective);
        effective
    }

    /// Start (or restart) cycling. Counters reset even when already running.
    pub fn start(&self) -> Result<()> {
        let (generation, interval_seconds) = {
            let mut state = lock_state(&self.state);
            let generation = state.start();
            (generation, state.interval_seconds())
        };

        info!("Engine started with interval {}s", interval_seconds);
        self.note(&format!(
            "Cycle activated by user. Interval: {} seconds.",
            interval_seconds
        ));
        let _ = self.events.send(EngineEvent::Started { interval_seconds });

        let handle = self.spawn_worker(generation)?;
        // A replaced worker notices the new generation at its next tick and exits.
        *self.worker.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
        Ok(())
    }

    /// Configure from user text and start in one step.
    pub fn start_with(&self, interval_text: &str) -> Result<u64> {
        let effective = self.configure(interval_text);
        self.start()?;
        Ok(effective)
    }

    /// Stop cycling; countdown and counter stay visible. Returns false if idle.
    pub fn stop(&self) -> bool {
        let (was_running, cycle_count) = {
            let mut state = lock_state(&self.state);
            (state.stop(), state.cycle_count())
        };
        if was_running {
            info!("Engine stopped after {} cycle(s)", cycle_count);
            self.note("Cycle deactivated by user.");
            let _ = self.events.send(EngineEvent::Stopped { cycle_count });
        }
        was_running
    }

    /// Flip between running and idle. Returns the new running flag.
    pub fn toggle(&self) -> Result<bool> {
        if self.is_running() {
            self.stop();
            Ok(false)
        } else {
            self.start()?;
            Ok(true)
        }
    }

    /// Record the sound preference; it only affects the audible cue.
    pub fn toggle_sound(&self, enabled: bool) {
        self.sound.store(enabled, Ordering::SeqCst);
        self.note(if enabled {
            "Sound enabled by user."
        } else {
            "Sound disabled by user."
        });
    }

    pub fn sound_enabled(&self) -> bool {
        self.sound.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        lock_state(&self.state).is_running()
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        let state = lock_state(&self.state);
        EngineSnapshot {
            running: state.is_running(),
            interval_seconds: state.interval_seconds(),
            remaining_seconds: state.remaining_seconds(),
            cycle_count: state.cycle_count(),
            sound_enabled: self.sound_enabled(),
        }
    }

    /// Wait for the current worker to exit. Call after `stop`.
    pub fn join(&self) {
        let handle = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                warn!("Cycle worker panicked");
            }
        }
    }

    fn spawn_worker(&self, generation: u64) -> Result<JoinHandle<()>> {
        let state = self.state.clone();
        let logger = self.logger.clone();
        let actions = self.actions.clone();
        let factory = self.factory.clone();
        let rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let worker = Worker {
            tick_interval: self.tick_interval,
            events: self.events.clone(),
            sound: self.sound.clone(),
        };

        thread::Builder::new()
            .name("cycle-worker".to_string())
            .spawn(move || {
                let simulator = build_simulator(&factory, &logger);
                let engine =
                    ActivityCycle::new(state, generation, simulator, rng, actions, logger);
                worker.run(engine);
            })
            .context("Failed to spawn cycle worker thread")
    }

    fn note(&self, message: &str) {
        if let Err(e) = self.logger.event(message) {
            warn!("Failed to write cycle log: {}", e);
        }
    }
}

impl Drop for CycleController {
    fn drop(&mut self) {
        lock_state(&self.state).stop();
    }
}

/// Presentation-facing side of the worker loop.
struct Worker {
    tick_interval: Duration,
    events: broadcast::Sender<EngineEvent>,
    sound: Arc<AtomicBool>,
}

impl Worker {
    fn run<S: InputSimulator>(&self, mut engine: ActivityCycle<S, StdRng>) {
        debug!("Cycle worker started");
        loop {
            thread::sleep(self.tick_interval);

            match engine.tick() {
                TickReport::Countdown(remaining_seconds) => {
                    let _ = self.events.send(EngineEvent::Countdown { remaining_seconds });
                }
                TickReport::Cycle { count, outcome } => {
                    let _ = self.events.send(EngineEvent::CycleCompleted {
                        cycle_count: count,
                        health: outcome.health(),
                        audible: self.sound.load(Ordering::SeqCst),
                    });
                }
                TickReport::Idle | TickReport::Superseded => break,
            }
        }
        debug!("Cycle worker exiting");
    }
}

fn build_simulator(factory: &SimulatorFactory, logger: &CycleLogger) -> Box<dyn InputSimulator> {
    match factory() {
        Ok(simulator) => simulator,
        Err(e) => {
            warn!("Input simulation unavailable, cycles will be degraded: {}", e);
            if let Err(log_err) = logger.event(&format!("Input simulation unavailable: {}", e)) {
                warn!("Failed to write cycle log: {}", log_err);
            }
            Box::new(UnavailableSimulator::new(e.to_string()))
        }
    }
}
