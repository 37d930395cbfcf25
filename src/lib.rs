//! stayactive - keeps the host from being marked idle.
//!
//! A timer-driven engine that periodically moves the pointer, presses an
//! innocuous key and optionally clicks a configured target, recording every
//! cycle in an append-only text log.

pub mod config;
pub mod controller;
pub mod engine;
pub mod input;
pub mod logging;

pub use config::Config;
pub use controller::{CycleController, EngineEvent, EngineSnapshot, SimulatorFactory};
pub use engine::{ActivityCycle, CycleHealth, CycleOutcome, MovementPlanner, MovementStrategy};
pub use input::{EnigoSimulator, InputError, InputSimulator, Point, ScreenSize};
pub use logging::{CycleLogger, LogCategory};
