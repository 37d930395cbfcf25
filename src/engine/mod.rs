//! Activity-cycle engine: state machine, movement planning and the cycle itself.

mod cycle;
mod planner;
mod state;

pub use cycle::{
    ActionError, ActivityCycle, CycleHealth, CycleOutcome, OptionalAction, OptionalOutcome,
    TickReport,
};
pub use planner::{
    clamp_to_screen, CircularMove, CornerMove, DeltaMove, MovementPlan, MovementPlanner,
    MovementStrategy, CORNER_MARGIN, LARGE_MARGIN, SMALL_MARGIN,
};
pub use state::{
    lock_state, parse_interval, EngineState, Phase, SharedState, TickOutcome,
    DEFAULT_INTERVAL_SECONDS,
};
