//! Durable cycle logging.

mod cycle_log;

pub use cycle_log::{format_line, CycleLogger, LogCategory, LogError, LOG_HEADER};
