//! Append-only text log of engine events and cycle totals.

use chrono::{DateTime, Local};
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use thiserror::Error;
use tracing::debug;

/// First line written to a freshly created log file.
pub const LOG_HEADER: &str = "Log de ciclos iniciado.";

/// Timestamp layout of every log line.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Kind of line written to the cycle log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogCategory {
    /// Lifecycle and cycle-health events.
    Event,
    /// Running total of completed cycles.
    CycleCount,
}

impl LogCategory {
    /// Label written between the timestamp and the message.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Event => "EVENTO",
            Self::CycleCount => "Total de ciclos",
        }
    }
}

#[derive(Debug, Error)]
pub enum LogError {
    #[error("cycle log I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Durable cycle log. Each append opens, writes one line and closes the file.
#[derive(Debug)]
pub struct CycleLogger {
    path: PathBuf,
    /// Serializes writers sharing this logger.
    write_lock: Mutex<()>,
}

impl CycleLogger {
    /// Create a logger for `path`, creating parent directories and the header.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, LogError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| LogError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let logger = Self {
            path,
            write_lock: Mutex::new(()),
        };
        logger.ensure_exists()?;
        Ok(logger)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one timestamped line.
    pub fn append(&self, category: LogCategory, message: &str) -> Result<(), LogError> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        self.ensure_exists()?;

        let line = format_line(Local::now(), category, message);
        let mut file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .map_err(|source| self.io_error(source))?;
        writeln!(file, "{}", line).map_err(|source| self.io_error(source))?;

        debug!("{}", line);
        Ok(())
    }

    /// Append an `EVENTO` line.
    pub fn event(&self, message: &str) -> Result<(), LogError> {
        self.append(LogCategory::Event, message)
    }

    /// Append a `Total de ciclos` line.
    pub fn cycle_count(&self, count: u64) -> Result<(), LogError> {
        self.append(LogCategory::CycleCount, &count.to_string())
    }

    /// Create the file with its header line if it is missing.
    fn ensure_exists(&self) -> Result<(), LogError> {
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
        {
            Ok(mut file) => {
                writeln!(file, "{}", LOG_HEADER).map_err(|source| self.io_error(source))?;
                debug!("Created cycle log: {:?}", self.path);
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(()),
            Err(source) => Err(self.io_error(source)),
        }
    }

    fn io_error(&self, source: io::Error) -> LogError {
        LogError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

/// Render a log line: `YYYY-MM-DD HH:MM:SS - <CATEGORY>: <message>`.
pub fn format_line(timestamp: DateTime<Local>, category: LogCategory, message: &str) -> String {
    format!(
        "{} - {}: {}",
        timestamp.format(TIMESTAMP_FORMAT),
        category.label(),
        message
    )
}
