//! Configuration loading from TOML files and environment variables.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::input::Point;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub actions: ActionConfig,
    #[serde(default)]
    pub sound: SoundConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Timer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Seconds between cycles. Values below 1 fall back to 5 at start.
    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: i64,
    /// Seed for the random source (random if unset).
    #[serde(default)]
    pub seed: Option<u64>,
    /// Start cycling as soon as the daemon launches.
    #[serde(default = "default_autostart")]
    pub autostart: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            interval_seconds: default_interval_seconds(),
            seed: None,
            autostart: default_autostart(),
        }
    }
}

/// Tuning of the simulated actions performed each cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionConfig {
    /// Key pressed by the essential key-press action.
    #[serde(default = "default_key")]
    pub key: String,
    /// Key sent by the keep-active action.
    #[serde(default = "default_keep_active_key")]
    pub keep_active_key: String,
    /// Key tried when `keep_active_key` fails.
    #[serde(default = "default_keep_active_fallback_key")]
    pub keep_active_fallback_key: String,
    /// Screen position clicked by the UI-click action (skipped when unset).
    #[serde(default)]
    pub click_target: Option<Point>,
    /// Chance that a cycle moves the pointer several times in a row.
    #[serde(default = "default_burst_probability")]
    pub burst_probability: f64,
    #[serde(default = "default_burst_min")]
    pub burst_min: u32,
    #[serde(default = "default_burst_max")]
    pub burst_max: u32,
    /// Pause between movements of a burst, in milliseconds.
    #[serde(default = "default_burst_pause_ms_min")]
    pub burst_pause_ms_min: u64,
    #[serde(default = "default_burst_pause_ms_max")]
    pub burst_pause_ms_max: u64,
    /// Size of the keep-active pointer nudge.
    #[serde(default = "default_nudge_pixels")]
    pub nudge_pixels: i32,
}

impl Default for ActionConfig {
    fn default() -> Self {
        Self {
            key: default_key(),
            keep_active_key: default_keep_active_key(),
            keep_active_fallback_key: default_keep_active_fallback_key(),
            click_target: None,
            burst_probability: default_burst_probability(),
            burst_min: default_burst_min(),
            burst_max: default_burst_max(),
            burst_pause_ms_min: default_burst_pause_ms_min(),
            burst_pause_ms_max: default_burst_pause_ms_max(),
            nudge_pixels: default_nudge_pixels(),
        }
    }
}

impl ActionConfig {
    pub fn burst_pause_range(&self) -> (Duration, Duration) {
        (
            Duration::from_millis(self.burst_pause_ms_min),
            Duration::from_millis(self.burst_pause_ms_max),
        )
    }
}

/// Audible cue configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SoundConfig {
    /// Ring the bell after every completed cycle.
    #[serde(default)]
    pub enabled: bool,
}

/// Diagnostic output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Data directory holding the cycle log.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// File name of the cycle log inside `data_dir`.
    #[serde(default = "default_cycle_log")]
    pub cycle_log: String,
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            cycle_log: default_cycle_log(),
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

impl LoggingConfig {
    /// Returns the cycle log path.
    pub fn cycle_log_path(&self) -> PathBuf {
        self.data_dir.join(&self.cycle_log)
    }
}

// Default value functions
fn default_interval_seconds() -> i64 {
    300
}

fn default_autostart() -> bool {
    true
}

fn default_key() -> String {
    "shift".to_string()
}

fn default_keep_active_key() -> String {
    "control".to_string()
}

fn default_keep_active_fallback_key() -> String {
    "shift".to_string()
}

fn default_burst_probability() -> f64 {
    0.1
}

fn default_burst_min() -> u32 {
    2
}

fn default_burst_max() -> u32 {
    4
}

fn default_burst_pause_ms_min() -> u64 {
    150
}

fn default_burst_pause_ms_max() -> u64 {
    600
}

fn default_nudge_pixels() -> i32 {
    1
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".stayactive"))
        .unwrap_or_else(|| PathBuf::from(".stayactive"))
}

fn default_cycle_log() -> String {
    "cycle_log.txt".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).with_context(|| "Failed to parse config file")
    }

    /// Load configuration with environment variable overrides.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut config = if let Some(path) = config_path {
            Self::from_file(path)?
        } else {
            let default_paths = [
                PathBuf::from("config/default.toml"),
                dirs::config_dir()
                    .map(|d| d.join("stayactive/config.toml"))
                    .unwrap_or_default(),
            ];

            let mut loaded = None;
            for path in &default_paths {
                if path.is_file() {
                    loaded = Some(Self::from_file(path)?);
                    break;
                }
            }
            loaded.unwrap_or_default()
        };

        config.apply_env_overrides(|name| std::env::var(name).ok());
        config.logging.data_dir = expand_tilde(&config.logging.data_dir);

        Ok(config)
    }

    /// Apply overrides from a variable lookup (the process environment in production).
    fn apply_env_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(val) = var("STAYACTIVE_INTERVAL") {
            if let Ok(v) = val.trim().parse() {
                self.engine.interval_seconds = v;
            }
        }
        if let Some(val) = var("STAYACTIVE_SEED") {
            if let Ok(v) = val.trim().parse() {
                self.engine.seed = Some(v);
            }
        }
        if let Some(val) = var("STAYACTIVE_KEY") {
            self.actions.key = val;
        }
        if let Some(val) = var("STAYACTIVE_SOUND") {
            self.sound.enabled = matches!(
                val.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            );
        }
        if let Some(val) = var("STAYACTIVE_DATA_DIR") {
            self.logging.data_dir = PathBuf::from(val);
        }
        if let Some(val) = var("STAYACTIVE_LOG_LEVEL") {
            self.logging.level = val;
        }
    }

    /// Validate configuration values.
    ///
    /// The interval is deliberately absent: out-of-range values are coerced at start.
    pub fn validate(&self) -> Result<()> {
        let actions = &self.actions;
        if !(0.0..=1.0).contains(&actions.burst_probability) {
            anyhow::bail!("Burst probability must be between 0.0 and 1.0");
        }
        if actions.burst_min == 0 || actions.burst_min > actions.burst_max {
            anyhow::bail!("Burst size must satisfy 1 <= burst_min <= burst_max");
        }
        if actions.burst_pause_ms_min > actions.burst_pause_ms_max {
            anyhow::bail!("burst_pause_ms_min must be <= burst_pause_ms_max");
        }
        if actions.nudge_pixels <= 0 {
            anyhow::bail!("Nudge size must be greater than 0");
        }
        for (name, key) in [
            ("key", &actions.key),
            ("keep_active_key", &actions.keep_active_key),
            ("keep_active_fallback_key", &actions.keep_active_fallback_key),
        ] {
            if key.trim().is_empty() {
                anyhow::bail!("actions.{} cannot be empty", name);
            }
        }
        if self.logging.cycle_log.trim().is_empty() {
            anyhow::bail!("Cycle log file name cannot be empty");
        }
        Ok(())
    }
}

/// Expand ~ to home directory.
fn expand_tilde(path: &Path) -> PathBuf {
    if let Some(rest) = path.to_str().and_then(|s| s.strip_prefix("~/")) {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    path.to_path_buf()
}
