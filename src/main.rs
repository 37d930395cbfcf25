//! stayactive daemon
//!
//! Headless front end for the activity-cycle engine. Countdown and cycle
//! counters are reported through tracing; commands are read from stdin and
//! Ctrl-C stops the engine and exits.

use anyhow::{Context, Result};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};

use stayactive::config::{Config, LogFormat, LoggingConfig};
use stayactive::{
    CycleController, CycleLogger, EngineEvent, EnigoSimulator, InputError, InputSimulator,
    SimulatorFactory,
};

/// Application version.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Commands accepted on stdin.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    /// Start, optionally with new interval text.
    Start(Option<String>),
    Stop,
    Toggle,
    Sound(bool),
    Status,
    Quit,
    Unknown(String),
}

impl Command {
    fn parse(line: &str) -> Self {
        let mut parts = line.split_whitespace();
        let head = parts.next().map(str::to_ascii_lowercase);
        let arg = parts.next();
        match head.as_deref() {
            None | Some("toggle") => Self::Toggle,
            Some("start") => Self::Start(arg.map(str::to_string)),
            Some("stop") => Self::Stop,
            Some("sound") => match arg.map(str::to_ascii_lowercase).as_deref() {
                Some("on") => Self::Sound(true),
                Some("off") => Self::Sound(false),
                _ => Self::Unknown(line.trim().to_string()),
            },
            Some("status") => Self::Status,
            Some("quit") | Some("exit") => Self::Quit,
            Some(_) => Self::Unknown(line.trim().to_string()),
        }
    }
}

fn main() -> Result<()> {
    // Parse command line arguments
    let config_path = std::env::args().nth(1).map(PathBuf::from);

    // Load configuration
    let config = Config::load(config_path.as_deref())?;
    config.validate()?;

    init_tracing(&config.logging)?;

    info!("Starting stayactive v{}", VERSION);

    let logger = Arc::new(
        CycleLogger::new(config.logging.cycle_log_path())
            .context("Failed to open cycle log")?,
    );
    info!("Cycle log: {:?}", logger.path());
    if let Err(e) = logger.event("Application started.") {
        warn!("Failed to write cycle log: {}", e);
    }

    let factory: SimulatorFactory =
        Arc::new(|| -> Result<Box<dyn InputSimulator>, InputError> {
            let simulator = EnigoSimulator::new()?;
            Ok(Box::new(simulator) as Box<dyn InputSimulator>)
        });
    let controller = CycleController::new(&config, logger, factory)?;

    let runtime = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;
    let result = runtime.block_on(run(controller, config.engine.autostart));
    // The stdin reader parks a blocking thread; do not wait on it forever.
    runtime.shutdown_timeout(Duration::from_millis(500));
    result?;

    info!("stayactive shutdown complete");
    Ok(())
}

/// Drive the controller until Ctrl-C or `quit`.
async fn run(controller: CycleController, autostart: bool) -> Result<()> {
    let mut events = controller.subscribe();
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    if autostart {
        controller.start()?;
    } else {
        info!("Autostart disabled; type `start [seconds]` to begin");
    }

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => render(&event),
                Err(RecvError::Lagged(skipped)) => debug!("Skipped {} engine events", skipped),
                Err(RecvError::Closed) => break,
            },
            line = stdin.next_line(), if stdin_open => match line {
                Ok(Some(line)) => {
                    if !handle_command(&controller, Command::parse(&line))? {
                        break;
                    }
                }
                Ok(None) => {
                    debug!("stdin closed; commands disabled");
                    stdin_open = false;
                }
                Err(e) => {
                    warn!("Failed to read command: {}", e);
                    stdin_open = false;
                }
            },
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    error!("Failed to listen for Ctrl-C: {}", e);
                }
                info!("Interrupt received");
                break;
            }
        }
    }

    // Cleanup
    info!("Shutting down...");
    let snapshot = controller.snapshot();
    controller.stop();
    tokio::task::spawn_blocking(move || controller.join())
        .await
        .context("Cycle worker join task failed")?;

    info!("Ran {} cycle(s) this session. Goodbye!", snapshot.cycle_count);
    Ok(())
}

/// Apply a stdin command. Returns false when the daemon should exit.
fn handle_command(controller: &CycleController, command: Command) -> Result<bool> {
    match command {
        Command::Start(interval) => {
            let effective = match interval {
                Some(text) => controller.start_with(&text)?,
                None => {
                    controller.start()?;
                    controller.snapshot().interval_seconds
                }
            };
            info!("Running every {}s", effective);
        }
        Command::Stop => {
            if !controller.stop() {
                info!("Already stopped");
            }
        }
        Command::Toggle => {
            let running = controller.toggle()?;
            info!("Engine {}", if running { "activated" } else { "deactivated" });
        }
        Command::Sound(enabled) => {
            controller.toggle_sound(enabled);
            info!("Sound {}", if enabled { "on" } else { "off" });
        }
        Command::Status => {
            let s = controller.snapshot();
            info!(
                "running={} interval={}s next_in={}s cycles={} sound={}",
                s.running, s.interval_seconds, s.remaining_seconds, s.cycle_count, s.sound_enabled
            );
        }
        Command::Quit => return Ok(false),
        Command::Unknown(text) => {
            warn!("Unknown command {:?}", text);
            info!("Commands: start [seconds], stop, toggle, sound on|off, status, quit");
        }
    }
    Ok(true)
}

/// Report an engine event to the operator.
fn render(event: &EngineEvent) {
    match event {
        EngineEvent::Started { interval_seconds } => {
            info!("Activated; next movement in {}s", interval_seconds);
        }
        EngineEvent::Countdown { remaining_seconds } => {
            debug!("Next movement in: {}", remaining_seconds);
        }
        EngineEvent::CycleCompleted {
            cycle_count,
            health,
            audible,
        } => {
            info!("Cycles executed: {} ({})", cycle_count, health.as_str());
            if *audible {
                ring_bell();
            }
        }
        EngineEvent::Stopped { cycle_count } => {
            info!("Deactivated after {} cycle(s)", cycle_count);
        }
    }
}

/// Terminal bell as the audible per-cycle cue.
fn ring_bell() {
    let mut stdout = std::io::stdout();
    if let Err(e) = stdout.write_all(b"\x07").and_then(|()| stdout.flush()) {
        debug!("Failed to ring bell: {}", e);
    }
}

/// Initialize tracing subscriber from logging configuration.
fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);
    match logging.format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_target(true))
            .try_init(),
        LogFormat::Pretty => registry
            .with(fmt::layer().with_target(true).with_thread_names(true))
            .try_init(),
    }
    .context("Failed to initialize tracing")?;

    Ok(())
}
