use std::sync::Arc;
use std::time::Duration;

use stayactive::config::Config;
use stayactive::logging::LOG_HEADER;
use stayactive::{
    CycleController, CycleHealth, CycleLogger, EngineEvent, InputError, InputSimulator, Point,
    ScreenSize, SimulatorFactory,
};
use tokio::sync::broadcast::{self, error::RecvError};

/// Desktop double; `broken` makes every pointer and key operation fail.
struct DeskSimulator {
    pointer: Point,
    broken: bool,
}

impl DeskSimulator {
    fn check(&self) -> Result<(), InputError> {
        if self.broken {
            Err(InputError::Backend("simulated outage".into()))
        } else {
            Ok(())
        }
    }
}

impl InputSimulator for DeskSimulator {
    fn position(&mut self) -> Result<Point, InputError> {
        self.check()?;
        Ok(self.pointer)
    }

    fn screen_size(&mut self) -> Result<ScreenSize, InputError> {
        Ok(ScreenSize::new(1920, 1080))
    }

    fn move_to(&mut self, target: Point, _duration: Duration) -> Result<(), InputError> {
        self.check()?;
        self.pointer = target;
        Ok(())
    }

    fn click(&mut self) -> Result<(), InputError> {
        self.check()
    }

    fn press(&mut self, _key: &str) -> Result<(), InputError> {
        self.check()
    }
}

fn controller(dir: &tempfile::TempDir, broken: bool, tick: Duration) -> CycleController {
    let mut config = Config::default();
    config.engine.seed = Some(17);
    config.actions.burst_pause_ms_min = 0;
    config.actions.burst_pause_ms_max = 0;

    let log_path = dir.path().join("cycle_log.txt");
    let logger = Arc::new(CycleLogger::new(log_path).unwrap());
    let factory: SimulatorFactory =
        Arc::new(move || -> Result<Box<dyn InputSimulator>, InputError> {
            let sim = DeskSimulator {
                pointer: Point::new(800, 600),
                broken,
            };
            Ok(Box::new(sim) as Box<dyn InputSimulator>)
        });
    CycleController::new(&config, logger, factory)
        .unwrap()
        .with_tick_interval(tick)
}

/// Wait for the next completed cycle, skipping countdown events.
fn next_cycle(rx: &mut broadcast::Receiver<EngineEvent>) -> EngineEvent {
    tokio_test::block_on(async {
        tokio::time::timeout(Duration::from_secs(10), async {
            loop {
                match rx.recv().await {
                    Ok(event @ EngineEvent::CycleCompleted { .. }) => return event,
                    Ok(_) | Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => panic!("engine event channel closed"),
                }
            }
        })
        .await
        .expect("no cycle completed in time")
    })
}

/// Collect events up to and including the next completed cycle.
fn events_until_cycle(rx: &mut broadcast::Receiver<EngineEvent>) -> Vec<EngineEvent> {
    tokio_test::block_on(async {
        tokio::time::timeout(Duration::from_secs(10), async {
            let mut seen = Vec::new();
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        let done = matches!(event, EngineEvent::CycleCompleted { .. });
                        seen.push(event);
                        if done {
                            return seen;
                        }
                    }
                    Err(RecvError::Lagged(n)) => panic!("lagged by {n} events"),
                    Err(RecvError::Closed) => panic!("engine event channel closed"),
                }
            }
        })
        .await
        .expect("no cycle completed in time")
    })
}

fn read_log(dir: &tempfile::TempDir) -> String {
    std::fs::read_to_string(dir.path().join("cycle_log.txt")).unwrap()
}

#[test]
fn runs_a_cycle_after_the_interval_and_logs_it() {
    let dir = tempfile::tempdir().unwrap();
    let controller = controller(&dir, false, Duration::from_millis(10));
    let mut rx = controller.subscribe();

    assert_eq!(controller.start_with("2").unwrap(), 2);
    match next_cycle(&mut rx) {
        EngineEvent::CycleCompleted {
            cycle_count,
            health,
            audible,
        } => {
            assert_eq!(cycle_count, 1);
            assert_eq!(health, CycleHealth::Successful);
            assert!(!audible);
        }
        other => panic!("unexpected event {other:?}"),
    }

    assert!(controller.stop());
    controller.join();
    assert!(!controller.is_running());

    let log = read_log(&dir);
    assert!(log.starts_with(LOG_HEADER));
    assert!(log.contains("EVENTO: Cycle activated by user. Interval: 2 seconds."));
    assert!(log.contains("Total de ciclos: 1"));
    assert!(log.contains("Automatic cycle executed: success"));
    assert!(log.contains("EVENTO: Cycle deactivated by user."));
}

#[test]
fn faulty_provider_degrades_but_keeps_ticking() {
    let dir = tempfile::tempdir().unwrap();
    let controller = controller(&dir, true, Duration::from_millis(10));
    let mut rx = controller.subscribe();

    controller.start_with("1").unwrap();
    for expected in 1..=2 {
        match next_cycle(&mut rx) {
            EngineEvent::CycleCompleted {
                cycle_count,
                health,
                ..
            } => {
                assert_eq!(cycle_count, expected);
                assert_eq!(health, CycleHealth::Degraded);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }
    controller.stop();
    controller.join();

    let log = read_log(&dir);
    assert!(log.contains("Mouse movement failed"));
    assert!(log.contains("Key press failed"));
    assert!(log.contains("Automatic cycle executed: degraded"));
}

#[test]
fn stop_freezes_countdown_and_start_resets_it() {
    let dir = tempfile::tempdir().unwrap();
    let controller = controller(&dir, false, Duration::from_millis(200));

    controller.start_with("1000").unwrap();
    std::thread::sleep(Duration::from_millis(700));
    controller.stop();
    controller.join();

    let frozen = controller.snapshot();
    assert!(!frozen.running);
    assert!(frozen.remaining_seconds < 1000);
    std::thread::sleep(Duration::from_millis(400));
    assert_eq!(controller.snapshot(), frozen);

    controller.start().unwrap();
    let restarted = controller.snapshot();
    assert!(restarted.running);
    assert_eq!(restarted.remaining_seconds, 1000);
    assert_eq!(restarted.cycle_count, 0);
    controller.stop();
    controller.join();
}

#[test]
fn invalid_interval_falls_back_to_default() {
    let dir = tempfile::tempdir().unwrap();
    let controller = controller(&dir, false, Duration::from_millis(200));

    for text in ["", "zero", "0", "-1", "1.5"] {
        assert_eq!(controller.configure(text), 5);
    }
    controller.start().unwrap();
    assert_eq!(controller.snapshot().remaining_seconds, 5);
    controller.stop();
    controller.join();
    assert!(read_log(&dir).contains("Interval: 5 seconds."));
}

#[test]
fn sound_preference_marks_cycles_audible() {
    let dir = tempfile::tempdir().unwrap();
    let controller = controller(&dir, false, Duration::from_millis(10));
    let mut rx = controller.subscribe();

    controller.toggle_sound(true);
    controller.start_with("1").unwrap();
    match next_cycle(&mut rx) {
        EngineEvent::CycleCompleted { audible, .. } => assert!(audible),
        other => panic!("unexpected event {other:?}"),
    }
    controller.stop();
    controller.join();
    assert!(read_log(&dir).contains("Sound enabled by user."));
}

#[test]
fn deleted_log_is_recreated_with_header() {
    let dir = tempfile::tempdir().unwrap();
    let controller = controller(&dir, false, Duration::from_millis(50));
    let mut rx = controller.subscribe();

    controller.start_with("2").unwrap();
    next_cycle(&mut rx);
    std::fs::remove_file(dir.path().join("cycle_log.txt")).unwrap();

    // Wait for a cycle that started entirely after the deletion.
    next_cycle(&mut rx);
    next_cycle(&mut rx);
    controller.stop();
    controller.join();

    let log = read_log(&dir);
    assert_eq!(log.lines().next(), Some(LOG_HEADER));
    assert!(log.contains("Total de ciclos: 3"));
}

#[test]
fn toggle_flips_running_state() {
    let dir = tempfile::tempdir().unwrap();
    let controller = controller(&dir, false, Duration::from_millis(200));

    assert!(controller.toggle().unwrap());
    assert!(controller.is_running());
    assert!(!controller.toggle().unwrap());
    assert!(!controller.is_running());
    controller.join();
}

#[test]
fn countdown_events_arrive_between_cycles() {
    let dir = tempfile::tempdir().unwrap();
    let controller = controller(&dir, false, Duration::from_millis(10));
    let mut rx = controller.subscribe();

    controller.start_with("3").unwrap();
    let first = events_until_cycle(&mut rx);
    let second = events_until_cycle(&mut rx);
    controller.stop();
    controller.join();

    assert_eq!(
        first,
        vec![
            EngineEvent::Started { interval_seconds: 3 },
            EngineEvent::Countdown { remaining_seconds: 2 },
            EngineEvent::Countdown { remaining_seconds: 1 },
            EngineEvent::CycleCompleted {
                cycle_count: 1,
                health: CycleHealth::Successful,
                audible: false,
            },
        ]
    );
    let countdowns: Vec<u64> = second
        .iter()
        .filter_map(|event| match event {
            EngineEvent::Countdown { remaining_seconds } => Some(*remaining_seconds),
            _ => None,
        })
        .collect();
    assert_eq!(countdowns, vec![2, 1]);
    assert!(matches!(
        second.last(),
        Some(EngineEvent::CycleCompleted { cycle_count: 2, .. })
    ));
}

#[test]
fn inverted_burst_bounds_are_rejected_up_front() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.actions.burst_probability = 1.0;
    config.actions.burst_min = 5;
    config.actions.burst_max = 2;

    let logger = Arc::new(CycleLogger::new(dir.path().join("cycle_log.txt")).unwrap());
    let factory: SimulatorFactory =
        Arc::new(|| -> Result<Box<dyn InputSimulator>, InputError> {
            Err(InputError::Unavailable("not needed".into()))
        });
    let err = CycleController::new(&config, logger, factory)
        .err()
        .expect("inverted burst bounds must be rejected");
    assert!(format!("{err:#}").contains("burst_min"));
}
