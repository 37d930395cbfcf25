//! OS input simulation backed by enigo.

use enigo::{Button, Coordinate, Direction, Enigo, Key, Keyboard, Mouse, Settings};
use std::thread;
use std::time::Duration;
use tracing::debug;

use super::{InputError, InputSimulator, Point, ScreenSize};

/// Interval between intermediate pointer positions during an eased move.
const EASING_STEP: Duration = Duration::from_millis(10);

/// Input simulator driving the real pointer and keyboard.
pub struct EnigoSimulator {
    enigo: Enigo,
}

impl EnigoSimulator {
    /// Connect to the platform input backend.
    pub fn new() -> Result<Self, InputError> {
        let enigo = Enigo::new(&Settings::default())
            .map_err(|e| InputError::Unavailable(e.to_string()))?;
        debug!("Connected to OS input backend");
        Ok(Self { enigo })
    }

    fn jump(&mut self, point: Point) -> Result<(), InputError> {
        self.enigo
            .move_mouse(point.x, point.y, Coordinate::Abs)
            .map_err(backend)
    }
}

impl InputSimulator for EnigoSimulator {
    fn position(&mut self) -> Result<Point, InputError> {
        let (x, y) = self.enigo.location().map_err(backend)?;
        Ok(Point::new(x, y))
    }

    fn screen_size(&mut self) -> Result<ScreenSize, InputError> {
        let (width, height) = self.enigo.main_display().map_err(backend)?;
        Ok(ScreenSize::new(width, height))
    }

    fn move_to(&mut self, target: Point, duration: Duration) -> Result<(), InputError> {
        if duration < EASING_STEP * 2 {
            return self.jump(target);
        }

        let start = self.position()?;
        let steps = (duration.as_millis() / EASING_STEP.as_millis()).max(1) as u32;
        let pause = duration / steps;

        for step in 1..=steps {
            let t = f64::from(step) / f64::from(steps);
            let eased = smoothstep(t);
            let x = lerp(start.x, target.x, eased);
            let y = lerp(start.y, target.y, eased);
            self.jump(Point::new(x, y))?;
            if step < steps {
                thread::sleep(pause);
            }
        }
        Ok(())
    }

    fn click(&mut self) -> Result<(), InputError> {
        self.enigo
            .button(Button::Left, Direction::Click)
            .map_err(backend)
    }

    fn press(&mut self, key: &str) -> Result<(), InputError> {
        let key = parse_key(key)?;
        self.enigo.key(key, Direction::Click).map_err(backend)
    }
}

fn backend(err: enigo::InputError) -> InputError {
    InputError::Backend(err.to_string())
}

fn smoothstep(t: f64) -> f64 {
    t * t * (3.0 - 2.0 * t)
}

fn lerp(from: i32, to: i32, t: f64) -> i32 {
    let value = f64::from(from) + (f64::from(to) - f64::from(from)) * t;
    value.round() as i32
}

/// Map a configured key name to an enigo key.
fn parse_key(name: &str) -> Result<Key, InputError> {
    let lowered = name.trim().to_ascii_lowercase();
    let key = match lowered.as_str() {
        "shift" => Key::Shift,
        "control" | "ctrl" => Key::Control,
        "alt" | "option" => Key::Alt,
        "meta" | "super" | "command" | "cmd" => Key::Meta,
        "space" => Key::Space,
        "tab" => Key::Tab,
        "escape" | "esc" => Key::Escape,
        "capslock" => Key::CapsLock,
        "f1" => Key::F1,
        "f2" => Key::F2,
        "f3" => Key::F3,
        "f4" => Key::F4,
        "f5" => Key::F5,
        "f6" => Key::F6,
        "f7" => Key::F7,
        "f8" => Key::F8,
        "f9" => Key::F9,
        "f10" => Key::F10,
        "f11" => Key::F11,
        "f12" => Key::F12,
        other => {
            let mut chars = other.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Key::Unicode(c),
                _ => return Err(InputError::UnsupportedKey(name.to_string())),
            }
        }
    };
    Ok(key)
}
