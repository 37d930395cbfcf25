//! Input-simulation boundary with an OS-backed implementation.

mod os;

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

pub use self::os::EnigoSimulator;

/// A pointer position in screen pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Returns this point shifted by the given deltas.
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x.saturating_add(dx),
            y: self.y.saturating_add(dy),
        }
    }
}

/// Dimensions of the main display in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenSize {
    pub width: i32,
    pub height: i32,
}

impl ScreenSize {
    pub const fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }

    /// Whether the point lies on the screen.
    pub const fn contains(&self, point: Point) -> bool {
        point.x >= 0 && point.y >= 0 && point.x < self.width && point.y < self.height
    }
}

/// Failures reported by an input provider.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("input simulation unavailable: {0}")]
    Unavailable(String),
    #[error("unsupported key: {0}")]
    UnsupportedKey(String),
    #[error("input backend error: {0}")]
    Backend(String),
}

/// Primitive pointer and keyboard operations the engine relies on.
///
/// Every operation may fail; callers treat failure as an ordinary outcome.
pub trait InputSimulator {
    /// Current pointer position.
    fn position(&mut self) -> Result<Point, InputError>;

    /// Size of the main display.
    fn screen_size(&mut self) -> Result<ScreenSize, InputError>;

    /// Move the pointer to `target`, easing over `duration` (zero = jump).
    fn move_to(&mut self, target: Point, duration: Duration) -> Result<(), InputError>;

    /// Left click at the current pointer position.
    fn click(&mut self) -> Result<(), InputError>;

    /// Press and release the named key.
    fn press(&mut self, key: &str) -> Result<(), InputError>;
}

impl<S: InputSimulator + ?Sized> InputSimulator for Box<S> {
    fn position(&mut self) -> Result<Point, InputError> {
        (**self).position()
    }

    fn screen_size(&mut self) -> Result<ScreenSize, InputError> {
        (**self).screen_size()
    }

    fn move_to(&mut self, target: Point, duration: Duration) -> Result<(), InputError> {
        (**self).move_to(target, duration)
    }

    fn click(&mut self) -> Result<(), InputError> {
        (**self).click()
    }

    fn press(&mut self, key: &str) -> Result<(), InputError> {
        (**self).press(key)
    }
}

/// Stand-in used when no OS provider could be created. Every call fails.
#[derive(Debug, Clone)]
pub struct UnavailableSimulator {
    reason: String,
}

impl UnavailableSimulator {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    fn fail<T>(&self) -> Result<T, InputError> {
        Err(InputError::Unavailable(self.reason.clone()))
    }
}

impl InputSimulator for UnavailableSimulator {
    fn position(&mut self) -> Result<Point, InputError> {
        self.fail()
    }

    fn screen_size(&mut self) -> Result<ScreenSize, InputError> {
        self.fail()
    }

    fn move_to(&mut self, _target: Point, _duration: Duration) -> Result<(), InputError> {
        self.fail()
    }

    fn click(&mut self) -> Result<(), InputError> {
        self.fail()
    }

    fn press(&mut self, _key: &str) -> Result<(), InputError> {
        self.fail()
    }
}
