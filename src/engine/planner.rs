//! Randomized pointer-movement planning.
//!
//! The planner is a pure function of pointer position, screen size and the
//! random source; it never touches the pointer itself.

use rand::Rng;
use std::f64::consts::{PI, TAU};
use std::fmt;
use std::time::Duration;

use crate::input::{Point, ScreenSize};

/// Margin kept from the screen edge by small-scale moves.
pub const SMALL_MARGIN: i32 = 10;
/// Margin kept from the screen edge by larger and circular moves.
pub const LARGE_MARGIN: i32 = 50;
/// Margin kept from the screen edge by random screen-wide targets.
pub const CORNER_MARGIN: i32 = 100;

/// Multiplicative jitter applied to every sampled duration.
const DURATION_JITTER: (f64, f64) = (0.8, 1.2);

/// Per-axis displacement drawn from `delta` with a random sign.
#[derive(Debug, Clone, PartialEq)]
pub struct DeltaMove {
    pub delta: (i32, i32),
    pub duration_ms: (u64, u64),
    pub margin: i32,
}

/// Arc around a centre chosen so that the current position lies on the circle.
#[derive(Debug, Clone, PartialEq)]
pub struct CircularMove {
    pub radius: (i32, i32),
    pub duration_ms: (u64, u64),
    pub margin: i32,
}

/// Uniformly random target anywhere on screen inside `margin`.
#[derive(Debug, Clone, PartialEq)]
pub struct CornerMove {
    pub duration_ms: (u64, u64),
    pub margin: i32,
}

/// One of the five pointer-movement generation modes.
#[derive(Debug, Clone, PartialEq)]
pub enum MovementStrategy {
    Micro(DeltaMove),
    Small(DeltaMove),
    Medium(DeltaMove),
    Circular(CircularMove),
    RandomCorner(CornerMove),
}

impl MovementStrategy {
    pub fn micro() -> Self {
        Self::Micro(DeltaMove {
            delta: (2, 8),
            duration_ms: (80, 200),
            margin: SMALL_MARGIN,
        })
    }

    pub fn small() -> Self {
        Self::Small(DeltaMove {
            delta: (15, 40),
            duration_ms: (150, 350),
            margin: SMALL_MARGIN,
        })
    }

    pub fn medium() -> Self {
        Self::Medium(DeltaMove {
            delta: (60, 150),
            duration_ms: (250, 600),
            margin: LARGE_MARGIN,
        })
    }

    pub fn circular() -> Self {
        Self::Circular(CircularMove {
            radius: (40, 120),
            duration_ms: (400, 900),
            margin: LARGE_MARGIN,
        })
    }

    pub fn random_corner() -> Self {
        Self::RandomCorner(CornerMove {
            duration_ms: (500, 1200),
            margin: CORNER_MARGIN,
        })
    }

    /// The five strategies with their stock parameters.
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::micro(),
            Self::small(),
            Self::medium(),
            Self::circular(),
            Self::random_corner(),
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Micro(_) => "micro",
            Self::Small(_) => "small",
            Self::Medium(_) => "medium",
            Self::Circular(_) => "circular",
            Self::RandomCorner(_) => "random-corner",
        }
    }

    /// Distance every target keeps from the screen edges.
    pub fn margin(&self) -> i32 {
        match self {
            Self::Micro(p) | Self::Small(p) | Self::Medium(p) => p.margin,
            Self::Circular(p) => p.margin,
            Self::RandomCorner(p) => p.margin,
        }
    }

    fn duration_range(&self) -> (u64, u64) {
        match self {
            Self::Micro(p) | Self::Small(p) | Self::Medium(p) => p.duration_ms,
            Self::Circular(p) => p.duration_ms,
            Self::RandomCorner(p) => p.duration_ms,
        }
    }

    /// Sample a concrete movement starting at `from`.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        from: Point,
        screen: ScreenSize,
        rng: &mut R,
    ) -> MovementPlan {
        let margin = self.margin();
        let duration = jittered(self.duration_range(), rng);

        let (waypoint, target) = match self {
            Self::Micro(p) | Self::Small(p) | Self::Medium(p) => {
                let dx = signed(p.delta, rng);
                let dy = signed(p.delta, rng);
                (None, from.offset(dx, dy))
            }
            Self::Circular(p) => {
                let radius = f64::from(rng.gen_range(p.radius.0..=p.radius.1));
                let start_angle = rng.gen_range(0.0..TAU);
                let direction = if rng.gen_bool(0.5) { 1.0 } else { -1.0 };
                let sweep = rng.gen_range(PI / 2.0..=PI) * direction;
                let centre = (
                    f64::from(from.x) - radius * start_angle.cos(),
                    f64::from(from.y) - radius * start_angle.sin(),
                );
                let on_arc = |angle: f64| {
                    Point::new(
                        (centre.0 + radius * angle.cos()).round() as i32,
                        (centre.1 + radius * angle.sin()).round() as i32,
                    )
                };
                (
                    Some(on_arc(start_angle + sweep / 2.0)),
                    on_arc(start_angle + sweep),
                )
            }
            Self::RandomCorner(_) => {
                let x = random_axis(screen.width, margin, rng);
                let y = random_axis(screen.height, margin, rng);
                (None, Point::new(x, y))
            }
        };

        MovementPlan {
            strategy: self.name(),
            margin,
            waypoint: waypoint.map(|w| clamp_to_screen(w, screen, margin)),
            target: clamp_to_screen(target, screen, margin),
            duration,
        }
    }
}

/// A concrete pointer movement ready to hand to the input simulator.
#[derive(Debug, Clone, PartialEq)]
pub struct MovementPlan {
    pub strategy: &'static str,
    pub margin: i32,
    /// Intermediate point; the motion is split into two linear segments.
    pub waypoint: Option<Point>,
    pub target: Point,
    /// Total motion time across all segments.
    pub duration: Duration,
}

impl MovementPlan {
    /// Segments to perform in order, each with its share of the duration.
    pub fn segments(&self) -> Vec<(Point, Duration)> {
        match self.waypoint {
            Some(waypoint) => {
                let half = self.duration / 2;
                vec![(waypoint, half), (self.target, self.duration - half)]
            }
            None => vec![(self.target, self.duration)],
        }
    }
}

impl fmt::Display for MovementPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> ({}, {}) in {}ms",
            self.strategy,
            self.target.x,
            self.target.y,
            self.duration.as_millis()
        )?;
        if let Some(w) = self.waypoint {
            write!(f, " via ({}, {})", w.x, w.y)?;
        }
        Ok(())
    }
}

/// Chooses a strategy uniformly at random and samples it.
#[derive(Debug, Clone)]
pub struct MovementPlanner {
    strategies: Vec<MovementStrategy>,
}

impl Default for MovementPlanner {
    fn default() -> Self {
        Self::new(MovementStrategy::defaults())
    }
}

impl MovementPlanner {
    /// Planner over a custom strategy set. An empty set falls back to the defaults.
    pub fn new(strategies: Vec<MovementStrategy>) -> Self {
        if strategies.is_empty() {
            return Self::default();
        }
        Self { strategies }
    }

    pub fn strategies(&self) -> &[MovementStrategy] {
        &self.strategies
    }

    pub fn choose<R: Rng + ?Sized>(&self, rng: &mut R) -> &MovementStrategy {
        &self.strategies[rng.gen_range(0..self.strategies.len())]
    }

    pub fn plan<R: Rng + ?Sized>(
        &self,
        from: Point,
        screen: ScreenSize,
        rng: &mut R,
    ) -> MovementPlan {
        self.choose(rng).sample(from, screen, rng)
    }
}

/// Clamp a point into `[margin, dim - margin]` on both axes.
///
/// Screens too small for the margin collapse to their centre line.
pub fn clamp_to_screen(point: Point, screen: ScreenSize, margin: i32) -> Point {
    Point::new(
        clamp_axis(point.x, screen.width, margin),
        clamp_axis(point.y, screen.height, margin),
    )
}

fn clamp_axis(value: i32, dim: i32, margin: i32) -> i32 {
    let high = dim - margin;
    if high < margin {
        dim / 2
    } else {
        value.clamp(margin, high)
    }
}

fn random_axis<R: Rng + ?Sized>(dim: i32, margin: i32, rng: &mut R) -> i32 {
    let high = dim - margin;
    if high < margin {
        dim / 2
    } else {
        rng.gen_range(margin..=high)
    }
}

fn signed<R: Rng + ?Sized>((low, high): (i32, i32), rng: &mut R) -> i32 {
    let magnitude = rng.gen_range(low..=high);
    if rng.gen_bool(0.5) {
        magnitude
    } else {
        -magnitude
    }
}

fn jittered<R: Rng + ?Sized>((low, high): (u64, u64), rng: &mut R) -> Duration {
    let base = rng.gen_range(low..=high) as f64;
    let factor = rng.gen_range(DURATION_JITTER.0..=DURATION_JITTER.1);
    Duration::from_secs_f64(base * factor / 1000.0)
}
