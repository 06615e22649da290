//! Shared race-engine types: configuration, raw pointer input and speed samples.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::{SwipeError, SwipeResult};

/// Screen density used to turn pixel displacement into inches.
pub const PIXELS_PER_INCH: f64 = 160.0;
/// Samples at or below this speed are idle jitter.
pub const MIN_SPEED_IPS: f64 = 0.1;
/// Samples at or above this speed are sensor noise.
pub const MAX_SPEED_IPS: f64 = 200.0;

pub const DURATION_CHOICES: [u32; 6] = [5, 10, 15, 20, 30, 60];
pub const DISTANCE_CHOICES: [u32; 4] = [50, 100, 200, 500];

/// Inches per second → miles per hour.
pub fn ips_to_mph(ips: f64) -> f64 {
    ips * 3600.0 / 63360.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Vertical,
    Horizontal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RaceType {
    #[default]
    Timed,
    Distance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RaceMode {
    #[default]
    Solo,
    /// Results are never persisted.
    Practice,
}

impl FromStr for Direction {
    type Err = SwipeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "vertical" | "v" => Ok(Direction::Vertical),
            "horizontal" | "h" => Ok(Direction::Horizontal),
            other => Err(SwipeError::Validation(format!("unknown direction '{other}'"))),
        }
    }
}

impl FromStr for RaceType {
    type Err = SwipeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "timed" => Ok(RaceType::Timed),
            "distance" => Ok(RaceType::Distance),
            other => Err(SwipeError::Validation(format!("unknown race type '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceConfig {
    #[serde(default)]
    pub direction: Direction,
    #[serde(rename = "type", default)]
    pub race_type: RaceType,
    #[serde(default)]
    pub mode: RaceMode,
    /// Seconds, used by timed races.
    #[serde(default = "default_duration")]
    pub duration: u32,
    /// Accepted samples, used by distance races.
    #[serde(rename = "distanceTarget", alias = "distance", default = "default_target")]
    pub distance_target: u32,
}

fn default_duration() -> u32 {
    10
}

fn default_target() -> u32 {
    100
}

impl Default for RaceConfig {
    fn default() -> Self {
        Self {
            direction: Direction::Vertical,
            race_type: RaceType::Timed,
            mode: RaceMode::Solo,
            duration: default_duration(),
            distance_target: default_target(),
        }
    }
}

impl RaceConfig {
    pub fn timed(direction: Direction, duration: u32) -> Self {
        Self {
            direction,
            race_type: RaceType::Timed,
            duration,
            ..Self::default()
        }
    }

    pub fn distance(direction: Direction, distance_target: u32) -> Self {
        Self {
            direction,
            race_type: RaceType::Distance,
            distance_target,
            ..Self::default()
        }
    }

    pub fn practice(mut self) -> Self {
        self.mode = RaceMode::Practice;
        self
    }

    pub fn is_practice(&self) -> bool {
        self.mode == RaceMode::Practice
    }

    pub fn validate(&self) -> SwipeResult<()> {
        match self.race_type {
            RaceType::Timed if self.duration == 0 => Err(SwipeError::Validation(
                "timed races need a positive duration".into(),
            )),
            RaceType::Distance if self.distance_target == 0 => Err(SwipeError::Validation(
                "distance races need a positive distanceTarget".into(),
            )),
            _ => Ok(()),
        }
    }
}

/// Where a pointer stream comes from. Mouse streams are coarser, so they get a
/// larger minimum time delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputSource {
    Touch,
    Mouse,
}

impl InputSource {
    pub fn min_dt_ms(self) -> u64 {
        match self {
            InputSource::Touch => 10,
            InputSource::Mouse => 20,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointerKind {
    Down,
    Move,
    Up,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointerEvent {
    pub kind: PointerKind,
    pub source: InputSource,
    pub x: f64,
    pub y: f64,
    /// Monotonic milliseconds, same time base as timer ticks.
    #[serde(rename = "t")]
    pub t_ms: u64,
}

impl PointerEvent {
    pub fn new(kind: PointerKind, source: InputSource, x: f64, y: f64, t_ms: u64) -> Self {
        Self {
            kind,
            source,
            x,
            y,
            t_ms,
        }
    }

    pub fn touch_move(x: f64, y: f64, t_ms: u64) -> Self {
        Self::new(PointerKind::Move, InputSource::Touch, x, y, t_ms)
    }

    pub fn touch_down(x: f64, y: f64, t_ms: u64) -> Self {
        Self::new(PointerKind::Down, InputSource::Touch, x, y, t_ms)
    }

    pub fn shifted(mut self, offset_ms: u64) -> Self {
        self.t_ms += offset_ms;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeedSample {
    pub ips: f64,
    pub t_ms: u64,
}

impl SpeedSample {
    pub fn in_domain(&self) -> bool {
        self.ips > MIN_SPEED_IPS && self.ips < MAX_SPEED_IPS
    }
}
