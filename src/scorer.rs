//! Final scoring: aggregates in, immutable `RaceResult` out.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::aggregator::SampleAggregator;
use crate::types::ips_to_mph;

/// How many trailing samples a result keeps.
pub const RESULT_HISTORY_CAP: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Grade {
    S,
    A,
    B,
    C,
    D,
}

impl Grade {
    /// Thresholds are exclusive lower bounds on peak speed, checked top-down.
    pub fn from_max_speed(max_ips: f64) -> Self {
        if max_ips > 30.0 {
            Grade::S
        } else if max_ips > 20.0 {
            Grade::A
        } else if max_ips > 10.0 {
            Grade::B
        } else if max_ips > 5.0 {
            Grade::C
        } else {
            Grade::D
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Grade::S => "S",
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Medal {
    Gold,
    Silver,
    Bronze,
}

impl Medal {
    pub fn from_max_speed(max_ips: f64) -> Self {
        if max_ips > 20.0 {
            Medal::Gold
        } else if max_ips > 10.0 {
            Medal::Silver
        } else {
            Medal::Bronze
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RaceResult {
    pub swipe_count: u32,
    pub max_speed: f64,
    pub avg_speed: f64,
    /// Seconds from Go to finish.
    pub duration: f64,
    /// Up to the last 20 accepted speeds, oldest first.
    #[serde(default)]
    pub speed_history: Vec<f64>,
}

impl RaceResult {
    pub fn grade(&self) -> Grade {
        Grade::from_max_speed(self.max_speed)
    }

    pub fn medal(&self) -> Medal {
        Medal::from_max_speed(self.max_speed)
    }

    pub fn max_mph(&self) -> f64 {
        ips_to_mph(self.max_speed)
    }

    pub fn avg_mph(&self) -> f64 {
        ips_to_mph(self.avg_speed)
    }
}

pub fn score(agg: &SampleAggregator, elapsed_secs: f64, swipe_count: u32) -> RaceResult {
    let totals = agg.totals();
    RaceResult {
        swipe_count,
        max_speed: totals.max,
        avg_speed: totals.average(),
        duration: elapsed_secs,
        speed_history: agg.recent(RESULT_HISTORY_CAP),
    }
}
