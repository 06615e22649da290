//! Sample filtering and running statistics.

use std::collections::VecDeque;

use log::trace;

use crate::types::SpeedSample;

/// Live-display history length. Scoring keeps a shorter tail.
pub const LIVE_HISTORY_CAP: usize = 50;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RaceAggregates {
    pub count: u32,
    pub sum: f64,
    pub max: f64,
}

impl RaceAggregates {
    pub fn average(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }
}

#[derive(Debug, Default)]
pub struct SampleAggregator {
    totals: RaceAggregates,
    history: VecDeque<f64>,
    current: f64,
}

impl SampleAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a sample into the totals. Out-of-domain samples are dropped and
    /// `false` is returned.
    pub fn accept(&mut self, sample: SpeedSample) -> bool {
        if !sample.in_domain() {
            trace!("aggregator: dropped {:.3} in/s", sample.ips);
            return false;
        }

        let v = sample.ips;
        self.totals.count += 1;
        self.totals.sum += v;
        self.totals.max = self.totals.max.max(v);
        self.current = v;

        if self.history.len() == LIVE_HISTORY_CAP {
            self.history.pop_front();
        }
        self.history.push_back(v);
        true
    }

    pub fn totals(&self) -> RaceAggregates {
        self.totals
    }

    pub fn average(&self) -> f64 {
        self.totals.average()
    }

    /// Speed of the most recently accepted sample.
    pub fn current(&self) -> f64 {
        self.current
    }

    /// Live history, oldest first.
    pub fn history(&self) -> impl ExactSizeIterator<Item = f64> + '_ {
        self.history.iter().copied()
    }

    /// The most recent `n` history values, oldest first.
    pub fn recent(&self, n: usize) -> Vec<f64> {
        let skip = self.history.len().saturating_sub(n);
        self.history.iter().skip(skip).copied().collect()
    }
}
