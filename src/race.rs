//! Race lifecycle: countdown → racing → finished, with one-shot finish arbitration.
//!
//! A `Race` is driven by three inputs, all carrying a millisecond timestamp in
//! one monotonic time base: countdown steps (1 s apart), periodic ticks
//! (`TICK_MS` apart, started on Go) and pointer events. The caller serializes
//! them; the race itself never sleeps or spawns anything.

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::aggregator::{RaceAggregates, SampleAggregator};
use crate::sampler::MotionSampler;
use crate::scorer::{self, RaceResult};
use crate::types::{PointerEvent, RaceConfig, RaceType};

/// Period of the race ticker.
pub const TICK_MS: u64 = 100;
/// Spacing of countdown steps.
pub const COUNTDOWN_STEP_MS: u64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaceTiming {
    /// First visible countdown value.
    #[serde(default = "default_countdown")]
    pub countdown_from: u32,
    /// Freeze-frame pause between finishing and releasing the result.
    #[serde(default = "default_settle")]
    pub settle_ms: u64,
}

fn default_countdown() -> u32 {
    3
}

fn default_settle() -> u64 {
    800
}

impl Default for RaceTiming {
    fn default() -> Self {
        Self {
            countdown_from: default_countdown(),
            settle_ms: default_settle(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Countdown,
    Racing,
    Finished,
    /// Cancelled from outside; never yields a result.
    Aborted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ticker {
    Idle,
    Running,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RaceEvent {
    /// Countdown advanced to this (non-zero) value.
    Countdown(u32),
    /// Countdown hit zero; racing has begun.
    Go,
    /// Finish latched with this many seconds on the clock.
    Finished { elapsed: f64 },
}

/// Snapshot for live displays.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveView {
    pub phase: Phase,
    pub countdown: u32,
    pub current_speed: f64,
    pub max_speed: f64,
    pub avg_speed: f64,
    pub sample_count: u32,
    pub elapsed: f64,
    /// Timed races only.
    pub time_left: Option<f64>,
    /// 0.0 → 1.0 towards the race goal.
    pub progress: f64,
}

#[derive(Debug)]
pub struct Race {
    config: RaceConfig,
    timing: RaceTiming,
    phase: Phase,
    countdown: u32,
    start_ms: u64,
    elapsed: f64,
    time_left: f64,
    sample_count: u32,
    sampler: MotionSampler,
    aggregator: SampleAggregator,
    ticker: Ticker,
    finish_latch: bool,
    finished_at_ms: u64,
    pending: Option<RaceResult>,
}

impl Race {
    pub fn new(config: RaceConfig, timing: RaceTiming) -> Self {
        Self {
            sampler: MotionSampler::new(config.direction),
            aggregator: SampleAggregator::new(),
            time_left: config.duration as f64,
            countdown: timing.countdown_from,
            config,
            timing,
            phase: Phase::Countdown,
            start_ms: 0,
            elapsed: 0.0,
            sample_count: 0,
            ticker: Ticker::Idle,
            finish_latch: false,
            finished_at_ms: 0,
            pending: None,
        }
    }

    pub fn config(&self) -> &RaceConfig {
        &self.config
    }

    pub fn timing(&self) -> RaceTiming {
        self.timing
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn sample_count(&self) -> u32 {
        self.sample_count
    }

    pub fn aggregates(&self) -> RaceAggregates {
        self.aggregator.totals()
    }

    /// Whether the periodic ticker should keep firing.
    pub fn ticker_running(&self) -> bool {
        self.ticker == Ticker::Running
    }

    /// One countdown second has passed.
    pub fn countdown_step(&mut self, now_ms: u64) -> Option<RaceEvent> {
        if self.phase != Phase::Countdown {
            return None;
        }
        self.countdown = self.countdown.saturating_sub(1);
        if self.countdown > 0 {
            debug!("race: countdown {}", self.countdown);
            return Some(RaceEvent::Countdown(self.countdown));
        }

        self.phase = Phase::Racing;
        self.start_ms = now_ms;
        self.ticker = Ticker::Running;
        self.sampler.reset();
        info!(
            "race: go ({:?} {:?}, {:?})",
            self.config.race_type, self.config.direction, self.config.mode
        );
        Some(RaceEvent::Go)
    }

    pub fn on_pointer(&mut self, ev: &PointerEvent) -> Option<RaceEvent> {
        if self.phase != Phase::Racing {
            return None;
        }
        let sample = self.sampler.on_event(ev)?;
        if !self.aggregator.accept(sample) {
            return None;
        }
        self.sample_count += 1;

        if self.config.race_type == RaceType::Distance
            && self.sample_count >= self.config.distance_target
        {
            self.ticker = Ticker::Cancelled;
            let elapsed = self.seconds_since_start(sample.t_ms);
            return self.finish_at(sample.t_ms, elapsed);
        }
        None
    }

    pub fn on_tick(&mut self, now_ms: u64) -> Option<RaceEvent> {
        if self.phase != Phase::Racing || self.ticker != Ticker::Running {
            return None;
        }
        self.elapsed = self.seconds_since_start(now_ms);

        if self.config.race_type == RaceType::Timed {
            let left = self.config.duration as f64 - self.elapsed;
            self.time_left = left.max(0.0);
            if left <= 0.0 {
                self.ticker = Ticker::Cancelled;
                return self.finish_at(now_ms, self.elapsed);
            }
        }
        None
    }

    /// External finish request. Returns `false` when a finish already latched
    /// or the race is not racing.
    pub fn finish(&mut self, now_ms: u64) -> bool {
        if self.phase == Phase::Countdown || self.phase == Phase::Aborted {
            return false;
        }
        let elapsed = self.seconds_since_start(now_ms);
        self.finish_at(now_ms, elapsed).is_some()
    }

    fn finish_at(&mut self, now_ms: u64, elapsed: f64) -> Option<RaceEvent> {
        if self.finish_latch {
            debug!("race: duplicate finish ignored");
            return None;
        }
        self.finish_latch = true;
        self.phase = Phase::Finished;
        self.ticker = Ticker::Cancelled;
        self.elapsed = elapsed;
        self.finished_at_ms = now_ms;
        self.pending = Some(scorer::score(
            &self.aggregator,
            elapsed,
            self.sample_count,
        ));
        info!(
            "race: finished after {elapsed:.2}s with {} swipes",
            self.sample_count
        );
        Some(RaceEvent::Finished { elapsed })
    }

    /// When the settled result becomes available, if a finish has latched.
    pub fn settle_deadline(&self) -> Option<u64> {
        self.pending
            .as_ref()
            .map(|_| self.finished_at_ms + self.timing.settle_ms)
    }

    /// Hand out the result once the settle delay has passed. Yields at most once.
    pub fn take_result(&mut self, now_ms: u64) -> Option<RaceResult> {
        if self.phase != Phase::Finished {
            return None;
        }
        let deadline = self.settle_deadline()?;
        if now_ms < deadline {
            return None;
        }
        self.pending.take()
    }

    /// Cancel the race. Stops the ticker and drops any pending result.
    pub fn abort(&mut self) {
        if self.phase == Phase::Aborted {
            return;
        }
        info!("race: aborted during {:?}", self.phase);
        self.phase = Phase::Aborted;
        self.ticker = Ticker::Cancelled;
        self.pending = None;
        self.sampler.reset();
    }

    pub fn live(&self) -> LiveView {
        let totals = self.aggregator.totals();
        let (time_left, progress) = match self.config.race_type {
            RaceType::Timed => {
                let duration = self.config.duration as f64;
                let p = if duration > 0.0 {
                    1.0 - self.time_left / duration
                } else {
                    1.0
                };
                (Some(self.time_left), p)
            }
            RaceType::Distance => {
                let target = self.config.distance_target.max(1) as f64;
                (None, (self.sample_count as f64 / target).min(1.0))
            }
        };
        LiveView {
            phase: self.phase,
            countdown: self.countdown,
            current_speed: self.aggregator.current(),
            max_speed: totals.max,
            avg_speed: totals.average(),
            sample_count: self.sample_count,
            elapsed: self.elapsed,
            time_left,
            progress,
        }
    }

    fn seconds_since_start(&self, now_ms: u64) -> f64 {
        now_ms.saturating_sub(self.start_ms) as f64 / 1000.0
    }
}
