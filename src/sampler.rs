//! Reference-point tracking: turns consecutive pointer positions into speed samples.

use log::trace;

use crate::types::{Direction, InputSource, PIXELS_PER_INCH, PointerEvent, PointerKind, SpeedSample};

#[derive(Debug, Clone, Copy)]
struct Reference {
    x: f64,
    y: f64,
    t_ms: u64,
}

impl From<&PointerEvent> for Reference {
    fn from(ev: &PointerEvent) -> Self {
        Self {
            x: ev.x,
            y: ev.y,
            t_ms: ev.t_ms,
        }
    }
}

#[derive(Debug)]
pub struct MotionSampler {
    direction: Direction,
    reference: Option<Reference>,
    mouse_down: bool,
}

impl MotionSampler {
    pub fn new(direction: Direction) -> Self {
        Self {
            direction,
            reference: None,
            mouse_down: false,
        }
    }

    /// Forget the reference point; the next event becomes the new baseline.
    pub fn reset(&mut self) {
        self.reference = None;
        self.mouse_down = false;
    }

    /// Process one event, yielding at most one raw (unfiltered) sample.
    pub fn on_event(&mut self, ev: &PointerEvent) -> Option<SpeedSample> {
        match ev.kind {
            PointerKind::Down => {
                if ev.source == InputSource::Mouse {
                    self.mouse_down = true;
                }
                self.reference = Some(Reference::from(ev));
                None
            }
            PointerKind::Up => {
                if ev.source == InputSource::Mouse {
                    self.mouse_down = false;
                }
                self.reference = None;
                None
            }
            PointerKind::Move => self.on_move(ev),
        }
    }

    fn on_move(&mut self, ev: &PointerEvent) -> Option<SpeedSample> {
        // hovering mouse is not a swipe
        if ev.source == InputSource::Mouse && !self.mouse_down {
            return None;
        }

        // reference always advances, sample or not
        let prev = self.reference.replace(Reference::from(ev))?;

        let dt_ms = ev.t_ms.saturating_sub(prev.t_ms);
        if dt_ms < ev.source.min_dt_ms() {
            trace!("sampler: dt {dt_ms}ms below {:?} floor", ev.source);
            return None;
        }

        let px = match self.direction {
            Direction::Vertical => (ev.y - prev.y).abs(),
            Direction::Horizontal => (ev.x - prev.x).abs(),
        };
        let inches = px / PIXELS_PER_INCH;
        let dt = dt_ms as f64 / 1000.0;

        Some(SpeedSample {
            ips: inches / dt,
            t_ms: ev.t_ms,
        })
    }
}
