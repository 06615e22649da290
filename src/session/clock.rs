use std::{
    sync::atomic::{AtomicBool, Ordering},
    thread,
    time::{Duration, Instant},
};

/// Longest uninterrupted sleep, so a stop request is noticed promptly.
const SLICE_MS: u64 = 50;

/// Monotonic millisecond clock shared by every producer of one session.
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    start: Instant,
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    /// Sleep until the clock reads at least `deadline_ms`. Returns `false`
    /// as soon as `stop` is raised.
    pub fn wait_until(&self, deadline_ms: u64, stop: &AtomicBool) -> bool {
        loop {
            if stop.load(Ordering::SeqCst) {
                return false;
            }
            let now = self.now_ms();
            if now >= deadline_ms {
                return true;
            }
            thread::sleep(Duration::from_millis((deadline_ms - now).min(SLICE_MS)));
        }
    }
}
