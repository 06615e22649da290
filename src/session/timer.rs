use log::trace;
use std::{
    sync::{
        Arc,
        atomic::AtomicBool,
        mpsc::Sender,
    },
    thread,
};

use super::{Clock, SessionMsg};
use crate::error::SwipeResult;
use crate::race::{COUNTDOWN_STEP_MS, RaceTiming, TICK_MS};

/// Countdown steps every second, then race ticks every `TICK_MS` until `stop`
/// is raised. Messages carry their scheduled time, not the wake-up time.
pub fn spawn(
    tx: Sender<SessionMsg>,
    clock: Clock,
    timing: RaceTiming,
    stop: Arc<AtomicBool>,
) -> SwipeResult<thread::JoinHandle<()>> {
    let handle = thread::Builder::new()
        .name("swiperace-timer".into())
        .spawn(move || run(tx, clock, timing, stop))?;
    Ok(handle)
}

fn run(tx: Sender<SessionMsg>, clock: Clock, timing: RaceTiming, stop: Arc<AtomicBool>) {
    let base = clock.now_ms();
    let n = timing.countdown_from as u64;
    let go_ms = base + n * COUNTDOWN_STEP_MS;

    let steps: Vec<u64> = if n == 0 {
        vec![base]
    } else {
        (1..=n).map(|k| base + k * COUNTDOWN_STEP_MS).collect()
    };
    for deadline in steps {
        if !clock.wait_until(deadline, &stop) || tx.send(SessionMsg::CountdownStep(deadline)).is_err() {
            return;
        }
    }

    let mut k = 1;
    loop {
        let deadline = go_ms + k * TICK_MS;
        if !clock.wait_until(deadline, &stop) || tx.send(SessionMsg::Tick(deadline)).is_err() {
            trace!("timer: stopped after {} ticks", k - 1);
            return;
        }
        k += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{atomic::Ordering, mpsc};

    #[test]
    fn emits_steps_then_ticks_until_stopped() {
        let (tx, rx) = mpsc::channel();
        let stop = Arc::new(AtomicBool::new(false));
        let timing = RaceTiming {
            countdown_from: 0,
            settle_ms: 0,
        };
        let handle = spawn(tx, Clock::new(), timing, stop.clone()).unwrap();

        let first = rx.recv().unwrap();
        let SessionMsg::CountdownStep(go) = first else {
            panic!("expected countdown step, got {first:?}");
        };
        let mut last = go;
        for _ in 0..3 {
            match rx.recv().unwrap() {
                SessionMsg::Tick(t) => {
                    assert_eq!(t - last, TICK_MS);
                    last = t;
                }
                other => panic!("unexpected {other:?}"),
            }
        }
        stop.store(true, Ordering::SeqCst);
        handle.join().unwrap();
    }
}
