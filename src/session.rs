//! Live race session: every producer (timer, input, replay, signals) posts to
//! one channel and a single loop applies the messages to the `Race`.

pub mod clock;
pub mod dispatch;
pub mod pipeline;
pub mod replay;
pub mod timer;

use log::{error, info};
use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
        mpsc::{self, Receiver, Sender},
    },
    thread,
    time::Duration,
};

use crate::error::SwipeResult;
use crate::race::{LiveView, Phase, Race, RaceEvent, RaceTiming};
use crate::scorer::RaceResult;
use crate::types::{PointerEvent, RaceConfig};

pub use clock::Clock;

const IDLE_WAIT: Duration = Duration::from_millis(250);

#[derive(Debug, Clone)]
pub enum SessionMsg {
    Pointer(PointerEvent),
    CountdownStep(u64),
    Tick(u64),
    Abort,
}

/// What subscribers see: each lifecycle event plus periodic live snapshots.
#[derive(Debug, Clone)]
pub enum SessionUpdate {
    Event(RaceEvent),
    Live(LiveView),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionOutcome {
    Finished(RaceResult),
    Aborted,
}

pub struct RaceSession {
    race: Race,
    clock: Clock,
    tx: Sender<SessionMsg>,
    rx: Receiver<SessionMsg>,
    stop: Arc<AtomicBool>,
    updates: Vec<Sender<SessionUpdate>>,
    go_waiters: Vec<Sender<u64>>,
}

impl RaceSession {
    pub fn new(config: RaceConfig, timing: RaceTiming) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            race: Race::new(config, timing),
            clock: Clock::new(),
            tx,
            rx,
            stop: Arc::new(AtomicBool::new(false)),
            updates: Vec::new(),
            go_waiters: Vec::new(),
        }
    }

    /// Handle for producers of pointer events and abort requests.
    pub fn sender(&self) -> Sender<SessionMsg> {
        self.tx.clone()
    }

    pub fn clock(&self) -> Clock {
        self.clock
    }

    /// Set once the session is over; producers poll it to exit.
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    pub fn subscribe(&mut self) -> Receiver<SessionUpdate> {
        let (tx, rx) = mpsc::channel();
        self.updates.push(tx);
        rx
    }

    /// Receives the clock reading of the Go signal, once.
    pub fn go_signal(&mut self) -> Receiver<u64> {
        let (tx, rx) = mpsc::channel();
        self.go_waiters.push(tx);
        rx
    }

    /// Run the race to completion on the calling thread.
    pub fn run(mut self) -> SessionOutcome {
        let timer = timer::spawn(
            self.tx.clone(),
            self.clock,
            self.race.timing(),
            self.stop.clone(),
        );
        if let Err(e) = timer {
            error!("session: failed to start timer: {e}");
            self.race.abort();
            return self.close(SessionOutcome::Aborted);
        }

        let from = self.race.timing().countdown_from;
        if from > 0 {
            self.publish(SessionUpdate::Event(RaceEvent::Countdown(from)));
            self.publish(SessionUpdate::Live(self.race.live()));
        }

        loop {
            let wait = match self.race.settle_deadline() {
                Some(deadline) => {
                    Duration::from_millis(deadline.saturating_sub(self.clock.now_ms()))
                }
                None => IDLE_WAIT,
            };

            match self.rx.recv_timeout(wait) {
                Ok(msg) => self.apply(msg),
                // the session keeps its own sender, so only timeouts land here
                Err(_) => {}
            }

            if self.race.phase() != Phase::Countdown && !self.race.ticker_running() {
                self.stop.store(true, Ordering::SeqCst);
            }
            if self.race.phase() == Phase::Aborted {
                return self.close(SessionOutcome::Aborted);
            }
            if let Some(result) = self.race.take_result(self.clock.now_ms()) {
                return self.close(SessionOutcome::Finished(result));
            }
        }
    }

    fn apply(&mut self, msg: SessionMsg) {
        let mut go_stamp = None;
        let event = match msg {
            SessionMsg::Pointer(ev) => self.race.on_pointer(&ev),
            SessionMsg::CountdownStep(now) => {
                go_stamp = Some(now);
                self.race.countdown_step(now)
            }
            SessionMsg::Tick(now) => {
                let ev = self.race.on_tick(now);
                if ev.is_none() && self.race.phase() == Phase::Racing {
                    self.publish(SessionUpdate::Live(self.race.live()));
                }
                ev
            }
            SessionMsg::Abort => {
                self.race.abort();
                None
            }
        };

        if let Some(ev) = event {
            if let (RaceEvent::Go, Some(go)) = (&ev, go_stamp) {
                for w in self.go_waiters.drain(..) {
                    let _ = w.send(go);
                }
            }
            self.publish(SessionUpdate::Event(ev));
            self.publish(SessionUpdate::Live(self.race.live()));
        }
    }

    fn publish(&mut self, update: SessionUpdate) {
        // drop subscribers that hung up
        self.updates.retain(|tx| tx.send(update.clone()).is_ok());
    }

    fn close(self, outcome: SessionOutcome) -> SessionOutcome {
        self.stop.store(true, Ordering::SeqCst);
        match &outcome {
            SessionOutcome::Finished(r) => info!(
                "session: result released ({} swipes, max {:.2} in/s)",
                r.swipe_count, r.max_speed
            ),
            SessionOutcome::Aborted => info!("session: closed without result"),
        }
        outcome
    }
}

/// Turn SIGINT/SIGTERM into an abort request for the running session.
pub fn abort_on_signals(tx: Sender<SessionMsg>) -> SwipeResult<()> {
    use signal_hook::{
        consts::{SIGINT, SIGTERM},
        iterator::Signals,
    };

    let mut signals = Signals::new([SIGINT, SIGTERM])?;
    thread::Builder::new()
        .name("swiperace-signals".into())
        .spawn(move || {
            if let Some(sig) = signals.forever().next() {
                info!("session: signal {sig}; aborting race");
                let _ = tx.send(SessionMsg::Abort);
            }
        })?;
    Ok(())
}
