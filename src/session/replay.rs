//! Scripted pointer input, either played in real time into a session or run
//! against a virtual clock.
//!
//! Scripts are JSON Lines, one pointer event per line, with `t` measured in
//! milliseconds from the Go signal:
//!
//! ```text
//! {"kind":"down","source":"touch","x":0,"y":0,"t":0}
//! {"kind":"move","source":"touch","x":0,"y":32,"t":100}
//! ```

use log::{debug, info};
use std::{
    io::BufRead,
    sync::{
        Arc,
        atomic::AtomicBool,
        mpsc::{Receiver, Sender},
    },
    thread,
};

use super::{Clock, SessionMsg, SessionOutcome};
use crate::error::{SwipeError, SwipeResult};
use crate::race::{COUNTDOWN_STEP_MS, Phase, Race, RaceEvent, RaceTiming, TICK_MS};
use crate::types::{PointerEvent, RaceConfig, RaceType};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplayScript {
    /// Offsets relative to Go, in file order.
    pub events: Vec<PointerEvent>,
}

impl ReplayScript {
    pub fn new(events: Vec<PointerEvent>) -> Self {
        Self { events }
    }

    /// Blank lines and `#` comments are skipped.
    pub fn parse<R: BufRead>(reader: R) -> SwipeResult<Self> {
        let mut events = Vec::new();
        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let ev: PointerEvent = serde_json::from_str(trimmed).map_err(|e| {
                SwipeError::Validation(format!("replay line {}: {e}", i + 1))
            })?;
            if let Some(prev) = events.last().map(|p: &PointerEvent| p.t_ms) {
                if ev.t_ms < prev {
                    return Err(SwipeError::Validation(format!(
                        "replay line {}: time goes backwards ({} < {prev})",
                        i + 1,
                        ev.t_ms
                    )));
                }
            }
            events.push(ev);
        }
        Ok(Self { events })
    }
}

/// Outcome of a virtual-clock run.
#[derive(Debug, Clone, PartialEq)]
pub struct Simulation {
    pub outcome: Option<SessionOutcome>,
    /// Lifecycle events with their virtual timestamps.
    pub events: Vec<(u64, RaceEvent)>,
    /// Virtual time of the Go signal.
    pub go_ms: u64,
    pub final_phase: Phase,
}

/// Run a race against a virtual clock: countdown steps every second, ticks
/// every `TICK_MS` after Go, script events at `go + t`. A pointer event and a
/// tick sharing a timestamp are applied pointer first. Stops once the result
/// is released, or when a distance race runs out of script.
pub fn simulate(config: RaceConfig, timing: RaceTiming, script: &ReplayScript) -> Simulation {
    let mut race = Race::new(config, timing);
    let mut events = Vec::new();

    let n = timing.countdown_from as u64;
    let go_ms = n * COUNTDOWN_STEP_MS;
    if n == 0 {
        record(&mut events, 0, race.countdown_step(0));
    } else {
        for k in 1..=n {
            let t = k * COUNTDOWN_STEP_MS;
            record(&mut events, t, race.countdown_step(t));
        }
    }

    let mut pending = script.events.iter().map(|e| e.shifted(go_ms)).peekable();
    let mut next_tick = go_ms + TICK_MS;

    loop {
        if let Some(deadline) = race.settle_deadline() {
            let result = race.take_result(deadline);
            return Simulation {
                outcome: result.map(SessionOutcome::Finished),
                events,
                go_ms,
                final_phase: race.phase(),
            };
        }

        let next_pointer = pending.peek().map(|e| e.t_ms);
        // ticks alone never end a distance race
        let can_tick = race.ticker_running()
            && (next_pointer.is_some() || race.config().race_type == RaceType::Timed);
        match next_pointer {
            Some(t) if t <= next_tick || !race.ticker_running() => {
                if let Some(ev) = pending.next() {
                    record(&mut events, t, race.on_pointer(&ev));
                }
            }
            _ if can_tick => {
                record(&mut events, next_tick, race.on_tick(next_tick));
                next_tick += TICK_MS;
            }
            _ => {
                debug!("replay: script exhausted before the race finished");
                return Simulation {
                    outcome: None,
                    events,
                    go_ms,
                    final_phase: race.phase(),
                };
            }
        }
    }
}

fn record(events: &mut Vec<(u64, RaceEvent)>, t: u64, ev: Option<RaceEvent>) {
    if let Some(ev) = ev {
        events.push((t, ev));
    }
}

/// Play the script into a live session once it signals Go.
pub fn spawn(
    script: ReplayScript,
    go: Receiver<u64>,
    tx: Sender<SessionMsg>,
    clock: Clock,
    stop: Arc<AtomicBool>,
) -> SwipeResult<thread::JoinHandle<()>> {
    let handle = thread::Builder::new()
        .name("swiperace-replay".into())
        .spawn(move || {
            let Ok(go_ms) = go.recv() else {
                return;
            };
            let total = script.events.len();
            for ev in script.events {
                let ev = ev.shifted(go_ms);
                if !clock.wait_until(ev.t_ms, &stop) || tx.send(SessionMsg::Pointer(ev)).is_err() {
                    debug!("replay: stopped early");
                    return;
                }
            }
            info!("replay: delivered {total} events");
        })?;
    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Direction;
    use std::io::Cursor;

    #[test]
    fn parses_jsonl_with_comments() {
        let txt = "# warmup\n\n{\"kind\":\"down\",\"source\":\"touch\",\"x\":0,\"y\":0,\"t\":0}\n{\"kind\":\"move\",\"source\":\"mouse\",\"x\":1.5,\"y\":32,\"t\":100}\n";
        let script = ReplayScript::parse(Cursor::new(txt)).unwrap();
        assert_eq!(script.events.len(), 2);
        assert_eq!(script.events[1].t_ms, 100);
        assert_eq!(script.events[1].x, 1.5);
    }

    #[test]
    fn rejects_bad_lines() {
        let err = ReplayScript::parse(Cursor::new("{\"kind\":\"hover\"}\n")).unwrap_err();
        assert!(err.to_string().contains("line 1"));

        let backwards = "{\"kind\":\"move\",\"source\":\"touch\",\"x\":0,\"y\":0,\"t\":50}\n{\"kind\":\"move\",\"source\":\"touch\",\"x\":0,\"y\":0,\"t\":10}\n";
        assert!(ReplayScript::parse(Cursor::new(backwards)).is_err());
    }

    #[test]
    fn timed_simulation_runs_to_completion_without_input() {
        let sim = simulate(
            RaceConfig::timed(Direction::Vertical, 2),
            RaceTiming::default(),
            &ReplayScript::default(),
        );
        assert_eq!(sim.go_ms, 3000);
        let Some(SessionOutcome::Finished(r)) = sim.outcome else {
            panic!("no result");
        };
        assert_eq!(r.duration, 2.0);
        assert_eq!(r.swipe_count, 0);
        assert_eq!(
            sim.events.last(),
            Some(&(5000, RaceEvent::Finished { elapsed: 2.0 }))
        );
    }

    #[test]
    fn playback_stops_when_the_session_ends() {
        use std::sync::mpsc;
        use std::time::Instant;

        let script = ReplayScript::new(vec![PointerEvent::touch_down(0.0, 0.0, 60_000)]);
        let (go_tx, go_rx) = mpsc::channel();
        let (tx, rx) = mpsc::channel();
        let stop = Arc::new(AtomicBool::new(false));
        let handle = spawn(script, go_rx, tx, Clock::new(), stop.clone()).unwrap();

        go_tx.send(0).unwrap();
        thread::sleep(std::time::Duration::from_millis(50));
        let raised = Instant::now();
        stop.store(true, std::sync::atomic::Ordering::SeqCst);
        handle.join().unwrap();

        assert!(raised.elapsed().as_millis() < 1_000);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn unfinished_distance_race_reports_no_outcome() {
        let script = ReplayScript::new(vec![
            PointerEvent::touch_down(0.0, 0.0, 0),
            PointerEvent::touch_move(0.0, 32.0, 100),
        ]);
        let sim = simulate(
            RaceConfig::distance(Direction::Vertical, 10),
            RaceTiming::default(),
            &script,
        );
        assert_eq!(sim.outcome, None);
        assert_eq!(sim.final_phase, Phase::Racing);
    }
}
