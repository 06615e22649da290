use swiperace::leaderboard::{self, RaceRecord, ResultStore};
use swiperace::player::{self, PLAYERS_KEY, Player};
use swiperace::race::{Phase, Race, RaceEvent, RaceTiming};
use swiperace::scorer::{Grade, Medal};
use swiperace::session::{
    RaceSession, SessionOutcome,
    dispatch::{Dispatch, dispatch_outcome},
    replay::{self, ReplayScript},
};
use swiperace::store::{FileStore, KvStore, MemoryStore};
use swiperace::types::{Direction, PointerEvent, RaceConfig};

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

/// A touch-down at the origin followed by vertical moves of `step_px`, one
/// every 100 ms.
fn vertical_swipes(step_px: f64, moves: usize) -> Vec<PointerEvent> {
    let mut events = vec![PointerEvent::touch_down(0.0, 0.0, 0)];
    for i in 1..=moves {
        events.push(PointerEvent::touch_move(
            0.0,
            step_px * i as f64,
            100 * i as u64,
        ));
    }
    events
}

fn finished(sim: &replay::Simulation) -> &swiperace::scorer::RaceResult {
    match &sim.outcome {
        Some(SessionOutcome::Finished(r)) => r,
        other => panic!("expected a result, got {other:?}"),
    }
}

#[test]
fn timed_race_of_steady_two_ips_swipes() {
    let script = ReplayScript::new(vertical_swipes(32.0, 5));
    let sim = replay::simulate(
        RaceConfig::timed(Direction::Vertical, 10),
        RaceTiming::default(),
        &script,
    );

    let r = finished(&sim);
    assert_eq!(r.swipe_count, 5);
    assert!(approx(r.max_speed, 2.0));
    assert!(approx(r.avg_speed, 2.0));
    assert!(approx(r.duration, 10.0));
    assert_eq!(r.speed_history.len(), 5);
    assert_eq!(r.grade(), Grade::D);
    assert_eq!(r.medal(), Medal::Bronze);
}

#[test]
fn distance_race_ignores_noise_after_target() {
    let mut events = vertical_swipes(80.0, 3);
    // 4000 px in 100 ms is 250 in/s
    events.push(PointerEvent::touch_move(0.0, 240.0 + 4000.0, 400));
    let sim = replay::simulate(
        RaceConfig::distance(Direction::Vertical, 3),
        RaceTiming::default(),
        &ReplayScript::new(events),
    );

    let r = finished(&sim);
    assert_eq!(r.swipe_count, 3);
    assert!(approx(r.max_speed, 5.0));
    assert!(approx(r.avg_speed, 5.0));
    // finishes on the third sample, not on a tick boundary
    assert!(approx(r.duration, 0.3));

    let finishes: Vec<_> = sim
        .events
        .iter()
        .filter(|(_, e)| matches!(e, RaceEvent::Finished { .. }))
        .collect();
    assert_eq!(finishes.len(), 1);
    assert_eq!(finishes[0].0, sim.go_ms + 300);
}

#[test]
fn out_of_domain_sample_never_counts() {
    let mut race = Race::new(
        RaceConfig::distance(Direction::Vertical, 3),
        RaceTiming {
            countdown_from: 1,
            settle_ms: 0,
        },
    );
    assert_eq!(race.countdown_step(1000), Some(RaceEvent::Go));

    race.on_pointer(&PointerEvent::touch_down(0.0, 0.0, 1000));
    race.on_pointer(&PointerEvent::touch_move(0.0, 4000.0, 1100));
    assert_eq!(race.sample_count(), 0);
    assert_eq!(race.aggregates().count, 0);
    assert_eq!(race.phase(), Phase::Racing);
}

#[test]
fn timed_race_ends_on_the_tick_that_exhausts_the_clock() {
    let sim = replay::simulate(
        RaceConfig::timed(Direction::Horizontal, 1),
        RaceTiming {
            countdown_from: 3,
            settle_ms: 800,
        },
        &ReplayScript::default(),
    );

    let countdown: Vec<_> = sim
        .events
        .iter()
        .filter_map(|(t, e)| match e {
            RaceEvent::Countdown(n) => Some((*t, *n)),
            _ => None,
        })
        .collect();
    assert_eq!(countdown, vec![(1000, 2), (2000, 1)]);
    assert_eq!(sim.go_ms, 3000);
    assert_eq!(
        sim.events.last(),
        Some(&(4000, RaceEvent::Finished { elapsed: 1.0 }))
    );
    assert_eq!(sim.final_phase, Phase::Finished);
}

#[test]
fn second_finish_request_is_a_no_op() {
    let mut race = Race::new(
        RaceConfig::timed(Direction::Vertical, 1),
        RaceTiming {
            countdown_from: 0,
            settle_ms: 800,
        },
    );
    assert_eq!(race.countdown_step(0), Some(RaceEvent::Go));
    race.on_pointer(&PointerEvent::touch_down(0.0, 0.0, 0));
    race.on_pointer(&PointerEvent::touch_move(0.0, 32.0, 100));

    assert!(race.finish(1000));
    // the tick that would also satisfy the timed condition
    assert_eq!(race.on_tick(1000), None);
    assert!(!race.finish(1000));

    // input during the settle pause is ignored
    race.on_pointer(&PointerEvent::touch_move(0.0, 96.0, 1100));
    assert_eq!(race.sample_count(), 1);

    assert_eq!(race.take_result(1799), None);
    let r = race.take_result(1800).expect("settled result");
    assert_eq!(r.swipe_count, 1);
    assert_eq!(race.take_result(5000), None);
}

#[test]
fn malformed_player_registry_reads_as_empty() {
    let mut store = MemoryStore::new();
    store.insert_raw(PLAYERS_KEY, "{not json");
    assert!(player::load_players(&store).is_empty());

    store.insert_raw(PLAYERS_KEY, "[1, 2, 3]");
    assert!(player::load_players(&store).is_empty());

    // registration proceeds and replaces the junk
    let p = player::register(&mut store, "ace", "").unwrap();
    assert_eq!(p.handle, "ACE");
    assert!(player::load_players(&store).contains_key("ACE"));
}

#[test]
fn aborted_race_writes_nothing() {
    let mut race = Race::new(
        RaceConfig::timed(Direction::Vertical, 10),
        RaceTiming {
            countdown_from: 0,
            settle_ms: 0,
        },
    );
    race.countdown_step(0);
    race.on_pointer(&PointerEvent::touch_down(0.0, 0.0, 0));
    race.on_pointer(&PointerEvent::touch_move(0.0, 32.0, 100));
    race.abort();

    assert_eq!(race.phase(), Phase::Aborted);
    assert_eq!(race.on_tick(10_000), None);
    assert!(!race.finish(10_000));
    assert_eq!(race.take_result(u64::MAX), None);

    let player = Player::new("ACE".into(), "🚗".into());
    let mut results = ResultStore::new(MemoryStore::new());
    let d = dispatch_outcome(
        &SessionOutcome::Aborted,
        &player,
        &RaceConfig::default(),
        &mut results,
    );
    assert_eq!(d, Dispatch::NoResult);
    assert!(results.store().get(leaderboard::LEADERBOARD_KEY).is_none());
    assert!(results.store().get(&leaderboard::history_key("ACE")).is_none());
}

#[test]
fn practice_results_are_shown_but_never_stored() {
    let config = RaceConfig::timed(Direction::Vertical, 1).practice();
    let sim = replay::simulate(
        config.clone(),
        RaceTiming::default(),
        &ReplayScript::new(vertical_swipes(32.0, 3)),
    );
    let outcome = sim.outcome.clone().expect("finished");

    let mut store = MemoryStore::new();
    let player = player::register(&mut store, "ACE", "🚗").unwrap();
    let mut results = ResultStore::new(store);
    let d = dispatch_outcome(&outcome, &player, &config, &mut results);

    assert!(matches!(d, Dispatch::PracticeOnly(_)));
    assert_eq!(d.record().unwrap().result.swipe_count, 3);
    assert!(results.leaderboard().is_empty());
    assert!(results.history("ACE").is_empty());
    assert_eq!(results.recent().len(), 0);
    assert_eq!(player::load_players(results.store())["ACE"].races, 0);
}

#[test]
fn recorded_results_survive_reopening_the_store() {
    let dir = tempfile::tempdir().unwrap();
    let config = RaceConfig::distance(Direction::Vertical, 3);
    let sim = replay::simulate(
        config.clone(),
        RaceTiming::default(),
        &ReplayScript::new(vertical_swipes(80.0, 3)),
    );
    let outcome = sim.outcome.expect("finished");

    {
        let mut store = FileStore::open(dir.path()).unwrap();
        let player = player::register(&mut store, "ace", "🚗").unwrap();
        let mut results = ResultStore::new(store);
        let d = dispatch_outcome(&outcome, &player, &config, &mut results);
        assert!(matches!(d, Dispatch::Recorded(_)));
    }

    let store = FileStore::open(dir.path()).unwrap();
    let mut results = ResultStore::new(store);
    results.load_recent("ACE");
    let board = results.leaderboard();
    assert_eq!(board.len(), 1);
    let rec: &RaceRecord = &board[0];
    assert_eq!(rec.handle, "ACE");
    assert_eq!(rec.config, config);
    assert_eq!(results.recent().len(), 1);

    let stats = leaderboard::player_stats("ACE", &results.history("ACE"), &board);
    assert_eq!(stats.races, 1);
    assert_eq!(stats.rank, Some(1));
    assert!(approx(stats.best_speed, 5.0));
    assert_eq!(player::load_players(results.store())["ACE"].races, 1);
}

#[test]
fn live_session_plays_a_replay_to_completion() {
    let mut session = RaceSession::new(
        RaceConfig::distance(Direction::Vertical, 3),
        RaceTiming {
            countdown_from: 0,
            settle_ms: 20,
        },
    );
    let go = session.go_signal();
    replay::spawn(
        ReplayScript::new(vertical_swipes(80.0, 3)),
        go,
        session.sender(),
        session.clock(),
        session.stop_flag(),
    )
    .unwrap();

    match session.run() {
        SessionOutcome::Finished(r) => {
            assert_eq!(r.swipe_count, 3);
            assert!(approx(r.max_speed, 5.0));
        }
        SessionOutcome::Aborted => panic!("session aborted"),
    }
}
