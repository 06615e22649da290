use anyhow::{Result, anyhow};
use log::warn;
use pico_args::Arguments;
use std::{
    env,
    fs::File,
    io::{BufReader, Write},
    path::PathBuf,
    sync::mpsc::Receiver,
    thread,
};

use crate::config::{AppConfigState, Paths};
use crate::input::{self, DeviceInfo};
use crate::leaderboard::{self, ResultStore};
use crate::player::{self, Player};
use crate::race::RaceEvent;
use crate::session::{
    self, RaceSession, SessionOutcome, SessionUpdate,
    dispatch::{Dispatch, dispatch_outcome},
    pipeline,
    replay::{self, ReplayScript},
};
use crate::store::FileStore;
use crate::types::{Direction, InputSource, RaceMode, RaceType, ips_to_mph};

pub fn run() -> Result<()> {
    let mut pargs = Arguments::from_env();

    // No args -> general help
    if env::args().len() == 1 {
        print_help();
        return Ok(());
    }

    if pargs.contains("-h") || pargs.contains("--help") {
        print_help();
        return Ok(());
    }

    // First free arg is the subcommand
    let subcmd: Option<String> = pargs.free_from_str().ok();

    match subcmd.as_deref() {
        Some("help") => {
            let topic: Option<String> = pargs.free_from_str().ok();
            if let Some(t) = topic {
                print_subcmd_help(&t);
            } else {
                print_help();
            }
            Ok(())
        }

        Some("race") => cmd_race(&mut pargs),

        Some("register") => {
            let avatar: Option<String> = pargs.opt_value_from_str("--avatar")?;
            let handle: String = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: swiperace register <HANDLE> [--avatar A]"))?;
            let ctx = Context::load()?;
            let mut store = ctx.store()?;
            let p = player::register(&mut store, &handle, avatar.as_deref().unwrap_or(""))?;
            print_response(&serde_json::to_value(&p)?);
            Ok(())
        }

        Some("players") => {
            let ctx = Context::load()?;
            let rows: Vec<serde_json::Value> = player::roster(&ctx.store()?)
                .into_iter()
                .map(|p| {
                    serde_json::json!({
                        "handle": p.handle,
                        "avatar": p.avatar,
                        "races": p.races,
                        "bestSpeed": p.best_speed,
                    })
                })
                .collect();
            print_response(&serde_json::Value::Array(rows));
            Ok(())
        }

        Some("board") => {
            let top: usize = pargs.opt_value_from_str("--top")?.unwrap_or(5);
            let ctx = Context::load()?;
            let results = ResultStore::new(ctx.store()?);
            let board = results.leaderboard();
            let rows: Vec<serde_json::Value> = leaderboard::top_racers(&board, top)
                .into_iter()
                .enumerate()
                .map(|(i, r)| {
                    serde_json::json!({
                        "place": i + 1,
                        "handle": r.handle,
                        "avatar": r.avatar,
                        "maxSpeed": r.result.max_speed,
                        "maxMph": r.result.max_mph(),
                        "grade": r.result.grade(),
                        "date": r.date,
                    })
                })
                .collect();
            print_response(&serde_json::json!({"entries": board.len(), "top": rows}));
            Ok(())
        }

        Some("stats") | Some("history") => {
            let limit: usize = pargs.opt_value_from_str("--limit")?.unwrap_or(15);
            let ctx = Context::load()?;
            let handle = ctx.resolve_handle(pargs.free_from_str().ok())?;
            let results = ResultStore::new(ctx.store()?);
            let history = results.history(&handle);
            if subcmd.as_deref() == Some("history") {
                let recent: Vec<_> = history.iter().take(limit).collect();
                print_response(&serde_json::to_value(recent)?);
            } else {
                let stats = leaderboard::player_stats(&handle, &history, &results.leaderboard());
                let best_mph = stats.best_mph();
                print_response(&serde_json::json!({
                    "handle": handle,
                    "stats": stats,
                    "bestMph": best_mph,
                }));
            }
            Ok(())
        }

        Some("profiles") => {
            let ctx = Context::load()?;
            print_response(&serde_json::json!({
                "profiles": ctx.cfg.list_profiles(),
                "active": ctx.cfg.active_name,
            }));
            Ok(())
        }

        Some("use") => {
            let name: String = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: swiperace use <profile_name>"))?;
            let mut ctx = Context::load()?;
            ctx.cfg.set_active(&name)?;
            print_response(&serde_json::json!({"active_profile": ctx.cfg.active_name}));
            Ok(())
        }

        Some("devices") => {
            let list: Vec<serde_json::Value> = input::discover()
                .into_iter()
                .map(|d| serde_json::json!({"path": d.path, "name": d.name, "source": d.source}))
                .collect();
            print_response(&serde_json::Value::Array(list));
            Ok(())
        }

        Some("doctor") => {
            let ctx = Context::load()?;
            print_response(&ctx.cfg.doctor_report());
            Ok(())
        }

        Some(other) => {
            eprintln!("unknown subcommand: {other}\n");
            print_help();
            Ok(())
        }

        None => {
            print_help();
            Ok(())
        }
    }
}

struct Context {
    cfg: AppConfigState,
}

impl Context {
    fn load() -> Result<Self> {
        let cfg = AppConfigState::load_or_install_default(Paths::discover()?)?;
        Ok(Self { cfg })
    }

    fn store(&self) -> Result<FileStore> {
        Ok(FileStore::open(self.cfg.paths.data_dir.join("store"))?)
    }

    fn resolve_handle(&self, given: Option<String>) -> Result<String> {
        match given {
            Some(h) => Ok(player::normalize_handle(&h)?),
            None => self
                .cfg
                .profile
                .default_handle()
                .ok_or_else(|| anyhow!("no usable default handle; pass one explicitly")),
        }
    }
}

fn cmd_race(pargs: &mut Arguments) -> Result<()> {
    let ctx = Context::load()?;
    let profile = &ctx.cfg.profile;

    let mut config = profile.race.clone();
    if let Some(t) = pargs.opt_value_from_str::<_, RaceType>("--type")? {
        config.race_type = t;
    }
    if let Some(d) = pargs.opt_value_from_str::<_, Direction>("--direction")? {
        config.direction = d;
    }
    if let Some(secs) = pargs.opt_value_from_str("--duration")? {
        config.duration = secs;
    }
    if let Some(n) = pargs.opt_value_from_str("--target")? {
        config.distance_target = n;
    }
    if pargs.contains("--practice") {
        config.mode = RaceMode::Practice;
    }
    config.validate()?;

    let handle = ctx.resolve_handle(pargs.opt_value_from_str("--handle")?)?;
    let avatar: Option<String> = pargs.opt_value_from_str("--avatar")?;
    let device: Option<String> = pargs.opt_value_from_str("--device")?;
    let replay_path: Option<PathBuf> = pargs.opt_value_from_str("--replay")?;
    let fast = pargs.contains("--fast");

    let mut store = ctx.store()?;
    let avatar = avatar
        .or_else(|| profile.player.avatar.clone())
        .unwrap_or_default();
    let player: Player = player::register(&mut store, &handle, &avatar)?;

    let script = match &replay_path {
        Some(p) => Some(ReplayScript::parse(BufReader::new(File::open(p)?))?),
        None => None,
    };

    let outcome = match (script, fast) {
        (Some(script), true) => {
            let sim = replay::simulate(config.clone(), profile.timing, &script);
            sim.outcome.ok_or_else(|| {
                anyhow!("replay ended before the race finished (phase {:?})", sim.final_phase)
            })?
        }
        (None, true) => return Err(anyhow!("--fast needs --replay <file>")),
        (script, false) => {
            let mut session = RaceSession::new(config.clone(), profile.timing);
            let updates = session.subscribe();
            session::abort_on_signals(session.sender())?;

            match script {
                Some(script) => {
                    replay::spawn(
                        script,
                        session.go_signal(),
                        session.sender(),
                        session.clock(),
                        session.stop_flag(),
                    )?;
                }
                None => {
                    let devices = pick_devices(device)?;
                    pipeline::spawn(devices, session.sender(), session.clock(), session.stop_flag())?;
                }
            }

            let printer = spawn_printer(updates, config.race_type, config.direction);
            let outcome = session.run();
            let _ = printer.join();
            outcome
        }
    };

    let mut results = ResultStore::new(store);
    results.load_recent(&player.handle);
    match dispatch_outcome(&outcome, &player, &config, &mut results) {
        Dispatch::NoResult => println!("race aborted; nothing recorded"),
        d => {
            let persisted = matches!(d, Dispatch::Recorded(_));
            if let Some(rec) = d.record() {
                let r = &rec.result;
                print_response(&serde_json::json!({
                    "handle": rec.handle,
                    "grade": r.grade(),
                    "medal": r.medal(),
                    "swipeCount": r.swipe_count,
                    "maxSpeed": r.max_speed,
                    "maxMph": r.max_mph(),
                    "avgSpeed": r.avg_speed,
                    "avgMph": r.avg_mph(),
                    "duration": r.duration,
                    "speedHistory": r.speed_history,
                    "recorded": persisted,
                    "recentRaces": results.recent().len(),
                }));
            }
        }
    }
    Ok(())
}

fn pick_devices(path: Option<String>) -> Result<Vec<DeviceInfo>> {
    let found = input::discover();
    if let Some(p) = path {
        return match found.into_iter().find(|d| d.path == p) {
            Some(d) => Ok(vec![d]),
            None => {
                warn!("{p} was not classified; reading it as a touch device");
                Ok(vec![DeviceInfo {
                    name: p.clone(),
                    path: p,
                    source: InputSource::Touch,
                }])
            }
        };
    }
    if found.is_empty() {
        return Err(anyhow!(
            "no touch or pointer devices found (try `swiperace doctor` or --replay)"
        ));
    }
    Ok(found)
}

fn spawn_printer(
    updates: Receiver<SessionUpdate>,
    race_type: RaceType,
    direction: Direction,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let hint = match direction {
            Direction::Vertical => "SWIPE UP & DOWN",
            Direction::Horizontal => "SWIPE LEFT & RIGHT",
        };
        let mut out = std::io::stderr();
        for update in updates {
            match update {
                SessionUpdate::Event(RaceEvent::Countdown(n)) => {
                    let _ = writeln!(out, "{n}...  {hint}");
                }
                SessionUpdate::Event(RaceEvent::Go) => {
                    let _ = writeln!(out, "GO!");
                }
                SessionUpdate::Event(RaceEvent::Finished { elapsed }) => {
                    let _ = writeln!(out, "\nFINISH  {elapsed:.2}s");
                }
                SessionUpdate::Live(live) => {
                    let goal = match (race_type, live.time_left) {
                        (RaceType::Timed, Some(left)) => format!("{left:5.1}s left"),
                        _ => format!("{:3.0}% done", live.progress * 100.0),
                    };
                    let _ = write!(
                        out,
                        "\r{:6.1} in/s  {:5.2} mph  max {:6.1}  swipes {:4}  {goal}",
                        live.current_speed,
                        ips_to_mph(live.current_speed),
                        live.max_speed,
                        live.sample_count
                    );
                    let _ = out.flush();
                }
            }
        }
    })
}

fn print_help() {
    println!(
        r#"swiperace — swipe-speed racing on touchscreens and mice

USAGE:
  swiperace help [command]                Show general or command-specific help
  swiperace race [options]                Run a race and record the result
  swiperace register <HANDLE> [--avatar]  Create or look up a racer
  swiperace players                       List registered racers
  swiperace board [--top N]               Show the fastest runs
  swiperace stats [HANDLE]                Personal best, average, rank
  swiperace history [HANDLE] [--limit N]  Recent races, newest first
  swiperace profiles                      List profiles
  swiperace use <name>                    Switch active profile
  swiperace devices                       List usable input devices
  swiperace doctor                        Diagnose paths and devices

TIPS:
  - Profiles: ~/.config/swiperace/profiles
  - Results:  ~/.local/share/swiperace/store
  - Set SWIPERACE_HOME to keep everything under one directory
"#
    );
}

fn print_subcmd_help(cmd: &str) {
    match cmd {
        "race" => println!(
            "usage: swiperace race [--type timed|distance] [--duration SECS] [--target SWIPES]\n\
             \x20                     [--direction vertical|horizontal] [--practice]\n\
             \x20                     [--handle H] [--avatar A] [--device PATH]\n\
             \x20                     [--replay FILE.jsonl [--fast]]\n\
             Durations: 5/10/15/20/30/60. Targets: 50/100/200/500. Ctrl-C aborts without recording."
        ),
        "register" => println!(
            "usage: swiperace register <HANDLE> [--avatar A]\nHandles are 2-16 chars of A-Z, 0-9 and _."
        ),
        "players" => println!("usage: swiperace players\nLists registered racers by handle."),
        "board" => println!("usage: swiperace board [--top N]\nFastest runs by peak speed."),
        "stats" => println!("usage: swiperace stats [HANDLE]\nDefaults to the profile's handle."),
        "history" => println!("usage: swiperace history [HANDLE] [--limit N]"),
        "profiles" => println!("usage: swiperace profiles\nLists profiles and the active one."),
        "use" => println!("usage: swiperace use <name>\nSwitches the active profile."),
        "devices" => println!("usage: swiperace devices\nLists touchscreens and mice."),
        "doctor" => println!("usage: swiperace doctor\nShows paths, default handle and devices."),
        _ => {
            eprintln!("unknown command: {cmd}\n");
            print_help();
        }
    }
}

fn print_response(v: &serde_json::Value) {
    println!("{}", serde_json::to_string_pretty(v).unwrap_or_default());
}
