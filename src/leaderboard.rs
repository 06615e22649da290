//! Result persistence: the global leaderboard, per-player history and the
//! dashboard figures derived from them.

use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;

use crate::player::{self, Player};
use crate::scorer::RaceResult;
use crate::store::KvStore;
use crate::types::RaceConfig;

pub const LEADERBOARD_KEY: &str = "leaderboard";
pub const LEADERBOARD_CAP: usize = 100;
pub const HISTORY_CAP: usize = 50;
/// Size of the in-memory mirror of the current player's results.
pub const RECENT_CAP: usize = 20;
/// Window used for global ranking.
pub const RANK_WINDOW: usize = 20;

pub fn history_key(handle: &str) -> String {
    format!("history_{handle}")
}

/// A race result decorated with who ran it, how and when.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceRecord {
    #[serde(flatten)]
    pub result: RaceResult,
    pub handle: String,
    #[serde(default)]
    pub avatar: String,
    pub config: RaceConfig,
    pub date: DateTime<Utc>,
}

impl RaceRecord {
    pub fn new(result: RaceResult, player: &Player, config: RaceConfig) -> Self {
        Self::at(result, player, config, Utc::now())
    }

    pub fn at(result: RaceResult, player: &Player, config: RaceConfig, date: DateTime<Utc>) -> Self {
        Self {
            result,
            handle: player.handle.clone(),
            avatar: player.avatar.clone(),
            config,
            date,
        }
    }
}

/// Read a record list entry by entry; unreadable entries are skipped.
fn read_records<S: KvStore + ?Sized>(store: &S, key: &str) -> Vec<RaceRecord> {
    let Some(Value::Array(items)) = store.get(key) else {
        return Vec::new();
    };
    items
        .into_iter()
        .filter_map(|v| match serde_json::from_value(v) {
            Ok(r) => Some(r),
            Err(e) => {
                debug!("leaderboard: skipping bad entry in '{key}': {e}");
                None
            }
        })
        .collect()
}

fn write_records<S: KvStore + ?Sized>(store: &mut S, key: &str, records: &[RaceRecord]) {
    match serde_json::to_value(records) {
        Ok(v) => store.set(key, &v),
        Err(e) => log::warn!("leaderboard: failed to encode '{key}': {e}"),
    }
}

fn prepend_capped<S: KvStore + ?Sized>(store: &mut S, key: &str, record: &RaceRecord, cap: usize) {
    let mut list = read_records(store, key);
    list.insert(0, record.clone());
    list.truncate(cap);
    write_records(store, key, &list);
}

/// Append-only result sink over a key-value store.
#[derive(Debug)]
pub struct ResultStore<S: KvStore> {
    store: S,
    recent: VecDeque<RaceRecord>,
}

impl<S: KvStore> ResultStore<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            recent: VecDeque::new(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_inner(self) -> S {
        self.store
    }

    /// Persist a finished race. Practice races are never written; returns
    /// whether anything was recorded.
    pub fn record(&mut self, record: RaceRecord) -> bool {
        if record.config.is_practice() {
            info!("leaderboard: practice run by {} not recorded", record.handle);
            return false;
        }

        prepend_capped(&mut self.store, LEADERBOARD_KEY, &record, LEADERBOARD_CAP);
        prepend_capped(
            &mut self.store,
            &history_key(&record.handle),
            &record,
            HISTORY_CAP,
        );
        player::note_result(&mut self.store, &record.handle, &record.result);

        if self.recent.len() == RECENT_CAP {
            self.recent.pop_front();
        }
        info!(
            "leaderboard: recorded {} for {} ({:.2} in/s)",
            record.result.grade(),
            record.handle,
            record.result.max_speed
        );
        self.recent.push_back(record);
        true
    }

    /// Newest first.
    pub fn leaderboard(&self) -> Vec<RaceRecord> {
        read_records(&self.store, LEADERBOARD_KEY)
    }

    /// Newest first.
    pub fn history(&self, handle: &str) -> Vec<RaceRecord> {
        read_records(&self.store, &history_key(handle))
    }

    /// Seed the in-memory mirror from a player's stored history.
    pub fn load_recent(&mut self, handle: &str) {
        let mut hist = self.history(handle);
        hist.truncate(RECENT_CAP);
        hist.reverse();
        self.recent = hist.into();
    }

    /// Most recent results of this session's player, oldest first.
    pub fn recent(&self) -> impl ExactSizeIterator<Item = &RaceRecord> {
        self.recent.iter()
    }
}

/// Best runs on the board by peak speed, fastest first.
pub fn top_racers(board: &[RaceRecord], n: usize) -> Vec<&RaceRecord> {
    let mut ranked: Vec<&RaceRecord> = board.iter().filter(|r| r.result.max_speed > 0.0).collect();
    ranked.sort_by(|a, b| b.result.max_speed.total_cmp(&a.result.max_speed));
    ranked.truncate(n);
    ranked
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerStats {
    pub races: usize,
    pub best_speed: f64,
    pub avg_speed: f64,
    pub total_swipes: u64,
    /// 1-based place among the top `RANK_WINDOW` board entries.
    pub rank: Option<usize>,
}

impl PlayerStats {
    pub fn best_mph(&self) -> f64 {
        crate::types::ips_to_mph(self.best_speed)
    }
}

pub fn player_stats(handle: &str, history: &[RaceRecord], board: &[RaceRecord]) -> PlayerStats {
    let races = history.len();
    let best_speed = history
        .iter()
        .map(|r| r.result.max_speed)
        .fold(0.0, f64::max);
    let avg_speed = if races == 0 {
        0.0
    } else {
        history.iter().map(|r| r.result.avg_speed).sum::<f64>() / races as f64
    };
    let total_swipes = history.iter().map(|r| r.result.swipe_count as u64).sum();

    let mut window: Vec<&RaceRecord> = board.iter().collect();
    window.sort_by(|a, b| b.result.max_speed.total_cmp(&a.result.max_speed));
    window.truncate(RANK_WINDOW);
    let rank = window.iter().position(|r| r.handle == handle).map(|i| i + 1);

    PlayerStats {
        races,
        best_speed,
        avg_speed,
        total_swipes,
        rank,
    }
}
