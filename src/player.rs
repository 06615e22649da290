//! Player registry kept under the `players` key.

use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{SwipeError, SwipeResult};
use crate::scorer::RaceResult;
use crate::store::{self, KvStore};

pub const PLAYERS_KEY: &str = "players";
pub const HANDLE_MIN: usize = 2;
pub const HANDLE_MAX: usize = 16;

pub const AVATARS: [&str; 10] = ["🏎️", "🚗", "🚕", "🛻", "🚙", "🏍️", "🚓", "🚑", "🚒", "🛺"];
pub const DEFAULT_COLOR: &str = "#00d4ff";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub handle: String,
    #[serde(default = "default_avatar")]
    pub avatar: String,
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default)]
    pub created: DateTime<Utc>,
    #[serde(default)]
    pub races: u32,
    #[serde(default)]
    pub best_speed: f64,
}

fn default_avatar() -> String {
    AVATARS[0].to_string()
}

fn default_color() -> String {
    DEFAULT_COLOR.to_string()
}

impl Player {
    pub fn new(handle: String, avatar: String) -> Self {
        Self {
            handle,
            avatar,
            color: default_color(),
            created: Utc::now(),
            races: 0,
            best_speed: 0.0,
        }
    }
}

/// Uppercase, keep `A-Z0-9_` only, then enforce the length window.
pub fn normalize_handle(raw: &str) -> SwipeResult<String> {
    let h: String = raw
        .trim()
        .to_uppercase()
        .chars()
        .filter(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || *c == '_')
        .collect();
    if h.len() < HANDLE_MIN {
        return Err(SwipeError::Validation(format!(
            "handle must be {HANDLE_MIN}+ alphanumeric chars"
        )));
    }
    if h.len() > HANDLE_MAX {
        return Err(SwipeError::Validation(format!(
            "handle is limited to {HANDLE_MAX} characters"
        )));
    }
    Ok(h)
}

/// All registered players. Corrupt data reads as an empty map.
pub fn load_players<S: KvStore + ?Sized>(store: &S) -> BTreeMap<String, Player> {
    store::get_or_default(store, PLAYERS_KEY)
}

fn save_players<S: KvStore + ?Sized>(store: &mut S, players: &BTreeMap<String, Player>) {
    match serde_json::to_value(players) {
        Ok(v) => store.set(PLAYERS_KEY, &v),
        Err(e) => log::warn!("players: failed to encode registry: {e}"),
    }
}

/// Returning racers, ordered by handle.
pub fn roster<S: KvStore + ?Sized>(store: &S) -> Vec<Player> {
    load_players(store).into_values().collect()
}

/// Look up a returning player or create a new one.
pub fn register<S: KvStore + ?Sized>(
    store: &mut S,
    raw_handle: &str,
    avatar: &str,
) -> SwipeResult<Player> {
    let handle = normalize_handle(raw_handle)?;
    let mut players = load_players(store);
    if let Some(existing) = players.get(&handle) {
        info!("players: welcome back {handle}");
        return Ok(existing.clone());
    }

    let avatar = if avatar.trim().is_empty() {
        default_avatar()
    } else {
        avatar.to_string()
    };
    let p = Player::new(handle.clone(), avatar);
    players.insert(handle.clone(), p.clone());
    save_players(store, &players);
    info!("players: registered {handle}");
    Ok(p)
}

/// Bump the race count and personal best after a recorded race.
pub fn note_result<S: KvStore + ?Sized>(store: &mut S, handle: &str, result: &RaceResult) {
    let mut players = load_players(store);
    let Some(p) = players.get_mut(handle) else {
        return;
    };
    p.races += 1;
    p.best_speed = p.best_speed.max(result.max_speed);
    save_players(store, &players);
}
