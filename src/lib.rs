//! Swipe-speed racing engine.
//!
//! Pointer motion becomes speed samples (`sampler`), samples feed running
//! statistics (`aggregator`), and a `race::Race` arbitrates the countdown,
//! the finish and the settle delay before `scorer` produces the result. The
//! `session` module drives a race from live devices or replay scripts, and
//! `leaderboard` persists results through any `store::KvStore`.

pub mod aggregator;
pub mod cli;
pub mod config;
pub mod error;
pub mod input;
pub mod leaderboard;
pub mod logging;
pub mod player;
pub mod race;
pub mod sampler;
pub mod scorer;
pub mod session;
pub mod store;
pub mod types;
