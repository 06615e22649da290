use log::info;

use super::SessionOutcome;
use crate::leaderboard::{RaceRecord, ResultStore};
use crate::player::Player;
use crate::store::KvStore;
use crate::types::RaceConfig;

#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    /// Written to the leaderboard and the player's history.
    Recorded(RaceRecord),
    /// Shown to the player but never persisted.
    PracticeOnly(RaceRecord),
    NoResult,
}

impl Dispatch {
    pub fn record(&self) -> Option<&RaceRecord> {
        match self {
            Dispatch::Recorded(r) | Dispatch::PracticeOnly(r) => Some(r),
            Dispatch::NoResult => None,
        }
    }
}

/// Decorate a finished race with the player and config and hand it to the store.
pub fn dispatch_outcome<S: KvStore>(
    outcome: &SessionOutcome,
    player: &Player,
    config: &RaceConfig,
    results: &mut ResultStore<S>,
) -> Dispatch {
    let SessionOutcome::Finished(result) = outcome else {
        info!("dispatch: race aborted, nothing to record");
        return Dispatch::NoResult;
    };

    let record = RaceRecord::new(result.clone(), player, config.clone());
    if results.record(record.clone()) {
        Dispatch::Recorded(record)
    } else {
        Dispatch::PracticeOnly(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scorer::RaceResult;
    use crate::store::MemoryStore;
    use crate::types::Direction;

    fn finished() -> SessionOutcome {
        SessionOutcome::Finished(RaceResult {
            swipe_count: 5,
            max_speed: 2.0,
            avg_speed: 2.0,
            duration: 10.0,
            speed_history: vec![2.0; 5],
        })
    }

    #[test]
    fn routes_by_outcome_and_mode() {
        let player = Player::new("ACE".into(), "🚗".into());
        let solo = RaceConfig::timed(Direction::Vertical, 10);
        let mut results = ResultStore::new(MemoryStore::new());

        assert_eq!(
            dispatch_outcome(&SessionOutcome::Aborted, &player, &solo, &mut results),
            Dispatch::NoResult
        );
        assert!(results.store().is_empty());

        let practice = solo.clone().practice();
        let d = dispatch_outcome(&finished(), &player, &practice, &mut results);
        assert!(matches!(d, Dispatch::PracticeOnly(_)));
        assert!(results.store().is_empty());

        let d = dispatch_outcome(&finished(), &player, &solo, &mut results);
        assert_eq!(d.record().unwrap().handle, "ACE");
        assert!(matches!(d, Dispatch::Recorded(_)));
        assert_eq!(results.leaderboard().len(), 1);
        assert_eq!(results.history("ACE").len(), 1);
    }
}
