// Plate appearances and batters faced per player-season.

use crate::catalog::{Role, BASEPATH_OUTS, INNING_ENDING_OUTS};
use crate::error::StatsError;
use crate::normalize::PitchLog;
use crate::pipeline::Stage;
use crate::stages::{count_at_bats, owned};
use crate::table::PlayerTable;
use tracing::debug;

pub const TOTAL_PA: &str = "total_pa";
pub const TOTAL_BF: &str = "total_bf";
pub const BASE_ENDED_INN: &str = "base_ended_inn";

/// `total_pa`, `total_bf` and `base_ended_inn`.
///
/// An at-bat that ends on a caught-stealing or pickoff with two outs already
/// on the board closes the inning but not the batter's plate appearance, so
/// those at-bats are removed from `total_pa`. `total_bf` is left as counted.
#[derive(Debug, Clone, Copy)]
pub struct AppearanceCounter;

impl Stage for AppearanceCounter {
    fn name(&self) -> &'static str {
        "appearances"
    }

    fn requires(&self) -> Vec<String> {
        Vec::new()
    }

    fn produces(&self) -> Vec<String> {
        owned(&[TOTAL_PA, TOTAL_BF, BASE_ENDED_INN])
    }

    fn apply(&self, log: &PitchLog, table: PlayerTable) -> Result<PlayerTable, StatsError> {
        let mut pa = count_at_bats(log, Role::Batter, |_| true);
        let bf = count_at_bats(log, Role::Pitcher, |_| true);
        let ended = count_at_bats(log, Role::Batter, |p| {
            p.event.outs_when_up == INNING_ENDING_OUTS && p.event.event_in(BASEPATH_OUTS)
        });
        debug!(
            "{} batter-seasons lost plate appearances to inning-ending basepath outs",
            ended.len()
        );

        // Every ended at-bat is one of the batter's at-bats, so this stays >= 0.
        for (key, n) in &ended {
            if let Some(total) = pa.get_mut(key) {
                *total -= n;
            }
        }

        table
            .merge_counts(TOTAL_PA, &pa)?
            .merge_counts(TOTAL_BF, &bf)?
            .merge_counts(BASE_ENDED_INN, &ended)
    }
}
