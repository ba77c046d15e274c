// Fielding positions and pitcher roles.

use crate::catalog::{FieldPosition, Role, UNKNOWN_POSITION};
use crate::error::StatsError;
use crate::normalize::PitchLog;
use crate::pipeline::Stage;
use crate::stages::owned;
use crate::table::{PlayerKey, PlayerTable};
use std::collections::{HashMap, HashSet};
use tracing::debug;

pub const PRIMARY_POSITION: &str = "primary_position";
pub const SP_PCT: &str = "sp_pct";
pub const STARTER: &str = "starter";
pub const RELIEVER: &str = "reliever";
pub const BOTH_STARTER_RELIEVER: &str = "both_starter_reliever";
pub const AVG_BF_PER_OUTING: &str = "avg_bf_per_outing";

/// Share of starts (percent) above which a pitcher is a starter.
pub const STARTER_THRESHOLD: f64 = 75.0;
/// Share of starts (percent) below which a pitcher is a reliever.
pub const RELIEVER_THRESHOLD: f64 = 25.0;

fn field_columns() -> Vec<String> {
    FieldPosition::ALL.iter().map(|p| p.column()).collect()
}

// ---------------------------------------------------------------------------
// Fielding counts
// ---------------------------------------------------------------------------

/// `field_{pos}`: at-bats a player spent at each position, per season.
///
/// Counted over distinct (at-bat, alignment) pairs, so a defensive change in
/// the middle of an at-bat credits both alignments.
#[derive(Debug, Clone, Copy)]
pub struct FieldingCounts;

impl Stage for FieldingCounts {
    fn name(&self) -> &'static str {
        "fielding_counts"
    }

    fn requires(&self) -> Vec<String> {
        Vec::new()
    }

    fn produces(&self) -> Vec<String> {
        field_columns()
    }

    fn apply(&self, log: &PitchLog, table: PlayerTable) -> Result<PlayerTable, StatsError> {
        let alignments: HashSet<(u32, i32, [Option<u32>; 9])> = log
            .pitches()
            .iter()
            .map(|p| (p.at_bat_id, p.year, p.event.fielders))
            .collect();

        let mut counts: Vec<HashMap<PlayerKey, i64>> = vec![HashMap::new(); FieldPosition::ALL.len()];
        for (_, year, fielders) in &alignments {
            for (slot, fielder) in fielders.iter().enumerate() {
                if let Some(id) = fielder {
                    *counts[slot].entry(PlayerKey::new(*id, *year)).or_insert(0) += 1;
                }
            }
        }
        debug!("{} distinct fielding alignments", alignments.len());

        let mut table = table;
        for pos in FieldPosition::ALL {
            table = table.merge_counts(&pos.column(), &counts[pos.index()])?;
        }
        Ok(table)
    }
}

// ---------------------------------------------------------------------------
// Primary position
// ---------------------------------------------------------------------------

/// The position with the most appearances; ties go to the earliest position
/// in [`FieldPosition::ALL`]. `None` when every count is zero.
pub fn primary_of(totals: &[i64; 9]) -> Option<FieldPosition> {
    let mut best: Option<(FieldPosition, i64)> = None;
    for pos in FieldPosition::ALL {
        let n = totals[pos.index()];
        if n > 0 && best.map_or(true, |(_, top)| n > top) {
            best = Some((pos, n));
        }
    }
    best.map(|(pos, _)| pos)
}

/// `primary_position`, decided across all of a player's seasons and written
/// to each of them.
#[derive(Debug, Clone, Copy)]
pub struct PrimaryPosition;

impl Stage for PrimaryPosition {
    fn name(&self) -> &'static str {
        "primary_position"
    }

    fn requires(&self) -> Vec<String> {
        field_columns()
    }

    fn produces(&self) -> Vec<String> {
        owned(&[PRIMARY_POSITION])
    }

    fn apply(&self, _log: &PitchLog, table: PlayerTable) -> Result<PlayerTable, StatsError> {
        let mut totals: HashMap<u32, [i64; 9]> = HashMap::new();
        for pos in FieldPosition::ALL {
            for (key, n) in table.keys().iter().zip(table.counts(&pos.column())?) {
                totals.entry(key.player_id).or_insert([0; 9])[pos.index()] += n;
            }
        }
        let labels: HashMap<u32, String> = totals
            .iter()
            .filter_map(|(player, t)| primary_of(t).map(|pos| (*player, pos.label().to_string())))
            .collect();
        table.merge_player_labels(PRIMARY_POSITION, &labels, UNKNOWN_POSITION)
    }
}

// ---------------------------------------------------------------------------
// Starter / reliever split
// ---------------------------------------------------------------------------

/// Season role derived from the share of games started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PitcherRole {
    Starter,
    Reliever,
    Swing,
}

impl PitcherRole {
    /// Classify a start percentage. Undefined percentages have no role.
    pub fn classify(sp_pct: f64) -> Option<Self> {
        if sp_pct.is_nan() {
            None
        } else if sp_pct > STARTER_THRESHOLD {
            Some(PitcherRole::Starter)
        } else if sp_pct < RELIEVER_THRESHOLD {
            Some(PitcherRole::Reliever)
        } else {
            Some(PitcherRole::Swing)
        }
    }
}

/// `sp_pct` and the `starter` / `reliever` / `both_starter_reliever` flags.
///
/// A pitcher's role in a game is the first role flag recorded for that game;
/// games with no flag at all are left out of the percentage.
#[derive(Debug, Clone, Copy)]
pub struct StarterReliever;

impl Stage for StarterReliever {
    fn name(&self) -> &'static str {
        "starter_reliever"
    }

    fn requires(&self) -> Vec<String> {
        Vec::new()
    }

    fn produces(&self) -> Vec<String> {
        owned(&[SP_PCT, STARTER, RELIEVER, BOTH_STARTER_RELIEVER])
    }

    fn apply(&self, log: &PitchLog, table: PlayerTable) -> Result<PlayerTable, StatsError> {
        let mut game_roles: HashMap<(u32, u64), (i32, Option<&str>)> = HashMap::new();
        for p in log.pitches() {
            let entry = game_roles
                .entry((p.event.pitcher, p.event.game_pk))
                .or_insert((p.year, None));
            if entry.1.is_none() {
                entry.1 = p.event.role_key.as_deref();
            }
        }

        let mut tallies: HashMap<PlayerKey, (u32, u32)> = HashMap::new();
        for ((pitcher, _), (year, role)) in &game_roles {
            let Some(role) = role else { continue };
            let entry = tallies.entry(PlayerKey::new(*pitcher, *year)).or_insert((0, 0));
            entry.1 += 1;
            if *role == "SP" {
                entry.0 += 1;
            }
        }
        let pct: HashMap<PlayerKey, f64> = tallies
            .into_iter()
            .map(|(key, (starts, games))| (key, 100.0 * starts as f64 / games as f64))
            .collect();

        let table = table.merge_means(SP_PCT, &pct)?;
        let roles: Vec<Option<PitcherRole>> = table
            .rates(SP_PCT)?
            .iter()
            .map(|&p| PitcherRole::classify(p))
            .collect();
        let flag = |want: PitcherRole| -> Vec<i64> {
            roles.iter().map(|r| i64::from(*r == Some(want))).collect()
        };
        table
            .with_counts(STARTER, flag(PitcherRole::Starter))?
            .with_counts(RELIEVER, flag(PitcherRole::Reliever))?
            .with_counts(BOTH_STARTER_RELIEVER, flag(PitcherRole::Swing))
    }
}

// ---------------------------------------------------------------------------
// Outing length
// ---------------------------------------------------------------------------

/// `avg_bf_per_outing`: mean over games of the highest pitcher at-bat number
/// reached in the game. A proxy for batters faced per appearance.
#[derive(Debug, Clone, Copy)]
pub struct OutingLength;

impl Stage for OutingLength {
    fn name(&self) -> &'static str {
        "outing_length"
    }

    fn requires(&self) -> Vec<String> {
        Vec::new()
    }

    fn produces(&self) -> Vec<String> {
        owned(&[AVG_BF_PER_OUTING])
    }

    fn apply(&self, log: &PitchLog, table: PlayerTable) -> Result<PlayerTable, StatsError> {
        let mut deepest: HashMap<(PlayerKey, u64), u32> = HashMap::new();
        for p in log.pitches() {
            let Some(n) = p.event.pitcher_at_bat_number else { continue };
            let entry = deepest.entry((p.key_for(Role::Pitcher), p.event.game_pk)).or_insert(n);
            *entry = (*entry).max(n);
        }

        let mut sums: HashMap<PlayerKey, (f64, usize)> = HashMap::new();
        for ((key, _), n) in deepest {
            let entry = sums.entry(key).or_insert((0.0, 0));
            entry.0 += f64::from(n);
            entry.1 += 1;
        }
        let means: HashMap<PlayerKey, f64> = sums
            .into_iter()
            .map(|(key, (sum, games))| (key, sum / games as f64))
            .collect();
        table.merge_means(AVG_BF_PER_OUTING, &means)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::PitchEvent;
    use crate::stages::testutil::*;

    fn fielded(batter: u32, times_faced: u32, fielders: [Option<u32>; 9]) -> PitchEvent {
        PitchEvent {
            fielders,
            ..pitch(batter, 20, times_faced)
        }
    }

    fn alignment(ss: u32, cf: u32) -> [Option<u32>; 9] {
        [Some(20), Some(21), Some(22), Some(23), Some(24), Some(ss), Some(26), Some(cf), Some(28)]
    }

    #[test]
    fn fielding_counts_per_at_bat() {
        let log = log_of(vec![
            fielded(10, 1, alignment(25, 27)),
            fielded(10, 1, alignment(25, 27)),
            fielded(11, 1, alignment(25, 27)),
        ]);
        let table = FieldingCounts.apply(&log, table_for(&log)).unwrap();
        assert_eq!(table.count_at(&key(25), "field_ss"), Some(2));
        assert_eq!(table.count_at(&key(20), "field_p"), Some(2));
        assert_eq!(table.count_at(&key(25), "field_cf"), Some(0));
        assert_eq!(table.count_at(&key(10), "field_ss"), Some(0));
    }

    #[test]
    fn mid_at_bat_substitution_credits_both() {
        let log = log_of(vec![fielded(10, 1, alignment(25, 27)), fielded(10, 1, alignment(25, 29))]);
        let table = FieldingCounts.apply(&log, table_for(&log)).unwrap();
        assert_eq!(table.count_at(&key(27), "field_cf"), Some(1));
        assert_eq!(table.count_at(&key(29), "field_cf"), Some(1));
        assert_eq!(table.count_at(&key(25), "field_ss"), Some(2));
    }

    #[test]
    fn primary_position_ties_go_to_earlier_position() {
        let mut totals = [0; 9];
        totals[FieldPosition::SecondBase.index()] = 40;
        totals[FieldPosition::ShortStop.index()] = 40;
        assert_eq!(primary_of(&totals), Some(FieldPosition::SecondBase));

        totals[FieldPosition::ShortStop.index()] = 41;
        assert_eq!(primary_of(&totals), Some(FieldPosition::ShortStop));

        assert_eq!(primary_of(&[0; 9]), None);
    }

    #[test]
    fn primary_position_sums_across_years() {
        let mut table = PlayerTable::from_keys([
            PlayerKey::new(7, 2022),
            PlayerKey::new(7, 2023),
            PlayerKey::new(8, 2023),
        ])
        .unwrap();
        for pos in FieldPosition::ALL {
            let values = match pos {
                FieldPosition::ThirdBase => vec![30, 0, 0],
                FieldPosition::FirstBase => vec![0, 20, 0],
                _ => vec![0, 0, 0],
            };
            table = table.with_counts(&pos.column(), values).unwrap();
        }
        let table = PrimaryPosition.apply(&PitchLog::default(), table).unwrap();
        assert_eq!(table.label_at(&PlayerKey::new(7, 2023), PRIMARY_POSITION), Some("3b"));
        assert_eq!(table.label_at(&PlayerKey::new(7, 2022), PRIMARY_POSITION), Some("3b"));
        assert_eq!(table.label_at(&PlayerKey::new(8, 2023), PRIMARY_POSITION), Some(UNKNOWN_POSITION));
    }

    #[test]
    fn classify_thresholds() {
        assert_eq!(PitcherRole::classify(100.0), Some(PitcherRole::Starter));
        assert_eq!(PitcherRole::classify(75.0), Some(PitcherRole::Swing));
        assert_eq!(PitcherRole::classify(50.0), Some(PitcherRole::Swing));
        assert_eq!(PitcherRole::classify(25.0), Some(PitcherRole::Swing));
        assert_eq!(PitcherRole::classify(0.0), Some(PitcherRole::Reliever));
        assert_eq!(PitcherRole::classify(f64::NAN), None);
    }

    /// A pitch of the 10-vs-20 matchup in game `game_pk`, played on April
    /// `game_pk` so each game keeps its own at-bat key.
    fn in_game(game_pk: u64, role: Option<&str>) -> PitchEvent {
        PitchEvent {
            game_pk,
            game_date: format!("2023-04-{game_pk:02}"),
            role_key: role.map(str::to_string),
            ..pitch(10, 20, 1)
        }
    }

    #[test]
    fn starter_share_uses_first_flag_per_game() {
        let log = log_of(vec![
            in_game(1, None),
            in_game(1, Some("SP")),
            in_game(1, Some("RP")),
            in_game(2, Some("SP")),
            in_game(3, Some("SP")),
            in_game(4, Some("SP")),
        ]);
        let table = StarterReliever.apply(&log, table_for(&log)).unwrap();
        assert!(approx_eq(table.rate_at(&key(20), SP_PCT).unwrap(), 100.0, 1e-12));
        assert_eq!(table.count_at(&key(20), STARTER), Some(1));
        assert_eq!(table.count_at(&key(20), RELIEVER), Some(0));
        assert!(table.rate_at(&key(10), SP_PCT).unwrap().is_nan());
        assert_eq!(table.count_at(&key(10), STARTER), Some(0));
        assert_eq!(table.count_at(&key(10), BOTH_STARTER_RELIEVER), Some(0));
    }

    #[test]
    fn swing_role_between_thresholds() {
        let log = log_of(vec![in_game(1, Some("SP")), in_game(2, Some("RP"))]);
        let table = StarterReliever.apply(&log, table_for(&log)).unwrap();
        assert!(approx_eq(table.rate_at(&key(20), SP_PCT).unwrap(), 50.0, 1e-12));
        assert_eq!(table.count_at(&key(20), BOTH_STARTER_RELIEVER), Some(1));
    }

    #[test]
    fn outing_length_is_mean_of_game_maxima() {
        let at = |game_pk: u64, n: u32| PitchEvent {
            game_pk,
            pitcher_at_bat_number: Some(n),
            ..pitch(10, 20, n)
        };
        let log = log_of(vec![at(1, 1), at(1, 2), at(1, 24), at(2, 3), at(2, 4)]);
        let table = OutingLength.apply(&log, table_for(&log)).unwrap();
        assert!(approx_eq(table.rate_at(&key(20), AVG_BF_PER_OUTING).unwrap(), 14.0, 1e-12));
        assert!(table.rate_at(&key(10), AVG_BF_PER_OUTING).unwrap().is_nan());
    }
}
