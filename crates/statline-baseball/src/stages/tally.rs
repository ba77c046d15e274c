// Event tallies: one counting primitive driven over the enumerated event
// vocabularies, applied once per role.

use crate::catalog::{PitchResult, Role, CONTACT_TYPES, OUT_EVENTS, PLAY_EVENTS};
use crate::error::StatsError;
use crate::events::PitchEvent;
use crate::normalize::PitchLog;
use crate::pipeline::Stage;
use crate::stages::{count_rows, owned};
use crate::table::{ratio, PlayerKey, PlayerTable};
use std::collections::HashMap;
use tracing::debug;

pub const OUTS_RECORDED: &str = "outs_recorded";
pub const INNINGS_PITCHED: &str = "innings_pitched";

// ---------------------------------------------------------------------------
// Generic tally
// ---------------------------------------------------------------------------

/// Source column a tally reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventColumn {
    /// Terminal play outcome (`events`).
    Events,
    /// Batted-ball contact type (`bb_type`).
    BbType,
    /// Pitch result code (`type`: S, B or X).
    Type,
}

impl EventColumn {
    pub fn name(&self) -> &'static str {
        match self {
            EventColumn::Events => "events",
            EventColumn::BbType => "bb_type",
            EventColumn::Type => "type",
        }
    }

    pub fn value_of<'a>(&self, event: &'a PitchEvent) -> Option<&'a str> {
        match self {
            EventColumn::Events => event.events.as_deref(),
            EventColumn::BbType => event.bb_type.as_deref(),
            EventColumn::Type => event.pitch_result.map(|r| r.code()),
        }
    }
}

/// Rows where `column == value`, counted per season of the `role` player.
pub fn tally(log: &PitchLog, column: EventColumn, value: &str, role: Role) -> HashMap<PlayerKey, i64> {
    count_rows(log, role, |p| column.value_of(&p.event) == Some(value))
}

// ---------------------------------------------------------------------------
// Event and contact-type tallies
// ---------------------------------------------------------------------------

/// `{role}_{value}` for every value of a vocabulary, both roles.
#[derive(Debug, Clone, Copy)]
pub struct EventTally {
    column: EventColumn,
    values: &'static [&'static str],
}

impl EventTally {
    pub fn new(column: EventColumn, values: &'static [&'static str]) -> Self {
        Self { column, values }
    }

    /// Every outcome of the `events` column.
    pub fn play_events() -> Self {
        Self::new(EventColumn::Events, PLAY_EVENTS)
    }

    /// The four `bb_type` contact types.
    pub fn contact_types() -> Self {
        Self::new(EventColumn::BbType, CONTACT_TYPES)
    }
}

impl Stage for EventTally {
    fn name(&self) -> &'static str {
        match self.column {
            EventColumn::Events => "event_tally",
            EventColumn::BbType => "contact_tally",
            EventColumn::Type => "type_tally",
        }
    }

    fn requires(&self) -> Vec<String> {
        Vec::new()
    }

    fn produces(&self) -> Vec<String> {
        self.values
            .iter()
            .flat_map(|v| Role::ALL.iter().map(move |r| r.column(v)))
            .collect()
    }

    fn apply(&self, log: &PitchLog, table: PlayerTable) -> Result<PlayerTable, StatsError> {
        let mut table = table;
        for value in self.values {
            for role in Role::ALL {
                let counts = tally(log, self.column, value, role);
                debug!("{}={} as {}: {} player-seasons", self.column.name(), value, role, counts.len());
                table = table.merge_counts(&role.column(value), &counts)?;
            }
        }
        Ok(table)
    }
}

// ---------------------------------------------------------------------------
// Pitch result counts
// ---------------------------------------------------------------------------

pub fn total_pitches_column(role: Role) -> String {
    role.column("total_pitches")
}

pub fn result_count_column(result: PitchResult, role: Role) -> String {
    role.column(result.count_suffix())
}

pub fn result_ratio_column(result: PitchResult, role: Role) -> String {
    format!("{}_ratio_{}", result.ratio_prefix(), role.prefix())
}

/// Strike / ball / in-play counts, total pitches and their ratios, per role.
///
/// `{role}_total_pitches` counts only pitches with a recorded result.
#[derive(Debug, Clone, Copy)]
pub struct PitchResultTally;

impl Stage for PitchResultTally {
    fn name(&self) -> &'static str {
        "pitch_results"
    }

    fn requires(&self) -> Vec<String> {
        Vec::new()
    }

    fn produces(&self) -> Vec<String> {
        let mut columns = Vec::new();
        for role in Role::ALL {
            for result in PitchResult::ALL {
                columns.push(result_count_column(result, role));
            }
            columns.push(total_pitches_column(role));
            for result in PitchResult::ALL {
                columns.push(result_ratio_column(result, role));
            }
        }
        columns
    }

    fn apply(&self, log: &PitchLog, table: PlayerTable) -> Result<PlayerTable, StatsError> {
        let mut table = table;
        for role in Role::ALL {
            for result in PitchResult::ALL {
                let counts = tally(log, EventColumn::Type, result.code(), role);
                table = table.merge_counts(&result_count_column(result, role), &counts)?;
            }
            let totals = count_rows(log, role, |p| p.event.pitch_result.is_some());
            let total_name = total_pitches_column(role);
            table = table.merge_counts(&total_name, &totals)?;

            let total = table.values(&total_name)?;
            for result in PitchResult::ALL {
                let ratios = table
                    .values(&result_count_column(result, role))?
                    .iter()
                    .zip(&total)
                    .map(|(&n, &t)| ratio(n, t))
                    .collect();
                table = table.with_rates(&result_ratio_column(result, role), ratios)?;
            }
        }
        Ok(table)
    }
}

// ---------------------------------------------------------------------------
// Outs recorded
// ---------------------------------------------------------------------------

/// `outs_recorded` and `innings_pitched` for pitchers.
///
/// Each out-producing terminal event counts as one out, so double and triple
/// plays and caught-stealing outs not tied to a terminal event are
/// undercounted. Innings pitched is an approximation.
#[derive(Debug, Clone, Copy)]
pub struct OutsRecorded;

impl Stage for OutsRecorded {
    fn name(&self) -> &'static str {
        "outs_recorded"
    }

    fn requires(&self) -> Vec<String> {
        Vec::new()
    }

    fn produces(&self) -> Vec<String> {
        owned(&[OUTS_RECORDED, INNINGS_PITCHED])
    }

    fn apply(&self, log: &PitchLog, table: PlayerTable) -> Result<PlayerTable, StatsError> {
        let outs = count_rows(log, Role::Pitcher, |p| p.event.event_in(OUT_EVENTS));
        let table = table.merge_counts(OUTS_RECORDED, &outs)?;
        let innings = table
            .counts(OUTS_RECORDED)?
            .iter()
            .map(|&o| o as f64 / 3.0)
            .collect();
        table.with_rates(INNINGS_PITCHED, innings)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::testutil::*;

    #[test]
    fn play_event_tally_counts_both_roles() {
        let log = log_of(vec![
            ending(10, 20, 1, "single"),
            ending(10, 20, 2, "single"),
            ending(20, 10, 1, "single"),
            ending(11, 20, 1, "home_run"),
        ]);
        let table = EventTally::play_events().apply(&log, table_for(&log)).unwrap();

        assert_eq!(table.count_at(&key(10), "batter_single"), Some(2));
        assert_eq!(table.count_at(&key(10), "pitcher_single"), Some(1));
        assert_eq!(table.count_at(&key(20), "batter_single"), Some(1));
        assert_eq!(table.count_at(&key(20), "pitcher_single"), Some(2));
        assert_eq!(table.count_at(&key(20), "pitcher_home_run"), Some(1));
        assert_eq!(table.count_at(&key(11), "batter_walk"), Some(0));
        assert_eq!(table.column_count(), PLAY_EVENTS.len() * 2);
    }

    #[test]
    fn unknown_event_values_are_ignored() {
        let log = log_of(vec![ending(10, 20, 1, "ejection")]);
        let table = EventTally::play_events().apply(&log, table_for(&log)).unwrap();
        for name in table.column_names() {
            assert_eq!(table.counts(name).unwrap(), &[0, 0]);
        }
    }

    #[test]
    fn contact_tally_uses_bb_type() {
        let mut fly = pitch(10, 20, 1);
        fly.bb_type = Some("fly_ball".into());
        let log = log_of(vec![fly]);
        let table = EventTally::contact_types().apply(&log, table_for(&log)).unwrap();
        assert_eq!(table.count_at(&key(10), "batter_fly_ball"), Some(1));
        assert_eq!(table.count_at(&key(20), "pitcher_fly_ball"), Some(1));
        assert_eq!(table.count_at(&key(10), "batter_popup"), Some(0));
    }

    #[test]
    fn pitch_results_and_ratios() {
        let with = |code: &str| PitchEvent {
            pitch_result: PitchResult::from_code(code),
            ..pitch(10, 20, 1)
        };
        let log = log_of(vec![with("S"), with("S"), with("B"), with("X"), pitch(10, 20, 1)]);
        let table = PitchResultTally.apply(&log, table_for(&log)).unwrap();

        assert_eq!(table.count_at(&key(10), "batter_strikes"), Some(2));
        assert_eq!(table.count_at(&key(10), "batter_balls"), Some(1));
        assert_eq!(table.count_at(&key(10), "batter_inplay"), Some(1));
        assert_eq!(table.count_at(&key(10), "batter_total_pitches"), Some(4));
        assert!(approx_eq(table.rate_at(&key(10), "strike_ratio_batter").unwrap(), 0.5, 1e-12));
        assert!(approx_eq(table.rate_at(&key(20), "inplay_ratio_pitcher").unwrap(), 0.25, 1e-12));
        // The pitcher never batted: no pitches seen, ratio undefined.
        assert!(table.rate_at(&key(20), "strike_ratio_batter").unwrap().is_nan());
    }

    #[test]
    fn outs_recorded_and_innings() {
        let log = log_of(vec![
            ending(10, 20, 1, "strikeout"),
            ending(11, 20, 1, "field_out"),
            ending(12, 20, 1, "grounded_into_double_play"),
            ending(13, 20, 1, "single"),
            ending(14, 20, 1, "sac_fly"),
        ]);
        let table = OutsRecorded.apply(&log, table_for(&log)).unwrap();
        assert_eq!(table.count_at(&key(20), OUTS_RECORDED), Some(3));
        assert!(approx_eq(table.rate_at(&key(20), INNINGS_PITCHED).unwrap(), 1.0, 1e-12));
        assert_eq!(table.rate_at(&key(10), INNINGS_PITCHED), Some(0.0));
    }
}
