// Season averages over pitch-level measurements. Undefined (NaN) when a
// player-season has no qualifying pitch.

use crate::catalog::{PitchResult, Role, FASTBALL_TYPES, STRIKE_ZONE_MAX};
use crate::error::StatsError;
use crate::events::PitchEvent;
use crate::normalize::PitchLog;
use crate::pipeline::Stage;
use crate::stages::{mean_by, owned};
use crate::table::{PlayerKey, PlayerTable};
use std::collections::HashMap;

pub const AVG_LINEUP_POSITION: &str = "avg_lineup_position";
pub const TOTAL_RUNS: &str = "total_runs";
pub const ZONE_CHASE_PCT: &str = "zone_chase_pct";
pub const AVG_FB_VEL: &str = "avg_fb_vel";
pub const AVG_PITCH_MOVEMENT: &str = "avg_pitch_movement";

// ---------------------------------------------------------------------------
// Statcast model estimates
// ---------------------------------------------------------------------------

/// `{role}_avg_exp_ba`, `{role}_avg_xwoba` and `{role}_avg_woba`.
///
/// wOBA is averaged over pitches that count toward the wOBA denominator.
#[derive(Debug, Clone, Copy)]
pub struct StatcastEstimates;

type Measure = fn(&PitchEvent) -> Option<f64>;

fn expected_ba(e: &PitchEvent) -> Option<f64> {
    e.estimated_ba
}

fn expected_woba(e: &PitchEvent) -> Option<f64> {
    e.estimated_woba
}

fn woba(e: &PitchEvent) -> Option<f64> {
    e.woba_value.filter(|_| e.woba_denom == Some(1.0))
}

impl StatcastEstimates {
    const MEASURES: [(&'static str, Measure); 3] = [
        ("avg_exp_ba", expected_ba),
        ("avg_xwoba", expected_woba),
        ("avg_woba", woba),
    ];
}

impl Stage for StatcastEstimates {
    fn name(&self) -> &'static str {
        "statcast_estimates"
    }

    fn requires(&self) -> Vec<String> {
        Vec::new()
    }

    fn produces(&self) -> Vec<String> {
        Role::ALL
            .iter()
            .flat_map(|r| Self::MEASURES.iter().map(move |(suffix, _)| r.column(suffix)))
            .collect()
    }

    fn apply(&self, log: &PitchLog, table: PlayerTable) -> Result<PlayerTable, StatsError> {
        let mut table = table;
        for role in Role::ALL {
            for (suffix, measure) in Self::MEASURES {
                let means = mean_by(log, role, |p| measure(&p.event));
                table = table.merge_means(&role.column(suffix), &means)?;
            }
        }
        Ok(table)
    }
}

// ---------------------------------------------------------------------------
// Lineup position
// ---------------------------------------------------------------------------

/// `avg_lineup_position`: a batter's slot in each game is the rank of their
/// first at-bat among their team's batters, averaged over the season.
#[derive(Debug, Clone, Copy)]
pub struct LineupPosition;

impl Stage for LineupPosition {
    fn name(&self) -> &'static str {
        "lineup_position"
    }

    fn requires(&self) -> Vec<String> {
        Vec::new()
    }

    fn produces(&self) -> Vec<String> {
        owned(&[AVG_LINEUP_POSITION])
    }

    fn apply(&self, log: &PitchLog, table: PlayerTable) -> Result<PlayerTable, StatsError> {
        // (game, year, half) -> batter -> first at-bat number
        let mut first_pa: HashMap<(u64, i32, &str), HashMap<u32, u32>> = HashMap::new();
        for p in log.pitches() {
            let (Some(at_bat), Some(half)) = (p.event.at_bat_number, p.event.inning_topbot.as_deref()) else {
                continue;
            };
            let first = first_pa
                .entry((p.event.game_pk, p.year, half))
                .or_default()
                .entry(p.event.batter)
                .or_insert(at_bat);
            *first = (*first).min(at_bat);
        }

        let mut slots: HashMap<PlayerKey, (f64, usize)> = HashMap::new();
        for ((_, year, _), batters) in first_pa {
            let mut order: Vec<(u32, u32)> = batters.into_iter().map(|(b, n)| (n, b)).collect();
            order.sort_unstable();
            for (rank, (_, batter)) in order.into_iter().enumerate() {
                let entry = slots.entry(PlayerKey::new(batter, year)).or_insert((0.0, 0));
                entry.0 += (rank + 1) as f64;
                entry.1 += 1;
            }
        }
        let means: HashMap<PlayerKey, f64> = slots
            .into_iter()
            .map(|(key, (sum, games))| (key, sum / games as f64))
            .collect();
        table.merge_means(AVG_LINEUP_POSITION, &means)
    }
}

// ---------------------------------------------------------------------------
// Runs on play
// ---------------------------------------------------------------------------

/// `total_runs`: runs scored by the batting team on the batter's pitches.
///
/// Includes runs that score on steals and wild pitches during the at-bat.
#[derive(Debug, Clone, Copy)]
pub struct RunsOnPlay;

impl Stage for RunsOnPlay {
    fn name(&self) -> &'static str {
        "runs_on_play"
    }

    fn requires(&self) -> Vec<String> {
        Vec::new()
    }

    fn produces(&self) -> Vec<String> {
        owned(&[TOTAL_RUNS])
    }

    fn apply(&self, log: &PitchLog, table: PlayerTable) -> Result<PlayerTable, StatsError> {
        let mut runs: HashMap<PlayerKey, i64> = HashMap::new();
        for p in log.pitches() {
            if let Some(r) = p.runs_on_play {
                *runs.entry(p.key_for(Role::Batter)).or_insert(0) += i64::from(r);
            }
        }
        table.merge_counts(TOTAL_RUNS, &runs)
    }
}

// ---------------------------------------------------------------------------
// Pitch quality
// ---------------------------------------------------------------------------

/// In the zone, or a strike on a pitch outside it (a chase).
pub fn in_zone_or_chased(event: &PitchEvent) -> bool {
    let in_zone = event.zone.is_some_and(|z| (1..=STRIKE_ZONE_MAX).contains(&z));
    in_zone || event.pitch_result == Some(PitchResult::Strike)
}

/// `zone_chase_pct`, `avg_fb_vel` and `avg_pitch_movement` for pitchers.
#[derive(Debug, Clone, Copy)]
pub struct PitchQuality;

impl Stage for PitchQuality {
    fn name(&self) -> &'static str {
        "pitch_quality"
    }

    fn requires(&self) -> Vec<String> {
        Vec::new()
    }

    fn produces(&self) -> Vec<String> {
        owned(&[ZONE_CHASE_PCT, AVG_FB_VEL, AVG_PITCH_MOVEMENT])
    }

    fn apply(&self, log: &PitchLog, table: PlayerTable) -> Result<PlayerTable, StatsError> {
        let zone_chase = mean_by(log, Role::Pitcher, |p| {
            Some(if in_zone_or_chased(&p.event) { 1.0 } else { 0.0 })
        });
        let fastball = mean_by(log, Role::Pitcher, |p| {
            let is_fastball = p
                .event
                .pitch_type
                .as_deref()
                .is_some_and(|t| FASTBALL_TYPES.contains(&t));
            p.event.release_speed.filter(|_| is_fastball)
        });
        let movement = mean_by(log, Role::Pitcher, |p| p.movement);

        table
            .merge_means(ZONE_CHASE_PCT, &zone_chase)?
            .merge_means(AVG_FB_VEL, &fastball)?
            .merge_means(AVG_PITCH_MOVEMENT, &movement)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
