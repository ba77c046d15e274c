// Stage composition: the player table is built by folding an ordered list of
// stages over it. Each stage declares what it reads and writes so the order
// can be checked before any data is touched.

use crate::error::StatsError;
use crate::normalize::PitchLog;
use crate::stages::{appearances, averages, metrics, roles, tally};
use crate::table::PlayerTable;
use std::collections::HashSet;
use tracing::{debug, info};

/// One step of the player-season computation.
///
/// `apply` is a pure function of the immutable pitch log and the table built
/// so far; it returns the table with the stage's columns appended.
pub trait Stage {
    fn name(&self) -> &'static str;

    /// Columns that must already exist when the stage runs.
    fn requires(&self) -> Vec<String>;

    /// Columns the stage appends.
    fn produces(&self) -> Vec<String>;

    fn apply(&self, log: &PitchLog, table: PlayerTable) -> Result<PlayerTable, StatsError>;
}

/// An ordered, dependency-checked list of stages.
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.stage_names()).finish()
    }
}

impl Pipeline {
    /// Validate that every stage only reads columns produced by an earlier
    /// stage and that no two stages produce the same column.
    pub fn new(stages: Vec<Box<dyn Stage>>) -> Result<Self, StatsError> {
        let mut available: HashSet<String> = HashSet::new();
        for stage in &stages {
            for column in stage.requires() {
                if !available.contains(&column) {
                    return Err(StatsError::StageOrder {
                        stage: stage.name().to_string(),
                        column,
                    });
                }
            }
            for column in stage.produces() {
                if !available.insert(column.clone()) {
                    return Err(StatsError::DuplicateColumn(column));
                }
            }
        }
        Ok(Self { stages })
    }

    /// The full player-season pipeline in dependency order.
    pub fn standard() -> Result<Self, StatsError> {
        Self::new(vec![
            Box::new(appearances::AppearanceCounter),
            Box::new(tally::EventTally::play_events()),
            Box::new(tally::EventTally::contact_types()),
            Box::new(tally::PitchResultTally),
            Box::new(tally::OutsRecorded),
            Box::new(roles::FieldingCounts),
            Box::new(roles::PrimaryPosition),
            Box::new(roles::StarterReliever),
            Box::new(roles::OutingLength),
            Box::new(averages::StatcastEstimates),
            Box::new(averages::LineupPosition),
            Box::new(averages::RunsOnPlay),
            Box::new(averages::PitchQuality),
            Box::new(metrics::BattingMetrics),
            Box::new(metrics::PitchingMetrics),
            Box::new(metrics::BattedBallRates),
            Box::new(metrics::DefensiveVersatility),
        ])
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Fold every stage over `table` in order.
    pub fn run(&self, log: &PitchLog, table: PlayerTable) -> Result<PlayerTable, StatsError> {
        let table = self.stages.iter().try_fold(table, |table, stage| {
            let before = table.column_count();
            let table = stage.apply(log, table)?;
            for column in stage.produces() {
                if !table.has_column(&column) {
                    return Err(StatsError::MissingColumn(column));
                }
            }
            debug!(
                "stage {} added {} columns",
                stage.name(),
                table.column_count() - before
            );
            Ok(table)
        })?;
        info!(
            "Computed {} columns for {} player-seasons",
            table.column_count(),
            table.len()
        );
        Ok(table)
    }
}

/// Run the standard pipeline over a table seeded with every player-year in
/// the log.
pub fn compute_player_seasons(log: &PitchLog) -> Result<PlayerTable, StatsError> {
    let table = PlayerTable::from_keys(log.player_keys())?;
    Pipeline::standard()?.run(log, table)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
