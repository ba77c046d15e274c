// Error type shared by the normalizer, the player table and the pipeline.

use thiserror::Error;

/// Structural defects that stop a run.
///
/// Expected data gaps (a player with no occurrences of an event, a zero
/// denominator) are never reported through this type; they become zero counts
/// and NaN rates respectively.
#[derive(Debug, Error)]
pub enum StatsError {
    #[error("column `{0}` not found in player table")]
    MissingColumn(String),

    #[error("column `{0}` already exists in player table")]
    DuplicateColumn(String),

    #[error("column `{name}` has {actual} values, expected {expected}")]
    ColumnLength {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("duplicate player-season key: player {player_id}, year {year}")]
    DuplicateKey { player_id: u32, year: i32 },

    #[error("at-bat identity is not injective: {0}")]
    AtBatIdentity(String),

    #[error("at-bat {at_bat_id} spans games {first_game} and {second_game}")]
    AtBatKeyCollision {
        at_bat_id: u32,
        first_game: u64,
        second_game: u64,
    },

    #[error("at-bat join produced {joined} rows from {expected} pitches")]
    AtBatJoin { expected: usize, joined: usize },

    #[error("stage `{stage}` requires column `{column}` which no earlier stage produces")]
    StageOrder { stage: String, column: String },
}
