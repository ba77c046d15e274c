// Library root: re-exports all modules so the binary crate and integration
// tests can reach the pipeline.

pub mod catalog;
pub mod error;
pub mod events;
pub mod normalize;
pub mod output;
pub mod pipeline;
pub mod stages;
pub mod table;

pub use error::StatsError;
pub use events::{load_pitches, load_roster, LoadError, PitchEvent};
pub use normalize::{normalize, NormalizeOptions, PitchLog};
pub use output::{write_table, OutputError, OutputFormat};
pub use pipeline::{compute_player_seasons, Pipeline, Stage};
pub use table::{PlayerKey, PlayerTable};
