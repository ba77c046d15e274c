// One batch run: load the pitch log, normalize it, fold the standard pipeline
// over the seeded player table and write the result.

use crate::config::{resolve, Config};
use anyhow::Context;
use statline_baseball::{
    load_pitches, load_roster, normalize, write_table, NormalizeOptions, Pipeline, PlayerTable,
};
use std::path::{Path, PathBuf};
use tracing::info;

/// What a run read and wrote.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub pitches: usize,
    pub skipped: usize,
    pub at_bats: usize,
    pub player_seasons: usize,
    pub columns: usize,
    pub output: PathBuf,
}

/// Build the player table for `config`, resolving relative paths against
/// `base_dir`.
pub fn build_table(config: &Config, base_dir: &Path) -> anyhow::Result<(PlayerTable, RunSummary)> {
    let events_path = resolve(base_dir, &config.data.events);
    let events = load_pitches(&events_path)
        .with_context(|| format!("failed to load pitch log {}", events_path.display()))?;
    let loaded = events.len();
    info!("Loaded {} pitches from {}", loaded, events_path.display());

    let options = NormalizeOptions {
        allow_at_bat_key_collisions: config.pipeline.allow_at_bat_key_collisions,
    };
    let log = normalize(events, options).context("failed to normalize pitch log")?;

    let keys = match &config.data.roster {
        Some(roster) => {
            let roster_path = resolve(base_dir, roster);
            let keys = load_roster(&roster_path)
                .with_context(|| format!("failed to load roster {}", roster_path.display()))?;
            info!("Seeding {} player-seasons from {}", keys.len(), roster_path.display());
            keys
        }
        None => {
            let keys = log.player_keys();
            info!("Seeding {} player-seasons from the pitch log", keys.len());
            keys
        }
    };
    let table = PlayerTable::from_keys(keys).context("failed to seed player table")?;

    let pipeline = Pipeline::standard().context("invalid stage order")?;
    let table = pipeline
        .run(&log, table)
        .context("failed to compute player-season statistics")?;

    let summary = RunSummary {
        pitches: loaded,
        skipped: log.skipped(),
        at_bats: log.at_bats().len(),
        player_seasons: table.len(),
        columns: table.column_count(),
        output: resolve(base_dir, &config.data.output),
    };
    Ok((table, summary))
}

/// Build the table and write it to the configured output.
pub fn run(config: &Config, base_dir: &Path) -> anyhow::Result<RunSummary> {
    let (table, summary) = build_table(config, base_dir)?;
    write_table(&table, &summary.output, config.data.format)
        .with_context(|| format!("failed to write {}", summary.output.display()))?;
    Ok(summary)
}
