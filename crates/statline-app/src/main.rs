// statline entry point.
//
// Startup sequence:
// 1. Parse command-line flags
// 2. Load config (copying defaults on first run) and apply flag overrides
// 3. Initialize tracing (stderr, or the configured log file)
// 4. Run the batch pipeline and write the player-season table

use statline_app::config::{self, Config, LoggingConfig, Overrides};
use statline_app::runner;
use statline_baseball::OutputFormat;

use anyhow::Context;
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing::info;

/// Per-player, per-season baseball statistics from pitch-by-pitch logs.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding config/ and defaults/. Relative data paths resolve
    /// against it.
    #[arg(long, default_value = ".")]
    base_dir: PathBuf,

    /// Pitch-by-pitch CSV (overrides data.events).
    #[arg(long)]
    events: Option<String>,

    /// player_mlb_id,year CSV seeding the player table (overrides data.roster).
    #[arg(long)]
    roster: Option<String>,

    /// Output file (overrides data.output).
    #[arg(long, short)]
    output: Option<String>,

    /// csv or json (overrides data.format).
    #[arg(long)]
    format: Option<OutputFormat>,

    /// Merge at-bats whose key spans more than one game instead of failing.
    #[arg(long)]
    allow_key_collisions: bool,
}

fn main() -> anyhow::Result<()> {
    // 1. Parse flags
    let cli = Cli::parse();
    let base_dir = cli.base_dir.clone();

    // 2. Load config
    let config = load(&cli).context("failed to load configuration")?;

    // 3. Initialize tracing
    init_tracing(&config.logging, &base_dir)?;
    info!(
        "Config loaded: events={}, output={} ({})",
        config.data.events, config.data.output, config.data.format
    );

    // 4. Run
    let summary = runner::run(&config, &base_dir)?;
    info!(
        "Processed {} pitches ({} skipped) in {} at-bats",
        summary.pitches, summary.skipped, summary.at_bats
    );
    println!(
        "Wrote {} player-seasons x {} columns to {}",
        summary.player_seasons,
        summary.columns,
        summary.output.display()
    );

    Ok(())
}

fn load(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = config::load_config(&cli.base_dir)?.with_overrides(Overrides {
        events: cli.events.clone(),
        roster: cli.roster.clone(),
        output: cli.output.clone(),
        format: cli.format,
    })?;
    if cli.allow_key_collisions {
        config.pipeline.allow_at_bat_key_collisions = true;
    }
    Ok(config)
}

/// Initialize tracing to stderr, or to `logging.file` when configured.
fn init_tracing(logging: &LoggingConfig, base_dir: &Path) -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::fmt::writer::BoxMakeWriter;
    use tracing_subscriber::EnvFilter;

    let (writer, ansi) = match &logging.file {
        Some(file) => {
            let path = config::resolve(base_dir, file);
            if let Some(dir) = path.parent() {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("failed to create log directory {}", dir.display()))?;
            }
            let log_file = std::fs::File::create(&path)
                .with_context(|| format!("failed to create log file {}", path.display()))?;
            (BoxMakeWriter::new(log_file), false)
        }
        None => (BoxMakeWriter::new(std::io::stderr), true),
    };

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.filter)),
        )
        .with_writer(writer)
        .with_ansi(ansi)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
