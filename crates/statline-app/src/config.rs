// Configuration loading and parsing (config/statline.toml).

use serde::Deserialize;
use statline_baseball::OutputFormat;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const CONFIG_FILE: &str = "statline.toml";
pub const DEFAULT_LOG_FILTER: &str = "statline=info,statline_app=info,statline_baseball=info,warn";

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

impl ConfigError {
    fn invalid(field: &str, message: impl Into<String>) -> Self {
        ConfigError::ValidationError {
            field: field.into(),
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// statline.toml structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub data: DataConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DataConfig {
    /// Pitch-by-pitch CSV.
    pub events: String,
    /// Optional `player_mlb_id,year` CSV seeding the player table.
    #[serde(default)]
    pub roster: Option<String>,
    pub output: String,
    #[serde(default)]
    pub format: OutputFormat,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PipelineConfig {
    /// Merge at-bats whose key spans several games instead of failing.
    #[serde(default)]
    pub allow_at_bat_key_collisions: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Default directive when `RUST_LOG` is unset.
    #[serde(default = "default_filter")]
    pub filter: String,
    /// Log file path; stderr when unset.
    #[serde(default)]
    pub file: Option<String>,
}

fn default_filter() -> String {
    DEFAULT_LOG_FILTER.to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
            file: None,
        }
    }
}

/// Command-line values that replace the file's `[data]` entries.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub events: Option<String>,
    pub roster: Option<String>,
    pub output: Option<String>,
    pub format: Option<OutputFormat>,
}

impl Config {
    /// Apply command-line overrides and re-validate.
    pub fn with_overrides(mut self, overrides: Overrides) -> Result<Self, ConfigError> {
        if let Some(events) = overrides.events {
            self.data.events = events;
        }
        if let Some(roster) = overrides.roster {
            self.data.roster = Some(roster);
        }
        if let Some(output) = overrides.output {
            self.data.output = output;
        }
        if let Some(format) = overrides.format {
            self.data.format = format;
        }
        validate(&self)?;
        Ok(self)
    }
}

/// Resolve a configured path against the base directory unless absolute.
pub fn resolve(base_dir: &Path, path: &str) -> PathBuf {
    let path = Path::new(path);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate `config/statline.toml` relative to `base_dir`.
///
/// Does not copy defaults; see [`load_config`].
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let path = base_dir.join("config").join(CONFIG_FILE);
    let text = std::fs::read_to_string(&path)
        .map_err(|_| ConfigError::FileNotFound { path: path.clone() })?;
    let config: Config = toml::from_str(&text).map_err(|e| ConfigError::ParseError {
        path: path.clone(),
        source: e,
    })?;

    validate(&config)?;

    Ok(config)
}

fn copy_error(message: String) -> ConfigError {
    ConfigError::DefaultsCopyError { message }
}

/// Copy `source` to `target` unless `target` already exists. Returns whether
/// a copy happened.
fn copy_if_missing(source: &Path, target: &Path) -> Result<bool, ConfigError> {
    let mut dest = match std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(target)
    {
        Ok(dest) => dest,
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => return Ok(false),
        Err(e) => return Err(copy_error(format!("failed to create {}: {e}", target.display()))),
    };
    let content = std::fs::read(source)
        .map_err(|e| copy_error(format!("failed to read {}: {e}", source.display())))?;
    std::io::Write::write_all(&mut dest, &content)
        .map_err(|e| copy_error(format!("failed to write {}: {e}", target.display())))?;
    Ok(true)
}

/// Shipped files under `defaults/`, sorted. `.example` templates are left out.
fn default_files(defaults_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let listing = std::fs::read_dir(defaults_dir)
        .map_err(|e| copy_error(format!("failed to list {}: {e}", defaults_dir.display())))?;
    let mut files = Vec::new();
    for entry in listing {
        let path = entry
            .map_err(|e| copy_error(format!("failed to list {}: {e}", defaults_dir.display())))?
            .path();
        let template = path.extension().is_some_and(|ext| ext == "example");
        if path.is_file() && !template {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Mirror `defaults/` into `config/` without touching files already there.
/// Returns the files copied. A base directory with a `config/` but no
/// `defaults/` is left as is.
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let defaults_dir = base_dir.join("defaults");
    let config_dir = base_dir.join("config");

    match (defaults_dir.is_dir(), config_dir.is_dir()) {
        (false, true) => return Ok(Vec::new()),
        (false, false) => {
            return Err(copy_error(format!(
                "{} has neither a defaults/ nor a config/ directory",
                base_dir.display()
            )))
        }
        _ => {}
    }

    std::fs::create_dir_all(&config_dir)
        .map_err(|e| copy_error(format!("failed to create {}: {e}", config_dir.display())))?;

    let mut copied = Vec::new();
    for source in default_files(&defaults_dir)? {
        let Some(name) = source.file_name() else {
            continue;
        };
        let target = config_dir.join(name);
        if copy_if_missing(&source, &target)? {
            copied.push(target);
        }
    }
    Ok(copied)
}

/// Copy any missing defaults, then load the config under `base_dir`.
pub fn load_config(base_dir: &Path) -> Result<Config, ConfigError> {
    ensure_config_files(base_dir)?;
    load_config_from(base_dir)
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    let data = &config.data;
    let required = [("data.events", data.events.as_str()), ("data.output", data.output.as_str())];
    for (field, value) in required {
        if value.trim().is_empty() {
            return Err(ConfigError::invalid(field, "must not be empty"));
        }
    }

    if data.roster.as_deref().is_some_and(|r| r.trim().is_empty()) {
        return Err(ConfigError::invalid(
            "data.roster",
            "must not be empty; omit the key to seed players from the event log",
        ));
    }

    if data.output.trim() == data.events.trim() {
        return Err(ConfigError::invalid(
            "data.output",
            format!("would overwrite the event log {}", data.events),
        ));
    }

    if config.logging.filter.trim().is_empty() {
        return Err(ConfigError::invalid("logging.filter", "must not be empty"));
    }

    if config.logging.file.as_deref().is_some_and(|f| f.trim().is_empty()) {
        return Err(ConfigError::invalid("logging.file", "must not be empty"));
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
