// Writing the finished player table: CSV or JSON lines, one row per
// (player, year). Undefined rates are an empty CSV cell or a JSON null.

use crate::table::{Cell, PlayerTable};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

pub const PLAYER_ID_COLUMN: &str = "player_mlb_id";
pub const YEAR_COLUMN: &str = "year";

#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("CSV write error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON write error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<std::io::Error> for OutputError {
    fn from(source: std::io::Error) -> Self {
        OutputError::Io {
            path: "<writer>".to_string(),
            source,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Csv,
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Csv => write!(f, "csv"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(OutputFormat::Csv),
            "json" | "jsonl" => Ok(OutputFormat::Json),
            other => Err(format!("unknown output format '{other}' (expected csv or json)")),
        }
    }
}

fn csv_cell(cell: Cell<'_>) -> String {
    match cell {
        Cell::Count(v) => v.to_string(),
        Cell::Rate(v) if v.is_nan() => String::new(),
        Cell::Rate(v) => v.to_string(),
        Cell::Label(s) => s.to_string(),
    }
}

fn json_cell(cell: Cell<'_>) -> serde_json::Value {
    match cell {
        Cell::Count(v) => v.into(),
        // from_f64 yields None for NaN and infinities.
        Cell::Rate(v) => serde_json::Number::from_f64(v)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Cell::Label(s) => s.into(),
    }
}

/// Write the table as CSV with a header row.
pub fn write_csv<W: Write>(table: &PlayerTable, wtr: W) -> Result<(), OutputError> {
    let mut wtr = csv::Writer::from_writer(wtr);

    let mut header = vec![PLAYER_ID_COLUMN, YEAR_COLUMN];
    header.extend(table.column_names());
    wtr.write_record(&header)?;

    for (row, key) in table.keys().iter().enumerate() {
        let mut record = vec![key.player_id.to_string(), key.year.to_string()];
        record.extend(table.row_cells(row).map(|(_, cell)| csv_cell(cell)));
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Write the table as newline-delimited JSON objects.
pub fn write_json_lines<W: Write>(table: &PlayerTable, mut wtr: W) -> Result<(), OutputError> {
    for (row, key) in table.keys().iter().enumerate() {
        let mut object = serde_json::Map::new();
        object.insert(PLAYER_ID_COLUMN.to_string(), key.player_id.into());
        object.insert(YEAR_COLUMN.to_string(), key.year.into());
        for (name, cell) in table.row_cells(row) {
            object.insert(name.to_string(), json_cell(cell));
        }
        serde_json::to_writer(&mut wtr, &serde_json::Value::Object(object))?;
        wtr.write_all(b"\n")?;
    }
    wtr.flush()?;
    Ok(())
}

/// Write the table to `path` in the requested format, creating parent
/// directories as needed.
pub fn write_table(table: &PlayerTable, path: &Path, format: OutputFormat) -> Result<(), OutputError> {
    let io_err = |source| OutputError::Io {
        path: path.display().to_string(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    let file = BufWriter::new(File::create(path).map_err(io_err)?);
    match format {
        OutputFormat::Csv => write_csv(table, file)?,
        OutputFormat::Json => write_json_lines(table, file)?,
    }
    info!(
        "Wrote {} player-seasons ({} columns) to {} as {}",
        table.len(),
        table.column_count() + 2,
        path.display(),
        format
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::PlayerKey;

    fn sample() -> PlayerTable {
        PlayerTable::from_keys([PlayerKey::new(7, 2022), PlayerKey::new(9, 2023)])
            .unwrap()
            .with_counts("hits", vec![3, 0])
            .unwrap()
            .with_rates("avg", vec![0.25, f64::NAN])
            .unwrap()
    }

    #[test]
    fn csv_writes_nan_as_empty_cell() {
        let mut buf = Vec::new();
        write_csv(&sample(), &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, vec!["player_mlb_id,year,hits,avg", "7,2022,3,0.25", "9,2023,0,"]);
    }

    #[test]
    fn json_lines_write_nan_as_null() {
        let mut buf = Vec::new();
        write_json_lines(&sample(), &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let rows: Vec<serde_json::Value> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["player_mlb_id"], 7);
        assert_eq!(rows[0]["avg"], 0.25);
        assert!(rows[1]["avg"].is_null());
        assert_eq!(rows[1]["hits"], 0);
    }

    #[test]
    fn labels_written_verbatim() {
        let table = PlayerTable::from_keys([PlayerKey::new(1, 2023)])
            .unwrap()
            .with_counts("hits", vec![1])
            .unwrap();
        let mut labels = std::collections::HashMap::new();
        labels.insert(1, "ss".to_string());
        let table = table.merge_player_labels("primary_position", &labels, "unknown").unwrap();

        let mut buf = Vec::new();
        write_csv(&table, &mut buf).unwrap();
        assert!(String::from_utf8(buf).unwrap().ends_with("1,2023,1,ss\n"));
    }

    #[test]
    fn format_parses_lowercase() {
        #[derive(Deserialize)]
        struct Holder {
            format: OutputFormat,
        }
        let h: Holder = serde_json::from_str(r#"{"format":"json"}"#).unwrap();
        assert_eq!(h.format, OutputFormat::Json);
        assert_eq!(OutputFormat::default().to_string(), "csv");
        assert_eq!("JSONL".parse::<OutputFormat>(), Ok(OutputFormat::Json));
        assert!("parquet".parse::<OutputFormat>().is_err());
    }
}
