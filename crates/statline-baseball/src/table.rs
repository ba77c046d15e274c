// Player-season table: one row per (player, year), columns merged in by key.
//
// Every counting stage goes through `merge_counts`, which is a left join on
// the row key with absent keys defaulting to zero. Rates are plain f64 columns
// where NaN means "not applicable" (zero denominator).

use crate::error::StatsError;
use std::collections::HashMap;

// ---------------------------------------------------------------------------
// Keys and cells
// ---------------------------------------------------------------------------

/// Row key of the player table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlayerKey {
    pub player_id: u32,
    pub year: i32,
}

impl PlayerKey {
    pub fn new(player_id: u32, year: i32) -> Self {
        Self { player_id, year }
    }
}

/// Storage for one column.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Count(Vec<i64>),
    Rate(Vec<f64>),
    Label(Vec<String>),
}

impl Column {
    fn len(&self) -> usize {
        match self {
            Column::Count(v) => v.len(),
            Column::Rate(v) => v.len(),
            Column::Label(v) => v.len(),
        }
    }
}

/// A single borrowed cell, used when writing rows out.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Cell<'a> {
    Count(i64),
    Rate(f64),
    Label(&'a str),
}

/// `num / den`, or NaN when the denominator is zero or undefined.
///
/// A zero denominator never raises and never yields zero or infinity.
pub fn ratio(num: f64, den: f64) -> f64 {
    if den == 0.0 || den.is_nan() {
        f64::NAN
    } else {
        num / den
    }
}

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct PlayerTable {
    keys: Vec<PlayerKey>,
    rows: HashMap<PlayerKey, usize>,
    columns: Vec<(String, Column)>,
}

impl PlayerTable {
    /// Build an empty-column table from row keys. Keys must be unique.
    pub fn from_keys<I>(keys: I) -> Result<Self, StatsError>
    where
        I: IntoIterator<Item = PlayerKey>,
    {
        let mut table = PlayerTable::default();
        for key in keys {
            if table.rows.insert(key, table.keys.len()).is_some() {
                return Err(StatsError::DuplicateKey {
                    player_id: key.player_id,
                    year: key.year,
                });
            }
            table.keys.push(key);
        }
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn keys(&self) -> &[PlayerKey] {
        &self.keys
    }

    pub fn row_of(&self, key: &PlayerKey) -> Option<usize> {
        self.rows.get(key).copied()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|(n, _)| n == name)
    }

    fn column(&self, name: &str) -> Result<&Column, StatsError> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, c)| c)
            .ok_or_else(|| StatsError::MissingColumn(name.to_string()))
    }

    fn push_column(mut self, name: &str, column: Column) -> Result<Self, StatsError> {
        if self.has_column(name) {
            return Err(StatsError::DuplicateColumn(name.to_string()));
        }
        if column.len() != self.keys.len() {
            return Err(StatsError::ColumnLength {
                name: name.to_string(),
                expected: self.keys.len(),
                actual: column.len(),
            });
        }
        self.columns.push((name.to_string(), column));
        Ok(self)
    }

    // -- merges --------------------------------------------------------------

    /// Left-join grouped counts onto the table; rows with no match get zero.
    ///
    /// Keys in `counts` that are not rows of the table are dropped.
    pub fn merge_counts(self, name: &str, counts: &HashMap<PlayerKey, i64>) -> Result<Self, StatsError> {
        let values = self
            .keys
            .iter()
            .map(|k| counts.get(k).copied().unwrap_or(0))
            .collect();
        self.push_column(name, Column::Count(values))
    }

    /// Left-join grouped averages; rows with no match are NaN.
    pub fn merge_means(self, name: &str, means: &HashMap<PlayerKey, f64>) -> Result<Self, StatsError> {
        let values = self
            .keys
            .iter()
            .map(|k| means.get(k).copied().unwrap_or(f64::NAN))
            .collect();
        self.push_column(name, Column::Rate(values))
    }

    /// Join a per-player label onto every season row of that player.
    pub fn merge_player_labels(
        self,
        name: &str,
        labels: &HashMap<u32, String>,
        default: &str,
    ) -> Result<Self, StatsError> {
        let values = self
            .keys
            .iter()
            .map(|k| labels.get(&k.player_id).cloned().unwrap_or_else(|| default.to_string()))
            .collect();
        self.push_column(name, Column::Label(values))
    }

    /// Append a row-aligned count column.
    pub fn with_counts(self, name: &str, values: Vec<i64>) -> Result<Self, StatsError> {
        self.push_column(name, Column::Count(values))
    }

    /// Append a row-aligned rate column.
    pub fn with_rates(self, name: &str, values: Vec<f64>) -> Result<Self, StatsError> {
        self.push_column(name, Column::Rate(values))
    }

    // -- reads ---------------------------------------------------------------

    /// Borrow a count column.
    pub fn counts(&self, name: &str) -> Result<&[i64], StatsError> {
        match self.column(name)? {
            Column::Count(v) => Ok(v),
            _ => Err(StatsError::MissingColumn(format!("{name} (as count)"))),
        }
    }

    /// Borrow a rate column.
    pub fn rates(&self, name: &str) -> Result<&[f64], StatsError> {
        match self.column(name)? {
            Column::Rate(v) => Ok(v),
            _ => Err(StatsError::MissingColumn(format!("{name} (as rate)"))),
        }
    }

    /// Any numeric column widened to f64.
    pub fn values(&self, name: &str) -> Result<Vec<f64>, StatsError> {
        match self.column(name)? {
            Column::Count(v) => Ok(v.iter().map(|&c| c as f64).collect()),
            Column::Rate(v) => Ok(v.clone()),
            Column::Label(_) => Err(StatsError::MissingColumn(format!("{name} (as number)"))),
        }
    }

    /// Element-wise sum of several count columns.
    pub fn sum_counts(&self, names: &[&str]) -> Result<Vec<i64>, StatsError> {
        let mut total = vec![0; self.keys.len()];
        for name in names {
            for (t, v) in total.iter_mut().zip(self.counts(name)?) {
                *t += v;
            }
        }
        Ok(total)
    }

    pub fn cell(&self, row: usize, name: &str) -> Option<Cell<'_>> {
        let column = self.column(name).ok()?;
        cell_at(column, row)
    }

    pub fn count_at(&self, key: &PlayerKey, name: &str) -> Option<i64> {
        match self.cell(self.row_of(key)?, name)? {
            Cell::Count(v) => Some(v),
            _ => None,
        }
    }

    pub fn rate_at(&self, key: &PlayerKey, name: &str) -> Option<f64> {
        match self.cell(self.row_of(key)?, name)? {
            Cell::Rate(v) => Some(v),
            _ => None,
        }
    }

    pub fn label_at(&self, key: &PlayerKey, name: &str) -> Option<&str> {
        match self.cell(self.row_of(key)?, name)? {
            Cell::Label(v) => Some(v),
            _ => None,
        }
    }

    /// Cells of one row in column order.
    pub fn row_cells(&self, row: usize) -> impl Iterator<Item = (&str, Cell<'_>)> {
        self.columns
            .iter()
            .filter_map(move |(name, column)| cell_at(column, row).map(|c| (name.as_str(), c)))
    }
}

fn cell_at(column: &Column, row: usize) -> Option<Cell<'_>> {
    match column {
        Column::Count(v) => v.get(row).map(|&c| Cell::Count(c)),
        Column::Rate(v) => v.get(row).map(|&r| Cell::Rate(r)),
        Column::Label(v) => v.get(row).map(|s| Cell::Label(s.as_str())),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
