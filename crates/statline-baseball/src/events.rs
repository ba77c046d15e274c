// Pitch-level event loading.
//
// Reads Statcast-format CSV exports: one row per pitch, extra columns ignored.
// Headers de-duplicated by pandas (`pitcher.1`, `fielder_2.1`) are accepted as
// aliases for the pitcher and catcher fielder columns.

use crate::catalog::PitchResult;
use crate::table::PlayerKey;
use serde::Deserialize;
use std::collections::HashSet;
use std::io::Read;
use std::path::Path;
use tracing::warn;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// One pitch as loaded from the source table. Immutable after loading.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PitchEvent {
    pub game_pk: u64,
    /// Raw date text; parsed by the normalizer.
    pub game_date: String,
    pub batter: u32,
    pub pitcher: u32,
    /// Times this batter has faced this pitcher in the game.
    pub times_faced: u32,
    pub outs_when_up: u8,
    pub pitch_result: Option<PitchResult>,
    pub bb_type: Option<String>,
    pub events: Option<String>,
    pub description: Option<String>,
    pub pitch_type: Option<String>,
    pub zone: Option<u8>,
    pub inning_topbot: Option<String>,
    pub at_bat_number: Option<u32>,
    pub pitch_number: Option<u32>,
    pub pitcher_at_bat_number: Option<u32>,
    /// `SP` or `RP` for the pitcher's role in this game.
    pub role_key: Option<String>,
    /// Fielder ids indexed by [`crate::catalog::FieldPosition::index`].
    pub fielders: [Option<u32>; 9],
    pub bat_score: Option<i32>,
    pub post_bat_score: Option<i32>,
    pub release_speed: Option<f64>,
    pub pfx_x: Option<f64>,
    pub pfx_z: Option<f64>,
    pub estimated_ba: Option<f64>,
    pub estimated_woba: Option<f64>,
    pub woba_value: Option<f64>,
    pub woba_denom: Option<f64>,
}

impl PitchEvent {
    /// True when the `events` column holds exactly `value`.
    pub fn event_is(&self, value: &str) -> bool {
        self.events.as_deref() == Some(value)
    }

    /// True when the `events` column holds any of `values`.
    pub fn event_in(&self, values: &[&str]) -> bool {
        self.events.as_deref().is_some_and(|e| values.contains(&e))
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to read file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv { path: String, source: csv::Error },

    #[error("validation error: {0}")]
    Validation(String),
}

// ---------------------------------------------------------------------------
// Raw CSV serde structs (private)
// ---------------------------------------------------------------------------

/// Statcast pitch row. Numeric columns are read as f64 because pandas writes
/// integer columns containing gaps as floats (`5.0`).
#[derive(Debug, Deserialize)]
struct RawPitchRow {
    game_pk: f64,
    game_date: String,
    batter: f64,
    pitcher: f64,
    #[serde(alias = "n_thruorder_pitcher")]
    times_faced: f64,
    outs_when_up: f64,
    #[serde(default, rename = "type")]
    pitch_type_code: Option<String>,
    #[serde(default)]
    bb_type: Option<String>,
    #[serde(default)]
    events: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    pitch_type: Option<String>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    zone: Option<f64>,
    #[serde(default)]
    inning_topbot: Option<String>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    at_bat_number: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pitch_number: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pitcher_at_bat_number: Option<f64>,
    #[serde(default)]
    role_key: Option<String>,
    #[serde(default, alias = "pitcher.1", deserialize_with = "csv::invalid_option")]
    pitcher_1: Option<f64>,
    #[serde(default, alias = "fielder_2.1", deserialize_with = "csv::invalid_option")]
    fielder_2_1: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    fielder_3: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    fielder_4: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    fielder_5: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    fielder_6: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    fielder_7: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    fielder_8: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    fielder_9: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    bat_score: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    post_bat_score: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    release_speed: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pfx_x: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pfx_z: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    estimated_ba_using_speedangle: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    estimated_woba_using_speedangle: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    woba_value: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    woba_denom: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawRosterRow {
    #[serde(alias = "player_id")]
    player_mlb_id: f64,
    year: f64,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

/// Non-negative whole number; rejects NaN, infinities and negatives.
fn whole(value: f64) -> Option<u64> {
    (value.is_finite() && value >= 0.0).then(|| value.round() as u64)
}

fn opt_whole<T: TryFrom<u64>>(value: Option<f64>) -> Option<T> {
    finite(value).and_then(whole).and_then(|v| T::try_from(v).ok())
}

fn opt_score(value: Option<f64>) -> Option<i32> {
    finite(value).map(|v| v.round() as i32)
}

/// Trim and drop empty strings.
fn text(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn required<T: TryFrom<u64>>(value: f64, column: &str) -> Result<T, String> {
    whole(value)
        .and_then(|v| T::try_from(v).ok())
        .ok_or_else(|| format!("invalid {column} value {value}"))
}

impl RawPitchRow {
    fn into_event(self) -> Result<PitchEvent, String> {
        let game_date = self.game_date.trim().to_string();
        if game_date.is_empty() {
            return Err("empty game_date".into());
        }
        Ok(PitchEvent {
            game_pk: required(self.game_pk, "game_pk")?,
            game_date,
            batter: required(self.batter, "batter")?,
            pitcher: required(self.pitcher, "pitcher")?,
            times_faced: required(self.times_faced, "times_faced")?,
            outs_when_up: required(self.outs_when_up, "outs_when_up")?,
            pitch_result: text(self.pitch_type_code).and_then(|c| PitchResult::from_code(&c)),
            bb_type: text(self.bb_type),
            events: text(self.events),
            description: text(self.description),
            pitch_type: text(self.pitch_type),
            zone: opt_whole(self.zone),
            inning_topbot: text(self.inning_topbot),
            at_bat_number: opt_whole(self.at_bat_number),
            pitch_number: opt_whole(self.pitch_number),
            pitcher_at_bat_number: opt_whole(self.pitcher_at_bat_number),
            role_key: text(self.role_key).map(|r| r.to_uppercase()),
            fielders: [
                opt_whole(self.pitcher_1),
                opt_whole(self.fielder_2_1),
                opt_whole(self.fielder_3),
                opt_whole(self.fielder_4),
                opt_whole(self.fielder_5),
                opt_whole(self.fielder_6),
                opt_whole(self.fielder_7),
                opt_whole(self.fielder_8),
                opt_whole(self.fielder_9),
            ],
            bat_score: opt_score(self.bat_score),
            post_bat_score: opt_score(self.post_bat_score),
            release_speed: finite(self.release_speed),
            pfx_x: finite(self.pfx_x),
            pfx_z: finite(self.pfx_z),
            estimated_ba: finite(self.estimated_ba_using_speedangle),
            estimated_woba: finite(self.estimated_woba_using_speedangle),
            woba_value: finite(self.woba_value),
            woba_denom: finite(self.woba_denom),
        })
    }
}

// ---------------------------------------------------------------------------
// Header checks
// ---------------------------------------------------------------------------

/// Pitch columns that must be present, each with the header names accepted
/// for it.
const PITCH_REQUIRED: &[&[&str]] = &[
    &["game_pk"],
    &["game_date"],
    &["batter"],
    &["pitcher"],
    &["times_faced", "n_thruorder_pitcher"],
    &["outs_when_up"],
];

const ROSTER_REQUIRED: &[&[&str]] = &[&["player_mlb_id", "player_id"], &["year"]];

/// Header names read into a pitch row, after alias resolution.
const PITCH_COLUMNS: &[&str] = &[
    "game_pk",
    "game_date",
    "batter",
    "pitcher",
    "times_faced",
    "outs_when_up",
    "type",
    "bb_type",
    "events",
    "description",
    "pitch_type",
    "zone",
    "inning_topbot",
    "at_bat_number",
    "pitch_number",
    "pitcher_at_bat_number",
    "role_key",
    "pitcher_1",
    "fielder_2_1",
    "fielder_3",
    "fielder_4",
    "fielder_5",
    "fielder_6",
    "fielder_7",
    "fielder_8",
    "fielder_9",
    "bat_score",
    "post_bat_score",
    "release_speed",
    "pfx_x",
    "pfx_z",
    "estimated_ba_using_speedangle",
    "estimated_woba_using_speedangle",
    "woba_value",
    "woba_denom",
];

const ROSTER_COLUMNS: &[&str] = &["player_mlb_id", "year"];

fn canonical(header: &str) -> &str {
    match header {
        "n_thruorder_pitcher" => "times_faced",
        "pitcher.1" => "pitcher_1",
        "fielder_2.1" => "fielder_2_1",
        "player_id" => "player_mlb_id",
        other => other,
    }
}

/// Reject a header row that lacks a required column or names a read column
/// twice. Repeated columns that are never read are left alone.
fn check_headers(
    headers: &csv::StringRecord,
    required: &[&[&str]],
    read: &[&str],
) -> Result<(), String> {
    for names in required {
        if !headers.iter().any(|h| names.contains(&h.trim())) {
            return Err(format!("missing required column `{}`", names[0]));
        }
    }
    let mut seen = HashSet::new();
    for header in headers.iter().map(|h| h.trim()) {
        let column = canonical(header);
        if read.contains(&column) && !seen.insert(column) {
            return Err(format!("duplicate column `{header}`"));
        }
    }
    Ok(())
}

fn line_of(position: Option<&csv::Position>) -> u64 {
    position.map_or(0, |p| p.line())
}

// ---------------------------------------------------------------------------
// Reader-based loaders
// ---------------------------------------------------------------------------

fn read_pitches<R: Read>(rdr: R, source: &str) -> Result<Vec<PitchEvent>, LoadError> {
    let csv_error = |e| LoadError::Csv {
        path: source.to_string(),
        source: e,
    };
    let mut reader = csv::Reader::from_reader(rdr);
    let headers = reader.headers().map_err(csv_error)?.clone();
    check_headers(&headers, PITCH_REQUIRED, PITCH_COLUMNS)
        .map_err(|msg| LoadError::Validation(format!("pitch CSV {source}: {msg}")))?;

    let mut pitches = Vec::new();
    for result in reader.records() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                warn!("skipping malformed pitch row at line {}: {}", line_of(e.position()), e);
                continue;
            }
        };
        let line = line_of(record.position());
        match record.deserialize::<RawPitchRow>(Some(&headers)) {
            Ok(raw) => match raw.into_event() {
                Ok(event) => pitches.push(event),
                Err(reason) => warn!("skipping pitch row at line {}: {}", line, reason),
            },
            Err(e) => warn!("skipping malformed pitch row at line {}: {}", line, e),
        }
    }
    Ok(pitches)
}

fn read_roster<R: Read>(rdr: R, source: &str) -> Result<Vec<PlayerKey>, LoadError> {
    let csv_error = |e| LoadError::Csv {
        path: source.to_string(),
        source: e,
    };
    let mut reader = csv::Reader::from_reader(rdr);
    let headers = reader.headers().map_err(csv_error)?.clone();
    check_headers(&headers, ROSTER_REQUIRED, ROSTER_COLUMNS)
        .map_err(|msg| LoadError::Validation(format!("roster CSV {source}: {msg}")))?;

    let mut keys = Vec::new();
    for result in reader.records() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                warn!("skipping malformed roster row at line {}: {}", line_of(e.position()), e);
                continue;
            }
        };
        let line = line_of(record.position());
        match record.deserialize::<RawRosterRow>(Some(&headers)) {
            Ok(raw) => {
                let player_id = whole(raw.player_mlb_id).and_then(|v| u32::try_from(v).ok());
                match (player_id, raw.year.is_finite()) {
                    (Some(player_id), true) => keys.push(PlayerKey {
                        player_id,
                        year: raw.year.round() as i32,
                    }),
                    _ => warn!(
                        "skipping roster row at line {}: invalid player {} / year {}",
                        line, raw.player_mlb_id, raw.year
                    ),
                }
            }
            Err(e) => warn!("skipping malformed roster row at line {}: {}", line, e),
        }
    }
    Ok(keys)
}

/// Parse pitch rows from any reader. Malformed rows are logged and skipped;
/// a broken CSV stream or a bad header row is an error.
pub fn load_pitches_from_reader<R: Read>(rdr: R) -> Result<Vec<PitchEvent>, LoadError> {
    read_pitches(rdr, "<reader>")
}

/// Parse a roster of `player_mlb_id,year` rows. Duplicates are kept; the
/// player table rejects them.
pub fn load_roster_from_reader<R: Read>(rdr: R) -> Result<Vec<PlayerKey>, LoadError> {
    read_roster(rdr, "<reader>")
}

// ---------------------------------------------------------------------------
// Public path-based loaders
// ---------------------------------------------------------------------------

fn open(path: &Path) -> Result<std::fs::File, LoadError> {
    std::fs::File::open(path).map_err(|e| LoadError::Io {
        path: path.display().to_string(),
        source: e,
    })
}

/// Load the pitch table from a CSV file. Fails if no row survives parsing.
pub fn load_pitches(path: &Path) -> Result<Vec<PitchEvent>, LoadError> {
    let pitches = read_pitches(open(path)?, &path.display().to_string())?;
    if pitches.is_empty() {
        return Err(LoadError::Validation(format!(
            "pitch CSV {} produced zero valid rows",
            path.display()
        )));
    }
    Ok(pitches)
}

/// Load the player-season roster from a CSV file.
pub fn load_roster(path: &Path) -> Result<Vec<PlayerKey>, LoadError> {
    read_roster(open(path)?, &path.display().to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "game_pk,game_date,batter,pitcher,times_faced,outs_when_up,type,bb_type,events,zone,pitch_type,release_speed,pfx_x,pfx_z,bat_score,post_bat_score,pitcher_1,fielder_2_1,fielder_3,fielder_4,fielder_5,fielder_6,fielder_7,fielder_8,fielder_9";

    #[test]
    fn pitch_row_parsed() {
        let csv_data = format!(
            "{HEADER}\n\
             717465,2023-04-01,592450,543037,1,0,X,line_drive,single,5,FF,95.1,-0.5,1.2,0,1,543037,1,2,3,4,5,6,7,8"
        );

        let pitches = load_pitches_from_reader(csv_data.as_bytes()).unwrap();
        assert_eq!(pitches.len(), 1);
        let p = &pitches[0];
        assert_eq!(p.game_pk, 717465);
        assert_eq!(p.game_date, "2023-04-01");
        assert_eq!(p.batter, 592450);
        assert_eq!(p.pitcher, 543037);
        assert_eq!(p.pitch_result, Some(PitchResult::InPlay));
        assert_eq!(p.bb_type.as_deref(), Some("line_drive"));
        assert!(p.event_is("single"));
        assert_eq!(p.zone, Some(5));
        assert_eq!(p.post_bat_score, Some(1));
        assert_eq!(p.fielders[0], Some(543037));
        assert_eq!(p.fielders[8], Some(8));
        assert!((p.release_speed.unwrap() - 95.1).abs() < f64::EPSILON);
    }

    #[test]
    fn float_encoded_integers_accepted() {
        let csv_data = format!(
            "{HEADER}\n\
             717465.0,2023-04-01,592450.0,543037.0,2.0,1.0,B,,,14.0,SL,,,,,,,,,,,,,,"
        );

        let pitches = load_pitches_from_reader(csv_data.as_bytes()).unwrap();
        assert_eq!(pitches[0].game_pk, 717465);
        assert_eq!(pitches[0].times_faced, 2);
        assert_eq!(pitches[0].zone, Some(14));
        assert!(pitches[0].events.is_none());
        assert!(pitches[0].bb_type.is_none());
        assert!(pitches[0].release_speed.is_none());
        assert_eq!(pitches[0].fielders, [None; 9]);
    }

    #[test]
    fn pandas_duplicate_header_aliases() {
        let csv_data = "\
game_pk,game_date,batter,pitcher,times_faced,outs_when_up,pitcher.1,fielder_2.1
1,2023-04-01,10,20,1,0,20,30";

        let pitches = load_pitches_from_reader(csv_data.as_bytes()).unwrap();
        assert_eq!(pitches[0].fielders[0], Some(20));
        assert_eq!(pitches[0].fielders[1], Some(30));
    }

    #[test]
    fn times_faced_alias() {
        let csv_data = "\
game_pk,game_date,batter,pitcher,n_thruorder_pitcher,outs_when_up
1,2023-04-01,10,20,3,0";

        let pitches = load_pitches_from_reader(csv_data.as_bytes()).unwrap();
        assert_eq!(pitches[0].times_faced, 3);
    }

    #[test]
    fn unparsable_optional_values_become_none() {
        let csv_data = "\
game_pk,game_date,batter,pitcher,times_faced,outs_when_up,release_speed,woba_value
1,2023-04-01,10,20,1,0,fast,NaN";

        let pitches = load_pitches_from_reader(csv_data.as_bytes()).unwrap();
        assert!(pitches[0].release_speed.is_none());
        assert!(pitches[0].woba_value.is_none());
    }

    #[test]
    fn malformed_rows_skipped() {
        let csv_data = "\
game_pk,game_date,batter,pitcher,times_faced,outs_when_up
1,2023-04-01,10,20,1,0
1,2023-04-01,not_a_number,20,1,0
1,,10,20,1,0
1,2023-04-01,-5,20,1,0
2,2023-04-02,11,21,1,2";

        let pitches = load_pitches_from_reader(csv_data.as_bytes()).unwrap();
        assert_eq!(pitches.len(), 2);
        assert_eq!(pitches[0].batter, 10);
        assert_eq!(pitches[1].batter, 11);
    }

    #[test]
    fn extra_columns_ignored() {
        let csv_data = "\
pitch_name,game_pk,game_date,batter,pitcher,times_faced,outs_when_up,spin_axis
4-Seam Fastball,1,2023-04-01,10,20,1,0,210";

        let pitches = load_pitches_from_reader(csv_data.as_bytes()).unwrap();
        assert_eq!(pitches.len(), 1);
    }

    #[test]
    fn role_key_uppercased() {
        let csv_data = "\
game_pk,game_date,batter,pitcher,times_faced,outs_when_up,role_key
1,2023-04-01,10,20,1,0,sp";

        let pitches = load_pitches_from_reader(csv_data.as_bytes()).unwrap();
        assert_eq!(pitches[0].role_key.as_deref(), Some("SP"));
    }

    #[test]
    fn roster_loading() {
        let csv_data = "\
player_mlb_id,year
592450,2023
592450,2024.0
bad,2023";

        let roster = load_roster_from_reader(csv_data.as_bytes()).unwrap();
        assert_eq!(
            roster,
            vec![
                PlayerKey { player_id: 592450, year: 2023 },
                PlayerKey { player_id: 592450, year: 2024 },
            ]
        );
    }

    #[test]
    fn duplicate_read_column_rejected() {
        let csv_data = "\
game_pk,game_date,batter,pitcher,times_faced,outs_when_up,pitcher
1,2023-04-01,10,20,1,0,20";

        let err = load_pitches_from_reader(csv_data.as_bytes()).unwrap_err();
        match err {
            LoadError::Validation(msg) => assert!(msg.contains("duplicate column `pitcher`"), "{msg}"),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn alias_and_canonical_name_together_rejected() {
        let csv_data = "\
game_pk,game_date,batter,pitcher,times_faced,outs_when_up,pitcher_1,pitcher.1
1,2023-04-01,10,20,1,0,20,20";

        let err = load_pitches_from_reader(csv_data.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("`pitcher.1`"), "{err}");
    }

    #[test]
    fn repeated_unread_column_ignored() {
        let csv_data = "\
game_pk,game_date,batter,pitcher,times_faced,outs_when_up,fielder_2,fielder_2
1,2023-04-01,10,20,1,0,30,30";

        let pitches = load_pitches_from_reader(csv_data.as_bytes()).unwrap();
        assert_eq!(pitches.len(), 1);
    }

    #[test]
    fn missing_required_column_named() {
        let csv_data = "\
game_pk,game_date,pitcher,times_faced,outs_when_up
1,2023-04-01,20,1,0";

        let err = load_pitches_from_reader(csv_data.as_bytes()).unwrap_err();
        match err {
            LoadError::Validation(msg) => assert!(msg.contains("`batter`"), "{msg}"),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn roster_without_year_rejected() {
        let err = load_roster_from_reader("player_mlb_id\n592450\n".as_bytes()).unwrap_err();
        assert!(err.to_string().contains("`year`"), "{err}");
    }

    #[test]
    fn path_loader_names_file_and_column() {
        let path = std::env::temp_dir().join("statline_events_dup_header.csv");
        std::fs::write(
            &path,
            "game_pk,game_date,batter,pitcher,pitcher,times_faced,outs_when_up\n\
             1,2023-04-01,10,20,20,1,0\n",
        )
        .unwrap();
        let err = load_pitches(&path).unwrap_err().to_string();
        assert!(err.contains("statline_events_dup_header.csv"), "{err}");
        assert!(err.contains("duplicate column `pitcher`"), "{err}");
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn row_lines_count_header_and_quoted_newlines() {
        let csv_data = "\
game_pk,game_date,batter,pitcher,times_faced,outs_when_up,description
1,2023-04-01,10,20,1,0,\"foul
tip\"
1,2023-04-01,11,20,1,0,ball";

        let mut reader = csv::Reader::from_reader(csv_data.as_bytes());
        let lines: Vec<u64> = reader
            .records()
            .map(|r| line_of(r.unwrap().position()))
            .collect();
        assert_eq!(lines, vec![2, 4]);
    }

    #[test]
    fn event_membership() {
        let event = PitchEvent {
            events: Some("pickoff_1b".into()),
            ..Default::default()
        };
        assert!(event.event_in(crate::catalog::BASEPATH_OUTS));
        assert!(!event.event_is("single"));
        assert!(!PitchEvent::default().event_in(crate::catalog::BASEPATH_OUTS));
    }
}
