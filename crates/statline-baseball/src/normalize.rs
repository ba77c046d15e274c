// Event normalization: date parsing, per-pitch derived values and synthetic
// at-bat identity.

use crate::catalog::Role;
use crate::error::StatsError;
use crate::events::PitchEvent;
use crate::table::PlayerKey;
use chrono::{Datelike, NaiveDate};
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info, warn};

// ---------------------------------------------------------------------------
// At-bat identity
// ---------------------------------------------------------------------------

/// The tuple an at-bat is identified by. Pitch count is not part of it: every
/// pitch of the matchup shares the key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AtBatKey {
    pub batter: u32,
    pub pitcher: u32,
    pub game_date: NaiveDate,
    pub year: i32,
    pub times_faced: u32,
}

/// Dense at-bat identities, 1..=N in first-seen order.
#[derive(Debug, Clone, Default)]
pub struct AtBatIndex {
    keys: Vec<AtBatKey>,
    ids: HashMap<AtBatKey, u32>,
}

impl AtBatIndex {
    /// Return the identity for `key`, assigning the next one if unseen.
    fn assign(&mut self, key: AtBatKey) -> u32 {
        if let Some(&id) = self.ids.get(&key) {
            return id;
        }
        self.keys.push(key);
        let id = self.keys.len() as u32;
        self.ids.insert(key, id);
        id
    }

    pub fn id_of(&self, key: &AtBatKey) -> Option<u32> {
        self.ids.get(key).copied()
    }

    pub fn key_of(&self, id: u32) -> Option<&AtBatKey> {
        let idx = usize::try_from(id).ok()?.checked_sub(1)?;
        self.keys.get(idx)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &AtBatKey)> {
        self.keys.iter().enumerate().map(|(i, k)| (i as u32 + 1, k))
    }

    /// Check the mapping is a bijection between keys and 1..=N.
    pub fn verify(&self) -> Result<(), StatsError> {
        if self.ids.len() != self.keys.len() {
            return Err(StatsError::AtBatIdentity(format!(
                "{} keys share {} identities",
                self.keys.len(),
                self.ids.len()
            )));
        }
        for (id, key) in self.iter() {
            match self.ids.get(key) {
                Some(&mapped) if mapped == id => {}
                other => {
                    return Err(StatsError::AtBatIdentity(format!(
                        "at-bat {id} maps back to {other:?}"
                    )))
                }
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Normalized pitches
// ---------------------------------------------------------------------------

/// A pitch with its parsed date and derived columns.
#[derive(Debug, Clone)]
pub struct NormalizedPitch {
    pub event: PitchEvent,
    pub game_date: NaiveDate,
    pub year: i32,
    /// Runs scored by the batting team on this pitch.
    pub runs_on_play: Option<i32>,
    /// Euclidean norm of horizontal and vertical movement.
    pub movement: Option<f64>,
    pub at_bat_id: u32,
}

impl NormalizedPitch {
    /// Key of the player on the given side of this pitch.
    pub fn key_for(&self, role: Role) -> PlayerKey {
        PlayerKey::new(role.player_of(&self.event), self.year)
    }

    pub fn at_bat_key(&self) -> AtBatKey {
        AtBatKey {
            batter: self.event.batter,
            pitcher: self.event.pitcher,
            game_date: self.game_date,
            year: self.year,
            times_faced: self.event.times_faced,
        }
    }
}

/// Normalizer switches.
#[derive(Debug, Clone, Copy, Default)]
pub struct NormalizeOptions {
    /// Merge at-bats whose key spans two games instead of failing. Off by
    /// default: a merged double-header at-bat counts two outcomes as one
    /// appearance.
    pub allow_at_bat_key_collisions: bool,
}

/// The normalized pitch table plus its at-bat identity table.
#[derive(Debug, Clone, Default)]
pub struct PitchLog {
    pitches: Vec<NormalizedPitch>,
    at_bats: AtBatIndex,
    skipped: usize,
}

impl PitchLog {
    pub fn pitches(&self) -> &[NormalizedPitch] {
        &self.pitches
    }

    pub fn at_bats(&self) -> &AtBatIndex {
        &self.at_bats
    }

    /// Rows dropped because their date could not be parsed.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Every (player, year) that appears as batter, pitcher or fielder,
    /// sorted by player then year.
    pub fn player_keys(&self) -> Vec<PlayerKey> {
        let mut keys = BTreeSet::new();
        for p in &self.pitches {
            keys.insert(p.key_for(Role::Batter));
            keys.insert(p.key_for(Role::Pitcher));
            for fielder in p.event.fielders.iter().flatten() {
                keys.insert(PlayerKey::new(*fielder, p.year));
            }
        }
        keys.into_iter().collect()
    }
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d"];

/// Parse a game date in any of the accepted formats. A trailing time
/// component (`2023-04-01 00:00:00`) is ignored.
pub fn parse_game_date(raw: &str) -> Option<NaiveDate> {
    let date_part = raw.trim().split([' ', 'T']).next().unwrap_or_default();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(date_part, fmt).ok())
}

/// Movement magnitude from the two pitch-movement components.
pub fn movement_magnitude(pfx_x: Option<f64>, pfx_z: Option<f64>) -> Option<f64> {
    Some(pfx_x?.hypot(pfx_z?))
}

/// Normalize raw pitches and assign at-bat identities.
///
/// Rows with unparseable dates are skipped with a warning. The identity table
/// is verified before returning; a non-injective mapping or a join that does
/// not cover every pitch is a fatal error.
pub fn normalize(events: Vec<PitchEvent>, options: NormalizeOptions) -> Result<PitchLog, StatsError> {
    let mut at_bats = AtBatIndex::default();
    let mut staged = Vec::with_capacity(events.len());
    let mut skipped = 0usize;

    // Pass 1: derive per-pitch values and collect distinct at-bat keys.
    for event in events {
        let Some(game_date) = parse_game_date(&event.game_date) else {
            warn!("skipping pitch with unparseable game_date '{}'", event.game_date);
            skipped += 1;
            continue;
        };
        let year = game_date.year();
        let runs_on_play = match (event.bat_score, event.post_bat_score) {
            (Some(before), Some(after)) => Some(after - before),
            _ => None,
        };
        let movement = movement_magnitude(event.pfx_x, event.pfx_z);
        let pitch = NormalizedPitch {
            event,
            game_date,
            year,
            runs_on_play,
            movement,
            at_bat_id: 0,
        };
        at_bats.assign(pitch.at_bat_key());
        staged.push(pitch);
    }
    at_bats.verify()?;

    // Pass 2: inner-join identities back onto the pitches.
    let expected = staged.len();
    let mut first_game: HashMap<u32, u64> = HashMap::new();
    let mut collisions = 0usize;
    let mut pitches = Vec::with_capacity(expected);
    for mut pitch in staged {
        let Some(id) = at_bats.id_of(&pitch.at_bat_key()) else {
            continue;
        };
        pitch.at_bat_id = id;
        let game = *first_game.entry(id).or_insert(pitch.event.game_pk);
        if game != pitch.event.game_pk {
            if !options.allow_at_bat_key_collisions {
                return Err(StatsError::AtBatKeyCollision {
                    at_bat_id: id,
                    first_game: game,
                    second_game: pitch.event.game_pk,
                });
            }
            collisions += 1;
        }
        pitches.push(pitch);
    }
    if pitches.len() != expected {
        return Err(StatsError::AtBatJoin {
            expected,
            joined: pitches.len(),
        });
    }
    if collisions > 0 {
        warn!(
            "{} pitches share an at-bat key with a different game; those at-bats are merged",
            collisions
        );
    }

    info!(
        "Normalized {} pitches into {} at-bats ({} skipped)",
        pitches.len(),
        at_bats.len(),
        skipped
    );
    debug!("at-bat identity verified for {} keys", at_bats.len());

    Ok(PitchLog {
        pitches,
        at_bats,
        skipped,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn pitch(batter: u32, pitcher: u32, date: &str, times_faced: u32) -> PitchEvent {
        PitchEvent {
            game_pk: 1,
            game_date: date.into(),
            batter,
            pitcher,
            times_faced,
            ..Default::default()
        }
    }

    #[test]
    fn date_formats() {
        let expected = NaiveDate::from_ymd_opt(2023, 4, 1).unwrap();
        assert_eq!(parse_game_date("2023-04-01"), Some(expected));
        assert_eq!(parse_game_date("04/01/2023"), Some(expected));
        assert_eq!(parse_game_date("2023-04-01 00:00:00"), Some(expected));
        assert_eq!(parse_game_date("yesterday"), None);
    }

    #[test]
    fn pitches_of_one_at_bat_share_identity() {
        let events = vec![
            pitch(10, 20, "2023-04-01", 1),
            pitch(10, 20, "2023-04-01", 1),
            pitch(10, 20, "2023-04-01", 1),
        ];
        let log = normalize(events, NormalizeOptions::default()).unwrap();
        assert_eq!(log.at_bats().len(), 1);
        assert!(log.pitches().iter().all(|p| p.at_bat_id == 1));
    }

    #[test]
    fn identities_are_dense_and_injective() {
        let events = vec![
            pitch(10, 20, "2023-04-01", 1),
            pitch(11, 20, "2023-04-01", 1),
            pitch(10, 20, "2023-04-01", 2),
            pitch(10, 21, "2023-04-01", 1),
            pitch(10, 20, "2024-04-01", 1),
            pitch(11, 20, "2023-04-01", 1),
        ];
        let log = normalize(events, NormalizeOptions::default()).unwrap();
        assert_eq!(log.at_bats().len(), 5);

        let ids: HashSet<u32> = log.at_bats().iter().map(|(id, _)| id).collect();
        assert_eq!(ids, (1..=5).collect());

        // Invertible from any pitch row.
        for p in log.pitches() {
            assert_eq!(log.at_bats().key_of(p.at_bat_id), Some(&p.at_bat_key()));
        }
        assert!(log.at_bats().key_of(0).is_none());
        assert!(log.at_bats().key_of(6).is_none());
    }

    #[test]
    fn derived_columns() {
        let mut event = pitch(10, 20, "2023-04-01", 1);
        event.bat_score = Some(2);
        event.post_bat_score = Some(4);
        event.pfx_x = Some(3.0);
        event.pfx_z = Some(-4.0);
        let log = normalize(vec![event], NormalizeOptions::default()).unwrap();
        let p = &log.pitches()[0];
        assert_eq!(p.year, 2023);
        assert_eq!(p.runs_on_play, Some(2));
        assert!((p.movement.unwrap() - 5.0).abs() < 1e-12);
    }

    #[test]
    fn missing_movement_component_is_undefined() {
        assert_eq!(movement_magnitude(Some(1.0), None), None);
        assert_eq!(movement_magnitude(None, None), None);
    }

    #[test]
    fn unparseable_dates_skipped() {
        let events = vec![pitch(10, 20, "2023-04-01", 1), pitch(10, 20, "not a date", 1)];
        let log = normalize(events, NormalizeOptions::default()).unwrap();
        assert_eq!(log.pitches().len(), 1);
        assert_eq!(log.skipped(), 1);
    }

    #[test]
    fn doubleheader_collision_fatal_by_default() {
        let mut second = pitch(10, 20, "2023-04-01", 1);
        second.game_pk = 2;
        let events = vec![pitch(10, 20, "2023-04-01", 1), second];
        let err = normalize(events, NormalizeOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            StatsError::AtBatKeyCollision { at_bat_id: 1, first_game: 1, second_game: 2 }
        ));
    }

    #[test]
    fn doubleheader_collision_merges_when_allowed() {
        let mut second = pitch(10, 20, "2023-04-01", 1);
        second.game_pk = 2;
        let events = vec![pitch(10, 20, "2023-04-01", 1), second];
        let options = NormalizeOptions {
            allow_at_bat_key_collisions: true,
        };
        let log = normalize(events, options).unwrap();
        assert_eq!(log.at_bats().len(), 1);
        assert_eq!(log.pitches().len(), 2);
    }

    #[test]
    fn player_keys_include_fielders() {
        let mut event = pitch(10, 20, "2023-04-01", 1);
        event.fielders[5] = Some(30);
        let log = normalize(vec![event], NormalizeOptions::default()).unwrap();
        assert_eq!(
            log.player_keys(),
            vec![
                PlayerKey::new(10, 2023),
                PlayerKey::new(20, 2023),
                PlayerKey::new(30, 2023),
            ]
        );
    }
}
