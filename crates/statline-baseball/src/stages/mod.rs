// Pipeline stages and the grouping primitives they share.

pub mod appearances;
pub mod averages;
pub mod metrics;
pub mod roles;
pub mod tally;

use crate::catalog::Role;
use crate::normalize::{NormalizedPitch, PitchLog};
use crate::table::PlayerKey;
use std::collections::{HashMap, HashSet};

pub(crate) fn owned(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

/// Count pitch rows matching `filter`, grouped by the season of the player on
/// the `role` side of the pitch.
pub fn count_rows<F>(log: &PitchLog, role: Role, filter: F) -> HashMap<PlayerKey, i64>
where
    F: Fn(&NormalizedPitch) -> bool,
{
    let mut counts = HashMap::new();
    for pitch in log.pitches().iter().filter(|p| filter(p)) {
        *counts.entry(pitch.key_for(role)).or_insert(0) += 1;
    }
    counts
}

/// Count distinct at-bat identities among rows matching `filter`.
pub fn count_at_bats<F>(log: &PitchLog, role: Role, filter: F) -> HashMap<PlayerKey, i64>
where
    F: Fn(&NormalizedPitch) -> bool,
{
    let mut seen: HashSet<(PlayerKey, u32)> = HashSet::new();
    let mut counts = HashMap::new();
    for pitch in log.pitches().iter().filter(|p| filter(p)) {
        let key = pitch.key_for(role);
        if seen.insert((key, pitch.at_bat_id)) {
            *counts.entry(key).or_insert(0) += 1;
        }
    }
    counts
}

/// Mean of the defined values of `value`, grouped like [`count_rows`].
/// Player-seasons with no defined value are absent from the result.
pub fn mean_by<F>(log: &PitchLog, role: Role, value: F) -> HashMap<PlayerKey, f64>
where
    F: Fn(&NormalizedPitch) -> Option<f64>,
{
    let mut sums: HashMap<PlayerKey, (f64, usize)> = HashMap::new();
    for pitch in log.pitches() {
        if let Some(v) = value(pitch) {
            let entry = sums.entry(pitch.key_for(role)).or_insert((0.0, 0));
            entry.0 += v;
            entry.1 += 1;
        }
    }
    sums.into_iter()
        .map(|(key, (sum, n))| (key, sum / n as f64))
        .collect()
}
