// Derived rate statistics. These stages read only the player table, never the
// pitch log, and every input they read is declared in `requires`.

use crate::catalog::{FieldPosition, PitchResult, Role, CONTACT_TYPES};
use crate::error::StatsError;
use crate::normalize::PitchLog;
use crate::pipeline::Stage;
use crate::stages::appearances::{TOTAL_BF, TOTAL_PA};
use crate::stages::owned;
use crate::stages::tally::{result_count_column, INNINGS_PITCHED};
use crate::table::{ratio, PlayerTable};

pub const HITS: &str = "hits";
pub const ELIG_PA: &str = "elig_pa";
pub const AVG: &str = "avg";
pub const TB: &str = "tb";
pub const SLG: &str = "slg";
pub const OBP: &str = "obp";
pub const OPS: &str = "ops";
pub const ISO: &str = "iso";
pub const BABIP_BATTER: &str = "babip_batter";
pub const K_RATE_BATTER: &str = "k_rate_batter";
pub const BB_RATE_BATTER: &str = "bb_rate_batter";
pub const HR_RATE_BATTER: &str = "hr_rate_batter";
pub const STOLEN_BASES: &str = "stolen_bases";
pub const XBH: &str = "xbh";
pub const RC: &str = "rc";
pub const K_BB_RATIO_BATTER: &str = "k_bb_ratio_batter";

pub const PITCHER_HITS_ALLOWED: &str = "pitcher_hits_allowed";
pub const PITCHER_ELIG_BF: &str = "pitcher_elig_bf";
pub const WHIP: &str = "whip";
pub const K_RATE_PITCHER: &str = "k_rate_pitcher";
pub const BB_RATE_PITCHER: &str = "bb_rate_pitcher";
pub const BABIP_PITCHER: &str = "babip_pitcher";
pub const HR_RATE_PITCHER: &str = "hr_rate_pitcher";
pub const BAA: &str = "baa";
pub const K_BB_RATIO_PITCHER: &str = "k_bb_ratio_pitcher";

pub const POSITIONS_PLAYED: &str = "positions_played";

// ---------------------------------------------------------------------------
// Element-wise helpers
// ---------------------------------------------------------------------------

fn widen(values: &[i64]) -> Vec<f64> {
    values.iter().map(|&v| v as f64).collect()
}

fn divide(num: &[f64], den: &[f64]) -> Vec<f64> {
    num.iter().zip(den).map(|(&n, &d)| ratio(n, d)).collect()
}

fn add(a: &[f64], b: &[f64]) -> Vec<f64> {
    a.iter().zip(b).map(|(x, y)| x + y).collect()
}

fn sub(a: &[f64], b: &[f64]) -> Vec<f64> {
    a.iter().zip(b).map(|(x, y)| x - y).collect()
}

/// Σ weight·column over count columns.
fn weighted(table: &PlayerTable, terms: &[(i64, &str)]) -> Result<Vec<i64>, StatsError> {
    let mut total = vec![0; table.len()];
    for (weight, name) in terms {
        for (t, v) in total.iter_mut().zip(table.counts(name)?) {
            *t += weight * v;
        }
    }
    Ok(total)
}

/// `{role}_{event}` column names for a fixed list of events.
fn role_columns(role: Role, events: &[&str]) -> Vec<String> {
    events.iter().map(|e| role.column(e)).collect()
}

const HIT_EVENTS: [&str; 4] = ["single", "double", "triple", "home_run"];
const NON_AT_BAT_EVENTS: [&str; 4] = ["sac_fly", "sac_bunt", "walk", "catcher_interf"];

/// Hits, eligible appearances and the inputs both roles share.
struct RoleCounts {
    hits: Vec<i64>,
    eligible: Vec<i64>,
    home_run: Vec<f64>,
    walk: Vec<f64>,
    strikeout: Vec<f64>,
    inplay: Vec<f64>,
}

impl RoleCounts {
    fn read(table: &PlayerTable, role: Role, appearances: &str) -> Result<Self, StatsError> {
        let hit_columns = role_columns(role, &HIT_EVENTS);
        let hit_refs: Vec<&str> = hit_columns.iter().map(String::as_str).collect();
        let hits = table.sum_counts(&hit_refs)?;

        let skipped_columns = role_columns(role, &NON_AT_BAT_EVENTS);
        let skipped_refs: Vec<&str> = skipped_columns.iter().map(String::as_str).collect();
        let skipped = table.sum_counts(&skipped_refs)?;
        let eligible = table
            .counts(appearances)?
            .iter()
            .zip(&skipped)
            .map(|(pa, s)| pa - s)
            .collect();

        Ok(Self {
            hits,
            eligible,
            home_run: table.values(&role.column("home_run"))?,
            walk: table.values(&role.column("walk"))?,
            strikeout: table.values(&role.column("strikeout"))?,
            inplay: table.values(&result_count_column(PitchResult::InPlay, role))?,
        })
    }

    fn requires(role: Role, appearances: &str) -> Vec<String> {
        let mut columns = role_columns(role, &HIT_EVENTS);
        columns.extend(role_columns(role, &NON_AT_BAT_EVENTS));
        columns.extend(role_columns(role, &["strikeout"]));
        columns.push(result_count_column(PitchResult::InPlay, role));
        columns.push(appearances.to_string());
        columns
    }

    /// (hits − HR) / (balls in play − HR)
    fn babip(&self) -> Vec<f64> {
        let hits = widen(&self.hits);
        divide(&sub(&hits, &self.home_run), &sub(&self.inplay, &self.home_run))
    }
}

// ---------------------------------------------------------------------------
// Batting
// ---------------------------------------------------------------------------

/// Slash line, rate stats and counting aggregates for the batter role.
#[derive(Debug, Clone, Copy)]
pub struct BattingMetrics;

impl Stage for BattingMetrics {
    fn name(&self) -> &'static str {
        "batting_metrics"
    }

    fn requires(&self) -> Vec<String> {
        let mut columns = RoleCounts::requires(Role::Batter, TOTAL_PA);
        columns.extend(role_columns(
            Role::Batter,
            &["hit_by_pitch", "stolen_base_2b", "stolen_base_3b"],
        ));
        columns
    }

    fn produces(&self) -> Vec<String> {
        owned(&[
            HITS,
            ELIG_PA,
            AVG,
            TB,
            SLG,
            OBP,
            OPS,
            ISO,
            BABIP_BATTER,
            K_RATE_BATTER,
            BB_RATE_BATTER,
            HR_RATE_BATTER,
            STOLEN_BASES,
            XBH,
            RC,
            K_BB_RATIO_BATTER,
        ])
    }

    fn apply(&self, _log: &PitchLog, table: PlayerTable) -> Result<PlayerTable, StatsError> {
        let role = Role::Batter;
        let counts = RoleCounts::read(&table, role, TOTAL_PA)?;
        let pa = table.values(TOTAL_PA)?;
        let hbp = table.values(&role.column("hit_by_pitch"))?;

        let tb = weighted(
            &table,
            &[
                (1, "batter_single"),
                (2, "batter_double"),
                (3, "batter_triple"),
                (4, "batter_home_run"),
            ],
        )?;
        let xbh = table.sum_counts(&["batter_double", "batter_triple", "batter_home_run"])?;
        let stolen = table.sum_counts(&["batter_stolen_base_2b", "batter_stolen_base_3b"])?;

        let hits = widen(&counts.hits);
        let eligible = widen(&counts.eligible);
        let total_bases = widen(&tb);

        let avg = divide(&hits, &eligible);
        let slg = divide(&total_bases, &eligible);
        let on_base = add(&add(&hits, &counts.walk), &hbp);
        let obp = divide(&on_base, &add(&add(&eligible, &counts.walk), &hbp));
        let ops = add(&obp, &slg);
        let iso = sub(&slg, &avg);
        let rc_num: Vec<f64> = add(&hits, &counts.walk)
            .iter()
            .zip(&total_bases)
            .map(|(a, b)| a * b)
            .collect();

        table
            .with_counts(HITS, counts.hits.clone())?
            .with_counts(ELIG_PA, counts.eligible.clone())?
            .with_rates(AVG, avg)?
            .with_counts(TB, tb)?
            .with_rates(SLG, slg)?
            .with_rates(OBP, obp)?
            .with_rates(OPS, ops)?
            .with_rates(ISO, iso)?
            .with_rates(BABIP_BATTER, counts.babip())?
            .with_rates(K_RATE_BATTER, divide(&counts.strikeout, &pa))?
            .with_rates(BB_RATE_BATTER, divide(&counts.walk, &pa))?
            .with_rates(HR_RATE_BATTER, divide(&counts.home_run, &pa))?
            .with_counts(STOLEN_BASES, stolen)?
            .with_counts(XBH, xbh)?
            .with_rates(RC, divide(&rc_num, &pa))?
            .with_rates(K_BB_RATIO_BATTER, divide(&counts.strikeout, &counts.walk))
    }
}

// ---------------------------------------------------------------------------
// Pitching
// ---------------------------------------------------------------------------

/// Hits allowed, WHIP, opponent rates and K/BB for the pitcher role.
///
/// WHIP divides by the outs-based innings approximation.
#[derive(Debug, Clone, Copy)]
pub struct PitchingMetrics;

impl Stage for PitchingMetrics {
    fn name(&self) -> &'static str {
        "pitching_metrics"
    }

    fn requires(&self) -> Vec<String> {
        let mut columns = RoleCounts::requires(Role::Pitcher, TOTAL_BF);
        columns.push(INNINGS_PITCHED.to_string());
        columns
    }

    fn produces(&self) -> Vec<String> {
        owned(&[
            PITCHER_HITS_ALLOWED,
            PITCHER_ELIG_BF,
            WHIP,
            K_RATE_PITCHER,
            BB_RATE_PITCHER,
            BABIP_PITCHER,
            HR_RATE_PITCHER,
            BAA,
            K_BB_RATIO_PITCHER,
        ])
    }

    fn apply(&self, _log: &PitchLog, table: PlayerTable) -> Result<PlayerTable, StatsError> {
        let counts = RoleCounts::read(&table, Role::Pitcher, TOTAL_BF)?;
        let bf = table.values(TOTAL_BF)?;
        let innings = table.values(INNINGS_PITCHED)?;
        let hits = widen(&counts.hits);

        let whip = divide(&add(&counts.walk, &hits), &innings);

        table
            .with_counts(PITCHER_HITS_ALLOWED, counts.hits.clone())?
            .with_counts(PITCHER_ELIG_BF, counts.eligible.clone())?
            .with_rates(WHIP, whip)?
            .with_rates(K_RATE_PITCHER, divide(&counts.strikeout, &bf))?
            .with_rates(BB_RATE_PITCHER, divide(&counts.walk, &bf))?
            .with_rates(BABIP_PITCHER, counts.babip())?
            .with_rates(HR_RATE_PITCHER, divide(&counts.home_run, &bf))?
            .with_rates(BAA, divide(&hits, &bf))?
            .with_rates(K_BB_RATIO_PITCHER, divide(&counts.strikeout, &counts.walk))
    }
}

// ---------------------------------------------------------------------------
// Batted-ball rates
// ---------------------------------------------------------------------------

/// Pluralized name used for the batted-ball count and ratio columns.
pub fn plural(contact: &str) -> &'static str {
    match contact {
        "line_drive" => "line_drives",
        "fly_ball" => "fly_balls",
        "ground_ball" => "ground_balls",
        _ => "popups",
    }
}

fn eligible_column(role: Role) -> &'static str {
    match role {
        Role::Batter => ELIG_PA,
        Role::Pitcher => PITCHER_ELIG_BF,
    }
}

/// `{role}_{plural}` counts, their share of eligible appearances, and the
/// ground-ball/fly-ball and home-run/fly-ball ratios, per role.
///
/// GB/FB and HR/FB divide raw counts, not the share columns.
#[derive(Debug, Clone, Copy)]
pub struct BattedBallRates;

impl Stage for BattedBallRates {
    fn name(&self) -> &'static str {
        "batted_ball_rates"
    }

    fn requires(&self) -> Vec<String> {
        let mut columns = Vec::new();
        for role in Role::ALL {
            columns.extend(role_columns(role, CONTACT_TYPES));
            columns.push(role.column("home_run"));
            columns.push(eligible_column(role).to_string());
        }
        columns
    }

    fn produces(&self) -> Vec<String> {
        let mut columns = Vec::new();
        for role in Role::ALL {
            for contact in CONTACT_TYPES {
                columns.push(role.column(plural(contact)));
            }
            for contact in CONTACT_TYPES {
                columns.push(format!("{}_ratio_{}", plural(contact), role.prefix()));
            }
            columns.push(format!("gb_fb_ratio_{}", role.prefix()));
            columns.push(format!("hr_fb_pct_{}", role.prefix()));
        }
        columns
    }

    fn apply(&self, _log: &PitchLog, table: PlayerTable) -> Result<PlayerTable, StatsError> {
        let mut table = table;
        for role in Role::ALL {
            for contact in CONTACT_TYPES {
                let counts = table.counts(&role.column(contact))?.to_vec();
                table = table.with_counts(&role.column(plural(contact)), counts)?;
            }

            let eligible = table.values(eligible_column(role))?;
            for contact in CONTACT_TYPES {
                let counts = table.values(&role.column(plural(contact)))?;
                let name = format!("{}_ratio_{}", plural(contact), role.prefix());
                table = table.with_rates(&name, divide(&counts, &eligible))?;
            }

            let ground = table.values(&role.column("ground_balls"))?;
            let fly = table.values(&role.column("fly_balls"))?;
            let home_run = table.values(&role.column("home_run"))?;
            table = table
                .with_rates(&format!("gb_fb_ratio_{}", role.prefix()), divide(&ground, &fly))?
                .with_rates(&format!("hr_fb_pct_{}", role.prefix()), divide(&home_run, &fly))?;
        }
        Ok(table)
    }
}

// ---------------------------------------------------------------------------
// Defensive versatility
// ---------------------------------------------------------------------------

/// `positions_played`: positions with at least one appearance this season.
#[derive(Debug, Clone, Copy)]
pub struct DefensiveVersatility;

impl Stage for DefensiveVersatility {
    fn name(&self) -> &'static str {
        "defensive_versatility"
    }

    fn requires(&self) -> Vec<String> {
        FieldPosition::ALL.iter().map(|p| p.column()).collect()
    }

    fn produces(&self) -> Vec<String> {
        owned(&[POSITIONS_PLAYED])
    }

    fn apply(&self, _log: &PitchLog, table: PlayerTable) -> Result<PlayerTable, StatsError> {
        let mut played = vec![0i64; table.len()];
        for pos in FieldPosition::ALL {
            for (n, count) in played.iter_mut().zip(table.counts(&pos.column())?) {
                if *count > 0 {
                    *n += 1;
                }
            }
        }
        table.with_counts(POSITIONS_PLAYED, played)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
