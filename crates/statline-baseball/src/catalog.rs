// Fixed vocabularies: roles, fielding positions, pitch results and the
// enumerated event lists every tally is driven from.

use std::fmt;

use crate::events::PitchEvent;

// ---------------------------------------------------------------------------
// Roles
// ---------------------------------------------------------------------------

/// The side of a pitch a player is counted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Batter,
    Pitcher,
}

impl Role {
    pub const ALL: [Role; 2] = [Role::Batter, Role::Pitcher];

    /// Column-name prefix for counts attributed to this role.
    pub fn prefix(&self) -> &'static str {
        match self {
            Role::Batter => "batter",
            Role::Pitcher => "pitcher",
        }
    }

    /// The player on this side of the pitch.
    pub fn player_of(&self, event: &PitchEvent) -> u32 {
        match self {
            Role::Batter => event.batter,
            Role::Pitcher => event.pitcher,
        }
    }

    /// `{role}_{suffix}`, the naming scheme for every per-role column.
    pub fn column(&self, suffix: &str) -> String {
        format!("{}_{}", self.prefix(), suffix)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.prefix())
    }
}

// ---------------------------------------------------------------------------
// Fielding positions
// ---------------------------------------------------------------------------

/// The nine defensive positions, in scorebook order.
///
/// The declaration order is also the tie-break order for primary position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FieldPosition {
    Pitcher,
    Catcher,
    FirstBase,
    SecondBase,
    ThirdBase,
    ShortStop,
    LeftField,
    CenterField,
    RightField,
}

/// Label written for players who never appeared in the field.
pub const UNKNOWN_POSITION: &str = "unknown";

impl FieldPosition {
    pub const ALL: [FieldPosition; 9] = [
        FieldPosition::Pitcher,
        FieldPosition::Catcher,
        FieldPosition::FirstBase,
        FieldPosition::SecondBase,
        FieldPosition::ThirdBase,
        FieldPosition::ShortStop,
        FieldPosition::LeftField,
        FieldPosition::CenterField,
        FieldPosition::RightField,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            FieldPosition::Pitcher => "p",
            FieldPosition::Catcher => "c",
            FieldPosition::FirstBase => "1b",
            FieldPosition::SecondBase => "2b",
            FieldPosition::ThirdBase => "3b",
            FieldPosition::ShortStop => "ss",
            FieldPosition::LeftField => "lf",
            FieldPosition::CenterField => "cf",
            FieldPosition::RightField => "rf",
        }
    }

    /// Appearance-count column, e.g. `field_ss`.
    pub fn column(&self) -> String {
        format!("field_{}", self.label())
    }

    /// Index into [`PitchEvent::fielders`].
    pub fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for FieldPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

// ---------------------------------------------------------------------------
// Pitch results
// ---------------------------------------------------------------------------

/// Statcast `type` column: strike, ball or ball put in play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PitchResult {
    Strike,
    Ball,
    InPlay,
}

impl PitchResult {
    pub const ALL: [PitchResult; 3] = [PitchResult::Strike, PitchResult::Ball, PitchResult::InPlay];

    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_uppercase().as_str() {
            "S" => Some(PitchResult::Strike),
            "B" => Some(PitchResult::Ball),
            "X" => Some(PitchResult::InPlay),
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            PitchResult::Strike => "S",
            PitchResult::Ball => "B",
            PitchResult::InPlay => "X",
        }
    }

    /// Suffix of the per-role count column (`batter_strikes`, ...).
    pub fn count_suffix(&self) -> &'static str {
        match self {
            PitchResult::Strike => "strikes",
            PitchResult::Ball => "balls",
            PitchResult::InPlay => "inplay",
        }
    }

    /// Prefix of the per-role ratio column (`strike_ratio_batter`, ...).
    pub fn ratio_prefix(&self) -> &'static str {
        match self {
            PitchResult::Strike => "strike",
            PitchResult::Ball => "ball",
            PitchResult::InPlay => "inplay",
        }
    }
}

// ---------------------------------------------------------------------------
// Event vocabularies
// ---------------------------------------------------------------------------

/// Every non-empty value of the `events` column.
pub const PLAY_EVENTS: &[&str] = &[
    "strikeout",
    "caught_stealing_3b",
    "field_out",
    "walk",
    "force_out",
    "sac_fly",
    "single",
    "hit_by_pitch",
    "double",
    "grounded_into_double_play",
    "sac_bunt",
    "home_run",
    "fielders_choice",
    "field_error",
    "other_out",
    "caught_stealing_2b",
    "triple",
    "strikeout_double_play",
    "fielders_choice_out",
    "double_play",
    "sac_fly_double_play",
    "catcher_interf",
    "pickoff_caught_stealing_2b",
    "pickoff_2b",
    "pickoff_caught_stealing_3b",
    "triple_play",
    "pickoff_1b",
    "sac_bunt_double_play",
    "wild_pitch",
    "game_advisory",
    "caught_stealing_home",
    "pickoff_3b",
    "stolen_base_2b",
    "passed_ball",
    "pickoff_caught_stealing_home",
    "pickoff_error_3b",
    "stolen_base_3b",
];

/// Values of the `bb_type` column.
pub const CONTACT_TYPES: &[&str] = &["line_drive", "fly_ball", "ground_ball", "popup"];

/// Baserunning outs that can end a half-inning without closing the batter's
/// plate appearance.
pub const BASEPATH_OUTS: &[&str] = &[
    "caught_stealing_3b",
    "caught_stealing_2b",
    "pickoff_caught_stealing_2b",
    "pickoff_2b",
    "pickoff_caught_stealing_3b",
    "pickoff_1b",
    "caught_stealing_home",
    "pickoff_3b",
    "pickoff_caught_stealing_home",
];

/// Terminal events credited as one out recorded by the pitcher.
pub const OUT_EVENTS: &[&str] = &[
    "strikeout",
    "field_out",
    "force_out",
    "double_play",
    "triple_play",
    "grounded_into_double_play",
    "sac_bunt",
    "strikeout_double_play",
    "sac_bunt_double_play",
    "other_out",
];

/// Pitch types averaged for fastball velocity.
pub const FASTBALL_TYPES: &[&str] = &["FF", "FC", "FT"];

/// Outs on the board at which a basepath out ends the half-inning.
pub const INNING_ENDING_OUTS: u8 = 2;

/// Statcast zones 1-9 are inside the strike zone.
pub const STRIKE_ZONE_MAX: u8 = 9;

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn play_events_are_unique() {
        let set: HashSet<_> = PLAY_EVENTS.iter().collect();
        assert_eq!(set.len(), PLAY_EVENTS.len());
        assert_eq!(PLAY_EVENTS.len(), 37);
    }

    #[test]
    fn basepath_and_out_events_are_play_events() {
        for e in BASEPATH_OUTS.iter().chain(OUT_EVENTS) {
            assert!(PLAY_EVENTS.contains(e), "{e} missing from PLAY_EVENTS");
        }
    }

    #[test]
    fn field_positions_follow_declaration_order() {
        for (i, pos) in FieldPosition::ALL.iter().enumerate() {
            assert_eq!(pos.index(), i);
        }
        assert_eq!(FieldPosition::Catcher.column(), "field_c");
        assert_eq!(FieldPosition::RightField.column(), "field_rf");
    }

    #[test]
    fn pitch_result_codes() {
        assert_eq!(PitchResult::from_code("S"), Some(PitchResult::Strike));
        assert_eq!(PitchResult::from_code(" b "), Some(PitchResult::Ball));
        assert_eq!(PitchResult::from_code("X"), Some(PitchResult::InPlay));
        assert_eq!(PitchResult::from_code("Z"), None);
    }

    #[test]
    fn role_columns() {
        assert_eq!(Role::Batter.column("walk"), "batter_walk");
        assert_eq!(Role::Pitcher.column("fly_ball"), "pitcher_fly_ball");
    }
}
