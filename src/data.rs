// src/data.rs
//! Canonical record shapes.
//!
//! Everything downstream (sinks, reports, consumers) sees only these types.
//! Optional source fields are `Option`s: `None` means *unknown*, which is
//! never the same thing as zero.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One of the two independent data universes. Ids never cross partitions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Partition {
    Mens,
    Womens,
}

impl Partition {
    pub const ALL: [Partition; 2] = [Partition::Mens, Partition::Womens];

    pub fn as_str(&self) -> &'static str {
        match self {
            Partition::Mens => "mens",
            Partition::Womens => "womens",
        }
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Partition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mens" | "men" | "m" => Ok(Partition::Mens),
            "womens" | "women" | "w" => Ok(Partition::Womens),
            other => Err(format!("unknown partition: {other}")),
        }
    }
}

/// A season, keyed by the calendar year it ends in.
pub type Season = u16;

/* ---------------- Discovery records ---------------- */

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    pub partition: Option<Partition>,
    pub display_name: Option<String>,
    pub short_name: Option<String>,
    pub abbreviation: Option<String>,
    pub location: Option<String>,
    pub nickname: Option<String>,
    pub slug: Option<String>,
    pub color: Option<String>,
    pub alternate_color: Option<String>,
    pub conference_id: Option<String>,
    pub is_active: Option<bool>,
    pub logo: Option<String>,
    /// First/last season the entity belongs to this partition, when known.
    pub seasons: Option<(Season, Season)>,
}

impl Entity {
    /// Whether schedules should be requested for `season`.
    pub fn active_in(&self, season: Season) -> bool {
        match self.seasons {
            Some((first, last)) => first <= season && season <= last,
            None => true,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Home,
    Away,
    #[default]
    Unknown,
}

impl Side {
    pub fn parse(raw: &str) -> Side {
        match raw.trim().to_ascii_lowercase().as_str() {
            "home" => Side::Home,
            "away" => Side::Away,
            _ => Side::Unknown,
        }
    }
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Home => "home",
            Side::Away => "away",
            Side::Unknown => "unknown",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub contest_id: String,
    pub entity_id: String,
    pub partition: Partition,
    pub season: Season,
    pub date: Option<String>,
    pub name: Option<String>,
    pub opponent_id: Option<String>,
    pub opponent_name: Option<String>,
    pub side: Side,
    pub neutral_site: Option<bool>,
    pub conference_game: Option<bool>,
    pub completed: Option<bool>,
}

/// A contest id found in one or more schedules.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContestRef {
    pub id: String,
    pub partition: Partition,
    pub season: Season,
    /// Entities whose schedules listed this contest. Empty for filter-supplied ids.
    pub listed_by: Vec<String>,
}

/* ---------------- Contest records ---------------- */

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ContestStatus {
    pub name: Option<String>,
    pub state: Option<String>,
    pub completed: Option<bool>,
    pub description: Option<String>,
    pub detail: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Venue {
    pub name: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub entity_id: String,
    /// True when the payload carried no id and `entity_id` was synthesized.
    pub placeholder: bool,
    pub side: Side,
    pub display_name: Option<String>,
    pub abbreviation: Option<String>,
    pub location: Option<String>,
    pub nickname: Option<String>,
    pub score: Option<i64>,
    pub winner: Option<bool>,
    pub linescores: Vec<Option<i64>>,
    pub record: Option<String>,
    pub conference_id: Option<String>,
    pub division: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Contest {
    pub id: String,
    pub partition: Partition,
    pub season: Season,
    pub date: Option<String>,
    pub status: ContestStatus,
    pub venue: Venue,
    pub attendance: Option<u64>,
    pub neutral_site: Option<bool>,
    pub conference_game: Option<bool>,
    pub conference: Option<String>,
    pub broadcasts: Vec<String>,
    pub boxscore_source: Option<String>,
    pub play_by_play_source: Option<String>,
    pub participants: [Participant; 2],
}

/// A single statistic. `Unknown` is an explicit absence, distinct from zero.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StatValue {
    Count { value: i64 },
    Number { value: f64 },
    MadeAttempted { made: i64, attempted: i64 },
    Text { value: String },
    Unknown,
}

impl StatValue {
    /// Shooting percentage (0..=100, one decimal) for made-attempted pairs.
    /// `None` when nothing was attempted: 0/0 is not 0%.
    pub fn pct(&self) -> Option<f64> {
        match self {
            StatValue::MadeAttempted { made, attempted } if *attempted > 0 => {
                Some((*made as f64 / *attempted as f64 * 1000.0).round() / 10.0)
            }
            _ => None,
        }
    }
}

pub type StatLine = BTreeMap<String, StatValue>;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlayerStat {
    pub contest_id: String,
    pub participant_id: String,
    pub player_id: Option<String>,
    pub name: Option<String>,
    pub jersey: Option<String>,
    pub position: Option<String>,
    pub starter: Option<bool>,
    pub did_not_play: Option<bool>,
    pub stats: StatLine,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TeamStat {
    pub contest_id: String,
    pub participant_id: String,
    pub side: Side,
    pub stats: StatLine,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlayAthlete {
    pub athlete_id: Option<String>,
    pub name: Option<String>,
    pub role: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlayEvent {
    pub contest_id: String,
    /// 1-based position in source order. Strictly increasing, no gaps.
    pub sequence: u32,
    /// The source's own sequence field, verbatim.
    pub source_sequence: Option<String>,
    pub play_id: Option<String>,
    pub period: Option<u32>,
    pub period_display: Option<String>,
    pub clock: Option<String>,
    pub clock_seconds: Option<u32>,
    pub description: Option<String>,
    pub play_type: Option<String>,
    pub play_type_id: Option<String>,
    pub participant_id: Option<String>,
    pub home_score: Option<i64>,
    pub away_score: Option<i64>,
    pub scoring_play: Option<bool>,
    pub score_value: Option<i64>,
    pub shooting_play: Option<bool>,
    pub coordinate: Option<(f64, f64)>,
    pub wallclock: Option<String>,
    pub home_win_pct: Option<f64>,
    pub tie_pct: Option<f64>,
    pub athletes: Vec<PlayAthlete>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OfficialAssignment {
    pub contest_id: String,
    pub name: String,
    pub role: Option<String>,
    pub order: Option<u32>,
}

/// Record families a contest can be partially missing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordFamily {
    PlayerStats,
    TeamStats,
    Plays,
    Officials,
}

/// Non-fatal observations made while normalizing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataQualityWarning {
    /// The source sequence field went backwards or repeated; order was kept.
    NonMonotonicSequence { at: u32, previous: String, found: String },
    /// A stats row had a different length than its label row.
    StatArityMismatch { player_id: Option<String>, labels: usize, values: usize },
    /// A label missing from the label table was kept verbatim.
    UnmappedLabel { label: String },
    /// The officials block was present but not a list of objects.
    MalformedOfficials,
    /// A participant had no id; a placeholder was used.
    PlaceholderParticipant { side: Side },
}

/// Everything normalization produces for one contest.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContestRecords {
    pub contest: Contest,
    pub player_stats: Vec<PlayerStat>,
    pub team_stats: Vec<TeamStat>,
    pub plays: Vec<PlayEvent>,
    pub officials: Vec<OfficialAssignment>,
    pub warnings: Vec<DataQualityWarning>,
}

impl ContestRecords {
    /// Optional families that came out empty.
    pub fn missing_families(&self) -> Vec<RecordFamily> {
        let mut out = Vec::new();
        if self.player_stats.is_empty() { out.push(RecordFamily::PlayerStats); }
        if self.team_stats.is_empty() { out.push(RecordFamily::TeamStats); }
        if self.plays.is_empty() { out.push(RecordFamily::Plays); }
        if self.officials.is_empty() { out.push(RecordFamily::Officials); }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partition_parses_loose_spellings() {
        assert_eq!("Mens".parse::<Partition>().unwrap(), Partition::Mens);
        assert_eq!(" women ".parse::<Partition>().unwrap(), Partition::Womens);
        assert!("coed".parse::<Partition>().is_err());
    }

    #[test]
    fn pct_is_unknown_for_zero_attempts() {
        let none = StatValue::MadeAttempted { made: 0, attempted: 0 };
        assert_eq!(none.pct(), None);
        let some = StatValue::MadeAttempted { made: 4, attempted: 12 };
        assert_eq!(some.pct(), Some(33.3));
    }

    #[test]
    fn entity_season_window() {
        let e = Entity { id: s!("42"), seasons: Some((2003, 2006)), ..Default::default() };
        assert!(e.active_in(2003));
        assert!(e.active_in(2006));
        assert!(!e.active_in(2007));
        assert!(Entity::default().active_in(1990));
    }
}
