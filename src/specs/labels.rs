// src/specs/labels.rs
//! Source statistic label -> canonical statistic name.
//!
//! The source has spelled the same statistic several ways over the years
//! (`OR` / `OREB` / `Offensive Rebounds` / `offensiveRebounds`). New spellings
//! go into the table (or into `extra_labels` in the run config); extraction
//! code never branches on a label.

use std::collections::{BTreeMap, HashMap};

/// `canonical => [source spellings]`. The source's own percentage columns are
/// dropped; normalization emits `FG%`, `3PT%` and `FT%` from the made-attempted
/// pairs instead.
const STANDARD: &[(&str, Option<&str>)] = label_rules! {
    "MIN"      => ["MIN", "Minutes", "minutes"],
    "FG"       => ["FG", "FGM-A", "Field Goals", "fieldGoalsMade-fieldGoalsAttempted"],
    "3PT"      => ["3PT", "3PM-A", "3-Pointers", "Three Pointers", "threePointFieldGoalsMade-threePointFieldGoalsAttempted"],
    "FT"       => ["FT", "FTM-A", "Free Throws", "freeThrowsMade-freeThrowsAttempted"],
    "OREB"     => ["OREB", "OR", "Offensive Rebounds", "offensiveRebounds"],
    "DREB"     => ["DREB", "DR", "Defensive Rebounds", "defensiveRebounds"],
    "REB"      => ["REB", "Rebounds", "totalRebounds", "rebounds"],
    "AST"      => ["AST", "Assists", "assists"],
    "STL"      => ["STL", "Steals", "steals"],
    "BLK"      => ["BLK", "Blocks", "blocks"],
    "TO"       => ["TO", "Turnovers", "turnovers"],
    "TTO"      => ["TTO", "Total Turnovers", "totalTurnovers"],
    "PF"       => ["PF", "Fouls", "Personal Fouls", "fouls"],
    "TECH"     => ["TECH", "Technical Fouls", "technicalFouls", "totalTechnicalFouls"],
    "FLAGRANT" => ["FLAGRANT", "Flagrant Fouls", "flagrantFouls"],
    "PTS"      => ["PTS", "Points", "points"],
    "TOPTS"    => ["Points Conceded Off Turnovers", "Points Off Turnovers", "turnoverPoints"],
    "FBPTS"    => ["Fast Break Points", "fastBreakPoints"],
    "PIP"      => ["Points in Paint", "pointsInPaint"],
    "LL"       => ["LL", "Largest Lead", "largestLead"],
    ;
    drop ["FG%", "3P%", "3PT%", "FT%", "Field Goal %", "Three Point %", "Free Throw %",
          "fieldGoalPct", "threePointFieldGoalPct", "freeThrowPct"]
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LabelMatch<'a> {
    Canonical(&'a str),
    /// Known label that is intentionally skipped.
    Dropped,
    /// Not in the table; callers keep it verbatim and flag it.
    Unmapped,
}

#[derive(Clone, Debug)]
pub struct StatLabels {
    map: HashMap<String, Option<String>>,
}

impl Default for StatLabels {
    fn default() -> Self {
        Self::standard()
    }
}

impl StatLabels {
    pub fn standard() -> Self {
        let map = STANDARD
            .iter()
            .map(|(src, canon)| (s!(*src), canon.map(String::from)))
            .collect();
        Self { map }
    }

    /// Add or override rules. An empty target drops the label.
    pub fn with_extra(mut self, extra: &BTreeMap<String, String>) -> Self {
        for (src, canon) in extra {
            let canon = canon.trim();
            let target = if canon.is_empty() { None } else { Some(s!(canon)) };
            self.map.insert(s!(src.trim()), target);
        }
        self
    }

    pub fn resolve(&self, label: &str) -> LabelMatch<'_> {
        let found = self.map.get(label).or_else(|| self.map.get(label.trim()));
        match found {
            Some(Some(canon)) => LabelMatch::Canonical(canon),
            Some(None) => LabelMatch::Dropped,
            None => LabelMatch::Unmapped,
        }
    }
}
