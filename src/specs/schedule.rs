// src/specs/schedule.rs
//! Reading *spec* for one organisation's season schedule.
//!
//! Schedules are the only place contest ids are discovered. Each `events[]`
//! entry becomes a [`ScheduleEntry`] seen from the owning entity's side.

use serde_json::Value;

use crate::core::json::{array_at, bool_at, first_at, parse_object, str_at};
use crate::data::{Partition, ScheduleEntry, Season, Side};
use crate::error::NormalizationError;

/// Entries for `entity_id`. A payload without `events` is an empty schedule.
pub fn parse_schedule(
    partition: Partition,
    season: Season,
    entity_id: &str,
    raw: &[u8],
) -> Result<Vec<ScheduleEntry>, NormalizationError> {
    let v = parse_object(raw)?;
    let Some(events) = array_at(&v, path!["events"]) else {
        return Ok(Vec::new());
    };
    Ok(events
        .iter()
        .filter_map(|ev| entry_from(ev, partition, season, entity_id))
        .collect())
}

fn entry_from(ev: &Value, partition: Partition, season: Season, entity_id: &str) -> Option<ScheduleEntry> {
    let contest_id = str_at(ev, path!["id"])?;
    let competitors = array_at(ev, path!["competitions", [0], "competitors"]);

    let (mine, theirs) = match competitors {
        Some(list) => {
            let mine = list.iter().find(|c| str_at(c, path!["id"]).as_deref() == Some(entity_id));
            let theirs = list.iter().find(|c| str_at(c, path!["id"]).as_deref() != Some(entity_id));
            (mine, theirs)
        }
        None => (None, None),
    };

    Some(ScheduleEntry {
        contest_id,
        entity_id: s!(entity_id),
        partition,
        season,
        date: str_at(ev, path!["date"]),
        name: str_at(ev, path!["name"]),
        opponent_id: theirs.and_then(|c| str_at(c, path!["id"])),
        opponent_name: theirs.and_then(|c| {
            first_at(c, &[path!["team", "displayName"], path!["team", "name"]]).and_then(crate::core::json::as_string)
        }),
        side: mine
            .and_then(|c| str_at(c, path!["homeAway"]))
            .map(|s| Side::parse(&s))
            .unwrap_or_default(),
        neutral_site: bool_at(ev, path!["competitions", [0], "neutralSite"])
            .or_else(|| bool_at(ev, path!["neutralSite"])),
        conference_game: bool_at(ev, path!["competitions", [0], "conferenceCompetition"]),
        completed: bool_at(ev, path!["competitions", [0], "status", "type", "completed"])
            .or_else(|| bool_at(ev, path!["status", "type", "completed"])),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCHED: &str = r##"{
      "team": {"id": "52"},
      "events": [
        {"id": "401", "date": "2019-11-05T23:00Z", "name": "Florida St at Pittsburgh",
         "competitions": [{"neutralSite": false, "conferenceCompetition": true,
           "status": {"type": {"completed": true}},
           "competitors": [
             {"id": "221", "homeAway": "home", "team": {"displayName": "Pittsburgh Panthers"}},
             {"id": "52", "homeAway": "away", "team": {"displayName": "Florida State Seminoles"}}
           ]}]},
        {"date": "2019-11-09T20:00Z"},
        {"id": 402, "competitions": [{"competitors": [{"id": "52", "homeAway": "home"}]}]}
      ]
    }"##;

    #[test]
    fn reads_entries_from_owner_side() {
        let rows = parse_schedule(Partition::Mens, 2020, "52", SCHED.as_bytes()).unwrap();
        assert_eq!(rows.len(), 2, "event without id is skipped");

        let a = &rows[0];
        assert_eq!(a.contest_id, "401");
        assert_eq!(a.side, Side::Away);
        assert_eq!(a.opponent_id.as_deref(), Some("221"));
        assert_eq!(a.opponent_name.as_deref(), Some("Pittsburgh Panthers"));
        assert_eq!(a.conference_game, Some(true));
        assert_eq!(a.completed, Some(true));

        let b = &rows[1];
        assert_eq!(b.contest_id, "402");
        assert_eq!(b.opponent_id, None);
        assert_eq!(b.completed, None);
    }

    #[test]
    fn missing_events_is_empty() {
        assert!(parse_schedule(Partition::Womens, 2020, "1", br#"{"team":{}}"#).unwrap().is_empty());
        assert!(parse_schedule(Partition::Womens, 2020, "1", b"[]").is_err());
    }

    #[test]
    fn repeated_ids_stay_as_rows() {
        // dedup belongs to discovery; the reader reports what the source lists
        let raw = br#"{"events":[{"id":"101"},{"id":"102"},{"id":"101"}]}"#;
        let rows = parse_schedule(Partition::Mens, 2020, "9", raw).unwrap();
        let ids: Vec<&str> = rows.iter().map(|r| r.contest_id.as_str()).collect();
        assert_eq!(ids, vec!["101", "102", "101"]);
    }
}
