// tests/normalize.rs
mod common;

use std::collections::BTreeMap;

use serde_json::{json, Value};

use cbb_scrape::data::{DataQualityWarning, Partition, RecordFamily, StatValue};
use cbb_scrape::error::NormalizationError;
use cbb_scrape::specs::{normalize, StatLabels};

fn labels() -> StatLabels {
    StatLabels::standard()
}

fn full() -> Value {
    serde_json::from_str(common::full_summary()).unwrap()
}

fn run(v: &Value) -> Result<cbb_scrape::data::ContestRecords, NormalizationError> {
    normalize(Partition::Mens, 2023, v.to_string().as_bytes(), &labels())
}

#[test]
fn full_fixture_yields_every_family() {
    let r = normalize(Partition::Mens, 2023, common::full_summary().as_bytes(), &labels()).unwrap();

    assert_eq!(r.contest.id, "401480248");
    assert_eq!(r.contest.participants[0].entity_id, "150");
    assert_eq!(r.contest.participants[1].entity_id, "2483");
    assert_eq!(r.player_stats.len(), 22);
    assert_eq!(r.team_stats.len(), 2);
    assert_eq!(r.plays.len(), 300);
    assert_eq!(r.officials.len(), 3);
    assert!(r.missing_families().is_empty());
    assert!(r.warnings.is_empty(), "{:?}", r.warnings);

    let first = &r.player_stats[0];
    assert_eq!(first.stats["3PT"], StatValue::MadeAttempted { made: 1, attempted: 3 });
    assert_eq!(first.stats["3PT"].pct(), Some(33.3));
}

#[test]
fn absent_attendance_is_unknown_not_zero() {
    let mut v = full();
    v["gameInfo"].as_object_mut().unwrap().remove("attendance");
    let r = run(&v).unwrap();
    assert_eq!(r.contest.attendance, None);

    v["gameInfo"]["attendance"] = json!(0);
    assert_eq!(run(&v).unwrap().contest.attendance, Some(0));
}

#[test]
fn one_sided_contest_is_rejected() {
    let mut v = full();
    v["header"]["competitions"][0]["competitors"].as_array_mut().unwrap().pop();
    v.as_object_mut().unwrap().remove("boxscore");
    assert_eq!(run(&v).unwrap_err(), NormalizationError::ParticipantCount { found: 1 });
}

#[test]
fn missing_contest_id_is_rejected() {
    let mut v = full();
    v["header"].as_object_mut().unwrap().remove("id");
    v["header"]["competitions"][0].as_object_mut().unwrap().remove("id");
    assert_eq!(run(&v).unwrap_err(), NormalizationError::MissingContestId);
}

#[test]
fn garbage_is_a_normalization_error() {
    assert!(matches!(
        normalize(Partition::Womens, 2010, b"<html>", &labels()),
        Err(NormalizationError::InvalidJson(_))
    ));
    assert_eq!(normalize(Partition::Womens, 2010, b"[1,2]", &labels()).unwrap_err(), NormalizationError::NotAnObject);
}

#[test]
fn sequence_is_dense_and_increasing() {
    let r = run(&full()).unwrap();
    for (i, p) in r.plays.iter().enumerate() {
        assert_eq!(p.sequence as usize, i + 1);
    }
    let last = r.plays.last().unwrap();
    assert_eq!(last.source_sequence.as_deref(), Some("1000"));
    assert!(last.home_win_pct.is_some());
}

#[test]
fn out_of_order_source_sequence_warns_but_keeps_order() {
    let mut v = full();
    let plays = v["plays"].as_array_mut().unwrap();
    plays.swap(10, 11);
    let swapped_id = plays[10]["id"].clone();

    let r = run(&v).unwrap();
    assert_eq!(r.plays[10].play_id.as_deref(), swapped_id.as_str());
    assert_eq!(r.plays[10].sequence, 11);
    assert!(r.warnings.iter().any(|w| matches!(w, DataQualityWarning::NonMonotonicSequence { .. })));
}

#[test]
fn early_era_payload_is_partial_not_failed() {
    let mut v = full();
    let o = v.as_object_mut().unwrap();
    o.remove("plays");
    o.remove("winprobability");
    v["gameInfo"].as_object_mut().unwrap().remove("officials");

    let r = run(&v).unwrap();
    assert_eq!(r.missing_families(), vec![RecordFamily::Plays, RecordFamily::Officials]);
    assert_eq!(r.player_stats.len(), 22);
}

#[test]
fn renormalizing_is_deterministic() {
    let raw = common::full_summary().as_bytes();
    let a = normalize(Partition::Mens, 2023, raw, &labels()).unwrap();
    let b = normalize(Partition::Mens, 2023, raw, &labels()).unwrap();
    assert_eq!(a, b);
}

#[test]
fn new_label_spellings_are_configuration() {
    let mut v = full();
    v["boxscore"]["players"][0]["statistics"][0]["names"][12] = json!("Points Scored");

    let r = run(&v).unwrap();
    assert!(r.player_stats[0].stats.contains_key("Points Scored"));
    assert!(r.warnings.contains(&DataQualityWarning::UnmappedLabel { label: "Points Scored".into() }));

    let mut extra = BTreeMap::new();
    extra.insert("Points Scored".to_string(), "PTS".to_string());
    let with = StatLabels::standard().with_extra(&extra);
    let r = normalize(Partition::Mens, 2023, v.to_string().as_bytes(), &with).unwrap();
    assert_eq!(r.player_stats[0].stats["PTS"], StatValue::Count { value: 11 });
    assert!(r.warnings.is_empty());
}

#[test]
fn shooting_percentages_come_from_made_attempted_pairs() {
    let r = normalize(Partition::Mens, 2023, common::full_summary().as_bytes(), &labels()).unwrap();
    let first = &r.player_stats[0].stats;
    assert_eq!(first["3PT%"], StatValue::Number { value: 33.3 });
    assert_eq!(first["FG%"], StatValue::Number { value: 44.4 });
    assert_eq!(first["FT%"], StatValue::Number { value: 100.0 });

    // the source's own FG% column is ignored in favour of 25-70
    let away = &r.team_stats[1].stats;
    assert_eq!(away["FG%"], StatValue::Number { value: 35.7 });
    assert_eq!(away["3PT%"], StatValue::Number { value: 24.0 });

    let mut v = full();
    v["boxscore"]["players"][0]["statistics"][0]["athletes"][0]["stats"][3] = json!("0-0");
    let r = run(&v).unwrap();
    let first = &r.player_stats[0].stats;
    assert_eq!(first["FT"], StatValue::MadeAttempted { made: 0, attempted: 0 });
    assert_eq!(first["FT%"], StatValue::Unknown, "0 of 0 is not 0%");
}
