// src/specs/game.rs
//! Reading *spec* for one contest summary payload: the Normalization Layer.
//!
//! Purpose:
//! - Map a raw summary payload onto [`ContestRecords`]: contest metadata,
//!   two participants, player and team box scores, the play log and the
//!   officials.
//!
//! Where the ground truth lives:
//! - `header.competitions[0]`: date, status, competitors, broadcasts,
//!   conference groups, neutral-site flag, data-source markers.
//! - `gameInfo`: venue, attendance, officials.
//! - `boxscore.players[].statistics[]`: label row plus one value row per athlete.
//! - `boxscore.teams[].statistics[]`: one `{abbreviation|label|name, displayValue}` per stat.
//! - `plays[]` and `winprobability[]` (joined on play id).
//!
//! Policy:
//! - Pure path lookup. Every optional field is an `Option`; absence is never zero.
//! - A contest without an id, or without exactly two resolvable sides, is an
//!   error. Nothing one-sided is ever emitted.
//! - Play order is source order. A source sequence number that goes backwards
//!   is a warning, not a reason to reorder.
//!
//! TL;DR: bytes in, records or a `NormalizationError` out. No I/O.

use std::collections::{BTreeSet, HashMap};

use serde_json::Value;
use tracing::debug;

use super::labels::{LabelMatch, StatLabels};
use crate::core::json::{array_at, as_i64, as_string, at, bool_at, f64_at, first_at, first_str, i64_at, parse_object, str_at};
use crate::core::sanitize::{clock_seconds, parse_stat_value};
use crate::data::*;
use crate::error::NormalizationError;

pub fn normalize(
    partition: Partition,
    season: Season,
    raw: &[u8],
    labels: &StatLabels,
) -> Result<ContestRecords, NormalizationError> {
    let v = parse_object(raw)?;
    let contest_id = first_str(
        &v,
        &[path!["header", "id"], path!["header", "competitions", [0], "id"]],
    )
    .ok_or(NormalizationError::MissingContestId)?;

    let mut ctx = Ctx { contest_id: contest_id.clone(), labels, warnings: Vec::new(), unmapped: BTreeSet::new() };

    let comp = at(&v, path!["header", "competitions", [0]]);
    let participants = read_participants(&v, comp, &mut ctx)?;

    let contest = read_contest(&v, comp, contest_id, partition, season, participants);
    let player_stats = read_player_stats(&v, &contest, &mut ctx);
    let team_stats = read_team_stats(&v, &contest, &mut ctx);
    let plays = read_plays(&v, &mut ctx);
    let officials = read_officials(&v, &mut ctx);

    let mut warnings = ctx.warnings;
    warnings.extend(ctx.unmapped.into_iter().map(|label| DataQualityWarning::UnmappedLabel { label }));
    debug!(
        contest = %contest.id,
        players = player_stats.len(),
        plays = plays.len(),
        warnings = warnings.len(),
        "normalized"
    );

    Ok(ContestRecords { contest, player_stats, team_stats, plays, officials, warnings })
}

struct Ctx<'a> {
    contest_id: String,
    labels: &'a StatLabels,
    warnings: Vec<DataQualityWarning>,
    unmapped: BTreeSet<String>,
}

impl Ctx<'_> {
    /// Resolve `label` and store `value` under its canonical name. First
    /// value for a canonical name wins. A canonical made-attempted pair also
    /// gets its percentage under `<name>%`, unknown when nothing was attempted.
    fn put_stat(&mut self, line: &mut StatLine, label: &str, value: StatValue) {
        let (key, canonical) = match self.labels.resolve(label) {
            LabelMatch::Canonical(c) => (s!(c), true),
            LabelMatch::Dropped => return,
            LabelMatch::Unmapped => {
                let l = s!(label.trim());
                self.unmapped.insert(l.clone());
                (l, false)
            }
        };
        if key.is_empty() {
            return;
        }
        if canonical && matches!(value, StatValue::MadeAttempted { .. }) {
            let pct = match value.pct() {
                Some(value) => StatValue::Number { value },
                None => StatValue::Unknown,
            };
            line.entry(format!("{key}%")).or_insert(pct);
        }
        line.entry(key).or_insert(value);
    }
}

/* ---------------- Participants ---------------- */

fn read_participants(v: &Value, comp: Option<&Value>, ctx: &mut Ctx) -> Result<[Participant; 2], NormalizationError> {
    // Older payloads occasionally lack header competitors but carry box-score teams.
    let list = comp
        .and_then(|c| array_at(c, path!["competitors"]))
        .filter(|l| !l.is_empty())
        .or_else(|| array_at(v, path!["boxscore", "teams"]));

    let list = match list {
        Some(l) if l.len() == 2 => l,
        Some(l) => return Err(NormalizationError::ParticipantCount { found: l.len() }),
        None => return Err(NormalizationError::ParticipantCount { found: 0 }),
    };

    let mut out = Vec::with_capacity(2);
    for (index, c) in list.iter().enumerate() {
        out.push(read_participant(c, index, ctx)?);
    }
    <[Participant; 2]>::try_from(out).map_err(|o| NormalizationError::ParticipantCount { found: o.len() })
}

fn read_participant(c: &Value, index: usize, ctx: &mut Ctx) -> Result<Participant, NormalizationError> {
    if !c.is_object() {
        return Err(NormalizationError::UnresolvableParticipant { index });
    }
    let side = str_at(c, path!["homeAway"]).map(|s| Side::parse(&s)).unwrap_or_default();
    let display_name = first_str(c, &[path!["team", "displayName"], path!["team", "name"], path!["team", "location"]]);

    let (entity_id, placeholder) = match first_str(c, &[path!["id"], path!["team", "id"]]) {
        Some(id) => (id, false),
        None if display_name.is_some() => {
            let tag = match side {
                Side::Unknown => index.to_string(),
                known => s!(known.as_str()),
            };
            ctx.warnings.push(DataQualityWarning::PlaceholderParticipant { side });
            (format!("unresolved:{}:{tag}", ctx.contest_id), true)
        }
        None => return Err(NormalizationError::UnresolvableParticipant { index }),
    };

    let linescores = array_at(c, path!["linescores"])
        .map(|ls| {
            ls.iter()
                .map(|l| first_at(l, &[path!["displayValue"], path!["value"]]).and_then(as_i64))
                .collect()
        })
        .unwrap_or_default();

    Ok(Participant {
        entity_id,
        placeholder,
        side,
        display_name,
        abbreviation: str_at(c, path!["team", "abbreviation"]),
        location: str_at(c, path!["team", "location"]),
        nickname: str_at(c, path!["team", "name"]),
        score: i64_at(c, path!["score"]),
        winner: bool_at(c, path!["winner"]),
        linescores,
        record: read_record(c),
        conference_id: first_str(c, &[path!["team", "groups", "id"], path!["team", "conferenceId"]]),
        division: str_at(c, path!["team", "groups", "parent", "name"]),
    })
}

/// Overall record summary, e.g. `"20-5"`.
fn read_record(c: &Value) -> Option<String> {
    let records = array_at(c, path!["record"])?;
    records
        .iter()
        .find(|r| matches!(str_at(r, path!["type"]).as_deref(), Some("total")))
        .or_else(|| records.first())
        .and_then(|r| first_str(r, &[path!["summary"], path!["displayValue"]]))
}

/* ---------------- Contest ---------------- */

fn read_contest(
    v: &Value,
    comp: Option<&Value>,
    id: String,
    partition: Partition,
    season: Season,
    participants: [Participant; 2],
) -> Contest {
    let null = Value::Null;
    let comp = comp.unwrap_or(&null);

    let status = ContestStatus {
        name: str_at(comp, path!["status", "type", "name"]),
        state: str_at(comp, path!["status", "type", "state"]),
        completed: bool_at(comp, path!["status", "type", "completed"]),
        description: str_at(comp, path!["status", "type", "description"]),
        detail: first_str(comp, &[path!["status", "type", "detail"], path!["status", "type", "shortDetail"]]),
    };

    let venue = Venue {
        name: first_str(v, &[path!["gameInfo", "venue", "fullName"], path!["gameInfo", "venue", "name"]]),
        city: str_at(v, path!["gameInfo", "venue", "address", "city"]),
        state: str_at(v, path!["gameInfo", "venue", "address", "state"]),
    };

    let attendance = first_at(v, &[path!["gameInfo", "attendance"], path!["header", "competitions", [0], "attendance"]])
        .and_then(as_i64)
        .and_then(|a| u64::try_from(a).ok());

    let broadcasts = array_at(comp, path!["broadcasts"])
        .map(|list| {
            list.iter()
                .filter_map(|b| first_str(b, &[path!["media", "shortName"], path!["names", [0]], path!["media", "name"]]))
                .collect()
        })
        .unwrap_or_default();

    Contest {
        id,
        partition,
        season,
        date: str_at(comp, path!["date"]),
        status,
        venue,
        attendance,
        neutral_site: bool_at(comp, path!["neutralSite"]),
        conference_game: bool_at(comp, path!["conferenceCompetition"]),
        conference: first_str(comp, &[path!["groups", "name"], path!["groups", "shortName"]]),
        broadcasts,
        boxscore_source: str_at(comp, path!["boxscoreSource"]),
        play_by_play_source: str_at(comp, path!["playByPlaySource"]),
        participants,
    }
}

/// Box-score blocks name their team by id; map it onto a participant.
fn participant_for(contest: &Contest, team_id: Option<&str>, index: usize) -> (String, Side) {
    if let Some(id) = team_id {
        if let Some(p) = contest.participants.iter().find(|p| p.entity_id == id) {
            return (p.entity_id.clone(), p.side);
        }
        return (s!(id), Side::Unknown);
    }
    match contest.participants.get(index) {
        Some(p) => (p.entity_id.clone(), p.side),
        None => (format!("unresolved:{}:{index}", contest.id), Side::Unknown),
    }
}

/* ---------------- Box scores ---------------- */

fn read_player_stats(v: &Value, contest: &Contest, ctx: &mut Ctx) -> Vec<PlayerStat> {
    let Some(blocks) = array_at(v, path!["boxscore", "players"]) else { return Vec::new() };
    let mut out = Vec::new();

    for (index, block) in blocks.iter().enumerate() {
        let team_id = str_at(block, path!["team", "id"]);
        let (participant_id, _) = participant_for(contest, team_id.as_deref(), index);

        for group in array_at(block, path!["statistics"]).into_iter().flatten() {
            let label_row: Vec<String> = [path!["names"], path!["labels"], path!["keys"]]
                .into_iter()
                .filter_map(|p| array_at(group, p))
                .find(|a| !a.is_empty())
                .map(|a| a.iter().map(|l| as_string(l).unwrap_or_default()).collect())
                .unwrap_or_default();

            for athlete in array_at(group, path!["athletes"]).into_iter().flatten() {
                if !athlete.is_object() {
                    continue;
                }
                let player_id = str_at(athlete, path!["athlete", "id"]);
                let values = array_at(athlete, path!["stats"]).cloned().unwrap_or_default();

                let mut stats = StatLine::new();
                if !values.is_empty() && values.len() != label_row.len() {
                    ctx.warnings.push(DataQualityWarning::StatArityMismatch {
                        player_id: player_id.clone(),
                        labels: label_row.len(),
                        values: values.len(),
                    });
                } else {
                    for (label, raw) in label_row.iter().zip(&values) {
                        let value = as_string(raw).map(|s| parse_stat_value(&s)).unwrap_or(StatValue::Unknown);
                        ctx.put_stat(&mut stats, label, value);
                    }
                }

                out.push(PlayerStat {
                    contest_id: contest.id.clone(),
                    participant_id: participant_id.clone(),
                    player_id,
                    name: first_str(athlete, &[path!["athlete", "displayName"], path!["athlete", "fullName"]]),
                    jersey: str_at(athlete, path!["athlete", "jersey"]),
                    position: first_str(athlete, &[path!["athlete", "position", "displayName"], path!["athlete", "position", "abbreviation"]]),
                    starter: bool_at(athlete, path!["starter"]),
                    did_not_play: bool_at(athlete, path!["didNotPlay"]),
                    stats,
                });
            }
        }
    }
    out
}

fn read_team_stats(v: &Value, contest: &Contest, ctx: &mut Ctx) -> Vec<TeamStat> {
    let Some(blocks) = array_at(v, path!["boxscore", "teams"]) else { return Vec::new() };
    let mut out = Vec::new();

    for (index, block) in blocks.iter().enumerate() {
        if !block.is_object() {
            continue;
        }
        let team_id = str_at(block, path!["team", "id"]);
        let (participant_id, known_side) = participant_for(contest, team_id.as_deref(), index);
        let side = match str_at(block, path!["homeAway"]).map(|s| Side::parse(&s)) {
            Some(s) if s != Side::Unknown => s,
            _ => known_side,
        };

        let mut stats = StatLine::new();
        for stat in array_at(block, path!["statistics"]).into_iter().flatten() {
            let Some(label) = first_str(stat, &[path!["abbreviation"], path!["label"], path!["name"]]) else { continue };
            let value = at(stat, path!["displayValue"])
                .and_then(as_string)
                .map(|s| parse_stat_value(&s))
                .unwrap_or(StatValue::Unknown);
            ctx.put_stat(&mut stats, &label, value);
        }

        // points are missing from most team blocks; the participant score is authoritative
        if !stats.contains_key("PTS") {
            let score = contest.participants.iter().find(|p| p.entity_id == participant_id).and_then(|p| p.score);
            if let Some(pts) = score {
                stats.insert(s!("PTS"), StatValue::Count { value: pts });
            }
        }

        out.push(TeamStat { contest_id: contest.id.clone(), participant_id, side, stats });
    }
    out
}

/* ---------------- Play log ---------------- */

fn read_plays(v: &Value, ctx: &mut Ctx) -> Vec<PlayEvent> {
    let Some(plays) = array_at(v, path!["plays"]) else { return Vec::new() };

    let win_prob: HashMap<String, (Option<f64>, Option<f64>)> = array_at(v, path!["winprobability"])
        .into_iter()
        .flatten()
        .filter_map(|wp| {
            let id = str_at(wp, path!["playId"])?;
            Some((id, (f64_at(wp, path!["homeWinPercentage"]), f64_at(wp, path!["tiePercentage"]))))
        })
        .collect();

    let mut out = Vec::with_capacity(plays.len());
    let mut prev: Option<(i64, String)> = None;

    for play in plays.iter().filter(|p| p.is_object()) {
        let sequence = out.len() as u32 + 1;
        let source_sequence = str_at(play, path!["sequenceNumber"]);

        if let Some(found) = source_sequence.as_deref() {
            if let Ok(n) = found.parse::<i64>() {
                if let Some((p, p_raw)) = &prev {
                    if n <= *p {
                        ctx.warnings.push(DataQualityWarning::NonMonotonicSequence {
                            at: sequence,
                            previous: p_raw.clone(),
                            found: s!(found),
                        });
                    }
                }
                prev = Some((n, s!(found)));
            }
        }

        let play_id = str_at(play, path!["id"]);
        let (home_win_pct, tie_pct) = play_id.as_ref().and_then(|id| win_prob.get(id)).copied().unwrap_or((None, None));
        let clock = str_at(play, path!["clock", "displayValue"]);

        let coordinate = match (f64_at(play, path!["coordinate", "x"]), f64_at(play, path!["coordinate", "y"])) {
            (Some(x), Some(y)) => Some((x, y)),
            _ => None,
        };

        let athletes = array_at(play, path!["participants"])
            .into_iter()
            .flatten()
            .filter(|p| p.is_object())
            .map(|p| PlayAthlete {
                athlete_id: str_at(p, path!["athlete", "id"]),
                name: str_at(p, path!["athlete", "displayName"]),
                role: str_at(p, path!["type", "text"]),
            })
            .collect();

        out.push(PlayEvent {
            contest_id: ctx.contest_id.clone(),
            sequence,
            source_sequence,
            play_id,
            period: i64_at(play, path!["period", "number"]).and_then(|n| u32::try_from(n).ok()),
            period_display: str_at(play, path!["period", "displayValue"]),
            clock_seconds: clock.as_deref().and_then(clock_seconds),
            clock,
            description: str_at(play, path!["text"]),
            play_type: str_at(play, path!["type", "text"]),
            play_type_id: str_at(play, path!["type", "id"]),
            participant_id: str_at(play, path!["team", "id"]),
            home_score: i64_at(play, path!["homeScore"]),
            away_score: i64_at(play, path!["awayScore"]),
            scoring_play: bool_at(play, path!["scoringPlay"]),
            score_value: i64_at(play, path!["scoreValue"]),
            shooting_play: bool_at(play, path!["shootingPlay"]),
            coordinate,
            wallclock: str_at(play, path!["wallclock"]),
            home_win_pct,
            tie_pct,
            athletes,
        });
    }
    out
}

/* ---------------- Officials ---------------- */

fn read_officials(v: &Value, ctx: &mut Ctx) -> Vec<OfficialAssignment> {
    let Some(raw) = at(v, path!["gameInfo", "officials"]) else { return Vec::new() };
    let Some(list) = raw.as_array() else {
        ctx.warnings.push(DataQualityWarning::MalformedOfficials);
        return Vec::new();
    };

    let mut malformed = false;
    let mut out = Vec::with_capacity(list.len());
    for o in list {
        let name = first_str(o, &[path!["fullName"], path!["displayName"]]);
        let Some(name) = name else {
            malformed = true;
            continue;
        };
        out.push(OfficialAssignment {
            contest_id: ctx.contest_id.clone(),
            name,
            role: first_str(o, &[path!["position", "displayName"], path!["position", "name"]]),
            order: i64_at(o, path!["order"]).and_then(|n| u32::try_from(n).ok()),
        });
    }
    if malformed {
        ctx.warnings.push(DataQualityWarning::MalformedOfficials);
    }
    out
}
