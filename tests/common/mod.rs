// tests/common/mod.rs
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use serde_json::{json, Value};

use cbb_scrape::config::{Endpoints, FetchOptions};
use cbb_scrape::core::Transport;
use cbb_scrape::error::TransportError;
use cbb_scrape::scrape::FetchEngine;
use cbb_scrape::store::PayloadCache;

/// In-process transport: canned replies per URL, every call recorded.
/// One-shot replies (`then`) are served before the standing reply (`always`);
/// anything unscripted answers 404.
#[derive(Default)]
pub struct Scripted {
    queued: Mutex<HashMap<String, VecDeque<Result<Vec<u8>, TransportError>>>>,
    standing: Mutex<HashMap<String, Vec<u8>>>,
    calls: Mutex<Vec<(String, Instant)>>,
}

impl Scripted {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn always(&self, url: &str, body: impl Into<Vec<u8>>) -> &Self {
        self.standing.lock().unwrap().insert(url.to_string(), body.into());
        self
    }

    pub fn then(&self, url: &str, reply: Result<&str, TransportError>) -> &Self {
        self.queued
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .push_back(reply.map(|b| b.as_bytes().to_vec()));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|(u, _)| u.clone()).collect()
    }

    pub fn calls_to(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|(u, _)| u == url).count()
    }

    pub fn call_times(&self) -> Vec<(String, Instant)> {
        self.calls.lock().unwrap().clone()
    }
}

impl Transport for Scripted {
    fn get(&self, url: &str) -> Result<Vec<u8>, TransportError> {
        self.calls.lock().unwrap().push((url.to_string(), Instant::now()));
        if let Some(reply) = self.queued.lock().unwrap().get_mut(url).and_then(|q| q.pop_front()) {
            return reply;
        }
        match self.standing.lock().unwrap().get(url) {
            Some(body) => Ok(body.clone()),
            None => Err(TransportError::Status(404)),
        }
    }
}

/* ---------------- Options ---------------- */

/// Fast options: no pacing, tiny backoff, no jitter.
pub fn quick(concurrency: usize) -> FetchOptions {
    FetchOptions {
        concurrency,
        delay_ms: 0,
        max_retries: 3,
        backoff_base_ms: 1,
        rate_limit_retries: 5,
        jitter_ms: 0,
        timeout_secs: 5,
        ..Default::default()
    }
}

pub fn endpoints() -> Endpoints {
    Endpoints {
        entity_list: "http://test/teams?limit={limit}&page={page}".into(),
        entity: "http://test/teams/{id}".into(),
        schedule: "http://test/teams/{id}/schedule?season={season}".into(),
        contest: "http://test/summary?event={id}".into(),
    }
}

pub fn engine(transport: Arc<Scripted>, dir: &std::path::Path, opts: FetchOptions) -> FetchEngine {
    let cache = Arc::new(PayloadCache::open(dir).unwrap());
    FetchEngine::new(transport, cache, opts)
}

/* ---------------- Payloads ---------------- */

pub fn teams_page(ids: &[&str]) -> String {
    let teams: Vec<Value> = ids
        .iter()
        .map(|id| json!({"team": {"id": id, "displayName": format!("Team {id}"), "abbreviation": format!("T{id}")}}))
        .collect();
    json!({"sports": [{"leagues": [{"teams": teams}]}]}).to_string()
}

/// `games`: (contest id, opponent id).
pub fn schedule(owner: &str, games: &[(&str, &str)]) -> String {
    let events: Vec<Value> = games
        .iter()
        .map(|(gid, opp)| {
            json!({
                "id": gid,
                "date": "2023-01-01T00:00Z",
                "competitions": [{"competitors": [
                    {"id": owner, "homeAway": "home", "team": {"displayName": format!("Team {owner}")}},
                    {"id": opp, "homeAway": "away", "team": {"displayName": format!("Team {opp}")}}
                ]}]
            })
        })
        .collect();
    json!({"team": {"id": owner}, "events": events}).to_string()
}

/// Minimal two-sided summary with one player row and one play.
pub fn summary(id: &str, home: &str, away: &str) -> String {
    json!({
        "header": {"id": id, "competitions": [{
            "date": "2023-01-01T00:00Z",
            "status": {"type": {"completed": true, "state": "post"}},
            "competitors": [
                {"id": home, "homeAway": "home", "score": "70", "team": {"id": home, "displayName": format!("Team {home}")}},
                {"id": away, "homeAway": "away", "score": "61", "team": {"id": away, "displayName": format!("Team {away}")}}
            ]
        }]},
        "boxscore": {"players": [{"team": {"id": home}, "statistics": [{
            "names": ["MIN", "PTS"],
            "athletes": [{"athlete": {"id": "9", "displayName": "P Nine"}, "stats": ["30", "20"]}]
        }]}]},
        "plays": [{"id": "a", "sequenceNumber": "1", "text": "Jump ball"}]
    })
    .to_string()
}

pub fn full_summary() -> &'static str {
    include_str!("../fixtures/summary_full.json")
}
