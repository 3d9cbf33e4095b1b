// src/scrape/discovery.rs
//! Entity discovery graph: entity list -> schedules -> unique contest ids.
//!
//! Both levels tolerate partial failure. A page, entity or schedule that
//! cannot be obtained becomes a [`CoverageGap`]; the rest of the period
//! carries on.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tracing::{info, warn};

use super::engine::{FetchEngine, FetchRequest, FetchWatch};
use crate::config::partitions::{self, Endpoints};
use crate::data::{ContestRef, Entity, Partition, ScheduleEntry, Season};
use crate::error::{FailureClass, FetchError, NormalizationError};
use crate::progress::Progress;
use crate::specs::{schedule, teams};
use crate::store::CacheKey;

/// Upper bound on list pages; guards against an endpoint that ignores paging.
const MAX_PAGES: u32 = 50;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    EntityList,
    Entity,
    Schedule,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GapKind {
    /// Payload never obtained.
    Unreachable,
    /// Payload obtained but unreadable.
    Malformed,
    /// Schedule obtained and readable but listed no contests.
    Empty,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CoverageGap {
    pub partition: Partition,
    pub season: Option<Season>,
    /// `None` for an entity-list page.
    pub entity_id: Option<String>,
    pub stage: Stage,
    pub kind: GapKind,
    pub class: Option<FailureClass>,
    pub status: Option<u16>,
    pub detail: Option<String>,
}

impl CoverageGap {
    fn unreachable(partition: Partition, season: Option<Season>, entity_id: Option<&str>, stage: Stage, e: &FetchError) -> Self {
        Self {
            partition,
            season,
            entity_id: entity_id.map(String::from),
            stage,
            kind: GapKind::Unreachable,
            class: Some(e.class()),
            status: e.status(),
            detail: Some(e.to_string()),
        }
    }

    fn malformed(partition: Partition, season: Option<Season>, entity_id: Option<&str>, stage: Stage, e: &NormalizationError) -> Self {
        Self {
            partition,
            season,
            entity_id: entity_id.map(String::from),
            stage,
            kind: GapKind::Malformed,
            class: Some(FailureClass::Malformed),
            status: None,
            detail: Some(e.to_string()),
        }
    }

    /// Failures, as opposed to an empty-but-valid schedule.
    pub fn is_failure(&self) -> bool {
        self.kind != GapKind::Empty
    }
}

#[derive(Debug, Default)]
pub struct EntityDiscovery {
    pub entities: Vec<Entity>,
    pub gaps: Vec<CoverageGap>,
}

#[derive(Debug, Default)]
pub struct ContestDiscovery {
    /// Schedules requested (entities active in the season).
    pub requested: usize,
    /// Unique contests, in first-listed order.
    pub contests: Vec<ContestRef>,
    pub entries: Vec<ScheduleEntry>,
    pub gaps: Vec<CoverageGap>,
}

pub struct Discovery<'a> {
    engine: &'a FetchEngine,
    partition: Partition,
    endpoints: Endpoints,
    page_limit: u32,
}

impl<'a> Discovery<'a> {
    pub fn new(engine: &'a FetchEngine, partition: Partition, endpoints: Endpoints, page_limit: u32) -> Self {
        Self { engine, partition, endpoints, page_limit: page_limit.max(1) }
    }

    /// Every entity of the partition: all list pages, plus the supplemental
    /// organisations the list omits. `filter` narrows the set to given ids.
    /// `watch` hears about every fetch as it completes.
    pub fn discover_entities(
        &self,
        filter: Option<&[String]>,
        mut watch: Option<&mut (dyn FetchWatch + '_)>,
        mut progress: Option<&mut (dyn Progress + '_)>,
    ) -> EntityDiscovery {
        let p = self.partition;
        let mut out = EntityDiscovery::default();
        let mut seen: HashSet<String> = HashSet::new();

        for page in 1..=MAX_PAGES {
            let req = FetchRequest {
                key: CacheKey::entity_list_page(p, page),
                url: self.endpoints.entity_list_url(page, self.page_limit),
            };
            let res = self.engine.fetch(&req);
            if let Some(w) = watch.as_deref_mut() {
                match &res {
                    Ok(_) => w.fetched(),
                    Err(e) => w.failed(e),
                }
            }
            let raw = match res {
                Ok(raw) => raw,
                Err(e) => {
                    warn!(partition = %p, page, error = %e, "entity list page unreachable");
                    out.gaps.push(CoverageGap::unreachable(p, None, None, Stage::EntityList, &e));
                    break;
                }
            };
            let parsed = match teams::parse_entity_list(p, &raw) {
                Ok(parsed) => parsed,
                Err(e) => {
                    warn!(partition = %p, page, error = %e, "entity list page unreadable");
                    out.gaps.push(CoverageGap::malformed(p, None, None, Stage::EntityList, &e));
                    break;
                }
            };

            let before = seen.len();
            for e in parsed.entities {
                if seen.insert(e.id.clone()) {
                    out.entities.push(e);
                }
            }
            info!(partition = %p, page, entries = parsed.raw_count, "entity list page");
            if parsed.raw_count < self.page_limit as usize || seen.len() == before {
                break;
            }
        }

        if let Some(ids) = filter {
            let wanted: HashSet<&str> = ids.iter().map(String::as_str).collect();
            out.entities.retain(|e| wanted.contains(e.id.as_str()));
        }

        // Supplemental organisations, fetched one by one.
        let sups: Vec<_> = partitions::supplemental(p)
            .iter()
            .filter(|s| !seen.contains(s.id))
            .filter(|s| filter.is_none_or(|ids| ids.iter().any(|i| i == s.id)))
            .collect();
        if !sups.is_empty() {
            let reqs: Vec<FetchRequest> = sups
                .iter()
                .map(|s| FetchRequest { key: CacheKey::entity(p, s.id), url: self.endpoints.entity_url(s.id) })
                .collect();
            if let Some(pr) = progress.as_deref_mut() {
                pr.begin("entities", reqs.len());
            }
            let results = self.engine.run_batch(
                &reqs,
                |_, res| res.map(|raw| teams::parse_entity(p, &raw)),
                |req, res| {
                    if let Some(w) = watch.as_deref_mut() {
                        match res {
                            Ok(_) => w.fetched(),
                            Err(e) => w.failed(e),
                        }
                    }
                    if let Some(pr) = progress.as_deref_mut() {
                        match res {
                            Ok(Ok(_)) => pr.item_done(&req.key.id),
                            Ok(Err(e)) => pr.item_failed(&req.key.id, &e.to_string()),
                            Err(e) => pr.item_failed(&req.key.id, &e.to_string()),
                        }
                    }
                },
            );
            for (sup, res) in sups.iter().zip(results) {
                let mut entity = sup.to_entity(p);
                match res {
                    Ok(Ok(fetched)) => {
                        entity = Entity {
                            display_name: fetched.display_name.or(entity.display_name),
                            seasons: sup.seasons,
                            ..fetched
                        };
                    }
                    Ok(Err(e)) => {
                        warn!(partition = %p, entity = sup.id, error = %e, "supplemental entity unreadable");
                        out.gaps.push(CoverageGap::malformed(p, None, Some(sup.id), Stage::Entity, &e));
                    }
                    Err(e) => {
                        warn!(partition = %p, entity = sup.id, error = %e, "supplemental entity unreachable");
                        out.gaps.push(CoverageGap::unreachable(p, None, Some(sup.id), Stage::Entity, &e));
                    }
                }
                seen.insert(entity.id.clone());
                out.entities.push(entity);
            }
            if let Some(pr) = progress.as_deref_mut() {
                pr.finish();
            }
        }

        // Filter ids nobody lists are still scheduled; the schedule decides.
        if let Some(ids) = filter {
            for id in ids {
                if !out.entities.iter().any(|e| &e.id == id) {
                    out.entities.push(Entity { id: id.clone(), partition: Some(p), ..Default::default() });
                }
            }
        }

        info!(partition = %p, entities = out.entities.len(), gaps = out.gaps.len(), "entities discovered");
        out
    }

    /// Union of contest ids across `entities`' schedules for `season`.
    pub fn discover_contests(
        &self,
        season: Season,
        entities: &[Entity],
        mut watch: Option<&mut (dyn FetchWatch + '_)>,
        mut progress: Option<&mut (dyn Progress + '_)>,
    ) -> ContestDiscovery {
        let p = self.partition;
        let active: Vec<&Entity> = entities.iter().filter(|e| e.active_in(season)).collect();
        let reqs: Vec<FetchRequest> = active
            .iter()
            .map(|e| FetchRequest {
                key: CacheKey::schedule(p, season, &e.id),
                url: self.endpoints.schedule_url(&e.id, season),
            })
            .collect();

        if let Some(pr) = progress.as_deref_mut() {
            pr.begin("schedules", reqs.len());
        }
        let results = self.engine.run_batch(
            &reqs,
            |req, res| res.map(|raw| schedule::parse_schedule(p, season, &req.key.id, &raw)),
            |req, res| {
                if let Some(w) = watch.as_deref_mut() {
                    match res {
                        Ok(_) => w.fetched(),
                        Err(e) => w.failed(e),
                    }
                }
                if let Some(pr) = progress.as_deref_mut() {
                    match res {
                        Ok(Ok(_)) => pr.item_done(&req.key.id),
                        Ok(Err(e)) => pr.item_failed(&req.key.id, &e.to_string()),
                        Err(e) => pr.item_failed(&req.key.id, &e.to_string()),
                    }
                }
            },
        );
        if let Some(pr) = progress.as_deref_mut() {
            pr.finish();
        }

        let mut out = ContestDiscovery { requested: reqs.len(), ..Default::default() };
        let mut index: HashMap<String, usize> = HashMap::new();

        for (entity, res) in active.iter().zip(results) {
            let entries = match res {
                Ok(Ok(entries)) => entries,
                Ok(Err(e)) => {
                    warn!(partition = %p, season, entity = %entity.id, error = %e, "schedule unreadable");
                    out.gaps.push(CoverageGap::malformed(p, Some(season), Some(entity.id.as_str()), Stage::Schedule, &e));
                    continue;
                }
                Err(e) => {
                    warn!(partition = %p, season, entity = %entity.id, error = %e, "schedule unreachable");
                    out.gaps.push(CoverageGap::unreachable(p, Some(season), Some(entity.id.as_str()), Stage::Schedule, &e));
                    continue;
                }
            };

            if entries.is_empty() {
                out.gaps.push(CoverageGap {
                    partition: p,
                    season: Some(season),
                    entity_id: Some(entity.id.clone()),
                    stage: Stage::Schedule,
                    kind: GapKind::Empty,
                    class: None,
                    status: None,
                    detail: None,
                });
                continue;
            }

            for entry in &entries {
                match index.get(&entry.contest_id) {
                    Some(&i) => {
                        let listed = &mut out.contests[i].listed_by;
                        if !listed.contains(&entity.id) {
                            listed.push(entity.id.clone());
                        }
                    }
                    None => {
                        index.insert(entry.contest_id.clone(), out.contests.len());
                        out.contests.push(ContestRef {
                            id: entry.contest_id.clone(),
                            partition: p,
                            season,
                            listed_by: vec![entity.id.clone()],
                        });
                    }
                }
            }
            out.entries.extend(entries);
        }

        info!(
            partition = %p,
            season,
            schedules = active.len(),
            contests = out.contests.len(),
            gaps = out.gaps.len(),
            "contests discovered"
        );
        out
    }
}
