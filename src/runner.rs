// src/runner.rs
//! Run coordinator: discovery -> contest fetch -> normalization, per
//! partition and season, with one aggregated [`RunReport`].
//!
//! Per-entity and per-contest failures are recorded and the run carries on.
//! Only a systemic signal stops it early: an authentication rejection, seen
//! the moment it arrives, or a failure ratio above the configured threshold
//! once enough fetches have been seen, checked between batches. Stopping
//! cancels queued fetches; in-flight ones still finish and land in the cache.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::config::RunOptions;
use crate::core::Transport;
use crate::data::{ContestRef, Partition, RecordFamily, Season};
use crate::error::{FailureClass, FetchError, NormalizationError, Result};
use crate::file::RecordSink;
use crate::progress::Progress;
use crate::scrape::discovery::{CoverageGap, Discovery};
use crate::scrape::engine::{CancelToken, FetchEngine, FetchRequest, FetchStats, FetchWatch};
use crate::specs::{self, StatLabels};
use crate::store::{CacheKey, PayloadCache};

/* ---------------- Report ---------------- */

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CompletedContest {
    pub partition: Partition,
    pub season: Season,
    pub contest_id: String,
    /// False in fetch-only runs.
    pub normalized: bool,
    /// Optional record families that came out empty.
    pub missing: Vec<RecordFamily>,
    pub warnings: usize,
}

impl CompletedContest {
    /// Reachable and normalized, but with at least one empty family.
    pub fn is_partial(&self) -> bool {
        !self.missing.is_empty()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContestFailureKind {
    /// The payload was never obtained.
    Unreachable,
    /// Obtained, but could not be normalized.
    Malformed,
    /// Normalized, but the records could not be written.
    Output,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ContestFailure {
    pub partition: Partition,
    pub season: Season,
    pub contest_id: String,
    pub kind: ContestFailureKind,
    pub class: FailureClass,
    pub status: Option<u16>,
    pub detail: String,
}

/// Ids to request again, for one partition and season.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct RetryScope {
    pub partition: Option<Partition>,
    /// `None` for entity-level work that is not tied to a season.
    pub season: Option<Season>,
    /// An entity-list page failed; discovery must run again in full.
    pub rediscover: bool,
    pub entity_ids: Vec<String>,
    pub contest_ids: Vec<String>,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct RunReport {
    pub completed: Vec<CompletedContest>,
    /// Entity list pages, entities and schedules that failed.
    pub failed_entities: Vec<CoverageGap>,
    pub failed_contests: Vec<ContestFailure>,
    /// Schedules that were read fine but listed nothing.
    pub coverage_gaps: Vec<CoverageGap>,
    /// Data-quality warnings across all normalized contests.
    pub warnings: usize,
    pub stats: FetchStats,
    /// Set when the source answered 429 at least once.
    pub suggested_concurrency: Option<usize>,
    /// Why the run stopped early, if it did.
    pub cancelled: Option<String>,
    /// Work never attempted because of cancellation.
    pub skipped: usize,
}

impl RunReport {
    pub fn partial(&self) -> impl Iterator<Item = &CompletedContest> {
        self.completed.iter().filter(|c| c.is_partial())
    }

    pub fn is_clean(&self) -> bool {
        self.failed_entities.is_empty() && self.failed_contests.is_empty() && self.cancelled.is_none()
    }

    /// Exactly the failed scope, grouped by partition and season.
    pub fn retry_scope(&self) -> Vec<RetryScope> {
        let mut by: BTreeMap<(Partition, Option<Season>), RetryScope> = BTreeMap::new();

        for gap in &self.failed_entities {
            let entry = scope_for(&mut by, gap.partition, gap.season);
            match &gap.entity_id {
                None => entry.rediscover = true,
                Some(id) => {
                    if !entry.entity_ids.contains(id) {
                        entry.entity_ids.push(id.clone());
                    }
                }
            }
        }
        for f in &self.failed_contests {
            let entry = scope_for(&mut by, f.partition, Some(f.season));
            if !entry.contest_ids.contains(&f.contest_id) {
                entry.contest_ids.push(f.contest_id.clone());
            }
        }
        by.into_values().collect()
    }
}

fn scope_for(
    by: &mut BTreeMap<(Partition, Option<Season>), RetryScope>,
    partition: Partition,
    season: Option<Season>,
) -> &mut RetryScope {
    by.entry((partition, season))
        .or_insert_with(|| RetryScope { partition: Some(partition), season, ..Default::default() })
}

/* ---------------- Systemic failure detection ---------------- */

/// Contest fetches per batch; the failure ratio is checked between them.
const CONTEST_WINDOW: usize = 200;

/// Watches fetch outcomes and cancels the run on a systemic signal.
#[derive(Debug)]
pub struct FailureMonitor {
    cancel: CancelToken,
    ratio: f64,
    min_sample: usize,
    seen: usize,
    failed: usize,
    reason: Option<String>,
}

impl FailureMonitor {
    pub fn new(cancel: CancelToken, ratio: f64, min_sample: usize) -> Self {
        Self { cancel, ratio, min_sample, seen: 0, failed: 0, reason: None }
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    pub fn success(&mut self) {
        self.seen += 1;
    }

    /// Cancelled and offline misses say nothing about the remote service.
    /// Authentication rejections trip at once.
    pub fn failure(&mut self, e: &FetchError) {
        if matches!(e, FetchError::Cancelled | FetchError::NotCached) {
            return;
        }
        self.seen += 1;
        self.failed += 1;
        if self.reason.is_none() && e.is_systemic() {
            self.trip(format!("systemic failure: {e}"));
        }
    }

    /// Evaluate the failure ratio over everything seen so far. Called at batch
    /// boundaries, so the order results arrive in cannot trip it early.
    pub fn checkpoint(&mut self) {
        if self.reason.is_some() || self.seen == 0 || self.seen < self.min_sample {
            return;
        }
        if self.failed as f64 / self.seen as f64 >= self.ratio {
            self.trip(format!("{} of {} fetches failed", self.failed, self.seen));
        }
    }

    fn trip(&mut self, reason: String) {
        error!(%reason, "stopping run");
        self.cancel.cancel();
        self.reason = Some(reason);
    }
}

impl FetchWatch for FailureMonitor {
    fn fetched(&mut self) {
        self.success();
    }
    fn failed(&mut self, e: &FetchError) {
        self.failure(e);
    }
}

/* ---------------- Engine assembly ---------------- */

/// Open the cache and build an engine wired the way `opts` asks.
pub fn build_engine(opts: &RunOptions, transport: Arc<dyn Transport>) -> Result<FetchEngine> {
    let cache = Arc::new(PayloadCache::open(&opts.cache_dir)?);
    Ok(FetchEngine::new(transport, cache, opts.fetch.clone())
        .offline(opts.mode.offline())
        .force(opts.force))
}

/* ---------------- Run ---------------- */

enum ContestOutcome {
    Fetched,
    Normalized { missing: Vec<RecordFamily>, warnings: usize },
    Unreachable(FetchError),
    Malformed(NormalizationError),
    Output(String),
}

/// Top-level runner. `progress` can be None (no UI updates).
pub fn run(
    opts: &RunOptions,
    engine: &FetchEngine,
    sink: &dyn RecordSink,
    mut progress: Option<&mut dyn Progress>,
) -> Result<RunReport> {
    opts.validate()?;
    if engine.is_offline() != opts.mode.offline() {
        warn!(mode = ?opts.mode, offline = engine.is_offline(), "engine and run mode disagree on offline");
    }

    let labels = StatLabels::standard().with_extra(&opts.extra_labels);
    let mut monitor = FailureMonitor::new(engine.cancel_token(), opts.abort_failure_ratio, opts.abort_min_sample);
    let mut report = RunReport::default();

    for &p in &opts.partitions {
        if monitor.reason().is_some() {
            break;
        }
        if let Some(pr) = progress.as_deref_mut() {
            pr.log(&format!("{p}: {} season(s)", opts.seasons.len()));
        }
        let endpoints = opts.endpoints_for(p);
        let discovery = Discovery::new(engine, p, endpoints.clone(), opts.entity_page_limit);

        // Entities are only needed when schedules drive discovery.
        let entities = match &opts.contest_filter {
            Some(_) => Vec::new(),
            None => {
                info!(partition = %p, "discovering entities");
                let filter = opts.entity_filter.as_deref();
                let found = discovery.discover_entities(filter, Some(&mut monitor), progress.as_deref_mut());
                monitor.checkpoint();
                record_gaps(&mut report, found.gaps);
                if opts.mode.normalizes() {
                    if let Err(e) = sink.entities(p, &found.entities) {
                        error!(partition = %p, error = %e, "writing entities failed");
                    }
                }
                found.entities
            }
        };

        for &season in &opts.seasons {
            if monitor.reason().is_some() {
                break;
            }
            let contests: Vec<ContestRef> = match &opts.contest_filter {
                Some(ids) => ids
                    .iter()
                    .map(|id| ContestRef { id: id.clone(), partition: p, season, listed_by: Vec::new() })
                    .collect(),
                None => {
                    let found =
                        discovery.discover_contests(season, &entities, Some(&mut monitor), progress.as_deref_mut());
                    monitor.checkpoint();
                    record_gaps(&mut report, found.gaps);
                    if opts.mode.normalizes() {
                        if let Err(e) = sink.schedule(p, season, &found.entries) {
                            error!(partition = %p, season, error = %e, "writing schedule failed");
                        }
                    }
                    found.contests
                }
            };
            if contests.is_empty() {
                info!(partition = %p, season, "no contests to process");
                continue;
            }

            info!(partition = %p, season, contests = contests.len(), mode = ?opts.mode, "processing contests");
            let reqs: Vec<FetchRequest> = contests
                .iter()
                .map(|c| FetchRequest { key: CacheKey::contest(p, season, &c.id), url: endpoints.contest_url(&c.id) })
                .collect();

            if let Some(pr) = progress.as_deref_mut() {
                pr.begin("contests", reqs.len());
            }
            let normalizes = opts.mode.normalizes();
            let mut outcomes = Vec::with_capacity(reqs.len());
            // Once the monitor trips, later windows drain as Cancelled without
            // touching the network.
            for window in reqs.chunks(CONTEST_WINDOW) {
                outcomes.extend(engine.run_batch(
                    window,
                    |req, res| process_contest(req, res, p, season, normalizes, &labels, sink),
                    |req, outcome| {
                        match outcome {
                            ContestOutcome::Unreachable(e) => monitor.failure(e),
                            _ => monitor.success(),
                        }
                        if let Some(pr) = progress.as_deref_mut() {
                            match outcome {
                                ContestOutcome::Fetched | ContestOutcome::Normalized { .. } => pr.item_done(&req.key.id),
                                ContestOutcome::Unreachable(e) => pr.item_failed(&req.key.id, &e.to_string()),
                                ContestOutcome::Malformed(e) => pr.item_failed(&req.key.id, &e.to_string()),
                                ContestOutcome::Output(e) => pr.item_failed(&req.key.id, e),
                            }
                        }
                    },
                ));
                monitor.checkpoint();
            }
            if let Some(pr) = progress.as_deref_mut() {
                pr.finish();
            }

            for (c, outcome) in contests.iter().zip(outcomes) {
                let failure = |kind, class, status, detail: String| ContestFailure {
                    partition: p,
                    season,
                    contest_id: c.id.clone(),
                    kind,
                    class,
                    status,
                    detail,
                };
                match outcome {
                    ContestOutcome::Fetched => report.completed.push(CompletedContest {
                        partition: p,
                        season,
                        contest_id: c.id.clone(),
                        normalized: false,
                        missing: Vec::new(),
                        warnings: 0,
                    }),
                    ContestOutcome::Normalized { missing, warnings } => {
                        report.warnings += warnings;
                        report.completed.push(CompletedContest {
                            partition: p,
                            season,
                            contest_id: c.id.clone(),
                            normalized: true,
                            missing,
                            warnings,
                        });
                    }
                    ContestOutcome::Unreachable(e) => {
                        if matches!(e, FetchError::Cancelled) {
                            report.skipped += 1;
                        }
                        report.failed_contests.push(failure(
                            ContestFailureKind::Unreachable,
                            e.class(),
                            e.status(),
                            e.to_string(),
                        ));
                    }
                    ContestOutcome::Malformed(e) => report.failed_contests.push(failure(
                        ContestFailureKind::Malformed,
                        FailureClass::Malformed,
                        None,
                        e.to_string(),
                    )),
                    ContestOutcome::Output(e) => report.failed_contests.push(failure(
                        ContestFailureKind::Output,
                        FailureClass::Output,
                        None,
                        e,
                    )),
                }
            }
        }
    }

    report.stats = engine.stats();
    if report.stats.rate_limited > 0 {
        let suggested = (opts.fetch.concurrency / 2).max(1);
        warn!(
            rate_limited = report.stats.rate_limited,
            concurrency = opts.fetch.concurrency,
            suggested,
            "source rate limited this run; consider lowering concurrency"
        );
        report.suggested_concurrency = Some(suggested);
    }
    report.cancelled = monitor.reason().map(String::from);
    if let (Some(reason), Some(pr)) = (&report.cancelled, progress.as_deref_mut()) {
        pr.log(&format!("stopped early: {reason}"));
    }

    info!(
        completed = report.completed.len(),
        partial = report.partial().count(),
        failed_entities = report.failed_entities.len(),
        failed_contests = report.failed_contests.len(),
        warnings = report.warnings,
        network_calls = report.stats.network_calls,
        cache_hits = report.stats.cache_hits,
        "run finished"
    );
    Ok(report)
}

fn process_contest(
    req: &FetchRequest,
    res: std::result::Result<Vec<u8>, FetchError>,
    p: Partition,
    season: Season,
    normalizes: bool,
    labels: &StatLabels,
    sink: &dyn RecordSink,
) -> ContestOutcome {
    let raw = match res {
        Ok(raw) => raw,
        Err(e) => {
            if !matches!(e, FetchError::Cancelled) {
                error!(partition = %p, season, contest = %req.key.id, error = %e, "contest unreachable");
            }
            return ContestOutcome::Unreachable(e);
        }
    };
    if !normalizes {
        return ContestOutcome::Fetched;
    }

    let records = match specs::normalize(p, season, &raw, labels) {
        Ok(r) => r,
        Err(e) => {
            error!(partition = %p, season, contest = %req.key.id, error = %e, "contest malformed");
            return ContestOutcome::Malformed(e);
        }
    };
    for w in &records.warnings {
        warn!(contest = %req.key.id, warning = ?w, "data quality");
    }
    if let Err(e) = sink.contest(&records) {
        error!(contest = %req.key.id, error = %e, "writing contest failed");
        return ContestOutcome::Output(e.to_string());
    }
    ContestOutcome::Normalized { missing: records.missing_families(), warnings: records.warnings.len() }
}

fn record_gaps(report: &mut RunReport, gaps: Vec<CoverageGap>) {
    for gap in gaps {
        if gap.is_failure() {
            if gap.class == Some(FailureClass::Cancelled) {
                report.skipped += 1;
            }
            report.failed_entities.push(gap);
        } else {
            warn!(partition = %gap.partition, season = ?gap.season, entity = ?gap.entity_id, "empty schedule");
            report.coverage_gaps.push(gap);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::scrape::discovery::{GapKind, Stage};

    #[test]
    fn auth_failure_trips_immediately() {
        let token = CancelToken::default();
        let mut m = FailureMonitor::new(token.clone(), 0.9, 20);
        m.success();
        m.failure(&FetchError::Fatal(TransportError::Status(403)));
        assert!(token.is_cancelled());
        assert!(m.reason().is_some_and(|r| r.contains("403")));
    }

    #[test]
    fn ratio_waits_for_min_sample() {
        let token = CancelToken::default();
        let mut m = FailureMonitor::new(token.clone(), 0.5, 4);
        let e = FetchError::Transient { attempts: 3, last: TransportError::Timeout };
        m.failure(&e);
        m.failure(&e);
        m.failure(&e);
        m.checkpoint();
        assert!(!token.is_cancelled());
        m.failure(&e);
        assert!(!token.is_cancelled(), "ratio is only checked at a checkpoint");
        m.checkpoint();
        assert!(token.is_cancelled());
    }

    #[test]
    fn early_failures_balanced_by_later_successes_do_not_trip() {
        let token = CancelToken::default();
        let mut m = FailureMonitor::new(token.clone(), 0.9, 20);
        let e = FetchError::Fatal(TransportError::Status(404));
        for _ in 0..20 {
            m.failed(&e);
        }
        for _ in 0..20 {
            m.fetched();
        }
        m.checkpoint();
        assert!(!token.is_cancelled());
        assert!(m.reason().is_none());
    }

    #[test]
    fn cancelled_and_offline_are_not_counted() {
        let token = CancelToken::default();
        let mut m = FailureMonitor::new(token.clone(), 0.1, 1);
        m.failure(&FetchError::Cancelled);
        m.failure(&FetchError::NotCached);
        assert!(!token.is_cancelled());
    }

    #[test]
    fn retry_scope_groups_by_partition_and_season() {
        let gap = |entity: Option<&str>, season, stage| CoverageGap {
            partition: Partition::Mens,
            season,
            entity_id: entity.map(String::from),
            stage,
            kind: GapKind::Unreachable,
            class: Some(FailureClass::TransientNetwork),
            status: Some(503),
            detail: None,
        };
        let fail = |id: &str, season| ContestFailure {
            partition: Partition::Womens,
            season,
            contest_id: s!(id),
            kind: ContestFailureKind::Unreachable,
            class: FailureClass::TransientNetwork,
            status: None,
            detail: s!("x"),
        };
        let report = RunReport {
            failed_entities: vec![
                gap(None, None, Stage::EntityList),
                gap(Some("52"), Some(2020), Stage::Schedule),
            ],
            failed_contests: vec![fail("401", 2021), fail("402", 2021), fail("401", 2021)],
            ..Default::default()
        };

        let scope = report.retry_scope();
        assert_eq!(scope.len(), 3);
        assert!(scope[0].rediscover && scope[0].season.is_none());
        assert_eq!(scope[1].entity_ids, vec![s!("52")]);
        assert_eq!(scope[2].partition, Some(Partition::Womens));
        assert_eq!(scope[2].contest_ids, vec![s!("401"), s!("402")]);
        assert!(!report.is_clean());
    }
}
