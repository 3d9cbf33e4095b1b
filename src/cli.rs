// src/cli.rs
//! Command line front end. Flags override the JSON config file, which
//! overrides the built-in defaults.

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Datelike;
use clap::{ArgGroup, Parser};
use color_eyre::eyre::{eyre, WrapErr};
use tracing::info;

use crate::config::consts::{FIRST_SEASON, LOG_FILE, REPORT_FILE};
use crate::config::{RunMode, RunOptions};
use crate::core::HttpTransport;
use crate::data::{Partition, Season};
use crate::file::{write_json, JsonlSink};
use crate::log::{self, LogOptions};
use crate::progress::Progress;
use crate::runner::{self, RunReport};

#[derive(Parser, Debug, Default)]
#[command(name = "cbb_scrape")]
#[command(about = "Fetch and normalize college basketball box scores and play-by-play")]
#[command(version)]
#[command(group(ArgGroup::new("mode").args(["scrape", "process"])))]
pub struct Args {
    /// Partition(s) to process: mens, womens. Repeatable; default both.
    #[arg(long = "partition", value_name = "NAME")]
    pub partitions: Vec<Partition>,

    /// Explicit seasons (ending year), e.g. --seasons 2022 2023
    #[arg(long, num_args = 1.., value_name = "YEAR")]
    pub seasons: Vec<Season>,

    /// First season of the range when --seasons is not given
    #[arg(long, value_name = "YEAR")]
    pub start_year: Option<Season>,

    /// Last season of the range (default: current year)
    #[arg(long, value_name = "YEAR")]
    pub end_year: Option<Season>,

    /// Maximum concurrent requests
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Seconds between one worker's request starts
    #[arg(long, value_name = "SECS")]
    pub delay: Option<f64>,

    /// Attempts for a retryable failure
    #[arg(long)]
    pub max_retries: Option<u32>,

    /// Base backoff in seconds; doubles each retry
    #[arg(long, value_name = "SECS")]
    pub backoff: Option<f64>,

    /// Only these entity (team) ids
    #[arg(long = "team-id", num_args = 1.., value_name = "ID")]
    pub team_ids: Vec<String>,

    /// Skip discovery and process exactly these contest (game) ids
    #[arg(long = "game-ids", num_args = 1.., value_name = "ID")]
    pub game_ids: Vec<String>,

    /// Fetch into the cache only, no normalization
    #[arg(long)]
    pub scrape: bool,

    /// Normalize from the cache only, no network
    #[arg(long)]
    pub process: bool,

    /// Refetch and replace cached payloads
    #[arg(long)]
    pub force: bool,

    #[arg(long, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    #[arg(long, value_name = "DIR")]
    pub out_dir: Option<PathBuf>,

    /// Where to write the run report (JSON)
    #[arg(long, value_name = "FILE")]
    pub report: Option<PathBuf>,

    /// JSON file with run options
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[arg(long)]
    pub debug: bool,

    /// Log file; "-" for stderr only
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,
}

impl Args {
    /// Merge flags over the config file (or defaults).
    pub fn to_options(&self) -> color_eyre::Result<RunOptions> {
        let mut o = match &self.config {
            Some(path) => RunOptions::load(path)?,
            None => RunOptions::default(),
        };

        if !self.partitions.is_empty() {
            let mut ps = self.partitions.clone();
            ps.sort();
            ps.dedup();
            o.partitions = ps;
        }

        if !self.seasons.is_empty() {
            o.seasons = self.seasons.clone();
        } else if self.start_year.is_some() || self.end_year.is_some() || o.seasons.is_empty() {
            let start = self.start_year.unwrap_or(FIRST_SEASON);
            let end = self.end_year.unwrap_or_else(current_year);
            if start > end {
                return Err(eyre!("--start-year {start} is after --end-year {end}"));
            }
            o.seasons = (start..=end).collect();
        }

        if let Some(n) = self.concurrency {
            o.fetch.concurrency = n;
        }
        if let Some(secs) = self.delay {
            o.fetch.delay_ms = secs_to_ms(secs, "--delay")?;
        }
        if let Some(n) = self.max_retries {
            o.fetch.max_retries = n;
            o.fetch.rate_limit_retries = o.fetch.rate_limit_retries.max(n);
        }
        if let Some(secs) = self.backoff {
            o.fetch.backoff_base_ms = secs_to_ms(secs, "--backoff")?;
        }

        if !self.team_ids.is_empty() {
            o.entity_filter = Some(self.team_ids.clone());
        }
        if !self.game_ids.is_empty() {
            o.contest_filter = Some(self.game_ids.clone());
        }

        if self.scrape {
            o.mode = RunMode::Fetch;
        } else if self.process {
            o.mode = RunMode::Process;
        }
        o.force |= self.force;

        if let Some(dir) = &self.cache_dir {
            o.cache_dir = dir.clone();
        }
        if let Some(dir) = &self.out_dir {
            o.out_dir = dir.clone();
        }

        o.validate()?;
        Ok(o)
    }

    pub fn log_options(&self) -> LogOptions {
        let file = match &self.log_file {
            Some(p) if p.as_os_str() == "-" => None,
            Some(p) => Some(p.clone()),
            None => Some(PathBuf::from(LOG_FILE)),
        };
        LogOptions { debug: self.debug, file }
    }

    pub fn report_path(&self) -> PathBuf {
        self.report.clone().unwrap_or_else(|| PathBuf::from(REPORT_FILE))
    }
}

fn secs_to_ms(secs: f64, flag: &str) -> color_eyre::Result<u64> {
    if !secs.is_finite() || secs < 0.0 {
        return Err(eyre!("{flag} must be a non-negative number of seconds"));
    }
    Ok((secs * 1000.0).round() as u64)
}

/// Calendar year (UTC).
fn current_year() -> Season {
    chrono::Utc::now().year() as Season
}

/* ---------------- Progress on stderr ---------------- */

/// Prints one line per stage and a tick every `every` items.
pub struct CliProgress {
    stage: String,
    total: usize,
    done: usize,
    failed: usize,
    every: usize,
}

impl CliProgress {
    pub fn new(every: usize) -> Self {
        Self { stage: s!(), total: 0, done: 0, failed: 0, every: every.max(1) }
    }

    fn tick(&self) {
        let n = self.done + self.failed;
        if n % self.every == 0 || n == self.total {
            eprint!("\r{}: {n}/{} ({} failed)", self.stage, self.total, self.failed);
            let _ = io::stderr().flush();
        }
    }
}

impl Progress for CliProgress {
    fn begin(&mut self, stage: &str, total: usize) {
        self.stage = s!(stage);
        self.total = total;
        self.done = 0;
        self.failed = 0;
    }
    fn log(&mut self, msg: &str) {
        eprintln!("{msg}");
    }
    fn item_done(&mut self, _id: &str) {
        self.done += 1;
        self.tick();
    }
    fn item_failed(&mut self, _id: &str, _reason: &str) {
        self.failed += 1;
        self.tick();
    }
    fn finish(&mut self) {
        if self.total > 0 {
            eprintln!();
        }
    }
}

/* ---------------- Entry ---------------- */

pub fn run() -> color_eyre::Result<()> {
    let args = Args::parse();
    log::init(&args.log_options())?;

    let opts = args.to_options()?;
    info!(
        partitions = ?opts.partitions,
        first = opts.seasons.first(),
        last = opts.seasons.last(),
        mode = ?opts.mode,
        "starting"
    );

    let transport = Arc::new(HttpTransport::new(&opts.fetch));
    let engine = runner::build_engine(&opts, transport)?;
    let sink = JsonlSink::new(&opts.out_dir)?;
    let mut progress = CliProgress::new(25);

    let report = runner::run(&opts, &engine, &sink, Some(&mut progress))?;

    let path = args.report_path();
    write_json(&path, &ReportFile { report: &report, retry: report.retry_scope() })
        .wrap_err_with(|| format!("writing report {}", path.display()))?;
    print_summary(&report, &path);

    if let Some(reason) = &report.cancelled {
        return Err(eyre!("run stopped early: {reason}"));
    }
    Ok(())
}

#[derive(serde::Serialize)]
struct ReportFile<'a> {
    #[serde(flatten)]
    report: &'a RunReport,
    retry: Vec<runner::RetryScope>,
}

fn print_summary(report: &RunReport, path: &std::path::Path) {
    println!("completed:        {}", report.completed.len());
    println!("  partial:        {}", report.partial().count());
    println!("failed entities:  {}", report.failed_entities.len());
    println!("failed contests:  {}", report.failed_contests.len());
    println!("empty schedules:  {}", report.coverage_gaps.len());
    println!("warnings:         {}", report.warnings);
    println!(
        "network calls:    {} ({} retries, {} cache hits)",
        report.stats.network_calls, report.stats.retries, report.stats.cache_hits
    );
    if let Some(n) = report.suggested_concurrency {
        println!("rate limited {} times; try --concurrency {n}", report.stats.rate_limited);
    }
    println!("report:           {}", path.display());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn end_year_defaults_to_this_year() {
        let args = Args::parse_from(["cbb_scrape", "--start-year", "2020"]);
        let opts = args.to_options().unwrap();
        assert_eq!(opts.seasons.first(), Some(&2020));
        assert_eq!(opts.seasons.last(), Some(&current_year()));
        assert!(current_year() >= 2024);
    }

    #[test]
    fn flags_override_defaults() {
        let args = Args::parse_from([
            "cbb_scrape", "--partition", "womens", "--start-year", "2020", "--end-year", "2022",
            "--delay", "0.25", "--scrape", "--team-id", "52",
        ]);
        let o = args.to_options().unwrap();
        assert_eq!(o.partitions, vec![Partition::Womens]);
        assert_eq!(o.seasons, vec![2020, 2021, 2022]);
        assert_eq!(o.fetch.delay_ms, 250);
        assert_eq!(o.mode, RunMode::Fetch);
        assert_eq!(o.entity_filter, Some(vec![s!("52")]));
    }

    #[test]
    fn scrape_and_process_conflict() {
        assert!(Args::try_parse_from(["cbb_scrape", "--scrape", "--process"]).is_err());
    }

    #[test]
    fn explicit_seasons_win_over_range() {
        let args = Args::parse_from(["cbb_scrape", "--seasons", "2019", "2021", "--start-year", "2003"]);
        assert_eq!(args.to_options().unwrap().seasons, vec![2019, 2021]);
    }
}
