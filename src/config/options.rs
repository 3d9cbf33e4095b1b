// src/config/options.rs
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::consts::*;
use super::partitions::Endpoints;
use crate::data::{Partition, Season};
use crate::error::ConfigError;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// discover, fetch, normalize
    #[default]
    Full,
    /// discover and fetch into the cache only
    Fetch,
    /// offline: everything must already be cached
    Process,
}

impl RunMode {
    pub fn offline(&self) -> bool {
        matches!(self, RunMode::Process)
    }
    pub fn normalizes(&self) -> bool {
        !matches!(self, RunMode::Fetch)
    }
}

/// Knobs for the fetch engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchOptions {
    /// Max simultaneous in-flight requests.
    pub concurrency: usize,
    /// Min spacing between one worker's request starts.
    pub delay_ms: u64,
    /// Attempts for a retryable failure, first try included.
    pub max_retries: u32,
    pub backoff_base_ms: u64,
    /// Attempt ceiling while the source answers 429.
    pub rate_limit_retries: u32,
    pub jitter_ms: u64,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            concurrency: WORKERS,
            delay_ms: REQUEST_PAUSE_MS,
            max_retries: MAX_RETRIES,
            backoff_base_ms: BACKOFF_BASE_MS,
            rate_limit_retries: RATE_LIMIT_RETRIES,
            jitter_ms: JITTER_MS,
            timeout_secs: TIMEOUT_SECS,
            user_agent: s!(USER_AGENT),
        }
    }
}

impl FetchOptions {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::Invalid(s!("concurrency must be at least 1")));
        }
        if self.max_retries == 0 {
            return Err(ConfigError::Invalid(s!("max_retries must be at least 1")));
        }
        if self.rate_limit_retries < self.max_retries {
            return Err(ConfigError::Invalid(format!(
                "rate_limit_retries ({}) must be >= max_retries ({})",
                self.rate_limit_retries, self.max_retries
            )));
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::Invalid(s!("timeout_secs must be positive")));
        }
        Ok(())
    }
}

/// Everything one invocation needs. Loaded from JSON, then overridden by flags.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunOptions {
    pub partitions: Vec<Partition>,
    pub seasons: Vec<Season>,
    pub mode: RunMode,
    /// Refetch and replace even when cached.
    pub force: bool,
    /// Restrict discovery to these entity ids.
    pub entity_filter: Option<Vec<String>>,
    /// Skip schedule discovery and process exactly these contest ids.
    pub contest_filter: Option<Vec<String>>,
    pub cache_dir: PathBuf,
    pub out_dir: PathBuf,
    pub fetch: FetchOptions,
    pub abort_failure_ratio: f64,
    pub abort_min_sample: usize,
    pub entity_page_limit: u32,
    /// Extra source label -> canonical statistic rules.
    pub extra_labels: BTreeMap<String, String>,
    /// Endpoint overrides; partitions not listed use the ESPN defaults.
    pub endpoints: BTreeMap<Partition, Endpoints>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            partitions: Partition::ALL.to_vec(),
            seasons: Vec::new(),
            mode: RunMode::Full,
            force: false,
            entity_filter: None,
            contest_filter: None,
            cache_dir: PathBuf::from(CACHE_DIR),
            out_dir: PathBuf::from(OUT_DIR),
            fetch: FetchOptions::default(),
            abort_failure_ratio: ABORT_FAILURE_RATIO,
            abort_min_sample: ABORT_MIN_SAMPLE,
            entity_page_limit: ENTITY_PAGE_LIMIT,
            extra_labels: BTreeMap::new(),
            endpoints: BTreeMap::new(),
        }
    }
}

impl RunOptions {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })
    }

    pub fn endpoints_for(&self, p: Partition) -> Endpoints {
        self.endpoints.get(&p).cloned().unwrap_or_else(|| Endpoints::espn(p))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.fetch.validate()?;
        if self.partitions.is_empty() {
            return Err(ConfigError::Invalid(s!("no partitions selected")));
        }
        if self.seasons.is_empty() {
            return Err(ConfigError::Invalid(s!("no seasons selected")));
        }
        if !(self.abort_failure_ratio > 0.0 && self.abort_failure_ratio <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "abort_failure_ratio must be in (0, 1], got {}",
                self.abort_failure_ratio
            )));
        }
        if self.entity_page_limit == 0 {
            return Err(ConfigError::Invalid(s!("entity_page_limit must be positive")));
        }
        for (p, ep) in &self.endpoints {
            if !ep.contest.contains("{id}") || !ep.schedule.contains("{id}") || !ep.entity.contains("{id}") {
                return Err(ConfigError::Invalid(format!("{p} endpoints must template {{id}}")));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_fills_defaults() {
        let o: RunOptions = serde_json::from_str(r#"{"seasons":[2020],"fetch":{"concurrency":2},"mode":"process"}"#).unwrap();
        assert_eq!(o.seasons, vec![2020]);
        assert_eq!(o.fetch.concurrency, 2);
        assert_eq!(o.fetch.max_retries, MAX_RETRIES);
        assert_eq!(o.mode, RunMode::Process);
        assert!(o.mode.offline());
        assert_eq!(o.partitions, Partition::ALL.to_vec());
        o.validate().unwrap();
    }

    #[test]
    fn endpoint_override_by_partition() {
        let o: RunOptions = serde_json::from_str(
            r#"{"endpoints":{"womens":{"entity_list":"http://x/t?p={page}","entity":"http://x/t/{id}","schedule":"http://x/s/{id}/{season}","contest":"http://x/g/{id}"}}}"#,
        ).unwrap();
        assert_eq!(o.endpoints_for(Partition::Womens).contest_url("9"), "http://x/g/9");
        assert_eq!(o.endpoints_for(Partition::Mens), Endpoints::espn(Partition::Mens));
    }

    #[test]
    fn rejects_bad_values() {
        let mut o = RunOptions { seasons: vec![2020], ..Default::default() };
        o.fetch.concurrency = 0;
        assert!(o.validate().is_err());

        let mut o = RunOptions { seasons: vec![2020], ..Default::default() };
        o.fetch.rate_limit_retries = 1;
        o.fetch.max_retries = 3;
        assert!(o.validate().is_err());

        let o = RunOptions::default();
        assert!(o.validate().is_err(), "no seasons");
    }
}
