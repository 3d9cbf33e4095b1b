// src/error.rs
use std::path::PathBuf;

use serde::Serialize;

/// What came back from a single HTTP attempt, before any retry policy.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("HTTP {0}")]
    Status(u16),

    #[error("request timed out")]
    Timeout,

    #[error("connection reset")]
    ConnectionReset,

    #[error("connection failed: {0}")]
    Connect(String),

    /// 2xx with a body that is not JSON.
    #[error("unreadable body: {0}")]
    Body(String),

    #[error("{0}")]
    Other(String),
}

impl TransportError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, TransportError::Status(429))
    }

    /// 5xx, timeouts, resets and connection trouble are worth another try.
    pub fn is_retryable(&self) -> bool {
        match self {
            TransportError::Status(code) => *code == 429 || *code >= 500,
            TransportError::Timeout
            | TransportError::ConnectionReset
            | TransportError::Connect(_)
            | TransportError::Body(_) => true,
            TransportError::Other(_) => false,
        }
    }
}

/// Coarse failure classes used by the report.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    TransientNetwork,
    FatalRequest,
    CacheCorruption,
    Offline,
    Cancelled,
    Malformed,
    Output,
}

#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    #[error("gave up after {attempts} attempts: {last}")]
    Transient { attempts: u32, last: TransportError },

    #[error("still rate limited after {attempts} attempts")]
    RateLimited { attempts: u32 },

    #[error("request rejected: {0}")]
    Fatal(TransportError),

    #[error("not in cache (offline run)")]
    NotCached,

    #[error("cancelled before the request started")]
    Cancelled,

    #[error(transparent)]
    Cache(#[from] CacheError),
}

impl FetchError {
    pub fn class(&self) -> FailureClass {
        match self {
            FetchError::Transient { .. } | FetchError::RateLimited { .. } => FailureClass::TransientNetwork,
            FetchError::Fatal(_) => FailureClass::FatalRequest,
            FetchError::NotCached => FailureClass::Offline,
            FetchError::Cancelled => FailureClass::Cancelled,
            FetchError::Cache(CacheError::Corrupt { .. }) => FailureClass::CacheCorruption,
            FetchError::Cache(_) => FailureClass::Output,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Fatal(TransportError::Status(code))
            | FetchError::Transient { last: TransportError::Status(code), .. } => Some(*code),
            FetchError::RateLimited { .. } => Some(429),
            _ => None,
        }
    }

    /// Failures that will hit every request the same way (bad credentials).
    pub fn is_systemic(&self) -> bool {
        matches!(self, FetchError::Fatal(TransportError::Status(401 | 403)))
    }
}

#[derive(thiserror::Error, Debug)]
pub enum CacheError {
    #[error("cache io on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt cache entry {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("invalid cache key id: {0:?}")]
    InvalidKey(String),
}

impl CacheError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CacheError::Io { path: path.into(), source }
    }
}

/// Why a contest payload could not become a two-sided contest.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum NormalizationError {
    #[error("payload is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("payload is not a JSON object")]
    NotAnObject,

    #[error("payload has no {0} block")]
    MissingBlock(&'static str),

    #[error("contest id is missing")]
    MissingContestId,

    #[error("expected 2 participants, found {found}")]
    ParticipantCount { found: usize },

    #[error("participant {index} has no id and no name")]
    UnresolvableParticipant { index: usize },
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("reading config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid option: {0}")]
    Invalid(String),
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("output: {0}")]
    Output(#[from] std::io::Error),

    #[error("serializing records: {0}")]
    Json(#[from] serde_json::Error),

    #[error("logging setup: {0}")]
    Log(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
