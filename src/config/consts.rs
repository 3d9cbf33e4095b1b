// src/config/consts.rs

// Net config
pub const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";
pub const REQUEST_HEADERS: &[(&str, &str)] = &[
    ("Accept", "application/json, text/plain, */*"),
    ("Accept-Language", "en-US,en;q=0.9"),
    ("Referer", "https://www.espn.com/"),
    ("Origin", "https://www.espn.com"),
];
pub const TIMEOUT_SECS: u64 = 30;

// Local cache / output
pub const CACHE_DIR: &str = "data/raw";
pub const OUT_DIR: &str = "data/processed";
pub const LOG_FILE: &str = "data/cbb_scrape.log";
pub const REPORT_FILE: &str = "data/run_report.json";

// Concurrency
pub const WORKERS: usize = 5;
pub const REQUEST_PAUSE_MS: u64 = 500; // per worker, between request starts
pub const JITTER_MS: u64 = 100; // extra 0..100 ms on backoff waits

// Retry
pub const MAX_RETRIES: u32 = 3;
pub const BACKOFF_BASE_MS: u64 = 500;
pub const RATE_LIMIT_RETRIES: u32 = 8;

// Discovery
pub const ENTITY_PAGE_LIMIT: u32 = 500;
pub const FIRST_SEASON: u16 = 2003;

// Systemic abort: stop once this share of at least ABORT_MIN_SAMPLE fetches failed
pub const ABORT_FAILURE_RATIO: f64 = 0.9;
pub const ABORT_MIN_SAMPLE: usize = 20;
