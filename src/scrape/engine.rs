// src/scrape/engine.rs
//! Rate-limited fetch engine.
//!
//! A bounded pool of worker threads pulls requests off a shared index; each
//! worker keeps its own pacing clock so request starts from one worker are at
//! least `delay` apart while the pool as a whole runs `concurrency` wide.
//! Every successful payload is published to the cache before it is handed back.

use std::{
    sync::{
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
        mpsc, Arc, Mutex,
    },
    thread,
    time::{Duration, Instant},
};

use rand::Rng;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::FetchOptions;
use crate::core::Transport;
use crate::error::{CacheError, FetchError, TransportError};
use crate::store::{CacheKey, PayloadCache};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchRequest {
    pub key: CacheKey,
    pub url: String,
}

/// Cooperative stop flag shared by the coordinator and every worker.
/// Queued requests observe it; requests already on the wire finish.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Sees every fetch outcome as it arrives on the calling thread, so a
/// coordinator can cancel the queue mid-batch.
pub trait FetchWatch {
    fn fetched(&mut self) {}
    fn failed(&mut self, _e: &FetchError) {}
}

/// Per-worker spacing between request starts.
#[derive(Debug)]
pub struct Pacer {
    delay: Duration,
    stagger: Duration,
    last_start: Option<Instant>,
}

impl Pacer {
    pub fn new(delay: Duration, stagger: Duration) -> Self {
        Self { delay, stagger, last_start: None }
    }

    /// Block until this worker may start another request, then mark the start.
    pub fn wait(&mut self) {
        let pause = match self.last_start {
            Some(t) => self.delay.saturating_sub(t.elapsed()),
            None => self.stagger,
        };
        if !pause.is_zero() {
            thread::sleep(pause);
        }
        self.last_start = Some(Instant::now());
    }
}

/// Wait before the `retry`-th retry (1-based): `base * 2^(retry-1)`.
pub fn backoff_delay(base: Duration, retry: u32) -> Duration {
    let shift = retry.saturating_sub(1).min(16);
    base.saturating_mul(1u32 << shift)
}

#[derive(Debug, Default)]
struct Counters {
    network_calls: AtomicU64,
    cache_hits: AtomicU64,
    published: AtomicU64,
    retries: AtomicU64,
    rate_limited: AtomicU64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct FetchStats {
    pub network_calls: u64,
    pub cache_hits: u64,
    pub published: u64,
    pub retries: u64,
    pub rate_limited: u64,
}

pub struct FetchEngine {
    transport: Arc<dyn Transport>,
    cache: Arc<PayloadCache>,
    opts: FetchOptions,
    offline: bool,
    force: bool,
    cancel: CancelToken,
    counters: Counters,
    pacers: Vec<Mutex<Pacer>>,
}

impl FetchEngine {
    pub fn new(transport: Arc<dyn Transport>, cache: Arc<PayloadCache>, opts: FetchOptions) -> Self {
        let workers = opts.concurrency.max(1);
        let delay = Duration::from_millis(opts.delay_ms);
        // Spread first starts across one delay window.
        let pacers = (0..workers)
            .map(|w| Mutex::new(Pacer::new(delay, delay * w as u32 / workers as u32)))
            .collect();
        Self {
            transport,
            cache,
            opts,
            offline: false,
            force: false,
            cancel: CancelToken::default(),
            counters: Counters::default(),
            pacers,
        }
    }

    /// Serve from cache only; a miss is `NotCached`.
    pub fn offline(mut self, yes: bool) -> Self {
        self.offline = yes;
        self
    }

    /// Ignore cache presence and replace entries with fresh payloads.
    pub fn force(mut self, yes: bool) -> Self {
        self.force = yes;
        self
    }

    pub fn is_offline(&self) -> bool {
        self.offline
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn cache(&self) -> &PayloadCache {
        &self.cache
    }

    pub fn stats(&self) -> FetchStats {
        let c = &self.counters;
        FetchStats {
            network_calls: c.network_calls.load(Ordering::Relaxed),
            cache_hits: c.cache_hits.load(Ordering::Relaxed),
            published: c.published.load(Ordering::Relaxed),
            retries: c.retries.load(Ordering::Relaxed),
            rate_limited: c.rate_limited.load(Ordering::Relaxed),
        }
    }

    /// Fetch one payload on the first worker slot.
    pub fn fetch(&self, req: &FetchRequest) -> Result<Vec<u8>, FetchError> {
        if self.cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }
        let mut pacer = self.pacers[0].lock().unwrap_or_else(|e| e.into_inner());
        self.fetch_with(req, &mut pacer)
    }

    /// Fetch every request through the worker pool. `handler` runs on the
    /// worker that fetched the item; `observe` runs on the calling thread as
    /// results arrive. Results come back in request order.
    pub fn run_batch<R, H, O>(&self, requests: &[FetchRequest], handler: H, mut observe: O) -> Vec<R>
    where
        R: Send,
        H: Fn(&FetchRequest, Result<Vec<u8>, FetchError>) -> R + Sync,
        O: FnMut(&FetchRequest, &R),
    {
        let n = requests.len();
        if n == 0 {
            return Vec::new();
        }
        let workers = self.pacers.len().min(n).max(1);
        let counter = AtomicUsize::new(0);
        let (res_tx, res_rx) = mpsc::channel::<(usize, R)>();
        let mut slots: Vec<Option<R>> = (0..n).map(|_| None).collect();

        thread::scope(|scope| {
            for w in 0..workers {
                let tx = res_tx.clone();
                let counter = &counter;
                let handler = &handler;
                let pacer = &self.pacers[w];
                scope.spawn(move || {
                    let mut pacer = pacer.lock().unwrap_or_else(|e| e.into_inner());
                    loop {
                        let i = counter.fetch_add(1, Ordering::Relaxed);
                        if i >= n {
                            break;
                        }
                        let req = &requests[i];
                        let res = if self.cancel.is_cancelled() {
                            Err(FetchError::Cancelled)
                        } else {
                            self.fetch_with(req, &mut pacer)
                        };
                        if tx.send((i, handler(req, res))).is_err() {
                            break;
                        }
                    }
                });
            }
            drop(res_tx); // calling thread is sole receiver now

            for (i, r) in res_rx {
                observe(&requests[i], &r);
                slots[i] = Some(r);
            }
        });

        slots.into_iter().flatten().collect()
    }

    fn fetch_with(&self, req: &FetchRequest, pacer: &mut Pacer) -> Result<Vec<u8>, FetchError> {
        if !self.force || self.offline {
            match self.cache.get_checked(&req.key) {
                Ok(Some(bytes)) => {
                    self.counters.cache_hits.fetch_add(1, Ordering::Relaxed);
                    debug!(id = %req.key.id, kind = ?req.key.kind, "cache hit");
                    return Ok(bytes);
                }
                Ok(None) => {}
                Err(CacheError::Corrupt { path, reason }) if !self.offline => {
                    warn!(path = %path.display(), %reason, "corrupt cache entry, refetching");
                    self.cache.invalidate(&req.key)?;
                }
                Err(e) => return Err(e.into()),
            }
        }
        if self.offline {
            return Err(FetchError::NotCached);
        }

        let bytes = self.fetch_remote(&req.url, pacer)?;
        if self.force {
            self.cache.replace(&req.key, &bytes)?;
            self.counters.published.fetch_add(1, Ordering::Relaxed);
        } else if self.cache.put(&req.key, &bytes)? {
            self.counters.published.fetch_add(1, Ordering::Relaxed);
        }
        Ok(bytes)
    }

    fn fetch_remote(&self, url: &str, pacer: &mut Pacer) -> Result<Vec<u8>, FetchError> {
        let mut attempts = 0u32;
        let mut failures = 0u32;
        loop {
            if self.cancel.is_cancelled() {
                return Err(FetchError::Cancelled);
            }
            pacer.wait();
            if self.cancel.is_cancelled() {
                return Err(FetchError::Cancelled);
            }
            attempts += 1;
            self.counters.network_calls.fetch_add(1, Ordering::Relaxed);
            debug!(url, attempt = attempts, "GET");

            let err = match self.transport.get(url).and_then(check_json) {
                Ok(bytes) => return Ok(bytes),
                Err(e) => e,
            };

            if err.is_rate_limited() {
                self.counters.rate_limited.fetch_add(1, Ordering::Relaxed);
                if attempts >= self.opts.rate_limit_retries {
                    return Err(FetchError::RateLimited { attempts });
                }
            } else if err.is_retryable() {
                failures += 1;
                if failures >= self.opts.max_retries {
                    return Err(FetchError::Transient { attempts, last: err });
                }
            } else {
                return Err(FetchError::Fatal(err));
            }

            let wait = self.retry_wait(attempts);
            self.counters.retries.fetch_add(1, Ordering::Relaxed);
            warn!(url, attempt = attempts, error = %err, wait_ms = wait.as_millis() as u64, "retrying");
            thread::sleep(wait);
        }
    }

    fn retry_wait(&self, retry: u32) -> Duration {
        let base = backoff_delay(Duration::from_millis(self.opts.backoff_base_ms), retry);
        let jitter = if self.opts.jitter_ms > 0 {
            rand::thread_rng().gen_range(0..=self.opts.jitter_ms)
        } else {
            0
        };
        base + Duration::from_millis(jitter)
    }
}

/// A 2xx body that does not parse is treated like a dropped connection.
fn check_json(bytes: Vec<u8>) -> Result<Vec<u8>, TransportError> {
    match serde_json::from_slice::<serde::de::IgnoredAny>(&bytes) {
        Ok(_) => Ok(bytes),
        Err(e) => Err(TransportError::Body(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles() {
        let b = Duration::from_millis(100);
        assert_eq!(backoff_delay(b, 1), Duration::from_millis(100));
        assert_eq!(backoff_delay(b, 2), Duration::from_millis(200));
        assert_eq!(backoff_delay(b, 4), Duration::from_millis(800));
        // clamped, never overflows
        assert!(backoff_delay(b, 200) >= backoff_delay(b, 17));
    }

    #[test]
    fn pacer_spaces_starts() {
        let mut p = Pacer::new(Duration::from_millis(30), Duration::ZERO);
        let t0 = Instant::now();
        p.wait();
        p.wait();
        assert!(t0.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn body_must_be_json() {
        assert!(check_json(b"{\"a\":1}".to_vec()).is_ok());
        assert!(matches!(check_json(b"<html>".to_vec()), Err(TransportError::Body(_))));
    }

    #[test]
    fn cancel_token_is_shared() {
        let t = CancelToken::default();
        let u = t.clone();
        u.cancel();
        assert!(t.is_cancelled());
    }
}
