// src/core/net.rs
//! HTTP GET over a pooled `ureq` agent.
//!
//! The engine talks to a [`Transport`] so tests can script responses without
//! a network.

use std::io::Read;
use std::time::Duration;

use crate::config::consts::REQUEST_HEADERS;
use crate::config::FetchOptions;
use crate::error::TransportError;

/// One request attempt. No retries here; that policy lives in the engine.
pub trait Transport: Send + Sync {
    fn get(&self, url: &str) -> Result<Vec<u8>, TransportError>;
}

pub struct HttpTransport {
    agent: ureq::Agent,
}

impl HttpTransport {
    pub fn new(opts: &FetchOptions) -> Self {
        let timeout = Duration::from_secs(opts.timeout_secs.max(1));
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .timeout_connect(timeout)
            .user_agent(&opts.user_agent)
            .max_idle_connections_per_host(opts.concurrency.max(1))
            .build();
        Self { agent }
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &str) -> Result<Vec<u8>, TransportError> {
        let mut req = self.agent.get(url);
        for (k, v) in REQUEST_HEADERS {
            req = req.set(k, v);
        }
        let resp = req.call().map_err(from_ureq)?;

        let mut buf = Vec::new();
        resp.into_reader()
            .read_to_end(&mut buf)
            .map_err(|e| from_io(&e))?;
        Ok(buf)
    }
}

fn from_ureq(err: ureq::Error) -> TransportError {
    match err {
        ureq::Error::Status(code, _) => TransportError::Status(code),
        ureq::Error::Transport(t) => {
            let detail = format!("{:?} {}", t.kind(), t);
            classify_transport(&detail)
        }
    }
}

fn from_io(e: &std::io::Error) -> TransportError {
    use std::io::ErrorKind::*;
    match e.kind() {
        TimedOut | WouldBlock => TransportError::Timeout,
        ConnectionReset | ConnectionAborted | BrokenPipe | UnexpectedEof => TransportError::ConnectionReset,
        _ => TransportError::Body(e.to_string()),
    }
}

fn classify_transport(detail: &str) -> TransportError {
    let lower = detail.to_ascii_lowercase();
    if lower.contains("timed out") || lower.contains("timeout") {
        TransportError::Timeout
    } else if lower.contains("reset") || lower.contains("broken pipe") || lower.contains("aborted") {
        TransportError::ConnectionReset
    } else if lower.contains("dns") || lower.contains("connect") || lower.contains("tls") || lower.starts_with("io") {
        TransportError::Connect(s!(detail))
    } else {
        TransportError::Other(s!(detail))
    }
}
