//! Scripted stand-in for the source API
//!
//! Routes are matched in insertion order by URL substring. Every request is
//! recorded so tests can assert on what was (or was not) fetched. With a
//! latency set, each request holds for that long and the peak number of
//! requests in flight is tracked.

use async_trait::async_trait;
use ecfr_ingest::services::fetcher::{HttpTransport, TransportError, TransportResponse};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone)]
pub enum Reply {
    Ok(String),
    Status(u16),
    ConnectError,
}

#[derive(Default)]
pub struct FakeSource {
    routes: Mutex<Vec<(String, Reply)>>,
    calls: Mutex<Vec<String>>,
    latency: Duration,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer requests whose URL contains `pattern`
    pub fn route(self, pattern: &str, reply: Reply) -> Self {
        self.routes
            .lock()
            .unwrap()
            .push((pattern.to_string(), reply));
        self
    }

    /// Hold every request for `latency` before answering
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Most requests ever in flight at once
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_matching(&self, pattern: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|url| url.contains(pattern))
            .count()
    }
}

#[async_trait]
impl HttpTransport for FakeSource {
    async fn get(&self, url: &str) -> Result<TransportResponse, TransportError> {
        self.calls.lock().unwrap().push(url.to_string());

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(current, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let reply = self
            .routes
            .lock()
            .unwrap()
            .iter()
            .find(|(pattern, _)| url.contains(pattern.as_str()))
            .map(|(_, reply)| reply.clone());

        match reply {
            Some(Reply::Ok(body)) => Ok(TransportResponse::new(200, body)),
            Some(Reply::Status(status)) => Ok(TransportResponse::new(status, Vec::new())),
            Some(Reply::ConnectError) => Err(TransportError::Connect("connection refused".into())),
            None => Ok(TransportResponse::new(404, Vec::new())),
        }
    }
}
