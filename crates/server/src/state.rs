use crate::config::ServerConfig;
use axum::http::StatusCode;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use store::{IndexStore, KvStore};

/// Shared application state: the same KV handle the ingestion side uses
/// — the HTTP server and the Discoverer/Fetcher tasks share nothing else —
/// plus the query-side rate limiter.
#[derive(Clone)]
pub struct ServerState {
    pub config: Arc<ServerConfig>,

    /// API key -> (request count this window, window start).
    pub rate_limiter: Arc<DashMap<String, (u32, std::time::Instant)>>,

    pub kv: Arc<dyn KvStore>,
    pub index: Arc<IndexStore>,
    pub request_counters: Arc<RequestCounters>,
}

impl ServerState {
    pub fn new(config: ServerConfig, kv: Arc<dyn KvStore>) -> Self {
        let index = Arc::new(IndexStore::new(kv.clone()));
        Self {
            config: Arc::new(config),
            rate_limiter: Arc::new(DashMap::new()),
            kv,
            index,
            request_counters: Arc::new(RequestCounters::default()),
        }
    }

    pub fn is_valid_api_key(&self, key: &str) -> bool {
        self.config.api_keys.contains(key)
    }

    /// Sliding-window rate limit check, independent of the ingestion
    /// side's own per-download pacing.
    pub fn check_rate_limit(&self, key: &str) -> bool {
        let now = std::time::Instant::now();
        let window = std::time::Duration::from_secs(60);
        let limit = self.config.rate_limit_per_minute;

        let mut entry = self.rate_limiter.entry(key.to_string()).or_insert((0, now));
        let (count, window_start) = entry.value_mut();

        if now.duration_since(*window_start) > window {
            *count = 0;
            *window_start = now;
        }

        if *count >= limit {
            return false;
        }

        *count += 1;
        true
    }
}

/// Server metadata for the authenticated metadata endpoint.
#[derive(Debug, serde::Serialize)]
pub struct ServerMetadata {
    pub version: String,
    pub uptime_seconds: u64,
}

/// Per-process HTTP request counters, fed by `middleware::log_requests` and
/// reported by `routes::health::metrics`. Resets on restart; this is an
/// in-process gauge, not a durable metric store.
#[derive(Default)]
pub struct RequestCounters {
    total: AtomicU64,
    success: AtomicU64,
    client_error: AtomicU64,
    server_error: AtomicU64,
}

impl RequestCounters {
    pub fn record(&self, status: StatusCode) {
        self.total.fetch_add(1, Ordering::Relaxed);
        if status.is_client_error() {
            self.client_error.fetch_add(1, Ordering::Relaxed);
        } else if status.is_server_error() {
            self.server_error.fetch_add(1, Ordering::Relaxed);
        } else {
            self.success.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> RequestCounterSnapshot {
        RequestCounterSnapshot {
            total: self.total.load(Ordering::Relaxed),
            success: self.success.load(Ordering::Relaxed),
            client_error: self.client_error.load(Ordering::Relaxed),
            server_error: self.server_error.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, serde::Serialize)]
pub struct RequestCounterSnapshot {
    pub total: u64,
    pub success: u64,
    pub client_error: u64,
    pub server_error: u64,
}
