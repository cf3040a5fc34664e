//! Health, readiness and status endpoints
//!
//! - `/health` - liveness for load balancers
//! - `/ready`  - readiness probe
//! - `/status` - version, uptime, latency percentiles, memory, invoice counters
//!
//! ```text
//! HTTP Request ──> track_latency ──> Router ──> handler
//!                       │
//!                       ▼
//!              LatencyHistogram + global metrics
//! ```

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{MatchedPath, Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use hdrhistogram::Histogram;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sysinfo::{Pid, ProcessesToUpdate, System};
use tracing::{debug, instrument};

use crate::metrics::global_metrics;

/// Server version from Cargo.toml
pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Server name from Cargo.toml
pub const SERVER_NAME: &str = env!("CARGO_PKG_NAME");

/// Liveness/readiness body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "healthy".to_string(),
        }
    }
}

/// Detailed server status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub version: String,
    pub name: String,
    pub uptime_seconds: u64,
    pub invoices: InvoiceCounters,
    pub memory: MemoryMetrics,
    pub latency: LatencyMetrics,
    pub status: String,
    /// RFC 3339 time the status was generated
    pub timestamp: String,
}

/// Invoice activity since start
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceCounters {
    pub created: u64,
    pub deleted: u64,
    pub paid: u64,
    pub overdue: u64,
    pub payment_link_failures: u64,
    pub emails_failed: u64,
    pub webhooks: u64,
}

impl InvoiceCounters {
    fn snapshot() -> Self {
        let m = global_metrics();
        Self {
            created: m.invoices_created_total.load(Ordering::Relaxed),
            deleted: m.invoices_deleted_total.load(Ordering::Relaxed),
            paid: m.invoices_paid_total.load(Ordering::Relaxed),
            overdue: m.invoices_overdue_total.load(Ordering::Relaxed),
            payment_link_failures: m.payment_link_failures_total.load(Ordering::Relaxed),
            emails_failed: m.emails_failed_total.load(Ordering::Relaxed),
            webhooks: m.webhooks_total.load(Ordering::Relaxed),
        }
    }
}

/// Process memory from sysinfo
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryMetrics {
    /// Resident set size (bytes)
    pub rss_bytes: u64,
    /// Virtual memory size (bytes)
    pub virtual_bytes: u64,
}

/// Request latency percentiles in milliseconds
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LatencyMetrics {
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
    pub total_requests: u64,
    pub mean_ms: f64,
    pub max_ms: f64,
}

/// Thread-safe latency histogram, 1µs to 60s at 3 significant figures
#[derive(Debug)]
pub struct LatencyHistogram {
    inner: RwLock<Histogram<u64>>,
}

impl LatencyHistogram {
    pub fn new() -> Self {
        let histogram =
            Histogram::new_with_bounds(1, 60_000_000, 3).expect("valid histogram bounds");
        Self {
            inner: RwLock::new(histogram),
        }
    }

    /// Record a duration; values outside the bounds are saturated
    pub fn record_duration(&self, duration: std::time::Duration) {
        let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);
        self.inner.write().saturating_record(micros.max(1));
    }

    pub fn count(&self) -> u64 {
        self.inner.read().len()
    }

    pub fn metrics(&self) -> LatencyMetrics {
        let hist = self.inner.read();
        if hist.is_empty() {
            return LatencyMetrics::default();
        }
        LatencyMetrics {
            p50_ms: hist.value_at_percentile(50.0) as f64 / 1000.0,
            p95_ms: hist.value_at_percentile(95.0) as f64 / 1000.0,
            p99_ms: hist.value_at_percentile(99.0) as f64 / 1000.0,
            total_requests: hist.len(),
            mean_ms: hist.mean() / 1000.0,
            max_ms: hist.max() as f64 / 1000.0,
        }
    }
}

impl Default for LatencyHistogram {
    fn default() -> Self {
        Self::new()
    }
}

/// State behind the status routes and the latency middleware
#[derive(Debug)]
pub struct StatusState {
    start_time: Instant,
    latency: LatencyHistogram,
}

impl StatusState {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            latency: LatencyHistogram::new(),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn record_latency(&self, duration: std::time::Duration) {
        self.latency.record_duration(duration);
    }

    pub fn latency_metrics(&self) -> LatencyMetrics {
        self.latency.metrics()
    }
}

impl Default for StatusState {
    fn default() -> Self {
        Self::new()
    }
}

fn collect_memory_metrics() -> MemoryMetrics {
    let pid = Pid::from_u32(std::process::id());
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);

    match system.process(pid) {
        Some(process) => MemoryMetrics {
            rss_bytes: process.memory(),
            virtual_bytes: process.virtual_memory(),
        },
        None => {
            debug!("Could not find current process in sysinfo");
            MemoryMetrics::default()
        }
    }
}

/// `GET /health`
#[instrument(skip_all)]
pub async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthResponse::default()))
}

/// `GET /ready`
#[instrument(skip_all)]
pub async fn readiness_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthResponse::default()))
}

/// `GET /status`
#[instrument(skip_all)]
pub async fn status_handler(State(state): State<Arc<StatusState>>) -> impl IntoResponse {
    debug!("Status check requested");

    let response = StatusResponse {
        version: SERVER_VERSION.to_string(),
        name: SERVER_NAME.to_string(),
        uptime_seconds: state.uptime_seconds(),
        invoices: InvoiceCounters::snapshot(),
        memory: collect_memory_metrics(),
        latency: state.latency_metrics(),
        status: "running".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    };

    (StatusCode::OK, Json(response))
}

/// Middleware recording every request's latency and outcome
pub async fn track_latency(
    State(state): State<Arc<StatusState>>,
    request: Request,
    next: Next,
) -> Response {
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let started = Instant::now();
    let response = next.run(request).await;
    let elapsed = started.elapsed();

    state.record_latency(elapsed);
    global_metrics().record_request(&path, response.status().as_u16(), elapsed);
    response
}

/// Router for `/health`, `/ready`, `/status` and `/metrics`
pub fn status_router(state: Arc<StatusState>) -> axum::Router {
    use axum::routing::get;

    axum::Router::new()
        .route("/health", get(health_handler))
        .route("/ready", get(readiness_handler))
        .route("/status", get(status_handler))
        .route("/metrics", get(crate::metrics::metrics_handler))
        .with_state(state)
}
