//! Process-wide counters for InvoicePay
//!
//! - Atomic counters for requests, invoices, emails and webhooks
//! - A bounded ring buffer of request durations for percentiles
//! - Labeled breakdowns (path/status, error kind, webhook outcome)
//! - Prometheus text export served at `GET /metrics`
//!
//! ```rust,no_run
//! use invoicepay::metrics::global_metrics;
//! use std::time::Duration;
//!
//! global_metrics().record_request("/invoices", 201, Duration::from_millis(150));
//! let output = global_metrics().to_prometheus_format();
//! ```

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use axum::http::header;
use axum::response::IntoResponse;
use parking_lot::RwLock;

use crate::invoice::model::InvoiceStatus;

/// Duration samples kept for percentiles
const MAX_HISTOGRAM_SAMPLES: usize = 1000;

const PREFIX: &str = "invoicepay";

/// Metrics collector
#[derive(Debug)]
pub struct Metrics {
    pub requests_total: AtomicU64,
    pub errors_total: AtomicU64,
    pub invoices_created_total: AtomicU64,
    pub invoices_deleted_total: AtomicU64,
    pub payment_link_failures_total: AtomicU64,
    /// Compensating deletes that themselves failed; each needs manual cleanup
    pub compensation_failures_total: AtomicU64,
    pub emails_sent_total: AtomicU64,
    pub emails_failed_total: AtomicU64,
    pub webhooks_total: AtomicU64,
    pub invoices_paid_total: AtomicU64,
    pub invoices_overdue_total: AtomicU64,

    request_durations: RwLock<RingBuffer<Duration>>,
    requests_by_path_status: RwLock<HashMap<(String, u16), u64>>,
    errors_by_kind: RwLock<HashMap<String, u64>>,
    webhooks_by_outcome: RwLock<HashMap<String, u64>>,

    start_time: Instant,
}

/// Fixed-capacity sample buffer; the oldest sample is overwritten first
#[derive(Debug)]
struct RingBuffer<T> {
    data: Vec<T>,
    capacity: usize,
    write_pos: usize,
}

impl<T: Clone + Ord> RingBuffer<T> {
    fn new(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            capacity,
            write_pos: 0,
        }
    }

    fn push(&mut self, value: T) {
        if self.data.len() < self.capacity {
            self.data.push(value);
        } else {
            self.data[self.write_pos] = value;
        }
        self.write_pos = (self.write_pos + 1) % self.capacity;
    }

    /// Nearest-rank percentile, `p` in `0.0..=1.0`
    fn percentile(&self, p: f64) -> Option<T> {
        if self.data.is_empty() {
            return None;
        }
        let mut sorted = self.data.clone();
        sorted.sort();
        let idx = ((sorted.len() as f64 - 1.0) * p).round() as usize;
        sorted.get(idx).cloned()
    }
}

fn bump(map: &RwLock<HashMap<String, u64>>, key: &str) {
    *map.write().entry(key.to_string()).or_insert(0) += 1;
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            requests_total: AtomicU64::new(0),
            errors_total: AtomicU64::new(0),
            invoices_created_total: AtomicU64::new(0),
            invoices_deleted_total: AtomicU64::new(0),
            payment_link_failures_total: AtomicU64::new(0),
            compensation_failures_total: AtomicU64::new(0),
            emails_sent_total: AtomicU64::new(0),
            emails_failed_total: AtomicU64::new(0),
            webhooks_total: AtomicU64::new(0),
            invoices_paid_total: AtomicU64::new(0),
            invoices_overdue_total: AtomicU64::new(0),
            request_durations: RwLock::new(RingBuffer::new(MAX_HISTOGRAM_SAMPLES)),
            requests_by_path_status: RwLock::new(HashMap::new()),
            errors_by_kind: RwLock::new(HashMap::new()),
            webhooks_by_outcome: RwLock::new(HashMap::new()),
            start_time: Instant::now(),
        }
    }

    /// Record a served request
    pub fn record_request(&self, path: &str, status_code: u16, duration: Duration) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        self.request_durations.write().push(duration);
        *self
            .requests_by_path_status
            .write()
            .entry((path.to_string(), status_code))
            .or_insert(0) += 1;
    }

    /// Record an error response by kind
    pub fn record_error(&self, kind: &str) {
        self.errors_total.fetch_add(1, Ordering::Relaxed);
        bump(&self.errors_by_kind, kind);
    }

    pub fn record_invoice_created(&self) {
        self.invoices_created_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_invoice_deleted(&self) {
        self.invoices_deleted_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_payment_link_failure(&self) {
        self.payment_link_failures_total
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_compensation_failure(&self) {
        self.compensation_failures_total
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_email(&self, delivered: bool) {
        let counter = if delivered {
            &self.emails_sent_total
        } else {
            &self.emails_failed_total
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a webhook delivery by outcome label
    pub fn record_webhook(&self, outcome: &str) {
        self.webhooks_total.fetch_add(1, Ordering::Relaxed);
        bump(&self.webhooks_by_outcome, outcome);
    }

    /// Record a reconciliation status transition
    pub fn record_transition(&self, to: InvoiceStatus) {
        match to {
            InvoiceStatus::Paid => self.invoices_paid_total.fetch_add(1, Ordering::Relaxed),
            InvoiceStatus::Overdue => self.invoices_overdue_total.fetch_add(1, Ordering::Relaxed),
            InvoiceStatus::Unpaid | InvoiceStatus::Failed => return,
        };
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Render all metrics in Prometheus text exposition format
    pub fn to_prometheus_format(&self) -> String {
        let mut output = String::new();

        let counters: [(&str, &str, &AtomicU64); 11] = [
            ("requests_total", "HTTP requests served", &self.requests_total),
            ("errors_total", "Error responses", &self.errors_total),
            ("invoices_created_total", "Invoices created with a payment link", &self.invoices_created_total),
            ("invoices_deleted_total", "Invoices deleted by owners", &self.invoices_deleted_total),
            ("payment_link_failures_total", "Checkout session creations that failed", &self.payment_link_failures_total),
            ("compensation_failures_total", "Rollbacks that could not delete the partial invoice", &self.compensation_failures_total),
            ("emails_sent_total", "Invoice emails accepted for delivery", &self.emails_sent_total),
            ("emails_failed_total", "Invoice emails that failed", &self.emails_failed_total),
            ("webhooks_total", "Webhook deliveries received", &self.webhooks_total),
            ("invoices_paid_total", "Invoices transitioned to PAID", &self.invoices_paid_total),
            ("invoices_overdue_total", "Invoices transitioned to OVERDUE", &self.invoices_overdue_total),
        ];
        for (name, help, value) in counters {
            let _ = writeln!(output, "# HELP {PREFIX}_{name} {help}");
            let _ = writeln!(output, "# TYPE {PREFIX}_{name} counter");
            let _ = writeln!(output, "{PREFIX}_{name} {}", value.load(Ordering::Relaxed));
        }

        let mut by_path: Vec<_> = self
            .requests_by_path_status
            .read()
            .iter()
            .map(|((path, status), count)| (path.clone(), *status, *count))
            .collect();
        by_path.sort();
        for (path, status, count) in by_path {
            let _ = writeln!(
                output,
                "{PREFIX}_requests_by_path_total{{path=\"{path}\",status=\"{status}\"}} {count}"
            );
        }

        for (metric, map, label) in [
            ("errors_by_kind_total", &self.errors_by_kind, "kind"),
            ("webhooks_by_outcome_total", &self.webhooks_by_outcome, "outcome"),
        ] {
            let mut entries: Vec<_> = map.read().iter().map(|(k, v)| (k.clone(), *v)).collect();
            entries.sort();
            for (key, count) in entries {
                let _ = writeln!(output, "{PREFIX}_{metric}{{{label}=\"{key}\"}} {count}");
            }
        }

        let durations = self.request_durations.read();
        for (suffix, p) in [("p50", 0.5), ("p95", 0.95), ("p99", 0.99)] {
            if let Some(value) = durations.percentile(p) {
                let _ = writeln!(
                    output,
                    "{PREFIX}_request_duration_{suffix}_ms {}",
                    value.as_millis()
                );
            }
        }

        let _ = writeln!(output, "{PREFIX}_uptime_seconds {}", self.uptime().as_secs());
        output
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Global metrics instance
pub static METRICS: OnceLock<Metrics> = OnceLock::new();

/// Get or initialize the global metrics instance
pub fn global_metrics() -> &'static Metrics {
    METRICS.get_or_init(Metrics::new)
}

/// `GET /metrics`
pub async fn metrics_handler() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        global_metrics().to_prometheus_format(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_recording() {
        let metrics = Metrics::new();

        metrics.record_request("/invoices", 201, Duration::from_millis(100));
        assert_eq!(metrics.requests_total.load(Ordering::Relaxed), 1);

        metrics.record_error("validation");
        metrics.record_error("validation");
        assert_eq!(metrics.errors_total.load(Ordering::Relaxed), 2);

        metrics.record_email(true);
        metrics.record_email(false);
        assert_eq!(metrics.emails_sent_total.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.emails_failed_total.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_transitions() {
        let metrics = Metrics::new();
        metrics.record_transition(InvoiceStatus::Paid);
        metrics.record_transition(InvoiceStatus::Overdue);
        metrics.record_transition(InvoiceStatus::Unpaid);
        assert_eq!(metrics.invoices_paid_total.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.invoices_overdue_total.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_prometheus_output() {
        let metrics = Metrics::new();
        metrics.record_request("/invoices", 201, Duration::from_millis(40));
        metrics.record_webhook("transitioned");
        metrics.record_error("not_found");

        let text = metrics.to_prometheus_format();
        assert!(text.contains("invoicepay_requests_total 1"));
        assert!(text.contains("# TYPE invoicepay_webhooks_total counter"));
        assert!(text.contains(r#"invoicepay_requests_by_path_total{path="/invoices",status="201"} 1"#));
        assert!(text.contains(r#"invoicepay_webhooks_by_outcome_total{outcome="transitioned"} 1"#));
        assert!(text.contains(r#"invoicepay_errors_by_kind_total{kind="not_found"} 1"#));
        assert!(text.contains("invoicepay_request_duration_p50_ms 40"));
    }

    #[test]
    fn test_ring_buffer_wraps() {
        let mut buffer = RingBuffer::new(3);
        for v in [10, 20, 30, 40] {
            buffer.push(v);
        }
        assert_eq!(buffer.data.len(), 3);
        assert_eq!(buffer.percentile(0.0), Some(20));
        assert_eq!(buffer.percentile(1.0), Some(40));
    }
}
