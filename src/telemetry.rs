//! In-process metrics and request correlation.
//!
//! Counters are plain atomics shared by every tool call. A snapshot is logged
//! at shutdown; nothing is exported.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Generate a short correlation ID (8 characters) for compact logging.
pub fn generate_short_correlation_id() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

/// Correlation information carried through one tool call.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Unique identifier for this request.
    pub correlation_id: String,
    /// When the request was received.
    pub start_time: Instant,
    /// Tool being invoked.
    pub tool: &'static str,
}

impl RequestContext {
    /// Create a context for a tool call with a generated correlation ID.
    pub fn new(tool: &'static str) -> Self {
        Self {
            correlation_id: generate_short_correlation_id(),
            start_time: Instant::now(),
            tool,
        }
    }

    /// Get the elapsed time since the request started.
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Create a log prefix for consistent logging format.
    pub fn log_prefix(&self) -> String {
        format!("[{}] [{}]", self.correlation_id, self.tool)
    }
}

/// Server metrics collection.
#[derive(Debug, Default)]
pub struct ServerMetrics {
    /// Tool invocations, whatever their outcome.
    pub tool_calls: AtomicU64,

    /// Tool invocations that returned error text.
    pub tool_failures: AtomicU64,

    /// Tool invocations answered without a database round trip.
    pub short_circuits: AtomicU64,

    /// Queries sent to SQL Server.
    pub queries_total: AtomicU64,

    /// Queries that failed.
    pub queries_failed: AtomicU64,

    /// Rows returned by successful queries.
    pub rows_returned: AtomicU64,

    /// Total query execution time in milliseconds.
    pub query_time_ms_total: AtomicU64,
}

impl ServerMetrics {
    /// Create a new metrics collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome of a tool call.
    pub fn record_tool_call(&self, success: bool) {
        self.tool_calls.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.tool_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a call answered without querying.
    pub fn record_short_circuit(&self) {
        self.short_circuits.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a query execution.
    pub fn record_query(&self, rows: Option<usize>, duration: Duration) {
        self.queries_total.fetch_add(1, Ordering::Relaxed);
        match rows {
            Some(rows) => {
                self.rows_returned.fetch_add(rows as u64, Ordering::Relaxed);
            }
            None => {
                self.queries_failed.fetch_add(1, Ordering::Relaxed);
            }
        }
        self.query_time_ms_total
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    /// Get a snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            tool_calls: self.tool_calls.load(Ordering::Relaxed),
            tool_failures: self.tool_failures.load(Ordering::Relaxed),
            short_circuits: self.short_circuits.load(Ordering::Relaxed),
            queries_total: self.queries_total.load(Ordering::Relaxed),
            queries_failed: self.queries_failed.load(Ordering::Relaxed),
            rows_returned: self.rows_returned.load(Ordering::Relaxed),
            query_time_ms_total: self.query_time_ms_total.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of metrics at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    pub tool_calls: u64,
    pub tool_failures: u64,
    pub short_circuits: u64,
    pub queries_total: u64,
    pub queries_failed: u64,
    pub rows_returned: u64,
    pub query_time_ms_total: u64,
}

impl MetricsSnapshot {
    /// Calculate average query time in milliseconds.
    pub fn avg_query_time_ms(&self) -> f64 {
        if self.queries_total == 0 {
            return 0.0;
        }
        self.query_time_ms_total as f64 / self.queries_total as f64
    }

    /// Calculate query success rate as a percentage.
    pub fn success_rate(&self) -> f64 {
        if self.queries_total == 0 {
            return 100.0;
        }
        let succeeded = self.queries_total - self.queries_failed;
        (succeeded as f64 / self.queries_total as f64) * 100.0
    }
}

/// Shared metrics type for thread-safe access.
pub type SharedMetrics = Arc<ServerMetrics>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_recording() {
        let metrics = ServerMetrics::new();

        metrics.record_query(Some(3), Duration::from_millis(100));
        metrics.record_query(Some(0), Duration::from_millis(200));
        metrics.record_query(None, Duration::from_millis(50));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.queries_total, 3);
        assert_eq!(snapshot.queries_failed, 1);
        assert_eq!(snapshot.rows_returned, 3);
        assert_eq!(snapshot.query_time_ms_total, 350);
    }

    #[test]
    fn test_tool_call_recording() {
        let metrics = ServerMetrics::new();

        metrics.record_tool_call(true);
        metrics.record_tool_call(false);
        metrics.record_short_circuit();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.tool_calls, 2);
        assert_eq!(snapshot.tool_failures, 1);
        assert_eq!(snapshot.short_circuits, 1);
    }

    #[test]
    fn test_snapshot_rates() {
        let metrics = ServerMetrics::new();
        let empty = metrics.snapshot();
        assert_eq!(empty.success_rate(), 100.0);
        assert_eq!(empty.avg_query_time_ms(), 0.0);

        metrics.record_query(Some(1), Duration::from_millis(100));
        metrics.record_query(Some(1), Duration::from_millis(100));
        metrics.record_query(Some(1), Duration::from_millis(100));
        metrics.record_query(None, Duration::from_millis(100));

        let snapshot = metrics.snapshot();
        assert!((snapshot.success_rate() - 75.0).abs() < 0.01);
        assert!((snapshot.avg_query_time_ms() - 100.0).abs() < 0.01);
    }

    #[test]
    fn test_correlation_ids() {
        let id1 = generate_short_correlation_id();
        let id2 = generate_short_correlation_id();
        assert_ne!(id1, id2);
        assert_eq!(id1.len(), 8);
        assert!(id1.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_request_context_log_prefix() {
        let mut ctx = RequestContext::new("get-server-info");
        assert_eq!(ctx.correlation_id.len(), 8);

        ctx.correlation_id = "abc12345".to_string();
        assert_eq!(ctx.log_prefix(), "[abc12345] [get-server-info]");
    }
}
