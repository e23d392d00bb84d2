//! Metrics collection for observability
//!
//! # Metrics
//!
//! - `ledger_calls_total{operation,outcome}` - Calls handled, by outcome
//! - `ledger_invoices_total` - Invoices issued
//! - `ledger_journal_events_total` - Events committed to the journal
//! - `ledger_call_duration_seconds` - Histogram of call latencies
//!
//! Each collector owns its registry, so several ledgers can live in one
//! process (tests do this) without name collisions.

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

/// Outcome label for a committed or answered call
pub const OUTCOME_OK: &str = "ok";
/// Outcome label for a call the ledger refused
pub const OUTCOME_REJECTED: &str = "rejected";
/// Outcome label for an infrastructure failure
pub const OUTCOME_FAILED: &str = "failed";

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Calls handled
    pub calls_total: IntCounterVec,

    /// Invoices issued
    pub invoices_total: IntCounter,

    /// Events committed
    pub journal_events_total: IntCounter,

    /// Call duration histogram
    pub call_duration: Histogram,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let calls_total = IntCounterVec::new(
            Opts::new("ledger_calls_total", "Total number of calls handled"),
            &["operation", "outcome"],
        )?;
        registry.register(Box::new(calls_total.clone()))?;

        let invoices_total =
            IntCounter::new("ledger_invoices_total", "Total number of invoices issued")?;
        registry.register(Box::new(invoices_total.clone()))?;

        let journal_events_total = IntCounter::new(
            "ledger_journal_events_total",
            "Total number of events committed to the journal",
        )?;
        registry.register(Box::new(journal_events_total.clone()))?;

        let call_duration = Histogram::with_opts(
            HistogramOpts::new("ledger_call_duration_seconds", "Histogram of call latencies")
                .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.010, 0.050, 0.100, 0.500, 1.0]),
        )?;
        registry.register(Box::new(call_duration.clone()))?;

        Ok(Self {
            calls_total,
            invoices_total,
            journal_events_total,
            call_duration,
            registry,
        })
    }

    /// Record a handled call
    pub fn record_call(&self, operation: &str, outcome: &str, duration_seconds: f64) {
        self.calls_total
            .with_label_values(&[operation, outcome])
            .inc();
        self.call_duration.observe(duration_seconds);
    }

    /// Record a committed event
    pub fn record_event_committed(&self) {
        self.journal_events_total.inc();
    }

    /// Record an issued invoice
    pub fn record_invoice_issued(&self) {
        self.invoices_total.inc();
    }

    /// Calls seen for an operation/outcome pair
    pub fn calls(&self, operation: &str, outcome: &str) -> u64 {
        self.calls_total
            .with_label_values(&[operation, outcome])
            .get()
    }

    /// Render the registry in the Prometheus text format
    pub fn render(&self) -> prometheus::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics")
            .field("invoices_total", &self.invoices_total.get())
            .field("journal_events_total", &self.journal_events_total.get())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();
        assert_eq!(metrics.invoices_total.get(), 0);
        assert_eq!(metrics.journal_events_total.get(), 0);
    }

    #[test]
    fn test_collectors_do_not_collide() {
        let first = Metrics::new().unwrap();
        let second = Metrics::new().unwrap();
        first.record_invoice_issued();
        assert_eq!(first.invoices_total.get(), 1);
        assert_eq!(second.invoices_total.get(), 0);
    }

    #[test]
    fn test_record_call() {
        let metrics = Metrics::new().unwrap();
        metrics.record_call("pay_invoice", OUTCOME_OK, 0.002);
        metrics.record_call("pay_invoice", OUTCOME_REJECTED, 0.001);
        metrics.record_call("pay_invoice", OUTCOME_REJECTED, 0.001);

        assert_eq!(metrics.calls("pay_invoice", OUTCOME_OK), 1);
        assert_eq!(metrics.calls("pay_invoice", OUTCOME_REJECTED), 2);
        assert_eq!(metrics.call_duration.get_sample_count(), 3);
    }

    #[test]
    fn test_render() {
        let metrics = Metrics::new().unwrap();
        metrics.record_event_committed();
        let text = metrics.render().unwrap();
        assert!(text.contains("ledger_journal_events_total 1"));
    }
}
