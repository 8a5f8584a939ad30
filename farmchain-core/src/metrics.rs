//! Metrics collection for observability
//!
//! # Metrics
//!
//! - `farmchain_batches_total` - Batches created
//! - `farmchain_events_total` - Events appended
//! - `farmchain_illegal_transitions_total` - Rejected lifecycle transitions
//! - `farmchain_tx_submitted_total` - Mock transactions submitted
//! - `farmchain_tx_confirmed_total` - Mock transactions confirmed
//! - `farmchain_tx_failed_total` - Mock transactions failed
//! - `farmchain_append_duration_seconds` - Append latency histogram

use prometheus::{Histogram, HistogramOpts, IntCounter, Registry};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Batches created
    pub batches_total: IntCounter,

    /// Events appended
    pub events_total: IntCounter,

    /// Rejected lifecycle transitions
    pub illegal_transitions_total: IntCounter,

    /// Mock transactions submitted
    pub tx_submitted_total: IntCounter,

    /// Mock transactions confirmed
    pub tx_confirmed_total: IntCounter,

    /// Mock transactions failed
    pub tx_failed_total: IntCounter,

    /// Append latency histogram
    pub append_duration: Histogram,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector with its own registry
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let batches_total =
            IntCounter::new("farmchain_batches_total", "Batches created")?;
        registry.register(Box::new(batches_total.clone()))?;

        let events_total =
            IntCounter::new("farmchain_events_total", "Events appended")?;
        registry.register(Box::new(events_total.clone()))?;

        let illegal_transitions_total = IntCounter::new(
            "farmchain_illegal_transitions_total",
            "Rejected lifecycle transitions",
        )?;
        registry.register(Box::new(illegal_transitions_total.clone()))?;

        let tx_submitted_total =
            IntCounter::new("farmchain_tx_submitted_total", "Mock transactions submitted")?;
        registry.register(Box::new(tx_submitted_total.clone()))?;

        let tx_confirmed_total =
            IntCounter::new("farmchain_tx_confirmed_total", "Mock transactions confirmed")?;
        registry.register(Box::new(tx_confirmed_total.clone()))?;

        let tx_failed_total =
            IntCounter::new("farmchain_tx_failed_total", "Mock transactions failed")?;
        registry.register(Box::new(tx_failed_total.clone()))?;

        let append_duration = Histogram::with_opts(
            HistogramOpts::new(
                "farmchain_append_duration_seconds",
                "Histogram of append latencies",
            )
            .buckets(vec![0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0]),
        )?;
        registry.register(Box::new(append_duration.clone()))?;

        Ok(Self {
            batches_total,
            events_total,
            illegal_transitions_total,
            tx_submitted_total,
            tx_confirmed_total,
            tx_failed_total,
            append_duration,
            registry,
        })
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new().expect("Failed to create metrics")
    }
}
