//! Prometheus metrics definitions for tradegate
//!
//! All metrics use the `tradegate_` prefix and are read-only.

use prometheus::{CounterVec, Histogram, HistogramOpts, IntCounter, Opts, Registry, TextEncoder};
use std::sync::Arc;

/// Prometheus metrics for the decision layer
#[derive(Clone)]
pub struct Metrics {
    registry: Arc<Registry>,
    /// Predictions by outcome (valid / invalid)
    pub predictions_total: CounterVec,
    /// Confidence gate decisions (accepted / rejected)
    pub gate_decisions_total: CounterVec,
    /// Lifecycle transitions (opened / closed)
    pub lifecycle_events_total: CounterVec,
    /// Pending intents overwritten before confirmation
    pub lost_intents_total: IntCounter,
    /// Retraining record delivery failures by record kind
    pub journal_failures_total: CounterVec,
    /// Prediction round-trip latency in seconds
    pub prediction_latency_seconds: Histogram,
}

impl Metrics {
    /// Create a new Metrics instance with all counters registered
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let predictions_total = CounterVec::new(
            Opts::new("tradegate_predictions_total", "Predictions by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(predictions_total.clone()))?;

        let gate_decisions_total = CounterVec::new(
            Opts::new(
                "tradegate_gate_decisions_total",
                "Confidence gate decisions",
            ),
            &["decision"],
        )?;
        registry.register(Box::new(gate_decisions_total.clone()))?;

        let lifecycle_events_total = CounterVec::new(
            Opts::new(
                "tradegate_lifecycle_events_total",
                "Trade lifecycle transitions",
            ),
            &["event"],
        )?;
        registry.register(Box::new(lifecycle_events_total.clone()))?;

        let lost_intents_total = IntCounter::with_opts(Opts::new(
            "tradegate_lost_intents_total",
            "Pending trade intents overwritten before confirmation",
        ))?;
        registry.register(Box::new(lost_intents_total.clone()))?;

        let journal_failures_total = CounterVec::new(
            Opts::new(
                "tradegate_journal_failures_total",
                "Retraining record delivery failures",
            ),
            &["record"],
        )?;
        registry.register(Box::new(journal_failures_total.clone()))?;

        let prediction_latency_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "tradegate_prediction_latency_seconds",
                "Prediction request latency in seconds",
            )
            .buckets(vec![0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        )?;
        registry.register(Box::new(prediction_latency_seconds.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            predictions_total,
            gate_decisions_total,
            lifecycle_events_total,
            lost_intents_total,
            journal_failures_total,
            prediction_latency_seconds,
        })
    }

    /// Render all metrics in Prometheus text format
    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        encoder
            .encode_to_string(&metric_families)
            .unwrap_or_default()
    }

    pub fn inc_prediction(&self, outcome: &str) {
        self.predictions_total.with_label_values(&[outcome]).inc();
    }

    pub fn inc_gate_decision(&self, accepted: bool) {
        let decision = if accepted { "accepted" } else { "rejected" };
        self.gate_decisions_total
            .with_label_values(&[decision])
            .inc();
    }

    pub fn inc_lifecycle(&self, event: &str) {
        self.lifecycle_events_total
            .with_label_values(&[event])
            .inc();
    }

    pub fn inc_journal_failure(&self, record: &str) {
        self.journal_failures_total
            .with_label_values(&[record])
            .inc();
    }
}
