//! Prometheus metrics collection for arplearnd

use prometheus::{Counter, Gauge, Opts, Registry};
use std::sync::Arc;

/// Metrics collector shared between the learner and the metrics server
#[derive(Clone)]
pub struct MetricsCollector {
    // Counters
    pub events_received_total: Counter,
    pub decode_errors_total: Counter,
    pub read_errors_total: Counter,
    pub announcements_debounced_total: Counter,
    pub neighbors_upserted_total: Counter,
    pub upsert_errors_total: Counter,

    // Gauges
    pub debounce_entries: Gauge,
    pub health_status: Gauge,

    // Registry for export
    pub registry: Arc<Registry>,
}

impl MetricsCollector {
    /// Create a new metrics collector
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let events_received_total = Counter::with_opts(Opts::new(
            "arplearnd_events_received_total",
            "Total number of records read from the event source",
        ))?;
        registry.register(Box::new(events_received_total.clone()))?;

        let decode_errors_total = Counter::with_opts(Opts::new(
            "arplearnd_decode_errors_total",
            "Total number of malformed records skipped",
        ))?;
        registry.register(Box::new(decode_errors_total.clone()))?;

        let read_errors_total = Counter::with_opts(Opts::new(
            "arplearnd_read_errors_total",
            "Total number of transient event source read errors",
        ))?;
        registry.register(Box::new(read_errors_total.clone()))?;

        let announcements_debounced_total = Counter::with_opts(Opts::new(
            "arplearnd_announcements_debounced_total",
            "Total number of announcements suppressed by the debounce window",
        ))?;
        registry.register(Box::new(announcements_debounced_total.clone()))?;

        let neighbors_upserted_total = Counter::with_opts(Opts::new(
            "arplearnd_neighbors_upserted_total",
            "Total number of successful neighbor table upserts",
        ))?;
        registry.register(Box::new(neighbors_upserted_total.clone()))?;

        let upsert_errors_total = Counter::with_opts(Opts::new(
            "arplearnd_upsert_errors_total",
            "Total number of failed neighbor table upserts",
        ))?;
        registry.register(Box::new(upsert_errors_total.clone()))?;

        let debounce_entries = Gauge::with_opts(Opts::new(
            "arplearnd_debounce_entries",
            "Current number of addresses tracked by the debounce store",
        ))?;
        registry.register(Box::new(debounce_entries.clone()))?;

        let health_status = Gauge::with_opts(Opts::new(
            "arplearnd_health_status",
            "Service health status (1=running, 0=terminated)",
        ))?;
        registry.register(Box::new(health_status.clone()))?;

        Ok(Self {
            events_received_total,
            decode_errors_total,
            read_errors_total,
            announcements_debounced_total,
            neighbors_upserted_total,
            upsert_errors_total,
            debounce_entries,
            health_status,
            registry: Arc::new(registry),
        })
    }

    pub fn record_event_received(&self) {
        self.events_received_total.inc();
    }

    pub fn record_decode_error(&self) {
        self.decode_errors_total.inc();
    }

    pub fn record_read_error(&self) {
        self.read_errors_total.inc();
    }

    pub fn record_debounced(&self) {
        self.announcements_debounced_total.inc();
    }

    /// Record the outcome of one neighbor upsert
    pub fn record_upsert(&self, success: bool) {
        if success {
            self.neighbors_upserted_total.inc();
        } else {
            self.upsert_errors_total.inc();
        }
    }

    pub fn set_debounce_entries(&self, count: usize) {
        self.debounce_entries.set(count as f64);
    }

    pub fn set_running(&self, running: bool) {
        self.health_status.set(if running { 1.0 } else { 0.0 });
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new().expect("Failed to create metrics collector")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_collector_creation() {
        let collector = MetricsCollector::new().unwrap();
        assert_eq!(collector.events_received_total.get(), 0.0);
        assert_eq!(collector.neighbors_upserted_total.get(), 0.0);
        assert_eq!(collector.registry.gather().len(), 8);
    }

    #[test]
    fn test_record_upsert() {
        let collector = MetricsCollector::new().unwrap();
        collector.record_upsert(true);
        collector.record_upsert(false);
        collector.record_upsert(false);
        assert_eq!(collector.neighbors_upserted_total.get(), 1.0);
        assert_eq!(collector.upsert_errors_total.get(), 2.0);
    }

    #[test]
    fn test_running_status() {
        let collector = MetricsCollector::new().unwrap();
        collector.set_running(true);
        assert_eq!(collector.health_status.get(), 1.0);
        collector.set_running(false);
        assert_eq!(collector.health_status.get(), 0.0);
    }
}
