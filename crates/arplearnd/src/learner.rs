//! NeighborLearner - consumes announcements and programs the neighbor table
//!
//! One consumer, strictly in delivery order: read, decode, debounce, upsert.
//! Per-event failures are logged and skipped. The loop ends only when the
//! source reports an orderly close, or when a configured limit of
//! consecutive read errors is reached.

use crate::debounce::DebounceStore;
use crate::error::{ArpLearnError, Result};
use crate::event::AddressAnnouncement;
use crate::metrics::MetricsCollector;
use crate::netlink::NeighborTable;
use crate::source::{EventSource, SourceEvent};
use crate::types::NeighborEntry;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, trace, warn};

/// Pause after a failed read before polling the source again
pub const READ_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Lifecycle of the consumption loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LearnerState {
    Running,
    Terminated,
}

/// What happened to a single record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    Upserted(NeighborEntry),
    Debounced,
    Malformed,
    UpsertFailed,
}

pub struct NeighborLearner<S, T> {
    source: S,
    table: T,
    egress_index: u32,
    debounce: DebounceStore,
    metrics: MetricsCollector,
    max_read_errors: Option<u32>,
    state: LearnerState,
    next_sweep: Instant,
}

impl<S: EventSource, T: NeighborTable> NeighborLearner<S, T> {
    /// Build a learner for an egress interface. It starts in `Running`;
    /// callers construct it only after every filter is attached.
    pub fn new(
        source: S,
        table: T,
        egress_index: u32,
        debounce: DebounceStore,
        metrics: MetricsCollector,
    ) -> Self {
        let next_sweep = Instant::now() + debounce.window();
        metrics.set_running(true);
        Self {
            source,
            table,
            egress_index,
            debounce,
            metrics,
            max_read_errors: None,
            state: LearnerState::Running,
            next_sweep,
        }
    }

    /// Give up after `limit` consecutive read errors. `0` retries forever.
    pub fn with_max_read_errors(mut self, limit: u32) -> Self {
        self.max_read_errors = (limit > 0).then_some(limit);
        self
    }

    pub fn state(&self) -> LearnerState {
        self.state
    }

    pub fn debounce(&self) -> &DebounceStore {
        &self.debounce
    }

    pub fn table(&self) -> &T {
        &self.table
    }

    /// Consume events until the source closes
    #[instrument(skip(self), fields(egress_index = self.egress_index))]
    pub async fn run(&mut self) -> Result<()> {
        info!("Listening for ARP announcements");
        let mut consecutive_errors: u32 = 0;

        while self.state == LearnerState::Running {
            match self.source.recv().await {
                Ok(SourceEvent::Closed) => {
                    info!("Event source closed, stopping");
                    self.terminate();
                }
                Ok(SourceEvent::Record(raw)) => {
                    consecutive_errors = 0;
                    let now = Instant::now();
                    self.handle_record(&raw, now);
                    self.maybe_sweep(now);
                }
                Err(e) => {
                    consecutive_errors = consecutive_errors.saturating_add(1);
                    self.metrics.record_read_error();
                    warn!(error = %e, consecutive_errors, "Reading from event source failed");

                    if let Some(limit) = self.max_read_errors {
                        if consecutive_errors >= limit {
                            error!(limit, "Too many consecutive read errors");
                            self.terminate();
                            return Err(ArpLearnError::EventSource(format!(
                                "{} consecutive read errors, last: {}",
                                consecutive_errors, e
                            )));
                        }
                    }
                    tokio::time::sleep(READ_ERROR_BACKOFF).await;
                }
            }
        }

        Ok(())
    }

    /// Decode, debounce, and upsert a single raw record observed at `now`
    pub fn handle_record(&mut self, raw: &[u8], now: Instant) -> RecordOutcome {
        self.metrics.record_event_received();

        let announcement = match AddressAnnouncement::decode(raw) {
            Ok(announcement) => announcement,
            Err(e) => {
                self.metrics.record_decode_error();
                warn!(error = %e, "Skipping malformed event record");
                return RecordOutcome::Malformed;
            }
        };

        trace!(
            ip = %announcement.sender_ip,
            mac = %announcement.sender_mac,
            op = %announcement.operation,
            "Decoded ARP announcement"
        );

        if !self.debounce.should_act(announcement.sender_ip, now) {
            self.metrics.record_debounced();
            trace!(ip = %announcement.sender_ip, "Announcement inside debounce window");
            return RecordOutcome::Debounced;
        }
        self.metrics.set_debounce_entries(self.debounce.len());

        let entry = NeighborEntry::reachable(
            self.egress_index,
            announcement.sender_ip,
            announcement.sender_mac,
        );
        match self.table.upsert(&entry) {
            Ok(()) => {
                self.metrics.record_upsert(true);
                info!(
                    ip = %entry.ip,
                    mac = %entry.mac,
                    ifindex = entry.ifindex,
                    op = %announcement.operation,
                    "Set neighbor"
                );
                RecordOutcome::Upserted(entry)
            }
            Err(e) => {
                self.metrics.record_upsert(false);
                warn!(
                    ip = %entry.ip,
                    mac = %entry.mac,
                    ifindex = entry.ifindex,
                    error = %e,
                    "Neighbor upsert failed"
                );
                RecordOutcome::UpsertFailed
            }
        }
    }

    fn maybe_sweep(&mut self, now: Instant) {
        if now < self.next_sweep {
            return;
        }
        let evicted = self.debounce.sweep(now);
        self.next_sweep = now + self.debounce.window();
        self.metrics.set_debounce_entries(self.debounce.len());
        if evicted > 0 {
            debug!(evicted, "Evicted idle debounce entries");
        }
    }

    fn terminate(&mut self) {
        self.state = LearnerState::Terminated;
        self.metrics.set_running(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EVENT_RECORD_LEN;
    use crate::types::MacAddress;
    use async_trait::async_trait;
    use std::net::Ipv4Addr;

    struct ClosedSource;

    #[async_trait]
    impl EventSource for ClosedSource {
        async fn recv(&mut self) -> Result<SourceEvent> {
            Ok(SourceEvent::Closed)
        }
    }

    #[derive(Default)]
    struct Table {
        entries: Vec<NeighborEntry>,
        reject: bool,
    }

    impl NeighborTable for Table {
        fn upsert(&mut self, entry: &NeighborEntry) -> Result<()> {
            if self.reject {
                return Err(ArpLearnError::Netlink("EPERM".into()));
            }
            self.entries.push(entry.clone());
            Ok(())
        }
    }

    fn raw(ip: [u8; 4], mac: [u8; 6]) -> Vec<u8> {
        let mut raw = vec![0u8; EVENT_RECORD_LEN];
        raw[..6].copy_from_slice(&mac);
        raw[6..10].copy_from_slice(&ip);
        raw[12] = 1;
        raw
    }

    fn learner(table: Table) -> NeighborLearner<ClosedSource, Table> {
        NeighborLearner::new(
            ClosedSource,
            table,
            7,
            DebounceStore::default(),
            MetricsCollector::new().unwrap(),
        )
    }

    #[test]
    fn test_handle_record_upserts_reachable_entry() {
        let mut learner = learner(Table::default());
        let mac = [0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff];
        let outcome = learner.handle_record(&raw([192, 0, 2, 10], mac), Instant::now());

        let expected = NeighborEntry::reachable(7, Ipv4Addr::new(192, 0, 2, 10), MacAddress(mac));
        assert_eq!(outcome, RecordOutcome::Upserted(expected.clone()));
        assert_eq!(learner.table().entries, vec![expected]);
    }

    #[test]
    fn test_handle_record_malformed() {
        let mut learner = learner(Table::default());
        assert_eq!(learner.handle_record(&[], Instant::now()), RecordOutcome::Malformed);
        assert!(learner.table().entries.is_empty());
        assert!(learner.debounce().is_empty());
    }

    #[test]
    fn test_upsert_failure_still_debounces() {
        let mut learner = learner(Table {
            reject: true,
            ..Default::default()
        });
        let t0 = Instant::now();
        let record = raw([10, 0, 0, 1], [2, 0, 0, 0, 0, 1]);
        assert_eq!(learner.handle_record(&record, t0), RecordOutcome::UpsertFailed);
        assert_eq!(
            learner.handle_record(&record, t0 + Duration::from_secs(1)),
            RecordOutcome::Debounced
        );
        assert_eq!(learner.metrics.upsert_errors_total.get(), 1.0);
    }

    #[tokio::test]
    async fn test_run_terminates_on_close() {
        let mut learner = learner(Table::default());
        assert_eq!(learner.state(), LearnerState::Running);
        learner.run().await.unwrap();
        assert_eq!(learner.state(), LearnerState::Terminated);
        assert_eq!(learner.metrics.health_status.get(), 0.0);
    }

    #[test]
    fn test_zero_read_error_limit_means_unlimited() {
        let learner = learner(Table::default()).with_max_read_errors(0);
        assert_eq!(learner.max_read_errors, None);
        let learner = learner.with_max_read_errors(3);
        assert_eq!(learner.max_read_errors, Some(3));
    }
}
