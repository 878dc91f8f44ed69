//! Event sources feeding the learner
//!
//! A source yields raw announcement records in delivery order until it is
//! closed. Closing is a separate action (a cancellation token shared with
//! the signal handler); once it has happened the next `recv` reports
//! [`SourceEvent::Closed`] without reading further records.

use crate::error::Result;
use async_trait::async_trait;

/// Outcome of one read from an event source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceEvent {
    /// One raw record, exactly as produced by the classifier
    Record(Vec<u8>),
    /// Orderly shutdown
    Closed,
}

#[async_trait]
pub trait EventSource {
    /// Wait for the next record. Errors are transient read failures.
    async fn recv(&mut self) -> Result<SourceEvent>;
}

#[cfg(target_os = "linux")]
mod linux {
    use super::{EventSource, SourceEvent};
    use crate::error::{ArpLearnError, Result};
    use async_trait::async_trait;
    use aya::maps::{MapData, RingBuf};
    use tokio::io::unix::AsyncFd;
    use tokio_util::sync::CancellationToken;
    use tracing::debug;

    /// Reads records from the classifier's ring buffer map.
    ///
    /// Readiness comes from epoll on the map fd, so an idle source costs
    /// nothing.
    pub struct RingBufSource {
        ring_buf: AsyncFd<RingBuf<MapData>>,
        shutdown: CancellationToken,
    }

    impl RingBufSource {
        pub fn new(ring_buf: RingBuf<MapData>, shutdown: CancellationToken) -> Result<Self> {
            let ring_buf = AsyncFd::new(ring_buf).map_err(|e| {
                ArpLearnError::Map(format!("failed to register ring buffer fd: {}", e))
            })?;
            Ok(Self { ring_buf, shutdown })
        }
    }

    #[async_trait]
    impl EventSource for RingBufSource {
        async fn recv(&mut self) -> Result<SourceEvent> {
            loop {
                if self.shutdown.is_cancelled() {
                    return Ok(SourceEvent::Closed);
                }

                if let Some(item) = self.ring_buf.get_mut().next() {
                    return Ok(SourceEvent::Record(item.to_vec()));
                }

                tokio::select! {
                    biased;
                    _ = self.shutdown.cancelled() => {
                        debug!("Event source closed");
                        return Ok(SourceEvent::Closed);
                    }
                    ready = self.ring_buf.readable_mut() => {
                        let mut guard = ready.map_err(|e| {
                            ArpLearnError::EventSource(format!("ring buffer poll failed: {}", e))
                        })?;
                        guard.clear_ready();
                    }
                }
            }
        }
    }
}

#[cfg(target_os = "linux")]
pub use linux::RingBufSource;
