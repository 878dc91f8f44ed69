//! ARP Learning Daemon
//!
//! Watches ARP traffic on a set of interfaces through an ingress tc
//! classifier and programs each observed sender binding (IPv4 -> MAC) into
//! the kernel neighbor table of an egress interface, so peers seen only
//! indirectly are reachable without waiting for ARP resolution.
//!
//! # Architecture
//!
//! ```text
//! +-----------------+     +---------------------------------------+     +----------------+
//! | monitored ifs   |     |               arplearnd               |     | Linux kernel   |
//! |                 |     |                                       |     |                |
//! | clsact ingress  |---->| RingBufSource -> AddressAnnouncement  |     |                |
//! | (ARP classifier)|     |        |               |              |     |                |
//! |  events ringbuf |     |        v               v              |     | neighbor table |
//! +-----------------+     |  NeighborLearner -> DebounceStore     |     | (egress if)    |
//!                         |        |                              |     |                |
//!                         |        +--> NetlinkNeighborTable -----|---->| RTM_NEWNEIGH   |
//!                         +---------------------------------------+     +----------------+
//! ```

pub mod attach;
pub mod config;
pub mod debounce;
pub mod error;
pub mod event;
pub mod learner;
#[cfg(target_os = "linux")]
pub mod loader;
pub mod metrics;
pub mod metrics_server;
pub mod netlink;
pub mod source;
pub mod types;

pub use attach::{FilterAttacher, MonitoredInterface, attach_all};
pub use config::{Args, LearnerConfig};
pub use debounce::DebounceStore;
pub use error::{ArpLearnError, Result};
pub use event::{AddressAnnouncement, ArpOperation, EVENT_RECORD_LEN};
pub use learner::{LearnerState, NeighborLearner, RecordOutcome};
pub use metrics::MetricsCollector;
pub use metrics_server::start_metrics_server;
pub use netlink::{NeighborTable, NetlinkNeighborTable};
pub use source::{EventSource, SourceEvent};
pub use types::{MacAddress, NeighborEntry, NeighborState};
