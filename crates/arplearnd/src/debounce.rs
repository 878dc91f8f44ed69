//! Per-address debounce for neighbor upserts
//!
//! ARP requests for the same sender can arrive many times per second. The
//! store remembers when each address was last acted upon and lets at most
//! one upsert through per window. Entries not refreshed for
//! `window * retention_multiplier` are dropped by [`DebounceStore::sweep`].

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Default debounce window
pub const DEFAULT_DEBOUNCE_WINDOW: Duration = Duration::from_secs(60);

/// Default number of windows an idle entry is kept
pub const DEFAULT_RETENTION_MULTIPLIER: u32 = 10;

/// Maps an observed address to the time it was last acted upon.
///
/// Owned by a single consumer; not synchronized.
#[derive(Debug)]
pub struct DebounceStore {
    window: Duration,
    retention: Duration,
    last_acted: HashMap<Ipv4Addr, Instant>,
}

impl DebounceStore {
    pub fn new(window: Duration, retention_multiplier: u32) -> Self {
        Self {
            window,
            retention: window.saturating_mul(retention_multiplier.max(1)),
            last_acted: HashMap::new(),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Returns true and records `now` if `address` is new or its last action
    /// is more than one window old. Otherwise leaves the store untouched.
    pub fn should_act(&mut self, address: Ipv4Addr, now: Instant) -> bool {
        if let Some(last) = self.last_acted.get(&address) {
            if now.saturating_duration_since(*last) <= self.window {
                return false;
            }
        }
        self.last_acted.insert(address, now);
        true
    }

    /// Evict entries idle for longer than the retention period. Returns the
    /// number of evicted entries.
    pub fn sweep(&mut self, now: Instant) -> usize {
        let before = self.last_acted.len();
        let retention = self.retention;
        self.last_acted
            .retain(|_, last| now.saturating_duration_since(*last) <= retention);
        let evicted = before - self.last_acted.len();
        if evicted > 0 {
            debug!(evicted, remaining = self.last_acted.len(), "Swept debounce store");
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.last_acted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_acted.is_empty()
    }
}

impl Default for DebounceStore {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE_WINDOW, DEFAULT_RETENTION_MULTIPLIER)
    }
}
