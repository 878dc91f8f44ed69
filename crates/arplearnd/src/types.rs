//! Core types for neighbor learning

use crate::error::{ArpLearnError, Result};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

/// MAC address representation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MacAddress(pub [u8; 6]);

impl MacAddress {
    pub const fn new(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    #[inline]
    pub fn octets(&self) -> [u8; 6] {
        self.0
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

/// Parse MAC from colon-separated string (e.g., "00:11:22:33:44:55")
impl FromStr for MacAddress {
    type Err = ArpLearnError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || ArpLearnError::InvalidHardwareAddress(s.to_string());

        let mut bytes = [0u8; 6];
        let mut parts = s.split(':');
        for byte in bytes.iter_mut() {
            let part = parts.next().ok_or_else(invalid)?;
            if part.len() != 2 {
                return Err(invalid());
            }
            *byte = u8::from_str_radix(part, 16).map_err(|_| invalid())?;
        }
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(Self(bytes))
    }
}

/// Neighbor state requested from the kernel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NeighborState {
    /// NUD_REACHABLE
    Reachable,
}

/// Neighbor table entry programmed on the egress interface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NeighborEntry {
    /// Egress interface index
    pub ifindex: u32,
    pub ip: Ipv4Addr,
    pub mac: MacAddress,
    pub state: NeighborState,
}

impl NeighborEntry {
    /// Entry in REACHABLE state, the only state this daemon programs
    pub fn reachable(ifindex: u32, ip: Ipv4Addr, mac: MacAddress) -> Self {
        Self {
            ifindex,
            ip,
            mac,
            state: NeighborState::Reachable,
        }
    }

    /// Build a REACHABLE entry from textual addresses.
    ///
    /// A bad IPv4 address is reported as `InvalidAddress`, a bad MAC as
    /// `InvalidHardwareAddress`.
    pub fn parse(ifindex: u32, ip: &str, mac: &str) -> Result<Self> {
        let ip = Ipv4Addr::from_str(ip)
            .map_err(|_| ArpLearnError::InvalidAddress(ip.to_string()))?;
        let mac = MacAddress::from_str(mac)?;
        Ok(Self::reachable(ifindex, ip, mac))
    }
}

impl fmt::Display for NeighborEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} lladdr {} dev#{} {:?}", self.ip, self.mac, self.ifindex, self.state)
    }
}
