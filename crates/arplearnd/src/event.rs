//! Announcement records produced by the ingress classifier
//!
//! The classifier reserves one fixed-size record per ARP frame in the
//! events ring buffer:
//!
//! ```text
//!  0               6           10      12              16
//!  +---------------+-----------+-------+---------------+
//!  | sender HW (6) | sender IP | pad   | op code (u32) |
//!  +---------------+-----------+-------+---------------+
//! ```
//!
//! All multi-byte integers are little-endian. The sender IP is stored in
//! network byte order, exactly as it appeared on the wire.

use crate::error::{ArpLearnError, Result};
use crate::types::MacAddress;
use byteorder::{LittleEndian, ReadBytesExt};
use std::fmt;
use std::io::{Cursor, Read};
use std::net::Ipv4Addr;

/// Size of one record as laid out by the classifier
pub const EVENT_RECORD_LEN: usize = 16;

const MAC_LEN: usize = 6;
const IPV4_LEN: usize = 4;
const PADDING_LEN: usize = 2;

/// ARP operation carried by the announcement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArpOperation {
    Request,
    Reply,
    Other(u32),
}

impl From<u32> for ArpOperation {
    fn from(code: u32) -> Self {
        match code {
            1 => Self::Request,
            2 => Self::Reply,
            other => Self::Other(other),
        }
    }
}

impl fmt::Display for ArpOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Request => f.write_str("request"),
            Self::Reply => f.write_str("reply"),
            Self::Other(code) => write!(f, "op{code}"),
        }
    }
}

/// Sender binding revealed by one ARP frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressAnnouncement {
    pub sender_ip: Ipv4Addr,
    pub sender_mac: MacAddress,
    pub operation: ArpOperation,
}

impl AddressAnnouncement {
    /// Decode one record. Trailing bytes beyond [`EVENT_RECORD_LEN`] are ignored.
    pub fn decode(raw: &[u8]) -> Result<Self> {
        if raw.len() < EVENT_RECORD_LEN {
            return Err(ArpLearnError::Decode {
                expected: EVENT_RECORD_LEN,
                got: raw.len(),
            });
        }

        let mut cursor = Cursor::new(&raw[..EVENT_RECORD_LEN]);
        let mut mac = [0u8; MAC_LEN];
        let mut ip = [0u8; IPV4_LEN];
        let mut padding = [0u8; PADDING_LEN];
        cursor.read_exact(&mut mac)?;
        cursor.read_exact(&mut ip)?;
        cursor.read_exact(&mut padding)?;
        let op_code = cursor.read_u32::<LittleEndian>()?;

        Ok(Self {
            sender_ip: Ipv4Addr::from(ip),
            sender_mac: MacAddress::new(mac),
            operation: ArpOperation::from(op_code),
        })
    }
}
