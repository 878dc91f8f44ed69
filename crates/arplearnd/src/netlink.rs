//! Kernel neighbor table client
//!
//! Upserts are sent as RTM_NEWNEIGH with NLM_F_CREATE | NLM_F_REPLACE, so
//! programming the same IP/MAC pair repeatedly is harmless. Each request
//! asks for an ACK and the kernel's answer is checked before returning.

use crate::error::Result;
use crate::types::NeighborEntry;

/// Add-or-replace access to the OS neighbor table
pub trait NeighborTable {
    fn upsert(&mut self, entry: &NeighborEntry) -> Result<()>;
}

#[cfg(target_os = "linux")]
mod linux {
    use super::NeighborTable;
    use crate::error::{ArpLearnError, Result};
    use crate::types::{NeighborEntry, NeighborState};
    use netlink_packet_core::{
        NLM_F_ACK, NLM_F_CREATE, NLM_F_REPLACE, NLM_F_REQUEST, NetlinkHeader, NetlinkMessage,
        NetlinkPayload,
    };
    use netlink_packet_route::neighbour::{
        NeighbourAddress, NeighbourAttribute, NeighbourMessage, NeighbourState,
    };
    use netlink_packet_route::{AddressFamily, RouteNetlinkMessage};
    use netlink_sys::{Socket, SocketAddr, protocols::NETLINK_ROUTE};
    use tracing::{debug, instrument, trace};

    /// Receive buffer for ACK/error replies
    const RECV_BUFFER_SIZE: usize = 8192;

    /// Netlink route socket used to program neighbor entries
    pub struct NetlinkNeighborTable {
        socket: Socket,
        buffer: Vec<u8>,
        sequence: u32,
    }

    impl NetlinkNeighborTable {
        /// Open a NETLINK_ROUTE socket connected to the kernel
        #[instrument]
        pub fn new() -> Result<Self> {
            let mut socket = Socket::new(NETLINK_ROUTE)
                .map_err(|e| ArpLearnError::Netlink(format!("Failed to create socket: {}", e)))?;
            socket
                .bind_auto()
                .map_err(|e| ArpLearnError::Netlink(format!("Failed to bind socket: {}", e)))?;
            socket
                .connect(&SocketAddr::new(0, 0))
                .map_err(|e| ArpLearnError::Netlink(format!("Failed to connect socket: {}", e)))?;

            debug!("Netlink neighbor socket ready");

            Ok(Self {
                socket,
                buffer: Vec::with_capacity(RECV_BUFFER_SIZE),
                sequence: 0,
            })
        }

        fn build_request(&mut self, entry: &NeighborEntry) -> Vec<u8> {
            self.sequence = self.sequence.wrapping_add(1);
            let mut packet = neighbor_request(entry, self.sequence);
            let mut buf = vec![0u8; packet.buffer_len()];
            packet.serialize(&mut buf);
            buf
        }

        /// Wait for the kernel's ACK matching the current sequence number
        fn await_ack(&mut self, entry: &NeighborEntry) -> Result<()> {
            loop {
                self.buffer.clear();
                let len = self
                    .socket
                    .recv(&mut self.buffer, 0)
                    .map_err(|e| ArpLearnError::Netlink(format!("Failed to receive: {}", e)))?;

                let mut offset = 0;
                while offset < len {
                    let msg = NetlinkMessage::<RouteNetlinkMessage>::deserialize(
                        &self.buffer[offset..len],
                    )
                    .map_err(|e| ArpLearnError::Netlink(format!("Failed to parse reply: {}", e)))?;

                    let msg_len = msg.header.length as usize;
                    if msg_len == 0 {
                        break;
                    }
                    // Align to 4 bytes (netlink alignment requirement)
                    offset = (offset + msg_len + 3) & !3;

                    if msg.header.sequence_number != self.sequence {
                        trace!(seq = msg.header.sequence_number, "Skipping stale reply");
                        continue;
                    }

                    if let NetlinkPayload::Error(err) = msg.payload {
                        return match err.code {
                            None => Ok(()),
                            Some(code) => Err(ArpLearnError::Netlink(format!(
                                "Kernel rejected neighbor {}: {}",
                                entry,
                                std::io::Error::from_raw_os_error(-code.get())
                            ))),
                        };
                    }
                }
            }
        }
    }

    fn kernel_state(state: NeighborState) -> NeighbourState {
        match state {
            NeighborState::Reachable => NeighbourState::Reachable,
        }
    }

    /// RTM_NEWNEIGH add-or-replace request for `entry`
    pub(crate) fn neighbor_request(
        entry: &NeighborEntry,
        sequence: u32,
    ) -> NetlinkMessage<RouteNetlinkMessage> {
        let mut header = NetlinkHeader::default();
        header.flags = NLM_F_REQUEST | NLM_F_ACK | NLM_F_CREATE | NLM_F_REPLACE;
        header.sequence_number = sequence;

        let mut msg = NeighbourMessage::default();
        msg.header.family = AddressFamily::Inet;
        msg.header.ifindex = entry.ifindex;
        msg.header.state = kernel_state(entry.state);
        msg.attributes
            .push(NeighbourAttribute::Destination(NeighbourAddress::Inet(entry.ip)));
        msg.attributes
            .push(NeighbourAttribute::LinkLocalAddress(entry.mac.octets().to_vec()));

        let mut packet = NetlinkMessage::new(
            header,
            NetlinkPayload::InnerMessage(RouteNetlinkMessage::NewNeighbour(msg)),
        );
        packet.finalize();
        packet
    }

    impl NeighborTable for NetlinkNeighborTable {
        fn upsert(&mut self, entry: &NeighborEntry) -> Result<()> {
            let request = self.build_request(entry);
            self.socket.send(&request, 0).map_err(|e| {
                ArpLearnError::Netlink(format!("Failed to send neighbor request: {}", e))
            })?;
            self.await_ack(entry)?;
            trace!(
                ip = %entry.ip,
                mac = %entry.mac,
                ifindex = entry.ifindex,
                "Neighbor upsert acknowledged"
            );
            Ok(())
        }
    }
}

#[cfg(target_os = "linux")]
pub use linux::NetlinkNeighborTable;

/// Mock implementation for non-Linux platforms (development only)
#[cfg(not(target_os = "linux"))]
mod mock {
    use super::NeighborTable;
    use crate::error::Result;
    use crate::types::NeighborEntry;

    pub struct NetlinkNeighborTable;

    impl NetlinkNeighborTable {
        pub fn new() -> Result<Self> {
            Ok(Self)
        }
    }

    impl NeighborTable for NetlinkNeighborTable {
        fn upsert(&mut self, _entry: &NeighborEntry) -> Result<()> {
            Ok(())
        }
    }
}

#[cfg(not(target_os = "linux"))]
pub use mock::*;

#[cfg(all(test, target_os = "linux"))]
mod tests {
    use super::linux::neighbor_request;
    use super::*;
    use crate::types::MacAddress;
    use netlink_packet_core::{
        NLM_F_ACK, NLM_F_CREATE, NLM_F_REPLACE, NLM_F_REQUEST, NetlinkPayload,
    };
    use netlink_packet_route::RouteNetlinkMessage;
    use netlink_packet_route::neighbour::{NeighbourAddress, NeighbourAttribute, NeighbourState};
    use std::net::Ipv4Addr;

    const IP: Ipv4Addr = Ipv4Addr::new(192, 0, 2, 10);
    const MAC: MacAddress = MacAddress([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]);

    #[test]
    fn test_request_is_add_or_replace() {
        let entry = NeighborEntry::reachable(4, IP, MAC);
        let packet = neighbor_request(&entry, 7);

        assert_eq!(packet.header.sequence_number, 7);
        assert_eq!(
            packet.header.flags,
            NLM_F_REQUEST | NLM_F_ACK | NLM_F_CREATE | NLM_F_REPLACE
        );

        let NetlinkPayload::InnerMessage(RouteNetlinkMessage::NewNeighbour(msg)) = packet.payload
        else {
            panic!("expected RTM_NEWNEIGH");
        };
        assert_eq!(msg.header.ifindex, 4);
        assert_eq!(msg.header.state, NeighbourState::Reachable);
        assert!(
            msg.attributes
                .contains(&NeighbourAttribute::Destination(NeighbourAddress::Inet(IP)))
        );
        assert!(
            msg.attributes
                .contains(&NeighbourAttribute::LinkLocalAddress(MAC.octets().to_vec()))
        );
    }

    // This test is marked as #[ignore] because programming the neighbor
    // table requires CAP_NET_ADMIN and a disposable interface. To run it on a
    // Linux machine, name the interface and run the test binary like so:
    // > sudo ARPLEARND_TEST_IFACE=ifb0 target/<path to test executable> --ignored --test-threads=1
    // The entry for 192.0.2.10 is left on the interface.
    #[test]
    #[ignore]
    fn test_upsert_twice_and_reject_unknown_ifindex() {
        let Ok(name) = std::env::var("ARPLEARND_TEST_IFACE") else {
            eprintln!("ARPLEARND_TEST_IFACE not set, skipping");
            return;
        };
        let ifindex = nix::net::if_::if_nametoindex(name.as_str()).expect("interface index");
        let mut table = NetlinkNeighborTable::new().expect("netlink socket");
        let entry = NeighborEntry::reachable(ifindex, IP, MAC);

        table.upsert(&entry).expect("first upsert");
        table.upsert(&entry).expect("repeated upsert");

        let missing = NeighborEntry::reachable(u32::MAX, IP, MAC);
        assert!(matches!(
            table.upsert(&missing),
            Err(crate::error::ArpLearnError::Netlink(_))
        ));
    }
}
