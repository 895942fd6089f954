use crate::mac::MacAddr;
use log::debug;
use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};

const SYNCHRONIZATION_SCHEME: [u8; 6] = [0xff; 6];

pub const MAGIC_PACKET_LEN: usize = 102;

/// Conventional Wake-on-LAN target: limited broadcast, discard port.
pub const DEFAULT_BROADCAST_ADDR: &str = "255.255.255.255:9";

/// The standard wake payload: 6 bytes of 0xff followed by the target
/// hardware address repeated 16 times. Built once and reused.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct MagicPacket {
    data: [u8; MAGIC_PACKET_LEN],
}

impl MagicPacket {
    pub fn new(mac: MacAddr) -> MagicPacket {
        let mut data = [0u8; MAGIC_PACKET_LEN];
        data[..6].copy_from_slice(&SYNCHRONIZATION_SCHEME);
        let octets = mac.octets();
        for i in 0..16 {
            data[6 + 6 * i..12 + 6 * i].copy_from_slice(&octets);
        }
        MagicPacket { data }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

/// Broadcast-capable UDP socket bound to a fixed wake target. The target is
/// resolved once at open time; dropping the socket closes it.
pub struct WolSocket {
    socket: UdpSocket,
    target: SocketAddr,
}

impl WolSocket {
    pub fn open(target: &str) -> io::Result<WolSocket> {
        let target = target.to_socket_addrs()?.next().ok_or_else(|| {
            io::Error::new(io::ErrorKind::AddrNotAvailable, "target resolved to no address")
        })?;
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        socket.set_broadcast(true)?;
        Ok(WolSocket { socket, target })
    }

    /// Sends the packet as a single datagram. Best-effort: there is no
    /// acknowledgment channel and no retry.
    pub fn send(&self, packet: &MagicPacket) -> io::Result<()> {
        let sent = self.socket.send_to(packet.as_bytes(), self.target)?;
        if sent != packet.as_bytes().len() {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("short magic packet write: {} of {} bytes", sent, MAGIC_PACKET_LEN),
            ));
        }
        debug!("sent {} byte magic packet to {}", sent, self.target);
        Ok(())
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }
}
