//! UDP transport for device discovery
//!
//! Discovery telegrams go out as IPv4 broadcast; replies come back unicast
//! from each camera, so the socket stays unconnected and sends are addressed
//! explicitly.

use super::Transport;
use crate::error::Result;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};
use std::time::Duration;

/// Broadcast-capable UDP transport
pub struct UdpTransport {
    socket: UdpSocket,
    target: SocketAddr,
}

impl UdpTransport {
    /// Bind an ephemeral local port and aim sends at `target` (typically a
    /// directed broadcast address on port 30718).
    pub fn broadcast(target: SocketAddrV4, recv_timeout: Duration) -> Result<Self> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
        socket.set_broadcast(true)?;
        socket.set_read_timeout(Some(recv_timeout))?;

        Ok(UdpTransport {
            socket,
            target: SocketAddr::V4(target),
        })
    }
}

impl Transport for UdpTransport {
    fn read_exact(&mut self, buffer: &mut [u8]) -> Result<()> {
        // Datagram socket: an exact read is a single datagram of that size.
        let n = self.recv(buffer)?;
        if n != buffer.len() {
            return Err(crate::error::Error::Network("short datagram"));
        }
        Ok(())
    }

    fn recv(&mut self, buffer: &mut [u8]) -> Result<usize> {
        let (n, _from) = self.socket.recv_from(buffer)?;
        Ok(n)
    }

    fn send(&mut self, data: &[u8]) -> Result<usize> {
        Ok(self.socket.send_to(data, self.target)?)
    }

    fn shutdown(&mut self) -> Result<()> {
        Ok(())
    }
}
