//! TCP transport for the command and blob channels

use super::Transport;
use crate::error::Result;
use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

/// Blocking TCP transport with connect and receive timeouts
pub struct TcpTransport {
    stream: TcpStream,
}

impl TcpTransport {
    /// Connect to `host:port`.
    ///
    /// `connect_timeout` bounds the connection attempt; `recv_timeout` bounds
    /// every subsequent read so blocked readers (the grabber worker in
    /// particular) wake up in bounded time.
    pub fn connect(
        host: &str,
        port: u16,
        connect_timeout: Duration,
        recv_timeout: Duration,
    ) -> Result<Self> {
        let addr = resolve(host, port)?;
        let stream = TcpStream::connect_timeout(&addr, connect_timeout)?;
        stream.set_read_timeout(Some(recv_timeout))?;
        stream.set_nodelay(true)?;

        log::debug!("connected to {}:{}", host, port);

        Ok(TcpTransport { stream })
    }
}

fn resolve(host: &str, port: u16) -> Result<SocketAddr> {
    let mut addrs = (host, port).to_socket_addrs()?;
    addrs.next().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::AddrNotAvailable,
            format!("cannot resolve {}", host),
        )
        .into()
    })
}

impl Transport for TcpTransport {
    fn read_exact(&mut self, buffer: &mut [u8]) -> Result<()> {
        self.stream.read_exact(buffer)?;
        Ok(())
    }

    fn recv(&mut self, buffer: &mut [u8]) -> Result<usize> {
        Ok(self.stream.read(buffer)?)
    }

    fn send(&mut self, data: &[u8]) -> Result<usize> {
        self.stream.write_all(data)?;
        Ok(data.len())
    }

    fn shutdown(&mut self) -> Result<()> {
        // Both directions; the peer sees EOF and the next local read fails.
        match self.stream.shutdown(Shutdown::Both) {
            Ok(()) => Ok(()),
            // Already gone is fine during teardown.
            Err(e) if e.kind() == std::io::ErrorKind::NotConnected => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
