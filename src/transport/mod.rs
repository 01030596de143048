//! Transport layer for I/O abstraction
//!
//! All protocol handlers speak to the camera through the [`Transport`] trait:
//! a blocking byte stream with an exact-length read for framed reads, a
//! best-effort `recv` for resynchronization scans, and `send`. TCP carries
//! the command and blob channels; UDP broadcast carries device discovery.

use crate::error::Result;

mod tcp;
pub use tcp::TcpTransport;

mod udp;
pub use udp::UdpTransport;

mod mock;
pub use mock::MockTransport;

/// Transport trait for camera communication
pub trait Transport: Send {
    /// Read exactly `buffer.len()` bytes, blocking until all arrive or the
    /// receive timeout expires.
    fn read_exact(&mut self, buffer: &mut [u8]) -> Result<()>;

    /// Read up to `buffer.len()` bytes, returning the number received.
    /// Returns 0 when the stream is closed.
    fn recv(&mut self, buffer: &mut [u8]) -> Result<usize>;

    /// Write all of `data`, returning the number of bytes sent.
    fn send(&mut self, data: &[u8]) -> Result<usize>;

    /// Shut the connection down. Further reads fail.
    fn shutdown(&mut self) -> Result<()>;
}
