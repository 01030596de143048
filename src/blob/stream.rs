//! Blob TCP client
//!
//! Pulls framed blob packages off the camera's data channel and runs them
//! through the [`Decoder`]. One receive buffer is reused across frames, so a
//! steady stream settles into zero allocations outside metadata changes.

use super::{Decoder, DeviceFamily, Frame};
use crate::cola::sync_to_preamble;
use crate::endian::read_be;
use crate::error::{Error, Result};
use crate::transport::{TcpTransport, Transport};
use std::time::Duration;

/// Largest accepted blob package; bigger declared lengths mean the stream
/// lost sync.
const MAX_BLOB_SIZE: u32 = 16 * 1024 * 1024;

/// Expected constants of the blob framing
const BLOB_PROTOCOL_VERSION: u16 = 0x0001;
const BLOB_PACKET_TYPE: u8 = 0x62;

/// Keepalive probe understood by the blob server
const BLOB_REQUEST: &[u8] = b"BlbRqst";

/// Client side of the blob frame channel
pub struct BlobClient {
    transport: Box<dyn Transport>,
    decoder: Decoder,
    buffer: Vec<u8>,
}

impl BlobClient {
    /// Connect to the camera's blob port (usually the one reported by
    /// `Control::blob_port`).
    pub fn connect(
        family: DeviceFamily,
        host: &str,
        port: u16,
        connect_timeout: Duration,
        recv_timeout: Duration,
    ) -> Result<BlobClient> {
        let transport = TcpTransport::connect(host, port, connect_timeout, recv_timeout)?;
        log::info!("blob stream open to {}:{} ({:?})", host, port, family);
        Ok(Self::from_transport(family, Box::new(transport)))
    }

    /// Build a client over an existing transport.
    pub fn from_transport(family: DeviceFamily, transport: Box<dyn Transport>) -> BlobClient {
        BlobClient {
            transport,
            decoder: Decoder::new(family),
            buffer: Vec::new(),
        }
    }

    pub fn family(&self) -> DeviceFamily {
        self.decoder.family()
    }

    /// Receive and decode the next frame into `frame`.
    ///
    /// Any framing or parse failure drops the package; the caller decides
    /// whether to try again or probe the connection.
    pub fn get_next_frame(&mut self, frame: &mut Frame) -> Result<()> {
        sync_to_preamble(&mut *self.transport)?;

        let mut len_buf = [0u8; 4];
        self.transport.read_exact(&mut len_buf)?;
        let length = read_be::<u32>(&len_buf);
        if length < 3 {
            return Err(Error::MalformedFrame(format!(
                "blob package length {} is shorter than its own header",
                length
            )));
        }
        if length > MAX_BLOB_SIZE {
            return Err(Error::Network("declared blob length out of bounds"));
        }

        self.buffer.clear();
        self.buffer.resize(length as usize, 0);
        self.transport.read_exact(&mut self.buffer)?;

        let version = read_be::<u16>(&self.buffer);
        if version != BLOB_PROTOCOL_VERSION {
            return Err(Error::MalformedFrame(format!(
                "unknown blob protocol version {:#06x}",
                version
            )));
        }
        let packet_type = self.buffer[2];
        if packet_type != BLOB_PACKET_TYPE {
            return Err(Error::MalformedFrame(format!(
                "unknown blob packet type {:#04x}",
                packet_type
            )));
        }

        self.decoder.parse_segments(&self.buffer[3..], frame)
    }

    /// Probe whether the connection still accepts traffic.
    pub fn is_alive(&mut self) -> bool {
        match self.transport.send(BLOB_REQUEST) {
            Ok(_) => true,
            Err(e) => {
                log::debug!("blob keepalive failed: {}", e);
                false
            }
        }
    }

    /// Shut the data channel down.
    pub fn shutdown(&mut self) {
        if let Err(e) = self.transport.shutdown() {
            log::debug!("blob transport shutdown: {}", e);
        }
    }
}
