//! Wire framings for the command channel
//!
//! Both framings share the same synchronization preamble (a run of four 0x02
//! bytes) and a big-endian 32-bit length field; they differ in everything
//! after it:
//!
//! CoLa-B (port 2112, no session):
//!
//! ```text
//! ┌─────────────┬──────────────┬───────────────────┬──────────────┐
//! │ 02 02 02 02 │ length:u32be │ payload[length]   │ checksum:u8  │
//! └─────────────┴──────────────┴───────────────────┴──────────────┘
//! ```
//!
//! The checksum is the XOR of all payload bytes.
//!
//! CoLa-2 (port 2122, sessioned, no checksum):
//!
//! ```text
//! ┌─────────────┬──────────────┬─────────┬───────┬────────────────┬────────────┬─────────┐
//! │ 02 02 02 02 │ length:u32be │ hub:u8  │ noc:u8│ session_id:u32 │ req_id:u16 │ payload │
//! └─────────────┴──────────────┴─────────┴───────┴────────────────┴────────────┴─────────┘
//! ```
//!
//! The length covers everything after itself. Clients always send hub counter
//! and NoC as zero. The session id is assigned by the camera during the open
//! handshake; the request id increments per telegram and the response must
//! echo both, otherwise the stream is out of sync.
//!
//! Transport failures and sync losses never escape as errors from `send`:
//! they come back as a synthesized network-error [`Command`] so the control
//! layer can uniformly decide whether to reconnect.

use super::command::Command;
use crate::endian::{push_be, read_be};
use crate::error::{Error, Result};
use crate::transport::Transport;

const STX: u8 = 0x02;
const PREAMBLE_LEN: usize = 4;

/// Upper bound for a declared telegram length; anything larger is treated as
/// lost synchronization.
const MAX_TELEGRAM_SIZE: u32 = 1024 * 1024;

/// Block until a run of four consecutive STX bytes has been consumed.
///
/// The scan is stateful: any other byte resets the run, and the run may span
/// multiple reads. A closed stream fails with a network error.
pub fn sync_to_preamble(transport: &mut dyn Transport) -> Result<()> {
    let mut run = 0usize;
    let mut buf = [0u8; PREAMBLE_LEN];

    while run < PREAMBLE_LEN {
        let want = PREAMBLE_LEN - run;
        let n = transport.recv(&mut buf[..want])?;
        if n == 0 {
            return Err(Error::Network("stream closed while hunting for frame start"));
        }
        for &b in &buf[..n] {
            if b == STX {
                run += 1;
            } else {
                run = 0;
            }
        }
    }
    Ok(())
}

fn read_length(transport: &mut dyn Transport) -> Result<u32> {
    let mut buf = [0u8; 4];
    transport.read_exact(&mut buf)?;
    let length = read_be::<u32>(&buf);
    if length > MAX_TELEGRAM_SIZE {
        return Err(Error::Network("declared telegram length out of bounds"));
    }
    Ok(length)
}

/// Command-channel framing, selected when the control connection is opened
pub enum Framing {
    ColaB(ColaBFraming),
    Cola2(Cola2Framing),
}

impl Framing {
    pub fn cola_b(transport: Box<dyn Transport>) -> Framing {
        Framing::ColaB(ColaBFraming { transport })
    }

    pub fn cola_2(transport: Box<dyn Transport>) -> Framing {
        Framing::Cola2(Cola2Framing {
            transport,
            session_id: 0,
            req_id: 0,
        })
    }

    /// Frame and send a command, then read and validate its response.
    ///
    /// Transport or sync failures yield a network-error command rather than
    /// an `Err`.
    pub fn send(&mut self, cmd: &Command) -> Command {
        match self {
            Framing::ColaB(f) => f.send(cmd),
            Framing::Cola2(f) => f.send(cmd),
        }
    }

    /// Perform the session handshake. A no-op for CoLa-B.
    pub fn open_session(&mut self, timeout_secs: u8) -> Result<()> {
        match self {
            Framing::ColaB(_) => Ok(()),
            Framing::Cola2(f) => f.open_session(timeout_secs),
        }
    }

    /// Tear the session down. A no-op for CoLa-B.
    pub fn close_session(&mut self) {
        match self {
            Framing::ColaB(_) => {}
            Framing::Cola2(f) => f.close_session(),
        }
    }

    /// Shut the underlying transport down.
    pub fn shutdown(&mut self) {
        let transport = match self {
            Framing::ColaB(f) => &mut f.transport,
            Framing::Cola2(f) => &mut f.transport,
        };
        if let Err(e) = transport.shutdown() {
            log::debug!("transport shutdown: {}", e);
        }
    }
}

// ============================================================================
// CoLa-B
// ============================================================================

/// Checksummed, sessionless framing
pub struct ColaBFraming {
    transport: Box<dyn Transport>,
}

impl ColaBFraming {
    fn checksum(payload: &[u8]) -> u8 {
        payload.iter().fold(0, |acc, &b| acc ^ b)
    }

    fn send(&mut self, cmd: &Command) -> Command {
        let payload = cmd.buffer();
        let mut frame = Vec::with_capacity(PREAMBLE_LEN + 4 + payload.len() + 1);
        frame.extend_from_slice(&[STX; PREAMBLE_LEN]);
        push_be(&mut frame, payload.len() as u32);
        frame.extend_from_slice(payload);
        frame.push(Self::checksum(payload));

        match self.transport.send(&frame) {
            Ok(n) if n == frame.len() => {}
            Ok(_) | Err(_) => return Command::network_error(),
        }

        match self.read_response() {
            Ok(buffer) => Command::from_buffer(buffer),
            Err(e) => {
                log::debug!("CoLa-B response failed: {}", e);
                Command::network_error()
            }
        }
    }

    fn read_response(&mut self) -> Result<Vec<u8>> {
        sync_to_preamble(&mut *self.transport)?;
        let length = read_length(&mut *self.transport)? as usize;

        // Payload plus the trailing checksum byte.
        let mut buffer = vec![0u8; length + 1];
        self.transport.read_exact(&mut buffer)?;

        let checksum = buffer.pop().unwrap_or(0);
        if checksum != Self::checksum(&buffer) {
            return Err(Error::Network("checksum mismatch"));
        }
        Ok(buffer)
    }
}

// ============================================================================
// CoLa-2
// ============================================================================

/// Sessioned framing with per-request ids
pub struct Cola2Framing {
    transport: Box<dyn Transport>,
    session_id: u32,
    req_id: u16,
}

/// Arbitrary client identifier sent with the open-session handshake
const CLIENT_ID: &str = "svs";

impl Cola2Framing {
    fn next_req_id(&mut self) -> u16 {
        self.req_id = self.req_id.wrapping_add(1);
        self.req_id
    }

    pub fn session_id(&self) -> u32 {
        self.session_id
    }

    /// Frame `payload` (already without the compatibility prefix) under the
    /// current session with a fresh request id.
    fn send_frame(&mut self, payload: &[u8]) -> Result<()> {
        const HEADER: usize = 1 + 1 + 4 + 2; // hub counter, NoC, session id, req id
        let req_id = self.next_req_id();

        let mut frame = Vec::with_capacity(PREAMBLE_LEN + 4 + HEADER + payload.len());
        frame.extend_from_slice(&[STX; PREAMBLE_LEN]);
        push_be(&mut frame, (HEADER + payload.len()) as u32);
        frame.push(0); // hub counter, client side
        frame.push(0); // NoC, client side
        push_be(&mut frame, self.session_id);
        push_be(&mut frame, req_id);
        frame.extend_from_slice(payload);

        let n = self.transport.send(&frame)?;
        if n != frame.len() {
            return Err(Error::Network("short send"));
        }
        Ok(())
    }

    /// Read one frame and split off session and request id.
    fn read_response(&mut self) -> Result<(u32, u16, Vec<u8>)> {
        sync_to_preamble(&mut *self.transport)?;
        let length = read_length(&mut *self.transport)? as usize;
        if length < 2 {
            return Err(Error::Network("truncated response header"));
        }

        let mut buffer = vec![0u8; length];
        self.transport.read_exact(&mut buffer)?;

        // Skip hub counter and NoC.
        let body = &buffer[2..];
        if body.len() < 4 + 2 {
            return Err(Error::Network("truncated response header"));
        }
        let session_id = read_be::<u32>(body);
        let req_id = read_be::<u16>(&body[4..]);
        Ok((session_id, req_id, body[6..].to_vec()))
    }

    fn send(&mut self, cmd: &Command) -> Command {
        // The command buffer carries a leading compatibility 's' that CoLa-2
        // does not transmit; it is restored on the response so the parsed
        // command has the usual shape.
        let payload = match cmd.buffer() {
            [b's', rest @ ..] => rest,
            other => other,
        };

        if let Err(e) = self.send_frame(payload) {
            log::debug!("CoLa-2 send failed: {}", e);
            return Command::network_error();
        }

        let (session_id, req_id, body) = match self.read_response() {
            Ok(parts) => parts,
            Err(e) => {
                log::debug!("CoLa-2 response failed: {}", e);
                return Command::network_error();
            }
        };

        if session_id != self.session_id || req_id != self.req_id {
            log::warn!(
                "CoLa-2 stream out of sync (session {:#x}/{:#x}, req {}/{})",
                session_id,
                self.session_id,
                req_id,
                self.req_id
            );
            return Command::network_error();
        }

        let mut buffer = Vec::with_capacity(1 + body.len());
        buffer.push(b's');
        buffer.extend_from_slice(&body);
        Command::from_buffer(buffer)
    }

    fn open_session(&mut self, timeout_secs: u8) -> Result<()> {
        let mut payload = Vec::with_capacity(2 + 1 + 2 + CLIENT_ID.len());
        payload.push(b'O');
        payload.push(b'x');
        payload.push(timeout_secs);
        push_be(&mut payload, CLIENT_ID.len() as u16);
        payload.extend_from_slice(CLIENT_ID.as_bytes());

        self.send_frame(&payload)?;

        let (session_id, req_id, _body) = self.read_response()?;
        if req_id != self.req_id {
            return Err(Error::Network("open-session response out of sync"));
        }

        self.session_id = session_id;
        log::debug!("session opened, id {:#010x}", session_id);
        Ok(())
    }

    fn close_session(&mut self) {
        let cmd = Command::from_buffer(b"sCx".to_vec());
        let _response = self.send(&cmd);
        log::debug!("session {:#010x} closed", self.session_id);
    }
}
