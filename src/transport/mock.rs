//! Mock transport for testing

use super::Transport;
use crate::error::{Error, Result};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Scripted transport for unit testing
///
/// Reads drain a pre-loaded byte queue (an empty queue behaves like a closed
/// stream); writes accumulate for inspection. Clones share the same buffers
/// so a test can keep a handle while the code under test owns the transport.
#[derive(Clone)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportInner>>,
}

struct MockTransportInner {
    read_buffer: VecDeque<u8>,
    write_buffer: Vec<u8>,
    fail_send: bool,
}

impl MockTransport {
    /// Create a new mock transport with an empty read queue
    pub fn new() -> Self {
        MockTransport {
            inner: Arc::new(Mutex::new(MockTransportInner {
                read_buffer: VecDeque::new(),
                write_buffer: Vec::new(),
                fail_send: false,
            })),
        }
    }

    /// Queue bytes to be read
    pub fn inject_read(&self, data: &[u8]) {
        let mut inner = self.inner.lock().unwrap();
        inner.read_buffer.extend(data);
    }

    /// Get all written bytes so far
    pub fn written(&self) -> Vec<u8> {
        let inner = self.inner.lock().unwrap();
        inner.write_buffer.clone()
    }

    /// Clear captured writes
    pub fn clear_written(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.write_buffer.clear();
    }

    /// Make every subsequent send fail
    pub fn fail_sends(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_send = true;
    }
}

impl Transport for MockTransport {
    fn read_exact(&mut self, buffer: &mut [u8]) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.read_buffer.len() < buffer.len() {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "mock stream exhausted",
            )));
        }
        for item in buffer.iter_mut() {
            *item = inner.read_buffer.pop_front().unwrap();
        }
        Ok(())
    }

    fn recv(&mut self, buffer: &mut [u8]) -> Result<usize> {
        let mut inner = self.inner.lock().unwrap();
        let available = inner.read_buffer.len().min(buffer.len());
        for item in buffer.iter_mut().take(available) {
            *item = inner.read_buffer.pop_front().unwrap();
        }
        Ok(available)
    }

    fn send(&mut self, data: &[u8]) -> Result<usize> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_send {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "mock send failure",
            )));
        }
        inner.write_buffer.extend_from_slice(data);
        Ok(data.len())
    }

    fn shutdown(&mut self) -> Result<()> {
        Ok(())
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}
