//! Typed builder for command payloads
//!
//! Emits the ASCII tag and name, then appends parameters in wire order:
//! multi-byte scalars big-endian, flex strings with a 16-bit length prefix,
//! passwords as an MD5 digest folded to 32 bits (the legacy access-mode
//! scheme).

use super::command::{Command, CommandKind};
use crate::endian::push_be;
use md5::{Digest, Md5};

/// Chained builder for a named command
///
/// ```
/// use drishti_cam::cola::{CommandKind, CommandWriter};
///
/// let cmd = CommandWriter::new(CommandKind::WriteVariable, "vname")
///     .param_i32(-0x12345678)
///     .build();
/// assert_eq!(&cmd.buffer()[..10], b"sWN vname ");
/// ```
pub struct CommandWriter {
    buffer: Vec<u8>,
}

impl CommandWriter {
    /// Start a command of the given kind and name.
    ///
    /// Local-only kinds (`NetworkError`, `Unknown`) produce an empty buffer
    /// that parses back to an unknown command.
    pub fn new(kind: CommandKind, name: &str) -> CommandWriter {
        let mut buffer = Vec::with_capacity(3 + 1 + name.len() + 1 + 16);
        if let Some(tag) = kind.tag() {
            buffer.extend_from_slice(tag.as_bytes());
            buffer.push(b' ');
            buffer.extend_from_slice(name.as_bytes());
            buffer.push(b' ');
        }
        CommandWriter { buffer }
    }

    pub fn param_i8(mut self, value: i8) -> Self {
        self.buffer.push(value as u8);
        self
    }

    pub fn param_u8(mut self, value: u8) -> Self {
        self.buffer.push(value);
        self
    }

    pub fn param_i16(mut self, value: i16) -> Self {
        push_be(&mut self.buffer, value);
        self
    }

    pub fn param_u16(mut self, value: u16) -> Self {
        push_be(&mut self.buffer, value);
        self
    }

    pub fn param_i32(mut self, value: i32) -> Self {
        push_be(&mut self.buffer, value);
        self
    }

    pub fn param_u32(mut self, value: u32) -> Self {
        push_be(&mut self.buffer, value);
        self
    }

    pub fn param_i64(mut self, value: i64) -> Self {
        push_be(&mut self.buffer, value);
        self
    }

    pub fn param_u64(mut self, value: u64) -> Self {
        push_be(&mut self.buffer, value);
        self
    }

    pub fn param_f32(mut self, value: f32) -> Self {
        push_be(&mut self.buffer, value);
        self
    }

    pub fn param_f64(mut self, value: f64) -> Self {
        push_be(&mut self.buffer, value);
        self
    }

    pub fn param_bool(self, value: bool) -> Self {
        self.param_u8(value as u8)
    }

    /// Flex string: u16 big-endian length (clamped to 65535) + raw bytes.
    pub fn param_flex_string(mut self, value: &str) -> Self {
        let effective = value.len().min(u16::MAX as usize);
        push_be(&mut self.buffer, effective as u16);
        self.buffer.extend_from_slice(&value.as_bytes()[..effective]);
        self
    }

    /// Legacy password parameter: the 16-byte MD5 digest XOR-folded to 4
    /// bytes (`d[i] ^ d[i+4] ^ d[i+8] ^ d[i+12]`), emitted in folded order.
    pub fn param_password_md5(mut self, password: &str) -> Self {
        let digest = Md5::digest(password.as_bytes());
        for i in 0..4 {
            self.buffer
                .push(digest[i] ^ digest[i + 4] ^ digest[i + 8] ^ digest[i + 12]);
        }
        self
    }

    /// Finish and parse the assembled buffer into a [`Command`].
    pub fn build(self) -> Command {
        Command::from_buffer(self.buffer)
    }
}
