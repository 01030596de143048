//! Sequential typed reader over a command's parameters
//!
//! Reads advance a cursor starting at the command's parameter offset. Every
//! read is bounds-checked against the buffer end and fails with
//! [`Error::OutOfRange`] instead of reading past it, so a response that is
//! shorter than the caller expects surfaces as a typed error.

use super::command::Command;
use crate::endian::{read_be, Wire};
use crate::error::{Error, Result};

/// Cursor-based parameter reader
pub struct CommandReader<'a> {
    command: &'a Command,
    position: usize,
}

impl<'a> CommandReader<'a> {
    pub fn new(command: &'a Command) -> CommandReader<'a> {
        CommandReader {
            command,
            position: command.parameter_offset(),
        }
    }

    /// Reset the cursor to the first parameter.
    pub fn rewind(&mut self) {
        self.position = self.command.parameter_offset();
    }

    fn take(&mut self, size: usize) -> Result<&'a [u8]> {
        let buffer = self.command.buffer();
        let end = self
            .position
            .checked_add(size)
            .filter(|&end| end <= buffer.len())
            .ok_or(Error::OutOfRange)?;
        let bytes = &buffer[self.position..end];
        self.position = end;
        Ok(bytes)
    }

    fn read<T: Wire>(&mut self) -> Result<T> {
        Ok(read_be::<T>(self.take(T::SIZE)?))
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        self.read()
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        self.read()
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        self.read()
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        self.read()
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        self.read()
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        self.read()
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        self.read()
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        self.read()
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        self.read()
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        self.read()
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? == 1)
    }

    /// Flex string: u16 big-endian length followed by that many bytes.
    pub fn read_flex_string(&mut self) -> Result<String> {
        let len = self.read_u16()?;
        self.read_fixed_string(len as usize)
    }

    /// String of a caller-known byte length.
    pub fn read_fixed_string(&mut self, len: usize) -> Result<String> {
        let bytes = self.take(len)?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }

    /// Raw bytes of a caller-known length.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        self.take(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cola::{CommandKind, CommandWriter};

    #[test]
    fn test_sequential_reads() {
        let cmd = CommandWriter::new(CommandKind::MethodReturn, "mtd")
            .param_u8(7)
            .param_i16(-2)
            .param_u32(0x01020304)
            .param_f32(1.5)
            .build();
        let mut reader = CommandReader::new(&cmd);
        assert_eq!(reader.read_u8().unwrap(), 7);
        assert_eq!(reader.read_i16().unwrap(), -2);
        assert_eq!(reader.read_u32().unwrap(), 0x01020304);
        assert_eq!(reader.read_f32().unwrap(), 1.5);
        assert!(matches!(reader.read_u8(), Err(Error::OutOfRange)));
    }

    #[test]
    fn test_rewind() {
        let cmd = CommandWriter::new(CommandKind::MethodReturn, "m")
            .param_u16(0xABCD)
            .build();
        let mut reader = CommandReader::new(&cmd);
        assert_eq!(reader.read_u16().unwrap(), 0xABCD);
        reader.rewind();
        assert_eq!(reader.read_u16().unwrap(), 0xABCD);
    }

    #[test]
    fn test_flex_string_roundtrip() {
        let cmd = CommandWriter::new(CommandKind::ReadVariableResponse, "DeviceIdent")
            .param_flex_string("Visionary-T Mini CX V3S105-1AAAAAA")
            .build();
        let mut reader = CommandReader::new(&cmd);
        assert_eq!(
            reader.read_flex_string().unwrap(),
            "Visionary-T Mini CX V3S105-1AAAAAA"
        );
    }

    #[test]
    fn test_read_past_end_fails_without_advancing_past() {
        let cmd = CommandWriter::new(CommandKind::MethodReturn, "m")
            .param_u8(1)
            .build();
        let mut reader = CommandReader::new(&cmd);
        // A 4-byte read on a 1-byte payload must fail and leave the single
        // byte still readable.
        assert!(matches!(reader.read_u32(), Err(Error::OutOfRange)));
        assert_eq!(reader.read_u8().unwrap(), 1);
    }

    #[test]
    fn test_flex_string_truncated_length() {
        let cmd = Command::from_buffer(b"sRA var \x00\x10abc".to_vec());
        let mut reader = CommandReader::new(&cmd);
        assert!(matches!(reader.read_flex_string(), Err(Error::OutOfRange)));
    }
}
