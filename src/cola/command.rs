//! Command record and wire-tag parsing
//!
//! A command travels as `s?? name param-bytes...` where `s??` is one of the
//! three-character ASCII tags below and the name is delimited by single
//! spaces. Error responses (`sFA`) carry a 16-bit error code instead of a
//! name. Parsing never fails hard: unrecognized input yields an `Unknown`
//! command so a stray response cannot poison the channel.

use crate::endian::read_be;

/// Command tag as it appears on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    /// `sRN` - read variable request
    ReadVariable,
    /// `sRA` - read variable response
    ReadVariableResponse,
    /// `sWN` - write variable request
    WriteVariable,
    /// `sWA` - write variable response
    WriteVariableResponse,
    /// `sMN` - method invocation
    MethodInvocation,
    /// `sAN` - method return value
    MethodReturn,
    /// `sFA` - device-reported error
    ColaError,
    /// Synthesized locally when the transport fails; never on the wire
    NetworkError,
    /// Unparseable or unrecognized telegram
    Unknown,
}

impl CommandKind {
    /// Wire tag for request/response kinds (`None` for the local-only ones)
    pub fn tag(self) -> Option<&'static str> {
        match self {
            CommandKind::ReadVariable => Some("sRN"),
            CommandKind::ReadVariableResponse => Some("sRA"),
            CommandKind::WriteVariable => Some("sWN"),
            CommandKind::WriteVariableResponse => Some("sWA"),
            CommandKind::MethodInvocation => Some("sMN"),
            CommandKind::MethodReturn => Some("sAN"),
            CommandKind::ColaError => Some("sFA"),
            CommandKind::NetworkError | CommandKind::Unknown => None,
        }
    }

    fn from_tag(tag: &[u8]) -> CommandKind {
        match tag {
            b"sRN" => CommandKind::ReadVariable,
            b"sRA" => CommandKind::ReadVariableResponse,
            b"sWN" => CommandKind::WriteVariable,
            b"sWA" => CommandKind::WriteVariableResponse,
            b"sMN" => CommandKind::MethodInvocation,
            b"sAN" => CommandKind::MethodReturn,
            b"sFA" => CommandKind::ColaError,
            _ => CommandKind::Unknown,
        }
    }
}

/// Error codes reported in `sFA` responses
///
/// `Ok` is synthesized for normal responses and `NetworkError` for transport
/// failures; neither appears in an `sFA` telegram. `BufferUnderflow` and
/// `SessionUnknownId` drive control flow (secure-login variant detection and
/// the control session's auto-reconnect).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColaError {
    NetworkError,
    Ok,
    MethodInNotAccessible,
    MethodInUnknownIndex,
    VariableUnknownIndex,
    LocalConditionFailed,
    InvalidData,
    UnknownError,
    BufferOverflow,
    BufferUnderflow,
    UnknownType,
    VariableWriteAccessDenied,
    UnknownCmdForNameServer,
    UnknownColaCommand,
    MethodInServerBusy,
    FlexOutOfBounds,
    EventRegUnknownIndex,
    ColaAValueOverflow,
    ColaAInvalidCharacter,
    OsaiNoMessage,
    OsaiNoAnswerMessage,
    Internal,
    HubAddressCorrupted,
    HubAddressDecoding,
    HubAddressAddressExceeded,
    HubAddressBlankExpected,
    AsyncMethodsAreSuspended,
    ComplexArraysNotSupported,
    SessionNoResources,
    SessionUnknownId,
    CannotConnect,
    InvalidPort,
    ScanAlreadyActive,
    OutOfTimers,
    WriteModeNotEnabled,
    SetPortFailed,
    IoLinkFuncTempNotAvailable,
    Unknown,
}

impl ColaError {
    /// Map a 16-bit wire code to the enum; unassigned codes become `Unknown`.
    pub fn from_code(code: u16) -> ColaError {
        match code {
            0 => ColaError::Ok,
            1 => ColaError::MethodInNotAccessible,
            2 => ColaError::MethodInUnknownIndex,
            3 => ColaError::VariableUnknownIndex,
            4 => ColaError::LocalConditionFailed,
            5 => ColaError::InvalidData,
            6 => ColaError::UnknownError,
            7 => ColaError::BufferOverflow,
            8 => ColaError::BufferUnderflow,
            9 => ColaError::UnknownType,
            10 => ColaError::VariableWriteAccessDenied,
            11 => ColaError::UnknownCmdForNameServer,
            12 => ColaError::UnknownColaCommand,
            13 => ColaError::MethodInServerBusy,
            14 => ColaError::FlexOutOfBounds,
            15 => ColaError::EventRegUnknownIndex,
            16 => ColaError::ColaAValueOverflow,
            17 => ColaError::ColaAInvalidCharacter,
            18 => ColaError::OsaiNoMessage,
            19 => ColaError::OsaiNoAnswerMessage,
            20 => ColaError::Internal,
            21 => ColaError::HubAddressCorrupted,
            22 => ColaError::HubAddressDecoding,
            23 => ColaError::HubAddressAddressExceeded,
            24 => ColaError::HubAddressBlankExpected,
            25 => ColaError::AsyncMethodsAreSuspended,
            26 => ColaError::ComplexArraysNotSupported,
            27 => ColaError::SessionNoResources,
            28 => ColaError::SessionUnknownId,
            29 => ColaError::CannotConnect,
            30 => ColaError::InvalidPort,
            31 => ColaError::ScanAlreadyActive,
            32 => ColaError::OutOfTimers,
            33 => ColaError::WriteModeNotEnabled,
            34 => ColaError::SetPortFailed,
            35 => ColaError::IoLinkFuncTempNotAvailable,
            _ => ColaError::Unknown,
        }
    }
}

/// A parsed command telegram
///
/// Owns the raw payload bytes (including the `s??` prefix) together with the
/// parsed kind, name and the offset where parameters start. Responses with
/// `error() != ColaError::Ok` carry no usable parameters except the `sFA`
/// error code itself.
#[derive(Debug, Clone)]
pub struct Command {
    kind: CommandKind,
    name: String,
    parameter_offset: usize,
    error: ColaError,
    buffer: Vec<u8>,
}

impl Command {
    /// Parse a command from its raw wire bytes (after framing removal).
    ///
    /// Never fails: malformed input produces an `Unknown` command carrying
    /// the original bytes.
    pub fn from_buffer(buffer: Vec<u8>) -> Command {
        let mut cmd = Command {
            kind: CommandKind::Unknown,
            name: String::new(),
            parameter_offset: 0,
            error: ColaError::Unknown,
            buffer,
        };
        cmd.parse();
        cmd
    }

    /// Synthesize the command representing a transport failure.
    pub fn network_error() -> Command {
        Command {
            kind: CommandKind::NetworkError,
            name: String::new(),
            parameter_offset: 0,
            error: ColaError::NetworkError,
            buffer: Vec::new(),
        }
    }

    fn parse(&mut self) {
        if self.buffer.len() < 3 {
            return;
        }
        let kind = CommandKind::from_tag(&self.buffer[..3]);

        match kind {
            CommandKind::ColaError => {
                // sFA: a 16-bit error code follows immediately.
                self.parameter_offset = 3;
                if self.buffer.len() < 3 + 2 {
                    return;
                }
                self.kind = kind;
                self.error = ColaError::from_code(read_be::<u16>(&self.buffer[3..]));
                self.parameter_offset = 5;
            }
            CommandKind::Unknown | CommandKind::NetworkError => {}
            _ => {
                // Named telegram: space, name, space, parameters.
                if self.buffer.get(3) != Some(&b' ') {
                    return;
                }
                let name_start = 4;
                let Some(rel) = self.buffer[name_start..].iter().position(|&b| b == b' ')
                else {
                    return;
                };
                let name_end = name_start + rel;
                self.kind = kind;
                self.name = String::from_utf8_lossy(&self.buffer[name_start..name_end])
                    .into_owned();
                self.parameter_offset = name_end + 1;
                self.error = ColaError::Ok;
            }
        }
    }

    pub fn kind(&self) -> CommandKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parameter_offset(&self) -> usize {
        self.parameter_offset
    }

    pub fn error(&self) -> ColaError {
        self.error
    }

    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }
}
