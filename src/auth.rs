//! User-level authentication
//!
//! Two login schemes exist across the camera families:
//!
//! - **Legacy** (CoLa-B devices): `SetAccessMode` with the user level and the
//!   password's MD5 digest folded to 32 bits.
//! - **Secure** (CoLa-2 devices): a SHA-256 challenge-response. The camera
//!   hands out a 16-byte challenge via `GetChallenge`; the client answers
//!   `SetUserLevel` with SHA-256(password_hash || challenge). Two dialect
//!   variants are auto-detected at runtime: SUL1 takes a parameterless
//!   `GetChallenge`, SUL2 takes the user level and additionally salts the
//!   password hash with 16 bytes from the challenge response.
//!
//! The authenticator talks to the device through the [`CommandChannel`]
//! capability rather than holding the control session itself, so the control
//! layer can hand in whatever retry policy it wants.

use crate::cola::{ColaError, Command, CommandReader, CommandWriter, CommandKind};
use crate::error::{Error, Result};
use sha2::{Digest, Sha256};

/// Capability to exchange one command for its response
pub trait CommandChannel {
    fn send_command(&mut self, cmd: &Command) -> Command;
}

/// CoLa user levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserLevel {
    Run,
    Operator,
    Maintenance,
    AuthorizedClient,
    Service,
}

impl UserLevel {
    /// Numeric level used on the wire
    pub fn code(self) -> u8 {
        match self {
            UserLevel::Run => 0,
            UserLevel::Operator => 1,
            UserLevel::Maintenance => 2,
            UserLevel::AuthorizedClient => 3,
            UserLevel::Service => 4,
        }
    }

    /// Prefix mixed into the secure password hash
    fn prefix(self) -> &'static str {
        match self {
            UserLevel::Run => "Run",
            UserLevel::Operator => "Operator",
            UserLevel::Maintenance => "Maintenance",
            UserLevel::AuthorizedClient => "AuthorizedClient",
            UserLevel::Service => "Service",
        }
    }
}

/// One-byte result codes of the challenge-response exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
#[allow(dead_code)]
enum ChallengeResult {
    Success = 0,
    InvalidClient = 1,
    NotAccepted = 2,
    UnknownChallenge = 3,
    PwdNotChangeable = 4,
    TimelockActive = 5,
}

const SUCCESS: u8 = ChallengeResult::Success as u8;

/// Secure user-level dialect, detected on first login
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SulVariant {
    #[default]
    Unknown,
    Sul1,
    Sul2,
}

/// Fixed infix of the secure password hash
const SENSOR_INFIX: &str = ":SICK Sensor:";

/// 32-byte password hash: SHA-256 over `Prefix:SICK Sensor:password`, with
/// `:salt` appended for SUL2.
fn password_hash(
    level: UserLevel,
    password: &str,
    salt: Option<&[u8; 16]>,
) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(level.prefix().as_bytes());
    hasher.update(SENSOR_INFIX.as_bytes());
    hasher.update(password.as_bytes());
    if let Some(salt) = salt {
        hasher.update(b":");
        hasher.update(salt);
    }
    hasher.finalize().into()
}

/// 32-byte challenge response: SHA-256 over `password_hash || challenge`.
fn challenge_response(password_hash: &[u8; 32], challenge: &[u8; 16]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(password_hash);
    hasher.update(challenge);
    hasher.finalize().into()
}

// ============================================================================
// Legacy (MD5 access mode)
// ============================================================================

/// Log in on a CoLa-B device via `SetAccessMode`.
pub fn login_legacy<C: CommandChannel>(
    channel: &mut C,
    level: UserLevel,
    password: &str,
) -> Result<()> {
    let cmd = CommandWriter::new(CommandKind::MethodInvocation, "SetAccessMode")
        .param_i8(level.code() as i8)
        .param_password_md5(password)
        .build();
    let response = channel.send_command(&cmd);

    match response.error() {
        ColaError::Ok => {
            if CommandReader::new(&response).read_bool()? {
                Ok(())
            } else {
                Err(Error::LoginFailed)
            }
        }
        err => Err(Error::Cola(err)),
    }
}

// ============================================================================
// Secure (SUL challenge-response)
// ============================================================================

/// Log in on a CoLa-2 device, detecting the SUL dialect on the way.
///
/// The detected variant is written back to `variant` so later logins skip
/// the probe. A device that rejects the parameterless SUL1 probe with
/// anything other than `BufferUnderflow` fails with
/// [`Error::ChallengeRejected`] carrying the device's code; such devices
/// never reach the SUL2 path, matching the established probe order.
pub fn login_secure<C: CommandChannel>(
    channel: &mut C,
    variant: &mut SulVariant,
    level: UserLevel,
    password: &str,
) -> Result<()> {
    if matches!(*variant, SulVariant::Unknown | SulVariant::Sul1) {
        let cmd = CommandWriter::new(CommandKind::MethodInvocation, "GetChallenge").build();
        let response = channel.send_command(&cmd);
        match response.error() {
            ColaError::Ok => {
                return complete_login(channel, variant, level, password, &response, SulVariant::Sul1);
            }
            ColaError::BufferUnderflow => {
                log::debug!("parameterless GetChallenge rejected, switching to SUL2");
                *variant = SulVariant::Sul2;
            }
            err => return Err(Error::ChallengeRejected(err)),
        }
    }

    if *variant == SulVariant::Sul2 {
        let cmd = CommandWriter::new(CommandKind::MethodInvocation, "GetChallenge")
            .param_u8(level.code())
            .build();
        let response = channel.send_command(&cmd);
        match response.error() {
            ColaError::Ok => {
                return complete_login(channel, variant, level, password, &response, SulVariant::Sul2);
            }
            err => return Err(Error::ChallengeRejected(err)),
        }
    }

    Err(Error::LoginFailed)
}

fn complete_login<C: CommandChannel>(
    channel: &mut C,
    variant: &mut SulVariant,
    level: UserLevel,
    password: &str,
    challenge_reply: &Command,
    dialect: SulVariant,
) -> Result<()> {
    let mut reader = CommandReader::new(challenge_reply);
    if reader.read_u8()? != SUCCESS {
        return Err(Error::LoginFailed);
    }

    let mut challenge = [0u8; 16];
    challenge.copy_from_slice(reader.read_bytes(16)?);

    let salt = if dialect == SulVariant::Sul2 {
        let mut salt = [0u8; 16];
        salt.copy_from_slice(reader.read_bytes(16)?);
        Some(salt)
    } else {
        None
    };

    let hash = password_hash(level, password, salt.as_ref());
    let response_bytes = challenge_response(&hash, &challenge);

    let mut writer = CommandWriter::new(CommandKind::MethodInvocation, "SetUserLevel");
    for b in response_bytes {
        writer = writer.param_u8(b);
    }
    let cmd = writer.param_u8(level.code()).build();

    let response = channel.send_command(&cmd);
    // The dialect is established once the challenge itself parsed, even when
    // the password turns out to be wrong.
    *variant = dialect;

    match response.error() {
        ColaError::Ok => {
            if CommandReader::new(&response).read_u8()? == SUCCESS {
                Ok(())
            } else {
                Err(Error::LoginFailed)
            }
        }
        err => Err(Error::Cola(err)),
    }
}

/// Drop back to run level by invoking `Run`.
pub fn logout<C: CommandChannel>(channel: &mut C) -> Result<()> {
    let cmd = CommandWriter::new(CommandKind::MethodInvocation, "Run").build();
    let response = channel.send_command(&cmd);
    match response.error() {
        ColaError::Ok => {
            if CommandReader::new(&response).read_u8()? != 0 {
                Ok(())
            } else {
                Err(Error::LoginFailed)
            }
        }
        err => Err(Error::Cola(err)),
    }
}
