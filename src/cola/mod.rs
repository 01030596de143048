//! CoLa command language
//!
//! The camera's command surface is a set of named variables and methods
//! addressed through short ASCII-tagged telegrams ("sRN DeviceIdent",
//! "sMN SetUserLevel", ...). Two wire framings carry them: CoLa-B
//! (checksummed, sessionless, port 2112) and CoLa-2 (session + request ids,
//! port 2122). This module holds the framing-independent command model
//! (tag, name, typed parameters) and both framings.

mod command;
pub use command::{ColaError, Command, CommandKind};

mod writer;
pub use writer::CommandWriter;

mod reader;
pub use reader::CommandReader;

mod framing;
pub use framing::{sync_to_preamble, Cola2Framing, ColaBFraming, Framing};

/// TCP port of the CoLa-B command channel
pub const COLA_B_PORT: u16 = 2112;
/// TCP port of the CoLa-2 command channel
pub const COLA_2_PORT: u16 = 2122;

/// Command channel variant spoken by a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolVariant {
    /// Checksummed, sessionless framing (legacy devices)
    ColaB,
    /// Sessioned framing with request ids
    #[serde(rename = "cola_2")]
    Cola2,
}

impl ProtocolVariant {
    /// Standard TCP port of this variant's control channel
    pub fn control_port(self) -> u16 {
        match self {
            ProtocolVariant::ColaB => COLA_B_PORT,
            ProtocolVariant::Cola2 => COLA_2_PORT,
        }
    }
}
