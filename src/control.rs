//! Control session
//!
//! High-level command surface over either framing: open/close, login, typed
//! variable reads and writes, method invocations, and the handful of
//! device commands every application needs (acquisition control, blob port
//! lookup).
//!
//! # Reconnect policy
//!
//! Exactly one transparent retry: when a response comes back as
//! `SessionUnknownId` (the camera dropped our session, e.g. after a timeout)
//! or `NetworkError` and auto-reconnect is enabled, the transport is torn
//! down, the connection and session are re-established and the command is
//! resent once. Anything else propagates to the caller untouched. The session
//! is not internally thread-safe; callers serialize their use.

use crate::auth::{self, CommandChannel, SulVariant, UserLevel};
use crate::cola::{
    ColaError, Command, CommandKind, CommandReader, CommandWriter, Framing, ProtocolVariant,
};
use crate::config::CameraConfig;
use crate::error::{Error, Result};
use crate::transport::TcpTransport;

/// Default blob channel port when the device does not answer `BlobTcpPortAPI`
const DEFAULT_BLOB_PORT: u16 = 2114;

/// Command session with a camera
pub struct Control {
    config: CameraConfig,
    framing: Framing,
    sul_variant: SulVariant,
    closed: bool,
}

impl Control {
    /// Connect to the camera's control channel and open a session.
    ///
    /// Fails when the configuration is invalid (in particular a session
    /// timeout beyond 255 s), the TCP connect fails, or the session
    /// handshake is rejected.
    pub fn open(config: CameraConfig) -> Result<Control> {
        config.validate()?;
        let framing = Self::connect(&config)?;
        log::info!(
            "control session open to {}:{} ({:?})",
            config.host,
            config.control_port(),
            config.protocol
        );
        Ok(Control {
            config,
            framing,
            sul_variant: SulVariant::default(),
            closed: false,
        })
    }

    fn connect(config: &CameraConfig) -> Result<Framing> {
        let transport = TcpTransport::connect(
            &config.host,
            config.control_port(),
            config.connect_timeout(),
            config.recv_timeout(),
        )?;

        let mut framing = match config.protocol {
            ProtocolVariant::ColaB => Framing::cola_b(Box::new(transport)),
            ProtocolVariant::Cola2 => Framing::cola_2(Box::new(transport)),
        };

        if let Err(e) = framing.open_session(config.session_timeout_secs()) {
            framing.shutdown();
            return Err(e);
        }
        Ok(framing)
    }

    /// Log out, close the session and shut the transport down.
    ///
    /// Idempotent; also runs on drop.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        let _ = self.logout();
        self.framing.close_session();
        self.framing.shutdown();
    }

    /// Log in at `level` with the scheme matching the protocol variant.
    pub fn login(&mut self, level: UserLevel, password: &str) -> Result<()> {
        match self.config.protocol {
            ProtocolVariant::ColaB => auth::login_legacy(self, level, password),
            ProtocolVariant::Cola2 => {
                let mut variant = self.sul_variant;
                let result = auth::login_secure(self, &mut variant, level, password);
                self.sul_variant = variant;
                result
            }
        }
    }

    /// Drop back to run level.
    pub fn logout(&mut self) -> Result<()> {
        auth::logout(self)
    }

    /// Read a variable; the returned command is the `sRA` response.
    pub fn read_variable(&mut self, name: &str) -> Result<Command> {
        let cmd = CommandWriter::new(CommandKind::ReadVariable, name).build();
        let response = self.send_command(&cmd);
        checked(response)
    }

    /// Write a variable, with `params` filling in the value bytes.
    pub fn write_variable(
        &mut self,
        name: &str,
        params: impl FnOnce(CommandWriter) -> CommandWriter,
    ) -> Result<Command> {
        let cmd = params(CommandWriter::new(CommandKind::WriteVariable, name)).build();
        let response = self.send_command(&cmd);
        checked(response)
    }

    /// Invoke a method, with `params` filling in the argument bytes.
    pub fn invoke_method(
        &mut self,
        name: &str,
        params: impl FnOnce(CommandWriter) -> CommandWriter,
    ) -> Result<Command> {
        let cmd = params(CommandWriter::new(CommandKind::MethodInvocation, name)).build();
        let response = self.send_command(&cmd);
        checked(response)
    }

    // ========================================================================
    // Device commands
    // ========================================================================

    /// Device identification string (`DeviceIdent`).
    pub fn device_ident(&mut self) -> Result<String> {
        let response = self.read_variable("DeviceIdent")?;
        CommandReader::new(&response).read_flex_string()
    }

    /// Start continuous frame acquisition (`PLAYSTART`).
    pub fn start_acquisition(&mut self) -> Result<()> {
        self.invoke_method("PLAYSTART", |w| w).map(drop)
    }

    /// Stop frame acquisition (`PLAYSTOP`).
    pub fn stop_acquisition(&mut self) -> Result<()> {
        self.invoke_method("PLAYSTOP", |w| w).map(drop)
    }

    /// Trigger a single frame (`PLAYNEXT`).
    pub fn step_acquisition(&mut self) -> Result<()> {
        self.invoke_method("PLAYNEXT", |w| w).map(drop)
    }

    /// Acquire a burst of `count` frames (`PLAYBURST`).
    pub fn burst_acquisition(&mut self, count: u16) -> Result<()> {
        self.invoke_method("PLAYBURST", |w| w.param_u16(count))
            .map(drop)
    }

    /// Blob channel port advertised by the device, falling back to the
    /// standard port when the variable cannot be read.
    pub fn blob_port(&mut self) -> u16 {
        match self.read_variable("BlobTcpPortAPI") {
            Ok(response) => CommandReader::new(&response)
                .read_u16()
                .unwrap_or(DEFAULT_BLOB_PORT),
            Err(_) => DEFAULT_BLOB_PORT,
        }
    }
}

impl CommandChannel for Control {
    /// Send a raw command, applying the reconnect policy.
    fn send_command(&mut self, cmd: &Command) -> Command {
        let mut response = self.framing.send(cmd);

        if self.config.auto_reconnect
            && !self.closed
            && matches!(
                response.error(),
                ColaError::SessionUnknownId | ColaError::NetworkError
            )
        {
            log::warn!(
                "control channel to {} lost ({:?}), reconnecting",
                self.config.host,
                response.error()
            );
            self.framing.shutdown();
            match Self::connect(&self.config) {
                Ok(framing) => {
                    self.framing = framing;
                    response = self.framing.send(cmd);
                }
                Err(e) => {
                    log::error!("reconnect to {} failed: {}", self.config.host, e);
                }
            }
        }

        response
    }
}

impl Drop for Control {
    fn drop(&mut self) {
        self.close();
    }
}

fn checked(response: Command) -> Result<Command> {
    match response.error() {
        ColaError::Ok => Ok(response),
        err => Err(Error::Cola(err)),
    }
}
