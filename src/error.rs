//! Error types for drishti-cam
//!
//! # Error Recovery Strategies
//!
//! Different error types require different recovery approaches:
//!
//! ## Transient Errors (Retry Recommended)
//!
//! - **`Io`**: Socket-level failure (connect refused, timeout, reset). The
//!   control session retries once when auto-reconnect is enabled; the frame
//!   grabber reconnects on its own schedule. Other callers should close and
//!   reopen the affected channel.
//!
//! - **`Network`**: A response could not be obtained or did not belong to the
//!   current request (lost sync, session/request id mismatch, short packet).
//!   The connection is out of sync and must be reopened.
//!
//! ## Protocol Errors (Log and Continue)
//!
//! - **`Cola`**: The device rejected a command with a typed error code. The
//!   channel itself remains usable; inspect the code to decide whether the
//!   command can be retried (e.g. after logging in at a higher user level).
//!
//! - **`MalformedFrame`**: A blob frame failed its length or bounds checks.
//!   The frame is dropped; the stream resynchronizes on the next packet.
//!
//! ## Caller Errors (Fix the Call)
//!
//! - **`OutOfRange`**: A typed parameter read would pass the end of the
//!   response buffer. The response does not have the shape the caller
//!   expected.
//!
//! - **`BufferTooSmall`**: A wire value was written into a destination
//!   shorter than the value itself.
//!
//! - **`Config`**: Invalid configuration (bad TOML, out-of-range timeout).
//!   Fix the configuration and retry.
//!
//! ## Fatal Errors (Require Restart)
//!
//! - **`ThreadPanic`**: The grabber worker panicked. Drop the grabber and
//!   create a new one.

use crate::cola::ColaError;
use thiserror::Error;

/// Errors that can occur in drishti-cam
///
/// See module-level documentation for recovery strategies.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("network error: {0}")]
    Network(&'static str),

    #[error("device error: {0:?}")]
    Cola(ColaError),

    #[error("challenge rejected by device: {0:?}")]
    ChallengeRejected(ColaError),

    #[error("login failed")]
    LoginFailed,

    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    #[error("XML error: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error("parameter read past end of command buffer")]
    OutOfRange,

    #[error("destination buffer too small for value")]
    BufferTooSmall,

    #[error("config error: {0}")]
    Config(String),

    #[error("thread panic")]
    ThreadPanic,

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
