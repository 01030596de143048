//! Drishti-Cam - client library for SICK Visionary 3D cameras
//!
//! Talks to Visionary-S, Visionary-T and Visionary-T Mini devices over
//! their native protocols:
//!
//! - **Control channel**: named variable/method commands over CoLa-B (port
//!   2112) or CoLa-2 (port 2122), including user-level login (legacy MD5 or
//!   SHA-256 challenge-response).
//! - **Blob channel**: the continuous depth/intensity/confidence frame
//!   stream, decoded into typed frames per device family and kept fresh by
//!   a background [`FrameGrabber`].
//! - **Discovery**: AutoIP scan and IP assignment over UDP broadcast.
//!
//! ## Example
//!
//! ```no_run
//! use drishti_cam::{CameraConfig, Control, DeviceFamily, Frame, FrameGrabber};
//! use drishti_cam::cola::ProtocolVariant;
//! use std::time::Duration;
//!
//! # fn main() -> drishti_cam::Result<()> {
//! let config = CameraConfig::new("192.168.1.10", ProtocolVariant::Cola2);
//! let mut control = Control::open(config.clone())?;
//! let blob_port = control.blob_port();
//! control.start_acquisition()?;
//!
//! let grabber = FrameGrabber::start(
//!     DeviceFamily::TofMini,
//!     &config.host,
//!     blob_port,
//!     config.connect_timeout(),
//!     config.recv_timeout(),
//! )?;
//!
//! let mut frame = Frame::new(DeviceFamily::TofMini);
//! if grabber.get_next_frame(&mut frame, Duration::from_secs(1)) {
//!     println!("frame {} at {} ms", frame.frame_number(), frame.timestamp_ms());
//! }
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod blob;
pub mod cola;
pub mod config;
pub mod control;
pub mod discovery;
pub mod endian;
pub mod error;
pub mod grabber;
pub mod ply;
pub mod pointcloud;
pub mod transport;

// Re-export commonly used types
pub use blob::{BlobClient, DeviceFamily, Frame};
pub use config::CameraConfig;
pub use control::Control;
pub use error::{Error, Result};
pub use grabber::FrameGrabber;
