//! Background frame grabber
//!
//! One worker thread per grabber keeps the newest frame available without
//! the application having to pace the camera: the worker parses into its own
//! `active` frame buffer and swaps it with the mailbox's `ready` buffer under
//! the lock, so a consumer never observes a half-parsed frame and no frame
//! data is ever copied, only moved.
//!
//! ```text
//!  worker thread                      mailbox                  consumer
//!  ┌─────────────┐   swap under lock ┌────────┐  swap on take ┌────────┐
//!  │ active:Frame│ ◄───────────────► │ ready  │ ◄───────────► │ out    │
//!  └─────────────┘   + notify        └────────┘               └────────┘
//! ```
//!
//! The worker owns its reconnect cycle: a failed read probes the connection
//! with a keepalive and, when dead, closes and reopens the stream, retrying
//! every second until shutdown. Consumers only ever wait on their own
//! timeout.

use crate::blob::{BlobClient, DeviceFamily, Frame};
use crate::error::{Error, Result};
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Pause between reconnect attempts
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

struct Mailbox {
    ready: Frame,
    frame_available: bool,
}

struct Shared {
    mailbox: Mutex<Mailbox>,
    frame_ready: Condvar,
    running: AtomicBool,
    connected: AtomicBool,
}

/// Continuously running frame receiver
pub struct FrameGrabber {
    family: DeviceFamily,
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl FrameGrabber {
    /// Spawn the worker thread. Connecting happens on the worker, so `start`
    /// returns immediately even when the camera is still booting.
    pub fn start(
        family: DeviceFamily,
        host: &str,
        port: u16,
        connect_timeout: Duration,
        recv_timeout: Duration,
    ) -> Result<FrameGrabber> {
        let shared = Arc::new(Shared {
            mailbox: Mutex::new(Mailbox {
                ready: Frame::new(family),
                frame_available: false,
            }),
            frame_ready: Condvar::new(),
            running: AtomicBool::new(true),
            connected: AtomicBool::new(false),
        });

        let worker_shared = Arc::clone(&shared);
        let host = host.to_string();
        let worker = thread::Builder::new()
            .name("blob-grabber".to_string())
            .spawn(move || {
                worker_loop(
                    worker_shared,
                    family,
                    host,
                    port,
                    connect_timeout,
                    recv_timeout,
                );
            })
            .map_err(|e| Error::Other(format!("failed to spawn grabber thread: {}", e)))?;

        Ok(FrameGrabber {
            family,
            shared,
            worker: Some(worker),
        })
    }

    pub fn family(&self) -> DeviceFamily {
        self.family
    }

    /// Whether the worker currently holds an open blob connection
    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::Acquire)
    }

    /// Wait up to `timeout` for a frame parsed after this call, swapping it
    /// into `out`. Returns false on timeout.
    ///
    /// Any frame already sitting in the mailbox is discarded first, so the
    /// result is never older than the call (use [`get_current_frame`] to
    /// accept one). `out` must be a frame of the grabber's family.
    ///
    /// [`get_current_frame`]: FrameGrabber::get_current_frame
    pub fn get_next_frame(&self, out: &mut Frame, timeout: Duration) -> bool {
        if out.family() != self.family {
            log::error!("frame buffer family does not match the grabber");
            return false;
        }

        let deadline = Instant::now() + timeout;
        let mut mailbox = self.shared.mailbox.lock();
        mailbox.frame_available = false;

        while !mailbox.frame_available {
            if self
                .shared
                .frame_ready
                .wait_until(&mut mailbox, deadline)
                .timed_out()
            {
                break;
            }
        }

        if mailbox.frame_available {
            mailbox.frame_available = false;
            std::mem::swap(out, &mut mailbox.ready);
            true
        } else {
            false
        }
    }

    /// Take the most recently parsed frame if one is waiting; never blocks.
    pub fn get_current_frame(&self, out: &mut Frame) -> bool {
        if out.family() != self.family {
            log::error!("frame buffer family does not match the grabber");
            return false;
        }

        let mut mailbox = self.shared.mailbox.lock();
        if mailbox.frame_available {
            mailbox.frame_available = false;
            std::mem::swap(out, &mut mailbox.ready);
            true
        } else {
            false
        }
    }

    /// Stop the worker and wait for it to exit.
    ///
    /// The worker notices the flag once its current read returns, which the
    /// socket receive timeout bounds.
    pub fn stop(&mut self) -> Result<()> {
        self.shared.running.store(false, Ordering::Release);
        if let Some(handle) = self.worker.take() {
            handle.join().map_err(|_| Error::ThreadPanic)?;
        }
        Ok(())
    }
}

impl Drop for FrameGrabber {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            log::error!("grabber worker did not shut down cleanly: {}", e);
        }
    }
}

fn worker_loop(
    shared: Arc<Shared>,
    family: DeviceFamily,
    host: String,
    port: u16,
    connect_timeout: Duration,
    recv_timeout: Duration,
) {
    let mut active = Frame::new(family);
    let mut client: Option<BlobClient> = None;

    while shared.running.load(Ordering::Acquire) {
        if client.is_none() {
            match BlobClient::connect(family, &host, port, connect_timeout, recv_timeout) {
                Ok(stream) => {
                    shared.connected.store(true, Ordering::Release);
                    client = Some(stream);
                }
                Err(e) => {
                    log::warn!("blob connect to {}:{} failed: {}", host, port, e);
                    shared.connected.store(false, Ordering::Release);
                    thread::sleep(RECONNECT_DELAY);
                    continue;
                }
            }
        }
        let Some(stream) = client.as_mut() else {
            continue;
        };

        match stream.get_next_frame(&mut active) {
            Ok(()) => {
                let mut mailbox = shared.mailbox.lock();
                std::mem::swap(&mut mailbox.ready, &mut active);
                mailbox.frame_available = true;
                drop(mailbox);
                shared.frame_ready.notify_one();
            }
            Err(e) => {
                log::debug!("frame cycle failed: {}", e);
                if !stream.is_alive() {
                    log::warn!("blob connection to {}:{} lost, reconnecting", host, port);
                    stream.shutdown();
                    client = None;
                    shared.connected.store(false, Ordering::Release);
                }
            }
        }
    }

    if let Some(mut stream) = client {
        stream.shutdown();
    }
    shared.connected.store(false, Ordering::Release);
    log::info!("grabber worker exiting");
}
