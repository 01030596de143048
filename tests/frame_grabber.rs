//! Frame grabber tests against an in-process blob server

mod common;

use drishti_cam::{DeviceFamily, Frame, FrameGrabber};
use std::io::{Read, Write};
use std::net::TcpListener;
use std::thread;
use std::time::{Duration, Instant};

fn start_grabber(port: u16) -> FrameGrabber {
    FrameGrabber::start(
        DeviceFamily::TofMini,
        "127.0.0.1",
        port,
        Duration::from_millis(500),
        Duration::from_millis(200),
    )
    .unwrap()
}

/// Accept one connection and stream frames until the client goes away.
fn serve_frames(listener: TcpListener) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let Ok((mut stream, _)) = listener.accept() else {
            return;
        };
        let mut frame_number = 1u32;
        loop {
            let packet = common::blob_packet(frame_number, 1);
            if stream.write_all(&packet).is_err() {
                return;
            }
            frame_number += 1;
            thread::sleep(Duration::from_millis(20));
        }
    })
}

#[test]
fn test_receives_streamed_frames() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let _server = serve_frames(listener);

    let mut grabber = start_grabber(port);
    let mut frame = Frame::new(DeviceFamily::TofMini);

    assert!(grabber.get_next_frame(&mut frame, Duration::from_secs(2)));
    let first = frame.frame_number();
    assert!(first >= 1);
    assert_eq!(frame.metadata().width, 2);
    match &frame {
        Frame::TofMini(f) => assert_eq!(f.distance_map, vec![100, 101, 102, 103]),
        _ => unreachable!(),
    }

    // The stream keeps flowing, so a second wait yields a newer frame.
    assert!(grabber.get_next_frame(&mut frame, Duration::from_secs(2)));
    assert!(frame.frame_number() > first);

    grabber.stop().unwrap();
}

#[test]
fn test_get_current_frame_is_nonblocking() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let _server = serve_frames(listener);

    let grabber = start_grabber(port);
    let mut frame = Frame::new(DeviceFamily::TofMini);

    // Eventually a frame lands in the mailbox without us waiting on it.
    let deadline = Instant::now() + Duration::from_secs(2);
    let mut got = false;
    while Instant::now() < deadline {
        if grabber.get_current_frame(&mut frame) {
            got = true;
            break;
        }
        thread::sleep(Duration::from_millis(10));
    }
    assert!(got);
}

#[test]
fn test_timeout_when_stream_stalls() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    // Accept and hold the connection open without ever sending a frame.
    let _server = thread::spawn(move || {
        let Ok((mut stream, _)) = listener.accept() else {
            return;
        };
        let mut sink = [0u8; 64];
        while stream.read(&mut sink).map(|n| n > 0).unwrap_or(false) {}
    });

    let mut grabber = start_grabber(port);
    let mut frame = Frame::new(DeviceFamily::TofMini);

    let started = Instant::now();
    assert!(!grabber.get_next_frame(&mut frame, Duration::from_millis(300)));
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(300));
    assert!(elapsed < Duration::from_secs(5));

    grabber.stop().unwrap();
}

#[test]
fn test_reconnects_after_connection_loss() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = thread::spawn(move || {
        // First connection: one frame, then close.
        if let Ok((mut stream, _)) = listener.accept() {
            let _ = stream.write_all(&common::blob_packet(1, 1));
        }
        // Second connection: stream forever.
        let Ok((mut stream, _)) = listener.accept() else {
            return;
        };
        let mut frame_number = 100u32;
        loop {
            if stream.write_all(&common::blob_packet(frame_number, 1)).is_err() {
                return;
            }
            frame_number += 1;
            thread::sleep(Duration::from_millis(20));
        }
    });

    let mut grabber = start_grabber(port);
    let mut frame = Frame::new(DeviceFamily::TofMini);

    // Frames from the second connection arrive after the automatic
    // reconnect; allow for the 1 s backoff.
    let deadline = Instant::now() + Duration::from_secs(10);
    let mut reconnected = false;
    while Instant::now() < deadline {
        if grabber.get_next_frame(&mut frame, Duration::from_millis(500))
            && frame.frame_number() >= 100
        {
            reconnected = true;
            break;
        }
    }
    assert!(reconnected);

    grabber.stop().unwrap();
    drop(server);
}
