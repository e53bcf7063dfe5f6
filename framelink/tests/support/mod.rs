#![allow(dead_code)]

use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use framelink::prelude::*;

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ViewportEvent {
    Resize { frame: u64, width: u32, height: u32 },
    Overlay { frame: u64, visible: bool },
    Readback { frame: u64, width: u32, height: u32 },
}

/// A framebuffer-less viewport that records every call the capture pipeline
/// makes, tagged with the frame it happened on.
#[derive(Debug)]
pub struct RecordingViewport {
    pub frame: u64,
    pub size: (u32, u32),
    pub overlay: bool,
    pub origin: FramebufferOrigin,
    pub events: Vec<ViewportEvent>,
}

impl RecordingViewport {
    pub fn new(start_frame: u64) -> Self {
        Self {
            frame: start_frame,
            size: (320, 240),
            overlay: true,
            origin: FramebufferOrigin::TopLeft,
            events: Vec::new(),
        }
    }

    pub fn readbacks(&self) -> Vec<&ViewportEvent> {
        self.events
            .iter()
            .filter(|event| matches!(event, ViewportEvent::Readback { .. }))
            .collect()
    }
}

impl Viewport for RecordingViewport {
    fn current_frame(&self) -> u64 {
        self.frame
    }

    fn resize_viewport(&mut self, width: u32, height: u32) {
        self.size = (width, height);
        self.events.push(ViewportEvent::Resize {
            frame: self.frame,
            width,
            height,
        });
    }

    fn viewport_size(&self) -> (u32, u32) {
        self.size
    }

    fn set_overlay_visible(&mut self, visible: bool) {
        self.overlay = visible;
        self.events.push(ViewportEvent::Overlay {
            frame: self.frame,
            visible,
        });
    }

    fn read_framebuffer_rgb(
        &mut self,
        width: u32,
        height: u32,
    ) -> Result<Vec<u8>, String> {
        self.events.push(ViewportEvent::Readback {
            frame: self.frame,
            width,
            height,
        });
        Ok((0..width * height * 3).map(|i| (i % 251) as u8).collect())
    }

    fn framebuffer_origin(&self) -> FramebufferOrigin {
        self.origin
    }
}

/// Plays the host's main loop on a background thread: one
/// `Dispatcher::update` per frame, then the frame counter advances.
pub struct FrameDriver {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<RecordingViewport>>,
}

impl FrameDriver {
    pub fn start(dispatcher: Arc<Dispatcher>, start_frame: u64) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let keep_running = running.clone();

        let handle = thread::spawn(move || {
            let mut viewport = RecordingViewport::new(start_frame);
            let mut executor = |_: &str| -> Result<(), String> { Ok(()) };
            while keep_running.load(Ordering::SeqCst) {
                dispatcher.update(&mut viewport, &mut executor);
                viewport.frame += 1;
                thread::sleep(Duration::from_millis(1));
            }
            viewport
        });

        Self {
            running,
            handle: Some(handle),
        }
    }

    pub fn stop(mut self) -> RecordingViewport {
        self.running.store(false, Ordering::SeqCst);
        self.handle
            .take()
            .unwrap()
            .join()
            .expect("frame driver panicked")
    }
}

impl Drop for FrameDriver {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

pub fn png_size(png: &[u8]) -> (u32, u32) {
    assert_eq!(&png[1..4], b"PNG");
    let width = u32::from_be_bytes(png[16..20].try_into().unwrap());
    let height = u32::from_be_bytes(png[20..24].try_into().unwrap());
    (width, height)
}

#[derive(Debug)]
pub struct HttpReply {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl HttpReply {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Minimal HTTP/1.0 client: one request per connection.
pub fn http(port: u16, method: &str, target: &str, body: &[u8]) -> HttpReply {
    let mut stream = TcpStream::connect(("127.0.0.1", port)).unwrap();
    stream
        .set_read_timeout(Some(Duration::from_secs(20)))
        .unwrap();

    let head = format!(
        "{} {} HTTP/1.0\r\nHost: 127.0.0.1\r\nConnection: close\r\n\
         Content-Length: {}\r\n\r\n",
        method,
        target,
        body.len()
    );
    stream.write_all(head.as_bytes()).unwrap();
    stream.write_all(body).unwrap();

    let mut raw = Vec::new();
    let mut chunk = [0; 4096];
    let (header_end, content_length) = loop {
        let read = stream.read(&mut chunk).unwrap();
        assert!(read > 0, "connection closed before headers");
        raw.extend_from_slice(&chunk[..read]);
        if let Some(end) = find(&raw, b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&raw[..end]).into_owned();
            break (end + 4, header(&head, "content-length"));
        }
    };

    let content_length: usize = match content_length {
        Some(value) => value.parse().unwrap(),
        None => {
            stream.read_to_end(&mut raw).unwrap();
            raw.len() - header_end
        }
    };
    while raw.len() < header_end + content_length {
        let read = stream.read(&mut chunk).unwrap();
        assert!(read > 0, "connection closed before body");
        raw.extend_from_slice(&chunk[..read]);
    }

    let head = String::from_utf8_lossy(&raw[..header_end]).into_owned();
    let status = head
        .split_whitespace()
        .nth(1)
        .and_then(|code| code.parse().ok())
        .unwrap();

    HttpReply {
        status,
        content_type: header(&head, "content-type"),
        body: raw[header_end..header_end + content_length].to_vec(),
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn header(head: &str, name: &str) -> Option<String> {
    head.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        key.trim()
            .eq_ignore_ascii_case(name)
            .then(|| value.trim().to_string())
    })
}
