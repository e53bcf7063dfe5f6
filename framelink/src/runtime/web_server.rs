use std::io::{self, Read};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, info, warn};
use tiny_http::{Header, Request, Response, Server};

use super::dispatcher::Dispatcher;
use super::routes::{self, ApiResponse};
use crate::error::RemoteError;

const POLL_INTERVAL: Duration = Duration::from_millis(100);
pub const MAX_BODY_BYTES: u64 = 16 * 1024 * 1024;

/// The HTTP listener. Each worker thread pulls requests off the shared
/// server and runs them through [`routes::handle`], so a capture blocks only
/// the worker that received it.
pub struct WebServer {
    server: Arc<Server>,
    port: u16,
    running: Arc<AtomicBool>,
    workers: Vec<JoinHandle<()>>,
}

impl WebServer {
    pub fn start(
        address: &str,
        port: u16,
        worker_threads: usize,
        dispatcher: Arc<Dispatcher>,
    ) -> Result<Self, RemoteError> {
        let server = Server::http((address, port)).map_err(|source| {
            RemoteError::ListenerStartFailed { port, source }
        })?;
        let server = Arc::new(server);
        let bound_port = server
            .server_addr()
            .to_ip()
            .map(|addr| addr.port())
            .unwrap_or(port);
        let running = Arc::new(AtomicBool::new(true));

        let mut web_server = Self {
            server,
            port: bound_port,
            running,
            workers: Vec::new(),
        };

        for index in 0..worker_threads.max(1) {
            let server = web_server.server.clone();
            let running = web_server.running.clone();
            let dispatcher = dispatcher.clone();

            let spawned = thread::Builder::new()
                .name(format!("framelink-http-{}", index))
                .spawn(move || worker_loop(&server, &running, &dispatcher));

            match spawned {
                Ok(handle) => web_server.workers.push(handle),
                Err(err) => {
                    web_server.stop();
                    return Err(err.into());
                }
            }
        }

        info!(
            "Listening on {}:{} with {} worker(s)",
            address,
            bound_port,
            web_server.workers.len()
        );

        Ok(web_server)
    }

    /// The port actually bound, which differs from the requested one when
    /// that was 0.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Asks the workers to exit without waiting for them.
    pub fn signal_stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        for _ in 0..self.workers.len() {
            self.server.unblock();
        }
    }

    pub fn is_finished(&self) -> bool {
        self.workers.iter().all(JoinHandle::is_finished)
    }

    /// Stops and joins every worker. A worker blocked in a capture is only
    /// released once that capture completes or the coordinator shuts down.
    pub fn stop(&mut self) {
        if self.workers.is_empty() {
            return;
        }

        self.signal_stop();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                warn!("HTTP worker on port {} panicked", self.port);
            }
        }

        info!("Stopped listening on port {}", self.port);
    }
}

impl Drop for WebServer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn worker_loop(server: &Server, running: &AtomicBool, dispatcher: &Dispatcher) {
    while running.load(Ordering::SeqCst) {
        match server.recv_timeout(POLL_INTERVAL) {
            Ok(Some(request)) => serve(request, dispatcher),
            Ok(None) => {}
            Err(err) => {
                warn!("Failed to receive request: {}", err);
                break;
            }
        }
    }

    debug!("HTTP worker {:?} is exiting", thread::current().name());
}

fn serve(mut request: Request, dispatcher: &Dispatcher) {
    let method = request.method().to_string();
    let url = request.url().to_string();

    let response = match read_body(request.as_reader()) {
        Ok(body) => routes::handle(dispatcher, &method, &url, &body),
        Err(response) => {
            warn!("Rejected {} {}: {}", method, url, response.body_text());
            response
        }
    };

    let status = response.status;
    let mut reply = Response::from_data(response.body).with_status_code(status);
    if let Ok(header) =
        Header::from_bytes(&b"Content-Type"[..], response.content_type)
    {
        reply = reply.with_header(header);
    }

    if let Err(err) = request.respond(reply) {
        warn!("Failed to answer {} {}: {}", method, url, err);
    }
}

/// Reads the whole body, refusing anything over [`MAX_BODY_BYTES`] rather
/// than handing a truncated body to the routes. The rest of an oversized
/// body is drained so the client sees the reply instead of a reset.
fn read_body(reader: &mut dyn Read) -> Result<Vec<u8>, ApiResponse> {
    let mut body = Vec::new();
    (&mut *reader)
        .take(MAX_BODY_BYTES + 1)
        .read_to_end(&mut body)
        .map_err(|err| {
            ApiResponse::text(400, format!("unreadable body: {}", err))
        })?;

    if body.len() as u64 > MAX_BODY_BYTES {
        let _ = io::copy(reader, &mut io::sink());
        return Err(ApiResponse::text(
            413,
            format!("request body exceeds {} bytes", MAX_BODY_BYTES),
        ));
    }

    Ok(body)
}
