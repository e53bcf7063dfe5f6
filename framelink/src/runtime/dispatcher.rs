use std::path::PathBuf;
use std::sync::Arc;

use log::trace;
use parking_lot::RwLock;

use super::capture::{CaptureCoordinator, CaptureParams};
use super::command_queue::{CommandQueue, DrainReport, ScriptExecutor};
use super::log_buffer::LogBuffer;
use super::settings::RemoteSettings;
use crate::error::RemoteError;
use crate::viewport::Viewport;

pub const STATUS_MESSAGE: &str = "Framelink is running. You can modify this \
    page with the 'page' key in the remote api settings.";

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Landing {
    /// Serve this file as the landing page.
    Page(PathBuf),
    Status(&'static str),
}

/// Routes each remote operation to the primitive that implements it. Shared
/// between the request threads and the main loop.
pub struct Dispatcher {
    log_buffer: Arc<LogBuffer>,
    command_queue: CommandQueue,
    capture: CaptureCoordinator,
    landing_page: RwLock<Option<PathBuf>>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::from_settings(&RemoteSettings::default())
    }
}

impl Dispatcher {
    pub fn new(
        log_buffer: Arc<LogBuffer>,
        capture: CaptureCoordinator,
        landing_page: Option<PathBuf>,
    ) -> Self {
        Self {
            log_buffer,
            command_queue: CommandQueue::new(),
            capture,
            landing_page: RwLock::new(landing_page),
        }
    }

    pub fn from_settings(settings: &RemoteSettings) -> Self {
        Self::new(
            Arc::new(LogBuffer::new(settings.log_capacity)),
            CaptureCoordinator::new(settings.capture_timeout()),
            settings.page_path(),
        )
    }

    pub fn log_buffer(&self) -> &Arc<LogBuffer> {
        &self.log_buffer
    }

    pub fn command_queue(&self) -> &CommandQueue {
        &self.command_queue
    }

    pub fn capture(&self) -> &CaptureCoordinator {
        &self.capture
    }

    pub fn set_landing_page(&self, page: Option<PathBuf>) {
        *self.landing_page.write() = page;
    }

    pub fn get_recent_logs(&self, limit: usize) -> Vec<String> {
        self.log_buffer.snapshot(limit)
    }

    /// Blocks for at least `frame_delay` frames of the main loop.
    pub fn capture_frame(
        &self,
        params: CaptureParams,
    ) -> Result<Vec<u8>, RemoteError> {
        self.capture.request_and_wait(params)
    }

    pub fn submit_script(&self, body: impl Into<String>) {
        self.command_queue.push(body);
    }

    pub fn serve_landing(&self) -> Landing {
        match self.landing_page.read().as_ref() {
            Some(path) => Landing::Page(path.clone()),
            None => Landing::Status(STATUS_MESSAGE),
        }
    }

    /// The per-frame hook for the host's main loop: runs queued scripts,
    /// then advances the capture handshake.
    pub fn update(
        &self,
        viewport: &mut dyn Viewport,
        executor: &mut dyn ScriptExecutor,
    ) -> DrainReport {
        let report = self.command_queue.drain_and_execute(executor);
        let frame = viewport.current_frame();
        self.capture.tick(frame, viewport);

        if report.executed > 0 {
            trace!(
                "frame {}: executed {} scripts ({} failed)",
                frame, report.executed, report.failed
            );
        }

        report
    }

    pub fn shutdown(&self) {
        self.capture.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::log_buffer::{LogEntry, Severity};

    struct StillViewport {
        frame: u64,
    }

    impl Viewport for StillViewport {
        fn current_frame(&self) -> u64 {
            self.frame
        }

        fn resize_viewport(&mut self, _width: u32, _height: u32) {}

        fn viewport_size(&self) -> (u32, u32) {
            (10, 10)
        }

        fn set_overlay_visible(&mut self, _visible: bool) {}

        fn read_framebuffer_rgb(
            &mut self,
            width: u32,
            height: u32,
        ) -> Result<Vec<u8>, String> {
            Ok(vec![0; (width * height * 3) as usize])
        }
    }

    #[test]
    fn recent_logs_come_from_the_log_buffer() {
        let dispatcher = Dispatcher::default();
        dispatcher
            .log_buffer()
            .append(LogEntry::new(Severity::Info, "", "a"));
        dispatcher
            .log_buffer()
            .append(LogEntry::new(Severity::Error, "", "b"));

        assert_eq!(dispatcher.get_recent_logs(100), vec!["[E] b", "[I] a"]);
        assert_eq!(dispatcher.get_recent_logs(1), vec!["[E] b"]);
    }

    #[test]
    fn submitted_script_runs_exactly_once_on_next_update() {
        let dispatcher = Dispatcher::default();
        dispatcher.submit_script("alert(1)");

        let mut viewport = StillViewport { frame: 1 };
        let mut executed = Vec::new();
        let mut executor = |script: &str| -> Result<(), String> {
            executed.push(script.to_string());
            Ok(())
        };

        dispatcher.update(&mut viewport, &mut executor);
        viewport.frame += 1;
        dispatcher.update(&mut viewport, &mut executor);

        assert_eq!(executed, vec!["alert(1)"]);
    }

    #[test]
    fn landing_falls_back_to_status_message() {
        let dispatcher = Dispatcher::default();
        assert_eq!(dispatcher.serve_landing(), Landing::Status(STATUS_MESSAGE));

        dispatcher.set_landing_page(Some(PathBuf::from("index.html")));
        assert_eq!(
            dispatcher.serve_landing(),
            Landing::Page(PathBuf::from("index.html"))
        );
    }

    #[test]
    fn shutdown_rejects_new_captures() {
        let dispatcher = Dispatcher::default();
        dispatcher.shutdown();

        assert!(matches!(
            dispatcher.capture_frame(CaptureParams::default()),
            Err(RemoteError::ShuttingDown)
        ));
    }
}
