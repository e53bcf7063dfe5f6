use std::sync::Arc;

use log::{debug, info, warn};

use super::command_queue::{DrainReport, ScriptExecutor};
use super::dispatcher::Dispatcher;
use super::log_buffer::LogSubscription;
use super::settings::RemoteSettings;
use super::web_server::WebServer;
use crate::viewport::Viewport;

/// Owns the remote API for the lifetime of the host: the dispatcher, its
/// log subscription and the HTTP listener.
///
/// All methods are meant to be called from the host's main loop thread.
pub struct WebApi {
    settings: RemoteSettings,
    dispatcher: Arc<Dispatcher>,
    server: Option<WebServer>,
    /// A listener that was asked to stop but still has a worker busy, e.g.
    /// blocked in a capture that only the main loop can complete.
    retiring: Option<WebServer>,
    pending_start: bool,
    log_subscription: Option<LogSubscription>,
}

impl WebApi {
    /// Never fails on a busy port: the listener error is logged and the API
    /// keeps running without serving until the settings change.
    pub fn new(settings: RemoteSettings) -> Self {
        let dispatcher = Arc::new(Dispatcher::from_settings(&settings));

        let log_subscription = match dispatcher.log_buffer().subscribe() {
            Ok(subscription) => Some(subscription),
            Err(err) => {
                warn!("Failed to subscribe to log events: {}", err);
                None
            }
        };

        let mut web_api = Self {
            settings,
            dispatcher,
            server: None,
            retiring: None,
            pending_start: true,
            log_subscription,
        };
        web_api.poll_server();
        web_api
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn settings(&self) -> &RemoteSettings {
        &self.settings
    }

    /// The bound port, if the listener is up.
    pub fn server_port(&self) -> Option<u16> {
        self.server.as_ref().map(WebServer::port)
    }

    /// Applies new settings. The landing page takes effect immediately; the
    /// listener is restarted only when its bind parameters changed or it is
    /// not running.
    pub fn on_settings_changed(&mut self, settings: RemoteSettings) {
        self.dispatcher.set_landing_page(settings.page_path());

        if settings.log_capacity != self.settings.log_capacity {
            debug!("logCapacity changes take effect on the next start");
        }

        let restart = self.server.is_none()
            || self.settings.listener_differs(&settings);
        self.settings = settings;

        if restart {
            self.restart_server();
        }
    }

    pub fn on_settings_save(&self) -> RemoteSettings {
        self.settings.clone()
    }

    /// Call once per frame.
    pub fn update(
        &mut self,
        viewport: &mut dyn Viewport,
        executor: &mut dyn ScriptExecutor,
    ) -> DrainReport {
        let report = self.dispatcher.update(viewport, executor);
        if self.pending_start {
            self.poll_server();
        }
        report
    }

    /// Wakes any blocked capture callers with a shutdown error and stops
    /// the listener. Safe to call more than once.
    pub fn shutdown(&mut self) {
        self.dispatcher.shutdown();
        self.pending_start = false;

        if let Some(mut server) = self.retiring.take() {
            server.stop();
        }
        if let Some(mut server) = self.server.take() {
            server.stop();
        }

        if self.log_subscription.take().is_some() {
            debug!("Unsubscribed from log events");
        }
    }

    fn restart_server(&mut self) {
        if let Some(server) = self.server.take() {
            info!("Restarting server on port {}", self.settings.port);
            server.signal_stop();
            self.retiring = Some(server);
        }
        self.pending_start = true;

        // A worker may be parked in a capture that only `update` can
        // finish, so the new listener comes up from there if not now.
        self.poll_server();
    }

    fn poll_server(&mut self) {
        if let Some(server) = &self.retiring {
            if !server.is_finished() {
                return;
            }
        }
        if let Some(mut server) = self.retiring.take() {
            server.stop();
        }

        if !self.pending_start || self.dispatcher.capture().is_shutting_down()
        {
            return;
        }
        self.pending_start = false;

        match WebServer::start(
            &self.settings.address,
            self.settings.port,
            self.settings.worker_threads,
            self.dispatcher.clone(),
        ) {
            Ok(server) => self.server = Some(server),
            Err(err) => warn!("Failed to start server: {}!", err),
        }
    }
}

impl Drop for WebApi {
    fn drop(&mut self) {
        self.shutdown();
    }
}
