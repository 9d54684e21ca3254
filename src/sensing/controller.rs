use std::sync::Arc;

use log::info;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::monitor::MonitoringEngine;

use super::capture::ScreenshotSource;
use super::window_watch::{active_window_loop, hash_poll_loop, ActiveWindowEvent};

/// Owns the background task that detects window changes.
///
/// At most one strategy runs at a time; starting while active is a no-op.
pub struct WindowWatchController {
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
}

impl WindowWatchController {
    pub fn new() -> Self {
        Self {
            handle: None,
            cancel_token: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.handle
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    pub fn start_hash_polling(
        &mut self,
        engine: MonitoringEngine,
        source: Arc<dyn ScreenshotSource>,
        poll_interval: Duration,
    ) -> bool {
        if self.is_active() {
            return false;
        }

        info!(
            "Starting window change detection (hash polling every {}ms)",
            poll_interval.as_millis()
        );
        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(hash_poll_loop(
            engine,
            source,
            poll_interval,
            cancel_token.clone(),
        ));

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        true
    }

    pub fn start_active_window(
        &mut self,
        engine: MonitoringEngine,
        events: mpsc::Receiver<ActiveWindowEvent>,
    ) -> bool {
        if self.is_active() {
            return false;
        }

        info!("Starting window change detection (active window notifications)");
        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(active_window_loop(engine, events, cancel_token.clone()));

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        true
    }

    /// Signals the watcher to exit; returns whether one was running.
    pub fn stop(&mut self) -> bool {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }
        self.handle.take().is_some()
    }
}

impl Default for WindowWatchController {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for WindowWatchController {
    fn drop(&mut self) {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }
    }
}
