use log::info;

use super::state::StateSnapshot;

/// Receives every state change the engine makes.
///
/// Called synchronously from engine operations after the session lock is
/// released; implementations should hand work off rather than block.
pub trait PresentationSink: Send + Sync {
    fn on_update(&self, snapshot: &StateSnapshot, message: Option<&str>, speak: bool);
}

/// Sink for the headless driver: writes updates to the log.
#[derive(Debug, Default)]
pub struct LogSink;

impl PresentationSink for LogSink {
    fn on_update(&self, snapshot: &StateSnapshot, message: Option<&str>, speak: bool) {
        let state = serde_json::to_string(snapshot).unwrap_or_else(|_| format!("{snapshot:?}"));
        match message {
            Some(message) if speak => info!("🔊 {message} {state}"),
            Some(message) => info!("💬 {message} {state}"),
            None => info!("{state}"),
        }
    }
}
