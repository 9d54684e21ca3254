use std::sync::Arc;

use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::time::{Duration, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::monitor::MonitoringEngine;

use super::capture::{CapturedImage, ScreenshotSource};
use super::phash::{compute_hamming_distance, fingerprint};

// Polls every couple of seconds; flip off when tracing something else.
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

/// Foreground application report pushed by the OS integration.
///
/// Every field is optional so partial payloads deserialize and get ignored
/// instead of failing.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ActiveWindowEvent {
    #[serde(default)]
    pub app_name: Option<String>,
    #[serde(default)]
    pub window_title: Option<String>,
}

impl ActiveWindowEvent {
    pub fn app(name: &str) -> Self {
        Self {
            app_name: Some(name.to_string()),
            window_title: None,
        }
    }
}

/// Debounce state for active-window notifications.
#[derive(Debug, Clone)]
pub struct ActiveWindowDebouncer {
    min_gap: Duration,
    last_change_at: Option<Instant>,
    last_app: Option<String>,
}

impl ActiveWindowDebouncer {
    pub fn new(min_gap: Duration) -> Self {
        Self {
            min_gap,
            last_change_at: None,
            last_app: None,
        }
    }

    /// Returns the new application name when `event` is a genuine change.
    pub fn observe(&mut self, event: &ActiveWindowEvent, now: Instant) -> Option<String> {
        let app = event.app_name.as_deref().map(str::trim).filter(|a| !a.is_empty())?;

        if let Some(last) = self.last_change_at {
            if now.saturating_duration_since(last) < self.min_gap {
                return None;
            }
        }
        if self.last_app.as_deref() == Some(app) {
            return None;
        }

        self.last_change_at = Some(now);
        self.last_app = Some(app.to_string());
        Some(app.to_string())
    }

    pub fn last_app(&self) -> Option<&str> {
        self.last_app.as_deref()
    }

    pub fn reset(&mut self) {
        self.last_change_at = None;
        self.last_app = None;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FingerprintVerdict {
    /// Nothing to compare against yet.
    Baseline,
    Unchanged { distance: u32 },
    Changed { distance: u32 },
}

pub fn compare_fingerprint(previous: Option<&str>, current: &str, threshold: u32) -> FingerprintVerdict {
    let Some(previous) = previous else {
        return FingerprintVerdict::Baseline;
    };
    let distance = compute_hamming_distance(current, previous);
    if distance > threshold {
        FingerprintVerdict::Changed { distance }
    } else {
        FingerprintVerdict::Unchanged { distance }
    }
}

pub async fn hash_poll_loop(
    engine: MonitoringEngine,
    source: Arc<dyn ScreenshotSource>,
    poll_interval: Duration,
    cancel_token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(err) = poll_once(&engine, source.as_ref()).await {
                    log_warn!("window change poll failed: {err:#}");
                }
            }
            _ = cancel_token.cancelled() => {
                log_info!("window change poller shutting down");
                break;
            }
        }
    }
}

async fn poll_once(engine: &MonitoringEngine, source: &dyn ScreenshotSource) -> anyhow::Result<()> {
    let data_uri = source.capture().await?;
    let image = Arc::new(CapturedImage::from_data_uri(&data_uri)?);

    let current = tokio::task::spawn_blocking({
        let image = Arc::clone(&image);
        move || fingerprint(&image)
    })
    .await?;

    let Some(current) = current else {
        log_debug!("screenshot too small to fingerprint ({} bytes)", image.encoded().len());
        return Ok(());
    };

    match engine.record_fingerprint(current) {
        FingerprintVerdict::Baseline => log_debug!("stored initial screen fingerprint"),
        FingerprintVerdict::Unchanged { distance } => {
            log_debug!("minor screen change (distance {distance})")
        }
        FingerprintVerdict::Changed { distance } => {
            log_info!("window/tab change detected (distance {distance})");
            engine.on_window_changed(&image).await;
        }
    }
    Ok(())
}

pub async fn active_window_loop(
    engine: MonitoringEngine,
    mut events: mpsc::Receiver<ActiveWindowEvent>,
    cancel_token: CancellationToken,
) {
    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else {
                    log_info!("active window feed closed");
                    break;
                };
                engine.notify_active_window(&event).await;
            }
            _ = cancel_token.cancelled() => {
                log_info!("active window listener shutting down");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_fingerprint_is_a_baseline() {
        assert_eq!(compare_fingerprint(None, "abcd", 15), FingerprintVerdict::Baseline);
    }

    #[test]
    fn threshold_is_exclusive() {
        assert_eq!(
            compare_fingerprint(Some("0000"), "000f", 4),
            FingerprintVerdict::Unchanged { distance: 4 }
        );
        assert_eq!(
            compare_fingerprint(Some("0000"), "00ff", 4),
            FingerprintVerdict::Changed { distance: 8 }
        );
    }

    #[test]
    fn debouncer_ignores_missing_names() {
        let mut debouncer = ActiveWindowDebouncer::new(Duration::from_secs(3));
        let now = Instant::now();
        assert_eq!(debouncer.observe(&ActiveWindowEvent::default(), now), None);
        assert_eq!(debouncer.observe(&ActiveWindowEvent::app("   "), now), None);
        assert_eq!(debouncer.last_app(), None);
    }

    #[test]
    fn debouncer_suppresses_repeats_and_bursts() {
        let mut debouncer = ActiveWindowDebouncer::new(Duration::from_secs(3));
        let start = Instant::now();

        assert_eq!(
            debouncer.observe(&ActiveWindowEvent::app("Code"), start),
            Some("Code".to_string())
        );
        // Too soon after the last change.
        assert_eq!(
            debouncer.observe(&ActiveWindowEvent::app("Safari"), start + Duration::from_secs(1)),
            None
        );
        // Same app again later.
        assert_eq!(
            debouncer.observe(&ActiveWindowEvent::app("Code"), start + Duration::from_secs(10)),
            None
        );
        assert_eq!(
            debouncer.observe(&ActiveWindowEvent::app("Safari"), start + Duration::from_secs(11)),
            Some("Safari".to_string())
        );
    }

    #[test]
    fn partial_payloads_deserialize() {
        let event: ActiveWindowEvent = serde_json::from_str(r#"{"windowTitle":"x"}"#).unwrap();
        assert_eq!(event.app_name, None);
        let event: ActiveWindowEvent = serde_json::from_str(r#"{"appName":"Slack"}"#).unwrap();
        assert_eq!(event.app_name.as_deref(), Some("Slack"));
    }
}
