pub mod classifier;
pub mod error;
pub mod monitor;
pub mod persona;
pub mod sensing;
pub mod settings;
pub mod utils;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use log::{info, warn};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use classifier::{AnthropicClient, ClassifierClient};
use monitor::{LogSink, MonitoringEngine};
use sensing::{ActiveWindowEvent, CommandScreenshotSource, ScreenshotSource};
use settings::{api_key_from_env, EngineConfig, WindowChangeStrategy};

/// One line of driver input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverCommand {
    Start,
    Stop,
    ToggleMode,
    ToggleStats,
    Personality(String),
    State,
    Quit,
    ActiveWindow(ActiveWindowEvent),
    Chat(String),
    Nothing,
}

impl DriverCommand {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.starts_with('{') {
            return match serde_json::from_str(line) {
                Ok(event) => DriverCommand::ActiveWindow(event),
                Err(err) => {
                    warn!("Ignoring malformed window event: {err}");
                    DriverCommand::Nothing
                }
            };
        }

        if let Some(("persona", id)) = line.split_once(' ') {
            return DriverCommand::Personality(id.trim().to_string());
        }

        match line {
            "" => DriverCommand::Nothing,
            "start" => DriverCommand::Start,
            "stop" => DriverCommand::Stop,
            "mode" => DriverCommand::ToggleMode,
            "stats" => DriverCommand::ToggleStats,
            "state" => DriverCommand::State,
            "quit" | "exit" => DriverCommand::Quit,
            other => DriverCommand::Chat(other.to_string()),
        }
    }
}

/// Headless entry point: wires the collaborators and reads commands from stdin.
pub async fn run() -> Result<()> {
    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    info!("FocusPet starting up...");

    let config_path = std::env::var_os("FOCUSPET_CONFIG").map(PathBuf::from);
    let config = EngineConfig::load(config_path.as_deref())?;

    let classifier: Option<Arc<dyn ClassifierClient>> = match api_key_from_env() {
        Some(key) => match AnthropicClient::new(&config.classifier, &key) {
            Ok(client) => Some(Arc::new(client)),
            Err(err) => {
                warn!("Failed to create classifier client: {err:#}");
                None
            }
        },
        None => {
            warn!("ANTHROPIC_API_KEY not set; chat and monitoring are unavailable");
            None
        }
    };

    let capture = CommandScreenshotSource::from_argv(&config.capture_command)
        .map(|source| Arc::new(source) as Arc<dyn ScreenshotSource>);
    if capture.is_none() {
        warn!("No capture command configured; set captureCommand in the config file");
    }

    let strategy = config.window_change.strategy;
    let engine = MonitoringEngine::new(config, Arc::new(LogSink), classifier);

    let window_events = if strategy == WindowChangeStrategy::ActiveWindow {
        let (tx, rx) = mpsc::channel(32);
        engine.attach_active_window_feed(rx);
        Some(tx)
    } else {
        None
    };

    engine.initialize(capture);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                if !dispatch(&engine, window_events.as_ref(), DriverCommand::parse(&line)).await {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }

    engine.shutdown();
    info!("FocusPet shut down");
    Ok(())
}

/// Runs one command; `false` ends the session.
async fn dispatch(
    engine: &MonitoringEngine,
    window_events: Option<&mpsc::Sender<ActiveWindowEvent>>,
    command: DriverCommand,
) -> bool {
    match command {
        DriverCommand::Start => {
            if let Err(err) = engine.start_monitoring(None) {
                warn!("{err}");
            }
        }
        DriverCommand::Stop => {
            engine.stop_monitoring();
        }
        DriverCommand::ToggleMode => {
            engine.toggle_mode();
        }
        DriverCommand::ToggleStats => {
            engine.toggle_stats_visibility();
        }
        DriverCommand::Personality(id) => {
            if let Err(err) = engine.set_personality(&id) {
                warn!("{err}");
            }
        }
        DriverCommand::State => match serde_json::to_string_pretty(&engine.get_state()) {
            Ok(json) => println!("{json}"),
            Err(err) => warn!("Failed to serialize state: {err}"),
        },
        DriverCommand::ActiveWindow(event) => match window_events {
            Some(tx) => {
                if tx.send(event).await.is_err() {
                    warn!("Active window listener is gone");
                }
            }
            None => warn!("Window events need windowChange.strategy = activeWindow"),
        },
        DriverCommand::Chat(query) => {
            let reply = engine.chat(&query).await;
            println!("{reply}");
        }
        DriverCommand::Quit => return false,
        DriverCommand::Nothing => {}
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_driver_commands() {
        assert_eq!(DriverCommand::parse(" start "), DriverCommand::Start);
        assert_eq!(DriverCommand::parse("mode"), DriverCommand::ToggleMode);
        assert_eq!(
            DriverCommand::parse("persona panda"),
            DriverCommand::Personality("panda".into())
        );
        assert_eq!(DriverCommand::parse(""), DriverCommand::Nothing);
        assert_eq!(
            DriverCommand::parse("how am I doing?"),
            DriverCommand::Chat("how am I doing?".into())
        );
    }

    #[test]
    fn parses_window_events() {
        assert_eq!(
            DriverCommand::parse(r#"{"appName": "Safari"}"#),
            DriverCommand::ActiveWindow(ActiveWindowEvent::app("Safari"))
        );
        assert_eq!(DriverCommand::parse("{not json"), DriverCommand::Nothing);
    }
}
