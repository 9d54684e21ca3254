use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path, time::Duration};

use crate::persona::Personality;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum WindowChangeStrategy {
    /// Fingerprint the screen on a short interval and compare.
    HashPolling,
    /// React to foreground-application notifications pushed by the OS.
    ActiveWindow,
    Disabled,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct WindowChangeSettings {
    pub strategy: WindowChangeStrategy,
    pub poll_interval_ms: u64,
    /// Hash distance above which the screen counts as a different window.
    pub hash_threshold: u32,
    pub debounce_ms: u64,
}

impl Default for WindowChangeSettings {
    fn default() -> Self {
        Self {
            strategy: WindowChangeStrategy::HashPolling,
            poll_interval_ms: 2_000,
            hash_threshold: 15,
            debounce_ms: 3_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct EmotionSettings {
    pub enabled: bool,
    pub distracted_delta: i32,
    pub productive_delta: i32,
}

impl Default for EmotionSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            distracted_delta: -15,
            productive_delta: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ClassifierSettings {
    pub model: String,
    pub base_url: String,
    pub request_timeout_secs: u64,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            model: "claude-3-haiku-20240307".into(),
            base_url: "https://api.anthropic.com".into(),
            request_timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    pub personality: Personality,
    pub check_interval_secs: u64,
    pub chat_resume_delay_secs: u64,
    pub distraction_limit: u32,
    pub context_history_capacity: usize,
    /// Probability of reacting with a canned line instead of a generated one.
    pub static_reaction_ratio: f64,
    /// Probability of replacing the reaction with the persona's "back on track" line.
    pub back_on_track_ratio: f64,
    pub max_capture_failures: u32,
    pub emotion: EmotionSettings,
    pub window_change: WindowChangeSettings,
    pub classifier: ClassifierSettings,
    /// Program and arguments that write a PNG screenshot to stdout.
    pub capture_command: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            personality: Personality::Standard,
            check_interval_secs: 30,
            chat_resume_delay_secs: 60,
            distraction_limit: 3,
            context_history_capacity: 5,
            static_reaction_ratio: 0.7,
            back_on_track_ratio: 0.7,
            max_capture_failures: 3,
            emotion: EmotionSettings::default(),
            window_change: WindowChangeSettings::default(),
            classifier: ClassifierSettings::default(),
            capture_command: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Defaults, then the JSON file at `path` if it exists, then environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) if path.exists() => {
                let contents = fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config from {}", path.display()))?;
                serde_json::from_str(&contents).unwrap_or_else(|err| {
                    log::warn!("Ignoring unparsable config {}: {err}", path.display());
                    EngineConfig::default()
                })
            }
            _ => EngineConfig::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Applies `FOCUSPET_*` overrides; unparsable values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let debug_mode = lookup("FOCUSPET_DEBUG")
            .map(|value| is_truthy(&value))
            .unwrap_or(false);
        if debug_mode {
            self.check_interval_secs = 5;
        }

        if let Some(personality) = lookup("FOCUSPET_PERSONALITY") {
            match personality.parse() {
                Ok(parsed) => self.personality = parsed,
                Err(err) => log::warn!("{err}; keeping {}", self.personality),
            }
        }
        if let Some(secs) = parse_env(&lookup, "FOCUSPET_CHECK_INTERVAL_SECS") {
            self.check_interval_secs = secs;
        }
        if let Some(limit) = parse_env(&lookup, "FOCUSPET_DISTRACTION_LIMIT") {
            self.distraction_limit = limit;
        }
        if let Some(threshold) = parse_env(&lookup, "FOCUSPET_HASH_THRESHOLD") {
            self.window_change.hash_threshold = threshold;
        }
        if let Some(enabled) = lookup("FOCUSPET_EMOTION_TRACKING") {
            self.emotion.enabled = is_truthy(&enabled);
        }
        if let Some(strategy) = lookup("FOCUSPET_WINDOW_STRATEGY") {
            match strategy.as_str() {
                "hashPolling" => self.window_change.strategy = WindowChangeStrategy::HashPolling,
                "activeWindow" => self.window_change.strategy = WindowChangeStrategy::ActiveWindow,
                "disabled" => self.window_change.strategy = WindowChangeStrategy::Disabled,
                other => log::warn!("unknown window change strategy '{other}'"),
            }
        }
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs.max(1))
    }

    pub fn chat_resume_delay(&self) -> Duration {
        Duration::from_secs(self.chat_resume_delay_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.window_change.poll_interval_ms.max(100))
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.window_change.debounce_ms)
    }
}

/// API key from `ANTHROPIC_API_KEY`, falling back to `CLAUDE_API_KEY`.
pub fn api_key_from_env() -> Option<String> {
    ["ANTHROPIC_API_KEY", "CLAUDE_API_KEY"]
        .into_iter()
        .filter_map(|key| std::env::var(key).ok())
        .find(|value| !value.trim().is_empty())
}

fn parse_env<F, T>(lookup: &F, key: &str) -> Option<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            log::warn!("Ignoring {key}={raw}: not a valid number");
            None
        }
    }
}

fn is_truthy(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn overrides(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: EngineConfig = serde_json::from_str(
            r#"{ "personality": "panda", "windowChange": { "hashThreshold": 20 } }"#,
        )
        .unwrap();
        assert_eq!(config.personality, Personality::Panda);
        assert_eq!(config.window_change.hash_threshold, 20);
        assert_eq!(config.window_change.poll_interval_ms, 2_000);
        assert_eq!(config.distraction_limit, 3);
    }

    #[test]
    fn environment_overrides_apply() {
        let mut config = EngineConfig::default();
        config.apply_overrides(overrides(&[
            ("FOCUSPET_PERSONALITY", "grandpa"),
            ("FOCUSPET_DISTRACTION_LIMIT", "5"),
            ("FOCUSPET_EMOTION_TRACKING", "true"),
            ("FOCUSPET_WINDOW_STRATEGY", "activeWindow"),
        ]));
        assert_eq!(config.personality, Personality::Grandpa);
        assert_eq!(config.distraction_limit, 5);
        assert!(config.emotion.enabled);
        assert_eq!(config.window_change.strategy, WindowChangeStrategy::ActiveWindow);
    }

    #[test]
    fn bad_overrides_are_ignored() {
        let mut config = EngineConfig::default();
        config.apply_overrides(overrides(&[
            ("FOCUSPET_PERSONALITY", "pirate"),
            ("FOCUSPET_CHECK_INTERVAL_SECS", "soon"),
        ]));
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn debug_mode_shortens_interval() {
        let mut config = EngineConfig::default();
        config.apply_overrides(overrides(&[("FOCUSPET_DEBUG", "1")]));
        assert_eq!(config.check_interval(), Duration::from_secs(5));
    }

    #[test]
    fn missing_file_means_defaults() {
        let config = EngineConfig::load(Some(Path::new("/nonexistent/focuspet.json"))).unwrap();
        assert_eq!(config.personality, Personality::Standard);
    }
}
