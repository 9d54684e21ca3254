use std::collections::VecDeque;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Duration;

use crate::classifier::PersonaContext;
use crate::persona::Personality;
use crate::sensing::ActiveWindowDebouncer;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum Mode {
    #[default]
    Productivity,
    Relax,
}

impl Mode {
    pub fn toggled(self) -> Self {
        match self {
            Mode::Productivity => Mode::Relax,
            Mode::Relax => Mode::Productivity,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Mode::Productivity => "productivity",
            Mode::Relax => "relax",
        })
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum LifeState {
    #[default]
    Alive,
    Dead,
}

impl fmt::Display for LifeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LifeState::Alive => "alive",
            LifeState::Dead => "dead",
        })
    }
}

pub const MAX_EMOTION_LEVEL: u8 = 100;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum EmotionTier {
    Happy,
    Neutral,
    Unhappy,
    Critical,
    Dead,
}

impl EmotionTier {
    pub fn from_level(level: u8) -> Self {
        match level {
            80.. => EmotionTier::Happy,
            60..=79 => EmotionTier::Neutral,
            40..=59 => EmotionTier::Unhappy,
            20..=39 => EmotionTier::Critical,
            _ => EmotionTier::Dead,
        }
    }
}

/// Most recent activity descriptions, oldest first.
#[derive(Debug, Clone)]
pub struct ContextHistory {
    entries: VecDeque<String>,
    capacity: usize,
}

impl ContextHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends a description, evicting the oldest past capacity. Blank input is skipped.
    pub fn push(&mut self, description: &str) {
        let description = description.trim();
        if description.is_empty() || self.capacity == 0 {
            return;
        }
        self.entries.push_back(description.to_string());
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn latest(&self) -> Option<&str> {
        self.entries.back().map(String::as_str)
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.entries.iter().cloned().collect()
    }
}

/// What the presentation layer sees after every engine operation.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StateSnapshot {
    pub mode: Mode,
    pub distraction_count: u32,
    pub life_state: LifeState,
    pub is_monitoring: bool,
    pub stats_visible: bool,
    pub personality: Personality,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emotion_level: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emotion: Option<EmotionTier>,
    pub last_checked_at: Option<DateTime<Utc>>,
}

/// All mutable state of one pet.
#[derive(Debug, Clone)]
pub struct Session {
    pub mode: Mode,
    pub distraction_count: u32,
    pub life_state: LifeState,
    pub emotion_level: u8,
    pub emotion_tracking: bool,
    pub is_monitoring: bool,
    pub stats_visible: bool,
    pub context_history: ContextHistory,
    pub personality: Personality,
    pub previously_distracted: bool,
    pub last_fingerprint: Option<String>,
    pub window_debounce: ActiveWindowDebouncer,
    pub capture_failures: u32,
    pub last_checked_at: Option<DateTime<Utc>>,
    /// Identifies the current monitoring run in logs.
    pub run_id: Option<String>,
}

impl Session {
    pub fn new(
        personality: Personality,
        history_capacity: usize,
        emotion_tracking: bool,
        debounce: Duration,
    ) -> Self {
        Self {
            mode: Mode::Productivity,
            distraction_count: 0,
            life_state: LifeState::Alive,
            emotion_level: MAX_EMOTION_LEVEL,
            emotion_tracking,
            is_monitoring: false,
            stats_visible: false,
            context_history: ContextHistory::new(history_capacity),
            personality,
            previously_distracted: false,
            last_fingerprint: None,
            window_debounce: ActiveWindowDebouncer::new(debounce),
            capture_failures: 0,
            last_checked_at: None,
            run_id: None,
        }
    }

    pub fn is_dead(&self) -> bool {
        self.life_state == LifeState::Dead
    }

    pub fn emotion(&self) -> EmotionTier {
        EmotionTier::from_level(self.emotion_level)
    }

    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            mode: self.mode,
            distraction_count: self.distraction_count,
            life_state: self.life_state,
            is_monitoring: self.is_monitoring,
            stats_visible: self.stats_visible,
            personality: self.personality,
            emotion_level: self.emotion_tracking.then_some(self.emotion_level),
            emotion: self.emotion_tracking.then(|| self.emotion()),
            last_checked_at: self.last_checked_at,
        }
    }

    pub fn persona_context(&self) -> PersonaContext {
        PersonaContext {
            personality: self.personality,
            mode: self.mode,
            life_state: self.life_state,
            distraction_count: self.distraction_count,
        }
    }

    /// Resets counters for a fresh monitoring run. A dead pet comes back
    /// alive, at full emotion and in productivity mode.
    pub fn begin_monitoring(&mut self, run_id: String) {
        self.distraction_count = 0;
        self.previously_distracted = false;
        self.capture_failures = 0;
        if self.is_dead() {
            self.life_state = LifeState::Alive;
            self.emotion_level = MAX_EMOTION_LEVEL;
            self.mode = Mode::Productivity;
        }
        self.is_monitoring = true;
        self.run_id = Some(run_id);
    }

    pub fn end_monitoring(&mut self) {
        self.is_monitoring = false;
    }

    /// Flips the mode; entering productivity clears the distraction count.
    pub fn toggle_mode(&mut self) -> Mode {
        self.mode = self.mode.toggled();
        if self.mode == Mode::Productivity {
            self.distraction_count = 0;
        }
        self.mode
    }

    /// Moves the emotion level by `delta`, clamped to `0..=100`.
    ///
    /// Returns `true` when this change reached the dead tier.
    pub fn adjust_emotion(&mut self, delta: i32) -> bool {
        let level = (i32::from(self.emotion_level) + delta).clamp(0, i32::from(MAX_EMOTION_LEVEL));
        self.emotion_level = level as u8;
        if self.emotion() == EmotionTier::Dead && !self.is_dead() {
            self.die();
            return true;
        }
        false
    }

    pub fn die(&mut self) {
        self.life_state = LifeState::Dead;
        self.is_monitoring = false;
    }
}
