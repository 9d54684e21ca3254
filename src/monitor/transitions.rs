//! Pure state transition for one classification result.
//!
//! Free of I/O; the engine runs it under the session lock.

use chrono::Utc;
use rand::Rng;

use crate::classifier::Judgement;
use crate::persona::{pick_random, PersonalityCatalog};
use crate::settings::EngineConfig;

use super::state::{Mode, Session};

/// Tunables for [`apply_judgement`].
#[derive(Debug, Clone, PartialEq)]
pub struct Rules {
    pub distraction_limit: u32,
    /// `(distracted, productive)` deltas when emotion tracking is on.
    pub emotion_deltas: Option<(i32, i32)>,
    pub back_on_track_ratio: f64,
}

impl Rules {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            distraction_limit: config.distraction_limit.max(1),
            emotion_deltas: config
                .emotion
                .enabled
                .then_some((config.emotion.distracted_delta, config.emotion.productive_delta)),
            back_on_track_ratio: config.back_on_track_ratio,
        }
    }
}

/// Outcome to hand to the presentation sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reaction {
    pub message: String,
    pub speak: bool,
    /// The pet died during this transition.
    pub died: bool,
}

/// Coin flip between a canned reaction and a generated one.
pub fn prefer_static_reaction<R: Rng + ?Sized>(ratio: f64, rng: &mut R) -> bool {
    rng.gen_bool(ratio.clamp(0.0, 1.0))
}

/// Applies a judgement to the session.
///
/// `generated` is a model-written reaction to use instead of a canned line.
/// Returns `None` when the pet is already dead.
pub fn apply_judgement<R: Rng + ?Sized>(
    session: &mut Session,
    judgement: &Judgement,
    generated: Option<String>,
    rules: &Rules,
    rng: &mut R,
) -> Option<Reaction> {
    if session.is_dead() {
        return None;
    }

    let catalog = PersonalityCatalog;
    let personality = session.personality;
    let description = judgement.activity_description.as_deref();

    session.last_checked_at = Some(Utc::now());
    if let Some(description) = description {
        session.context_history.push(description);
    }

    let mut died = false;
    if let Some((distracted_delta, productive_delta)) = rules.emotion_deltas {
        let delta = if judgement.is_distracting {
            distracted_delta
        } else {
            productive_delta
        };
        died = session.adjust_emotion(delta);
    }

    if session.mode != Mode::Productivity || session.is_dead() {
        let message = if session.is_dead() {
            pick_random(catalog.dead_pool(personality), rng).to_string()
        } else {
            format!("Currently: {}", description.unwrap_or("Idle"))
        };
        return Some(Reaction {
            message,
            speak: died,
            died,
        });
    }

    let mut message = generated
        .filter(|text| !text.trim().is_empty())
        .unwrap_or_else(|| {
            pick_random(catalog.reaction_pool(personality, judgement.is_distracting), rng)
                .to_string()
        });
    let speak;

    if judgement.is_distracting {
        session.distraction_count += 1;
        speak = true;

        if rules.emotion_deltas.is_none() && session.distraction_count >= rules.distraction_limit {
            session.die();
            died = true;
            message = pick_random(catalog.dead_pool(personality), rng).to_string();
        }
    } else {
        // Only the distracted -> focused edge is spoken.
        speak = session.previously_distracted;
        if speak && rng.gen_bool(rules.back_on_track_ratio.clamp(0.0, 1.0)) {
            message = catalog.profile(personality).back_on_track.to_string();
        }
    }

    session.previously_distracted = judgement.is_distracting;

    Some(Reaction {
        message,
        speak,
        died,
    })
}
