pub mod anthropic;
pub mod prompts;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ClassifierError;
use crate::monitor::state::{LifeState, Mode};
use crate::persona::Personality;

pub use anthropic::AnthropicClient;

/// Verdict on a single screenshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Judgement {
    pub is_distracting: bool,
    pub activity_description: Option<String>,
}

impl Judgement {
    pub fn new(is_distracting: bool, activity_description: impl Into<String>) -> Self {
        let description = activity_description.into();
        Self {
            is_distracting,
            activity_description: (!description.trim().is_empty()).then_some(description),
        }
    }

    /// What a failed classification degrades to.
    pub fn neutral() -> Self {
        Self {
            is_distracting: false,
            activity_description: None,
        }
    }
}

/// Structured output the model reports through its tool call.
#[derive(Debug, Clone, Deserialize)]
pub struct ScreenAnalysis {
    pub is_distracting: bool,
    pub activity_description: String,
}

impl From<ScreenAnalysis> for Judgement {
    fn from(analysis: ScreenAnalysis) -> Self {
        Judgement::new(analysis.is_distracting, analysis.activity_description)
    }
}

/// Session facts the model needs to stay in character.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonaContext {
    pub personality: Personality,
    pub mode: Mode,
    pub life_state: LifeState,
    pub distraction_count: u32,
}

/// Vision/language model used to judge screenshots and talk to the user.
#[async_trait]
pub trait ClassifierClient: Send + Sync {
    /// Judges a base64 PNG screenshot.
    async fn classify(&self, image_base64: &str) -> Result<Judgement, ClassifierError>;

    /// Short in-character reaction to a judgement.
    async fn generate_reaction(
        &self,
        is_distracting: bool,
        activity_description: Option<&str>,
        persona: &PersonaContext,
    ) -> Result<String, ClassifierError>;

    /// Free-form reply to a user message, aware of recent screen activity.
    async fn chat(
        &self,
        query: &str,
        persona: &PersonaContext,
        history: &[String],
    ) -> Result<String, ClassifierError>;
}
