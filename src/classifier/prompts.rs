use serde_json::{json, Value};

use crate::persona::PersonalityCatalog;

use super::PersonaContext;

pub const ANALYSIS_TOOL_NAME: &str = "report_screen_analysis";

pub const ANALYSIS_INSTRUCTION: &str = "Analyze the screenshot. Determine if I am being productive (coding, documents, work tools) or distracted (social media, games, entertainment). Also provide a brief description of the main activity. Use the 'report_screen_analysis' tool.";

const EMPTY_HISTORY: &str = "None recorded yet";

/// Tool definition forcing the model to answer with both fields.
pub fn analysis_tool() -> Value {
    json!({
        "name": ANALYSIS_TOOL_NAME,
        "description": "Analyzes user screen content, determines productivity status, and provides a brief description of the main activity.",
        "input_schema": {
            "type": "object",
            "properties": {
                "is_distracting": {
                    "type": "boolean",
                    "description": "True if distracting (social media, games, etc.), false otherwise (coding, documents, etc.)."
                },
                "activity_description": {
                    "type": "string",
                    "description": "A brief description of the main activity seen on screen (e.g., 'Coding in VS Code', 'Watching YouTube', 'Reading news')."
                }
            },
            "required": ["is_distracting", "activity_description"]
        }
    })
}

fn state_line(persona: &PersonaContext) -> String {
    format!(
        "Your current state is: Mode={}, Status={}, Distractions={}.",
        persona.mode, persona.life_state, persona.distraction_count
    )
}

pub fn reaction_system_prompt(persona: &PersonaContext) -> String {
    let framing = PersonalityCatalog.profile(persona.personality).framing;
    format!("{framing} {}", state_line(persona))
}

pub fn reaction_user_prompt(is_distracting: bool, activity_description: Option<&str>) -> String {
    let action = if is_distracting {
        "distracted by"
    } else {
        "productively working on"
    };
    format!(
        "The user is currently {action} '{}'. Give a very short (1 sentence, max 10 words), in-character reaction that matches your personality.",
        activity_description.unwrap_or("something")
    )
}

pub fn chat_system_prompt(persona: &PersonaContext, history: &[String]) -> String {
    let framing = PersonalityCatalog.profile(persona.personality).framing;
    let context = if history.is_empty() {
        EMPTY_HISTORY.to_string()
    } else {
        history.join("; ")
    };
    format!(
        "{framing} {} The user's recent screen activity context is: [{context}]. \
         Respond to the user's query concisely and helpfully (1-2 sentences max), keeping your persona in mind. \
         If their query seems related to their recent activity, reference that context in your response. \
         If they are just chatting, be friendly but stay in character.",
        state_line(persona)
    )
}
