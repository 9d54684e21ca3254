use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::ClassifierError;
use crate::settings::ClassifierSettings;

use super::prompts::{
    analysis_tool, chat_system_prompt, reaction_system_prompt, reaction_user_prompt,
    ANALYSIS_INSTRUCTION, ANALYSIS_TOOL_NAME,
};
use super::{ClassifierClient, Judgement, PersonaContext, ScreenAnalysis};

const API_VERSION: &str = "2023-06-01";
const ANALYSIS_MAX_TOKENS: u32 = 500;
const REACTION_MAX_TOKENS: u32 = 40;
const CHAT_MAX_TOKENS: u32 = 150;

/// Messages API client.
pub struct AnthropicClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text { text: String },
    ToolUse { name: String, input: Value },
    #[serde(other)]
    Other,
}

impl MessagesResponse {
    fn first_text(&self) -> Option<&str> {
        match self.content.first() {
            Some(ContentBlock::Text { text }) => Some(text.as_str()),
            _ => None,
        }
    }

    fn tool_input(&self, tool: &str) -> Option<&Value> {
        self.content.iter().find_map(|block| match block {
            ContentBlock::ToolUse { name, input } if name == tool => Some(input),
            _ => None,
        })
    }
}

impl AnthropicClient {
    pub fn new(settings: &ClassifierSettings, api_key: &str) -> Result<Self> {
        if api_key.trim().is_empty() {
            bail!("an API key is required; set ANTHROPIC_API_KEY or CLAUDE_API_KEY");
        }
        Ok(Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(settings.request_timeout_secs))
                .build()?,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: settings.model.clone(),
        })
    }

    async fn send(&self, request: &MessagesRequest<'_>) -> Result<MessagesResponse, ClassifierError> {
        let resp = self
            .http
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(request)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ClassifierError::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(resp.json::<MessagesResponse>().await?)
    }

    async fn complete_text(
        &self,
        system: String,
        user: &str,
        max_tokens: u32,
    ) -> Result<String, ClassifierError> {
        let request = MessagesRequest {
            model: &self.model,
            max_tokens,
            system: Some(system),
            messages: vec![json!({ "role": "user", "content": user })],
            tools: Vec::new(),
        };
        let response = self.send(&request).await?;
        let text = response
            .first_text()
            .ok_or(ClassifierError::MissingField("text block"))?
            .trim();
        if text.is_empty() {
            return Err(ClassifierError::EmptyReply);
        }
        Ok(text.to_string())
    }
}

#[async_trait]
impl ClassifierClient for AnthropicClient {
    async fn classify(&self, image_base64: &str) -> Result<Judgement, ClassifierError> {
        let request = MessagesRequest {
            model: &self.model,
            max_tokens: ANALYSIS_MAX_TOKENS,
            system: None,
            messages: vec![json!({
                "role": "user",
                "content": [
                    { "type": "text", "text": ANALYSIS_INSTRUCTION },
                    {
                        "type": "image",
                        "source": {
                            "type": "base64",
                            "media_type": "image/png",
                            "data": image_base64,
                        }
                    }
                ]
            })],
            tools: vec![analysis_tool()],
        };

        let response = self.send(&request).await?;
        let input = response
            .tool_input(ANALYSIS_TOOL_NAME)
            .ok_or(ClassifierError::MissingField("report_screen_analysis tool call"))?;
        let analysis: ScreenAnalysis = serde_json::from_value(input.clone())?;
        Ok(analysis.into())
    }

    async fn generate_reaction(
        &self,
        is_distracting: bool,
        activity_description: Option<&str>,
        persona: &PersonaContext,
    ) -> Result<String, ClassifierError> {
        self.complete_text(
            reaction_system_prompt(persona),
            &reaction_user_prompt(is_distracting, activity_description),
            REACTION_MAX_TOKENS,
        )
        .await
    }

    async fn chat(
        &self,
        query: &str,
        persona: &PersonaContext,
        history: &[String],
    ) -> Result<String, ClassifierError> {
        self.complete_text(chat_system_prompt(persona, history), query, CHAT_MAX_TOKENS)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_tool_call_among_blocks() {
        let response: MessagesResponse = serde_json::from_value(json!({
            "content": [
                { "type": "text", "text": "Looking at the screen..." },
                {
                    "type": "tool_use",
                    "id": "toolu_01",
                    "name": "report_screen_analysis",
                    "input": { "is_distracting": true, "activity_description": "Scrolling Reddit" }
                }
            ]
        }))
        .unwrap();

        let input = response.tool_input(ANALYSIS_TOOL_NAME).unwrap();
        let analysis: ScreenAnalysis = serde_json::from_value(input.clone()).unwrap();
        assert!(analysis.is_distracting);
        assert_eq!(analysis.activity_description, "Scrolling Reddit");
    }

    #[test]
    fn unknown_block_types_are_tolerated() {
        let response: MessagesResponse = serde_json::from_value(json!({
            "content": [ { "type": "thinking", "thinking": "hmm" } ]
        }))
        .unwrap();
        assert!(response.tool_input(ANALYSIS_TOOL_NAME).is_none());
        assert!(response.first_text().is_none());
    }

    #[test]
    fn rejects_blank_api_key() {
        assert!(AnthropicClient::new(&ClassifierSettings::default(), " ").is_err());
    }
}
