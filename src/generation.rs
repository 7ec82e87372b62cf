//! Text generation provider abstraction.
//!
//! The chat loop sends one fully assembled system prompt per turn and
//! expects plain text back. [`OpenAIChat`] calls the Chat Completions API
//! with a single system message; [`DisabledGenerator`] fails every call.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::retry::send_with_retry;

const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Single-shot text completion from a system prompt.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    fn model_name(&self) -> &str;
    async fn complete(&self, system_prompt: &str) -> Result<String>;
}

pub struct DisabledGenerator;

#[async_trait]
impl GenerationProvider for DisabledGenerator {
    fn model_name(&self) -> &str {
        "disabled"
    }
    async fn complete(&self, _system_prompt: &str) -> Result<String> {
        bail!("Generation provider is disabled")
    }
}

/// OpenAI Chat Completions client.
///
/// Requires the `OPENAI_API_KEY` environment variable to be set.
pub struct OpenAIChat {
    model: String,
    temperature: f32,
    api_key: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl OpenAIChat {
    pub fn new(config: &Config) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.generation.timeout_secs))
            .build()?;

        Ok(Self {
            model: config.generation_model().to_string(),
            temperature: config.generation.temperature,
            api_key,
            max_retries: config.generation.max_retries,
            client,
        })
    }

    fn request_body(&self, system_prompt: &str) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": [
                { "role": "system", "content": system_prompt }
            ],
        })
    }
}

#[async_trait]
impl GenerationProvider for OpenAIChat {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, system_prompt: &str) -> Result<String> {
        let body = self.request_body(system_prompt);
        let text = send_with_retry("OpenAI", self.max_retries, || {
            self.client
                .post(OPENAI_CHAT_URL)
                .bearer_auth(&self.api_key)
                .json(&body)
        })
        .await?;

        let json: serde_json::Value = serde_json::from_str(&text)?;
        parse_chat_response(&json)
    }
}

/// Extract `choices[0].message.content`.
fn parse_chat_response(json: &serde_json::Value) -> Result<String> {
    json.get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| {
            anyhow::anyhow!("Invalid OpenAI response: missing choices[0].message.content")
        })
}

/// Create the configured [`GenerationProvider`].
pub fn create_generator(config: &Config) -> Result<Arc<dyn GenerationProvider>> {
    match config.generation.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledGenerator)),
        "openai" => Ok(Arc::new(OpenAIChat::new(config)?)),
        other => bail!("Unknown generation provider: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_chat_response() {
        let json = serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": "It lives in main.rs." } }]
        });
        assert_eq!(parse_chat_response(&json).unwrap(), "It lives in main.rs.");
    }

    #[test]
    fn test_parse_chat_response_without_choices() {
        let json = serde_json::json!({ "choices": [] });
        assert!(parse_chat_response(&json).is_err());
    }

    #[test]
    fn test_request_body_is_single_system_message() {
        let chat = OpenAIChat {
            model: "gpt-4".to_string(),
            temperature: 0.5,
            api_key: "sk-test".to_string(),
            max_retries: 0,
            client: reqwest::Client::new(),
        };
        let body = chat.request_body("You are Codebase AI.");
        assert_eq!(body["model"], "gpt-4");
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["temperature"], 0.5);
    }
}
