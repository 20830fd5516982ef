//! Chat model providers.
//!
//! Implements the core [`LanguageModel`] trait for each `[llm] provider`:
//! `disabled` (every call fails) and `openai` (Chat Completions API).

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

pub use code_overview_core::llm::LanguageModel;
use code_overview_core::llm::parse_json_reply;

use crate::config::LlmConfig;
use crate::openai::{api_key_from_env, OpenAIClient};

/// Model that refuses every prompt. Used when `llm.provider = "disabled"`.
pub struct DisabledModel;

#[async_trait]
impl LanguageModel for DisabledModel {
    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn invoke(&self, _prompt: &str) -> Result<String> {
        bail!("Language model provider is disabled; set [llm] provider in the config")
    }
}

/// Chat model backed by OpenAI `POST /v1/chat/completions`.
pub struct OpenAIChatModel {
    client: OpenAIClient,
    model: String,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

impl OpenAIChatModel {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = OpenAIClient::new(api_key_from_env()?, config.timeout_secs, config.max_retries)?;
        Ok(Self {
            client,
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }

    async fn complete(&self, prompt: &str, json_mode: bool) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: Some(prompt.to_string()),
            }],
            temperature: self.temperature,
            response_format: json_mode.then_some(ResponseFormat {
                kind: "json_object",
            }),
        };

        let json = self.client.post_json("chat/completions", &request).await?;
        first_choice_text(json)
    }
}

fn first_choice_text(json: Value) -> Result<String> {
    let response: ChatResponse = serde_json::from_value(json)
        .map_err(|e| anyhow!("Invalid OpenAI chat response: {}", e))?;
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| anyhow!("No response from model"))
}

#[async_trait]
impl LanguageModel for OpenAIChatModel {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn invoke(&self, prompt: &str) -> Result<String> {
        tracing::debug!(model = %self.model, prompt_chars = prompt.len(), "chat completion");
        self.complete(prompt, false).await
    }

    /// Uses JSON mode, so the reply is a JSON object by construction.
    async fn invoke_structured(&self, prompt: &str, schema: &Value) -> Result<Value> {
        let schema_text = serde_json::to_string_pretty(schema)?;
        let full_prompt = format!(
            "{}\n\nRespond with a JSON object matching this JSON schema:\n{}",
            prompt, schema_text
        );
        tracing::debug!(model = %self.model, "structured chat completion");
        let reply = self.complete(&full_prompt, true).await?;
        parse_json_reply(&reply)
    }
}

/// Create the configured language model.
pub fn create_model(config: &LlmConfig) -> Result<Arc<dyn LanguageModel>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledModel)),
        "openai" => Ok(Arc::new(OpenAIChatModel::new(config)?)),
        other => bail!("Unknown llm provider: {}", other),
    }
}
