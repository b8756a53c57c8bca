use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

use super::base::{Provider, StopReason, Usage};
use super::configs::AnthropicProviderConfig;
use super::utils::{
    anthropic_response_to_message, messages_to_anthropic_spec, tools_to_anthropic_spec,
};
use crate::models::message::Message;
use crate::models::tool::Tool;

pub const ANTHROPIC_API_HOST: &str = "https://api.anthropic.com";
pub const ANTHROPIC_DEFAULT_MODEL: &str = "claude-3-5-haiku-20241022";
pub const ANTHROPIC_API_VERSION: &str = "2023-06-01";

const DEFAULT_MAX_TOKENS: i32 = 512;

pub struct AnthropicProvider {
    client: Client,
    config: AnthropicProviderConfig,
}

impl AnthropicProvider {
    pub fn new(config: AnthropicProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600)) // 10 minutes timeout
            .build()?;

        Ok(Self { client, config })
    }

    fn get_usage(data: &Value) -> Usage {
        // Token accounting is advisory, a malformed usage object is not
        // worth failing the whole completion over
        let usage = data.get("usage");
        let input_tokens = usage
            .and_then(|u| u.get("input_tokens"))
            .and_then(|v| v.as_i64())
            .map(|v| v as i32);
        let output_tokens = usage
            .and_then(|u| u.get("output_tokens"))
            .and_then(|v| v.as_i64())
            .map(|v| v as i32);
        let total_tokens = match (input_tokens, output_tokens) {
            (Some(input), Some(output)) => Some(input + output),
            _ => None,
        };

        Usage::new(input_tokens, output_tokens, total_tokens)
    }

    fn get_stop_reason(data: &Value) -> StopReason {
        match data.get("stop_reason").and_then(|reason| reason.as_str()) {
            Some("tool_use") => StopReason::ToolUse,
            Some("max_tokens") => StopReason::MaxTokens,
            // "end_turn" and "stop_sequence" both mean the turn completed
            _ => StopReason::EndTurn,
        }
    }

    async fn post(&self, payload: Value) -> Result<Value> {
        let url = format!("{}/v1/messages", self.config.host.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_API_VERSION)
            .json(&payload)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(response.json().await?),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(anyhow!("Authentication failed: {}", response.status()))
            }
            status if status == StatusCode::TOO_MANY_REQUESTS || status.as_u16() >= 500 => {
                // Implement retry logic here if needed
                Err(anyhow!("Server error: {}", status))
            }
            _ => Err(anyhow!("Request failed: {}", response.status())),
        }
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    async fn complete(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[Tool],
    ) -> Result<(Message, StopReason, Usage)> {
        let anthropic_messages = messages_to_anthropic_spec(messages);
        let anthropic_tools = tools_to_anthropic_spec(tools)?;

        let mut payload = json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            "messages": anthropic_messages,
        });

        // The system prompt is a top-level parameter, not a message
        if !system.is_empty() {
            payload["system"] = json!(system);
        }
        if !anthropic_tools.is_empty() {
            payload["tools"] = json!(anthropic_tools);
        }
        if let Some(temp) = self.config.temperature {
            payload["temperature"] = json!(temp);
        }

        let response = self.post(payload).await?;

        let message = anthropic_response_to_message(&response)?;
        let stop_reason = Self::get_stop_reason(&response);
        let usage = Self::get_usage(&response);

        Ok((message, stop_reason, usage))
    }
}
