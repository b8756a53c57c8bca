use anyhow::{Context, Result};
use std::env;

use super::anthropic::{ANTHROPIC_API_HOST, ANTHROPIC_DEFAULT_MODEL};
use super::openai::{OPENAI_API_HOST, OPENAI_DEFAULT_MODEL};

/// Unified enum to wrap different provider configurations
pub enum ProviderConfig {
    Anthropic(AnthropicProviderConfig),
    OpenAi(OpenAiProviderConfig),
}

#[derive(Debug, Clone)]
pub struct AnthropicProviderConfig {
    pub host: String,
    pub api_key: String,
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<i32>,
}

impl AnthropicProviderConfig {
    /// Read the configuration from ANTHROPIC_* environment variables.
    /// Only the API key is required; host and model fall back to defaults.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            host: env_or("ANTHROPIC_HOST", ANTHROPIC_API_HOST),
            api_key: required_env("ANTHROPIC_API_KEY")?,
            model: env_or("ANTHROPIC_MODEL", ANTHROPIC_DEFAULT_MODEL),
            temperature: None,
            max_tokens: None,
        })
    }
}

#[derive(Debug, Clone)]
pub struct OpenAiProviderConfig {
    pub host: String,
    pub api_key: String,
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<i32>,
}

impl OpenAiProviderConfig {
    /// Read the configuration from OPENAI_* environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            host: env_or("OPENAI_HOST", OPENAI_API_HOST),
            api_key: required_env("OPENAI_API_KEY")?,
            model: env_or("OPENAI_MODEL", OPENAI_DEFAULT_MODEL),
            temperature: None,
            max_tokens: None,
        })
    }
}

fn required_env(key: &str) -> Result<String> {
    env::var(key).with_context(|| format!("Environment variable '{}' is required but not set", key))
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}
