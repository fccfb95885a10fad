// Generation module
// Chat completion against the remote language model


use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::Config;
use crate::remote::ServiceAgent;
use crate::{Result, SupportError};

pub const CHAT_COMPLETIONS_PATH: &str = "/v1/chat/completions";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    #[inline]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    #[inline]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    #[inline]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Produces a reply for a conversation
pub trait Generator: Send + Sync {
    fn generate(&self, messages: &[ChatMessage]) -> Result<String>;
}

/// Sampling settings sent with every request
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sampling {
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
}

impl Default for Sampling {
    #[inline]
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_p: 0.9,
            max_tokens: 512,
        }
    }
}

/// Client for an OpenAI-compatible chat completion endpoint
#[derive(Debug, Clone)]
pub struct ChatClient {
    service: ServiceAgent,
    model: String,
    sampling: Sampling,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    top_p: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ChatClient {
    #[inline]
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let base_url = config
            .service_url()
            .context("Failed to generate service URL from config")?;

        let service = ServiceAgent::new(base_url, config.service.api_token())
            .with_timeout(Duration::from_secs(config.generation.timeout_seconds))
            .with_retry_attempts(config.generation.retry_attempts);

        Ok(Self::from_agent(service, config.generation.model.clone()).with_sampling(
            Sampling {
                temperature: config.generation.temperature,
                top_p: config.generation.top_p,
                max_tokens: config.generation.max_tokens,
            },
        ))
    }

    #[inline]
    pub fn from_agent(service: ServiceAgent, model: impl Into<String>) -> Self {
        Self {
            service,
            model: model.into(),
            sampling: Sampling::default(),
        }
    }

    #[inline]
    pub fn with_sampling(mut self, sampling: Sampling) -> Self {
        self.sampling = sampling;
        self
    }

    #[inline]
    pub fn model(&self) -> &str {
        &self.model
    }

    #[inline]
    pub fn sampling(&self) -> Sampling {
        self.sampling
    }

    /// Test connection to the service and verify the chat model is served
    #[inline]
    pub fn health_check(&self) -> anyhow::Result<()> {
        self.service
            .validate_model(&self.model)
            .context("Generation model validation failed")?;
        info!(
            "Health check passed for generation service at {} with model {}",
            self.service.base_url(),
            self.model
        );
        Ok(())
    }
}

impl Generator for ChatClient {
    #[inline]
    fn generate(&self, messages: &[ChatMessage]) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages,
            temperature: self.sampling.temperature,
            top_p: self.sampling.top_p,
            max_tokens: self.sampling.max_tokens,
        };

        debug!(
            "Requesting chat completion with {} messages from {}",
            messages.len(),
            self.model
        );

        let response: ChatResponse = self
            .service
            .post_json(CHAT_COMPLETIONS_PATH, &request)
            .map_err(|e| SupportError::Generation(format!("{:#}", e)))?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| SupportError::Generation("Response contained no choices".to_string()))?;

        Ok(content.trim().to_string())
    }
}
