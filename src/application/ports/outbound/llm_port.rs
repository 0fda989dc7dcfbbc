//! Text generation port - Chat-style access to a language model

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Who authored a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One message of a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }
}

/// Sampling settings for a single request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    pub temperature: f32,
    /// `None` lets the model decide
    pub max_tokens: Option<u32>,
    pub top_p: f32,
    pub stop: Vec<String>,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: None,
            top_p: 0.9,
            stop: Vec::new(),
        }
    }
}

impl GenerationOptions {
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Port for language model backends
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Name of the model answering requests
    fn model_name(&self) -> String;

    /// Produce the next assistant message for a conversation
    async fn chat(
        &self,
        messages: &[ChatMessage],
        options: Option<&GenerationOptions>,
    ) -> Result<String>;

    /// Single-prompt convenience wrapper around [`TextGenerator::chat`]
    ///
    /// A system message is only sent when `system` is non-empty.
    async fn generate(
        &self,
        prompt: &str,
        system: &str,
        options: Option<&GenerationOptions>,
    ) -> Result<String> {
        let mut messages = Vec::with_capacity(2);
        if !system.is_empty() {
            messages.push(ChatMessage::system(system));
        }
        messages.push(ChatMessage::user(prompt));
        self.chat(&messages, options).await
    }
}

#[async_trait]
impl<T: TextGenerator + ?Sized> TextGenerator for Arc<T> {
    fn model_name(&self) -> String {
        (**self).model_name()
    }

    async fn chat(
        &self,
        messages: &[ChatMessage],
        options: Option<&GenerationOptions>,
    ) -> Result<String> {
        (**self).chat(messages, options).await
    }

    async fn generate(
        &self,
        prompt: &str,
        system: &str,
        options: Option<&GenerationOptions>,
    ) -> Result<String> {
        (**self).generate(prompt, system, options).await
    }
}
