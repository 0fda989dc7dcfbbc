//! Scripted text generator for development without a model server

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;

use crate::application::ports::outbound::{
    ChatMessage, GenerationOptions, MessageRole, TextGenerator,
};

/// Replies with queued responses, then with a placeholder echoing the prompt
pub struct MockTextGenerator {
    model: String,
    responses: Mutex<VecDeque<String>>,
    call_count: AtomicUsize,
}

impl MockTextGenerator {
    pub fn new(model: &str) -> Self {
        Self::with_responses(model, Vec::new())
    }

    pub fn with_responses(model: &str, responses: Vec<String>) -> Self {
        Self {
            model: model.to_string(),
            responses: Mutex::new(responses.into()),
            call_count: AtomicUsize::new(0),
        }
    }

    /// Number of chat or generate calls answered so far
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }
}

impl Default for MockTextGenerator {
    fn default() -> Self {
        Self::new("mock")
    }
}

#[async_trait]
impl TextGenerator for MockTextGenerator {
    fn model_name(&self) -> String {
        self.model.clone()
    }

    async fn chat(
        &self,
        messages: &[ChatMessage],
        _options: Option<&GenerationOptions>,
    ) -> Result<String> {
        self.call_count.fetch_add(1, Ordering::SeqCst);

        let scripted = self
            .responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        if let Some(response) = scripted {
            return Ok(response);
        }

        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::User)
            .map(|m| m.content.as_str())
            .unwrap_or("Hello");
        let excerpt: String = last_user.chars().take(50).collect();
        debug!(model = %self.model, "Returning placeholder response");

        Ok(format!("[Mock response to: {}...]", excerpt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_responses_come_first() {
        let mock = MockTextGenerator::with_responses(
            "mock",
            vec!["first".to_string(), "second".to_string()],
        );

        assert_eq!(mock.generate("a", "", None).await.unwrap(), "first");
        assert_eq!(mock.generate("b", "", None).await.unwrap(), "second");
        assert_eq!(
            mock.generate("c", "sys", None).await.unwrap(),
            "[Mock response to: c...]"
        );
        assert_eq!(mock.call_count(), 3);
    }

    #[tokio::test]
    async fn test_placeholder_uses_last_user_message() {
        let mock = MockTextGenerator::default();
        let long = "x".repeat(80);
        let messages = vec![
            ChatMessage::user("earlier"),
            ChatMessage::assistant("reply"),
            ChatMessage::user(long),
        ];

        let reply = mock.chat(&messages, None).await.unwrap();
        assert_eq!(reply, format!("[Mock response to: {}...]", "x".repeat(50)));

        let reply = mock.chat(&[ChatMessage::system("only system")], None).await.unwrap();
        assert_eq!(reply, "[Mock response to: Hello...]");
        assert_eq!(mock.model_name(), "mock");
    }
}
