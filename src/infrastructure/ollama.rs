//! Ollama client for story and illustration-prompt text generation

use std::sync::RwLock;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::application::ports::outbound::{ChatMessage, GenerationOptions, TextGenerator};

/// Local models can take minutes to produce a full page
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Client for the native Ollama API
pub struct OllamaClient {
    client: Client,
    base_url: String,
    model: RwLock<String>,
}

impl OllamaClient {
    pub fn new(base_url: &str, model: &str) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: RwLock::new(model.to_string()),
        }
    }

    /// Switch the model used for subsequent requests
    pub fn set_model(&self, model: &str) {
        let mut current = self.model.write().unwrap_or_else(|e| e.into_inner());
        *current = model.to_string();
        info!("Switched to model: {}", model);
    }

    /// Names of the models installed on the server
    pub async fn list_models(&self) -> Result<Vec<String>, LlmError> {
        let response = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(LlmError::ApiError(error_text));
        }

        let tags: TagsResponse = response.json().await?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    /// Send a chat request and return the assistant's reply
    #[instrument(skip(self, messages, options), fields(messages = messages.len()))]
    pub async fn chat_completion(
        &self,
        messages: &[ChatMessage],
        options: Option<&GenerationOptions>,
    ) -> Result<String, LlmError> {
        let request = build_chat_request(&self.current_model(), messages, options);
        debug!(model = %request.model, "Sending chat request to Ollama");

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(LlmError::ApiError(error_text));
        }

        let body: ChatResponse = response.json().await?;
        Ok(body.message.content)
    }

    fn current_model(&self) -> String {
        self.model.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl TextGenerator for OllamaClient {
    fn model_name(&self) -> String {
        self.current_model()
    }

    async fn chat(
        &self,
        messages: &[ChatMessage],
        options: Option<&GenerationOptions>,
    ) -> Result<String> {
        Ok(self.chat_completion(messages, options).await?)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("API error: {0}")]
    ApiError(String),
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: String,
    messages: Vec<WireMessage<'a>>,
    stream: bool,
    options: WireOptions<'a>,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct WireOptions<'a> {
    temperature: f32,
    top_p: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
    #[serde(skip_serializing_if = "no_stop_sequences")]
    stop: &'a [String],
}

fn no_stop_sequences(stop: &&[String]) -> bool {
    stop.is_empty()
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Debug, Deserialize)]
struct ModelTag {
    name: String,
}

static DEFAULT_OPTIONS: std::sync::LazyLock<GenerationOptions> =
    std::sync::LazyLock::new(GenerationOptions::default);

fn build_chat_request<'a>(
    model: &str,
    messages: &'a [ChatMessage],
    options: Option<&'a GenerationOptions>,
) -> ChatRequest<'a> {
    let options = options.unwrap_or(&*DEFAULT_OPTIONS);
    ChatRequest {
        model: model.to_string(),
        messages: messages
            .iter()
            .map(|m| WireMessage {
                role: m.role.as_str(),
                content: &m.content,
            })
            .collect(),
        stream: false,
        options: WireOptions {
            temperature: options.temperature,
            top_p: options.top_p,
            num_predict: options.max_tokens,
            stop: &options.stop,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_request_body() {
        let messages = vec![ChatMessage::system("Be kind."), ChatMessage::user("Hello")];
        let options = GenerationOptions::default().with_max_tokens(200);

        let body =
            serde_json::to_value(build_chat_request("phi4", &messages, Some(&options))).unwrap();

        assert_eq!(body["model"], "phi4");
        assert_eq!(body["stream"], false);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "Hello");
        assert_eq!(body["options"]["num_predict"], 200);
        assert!(body["options"].get("stop").is_none());
    }

    #[test]
    fn test_default_options_omit_token_limit() {
        let messages = vec![ChatMessage::user("Hi")];
        let body = serde_json::to_value(build_chat_request("phi4", &messages, None)).unwrap();

        assert!(body["options"].get("num_predict").is_none());
        assert!((body["options"]["top_p"].as_f64().unwrap() - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_parse_responses() {
        let chat: ChatResponse = serde_json::from_str(
            r#"{"model":"phi4","message":{"role":"assistant","content":"Once upon a time"},"done":true}"#,
        )
        .unwrap();
        assert_eq!(chat.message.content, "Once upon a time");

        let tags: TagsResponse =
            serde_json::from_str(r#"{"models":[{"name":"phi4:latest"},{"name":"llama3.2"}]}"#)
                .unwrap();
        let names: Vec<_> = tags.models.into_iter().map(|m| m.name).collect();
        assert_eq!(names, vec!["phi4:latest", "llama3.2"]);
    }

    #[test]
    fn test_set_model() {
        let client = OllamaClient::new("http://localhost:11434/", "phi4");
        assert_eq!(client.base_url, "http://localhost:11434");

        client.set_model("mistral");
        assert_eq!(client.model_name(), "mistral");
    }
}
