//! Chat-completion transport for OpenAI-compatible endpoints.
//!
//! Every agent (NPC, student, judge) shares this one client. Requests are
//! non-streaming and carry no retry policy; callers own failure handling.

use async_trait::async_trait;
use reqwest::Client;
use scena_core::session::EndpointConfig;
use scena_core::{Result, ScenaError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// One entry of a chat-completion conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// A single-reply chat completion call. Implemented over HTTP in
/// production and by scripted mocks in tests.
#[async_trait]
pub trait ChatCompletion: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;

    /// A variant of this client targeting a different model, when the
    /// transport supports per-model routing. Callers fall back to the
    /// original client on `None`.
    fn for_model(&self, _model: &str) -> Option<Arc<dyn ChatCompletion>> {
        None
    }
}

/// Chat client for any OpenAI-compatible endpoint.
#[derive(Debug, Clone)]
pub struct HttpChatClient {
    client: Client,
    config: EndpointConfig,
}

impl HttpChatClient {
    pub fn new(config: EndpointConfig) -> Result<Self> {
        config.validate().map_err(ScenaError::config)?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|err| ScenaError::transport(format!("failed to build HTTP client: {err}")))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &EndpointConfig {
        &self.config
    }

    /// Same endpoint and credentials, different model id.
    pub fn with_model(&self, model: &str) -> Result<Self> {
        let mut config = self.config.clone();
        config.model = model.to_string();
        Self::new(config)
    }
}

#[async_trait]
impl ChatCompletion for HttpChatClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let request = ChatCompletionRequest {
            model: &self.config.model,
            messages,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            stream: false,
        };

        let mut builder = self
            .client
            .post(&self.config.api_url)
            .header("content-type", "application/json");
        if !self.config.api_key.is_empty() {
            builder = builder.header("Authorization", format!("Bearer {}", self.config.api_key));
        }
        if !self.config.service_code.is_empty() {
            builder = builder.header("serviceCode", &self.config.service_code);
        }

        let response = builder.json(&request).send().await.map_err(|err| {
            ScenaError::transport(format!("chat completion request failed: {err}"))
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "failed to read error body".to_string());
            return Err(ScenaError::Transport {
                status_code: Some(status.as_u16()),
                message: format!("chat completion returned {status}: {body}"),
            });
        }

        let parsed: serde_json::Value = response.json().await.map_err(|err| {
            ScenaError::transport(format!("failed to parse chat completion response: {err}"))
        })?;

        extract_reply(&parsed)
    }

    fn for_model(&self, model: &str) -> Option<Arc<dyn ChatCompletion>> {
        self.with_model(model)
            .ok()
            .map(|client| Arc::new(client) as Arc<dyn ChatCompletion>)
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
    stream: bool,
}

/// Pulls the reply text out of the known response shapes:
/// `choices[0].message.content`, then top-level `content`, then `response`.
fn extract_reply(value: &serde_json::Value) -> Result<String> {
    if let Some(content) = value
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
    {
        return Ok(content.to_string());
    }
    for key in ["content", "response"] {
        if let Some(content) = value.get(key).and_then(|c| c.as_str()) {
            return Ok(content.to_string());
        }
    }
    Err(ScenaError::transport(format!(
        "unrecognized chat completion response shape: {value}"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extract_reply_prefers_choices() {
        let value = json!({
            "choices": [{"message": {"content": "hello"}}],
            "content": "shadowed",
        });
        assert_eq!(extract_reply(&value).unwrap(), "hello");
    }

    #[test]
    fn extract_reply_falls_back_to_content_then_response() {
        assert_eq!(
            extract_reply(&json!({"content": "direct"})).unwrap(),
            "direct"
        );
        assert_eq!(
            extract_reply(&json!({"response": "alt"})).unwrap(),
            "alt"
        );
    }

    #[test]
    fn extract_reply_rejects_unknown_shape() {
        let err = extract_reply(&json!({"data": []})).unwrap_err();
        assert!(err.is_transport());
    }

    #[test]
    fn with_model_overrides_only_the_model() {
        let base = HttpChatClient::new(EndpointConfig {
            api_url: "https://api.example.com/v1/chat/completions".to_string(),
            api_key: "k".to_string(),
            model: "base-model".to_string(),
            max_tokens: 400,
            temperature: 0.7,
            timeout_secs: 60,
            service_code: "svc".to_string(),
        })
        .unwrap();
        let variant = base.with_model("ward-model").unwrap();
        assert_eq!(variant.config().model, "ward-model");
        assert_eq!(variant.config().api_url, base.config().api_url);
        assert_eq!(variant.config().service_code, "svc");
    }

    #[test]
    fn request_serializes_without_streaming() {
        let messages = vec![ChatMessage::system("s"), ChatMessage::user("u")];
        let request = ChatCompletionRequest {
            model: "m",
            messages: &messages,
            max_tokens: 400,
            temperature: 0.7,
            stream: false,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["stream"], json!(false));
        assert_eq!(json["messages"][1]["role"], json!("user"));
    }
}
