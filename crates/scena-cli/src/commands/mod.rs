pub mod closed_loop;
pub mod evaluate;
pub mod personas;
pub mod simulate;

use anyhow::Result;
use scena_core::session::EndpointConfig;
use scena_core::ScenaError;
use scena_interaction::{ChatCompletion, ChatMessage, HttpChatClient};
use std::sync::Arc;

/// Per-agent generation parameters.
pub(crate) fn npc_endpoint() -> EndpointConfig {
    EndpointConfig::from_env("NPC", 400, 0.7)
}

pub(crate) fn student_endpoint() -> EndpointConfig {
    EndpointConfig::from_env("STUDENT", 200, 0.8)
}

pub(crate) fn judge_endpoint() -> EndpointConfig {
    EndpointConfig::from_env("EVALUATOR", 1000, 0.3)
}

pub(crate) fn client_for(endpoint: EndpointConfig) -> Result<Arc<dyn ChatCompletion>> {
    Ok(Arc::new(HttpChatClient::new(endpoint)?))
}

/// Stands in for the student endpoint in manual mode, where no student
/// LLM call is ever made.
pub(crate) struct UnusedClient;

#[async_trait::async_trait]
impl ChatCompletion for UnusedClient {
    async fn complete(&self, _messages: &[ChatMessage]) -> scena_core::Result<String> {
        Err(ScenaError::config(
            "student endpoint is not configured for this mode",
        ))
    }
}
