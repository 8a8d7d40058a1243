//! Session run parameters.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use strum::{Display, EnumString};

/// How the student side of the session is driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, Default)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SessionMode {
    /// LLM plays the student.
    #[default]
    Auto,
    /// A human types the student turns.
    Manual,
    /// Mixed; starts automatic, may hand over to manual input.
    Hybrid,
}

/// What to do when a card's round budget runs out without a transition
/// marker. Whether that is intended pedagogy or a missing marker is
/// undecidable at runtime, so the policy is configurable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, Default)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BudgetPolicy {
    /// Move on to the next card; the scene just ends.
    #[default]
    Advance,
    /// Finalize the session with status `error`.
    Abort,
    /// Grant exactly one extra round, then advance.
    RetryOnce,
}

/// Connection settings for one chat-completion endpoint (NPC, student, or
/// judge role).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Full chat-completions URL.
    pub api_url: String,
    /// Bearer credential; empty means unauthenticated.
    #[serde(skip_serializing)]
    #[serde(default)]
    pub api_key: String,
    /// Model name.
    pub model: String,
    /// Maximum tokens to generate per call.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Optional `serviceCode` header required by some gateways.
    #[serde(default)]
    pub service_code: String,
}

impl EndpointConfig {
    /// Builds a config from environment variables with a role-specific
    /// prefix (`NPC_`, `STUDENT_`, `EVALUATOR_`), falling back to the
    /// shared `SCENA_` prefix: `{PREFIX}_API_URL`, `{PREFIX}_API_KEY`,
    /// `{PREFIX}_MODEL`, `{PREFIX}_SERVICE_CODE`.
    pub fn from_env(role_prefix: &str, max_tokens: u32, temperature: f32) -> Self {
        let var = |suffix: &str| {
            std::env::var(format!("{role_prefix}_{suffix}"))
                .or_else(|_| std::env::var(format!("SCENA_{suffix}")))
                .unwrap_or_default()
        };
        Self {
            api_url: var("API_URL"),
            api_key: var("API_KEY"),
            model: var("MODEL"),
            max_tokens,
            temperature,
            timeout_secs: 60,
            service_code: var("SERVICE_CODE"),
        }
    }

    /// Returns a config error message when the endpoint is unusable.
    pub fn validate(&self) -> Result<(), String> {
        if self.api_url.is_empty() {
            return Err("endpoint api_url is empty".to_string());
        }
        if self.model.is_empty() {
            return Err("endpoint model is empty".to_string());
        }
        Ok(())
    }
}

/// Progress callback: `(phase, message)`, invoked at card boundaries.
pub type ProgressCallback = Arc<dyn Fn(&str, &str) + Send + Sync>;

/// Run parameters for one session. Constructed before the run and never
/// mutated during it.
#[derive(Clone)]
pub struct SessionConfig {
    /// Student driving mode.
    pub mode: SessionMode,
    /// Persona id resolved through the persona repository.
    pub persona_id: String,
    /// Round cap per dialogue card.
    pub max_rounds_per_card: u32,
    /// Session-wide round cap (safety valve, not an error path).
    pub total_max_rounds: u32,
    /// NPC endpoint.
    pub npc_endpoint: EndpointConfig,
    /// Student endpoint (ignored in manual mode).
    pub student_endpoint: EndpointConfig,
    /// Root directory for session artifacts (`logs/` is created below it).
    pub output_dir: std::path::PathBuf,
    /// Whether to persist the session log on termination.
    pub save_logs: bool,
    /// Per-card budget exhaustion policy.
    pub budget_policy: BudgetPolicy,
    /// Optional progress callback for UI streaming.
    pub progress: Option<ProgressCallback>,
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("mode", &self.mode)
            .field("persona_id", &self.persona_id)
            .field("max_rounds_per_card", &self.max_rounds_per_card)
            .field("total_max_rounds", &self.total_max_rounds)
            .field("output_dir", &self.output_dir)
            .field("save_logs", &self.save_logs)
            .field("budget_policy", &self.budget_policy)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

impl SessionConfig {
    /// Creates a config with the original defaults (auto mode, excellent
    /// persona, 10 rounds per card, 100 total).
    pub fn new(npc_endpoint: EndpointConfig, student_endpoint: EndpointConfig) -> Self {
        Self {
            mode: SessionMode::Auto,
            persona_id: crate::persona::preset::EXCELLENT.to_string(),
            max_rounds_per_card: 10,
            total_max_rounds: 100,
            npc_endpoint,
            student_endpoint,
            output_dir: std::path::PathBuf::from("scena_output"),
            save_logs: true,
            budget_policy: BudgetPolicy::default(),
            progress: None,
        }
    }

    /// Emits a progress event when a callback is installed.
    pub fn report_progress(&self, phase: &str, message: &str) {
        if let Some(cb) = &self.progress {
            cb(phase, message);
        }
    }

    /// The serializable subset recorded in the session log.
    pub fn snapshot(&self) -> ConfigSnapshot {
        ConfigSnapshot {
            mode: self.mode,
            persona_id: self.persona_id.clone(),
            max_rounds_per_card: self.max_rounds_per_card,
            total_max_rounds: self.total_max_rounds,
            budget_policy: self.budget_policy,
        }
    }
}

/// The configuration subset embedded in a `SessionLog`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    pub mode: SessionMode,
    pub persona_id: String,
    pub max_rounds_per_card: u32,
    pub total_max_rounds: u32,
    pub budget_policy: BudgetPolicy,
}
