//! Persona domain model.
//!
//! A persona is a named behavioral profile that parameterizes the simulated
//! student: who they are, what they know, and how they respond.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Where a persona comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PersonaType {
    /// Built-in preset persona.
    Preset,
    /// User-authored persona loaded from a file.
    Custom,
    /// Persona produced by a generation step.
    Generated,
}

/// How long the simulated student's replies should run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, Default)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ResponseLength {
    Short,
    #[default]
    Medium,
    Long,
}

/// How actively the simulated student participates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, Default)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EngagementLevel {
    Low,
    #[default]
    Normal,
    High,
}

/// How often the simulated student asks questions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, Default)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum QuestionFrequency {
    Low,
    #[default]
    Normal,
    High,
}

/// A named behavioral profile for the simulated student.
///
/// Personas are immutable value objects, loaded once per session from the
/// preset table or a file store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Persona {
    /// Display name / role name.
    pub name: String,
    /// Source classification.
    pub persona_type: PersonaType,

    /// Character background.
    #[serde(default)]
    pub background: String,
    /// Personality traits.
    #[serde(default)]
    pub personality: String,
    /// Learning or interaction goal.
    #[serde(default)]
    pub goal: String,
    /// Knowledge level description.
    #[serde(default)]
    pub knowledge_level: String,
    /// Learning style description.
    #[serde(default)]
    pub learning_style: String,
    /// Interaction style description.
    #[serde(default)]
    pub interaction_style: String,

    /// What the persona is good at.
    #[serde(default)]
    pub strengths: Vec<String>,
    /// Where the persona struggles.
    #[serde(default)]
    pub weaknesses: Vec<String>,
    /// Typical behavior patterns in conversation.
    #[serde(default)]
    pub typical_behaviors: Vec<String>,

    /// Target reply length.
    #[serde(default)]
    pub response_length: ResponseLength,
    /// Participation level.
    #[serde(default)]
    pub engagement_level: EngagementLevel,
    /// Question-asking frequency.
    #[serde(default)]
    pub question_frequency: QuestionFrequency,
}

impl Persona {
    /// Renders the system prompt for the student agent playing this persona.
    pub fn system_prompt(&self) -> String {
        let mut parts = vec![
            format!(
                "You are now playing a student character named \"{}\".",
                self.name
            ),
            String::new(),
            "## Character profile".to_string(),
        ];

        let mut field = |label: &str, value: &str| {
            if !value.is_empty() {
                parts.push(format!("**{label}**: {value}"));
            }
        };
        field("Background", &self.background);
        field("Personality", &self.personality);
        field("Goal", &self.goal);
        field("Knowledge level", &self.knowledge_level);
        field("Learning style", &self.learning_style);
        field("Interaction style", &self.interaction_style);

        let mut list = |label: &str, items: &[String]| {
            if !items.is_empty() {
                parts.push(format!("\n**{label}**:"));
                for item in items {
                    parts.push(format!("- {item}"));
                }
            }
        };
        list("Your strengths", &self.strengths);
        list("Your weaknesses", &self.weaknesses);
        list("Typical behavior patterns", &self.typical_behaviors);

        parts.extend([
            String::new(),
            "## Interaction rules".to_string(),
            "1. Stay in character and interact with the NPC as this student.".to_string(),
            "2. React according to your knowledge level and personality.".to_string(),
            "3. Never reveal that you are an AI; behave like a real student.".to_string(),
            "4. Reply naturally and colloquially, the way a student speaks.".to_string(),
        ]);

        parts.push(
            match self.response_length {
                ResponseLength::Short => "5. Keep replies brief, roughly 30-50 words.",
                ResponseLength::Medium => "5. Keep replies moderate, roughly 50-100 words.",
                ResponseLength::Long => "5. Give full replies, roughly 100-200 words.",
            }
            .to_string(),
        );

        parts.join("\n")
    }
}
