//! Card domain model.
//!
//! A card is one parsed scene unit from a cards document. Dialogue-role
//! cards carry the NPC system prompt for a scene; transition-role cards
//! carry the narrative bridge emitted between scenes.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Stage metadata embedded in a card block as an HTML-style comment:
/// `<!-- STAGE_META: {"stage_name": ..., "description": ..., "interaction_rounds": ...} -->`.
///
/// Malformed metadata is ignored rather than failing the parse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageMeta {
    /// Human-readable stage name.
    #[serde(default)]
    pub stage_name: String,
    /// Stage description.
    #[serde(default)]
    pub description: String,
    /// Hint for how many interaction rounds the stage is designed for.
    #[serde(default = "default_interaction_rounds")]
    pub interaction_rounds: u32,
    /// Optional model id for the NPC. Honored when the NPC client is first
    /// created.
    #[serde(default, alias = "model_id")]
    pub model_hint: Option<String>,
}

fn default_interaction_rounds() -> u32 {
    5
}

impl Default for StageMeta {
    fn default() -> Self {
        Self {
            stage_name: String::new(),
            description: String::new(),
            interaction_rounds: default_interaction_rounds(),
            model_hint: None,
        }
    }
}

/// One parsed scene unit.
///
/// Card identity is the pair `(stage_num, card_type)`; the loader rejects
/// duplicates. Cards are immutable after parsing and owned by the loader's
/// result list; the session runner only borrows them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    /// Identifier combining stage number and type tag, e.g. "2A".
    pub card_id: String,
    /// Stage number, 1-based. Sparse numbering is legal.
    pub stage_num: u32,
    /// Single-character type tag from the configured alphabet.
    pub card_type: char,
    /// Card title (heading line without the `#`).
    pub title: String,
    /// The full raw markdown of the card block.
    pub full_content: String,

    /// `## Role` section, empty when absent.
    pub role: String,
    /// `## Context` section.
    pub context: String,
    /// `## Interaction` section.
    pub interaction: String,
    /// `## Transition` section.
    pub transition: String,
    /// `## Constraints` section.
    pub constraints: String,
    /// `## Prologue` section (typically only the first dialogue card).
    pub prologue: String,
    /// `## Output` section (transition cards).
    pub output: String,

    /// Stage metadata extracted from the STAGE_META comment.
    pub meta: StageMeta,
}

static HEADING_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^#\s*(?:卡片|[Cc]ard\s*)\d+[A-Za-z]\s*\n?").expect("heading regex"));
static STAGE_META_COMMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<!--\s*STAGE_META:\s*\{.*?\}\s*-->\s*\n?").expect("meta regex"));
static PROLOGUE_SECTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)##\s*Prologue\b.*?(\n##\s|\z)").expect("prologue regex"));

impl Card {
    /// Renders the NPC system prompt for a dialogue card.
    ///
    /// The heading line, the STAGE_META comment, and the Prologue section
    /// are stripped; the prologue is delivered separately as the NPC's
    /// opening line, never as part of the system prompt.
    pub fn system_prompt(&self) -> String {
        let prompt = HEADING_LINE.replace(self.full_content.trim(), "");
        let prompt = STAGE_META_COMMENT.replace_all(&prompt, "");
        let prompt = PROLOGUE_SECTION.replace(&prompt, "${1}");
        prompt.trim().to_string()
    }

    /// Returns the narrative bridge text of a transition card, if any.
    pub fn transition_output(&self) -> Option<&str> {
        let text = self.output.trim();
        if text.is_empty() { None } else { Some(text) }
    }

    /// Returns true when the card carries a prologue.
    pub fn has_prologue(&self) -> bool {
        !self.prologue.trim().is_empty()
    }
}
