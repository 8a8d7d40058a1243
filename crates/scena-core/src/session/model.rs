//! Session transcript model.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use strum::{Display, EnumString};

use super::config::ConfigSnapshot;

/// Who produced a dialogue turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Speaker {
    Npc,
    Student,
}

/// Terminal outcome of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SessionStatus {
    /// Ran through the whole card sequence.
    Completed,
    /// Cancelled from outside (ctrl-c or token).
    Interrupted,
    /// Aborted by an agent failure or budget policy.
    Error,
}

/// One utterance in the transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogueTurn {
    /// 1-based position in the session, monotonically increasing.
    pub turn_number: u32,
    /// Card id active when the turn was produced, e.g. `"2A"`.
    pub card_id: String,
    pub speaker: Speaker,
    pub content: String,
    /// RFC 3339 timestamp.
    pub timestamp: String,
}

/// Summary block appended when a session terminates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub status: SessionStatus,
    pub total_turns: u32,
    pub cards_played: u32,
    /// Present only for `Error` status.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub error: Option<String>,
}

/// Complete record of one session run. Serialized as-is to
/// `logs/session_{session_id}.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionLog {
    /// Timestamp id, `YYYYMMDD_HHMMSS`.
    pub session_id: String,
    pub start_time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub end_time: Option<String>,
    pub config: ConfigSnapshot,
    /// Card ids in play order, recorded at setup.
    pub cards_used: Vec<String>,
    pub dialogue: Vec<DialogueTurn>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub summary: Option<SessionSummary>,
}

impl SessionLog {
    pub fn new(config: ConfigSnapshot, cards_used: Vec<String>) -> Self {
        let now = Utc::now();
        Self {
            session_id: now.format("%Y%m%d_%H%M%S").to_string(),
            start_time: now.to_rfc3339(),
            end_time: None,
            config,
            cards_used,
            dialogue: Vec::new(),
            summary: None,
        }
    }

    /// Appends a turn and returns its assigned turn number.
    pub fn push_turn(&mut self, card_id: &str, speaker: Speaker, content: &str) -> u32 {
        let turn_number = self.dialogue.len() as u32 + 1;
        self.dialogue.push(DialogueTurn {
            turn_number,
            card_id: card_id.to_string(),
            speaker,
            content: content.to_string(),
            timestamp: Utc::now().to_rfc3339(),
        });
        turn_number
    }

    /// Finalizes the log. The first call wins; later calls are ignored so
    /// an error path cannot overwrite an interrupt verdict.
    pub fn finalize(&mut self, status: SessionStatus, cards_played: u32, error: Option<String>) {
        if self.summary.is_some() {
            return;
        }
        self.end_time = Some(Utc::now().to_rfc3339());
        self.summary = Some(SessionSummary {
            status,
            total_turns: self.dialogue.len() as u32,
            cards_played,
            error,
        });
    }

    pub fn is_finalized(&self) -> bool {
        self.summary.is_some()
    }

    /// Human-readable transcript for `logs/session_{session_id}.md`.
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# Session {}", self.session_id);
        let _ = writeln!(out);
        let _ = writeln!(out, "- Started: {}", self.start_time);
        if let Some(end) = &self.end_time {
            let _ = writeln!(out, "- Ended: {end}");
        }
        let _ = writeln!(out, "- Mode: {}", self.config.mode);
        let _ = writeln!(out, "- Persona: {}", self.config.persona_id);
        let _ = writeln!(out, "- Cards: {}", self.cards_used.join(", "));
        if let Some(summary) = &self.summary {
            let _ = writeln!(out, "- Status: {}", summary.status);
            let _ = writeln!(out, "- Turns: {}", summary.total_turns);
            if let Some(err) = &summary.error {
                let _ = writeln!(out, "- Error: {err}");
            }
        }
        let _ = writeln!(out);
        let _ = writeln!(out, "## Transcript");
        let _ = writeln!(out);
        for turn in &self.dialogue {
            let label = match turn.speaker {
                Speaker::Npc => "NPC",
                Speaker::Student => "Student",
            };
            let _ = writeln!(
                out,
                "**[{} | card {}] {}**",
                turn.turn_number, turn.card_id, label
            );
            let _ = writeln!(out);
            let _ = writeln!(out, "{}", turn.content);
            let _ = writeln!(out);
        }
        out
    }
}
