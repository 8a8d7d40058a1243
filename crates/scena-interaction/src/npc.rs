//! NPC agent: plays the scripted examiner side of a session.

use once_cell::sync::Lazy;
use regex::Regex;
use scena_core::Result;
use std::sync::Arc;

use crate::chat::{ChatCompletion, ChatMessage};

/// In-band stage jump marker, e.g. `**卡片2A**` or `Card 2A`, bold optional.
/// The English spelling is boundary-anchored so words like "discard" never
/// read as a jump.
static TRANSITION_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:\*\*)?(?:卡片|\b[Cc]ard\s*)(\d+)([A-Za-z])(?:\*\*)?").expect("valid regex")
});

/// Appended to every card prompt so the model stays in the examiner role.
const ROLE_CONSTRAINT: &str = "\n\n[Role constraint] You are the NPC; the \
other party is a character defined by the current card's Context (a \
student, trainee, family member, or similar). Every reply of yours must be \
a question, a comment, or guidance. Never state the other party's \
reasoning, answers, or designs for them. Keep each reply within 250 \
characters. Never use parentheses to expose your thinking, meta narration, \
or upcoming plans; stay immersed in the scene.";

/// The outcome of one NPC turn, with any jump marker already parsed out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NpcReply {
    /// Normal dialogue turn.
    Continue(String),
    /// Reply contained a stage jump marker. `text` is the reply with the
    /// marker stripped and may be empty.
    Transition { target: String, text: String },
}

/// Finds a jump marker in `response` and returns the normalized target
/// card id (e.g. `"2A"`) with the cleaned remainder.
pub fn parse_transition(response: &str) -> Option<(String, String)> {
    let captures = TRANSITION_MARKER.captures(response)?;
    let target = format!(
        "{}{}",
        &captures[1],
        captures[2].to_ascii_uppercase()
    );
    let cleaned = TRANSITION_MARKER.replace_all(response, "").trim().to_string();
    Some((target, cleaned))
}

/// Stateful NPC conversation partner. History is linear and survives card
/// switches so the model sees the whole session.
pub struct NpcAgent {
    client: Arc<dyn ChatCompletion>,
    system_prompt: String,
    history: Vec<ChatMessage>,
}

impl NpcAgent {
    pub fn new(client: Arc<dyn ChatCompletion>, card_prompt: &str) -> Self {
        Self {
            client,
            system_prompt: Self::with_role_constraint(card_prompt),
            history: Vec::new(),
        }
    }

    fn with_role_constraint(card_prompt: &str) -> String {
        format!("{}{ROLE_CONSTRAINT}", card_prompt.trim())
    }

    /// Replaces the card prompt, optionally wiping history.
    pub fn switch_card(&mut self, card_prompt: &str, preserve_history: bool) {
        self.system_prompt = Self::with_role_constraint(card_prompt);
        if !preserve_history {
            self.history.clear();
        }
    }

    /// Records a scripted prologue as the NPC's own first turn. No LLM
    /// call is made.
    pub fn send_prologue(&mut self, prologue: &str) {
        self.history.push(ChatMessage::assistant(prologue));
    }

    /// Sends the student's message and returns the parsed NPC reply. Both
    /// sides of the exchange are appended to the history.
    pub async fn respond(&mut self, student_message: &str) -> Result<NpcReply> {
        let mut messages = Vec::with_capacity(self.history.len() + 2);
        messages.push(ChatMessage::system(&self.system_prompt));
        messages.extend(self.history.iter().cloned());
        messages.push(ChatMessage::user(student_message));

        let response = self.client.complete(&messages).await?;

        self.history.push(ChatMessage::user(student_message));
        self.history.push(ChatMessage::assistant(&response));

        match parse_transition(&response) {
            Some((target, text)) => {
                tracing::debug!(%target, "transition marker detected");
                Ok(NpcReply::Transition { target, text })
            }
            None => Ok(NpcReply::Continue(response)),
        }
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    pub fn reset(&mut self) {
        self.history.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Returns canned replies in order and records what it was sent.
    struct ScriptedClient {
        replies: Mutex<Vec<String>>,
        sent: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl ScriptedClient {
        fn new(replies: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.iter().rev().map(|s| s.to_string()).collect()),
                sent: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ChatCompletion for ScriptedClient {
        async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
            self.sent.lock().unwrap().push(messages.to_vec());
            Ok(self.replies.lock().unwrap().pop().expect("script exhausted"))
        }
    }

    #[test]
    fn parse_transition_handles_both_spellings() {
        let (target, text) = parse_transition("Well done. **卡片2A**").unwrap();
        assert_eq!(target, "2A");
        assert_eq!(text, "Well done.");

        let (target, text) = parse_transition("Card 3b, off we go").unwrap();
        assert_eq!(target, "3B");
        assert_eq!(text, ", off we go");

        assert!(parse_transition("no marker here").is_none());
    }

    #[test]
    fn prose_mentioning_card_like_words_is_not_a_jump() {
        assert!(parse_transition(
            "Good thinking. We can discard 2A results and focus on the chart."
        )
        .is_none());
        assert!(parse_transition("A placard 3B hung over the bench.").is_none());
    }

    #[tokio::test]
    async fn respond_appends_both_sides_to_history() {
        let client = ScriptedClient::new(&["Why do you think so?"]);
        let mut npc = NpcAgent::new(client.clone(), "You are a ward examiner.");
        let reply = npc.respond("The dose seems high.").await.unwrap();
        assert_eq!(
            reply,
            NpcReply::Continue("Why do you think so?".to_string())
        );
        assert_eq!(npc.history().len(), 2);
        assert_eq!(npc.history()[0].role, "user");
        assert_eq!(npc.history()[1].role, "assistant");
    }

    #[tokio::test]
    async fn respond_parses_transition_out_of_reply() {
        let client = ScriptedClient::new(&["Good. Let us move on. **卡片2A**"]);
        let mut npc = NpcAgent::new(client, "prompt");
        let reply = npc.respond("done").await.unwrap();
        assert_eq!(
            reply,
            NpcReply::Transition {
                target: "2A".to_string(),
                text: "Good. Let us move on.".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn system_prompt_carries_role_constraint() {
        let client = ScriptedClient::new(&["ok"]);
        let mut npc = NpcAgent::new(client.clone(), "Base prompt.");
        npc.respond("hi").await.unwrap();
        let sent = client.sent.lock().unwrap();
        let system = &sent[0][0];
        assert_eq!(system.role, "system");
        assert!(system.content.starts_with("Base prompt."));
        assert!(system.content.contains("[Role constraint]"));
    }

    #[tokio::test]
    async fn switch_card_can_preserve_history() {
        let client = ScriptedClient::new(&["first", "second"]);
        let mut npc = NpcAgent::new(client, "card one");
        npc.respond("hello").await.unwrap();
        npc.switch_card("card two", true);
        assert_eq!(npc.history().len(), 2);
        npc.switch_card("card three", false);
        assert!(npc.history().is_empty());
    }

    #[test]
    fn prologue_is_logged_without_llm_call() {
        let client = ScriptedClient::new(&[]);
        let mut npc = NpcAgent::new(client.clone(), "prompt");
        npc.send_prologue("Welcome to the morning round.");
        assert_eq!(npc.history().len(), 1);
        assert_eq!(npc.history()[0].role, "assistant");
        assert!(client.sent.lock().unwrap().is_empty());
    }
}
