//! Student agents: the counterpart side of a session, either an LLM
//! playing a persona or a human at the terminal.

use async_trait::async_trait;
use scena_core::persona::Persona;
use scena_core::{Result, ScenaError};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::chat::{ChatCompletion, ChatMessage};

/// Cue fed to the student when a card starts without an NPC line.
const READY_CUE: &str = "The instructor looks at you, waiting for you to open the conversation.";

/// Produces the student side of the dialogue.
#[async_trait]
pub trait StudentAgent: Send + Sync {
    /// The student's opening line when a card starts cold.
    async fn opening_message(&mut self) -> Result<String>;

    /// The student's answer to an NPC message.
    async fn reply(&mut self, npc_message: &str) -> Result<String>;

    /// Updates the scene framing shown to the student. No-op for manual
    /// input.
    fn set_scene_context(&mut self, _context: &str) {}
}

/// LLM-driven student. Keeps its own history, separate from the NPC's.
pub struct LlmStudent {
    client: Arc<dyn ChatCompletion>,
    persona_prompt: String,
    scene_context: String,
    history: Vec<ChatMessage>,
}

impl LlmStudent {
    pub fn new(client: Arc<dyn ChatCompletion>, persona: &Persona) -> Self {
        Self {
            client,
            persona_prompt: persona.system_prompt(),
            scene_context: String::new(),
            history: Vec::new(),
        }
    }

    fn system_content(&self) -> String {
        if self.scene_context.is_empty() {
            self.persona_prompt.clone()
        } else {
            format!(
                "{}\n\n## Current scene\n{}",
                self.persona_prompt, self.scene_context
            )
        }
    }

    async fn generate(&mut self, npc_message: &str) -> Result<String> {
        let mut messages = Vec::with_capacity(self.history.len() + 2);
        messages.push(ChatMessage::system(self.system_content()));
        messages.extend(self.history.iter().cloned());
        messages.push(ChatMessage::user(npc_message));

        let response = self.client.complete(&messages).await?;

        self.history.push(ChatMessage::user(npc_message));
        self.history.push(ChatMessage::assistant(&response));
        Ok(response)
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }
}

#[async_trait]
impl StudentAgent for LlmStudent {
    async fn opening_message(&mut self) -> Result<String> {
        self.generate(READY_CUE).await
    }

    async fn reply(&mut self, npc_message: &str) -> Result<String> {
        self.generate(npc_message).await
    }

    fn set_scene_context(&mut self, context: &str) {
        self.scene_context = context.to_string();
    }
}

/// Terminal-driven student for manual sessions. Typing `q` alone aborts
/// the session.
#[derive(Default)]
pub struct ManualStudent {
    reader: Option<BufReader<tokio::io::Stdin>>,
}

impl ManualStudent {
    pub fn new() -> Self {
        Self::default()
    }

    async fn read_line(&mut self, prompt: &str) -> Result<String> {
        let mut stdout = tokio::io::stdout();
        stdout
            .write_all(prompt.as_bytes())
            .await
            .map_err(|err| ScenaError::io(format!("stdout write failed: {err}")))?;
        stdout
            .flush()
            .await
            .map_err(|err| ScenaError::io(format!("stdout flush failed: {err}")))?;

        let reader = self
            .reader
            .get_or_insert_with(|| BufReader::new(tokio::io::stdin()));
        let mut line = String::new();
        let read = reader
            .read_line(&mut line)
            .await
            .map_err(|err| ScenaError::io(format!("stdin read failed: {err}")))?;
        if read == 0 {
            return Err(ScenaError::execution("stdin closed during manual session"));
        }
        let line = line.trim().to_string();
        if line.eq_ignore_ascii_case("q") {
            return Err(ScenaError::execution("manual session aborted by user"));
        }
        Ok(line)
    }
}

#[async_trait]
impl StudentAgent for ManualStudent {
    async fn opening_message(&mut self) -> Result<String> {
        self.read_line("[student] opening line (q to quit): ").await
    }

    async fn reply(&mut self, npc_message: &str) -> Result<String> {
        let prompt = format!("\n[NPC]: {npc_message}\n[student] reply (q to quit): ");
        self.read_line(&prompt).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scena_core::persona::preset;
    use std::sync::Mutex;

    struct EchoClient {
        sent: Mutex<Vec<Vec<ChatMessage>>>,
    }

    #[async_trait]
    impl ChatCompletion for EchoClient {
        async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
            self.sent.lock().unwrap().push(messages.to_vec());
            Ok("I think the first step is to check the chart.".to_string())
        }
    }

    fn student() -> (Arc<EchoClient>, LlmStudent) {
        let client = Arc::new(EchoClient {
            sent: Mutex::new(Vec::new()),
        });
        let persona = preset::preset(preset::AVERAGE).unwrap();
        let student = LlmStudent::new(client.clone(), &persona);
        (client, student)
    }

    #[tokio::test]
    async fn scene_context_is_injected_into_system_prompt() {
        let (client, mut student) = student();
        student.set_scene_context("Stage: morning round\nBackground: ward 3");
        student.reply("What do you see?").await.unwrap();
        let sent = client.sent.lock().unwrap();
        let system = &sent[0][0];
        assert!(system.content.contains("## Current scene"));
        assert!(system.content.contains("morning round"));
    }

    #[tokio::test]
    async fn history_accumulates_across_turns() {
        let (client, mut student) = student();
        student.opening_message().await.unwrap();
        student.reply("And then?").await.unwrap();
        assert_eq!(student.history().len(), 4);
        let sent = client.sent.lock().unwrap();
        // Second call carries system + two history entries + new message.
        assert_eq!(sent[1].len(), 4);
    }
}
