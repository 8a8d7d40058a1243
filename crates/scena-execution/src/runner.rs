//! Session runner: drives the NPC and the student card by card and
//! produces the session log.

use scena_core::card::{Card, CardLoader};
use scena_core::persona::PersonaRepository;
use scena_core::session::{
    BudgetPolicy, SessionConfig, SessionLog, SessionMode, SessionStatus, Speaker,
};
use scena_core::{Result, ScenaError};
use scena_infrastructure::LogStore;
use scena_interaction::{ChatCompletion, LlmStudent, ManualStudent, NpcAgent, NpcReply, StudentAgent};
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Runner lifecycle. Card loading happens in `Idle`, `setup` moves to
/// `Ready`, `run` to `Running` and then a terminal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunnerState {
    Idle,
    Ready,
    Running,
    Finished(SessionStatus),
}

struct DriveOutcome {
    status: SessionStatus,
    cards_played: u32,
}

/// Coordinates one simulated session.
pub struct SessionRunner {
    config: SessionConfig,
    persona_repo: Arc<dyn PersonaRepository>,
    npc_client: Arc<dyn ChatCompletion>,
    student_client: Arc<dyn ChatCompletion>,
    loader: CardLoader,
    dialogue_cards: Vec<Card>,
    transition_cards: Vec<Card>,
    student: Option<Box<dyn StudentAgent>>,
    log: Option<SessionLog>,
    state: RunnerState,
}

impl SessionRunner {
    pub fn new(
        config: SessionConfig,
        persona_repo: Arc<dyn PersonaRepository>,
        npc_client: Arc<dyn ChatCompletion>,
        student_client: Arc<dyn ChatCompletion>,
    ) -> Self {
        Self {
            config,
            persona_repo,
            npc_client,
            student_client,
            loader: CardLoader::new(),
            dialogue_cards: Vec::new(),
            transition_cards: Vec::new(),
            student: None,
            log: None,
            state: RunnerState::Idle,
        }
    }

    /// Parses a cards document. Fails on duplicate card identity or when
    /// no dialogue card is present.
    pub fn load_cards_from_str(&mut self, text: &str) -> Result<()> {
        let cards = self.loader.parse(text)?;
        let sequence = self.loader.card_sequence(&cards, None);
        let (dialogue, transition) = self.loader.separate_by_role(&sequence);
        tracing::info!(
            dialogue = dialogue.len(),
            transition = transition.len(),
            "cards loaded"
        );
        self.dialogue_cards = dialogue;
        self.transition_cards = transition;
        Ok(())
    }

    /// Reads and parses a cards document from disk.
    pub async fn load_cards(&mut self, path: &Path) -> Result<()> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|err| ScenaError::io(format!("read {}: {err}", path.display())))?;
        self.load_cards_from_str(&text)
    }

    /// Resolves the persona, builds the student agent, and initializes an
    /// empty log. Cards must already be loaded.
    pub async fn setup(&mut self) -> Result<()> {
        if self.dialogue_cards.is_empty() {
            return Err(ScenaError::execution("no cards loaded before setup"));
        }

        let persona = self.persona_repo.get(&self.config.persona_id).await?;
        tracing::info!(persona = %persona.name, mode = %self.config.mode, "session setup");

        let student: Box<dyn StudentAgent> = match self.config.mode {
            SessionMode::Manual => Box::new(ManualStudent::new()),
            SessionMode::Auto | SessionMode::Hybrid => {
                Box::new(LlmStudent::new(self.student_client.clone(), &persona))
            }
        };
        self.student = Some(student);

        let cards_used = self
            .dialogue_cards
            .iter()
            .map(|c| c.card_id.clone())
            .collect();
        self.log = Some(SessionLog::new(self.config.snapshot(), cards_used));
        self.state = RunnerState::Ready;
        Ok(())
    }

    /// Runs the session to a terminal status. The log is finalized and,
    /// when `save_logs` is set, persisted on every exit path, including
    /// the error one.
    pub async fn run(&mut self, cancel: &CancellationToken) -> Result<SessionLog> {
        if self.state != RunnerState::Ready {
            return Err(ScenaError::execution("runner is not set up"));
        }
        self.state = RunnerState::Running;

        let mut student = self
            .student
            .take()
            .ok_or_else(|| ScenaError::internal("student agent missing after setup"))?;
        let mut log = self
            .log
            .take()
            .ok_or_else(|| ScenaError::internal("session log missing after setup"))?;

        let cards = self.dialogue_cards.clone();
        let transitions = self.transition_cards.clone();
        let outcome = self
            .drive(&cards, &transitions, student.as_mut(), &mut log, cancel)
            .await;

        match outcome {
            Ok(DriveOutcome {
                status,
                cards_played,
            }) => {
                log.finalize(status, cards_played, None);
                self.persist(&log).await?;
                self.state = RunnerState::Finished(status);
                tracing::info!(
                    session_id = %log.session_id,
                    %status,
                    turns = log.dialogue.len(),
                    "session finished"
                );
                self.log = Some(log.clone());
                Ok(log)
            }
            Err(err) => {
                let cards_played = cards
                    .iter()
                    .filter(|c| log.dialogue.iter().any(|t| t.card_id == c.card_id))
                    .count() as u32;
                log.finalize(SessionStatus::Error, cards_played, Some(err.to_string()));
                // Persist what we have before the error propagates.
                if let Err(save_err) = self.persist(&log).await {
                    tracing::warn!(%save_err, "failed to save log after session error");
                }
                self.state = RunnerState::Finished(SessionStatus::Error);
                self.log = Some(log);
                Err(err)
            }
        }
    }

    /// The finalized log of the last run, if any.
    pub fn log(&self) -> Option<&SessionLog> {
        self.log.as_ref()
    }

    async fn persist(&self, log: &SessionLog) -> Result<()> {
        if !self.config.save_logs {
            return Ok(());
        }
        LogStore::new(&self.config.output_dir).save(log).await
    }

    async fn drive(
        &self,
        cards: &[Card],
        transitions: &[Card],
        student: &mut dyn StudentAgent,
        log: &mut SessionLog,
        cancel: &CancellationToken,
    ) -> Result<DriveOutcome> {
        let mut npc: Option<NpcAgent> = None;
        let mut turn_count: u32 = 0;
        let total_cards = cards.len();

        for (index, card) in cards.iter().enumerate() {
            if cancel.is_cancelled() {
                return Ok(DriveOutcome {
                    status: SessionStatus::Interrupted,
                    cards_played: index as u32,
                });
            }

            if turn_count >= self.config.total_max_rounds {
                tracing::warn!(
                    limit = self.config.total_max_rounds,
                    "total round cap reached, ending session"
                );
                return Ok(DriveOutcome {
                    status: SessionStatus::Completed,
                    cards_played: index as u32,
                });
            }

            self.config.report_progress(
                "simulate",
                &format!("stage {}/{}: {}", index + 1, total_cards, card.card_id),
            );

            let prompt = card.system_prompt();
            if let Some(existing) = npc.as_mut() {
                existing.switch_card(&prompt, true);
            } else {
                // The first card's model hint selects the NPC model for the
                // whole session; later cards only swap prompts.
                let client = card
                    .meta
                    .model_hint
                    .as_deref()
                    .and_then(|model| self.npc_client.for_model(model))
                    .unwrap_or_else(|| self.npc_client.clone());
                npc = Some(NpcAgent::new(client, &prompt));
            }
            let npc = npc
                .as_mut()
                .ok_or_else(|| ScenaError::internal("npc agent missing"))?;

            let stage_name = if card.meta.stage_name.is_empty() {
                card.title.as_str()
            } else {
                card.meta.stage_name.as_str()
            };
            let mut scene = format!("Stage: {stage_name}");
            if !card.context.is_empty() {
                scene.push_str(&format!("\nBackground: {}", card.context));
            }
            student.set_scene_context(&scene);

            let mut card_rounds: u32 = 0;
            let mut budget = self.config.max_rounds_per_card;
            let mut retried = false;
            let mut pending: Option<String> = None;
            let mut jumped = false;

            // First card's prologue opens the session as an NPC turn.
            if index == 0 && card.has_prologue() {
                let prologue = card.prologue.clone();
                npc.send_prologue(&prologue);
                log.push_turn(&card.card_id, Speaker::Npc, &prologue);
                let answer = student.reply(&prologue).await?;
                log.push_turn(&card.card_id, Speaker::Student, &answer);
                pending = Some(answer);
                turn_count += 1;
                card_rounds += 1;
            }

            loop {
                if cancel.is_cancelled() {
                    return Ok(DriveOutcome {
                        status: SessionStatus::Interrupted,
                        cards_played: index as u32 + 1,
                    });
                }

                // Checked at the top so prologue and transition rounds
                // count against the cap too.
                if turn_count >= self.config.total_max_rounds {
                    tracing::warn!(
                        limit = self.config.total_max_rounds,
                        "total round cap reached, ending session"
                    );
                    return Ok(DriveOutcome {
                        status: SessionStatus::Completed,
                        cards_played: index as u32 + 1,
                    });
                }

                if card_rounds >= budget {
                    match self.config.budget_policy {
                        BudgetPolicy::Advance => break,
                        BudgetPolicy::RetryOnce if !retried => {
                            retried = true;
                            budget += 1;
                        }
                        BudgetPolicy::RetryOnce => break,
                        BudgetPolicy::Abort => {
                            return Err(ScenaError::execution(format!(
                                "card {} exhausted its round budget ({})",
                                card.card_id, self.config.max_rounds_per_card
                            )));
                        }
                    }
                    if card_rounds >= budget {
                        break;
                    }
                }

                let student_message = match pending.take() {
                    Some(message) => message,
                    None => {
                        let opener = student.opening_message().await?;
                        log.push_turn(&card.card_id, Speaker::Student, &opener);
                        opener
                    }
                };

                match npc.respond(&student_message).await? {
                    NpcReply::Transition { target, text } => {
                        if !text.is_empty() {
                            log.push_turn(&card.card_id, Speaker::Npc, &text);
                        }
                        turn_count += 1;
                        card_rounds += 1;
                        tracing::debug!(from = %card.card_id, %target, "stage transition");
                        jumped = true;
                        break;
                    }
                    NpcReply::Continue(text) => {
                        log.push_turn(&card.card_id, Speaker::Npc, &text);
                        let answer = student.reply(&text).await?;
                        log.push_turn(&card.card_id, Speaker::Student, &answer);
                        pending = Some(answer);
                        turn_count += 1;
                        card_rounds += 1;
                    }
                }
            }

            // The stage's transition card bridges into the next stage.
            if jumped {
                if let Some(bridge) = transitions.iter().find(|t| t.stage_num == card.stage_num) {
                    if let Some(output) = bridge.transition_output() {
                        log.push_turn(&bridge.card_id, Speaker::Npc, output);
                    }
                }
            }
        }

        Ok(DriveOutcome {
            status: SessionStatus::Completed,
            cards_played: total_cards as u32,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use scena_core::persona::{preset, Persona};
    use scena_interaction::ChatMessage;
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct PresetRepo;

    #[async_trait]
    impl PersonaRepository for PresetRepo {
        async fn get(&self, persona_id: &str) -> Result<Persona> {
            preset::preset(persona_id)
                .ok_or_else(|| ScenaError::not_found("persona", persona_id))
        }

        async fn list(&self) -> Result<Vec<String>> {
            Ok(preset::preset_ids().iter().map(|s| s.to_string()).collect())
        }
    }

    /// NPC stub that replays a script, then keeps repeating the last line.
    struct ScriptedNpc {
        script: Mutex<Vec<String>>,
        fallback: String,
    }

    impl ScriptedNpc {
        fn new(script: &[&str], fallback: &str) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.iter().rev().map(|s| s.to_string()).collect()),
                fallback: fallback.to_string(),
            })
        }
    }

    #[async_trait]
    impl ChatCompletion for ScriptedNpc {
        async fn complete(&self, _messages: &[ChatMessage]) -> Result<String> {
            Ok(self
                .script
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| self.fallback.clone()))
        }
    }

    struct EchoStudent;

    #[async_trait]
    impl ChatCompletion for EchoStudent {
        async fn complete(&self, _messages: &[ChatMessage]) -> Result<String> {
            Ok("I will check the chart first.".to_string())
        }
    }

    /// Records the model a variant client was requested for.
    struct ModelRecordingNpc {
        selected: Arc<Mutex<Option<String>>>,
    }

    #[async_trait]
    impl ChatCompletion for ModelRecordingNpc {
        async fn complete(&self, _messages: &[ChatMessage]) -> Result<String> {
            Ok("Noted. What next?".to_string())
        }

        fn for_model(&self, model: &str) -> Option<Arc<dyn ChatCompletion>> {
            *self.selected.lock().unwrap() = Some(model.to_string());
            Some(Arc::new(ModelRecordingNpc {
                selected: self.selected.clone(),
            }))
        }
    }

    struct FailingClient;

    #[async_trait]
    impl ChatCompletion for FailingClient {
        async fn complete(&self, _messages: &[ChatMessage]) -> Result<String> {
            Err(ScenaError::transport("connection refused"))
        }
    }

    const TWO_STAGE_CARDS: &str = "\
# 卡片1A
<!-- STAGE_META: {\"stage_name\": \"Intake\", \"interaction_rounds\": 3} -->
## Role
Ward examiner opening the morning round.
## Context
A trainee joins the round in ward three.
---
# 卡片1B
## Output
The examiner nods and leads the trainee to the next bed.
---
# 卡片2A
<!-- STAGE_META: {\"stage_name\": \"Assessment\", \"interaction_rounds\": 3} -->
## Role
Ward examiner probing the trainee's reasoning.
";

    fn config(dir: &Path) -> SessionConfig {
        let endpoint = scena_core::session::EndpointConfig {
            api_url: "http://localhost/unused".to_string(),
            api_key: String::new(),
            model: "stub".to_string(),
            max_tokens: 400,
            temperature: 0.7,
            timeout_secs: 60,
            service_code: String::new(),
        };
        let mut config = SessionConfig::new(endpoint.clone(), endpoint);
        config.output_dir = dir.to_path_buf();
        config.max_rounds_per_card = 3;
        config.total_max_rounds = 50;
        config
    }

    fn runner(npc: Arc<dyn ChatCompletion>, config: SessionConfig) -> SessionRunner {
        SessionRunner::new(config, Arc::new(PresetRepo), npc, Arc::new(EchoStudent))
    }

    #[tokio::test]
    async fn two_card_scenario_with_one_transition() {
        let dir = TempDir::new().unwrap();
        let npc = ScriptedNpc::new(
            &["Good start. **卡片2A**"],
            "Tell me more about your reasoning.",
        );
        let mut runner = runner(npc, config(dir.path()));
        runner.load_cards_from_str(TWO_STAGE_CARDS).unwrap();
        runner.setup().await.unwrap();

        let log = runner.run(&CancellationToken::new()).await.unwrap();
        let summary = log.summary.as_ref().unwrap();
        assert_eq!(summary.status, SessionStatus::Completed);
        assert_eq!(log.cards_used, vec!["1A".to_string(), "2A".to_string()]);

        // Exactly one bridge turn, attributed to the transition card.
        let bridge_turns: Vec<_> = log.dialogue.iter().filter(|t| t.card_id == "1B").collect();
        assert_eq!(bridge_turns.len(), 1);
        assert_eq!(bridge_turns[0].speaker, Speaker::Npc);
        assert!(bridge_turns[0].content.contains("next bed"));

        // The bridge sits between the two dialogue cards.
        let last_1a = log
            .dialogue
            .iter()
            .rposition(|t| t.card_id == "1A")
            .unwrap();
        let first_2a = log.dialogue.iter().position(|t| t.card_id == "2A").unwrap();
        let bridge_pos = log.dialogue.iter().position(|t| t.card_id == "1B").unwrap();
        assert!(last_1a < bridge_pos && bridge_pos < first_2a);

        // The transition marker never reaches the transcript.
        assert!(log.dialogue.iter().all(|t| !t.content.contains("卡片")));
    }

    #[tokio::test]
    async fn prologue_opens_the_session_as_an_npc_turn() {
        let dir = TempDir::new().unwrap();
        let cards = "\
# 卡片1A
<!-- STAGE_META: {\"stage_name\": \"Intake\"} -->
## Context
A trainee joins the round.
## Prologue
Good morning. Ready for the round?
";
        let npc = ScriptedNpc::new(&[], "What would you check first?");
        let mut runner = runner(npc, config(dir.path()));
        runner.load_cards_from_str(cards).unwrap();
        runner.setup().await.unwrap();

        let log = runner.run(&CancellationToken::new()).await.unwrap();
        let first = &log.dialogue[0];
        assert_eq!(first.speaker, Speaker::Npc);
        assert!(first.content.contains("Good morning"));
        assert_eq!(log.dialogue[1].speaker, Speaker::Student);
        // Prologue consumed one of the three rounds.
        let npc_turns = log
            .dialogue
            .iter()
            .filter(|t| t.speaker == Speaker::Npc)
            .count();
        assert_eq!(npc_turns, 3);
    }

    #[tokio::test]
    async fn budget_caps_a_markerless_card() {
        let dir = TempDir::new().unwrap();
        let npc = ScriptedNpc::new(&[], "And what would you do next?");
        let mut runner = runner(npc, config(dir.path()));
        runner.load_cards_from_str(TWO_STAGE_CARDS).unwrap();
        runner.setup().await.unwrap();

        let log = runner.run(&CancellationToken::new()).await.unwrap();
        let summary = log.summary.as_ref().unwrap();
        assert_eq!(summary.status, SessionStatus::Completed);

        // A marker-less NPC yields exactly max_rounds_per_card NPC turns
        // per dialogue card, and no bridge turn.
        for card_id in ["1A", "2A"] {
            let npc_turns = log
                .dialogue
                .iter()
                .filter(|t| t.card_id == card_id && t.speaker == Speaker::Npc)
                .count();
            assert_eq!(npc_turns, 3, "card {card_id}");
        }
        assert!(log.dialogue.iter().all(|t| t.card_id != "1B"));
    }

    #[tokio::test]
    async fn abort_policy_turns_budget_exhaustion_into_error() {
        let dir = TempDir::new().unwrap();
        let npc = ScriptedNpc::new(&[], "Keep going.");
        let mut config = config(dir.path());
        config.budget_policy = BudgetPolicy::Abort;
        let mut runner = runner(npc, config);
        runner.load_cards_from_str(TWO_STAGE_CARDS).unwrap();
        runner.setup().await.unwrap();

        let err = runner.run(&CancellationToken::new()).await.unwrap_err();
        assert!(err.to_string().contains("round budget"));
        let log = runner.log().unwrap();
        assert_eq!(
            log.summary.as_ref().unwrap().status,
            SessionStatus::Error
        );
        // Partial transcript survives.
        assert!(!log.dialogue.is_empty());
    }

    #[tokio::test]
    async fn retry_once_grants_exactly_one_extra_round() {
        let dir = TempDir::new().unwrap();
        let npc = ScriptedNpc::new(&[], "And what would you do next?");
        let mut config = config(dir.path());
        config.budget_policy = BudgetPolicy::RetryOnce;
        let mut runner = runner(npc, config);
        runner.load_cards_from_str(TWO_STAGE_CARDS).unwrap();
        runner.setup().await.unwrap();

        let log = runner.run(&CancellationToken::new()).await.unwrap();
        assert_eq!(
            log.summary.as_ref().unwrap().status,
            SessionStatus::Completed
        );
        // max_rounds_per_card is 3; the one retry yields a fourth NPC turn
        // on each card, never a fifth.
        for card_id in ["1A", "2A"] {
            let npc_turns = log
                .dialogue
                .iter()
                .filter(|t| t.card_id == card_id && t.speaker == Speaker::Npc)
                .count();
            assert_eq!(npc_turns, 4, "card {card_id}");
        }
    }

    #[tokio::test]
    async fn global_round_cap_counts_transition_rounds() {
        let dir = TempDir::new().unwrap();
        let npc = ScriptedNpc::new(&["Good start. **卡片2A**"], "Tell me more.");
        let mut config = config(dir.path());
        config.total_max_rounds = 1;
        let mut runner = runner(npc, config);
        runner.load_cards_from_str(TWO_STAGE_CARDS).unwrap();
        runner.setup().await.unwrap();

        let log = runner.run(&CancellationToken::new()).await.unwrap();
        let summary = log.summary.as_ref().unwrap();
        assert_eq!(summary.status, SessionStatus::Completed);
        // The jump consumed the only round; the second card never starts.
        assert_eq!(summary.cards_played, 1);
        assert!(log.dialogue.iter().all(|t| t.card_id != "2A"));
    }

    #[tokio::test]
    async fn first_card_model_hint_selects_the_npc_model() {
        let dir = TempDir::new().unwrap();
        let cards = "\
# 卡片1A
<!-- STAGE_META: {\"stage_name\": \"Intake\", \"model_id\": \"ward-model\"} -->
## Role
Ward examiner.
";
        let selected = Arc::new(Mutex::new(None));
        let npc = Arc::new(ModelRecordingNpc {
            selected: selected.clone(),
        });
        let mut runner = runner(npc, config(dir.path()));
        runner.load_cards_from_str(cards).unwrap();
        runner.setup().await.unwrap();
        runner.run(&CancellationToken::new()).await.unwrap();

        assert_eq!(selected.lock().unwrap().as_deref(), Some("ward-model"));
    }

    #[tokio::test]
    async fn cancelled_token_interrupts_and_persists() {
        let dir = TempDir::new().unwrap();
        let npc = ScriptedNpc::new(&[], "Still here?");
        let mut runner = runner(npc, config(dir.path()));
        runner.load_cards_from_str(TWO_STAGE_CARDS).unwrap();
        runner.setup().await.unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let log = runner.run(&cancel).await.unwrap();
        assert_eq!(
            log.summary.as_ref().unwrap().status,
            SessionStatus::Interrupted
        );
        assert!(LogStore::new(dir.path()).json_path(&log.session_id).exists());
    }

    #[tokio::test]
    async fn transport_error_finalizes_and_saves_before_propagating() {
        let dir = TempDir::new().unwrap();
        let mut runner = SessionRunner::new(
            config(dir.path()),
            Arc::new(PresetRepo),
            Arc::new(FailingClient),
            Arc::new(EchoStudent),
        );
        runner.load_cards_from_str(TWO_STAGE_CARDS).unwrap();
        runner.setup().await.unwrap();

        let err = runner.run(&CancellationToken::new()).await.unwrap_err();
        assert!(err.is_transport());
        let log = runner.log().unwrap();
        let summary = log.summary.as_ref().unwrap();
        assert_eq!(summary.status, SessionStatus::Error);
        assert!(summary.error.as_ref().unwrap().contains("connection refused"));
        assert!(LogStore::new(dir.path()).json_path(&log.session_id).exists());
    }

    #[tokio::test]
    async fn run_requires_setup() {
        let dir = TempDir::new().unwrap();
        let npc = ScriptedNpc::new(&[], "hi");
        let mut runner = runner(npc, config(dir.path()));
        runner.load_cards_from_str(TWO_STAGE_CARDS).unwrap();
        let err = runner.run(&CancellationToken::new()).await.unwrap_err();
        assert!(err.to_string().contains("not set up"));
    }
}
