//! Closed-loop driver: simulate, evaluate, and export a single scalar
//! score an outer optimizer can consume.

use scena_core::evaluation::EvaluationReport;
use scena_core::persona::PersonaRepository;
use scena_core::session::{BudgetPolicy, EndpointConfig, SessionConfig, SessionStatus};
use scena_core::{Result, ScenaError};
use scena_infrastructure::{paths::write_atomic, ReportStore};
use scena_interaction::ChatCompletion;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::evaluator::Evaluator;
use crate::runner::SessionRunner;

/// Score export file read by the optimizer.
pub const SCORE_FILE: &str = "closed_loop_score.json";
/// Human-readable companion report.
pub const REPORT_FILE: &str = "closed_loop_final_report.md";

/// Parameters for one closed-loop pass.
#[derive(Debug, Clone)]
pub struct ClosedLoopOptions {
    /// The cards document to simulate against.
    pub cards_text: String,
    /// Root directory for all artifacts of this pass.
    pub output_dir: PathBuf,
    /// Personas to run. One id means single mode; several mean one
    /// parallel pipeline per persona with the mean as the final score.
    pub persona_ids: Vec<String>,
    pub max_rounds_per_card: u32,
    pub total_max_rounds: u32,
    pub budget_policy: BudgetPolicy,
    pub save_logs: bool,
    pub npc_endpoint: EndpointConfig,
    pub student_endpoint: EndpointConfig,
}

impl ClosedLoopOptions {
    /// Defaults match the tighter closed-loop budgets, not the
    /// interactive session defaults.
    pub fn new(
        cards_text: String,
        output_dir: PathBuf,
        npc_endpoint: EndpointConfig,
        student_endpoint: EndpointConfig,
    ) -> Self {
        Self {
            cards_text,
            output_dir,
            persona_ids: vec![scena_core::persona::preset::EXCELLENT.to_string()],
            max_rounds_per_card: 5,
            total_max_rounds: 50,
            budget_policy: BudgetPolicy::Advance,
            save_logs: true,
            npc_endpoint,
            student_endpoint,
        }
    }
}

/// Result of one closed-loop pass.
#[derive(Debug, Clone)]
pub struct ClosedLoopOutcome {
    /// The scalar the optimizer reads. Mean over personas in multi mode.
    pub total_score: f64,
    /// Per-persona scores; empty in single mode.
    pub persona_scores: BTreeMap<String, f64>,
    /// Path of the written score JSON.
    pub score_path: PathBuf,
}

/// Runs simulate-and-evaluate pipelines and writes the export artifacts.
pub struct ClosedLoopDriver {
    persona_repo: Arc<dyn PersonaRepository>,
    npc_client: Arc<dyn ChatCompletion>,
    student_client: Arc<dyn ChatCompletion>,
    judge_client: Arc<dyn ChatCompletion>,
}

impl ClosedLoopDriver {
    pub fn new(
        persona_repo: Arc<dyn PersonaRepository>,
        npc_client: Arc<dyn ChatCompletion>,
        student_client: Arc<dyn ChatCompletion>,
        judge_client: Arc<dyn ChatCompletion>,
    ) -> Self {
        Self {
            persona_repo,
            npc_client,
            student_client,
            judge_client,
        }
    }

    /// Runs the loop and writes `closed_loop_score.json` and
    /// `closed_loop_final_report.md` under the output directory. A failed
    /// persona pipeline contributes a 0 instead of failing the batch.
    pub async fn run(
        &self,
        options: &ClosedLoopOptions,
        cancel: &CancellationToken,
    ) -> Result<ClosedLoopOutcome> {
        if options.persona_ids.is_empty() {
            return Err(ScenaError::config("closed loop needs at least one persona"));
        }

        let multi = options.persona_ids.len() > 1;
        let mut persona_scores: BTreeMap<String, f64> = BTreeMap::new();
        let mut first_report: Option<EvaluationReport> = None;

        if multi {
            let mut tasks: JoinSet<(String, f64, Option<EvaluationReport>)> = JoinSet::new();
            for persona_id in &options.persona_ids {
                let pipeline = Pipeline {
                    persona_repo: self.persona_repo.clone(),
                    npc_client: self.npc_client.clone(),
                    student_client: self.student_client.clone(),
                    judge_client: self.judge_client.clone(),
                    options: options.clone(),
                    persona_id: persona_id.clone(),
                    output_dir: options.output_dir.join(format!("persona_{persona_id}")),
                    cancel: cancel.clone(),
                };
                tasks.spawn(async move { pipeline.run().await });
            }
            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok((persona_id, score, report)) => {
                        persona_scores.insert(persona_id, score);
                        if first_report.is_none() {
                            first_report = report;
                        }
                    }
                    Err(err) => {
                        tracing::warn!(%err, "persona pipeline panicked");
                    }
                }
            }
        } else {
            let persona_id = options.persona_ids[0].clone();
            let pipeline = Pipeline {
                persona_repo: self.persona_repo.clone(),
                npc_client: self.npc_client.clone(),
                student_client: self.student_client.clone(),
                judge_client: self.judge_client.clone(),
                options: options.clone(),
                persona_id: persona_id.clone(),
                output_dir: options.output_dir.clone(),
                cancel: cancel.clone(),
            };
            let (persona_id, score, report) = pipeline.run().await;
            persona_scores.insert(persona_id, score);
            first_report = report;
        }

        let total_score = if persona_scores.is_empty() {
            0.0
        } else {
            persona_scores.values().sum::<f64>() / persona_scores.len() as f64
        };

        let score_path = options.output_dir.join(SCORE_FILE);
        let export = build_export(total_score, &persona_scores, first_report.as_ref(), multi);
        write_atomic(&score_path, &serde_json::to_string_pretty(&export)?).await?;

        let report_md = build_final_report(total_score, &persona_scores, first_report.as_ref());
        write_atomic(&options.output_dir.join(REPORT_FILE), &report_md).await?;

        tracing::info!(total_score, personas = persona_scores.len(), "closed loop finished");
        Ok(ClosedLoopOutcome {
            total_score,
            persona_scores: if multi { persona_scores } else { BTreeMap::new() },
            score_path,
        })
    }
}

/// One persona's simulate-and-evaluate pass. Never fails the batch:
/// every error path collapses to a 0 score.
struct Pipeline {
    persona_repo: Arc<dyn PersonaRepository>,
    npc_client: Arc<dyn ChatCompletion>,
    student_client: Arc<dyn ChatCompletion>,
    judge_client: Arc<dyn ChatCompletion>,
    options: ClosedLoopOptions,
    persona_id: String,
    output_dir: PathBuf,
    cancel: CancellationToken,
}

impl Pipeline {
    async fn run(self) -> (String, f64, Option<EvaluationReport>) {
        match self.simulate_and_evaluate().await {
            Ok((score, report)) => (self.persona_id, score, report),
            Err(err) => {
                tracing::warn!(persona = %self.persona_id, %err, "pipeline failed, scoring 0");
                (self.persona_id, 0.0, None)
            }
        }
    }

    async fn simulate_and_evaluate(&self) -> Result<(f64, Option<EvaluationReport>)> {
        let mut config = SessionConfig::new(
            self.options.npc_endpoint.clone(),
            self.options.student_endpoint.clone(),
        );
        config.persona_id = self.persona_id.clone();
        config.max_rounds_per_card = self.options.max_rounds_per_card;
        config.total_max_rounds = self.options.total_max_rounds;
        config.output_dir = self.output_dir.clone();
        config.save_logs = self.options.save_logs;
        config.budget_policy = self.options.budget_policy;

        let mut runner = SessionRunner::new(
            config,
            self.persona_repo.clone(),
            self.npc_client.clone(),
            self.student_client.clone(),
        );
        runner.load_cards_from_str(&self.options.cards_text)?;
        runner.setup().await?;
        let log = runner.run(&self.cancel).await?;

        let status = log.summary.as_ref().map(|s| s.status);
        if status != Some(SessionStatus::Completed) {
            // No judge calls for an unfinished session.
            let report = EvaluationReport::zeroed(
                &log.session_id,
                &format!("session did not complete (status: {:?})", status),
            );
            return Ok((0.0, Some(report)));
        }

        let evaluator = Evaluator::new(self.judge_client.clone());
        let report = evaluator.evaluate(&log).await;
        let score = report.total_score;
        ReportStore::new(&self.output_dir).save(&report).await?;
        Ok((score, Some(report)))
    }
}

fn build_export(
    total_score: f64,
    persona_scores: &BTreeMap<String, f64>,
    report: Option<&EvaluationReport>,
    multi: bool,
) -> serde_json::Value {
    let mut export = match report {
        Some(report) => serde_json::to_value(report)
            .unwrap_or_else(|_| serde_json::json!({ "total_score": total_score })),
        None => serde_json::json!({ "total_score": total_score }),
    };
    if let Some(object) = export.as_object_mut() {
        object.insert("total_score".to_string(), serde_json::json!(total_score));
        if multi {
            object.insert(
                "persona_scores".to_string(),
                serde_json::json!(persona_scores),
            );
            object.insert("mean_score".to_string(), serde_json::json!(total_score));
        }
    }
    export
}

fn build_final_report(
    total_score: f64,
    persona_scores: &BTreeMap<String, f64>,
    report: Option<&EvaluationReport>,
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Closed-loop evaluation");
    let _ = writeln!(out);
    let _ = writeln!(out, "- **Final score**: {total_score:.1}");
    if persona_scores.len() > 1 {
        let _ = writeln!(out);
        let _ = writeln!(out, "## Persona scores");
        let _ = writeln!(out);
        for (persona_id, score) in persona_scores {
            let _ = writeln!(out, "- **{persona_id}**: {score:.1}");
        }
        let _ = writeln!(out);
        let _ = writeln!(out, "- **Mean**: {total_score:.1}");
    }
    if let Some(report) = report {
        let _ = writeln!(out);
        let _ = writeln!(out, "---");
        let _ = writeln!(out);
        out.push_str(&report.to_markdown());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use scena_core::persona::{preset, Persona};
    use scena_interaction::ChatMessage;
    use std::path::Path;
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

    /// NPC that jumps after the first exchange of each stage.
    struct JumpyNpc;

    #[async_trait]
    impl ChatCompletion for JumpyNpc {
        async fn complete(&self, _messages: &[ChatMessage]) -> Result<String> {
            Ok("Understood. **卡片2A**".to_string())
        }
    }

    struct EchoStudent;

    #[async_trait]
    impl ChatCompletion for EchoStudent {
        async fn complete(&self, _messages: &[ChatMessage]) -> Result<String> {
            Ok("I would start with the vitals.".to_string())
        }
    }

    /// Judge that always awards full marks.
    struct GenerousJudge;

    #[async_trait]
    impl ChatCompletion for GenerousJudge {
        async fn complete(&self, _messages: &[ChatMessage]) -> Result<String> {
            Ok("```json\n{\"score\": 100, \"reasoning\": \"flawless\", \"issues\": []}\n```"
                .to_string())
        }
    }

    /// Student transport that fails only for the struggling persona, to
    /// exercise per-persona isolation.
    struct SelectiveStudent;

    #[async_trait]
    impl ChatCompletion for SelectiveStudent {
        async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
            let system = &messages[0].content;
            if system.contains("Struggling student") {
                return Err(ScenaError::transport("student endpoint down"));
            }
            Ok("Let me think it through.".to_string())
        }
    }

    const CARDS: &str = "\
# 卡片1A
<!-- STAGE_META: {\"stage_name\": \"Intake\"} -->
## Context
Morning round, ward three.
---
# 卡片2A
<!-- STAGE_META: {\"stage_name\": \"Assessment\"} -->
## Context
Bedside reasoning check.
";

    fn endpoint() -> EndpointConfig {
        EndpointConfig {
            api_url: "http://localhost/unused".to_string(),
            api_key: String::new(),
            model: "stub".to_string(),
            max_tokens: 400,
            temperature: 0.7,
            timeout_secs: 60,
            service_code: String::new(),
        }
    }

    fn options(dir: &Path, persona_ids: Vec<String>) -> ClosedLoopOptions {
        let mut options = ClosedLoopOptions::new(
            CARDS.to_string(),
            dir.to_path_buf(),
            endpoint(),
            endpoint(),
        );
        options.persona_ids = persona_ids;
        options.max_rounds_per_card = 2;
        options
    }

    fn driver(student: Arc<dyn ChatCompletion>) -> ClosedLoopDriver {
        ClosedLoopDriver::new(
            Arc::new(PresetRepo),
            Arc::new(JumpyNpc),
            student,
            Arc::new(GenerousJudge),
        )
    }

    #[tokio::test]
    async fn single_persona_exports_total_score() {
        let dir = TempDir::new().unwrap();
        let driver = driver(Arc::new(EchoStudent));
        let options = options(dir.path(), vec!["excellent".to_string()]);
        let outcome = driver
            .run(&options, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.total_score, 100.0);
        assert!(outcome.persona_scores.is_empty());

        let export: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&outcome.score_path).unwrap()).unwrap();
        assert_eq!(export["total_score"], serde_json::json!(100.0));
        assert!(export.get("persona_scores").is_none());
        assert!(dir.path().join(REPORT_FILE).exists());
    }

    #[tokio::test]
    async fn failing_persona_contributes_zero_to_the_mean() {
        let dir = TempDir::new().unwrap();
        let driver = driver(Arc::new(SelectiveStudent));
        let ids = vec![
            "excellent".to_string(),
            "average".to_string(),
            "struggling".to_string(),
        ];
        let options = options(dir.path(), ids.clone());
        let outcome = driver
            .run(&options, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.persona_scores.len(), 3);
        assert_eq!(outcome.persona_scores["struggling"], 0.0);
        assert_eq!(outcome.persona_scores["excellent"], 100.0);
        let expected_mean = (100.0 + 100.0 + 0.0) / 3.0;
        assert!((outcome.total_score - expected_mean).abs() < 1e-9);

        let export: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&outcome.score_path).unwrap()).unwrap();
        assert_eq!(export["mean_score"], export["total_score"]);
        assert_eq!(export["persona_scores"]["struggling"], serde_json::json!(0.0));
    }

    #[tokio::test]
    async fn empty_persona_list_is_a_config_error() {
        let dir = TempDir::new().unwrap();
        let driver = driver(Arc::new(EchoStudent));
        let options = options(dir.path(), Vec::new());
        let err = driver
            .run(&options, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ScenaError::Config(_)));
    }
}
