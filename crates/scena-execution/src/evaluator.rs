//! Transcript evaluator: one judge call per rubric sub-dimension.

use once_cell::sync::Lazy;
use regex::Regex;
use scena_core::evaluation::rubric::{SubDimension, RUBRIC};
use scena_core::evaluation::{DimensionScore, EvaluationReport, SubDimensionScore};
use scena_core::session::{SessionLog, Speaker};
use scena_interaction::{ChatCompletion, ChatMessage};
use std::sync::Arc;

static JSON_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```json\s*(.*?)\s*```").expect("valid regex"));

const JUDGE_SYSTEM_PROMPT: &str = "You are a professional education \
assessment expert. Return your verdict strictly as JSON.";

/// Scores a session transcript against the fixed rubric. Stateless; every
/// judge call is independent and a failed call degrades to half the
/// sub-dimension's maximum instead of aborting the evaluation.
pub struct Evaluator {
    client: Arc<dyn ChatCompletion>,
}

impl Evaluator {
    pub fn new(client: Arc<dyn ChatCompletion>) -> Self {
        Self { client }
    }

    /// Produces a full report. Dimension and total scores are derived by
    /// summation only.
    pub async fn evaluate(&self, log: &SessionLog) -> EvaluationReport {
        let transcript = format_transcript(log);
        let mut dimensions = Vec::with_capacity(RUBRIC.len());

        for dim in RUBRIC {
            tracing::info!(dimension = dim.name, "evaluating");
            let mut subs = Vec::with_capacity(dim.subs.len());
            for sub in dim.subs {
                subs.push(self.judge_sub(dim.name, sub, &transcript).await);
            }
            dimensions.push(DimensionScore::from_subs(dim.name, subs));
        }

        let mut report = EvaluationReport::from_dimensions(&log.session_id, dimensions);
        let (summary, recommendations) = self.summarize(&report, &transcript).await;
        report.summary = summary;
        report.recommendations = recommendations;
        tracing::info!(
            session_id = %log.session_id,
            total = report.total_score,
            rating = %report.rating(),
            "evaluation finished"
        );
        report
    }

    async fn judge_sub(
        &self,
        dim_name: &str,
        sub: &SubDimension,
        transcript: &str,
    ) -> SubDimensionScore {
        let prompt = judge_prompt(dim_name, sub, transcript);
        let messages = [
            ChatMessage::system(JUDGE_SYSTEM_PROMPT),
            ChatMessage::user(prompt),
        ];
        let verdict = match self.client.complete(&messages).await {
            Ok(reply) => parse_verdict(&reply, sub.max_score),
            Err(err) => {
                tracing::warn!(sub = sub.name, %err, "judge call failed");
                Verdict {
                    score: sub.max_score * 0.5,
                    reasoning: format!("evaluation call failed: {err}"),
                    issues: Vec::new(),
                }
            }
        };
        SubDimensionScore {
            name: sub.name.to_string(),
            max_score: sub.max_score,
            score: verdict.score,
            reasoning: verdict.reasoning,
            issues: verdict.issues,
        }
    }

    /// Summary and recommendations from a final call over the dimension
    /// totals; failure degrades to a stock summary.
    async fn summarize(
        &self,
        report: &EvaluationReport,
        transcript: &str,
    ) -> (String, Vec<String>) {
        let dim_lines: Vec<String> = report
            .dimensions
            .iter()
            .map(|d| format!("- {}: {:.1}/{:.0} ({})", d.name, d.score, d.max_score, d.rating()))
            .collect();
        let excerpt: String = transcript.chars().take(2000).collect();
        let prompt = format!(
            "Based on the evaluation below, produce a concise summary and \
improvement suggestions.\n\n## Dimension scores\n{}\n\n## Transcript \
excerpt\n{excerpt}\n\nReturn JSON:\n```json\n{{\n    \"summary\": \"<summary \
within 100 words>\",\n    \"recommendations\": [\"<suggestion 1>\", \
\"<suggestion 2>\", \"<suggestion 3>\"]\n}}\n```",
            dim_lines.join("\n")
        );

        match self.client.complete(&[ChatMessage::user(prompt)]).await {
            Ok(reply) => match parse_json(&reply) {
                Some(value) => {
                    let summary = value
                        .get("summary")
                        .and_then(|s| s.as_str())
                        .unwrap_or_default()
                        .to_string();
                    let recommendations = value
                        .get("recommendations")
                        .and_then(|r| r.as_array())
                        .map(|items| {
                            items
                                .iter()
                                .filter_map(|i| i.as_str().map(str::to_string))
                                .collect()
                        })
                        .unwrap_or_default();
                    (summary, recommendations)
                }
                None => (stock_summary(), Vec::new()),
            },
            Err(err) => {
                tracing::warn!(%err, "summary call failed");
                (stock_summary(), Vec::new())
            }
        }
    }
}

fn stock_summary() -> String {
    "Evaluation complete; the total is the sum of the dimension scores.".to_string()
}

/// The transcript as the judge sees it: one numbered line per turn.
fn format_transcript(log: &SessionLog) -> String {
    log.dialogue
        .iter()
        .map(|turn| {
            let speaker = match turn.speaker {
                Speaker::Npc => "Agent",
                Speaker::Student => "Student",
            };
            format!("Turn {} [{speaker}]: {}", turn.turn_number, turn.content)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn judge_prompt(dim_name: &str, sub: &SubDimension, transcript: &str) -> String {
    format!(
        "You are a professional education assessment expert. Evaluate the \
dialogue below on the \"{sub_name}\" sub-dimension of the \"{dim_name}\" \
dimension.\n\n## Criterion\n- **Dimension**: {dim_name}\n- \
**Sub-dimension**: {sub_name}\n- **Standard**: {criterion}\n- **Maximum**: \
{max:.0} points\n\n## Transcript\n{transcript}\n\nReturn your verdict as \
JSON:\n```json\n{{\n    \"score\": <number between 0 and {max:.0}>,\n    \
\"reasoning\": \"<brief justification>\",\n    \"issues\": [\"<issue 1>\", \
\"<issue 2>\"]\n}}\n```\n\nScore objectively from the transcript alone. \
Keep the reasoning short and list concrete issues if any.",
        sub_name = sub.name,
        criterion = sub.criterion,
        max = sub.max_score,
    )
}

struct Verdict {
    score: f64,
    reasoning: String,
    issues: Vec<String>,
}

/// Parse ladder: fenced ```json block, then the whole reply as JSON, else
/// half the maximum with the raw text as reasoning.
fn parse_verdict(reply: &str, max_score: f64) -> Verdict {
    if let Some(value) = parse_json(reply) {
        let score = value.get("score").and_then(|s| s.as_f64()).unwrap_or(0.0);
        return Verdict {
            score: score.clamp(0.0, max_score),
            reasoning: value
                .get("reasoning")
                .and_then(|r| r.as_str())
                .unwrap_or_default()
                .to_string(),
            issues: value
                .get("issues")
                .and_then(|i| i.as_array())
                .map(|items| {
                    items
                        .iter()
                        .filter_map(|i| i.as_str().map(str::to_string))
                        .collect()
                })
                .unwrap_or_default(),
        };
    }

    let reasoning = if reply.is_empty() {
        "could not parse the judge reply".to_string()
    } else {
        reply.chars().take(200).collect()
    };
    Verdict {
        score: max_score * 0.5,
        reasoning,
        issues: Vec::new(),
    }
}

fn parse_json(reply: &str) -> Option<serde_json::Value> {
    if let Some(captures) = JSON_FENCE.captures(reply) {
        if let Ok(value) = serde_json::from_str(&captures[1]) {
            return Some(value);
        }
    }
    serde_json::from_str(reply.trim()).ok()
}
