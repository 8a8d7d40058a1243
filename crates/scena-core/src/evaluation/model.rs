//! Evaluation report model.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use strum::Display;

/// Qualitative band derived from a score ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum Rating {
    #[strum(serialize = "Excellent")]
    Excellent,
    #[strum(serialize = "Good")]
    Good,
    #[strum(serialize = "Pass")]
    Pass,
    #[strum(serialize = "Fail")]
    Fail,
}

impl Rating {
    /// Band thresholds: 0.9 excellent, 0.7 good, 0.6 pass.
    pub fn from_ratio(score: f64, max_score: f64) -> Self {
        if max_score <= 0.0 {
            return Rating::Fail;
        }
        let ratio = score / max_score;
        if ratio >= 0.9 {
            Rating::Excellent
        } else if ratio >= 0.7 {
            Rating::Good
        } else if ratio >= 0.6 {
            Rating::Pass
        } else {
            Rating::Fail
        }
    }
}

/// Score for one leaf criterion of the rubric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubDimensionScore {
    pub name: String,
    pub max_score: f64,
    /// Always within `[0, max_score]`.
    pub score: f64,
    /// Judge's justification, or the raw reply when parsing failed.
    pub reasoning: String,
    #[serde(default)]
    pub issues: Vec<String>,
}

impl SubDimensionScore {
    pub fn rating(&self) -> Rating {
        Rating::from_ratio(self.score, self.max_score)
    }
}

/// Score for one rubric dimension. `score` is always the sum of its
/// sub-dimension scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionScore {
    pub name: String,
    pub max_score: f64,
    pub score: f64,
    pub sub_dimensions: Vec<SubDimensionScore>,
}

impl DimensionScore {
    /// Builds a dimension from its subs, deriving score and max by summation.
    pub fn from_subs(name: &str, sub_dimensions: Vec<SubDimensionScore>) -> Self {
        let score = sub_dimensions.iter().map(|s| s.score).sum();
        let max_score = sub_dimensions.iter().map(|s| s.max_score).sum();
        Self {
            name: name.to_string(),
            max_score,
            score,
            sub_dimensions,
        }
    }

    pub fn rating(&self) -> Rating {
        Rating::from_ratio(self.score, self.max_score)
    }
}

/// Full report for one session, serialized to
/// `reports/evaluation-report-{timestamp}.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub session_id: String,
    /// RFC 3339 timestamp of the evaluation run.
    pub evaluation_time: String,
    pub total_score: f64,
    pub max_score: f64,
    pub dimensions: Vec<DimensionScore>,
    pub summary: String,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

impl EvaluationReport {
    /// Builds a report from dimensions, deriving the total by summation.
    pub fn from_dimensions(session_id: &str, dimensions: Vec<DimensionScore>) -> Self {
        let total_score = dimensions.iter().map(|d| d.score).sum();
        Self {
            session_id: session_id.to_string(),
            evaluation_time: Utc::now().to_rfc3339(),
            total_score,
            max_score: 100.0,
            dimensions,
            summary: String::new(),
            recommendations: Vec::new(),
        }
    }

    /// All-zero report used when a session did not complete.
    pub fn zeroed(session_id: &str, reason: &str) -> Self {
        let dimensions = crate::evaluation::rubric::RUBRIC
            .iter()
            .map(|dim| {
                let subs = dim
                    .subs
                    .iter()
                    .map(|sub| SubDimensionScore {
                        name: sub.name.to_string(),
                        max_score: sub.max_score,
                        score: 0.0,
                        reasoning: reason.to_string(),
                        issues: Vec::new(),
                    })
                    .collect();
                DimensionScore::from_subs(dim.name, subs)
            })
            .collect();
        let mut report = Self::from_dimensions(session_id, dimensions);
        report.summary = reason.to_string();
        report
    }

    pub fn rating(&self) -> Rating {
        Rating::from_ratio(self.total_score, self.max_score)
    }

    /// Human-readable report for `reports/evaluation-report-{timestamp}.md`.
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# Agent Evaluation Report");
        let _ = writeln!(out);
        let _ = writeln!(out, "**Generated**: {}", self.evaluation_time);
        let _ = writeln!(out, "**Session**: {}", self.session_id);
        let _ = writeln!(out);
        let _ = writeln!(out, "---");
        let _ = writeln!(out);
        let _ = writeln!(out, "## Overall Score");
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "- **Total**: {:.1} / {:.0}",
            self.total_score, self.max_score
        );
        let _ = writeln!(out, "- **Rating**: {}", self.rating());
        let _ = writeln!(out);
        let _ = writeln!(out, "## Dimension Overview");
        let _ = writeln!(out);
        let _ = writeln!(out, "| Dimension | Score | Rating | Weight |");
        let _ = writeln!(out, "|-----------|-------|--------|--------|");
        for dim in &self.dimensions {
            let _ = writeln!(
                out,
                "| {} | {:.1} | {} | {:.0}% |",
                dim.name,
                dim.score,
                dim.rating(),
                dim.max_score
            );
        }
        let _ = writeln!(out);
        let _ = writeln!(out, "---");
        let _ = writeln!(out);
        let _ = writeln!(out, "## Dimension Detail");
        let _ = writeln!(out);
        for dim in &self.dimensions {
            let _ = writeln!(out, "### {} ({:.1} pts)", dim.name, dim.score);
            let _ = writeln!(out);
            for sub in &dim.sub_dimensions {
                let _ = writeln!(out, "**{}**", sub.name);
                let _ = writeln!(out);
                let _ = writeln!(
                    out,
                    "- **Score**: {:.0} / {:.0} ({})",
                    sub.score,
                    sub.max_score,
                    sub.rating()
                );
                let _ = writeln!(out, "- **Reasoning**: {}", sub.reasoning);
                if !sub.issues.is_empty() {
                    let _ = writeln!(out, "- **Issues**:");
                    for issue in &sub.issues {
                        let _ = writeln!(out, "  - {issue}");
                    }
                }
                let _ = writeln!(out);
            }
        }
        if !self.summary.is_empty() {
            let _ = writeln!(out, "## Summary");
            let _ = writeln!(out);
            let _ = writeln!(out, "{}", self.summary);
            let _ = writeln!(out);
        }
        if !self.recommendations.is_empty() {
            let _ = writeln!(out, "## Recommendations");
            let _ = writeln!(out);
            for rec in &self.recommendations {
                let _ = writeln!(out, "- {rec}");
            }
        }
        out
    }
}
