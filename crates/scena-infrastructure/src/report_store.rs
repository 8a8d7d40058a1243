//! Evaluation report persistence.

use chrono::Local;
use scena_core::evaluation::EvaluationReport;
use scena_core::Result;
use std::path::{Path, PathBuf};

use crate::paths::{write_atomic, ScenaPaths};

/// Writes evaluation reports under `<output_dir>/reports/` in both
/// machine and human formats. File names carry a local timestamp, not the
/// session id, so repeated evaluations of one session never clobber each
/// other.
pub struct ReportStore {
    reports_dir: PathBuf,
}

impl ReportStore {
    pub fn new(output_dir: &Path) -> Self {
        Self {
            reports_dir: ScenaPaths::reports_dir(output_dir),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.reports_dir
    }

    /// Persists both formats and returns the JSON path.
    pub async fn save(&self, report: &EvaluationReport) -> Result<PathBuf> {
        let stamp = Local::now().format("%Y%m%d-%H%M%S");
        let json_path = self
            .reports_dir
            .join(format!("evaluation-report-{stamp}.json"));
        let md_path = self
            .reports_dir
            .join(format!("evaluation-report-{stamp}.md"));

        let json = serde_json::to_string_pretty(report)?;
        write_atomic(&json_path, &json).await?;
        write_atomic(&md_path, &report.to_markdown()).await?;
        tracing::info!(path = %json_path.display(), "evaluation report saved");
        Ok(json_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn save_writes_json_and_markdown() {
        let dir = TempDir::new().unwrap();
        let store = ReportStore::new(dir.path());
        let report = EvaluationReport::zeroed("s1", "no run");
        let json_path = store.save(&report).await.unwrap();

        assert!(json_path.exists());
        let md_path = json_path.with_extension("md");
        assert!(md_path.exists());

        let loaded: EvaluationReport =
            serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
        assert_eq!(loaded.session_id, "s1");
        assert_eq!(loaded.dimensions.len(), 5);
    }
}
