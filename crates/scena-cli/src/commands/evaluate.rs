use anyhow::{Context, Result};
use scena_execution::Evaluator;
use scena_infrastructure::{LogStore, ReportStore};
use std::path::Path;

use super::{client_for, judge_endpoint};

pub async fn run(log_path: &Path, output: &Path) -> Result<()> {
    let log = LogStore::load_from(log_path)
        .await
        .with_context(|| format!("loading session log {}", log_path.display()))?;

    let judge = client_for(judge_endpoint())
        .context("judge endpoint (EVALUATOR_API_URL / SCENA_API_URL)")?;
    let report = Evaluator::new(judge).evaluate(&log).await;

    let json_path = ReportStore::new(output).save(&report).await?;
    println!("evaluated session {}", log.session_id);
    println!("  total:  {:.1} / {:.0}", report.total_score, report.max_score);
    println!("  rating: {}", report.rating());
    println!("  report: {}", json_path.display());
    Ok(())
}
