use anyhow::{Context, Result};
use scena_execution::{ClosedLoopDriver, ClosedLoopOptions};
use scena_infrastructure::DirPersonaRepository;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::{client_for, judge_endpoint, npc_endpoint, student_endpoint};

pub async fn run(
    cards: &Path,
    personas: &str,
    output: &Path,
    max_rounds_per_card: u32,
    total_max_rounds: u32,
    cancel: CancellationToken,
) -> Result<()> {
    let cards_text = tokio::fs::read_to_string(cards)
        .await
        .with_context(|| format!("reading cards document {}", cards.display()))?;

    let persona_ids: Vec<String> = personas
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect();

    let mut options = ClosedLoopOptions::new(
        cards_text,
        output.to_path_buf(),
        npc_endpoint(),
        student_endpoint(),
    );
    options.persona_ids = persona_ids;
    options.max_rounds_per_card = max_rounds_per_card;
    options.total_max_rounds = total_max_rounds;

    let driver = ClosedLoopDriver::new(
        Arc::new(DirPersonaRepository::new()?),
        client_for(options.npc_endpoint.clone())
            .context("NPC endpoint (NPC_API_URL / SCENA_API_URL)")?,
        client_for(options.student_endpoint.clone())
            .context("student endpoint (STUDENT_API_URL / SCENA_API_URL)")?,
        client_for(judge_endpoint())
            .context("judge endpoint (EVALUATOR_API_URL / SCENA_API_URL)")?,
    );

    let outcome = driver.run(&options, &cancel).await?;
    println!("closed loop finished");
    println!("  total score: {:.1}", outcome.total_score);
    for (persona_id, score) in &outcome.persona_scores {
        println!("  {persona_id}: {score:.1}");
    }
    println!("  export: {}", outcome.score_path.display());
    Ok(())
}
