use anyhow::{Context, Result};
use scena_core::session::{BudgetPolicy, SessionConfig, SessionMode};
use scena_execution::SessionRunner;
use scena_infrastructure::DirPersonaRepository;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::{client_for, npc_endpoint, student_endpoint, UnusedClient};

pub struct SimulateArgs {
    pub cards: PathBuf,
    pub persona: String,
    pub mode: String,
    pub output: PathBuf,
    pub max_rounds_per_card: u32,
    pub total_max_rounds: u32,
    pub budget_policy: String,
    pub save_logs: bool,
    pub cancel: CancellationToken,
}

pub async fn run(args: SimulateArgs) -> Result<()> {
    let mode: SessionMode = args
        .mode
        .parse()
        .map_err(|_| anyhow::anyhow!("unknown mode: {}", args.mode))?;
    let budget_policy: BudgetPolicy = args
        .budget_policy
        .parse()
        .map_err(|_| anyhow::anyhow!("unknown budget policy: {}", args.budget_policy))?;

    let mut config = SessionConfig::new(npc_endpoint(), student_endpoint());
    config.mode = mode;
    config.persona_id = args.persona;
    config.max_rounds_per_card = args.max_rounds_per_card;
    config.total_max_rounds = args.total_max_rounds;
    config.output_dir = args.output;
    config.save_logs = args.save_logs;
    config.budget_policy = budget_policy;

    let npc_client = client_for(config.npc_endpoint.clone())
        .context("NPC endpoint (NPC_API_URL / SCENA_API_URL)")?;
    let student_client: Arc<dyn scena_interaction::ChatCompletion> =
        if mode == SessionMode::Manual {
            Arc::new(UnusedClient)
        } else {
            client_for(config.student_endpoint.clone())
                .context("student endpoint (STUDENT_API_URL / SCENA_API_URL)")?
        };

    let repo = Arc::new(DirPersonaRepository::new()?);
    let mut runner = SessionRunner::new(config, repo, npc_client, student_client);
    runner.load_cards(&args.cards).await?;
    runner.setup().await?;

    let log = runner.run(&args.cancel).await?;
    let summary = log.summary.as_ref();
    println!("session {} finished", log.session_id);
    if let Some(summary) = summary {
        println!("  status: {}", summary.status);
        println!("  turns:  {}", summary.total_turns);
        println!("  cards:  {}", log.cards_used.join(", "));
    }
    Ok(())
}
