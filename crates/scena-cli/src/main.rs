use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "scena")]
#[command(about = "SCENA - staged conversation simulation and assessment", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a simulated session against a cards document
    Simulate {
        /// Path to the cards Markdown document
        #[arg(long)]
        cards: PathBuf,
        /// Persona id (preset or custom)
        #[arg(long, default_value = "excellent")]
        persona: String,
        /// Session mode: auto, manual, or hybrid
        #[arg(long, default_value = "auto")]
        mode: String,
        /// Artifact output directory
        #[arg(long, default_value = "scena_output")]
        output: PathBuf,
        /// Round cap per dialogue card
        #[arg(long, default_value_t = 10)]
        max_rounds_per_card: u32,
        /// Session-wide round cap
        #[arg(long, default_value_t = 100)]
        total_max_rounds: u32,
        /// Budget policy: advance, abort, or retry_once
        #[arg(long, default_value = "advance")]
        budget_policy: String,
        /// Skip writing session logs
        #[arg(long)]
        no_save: bool,
    },
    /// Evaluate a previously recorded session log
    Evaluate {
        /// Path to a session_*.json log file
        #[arg(long)]
        log: PathBuf,
        /// Artifact output directory
        #[arg(long, default_value = "scena_output")]
        output: PathBuf,
    },
    /// Simulate and evaluate in one pass, exporting an optimizer score
    ClosedLoop {
        /// Path to the cards Markdown document
        #[arg(long)]
        cards: PathBuf,
        /// Comma-separated persona ids; several run in parallel
        #[arg(long, default_value = "excellent")]
        personas: String,
        /// Artifact output directory
        #[arg(long, default_value = "scena_output")]
        output: PathBuf,
        /// Round cap per dialogue card
        #[arg(long, default_value_t = 5)]
        max_rounds_per_card: u32,
        /// Session-wide round cap
        #[arg(long, default_value_t = 50)]
        total_max_rounds: u32,
    },
    /// List available personas
    Personas,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cancel = CancellationToken::new();
    let ctrl_c_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, finishing up");
            ctrl_c_token.cancel();
        }
    });

    let cli = Cli::parse();
    match cli.command {
        Commands::Simulate {
            cards,
            persona,
            mode,
            output,
            max_rounds_per_card,
            total_max_rounds,
            budget_policy,
            no_save,
        } => {
            commands::simulate::run(commands::simulate::SimulateArgs {
                cards,
                persona,
                mode,
                output,
                max_rounds_per_card,
                total_max_rounds,
                budget_policy,
                save_logs: !no_save,
                cancel,
            })
            .await
        }
        Commands::Evaluate { log, output } => commands::evaluate::run(&log, &output).await,
        Commands::ClosedLoop {
            cards,
            personas,
            output,
            max_rounds_per_card,
            total_max_rounds,
        } => {
            commands::closed_loop::run(
                &cards,
                &personas,
                &output,
                max_rounds_per_card,
                total_max_rounds,
                cancel,
            )
            .await
        }
        Commands::Personas => commands::personas::run().await,
    }
}
