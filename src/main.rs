use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use outreach_core::accounts::Account;
use outreach_core::config::OutreachConfig;
use outreach_core::logging;
use outreach_core::random::{RandomSource, SeededRandom, ThreadRandom};
use outreach_core::spintax::{self, MergeFields};
use outreach_core::warmup::WarmupGenerator;

#[derive(Debug, Parser)]
#[command(name = "outreach-core", version, about = "Cold-email outreach tooling")]
struct Cli {
    /// Seed for reproducible spins and pairings.
    #[arg(long, global = true, env = "OUTREACH_SEED")]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print one warmup pairing per account.
    Warmup {
        /// JSON array of sender accounts.
        path: PathBuf,
    },
    /// Render a spintax template.
    Spin {
        template: String,
        /// Merge fields as `Name=Value`.
        #[arg(value_parser = parse_field)]
        fields: Vec<(String, String)>,
    },
}

fn parse_field(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected Name=Value, got '{raw}'"))?;
    if name.trim().is_empty() {
        return Err(format!("empty field name in '{raw}'"));
    }
    Ok((name.trim().to_string(), value.to_string()))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Install rustls crypto provider before any TLS usage
    let _ = rustls::crypto::ring::default_provider().install_default();

    let _log_guard = logging::init_tracing();

    let config = OutreachConfig::from_env()?;
    tracing::debug!(
        autopilot = config.agent.autopilot,
        thinking_min = config.thinking_time.min_minutes(),
        thinking_max = config.thinking_time.max_minutes(),
        "Configuration loaded"
    );

    let rng: Arc<dyn RandomSource> = match cli.seed {
        Some(seed) => Arc::new(SeededRandom::new(seed)),
        None => Arc::new(ThreadRandom),
    };

    match cli.command {
        Command::Warmup { path } => {
            let raw = tokio::fs::read_to_string(&path).await?;
            let accounts: Vec<Account> = serde_json::from_str(&raw)?;
            let pairings = WarmupGenerator::new().with_rng(rng).generate(&accounts)?;
            tracing::info!(count = pairings.len(), "Generated warmup pairings");
            println!("{}", serde_json::to_string_pretty(&pairings)?);
        }
        Command::Spin { template, fields } => {
            if let Err(e) = spintax::check_balanced(&template) {
                tracing::warn!(error = %e, "Template has unbalanced braces");
            }
            let fields = fields
                .into_iter()
                .fold(MergeFields::new(), |fields, (name, value)| {
                    fields.with(name, value)
                });
            println!("{}", spintax::render(&template, &fields, rng.as_ref()));
        }
    }

    Ok(())
}
