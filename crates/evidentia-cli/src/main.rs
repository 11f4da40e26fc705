//! Operator CLI for the evidence-ingestion pipeline: submit documents,
//! inspect the knowledge graph, and work the Accuracy Guardian's and
//! Duplicate Hunter's review queues by hand.

use anyhow::Result;
use clap::{Parser, Subcommand};

mod blob_storage;
mod bootstrap;
mod commands;
mod output;

use commands::{authority, duplicates, gaps, get, health, queue, rules, search, submit};
use evidentia_core::config::Config;

/// Operator CLI for the evidentia evidence-ingestion pipeline.
#[derive(Parser)]
#[command(name = "evidentia")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Ingest legal documents into a queryable knowledge graph", long_about = None)]
struct Cli {
    /// Path to a TOML config file (falls back to defaults and env vars).
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a document for ingestion.
    Submit(submit::SubmitArgs),
    /// Fetch a document by id.
    Get(get::GetArgs),
    /// Search ingested documents by semantic similarity.
    Search(search::SearchArgs),
    /// Work with knowledge gaps (list, resolve).
    Gaps(gaps::GapsArgs),
    /// Define and run correction rules.
    Rules(rules::RulesArgs),
    /// Work the correction queue (list, approve, reject, bulk-apply).
    Queue(queue::QueueArgs),
    /// Work flagged duplicate candidates (list, confirm, reject, scan-full).
    Duplicates(duplicates::DuplicatesArgs),
    /// Find the shortest authority-grant chain between two entities.
    AuthorityPath(authority::AuthorityArgs),
    /// Report component liveness and queue depths.
    Health(health::HealthArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;
    let pipeline = bootstrap::connect(&config).await?;

    match cli.command {
        Commands::Submit(args) => submit::run(args, &pipeline).await,
        Commands::Get(args) => get::run(args, &pipeline).await,
        Commands::Search(args) => search::run(args, &pipeline).await,
        Commands::Gaps(args) => gaps::run(args.command, &pipeline).await,
        Commands::Rules(args) => rules::run(args.command, &pipeline).await,
        Commands::Queue(args) => queue::run(args.command, &pipeline).await,
        Commands::Duplicates(args) => duplicates::run(args.command, &pipeline).await,
        Commands::AuthorityPath(args) => authority::run(args, &pipeline).await,
        Commands::Health(args) => health::run(args, &pipeline).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clap_parses_known_subcommands() {
        let cli = Cli::try_parse_from(["evidentia", "health"]).expect("parse health");
        assert!(matches!(cli.command, Commands::Health(_)));

        let cli = Cli::try_parse_from(["evidentia", "get", "doc-1"]).expect("parse get");
        assert!(matches!(cli.command, Commands::Get(_)));

        let cli = Cli::try_parse_from(["evidentia", "gaps", "list"]).expect("parse gaps list");
        assert!(matches!(cli.command, Commands::Gaps(_)));
    }

    #[test]
    fn clap_enforces_required_args() {
        assert!(Cli::try_parse_from(["evidentia", "get"]).is_err());
        assert!(Cli::try_parse_from(["evidentia", "submit"]).is_err());
        assert!(Cli::try_parse_from(["evidentia", "authority-path", "a"]).is_err());
    }
}
