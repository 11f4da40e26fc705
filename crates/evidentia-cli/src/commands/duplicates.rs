//! `evidentia duplicates`: list, confirm, and reject flagged
//! duplicate candidate pairs, or run a full-corpus rescan.

use crate::bootstrap::Pipeline;
use crate::output::{create_table, print_json, print_success, OutputFormat};
use anyhow::{Context, Result};
use clap::{Args, Subcommand};

#[derive(Args)]
pub struct DuplicatesArgs {
    #[command(subcommand)]
    pub command: DuplicatesCommand,
}

#[derive(Subcommand)]
pub enum DuplicatesCommand {
    /// List flagged duplicate candidate pairs.
    List(ListArgs),
    /// Confirm a flagged pair as a true duplicate, triggering a merge.
    ///
    /// `review_item_id` is the id of the pair's entry in the review
    /// queue, not the document pair itself.
    Confirm(ItemArgs),
    /// Reject a flagged pair as not a duplicate.
    Reject(ItemArgs),
    /// Run a full-corpus duplicate scan.
    ScanFull,
}

#[derive(Args)]
pub struct ListArgs {
    /// Restrict to a duplicate status (`pending`, `confirmed_duplicate`, `merged`, `not_duplicate`).
    #[arg(long)]
    status: Option<String>,

    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,
}

#[derive(Args)]
pub struct ItemArgs {
    review_item_id: String,
}

fn parse_duplicate_status(raw: &str) -> Result<evidentia_core::model::DuplicateStatus> {
    serde_json::from_value(serde_json::Value::String(raw.to_string())).with_context(|| format!("unrecognized duplicate status {raw:?}"))
}

pub async fn run(command: DuplicatesCommand, pipeline: &Pipeline) -> Result<()> {
    match command {
        DuplicatesCommand::List(args) => list(args, pipeline).await,
        DuplicatesCommand::Confirm(args) => {
            pipeline.api.confirm_duplicate(&args.review_item_id).await?;
            print_success(&format!("confirmed {} as a duplicate, merge triggered", args.review_item_id));
            Ok(())
        }
        DuplicatesCommand::Reject(args) => {
            pipeline.api.reject_duplicate(&args.review_item_id).await?;
            print_success(&format!("rejected {} as not a duplicate", args.review_item_id));
            Ok(())
        }
        DuplicatesCommand::ScanFull => scan_full(pipeline).await,
    }
}

async fn list(args: ListArgs, pipeline: &Pipeline) -> Result<()> {
    let status = args.status.as_deref().map(parse_duplicate_status).transpose()?;
    let candidates = pipeline.api.list_duplicates(status).await?;
    print_candidates(&candidates, args.format)
}

async fn scan_full(pipeline: &Pipeline) -> Result<()> {
    let candidates = pipeline.api.scan_duplicates_full().await?;
    print_success(&format!("scan flagged {} candidate pair(s)", candidates.len()));
    print_candidates(&candidates, OutputFormat::Table)
}

fn print_candidates(candidates: &[evidentia_core::model::DuplicateCandidate], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(&serde_json::to_value(candidates)?)?,
        OutputFormat::Table => {
            let mut table = create_table();
            table.set_header(vec!["document_id", "candidate_document_id", "method", "similarity", "status"]);
            for candidate in candidates {
                table.add_row(vec![
                    candidate.document_id.clone(),
                    candidate.candidate_document_id.clone(),
                    format!("{:?}", candidate.method),
                    format!("{:.4}", candidate.similarity_score),
                    format!("{:?}", candidate.status),
                ]);
            }
            println!("{table}");
        }
    }
    Ok(())
}
