//! `evidentia gaps`: list and resolve knowledge gaps.

use crate::bootstrap::Pipeline;
use crate::output::{create_table, print_json, print_success, OutputFormat};
use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use evidentia_core::model::GapCandidateSource;

#[derive(Args)]
pub struct GapsArgs {
    #[command(subcommand)]
    pub command: GapsCommand,
}

#[derive(Subcommand)]
pub enum GapsCommand {
    /// List knowledge gaps.
    List(ListArgs),
    /// Resolve a gap with a value.
    Resolve(ResolveArgs),
}

#[derive(Args)]
pub struct ListArgs {
    /// Restrict to a gap status (e.g. `open`, `pending_review`, `resolved`, `unresolvable`).
    #[arg(long)]
    status: Option<String>,

    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,
}

#[derive(Args)]
pub struct ResolveArgs {
    /// Gap id.
    gap_id: String,
    /// The resolved value.
    value: String,
    /// Where this value came from.
    #[arg(long, default_value = "user_input")]
    source: String,
    /// Document that supplied the resolution, if any.
    #[arg(long)]
    source_document: Option<String>,
}

fn parse_gap_status(raw: &str) -> Result<evidentia_core::model::GapStatus> {
    serde_json::from_value(serde_json::Value::String(raw.to_string())).with_context(|| format!("unrecognized gap status {raw:?}"))
}

fn parse_gap_candidate_source(raw: &str) -> Result<GapCandidateSource> {
    serde_json::from_value(serde_json::Value::String(raw.to_string())).with_context(|| format!("unrecognized gap candidate source {raw:?}"))
}

pub async fn run(command: GapsCommand, pipeline: &Pipeline) -> Result<()> {
    match command {
        GapsCommand::List(args) => list(args, pipeline).await,
        GapsCommand::Resolve(args) => resolve(args, pipeline).await,
    }
}

async fn list(args: ListArgs, pipeline: &Pipeline) -> Result<()> {
    let status = args.status.as_deref().map(parse_gap_status).transpose()?;
    let gaps = pipeline.api.list_gaps(status).await?;

    match args.format {
        OutputFormat::Json => print_json(&serde_json::to_value(&gaps)?)?,
        OutputFormat::Table => {
            let mut table = create_table();
            table.set_header(vec!["id", "gap_type", "partial_value", "status", "occurrences"]);
            for gap in &gaps {
                table.add_row(vec![
                    gap.id.clone(),
                    format!("{:?}", gap.gap_type),
                    gap.partial_value.clone(),
                    format!("{:?}", gap.status),
                    gap.occurrence_count.to_string(),
                ]);
            }
            println!("{table}");
        }
    }
    Ok(())
}

async fn resolve(args: ResolveArgs, pipeline: &Pipeline) -> Result<()> {
    let source_type = parse_gap_candidate_source(&args.source)?;
    let report = pipeline
        .api
        .resolve_gap(&args.gap_id, &args.value, source_type, args.source_document.as_deref())
        .await?;
    print_success(&format!(
        "resolved {}: {} document(s), {} field(s), {} entit(y/ies) created, {} authorit(y/ies) updated",
        args.gap_id, report.documents_updated, report.fields_updated, report.entities_created, report.authorities_updated
    ));
    Ok(())
}
