//! `evidentia queue`: list, approve, reject, and bulk-apply correction
//! queue items.

use crate::bootstrap::Pipeline;
use crate::output::{create_table, print_json, print_success, OutputFormat};
use anyhow::{Context, Result};
use clap::{Args, Subcommand};

#[derive(Args)]
pub struct QueueArgs {
    #[command(subcommand)]
    pub command: QueueCommand,
}

#[derive(Subcommand)]
pub enum QueueCommand {
    /// List correction queue items.
    List(ListArgs),
    /// Approve a pending item.
    Approve(ItemArgs),
    /// Reject a pending item.
    Reject(ItemArgs),
    /// Apply every approved item that doesn't require manual review.
    BulkApply,
}

#[derive(Args)]
pub struct ListArgs {
    /// Restrict to a queue status (`pending`, `approved`, `applied`, `rejected`, `skipped`).
    #[arg(long)]
    status: Option<String>,

    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,
}

#[derive(Args)]
pub struct ItemArgs {
    item_id: String,
}

fn parse_queue_status(raw: &str) -> Result<evidentia_core::model::CorrectionQueueStatus> {
    serde_json::from_value(serde_json::Value::String(raw.to_string())).with_context(|| format!("unrecognized queue status {raw:?}"))
}

pub async fn run(command: QueueCommand, pipeline: &Pipeline) -> Result<()> {
    match command {
        QueueCommand::List(args) => list(args, pipeline).await,
        QueueCommand::Approve(args) => {
            pipeline.api.approve_queue_item(&args.item_id).await?;
            print_success(&format!("approved {}", args.item_id));
            Ok(())
        }
        QueueCommand::Reject(args) => {
            pipeline.api.reject_queue_item(&args.item_id).await?;
            print_success(&format!("rejected {}", args.item_id));
            Ok(())
        }
        QueueCommand::BulkApply => bulk_apply(pipeline).await,
    }
}

async fn list(args: ListArgs, pipeline: &Pipeline) -> Result<()> {
    let status = args.status.as_deref().map(parse_queue_status).transpose()?;
    let items = pipeline.api.list_queue(status).await?;

    match args.format {
        OutputFormat::Json => print_json(&serde_json::to_value(&items)?)?,
        OutputFormat::Table => {
            let mut table = create_table();
            table.set_header(vec!["id", "rule_id", "document_id", "field_path", "status", "confidence"]);
            for item in &items {
                table.add_row(vec![
                    item.id.clone(),
                    item.rule_id.clone(),
                    item.document_id.clone(),
                    item.field_path.clone(),
                    format!("{:?}", item.status),
                    format!("{:.2}", item.confidence),
                ]);
            }
            println!("{table}");
        }
    }
    Ok(())
}

async fn bulk_apply(pipeline: &Pipeline) -> Result<()> {
    let report = pipeline.api.bulk_apply().await?;
    print_success(&format!("applied {}, skipped {}", report.applied, report.skipped));
    Ok(())
}
