//! `evidentia health`: report component liveness and queue depths.

use crate::bootstrap::Pipeline;
use crate::output::{create_table, print_json, OutputFormat};
use anyhow::Result;
use clap::Args;

#[derive(Args)]
pub struct HealthArgs {
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,
}

pub async fn run(args: HealthArgs, pipeline: &Pipeline) -> Result<()> {
    let report = pipeline.api.health().await?;

    match args.format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "pending_documents": report.pending_documents,
            "processing_documents": report.processing_documents,
            "failed_documents": report.failed_documents,
            "open_gaps": report.open_gaps,
            "open_review_items": report.open_review_items,
            "pending_correction_items": report.pending_correction_items,
        }))?,
        OutputFormat::Table => {
            let mut table = create_table();
            table.set_header(vec!["metric", "count"]);
            table.add_row(vec!["pending_documents".to_string(), report.pending_documents.to_string()]);
            table.add_row(vec!["processing_documents".to_string(), report.processing_documents.to_string()]);
            table.add_row(vec!["failed_documents".to_string(), report.failed_documents.to_string()]);
            table.add_row(vec!["open_gaps".to_string(), report.open_gaps.to_string()]);
            table.add_row(vec!["open_review_items".to_string(), report.open_review_items.to_string()]);
            table.add_row(vec!["pending_correction_items".to_string(), report.pending_correction_items.to_string()]);
            println!("{table}");
        }
    }
    Ok(())
}
