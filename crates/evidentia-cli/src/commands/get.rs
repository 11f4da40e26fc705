//! `evidentia get`: fetch a document by id.

use crate::bootstrap::Pipeline;
use crate::output::{create_table, print_json, OutputFormat};
use anyhow::{bail, Result};
use clap::Args;

/// Fetch a document by id.
#[derive(Args)]
pub struct GetArgs {
    /// Document id.
    id: String,

    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,
}

pub async fn run(args: GetArgs, pipeline: &Pipeline) -> Result<()> {
    let Some(document) = pipeline.api.get_document(&args.id).await? else {
        bail!("no document with id {}", args.id);
    };

    match args.format {
        OutputFormat::Json => print_json(&serde_json::to_value(&document)?)?,
        OutputFormat::Table => {
            let mut table = create_table();
            table.set_header(vec!["field", "value"]);
            table.add_row(vec!["id", &document.id]);
            table.add_row(vec!["filename", &document.filename]);
            table.add_row(vec!["status", &format!("{:?}", document.status)]);
            table.add_row(vec![
                "document_type",
                &document.document_type.map(|t| format!("{t:?}")).unwrap_or_else(|| "-".to_string()),
            ]);
            table.add_row(vec!["size_bytes", &document.size_bytes.to_string()]);
            table.add_row(vec!["uploader", &document.uploader]);
            table.add_row(vec!["created_at", &document.created_at.to_rfc3339()]);
            if let Some(ref failed_step) = document.last_failed_step {
                table.add_row(vec!["last_failed_step", failed_step]);
            }
            println!("{table}");
        }
    }
    Ok(())
}
