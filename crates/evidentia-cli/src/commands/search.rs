//! `evidentia search`: semantic search over ingested documents.

use crate::bootstrap::Pipeline;
use crate::output::{create_table, print_json, OutputFormat};
use anyhow::{Context, Result};
use clap::Args;
use evidentia_core::api::SearchQuery;
use evidentia_core::model::DocumentType;

/// Search ingested documents by semantic similarity, with optional filters.
#[derive(Args)]
pub struct SearchArgs {
    /// Free-text query.
    text: String,

    /// Restrict to a document type (e.g. `power_of_attorney`, `deed`).
    #[arg(long)]
    document_type: Option<String>,

    /// Restrict to documents linked to this entity id.
    #[arg(long)]
    entity_id: Option<String>,

    /// Maximum number of results.
    #[arg(short, long, default_value_t = 10)]
    limit: usize,

    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,
}

fn parse_document_type(raw: &str) -> Result<DocumentType> {
    serde_json::from_value(serde_json::Value::String(raw.to_string()))
        .with_context(|| format!("unrecognized document type {raw:?}"))
}

pub async fn run(args: SearchArgs, pipeline: &Pipeline) -> Result<()> {
    let document_type = args.document_type.as_deref().map(parse_document_type).transpose()?;

    let query = SearchQuery {
        text: args.text,
        document_type,
        entity_id: args.entity_id,
        date_range: None,
        limit: args.limit,
    };
    let results = pipeline.api.search(&query).await?;

    match args.format {
        OutputFormat::Json => {
            let json_results: Vec<serde_json::Value> = results
                .iter()
                .map(|r| serde_json::json!({"document": r.document, "similarity": r.similarity}))
                .collect();
            print_json(&serde_json::Value::Array(json_results))?
        }
        OutputFormat::Table => {
            let mut table = create_table();
            table.set_header(vec!["id", "filename", "document_type", "similarity"]);
            for result in &results {
                table.add_row(vec![
                    result.document.id.clone(),
                    result.document.filename.clone(),
                    result.document.document_type.map(|t| format!("{t:?}")).unwrap_or_else(|| "-".to_string()),
                    format!("{:.4}", result.similarity),
                ]);
            }
            println!("{table}");
        }
    }
    Ok(())
}
