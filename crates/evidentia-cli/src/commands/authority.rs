//! `evidentia authority-path`: shortest authority-grant chain between two entities.

use crate::bootstrap::Pipeline;
use crate::output::{create_table, print_info, print_json, OutputFormat};
use anyhow::{Context, Result};
use clap::Args;
use chrono::NaiveDate;

/// Find the shortest chain of authority grants between two entities.
#[derive(Args)]
pub struct AuthorityArgs {
    from_entity_id: String,
    to_entity_id: String,

    /// Evaluate the chain as of this date (`YYYY-MM-DD`); defaults to today.
    #[arg(long)]
    as_of: Option<String>,

    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,
}

pub async fn run(args: AuthorityArgs, pipeline: &Pipeline) -> Result<()> {
    let as_of = args
        .as_of
        .as_deref()
        .map(|raw| NaiveDate::parse_from_str(raw, "%Y-%m-%d"))
        .transpose()
        .context("--as-of must be YYYY-MM-DD")?;

    let path = pipeline.api.authority_path(&args.from_entity_id, &args.to_entity_id, as_of).await?;

    let Some(grants) = path else {
        print_info(&format!("no authority chain from {} to {}", args.from_entity_id, args.to_entity_id));
        return Ok(());
    };

    match args.format {
        OutputFormat::Json => print_json(&serde_json::to_value(&grants)?)?,
        OutputFormat::Table => {
            let mut table = create_table();
            table.set_header(vec!["grant_id", "grantor_entity_id", "grantee_entity_id", "grant_type", "document_id"]);
            for grant in &grants {
                table.add_row(vec![
                    grant.id.clone(),
                    grant.grantor_entity_id.clone(),
                    grant.grantee_entity_id.clone(),
                    grant.grant_type.clone(),
                    grant.document_id.clone(),
                ]);
            }
            println!("{table}");
        }
    }
    Ok(())
}
