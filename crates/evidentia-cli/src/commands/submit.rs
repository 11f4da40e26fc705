//! `evidentia submit`: ingest a document.

use crate::bootstrap::Pipeline;
use crate::output::{print_info, print_success};
use anyhow::{Context, Result};
use clap::Args;
use evidentia_core::ingestion::SubmitOutcome;
use std::path::PathBuf;

/// Submit a document for ingestion.
#[derive(Args)]
pub struct SubmitArgs {
    /// Path to the document file (PDF or image).
    path: PathBuf,

    /// Identity recorded as the uploader.
    #[arg(short, long, default_value = "cli")]
    uploader: String,

    /// MIME type override; guessed from the file extension if omitted.
    #[arg(long)]
    mime_type: Option<String>,
}

fn guess_mime_type(path: &std::path::Path) -> String {
    match path.extension().and_then(|e| e.to_str()).map(str::to_lowercase).as_deref() {
        Some("pdf") => "application/pdf",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("tif" | "tiff") => "image/tiff",
        _ => "application/octet-stream",
    }
    .to_string()
}

pub async fn run(args: SubmitArgs, pipeline: &Pipeline) -> Result<()> {
    let bytes = std::fs::read(&args.path).with_context(|| format!("reading {}", args.path.display()))?;
    let filename = args.path.file_name().and_then(|n| n.to_str()).unwrap_or("document").to_string();
    let mime_type = args.mime_type.clone().unwrap_or_else(|| guess_mime_type(&args.path));

    let outcome = pipeline.api.submit_document(&bytes, &filename, &mime_type, &args.uploader).await?;
    match outcome {
        SubmitOutcome::Created(document) => {
            print_success(&format!("submitted {} ({} bytes), queued for processing", document.id, document.size_bytes));
        }
        SubmitOutcome::AlreadyExists(document) => {
            print_info(&format!("identical content already ingested as {}", document.id));
        }
    }
    Ok(())
}
