//! `evidentia rules`: define, activate, and run correction rules.

use crate::bootstrap::Pipeline;
use crate::output::print_success;
use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use evidentia_core::model::{CorrectionType, CorrectionValueSpec, DocumentType, MatchCriteria};

#[derive(Args)]
pub struct RulesArgs {
    #[command(subcommand)]
    pub command: RulesCommand,
}

#[derive(Subcommand)]
pub enum RulesCommand {
    /// Define a new correction rule (starts in draft status).
    Create(CreateArgs),
    /// Activate a draft rule so `apply` can queue corrections for it.
    Activate(ActivateArgs),
    /// Run a rule, queuing proposed corrections for matching documents.
    Apply(ApplyArgs),
}

#[derive(Args)]
pub struct CreateArgs {
    /// Human-readable rule name.
    name: String,
    /// Free-form rule category (e.g. `date_extraction`).
    rule_type: String,
    /// How the correction value is computed.
    #[arg(long, value_enum)]
    correction_type: CliCorrectionType,
    /// Literal replacement value (for `replace`).
    #[arg(long)]
    value: Option<String>,
    /// Regex pattern to match (for `regex`).
    #[arg(long)]
    pattern: Option<String>,
    /// Regex replacement template (for `regex`).
    #[arg(long)]
    replacement: Option<String>,
    /// Restrict to documents of this type.
    #[arg(long)]
    document_type: Option<String>,
    /// Restrict to documents with an entity name containing this substring.
    #[arg(long)]
    entity_name_like: Option<String>,
    /// Restrict to documents with this field path present.
    #[arg(long)]
    field_path: Option<String>,
    /// Require explicit review approval before `bulk-apply` acts on queued items.
    #[arg(long)]
    requires_approval: bool,
}

#[derive(Args)]
pub struct ActivateArgs {
    rule_id: String,
}

#[derive(Args)]
pub struct ApplyArgs {
    rule_id: String,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum CliCorrectionType {
    Replace,
    Regex,
    AiReextract,
    ManualReview,
}

impl From<CliCorrectionType> for CorrectionType {
    fn from(value: CliCorrectionType) -> Self {
        match value {
            CliCorrectionType::Replace => CorrectionType::Replace,
            CliCorrectionType::Regex => CorrectionType::Regex,
            CliCorrectionType::AiReextract => CorrectionType::AiReextract,
            CliCorrectionType::ManualReview => CorrectionType::ManualReview,
        }
    }
}

fn parse_document_type(raw: &str) -> Result<DocumentType> {
    serde_json::from_value(serde_json::Value::String(raw.to_string())).with_context(|| format!("unrecognized document type {raw:?}"))
}

pub async fn run(command: RulesCommand, pipeline: &Pipeline) -> Result<()> {
    match command {
        RulesCommand::Create(args) => create(args, pipeline).await,
        RulesCommand::Activate(args) => activate(args, pipeline).await,
        RulesCommand::Apply(args) => apply(args, pipeline).await,
    }
}

async fn create(args: CreateArgs, pipeline: &Pipeline) -> Result<()> {
    let correction_type: CorrectionType = args.correction_type.into();
    let correction_value = match correction_type {
        CorrectionType::Replace => {
            let Some(value) = args.value else { bail!("--value is required for a replace correction") };
            CorrectionValueSpec::Literal { value }
        }
        CorrectionType::Regex => {
            let (Some(pattern), Some(replacement)) = (args.pattern, args.replacement) else {
                bail!("--pattern and --replacement are required for a regex correction")
            };
            CorrectionValueSpec::Regex { pattern, replacement }
        }
        CorrectionType::AiReextract | CorrectionType::ManualReview => CorrectionValueSpec::None,
    };

    let match_criteria = MatchCriteria {
        document_type: args.document_type.as_deref().map(parse_document_type).transpose()?,
        date_range: None,
        entity_name_like: args.entity_name_like,
        field_path: args.field_path,
    };

    let rule = pipeline
        .api
        .create_rule(&args.name, &args.rule_type, match_criteria, correction_type, correction_value, args.requires_approval)
        .await?;
    print_success(&format!("created rule {} ({})", rule.id, rule.name));
    Ok(())
}

async fn activate(args: ActivateArgs, pipeline: &Pipeline) -> Result<()> {
    pipeline.api.activate_rule(&args.rule_id).await?;
    print_success(&format!("activated rule {}", args.rule_id));
    Ok(())
}

async fn apply(args: ApplyArgs, pipeline: &Pipeline) -> Result<()> {
    let queued = pipeline.api.apply_rule(&args.rule_id).await?;
    print_success(&format!("rule {} queued {} correction(s)", args.rule_id, queued));
    Ok(())
}
