//! Error taxonomy for the evidence-ingestion pipeline.
//!
//! Every fallible operation in this crate returns [`Error`]. Call sites that
//! need to decide whether to retry a failed workflow step consult
//! [`Error::is_retryable`] rather than re-deriving the classification from
//! the variant name.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// The error taxonomy described in spec §7.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Ingestion-time failure writing the uploaded bytes to blob storage.
    #[error("ingestion failed: {0}")]
    Ingestion(String),

    /// A write to the Knowledge Graph Store failed.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// OCR step exhausted its retry budget or failed terminally.
    #[error("OCR failed for document {document_id}: {reason}")]
    OcrFailed {
        /// Document the OCR step was processing.
        document_id: String,
        /// Human-readable cause.
        reason: String,
    },

    /// Classification/extraction step could not produce structured output.
    #[error("extraction failed for document {document_id}: {reason}")]
    ExtractionFailed {
        /// Document the extraction step was processing.
        document_id: String,
        /// Human-readable cause.
        reason: String,
    },

    /// Extracted output contained a placeholder with no matching
    /// `unknowns[]` entry (spec §4.3).
    #[error("extraction schema violation for document {document_id}: {reason}")]
    ExtractionSchemaViolation {
        /// Document the extraction step was processing.
        document_id: String,
        /// Which placeholder/field violated the contract.
        reason: String,
    },

    /// Embedding generation failed.
    #[error("embedding failed for document {document_id}: {reason}")]
    EmbeddingFailed {
        /// Document the embedding step was processing.
        document_id: String,
        /// Human-readable cause.
        reason: String,
    },

    /// Vector index upsert failed.
    #[error("vector upsert failed for document {document_id}: {reason}")]
    VectorUpsertFailed {
        /// Document whose vector record failed to upsert.
        document_id: String,
        /// Human-readable cause.
        reason: String,
    },

    /// Concurrent entity merges conflicted; retried a bounded number of
    /// times before being surfaced.
    #[error("entity merge conflict between {winner} and {loser}: {reason}")]
    EntityMergeConflict {
        /// Id of the entity the merge would have kept.
        winner: String,
        /// Id of the entity the merge would have retired.
        loser: String,
        /// Human-readable cause.
        reason: String,
    },

    /// Concurrent grant supersession conflicted.
    #[error("grant supersession conflict for grant {grant_id}: {reason}")]
    GrantSupersessionConflict {
        /// Grant whose supersession could not be committed.
        grant_id: String,
        /// Human-readable cause.
        reason: String,
    },

    /// A single correction failed to apply; does not abort the batch.
    #[error("correction apply failed for item {item_id}: {reason}")]
    CorrectionApplyFailed {
        /// Queue item that failed to apply.
        item_id: String,
        /// Human-readable cause.
        reason: String,
    },

    /// A step exceeded its configured timeout.
    #[error("step {step} timed out after {elapsed_ms}ms")]
    StepTimeout {
        /// Name of the step that timed out.
        step: String,
        /// How long the step ran before being aborted.
        elapsed_ms: u64,
    },

    /// A deadline attached to an external call was exceeded.
    #[error("deadline exceeded calling {operation}")]
    DeadlineExceeded {
        /// Name of the operation whose deadline elapsed.
        operation: String,
    },

    /// Requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Caller-supplied input failed validation.
    #[error("validation error: {0}")]
    Validation(String),

    /// Configuration failed to load or validate.
    #[error("configuration error: {0}")]
    Config(String),

    /// An external collaborator (vision/LLM backend, embedding backend,
    /// blob storage) returned a fallible, typed failure.
    #[error("collaborator error ({collaborator}): {reason}")]
    Collaborator {
        /// Name of the external collaborator.
        collaborator: String,
        /// Human-readable cause.
        reason: String,
    },
}

impl Error {
    /// Whether the workflow engine should retry the step that produced this
    /// error, subject to the step's remaining retry budget.
    ///
    /// Terminal errors (schema violations, validation failures, not-found)
    /// are never retried even if the budget is not exhausted.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::OcrFailed { .. }
                | Error::ExtractionFailed { .. }
                | Error::EmbeddingFailed { .. }
                | Error::VectorUpsertFailed { .. }
                | Error::StepTimeout { .. }
                | Error::DeadlineExceeded { .. }
                | Error::Collaborator { .. }
        )
    }
}
