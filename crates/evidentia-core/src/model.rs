//! The relational data model (spec §3). Identifiers are opaque strings,
//! unique within their kind; we mint them as UUIDv4 but never assume the
//! format beyond uniqueness.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Mint a fresh opaque identifier.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// The closed set of document types the extractor can classify into
/// (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    /// Power of attorney (any variant: financial, healthcare, durable, ...).
    PowerOfAttorney,
    /// LLC formation or operating agreement.
    LlcFormation,
    /// Corporate resolution or bylaws.
    CorporateResolution,
    /// Financial or bank statement.
    FinancialStatement,
    /// A bilateral or multilateral contract.
    Contract,
    /// Real property deed.
    Deed,
    /// Trust instrument.
    Trust,
    /// Last will and testament.
    Will,
    /// Court filing of any kind.
    CourtFiling,
    /// Correspondence (letters, emails reduced to PDF, etc.).
    Correspondence,
    /// Anything not covered above.
    Other,
}

/// Document processing status (spec §3 state machine).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    /// Ingested, not yet picked up by the Workflow Engine.
    Pending,
    /// A workflow instance is actively running.
    Processing,
    /// All eight pipeline steps succeeded.
    Completed,
    /// A step failed terminally.
    Failed,
    /// Replaced by a newer document covering the same
    /// (grantor, grantee, authority-type) triple, or merged away as a
    /// duplicate.
    Superseded,
}

/// A single ingested document and everything the pipeline has learned
/// about it so far.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Opaque document id.
    pub id: String,
    /// SHA-256 content hash of the uploaded bytes, hex-encoded.
    pub content_hash: String,
    /// Opaque storage key for the uploaded bytes (content-addressed,
    /// write-once; spec §6 "Persisted state layout").
    pub storage_key: String,
    /// Original filename as uploaded.
    pub filename: String,
    /// MIME type as uploaded.
    pub mime_type: String,
    /// Size in bytes.
    pub size_bytes: u64,
    /// Classified document type, once the Classification step has run.
    pub document_type: Option<DocumentType>,
    /// Raw OCR text, once the OCR step has run.
    pub ocr_text: Option<String>,
    /// 64-bit perceptual hash of the rendered page(s), once the OCR step
    /// has run. Used by the Duplicate Hunter's `phash` method (spec
    /// §4.5).
    pub perceptual_hash: Option<u64>,
    /// Extracted structured data blob, once Classification has run.
    pub extracted_data: Option<serde_json::Value>,
    /// Processing status.
    pub status: ProcessingStatus,
    /// Id of the document this one supersedes, if any.
    pub supersedes: Option<String>,
    /// Id of the document that superseded this one, if any.
    pub superseded_by: Option<String>,
    /// Last workflow step that failed, for diagnosis (spec §7).
    pub last_failed_step: Option<String>,
    /// Uploader identity, as supplied by the caller (opaque to this
    /// crate — auth/identity is an external collaborator, spec §6).
    pub uploader: String,
    /// Creation timestamp.
    pub created_at: chrono::DateTime<chrono::Utc>,
    /// Last-update timestamp.
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl Document {
    /// Construct a freshly-ingested document in `pending` status.
    pub fn new_pending(
        content_hash: String,
        storage_key: String,
        filename: String,
        mime_type: String,
        size_bytes: u64,
        uploader: String,
    ) -> Self {
        let now = chrono::Utc::now();
        Self {
            id: new_id(),
            content_hash,
            storage_key,
            filename,
            mime_type,
            size_bytes,
            document_type: None,
            ocr_text: None,
            perceptual_hash: None,
            extracted_data: None,
            status: ProcessingStatus::Pending,
            supersedes: None,
            superseded_by: None,
            last_failed_step: None,
            uploader,
            created_at: now,
            updated_at: now,
        }
    }
}

/// The kind of legal entity (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Natural person.
    Person,
    /// Limited liability company.
    Llc,
    /// Corporation.
    Corporation,
    /// Trust.
    Trust,
    /// Partnership.
    Partnership,
    /// Estate.
    Estate,
}

/// A resolved party referenced by documents, grants, or gaps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    /// Opaque entity id.
    pub id: String,
    /// Kind of entity.
    pub kind: EntityKind,
    /// Display name as extracted.
    pub name: String,
    /// Lowercased, whitespace-collapsed name, used for matching (spec §3).
    pub normalized_name: String,
    /// Known identifiers (EIN, SSN-last-4, state filing number, ...),
    /// keyed by identifier kind.
    pub identifiers: HashMap<String, String>,
    /// If set, this entity has been merged into another and must not be
    /// referenced by new writes (spec §3 invariant).
    pub merged_into: Option<String>,
    /// Creation timestamp.
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl Entity {
    /// Construct a new, unmerged entity.
    pub fn new(kind: EntityKind, name: impl Into<String>) -> Self {
        let name = name.into();
        let normalized_name = crate::hash::normalize_text(&name);
        Self {
            id: new_id(),
            kind,
            name,
            normalized_name,
            identifiers: HashMap::new(),
            merged_into: None,
            created_at: chrono::Utc::now(),
        }
    }
}

/// A typed relationship between a document and an entity it mentions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentEntityLink {
    /// Document id.
    pub document_id: String,
    /// Entity id.
    pub entity_id: String,
    /// Role the entity plays in the document (e.g. "grantor", "grantee",
    /// "signatory").
    pub role: String,
    /// Extraction confidence for this link, in `[0, 1]`.
    pub confidence: f64,
}

/// An authority-grant relationship backed by a document (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorityGrant {
    /// Opaque grant id.
    pub id: String,
    /// Document this grant was extracted from.
    pub document_id: String,
    /// Entity granting authority.
    pub grantor_entity_id: String,
    /// Entity receiving authority.
    pub grantee_entity_id: String,
    /// Authority type (e.g. "poa_healthcare", "poa_financial",
    /// "signatory").
    pub grant_type: String,
    /// Free-form scope description, as extracted.
    pub scope: serde_json::Value,
    /// Effective date, if stated.
    pub effective_date: Option<chrono::NaiveDate>,
    /// Expiration date, if stated.
    pub expiration_date: Option<chrono::NaiveDate>,
    /// Whether this grant is the currently-active one for its
    /// `(grantor, grantee, type)` triple (spec §3 invariant).
    pub is_active: bool,
    /// Grant that superseded this one, if deactivated by a later grant.
    pub revoked_by: Option<String>,
    /// Creation timestamp.
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// The kind of fact an extractor declined to guess (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapType {
    /// Entity name.
    EntityName,
    /// Date.
    Date,
    /// Monetary amount.
    Amount,
    /// Street address.
    Address,
    /// Relationship between parties.
    Relationship,
    /// Scope of an authority grant.
    AuthorityScope,
    /// Reference to another document.
    DocumentReference,
    /// Any other identifier (EIN, case number, ...).
    Identifier,
}

/// Gap lifecycle (spec §4.6 state machine).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapStatus {
    /// No candidate has been accepted yet.
    Open,
    /// A candidate is awaiting human review.
    PendingReview,
    /// Resolved, with a value propagated to every occurrence.
    Resolved,
    /// Determined not to be resolvable from available sources.
    Unresolvable,
}

/// A deduplicated "we don't know this fact yet" record (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeGap {
    /// Opaque gap id.
    pub id: String,
    /// What kind of fact is missing.
    pub gap_type: GapType,
    /// Stable hash over `(type, normalized partial value, normalized
    /// context clues)` (spec §3); see [`crate::hash::gap_fingerprint`].
    pub fingerprint: String,
    /// The partial/placeholder value as extracted (e.g. `"S___ LLC"`).
    pub partial_value: String,
    /// Surrounding clues the extractor captured to help resolve this gap.
    pub context_clues: Vec<String>,
    /// Hints about how this gap might be resolved.
    pub resolution_hints: Vec<String>,
    /// Minimum confidence a candidate must meet for auto-accept
    /// consideration (defaults to the global
    /// `AUTO_RESOLVE_CONFIDENCE_THRESHOLD`, but may be overridden per-gap).
    pub confidence_threshold: f64,
    /// Number of times this fingerprint has been sighted.
    pub occurrence_count: u32,
    /// Current status.
    pub status: GapStatus,
    /// Accepted resolution value, once resolved.
    pub resolved_value: Option<String>,
    /// Document whose content supplied the resolution, if known.
    pub resolution_source_doc: Option<String>,
    /// First-seen timestamp.
    pub first_seen_at: chrono::DateTime<chrono::Utc>,
    /// Last-seen timestamp.
    pub last_seen_at: chrono::DateTime<chrono::Utc>,
}

/// One sighting of a [`KnowledgeGap`] in a specific document (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GapOccurrence {
    /// Gap this occurrence belongs to.
    pub gap_id: String,
    /// Document the gap was sighted in.
    pub document_id: String,
    /// Dotted/array-indexed path into the document's extracted-data blob
    /// (e.g. `"parties[0].name"`).
    pub field_path: String,
    /// Page number, if known.
    pub page: Option<u32>,
    /// Bounding box `[x0, y0, x1, y1]`, if known.
    pub bounding_box: Option<[f64; 4]>,
    /// Text surrounding the placeholder.
    pub surrounding_text: String,
    /// Narrower local context (e.g. the field's own line).
    pub local_context: String,
    /// Extraction confidence that *this is indeed unknown* (not a
    /// confidence in any proposed value).
    pub extraction_confidence: f64,
    /// The literal placeholder string emitted in the extracted-data blob.
    pub placeholder_value: String,
}

/// Source of a proposed gap resolution (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapCandidateSource {
    /// Inferred by the LLM backend during extraction or re-extraction.
    AiInference,
    /// Matched against another document's content (spec §4.2 step 3).
    DocumentMatch,
    /// Looked up from an external API collaborator.
    ExternalApi,
    /// Supplied directly by a human reviewer.
    UserInput,
}

/// Lifecycle of a proposed gap resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapCandidateStatus {
    /// Awaiting acceptance.
    Proposed,
    /// Accepted; the gap resolves to this value.
    Accepted,
    /// Rejected.
    Rejected,
}

/// A proposed value for a [`KnowledgeGap`] (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GapCandidate {
    /// Opaque candidate id.
    pub id: String,
    /// Gap this candidate proposes a value for.
    pub gap_id: String,
    /// The proposed value.
    pub proposed_value: String,
    /// Where the proposal came from.
    pub source_type: GapCandidateSource,
    /// Document that supplied the proposal, if `source_type` is
    /// `document_match`.
    pub source_document: Option<String>,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
    /// Number of independent confirmations.
    pub confirmations: u32,
    /// Number of independent rejections.
    pub rejections: u32,
    /// Current status.
    pub status: GapCandidateStatus,
}

/// Detection method that produced a [`DuplicateCandidate`] (spec §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateMethod {
    /// Exact content-hash equality.
    Hash,
    /// Perceptual-hash Hamming distance.
    Phash,
    /// Embedding cosine similarity.
    Semantic,
    /// Weighted metadata overlap.
    Metadata,
    /// OCR-text similarity.
    OcrText,
}

/// Confidence bucket for a duplicate signal (spec §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceBucket {
    /// Low confidence.
    Low,
    /// Medium confidence.
    Medium,
    /// High confidence.
    High,
}

/// Duplicate-candidate lifecycle (spec §4.6 state machine).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateStatus {
    /// Awaiting review or automatic resolution.
    Pending,
    /// A human (or the auto-merge threshold) confirmed this is a
    /// duplicate.
    ConfirmedDuplicate,
    /// Merge has completed.
    Merged,
    /// A human rejected the duplicate flag.
    NotDuplicate,
}

/// A candidate duplicate pair, always stored with `document_id <
/// candidate_document_id` (spec §3 "unordered pair uniqueness").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateCandidate {
    /// Lexicographically-smaller of the two document ids.
    pub document_id: String,
    /// Lexicographically-larger of the two document ids.
    pub candidate_document_id: String,
    /// Detection method that flagged this pair.
    pub method: DuplicateMethod,
    /// Similarity score in `[0, 1]`.
    pub similarity_score: f64,
    /// Confidence bucket derived from `similarity_score` and `method`.
    pub confidence: ConfidenceBucket,
    /// Current status.
    pub status: DuplicateStatus,
    /// Whether this pair was merged automatically (without human review).
    pub auto_resolved: bool,
}

impl DuplicateCandidate {
    /// Build a candidate pair, normalizing id order per the spec's
    /// "store as (min-id, max-id)" uniqueness rule.
    pub fn new_pair(
        a: &str,
        b: &str,
        method: DuplicateMethod,
        similarity_score: f64,
        confidence: ConfidenceBucket,
    ) -> Self {
        let (document_id, candidate_document_id) = if a <= b {
            (a.to_string(), b.to_string())
        } else {
            (b.to_string(), a.to_string())
        };
        Self {
            document_id,
            candidate_document_id,
            method,
            similarity_score,
            confidence,
            status: DuplicateStatus::Pending,
            auto_resolved: false,
        }
    }
}

/// How a [`CorrectionRule`] computes its proposed value (spec §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrectionType {
    /// Literal replacement.
    Replace,
    /// Regex find/replace.
    Regex,
    /// Re-run extraction via the external collaborator.
    AiReextract,
    /// Flag for human review with no automatic proposal.
    ManualReview,
}

/// Rule lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleStatus {
    /// Created, not yet running.
    Draft,
    /// Running; `apply()` will enqueue corrections.
    Active,
    /// Temporarily disabled.
    Paused,
    /// Permanently disabled.
    Archived,
}

/// A rule describing a class of documents and how to correct a field on
/// them (spec §3, §4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrectionRule {
    /// Opaque rule id.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Free-form categorization (e.g. `"date_extraction"`).
    pub rule_type: String,
    /// Predicate describing which documents this rule affects.
    pub match_criteria: MatchCriteria,
    /// How the proposed value is computed.
    pub correction_type: CorrectionType,
    /// Parameters for `correction_type` (literal value, or `(pattern,
    /// replacement)` for `regex`).
    pub correction_value: CorrectionValueSpec,
    /// Whether queued items require explicit approval before `bulkApply`
    /// will act on them.
    pub requires_approval: bool,
    /// Current status.
    pub status: RuleStatus,
    /// Number of documents matched the last time `findAffected` ran.
    pub affected_count: u64,
    /// Number of queue items this rule has produced in total.
    pub queued_count: u64,
    /// Number of queue items this rule has seen applied.
    pub applied_count: u64,
}

/// Predicate composing the document filters `findAffected` supports
/// (spec §4.6).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatchCriteria {
    /// Restrict to a document type.
    pub document_type: Option<DocumentType>,
    /// Restrict to documents created within this inclusive range.
    pub date_range: Option<(chrono::DateTime<chrono::Utc>, chrono::DateTime<chrono::Utc>)>,
    /// Case-insensitive substring match against linked entity names.
    pub entity_name_like: Option<String>,
    /// Dotted field path that must exist in `extracted_data`.
    pub field_path: Option<String>,
}

/// Parameters for a [`CorrectionType`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CorrectionValueSpec {
    /// Literal replacement value for `CorrectionType::Replace`.
    Literal {
        /// The replacement value.
        value: String,
    },
    /// Regex pattern/replacement for `CorrectionType::Regex`.
    Regex {
        /// The pattern to match.
        pattern: String,
        /// The replacement template (`$1`-style capture references).
        replacement: String,
    },
    /// No parameters needed for `AiReextract`/`ManualReview`.
    None,
}

/// A proposed value queued for a correction, replacing the
/// `__AI_REEXTRACT__`/`__MANUAL_REVIEW__` string sentinels with a
/// discriminated type, per spec §9's explicit design note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProposedValue {
    /// A concrete literal value to write into `field_path`.
    Literal(String),
    /// Enqueue the document for re-extraction via the external
    /// collaborator; no literal value yet.
    ReExtract,
    /// Leave pending for further human action; no literal value.
    ManualReview,
}

/// Correction-queue-item lifecycle (spec §4.6 state machine).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrectionQueueStatus {
    /// Awaiting approval (or, if no approval required, awaiting
    /// `bulkApply`).
    Pending,
    /// Approved; `bulkApply` will act on it.
    Approved,
    /// Applied to the document.
    Applied,
    /// Rejected.
    Rejected,
    /// Approved but deliberately not applied (e.g. superseded by a
    /// fresher correction before `bulkApply` ran).
    Skipped,
}

/// One proposed edit to one field of one document (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrectionQueueItem {
    /// Opaque item id.
    pub id: String,
    /// Rule that produced this item.
    pub rule_id: String,
    /// Document the correction would apply to.
    pub document_id: String,
    /// Dotted/array-indexed field path.
    pub field_path: String,
    /// Value at `field_path` when this item was queued.
    pub current_value: serde_json::Value,
    /// The proposed replacement.
    pub proposed_value: ProposedValue,
    /// Confidence in the proposal (spec §4.6 per-type defaults).
    pub confidence: f64,
    /// Current status.
    pub status: CorrectionQueueStatus,
    /// The pre-apply value, preserved so the correction can be rolled
    /// back byte-for-byte (spec §8 "Correction rollback").
    pub rollback_value: Option<serde_json::Value>,
}

/// Append-only audit trail entry for an applied correction (SPEC_FULL
/// §3 supplement — referenced by spec §4.6 but not separately modeled
/// there).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrectionAuditLogEntry {
    /// Opaque audit entry id.
    pub id: String,
    /// Queue item that was applied.
    pub queue_item_id: String,
    /// Document that was edited.
    pub document_id: String,
    /// Field that was edited.
    pub field_path: String,
    /// Value before the edit.
    pub previous_value: serde_json::Value,
    /// Value after the edit.
    pub new_value: serde_json::Value,
    /// When the edit was applied.
    pub applied_at: chrono::DateTime<chrono::Utc>,
}

/// Which table a [`ReviewQueueItem`] points into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewSourceTable {
    /// Points at a `DuplicateCandidate` pair.
    DuplicateCandidate,
    /// Points at a `CorrectionQueueItem`.
    CorrectionQueueItem,
    /// Points at a `KnowledgeGap`/`GapCandidate` pair.
    GapCandidate,
}

/// Review-queue-item lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    /// Awaiting human action.
    Open,
    /// A human acted on it.
    Resolved,
    /// No longer relevant (the underlying item was superseded).
    Dismissed,
}

/// A polymorphic pointer into whatever needs human attention (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewQueueItem {
    /// Opaque review-item id.
    pub id: String,
    /// Which table `source_id` refers to.
    pub source_table: ReviewSourceTable,
    /// Opaque id within `source_table`. For `DuplicateCandidate` this is
    /// `"{document_id}:{candidate_document_id}"`.
    pub source_id: String,
    /// Review type, mirrored from `source_table` for convenient filtering
    /// (spec §6 `GET /duplicates?...`, `type: "duplicate"` /
    /// `type: "correction"`).
    pub review_type: String,
    /// Higher priority is reviewed first.
    pub priority: u32,
    /// Current status.
    pub status: ReviewStatus,
    /// Free-form resolution note, once resolved.
    pub resolution: Option<String>,
}

/// One step's outcome in a document's processing history (spec §3, §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogStatus {
    /// The step succeeded.
    Succeeded,
    /// The step failed terminally.
    Failed,
    /// The step is being retried after a transient failure.
    Retrying,
}

/// Append-only per-step trace (spec §3). Crash recovery folds over these
/// to find the first not-yet-completed step for a workflow instance (spec
/// §4.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingLog {
    /// Document this entry is about.
    pub document_id: String,
    /// Workflow instance that produced this entry.
    pub workflow_instance_id: String,
    /// Step name.
    pub step: String,
    /// Outcome.
    pub status: LogStatus,
    /// Error message, if `status` is `failed` or `retrying`.
    pub error: Option<String>,
    /// When this entry was written.
    pub recorded_at: chrono::DateTime<chrono::Utc>,
}

/// Searchable metadata stored alongside a document's embedding in the
/// vector index (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorRecord {
    /// Document this vector represents.
    pub document_id: String,
    /// The embedding vector itself.
    pub embedding: Vec<f32>,
    /// Classified document type.
    pub document_type: Option<DocumentType>,
    /// Ids of entities linked to this document.
    pub entity_ids: Vec<String>,
    /// Effective date extracted from the document, if any.
    pub effective_date: Option<chrono::NaiveDate>,
    /// Key terms extracted for lexical-ish filtering.
    pub key_terms: Vec<String>,
}
