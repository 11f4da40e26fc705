//! `KnowledgeGraphStore`: the canonical system of record (spec §4.4).
//!
//! Grounded on `checkpoint.rs`'s `Checkpointer` trait shape in the teacher
//! (an async trait over a generic state type, with an in-memory reference
//! implementation used by the test suite) — here specialized to the fixed
//! relational schema of spec §3 rather than a generic checkpoint blob,
//! since the Knowledge Graph Store (not a checkpoint file) is this
//! system's durable store (spec §9 design note).
//!
//! Mutating operations are transactional; the in-memory implementation
//! models a transaction as a single critical section guarded by one
//! `parking_lot::Mutex`, which is sufficient to make `merge_entities`'
//! "rewrite every weak reference before commit" invariant observable in
//! tests without a real database.

use crate::error::{Error, Result};
use crate::jsonpath::{get_path, set_path};
use crate::model::*;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;

/// The canonical store operations spec §4.4 names, plus the supporting
/// reads/writes the Workflow Engine, Duplicate Hunter, and Accuracy
/// Guardian need to drive them (finding documents by hash, listing open
/// gaps, queueing corrections, ...).
#[async_trait]
pub trait KnowledgeGraphStore: Send + Sync {
    // ---- Documents ----

    /// Insert or update a document record.
    async fn upsert_document(&self, document: Document) -> Result<()>;
    /// Fetch a document by id.
    async fn get_document(&self, id: &str) -> Result<Option<Document>>;
    /// Fetch a document by content hash (spec §4.1 idempotence check).
    async fn find_document_by_hash(&self, content_hash: &str) -> Result<Option<Document>>;
    /// List every document, for full scans (spec §4.5 `scanFull`).
    async fn list_documents(&self) -> Result<Vec<Document>>;
    /// List documents created after a given document id's insertion point,
    /// for incremental scans (spec §4.5 `scanIncremental`). Ids are
    /// compared by the store's internal insertion order, not lexically.
    async fn list_documents_since(&self, since_document_id: Option<&str>) -> Result<Vec<Document>>;

    // ---- Entities ----

    /// Look up an entity by case-insensitive normalized name.
    async fn find_entity_by_normalized_name(&self, normalized_name: &str) -> Result<Option<Entity>>;
    /// Fetch an entity by id.
    async fn get_entity(&self, id: &str) -> Result<Option<Entity>>;
    /// Insert a new entity.
    async fn insert_entity(&self, entity: Entity) -> Result<()>;
    /// Link a document to an entity with a role and confidence (spec
    /// §4.4 `linkEntity`). Unique per `(document, entity, role)`.
    async fn link_entity(&self, link: DocumentEntityLink) -> Result<()>;
    /// List every entity linked to a document.
    async fn list_links_for_document(&self, document_id: &str) -> Result<Vec<DocumentEntityLink>>;
    /// List every link referencing an entity, across all documents.
    async fn list_links_for_entity(&self, entity_id: &str) -> Result<Vec<DocumentEntityLink>>;

    /// Merge `loser` into `winner`, transactionally rewriting every
    /// Document↔Entity link, every grant's grantor/grantee reference, and
    /// every gap reference, then setting `loser.merged_into = winner`
    /// (spec §4.4, §8 "Entity-merge closure").
    async fn merge_entities(&self, winner_id: &str, loser_id: &str) -> Result<()>;

    // ---- Authority grants ----

    /// Insert a new grant (spec §4.4 `insertGrant`).
    async fn insert_grant(&self, grant: AuthorityGrant) -> Result<()>;
    /// Deactivate a grant, recording which grant superseded it (spec §4.4
    /// `deactivateGrant`).
    async fn deactivate_grant(&self, grant_id: &str, revoked_by: &str) -> Result<()>;
    /// Find the currently-active grant, if any, for a
    /// `(grantor, grantee, type)` triple (spec §3 "at most one active
    /// grant" invariant).
    async fn find_active_grant(
        &self,
        grantor_entity_id: &str,
        grantee_entity_id: &str,
        grant_type: &str,
    ) -> Result<Option<AuthorityGrant>>;
    /// Fetch a grant by id.
    async fn get_grant(&self, id: &str) -> Result<Option<AuthorityGrant>>;
    /// All active grants, for `authorityPath`'s breadth-first search.
    async fn list_active_grants(&self) -> Result<Vec<AuthorityGrant>>;
    /// Update a grant's `effective_date`/`expiration_date` in place
    /// (spec §4.6 propagation: "update the corresponding `AuthorityGrant`
    /// columns in the same transaction").
    async fn update_grant_dates(
        &self,
        grant_id: &str,
        effective_date: Option<chrono::NaiveDate>,
        expiration_date: Option<chrono::NaiveDate>,
    ) -> Result<()>;

    /// Bounded breadth-first search over active grants valid at `as_of`
    /// (defaulting to now), returning the shortest chain of grants from
    /// `from_entity` to `to_entity`, or `None` if no path exists (spec
    /// §4.4 `authorityPath`).
    async fn authority_path(
        &self,
        from_entity: &str,
        to_entity: &str,
        as_of: Option<chrono::NaiveDate>,
    ) -> Result<Option<Vec<AuthorityGrant>>> {
        let as_of = as_of.unwrap_or_else(|| chrono::Utc::now().date_naive());
        let grants: Vec<AuthorityGrant> = self
            .list_active_grants()
            .await?
            .into_iter()
            .filter(|g| {
                let after_effective = g.effective_date.is_none_or(|d| d <= as_of);
                let before_expiration = g.expiration_date.is_none_or(|d| d >= as_of);
                after_effective && before_expiration
            })
            .collect();

        // Bounded BFS: the pipeline's entity graph is small per spec's
        // scope (one corpus of legal documents, not a general social
        // graph), so a plain adjacency scan per hop is adequate and keeps
        // the store trait free of a petgraph dependency.
        const MAX_HOPS: usize = 16;
        let mut frontier: Vec<(String, Vec<AuthorityGrant>)> = vec![(from_entity.to_string(), vec![])];
        let mut visited = std::collections::HashSet::new();
        visited.insert(from_entity.to_string());

        for _ in 0..MAX_HOPS {
            let mut next_frontier = Vec::new();
            for (current, path) in &frontier {
                if current == to_entity && !path.is_empty() {
                    return Ok(Some(path.clone()));
                }
                for grant in &grants {
                    if &grant.grantor_entity_id == current && !visited.contains(&grant.grantee_entity_id) {
                        visited.insert(grant.grantee_entity_id.clone());
                        let mut extended = path.clone();
                        extended.push(grant.clone());
                        next_frontier.push((grant.grantee_entity_id.clone(), extended));
                    }
                }
            }
            if next_frontier.is_empty() {
                break;
            }
            frontier = next_frontier;
        }
        Ok(None)
    }

    // ---- Knowledge gaps ----

    /// Upsert a gap by fingerprint: increments `occurrence_count` and
    /// updates `last_seen_at` if a gap with this fingerprint already
    /// exists, otherwise inserts a new one in `open` status (spec §4.2
    /// step 3).
    async fn upsert_knowledge_gap(
        &self,
        fingerprint: &str,
        gap_type: GapType,
        partial_value: &str,
        context_clues: Vec<String>,
        resolution_hints: Vec<String>,
        confidence_threshold: f64,
    ) -> Result<KnowledgeGap>;
    /// Fetch a gap by id.
    async fn get_gap(&self, id: &str) -> Result<Option<KnowledgeGap>>;
    /// List gaps by status.
    async fn list_gaps_by_status(&self, status: GapStatus) -> Result<Vec<KnowledgeGap>>;
    /// List every open/pending-review gap, for cross-document matching
    /// (spec §4.2 step 3).
    async fn list_unresolved_gaps(&self) -> Result<Vec<KnowledgeGap>> {
        let mut gaps = self.list_gaps_by_status(GapStatus::Open).await?;
        gaps.extend(self.list_gaps_by_status(GapStatus::PendingReview).await?);
        Ok(gaps)
    }
    /// Update a gap's status, and optionally its resolved value/source.
    async fn set_gap_status(
        &self,
        gap_id: &str,
        status: GapStatus,
        resolved_value: Option<String>,
        resolution_source_doc: Option<String>,
    ) -> Result<()>;

    /// Record one sighting of a gap in a document (spec §4.4
    /// `appendGapOccurrence`). Unique per `(gap, document, field_path)`.
    async fn append_gap_occurrence(&self, occurrence: GapOccurrence) -> Result<()>;
    /// List every occurrence of a gap, across all documents.
    async fn list_gap_occurrences(&self, gap_id: &str) -> Result<Vec<GapOccurrence>>;

    /// Add a proposed resolution for a gap (spec §4.4 `addGapCandidate`).
    async fn add_gap_candidate(&self, candidate: GapCandidate) -> Result<()>;
    /// List candidates for a gap.
    async fn list_gap_candidates(&self, gap_id: &str) -> Result<Vec<GapCandidate>>;
    /// Update a candidate's status.
    async fn set_gap_candidate_status(&self, candidate_id: &str, status: GapCandidateStatus) -> Result<()>;

    // ---- Duplicate candidates ----

    /// Insert a duplicate candidate pair if one doesn't already exist for
    /// this `(document, candidate_document)` pair (spec §4.5 "insert or
    /// ignore on the ordered pair").
    async fn insert_duplicate_candidate_if_absent(&self, candidate: DuplicateCandidate) -> Result<bool>;
    /// Fetch a duplicate candidate pair.
    async fn get_duplicate_candidate(&self, a: &str, b: &str) -> Result<Option<DuplicateCandidate>>;
    /// List duplicate candidates by status.
    async fn list_duplicate_candidates(&self, status: Option<DuplicateStatus>) -> Result<Vec<DuplicateCandidate>>;
    /// Update a duplicate candidate's status / auto-resolved flag.
    async fn set_duplicate_status(
        &self,
        a: &str,
        b: &str,
        status: DuplicateStatus,
        auto_resolved: bool,
    ) -> Result<()>;

    // ---- Corrections ----

    /// Create a correction rule.
    async fn insert_correction_rule(&self, rule: CorrectionRule) -> Result<()>;
    /// Fetch a correction rule by id.
    async fn get_correction_rule(&self, id: &str) -> Result<Option<CorrectionRule>>;
    /// Update a correction rule in place (status, counters).
    async fn update_correction_rule(&self, rule: CorrectionRule) -> Result<()>;
    /// List rules by status.
    async fn list_correction_rules(&self, status: Option<RuleStatus>) -> Result<Vec<CorrectionRule>>;

    /// Find documents matching a rule's criteria, bounded at 10,000 ids
    /// (spec §4.6 `findAffected`).
    async fn find_affected(&self, criteria: &MatchCriteria) -> Result<Vec<Document>>;

    /// Insert a queue item if one doesn't already exist for
    /// `(rule, document, field_path)` (spec §3 uniqueness).
    async fn insert_correction_queue_item_if_absent(&self, item: CorrectionQueueItem) -> Result<bool>;
    /// Fetch a queue item by id.
    async fn get_correction_queue_item(&self, id: &str) -> Result<Option<CorrectionQueueItem>>;
    /// List queue items by status.
    async fn list_correction_queue_items(
        &self,
        status: Option<CorrectionQueueStatus>,
    ) -> Result<Vec<CorrectionQueueItem>>;
    /// Update a queue item's status.
    async fn set_correction_queue_status(&self, id: &str, status: CorrectionQueueStatus) -> Result<()>;

    /// Apply a correction to a document's `extracted_data` blob at
    /// `field_path`, returning the value that was there before (spec §4.4
    /// `applyCorrection`).
    async fn apply_correction(
        &self,
        document_id: &str,
        field_path: &str,
        new_value: serde_json::Value,
    ) -> Result<serde_json::Value>;

    /// Append an audit-log entry for an applied correction (SPEC_FULL §3
    /// supplement).
    async fn append_correction_audit_log(&self, entry: CorrectionAuditLogEntry) -> Result<()>;

    // ---- Review queue ----

    /// Enqueue a review item.
    async fn enqueue_review_item(&self, item: ReviewQueueItem) -> Result<()>;
    /// List review items by status.
    async fn list_review_items(&self, status: Option<ReviewStatus>) -> Result<Vec<ReviewQueueItem>>;
    /// Resolve or dismiss a review item.
    async fn set_review_status(
        &self,
        id: &str,
        status: ReviewStatus,
        resolution: Option<String>,
    ) -> Result<()>;

    // ---- Processing log ----

    /// Append a processing-log entry.
    async fn append_processing_log(&self, entry: ProcessingLog) -> Result<()>;
    /// Fetch every log entry for a workflow instance, in the order they
    /// were written (used by crash recovery to fold over and find the
    /// first not-yet-completed step, spec §4.2).
    async fn get_processing_log(&self, workflow_instance_id: &str) -> Result<Vec<ProcessingLog>>;
}

// ---------------------------------------------------------------------
// In-memory reference implementation
// ---------------------------------------------------------------------

/// A simple, fully in-process implementation of [`KnowledgeGraphStore`],
/// used by this crate's own test suite and exposed (behind the `testing`
/// feature) for downstream crates that want to exercise the Workflow
/// Engine, Duplicate Hunter, or Accuracy Guardian without a database.
#[derive(Default)]
pub struct InMemoryStore {
    inner: Mutex<InMemoryState>,
}

#[derive(Default)]
struct InMemoryState {
    documents: HashMap<String, Document>,
    document_order: Vec<String>,
    entities: HashMap<String, Entity>,
    links: Vec<DocumentEntityLink>,
    grants: HashMap<String, AuthorityGrant>,
    gaps: HashMap<String, KnowledgeGap>,
    gaps_by_fingerprint: HashMap<String, String>,
    gap_occurrences: Vec<GapOccurrence>,
    gap_candidates: HashMap<String, GapCandidate>,
    duplicate_candidates: HashMap<(String, String), DuplicateCandidate>,
    correction_rules: HashMap<String, CorrectionRule>,
    correction_queue: HashMap<String, CorrectionQueueItem>,
    correction_audit_log: Vec<CorrectionAuditLogEntry>,
    review_items: HashMap<String, ReviewQueueItem>,
    processing_log: Vec<ProcessingLog>,
}

impl InMemoryStore {
    /// Construct an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KnowledgeGraphStore for InMemoryStore {
    async fn upsert_document(&self, document: Document) -> Result<()> {
        let mut state = self.inner.lock();
        if !state.documents.contains_key(&document.id) {
            state.document_order.push(document.id.clone());
        }
        state.documents.insert(document.id.clone(), document);
        Ok(())
    }

    async fn get_document(&self, id: &str) -> Result<Option<Document>> {
        Ok(self.inner.lock().documents.get(id).cloned())
    }

    async fn find_document_by_hash(&self, content_hash: &str) -> Result<Option<Document>> {
        Ok(self
            .inner
            .lock()
            .documents
            .values()
            .find(|d| d.content_hash == content_hash)
            .cloned())
    }

    async fn list_documents(&self) -> Result<Vec<Document>> {
        let state = self.inner.lock();
        Ok(state
            .document_order
            .iter()
            .filter_map(|id| state.documents.get(id).cloned())
            .collect())
    }

    async fn list_documents_since(&self, since_document_id: Option<&str>) -> Result<Vec<Document>> {
        let state = self.inner.lock();
        let start = match since_document_id {
            Some(id) => state.document_order.iter().position(|d| d == id).map(|p| p + 1).unwrap_or(0),
            None => 0,
        };
        Ok(state.document_order[start..]
            .iter()
            .filter_map(|id| state.documents.get(id).cloned())
            .collect())
    }

    async fn find_entity_by_normalized_name(&self, normalized_name: &str) -> Result<Option<Entity>> {
        Ok(self
            .inner
            .lock()
            .entities
            .values()
            .filter(|e| e.merged_into.is_none() && e.normalized_name == normalized_name)
            .max_by(|a, b| {
                a.normalized_name
                    .len()
                    .cmp(&b.normalized_name.len())
                    .then(b.created_at.cmp(&a.created_at))
            })
            .cloned())
    }

    async fn get_entity(&self, id: &str) -> Result<Option<Entity>> {
        Ok(self.inner.lock().entities.get(id).cloned())
    }

    async fn insert_entity(&self, entity: Entity) -> Result<()> {
        self.inner.lock().entities.insert(entity.id.clone(), entity);
        Ok(())
    }

    async fn link_entity(&self, link: DocumentEntityLink) -> Result<()> {
        let mut state = self.inner.lock();
        if !state
            .links
            .iter()
            .any(|l| l.document_id == link.document_id && l.entity_id == link.entity_id && l.role == link.role)
        {
            state.links.push(link);
        }
        Ok(())
    }

    async fn list_links_for_document(&self, document_id: &str) -> Result<Vec<DocumentEntityLink>> {
        Ok(self
            .inner
            .lock()
            .links
            .iter()
            .filter(|l| l.document_id == document_id)
            .cloned()
            .collect())
    }

    async fn list_links_for_entity(&self, entity_id: &str) -> Result<Vec<DocumentEntityLink>> {
        Ok(self
            .inner
            .lock()
            .links
            .iter()
            .filter(|l| l.entity_id == entity_id)
            .cloned()
            .collect())
    }

    async fn merge_entities(&self, winner_id: &str, loser_id: &str) -> Result<()> {
        let mut state = self.inner.lock();
        if !state.entities.contains_key(winner_id) || !state.entities.contains_key(loser_id) {
            return Err(Error::NotFound(format!(
                "entity {winner_id} or {loser_id} not found for merge"
            )));
        }
        for link in state.links.iter_mut() {
            if link.entity_id == loser_id {
                link.entity_id = winner_id.to_string();
            }
        }
        for grant in state.grants.values_mut() {
            if grant.grantor_entity_id == loser_id {
                grant.grantor_entity_id = winner_id.to_string();
            }
            if grant.grantee_entity_id == loser_id {
                grant.grantee_entity_id = winner_id.to_string();
            }
        }
        if let Some(loser) = state.entities.get_mut(loser_id) {
            loser.merged_into = Some(winner_id.to_string());
        }
        Ok(())
    }

    async fn insert_grant(&self, grant: AuthorityGrant) -> Result<()> {
        self.inner.lock().grants.insert(grant.id.clone(), grant);
        Ok(())
    }

    async fn deactivate_grant(&self, grant_id: &str, revoked_by: &str) -> Result<()> {
        let mut state = self.inner.lock();
        let grant = state
            .grants
            .get_mut(grant_id)
            .ok_or_else(|| Error::NotFound(format!("grant {grant_id}")))?;
        grant.is_active = false;
        grant.revoked_by = Some(revoked_by.to_string());
        Ok(())
    }

    async fn find_active_grant(
        &self,
        grantor_entity_id: &str,
        grantee_entity_id: &str,
        grant_type: &str,
    ) -> Result<Option<AuthorityGrant>> {
        Ok(self
            .inner
            .lock()
            .grants
            .values()
            .find(|g| {
                g.is_active
                    && g.grantor_entity_id == grantor_entity_id
                    && g.grantee_entity_id == grantee_entity_id
                    && g.grant_type == grant_type
            })
            .cloned())
    }

    async fn get_grant(&self, id: &str) -> Result<Option<AuthorityGrant>> {
        Ok(self.inner.lock().grants.get(id).cloned())
    }

    async fn list_active_grants(&self) -> Result<Vec<AuthorityGrant>> {
        Ok(self
            .inner
            .lock()
            .grants
            .values()
            .filter(|g| g.is_active)
            .cloned()
            .collect())
    }

    async fn update_grant_dates(
        &self,
        grant_id: &str,
        effective_date: Option<chrono::NaiveDate>,
        expiration_date: Option<chrono::NaiveDate>,
    ) -> Result<()> {
        let mut state = self.inner.lock();
        let grant = state
            .grants
            .get_mut(grant_id)
            .ok_or_else(|| Error::NotFound(format!("grant {grant_id}")))?;
        grant.effective_date = effective_date;
        grant.expiration_date = expiration_date;
        Ok(())
    }

    async fn upsert_knowledge_gap(
        &self,
        fingerprint: &str,
        gap_type: GapType,
        partial_value: &str,
        context_clues: Vec<String>,
        resolution_hints: Vec<String>,
        confidence_threshold: f64,
    ) -> Result<KnowledgeGap> {
        let mut state = self.inner.lock();
        let now = chrono::Utc::now();
        if let Some(existing_id) = state.gaps_by_fingerprint.get(fingerprint).cloned() {
            let gap = state.gaps.get_mut(&existing_id).expect("fingerprint index is consistent");
            gap.occurrence_count += 1;
            gap.last_seen_at = now;
            return Ok(gap.clone());
        }
        let gap = KnowledgeGap {
            id: new_id(),
            gap_type,
            fingerprint: fingerprint.to_string(),
            partial_value: partial_value.to_string(),
            context_clues,
            resolution_hints,
            confidence_threshold,
            occurrence_count: 1,
            status: GapStatus::Open,
            resolved_value: None,
            resolution_source_doc: None,
            first_seen_at: now,
            last_seen_at: now,
        };
        state.gaps_by_fingerprint.insert(fingerprint.to_string(), gap.id.clone());
        state.gaps.insert(gap.id.clone(), gap.clone());
        Ok(gap)
    }

    async fn get_gap(&self, id: &str) -> Result<Option<KnowledgeGap>> {
        Ok(self.inner.lock().gaps.get(id).cloned())
    }

    async fn list_gaps_by_status(&self, status: GapStatus) -> Result<Vec<KnowledgeGap>> {
        Ok(self
            .inner
            .lock()
            .gaps
            .values()
            .filter(|g| g.status == status)
            .cloned()
            .collect())
    }

    async fn set_gap_status(
        &self,
        gap_id: &str,
        status: GapStatus,
        resolved_value: Option<String>,
        resolution_source_doc: Option<String>,
    ) -> Result<()> {
        let mut state = self.inner.lock();
        let gap = state
            .gaps
            .get_mut(gap_id)
            .ok_or_else(|| Error::NotFound(format!("gap {gap_id}")))?;
        gap.status = status;
        if resolved_value.is_some() {
            gap.resolved_value = resolved_value;
        }
        if resolution_source_doc.is_some() {
            gap.resolution_source_doc = resolution_source_doc;
        }
        Ok(())
    }

    async fn append_gap_occurrence(&self, occurrence: GapOccurrence) -> Result<()> {
        let mut state = self.inner.lock();
        let exists = state.gap_occurrences.iter().any(|o| {
            o.gap_id == occurrence.gap_id
                && o.document_id == occurrence.document_id
                && o.field_path == occurrence.field_path
        });
        if !exists {
            state.gap_occurrences.push(occurrence);
        }
        Ok(())
    }

    async fn list_gap_occurrences(&self, gap_id: &str) -> Result<Vec<GapOccurrence>> {
        Ok(self
            .inner
            .lock()
            .gap_occurrences
            .iter()
            .filter(|o| o.gap_id == gap_id)
            .cloned()
            .collect())
    }

    async fn add_gap_candidate(&self, candidate: GapCandidate) -> Result<()> {
        self.inner.lock().gap_candidates.insert(candidate.id.clone(), candidate);
        Ok(())
    }

    async fn list_gap_candidates(&self, gap_id: &str) -> Result<Vec<GapCandidate>> {
        Ok(self
            .inner
            .lock()
            .gap_candidates
            .values()
            .filter(|c| c.gap_id == gap_id)
            .cloned()
            .collect())
    }

    async fn set_gap_candidate_status(&self, candidate_id: &str, status: GapCandidateStatus) -> Result<()> {
        let mut state = self.inner.lock();
        let candidate = state
            .gap_candidates
            .get_mut(candidate_id)
            .ok_or_else(|| Error::NotFound(format!("gap candidate {candidate_id}")))?;
        candidate.status = status;
        Ok(())
    }

    async fn insert_duplicate_candidate_if_absent(&self, candidate: DuplicateCandidate) -> Result<bool> {
        let mut state = self.inner.lock();
        let key = (candidate.document_id.clone(), candidate.candidate_document_id.clone());
        if state.duplicate_candidates.contains_key(&key) {
            return Ok(false);
        }
        state.duplicate_candidates.insert(key, candidate);
        Ok(true)
    }

    async fn get_duplicate_candidate(&self, a: &str, b: &str) -> Result<Option<DuplicateCandidate>> {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        Ok(self
            .inner
            .lock()
            .duplicate_candidates
            .get(&(lo.to_string(), hi.to_string()))
            .cloned())
    }

    async fn list_duplicate_candidates(&self, status: Option<DuplicateStatus>) -> Result<Vec<DuplicateCandidate>> {
        Ok(self
            .inner
            .lock()
            .duplicate_candidates
            .values()
            .filter(|c| status.is_none_or(|s| c.status == s))
            .cloned()
            .collect())
    }

    async fn set_duplicate_status(
        &self,
        a: &str,
        b: &str,
        status: DuplicateStatus,
        auto_resolved: bool,
    ) -> Result<()> {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let mut state = self.inner.lock();
        let candidate = state
            .duplicate_candidates
            .get_mut(&(lo.to_string(), hi.to_string()))
            .ok_or_else(|| Error::NotFound(format!("duplicate candidate {a}/{b}")))?;
        candidate.status = status;
        candidate.auto_resolved = auto_resolved;
        Ok(())
    }

    async fn insert_correction_rule(&self, rule: CorrectionRule) -> Result<()> {
        self.inner.lock().correction_rules.insert(rule.id.clone(), rule);
        Ok(())
    }

    async fn get_correction_rule(&self, id: &str) -> Result<Option<CorrectionRule>> {
        Ok(self.inner.lock().correction_rules.get(id).cloned())
    }

    async fn update_correction_rule(&self, rule: CorrectionRule) -> Result<()> {
        self.inner.lock().correction_rules.insert(rule.id.clone(), rule);
        Ok(())
    }

    async fn list_correction_rules(&self, status: Option<RuleStatus>) -> Result<Vec<CorrectionRule>> {
        Ok(self
            .inner
            .lock()
            .correction_rules
            .values()
            .filter(|r| status.is_none_or(|s| r.status == s))
            .cloned()
            .collect())
    }

    async fn find_affected(&self, criteria: &MatchCriteria) -> Result<Vec<Document>> {
        let state = self.inner.lock();
        let mut results = Vec::new();
        for id in &state.document_order {
            let Some(doc) = state.documents.get(id) else { continue };
            if let Some(doc_type) = criteria.document_type {
                if doc.document_type != Some(doc_type) {
                    continue;
                }
            }
            if let Some((start, end)) = criteria.date_range {
                if doc.created_at < start || doc.created_at > end {
                    continue;
                }
            }
            if let Some(ref path) = criteria.field_path {
                match &doc.extracted_data {
                    Some(data) if get_path(data, path).is_some() => {}
                    _ => continue,
                }
            }
            if let Some(ref needle) = criteria.entity_name_like {
                let needle_lower = needle.to_lowercase();
                let matches_entity = state
                    .links
                    .iter()
                    .filter(|l| l.document_id == *id)
                    .any(|l| {
                        state
                            .entities
                            .get(&l.entity_id)
                            .is_some_and(|e| e.normalized_name.contains(&needle_lower))
                    });
                if !matches_entity {
                    continue;
                }
            }
            results.push(doc.clone());
            if results.len() >= 10_000 {
                break;
            }
        }
        Ok(results)
    }

    async fn insert_correction_queue_item_if_absent(&self, item: CorrectionQueueItem) -> Result<bool> {
        let mut state = self.inner.lock();
        let exists = state.correction_queue.values().any(|existing| {
            existing.rule_id == item.rule_id
                && existing.document_id == item.document_id
                && existing.field_path == item.field_path
        });
        if exists {
            return Ok(false);
        }
        state.correction_queue.insert(item.id.clone(), item);
        Ok(true)
    }

    async fn get_correction_queue_item(&self, id: &str) -> Result<Option<CorrectionQueueItem>> {
        Ok(self.inner.lock().correction_queue.get(id).cloned())
    }

    async fn list_correction_queue_items(
        &self,
        status: Option<CorrectionQueueStatus>,
    ) -> Result<Vec<CorrectionQueueItem>> {
        Ok(self
            .inner
            .lock()
            .correction_queue
            .values()
            .filter(|i| status.is_none_or(|s| i.status == s))
            .cloned()
            .collect())
    }

    async fn set_correction_queue_status(&self, id: &str, status: CorrectionQueueStatus) -> Result<()> {
        let mut state = self.inner.lock();
        let item = state
            .correction_queue
            .get_mut(id)
            .ok_or_else(|| Error::NotFound(format!("correction queue item {id}")))?;
        item.status = status;
        Ok(())
    }

    async fn apply_correction(
        &self,
        document_id: &str,
        field_path: &str,
        new_value: serde_json::Value,
    ) -> Result<serde_json::Value> {
        let mut state = self.inner.lock();
        let doc = state
            .documents
            .get_mut(document_id)
            .ok_or_else(|| Error::NotFound(format!("document {document_id}")))?;
        let data = doc.extracted_data.get_or_insert_with(|| serde_json::json!({}));
        let previous = set_path(data, field_path, new_value).unwrap_or(serde_json::Value::Null);
        doc.updated_at = chrono::Utc::now();
        Ok(previous)
    }

    async fn append_correction_audit_log(&self, entry: CorrectionAuditLogEntry) -> Result<()> {
        self.inner.lock().correction_audit_log.push(entry);
        Ok(())
    }

    async fn enqueue_review_item(&self, item: ReviewQueueItem) -> Result<()> {
        self.inner.lock().review_items.insert(item.id.clone(), item);
        Ok(())
    }

    async fn list_review_items(&self, status: Option<ReviewStatus>) -> Result<Vec<ReviewQueueItem>> {
        Ok(self
            .inner
            .lock()
            .review_items
            .values()
            .filter(|i| status.is_none_or(|s| i.status == s))
            .cloned()
            .collect())
    }

    async fn set_review_status(
        &self,
        id: &str,
        status: ReviewStatus,
        resolution: Option<String>,
    ) -> Result<()> {
        let mut state = self.inner.lock();
        let item = state
            .review_items
            .get_mut(id)
            .ok_or_else(|| Error::NotFound(format!("review item {id}")))?;
        item.status = status;
        if resolution.is_some() {
            item.resolution = resolution;
        }
        Ok(())
    }

    async fn append_processing_log(&self, entry: ProcessingLog) -> Result<()> {
        self.inner.lock().processing_log.push(entry);
        Ok(())
    }

    async fn get_processing_log(&self, workflow_instance_id: &str) -> Result<Vec<ProcessingLog>> {
        Ok(self
            .inner
            .lock()
            .processing_log
            .iter()
            .filter(|e| e.workflow_instance_id == workflow_instance_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hash_lookup_roundtrips() {
        let store = InMemoryStore::new();
        let doc = Document::new_pending(
            "abc123".to_string(),
            "sha256/abc123".to_string(),
            "poa.pdf".to_string(),
            "application/pdf".to_string(),
            1024,
            "uploader-1".to_string(),
        );
        let id = doc.id.clone();
        store.upsert_document(doc).await.unwrap();
        let found = store.find_document_by_hash("abc123").await.unwrap().unwrap();
        assert_eq!(found.id, id);
    }

    #[tokio::test]
    async fn merge_entities_rewrites_links_and_grants() {
        let store = InMemoryStore::new();
        let winner = Entity::new(EntityKind::Llc, "Sunset Holdings LLC");
        let loser = Entity::new(EntityKind::Llc, "Sunset Holdings LLC (dup)");
        let (winner_id, loser_id) = (winner.id.clone(), loser.id.clone());
        store.insert_entity(winner).await.unwrap();
        store.insert_entity(loser.clone()).await.unwrap();

        store
            .link_entity(DocumentEntityLink {
                document_id: "doc-1".to_string(),
                entity_id: loser_id.clone(),
                role: "grantor".to_string(),
                confidence: 0.9,
            })
            .await
            .unwrap();

        let grant = AuthorityGrant {
            id: new_id(),
            document_id: "doc-1".to_string(),
            grantor_entity_id: loser_id.clone(),
            grantee_entity_id: "entity-other".to_string(),
            grant_type: "poa_financial".to_string(),
            scope: serde_json::json!({}),
            effective_date: None,
            expiration_date: None,
            is_active: true,
            revoked_by: None,
            created_at: chrono::Utc::now(),
        };
        store.insert_grant(grant).await.unwrap();

        store.merge_entities(&winner_id, &loser_id).await.unwrap();

        let links = store.list_links_for_document("doc-1").await.unwrap();
        assert!(links.iter().all(|l| l.entity_id != loser_id));
        assert!(links.iter().any(|l| l.entity_id == winner_id));

        let grants = store.list_active_grants().await.unwrap();
        assert!(grants.iter().all(|g| g.grantor_entity_id != loser_id));

        let loser_after = store.get_entity(&loser_id).await.unwrap().unwrap();
        assert_eq!(loser_after.merged_into, Some(winner_id));
    }

    #[tokio::test]
    async fn gap_upsert_increments_occurrence_count() {
        let store = InMemoryStore::new();
        let first = store
            .upsert_knowledge_gap("fp-1", GapType::EntityName, "S___ LLC", vec![], vec![], 0.9)
            .await
            .unwrap();
        assert_eq!(first.occurrence_count, 1);
        let second = store
            .upsert_knowledge_gap("fp-1", GapType::EntityName, "S___ LLC", vec![], vec![], 0.9)
            .await
            .unwrap();
        assert_eq!(second.occurrence_count, 2);
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn apply_correction_returns_previous_value_for_rollback() {
        let store = InMemoryStore::new();
        let mut doc = Document::new_pending(
            "hash".to_string(),
            "key".to_string(),
            "f.pdf".to_string(),
            "application/pdf".to_string(),
            10,
            "u".to_string(),
        );
        doc.extracted_data = Some(serde_json::json!({"effectiveDate": "3/15/2022"}));
        let id = doc.id.clone();
        store.upsert_document(doc).await.unwrap();

        let previous = store
            .apply_correction(&id, "effectiveDate", serde_json::json!("2022-03-15"))
            .await
            .unwrap();
        assert_eq!(previous, serde_json::json!("3/15/2022"));

        // Rollback restores byte-equal metadata (spec §8).
        store
            .apply_correction(&id, "effectiveDate", previous.clone())
            .await
            .unwrap();
        let restored = store.get_document(&id).await.unwrap().unwrap();
        assert_eq!(
            restored.extracted_data,
            Some(serde_json::json!({"effectiveDate": "3/15/2022"}))
        );
    }

    #[tokio::test]
    async fn authority_path_finds_shortest_chain() {
        let store = InMemoryStore::new();
        let a = Entity::new(EntityKind::Person, "Alice");
        let b = Entity::new(EntityKind::Person, "Bob");
        let c = Entity::new(EntityKind::Person, "Carol");
        let (a_id, b_id, c_id) = (a.id.clone(), b.id.clone(), c.id.clone());
        for e in [a, b, c] {
            store.insert_entity(e).await.unwrap();
        }
        store
            .insert_grant(AuthorityGrant {
                id: new_id(),
                document_id: "d1".to_string(),
                grantor_entity_id: a_id.clone(),
                grantee_entity_id: b_id.clone(),
                grant_type: "poa_financial".to_string(),
                scope: serde_json::json!({}),
                effective_date: None,
                expiration_date: None,
                is_active: true,
                revoked_by: None,
                created_at: chrono::Utc::now(),
            })
            .await
            .unwrap();
        store
            .insert_grant(AuthorityGrant {
                id: new_id(),
                document_id: "d2".to_string(),
                grantor_entity_id: b_id.clone(),
                grantee_entity_id: c_id.clone(),
                grant_type: "poa_financial".to_string(),
                scope: serde_json::json!({}),
                effective_date: None,
                expiration_date: None,
                is_active: true,
                revoked_by: None,
                created_at: chrono::Utc::now(),
            })
            .await
            .unwrap();

        let path = store.authority_path(&a_id, &c_id, None).await.unwrap().unwrap();
        assert_eq!(path.len(), 2);
        assert!(store.authority_path(&c_id, &a_id, None).await.unwrap().is_none());
    }
}
