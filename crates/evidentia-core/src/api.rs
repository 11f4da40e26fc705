//! The narrow external surface (spec §6): a single transport-agnostic
//! façade over the Ingestion Gateway, Workflow Engine, Duplicate Hunter,
//! Accuracy Guardian, and review queue. `evidentia-cli` is one concrete
//! caller of this surface; an HTTP server would be another, with no
//! changes needed here.

use crate::accuracy_guardian::{AccuracyGuardian, BulkApplyReport, GapResolutionReport};
use crate::backend::{BlobStorage, EmbeddingBackend};
use crate::duplicate_hunter::DuplicateHunter;
use crate::error::{Error, Result};
use crate::ingestion::{IngestionGateway, SubmitOutcome};
use crate::model::{
    AuthorityGrant, CorrectionQueueItem, CorrectionQueueStatus, CorrectionRule, CorrectionType, CorrectionValueSpec,
    Document, DocumentType, DuplicateCandidate, DuplicateStatus, GapCandidate, GapCandidateSource, GapCandidateStatus,
    GapStatus, KnowledgeGap, MatchCriteria, new_id,
};
use crate::review::ReviewQueue;
use crate::store::KnowledgeGraphStore;
use crate::vector::VectorIndex;
use crate::workflow::WorkflowEngine;
use std::sync::Arc;

/// A ranked document returned by [`EvidentiaApi::search`].
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// The matched document.
    pub document: Document,
    /// Cosine similarity to the query embedding.
    pub similarity: f64,
}

/// Search filters (spec §6 `POST /search`).
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    /// Free-text query, embedded and compared against the vector index.
    pub text: String,
    /// Restrict results to a document type.
    pub document_type: Option<DocumentType>,
    /// Restrict results to documents linked to a given entity.
    pub entity_id: Option<String>,
    /// Restrict results to documents created within this inclusive range.
    pub date_range: Option<(chrono::DateTime<chrono::Utc>, chrono::DateTime<chrono::Utc>)>,
    /// Maximum number of results.
    pub limit: usize,
}

/// Component liveness and queue depths (spec §6 `GET /health`).
#[derive(Debug, Clone)]
pub struct HealthReport {
    /// Documents not yet picked up by the Workflow Engine.
    pub pending_documents: usize,
    /// Documents with an in-flight workflow instance.
    pub processing_documents: usize,
    /// Documents that failed terminally.
    pub failed_documents: usize,
    /// Gaps awaiting resolution.
    pub open_gaps: usize,
    /// Review items awaiting human action.
    pub open_review_items: usize,
    /// Correction queue items awaiting approval or application.
    pub pending_correction_items: usize,
}

/// The pipeline's single external façade.
pub struct EvidentiaApi {
    store: Arc<dyn KnowledgeGraphStore>,
    vector_index: Arc<dyn VectorIndex>,
    embedding_backend: Arc<dyn EmbeddingBackend>,
    ingestion: IngestionGateway,
    workflow: Arc<WorkflowEngine>,
    duplicate_hunter: Arc<DuplicateHunter>,
    accuracy_guardian: AccuracyGuardian,
    review_queue: ReviewQueue,
}

impl EvidentiaApi {
    /// Assemble the façade over already-constructed collaborators. Use
    /// `evidentia-cli`'s bootstrap (or an equivalent) to wire concrete
    /// Postgres/Qdrant/Anthropic backends; tests wire the in-memory ones.
    pub fn new(
        store: Arc<dyn KnowledgeGraphStore>,
        vector_index: Arc<dyn VectorIndex>,
        blob_storage: Arc<dyn BlobStorage>,
        embedding_backend: Arc<dyn EmbeddingBackend>,
        workflow: Arc<WorkflowEngine>,
        duplicate_hunter: Arc<DuplicateHunter>,
        bulk_apply_batch: usize,
    ) -> Self {
        Self {
            ingestion: IngestionGateway::new(store.clone(), blob_storage),
            accuracy_guardian: AccuracyGuardian::new(store.clone(), bulk_apply_batch),
            review_queue: ReviewQueue::new(store.clone(), duplicate_hunter.clone()),
            store,
            vector_index,
            embedding_backend,
            workflow,
            duplicate_hunter,
        }
    }

    /// Submit new document bytes (spec §6 `POST /documents`). If the
    /// content hash is new, the resulting pending document is handed off
    /// to the Workflow Engine in the background; the call itself returns
    /// as soon as the document record is durable, without waiting for
    /// processing to finish (spec §4.1 "hands off ... to the Workflow
    /// Engine").
    pub async fn submit_document(
        &self,
        bytes: &[u8],
        filename: &str,
        mime_type: &str,
        uploader: &str,
    ) -> Result<SubmitOutcome> {
        let outcome = self.ingestion.submit(bytes, filename, mime_type, uploader).await?;
        if let SubmitOutcome::Created(document) = &outcome {
            let workflow = self.workflow.clone();
            let document_id = document.id.clone();
            tokio::spawn(async move {
                if let Err(err) = workflow.run_document(&document_id).await {
                    tracing::error!(document_id = %document_id, error = %err, "workflow run failed");
                }
            });
        }
        Ok(outcome)
    }

    /// Fetch a document by id (spec §6 `GET /documents/{id}`).
    pub async fn get_document(&self, id: &str) -> Result<Option<Document>> {
        self.store.get_document(id).await
    }

    /// Ranked semantic + metadata search (spec §6 `POST /search`).
    pub async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchResult>> {
        let limit = if query.limit == 0 { 10 } else { query.limit };
        let embedding = self.embedding_backend.embed(&query.text).await?;
        // Over-fetch before applying metadata filters, since the vector
        // index has no notion of document type/entity/date.
        let matches = self.vector_index.search(&embedding, limit.saturating_mul(4).max(limit), None).await?;

        let mut results = Vec::with_capacity(limit);
        for candidate in matches {
            if results.len() >= limit {
                break;
            }
            let Some(document) = self.store.get_document(&candidate.document_id).await? else {
                continue;
            };
            if let Some(document_type) = query.document_type {
                if document.document_type != Some(document_type) {
                    continue;
                }
            }
            if let Some((start, end)) = query.date_range {
                if document.created_at < start || document.created_at > end {
                    continue;
                }
            }
            if let Some(ref entity_id) = query.entity_id {
                let links = self.store.list_links_for_document(&document.id).await?;
                if !links.iter().any(|l| &l.entity_id == entity_id) {
                    continue;
                }
            }
            results.push(SearchResult {
                document,
                similarity: candidate.similarity,
            });
        }
        Ok(results)
    }

    /// List knowledge gaps by status (spec §6 `GET /gaps?status=...`).
    pub async fn list_gaps(&self, status: Option<GapStatus>) -> Result<Vec<KnowledgeGap>> {
        match status {
            Some(status) => self.store.list_gaps_by_status(status).await,
            None => self.store.list_unresolved_gaps().await,
        }
    }

    /// Resolve a gap with a human- or system-supplied value (spec §6
    /// `POST /gaps/{id}/resolve`). Records the acceptance as a
    /// [`GapCandidate`] for provenance before fanning the value out to
    /// every occurrence.
    pub async fn resolve_gap(
        &self,
        gap_id: &str,
        value: &str,
        source_type: GapCandidateSource,
        source_document: Option<&str>,
    ) -> Result<GapResolutionReport> {
        self.store
            .add_gap_candidate(GapCandidate {
                id: new_id(),
                gap_id: gap_id.to_string(),
                proposed_value: value.to_string(),
                source_type,
                source_document: source_document.map(str::to_string),
                confidence: 1.0,
                confirmations: 1,
                rejections: 0,
                status: GapCandidateStatus::Accepted,
            })
            .await?;
        self.accuracy_guardian.apply_gap_resolution(gap_id, value, source_document).await
    }

    /// Create a correction rule in `draft` status (spec §6 `POST /rules`).
    #[allow(clippy::too_many_arguments)]
    pub async fn create_rule(
        &self,
        name: &str,
        rule_type: &str,
        match_criteria: MatchCriteria,
        correction_type: CorrectionType,
        correction_value: CorrectionValueSpec,
        requires_approval: bool,
    ) -> Result<CorrectionRule> {
        self.accuracy_guardian
            .create_rule(name, rule_type, match_criteria, correction_type, correction_value, requires_approval)
            .await
    }

    /// Activate a rule (spec §6 `POST /rules/{id}/activate`).
    pub async fn activate_rule(&self, rule_id: &str) -> Result<()> {
        self.accuracy_guardian.activate(rule_id).await
    }

    /// Run a rule, queuing proposed corrections (spec §6
    /// `POST /rules/{id}/apply`).
    pub async fn apply_rule(&self, rule_id: &str) -> Result<u32> {
        self.accuracy_guardian.apply(rule_id).await
    }

    /// List correction queue items by status (spec §6 `GET /queue?status=...`).
    pub async fn list_queue(&self, status: Option<CorrectionQueueStatus>) -> Result<Vec<CorrectionQueueItem>> {
        self.store.list_correction_queue_items(status).await
    }

    /// Approve a queue item (spec §6 `POST /queue/approve`).
    pub async fn approve_queue_item(&self, item_id: &str) -> Result<()> {
        self.accuracy_guardian.approve(item_id).await
    }

    /// Reject a queue item (spec §6 `POST /queue/reject`).
    pub async fn reject_queue_item(&self, item_id: &str) -> Result<()> {
        self.accuracy_guardian.reject(item_id).await
    }

    /// Apply every approved queue item up to the configured batch size
    /// (spec §6 `POST /queue/bulk-apply`).
    pub async fn bulk_apply(&self) -> Result<BulkApplyReport> {
        self.accuracy_guardian.bulk_apply().await
    }

    /// List duplicate candidates by status (spec §6
    /// `GET /duplicates?status=...`).
    pub async fn list_duplicates(&self, status: Option<DuplicateStatus>) -> Result<Vec<DuplicateCandidate>> {
        self.store.list_duplicate_candidates(status).await
    }

    /// Confirm a flagged duplicate pair via its review-queue item (spec
    /// §6 `POST /duplicates/{pair}/confirm`).
    pub async fn confirm_duplicate(&self, review_item_id: &str) -> Result<()> {
        self.review_queue.confirm_duplicate(review_item_id).await
    }

    /// Reject a flagged duplicate pair via its review-queue item (spec
    /// §6 `POST /duplicates/{pair}/reject`).
    pub async fn reject_duplicate(&self, review_item_id: &str) -> Result<()> {
        self.review_queue.reject_duplicate(review_item_id).await
    }

    /// Shortest authority chain between two entities (spec §6
    /// `POST /authority/path`).
    pub async fn authority_path(
        &self,
        from_entity_id: &str,
        to_entity_id: &str,
        as_of: Option<chrono::NaiveDate>,
    ) -> Result<Option<Vec<AuthorityGrant>>> {
        self.store.authority_path(from_entity_id, to_entity_id, as_of).await
    }

    /// Full-corpus duplicate reconciliation, not part of the steady-state
    /// ingest path but exposed for operator-triggered runs (spec §4.5
    /// `scanFull`).
    pub async fn scan_duplicates_full(&self) -> Result<Vec<DuplicateCandidate>> {
        self.duplicate_hunter.scan_full().await
    }

    /// Component liveness and queue depths (spec §6 `GET /health`).
    pub async fn health(&self) -> Result<HealthReport> {
        let documents = self.store.list_documents().await?;
        let pending_documents = documents
            .iter()
            .filter(|d| d.status == crate::model::ProcessingStatus::Pending)
            .count();
        let processing_documents = documents
            .iter()
            .filter(|d| d.status == crate::model::ProcessingStatus::Processing)
            .count();
        let failed_documents = documents
            .iter()
            .filter(|d| d.status == crate::model::ProcessingStatus::Failed)
            .count();
        let open_gaps = self.store.list_unresolved_gaps().await?.len();
        let open_review_items = self
            .store
            .list_review_items(Some(crate::model::ReviewStatus::Open))
            .await?
            .len();
        let pending_correction_items = self
            .store
            .list_correction_queue_items(Some(CorrectionQueueStatus::Pending))
            .await?
            .len();

        Ok(HealthReport {
            pending_documents,
            processing_documents,
            failed_documents,
            open_gaps,
            open_review_items,
            pending_correction_items,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BlobStorage as _, OcrResult, VisionExtractionBackend};
    use crate::config::Config;
    use crate::extraction::{DocumentHeader, ExtractedDocumentData};
    use crate::model::DocumentType;
    use crate::store::InMemoryStore;
    use crate::vector::InMemoryVectorIndex;
    use async_trait::async_trait;
    use dashmap::DashMap;

    #[derive(Default)]
    struct FakeBlobStorage {
        objects: DashMap<String, Vec<u8>>,
    }

    #[async_trait]
    impl BlobStorage for FakeBlobStorage {
        async fn put(&self, key: &str, bytes: &[u8]) -> Result<()> {
            self.objects.insert(key.to_string(), bytes.to_vec());
            Ok(())
        }
        async fn get(&self, key: &str) -> Result<Vec<u8>> {
            self.objects.get(key).map(|v| v.clone()).ok_or_else(|| Error::NotFound(key.to_string()))
        }
    }

    struct FakeVisionBackend;

    #[async_trait]
    impl VisionExtractionBackend for FakeVisionBackend {
        async fn ocr(&self, _bytes: &[u8], _mime_type: &str) -> Result<OcrResult> {
            Ok(OcrResult {
                text: "a financial statement".to_string(),
                perceptual_hash: 1,
            })
        }
        async fn classify_and_extract(&self, _ocr_text: &str) -> Result<ExtractedDocumentData> {
            Ok(ExtractedDocumentData {
                document_type: DocumentType::FinancialStatement,
                header: DocumentHeader {
                    title: None,
                    effective_date: None,
                    expiration_date: None,
                    parties: vec![],
                },
                authority_grants: vec![],
                fields: serde_json::json!({}),
                unknowns: vec![],
            })
        }
    }

    struct FakeEmbeddingBackend;

    #[async_trait]
    impl EmbeddingBackend for FakeEmbeddingBackend {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![1.0, 0.0])
        }
        fn dimensions(&self) -> usize {
            2
        }
    }

    fn build_api() -> EvidentiaApi {
        let store: Arc<dyn KnowledgeGraphStore> = Arc::new(InMemoryStore::new());
        let vectors: Arc<dyn VectorIndex> = Arc::new(InMemoryVectorIndex::new());
        let blobs: Arc<dyn BlobStorage> = Arc::new(FakeBlobStorage::default());
        let embeddings: Arc<dyn EmbeddingBackend> = Arc::new(FakeEmbeddingBackend);
        let vision: Arc<dyn crate::backend::VisionExtractionBackend> = Arc::new(FakeVisionBackend);
        let hunter = Arc::new(DuplicateHunter::new(store.clone(), vectors.clone(), 0.98));
        let config = Config::default();
        let workflow = Arc::new(WorkflowEngine::new(
            store.clone(),
            vectors.clone(),
            blobs.clone(),
            vision,
            embeddings.clone(),
            hunter.clone(),
            &config,
        ));
        EvidentiaApi::new(store, vectors, blobs, embeddings, workflow, hunter, config.bulk_apply_batch)
    }

    #[tokio::test]
    async fn submitting_twice_is_idempotent_and_second_call_skips_workflow() {
        let api = build_api();
        let first = api.submit_document(b"bytes", "a.pdf", "application/pdf", "u").await.unwrap();
        let second = api.submit_document(b"bytes", "a-renamed.pdf", "application/pdf", "u").await.unwrap();
        assert_eq!(first.document().id, second.document().id);
    }

    #[tokio::test]
    async fn health_reports_pending_document_before_workflow_runs() {
        let store: Arc<dyn KnowledgeGraphStore> = Arc::new(InMemoryStore::new());
        let vectors: Arc<dyn VectorIndex> = Arc::new(InMemoryVectorIndex::new());
        let blobs: Arc<dyn BlobStorage> = Arc::new(FakeBlobStorage::default());
        let embeddings: Arc<dyn EmbeddingBackend> = Arc::new(FakeEmbeddingBackend);
        let vision: Arc<dyn crate::backend::VisionExtractionBackend> = Arc::new(FakeVisionBackend);
        let hunter = Arc::new(DuplicateHunter::new(store.clone(), vectors.clone(), 0.98));
        let config = Config::default();
        let workflow = Arc::new(WorkflowEngine::new(
            store.clone(),
            vectors.clone(),
            blobs.clone(),
            vision,
            embeddings.clone(),
            hunter.clone(),
            &config,
        ));

        let document = Document::new_pending(
            "hash".to_string(),
            "sha256/hash".to_string(),
            "f.pdf".to_string(),
            "application/pdf".to_string(),
            10,
            "u".to_string(),
        );
        store.upsert_document(document).await.unwrap();

        let api = EvidentiaApi::new(store, vectors, blobs, embeddings, workflow, hunter, config.bulk_apply_batch);
        let health = api.health().await.unwrap();
        assert_eq!(health.pending_documents, 1);
    }
}
