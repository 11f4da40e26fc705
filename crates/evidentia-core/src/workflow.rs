//! The Workflow Engine (spec §4.2): the eight-step pipeline that turns a
//! pending [`Document`] into a fully-linked node in the knowledge graph.
//!
//! Durability comes from the append-only [`ProcessingLog`]: each step
//! writes a `succeeded` entry only after its side effects have committed
//! to the Knowledge Graph Store, so crash recovery is "fold over the log
//! for this document and resume at the first step with no `succeeded`
//! entry" (spec §9 design note) — grounded on the teacher's `checkpoint.rs`
//! resume-from-persisted-state philosophy, adapted from a single
//! checkpoint blob to a per-step log because steps here have individually
//! observable side effects on a shared store, not one opaque state blob.
//!
//! Documents run sequentially through their own eight steps; multiple
//! documents run concurrently, bounded by `Config::max_inflight_documents`
//! via a `tokio::sync::Semaphore` (spec §4.2 "parallel across documents,
//! sequential per document").

use crate::backend::{BlobStorage, EmbeddingBackend, VisionExtractionBackend};
use crate::config::Config;
use crate::duplicate_hunter::DuplicateHunter;
use crate::error::{Error, Result};
use crate::extraction::ExtractedDocumentData;
use crate::hash::gap_fingerprint;
use crate::model::{
    DocumentEntityLink, Entity, EntityKind, GapCandidate, GapCandidateSource, GapCandidateStatus, GapOccurrence,
    LogStatus, ProcessingLog, ProcessingStatus, VectorRecord, new_id,
};
use crate::retry::WorkflowStep;
use crate::store::KnowledgeGraphStore;
use crate::vector::VectorIndex;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// The Workflow Engine. Owns no mutable state of its own beyond the
/// concurrency semaphore; all durable state lives in the Knowledge Graph
/// Store and vector index.
pub struct WorkflowEngine {
    store: Arc<dyn KnowledgeGraphStore>,
    vector_index: Arc<dyn VectorIndex>,
    blob_storage: Arc<dyn BlobStorage>,
    vision_backend: Arc<dyn VisionExtractionBackend>,
    embedding_backend: Arc<dyn EmbeddingBackend>,
    duplicate_hunter: Arc<DuplicateHunter>,
    inflight: Arc<Semaphore>,
}

impl WorkflowEngine {
    /// Construct an engine over the given collaborators and config.
    pub fn new(
        store: Arc<dyn KnowledgeGraphStore>,
        vector_index: Arc<dyn VectorIndex>,
        blob_storage: Arc<dyn BlobStorage>,
        vision_backend: Arc<dyn VisionExtractionBackend>,
        embedding_backend: Arc<dyn EmbeddingBackend>,
        duplicate_hunter: Arc<DuplicateHunter>,
        config: &Config,
    ) -> Self {
        Self {
            store,
            vector_index,
            blob_storage,
            vision_backend,
            embedding_backend,
            duplicate_hunter,
            inflight: Arc::new(Semaphore::new(config.max_inflight_documents)),
        }
    }

    /// Drive every `pending` document through the pipeline concurrently,
    /// bounded by the in-flight cap. Returns once every document started
    /// by this call has reached a terminal state; a document already
    /// `processing` (left mid-flight by a crashed process) is resumed
    /// rather than skipped.
    pub async fn process_pending(&self) -> Result<()> {
        let documents = self.store.list_documents().await?;
        let mut handles = Vec::new();
        for document in documents {
            if !matches!(document.status, ProcessingStatus::Pending | ProcessingStatus::Processing) {
                continue;
            }
            let permit = self.inflight.clone().acquire_owned().await.map_err(|e| {
                Error::Persistence(format!("workflow semaphore closed: {e}"))
            })?;
            let engine = self.clone_handles();
            let document_id = document.id.clone();
            handles.push(tokio::spawn(async move {
                let _permit = permit;
                engine.run_document(&document_id).await
            }));
        }
        for handle in handles {
            handle
                .await
                .map_err(|e| Error::Persistence(format!("workflow task panicked: {e}")))??;
        }
        Ok(())
    }

    /// A cheap `Arc`-cloned handle usable from a spawned task.
    fn clone_handles(&self) -> Arc<Self> {
        Arc::new(Self {
            store: self.store.clone(),
            vector_index: self.vector_index.clone(),
            blob_storage: self.blob_storage.clone(),
            vision_backend: self.vision_backend.clone(),
            embedding_backend: self.embedding_backend.clone(),
            duplicate_hunter: self.duplicate_hunter.clone(),
            inflight: self.inflight.clone(),
        })
    }

    /// Run (or resume) one document through every remaining step (spec
    /// §4.2). One workflow instance per document; the instance id is the
    /// document id itself, so resuming after a crash is just re-running
    /// this method — already-`succeeded` steps are skipped by consulting
    /// the processing log.
    pub async fn run_document(&self, document_id: &str) -> Result<()> {
        let workflow_instance_id = document_id.to_string();
        let completed = self.completed_steps(&workflow_instance_id).await?;

        let mut document = self
            .store
            .get_document(document_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("document {document_id}")))?;
        document.status = ProcessingStatus::Processing;
        self.store.upsert_document(document).await?;

        for step in WorkflowStep::ALL {
            if completed.contains(&step.name().to_string()) {
                continue;
            }
            let outcome = self.run_step(step, document_id).await;
            match outcome {
                Ok(()) => {
                    self.store
                        .append_processing_log(ProcessingLog {
                            document_id: document_id.to_string(),
                            workflow_instance_id: workflow_instance_id.clone(),
                            step: step.name().to_string(),
                            status: LogStatus::Succeeded,
                            error: None,
                            recorded_at: chrono::Utc::now(),
                        })
                        .await?;
                }
                Err(err) => {
                    self.store
                        .append_processing_log(ProcessingLog {
                            document_id: document_id.to_string(),
                            workflow_instance_id: workflow_instance_id.clone(),
                            step: step.name().to_string(),
                            status: LogStatus::Failed,
                            error: Some(err.to_string()),
                            recorded_at: chrono::Utc::now(),
                        })
                        .await?;
                    if let Some(mut document) = self.store.get_document(document_id).await? {
                        document.status = ProcessingStatus::Failed;
                        document.last_failed_step = Some(step.name().to_string());
                        self.store.upsert_document(document).await?;
                    }
                    return Err(err);
                }
            }
        }

        if let Some(mut document) = self.store.get_document(document_id).await? {
            document.status = ProcessingStatus::Completed;
            self.store.upsert_document(document).await?;
        }
        Ok(())
    }

    async fn completed_steps(&self, workflow_instance_id: &str) -> Result<std::collections::HashSet<String>> {
        Ok(self
            .store
            .get_processing_log(workflow_instance_id)
            .await?
            .into_iter()
            .filter(|entry| entry.status == LogStatus::Succeeded)
            .map(|entry| entry.step)
            .collect())
    }

    async fn run_step(&self, step: WorkflowStep, document_id: &str) -> Result<()> {
        let policy = step.retry_policy();
        match step {
            WorkflowStep::Ocr => {
                policy.run(step, || self.step_ocr(document_id)).await
            }
            WorkflowStep::Classification => {
                policy.run(step, || self.step_classification(document_id)).await
            }
            WorkflowStep::RegisterGaps => {
                policy.run(step, || self.step_register_gaps(document_id)).await
            }
            WorkflowStep::EntityResolution => {
                policy.run(step, || self.step_entity_resolution(document_id)).await
            }
            WorkflowStep::AuthorityGraphUpdate => {
                policy.run(step, || self.step_authority_graph_update(document_id)).await
            }
            WorkflowStep::Embedding => {
                policy.run(step, || self.step_embedding(document_id)).await
            }
            WorkflowStep::PostIngestDuplicateCheck => {
                policy
                    .run(step, || self.step_post_ingest_duplicate_check(document_id))
                    .await
            }
            WorkflowStep::Finalize => policy.run(step, || self.step_finalize(document_id)).await,
        }
    }

    async fn document_or_not_found(&self, document_id: &str) -> Result<crate::model::Document> {
        self.store
            .get_document(document_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("document {document_id}")))
    }

    /// Step 1: OCR the uploaded bytes.
    async fn step_ocr(&self, document_id: &str) -> Result<()> {
        let mut document = self.document_or_not_found(document_id).await?;
        let bytes = self.blob_storage.get(&document.storage_key).await?;
        let result = self.vision_backend.ocr(&bytes, &document.mime_type).await.map_err(|e| {
            Error::OcrFailed {
                document_id: document_id.to_string(),
                reason: e.to_string(),
            }
        })?;
        document.ocr_text = Some(result.text);
        document.perceptual_hash = Some(result.perceptual_hash);
        self.store.upsert_document(document).await
    }

    /// Step 2: classify the document type and extract structured fields,
    /// enforcing the "uncertainty is a schema element" contract (spec
    /// §4.3) before persisting anything.
    async fn step_classification(&self, document_id: &str) -> Result<()> {
        let mut document = self.document_or_not_found(document_id).await?;
        let ocr_text = document.ocr_text.clone().unwrap_or_default();
        let extracted = self
            .vision_backend
            .classify_and_extract(&ocr_text)
            .await
            .map_err(|e| Error::ExtractionFailed {
                document_id: document_id.to_string(),
                reason: e.to_string(),
            })?;
        extracted.validate(document_id)?;

        document.document_type = Some(extracted.document_type);
        document.extracted_data = Some(serde_json::to_value(&extracted).map_err(|e| Error::ExtractionFailed {
            document_id: document_id.to_string(),
            reason: format!("extracted data not serializable: {e}"),
        })?);
        self.store.upsert_document(document).await
    }

    /// Step 3: register every declared unknown as a (deduplicated)
    /// knowledge gap, with one occurrence recorded per sighting, then check
    /// whether this document's own text/type resolves any other open gap.
    async fn step_register_gaps(&self, document_id: &str) -> Result<()> {
        let document = self.document_or_not_found(document_id).await?;
        let extracted = self.load_extracted(&document)?;
        let located = extracted.locate_unknowns();

        for (absolute_path, unknown) in located {
            let gap_type_token = crate::extraction::gap_type_token(unknown.gap_type);
            let fingerprint = gap_fingerprint(gap_type_token, &unknown.partial_value, &unknown.context_clues);
            let gap = self
                .store
                .upsert_knowledge_gap(
                    &fingerprint,
                    unknown.gap_type,
                    &unknown.partial_value,
                    unknown.context_clues.clone(),
                    unknown.resolution_hints.clone(),
                    0.90,
                )
                .await?;
            self.store
                .append_gap_occurrence(GapOccurrence {
                    gap_id: gap.id,
                    document_id: document_id.to_string(),
                    field_path: absolute_path,
                    page: unknown.page,
                    bounding_box: unknown.bounding_box,
                    surrounding_text: unknown.surrounding_text.clone(),
                    local_context: unknown.surrounding_text.clone(),
                    extraction_confidence: unknown.confidence,
                    placeholder_value: crate::extraction::format_placeholder(
                        unknown.gap_type,
                        &unknown.partial_value,
                    ),
                })
                .await?;
        }

        self.match_gaps_against_document(&document).await?;
        Ok(())
    }

    /// Compare every still-open gap's clues/hints against this document's
    /// own OCR text and type; where the overlap clears 0.85, record a
    /// `document_match` candidate pointing back at this document.
    async fn match_gaps_against_document(&self, document: &crate::model::Document) -> Result<()> {
        let Some(ocr_text) = document.ocr_text.as_deref() else {
            return Ok(());
        };
        let mut doc_tokens = crate::duplicate_hunter::token_set(ocr_text);
        if let Some(document_type) = document.document_type {
            doc_tokens.extend(crate::duplicate_hunter::token_set(&format!("{document_type:?}")));
        }

        for gap in self.store.list_unresolved_gaps().await? {
            if gap.context_clues.is_empty() && gap.resolution_hints.is_empty() {
                continue;
            }
            let mut clue_tokens = std::collections::HashSet::new();
            for clue in gap.context_clues.iter().chain(gap.resolution_hints.iter()) {
                clue_tokens.extend(crate::duplicate_hunter::token_set(clue));
            }
            if clue_tokens.is_empty() {
                continue;
            }
            let hits = clue_tokens.intersection(&doc_tokens).count();
            let confidence = hits as f64 / clue_tokens.len() as f64;
            if confidence <= 0.85 {
                continue;
            }
            let proposed_value = gap
                .resolution_hints
                .first()
                .cloned()
                .unwrap_or_else(|| gap.partial_value.clone());
            self.store
                .add_gap_candidate(GapCandidate {
                    id: new_id(),
                    gap_id: gap.id,
                    proposed_value,
                    source_type: GapCandidateSource::DocumentMatch,
                    source_document: Some(document.id.clone()),
                    confidence,
                    confirmations: 0,
                    rejections: 0,
                    status: GapCandidateStatus::Proposed,
                })
                .await?;
        }
        Ok(())
    }

    /// Step 4: resolve every non-placeholder party to an [`Entity`],
    /// creating one if no existing entity matches by normalized name.
    async fn step_entity_resolution(&self, document_id: &str) -> Result<()> {
        let document = self.document_or_not_found(document_id).await?;
        let extracted = self.load_extracted(&document)?;

        for party in &extracted.header.parties {
            if ExtractedDocumentData::is_placeholder(&party.name) {
                continue;
            }
            let kind = parse_entity_kind(party.kind_hint.as_deref());
            let normalized = crate::hash::normalize_text(&party.name);
            let entity_id = match self.store.find_entity_by_normalized_name(&normalized).await? {
                Some(existing) => existing.id,
                None => {
                    let entity = Entity::new(kind, party.name.clone());
                    let id = entity.id.clone();
                    self.store.insert_entity(entity).await?;
                    id
                }
            };
            self.store
                .link_entity(DocumentEntityLink {
                    document_id: document_id.to_string(),
                    entity_id,
                    role: party.role.clone(),
                    confidence: party.confidence,
                })
                .await?;
        }
        Ok(())
    }

    /// Step 5: for every extracted authority grant, resolve its
    /// grantor/grantee roles to the entities linked in step 4, deactivate
    /// any prior active grant for the same `(grantor, grantee, type)`
    /// triple, and insert the new one as active (spec §3 "at most one
    /// active grant" invariant).
    async fn step_authority_graph_update(&self, document_id: &str) -> Result<()> {
        let document = self.document_or_not_found(document_id).await?;
        let extracted = self.load_extracted(&document)?;
        let links = self.store.list_links_for_document(document_id).await?;

        for grant in &extracted.authority_grants {
            let grantor_id = links.iter().find(|l| l.role == grant.grantor_role).map(|l| l.entity_id.clone());
            let grantee_id = links.iter().find(|l| l.role == grant.grantee_role).map(|l| l.entity_id.clone());
            let (Some(grantor_id), Some(grantee_id)) = (grantor_id, grantee_id) else {
                // Grantor or grantee is still an unresolved placeholder;
                // the gap registered in step 3 will eventually resolve it
                // and a later re-run of this step (triggered by gap
                // resolution) will pick up the grant.
                continue;
            };

            let new_grant_id = new_id();

            if let Some(existing) = self
                .store
                .find_active_grant(&grantor_id, &grantee_id, &grant.grant_type)
                .await?
            {
                self.store.deactivate_grant(&existing.id, &new_grant_id).await?;

                if existing.document_id != document_id {
                    if let Some(mut old_document) = self.store.get_document(&existing.document_id).await? {
                        old_document.superseded_by = Some(document_id.to_string());
                        self.store.upsert_document(old_document).await?;
                    }
                    let mut current_document = document.clone();
                    current_document.supersedes = Some(existing.document_id.clone());
                    self.store.upsert_document(current_document).await?;
                }
            }

            self.store
                .insert_grant(crate::model::AuthorityGrant {
                    id: new_grant_id,
                    document_id: document_id.to_string(),
                    grantor_entity_id: grantor_id,
                    grantee_entity_id: grantee_id,
                    grant_type: grant.grant_type.clone(),
                    scope: grant.scope.clone(),
                    effective_date: extracted.header.effective_date,
                    expiration_date: extracted.header.expiration_date,
                    is_active: true,
                    revoked_by: None,
                    created_at: chrono::Utc::now(),
                })
                .await?;
        }
        Ok(())
    }

    /// Step 6: embed the document's text and upsert it into the vector
    /// index.
    async fn step_embedding(&self, document_id: &str) -> Result<()> {
        let document = self.document_or_not_found(document_id).await?;
        let text = document.ocr_text.clone().unwrap_or_default();
        let embedding = self.embedding_backend.embed(&text).await.map_err(|e| Error::EmbeddingFailed {
            document_id: document_id.to_string(),
            reason: e.to_string(),
        })?;

        let links = self.store.list_links_for_document(document_id).await?;
        let extracted = self.load_extracted(&document).ok();

        let record = VectorRecord {
            document_id: document_id.to_string(),
            embedding,
            document_type: document.document_type,
            entity_ids: links.into_iter().map(|l| l.entity_id).collect(),
            effective_date: extracted.as_ref().and_then(|e| e.header.effective_date),
            key_terms: extracted
                .as_ref()
                .map(|e| e.header.parties.iter().map(|p| p.name.clone()).collect())
                .unwrap_or_default(),
        };
        self.vector_index
            .upsert(record)
            .await
            .map_err(|e| Error::VectorUpsertFailed {
                document_id: document_id.to_string(),
                reason: e.to_string(),
            })
    }

    /// Step 7: run the Duplicate Hunter against this one document.
    async fn step_post_ingest_duplicate_check(&self, document_id: &str) -> Result<()> {
        self.duplicate_hunter.scan_document(document_id).await?;
        Ok(())
    }

    /// Step 8: mark the document complete (the overall status transition
    /// happens in `run_document`; this step exists so a crash between
    /// step 7 and the final status write is detectably incomplete rather
    /// than silently treated as done).
    async fn step_finalize(&self, _document_id: &str) -> Result<()> {
        Ok(())
    }

    fn load_extracted(&self, document: &crate::model::Document) -> Result<ExtractedDocumentData> {
        let data = document
            .extracted_data
            .as_ref()
            .ok_or_else(|| Error::Validation(format!("document {} has no extracted data", document.id)))?;
        serde_json::from_value(data.clone())
            .map_err(|e| Error::Validation(format!("document {} extracted data malformed: {e}", document.id)))
    }
}

fn parse_entity_kind(kind_hint: Option<&str>) -> EntityKind {
    match kind_hint.map(str::to_lowercase).as_deref() {
        Some("llc") => EntityKind::Llc,
        Some("corporation") | Some("corp") => EntityKind::Corporation,
        Some("trust") => EntityKind::Trust,
        Some("partnership") => EntityKind::Partnership,
        Some("estate") => EntityKind::Estate,
        _ => EntityKind::Person,
    }
}

/// A way for the Accuracy Guardian's gap-resolution job to trigger a
/// fresh run of the Authority Graph Update step once a blocking gap
/// resolves (spec §4.6: resolving a grantor/grantee name gap should let
/// an already-extracted grant take effect).
impl WorkflowEngine {
    /// Re-run the entity-resolution and authority-graph-update steps for
    /// a document outside the normal step sequence, without touching its
    /// processing log (they are naturally idempotent: re-running them
    /// after a gap resolves simply picks up newly-resolvable links).
    pub async fn reapply_authority_graph(&self, document_id: &str) -> Result<()> {
        self.step_entity_resolution(document_id).await?;
        self.step_authority_graph_update(document_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accuracy_guardian::AccuracyGuardian;
    use crate::backend::OcrResult;
    use crate::extraction::{format_placeholder, DocumentHeader, ExtractedAuthorityGrant, ExtractedParty, ExtractedUnknown};
    use crate::model::{DocumentType, GapType};
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
            self.objects
                .get(key)
                .map(|v| v.clone())
                .ok_or_else(|| Error::NotFound(key.to_string()))
        }
    }

    struct FakeVisionBackend {
        grantor_is_placeholder: bool,
    }

    #[async_trait]
    impl VisionExtractionBackend for FakeVisionBackend {
        async fn ocr(&self, _bytes: &[u8], _mime_type: &str) -> Result<OcrResult> {
            Ok(OcrResult {
                text: "POWER OF ATTORNEY ... Alice Smith grants Bob Jones authority".to_string(),
                perceptual_hash: 0xDEAD_BEEF,
            })
        }

        async fn classify_and_extract(&self, _ocr_text: &str) -> Result<ExtractedDocumentData> {
            let grantor_name = if self.grantor_is_placeholder {
                format_placeholder(GapType::EntityName, "A___ Smith")
            } else {
                "Alice Smith".to_string()
            };
            let unknowns = if self.grantor_is_placeholder {
                vec![ExtractedUnknown {
                    field_path: "parties[0].name".to_string(),
                    gap_type: GapType::EntityName,
                    partial_value: "A___ Smith".to_string(),
                    context_clues: vec!["grantor line".to_string()],
                    resolution_hints: vec![],
                    confidence: 0.4,
                    page: Some(1),
                    bounding_box: None,
                    surrounding_text: "I, A___ Smith, grant".to_string(),
                }]
            } else {
                vec![]
            };
            Ok(ExtractedDocumentData {
                document_type: DocumentType::PowerOfAttorney,
                header: DocumentHeader {
                    title: Some("Power of Attorney".to_string()),
                    effective_date: Some(chrono::NaiveDate::from_ymd_opt(2022, 3, 15).expect("valid date")),
                    expiration_date: None,
                    parties: vec![
                        ExtractedParty {
                            name: grantor_name,
                            role: "grantor".to_string(),
                            kind_hint: Some("person".to_string()),
                            confidence: if self.grantor_is_placeholder { 0.4 } else { 0.95 },
                        },
                        ExtractedParty {
                            name: "Bob Jones".to_string(),
                            role: "grantee".to_string(),
                            kind_hint: Some("person".to_string()),
                            confidence: 0.95,
                        },
                    ],
                },
                authority_grants: vec![ExtractedAuthorityGrant {
                    grantor_role: "grantor".to_string(),
                    grantee_role: "grantee".to_string(),
                    grant_type: "poa_financial".to_string(),
                    scope: serde_json::json!({"description": "all financial matters"}),
                }],
                fields: serde_json::json!({}),
                unknowns,
            })
        }
    }

    struct FakeEmbeddingBackend;

    #[async_trait]
    impl EmbeddingBackend for FakeEmbeddingBackend {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![0.1, 0.2, 0.3])
        }
        fn dimensions(&self) -> usize {
            3
        }
    }

    fn build_engine(
        grantor_is_placeholder: bool,
    ) -> (Arc<WorkflowEngine>, Arc<dyn KnowledgeGraphStore>, Arc<dyn BlobStorage>) {
        let store: Arc<dyn KnowledgeGraphStore> = Arc::new(InMemoryStore::new());
        let vectors: Arc<dyn VectorIndex> = Arc::new(InMemoryVectorIndex::new());
        let blobs: Arc<dyn BlobStorage> = Arc::new(FakeBlobStorage::default());
        let vision: Arc<dyn VisionExtractionBackend> = Arc::new(FakeVisionBackend { grantor_is_placeholder });
        let embeddings: Arc<dyn EmbeddingBackend> = Arc::new(FakeEmbeddingBackend);
        let hunter = Arc::new(DuplicateHunter::new(store.clone(), vectors.clone(), 0.98));
        let config = Config::default();
        let engine = Arc::new(WorkflowEngine::new(
            store.clone(),
            vectors,
            blobs.clone(),
            vision,
            embeddings,
            hunter,
            &config,
        ));
        (engine, store, blobs)
    }

    #[tokio::test]
    async fn full_pipeline_completes_and_links_authority_grant() {
        let (engine, store, blobs) = build_engine(false);
        let mut document = crate::model::Document::new_pending(
            "hash-1".to_string(),
            "sha256/hash-1".to_string(),
            "poa.pdf".to_string(),
            "application/pdf".to_string(),
            100,
            "uploader".to_string(),
        );
        let id = document.id.clone();
        blobs.put(&document.storage_key, b"pdf bytes").await.unwrap();
        document.status = ProcessingStatus::Pending;
        store.upsert_document(document).await.unwrap();

        engine.run_document(&id).await.unwrap();

        let completed = store.get_document(&id).await.unwrap().unwrap();
        assert_eq!(completed.status, ProcessingStatus::Completed);
        assert!(completed.perceptual_hash.is_some());

        let grants = store.list_active_grants().await.unwrap();
        assert_eq!(grants.len(), 1);
        assert_eq!(grants[0].grant_type, "poa_financial");

        let log = store.get_processing_log(&id).await.unwrap();
        assert_eq!(log.len(), 8);
        assert!(log.iter().all(|e| e.status == LogStatus::Succeeded));
    }

    #[tokio::test]
    async fn placeholder_grantor_defers_authority_grant_until_gap_resolved() {
        let (engine, store, blobs) = build_engine(true);
        let mut document = crate::model::Document::new_pending(
            "hash-2".to_string(),
            "sha256/hash-2".to_string(),
            "poa.pdf".to_string(),
            "application/pdf".to_string(),
            100,
            "uploader".to_string(),
        );
        let id = document.id.clone();
        blobs.put(&document.storage_key, b"pdf bytes").await.unwrap();
        document.status = ProcessingStatus::Pending;
        store.upsert_document(document).await.unwrap();

        engine.run_document(&id).await.unwrap();

        assert!(store.list_active_grants().await.unwrap().is_empty());
        let gaps = store.list_gaps_by_status(crate::model::GapStatus::Open).await.unwrap();
        assert_eq!(gaps.len(), 1);

        let guardian = AccuracyGuardian::new(store.clone(), 100);
        guardian
            .apply_gap_resolution(&gaps[0].id, "Alice Smith", Some(&id))
            .await
            .unwrap();

        engine.reapply_authority_graph(&id).await.unwrap();
        let grants = store.list_active_grants().await.unwrap();
        assert_eq!(grants.len(), 1);
    }

    #[tokio::test]
    async fn resuming_after_partial_completion_skips_succeeded_steps() {
        let (engine, store, blobs) = build_engine(false);
        let mut document = crate::model::Document::new_pending(
            "hash-3".to_string(),
            "sha256/hash-3".to_string(),
            "poa.pdf".to_string(),
            "application/pdf".to_string(),
            100,
            "uploader".to_string(),
        );
        let id = document.id.clone();
        blobs.put(&document.storage_key, b"pdf bytes").await.unwrap();
        document.status = ProcessingStatus::Pending;
        store.upsert_document(document).await.unwrap();

        store
            .append_processing_log(ProcessingLog {
                document_id: id.clone(),
                workflow_instance_id: id.clone(),
                step: WorkflowStep::Ocr.name().to_string(),
                status: LogStatus::Succeeded,
                error: None,
                recorded_at: chrono::Utc::now(),
            })
            .await
            .unwrap();

        engine.run_document(&id).await.unwrap();

        let document_after = store.get_document(&id).await.unwrap().unwrap();
        // OCR never ran this time (pre-seeded log entry), so ocr_text/
        // perceptual_hash are still unset, but the rest of the pipeline
        // completed anyway because classification tolerates empty text.
        assert_eq!(document_after.status, ProcessingStatus::Completed);
        assert!(document_after.ocr_text.is_none());
    }
}
