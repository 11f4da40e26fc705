//! End-to-end runs of the Workflow Engine against the seed scenarios
//! (spec §8), driven through the public API with the in-memory store and
//! vector index plus `evidentia-testing`'s mock backends. Exact-duplicate
//! upload (scenario 5) already has dedicated coverage in
//! `ingestion.rs`'s own test module and is not repeated here.

use evidentia_core::accuracy_guardian::AccuracyGuardian;
use evidentia_core::backend::{BlobStorage, OcrResult};
use evidentia_core::config::Config;
use evidentia_core::duplicate_hunter::DuplicateHunter;
use evidentia_core::model::{
    CorrectionQueueStatus, CorrectionType, CorrectionValueSpec, DocumentType, EntityKind, GapCandidateStatus,
    MatchCriteria, ProcessingStatus,
};
use evidentia_core::store::{InMemoryStore, KnowledgeGraphStore};
use evidentia_core::vector::InMemoryVectorIndex;
use evidentia_core::workflow::WorkflowEngine;
use evidentia_testing::{clean_poa_extraction, uncertain_poa_extraction, MockBlobStorage, MockEmbeddingBackend, MockVisionBackend};
use std::sync::Arc;

struct Harness {
    store: Arc<InMemoryStore>,
    blobs: Arc<MockBlobStorage>,
    workflow: Arc<WorkflowEngine>,
}

fn build_harness(vision: MockVisionBackend) -> Harness {
    let store = Arc::new(InMemoryStore::new());
    let vectors: Arc<InMemoryVectorIndex> = Arc::new(InMemoryVectorIndex::new());
    let store_dyn: Arc<dyn KnowledgeGraphStore> = store.clone();
    let vectors_dyn: Arc<dyn evidentia_core::vector::VectorIndex> = vectors.clone();
    let blobs = Arc::new(MockBlobStorage::new());
    let embeddings = Arc::new(MockEmbeddingBackend::new(8));
    let hunter = Arc::new(DuplicateHunter::new(store_dyn.clone(), vectors_dyn.clone(), 0.98));
    let config = Config::default();
    let workflow = Arc::new(WorkflowEngine::new(
        store_dyn,
        vectors_dyn,
        blobs.clone(),
        Arc::new(vision),
        embeddings,
        hunter,
        &config,
    ));
    Harness { store, blobs, workflow }
}

#[tokio::test]
async fn clean_poa_ingest_resolves_entities_and_grant() {
    let ocr_text = "POWER OF ATTORNEY granting healthcare authority";
    let extraction = clean_poa_extraction("Alice Smith", "Bob Jones", chrono::NaiveDate::from_ymd_opt(2022, 3, 15).unwrap());

    let vision = MockVisionBackend::new()
        .with_ocr(
            "poa bytes",
            OcrResult {
                text: ocr_text.to_string(),
                perceptual_hash: 123,
            },
        )
        .with_extraction(ocr_text, extraction);
    let harness = build_harness(vision);

    let document = evidentia_core::model::Document::new_pending(
        evidentia_core::hash::content_hash(b"poa bytes"),
        "sha256/poa".to_string(),
        "poa.pdf".to_string(),
        "application/pdf".to_string(),
        9,
        "tester".to_string(),
    );
    let document_id = document.id.clone();
    harness.store.upsert_document(document).await.unwrap();
    harness.blobs.put("sha256/poa", b"poa bytes").await.unwrap();

    harness.workflow.run_document(&document_id).await.unwrap();

    let stored = harness.store.get_document(&document_id).await.unwrap().unwrap();
    assert_eq!(stored.status, ProcessingStatus::Completed);

    let links = harness.store.list_links_for_document(&document_id).await.unwrap();
    assert_eq!(links.len(), 2);

    let grantor = harness.store.find_entity_by_normalized_name(&evidentia_core::hash::normalize_text("Alice Smith")).await.unwrap();
    let grantee = harness.store.find_entity_by_normalized_name(&evidentia_core::hash::normalize_text("Bob Jones")).await.unwrap();
    assert!(grantor.is_some());
    assert!(grantee.is_some());
    assert_eq!(grantor.unwrap().kind, EntityKind::Person);

    let path = harness
        .store
        .authority_path(&links[0].entity_id, &links[1].entity_id, None)
        .await
        .unwrap();
    assert!(path.is_some() || harness.store.authority_path(&links[1].entity_id, &links[0].entity_id, None).await.unwrap().is_some());
}

#[tokio::test]
async fn uncertain_extraction_registers_a_knowledge_gap_instead_of_guessing() {
    let ocr_text = "POWER OF ATTORNEY for an unnamed entity";
    let extraction = uncertain_poa_extraction("S___ LLC", "Bob Jones", vec![]);

    let vision = MockVisionBackend::new()
        .with_ocr(
            "uncertain bytes",
            OcrResult {
                text: ocr_text.to_string(),
                perceptual_hash: 456,
            },
        )
        .with_extraction(ocr_text, extraction);
    let harness = build_harness(vision);

    let document = evidentia_core::model::Document::new_pending(
        evidentia_core::hash::content_hash(b"uncertain bytes"),
        "sha256/uncertain".to_string(),
        "uncertain.pdf".to_string(),
        "application/pdf".to_string(),
        16,
        "tester".to_string(),
    );
    let document_id = document.id.clone();
    harness.store.upsert_document(document).await.unwrap();
    harness.blobs.put("sha256/uncertain", b"uncertain bytes").await.unwrap();

    harness.workflow.run_document(&document_id).await.unwrap();

    let stored = harness.store.get_document(&document_id).await.unwrap().unwrap();
    assert_eq!(stored.status, ProcessingStatus::Completed);

    let gaps = harness.store.list_unresolved_gaps().await.unwrap();
    assert_eq!(gaps.len(), 1);
    assert_eq!(gaps[0].gap_type, evidentia_core::model::GapType::EntityName);

    // The grantor was a placeholder, so only the grantee was linked and no
    // grant could be recorded yet.
    let links = harness.store.list_links_for_document(&document_id).await.unwrap();
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].role, "grantee");
}

#[tokio::test]
async fn superseding_grant_deactivates_the_prior_one_and_links_documents() {
    let grantor = "Alice Smith";
    let grantee = "Bob Jones";
    let first_text = "POWER OF ATTORNEY granting financial authority, effective 2022";
    let second_text = "POWER OF ATTORNEY renewing financial authority, effective 2023";

    let first_extraction = clean_poa_extraction(grantor, grantee, chrono::NaiveDate::from_ymd_opt(2022, 3, 15).unwrap());
    let second_extraction = clean_poa_extraction(grantor, grantee, chrono::NaiveDate::from_ymd_opt(2023, 1, 10).unwrap());

    let vision = MockVisionBackend::new()
        .with_ocr(
            "poa bytes 1",
            OcrResult {
                text: first_text.to_string(),
                perceptual_hash: 111,
            },
        )
        .with_extraction(first_text, first_extraction)
        .with_ocr(
            "poa bytes 2",
            OcrResult {
                text: second_text.to_string(),
                perceptual_hash: 222,
            },
        )
        .with_extraction(second_text, second_extraction);
    let harness = build_harness(vision);

    let first_document = evidentia_core::model::Document::new_pending(
        evidentia_core::hash::content_hash(b"poa bytes 1"),
        "sha256/poa1".to_string(),
        "poa1.pdf".to_string(),
        "application/pdf".to_string(),
        11,
        "tester".to_string(),
    );
    let first_id = first_document.id.clone();
    harness.store.upsert_document(first_document).await.unwrap();
    harness.blobs.put("sha256/poa1", b"poa bytes 1").await.unwrap();
    harness.workflow.run_document(&first_id).await.unwrap();

    let grantor_entity = harness
        .store
        .find_entity_by_normalized_name(&evidentia_core::hash::normalize_text(grantor))
        .await
        .unwrap()
        .unwrap();
    let grantee_entity = harness
        .store
        .find_entity_by_normalized_name(&evidentia_core::hash::normalize_text(grantee))
        .await
        .unwrap()
        .unwrap();
    let old_grant = harness
        .store
        .find_active_grant(&grantor_entity.id, &grantee_entity.id, "poa_healthcare")
        .await
        .unwrap()
        .expect("first ingest should have created an active grant");

    let second_document = evidentia_core::model::Document::new_pending(
        evidentia_core::hash::content_hash(b"poa bytes 2"),
        "sha256/poa2".to_string(),
        "poa2.pdf".to_string(),
        "application/pdf".to_string(),
        11,
        "tester".to_string(),
    );
    let second_id = second_document.id.clone();
    harness.store.upsert_document(second_document).await.unwrap();
    harness.blobs.put("sha256/poa2", b"poa bytes 2").await.unwrap();
    harness.workflow.run_document(&second_id).await.unwrap();

    let new_grant = harness
        .store
        .find_active_grant(&grantor_entity.id, &grantee_entity.id, "poa_healthcare")
        .await
        .unwrap()
        .expect("second ingest should leave one active grant");
    assert_ne!(new_grant.id, old_grant.id);

    let old_grant = harness.store.get_grant(&old_grant.id).await.unwrap().unwrap();
    assert!(!old_grant.is_active);
    assert_eq!(old_grant.revoked_by, Some(new_grant.id.clone()));

    let active_for_pair: Vec<_> = harness
        .store
        .list_active_grants()
        .await
        .unwrap()
        .into_iter()
        .filter(|g| g.grantor_entity_id == grantor_entity.id && g.grantee_entity_id == grantee_entity.id)
        .collect();
    assert_eq!(active_for_pair.len(), 1);

    let first_document = harness.store.get_document(&first_id).await.unwrap().unwrap();
    let second_document = harness.store.get_document(&second_id).await.unwrap().unwrap();
    assert_eq!(first_document.superseded_by, Some(second_id.clone()));
    assert_eq!(second_document.supersedes, Some(first_id.clone()));
}

#[tokio::test]
async fn cross_document_gap_match_is_proposed_and_resolution_fans_out() {
    let uncertain_text = "POWER OF ATTORNEY for an unnamed entity";
    let uncertain_extraction = uncertain_poa_extraction("S___ LLC", "Bob Jones", vec!["Sunset Holdings LLC".to_string()]);

    let matching_text = "Correspondence referencing Sunset Holdings LLC as the managing member";
    let matching_extraction = evidentia_core::extraction::ExtractedDocumentData {
        document_type: DocumentType::Correspondence,
        header: evidentia_core::extraction::DocumentHeader {
            title: None,
            effective_date: None,
            expiration_date: None,
            parties: vec![],
        },
        authority_grants: vec![],
        fields: serde_json::json!({}),
        unknowns: vec![],
    };

    let vision = MockVisionBackend::new()
        .with_ocr(
            "uncertain bytes",
            OcrResult {
                text: uncertain_text.to_string(),
                perceptual_hash: 456,
            },
        )
        .with_extraction(uncertain_text, uncertain_extraction)
        .with_ocr(
            "matching bytes",
            OcrResult {
                text: matching_text.to_string(),
                perceptual_hash: 789,
            },
        )
        .with_extraction(matching_text, matching_extraction);
    let harness = build_harness(vision);

    let first_document = evidentia_core::model::Document::new_pending(
        evidentia_core::hash::content_hash(b"uncertain bytes"),
        "sha256/uncertain2".to_string(),
        "uncertain2.pdf".to_string(),
        "application/pdf".to_string(),
        16,
        "tester".to_string(),
    );
    let first_id = first_document.id.clone();
    harness.store.upsert_document(first_document).await.unwrap();
    harness.blobs.put("sha256/uncertain2", b"uncertain bytes").await.unwrap();
    harness.workflow.run_document(&first_id).await.unwrap();

    let gaps = harness.store.list_unresolved_gaps().await.unwrap();
    assert_eq!(gaps.len(), 1);
    let gap = gaps[0].clone();

    let second_document = evidentia_core::model::Document::new_pending(
        evidentia_core::hash::content_hash(b"matching bytes"),
        "sha256/matching".to_string(),
        "matching.pdf".to_string(),
        "application/pdf".to_string(),
        32,
        "tester".to_string(),
    );
    let second_id = second_document.id.clone();
    harness.store.upsert_document(second_document).await.unwrap();
    harness.blobs.put("sha256/matching", b"matching bytes").await.unwrap();
    harness.workflow.run_document(&second_id).await.unwrap();

    let candidates = harness.store.list_gap_candidates(&gap.id).await.unwrap();
    assert_eq!(candidates.len(), 1);
    let candidate = &candidates[0];
    assert!(matches!(candidate.source_type, evidentia_core::model::GapCandidateSource::DocumentMatch));
    assert_eq!(candidate.source_document, Some(second_id.clone()));
    assert!(candidate.confidence > 0.85);
    assert_eq!(candidate.status, GapCandidateStatus::Proposed);

    harness
        .store
        .set_gap_candidate_status(&candidate.id, GapCandidateStatus::Accepted)
        .await
        .unwrap();

    let store_dyn: Arc<dyn KnowledgeGraphStore> = harness.store.clone();
    let guardian = AccuracyGuardian::new(store_dyn, 100);
    let report = guardian
        .apply_gap_resolution(&gap.id, "Sunset Holdings LLC", Some(&second_id))
        .await
        .unwrap();

    assert_eq!(report.documents_updated, 1);
    assert_eq!(report.entities_created, 1);

    let resolved_document = harness.store.get_document(&first_id).await.unwrap().unwrap();
    assert_eq!(
        resolved_document.extracted_data.unwrap()["header"]["parties"][0]["name"],
        serde_json::json!("Sunset Holdings LLC")
    );
}

#[tokio::test]
async fn regex_correction_rule_normalizes_five_documents_effective_dates() {
    let store: Arc<dyn KnowledgeGraphStore> = Arc::new(InMemoryStore::new());
    let guardian = AccuracyGuardian::new(store.clone(), 100);

    let mut document_ids = Vec::new();
    for i in 0..5 {
        let mut document = evidentia_core::model::Document::new_pending(
            format!("hash-{i}"),
            format!("sha256/bad-date-{i}"),
            format!("doc-{i}.pdf"),
            "application/pdf".to_string(),
            10,
            "tester".to_string(),
        );
        document.document_type = Some(DocumentType::PowerOfAttorney);
        document.extracted_data = Some(serde_json::json!({
            "header": {"effectiveDate": "3/15/2022", "parties": []},
            "fields": {},
        }));
        document_ids.push(document.id.clone());
        store.upsert_document(document).await.unwrap();
    }

    let rule = guardian
        .create_rule(
            "normalize effective date format",
            "date_extraction",
            MatchCriteria {
                field_path: Some("header.effectiveDate".to_string()),
                ..Default::default()
            },
            CorrectionType::Regex,
            CorrectionValueSpec::Regex {
                pattern: r"^(\d{1,2})/(\d{1,2})/(\d{4})$".to_string(),
                replacement: "$3-$1-$2".to_string(),
            },
            true,
        )
        .await
        .unwrap();
    guardian.activate(&rule.id).await.unwrap();

    let queued = guardian.apply(&rule.id).await.unwrap();
    assert_eq!(queued, 5);

    let pending = store.list_correction_queue_items(Some(CorrectionQueueStatus::Pending)).await.unwrap();
    assert_eq!(pending.len(), 5);
    for item in &pending {
        assert_eq!(item.confidence, 0.90);
        guardian.approve(&item.id).await.unwrap();
    }

    let report = guardian.bulk_apply().await.unwrap();
    assert_eq!(report.applied, 5);

    for id in &document_ids {
        let updated = store.get_document(id).await.unwrap().unwrap();
        assert_eq!(
            updated.extracted_data.unwrap()["header"]["effectiveDate"],
            serde_json::json!("2022-03-15")
        );
    }
}
