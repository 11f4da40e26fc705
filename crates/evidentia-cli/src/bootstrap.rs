//! Assembles a live [`EvidentiaApi`] from [`Config`] plus the
//! `evidentia-postgres`/`evidentia-qdrant`/`evidentia-anthropic` backends.
//! `evidentia-core` only knows trait objects; this is the one place that
//! picks concrete implementations.

use crate::blob_storage::FilesystemBlobStorage;
use anyhow::{Context, Result};
use evidentia_anthropic::{AnthropicVisionBackend, VoyageEmbeddingBackend};
use evidentia_core::api::EvidentiaApi;
use evidentia_core::backend::{BlobStorage, EmbeddingBackend, VisionExtractionBackend};
use evidentia_core::config::Config;
use evidentia_core::duplicate_hunter::DuplicateHunter;
use evidentia_core::store::KnowledgeGraphStore;
use evidentia_core::vector::VectorIndex;
use evidentia_core::workflow::WorkflowEngine;
use evidentia_postgres::PostgresStore;
use evidentia_qdrant::QdrantVectorIndex;
use std::path::PathBuf;
use std::sync::Arc;

/// Everything a command needs to talk to a running deployment.
pub struct Pipeline {
    pub api: EvidentiaApi,
    pub workflow: Arc<WorkflowEngine>,
}

/// Connect to Postgres and Qdrant, build the Anthropic/Voyage backends,
/// and assemble the API façade. The blob store lives under
/// `$EVIDENTIA_BLOB_DIR` (defaulting to `./evidentia-blobs`) since no
/// object-store backend is wired up yet (see `DESIGN.md`).
pub async fn connect(config: &Config) -> Result<Pipeline> {
    let database_url = config
        .database_url
        .as_deref()
        .context("DATABASE_URL is not set (pass --config or set the env var)")?;
    let store: Arc<dyn KnowledgeGraphStore> = Arc::new(
        PostgresStore::connect(database_url)
            .await
            .context("connecting to Postgres")?,
    );

    let vector_index: Arc<dyn VectorIndex> = Arc::new(
        QdrantVectorIndex::connect(&config.qdrant_url, "evidentia_documents", config.embedding_dimensions as u64)
            .await
            .context("connecting to Qdrant")?,
    );

    let blob_dir = std::env::var("EVIDENTIA_BLOB_DIR").unwrap_or_else(|_| "./evidentia-blobs".to_string());
    let blob_storage: Arc<dyn BlobStorage> =
        Arc::new(FilesystemBlobStorage::open(PathBuf::from(&blob_dir)).with_context(|| format!("opening blob store at {blob_dir}"))?);

    let vision_backend: Arc<dyn VisionExtractionBackend> = Arc::new(AnthropicVisionBackend::new(&config.anthropic_model));
    let embedding_backend: Arc<dyn EmbeddingBackend> = Arc::new(VoyageEmbeddingBackend::new(config.embedding_dimensions));

    let duplicate_hunter = Arc::new(DuplicateHunter::new(store.clone(), vector_index.clone(), config.duplicate_auto_merge_threshold));

    let workflow = Arc::new(WorkflowEngine::new(
        store.clone(),
        vector_index.clone(),
        blob_storage.clone(),
        vision_backend,
        embedding_backend.clone(),
        duplicate_hunter.clone(),
        config,
    ));

    let api = EvidentiaApi::new(
        store,
        vector_index,
        blob_storage,
        embedding_backend,
        workflow.clone(),
        duplicate_hunter,
        config.bulk_apply_batch,
    );

    Ok(Pipeline { api, workflow })
}
