//! Ingestion Gateway (spec §4.1): the single entry point for new document
//! bytes. Responsible for content-hash dedup, write-once blob storage, and
//! handing a pending [`Document`] off to the Workflow Engine.

use crate::backend::BlobStorage;
use crate::error::Result;
use crate::hash::content_hash;
use crate::model::Document;
use crate::store::KnowledgeGraphStore;
use std::sync::Arc;

/// Outcome of a submission: either a freshly-created pending document, or
/// the existing document that already has this content (spec §4.1,
/// §8 "ingestion idempotence").
#[derive(Debug, Clone)]
pub enum SubmitOutcome {
    /// No document with this content hash existed; a new pending
    /// document was created and should be handed to the Workflow Engine.
    Created(Document),
    /// A document with this content hash already exists; ingestion is a
    /// no-op and the existing document is returned unchanged.
    AlreadyExists(Document),
}

impl SubmitOutcome {
    /// The document either created or found, regardless of which branch
    /// fired.
    pub fn document(&self) -> &Document {
        match self {
            SubmitOutcome::Created(d) | SubmitOutcome::AlreadyExists(d) => d,
        }
    }
}

/// The Ingestion Gateway.
pub struct IngestionGateway {
    store: Arc<dyn KnowledgeGraphStore>,
    blob_storage: Arc<dyn BlobStorage>,
}

impl IngestionGateway {
    /// Construct a gateway over the given store and blob backend.
    pub fn new(store: Arc<dyn KnowledgeGraphStore>, blob_storage: Arc<dyn BlobStorage>) -> Self {
        Self { store, blob_storage }
    }

    /// Submit raw document bytes for ingestion (spec §4.1).
    ///
    /// Hashing happens before any write: if a document with this content
    /// hash already exists, the call is a no-op and returns the existing
    /// document untouched, regardless of `filename`/`uploader` (spec §8
    /// "uploading the same bytes twice ... is a no-op").
    pub async fn submit(
        &self,
        bytes: &[u8],
        filename: &str,
        mime_type: &str,
        uploader: &str,
    ) -> Result<SubmitOutcome> {
        let hash = content_hash(bytes);

        if let Some(existing) = self.store.find_document_by_hash(&hash).await? {
            return Ok(SubmitOutcome::AlreadyExists(existing));
        }

        let storage_key = format!("sha256/{hash}");
        self.blob_storage.put(&storage_key, bytes).await?;

        let document = Document::new_pending(
            hash,
            storage_key,
            filename.to_string(),
            mime_type.to_string(),
            bytes.len() as u64,
            uploader.to_string(),
        );
        self.store.upsert_document(document.clone()).await?;

        Ok(SubmitOutcome::Created(document))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
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
                .ok_or_else(|| crate::error::Error::NotFound(key.to_string()))
        }
    }

    #[tokio::test]
    async fn resubmitting_identical_bytes_is_a_no_op() {
        let store: Arc<dyn KnowledgeGraphStore> = Arc::new(InMemoryStore::new());
        let blobs: Arc<dyn BlobStorage> = Arc::new(FakeBlobStorage::default());
        let gateway = IngestionGateway::new(store.clone(), blobs);

        let first = gateway
            .submit(b"poa content", "poa.pdf", "application/pdf", "uploader-1")
            .await
            .unwrap();
        let SubmitOutcome::Created(first_doc) = first else {
            panic!("expected Created on first submission");
        };

        let second = gateway
            .submit(b"poa content", "poa-renamed.pdf", "application/pdf", "uploader-2")
            .await
            .unwrap();
        let SubmitOutcome::AlreadyExists(second_doc) = second else {
            panic!("expected AlreadyExists on duplicate submission");
        };

        assert_eq!(first_doc.id, second_doc.id);
        assert_eq!(second_doc.filename, "poa.pdf");
        assert_eq!(store.list_documents().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn distinct_bytes_create_distinct_documents() {
        let store: Arc<dyn KnowledgeGraphStore> = Arc::new(InMemoryStore::new());
        let blobs: Arc<dyn BlobStorage> = Arc::new(FakeBlobStorage::default());
        let gateway = IngestionGateway::new(store.clone(), blobs);

        gateway.submit(b"doc a", "a.pdf", "application/pdf", "u").await.unwrap();
        gateway.submit(b"doc b", "b.pdf", "application/pdf", "u").await.unwrap();

        assert_eq!(store.list_documents().await.unwrap().len(), 2);
    }
}
