//! `VectorIndex`: the semantic side of duplicate detection and document
//! search (spec §3, §4.5 "semantic" method).
//!
//! Grounded on the same trait-over-async-trait shape as
//! [`crate::store::KnowledgeGraphStore`], specialized to upsert-by-id plus
//! cosine-similarity search rather than a relational schema.

use crate::error::Result;
use crate::model::VectorRecord;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;

/// A search hit: a document id and its cosine similarity to the query
/// vector, in `[-1, 1]` (in practice `[0, 1]` for the embedding backends
/// this pipeline uses).
#[derive(Debug, Clone)]
pub struct VectorMatch {
    /// Matched document id.
    pub document_id: String,
    /// Cosine similarity to the query vector.
    pub similarity: f64,
}

/// Vector storage and similarity search over document embeddings.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert or replace the vector record for a document. Upserting the
    /// same document id twice replaces the prior embedding and metadata
    /// (spec §4.5: re-embedding on correction must not leave a stale
    /// vector behind).
    async fn upsert(&self, record: VectorRecord) -> Result<()>;

    /// Remove a document's vector record, if present (used when a
    /// document is merged away as a duplicate).
    async fn remove(&self, document_id: &str) -> Result<()>;

    /// Find the `limit` nearest neighbors to `query`, excluding
    /// `exclude_document_id` if given, ordered by descending similarity.
    async fn search(
        &self,
        query: &[f32],
        limit: usize,
        exclude_document_id: Option<&str>,
    ) -> Result<Vec<VectorMatch>>;

    /// Fetch the stored record for a document, if any.
    async fn get(&self, document_id: &str) -> Result<Option<VectorRecord>>;
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f64 = a.iter().zip(b).map(|(x, y)| f64::from(*x) * f64::from(*y)).sum();
    let norm_a: f64 = a.iter().map(|x| f64::from(*x).powi(2)).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| f64::from(*x).powi(2)).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// An in-process [`VectorIndex`] backed by a flat scan. Adequate for tests
/// and for the reference configuration; production deployments use
/// `evidentia-qdrant`.
#[derive(Default)]
pub struct InMemoryVectorIndex {
    records: Mutex<HashMap<String, VectorRecord>>,
}

impl InMemoryVectorIndex {
    /// Construct an empty index.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    async fn upsert(&self, record: VectorRecord) -> Result<()> {
        self.records.lock().insert(record.document_id.clone(), record);
        Ok(())
    }

    async fn remove(&self, document_id: &str) -> Result<()> {
        self.records.lock().remove(document_id);
        Ok(())
    }

    async fn search(
        &self,
        query: &[f32],
        limit: usize,
        exclude_document_id: Option<&str>,
    ) -> Result<Vec<VectorMatch>> {
        let records = self.records.lock();
        let mut matches: Vec<VectorMatch> = records
            .values()
            .filter(|r| exclude_document_id != Some(r.document_id.as_str()))
            .map(|r| VectorMatch {
                document_id: r.document_id.clone(),
                similarity: cosine_similarity(query, &r.embedding),
            })
            .collect();
        matches.sort_by(|a, b| b.similarity.partial_cmp(&a.similarity).unwrap_or(std::cmp::Ordering::Equal));
        matches.truncate(limit);
        Ok(matches)
    }

    async fn get(&self, document_id: &str) -> Result<Option<VectorRecord>> {
        Ok(self.records.lock().get(document_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, embedding: Vec<f32>) -> VectorRecord {
        VectorRecord {
            document_id: id.to_string(),
            embedding,
            document_type: None,
            entity_ids: vec![],
            effective_date: None,
            key_terms: vec![],
        }
    }

    #[tokio::test]
    async fn search_ranks_by_cosine_similarity() {
        let index = InMemoryVectorIndex::new();
        index.upsert(record("a", vec![1.0, 0.0])).await.unwrap();
        index.upsert(record("b", vec![0.0, 1.0])).await.unwrap();
        index.upsert(record("c", vec![0.9, 0.1])).await.unwrap();

        let results = index.search(&[1.0, 0.0], 2, None).await.unwrap();
        assert_eq!(results[0].document_id, "a");
        assert_eq!(results[1].document_id, "c");
    }

    #[tokio::test]
    async fn search_excludes_requested_document() {
        let index = InMemoryVectorIndex::new();
        index.upsert(record("a", vec![1.0, 0.0])).await.unwrap();
        index.upsert(record("b", vec![0.99, 0.01])).await.unwrap();

        let results = index.search(&[1.0, 0.0], 5, Some("a")).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].document_id, "b");
    }

    #[tokio::test]
    async fn upsert_replaces_prior_embedding() {
        let index = InMemoryVectorIndex::new();
        index.upsert(record("a", vec![1.0, 0.0])).await.unwrap();
        index.upsert(record("a", vec![0.0, 1.0])).await.unwrap();
        let stored = index.get("a").await.unwrap().unwrap();
        assert_eq!(stored.embedding, vec![0.0, 1.0]);
    }
}
