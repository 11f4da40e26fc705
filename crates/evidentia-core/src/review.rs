//! Review queue helpers (spec §3, §6): a human-facing layer over the
//! polymorphic [`ReviewQueueItem`] table that the Duplicate Hunter and
//! Accuracy Guardian both enqueue into.
//!
//! Grounded on the teacher's `approval.rs` request/queue/approve/reject
//! shape: there, a single in-flight approval gated one risky action; here
//! the same "queue it, let a human act, record the resolution" flow is
//! generalized to three source tables sharing one priority-ordered queue.

use crate::duplicate_hunter::DuplicateHunter;
use crate::error::{Error, Result};
use crate::model::{DuplicateStatus, ReviewQueueItem, ReviewSourceTable, ReviewStatus};
use crate::store::KnowledgeGraphStore;
use std::sync::Arc;

/// Read-side and action-side operations over the review queue.
pub struct ReviewQueue {
    store: Arc<dyn KnowledgeGraphStore>,
    duplicate_hunter: Arc<DuplicateHunter>,
}

impl ReviewQueue {
    /// Construct a review queue over the given store and duplicate
    /// hunter (needed so confirming a duplicate can trigger the merge).
    pub fn new(store: Arc<dyn KnowledgeGraphStore>, duplicate_hunter: Arc<DuplicateHunter>) -> Self {
        Self {
            store,
            duplicate_hunter,
        }
    }

    /// List open review items, highest priority first (spec §6
    /// `GET /review-queue`).
    pub async fn list_open(&self) -> Result<Vec<ReviewQueueItem>> {
        let mut items = self.store.list_review_items(Some(ReviewStatus::Open)).await?;
        items.sort_by(|a, b| b.priority.cmp(&a.priority));
        Ok(items)
    }

    /// List open items restricted to one `review_type` (`"duplicate"` or
    /// `"correction"`), highest priority first.
    pub async fn list_open_by_type(&self, review_type: &str) -> Result<Vec<ReviewQueueItem>> {
        Ok(self
            .list_open()
            .await?
            .into_iter()
            .filter(|item| item.review_type == review_type)
            .collect())
    }

    /// A human confirms a flagged duplicate pair: merges the documents
    /// (older wins, per [`DuplicateHunter::merge_documents`]'s semantics)
    /// and marks both the candidate and the review item resolved.
    pub async fn confirm_duplicate(&self, review_item_id: &str) -> Result<()> {
        let item = self.review_item(review_item_id).await?;
        let (a, b) = split_duplicate_source_id(&item.source_id)?;

        let candidate = self
            .store
            .get_duplicate_candidate(&a, &b)
            .await?
            .ok_or_else(|| Error::NotFound(format!("duplicate candidate {a}/{b}")))?;

        let winner_a = self
            .store
            .get_document(&a)
            .await?
            .ok_or_else(|| Error::NotFound(format!("document {a}")))?;
        let winner_b = self
            .store
            .get_document(&b)
            .await?
            .ok_or_else(|| Error::NotFound(format!("document {b}")))?;
        let (winner_id, loser_id) = if winner_a.created_at <= winner_b.created_at {
            (a.clone(), b.clone())
        } else {
            (b.clone(), a.clone())
        };

        self.duplicate_hunter.merge_documents(&winner_id, &loser_id).await?;
        self.store
            .set_duplicate_status(&a, &b, DuplicateStatus::Merged, false)
            .await?;
        let _ = candidate;

        self.store
            .set_review_status(review_item_id, ReviewStatus::Resolved, Some("confirmed duplicate".to_string()))
            .await
    }

    /// A human rejects a flagged duplicate pair: marks the candidate
    /// `not_duplicate` and dismisses the review item without touching
    /// either document.
    pub async fn reject_duplicate(&self, review_item_id: &str) -> Result<()> {
        let item = self.review_item(review_item_id).await?;
        let (a, b) = split_duplicate_source_id(&item.source_id)?;

        self.store
            .set_duplicate_status(&a, &b, DuplicateStatus::NotDuplicate, false)
            .await?;
        self.store
            .set_review_status(review_item_id, ReviewStatus::Dismissed, Some("rejected as not a duplicate".to_string()))
            .await
    }

    /// Dismiss a review item with a free-form note, without acting on the
    /// underlying source record (used when the underlying item has
    /// already been superseded by the time a human looks at it).
    pub async fn dismiss(&self, review_item_id: &str, note: &str) -> Result<()> {
        self.store
            .set_review_status(review_item_id, ReviewStatus::Dismissed, Some(note.to_string()))
            .await
    }

    async fn review_item(&self, review_item_id: &str) -> Result<ReviewQueueItem> {
        self.store
            .list_review_items(None)
            .await?
            .into_iter()
            .find(|i| i.id == review_item_id)
            .ok_or_else(|| Error::NotFound(format!("review item {review_item_id}")))
    }
}

/// Parse a `DuplicateCandidate` review item's `source_id` back into its
/// `(document_id, candidate_document_id)` pair (spec §3 review-queue
/// `source_id` encoding: `"{document_id}:{candidate_document_id}"`).
fn split_duplicate_source_id(source_id: &str) -> Result<(String, String)> {
    source_id
        .split_once(':')
        .map(|(a, b)| (a.to_string(), b.to_string()))
        .ok_or_else(|| Error::Validation(format!("malformed duplicate review source_id: {source_id}")))
}

/// Whether a review item's `source_table` is the one this queue's
/// duplicate-specific actions expect, used by callers that want to guard
/// against calling `confirm_duplicate`/`reject_duplicate` on a
/// correction review item.
pub fn is_duplicate_review(item: &ReviewQueueItem) -> bool {
    item.source_table == ReviewSourceTable::DuplicateCandidate
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Document, DuplicateCandidate, DuplicateMethod, ConfidenceBucket, new_id};
    use crate::store::InMemoryStore;
    use crate::vector::InMemoryVectorIndex;

    fn doc(hash: &str) -> Document {
        Document::new_pending(
            hash.to_string(),
            format!("sha256/{hash}"),
            "f.pdf".to_string(),
            "application/pdf".to_string(),
            100,
            "u".to_string(),
        )
    }

    async fn seed_duplicate_review(store: &Arc<dyn KnowledgeGraphStore>) -> (String, String, String) {
        let mut a = doc("hash-a");
        let mut b = doc("hash-b");
        a.created_at = chrono::Utc::now() - chrono::Duration::days(1);
        b.created_at = chrono::Utc::now();
        store.upsert_document(a.clone()).await.unwrap();
        store.upsert_document(b.clone()).await.unwrap();

        let candidate = DuplicateCandidate::new_pair(&a.id, &b.id, DuplicateMethod::Metadata, 0.82, ConfidenceBucket::Medium);
        store.insert_duplicate_candidate_if_absent(candidate.clone()).await.unwrap();

        let review_id = new_id();
        store
            .enqueue_review_item(ReviewQueueItem {
                id: review_id.clone(),
                source_table: ReviewSourceTable::DuplicateCandidate,
                source_id: format!("{}:{}", candidate.document_id, candidate.candidate_document_id),
                review_type: "duplicate".to_string(),
                priority: 820,
                status: ReviewStatus::Open,
                resolution: None,
            })
            .await
            .unwrap();

        (review_id, a.id, b.id)
    }

    #[tokio::test]
    async fn confirm_duplicate_merges_older_document_wins() {
        let store: Arc<dyn KnowledgeGraphStore> = Arc::new(InMemoryStore::new());
        let vectors = Arc::new(InMemoryVectorIndex::new());
        let hunter = Arc::new(DuplicateHunter::new(store.clone(), vectors, 0.98));
        let queue = ReviewQueue::new(store.clone(), hunter);

        let (review_id, a_id, b_id) = seed_duplicate_review(&store).await;
        queue.confirm_duplicate(&review_id).await.unwrap();

        let winner = store.get_document(&a_id).await.unwrap().unwrap();
        let loser = store.get_document(&b_id).await.unwrap().unwrap();
        assert_eq!(winner.supersedes, Some(b_id));
        assert!(loser.superseded_by.is_some());

        let item = store.list_review_items(Some(ReviewStatus::Resolved)).await.unwrap();
        assert_eq!(item.len(), 1);
        assert_eq!(item[0].id, review_id);
    }

    #[tokio::test]
    async fn reject_duplicate_leaves_documents_untouched() {
        let store: Arc<dyn KnowledgeGraphStore> = Arc::new(InMemoryStore::new());
        let vectors = Arc::new(InMemoryVectorIndex::new());
        let hunter = Arc::new(DuplicateHunter::new(store.clone(), vectors, 0.98));
        let queue = ReviewQueue::new(store.clone(), hunter);

        let (review_id, a_id, b_id) = seed_duplicate_review(&store).await;
        queue.reject_duplicate(&review_id).await.unwrap();

        let a = store.get_document(&a_id).await.unwrap().unwrap();
        let b = store.get_document(&b_id).await.unwrap().unwrap();
        assert!(a.superseded_by.is_none() && a.supersedes.is_none());
        assert!(b.superseded_by.is_none() && b.supersedes.is_none());

        let candidate = store.get_duplicate_candidate(&a_id, &b_id).await.unwrap().unwrap();
        assert_eq!(candidate.status, DuplicateStatus::NotDuplicate);

        let dismissed = store.list_review_items(Some(ReviewStatus::Dismissed)).await.unwrap();
        assert_eq!(dismissed.len(), 1);
    }

    #[tokio::test]
    async fn list_open_orders_by_priority_descending() {
        let store: Arc<dyn KnowledgeGraphStore> = Arc::new(InMemoryStore::new());
        let vectors = Arc::new(InMemoryVectorIndex::new());
        let hunter = Arc::new(DuplicateHunter::new(store.clone(), vectors, 0.98));
        let queue = ReviewQueue::new(store.clone(), hunter);

        for (id, priority) in [("low", 100u32), ("high", 900), ("mid", 500)] {
            store
                .enqueue_review_item(ReviewQueueItem {
                    id: id.to_string(),
                    source_table: ReviewSourceTable::CorrectionQueueItem,
                    source_id: id.to_string(),
                    review_type: "correction".to_string(),
                    priority,
                    status: ReviewStatus::Open,
                    resolution: None,
                })
                .await
                .unwrap();
        }

        let ordered = queue.list_open().await.unwrap();
        let ids: Vec<&str> = ordered.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["high", "mid", "low"]);
    }
}
