//! An in-memory [`BlobStorage`] for testing the Ingestion Gateway and
//! Workflow Engine without a real object store.

use evidentia_core::backend::BlobStorage;
use evidentia_core::error::{Error, Result};
use parking_lot::Mutex;
use std::collections::HashMap;

/// Write-once, content-addressed in the same sense the real backends are
/// (spec §6), but backed by a `HashMap` instead of a network call.
#[derive(Default)]
pub struct MockBlobStorage {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl MockBlobStorage {
    /// Build an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl BlobStorage for MockBlobStorage {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<()> {
        self.objects.lock().insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        self.objects
            .lock()
            .get(key)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("blob {key}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let store = MockBlobStorage::new();
        store.put("sha256/abc", b"content").await.unwrap();
        assert_eq!(store.get("sha256/abc").await.unwrap(), b"content");
    }

    #[tokio::test]
    async fn missing_key_is_not_found() {
        let store = MockBlobStorage::new();
        assert!(matches!(store.get("missing").await, Err(Error::NotFound(_))));
    }
}
