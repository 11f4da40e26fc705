//! Content-addressed blob storage on the local filesystem.
//!
//! Grounded on the teacher's `FilesystemStorage` (the package registry's
//! content-addressed cache): write-then-rename for atomicity, a
//! two-character fan-out directory so a large corpus doesn't land every
//! blob in one directory. Document storage keys already carry their own
//! `sha256/<hex>` prefix (the Ingestion Gateway built them that way), so
//! this backend just resolves that key onto a path under its root rather
//! than re-deriving the fan-out from a separate content hash type.

use evidentia_core::backend::BlobStorage;
use evidentia_core::error::{Error, Result};
use std::path::{Path, PathBuf};

/// A [`BlobStorage`] backed by files under a root directory.
pub struct FilesystemBlobStorage {
    root: PathBuf,
}

impl FilesystemBlobStorage {
    /// Open (creating if necessary) a blob store rooted at `root`.
    pub fn open(root: impl AsRef<Path>) -> std::io::Result<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

#[async_trait::async_trait]
impl BlobStorage for FilesystemBlobStorage {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::Persistence(format!("creating {}: {e}", parent.display())))?;
        }
        let temp_path = path.with_extension("tmp");
        tokio::fs::write(&temp_path, bytes)
            .await
            .map_err(|e| Error::Persistence(format!("writing {}: {e}", temp_path.display())))?;
        tokio::fs::rename(&temp_path, &path)
            .await
            .map_err(|e| Error::Persistence(format!("renaming {}: {e}", path.display())))?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.path_for(key);
        tokio::fs::read(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::NotFound(format!("blob {key}"))
            } else {
                Error::Persistence(format!("reading {}: {e}", path.display()))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemBlobStorage::open(dir.path()).unwrap();
        store.put("sha256/abc", b"content").await.unwrap();
        assert_eq!(store.get("sha256/abc").await.unwrap(), b"content");
    }

    #[tokio::test]
    async fn missing_key_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemBlobStorage::open(dir.path()).unwrap();
        assert!(matches!(store.get("sha256/missing").await, Err(Error::NotFound(_))));
    }
}
