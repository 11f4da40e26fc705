//! A deterministic [`EmbeddingBackend`] for testing, grounded on the same
//! "same text in, same vector out" contract real embedding backends are
//! expected to uphold.

use evidentia_core::backend::EmbeddingBackend;
use evidentia_core::error::Result;
use evidentia_core::hash::content_hash;

/// Produces a deterministic vector from a hash of the input text: equal
/// text always yields an equal vector, and distinct text yields distinct
/// vectors with high probability, without any network call.
pub struct MockEmbeddingBackend {
    dimensions: usize,
}

impl MockEmbeddingBackend {
    /// Build a backend producing `dimensions`-wide vectors.
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

impl Default for MockEmbeddingBackend {
    fn default() -> Self {
        Self::new(8)
    }
}

#[async_trait::async_trait]
impl EmbeddingBackend for MockEmbeddingBackend {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let digest = content_hash(text.as_bytes());
        let seed = u64::from_str_radix(&digest[..16], 16).unwrap_or(0);
        Ok((0..self.dimensions)
            .map(|i| {
                let value = seed.wrapping_add(i as u64).wrapping_mul(2_654_435_761);
                ((value % 2000) as f32 / 1000.0) - 1.0
            })
            .collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_text_embeds_identically() {
        let backend = MockEmbeddingBackend::new(16);
        let a = backend.embed("power of attorney").await.unwrap();
        let b = backend.embed("power of attorney").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn distinct_text_embeds_differently() {
        let backend = MockEmbeddingBackend::new(16);
        let a = backend.embed("power of attorney").await.unwrap();
        let b = backend.embed("quarterly earnings report").await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn respects_configured_dimensions() {
        let backend = MockEmbeddingBackend::new(32);
        let vector = backend.embed("anything").await.unwrap();
        assert_eq!(vector.len(), 32);
        assert_eq!(backend.dimensions(), 32);
    }
}
