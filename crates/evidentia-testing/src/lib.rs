//! Mock backends and fixture builders for testing the evidence-ingestion
//! pipeline without a database, a vector index, or a network call.
//!
//! This crate exists so [`evidentia_core`]'s Workflow Engine and Duplicate
//! Hunter can be exercised end to end against the seed scenarios (spec §8)
//! using nothing but `evidentia_core::store::InMemoryStore` and
//! `evidentia_core::vector::InMemoryVectorIndex` plus the mocks here.

mod fixtures;
mod mock_blob_storage;
mod mock_embedding;
mod mock_vision;

pub use fixtures::{clean_poa_extraction, uncertain_poa_extraction};
pub use mock_blob_storage::MockBlobStorage;
pub use mock_embedding::MockEmbeddingBackend;
pub use mock_vision::MockVisionBackend;

/// Convenience re-export of everything a test usually needs.
pub mod prelude {
    pub use crate::{clean_poa_extraction, uncertain_poa_extraction, MockBlobStorage, MockEmbeddingBackend, MockVisionBackend};
}
