//! Core pipeline for turning ingested legal documents into a queryable
//! knowledge graph of entities, authority grants, and provenance.
//!
//! This crate is storage- and backend-agnostic: it defines the
//! [`store::KnowledgeGraphStore`], [`vector::VectorIndex`], and
//! [`backend`] trait seams, and implements the pipeline logic
//! ([`ingestion`], [`workflow`], [`duplicate_hunter`], [`accuracy_guardian`],
//! [`review`]) purely in terms of those traits, plus ready-to-use
//! in-memory implementations for testing. Production deployments plug in
//! `evidentia-postgres`, `evidentia-qdrant`, and `evidentia-anthropic`.
//!
//! [`api::EvidentiaApi`] is the single façade a transport layer (the CLI,
//! an HTTP server, ...) should depend on; everything else is exposed for
//! composing a custom deployment or for tests that need finer control.

pub mod accuracy_guardian;
pub mod api;
pub mod backend;
pub mod config;
pub mod duplicate_hunter;
pub mod error;
pub mod extraction;
pub mod hash;
mod jsonpath;
pub mod ingestion;
pub mod model;
pub mod retry;
pub mod review;
pub mod store;
pub mod vector;
pub mod workflow;

/// Convenient re-exports of the types most callers need.
pub mod prelude {
    pub use crate::accuracy_guardian::{AccuracyGuardian, BulkApplyReport, GapResolutionReport, RuleScanReport};
    pub use crate::api::EvidentiaApi;
    pub use crate::backend::{BlobStorage, EmbeddingBackend, OcrResult, VisionExtractionBackend};
    pub use crate::config::Config;
    pub use crate::duplicate_hunter::DuplicateHunter;
    pub use crate::error::{Error, Result};
    pub use crate::extraction::{DocumentHeader, ExtractedAuthorityGrant, ExtractedDocumentData, ExtractedParty, ExtractedUnknown};
    pub use crate::ingestion::{IngestionGateway, SubmitOutcome};
    pub use crate::model::*;
    pub use crate::review::ReviewQueue;
    pub use crate::store::{InMemoryStore, KnowledgeGraphStore};
    pub use crate::vector::{InMemoryVectorIndex, VectorIndex, VectorMatch};
    pub use crate::workflow::WorkflowEngine;
}
