//! Trait seams for the external collaborators: object storage, a
//! vision/LLM backend, and a text-embedding backend. Each is accessed
//! through a narrow async interface returning a typed failure; the core
//! never embeds credentials and treats every call as fallible with a
//! deadline.

use crate::error::Result;
use crate::extraction::ExtractedDocumentData;
use async_trait::async_trait;

/// Content-addressed, write-once blob storage for uploaded document bytes
/// (spec §6 "Persisted state layout": key = `sha256/<hash>`).
#[async_trait]
pub trait BlobStorage: Send + Sync {
    /// Store `bytes` under `key`. Writing the same key twice is a no-op
    /// (content-addressed storage is idempotent).
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<()>;

    /// Fetch the bytes stored under `key`.
    async fn get(&self, key: &str) -> Result<Vec<u8>>;
}

/// OCR output plus a best-effort hint of whether the source looked like a
/// scanned image or a native PDF, used to pick the OCR branch described in
/// spec §4.2 step 1.
#[derive(Debug, Clone)]
pub struct OcrResult {
    /// Recognized text.
    pub text: String,
    /// A 64-bit perceptual hash of the rendered page(s), used by the
    /// Duplicate Hunter's `phash` method (spec §4.5).
    pub perceptual_hash: u64,
}

/// The vision/LLM backend used by Workflow steps 1–2 (OCR, classification
/// and extraction). Implementations must honor the "forbid guessing"
/// contract from spec §4.3: any field the model is not confident about
/// must come back as a `{{UNKNOWN:...}}` placeholder with a matching
/// `unknowns[]` entry, never a guessed literal.
#[async_trait]
pub trait VisionExtractionBackend: Send + Sync {
    /// Run OCR over the document bytes. `mime_type` selects the PDF vs.
    /// image code path.
    async fn ocr(&self, bytes: &[u8], mime_type: &str) -> Result<OcrResult>;

    /// Classify and extract structured fields from OCR'd text.
    async fn classify_and_extract(&self, ocr_text: &str) -> Result<ExtractedDocumentData>;
}

/// The text-embedding backend used by Workflow step 6.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Embed `text`, returning a dense vector.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Dimensionality of vectors this backend produces.
    fn dimensions(&self) -> usize;
}
