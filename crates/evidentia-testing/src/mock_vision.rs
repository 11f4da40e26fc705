//! A scripted [`VisionExtractionBackend`] for testing the Workflow Engine
//! without a network-bound vision model.

use evidentia_core::backend::{OcrResult, VisionExtractionBackend};
use evidentia_core::error::{Error, Result};
use evidentia_core::extraction::ExtractedDocumentData;
use parking_lot::Mutex;
use std::collections::HashMap;

/// A [`VisionExtractionBackend`] whose responses are scripted per input
/// rather than computed, so tests control exactly what each document's OCR
/// text and extraction look like (spec §8 seed scenarios).
///
/// OCR responses are keyed by the raw document bytes (interpreted as
/// UTF-8, since seed fixtures stand in for scanned content with plain
/// text); extraction responses are keyed by the OCR text that would
/// trigger them. A document with no matching script falls back to an
/// empty default rather than panicking, so fixtures only need to script
/// the inputs a test actually cares about.
///
/// # Example
///
/// ```
/// use evidentia_testing::MockVisionBackend;
/// use evidentia_core::backend::OcrResult;
///
/// let backend = MockVisionBackend::new()
///     .with_ocr("poa bytes", OcrResult { text: "Power of Attorney...".to_string(), perceptual_hash: 42 });
/// ```
#[derive(Default)]
pub struct MockVisionBackend {
    ocr_responses: Mutex<HashMap<String, OcrResult>>,
    extraction_responses: Mutex<HashMap<String, ExtractedDocumentData>>,
    calls: Mutex<Vec<String>>,
}

impl MockVisionBackend {
    /// Build an empty backend; chain [`Self::with_ocr`]/[`Self::with_extraction`]
    /// to script responses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the [`OcrResult`] returned when `ocr` is called with bytes
    /// matching `bytes_key` (UTF-8 compared).
    pub fn with_ocr(self, bytes_key: impl Into<String>, result: OcrResult) -> Self {
        self.ocr_responses.lock().insert(bytes_key.into(), result);
        self
    }

    /// Script the [`ExtractedDocumentData`] returned when
    /// `classify_and_extract` is called with `ocr_text`.
    pub fn with_extraction(self, ocr_text: impl Into<String>, data: ExtractedDocumentData) -> Self {
        self.extraction_responses.lock().insert(ocr_text.into(), data);
        self
    }

    /// Every call this backend has served, in order, as `"ocr:<mime>"` or
    /// `"extract:<ocr_text>"` entries.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[async_trait::async_trait]
impl VisionExtractionBackend for MockVisionBackend {
    async fn ocr(&self, bytes: &[u8], mime_type: &str) -> Result<OcrResult> {
        self.calls.lock().push(format!("ocr:{mime_type}"));
        let key = String::from_utf8_lossy(bytes).to_string();
        Ok(self
            .ocr_responses
            .lock()
            .get(&key)
            .cloned()
            .unwrap_or(OcrResult {
                text: String::new(),
                perceptual_hash: 0,
            }))
    }

    async fn classify_and_extract(&self, ocr_text: &str) -> Result<ExtractedDocumentData> {
        self.calls.lock().push(format!("extract:{ocr_text}"));
        self.extraction_responses
            .lock()
            .get(ocr_text)
            .cloned()
            .ok_or_else(|| Error::Collaborator {
                collaborator: "mock-vision".to_string(),
                reason: format!("no scripted extraction for OCR text {ocr_text:?}"),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evidentia_core::model::DocumentType;

    fn sample_extraction() -> ExtractedDocumentData {
        ExtractedDocumentData {
            document_type: DocumentType::Contract,
            header: evidentia_core::extraction::DocumentHeader {
                title: None,
                effective_date: None,
                expiration_date: None,
                parties: vec![],
            },
            authority_grants: vec![],
            fields: serde_json::json!({}),
            unknowns: vec![],
        }
    }

    #[tokio::test]
    async fn scripted_ocr_response_is_returned_for_matching_bytes() {
        let backend = MockVisionBackend::new().with_ocr(
            "hello",
            OcrResult {
                text: "hello transcribed".to_string(),
                perceptual_hash: 7,
            },
        );
        let result = backend.ocr(b"hello", "text/plain").await.unwrap();
        assert_eq!(result.text, "hello transcribed");
        assert_eq!(result.perceptual_hash, 7);
    }

    #[tokio::test]
    async fn unscripted_ocr_falls_back_to_empty_result() {
        let backend = MockVisionBackend::new();
        let result = backend.ocr(b"unscripted", "text/plain").await.unwrap();
        assert_eq!(result.text, "");
        assert_eq!(result.perceptual_hash, 0);
    }

    #[tokio::test]
    async fn unscripted_extraction_is_a_collaborator_error() {
        let backend = MockVisionBackend::new();
        let err = backend.classify_and_extract("unscripted text").await.unwrap_err();
        assert!(matches!(err, Error::Collaborator { .. }));
    }

    #[tokio::test]
    async fn scripted_extraction_is_returned_for_matching_text() {
        let backend = MockVisionBackend::new().with_extraction("contract text", sample_extraction());
        let data = backend.classify_and_extract("contract text").await.unwrap();
        assert_eq!(data.document_type, DocumentType::Contract);
    }

    #[tokio::test]
    async fn call_log_records_every_invocation() {
        let backend = MockVisionBackend::new().with_extraction("t", sample_extraction());
        backend.ocr(b"x", "image/png").await.unwrap();
        backend.classify_and_extract("t").await.unwrap();
        assert_eq!(backend.calls(), vec!["ocr:image/png".to_string(), "extract:t".to_string()]);
    }
}
