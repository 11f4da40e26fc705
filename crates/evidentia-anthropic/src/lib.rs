//! Anthropic-backed [`VisionExtractionBackend`] and Voyage-backed
//! [`EmbeddingBackend`] for the evidence-ingestion pipeline's external
//! collaborators (spec §6, Workflow steps 1, 2, and 6).
//!
//! Both clients are hand-rolled `reqwest` wrappers rather than a generic
//! SDK, for the same reason the provider crates this is modeled on give:
//! the unofficial client crates for these APIs are too immature to depend
//! on. Neither Anthropic's Messages API nor Voyage's embeddings endpoint is
//! called through any retry wrapper here — the Workflow Engine already
//! retries a failed step against its own [`evidentia_core::retry::RetryPolicy`],
//! so retrying again at this layer would double the backoff.

mod phash;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use evidentia_core::backend::{EmbeddingBackend, OcrResult, VisionExtractionBackend};
use evidentia_core::error::{Error, Result};
use evidentia_core::extraction::ExtractedDocumentData;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_API_VERSION: &str = "2023-06-01";
const ANTHROPIC_API_KEY_VAR: &str = "ANTHROPIC_API_KEY";
const DEFAULT_MAX_TOKENS: u32 = 8192;

const VOYAGE_API_BASE: &str = "https://api.voyageai.com/v1";
const VOYAGE_API_KEY_VAR: &str = "VOYAGE_API_KEY";
/// `voyage-law-2` is tuned for legal documents, the only corpus this
/// pipeline embeds.
const DEFAULT_VOYAGE_MODEL: &str = "voyage-law-2";
const VOYAGE_LAW_2_DIMENSIONS: usize = 1024;

const OCR_SYSTEM_PROMPT: &str = "You transcribe scanned legal documents exactly as written. \
Reproduce every word, number, and signature line verbatim, preserving reading order. \
Do not summarize, interpret, or omit illegible passages; transcribe what is legible and \
mark illegible spans with [illegible].";

const EXTRACTION_SYSTEM_PROMPT: &str = "You classify legal documents and extract structured \
fields as JSON. You never guess a value you are not confident about: any uncertain field is \
instead replaced with the literal placeholder {{UNKNOWN:<gap_type>:<partial-hint>}}, where \
<gap_type> is one of entity_name, date, amount, address, relationship, authority_scope, \
document_reference, identifier, and <partial-hint> is whatever partial text is legible. Every \
placeholder you emit must have exactly one matching entry in the unknowns array. Respond with a \
single JSON object and nothing else.";

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn collaborator_error(collaborator: &str, reason: impl std::fmt::Display) -> Error {
    Error::Collaborator {
        collaborator: collaborator.to_string(),
        reason: reason.to_string(),
    }
}

// ---------------------------------------------------------------------
// Anthropic Messages API wire types
// ---------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<RequestMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct RequestMessage {
    role: &'static str,
    content: Vec<RequestContentBlock>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum RequestContentBlock {
    Text { text: String },
    Image { source: AnthropicImageSource },
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicImageSource {
    Base64 { media_type: String, data: String },
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<ResponseContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResponseContentBlock {
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorEnvelope {
    error: AnthropicErrorDetail,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorDetail {
    #[serde(rename = "type")]
    error_type: String,
    message: String,
}

/// [`VisionExtractionBackend`] over the Anthropic Messages API, backed by a
/// vision-capable Claude model for scanned images and `pdf-extract` for
/// PDFs with an embedded text layer.
///
/// No PDF rasterizer is wired into this backend, so a scanned-image PDF
/// (no text layer) yields an empty OCR result here rather than going
/// through vision OCR; see `DESIGN.md` for the tradeoff.
pub struct AnthropicVisionBackend {
    api_key: Option<String>,
    model: String,
    api_url: String,
    api_version: String,
    http_client: reqwest::Client,
}

impl std::fmt::Debug for AnthropicVisionBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicVisionBackend")
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .field("api_url", &self.api_url)
            .field("api_version", &self.api_version)
            .field("http_client", &"[reqwest::Client]")
            .finish()
    }
}

impl AnthropicVisionBackend {
    /// Build a backend targeting `model` (e.g. `claude-3-5-sonnet-20241022`,
    /// [`evidentia_core::config::Config::anthropic_model`]'s default). The
    /// API key is read lazily from `ANTHROPIC_API_KEY` on first call, not at
    /// construction, matching the rest of this pipeline's "never embeds
    /// credentials" rule for [`evidentia_core::backend`] implementations.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            api_key: env_string(ANTHROPIC_API_KEY_VAR),
            model: model.into(),
            api_url: ANTHROPIC_API_URL.to_string(),
            api_version: ANTHROPIC_API_VERSION.to_string(),
            http_client: reqwest::Client::new(),
        }
    }

    fn get_api_key(&self) -> Result<&str> {
        self.api_key.as_deref().ok_or_else(|| {
            Error::Config(format!("{ANTHROPIC_API_KEY_VAR} not set"))
        })
    }

    async fn send_message(&self, system: &str, content: Vec<RequestContentBlock>) -> Result<String> {
        let api_key = self.get_api_key()?;
        let request = AnthropicRequest {
            model: &self.model,
            max_tokens: DEFAULT_MAX_TOKENS,
            messages: vec![RequestMessage {
                role: "user",
                content,
            }],
            system: Some(system),
        };

        let response = self
            .http_client
            .post(&self.api_url)
            .header("x-api-key", api_key)
            .header("anthropic-version", &self.api_version)
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| collaborator_error("anthropic", format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let reason = serde_json::from_str::<AnthropicErrorEnvelope>(&body)
                .map(|envelope| {
                    format!(
                        "{status} ({}): {}",
                        envelope.error.error_type, envelope.error.message
                    )
                })
                .unwrap_or_else(|_| format!("{status}: {body}"));
            warn!(model = %self.model, %status, "anthropic messages call failed");
            return Err(collaborator_error("anthropic", reason));
        }
        debug!(model = %self.model, "anthropic messages call succeeded");

        let parsed: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| collaborator_error("anthropic", format!("failed to parse response: {e}")))?;

        Ok(parsed
            .content
            .into_iter()
            .filter_map(|block| match block {
                ResponseContentBlock::Text { text } => Some(text),
                ResponseContentBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("\n"))
    }

    async fn ocr_image(&self, bytes: &[u8], mime_type: &str) -> Result<OcrResult> {
        let data = BASE64.encode(bytes);
        let content = vec![
            RequestContentBlock::Image {
                source: AnthropicImageSource::Base64 {
                    media_type: mime_type.to_string(),
                    data,
                },
            },
            RequestContentBlock::Text {
                text: "Transcribe this document image in full.".to_string(),
            },
        ];
        let text = self.send_message(OCR_SYSTEM_PROMPT, content).await?;
        let perceptual_hash = image::load_from_memory(bytes)
            .map(|decoded| phash::dct_phash(&decoded))
            .unwrap_or_else(|_| phash::text_simhash(&text));
        Ok(OcrResult {
            text,
            perceptual_hash,
        })
    }

    fn ocr_pdf(&self, bytes: &[u8]) -> Result<OcrResult> {
        let text = pdf_extract::extract_text_from_mem(bytes)
            .map_err(|e| collaborator_error("pdf-extract", format!("failed to extract text: {e}")))?;
        let perceptual_hash = phash::text_simhash(&text);
        Ok(OcrResult {
            text,
            perceptual_hash,
        })
    }
}

#[async_trait]
impl VisionExtractionBackend for AnthropicVisionBackend {
    async fn ocr(&self, bytes: &[u8], mime_type: &str) -> Result<OcrResult> {
        if mime_type.starts_with("image/") {
            self.ocr_image(bytes, mime_type).await
        } else {
            self.ocr_pdf(bytes)
        }
    }

    async fn classify_and_extract(&self, ocr_text: &str) -> Result<ExtractedDocumentData> {
        let prompt = format!(
            "Classify the document below and extract its structured fields.\n\n\
            Document type must be one of: power_of_attorney, llc_formation, \
            corporate_resolution, financial_statement, contract, deed, trust, will, \
            court_filing, correspondence, other.\n\n\
            Respond with a JSON object with keys document_type, header (title, \
            effective_date, expiration_date, parties[] each with name/role/kind_hint/\
            confidence), authority_grants[] (grantor_role, grantee_role, grant_type, \
            scope), fields (any type-specific structured data), and unknowns[] (each \
            with field_path, gap_type, partial_value, context_clues[], \
            resolution_hints[], confidence, page, bounding_box, surrounding_text).\n\n\
            Document text:\n{ocr_text}"
        );
        let content = vec![RequestContentBlock::Text { text: prompt }];
        let response_text = self.send_message(EXTRACTION_SYSTEM_PROMPT, content).await?;
        let json_text = strip_code_fence(&response_text);
        serde_json::from_str(json_text)
            .map_err(|e| collaborator_error("anthropic", format!("failed to parse extraction response: {e}")))
    }
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    for fence in ["```json", "```"] {
        if let Some(rest) = trimmed.strip_prefix(fence) {
            return rest.trim_end_matches("```").trim();
        }
    }
    trimmed
}

// ---------------------------------------------------------------------
// Voyage embeddings
// ---------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    input: Vec<&'a str>,
    model: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// [`EmbeddingBackend`] over Voyage AI's embeddings endpoint, using
/// `voyage-law-2` by default.
pub struct VoyageEmbeddingBackend {
    api_key: Option<String>,
    model: String,
    dimensions: usize,
    base_url: String,
    http_client: reqwest::Client,
}

impl std::fmt::Debug for VoyageEmbeddingBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoyageEmbeddingBackend")
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .field("dimensions", &self.dimensions)
            .finish()
    }
}

impl VoyageEmbeddingBackend {
    /// Build a backend for `voyage-law-2` producing `dimensions`-wide
    /// vectors (must match [`evidentia_core::config::Config::embedding_dimensions`]
    /// and the Qdrant collection's configured vector size).
    pub fn new(dimensions: usize) -> Self {
        Self {
            api_key: env_string(VOYAGE_API_KEY_VAR),
            model: DEFAULT_VOYAGE_MODEL.to_string(),
            dimensions,
            base_url: VOYAGE_API_BASE.to_string(),
            http_client: reqwest::Client::new(),
        }
    }

    fn get_api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| Error::Config(format!("{VOYAGE_API_KEY_VAR} not set")))
    }
}

impl Default for VoyageEmbeddingBackend {
    fn default() -> Self {
        Self::new(VOYAGE_LAW_2_DIMENSIONS)
    }
}

#[async_trait]
impl EmbeddingBackend for VoyageEmbeddingBackend {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let api_key = self.get_api_key()?;
        let url = format!("{}/embeddings", self.base_url);
        let request = EmbedRequest {
            input: vec![text],
            model: &self.model,
        };

        let response = self
            .http_client
            .post(&url)
            .header("Authorization", format!("Bearer {api_key}"))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| collaborator_error("voyage", format!("request failed: {e}")))?
            .error_for_status()
            .map_err(|e| collaborator_error("voyage", format!("API error: {e}")))?;

        let parsed: EmbedResponse = response
            .json()
            .await
            .map_err(|e| collaborator_error("voyage", format!("failed to parse response: {e}")))?;

        parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| collaborator_error("voyage", "no embedding returned"))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_code_fence_removes_json_fence() {
        let wrapped = "```json\n{\"a\":1}\n```";
        assert_eq!(strip_code_fence(wrapped), "{\"a\":1}");
    }

    #[test]
    fn strip_code_fence_removes_bare_fence() {
        let wrapped = "```\n{\"a\":1}\n```";
        assert_eq!(strip_code_fence(wrapped), "{\"a\":1}");
    }

    #[test]
    fn strip_code_fence_passes_through_plain_json() {
        assert_eq!(strip_code_fence("{\"a\":1}"), "{\"a\":1}");
    }

    #[test]
    fn missing_anthropic_key_is_a_config_error() {
        let backend = AnthropicVisionBackend {
            api_key: None,
            model: "claude-3-5-sonnet-20241022".to_string(),
            api_url: ANTHROPIC_API_URL.to_string(),
            api_version: ANTHROPIC_API_VERSION.to_string(),
            http_client: reqwest::Client::new(),
        };
        assert!(matches!(backend.get_api_key(), Err(Error::Config(_))));
    }

    #[test]
    fn missing_voyage_key_is_a_config_error() {
        let backend = VoyageEmbeddingBackend {
            api_key: None,
            model: DEFAULT_VOYAGE_MODEL.to_string(),
            dimensions: VOYAGE_LAW_2_DIMENSIONS,
            base_url: VOYAGE_API_BASE.to_string(),
            http_client: reqwest::Client::new(),
        };
        assert!(matches!(backend.get_api_key(), Err(Error::Config(_))));
    }

    #[test]
    fn default_voyage_backend_reports_law2_dimensions() {
        assert_eq!(VoyageEmbeddingBackend::default().dimensions(), VOYAGE_LAW_2_DIMENSIONS);
    }

    #[tokio::test]
    async fn classify_and_extract_parses_a_successful_anthropic_response() {
        let server = wiremock::MockServer::start().await;
        let extraction = serde_json::json!({
            "document_type": "contract",
            "header": {"title": null, "effective_date": null, "expiration_date": null, "parties": []},
            "authority_grants": [],
            "fields": {},
            "unknowns": [],
        });
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path("/v1/messages"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "content": [{"type": "text", "text": extraction.to_string()}],
            })))
            .mount(&server)
            .await;

        let backend = AnthropicVisionBackend {
            api_key: Some("test-key".to_string()),
            model: "claude-3-5-sonnet-20241022".to_string(),
            api_url: format!("{}/v1/messages", server.uri()),
            api_version: ANTHROPIC_API_VERSION.to_string(),
            http_client: reqwest::Client::new(),
        };

        let data = backend.classify_and_extract("some ocr text").await.unwrap();
        assert_eq!(data.document_type, evidentia_core::model::DocumentType::Contract);
    }

    #[tokio::test]
    async fn classify_and_extract_surfaces_anthropic_error_responses() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path("/v1/messages"))
            .respond_with(wiremock::ResponseTemplate::new(429).set_body_json(serde_json::json!({
                "error": {"type": "rate_limit_error", "message": "slow down"},
            })))
            .mount(&server)
            .await;

        let backend = AnthropicVisionBackend {
            api_key: Some("test-key".to_string()),
            model: "claude-3-5-sonnet-20241022".to_string(),
            api_url: format!("{}/v1/messages", server.uri()),
            api_version: ANTHROPIC_API_VERSION.to_string(),
            http_client: reqwest::Client::new(),
        };

        let err = backend.classify_and_extract("some ocr text").await.unwrap_err();
        assert!(matches!(err, Error::Collaborator { .. }));
    }

    #[tokio::test]
    async fn embed_parses_a_successful_voyage_response() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path("/embeddings"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"embedding": [0.1, 0.2, 0.3]}],
            })))
            .mount(&server)
            .await;

        let backend = VoyageEmbeddingBackend {
            api_key: Some("test-key".to_string()),
            model: DEFAULT_VOYAGE_MODEL.to_string(),
            dimensions: 3,
            base_url: server.uri(),
            http_client: reqwest::Client::new(),
        };

        let vector = backend.embed("some text").await.unwrap();
        assert_eq!(vector, vec![0.1, 0.2, 0.3]);
    }

    #[tokio::test]
    async fn embed_surfaces_voyage_error_responses() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path("/embeddings"))
            .respond_with(wiremock::ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let backend = VoyageEmbeddingBackend {
            api_key: Some("test-key".to_string()),
            model: DEFAULT_VOYAGE_MODEL.to_string(),
            dimensions: 3,
            base_url: server.uri(),
            http_client: reqwest::Client::new(),
        };

        let err = backend.embed("some text").await.unwrap_err();
        assert!(matches!(err, Error::Collaborator { .. }));
    }
}
