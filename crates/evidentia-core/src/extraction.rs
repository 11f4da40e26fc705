//! The `ExtractedDocumentData` shape and its validation contract (spec
//! §4.3, §9).
//!
//! Uncertainty is a schema element, not an error: a low-confidence field is
//! emitted as a `{{UNKNOWN:<type>:<partial-hint>}}` placeholder string
//! embedded in the structured result, paired with an entry in `unknowns[]`
//! describing it. [`ExtractedDocumentData::validate`] enforces that every
//! placeholder has a matching entry and vice versa.

use crate::error::{Error, Result};
use crate::model::{DocumentType, GapType};
use once_cell_placeholder::OnceLock;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Thin re-implementation of `std::sync::OnceLock` usage without pulling in
/// an extra crate: the compiled placeholder regex is built once and reused.
mod once_cell_placeholder {
    pub use std::sync::OnceLock;
}

/// Shared header fields present on every document type (spec §9 design
/// note: "a tagged variant per document type plus a shared header").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentHeader {
    /// Document title as extracted.
    pub title: Option<String>,
    /// Effective date, if stated.
    pub effective_date: Option<chrono::NaiveDate>,
    /// Expiration date, if stated.
    pub expiration_date: Option<chrono::NaiveDate>,
    /// Parties mentioned, with their role in the document.
    pub parties: Vec<ExtractedParty>,
}

/// A party extracted from a document, before entity resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedParty {
    /// Name as extracted (may be an `{{UNKNOWN:...}}` placeholder).
    pub name: String,
    /// Role in the document (e.g. "grantor", "grantee").
    pub role: String,
    /// Best-effort kind classification.
    pub kind_hint: Option<String>,
    /// Extraction confidence for this party's identity.
    pub confidence: f64,
}

/// One authority grant as extracted from a document, before entity
/// resolution in Workflow step 5.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedAuthorityGrant {
    /// Party role acting as grantor.
    pub grantor_role: String,
    /// Party role acting as grantee.
    pub grantee_role: String,
    /// Authority type (e.g. "poa_healthcare").
    pub grant_type: String,
    /// Free-form scope.
    pub scope: serde_json::Value,
}

/// The full structured extraction result for a document (spec §3, §4.3,
/// §9). `document_type` discriminates the tagged variant; `header` and
/// `authority_grants` are shared across variants; `fields` carries the
/// type-specific structured payload as a JSON value (genuinely
/// heterogeneous across the closed document-type set, and consumed
/// downstream only via dotted field paths, so a further per-type Rust enum
/// would add indirection without adding safety).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedDocumentData {
    /// Classified document type.
    pub document_type: DocumentType,
    /// Shared header fields.
    pub header: DocumentHeader,
    /// Authority grants found in this document.
    pub authority_grants: Vec<ExtractedAuthorityGrant>,
    /// Type-specific structured fields, addressable by dotted path.
    pub fields: serde_json::Value,
    /// Every `{{UNKNOWN:...}}` placeholder emitted anywhere above, with
    /// full context. Required to be in 1:1 correspondence with the
    /// placeholders actually present (enforced by [`Self::validate`]).
    pub unknowns: Vec<ExtractedUnknown>,
}

/// One declared unknown, paired with a placeholder embedded elsewhere in
/// the structured result (spec §4.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedUnknown {
    /// Dotted/array-indexed path to the field containing the placeholder.
    pub field_path: String,
    /// Gap type.
    pub gap_type: GapType,
    /// The partial hint embedded in the placeholder.
    pub partial_value: String,
    /// Surrounding clues useful for later resolution.
    pub context_clues: Vec<String>,
    /// Hints about how this might be resolved.
    pub resolution_hints: Vec<String>,
    /// Confidence that this is indeed unknown.
    pub confidence: f64,
    /// Page number, if known.
    pub page: Option<u32>,
    /// Bounding box, if known.
    pub bounding_box: Option<[f64; 4]>,
    /// Text surrounding the placeholder in the source document.
    pub surrounding_text: String,
}

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\{\{UNKNOWN:([A-Za-z_]+):([^}]*)\}\}")
            .expect("placeholder regex is a fixed, valid pattern")
    })
}

/// Render the placeholder string for a given gap type and partial hint, so
/// callers (and tests) that build fixtures don't hand-format the sentinel.
pub fn format_placeholder(gap_type: GapType, partial_hint: &str) -> String {
    format!("{{{{UNKNOWN:{}:{partial_hint}}}}}", gap_type_token(gap_type))
}

/// Stable lowercase token for a [`GapType`], used as the `gap_type`
/// component of [`crate::hash::gap_fingerprint`] inputs.
pub fn gap_type_token(gap_type: GapType) -> &'static str {
    match gap_type {
        GapType::EntityName => "entity_name",
        GapType::Date => "date",
        GapType::Amount => "amount",
        GapType::Address => "address",
        GapType::Relationship => "relationship",
        GapType::AuthorityScope => "authority_scope",
        GapType::DocumentReference => "document_reference",
        GapType::Identifier => "identifier",
    }
}

/// Collect every string value in `value`, recursively, that matches the
/// `{{UNKNOWN:...}}` placeholder pattern, alongside a dotted field path to
/// each.
fn collect_placeholders(value: &serde_json::Value, path: &str, out: &mut Vec<String>) {
    match value {
        serde_json::Value::String(s) => {
            if placeholder_regex().is_match(s) {
                out.push(path.to_string());
            }
        }
        serde_json::Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                collect_placeholders(item, &format!("{path}[{i}]"), out);
            }
        }
        serde_json::Value::Object(map) => {
            for (k, v) in map {
                let child_path = if path.is_empty() {
                    k.clone()
                } else {
                    format!("{path}.{k}")
                };
                collect_placeholders(v, &child_path, out);
            }
        }
        _ => {}
    }
}

impl ExtractedDocumentData {
    /// Every placeholder embedded in `header`/`fields`/`authority_grants`
    /// must have exactly one matching `unknowns[]` entry by `field_path`,
    /// and vice versa (spec §4.3). Returns the offending path on mismatch.
    pub fn validate(&self, document_id: &str) -> Result<()> {
        let mut found_paths = Vec::new();
        let header_value = serde_json::to_value(&self.header).map_err(|e| {
            Error::ExtractionSchemaViolation {
                document_id: document_id.to_string(),
                reason: format!("header not serializable: {e}"),
            }
        })?;
        collect_placeholders(&header_value, "header", &mut found_paths);
        collect_placeholders(&self.fields, "fields", &mut found_paths);

        let declared_paths: std::collections::HashSet<&str> =
            self.unknowns.iter().map(|u| u.field_path.as_str()).collect();

        for path in &found_paths {
            // Placeholders are collected relative to a synthetic root; the
            // declared unknowns use the caller-facing field path (e.g.
            // "parties[0].name"), so we only require that *some* declared
            // path is a suffix match — this tolerates the "header."/"fields."
            // prefixes added above.
            let matched = declared_paths
                .iter()
                .any(|declared| path.ends_with(*declared));
            if !matched {
                return Err(Error::ExtractionSchemaViolation {
                    document_id: document_id.to_string(),
                    reason: format!("placeholder at {path} has no matching unknowns[] entry"),
                });
            }
        }

        if found_paths.is_empty() && !self.unknowns.is_empty() {
            return Err(Error::ExtractionSchemaViolation {
                document_id: document_id.to_string(),
                reason: "unknowns[] declared but no placeholder found in structured result"
                    .to_string(),
            });
        }

        Ok(())
    }

    /// Whether a party's name is itself an unresolved placeholder (spec
    /// §4.2 step 4: "For each extracted party not marked as a gap").
    pub fn is_placeholder(value: &str) -> bool {
        placeholder_regex().is_match(value)
    }

    /// Pair each declared [`ExtractedUnknown`] with the absolute
    /// `header.`/`fields.`-prefixed path of its placeholder in the
    /// serialized document (the form [`crate::model::GapOccurrence`] and
    /// correction field paths use), by the same suffix match
    /// [`Self::validate`] uses. Assumes `validate` has already succeeded;
    /// an unknown with no matching placeholder is skipped.
    pub fn locate_unknowns(&self) -> Vec<(String, &ExtractedUnknown)> {
        let mut found_paths = Vec::new();
        if let Ok(header_value) = serde_json::to_value(&self.header) {
            collect_placeholders(&header_value, "header", &mut found_paths);
        }
        collect_placeholders(&self.fields, "fields", &mut found_paths);

        let mut located = Vec::new();
        for unknown in &self.unknowns {
            if let Some(path) = found_paths
                .iter()
                .find(|p| p.ends_with(unknown.field_path.as_str()))
            {
                located.push((path.clone(), unknown));
            }
        }
        located
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header(name: &str) -> DocumentHeader {
        DocumentHeader {
            title: Some("Power of Attorney".to_string()),
            effective_date: None,
            expiration_date: None,
            parties: vec![
                ExtractedParty {
                    name: name.to_string(),
                    role: "grantor".to_string(),
                    kind_hint: Some("llc".to_string()),
                    confidence: 0.4,
                },
                ExtractedParty {
                    name: "Bob Jones".to_string(),
                    role: "grantee".to_string(),
                    kind_hint: Some("person".to_string()),
                    confidence: 0.95,
                },
            ],
        }
    }

    #[test]
    fn clean_extraction_with_no_unknowns_validates() {
        let data = ExtractedDocumentData {
            document_type: DocumentType::PowerOfAttorney,
            header: sample_header("Alice Smith"),
            authority_grants: vec![],
            fields: serde_json::json!({}),
            unknowns: vec![],
        };
        assert!(data.validate("doc-1").is_ok());
    }

    #[test]
    fn placeholder_without_unknown_entry_fails() {
        let placeholder = format_placeholder(GapType::EntityName, "S___ LLC");
        let data = ExtractedDocumentData {
            document_type: DocumentType::PowerOfAttorney,
            header: sample_header(&placeholder),
            authority_grants: vec![],
            fields: serde_json::json!({}),
            unknowns: vec![],
        };
        let err = data.validate("doc-1").unwrap_err();
        assert!(matches!(err, Error::ExtractionSchemaViolation { .. }));
    }

    #[test]
    fn placeholder_with_matching_unknown_entry_validates() {
        let placeholder = format_placeholder(GapType::EntityName, "S___ LLC");
        let data = ExtractedDocumentData {
            document_type: DocumentType::PowerOfAttorney,
            header: sample_header(&placeholder),
            authority_grants: vec![],
            fields: serde_json::json!({}),
            unknowns: vec![ExtractedUnknown {
                field_path: "parties[0].name".to_string(),
                gap_type: GapType::EntityName,
                partial_value: "S___ LLC".to_string(),
                context_clues: vec!["grantor line".to_string()],
                resolution_hints: vec![],
                confidence: 0.4,
                page: Some(1),
                bounding_box: None,
                surrounding_text: "on behalf of S___ LLC".to_string(),
            }],
        };
        assert!(data.validate("doc-1").is_ok());
    }

    #[test]
    fn is_placeholder_detects_unknown_sentinel() {
        assert!(ExtractedDocumentData::is_placeholder(&format_placeholder(
            GapType::Date,
            "March ____"
        )));
        assert!(!ExtractedDocumentData::is_placeholder("Alice Smith"));
    }
}
