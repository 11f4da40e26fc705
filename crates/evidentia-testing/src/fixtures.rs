//! Extraction fixtures for the end-to-end seed scenarios (spec §8): a
//! clean power-of-attorney ingest, and one with an unresolved party name,
//! built with the same [`format_placeholder`] helper real extraction
//! output uses so they stay in the contract `ExtractedDocumentData::validate`
//! enforces.

use chrono::NaiveDate;
use evidentia_core::extraction::{
    format_placeholder, DocumentHeader, ExtractedAuthorityGrant, ExtractedDocumentData, ExtractedParty,
    ExtractedUnknown,
};
use evidentia_core::model::{DocumentType, GapType};

/// A clean power-of-attorney extraction: two named parties, a healthcare
/// grant, no unknowns (spec §8 scenario 1, "Clean POA ingest").
pub fn clean_poa_extraction(grantor: &str, grantee: &str, effective_date: NaiveDate) -> ExtractedDocumentData {
    ExtractedDocumentData {
        document_type: DocumentType::PowerOfAttorney,
        header: DocumentHeader {
            title: Some("Power of Attorney".to_string()),
            effective_date: Some(effective_date),
            expiration_date: None,
            parties: vec![
                ExtractedParty {
                    name: grantor.to_string(),
                    role: "grantor".to_string(),
                    kind_hint: Some("person".to_string()),
                    confidence: 0.98,
                },
                ExtractedParty {
                    name: grantee.to_string(),
                    role: "grantee".to_string(),
                    kind_hint: Some("person".to_string()),
                    confidence: 0.98,
                },
            ],
        },
        authority_grants: vec![ExtractedAuthorityGrant {
            grantor_role: "grantor".to_string(),
            grantee_role: "grantee".to_string(),
            grant_type: "poa_healthcare".to_string(),
            scope: serde_json::json!({}),
        }],
        fields: serde_json::json!({}),
        unknowns: vec![],
    }
}

/// A power-of-attorney extraction whose grantor name is an unresolved
/// `{{UNKNOWN:entity_name:...}}` placeholder, with a matching
/// `unknowns[]` entry (spec §8 scenario 3, "Uncertain extraction").
/// `resolution_hints` seeds the resulting gap's hints, used by scenario 4
/// ("Cross-document gap resolution") to match a later document's text.
pub fn uncertain_poa_extraction(partial_hint: &str, grantee: &str, resolution_hints: Vec<String>) -> ExtractedDocumentData {
    let placeholder = format_placeholder(GapType::EntityName, partial_hint);
    ExtractedDocumentData {
        document_type: DocumentType::PowerOfAttorney,
        header: DocumentHeader {
            title: Some("Power of Attorney".to_string()),
            effective_date: None,
            expiration_date: None,
            parties: vec![
                ExtractedParty {
                    name: placeholder,
                    role: "grantor".to_string(),
                    kind_hint: Some("llc".to_string()),
                    confidence: 0.4,
                },
                ExtractedParty {
                    name: grantee.to_string(),
                    role: "grantee".to_string(),
                    kind_hint: Some("person".to_string()),
                    confidence: 0.95,
                },
            ],
        },
        authority_grants: vec![],
        fields: serde_json::json!({}),
        unknowns: vec![ExtractedUnknown {
            field_path: "parties[0].name".to_string(),
            gap_type: GapType::EntityName,
            partial_value: partial_hint.to_string(),
            context_clues: vec![],
            resolution_hints,
            confidence: 0.4,
            page: Some(1),
            bounding_box: None,
            surrounding_text: format!("on behalf of {partial_hint}"),
        }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_poa_extraction_validates() {
        let data = clean_poa_extraction("Alice Smith", "Bob Jones", NaiveDate::from_ymd_opt(2022, 3, 15).unwrap());
        assert!(data.validate("doc-1").is_ok());
    }

    #[test]
    fn uncertain_poa_extraction_validates() {
        let data = uncertain_poa_extraction("S___ LLC", "Bob Jones", vec![]);
        assert!(data.validate("doc-1").is_ok());
    }
}
