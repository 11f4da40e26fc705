//! The Accuracy Guardian (spec §4.6): rule-driven bulk correction of
//! systematic extraction errors, plus the synthetic correction job that
//! fans a resolved [`crate::model::KnowledgeGap`] out to every document
//! that sighted it.
//!
//! Grounded on the teacher's `approval.rs` request/queue/approve/reject
//! shape, generalized from a single in-flight approval to a durable,
//! filterable correction queue backed by the Knowledge Graph Store.

use crate::error::{Error, Result};
use crate::jsonpath::get_path;
use crate::model::{
    CorrectionAuditLogEntry, CorrectionQueueItem, CorrectionQueueStatus, CorrectionRule, CorrectionType,
    CorrectionValueSpec, Entity, EntityKind, GapStatus, GapType, MatchCriteria, ProposedValue, ReviewQueueItem,
    ReviewSourceTable, ReviewStatus, RuleStatus, new_id,
};
use crate::store::KnowledgeGraphStore;
use regex::Regex;
use std::collections::HashSet;
use std::sync::Arc;

/// Confidence assigned to a newly-queued correction, by correction type
/// (spec §4.6 per-type defaults).
fn default_confidence(correction_type: CorrectionType) -> f64 {
    match correction_type {
        CorrectionType::Replace => 0.95,
        CorrectionType::Regex => 0.90,
        CorrectionType::AiReextract => 0.60,
        CorrectionType::ManualReview => 0.50,
    }
}

/// Outcome of [`AccuracyGuardian::bulk_apply`].
#[derive(Debug, Clone, Default)]
pub struct BulkApplyReport {
    /// Queue items whose literal value was applied to a document.
    pub applied: u32,
    /// Queue items that could not be applied and were left for a human
    /// (ai_reextract awaiting re-extraction, or an apply failure).
    pub skipped: u32,
}

/// Outcome of [`AccuracyGuardian::scan_for_known_errors`] for one rule.
#[derive(Debug, Clone)]
pub struct RuleScanReport {
    /// Rule that was evaluated.
    pub rule_id: String,
    /// Documents `find_affected` matched, without queuing anything.
    pub affected_count: usize,
}

/// Outcome of [`AccuracyGuardian::apply_gap_resolution`] (spec §4.6
/// "resolving a gap fans out as a synthetic correction job").
#[derive(Debug, Clone, Default)]
pub struct GapResolutionReport {
    /// Distinct documents whose `extracted_data` was edited.
    pub documents_updated: u32,
    /// Total field edits made, across all documents.
    pub fields_updated: u32,
    /// New entities created while resolving an `entity_name` gap.
    pub entities_created: u32,
    /// Authority-grant-scoped fields touched (spec note: the grant's
    /// scope as embedded in the document's own extracted-data blob is
    /// corrected in place; propagating into the Knowledge Graph Store's
    /// denormalized `AuthorityGrant.scope` column is not implemented —
    /// see DESIGN.md).
    pub authorities_updated: u32,
}

/// The Accuracy Guardian.
pub struct AccuracyGuardian {
    store: Arc<dyn KnowledgeGraphStore>,
    bulk_apply_batch: usize,
}

impl AccuracyGuardian {
    /// Construct a guardian over the given store with the given
    /// `bulkApply` batch size (normally `Config::bulk_apply_batch`).
    pub fn new(store: Arc<dyn KnowledgeGraphStore>, bulk_apply_batch: usize) -> Self {
        Self {
            store,
            bulk_apply_batch,
        }
    }

    /// Create a new rule in `draft` status (spec §4.6 `createRule`).
    pub async fn create_rule(
        &self,
        name: &str,
        rule_type: &str,
        match_criteria: MatchCriteria,
        correction_type: CorrectionType,
        correction_value: CorrectionValueSpec,
        requires_approval: bool,
    ) -> Result<CorrectionRule> {
        let rule = CorrectionRule {
            id: new_id(),
            name: name.to_string(),
            rule_type: rule_type.to_string(),
            match_criteria,
            correction_type,
            correction_value,
            requires_approval,
            status: RuleStatus::Draft,
            affected_count: 0,
            queued_count: 0,
            applied_count: 0,
        };
        self.store.insert_correction_rule(rule.clone()).await?;
        Ok(rule)
    }

    /// Move a rule from `draft`/`paused` to `active` (spec §4.6
    /// `activate`).
    pub async fn activate(&self, rule_id: &str) -> Result<()> {
        let mut rule = self
            .store
            .get_correction_rule(rule_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("correction rule {rule_id}")))?;
        rule.status = RuleStatus::Active;
        self.store.update_correction_rule(rule).await
    }

    /// Find every document the rule's [`MatchCriteria`] matches, compute
    /// a proposed value for each, and queue a [`CorrectionQueueItem`] for
    /// any not already queued (spec §4.6 `apply`).
    pub async fn apply(&self, rule_id: &str) -> Result<u32> {
        let mut rule = self
            .store
            .get_correction_rule(rule_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("correction rule {rule_id}")))?;

        let affected = self.store.find_affected(&rule.match_criteria).await?;
        rule.affected_count = affected.len() as u64;

        let field_path = rule
            .match_criteria
            .field_path
            .clone()
            .ok_or_else(|| Error::Validation("correction rule requires match_criteria.field_path".to_string()))?;

        let mut queued = 0u32;
        for document in &affected {
            let current_value = document
                .extracted_data
                .as_ref()
                .and_then(|data| get_path(data, &field_path))
                .cloned()
                .unwrap_or(serde_json::Value::Null);

            let proposed_value = self.compute_proposed_value(rule.correction_type, &rule.correction_value, &current_value)?;

            if let ProposedValue::Literal(v) = &proposed_value {
                if current_value.as_str().is_some_and(|current| current == v) {
                    continue;
                }
            }

            let confidence = default_confidence(rule.correction_type);

            let initial_status = match &proposed_value {
                ProposedValue::Literal(_) if !rule.requires_approval => CorrectionQueueStatus::Approved,
                _ => CorrectionQueueStatus::Pending,
            };

            let item = CorrectionQueueItem {
                id: new_id(),
                rule_id: rule.id.clone(),
                document_id: document.id.clone(),
                field_path: field_path.clone(),
                current_value,
                proposed_value: proposed_value.clone(),
                confidence,
                status: initial_status,
                rollback_value: None,
            };

            let inserted = self.store.insert_correction_queue_item_if_absent(item.clone()).await?;
            if inserted {
                queued += 1;
                rule.queued_count += 1;
                if rule.requires_approval {
                    let priority = if matches!(proposed_value, ProposedValue::Literal(_)) { 50 } else { 70 };
                    self.store
                        .enqueue_review_item(ReviewQueueItem {
                            id: new_id(),
                            source_table: ReviewSourceTable::CorrectionQueueItem,
                            source_id: item.id.clone(),
                            review_type: "correction".to_string(),
                            priority,
                            status: ReviewStatus::Open,
                            resolution: None,
                        })
                        .await?;
                }
            }
        }

        self.store.update_correction_rule(rule).await?;
        Ok(queued)
    }

    fn compute_proposed_value(
        &self,
        correction_type: CorrectionType,
        spec: &CorrectionValueSpec,
        current_value: &serde_json::Value,
    ) -> Result<ProposedValue> {
        match correction_type {
            CorrectionType::Replace => match spec {
                CorrectionValueSpec::Literal { value } => Ok(ProposedValue::Literal(value.clone())),
                _ => Err(Error::Validation("replace correction requires a literal value".to_string())),
            },
            CorrectionType::Regex => match spec {
                CorrectionValueSpec::Regex { pattern, replacement } => {
                    let current_str = current_value.as_str().unwrap_or_default();
                    let re = Regex::new(pattern)
                        .map_err(|e| Error::Validation(format!("invalid regex pattern {pattern}: {e}")))?;
                    let replaced = re.replace_all(current_str, replacement.as_str()).to_string();
                    Ok(ProposedValue::Literal(replaced))
                }
                _ => Err(Error::Validation("regex correction requires pattern/replacement".to_string())),
            },
            CorrectionType::AiReextract => Ok(ProposedValue::ReExtract),
            CorrectionType::ManualReview => Ok(ProposedValue::ManualReview),
        }
    }

    /// Approve a pending queue item so `bulkApply` will act on it (spec
    /// §4.6 `approve`).
    pub async fn approve(&self, item_id: &str) -> Result<()> {
        let item = self
            .store
            .get_correction_queue_item(item_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("correction queue item {item_id}")))?;
        if item.status != CorrectionQueueStatus::Pending {
            return Err(Error::Validation(format!(
                "queue item {item_id} is {:?}, not pending",
                item.status
            )));
        }
        self.store
            .set_correction_queue_status(item_id, CorrectionQueueStatus::Approved)
            .await
    }

    /// Reject a pending queue item (spec §4.6 `reject`).
    pub async fn reject(&self, item_id: &str) -> Result<()> {
        self.store
            .set_correction_queue_status(item_id, CorrectionQueueStatus::Rejected)
            .await
    }

    /// Apply every `approved` queue item, up to the configured batch
    /// size, writing an audit-log entry per applied correction (spec
    /// §4.6 `bulkApply`, SPEC_FULL §3 `correction_audit_log`).
    pub async fn bulk_apply(&self) -> Result<BulkApplyReport> {
        let approved = self
            .store
            .list_correction_queue_items(Some(CorrectionQueueStatus::Approved))
            .await?;

        let mut report = BulkApplyReport::default();
        for item in approved.into_iter().take(self.bulk_apply_batch) {
            match &item.proposed_value {
                ProposedValue::Literal(value) => {
                    match self
                        .apply_literal_correction(&item.document_id, &item.field_path, value)
                        .await
                    {
                        Ok(previous) => {
                            self.store
                                .append_correction_audit_log(CorrectionAuditLogEntry {
                                    id: new_id(),
                                    queue_item_id: item.id.clone(),
                                    document_id: item.document_id.clone(),
                                    field_path: item.field_path.clone(),
                                    previous_value: previous,
                                    new_value: serde_json::Value::String(value.clone()),
                                    applied_at: chrono::Utc::now(),
                                })
                                .await?;
                            self.store
                                .set_correction_queue_status(&item.id, CorrectionQueueStatus::Applied)
                                .await?;
                            if let Some(mut rule) = self.store.get_correction_rule(&item.rule_id).await? {
                                rule.applied_count += 1;
                                self.store.update_correction_rule(rule).await?;
                            }
                            report.applied += 1;
                        }
                        Err(_) => {
                            report.skipped += 1;
                        }
                    }
                }
                ProposedValue::ReExtract | ProposedValue::ManualReview => {
                    // Neither has a literal value yet; left `approved` for
                    // the re-extraction workflow or a human to supply one.
                    report.skipped += 1;
                }
            }
        }
        Ok(report)
    }

    async fn apply_literal_correction(
        &self,
        document_id: &str,
        field_path: &str,
        value: &str,
    ) -> Result<serde_json::Value> {
        self.store
            .apply_correction(document_id, field_path, serde_json::Value::String(value.to_string()))
            .await
    }

    /// Evaluate every `active` rule's `find_affected` count without
    /// queuing anything (spec §4.6 `scanForKnownErrors`, explicitly
    /// non-mutating).
    pub async fn scan_for_known_errors(&self) -> Result<Vec<RuleScanReport>> {
        let rules = self.store.list_correction_rules(Some(RuleStatus::Active)).await?;
        let mut reports = Vec::with_capacity(rules.len());
        for rule in rules {
            let affected = self.store.find_affected(&rule.match_criteria).await?;
            reports.push(RuleScanReport {
                rule_id: rule.id,
                affected_count: affected.len(),
            });
        }
        Ok(reports)
    }

    /// Bound on documents `findAffected` will return in one call (spec
    /// §4.6).
    pub const FIND_AFFECTED_LIMIT: usize = 10_000;

    /// Resolve a knowledge gap: mark it resolved, then fan the resolved
    /// value out to every document that sighted it, correcting each
    /// occurrence's field in place (spec §4.6).
    pub async fn apply_gap_resolution(
        &self,
        gap_id: &str,
        resolved_value: &str,
        resolution_source_doc: Option<&str>,
    ) -> Result<GapResolutionReport> {
        let gap = self
            .store
            .get_gap(gap_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("gap {gap_id}")))?;

        self.store
            .set_gap_status(
                gap_id,
                GapStatus::Resolved,
                Some(resolved_value.to_string()),
                resolution_source_doc.map(str::to_string),
            )
            .await?;

        let occurrences = self.store.list_gap_occurrences(gap_id).await?;
        let mut report = GapResolutionReport::default();
        let mut touched_documents = HashSet::new();

        for occurrence in occurrences {
            let previous = self
                .store
                .apply_correction(
                    &occurrence.document_id,
                    &occurrence.field_path,
                    serde_json::Value::String(resolved_value.to_string()),
                )
                .await?;

            self.store
                .append_correction_audit_log(CorrectionAuditLogEntry {
                    id: new_id(),
                    queue_item_id: format!("gap:{gap_id}"),
                    document_id: occurrence.document_id.clone(),
                    field_path: occurrence.field_path.clone(),
                    previous_value: previous,
                    new_value: serde_json::Value::String(resolved_value.to_string()),
                    applied_at: chrono::Utc::now(),
                })
                .await?;

            report.fields_updated += 1;
            touched_documents.insert(occurrence.document_id.clone());

            if occurrence.field_path.contains("authority_grants") {
                report.authorities_updated += 1;
            }

            if gap.gap_type == GapType::EntityName {
                if let Some(entities_created) = self
                    .resolve_entity_for_occurrence(&occurrence.document_id, &occurrence.field_path, resolved_value)
                    .await?
                {
                    if entities_created {
                        report.entities_created += 1;
                    }
                }
            }
        }

        report.documents_updated = touched_documents.len() as u32;
        Ok(report)
    }

    /// If `field_path` points at a party's name (e.g.
    /// `"header.parties[0].name"`), resolve or create the entity it
    /// names and link it to the document with that party's role.
    /// Returns `Some(true)` if a new entity was created, `Some(false)`
    /// if an existing one was reused, `None` if `field_path` isn't a
    /// party-name path.
    async fn resolve_entity_for_occurrence(
        &self,
        document_id: &str,
        field_path: &str,
        resolved_name: &str,
    ) -> Result<Option<bool>> {
        let Some(index) = parse_party_index(field_path) else {
            return Ok(None);
        };
        let Some(document) = self.store.get_document(document_id).await? else {
            return Ok(None);
        };
        let Some(data) = &document.extracted_data else {
            return Ok(None);
        };
        let role = data
            .get("header")
            .and_then(|h| h.get("parties"))
            .and_then(|p| p.get(index))
            .and_then(|party| party.get("role"))
            .and_then(|r| r.as_str())
            .unwrap_or("unspecified")
            .to_string();

        let normalized = crate::hash::normalize_text(resolved_name);
        let (entity_id, created) = match self.store.find_entity_by_normalized_name(&normalized).await? {
            Some(existing) => (existing.id, false),
            None => {
                let entity = Entity::new(EntityKind::Person, resolved_name);
                let id = entity.id.clone();
                self.store.insert_entity(entity).await?;
                (id, true)
            }
        };

        self.store
            .link_entity(crate::model::DocumentEntityLink {
                document_id: document_id.to_string(),
                entity_id,
                role,
                confidence: 1.0,
            })
            .await?;

        Ok(Some(created))
    }
}

fn parse_party_index(field_path: &str) -> Option<usize> {
    let start = field_path.find("parties[")? + "parties[".len();
    let end = field_path[start..].find(']')? + start;
    field_path[start..end].parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Document;
    use crate::store::InMemoryStore;

    async fn seed_document(store: &Arc<dyn KnowledgeGraphStore>, effective_date: &str) -> Document {
        let mut doc = Document::new_pending(
            new_id(),
            "sha256/x".to_string(),
            "poa.pdf".to_string(),
            "application/pdf".to_string(),
            10,
            "uploader".to_string(),
        );
        doc.extracted_data = Some(serde_json::json!({
            "header": { "effectiveDate": effective_date, "parties": [] },
            "fields": {},
        }));
        store.upsert_document(doc.clone()).await.unwrap();
        doc
    }

    #[tokio::test]
    async fn replace_rule_queues_and_applies_with_audit_log() {
        let store: Arc<dyn KnowledgeGraphStore> = Arc::new(InMemoryStore::new());
        let guardian = AccuracyGuardian::new(store.clone(), 100);
        let doc = seed_document(&store, "3/15/2022").await;

        let rule = guardian
            .create_rule(
                "fix date format",
                "date_extraction",
                MatchCriteria {
                    field_path: Some("header.effectiveDate".to_string()),
                    ..Default::default()
                },
                CorrectionType::Replace,
                CorrectionValueSpec::Literal {
                    value: "2022-03-15".to_string(),
                },
                false,
            )
            .await
            .unwrap();
        guardian.activate(&rule.id).await.unwrap();

        let queued = guardian.apply(&rule.id).await.unwrap();
        assert_eq!(queued, 1);

        let report = guardian.bulk_apply().await.unwrap();
        assert_eq!(report.applied, 1);

        let updated = store.get_document(&doc.id).await.unwrap().unwrap();
        assert_eq!(
            updated.extracted_data.unwrap()["header"]["effectiveDate"],
            serde_json::json!("2022-03-15")
        );
    }

    #[tokio::test]
    async fn requires_approval_blocks_bulk_apply_until_approved() {
        let store: Arc<dyn KnowledgeGraphStore> = Arc::new(InMemoryStore::new());
        let guardian = AccuracyGuardian::new(store.clone(), 100);
        seed_document(&store, "3/15/2022").await;

        let rule = guardian
            .create_rule(
                "fix date format",
                "date_extraction",
                MatchCriteria {
                    field_path: Some("header.effectiveDate".to_string()),
                    ..Default::default()
                },
                CorrectionType::Replace,
                CorrectionValueSpec::Literal {
                    value: "2022-03-15".to_string(),
                },
                true,
            )
            .await
            .unwrap();
        guardian.activate(&rule.id).await.unwrap();
        guardian.apply(&rule.id).await.unwrap();

        let before = guardian.bulk_apply().await.unwrap();
        assert_eq!(before.applied, 0);

        let pending = store
            .list_correction_queue_items(Some(CorrectionQueueStatus::Pending))
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);
        guardian.approve(&pending[0].id).await.unwrap();

        let after = guardian.bulk_apply().await.unwrap();
        assert_eq!(after.applied, 1);
    }

    #[tokio::test]
    async fn gap_resolution_fans_out_to_every_occurrence() {
        let store: Arc<dyn KnowledgeGraphStore> = Arc::new(InMemoryStore::new());
        let guardian = AccuracyGuardian::new(store.clone(), 100);

        let mut doc_a = Document::new_pending(
            "hash-a".to_string(),
            "sha256/a".to_string(),
            "a.pdf".to_string(),
            "application/pdf".to_string(),
            10,
            "u".to_string(),
        );
        doc_a.extracted_data = Some(serde_json::json!({
            "header": {"parties": [{"name": "{{UNKNOWN:entity_name:S___ LLC}}", "role": "grantor"}]},
            "fields": {},
        }));
        store.upsert_document(doc_a.clone()).await.unwrap();

        let gap = store
            .upsert_knowledge_gap("fp-1", GapType::EntityName, "S___ LLC", vec![], vec![], 0.9)
            .await
            .unwrap();
        store
            .append_gap_occurrence(crate::model::GapOccurrence {
                gap_id: gap.id.clone(),
                document_id: doc_a.id.clone(),
                field_path: "header.parties[0].name".to_string(),
                page: None,
                bounding_box: None,
                surrounding_text: String::new(),
                local_context: String::new(),
                extraction_confidence: 0.4,
                placeholder_value: "{{UNKNOWN:entity_name:S___ LLC}}".to_string(),
            })
            .await
            .unwrap();

        let report = guardian
            .apply_gap_resolution(&gap.id, "Sunset Holdings LLC", Some(&doc_a.id))
            .await
            .unwrap();

        assert_eq!(report.documents_updated, 1);
        assert_eq!(report.fields_updated, 1);
        assert_eq!(report.entities_created, 1);

        let updated = store.get_document(&doc_a.id).await.unwrap().unwrap();
        assert_eq!(
            updated.extracted_data.unwrap()["header"]["parties"][0]["name"],
            serde_json::json!("Sunset Holdings LLC")
        );

        let links = store.list_links_for_document(&doc_a.id).await.unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].role, "grantor");
    }
}
