//! PostgreSQL-backed [`KnowledgeGraphStore`](evidentia_core::store::KnowledgeGraphStore):
//! the canonical system of record (spec §3, §4.4) persisted to a real
//! database instead of the in-process reference implementation.
//!
//! Grounded on the teacher's `PostgresCheckpointer`: a pooled connection,
//! `initialize_schema` run once at construction, and SQL statements built
//! with explicit column lists rather than `SELECT *`. Unlike the
//! teacher's single `tokio_postgres::Client` plus one manually spawned
//! connection task, this store uses `deadpool-postgres` because the
//! Workflow Engine drives up to `max_inflight_documents` concurrent
//! document pipelines, each needing its own connection for the
//! transactional steps below.
//!
//! # Example
//!
//! ```rust,ignore
//! use evidentia_postgres::PostgresStore;
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = PostgresStore::connect("host=localhost user=evidentia dbname=evidentia").await?;
//!     Ok(())
//! }
//! ```

mod error;
mod jsonpath;

pub use error::PostgresError;

use async_trait::async_trait;
use chrono::NaiveDate;
use deadpool_postgres::{Client, Manager, ManagerConfig, Pool, RecyclingMethod, Runtime};
use evidentia_core::error::{Error, Result};
use evidentia_core::model::*;
use evidentia_core::store::KnowledgeGraphStore;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_postgres::{NoTls, Row};
use tracing::debug;

type PgResult<T> = error::Result<T>;

fn enum_to_text<T: Serialize>(value: &T) -> PgResult<String> {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::String(s)) => Ok(s),
        Ok(other) => Err(PostgresError::Serialization(format!("expected string, got {other}"))),
        Err(e) => Err(PostgresError::Serialization(e.to_string())),
    }
}

fn text_to_enum<T: DeserializeOwned>(text: &str) -> PgResult<T> {
    serde_json::from_value(serde_json::Value::String(text.to_string())).map_err(|e| PostgresError::Serialization(e.to_string()))
}

fn opt_enum_to_text<T: Serialize>(value: Option<&T>) -> PgResult<Option<String>> {
    value.map(enum_to_text).transpose()
}

fn opt_text_to_enum<T: DeserializeOwned>(text: Option<&str>) -> PgResult<Option<T>> {
    text.map(text_to_enum).transpose()
}

fn to_json<T: Serialize>(value: &T) -> PgResult<serde_json::Value> {
    serde_json::to_value(value).map_err(|e| PostgresError::Serialization(e.to_string()))
}

fn from_json<T: DeserializeOwned>(value: serde_json::Value) -> PgResult<T> {
    serde_json::from_value(value).map_err(|e| PostgresError::Serialization(e.to_string()))
}

/// PostgreSQL-backed implementation of [`KnowledgeGraphStore`].
pub struct PostgresStore {
    pool: Pool,
}

impl PostgresStore {
    /// Connect to PostgreSQL and ensure the schema exists.
    ///
    /// # Errors
    /// Returns an error if the connection string is invalid, the pool
    /// cannot be built, or schema creation fails.
    pub async fn connect(database_url: &str) -> PgResult<Self> {
        let pg_config: tokio_postgres::Config = database_url.parse().map_err(PostgresError::Query)?;
        let manager_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };
        let manager = Manager::from_config(pg_config, NoTls, manager_config);
        let pool = Pool::builder(manager)
            .max_size(16)
            .runtime(Runtime::Tokio1)
            .build()
            .map_err(|e| PostgresError::Pool(e.to_string()))?;

        let store = Self { pool };
        store.initialize_schema().await?;
        Ok(store)
    }

    async fn client(&self) -> PgResult<Client> {
        Ok(self.pool.get().await?)
    }

    async fn initialize_schema(&self) -> PgResult<()> {
        let client = self.client().await?;
        client.batch_execute(SCHEMA_SQL).await?;
        debug!("evidentia schema initialized");
        Ok(())
    }
}

const SCHEMA_SQL: &str = r"
CREATE TABLE IF NOT EXISTS documents (
    id TEXT PRIMARY KEY,
    seq BIGSERIAL,
    content_hash TEXT NOT NULL,
    storage_key TEXT NOT NULL,
    filename TEXT NOT NULL,
    mime_type TEXT NOT NULL,
    size_bytes BIGINT NOT NULL,
    document_type TEXT,
    ocr_text TEXT,
    perceptual_hash BIGINT,
    extracted_data JSONB,
    status TEXT NOT NULL,
    supersedes TEXT,
    superseded_by TEXT,
    last_failed_step TEXT,
    uploader TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_documents_content_hash ON documents (content_hash);
CREATE INDEX IF NOT EXISTS idx_documents_seq ON documents (seq);

CREATE TABLE IF NOT EXISTS entities (
    id TEXT PRIMARY KEY,
    kind TEXT NOT NULL,
    name TEXT NOT NULL,
    normalized_name TEXT NOT NULL,
    identifiers JSONB NOT NULL DEFAULT '{}'::jsonb,
    merged_into TEXT,
    created_at TIMESTAMPTZ NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_entities_normalized_name ON entities (normalized_name);

CREATE TABLE IF NOT EXISTS document_entity_links (
    document_id TEXT NOT NULL,
    entity_id TEXT NOT NULL,
    role TEXT NOT NULL,
    confidence DOUBLE PRECISION NOT NULL,
    PRIMARY KEY (document_id, entity_id, role)
);
CREATE INDEX IF NOT EXISTS idx_links_entity ON document_entity_links (entity_id);
CREATE INDEX IF NOT EXISTS idx_links_document ON document_entity_links (document_id);

CREATE TABLE IF NOT EXISTS authority_grants (
    id TEXT PRIMARY KEY,
    document_id TEXT NOT NULL,
    grantor_entity_id TEXT NOT NULL,
    grantee_entity_id TEXT NOT NULL,
    grant_type TEXT NOT NULL,
    scope JSONB NOT NULL,
    effective_date DATE,
    expiration_date DATE,
    is_active BOOLEAN NOT NULL,
    revoked_by TEXT,
    created_at TIMESTAMPTZ NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_grants_active ON authority_grants (is_active);
CREATE INDEX IF NOT EXISTS idx_grants_triple ON authority_grants (grantor_entity_id, grantee_entity_id, grant_type);

CREATE TABLE IF NOT EXISTS knowledge_gaps (
    id TEXT PRIMARY KEY,
    gap_type TEXT NOT NULL,
    fingerprint TEXT NOT NULL UNIQUE,
    partial_value TEXT NOT NULL,
    context_clues JSONB NOT NULL,
    resolution_hints JSONB NOT NULL,
    confidence_threshold DOUBLE PRECISION NOT NULL,
    occurrence_count INT NOT NULL,
    status TEXT NOT NULL,
    resolved_value TEXT,
    resolution_source_doc TEXT,
    first_seen_at TIMESTAMPTZ NOT NULL,
    last_seen_at TIMESTAMPTZ NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_gaps_status ON knowledge_gaps (status);

CREATE TABLE IF NOT EXISTS gap_occurrences (
    gap_id TEXT NOT NULL,
    document_id TEXT NOT NULL,
    field_path TEXT NOT NULL,
    page INT,
    bounding_box JSONB,
    surrounding_text TEXT NOT NULL,
    local_context TEXT NOT NULL,
    extraction_confidence DOUBLE PRECISION NOT NULL,
    placeholder_value TEXT NOT NULL,
    PRIMARY KEY (gap_id, document_id, field_path)
);

CREATE TABLE IF NOT EXISTS gap_candidates (
    id TEXT PRIMARY KEY,
    gap_id TEXT NOT NULL,
    proposed_value TEXT NOT NULL,
    source_type TEXT NOT NULL,
    source_document TEXT,
    confidence DOUBLE PRECISION NOT NULL,
    confirmations INT NOT NULL,
    rejections INT NOT NULL,
    status TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_gap_candidates_gap ON gap_candidates (gap_id);

CREATE TABLE IF NOT EXISTS duplicate_candidates (
    document_id TEXT NOT NULL,
    candidate_document_id TEXT NOT NULL,
    method TEXT NOT NULL,
    similarity_score DOUBLE PRECISION NOT NULL,
    confidence TEXT NOT NULL,
    status TEXT NOT NULL,
    auto_resolved BOOLEAN NOT NULL,
    PRIMARY KEY (document_id, candidate_document_id)
);
CREATE INDEX IF NOT EXISTS idx_dupes_status ON duplicate_candidates (status);

CREATE TABLE IF NOT EXISTS correction_rules (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    rule_type TEXT NOT NULL,
    match_criteria JSONB NOT NULL,
    correction_type TEXT NOT NULL,
    correction_value JSONB NOT NULL,
    requires_approval BOOLEAN NOT NULL,
    status TEXT NOT NULL,
    affected_count BIGINT NOT NULL,
    queued_count BIGINT NOT NULL,
    applied_count BIGINT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_rules_status ON correction_rules (status);

CREATE TABLE IF NOT EXISTS correction_queue_items (
    id TEXT PRIMARY KEY,
    rule_id TEXT NOT NULL,
    document_id TEXT NOT NULL,
    field_path TEXT NOT NULL,
    current_value JSONB NOT NULL,
    proposed_value JSONB NOT NULL,
    confidence DOUBLE PRECISION NOT NULL,
    status TEXT NOT NULL,
    rollback_value JSONB,
    UNIQUE (rule_id, document_id, field_path)
);
CREATE INDEX IF NOT EXISTS idx_queue_status ON correction_queue_items (status);

CREATE TABLE IF NOT EXISTS correction_audit_log (
    id TEXT PRIMARY KEY,
    queue_item_id TEXT NOT NULL,
    document_id TEXT NOT NULL,
    field_path TEXT NOT NULL,
    previous_value JSONB NOT NULL,
    new_value JSONB NOT NULL,
    applied_at TIMESTAMPTZ NOT NULL
);

CREATE TABLE IF NOT EXISTS review_queue_items (
    id TEXT PRIMARY KEY,
    source_table TEXT NOT NULL,
    source_id TEXT NOT NULL,
    review_type TEXT NOT NULL,
    priority INT NOT NULL,
    status TEXT NOT NULL,
    resolution TEXT
);
CREATE INDEX IF NOT EXISTS idx_review_status ON review_queue_items (status);

CREATE TABLE IF NOT EXISTS processing_log (
    seq BIGSERIAL PRIMARY KEY,
    document_id TEXT NOT NULL,
    workflow_instance_id TEXT NOT NULL,
    step TEXT NOT NULL,
    status TEXT NOT NULL,
    error TEXT,
    recorded_at TIMESTAMPTZ NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_log_instance ON processing_log (workflow_instance_id, seq);
";

// ---------------------------------------------------------------------
// Row <-> model conversions
// ---------------------------------------------------------------------

fn row_to_document(row: &Row) -> PgResult<Document> {
    Ok(Document {
        id: row.get("id"),
        content_hash: row.get("content_hash"),
        storage_key: row.get("storage_key"),
        filename: row.get("filename"),
        mime_type: row.get("mime_type"),
        size_bytes: row.get::<_, i64>("size_bytes") as u64,
        document_type: opt_text_to_enum(row.get::<_, Option<&str>>("document_type"))?,
        ocr_text: row.get("ocr_text"),
        perceptual_hash: row.get::<_, Option<i64>>("perceptual_hash").map(|v| v as u64),
        extracted_data: row.get("extracted_data"),
        status: text_to_enum(row.get::<_, &str>("status"))?,
        supersedes: row.get("supersedes"),
        superseded_by: row.get("superseded_by"),
        last_failed_step: row.get("last_failed_step"),
        uploader: row.get("uploader"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn row_to_entity(row: &Row) -> PgResult<Entity> {
    Ok(Entity {
        id: row.get("id"),
        kind: text_to_enum(row.get::<_, &str>("kind"))?,
        name: row.get("name"),
        normalized_name: row.get("normalized_name"),
        identifiers: from_json(row.get("identifiers"))?,
        merged_into: row.get("merged_into"),
        created_at: row.get("created_at"),
    })
}

fn row_to_link(row: &Row) -> DocumentEntityLink {
    DocumentEntityLink {
        document_id: row.get("document_id"),
        entity_id: row.get("entity_id"),
        role: row.get("role"),
        confidence: row.get("confidence"),
    }
}

fn row_to_grant(row: &Row) -> PgResult<AuthorityGrant> {
    Ok(AuthorityGrant {
        id: row.get("id"),
        document_id: row.get("document_id"),
        grantor_entity_id: row.get("grantor_entity_id"),
        grantee_entity_id: row.get("grantee_entity_id"),
        grant_type: row.get("grant_type"),
        scope: row.get("scope"),
        effective_date: row.get::<_, Option<NaiveDate>>("effective_date"),
        expiration_date: row.get::<_, Option<NaiveDate>>("expiration_date"),
        is_active: row.get("is_active"),
        revoked_by: row.get("revoked_by"),
        created_at: row.get("created_at"),
    })
}

fn row_to_gap(row: &Row) -> PgResult<KnowledgeGap> {
    Ok(KnowledgeGap {
        id: row.get("id"),
        gap_type: text_to_enum(row.get::<_, &str>("gap_type"))?,
        fingerprint: row.get("fingerprint"),
        partial_value: row.get("partial_value"),
        context_clues: from_json(row.get("context_clues"))?,
        resolution_hints: from_json(row.get("resolution_hints"))?,
        confidence_threshold: row.get("confidence_threshold"),
        occurrence_count: row.get::<_, i32>("occurrence_count") as u32,
        status: text_to_enum(row.get::<_, &str>("status"))?,
        resolved_value: row.get("resolved_value"),
        resolution_source_doc: row.get("resolution_source_doc"),
        first_seen_at: row.get("first_seen_at"),
        last_seen_at: row.get("last_seen_at"),
    })
}

fn row_to_gap_occurrence(row: &Row) -> PgResult<GapOccurrence> {
    let bounding_box: Option<serde_json::Value> = row.get("bounding_box");
    Ok(GapOccurrence {
        gap_id: row.get("gap_id"),
        document_id: row.get("document_id"),
        field_path: row.get("field_path"),
        page: row.get::<_, Option<i32>>("page").map(|v| v as u32),
        bounding_box: bounding_box.map(from_json).transpose()?,
        surrounding_text: row.get("surrounding_text"),
        local_context: row.get("local_context"),
        extraction_confidence: row.get("extraction_confidence"),
        placeholder_value: row.get("placeholder_value"),
    })
}

fn row_to_gap_candidate(row: &Row) -> PgResult<GapCandidate> {
    Ok(GapCandidate {
        id: row.get("id"),
        gap_id: row.get("gap_id"),
        proposed_value: row.get("proposed_value"),
        source_type: text_to_enum(row.get::<_, &str>("source_type"))?,
        source_document: row.get("source_document"),
        confidence: row.get("confidence"),
        confirmations: row.get::<_, i32>("confirmations") as u32,
        rejections: row.get::<_, i32>("rejections") as u32,
        status: text_to_enum(row.get::<_, &str>("status"))?,
    })
}

fn row_to_duplicate_candidate(row: &Row) -> PgResult<DuplicateCandidate> {
    Ok(DuplicateCandidate {
        document_id: row.get("document_id"),
        candidate_document_id: row.get("candidate_document_id"),
        method: text_to_enum(row.get::<_, &str>("method"))?,
        similarity_score: row.get("similarity_score"),
        confidence: text_to_enum(row.get::<_, &str>("confidence"))?,
        status: text_to_enum(row.get::<_, &str>("status"))?,
        auto_resolved: row.get("auto_resolved"),
    })
}

fn row_to_rule(row: &Row) -> PgResult<CorrectionRule> {
    Ok(CorrectionRule {
        id: row.get("id"),
        name: row.get("name"),
        rule_type: row.get("rule_type"),
        match_criteria: from_json(row.get("match_criteria"))?,
        correction_type: text_to_enum(row.get::<_, &str>("correction_type"))?,
        correction_value: from_json(row.get("correction_value"))?,
        requires_approval: row.get("requires_approval"),
        status: text_to_enum(row.get::<_, &str>("status"))?,
        affected_count: row.get::<_, i64>("affected_count") as u64,
        queued_count: row.get::<_, i64>("queued_count") as u64,
        applied_count: row.get::<_, i64>("applied_count") as u64,
    })
}

fn row_to_queue_item(row: &Row) -> PgResult<CorrectionQueueItem> {
    let rollback_value: Option<serde_json::Value> = row.get("rollback_value");
    Ok(CorrectionQueueItem {
        id: row.get("id"),
        rule_id: row.get("rule_id"),
        document_id: row.get("document_id"),
        field_path: row.get("field_path"),
        current_value: row.get("current_value"),
        proposed_value: from_json(row.get("proposed_value"))?,
        confidence: row.get("confidence"),
        status: text_to_enum(row.get::<_, &str>("status"))?,
        rollback_value,
    })
}

fn row_to_review_item(row: &Row) -> PgResult<ReviewQueueItem> {
    Ok(ReviewQueueItem {
        id: row.get("id"),
        source_table: text_to_enum(row.get::<_, &str>("source_table"))?,
        source_id: row.get("source_id"),
        review_type: row.get("review_type"),
        priority: row.get::<_, i32>("priority") as u32,
        status: text_to_enum(row.get::<_, &str>("status"))?,
        resolution: row.get("resolution"),
    })
}

fn row_to_log_entry(row: &Row) -> PgResult<ProcessingLog> {
    Ok(ProcessingLog {
        document_id: row.get("document_id"),
        workflow_instance_id: row.get("workflow_instance_id"),
        step: row.get("step"),
        status: text_to_enum(row.get::<_, &str>("status"))?,
        error: row.get("error"),
        recorded_at: row.get("recorded_at"),
    })
}

#[async_trait]
impl KnowledgeGraphStore for PostgresStore {
    async fn upsert_document(&self, document: Document) -> Result<()> {
        let client = self.client().await?;
        let document_type = opt_enum_to_text(document.document_type.as_ref())?;
        let status = enum_to_text(&document.status)?;
        client
            .execute(
                "INSERT INTO documents (
                    id, content_hash, storage_key, filename, mime_type, size_bytes, document_type,
                    ocr_text, perceptual_hash, extracted_data, status, supersedes, superseded_by,
                    last_failed_step, uploader, created_at, updated_at
                ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,$17)
                ON CONFLICT (id) DO UPDATE SET
                    content_hash = EXCLUDED.content_hash,
                    storage_key = EXCLUDED.storage_key,
                    filename = EXCLUDED.filename,
                    mime_type = EXCLUDED.mime_type,
                    size_bytes = EXCLUDED.size_bytes,
                    document_type = EXCLUDED.document_type,
                    ocr_text = EXCLUDED.ocr_text,
                    perceptual_hash = EXCLUDED.perceptual_hash,
                    extracted_data = EXCLUDED.extracted_data,
                    status = EXCLUDED.status,
                    supersedes = EXCLUDED.supersedes,
                    superseded_by = EXCLUDED.superseded_by,
                    last_failed_step = EXCLUDED.last_failed_step,
                    uploader = EXCLUDED.uploader,
                    updated_at = EXCLUDED.updated_at",
                &[
                    &document.id,
                    &document.content_hash,
                    &document.storage_key,
                    &document.filename,
                    &document.mime_type,
                    &(document.size_bytes as i64),
                    &document_type,
                    &document.ocr_text,
                    &document.perceptual_hash.map(|v| v as i64),
                    &document.extracted_data,
                    &status,
                    &document.supersedes,
                    &document.superseded_by,
                    &document.last_failed_step,
                    &document.uploader,
                    &document.created_at,
                    &document.updated_at,
                ],
            )
            .await
            .map_err(PostgresError::Query)?;
        Ok(())
    }

    async fn get_document(&self, id: &str) -> Result<Option<Document>> {
        let client = self.client().await?;
        let row = client
            .query_opt("SELECT * FROM documents WHERE id = $1", &[&id])
            .await
            .map_err(PostgresError::Query)?;
        Ok(row.as_ref().map(row_to_document).transpose()?)
    }

    async fn find_document_by_hash(&self, content_hash: &str) -> Result<Option<Document>> {
        let client = self.client().await?;
        let row = client
            .query_opt("SELECT * FROM documents WHERE content_hash = $1", &[&content_hash])
            .await
            .map_err(PostgresError::Query)?;
        Ok(row.as_ref().map(row_to_document).transpose()?)
    }

    async fn list_documents(&self) -> Result<Vec<Document>> {
        let client = self.client().await?;
        let rows = client
            .query("SELECT * FROM documents ORDER BY seq ASC", &[])
            .await
            .map_err(PostgresError::Query)?;
        Ok(rows.iter().map(row_to_document).collect::<PgResult<Vec<_>>>()?)
    }

    async fn list_documents_since(&self, since_document_id: Option<&str>) -> Result<Vec<Document>> {
        let client = self.client().await?;
        let rows = match since_document_id {
            Some(id) => {
                client
                    .query(
                        "SELECT * FROM documents WHERE seq > (SELECT seq FROM documents WHERE id = $1) ORDER BY seq ASC",
                        &[&id],
                    )
                    .await
            }
            None => client.query("SELECT * FROM documents ORDER BY seq ASC", &[]).await,
        }
        .map_err(PostgresError::Query)?;
        Ok(rows.iter().map(row_to_document).collect::<PgResult<Vec<_>>>()?)
    }

    async fn find_entity_by_normalized_name(&self, normalized_name: &str) -> Result<Option<Entity>> {
        let client = self.client().await?;
        let row = client
            .query_opt(
                "SELECT * FROM entities WHERE normalized_name = $1 AND merged_into IS NULL
                 ORDER BY length(normalized_name) DESC, created_at DESC LIMIT 1",
                &[&normalized_name],
            )
            .await
            .map_err(PostgresError::Query)?;
        Ok(row.as_ref().map(row_to_entity).transpose()?)
    }

    async fn get_entity(&self, id: &str) -> Result<Option<Entity>> {
        let client = self.client().await?;
        let row = client
            .query_opt("SELECT * FROM entities WHERE id = $1", &[&id])
            .await
            .map_err(PostgresError::Query)?;
        Ok(row.as_ref().map(row_to_entity).transpose()?)
    }

    async fn insert_entity(&self, entity: Entity) -> Result<()> {
        let client = self.client().await?;
        let kind = enum_to_text(&entity.kind)?;
        let identifiers = to_json(&entity.identifiers)?;
        client
            .execute(
                "INSERT INTO entities (id, kind, name, normalized_name, identifiers, merged_into, created_at)
                 VALUES ($1,$2,$3,$4,$5,$6,$7)
                 ON CONFLICT (id) DO UPDATE SET
                    kind = EXCLUDED.kind, name = EXCLUDED.name, normalized_name = EXCLUDED.normalized_name,
                    identifiers = EXCLUDED.identifiers, merged_into = EXCLUDED.merged_into",
                &[
                    &entity.id,
                    &kind,
                    &entity.name,
                    &entity.normalized_name,
                    &identifiers,
                    &entity.merged_into,
                    &entity.created_at,
                ],
            )
            .await
            .map_err(PostgresError::Query)?;
        Ok(())
    }

    async fn link_entity(&self, link: DocumentEntityLink) -> Result<()> {
        let client = self.client().await?;
        client
            .execute(
                "INSERT INTO document_entity_links (document_id, entity_id, role, confidence)
                 VALUES ($1,$2,$3,$4) ON CONFLICT (document_id, entity_id, role) DO NOTHING",
                &[&link.document_id, &link.entity_id, &link.role, &link.confidence],
            )
            .await
            .map_err(PostgresError::Query)?;
        Ok(())
    }

    async fn list_links_for_document(&self, document_id: &str) -> Result<Vec<DocumentEntityLink>> {
        let client = self.client().await?;
        let rows = client
            .query("SELECT * FROM document_entity_links WHERE document_id = $1", &[&document_id])
            .await
            .map_err(PostgresError::Query)?;
        Ok(rows.iter().map(row_to_link).collect())
    }

    async fn list_links_for_entity(&self, entity_id: &str) -> Result<Vec<DocumentEntityLink>> {
        let client = self.client().await?;
        let rows = client
            .query("SELECT * FROM document_entity_links WHERE entity_id = $1", &[&entity_id])
            .await
            .map_err(PostgresError::Query)?;
        Ok(rows.iter().map(row_to_link).collect())
    }

    async fn merge_entities(&self, winner_id: &str, loser_id: &str) -> Result<()> {
        let mut client = self.client().await?;
        let txn = client.transaction().await.map_err(PostgresError::Query)?;

        let winner_exists = txn
            .query_opt("SELECT id FROM entities WHERE id = $1", &[&winner_id])
            .await
            .map_err(PostgresError::Query)?;
        let loser_exists = txn
            .query_opt("SELECT id FROM entities WHERE id = $1", &[&loser_id])
            .await
            .map_err(PostgresError::Query)?;
        if winner_exists.is_none() || loser_exists.is_none() {
            return Err(Error::NotFound(format!("entity {winner_id} or {loser_id} not found for merge")));
        }

        // Drop loser-side links that would collide with an existing winner-side
        // (document, role) row before repointing the rest.
        txn.execute(
            "DELETE FROM document_entity_links dl
             WHERE dl.entity_id = $1
               AND EXISTS (
                   SELECT 1 FROM document_entity_links w
                   WHERE w.document_id = dl.document_id AND w.entity_id = $2 AND w.role = dl.role
               )",
            &[&loser_id, &winner_id],
        )
        .await
        .map_err(PostgresError::Query)?;
        txn.execute(
            "UPDATE document_entity_links SET entity_id = $1 WHERE entity_id = $2",
            &[&winner_id, &loser_id],
        )
        .await
        .map_err(PostgresError::Query)?;
        txn.execute(
            "UPDATE authority_grants SET grantor_entity_id = $1 WHERE grantor_entity_id = $2",
            &[&winner_id, &loser_id],
        )
        .await
        .map_err(PostgresError::Query)?;
        txn.execute(
            "UPDATE authority_grants SET grantee_entity_id = $1 WHERE grantee_entity_id = $2",
            &[&winner_id, &loser_id],
        )
        .await
        .map_err(PostgresError::Query)?;
        txn.execute("UPDATE entities SET merged_into = $1 WHERE id = $2", &[&winner_id, &loser_id])
            .await
            .map_err(PostgresError::Query)?;

        txn.commit().await.map_err(PostgresError::Query)?;
        Ok(())
    }

    async fn insert_grant(&self, grant: AuthorityGrant) -> Result<()> {
        let client = self.client().await?;
        client
            .execute(
                "INSERT INTO authority_grants (
                    id, document_id, grantor_entity_id, grantee_entity_id, grant_type, scope,
                    effective_date, expiration_date, is_active, revoked_by, created_at
                ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11)",
                &[
                    &grant.id,
                    &grant.document_id,
                    &grant.grantor_entity_id,
                    &grant.grantee_entity_id,
                    &grant.grant_type,
                    &grant.scope,
                    &grant.effective_date,
                    &grant.expiration_date,
                    &grant.is_active,
                    &grant.revoked_by,
                    &grant.created_at,
                ],
            )
            .await
            .map_err(PostgresError::Query)?;
        Ok(())
    }

    async fn deactivate_grant(&self, grant_id: &str, revoked_by: &str) -> Result<()> {
        let client = self.client().await?;
        let rows = client
            .execute(
                "UPDATE authority_grants SET is_active = false, revoked_by = $2 WHERE id = $1",
                &[&grant_id, &revoked_by],
            )
            .await
            .map_err(PostgresError::Query)?;
        if rows == 0 {
            return Err(Error::NotFound(format!("grant {grant_id}")));
        }
        Ok(())
    }

    async fn find_active_grant(
        &self,
        grantor_entity_id: &str,
        grantee_entity_id: &str,
        grant_type: &str,
    ) -> Result<Option<AuthorityGrant>> {
        let client = self.client().await?;
        let row = client
            .query_opt(
                "SELECT * FROM authority_grants
                 WHERE is_active = true AND grantor_entity_id = $1 AND grantee_entity_id = $2 AND grant_type = $3",
                &[&grantor_entity_id, &grantee_entity_id, &grant_type],
            )
            .await
            .map_err(PostgresError::Query)?;
        Ok(row.as_ref().map(row_to_grant).transpose()?)
    }

    async fn get_grant(&self, id: &str) -> Result<Option<AuthorityGrant>> {
        let client = self.client().await?;
        let row = client
            .query_opt("SELECT * FROM authority_grants WHERE id = $1", &[&id])
            .await
            .map_err(PostgresError::Query)?;
        Ok(row.as_ref().map(row_to_grant).transpose()?)
    }

    async fn list_active_grants(&self) -> Result<Vec<AuthorityGrant>> {
        let client = self.client().await?;
        let rows = client
            .query("SELECT * FROM authority_grants WHERE is_active = true", &[])
            .await
            .map_err(PostgresError::Query)?;
        Ok(rows.iter().map(row_to_grant).collect::<PgResult<Vec<_>>>()?)
    }

    async fn update_grant_dates(
        &self,
        grant_id: &str,
        effective_date: Option<NaiveDate>,
        expiration_date: Option<NaiveDate>,
    ) -> Result<()> {
        let client = self.client().await?;
        let rows = client
            .execute(
                "UPDATE authority_grants SET effective_date = $2, expiration_date = $3 WHERE id = $1",
                &[&grant_id, &effective_date, &expiration_date],
            )
            .await
            .map_err(PostgresError::Query)?;
        if rows == 0 {
            return Err(Error::NotFound(format!("grant {grant_id}")));
        }
        Ok(())
    }

    async fn upsert_knowledge_gap(
        &self,
        fingerprint: &str,
        gap_type: GapType,
        partial_value: &str,
        context_clues: Vec<String>,
        resolution_hints: Vec<String>,
        confidence_threshold: f64,
    ) -> Result<KnowledgeGap> {
        let client = self.client().await?;
        let id = new_id();
        let gap_type_text = enum_to_text(&gap_type)?;
        let status_text = enum_to_text(&GapStatus::Open)?;
        let context_clues_json = to_json(&context_clues)?;
        let resolution_hints_json = to_json(&resolution_hints)?;
        let row = client
            .query_one(
                "INSERT INTO knowledge_gaps (
                    id, gap_type, fingerprint, partial_value, context_clues, resolution_hints,
                    confidence_threshold, occurrence_count, status, resolved_value,
                    resolution_source_doc, first_seen_at, last_seen_at
                ) VALUES ($1,$2,$3,$4,$5,$6,$7,1,$8,NULL,NULL,now(),now())
                ON CONFLICT (fingerprint) DO UPDATE SET
                    occurrence_count = knowledge_gaps.occurrence_count + 1,
                    last_seen_at = now()
                RETURNING *",
                &[
                    &id,
                    &gap_type_text,
                    &fingerprint,
                    &partial_value,
                    &context_clues_json,
                    &resolution_hints_json,
                    &confidence_threshold,
                    &status_text,
                ],
            )
            .await
            .map_err(PostgresError::Query)?;
        Ok(row_to_gap(&row)?)
    }

    async fn get_gap(&self, id: &str) -> Result<Option<KnowledgeGap>> {
        let client = self.client().await?;
        let row = client
            .query_opt("SELECT * FROM knowledge_gaps WHERE id = $1", &[&id])
            .await
            .map_err(PostgresError::Query)?;
        Ok(row.as_ref().map(row_to_gap).transpose()?)
    }

    async fn list_gaps_by_status(&self, status: GapStatus) -> Result<Vec<KnowledgeGap>> {
        let client = self.client().await?;
        let status_text = enum_to_text(&status)?;
        let rows = client
            .query("SELECT * FROM knowledge_gaps WHERE status = $1", &[&status_text])
            .await
            .map_err(PostgresError::Query)?;
        Ok(rows.iter().map(row_to_gap).collect::<PgResult<Vec<_>>>()?)
    }

    async fn set_gap_status(
        &self,
        gap_id: &str,
        status: GapStatus,
        resolved_value: Option<String>,
        resolution_source_doc: Option<String>,
    ) -> Result<()> {
        let client = self.client().await?;
        let status_text = enum_to_text(&status)?;
        let rows = client
            .execute(
                "UPDATE knowledge_gaps SET
                    status = $2,
                    resolved_value = COALESCE($3, resolved_value),
                    resolution_source_doc = COALESCE($4, resolution_source_doc)
                 WHERE id = $1",
                &[&gap_id, &status_text, &resolved_value, &resolution_source_doc],
            )
            .await
            .map_err(PostgresError::Query)?;
        if rows == 0 {
            return Err(Error::NotFound(format!("gap {gap_id}")));
        }
        Ok(())
    }

    async fn append_gap_occurrence(&self, occurrence: GapOccurrence) -> Result<()> {
        let client = self.client().await?;
        let bounding_box = occurrence.bounding_box.map(|b| to_json(&b)).transpose()?;
        client
            .execute(
                "INSERT INTO gap_occurrences (
                    gap_id, document_id, field_path, page, bounding_box, surrounding_text,
                    local_context, extraction_confidence, placeholder_value
                ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9)
                ON CONFLICT (gap_id, document_id, field_path) DO NOTHING",
                &[
                    &occurrence.gap_id,
                    &occurrence.document_id,
                    &occurrence.field_path,
                    &occurrence.page.map(|v| v as i32),
                    &bounding_box,
                    &occurrence.surrounding_text,
                    &occurrence.local_context,
                    &occurrence.extraction_confidence,
                    &occurrence.placeholder_value,
                ],
            )
            .await
            .map_err(PostgresError::Query)?;
        Ok(())
    }

    async fn list_gap_occurrences(&self, gap_id: &str) -> Result<Vec<GapOccurrence>> {
        let client = self.client().await?;
        let rows = client
            .query("SELECT * FROM gap_occurrences WHERE gap_id = $1", &[&gap_id])
            .await
            .map_err(PostgresError::Query)?;
        Ok(rows.iter().map(row_to_gap_occurrence).collect::<PgResult<Vec<_>>>()?)
    }

    async fn add_gap_candidate(&self, candidate: GapCandidate) -> Result<()> {
        let client = self.client().await?;
        let source_type = enum_to_text(&candidate.source_type)?;
        let status = enum_to_text(&candidate.status)?;
        client
            .execute(
                "INSERT INTO gap_candidates (
                    id, gap_id, proposed_value, source_type, source_document, confidence,
                    confirmations, rejections, status
                ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9)
                ON CONFLICT (id) DO UPDATE SET
                    confirmations = EXCLUDED.confirmations, rejections = EXCLUDED.rejections, status = EXCLUDED.status",
                &[
                    &candidate.id,
                    &candidate.gap_id,
                    &candidate.proposed_value,
                    &source_type,
                    &candidate.source_document,
                    &candidate.confidence,
                    &(candidate.confirmations as i32),
                    &(candidate.rejections as i32),
                    &status,
                ],
            )
            .await
            .map_err(PostgresError::Query)?;
        Ok(())
    }

    async fn list_gap_candidates(&self, gap_id: &str) -> Result<Vec<GapCandidate>> {
        let client = self.client().await?;
        let rows = client
            .query("SELECT * FROM gap_candidates WHERE gap_id = $1", &[&gap_id])
            .await
            .map_err(PostgresError::Query)?;
        Ok(rows.iter().map(row_to_gap_candidate).collect::<PgResult<Vec<_>>>()?)
    }

    async fn set_gap_candidate_status(&self, candidate_id: &str, status: GapCandidateStatus) -> Result<()> {
        let client = self.client().await?;
        let status_text = enum_to_text(&status)?;
        let rows = client
            .execute("UPDATE gap_candidates SET status = $2 WHERE id = $1", &[&candidate_id, &status_text])
            .await
            .map_err(PostgresError::Query)?;
        if rows == 0 {
            return Err(Error::NotFound(format!("gap candidate {candidate_id}")));
        }
        Ok(())
    }

    async fn insert_duplicate_candidate_if_absent(&self, candidate: DuplicateCandidate) -> Result<bool> {
        let client = self.client().await?;
        let method = enum_to_text(&candidate.method)?;
        let confidence = enum_to_text(&candidate.confidence)?;
        let status = enum_to_text(&candidate.status)?;
        let rows = client
            .execute(
                "INSERT INTO duplicate_candidates (
                    document_id, candidate_document_id, method, similarity_score, confidence, status, auto_resolved
                ) VALUES ($1,$2,$3,$4,$5,$6,$7)
                ON CONFLICT (document_id, candidate_document_id) DO NOTHING",
                &[
                    &candidate.document_id,
                    &candidate.candidate_document_id,
                    &method,
                    &candidate.similarity_score,
                    &confidence,
                    &status,
                    &candidate.auto_resolved,
                ],
            )
            .await
            .map_err(PostgresError::Query)?;
        Ok(rows > 0)
    }

    async fn get_duplicate_candidate(&self, a: &str, b: &str) -> Result<Option<DuplicateCandidate>> {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let client = self.client().await?;
        let row = client
            .query_opt(
                "SELECT * FROM duplicate_candidates WHERE document_id = $1 AND candidate_document_id = $2",
                &[&lo, &hi],
            )
            .await
            .map_err(PostgresError::Query)?;
        Ok(row.as_ref().map(row_to_duplicate_candidate).transpose()?)
    }

    async fn list_duplicate_candidates(&self, status: Option<DuplicateStatus>) -> Result<Vec<DuplicateCandidate>> {
        let client = self.client().await?;
        let rows = match status {
            Some(s) => {
                let status_text = enum_to_text(&s)?;
                client
                    .query("SELECT * FROM duplicate_candidates WHERE status = $1", &[&status_text])
                    .await
            }
            None => client.query("SELECT * FROM duplicate_candidates", &[]).await,
        }
        .map_err(PostgresError::Query)?;
        Ok(rows.iter().map(row_to_duplicate_candidate).collect::<PgResult<Vec<_>>>()?)
    }

    async fn set_duplicate_status(&self, a: &str, b: &str, status: DuplicateStatus, auto_resolved: bool) -> Result<()> {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let client = self.client().await?;
        let status_text = enum_to_text(&status)?;
        let rows = client
            .execute(
                "UPDATE duplicate_candidates SET status = $3, auto_resolved = $4
                 WHERE document_id = $1 AND candidate_document_id = $2",
                &[&lo, &hi, &status_text, &auto_resolved],
            )
            .await
            .map_err(PostgresError::Query)?;
        if rows == 0 {
            return Err(Error::NotFound(format!("duplicate candidate {a}/{b}")));
        }
        Ok(())
    }

    async fn insert_correction_rule(&self, rule: CorrectionRule) -> Result<()> {
        let client = self.client().await?;
        let correction_type = enum_to_text(&rule.correction_type)?;
        let status = enum_to_text(&rule.status)?;
        let match_criteria = to_json(&rule.match_criteria)?;
        let correction_value = to_json(&rule.correction_value)?;
        client
            .execute(
                "INSERT INTO correction_rules (
                    id, name, rule_type, match_criteria, correction_type, correction_value,
                    requires_approval, status, affected_count, queued_count, applied_count
                ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11)",
                &[
                    &rule.id,
                    &rule.name,
                    &rule.rule_type,
                    &match_criteria,
                    &correction_type,
                    &correction_value,
                    &rule.requires_approval,
                    &status,
                    &(rule.affected_count as i64),
                    &(rule.queued_count as i64),
                    &(rule.applied_count as i64),
                ],
            )
            .await
            .map_err(PostgresError::Query)?;
        Ok(())
    }

    async fn get_correction_rule(&self, id: &str) -> Result<Option<CorrectionRule>> {
        let client = self.client().await?;
        let row = client
            .query_opt("SELECT * FROM correction_rules WHERE id = $1", &[&id])
            .await
            .map_err(PostgresError::Query)?;
        Ok(row.as_ref().map(row_to_rule).transpose()?)
    }

    async fn update_correction_rule(&self, rule: CorrectionRule) -> Result<()> {
        let client = self.client().await?;
        let status = enum_to_text(&rule.status)?;
        client
            .execute(
                "UPDATE correction_rules SET
                    status = $2, affected_count = $3, queued_count = $4, applied_count = $5
                 WHERE id = $1",
                &[
                    &rule.id,
                    &status,
                    &(rule.affected_count as i64),
                    &(rule.queued_count as i64),
                    &(rule.applied_count as i64),
                ],
            )
            .await
            .map_err(PostgresError::Query)?;
        Ok(())
    }

    async fn list_correction_rules(&self, status: Option<RuleStatus>) -> Result<Vec<CorrectionRule>> {
        let client = self.client().await?;
        let rows = match status {
            Some(s) => {
                let status_text = enum_to_text(&s)?;
                client.query("SELECT * FROM correction_rules WHERE status = $1", &[&status_text]).await
            }
            None => client.query("SELECT * FROM correction_rules", &[]).await,
        }
        .map_err(PostgresError::Query)?;
        Ok(rows.iter().map(row_to_rule).collect::<PgResult<Vec<_>>>()?)
    }

    async fn find_affected(&self, criteria: &MatchCriteria) -> Result<Vec<Document>> {
        let client = self.client().await?;
        let mut sql = String::from("SELECT * FROM documents WHERE 1=1");
        let mut params: Vec<Box<dyn tokio_postgres::types::ToSql + Sync + Send>> = Vec::new();
        if let Some(doc_type) = criteria.document_type {
            params.push(Box::new(enum_to_text(&doc_type)?));
            sql.push_str(&format!(" AND document_type = ${}", params.len()));
        }
        if let Some((start, end)) = criteria.date_range {
            params.push(Box::new(start));
            sql.push_str(&format!(" AND created_at >= ${}", params.len()));
            params.push(Box::new(end));
            sql.push_str(&format!(" AND created_at <= ${}", params.len()));
        }
        sql.push_str(" ORDER BY seq ASC LIMIT 10000");

        let param_refs: Vec<&(dyn tokio_postgres::types::ToSql + Sync)> =
            params.iter().map(|p| p.as_ref() as &(dyn tokio_postgres::types::ToSql + Sync)).collect();
        let rows = client.query(&sql, &param_refs).await.map_err(PostgresError::Query)?;

        let mut results = Vec::new();
        for row in &rows {
            let document = row_to_document(row)?;
            if let Some(ref path) = criteria.field_path {
                match &document.extracted_data {
                    Some(data) if jsonpath::get_path(data, path).is_some() => {}
                    _ => continue,
                }
            }
            if let Some(ref needle) = criteria.entity_name_like {
                let needle_lower = format!("%{}%", needle.to_lowercase());
                let matched = client
                    .query_opt(
                        "SELECT 1 FROM document_entity_links dl JOIN entities e ON e.id = dl.entity_id
                         WHERE dl.document_id = $1 AND e.normalized_name LIKE $2 LIMIT 1",
                        &[&document.id, &needle_lower],
                    )
                    .await
                    .map_err(PostgresError::Query)?;
                if matched.is_none() {
                    continue;
                }
            }
            results.push(document);
        }
        Ok(results)
    }

    async fn insert_correction_queue_item_if_absent(&self, item: CorrectionQueueItem) -> Result<bool> {
        let client = self.client().await?;
        let status = enum_to_text(&item.status)?;
        let proposed_value = to_json(&item.proposed_value)?;
        let rows = client
            .execute(
                "INSERT INTO correction_queue_items (
                    id, rule_id, document_id, field_path, current_value, proposed_value, confidence,
                    status, rollback_value
                ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9)
                ON CONFLICT (rule_id, document_id, field_path) DO NOTHING",
                &[
                    &item.id,
                    &item.rule_id,
                    &item.document_id,
                    &item.field_path,
                    &item.current_value,
                    &proposed_value,
                    &item.confidence,
                    &status,
                    &item.rollback_value,
                ],
            )
            .await
            .map_err(PostgresError::Query)?;
        Ok(rows > 0)
    }

    async fn get_correction_queue_item(&self, id: &str) -> Result<Option<CorrectionQueueItem>> {
        let client = self.client().await?;
        let row = client
            .query_opt("SELECT * FROM correction_queue_items WHERE id = $1", &[&id])
            .await
            .map_err(PostgresError::Query)?;
        Ok(row.as_ref().map(row_to_queue_item).transpose()?)
    }

    async fn list_correction_queue_items(&self, status: Option<CorrectionQueueStatus>) -> Result<Vec<CorrectionQueueItem>> {
        let client = self.client().await?;
        let rows = match status {
            Some(s) => {
                let status_text = enum_to_text(&s)?;
                client
                    .query("SELECT * FROM correction_queue_items WHERE status = $1", &[&status_text])
                    .await
            }
            None => client.query("SELECT * FROM correction_queue_items", &[]).await,
        }
        .map_err(PostgresError::Query)?;
        Ok(rows.iter().map(row_to_queue_item).collect::<PgResult<Vec<_>>>()?)
    }

    async fn set_correction_queue_status(&self, id: &str, status: CorrectionQueueStatus) -> Result<()> {
        let client = self.client().await?;
        let status_text = enum_to_text(&status)?;
        let rows = client
            .execute("UPDATE correction_queue_items SET status = $2 WHERE id = $1", &[&id, &status_text])
            .await
            .map_err(PostgresError::Query)?;
        if rows == 0 {
            return Err(Error::NotFound(format!("correction queue item {id}")));
        }
        Ok(())
    }

    async fn apply_correction(&self, document_id: &str, field_path: &str, new_value: serde_json::Value) -> Result<serde_json::Value> {
        let mut client = self.client().await?;
        let txn = client.transaction().await.map_err(PostgresError::Query)?;

        let row = txn
            .query_opt("SELECT extracted_data FROM documents WHERE id = $1 FOR UPDATE", &[&document_id])
            .await
            .map_err(PostgresError::Query)?
            .ok_or_else(|| Error::NotFound(format!("document {document_id}")))?;
        let mut data: serde_json::Value =
            row.get::<_, Option<serde_json::Value>>("extracted_data").unwrap_or_else(|| serde_json::json!({}));
        let previous = jsonpath::set_path(&mut data, field_path, new_value).unwrap_or(serde_json::Value::Null);

        txn.execute(
            "UPDATE documents SET extracted_data = $2, updated_at = now() WHERE id = $1",
            &[&document_id, &data],
        )
        .await
        .map_err(PostgresError::Query)?;
        txn.commit().await.map_err(PostgresError::Query)?;
        Ok(previous)
    }

    async fn append_correction_audit_log(&self, entry: CorrectionAuditLogEntry) -> Result<()> {
        let client = self.client().await?;
        client
            .execute(
                "INSERT INTO correction_audit_log (
                    id, queue_item_id, document_id, field_path, previous_value, new_value, applied_at
                ) VALUES ($1,$2,$3,$4,$5,$6,$7)",
                &[
                    &entry.id,
                    &entry.queue_item_id,
                    &entry.document_id,
                    &entry.field_path,
                    &entry.previous_value,
                    &entry.new_value,
                    &entry.applied_at,
                ],
            )
            .await
            .map_err(PostgresError::Query)?;
        Ok(())
    }

    async fn enqueue_review_item(&self, item: ReviewQueueItem) -> Result<()> {
        let client = self.client().await?;
        let source_table = enum_to_text(&item.source_table)?;
        let status = enum_to_text(&item.status)?;
        client
            .execute(
                "INSERT INTO review_queue_items (id, source_table, source_id, review_type, priority, status, resolution)
                 VALUES ($1,$2,$3,$4,$5,$6,$7)",
                &[
                    &item.id,
                    &source_table,
                    &item.source_id,
                    &item.review_type,
                    &(item.priority as i32),
                    &status,
                    &item.resolution,
                ],
            )
            .await
            .map_err(PostgresError::Query)?;
        Ok(())
    }

    async fn list_review_items(&self, status: Option<ReviewStatus>) -> Result<Vec<ReviewQueueItem>> {
        let client = self.client().await?;
        let rows = match status {
            Some(s) => {
                let status_text = enum_to_text(&s)?;
                client
                    .query("SELECT * FROM review_queue_items WHERE status = $1", &[&status_text])
                    .await
            }
            None => client.query("SELECT * FROM review_queue_items", &[]).await,
        }
        .map_err(PostgresError::Query)?;
        Ok(rows.iter().map(row_to_review_item).collect::<PgResult<Vec<_>>>()?)
    }

    async fn set_review_status(&self, id: &str, status: ReviewStatus, resolution: Option<String>) -> Result<()> {
        let client = self.client().await?;
        let status_text = enum_to_text(&status)?;
        let rows = client
            .execute(
                "UPDATE review_queue_items SET status = $2, resolution = COALESCE($3, resolution) WHERE id = $1",
                &[&id, &status_text, &resolution],
            )
            .await
            .map_err(PostgresError::Query)?;
        if rows == 0 {
            return Err(Error::NotFound(format!("review item {id}")));
        }
        Ok(())
    }

    async fn append_processing_log(&self, entry: ProcessingLog) -> Result<()> {
        let client = self.client().await?;
        let status = enum_to_text(&entry.status)?;
        client
            .execute(
                "INSERT INTO processing_log (document_id, workflow_instance_id, step, status, error, recorded_at)
                 VALUES ($1,$2,$3,$4,$5,$6)",
                &[
                    &entry.document_id,
                    &entry.workflow_instance_id,
                    &entry.step,
                    &status,
                    &entry.error,
                    &entry.recorded_at,
                ],
            )
            .await
            .map_err(PostgresError::Query)?;
        Ok(())
    }

    async fn get_processing_log(&self, workflow_instance_id: &str) -> Result<Vec<ProcessingLog>> {
        let client = self.client().await?;
        let rows = client
            .query(
                "SELECT * FROM processing_log WHERE workflow_instance_id = $1 ORDER BY seq ASC",
                &[&workflow_instance_id],
            )
            .await
            .map_err(PostgresError::Query)?;
        Ok(rows.iter().map(row_to_log_entry).collect::<PgResult<Vec<_>>>()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enum_roundtrips_through_text() {
        let text = enum_to_text(&ProcessingStatus::Completed).unwrap();
        assert_eq!(text, "completed");
        let back: ProcessingStatus = text_to_enum(&text).unwrap();
        assert_eq!(back, ProcessingStatus::Completed);
    }

    #[test]
    fn opt_enum_roundtrips() {
        let text = opt_enum_to_text(Some(&DocumentType::PowerOfAttorney)).unwrap();
        assert_eq!(text.as_deref(), Some("power_of_attorney"));
        let back: Option<DocumentType> = opt_text_to_enum(text.as_deref()).unwrap();
        assert_eq!(back, Some(DocumentType::PowerOfAttorney));
        assert_eq!(opt_enum_to_text::<DocumentType>(None).unwrap(), None);
    }

    #[test]
    fn json_roundtrips_match_criteria() {
        let criteria = MatchCriteria {
            document_type: Some(DocumentType::Deed),
            ..Default::default()
        };
        let json = to_json(&criteria).unwrap();
        let back: MatchCriteria = from_json(json).unwrap();
        assert_eq!(back.document_type, Some(DocumentType::Deed));
    }
}
