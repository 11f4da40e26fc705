//! Qdrant-backed [`VectorIndex`] for semantic duplicate detection and
//! document search.
//!
//! A document's embedding is stored as a single unnamed dense vector, keyed
//! by the document id itself, with the rest of [`VectorRecord`] (document
//! type, linked entity ids, effective date, key terms) carried in the
//! point's payload so it round-trips through [`VectorIndex::get`] without a
//! second lookup against the knowledge graph store.
//!
//! Requires a running Qdrant server reachable over its gRPC port (6334 by
//! default); the target collection is created on first connect if absent.

use async_trait::async_trait;
use chrono::NaiveDate;
use evidentia_core::error::{Error, Result};
use evidentia_core::model::{DocumentType, VectorRecord};
use evidentia_core::vector::{VectorIndex, VectorMatch};
use qdrant_client::qdrant::{
    self, vectors_config::Config as VectorsConfigEnum, Condition, CreateCollectionBuilder,
    DeletePointsBuilder, Distance, Filter, GetPointsBuilder, PointId, PointStruct,
    PointsIdsList, QueryPointsBuilder, UpsertPointsBuilder, VectorParamsBuilder, VectorsConfig,
};
use qdrant_client::{Payload, Qdrant};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use tracing::debug;

const DOCUMENT_TYPE_KEY: &str = "document_type";
const ENTITY_IDS_KEY: &str = "entity_ids";
const EFFECTIVE_DATE_KEY: &str = "effective_date";
const KEY_TERMS_KEY: &str = "key_terms";

/// The non-vector half of a [`VectorRecord`], serialized into and read back
/// out of a point's payload.
#[derive(Debug, Default, Serialize, Deserialize)]
struct RecordPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    document_type: Option<DocumentType>,
    #[serde(default)]
    entity_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    effective_date: Option<NaiveDate>,
    #[serde(default)]
    key_terms: Vec<String>,
}

fn persistence_error(context: &str, err: impl std::fmt::Display) -> Error {
    Error::Persistence(format!("{context}: {err}"))
}

/// A [`VectorIndex`] backed by a Qdrant collection.
pub struct QdrantVectorIndex {
    client: Qdrant,
    collection_name: String,
    vector_size: u64,
}

impl std::fmt::Debug for QdrantVectorIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QdrantVectorIndex")
            .field("collection_name", &self.collection_name)
            .field("vector_size", &self.vector_size)
            .finish_non_exhaustive()
    }
}

impl QdrantVectorIndex {
    /// Connects to a Qdrant server and ensures `collection_name` exists,
    /// creating it with a single unnamed cosine-distance dense vector of
    /// `vector_size` dimensions if it does not.
    pub async fn connect(
        url: &str,
        collection_name: impl Into<String>,
        vector_size: u64,
    ) -> Result<Self> {
        let client = Qdrant::from_url(url)
            .build()
            .map_err(|e| persistence_error("failed to build Qdrant client", e))?;
        let store = Self {
            client,
            collection_name: collection_name.into(),
            vector_size,
        };
        store.ensure_collection().await?;
        Ok(store)
    }

    async fn ensure_collection(&self) -> Result<()> {
        let exists = self
            .client
            .collection_exists(&self.collection_name)
            .await
            .map_err(|e| persistence_error("failed to check collection existence", e))?;
        if exists {
            return Ok(());
        }

        let vector_params = VectorParamsBuilder::new(self.vector_size, Distance::Cosine).build();
        let vectors_config = VectorsConfig {
            config: Some(VectorsConfigEnum::Params(vector_params)),
        };
        let create = CreateCollectionBuilder::new(&self.collection_name)
            .vectors_config(vectors_config);
        self.client
            .create_collection(create)
            .await
            .map_err(|e| {
                persistence_error(
                    &format!("failed to create collection '{}'", self.collection_name),
                    e,
                )
            })?;
        debug!(collection = %self.collection_name, dimensions = self.vector_size, "created qdrant collection");
        Ok(())
    }

    fn point_id(document_id: &str) -> PointId {
        document_id.to_string().into()
    }

    fn build_payload(record: &VectorRecord) -> Result<Payload> {
        let payload = RecordPayload {
            document_type: record.document_type.clone(),
            entity_ids: record.entity_ids.clone(),
            effective_date: record.effective_date,
            key_terms: record.key_terms.clone(),
        };
        let value = serde_json::to_value(&payload)
            .map_err(|e| persistence_error("failed to serialize vector payload", e))?;
        value
            .try_into()
            .map_err(|e| persistence_error("failed to build qdrant payload", e))
    }

    fn payload_to_record(
        document_id: String,
        embedding: Vec<f32>,
        payload: &HashMap<String, qdrant::Value>,
    ) -> VectorRecord {
        let document_type = payload
            .get(DOCUMENT_TYPE_KEY)
            .and_then(qdrant_value_to_json)
            .and_then(|v| serde_json::from_value(v).ok());
        let entity_ids = payload
            .get(ENTITY_IDS_KEY)
            .and_then(qdrant_value_to_json)
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default();
        let effective_date = payload
            .get(EFFECTIVE_DATE_KEY)
            .and_then(qdrant_value_to_json)
            .and_then(|v| serde_json::from_value(v).ok());
        let key_terms = payload
            .get(KEY_TERMS_KEY)
            .and_then(qdrant_value_to_json)
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default();
        VectorRecord {
            document_id,
            embedding,
            document_type,
            entity_ids,
            effective_date,
            key_terms,
        }
    }
}

/// Converts a `qdrant::Value` to `serde_json::Value` recursively.
fn qdrant_value_to_json(value: &qdrant::Value) -> Option<JsonValue> {
    use qdrant::value::Kind;
    match &value.kind {
        Some(Kind::NullValue(_)) => Some(JsonValue::Null),
        Some(Kind::BoolValue(b)) => Some(JsonValue::Bool(*b)),
        Some(Kind::IntegerValue(i)) => Some(JsonValue::Number((*i).into())),
        Some(Kind::DoubleValue(f)) => serde_json::Number::from_f64(*f).map(JsonValue::Number),
        Some(Kind::StringValue(s)) => Some(JsonValue::String(s.clone())),
        Some(Kind::ListValue(list)) => Some(JsonValue::Array(
            list.values.iter().filter_map(qdrant_value_to_json).collect(),
        )),
        Some(Kind::StructValue(struct_val)) => Some(JsonValue::Object(
            struct_val
                .fields
                .iter()
                .filter_map(|(k, v)| qdrant_value_to_json(v).map(|jv| (k.clone(), jv)))
                .collect(),
        )),
        None => None,
    }
}

fn point_id_to_string(id: &PointId) -> String {
    match &id.point_id_options {
        Some(qdrant::point_id::PointIdOptions::Num(n)) => n.to_string(),
        Some(qdrant::point_id::PointIdOptions::Uuid(s)) => s.clone(),
        None => String::new(),
    }
}

#[async_trait]
impl VectorIndex for QdrantVectorIndex {
    async fn upsert(&self, record: VectorRecord) -> Result<()> {
        let payload = Self::build_payload(&record)?;
        let point = PointStruct::new(
            Self::point_id(&record.document_id),
            record.embedding.clone(),
            payload,
        );
        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection_name, vec![point]).wait(true))
            .await
            .map_err(|e| {
                persistence_error(
                    &format!("failed to upsert vector for '{}'", record.document_id),
                    e,
                )
            })?;
        Ok(())
    }

    async fn remove(&self, document_id: &str) -> Result<()> {
        self.client
            .delete_points(
                DeletePointsBuilder::new(&self.collection_name)
                    .points(PointsIdsList {
                        ids: vec![Self::point_id(document_id)],
                    })
                    .wait(true),
            )
            .await
            .map_err(|e| persistence_error(&format!("failed to remove vector for '{document_id}'"), e))?;
        Ok(())
    }

    async fn search(
        &self,
        query: &[f32],
        limit: usize,
        exclude_document_id: Option<&str>,
    ) -> Result<Vec<VectorMatch>> {
        let mut query_builder = QueryPointsBuilder::new(&self.collection_name)
            .query(query.to_vec())
            .limit(limit as u64)
            .with_payload(false)
            .with_vectors(false);
        if let Some(excluded) = exclude_document_id {
            query_builder = query_builder.filter(Filter::must_not([Condition::has_id([
                Self::point_id(excluded),
            ])]));
        }

        let response = self
            .client
            .query(query_builder)
            .await
            .map_err(|e| persistence_error("qdrant similarity search failed", e))?;

        Ok(response
            .result
            .into_iter()
            .filter_map(|scored| {
                let id = scored.id.as_ref()?;
                Some(VectorMatch {
                    document_id: point_id_to_string(id),
                    similarity: f64::from(scored.score),
                })
            })
            .collect())
    }

    async fn get(&self, document_id: &str) -> Result<Option<VectorRecord>> {
        let response = self
            .client
            .get_points(
                GetPointsBuilder::new(&self.collection_name, vec![Self::point_id(document_id)])
                    .with_payload(true)
                    .with_vectors(true),
            )
            .await
            .map_err(|e| persistence_error(&format!("failed to fetch vector for '{document_id}'"), e))?;

        let Some(point) = response.result.into_iter().next() else {
            return Ok(None);
        };
        let embedding = point
            .vectors
            .and_then(|v| v.vectors_options)
            .and_then(|opt| match opt {
                qdrant::vectors_output::VectorsOptions::Vector(vector) => Some(vector.data),
                qdrant::vectors_output::VectorsOptions::Vectors(_) => None,
            })
            .unwrap_or_default();
        let payload: HashMap<String, qdrant::Value> = point.payload.into_iter().collect();
        Ok(Some(Self::payload_to_record(
            document_id.to_string(),
            embedding,
            &payload,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_payload_round_trips_through_json() {
        let payload = RecordPayload {
            document_type: Some(DocumentType::Trust),
            entity_ids: vec!["e1".to_string(), "e2".to_string()],
            effective_date: NaiveDate::from_ymd_opt(2024, 1, 1),
            key_terms: vec!["trustee".to_string()],
        };
        let value = serde_json::to_value(&payload).unwrap();
        let restored: RecordPayload = serde_json::from_value(value).unwrap();
        assert_eq!(restored.entity_ids, payload.entity_ids);
        assert_eq!(restored.effective_date, payload.effective_date);
        assert_eq!(restored.key_terms, payload.key_terms);
    }

    #[test]
    fn point_id_round_trips_for_string_ids() {
        let id = QdrantVectorIndex::point_id("doc-123");
        assert_eq!(point_id_to_string(&id), "doc-123");
    }
}
