//! Qdrant (gRPC) vector store backend.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use qdrant_client::qdrant::{
    value::Kind, Condition, CreateCollectionBuilder, Distance, Filter, GetPointsBuilder, PointId,
    PointStruct, SearchPointsBuilder, UpsertPointsBuilder, Value as QdrantValue,
    VectorParamsBuilder,
};
use qdrant_client::{Payload, Qdrant};
use serde_json::{Map, Value};

use crate::config::VectorStoreSettings;
use crate::domain::vector::{check_columnar, EmbeddingVector, SearchResult, VectorStore};
use crate::domain::DomainError;

/// Vector store backed by a Qdrant gRPC channel. The channel is established
/// once at construction and reused by all calls.
pub struct QdrantStore {
    client: Qdrant,
}

impl std::fmt::Debug for QdrantStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QdrantStore").finish_non_exhaustive()
    }
}

impl QdrantStore {
    pub fn new(settings: &VectorStoreSettings) -> Result<Self, DomainError> {
        let mut builder = Qdrant::from_url(&settings.url);

        if let Some(ref api_key) = settings.api_key {
            builder = builder.api_key(api_key.clone());
        }
        builder = builder.timeout(Duration::from_secs(settings.timeout_secs));

        let client = builder.build().map_err(|e| {
            DomainError::configuration(format!("failed to build qdrant client: {e}"))
        })?;

        Ok(Self { client })
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn collection_exists(&self, collection: &str) -> Result<bool, DomainError> {
        self.client
            .collection_exists(collection)
            .await
            .map_err(|e| DomainError::transport("qdrant collection_exists", e.to_string()))
    }

    async fn create_collection(
        &self,
        collection: &str,
        dimension: usize,
    ) -> Result<(), DomainError> {
        self.client
            .create_collection(
                CreateCollectionBuilder::new(collection)
                    .vectors_config(VectorParamsBuilder::new(dimension as u64, Distance::Cosine)),
            )
            .await
            .map_err(|e| DomainError::transport("qdrant create_collection", e.to_string()))?;
        Ok(())
    }

    async fn point_exists(&self, collection: &str, id: u64) -> Result<bool, DomainError> {
        let response = self
            .client
            .get_points(GetPointsBuilder::new(
                collection,
                vec![PointId::from(id)],
            ))
            .await
            .map_err(|e| DomainError::transport("qdrant point_exists", e.to_string()))?;

        Ok(!response.result.is_empty())
    }

    async fn upsert(
        &self,
        collection: &str,
        ids: &[u64],
        embeddings: &[EmbeddingVector],
        payloads: &[Map<String, Value>],
    ) -> Result<(), DomainError> {
        check_columnar(ids, embeddings, payloads)?;

        let mut points = Vec::with_capacity(ids.len());
        for ((id, embedding), payload) in ids.iter().zip(embeddings).zip(payloads) {
            let payload = Payload::try_from(Value::Object(payload.clone()))
                .map_err(|e| DomainError::data(format!("invalid point payload: {e}")))?;
            points.push(PointStruct::new(*id, embedding.clone(), payload));
        }

        self.client
            .upsert_points(UpsertPointsBuilder::new(collection, points))
            .await
            .map_err(|e| DomainError::transport("qdrant upsert", e.to_string()))?;
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        top_k: usize,
        filter: Option<&Value>,
    ) -> Result<Vec<SearchResult>, DomainError> {
        let mut builder =
            SearchPointsBuilder::new(collection, vector.to_vec(), top_k as u64).with_payload(true);

        if let Some(filter) = filter {
            builder = builder.filter(Filter::must(filter_conditions(filter)?));
        }

        let response = self
            .client
            .search_points(builder)
            .await
            .map_err(|e| DomainError::transport("qdrant search", e.to_string()))?;

        Ok(response
            .result
            .into_iter()
            .map(|point| SearchResult {
                payload: qdrant_payload_to_json(point.payload),
                score: point.score,
            })
            .collect())
    }

    async fn health(&self) -> Result<(), DomainError> {
        self.client
            .health_check()
            .await
            .map_err(|e| DomainError::transport("qdrant health", e.to_string()))?;
        Ok(())
    }
}

/// Translate a flat JSON object of exact-match constraints into qdrant
/// conditions.
fn filter_conditions(filter: &Value) -> Result<Vec<Condition>, DomainError> {
    let Value::Object(fields) = filter else {
        return Err(DomainError::validation("search filter must be a JSON object"));
    };

    let mut conditions = Vec::with_capacity(fields.len());
    for (field, value) in fields {
        let condition = match value {
            Value::String(s) => Condition::matches(field.as_str(), s.clone()),
            Value::Bool(b) => Condition::matches(field.as_str(), *b),
            Value::Number(n) => {
                let i = n.as_i64().ok_or_else(|| {
                    DomainError::validation(format!("filter field {field} must be an integer"))
                })?;
                Condition::matches(field.as_str(), i)
            }
            other => {
                return Err(DomainError::validation(format!(
                    "unsupported filter value for {field}: {other}"
                )))
            }
        };
        conditions.push(condition);
    }
    Ok(conditions)
}

fn qdrant_payload_to_json(payload: HashMap<String, QdrantValue>) -> Map<String, Value> {
    let mut map = Map::new();
    for (key, value) in payload {
        if let Some(json) = qdrant_value_to_json(value) {
            map.insert(key, json);
        }
    }
    map
}

fn qdrant_value_to_json(value: QdrantValue) -> Option<Value> {
    match value.kind? {
        Kind::NullValue(_) => Some(Value::Null),
        Kind::BoolValue(b) => Some(Value::Bool(b)),
        Kind::IntegerValue(i) => Some(Value::Number(i.into())),
        Kind::DoubleValue(d) => serde_json::Number::from_f64(d).map(Value::Number),
        Kind::StringValue(s) => Some(Value::String(s)),
        Kind::ListValue(list) => Some(Value::Array(
            list.values
                .into_iter()
                .filter_map(qdrant_value_to_json)
                .collect(),
        )),
        Kind::StructValue(object) => {
            let mut map = Map::new();
            for (key, value) in object.fields {
                if let Some(json) = qdrant_value_to_json(value) {
                    map.insert(key, json);
                }
            }
            Some(Value::Object(map))
        }
    }
}
