use async_trait::async_trait;
use futures::future::join_all;
use qdrant_client::{
    qdrant::{
        value::Kind, Condition, CreateCollectionBuilder, CreateFieldIndexCollectionBuilder,
        Distance, FieldType, Filter, PointStruct, ScrollPointsBuilder, SearchPointsBuilder,
        UpsertPointsBuilder, Value as QdrantValue, VectorParamsBuilder,
    },
    Payload, Qdrant,
};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use super::qdrant_config::create_qdrant_client;
use super::store::{
    Document, Metadata, MetadataFilter, ScoredDocument, SearchRequest, VectorStore,
    VectorStoreError,
};
use crate::config::StoreSettings;
use crate::providers::traits::EmbeddingProvider;

const CONTENT_KEY: &str = "content";
const METADATA_KEY: &str = "metadata";

/// Metadata keys the services filter on. Each gets a keyword payload index.
const INDEXED_KEYS: &[&str] = &[
    "docId",
    "type",
    "personal.nationalId",
    "personal.name",
    "employment.employeeNumber",
    "period.monthKey",
];

/// Qdrant-backed store. Points carry `{"content": text, "metadata": {...}}`
/// with the flat dotted metadata keys expanded into nested objects.
#[derive(Clone)]
pub struct QdrantStore {
    client: Arc<Qdrant>,
    collection: String,
    embeddings: Arc<dyn EmbeddingProvider>,
}

impl QdrantStore {
    pub async fn connect(
        settings: &StoreSettings,
        embeddings: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self, VectorStoreError> {
        let client = create_qdrant_client(settings).await?;
        let store = Self {
            client: Arc::new(client),
            collection: settings.collection.clone(),
            embeddings,
        };
        store.ensure_collection(settings.dimensions).await?;
        Ok(store)
    }

    async fn ensure_collection(&self, dimensions: u64) -> Result<(), VectorStoreError> {
        let exists = self
            .client
            .collection_exists(self.collection.as_str())
            .await
            .map_err(|e| VectorStoreError::Connection(e.to_string()))?;

        if exists {
            log::info!("Collection {} already exists, skipping creation", self.collection);
            return Ok(());
        }

        self.client
            .create_collection(
                CreateCollectionBuilder::new(self.collection.as_str())
                    .vectors_config(VectorParamsBuilder::new(dimensions, Distance::Cosine)),
            )
            .await
            .map_err(|e| VectorStoreError::Operation(e.to_string()))?;
        log::info!(
            "Created collection {} ({} dimensions, cosine)",
            self.collection,
            dimensions
        );

        let fields: Vec<String> = INDEXED_KEYS
            .iter()
            .map(|key| format!("{}.{}", METADATA_KEY, key))
            .collect();
        let results = join_all(fields.iter().map(|field| {
            self.client
                .create_field_index(CreateFieldIndexCollectionBuilder::new(
                    self.collection.as_str(),
                    field.as_str(),
                    FieldType::Keyword,
                ))
        }))
        .await;

        for (field, result) in fields.iter().zip(results) {
            if let Err(e) = result {
                log::warn!("Failed to create payload index on {}: {}", field, e);
            }
        }
        Ok(())
    }
}

/// Stable point id for a document id, so re-indexing overwrites.
pub fn point_id(doc_id: &str) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, doc_id.as_bytes()).to_string()
}

fn insert_path(node: &mut Map<String, Value>, parts: &[&str], value: Value) {
    match parts {
        [] => {}
        [last] => {
            node.insert(last.to_string(), value);
        }
        [head, rest @ ..] => {
            let child = node
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !child.is_object() {
                *child = Value::Object(Map::new());
            }
            if let Value::Object(map) = child {
                insert_path(map, rest, value);
            }
        }
    }
}

/// Expands `a.b.c` keys into nested objects.
pub fn expand_metadata(metadata: &Metadata) -> Value {
    let mut root = Map::new();
    for (key, value) in metadata {
        let parts: Vec<&str> = key.split('.').collect();
        insert_path(&mut root, &parts, value.clone());
    }
    Value::Object(root)
}

/// Inverse of [`expand_metadata`].
pub fn flatten_metadata(value: &Value) -> Metadata {
    fn walk(prefix: &str, value: &Value, out: &mut Metadata) {
        match value {
            Value::Object(map) if !map.is_empty() => {
                for (key, child) in map {
                    let path = if prefix.is_empty() {
                        key.clone()
                    } else {
                        format!("{}.{}", prefix, key)
                    };
                    walk(&path, child, out);
                }
            }
            other => {
                if !prefix.is_empty() {
                    out.insert(prefix.to_string(), other.clone());
                }
            }
        }
    }

    let mut out = Metadata::new();
    walk("", value, &mut out);
    out
}

fn unsupported(key: &str, value: &Value) -> VectorStoreError {
    VectorStoreError::UnsupportedFilter {
        key: key.to_string(),
        value: value.clone(),
    }
}

fn match_condition(key: &str, value: &Value) -> Result<Condition, VectorStoreError> {
    let field = format!("{}.{}", METADATA_KEY, key);
    match value {
        Value::String(s) => Ok(Condition::matches(field, s.clone())),
        Value::Bool(b) => Ok(Condition::matches(field, *b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Ok(Condition::matches(field, i)),
            None => Err(unsupported(key, value)),
        },
        other => Err(unsupported(key, other)),
    }
}

fn to_condition(filter: &MetadataFilter) -> Result<Condition, VectorStoreError> {
    match filter {
        MetadataFilter::Eq(key, value) => match_condition(key, value),
        nested => Ok(Condition::from(to_qdrant_filter(nested)?)),
    }
}

pub fn to_qdrant_filter(filter: &MetadataFilter) -> Result<Filter, VectorStoreError> {
    match filter {
        MetadataFilter::Eq(key, value) => Ok(Filter::must([match_condition(key, value)?])),
        MetadataFilter::And(filters) => Ok(Filter::must(
            filters
                .iter()
                .map(to_condition)
                .collect::<Result<Vec<_>, _>>()?,
        )),
        MetadataFilter::Or(filters) => Ok(Filter::should(
            filters
                .iter()
                .map(to_condition)
                .collect::<Result<Vec<_>, _>>()?,
        )),
    }
}

fn qdrant_to_json(value: QdrantValue) -> Value {
    match value.kind {
        None | Some(Kind::NullValue(_)) => Value::Null,
        Some(Kind::BoolValue(b)) => Value::Bool(b),
        Some(Kind::IntegerValue(i)) => Value::from(i),
        Some(Kind::DoubleValue(d)) => serde_json::Number::from_f64(d)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        Some(Kind::StringValue(s)) => Value::String(s),
        Some(Kind::ListValue(list)) => {
            Value::Array(list.values.into_iter().map(qdrant_to_json).collect())
        }
        Some(Kind::StructValue(s)) => Value::Object(
            s.fields
                .into_iter()
                .map(|(k, v)| (k, qdrant_to_json(v)))
                .collect(),
        ),
    }
}

fn document_from_payload(id: String, payload: HashMap<String, QdrantValue>) -> Document {
    let mut payload: Map<String, Value> = payload
        .into_iter()
        .map(|(k, v)| (k, qdrant_to_json(v)))
        .collect();

    let text = match payload.remove(CONTENT_KEY) {
        Some(Value::String(s)) => s,
        _ => String::new(),
    };
    let metadata = payload
        .remove(METADATA_KEY)
        .map(|m| flatten_metadata(&m))
        .unwrap_or_default();

    // the docId metadata is authoritative; the point id is only its hash
    let id = metadata
        .get("docId")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or(id);

    Document { id, text, metadata }
}

fn point_uuid(id: Option<qdrant_client::qdrant::PointId>) -> String {
    use qdrant_client::qdrant::point_id::PointIdOptions;
    match id.and_then(|id| id.point_id_options) {
        Some(PointIdOptions::Uuid(uuid)) => uuid,
        Some(PointIdOptions::Num(n)) => n.to_string(),
        None => String::new(),
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn add(&self, documents: Vec<Document>) -> Result<(), VectorStoreError> {
        if documents.is_empty() {
            return Ok(());
        }

        let texts: Vec<String> = documents.iter().map(|d| d.text.clone()).collect();
        let vectors = self
            .embeddings
            .generate_embeddings(&texts)
            .await
            .map_err(|e| VectorStoreError::Embedding(e.to_string()))?;

        let points = documents
            .into_iter()
            .zip(vectors)
            .map(|(doc, vector)| {
                let mut body = Map::new();
                body.insert(CONTENT_KEY.to_string(), Value::String(doc.text));
                body.insert(METADATA_KEY.to_string(), expand_metadata(&doc.metadata));
                let payload = Payload::try_from(Value::Object(body))
                    .map_err(|e| VectorStoreError::Operation(e.to_string()))?;
                Ok(PointStruct::new(point_id(&doc.id), vector, payload))
            })
            .collect::<Result<Vec<_>, VectorStoreError>>()?;

        let count = points.len();
        self.client
            .upsert_points(UpsertPointsBuilder::new(self.collection.as_str(), points).wait(true))
            .await
            .map_err(|e| VectorStoreError::Operation(e.to_string()))?;
        log::debug!("Upserted {} points into {}", count, self.collection);
        Ok(())
    }

    async fn similarity_search(
        &self,
        request: &SearchRequest,
    ) -> Result<Vec<ScoredDocument>, VectorStoreError> {
        let vector = self
            .embeddings
            .generate_embedding(&request.query)
            .await
            .map_err(|e| VectorStoreError::Embedding(e.to_string()))?;

        let mut search =
            SearchPointsBuilder::new(self.collection.as_str(), vector, request.top_k as u64)
                .with_payload(true);
        if let Some(filter) = &request.filter {
            search = search.filter(to_qdrant_filter(filter)?);
        }
        if let Some(threshold) = request.similarity_threshold {
            search = search.score_threshold(threshold);
        }

        let response = self
            .client
            .search_points(search)
            .await
            .map_err(|e| VectorStoreError::Operation(e.to_string()))?;

        Ok(response
            .result
            .into_iter()
            .map(|point| ScoredDocument {
                score: point.score,
                document: document_from_payload(point_uuid(point.id), point.payload),
            })
            .collect())
    }

    async fn find(
        &self,
        filter: &MetadataFilter,
        limit: usize,
    ) -> Result<Vec<Document>, VectorStoreError> {
        let response = self
            .client
            .scroll(
                ScrollPointsBuilder::new(self.collection.as_str())
                    .filter(to_qdrant_filter(filter)?)
                    .limit(limit as u32)
                    .with_payload(true),
            )
            .await
            .map_err(|e| VectorStoreError::Operation(e.to_string()))?;

        Ok(response
            .result
            .into_iter()
            .map(|point| document_from_payload(point_uuid(point.id), point.payload))
            .collect())
    }
}
