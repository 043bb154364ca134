//! Vector store abstraction shared by the Qdrant and in-memory backends.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

/// Flat metadata map. Keys use dotted names such as `personal.nationalId`.
pub type Metadata = BTreeMap<String, Value>;

#[derive(Error, Debug)]
pub enum VectorStoreError {
    #[error("Connection error: {0}")]
    Connection(String),
    #[error("Operation failed: {0}")]
    Operation(String),
    #[error("Embedding failed: {0}")]
    Embedding(String),
    #[error("Unsupported filter value for '{key}': {value}")]
    UnsupportedFilter { key: String, value: Value },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub text: String,
    pub metadata: Metadata,
}

impl Document {
    pub fn new(id: impl Into<String>, text: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            metadata,
        }
    }

    /// Metadata value rendered as a string; empty when absent or null.
    pub fn metadata_str(&self, key: &str) -> String {
        metadata_string(&self.metadata, key).unwrap_or_default()
    }
}

/// String form of a metadata value: strings unquoted, scalars via `Display`.
pub fn metadata_string(metadata: &Metadata, key: &str) -> Option<String> {
    match metadata.get(key)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredDocument {
    pub document: Document,
    pub score: f32,
}

/// Boolean filter over document metadata.
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataFilter {
    Eq(String, Value),
    And(Vec<MetadataFilter>),
    Or(Vec<MetadataFilter>),
}

impl MetadataFilter {
    pub fn eq(key: impl Into<String>, value: impl Into<Value>) -> Self {
        MetadataFilter::Eq(key.into(), value.into())
    }

    pub fn and(filters: impl IntoIterator<Item = MetadataFilter>) -> Self {
        MetadataFilter::And(filters.into_iter().collect())
    }

    pub fn or(filters: impl IntoIterator<Item = MetadataFilter>) -> Self {
        MetadataFilter::Or(filters.into_iter().collect())
    }

    pub fn matches(&self, metadata: &Metadata) -> bool {
        match self {
            MetadataFilter::Eq(key, expected) => metadata.get(key) == Some(expected),
            MetadataFilter::And(filters) => filters.iter().all(|f| f.matches(metadata)),
            MetadataFilter::Or(filters) => filters.iter().any(|f| f.matches(metadata)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub query: String,
    pub top_k: usize,
    pub similarity_threshold: Option<f32>,
    pub filter: Option<MetadataFilter>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>, top_k: usize) -> Self {
        Self {
            query: query.into(),
            top_k,
            similarity_threshold: None,
            filter: None,
        }
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.similarity_threshold = Some(threshold);
        self
    }

    pub fn with_filter(mut self, filter: MetadataFilter) -> Self {
        self.filter = Some(filter);
        self
    }
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Embeds and upserts the documents. A document whose id already exists
    /// replaces the stored one.
    async fn add(&self, documents: Vec<Document>) -> Result<(), VectorStoreError>;

    /// Nearest neighbours of the query, best first, restricted by the filter
    /// and the threshold.
    async fn similarity_search(
        &self,
        request: &SearchRequest,
    ) -> Result<Vec<ScoredDocument>, VectorStoreError>;

    /// Documents matching the filter, without any ranking.
    async fn find(
        &self,
        filter: &MetadataFilter,
        limit: usize,
    ) -> Result<Vec<Document>, VectorStoreError>;
}
