use async_trait::async_trait;
use std::cmp::Ordering;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::store::{
    Document, MetadataFilter, ScoredDocument, SearchRequest, VectorStore, VectorStoreError,
};
use crate::providers::traits::EmbeddingProvider;

struct Entry {
    document: Document,
    embedding: Vec<f32>,
}

/// Brute-force cosine search over documents held in memory.
///
/// Useful for local runs without Qdrant and as the backend in tests.
/// Insertion order is preserved, which keeps `find` deterministic.
pub struct InMemoryStore {
    embeddings: Arc<dyn EmbeddingProvider>,
    entries: RwLock<Vec<Entry>>,
}

impl InMemoryStore {
    pub fn new(embeddings: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            embeddings,
            entries: RwLock::new(Vec::new()),
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    let denom = norm_a * norm_b;

    if denom <= f32::EPSILON {
        0.0
    } else {
        dot / denom
    }
}

#[async_trait]
impl VectorStore for InMemoryStore {
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

        let mut entries = self.entries.write().await;
        for (document, embedding) in documents.into_iter().zip(vectors) {
            match entries.iter_mut().find(|e| e.document.id == document.id) {
                Some(existing) => {
                    existing.document = document;
                    existing.embedding = embedding;
                }
                None => entries.push(Entry {
                    document,
                    embedding,
                }),
            }
        }
        Ok(())
    }

    async fn similarity_search(
        &self,
        request: &SearchRequest,
    ) -> Result<Vec<ScoredDocument>, VectorStoreError> {
        let query = self
            .embeddings
            .generate_embedding(&request.query)
            .await
            .map_err(|e| VectorStoreError::Embedding(e.to_string()))?;

        let entries = self.entries.read().await;
        let mut results: Vec<ScoredDocument> = entries
            .iter()
            .filter(|e| {
                request
                    .filter
                    .as_ref()
                    .map_or(true, |f| f.matches(&e.document.metadata))
            })
            .map(|e| ScoredDocument {
                document: e.document.clone(),
                score: cosine_similarity(&query, &e.embedding),
            })
            .filter(|scored| {
                request
                    .similarity_threshold
                    .map_or(true, |threshold| scored.score >= threshold)
            })
            .collect();

        // stable sort keeps insertion order between equal scores
        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        results.truncate(request.top_k);
        Ok(results)
    }

    async fn find(
        &self,
        filter: &MetadataFilter,
        limit: usize,
    ) -> Result<Vec<Document>, VectorStoreError> {
        let entries = self.entries.read().await;
        Ok(entries
            .iter()
            .filter(|e| filter.matches(&e.document.metadata))
            .take(limit)
            .map(|e| e.document.clone())
            .collect())
    }
}
