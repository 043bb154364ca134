use anyhow::Result;
use async_trait::async_trait;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;

use crate::providers::traits::EmbeddingProvider;

const DEFAULT_CAPACITY: usize = 256;

/// Memoizes embeddings by input text.
///
/// Retrieval embeds the same short queries over and over (the similarity
/// query, definition lookups for a recurring question), so a small LRU in
/// front of the remote model saves a round trip for most of them.
pub struct CachedEmbeddings<E> {
    inner: E,
    cache: Arc<Mutex<LruCache<String, Vec<f32>>>>,
}

impl<E: EmbeddingProvider> CachedEmbeddings<E> {
    pub fn new(inner: E) -> Self {
        Self::with_capacity(inner, DEFAULT_CAPACITY)
    }

    pub fn with_capacity(inner: E, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner,
            cache: Arc::new(Mutex::new(LruCache::new(capacity))),
        }
    }

    pub fn inner(&self) -> &E {
        &self.inner
    }

    fn cached(&self, text: &str) -> Option<Vec<f32>> {
        self.cache.lock().get(text).cloned()
    }

    fn remember(&self, text: &str, embedding: &[f32]) {
        self.cache.lock().put(text.to_string(), embedding.to_vec());
    }
}

#[async_trait]
impl<E: EmbeddingProvider> EmbeddingProvider for CachedEmbeddings<E> {
    async fn generate_embedding(&self, text: &str) -> Result<Vec<f32>> {
        if let Some(hit) = self.cached(text) {
            return Ok(hit);
        }
        let embedding = self.inner.generate_embedding(text).await?;
        self.remember(text, &embedding);
        Ok(embedding)
    }

    async fn generate_embeddings(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut results: Vec<Option<Vec<f32>>> = texts.iter().map(|t| self.cached(t)).collect();

        let missing: Vec<String> = texts
            .iter()
            .zip(&results)
            .filter(|(_, hit)| hit.is_none())
            .map(|(text, _)| text.clone())
            .collect();

        if !missing.is_empty() {
            let mut fresh = self.inner.generate_embeddings(&missing).await?.into_iter();
            for (text, slot) in texts.iter().zip(results.iter_mut()) {
                if slot.is_none() {
                    if let Some(embedding) = fresh.next() {
                        self.remember(text, &embedding);
                        *slot = Some(embedding);
                    }
                }
            }
        }

        results
            .into_iter()
            .map(|e| e.ok_or_else(|| anyhow::anyhow!("Embedding provider returned too few vectors")))
            .collect()
    }
}
