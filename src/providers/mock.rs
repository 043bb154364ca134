//! Scripted provider for unit tests.

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::providers::traits::{CompletionProvider, EmbeddingProvider};

const DIMENSIONS: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub system: String,
    pub prompt: String,
    pub with_image: bool,
}

/// Replies are served in the order they were queued; once the queue is empty
/// every call gets `"mock answer"`.
///
/// Embeddings are a hashed bag of words, so texts that share words score
/// higher than texts that don't. `uniform()` makes every text embed to the
/// same vector, which lets a test exercise filtering without caring about
/// similarity thresholds.
#[derive(Clone, Default)]
pub struct MockProvider {
    replies: Arc<Mutex<VecDeque<String>>>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
    embedding_calls: Arc<AtomicUsize>,
    uniform: bool,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn uniform() -> Self {
        Self {
            uniform: true,
            ..Self::default()
        }
    }

    pub fn with_replies<I, S>(self, replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.replies.lock().extend(replies.into_iter().map(Into::into));
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    pub fn embedding_calls(&self) -> usize {
        self.embedding_calls.load(Ordering::SeqCst)
    }

    fn reply(&self, system: &str, prompt: &str, with_image: bool) -> String {
        self.calls.lock().push(RecordedCall {
            system: system.to_string(),
            prompt: prompt.to_string(),
            with_image,
        });
        self.replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| "mock answer".to_string())
    }

    fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0; DIMENSIONS];
        if self.uniform {
            vector[0] = 1.0;
            return vector;
        }
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let bucket = token
                .to_lowercase()
                .bytes()
                .fold(7usize, |acc, b| acc.wrapping_mul(31).wrapping_add(b as usize))
                % DIMENSIONS;
            vector[bucket] += 1.0;
        }
        vector
    }
}

#[async_trait]
impl CompletionProvider for MockProvider {
    async fn complete(&self, system_message: &str, prompt: &str) -> Result<String> {
        Ok(self.reply(system_message, prompt, false))
    }

    async fn complete_with_image(
        &self,
        system_message: &str,
        prompt: &str,
        _png: &[u8],
    ) -> Result<String> {
        Ok(self.reply(system_message, prompt, true))
    }

    async fn get_model_info(&self) -> Result<String> {
        Ok("mock".to_string())
    }
}

#[async_trait]
impl EmbeddingProvider for MockProvider {
    async fn generate_embedding(&self, text: &str) -> Result<Vec<f32>> {
        self.embedding_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.embed(text))
    }

    async fn generate_embeddings(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.embedding_calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| self.embed(t)).collect())
    }
}
