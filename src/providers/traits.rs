use anyhow::Result;
use async_trait::async_trait;

/// A chat model that can answer a prompt, optionally with an attached image.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, system_message: &str, prompt: &str) -> Result<String>;

    /// Same as [`complete`](Self::complete) but attaches a PNG image to the
    /// user message.
    async fn complete_with_image(
        &self,
        system_message: &str,
        prompt: &str,
        png: &[u8],
    ) -> Result<String>;

    async fn get_model_info(&self) -> Result<String>;
}

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn generate_embedding(&self, text: &str) -> Result<Vec<f32>>;

    /// Embeddings in the same order as `texts`.
    async fn generate_embeddings(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.generate_embedding(text).await?);
        }
        Ok(embeddings)
    }
}
