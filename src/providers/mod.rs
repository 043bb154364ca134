pub mod cache;
pub mod openai;
pub mod traits;
pub mod utils;

#[cfg(test)]
pub mod mock;

pub use cache::CachedEmbeddings;
pub use openai::OpenAIProvider;
pub use traits::{CompletionProvider, EmbeddingProvider};
pub use utils::parse_json_reply;
