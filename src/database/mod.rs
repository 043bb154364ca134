pub mod memory;
pub mod qdrant_config;
pub mod store;
pub mod vector_db;

pub use memory::InMemoryStore;
pub use store::{
    metadata_string, Document, Metadata, MetadataFilter, ScoredDocument, SearchRequest, VectorStore,
    VectorStoreError,
};
pub use vector_db::QdrantStore;
