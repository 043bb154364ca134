use serde_json::json;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tokio::fs;

use crate::database::{
    Document, Metadata, MetadataFilter, SearchRequest, VectorStore, VectorStoreError,
};

pub const TYPE_DEFINITION: &str = "definition";

const SEMANTIC_SIMILARITY_THRESHOLD: f32 = 0.55;
const MAX_SEMANTIC_DEFINITIONS: usize = 3;

/// `Net_Pay.md` -> `net-pay`
pub fn topic_from_name(file_name: Option<&str>) -> String {
    let Some(name) = file_name else {
        return "general".to_string();
    };
    let base = match name.rfind('.') {
        Some(dot) if dot > 0 => &name[..dot],
        _ => name,
    };
    base.replace('_', "-").to_lowercase()
}

pub fn definition_document(file_name: &str, text: String) -> Document {
    let topic = topic_from_name(Some(file_name));
    let doc_id = format!("{}:{}", TYPE_DEFINITION, topic);

    let metadata: Metadata = [
        ("type", json!(TYPE_DEFINITION)),
        ("section", json!(TYPE_DEFINITION)),
        ("topic", json!(topic)),
        ("source", json!(file_name)),
        ("docId", json!(doc_id)),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect();

    Document::new(doc_id, text, metadata)
}

/// Reads every regular file in `dir` as a definition document, sorted by file name.
pub async fn load_definitions(dir: &Path) -> std::io::Result<Vec<Document>> {
    let mut entries = Vec::new();
    let mut read_dir = fs::read_dir(dir).await?;
    while let Some(entry) = read_dir.next_entry().await? {
        let is_file = entry
            .file_type()
            .await
            .map(|t| t.is_file())
            .unwrap_or(false);
        if is_file {
            entries.push(entry);
        }
    }
    entries.sort_by_key(|entry| entry.file_name());

    let mut documents = Vec::with_capacity(entries.len());
    for entry in entries {
        let file_name = entry.file_name().to_string_lossy().to_string();
        match fs::read_to_string(entry.path()).await {
            Ok(text) => documents.push(definition_document(&file_name, text)),
            Err(e) => log::warn!("Skipping definition file {}: {}", file_name, e),
        }
    }
    Ok(documents)
}

/// Loads the definitions directory into the store. Returns how many were written.
pub async fn preload_definitions(
    store: &dyn VectorStore,
    dir: &Path,
) -> Result<usize, VectorStoreError> {
    let documents = match load_definitions(dir).await {
        Ok(documents) => documents,
        Err(e) => {
            log::warn!("No definitions loaded from {}: {}", dir.display(), e);
            return Ok(0);
        }
    };

    if documents.is_empty() {
        log::info!("Definitions directory {} is empty", dir.display());
        return Ok(0);
    }

    let count = documents.len();
    store.add(documents).await?;
    log::info!("Preloaded {} definitions from {}", count, dir.display());
    Ok(count)
}

/// Finds definitions relevant to a question beyond the ones already retrieved.
#[derive(Clone)]
pub struct SemanticDefinitionMatcher {
    store: Arc<dyn VectorStore>,
}

impl SemanticDefinitionMatcher {
    pub fn new(store: Arc<dyn VectorStore>) -> Self {
        Self { store }
    }

    pub async fn find_required_definitions(
        &self,
        question: &str,
        already_retrieved: &[Document],
    ) -> Result<Vec<Document>, VectorStoreError> {
        log::debug!("Performing semantic definition search for question: {}", question);

        let request = SearchRequest::new(question, MAX_SEMANTIC_DEFINITIONS)
            .with_threshold(SEMANTIC_SIMILARITY_THRESHOLD)
            .with_filter(MetadataFilter::eq("type", TYPE_DEFINITION));
        let matches = self.store.similarity_search(&request).await?;

        let included: HashSet<String> = already_retrieved
            .iter()
            .map(|doc| doc.metadata_str("source"))
            .filter(|source| !source.is_empty())
            .collect();

        let total = matches.len();
        let additional: Vec<Document> = matches
            .into_iter()
            .map(|scored| scored.document)
            .filter(|doc| !included.contains(&doc.metadata_str("source")))
            .collect();

        log::debug!(
            "Found {} additional semantic definitions (total matches: {}, already included: {})",
            additional.len(),
            total,
            included.len()
        );
        Ok(additional)
    }
}
