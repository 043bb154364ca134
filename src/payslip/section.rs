use std::sync::Arc;

use crate::database::{MetadataFilter, VectorStore, VectorStoreError};
use crate::models::SectionView;

const MAX_MATCHES: usize = 5;

#[derive(Clone)]
pub struct SectionService {
    store: Arc<dyn VectorStore>,
}

impl SectionService {
    pub fn new(store: Arc<dyn VectorStore>) -> Self {
        Self { store }
    }

    pub async fn get_by_doc_id(&self, doc_id: &str) -> Result<Option<SectionView>, VectorStoreError> {
        log::info!("Retrieving payslip section with docId: {}", doc_id);

        let documents = self
            .store
            .find(&MetadataFilter::eq("docId", doc_id), MAX_MATCHES)
            .await?;

        let Some(document) = documents.first() else {
            log::warn!("No document found with docId: {}", doc_id);
            return Ok(None);
        };
        if documents.len() > 1 {
            log::warn!(
                "Multiple documents found with docId: {}. Returning the first one.",
                doc_id
            );
        }

        Ok(Some(SectionView {
            doc_id: document.metadata_str("docId"),
            section: document.metadata_str("section"),
            content: document.text.clone(),
            source: document.metadata_str("source"),
            metadata: document.metadata.clone(),
        }))
    }
}
