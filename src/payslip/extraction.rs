use std::sync::Arc;
use tokio::task::JoinError;

use super::indexer::PayslipIndexer;
use crate::document::{prepare, DocumentError, PayslipInput, UploadedFile};
use crate::error::Result;
use crate::models::ExtractedPayslip;
use crate::prompts::PromptConfig;
use crate::providers::{parse_json_reply, CompletionProvider};

/// Reads payslip data out of an uploaded PDF or image with the chat model.
#[derive(Clone)]
pub struct PayslipExtractor {
    llm: Arc<dyn CompletionProvider>,
    indexer: PayslipIndexer,
    prompts: Arc<PromptConfig>,
}

impl PayslipExtractor {
    pub fn new(
        llm: Arc<dyn CompletionProvider>,
        indexer: PayslipIndexer,
        prompts: Arc<PromptConfig>,
    ) -> Self {
        Self {
            llm,
            indexer,
            prompts,
        }
    }

    pub async fn extract(&self, upload: &UploadedFile) -> Result<ExtractedPayslip> {
        let input = {
            let upload = upload.clone();
            tokio::task::spawn_blocking(move || prepare(&upload))
                .await
                .map_err(processing_aborted)??
        };

        let reply = match input {
            PayslipInput::Image(png) => {
                log::debug!("Extracting payslip '{}' from image", upload.file_name);
                self.llm
                    .complete_with_image(
                        &self.prompts.system_extraction,
                        &self.prompts.user_extraction,
                        &png,
                    )
                    .await?
            }
            PayslipInput::Text(text) => {
                log::debug!(
                    "Extracting payslip '{}' from {} characters of PDF text",
                    upload.file_name,
                    text.chars().count()
                );
                let prompt = format!(
                    "{}\n\nPayslip text:\n{}",
                    self.prompts.user_extraction, text
                );
                self.llm
                    .complete(&self.prompts.system_extraction, &prompt)
                    .await?
            }
        };

        Ok(parse_json_reply::<ExtractedPayslip>(&reply)?)
    }

    /// Extracts and indexes. Indexing failures are logged and do not fail
    /// the extraction.
    pub async fn extract_and_index(&self, upload: &UploadedFile) -> Result<ExtractedPayslip> {
        let payslip = self.extract(upload).await?;

        match self
            .indexer
            .index(&payslip, &upload.file_name, &upload.bytes)
            .await
        {
            Ok(ids) => log::info!(
                "Successfully indexed payslip from file '{}'. Created {} document entries with IDs: {:?}",
                upload.file_name,
                ids.len(),
                ids
            ),
            Err(e) => log::error!(
                "Failed to index payslip from file '{}': {}",
                upload.file_name,
                e
            ),
        }

        Ok(payslip)
    }
}

fn processing_aborted(err: JoinError) -> DocumentError {
    DocumentError::Pdf(format!("document processing aborted: {}", err))
}
