use std::collections::HashSet;
use std::sync::Arc;
use validator::Validate;

use super::definitions::{SemanticDefinitionMatcher, TYPE_DEFINITION};
use super::extraction::PayslipExtractor;
use crate::database::{metadata_string, Document, MetadataFilter, SearchRequest, VectorStore};
use crate::document::UploadedFile;
use crate::error::{PayslipError, Result};
use crate::models::{AskResponse, Citation, PayslipIdentifiers};
use crate::prompts::{render, PromptConfig};
use crate::providers::CompletionProvider;

const PAYSLIP_SIMILARITY_THRESHOLD: f32 = 0.55;
const PAYSLIP_TOP_K: usize = 6;
const DEFINITION_SIMILARITY_THRESHOLD: f32 = 0.50;
const DEFINITION_TOP_K: usize = 4;
const DOCUMENT_SEPARATOR: &str = "\n---\n";
const UNKNOWN_DOC_ID: &str = "unknown";
const TEXT_PREVIEW_LENGTH: usize = 120;
const MAX_QUESTION_LENGTH: usize = 2000;

pub const NO_CONTEXT_ANSWER: &str = "I could not find any information in this payslip or in the payroll definitions that answers your question.";

#[derive(Debug, Validate)]
struct Question {
    #[validate(length(min = 1, max = 2000))]
    text: String,
}

/// Answers a question about an uploaded payslip from the indexed sections of
/// that payslip and the payroll definitions.
#[derive(Clone)]
pub struct AskService {
    llm: Arc<dyn CompletionProvider>,
    store: Arc<dyn VectorStore>,
    extractor: PayslipExtractor,
    matcher: SemanticDefinitionMatcher,
    prompts: Arc<PromptConfig>,
}

impl AskService {
    pub fn new(
        llm: Arc<dyn CompletionProvider>,
        store: Arc<dyn VectorStore>,
        extractor: PayslipExtractor,
        prompts: Arc<PromptConfig>,
    ) -> Self {
        Self {
            llm,
            matcher: SemanticDefinitionMatcher::new(store.clone()),
            store,
            extractor,
            prompts,
        }
    }

    pub async fn ask(&self, upload: &UploadedFile, question: &str) -> Result<AskResponse> {
        let question = question.trim();
        Question {
            text: question.to_string(),
        }
        .validate()
        .map_err(|_| {
            PayslipError::InvalidInput(format!(
                "Question must be between 1 and {} characters",
                MAX_QUESTION_LENGTH
            ))
        })?;

        log::info!("Processing payslip question: {}", question);

        let payslip = self.extractor.extract_and_index(upload).await?;
        let identifiers = PayslipIdentifiers::from(&payslip);

        let documents = self.retrieve(question, &identifiers).await?;
        log::info!(
            "Retrieved {} context documents for month {}",
            documents.len(),
            identifiers.month_key
        );

        let answer = self.generate_answer(question, &documents).await?;
        Ok(AskResponse {
            answer,
            sources: citations(&documents),
        })
    }

    async fn retrieve(
        &self,
        question: &str,
        identifiers: &PayslipIdentifiers,
    ) -> Result<Vec<Document>> {
        let payslip_request = SearchRequest::new(question, PAYSLIP_TOP_K)
            .with_threshold(PAYSLIP_SIMILARITY_THRESHOLD)
            .with_filter(payslip_filter(identifiers));
        let payslip_docs = self.search(&payslip_request).await?;

        let definition_request = SearchRequest::new(question, DEFINITION_TOP_K)
            .with_threshold(DEFINITION_SIMILARITY_THRESHOLD)
            .with_filter(MetadataFilter::eq("type", TYPE_DEFINITION));
        let definition_docs = self.search(&definition_request).await?;

        let semantic_docs = self
            .matcher
            .find_required_definitions(question, &definition_docs)
            .await?;

        Ok(merge_documents(payslip_docs, definition_docs, semantic_docs))
    }

    async fn search(&self, request: &SearchRequest) -> Result<Vec<Document>> {
        Ok(self
            .store
            .similarity_search(request)
            .await?
            .into_iter()
            .map(|scored| scored.document)
            .collect())
    }

    async fn generate_answer(&self, question: &str, documents: &[Document]) -> Result<String> {
        if documents.is_empty() {
            log::info!("No context found, answering without the model");
            return Ok(NO_CONTEXT_ANSWER.to_string());
        }

        let context = context_block(documents);
        let citations = citations_line(documents);
        let prompt = render(
            &self.prompts.user_ask,
            &[
                ("context", &context),
                ("citations", &citations),
                ("question", question),
            ],
        );

        Ok(self.llm.complete(&self.prompts.system_ask, &prompt).await?)
    }
}

fn payslip_filter(identifiers: &PayslipIdentifiers) -> MetadataFilter {
    MetadataFilter::and([
        MetadataFilter::or([
            MetadataFilter::eq("personal.nationalId", identifiers.national_id.as_str()),
            MetadataFilter::eq(
                "employment.employeeNumber",
                identifiers.employee_number.as_str(),
            ),
        ]),
        MetadataFilter::eq("period.monthKey", identifiers.month_key.as_str()),
    ])
}

fn doc_id(document: &Document) -> String {
    metadata_string(&document.metadata, "docId").unwrap_or_else(|| UNKNOWN_DOC_ID.to_string())
}

/// Payslip sections first, then definitions, deduplicated by docId. When the
/// payslip itself has nothing relevant only the semantic definitions are used.
pub fn merge_documents(
    payslip_docs: Vec<Document>,
    definition_docs: Vec<Document>,
    semantic_docs: Vec<Document>,
) -> Vec<Document> {
    let combined: Vec<Document> = if payslip_docs.is_empty() && !semantic_docs.is_empty() {
        semantic_docs
    } else {
        payslip_docs
            .into_iter()
            .chain(definition_docs)
            .chain(semantic_docs)
            .collect()
    };

    let mut seen = HashSet::new();
    combined
        .into_iter()
        .filter(|doc| seen.insert(doc_id(doc)))
        .collect()
}

fn context_block(documents: &[Document]) -> String {
    documents
        .iter()
        .map(|doc| doc.text.trim())
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join(DOCUMENT_SEPARATOR)
}

fn citations_line(documents: &[Document]) -> String {
    let mut seen = HashSet::new();
    documents
        .iter()
        .map(doc_id)
        .filter(|id| !id.is_empty() && seen.insert(id.clone()))
        .collect::<Vec<_>>()
        .join(", ")
}

fn citations(documents: &[Document]) -> Vec<Citation> {
    let mut seen = HashSet::new();
    documents
        .iter()
        .map(|doc| {
            let doc_id = doc_id(doc);
            Citation {
                url: format!("/api/payslip/section/{}", doc_id),
                section: doc.metadata_str("section"),
                source: doc.metadata_str("source"),
                period_month_key: doc.metadata_str("period.monthKey"),
                employer_number: doc.metadata_str("employer.number"),
                employee_number: doc.metadata_str("employment.employeeNumber"),
                national_id: doc.metadata_str("personal.nationalId"),
                text_preview: doc.text.chars().take(TEXT_PREVIEW_LENGTH).collect(),
                doc_id,
            }
        })
        .filter(|citation| seen.insert(citation.clone()))
        .collect()
}
