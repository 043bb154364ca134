use std::sync::Arc;

use crate::database::{Document, MetadataFilter, SearchRequest, VectorStore};
use crate::error::{PayslipError, Result};
use crate::models::SimilarPayslip;

const NATIONAL_ID: &str = "personal.nationalId";
const NAME: &str = "personal.name";
const SEARCH_QUERY: &str = "payslip information";
const RESULT_MULTIPLIER: usize = 10;
const MAX_LIMIT: usize = 100;

/// Groups indexed section documents back into payslips for an employee.
#[derive(Clone)]
pub struct SimilarityService {
    store: Arc<dyn VectorStore>,
}

impl SimilarityService {
    pub fn new(store: Arc<dyn VectorStore>) -> Self {
        Self { store }
    }

    pub async fn search(
        &self,
        national_id: Option<&str>,
        employee_name: Option<&str>,
        limit: usize,
    ) -> Result<Vec<SimilarPayslip>> {
        let national_id = national_id.map(str::trim).filter(|s| !s.is_empty());
        let employee_name = employee_name.map(str::trim).filter(|s| !s.is_empty());

        let filter = match (national_id, employee_name) {
            (Some(id), Some(name)) => MetadataFilter::or([
                MetadataFilter::eq(NATIONAL_ID, id),
                MetadataFilter::eq(NAME, name),
            ]),
            (Some(id), None) => MetadataFilter::eq(NATIONAL_ID, id),
            (None, Some(name)) => MetadataFilter::eq(NAME, name),
            (None, None) => {
                return Err(PayslipError::InvalidInput(
                    "At least one of nationalId or employeeName must be provided".to_string(),
                ))
            }
        };
        if !(1..=MAX_LIMIT).contains(&limit) {
            return Err(PayslipError::InvalidInput(format!(
                "limit must be between 1 and {}",
                MAX_LIMIT
            )));
        }

        log::info!(
            "Searching payslips: nationalId='{}', employeeName='{}', limit={}",
            national_id.unwrap_or_default(),
            employee_name.unwrap_or_default(),
            limit
        );

        let request =
            SearchRequest::new(SEARCH_QUERY, limit.saturating_mul(RESULT_MULTIPLIER))
                .with_filter(filter);
        let documents: Vec<Document> = self
            .store
            .similarity_search(&request)
            .await?
            .into_iter()
            .map(|scored| scored.document)
            .collect();

        log::info!("Found {} documents", documents.len());
        Ok(group_by_payslip(&documents, limit))
    }
}

/// `payslip:<id>:<month>:<hash>` prefix of a section docId.
pub fn payslip_id(doc_id: Option<&str>) -> String {
    let Some(doc_id) = doc_id else {
        return "unknown".to_string();
    };
    let parts: Vec<&str> = doc_id.splitn(5, ':').collect();
    if parts.len() >= 4 {
        parts[..4].join(":")
    } else {
        doc_id.to_string()
    }
}

fn group_by_payslip(documents: &[Document], limit: usize) -> Vec<SimilarPayslip> {
    let mut groups: Vec<SimilarPayslip> = Vec::new();

    for doc in documents {
        let doc_id = doc.metadata.get("docId").and_then(|v| v.as_str());
        let id = payslip_id(doc_id);

        let index = match groups.iter().position(|g| g.payslip_id == id) {
            Some(index) => index,
            None => {
                groups.push(SimilarPayslip {
                    payslip_id: id,
                    national_id: doc.metadata_str(NATIONAL_ID),
                    name: doc.metadata_str(NAME),
                    month_key: doc.metadata_str("period.monthKey"),
                    pay_date: doc.metadata_str("period.payDate"),
                    source: doc.metadata_str("source"),
                    document_ids: Vec::new(),
                });
                groups.len() - 1
            }
        };
        groups[index]
            .document_ids
            .push(doc_id.unwrap_or(doc.id.as_str()).to_string());
    }

    groups.truncate(limit);
    groups
}
