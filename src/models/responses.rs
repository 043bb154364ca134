use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AskResponse {
    pub answer: String,
    pub sources: Vec<Citation>,
}

/// A retrieved document the answer was grounded on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Citation {
    pub doc_id: String,
    pub section: String,
    pub source: String,
    pub period_month_key: String,
    pub employer_number: String,
    pub employee_number: String,
    pub national_id: String,
    pub text_preview: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionView {
    pub doc_id: String,
    pub section: String,
    pub content: String,
    pub source: String,
    pub metadata: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimilarPayslip {
    pub payslip_id: String,
    pub national_id: String,
    pub name: String,
    pub month_key: String,
    pub pay_date: String,
    pub source: String,
    pub document_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonResult {
    pub employee_number: String,
    pub national_id: String,
    pub employer_number: String,
    pub previous_month_key: String,
    pub current_month_key: String,
    pub field_changes: Vec<FieldChange>,
    pub benefit_changes: Vec<BenefitChange>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldChange {
    pub field_name: String,
    pub description: String,
    pub previous_value: Decimal,
    pub current_value: Decimal,
    pub delta: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BenefitChange {
    pub code: Option<String>,
    pub label: Option<String>,
    pub category: Option<String>,
    pub change_type: String,
    pub previous_amount: Option<Decimal>,
    pub current_amount: Option<Decimal>,
    pub previous_direction: Option<String>,
    pub current_direction: Option<String>,
    pub previous_taxable: Option<bool>,
    pub current_taxable: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompareAnswer {
    pub answer: String,
    pub comparison: ComparisonResult,
}
