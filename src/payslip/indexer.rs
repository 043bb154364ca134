use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::sync::Arc;

use crate::database::{Document, Metadata, VectorStore, VectorStoreError};
use crate::models::{month_key, Benefit, ExtractedPayslip};

const MAX_ADDRESS_DISPLAY_LENGTH: usize = 80;

/// Splits an extracted payslip into one document per section and writes them
/// to the vector store.
#[derive(Clone)]
pub struct PayslipIndexer {
    store: Arc<dyn VectorStore>,
}

impl PayslipIndexer {
    pub fn new(store: Arc<dyn VectorStore>) -> Self {
        Self { store }
    }

    /// Returns the ids of the documents written, in section order.
    pub async fn index(
        &self,
        payslip: &ExtractedPayslip,
        source: &str,
        original_bytes: &[u8],
    ) -> Result<Vec<String>, VectorStoreError> {
        let documents = build_documents(payslip, source, original_bytes);
        let ids: Vec<String> = documents.iter().map(|d| d.id.clone()).collect();
        self.store.add(documents).await?;
        Ok(ids)
    }
}

/// Section documents for a payslip with their ids and metadata filled in.
pub fn build_documents(
    payslip: &ExtractedPayslip,
    source: &str,
    original_bytes: &[u8],
) -> Vec<Document> {
    let base = base_metadata(payslip, source, original_bytes);

    let sections = [
        ("personal", personal_text(payslip)),
        ("employer", employer_text(payslip)),
        ("employment", employment_text(payslip)),
        ("period", period_text(payslip)),
        ("financial", financial_text(payslip)),
        ("extras", extras_text(payslip)),
    ];

    let mut parts: Vec<(String, Metadata)> = sections
        .into_iter()
        .filter(|(_, text)| !text.trim().is_empty())
        .map(|(section, text)| {
            let mut metadata = base.clone();
            metadata.insert("section".to_string(), json!(section));
            (text, metadata)
        })
        .collect();

    for benefit in payslip.benefits() {
        let mut metadata = base.clone();
        metadata.extend(benefit_metadata(benefit));
        parts.push((benefit_text(benefit), metadata));
    }

    let base_id = compose_base_id(&base);
    parts
        .into_iter()
        .enumerate()
        .map(|(index, (text, mut metadata))| {
            let section = metadata
                .get("section")
                .and_then(Value::as_str)
                .unwrap_or("section")
                .to_string();
            let doc_id = format!("{}:{}:{}:{}", base_id, section, short_sha256(&text), index);
            metadata.insert("docId".to_string(), json!(doc_id));
            Document::new(doc_id, text, metadata)
        })
        .collect()
}

fn base_metadata(payslip: &ExtractedPayslip, source: &str, bytes: &[u8]) -> Metadata {
    let mut m = Metadata::new();
    let mut put = |key: &str, value: Value| {
        m.insert(key.to_string(), value);
    };

    if !source.is_empty() {
        put("source", json!(source));
    }
    if !bytes.is_empty() {
        put("file.size", json!(bytes.len()));
        put("file.sha256", json!(hex::encode(Sha256::digest(bytes))));
    }

    if let Some(p) = &payslip.personal {
        put("personal.name", json!(text(&p.name)));
        put("personal.nationalId", json!(text(&p.national_id)));
        put("personal.maritalStatus", json!(text(&p.marital_status)));
        put("personal.address", json!(text(&p.address)));
        put("personal.dependents", json!(p.dependents.unwrap_or(0)));
    }

    if let Some(e) = &payslip.employer {
        put("employer.name", json!(text(&e.name)));
        put("employer.number", json!(text(&e.employer_number)));
        put("employer.address", json!(text(&e.address)));
    }

    if let Some(e) = &payslip.employment {
        put("employment.employeeNumber", json!(text(&e.employee_number)));
        put("employment.jobTitle", json!(text(&e.job_title)));
        put("employment.status", json!(text(&e.status)));
        put("employment.payCategory", json!(text(&e.pay_category)));
        put("employment.baseSalary", number_or_zero(e.base_monthly_salary));
    }

    if let Some(p) = &payslip.period {
        put("period.start", json!(date_string(p.period_start)));
        put("period.end", json!(date_string(p.period_end)));
        put("period.payDate", json!(date_string(p.pay_date)));
        put("period.currency", json!(text(&p.currency)));
        put("period.monthKey", json!(month_key(p.period_start)));
    }

    if let Some(f) = &payslip.financial {
        put("financial.gross", number_or_zero(f.gross));
        put("financial.taxable", number_or_zero(f.taxable));
        put("financial.net", number_or_zero(f.net));
        put("financial.rsz", number_or_zero(f.social_security));
        put("financial.tax", number_or_zero(f.withholding_tax));
        put("financial.iban.last4", json!(last4(&text(&f.payment_iban))));
        put("financial.bic.last4", json!(last4(&text(&f.payment_bic))));
    }

    m
}

fn benefit_metadata(benefit: &Benefit) -> Metadata {
    [
        ("section", json!("benefit")),
        ("benefit.code", json!(text(&benefit.code))),
        ("benefit.label", json!(text(&benefit.label))),
        ("benefit.category", json!(text(&benefit.category))),
        ("benefit.direction", json!(text(&benefit.direction))),
        ("benefit.taxable", json!(benefit.taxable.unwrap_or(false))),
        ("benefit.amount", number_or_zero(benefit.amount)),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

fn personal_text(payslip: &ExtractedPayslip) -> String {
    let Some(p) = &payslip.personal else {
        return String::new();
    };
    format!(
        "PERSONAL\nEmployee: {}\nNational ID: {}\nMarital status: {}\nDependents: {}\nAddress: {}\n",
        text(&p.name),
        text(&p.national_id),
        text(&p.marital_status),
        p.dependents.map(|d| d.to_string()).unwrap_or_default(),
        short_address(&text(&p.address)),
    )
}

fn employer_text(payslip: &ExtractedPayslip) -> String {
    let Some(e) = &payslip.employer else {
        return String::new();
    };
    format!(
        "EMPLOYER\nName: {}\nNumber: {}\nAddress: {}\n",
        text(&e.name),
        text(&e.employer_number),
        text(&e.address),
    )
}

fn employment_text(payslip: &ExtractedPayslip) -> String {
    let Some(e) = &payslip.employment else {
        return String::new();
    };
    format!(
        "EMPLOYMENT\nEmployee number: {}\nJob title: {}\nStatus: {}\nPay category: {}\nBase monthly salary: {}\n",
        text(&e.employee_number),
        text(&e.job_title),
        text(&e.status),
        text(&e.pay_category),
        money(e.base_monthly_salary),
    )
}

fn period_text(payslip: &ExtractedPayslip) -> String {
    let Some(p) = &payslip.period else {
        return String::new();
    };
    format!(
        "PERIOD\nStart: {}\nEnd: {}\nPay date: {}\nCurrency: {}\n",
        date_string(p.period_start),
        date_string(p.period_end),
        date_string(p.pay_date),
        text(&p.currency),
    )
}

fn financial_text(payslip: &ExtractedPayslip) -> String {
    let Some(f) = &payslip.financial else {
        return String::new();
    };
    format!(
        "FINANCIAL\nGross: {}\nTaxable: {}\nSocial security (RSZ): {}\nWithholding tax: {}\nNet: {}\nPayment IBAN (last4): {}\nPayment BIC (last4): {}\n",
        money(f.gross),
        money(f.taxable),
        money(f.social_security),
        money(f.withholding_tax),
        money(f.net),
        last4(&text(&f.payment_iban)),
        last4(&text(&f.payment_bic)),
    )
}

fn extras_text(payslip: &ExtractedPayslip) -> String {
    let Some(x) = &payslip.extras else {
        return String::new();
    };
    format!(
        "EXTRAS\nMeal voucher (employer): {}\nMeal voucher (employee): {}\nMeal voucher count: {}\n",
        money(x.meal_voucher_contribution_employer),
        money(x.meal_voucher_contribution_employee),
        x.meal_voucher_count.map(|c| c.to_string()).unwrap_or_default(),
    )
}

fn benefit_text(benefit: &Benefit) -> String {
    format!(
        "BENEFIT\nCode: {}\nLabel: {}\nCategory: {}\nAmount: {}\nDirection: {}\nTaxable: {}\n",
        text(&benefit.code),
        text(&benefit.label),
        text(&benefit.category),
        money(benefit.amount),
        text(&benefit.direction),
        benefit.taxable.unwrap_or(false),
    )
}

fn compose_base_id(metadata: &Metadata) -> String {
    let non_blank = |key: &str| {
        metadata
            .get(key)
            .and_then(Value::as_str)
            .filter(|v| !v.trim().is_empty())
            .map(str::to_string)
    };

    let primary = non_blank("personal.nationalId")
        .or_else(|| non_blank("employment.employeeNumber"))
        .or_else(|| non_blank("source"))
        .unwrap_or_else(|| "anon".to_string());
    let month = non_blank("period.monthKey").unwrap_or_else(|| "unknown".to_string());
    let short_hash: String = non_blank("file.sha256")
        .map(|h| h.chars().take(8).collect())
        .unwrap_or_default();

    format!("payslip:{}:{}:{}", primary, month, short_hash)
}

fn text(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

fn date_string(date: Option<NaiveDate>) -> String {
    date.map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

/// Plain decimal with trailing zeros stripped, `0` when absent.
pub fn money(value: Option<Decimal>) -> String {
    value
        .map(|v| v.normalize().to_string())
        .unwrap_or_else(|| "0".to_string())
}

fn number_or_zero(value: Option<Decimal>) -> Value {
    json!(value.and_then(|v| v.to_f64()).unwrap_or(0.0))
}

fn last4(value: &str) -> String {
    let compact: Vec<char> = value.chars().filter(|c| !c.is_whitespace()).collect();
    compact[compact.len().saturating_sub(4)..].iter().collect()
}

fn short_address(address: &str) -> String {
    if address.chars().count() > MAX_ADDRESS_DISPLAY_LENGTH {
        let cut: String = address.chars().take(MAX_ADDRESS_DISPLAY_LENGTH).collect();
        format!("{}…", cut)
    } else {
        address.to_string()
    }
}

fn short_sha256(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))[..8].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{InMemoryStore, MetadataFilter};
    use crate::models::{PeriodInfo, PersonalInfo};
    use crate::payslip::fixtures::sample_payslip;
    use crate::providers::mock::MockProvider;
    use std::str::FromStr;

    fn dec(s: &str) -> Option<Decimal> {
        Some(Decimal::from_str(s).unwrap())
    }

    #[test]
    fn test_sections_in_order_with_ids() {
        let bytes = b"fake pdf bytes";
        let docs = build_documents(&sample_payslip(), "march.pdf", bytes);

        let sections: Vec<String> = docs.iter().map(|d| d.metadata_str("section")).collect();
        assert_eq!(
            sections,
            ["personal", "employment", "period", "financial", "extras", "benefit"]
        );

        let file_hash = hex::encode(Sha256::digest(bytes));
        let base = format!("payslip:85.07.30-033.61:2024-03:{}", &file_hash[..8]);
        for (index, doc) in docs.iter().enumerate() {
            assert_eq!(doc.metadata_str("docId"), doc.id);
            assert!(doc.id.starts_with(&base));
            assert!(doc.id.ends_with(&format!(":{}", index)));
        }
        assert_eq!(docs[0].metadata_str("file.sha256"), file_hash);
        assert_eq!(docs[0].metadata_str("file.size"), bytes.len().to_string());
    }

    #[test]
    fn test_section_texts() {
        let docs = build_documents(&sample_payslip(), "march.pdf", b"x");

        assert!(docs[0].text.starts_with("PERSONAL\nEmployee: Jan Peeters\n"));
        assert!(docs[0].text.contains("Dependents: 2\n"));
        assert!(docs[1].text.contains("Base monthly salary: 3250.5\n"));
        assert!(docs[3].text.contains("Gross: 3600\n"));
        assert!(docs[3].text.contains("Taxable: 0\n"));
        assert!(docs[3].text.contains("Payment IBAN (last4): 7034\n"));
        assert!(docs[4].text.contains("Meal voucher count: 21\n"));
        assert!(docs[5].text.contains("Taxable: true\n"));
    }

    #[test]
    fn test_base_metadata() {
        let docs = build_documents(&sample_payslip(), "march.pdf", b"x");
        let meta = &docs[0].metadata;

        assert_eq!(meta["personal.nationalId"], json!("85.07.30-033.61"));
        assert_eq!(meta["personal.maritalStatus"], json!(""));
        assert_eq!(meta["period.monthKey"], json!("2024-03"));
        assert_eq!(meta["financial.iban.last4"], json!("7034"));
        assert_eq!(meta["financial.tax"], json!(0.0));
        assert!(!meta.contains_key("employer.name"));

        let benefit = &docs[5].metadata;
        assert_eq!(benefit["benefit.code"], json!("CAR"));
        assert_eq!(benefit["benefit.taxable"], json!(true));
        assert_eq!(benefit["benefit.amount"], json!(120.0));
    }

    #[test]
    fn test_base_id_fallbacks() {
        let anonymous = build_documents(
            &ExtractedPayslip {
                period: Some(PeriodInfo::default()),
                ..Default::default()
            },
            "",
            b"",
        );
        assert_eq!(anonymous.len(), 1);
        assert!(anonymous[0].id.starts_with("payslip:anon:unknown::period:"));

        let by_source = build_documents(
            &ExtractedPayslip {
                personal: Some(PersonalInfo::default()),
                ..Default::default()
            },
            "scan.png",
            b"",
        );
        assert!(by_source[0].id.starts_with("payslip:scan.png:unknown::personal:"));
    }

    #[test]
    fn test_formatting_helpers() {
        assert_eq!(money(dec("1500.000")), "1500");
        assert_eq!(money(dec("0.50")), "0.5");
        assert_eq!(money(None), "0");
        assert_eq!(last4("BE68 5390"), "5390");
        assert_eq!(last4("AB"), "AB");

        let long = "a".repeat(90);
        let short = short_address(&long);
        assert_eq!(short.chars().count(), 81);
        assert!(short.ends_with('…'));
    }

    #[tokio::test]
    async fn test_reindexing_is_idempotent() {
        let store = Arc::new(InMemoryStore::new(Arc::new(MockProvider::new())));
        let indexer = PayslipIndexer::new(store.clone());

        let first = indexer.index(&sample_payslip(), "march.pdf", b"x").await.unwrap();
        let second = indexer.index(&sample_payslip(), "march.pdf", b"x").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(store.len().await, first.len());

        let found = store
            .find(&MetadataFilter::eq("docId", first[3].clone()), 5)
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert!(found[0].text.starts_with("FINANCIAL"));
    }
}
