use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Structured payslip data as returned by the extraction model.
///
/// Every section is optional: scanned payslips rarely contain all of them and
/// the model is told to leave out what it cannot read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedPayslip {
    #[serde(default)]
    pub personal: Option<PersonalInfo>,
    #[serde(default)]
    pub employer: Option<EmployerInfo>,
    #[serde(default)]
    pub employment: Option<EmploymentInfo>,
    #[serde(default)]
    pub period: Option<PeriodInfo>,
    #[serde(default)]
    pub financial: Option<FinancialInfo>,
    #[serde(default)]
    pub extras: Option<Extras>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalInfo {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub national_id: Option<String>,
    #[serde(default)]
    pub marital_status: Option<String>,
    #[serde(default)]
    pub dependents: Option<u32>,
    #[serde(default)]
    pub address: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployerInfo {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub employer_number: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmploymentInfo {
    #[serde(default)]
    pub employee_number: Option<String>,
    #[serde(default)]
    pub job_title: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub pay_category: Option<String>,
    #[serde(default)]
    pub base_monthly_salary: Option<Decimal>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodInfo {
    #[serde(default)]
    pub period_start: Option<NaiveDate>,
    #[serde(default)]
    pub period_end: Option<NaiveDate>,
    #[serde(default)]
    pub pay_date: Option<NaiveDate>,
    #[serde(default)]
    pub currency: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialInfo {
    #[serde(default)]
    pub gross: Option<Decimal>,
    #[serde(default)]
    pub taxable: Option<Decimal>,
    #[serde(default)]
    pub social_security: Option<Decimal>,
    #[serde(default)]
    pub withholding_tax: Option<Decimal>,
    #[serde(default)]
    pub net: Option<Decimal>,
    #[serde(default)]
    pub payment_iban: Option<String>,
    #[serde(default)]
    pub payment_bic: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Extras {
    #[serde(default)]
    pub meal_voucher_contribution_employer: Option<Decimal>,
    #[serde(default)]
    pub meal_voucher_contribution_employee: Option<Decimal>,
    #[serde(default)]
    pub meal_voucher_count: Option<i32>,
    #[serde(default)]
    pub benefits: Vec<Benefit>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Benefit {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub direction: Option<String>,
    #[serde(default)]
    pub taxable: Option<bool>,
}

/// `YYYY-MM` for a date, empty when there is none.
pub fn month_key(date: Option<NaiveDate>) -> String {
    date.map(|d| format!("{}-{:02}", d.year(), d.month()))
        .unwrap_or_default()
}

impl ExtractedPayslip {
    pub fn month_key(&self) -> String {
        month_key(self.period.as_ref().and_then(|p| p.period_start))
    }

    pub fn national_id(&self) -> String {
        self.personal
            .as_ref()
            .and_then(|p| p.national_id.clone())
            .unwrap_or_default()
    }

    pub fn employee_number(&self) -> String {
        self.employment
            .as_ref()
            .and_then(|e| e.employee_number.clone())
            .unwrap_or_default()
    }

    pub fn employer_number(&self) -> String {
        self.employer
            .as_ref()
            .and_then(|e| e.employer_number.clone())
            .unwrap_or_default()
    }

    pub fn benefits(&self) -> &[Benefit] {
        self.extras
            .as_ref()
            .map(|e| e.benefits.as_slice())
            .unwrap_or(&[])
    }
}

/// The keys a payslip is looked up by in the vector store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayslipIdentifiers {
    pub national_id: String,
    pub employee_number: String,
    pub month_key: String,
}

impl From<&ExtractedPayslip> for PayslipIdentifiers {
    fn from(payslip: &ExtractedPayslip) -> Self {
        Self {
            national_id: payslip.national_id(),
            employee_number: payslip.employee_number(),
            month_key: payslip.month_key(),
        }
    }
}
