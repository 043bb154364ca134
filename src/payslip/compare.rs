use serde_json::{json, Value};
use std::sync::Arc;

use super::comparator::compare_payslips;
use super::extraction::PayslipExtractor;
use super::indexer::money;
use crate::document::UploadedFile;
use crate::error::Result;
use crate::models::{month_key, CompareAnswer, ExtractedPayslip};
use crate::prompts::{render, PromptConfig};
use crate::providers::CompletionProvider;

/// Explains what changed between two payslips. The numbers come from
/// [`compare_payslips`]; the model only turns them into prose.
#[derive(Clone)]
pub struct CompareService {
    llm: Arc<dyn CompletionProvider>,
    extractor: PayslipExtractor,
    prompts: Arc<PromptConfig>,
}

impl CompareService {
    pub fn new(
        llm: Arc<dyn CompletionProvider>,
        extractor: PayslipExtractor,
        prompts: Arc<PromptConfig>,
    ) -> Self {
        Self {
            llm,
            extractor,
            prompts,
        }
    }

    pub async fn compare_and_explain(
        &self,
        previous: &UploadedFile,
        current: &UploadedFile,
        question: &str,
    ) -> Result<CompareAnswer> {
        let previous_payslip = self.extractor.extract_and_index(previous).await?;
        let current_payslip = self.extractor.extract_and_index(current).await?;

        let comparison = compare_payslips(&previous_payslip, &current_payslip);
        log::info!(
            "Comparing payslips {} -> {}: {} field changes, {} benefit changes",
            comparison.previous_month_key,
            comparison.current_month_key,
            comparison.field_changes.len(),
            comparison.benefit_changes.len()
        );

        let previous_view = json_view(&previous_payslip).to_string();
        let current_view = json_view(&current_payslip).to_string();
        let comparison_json = serde_json::to_string(&comparison)
            .map_err(|e| anyhow::anyhow!("Failed to serialise comparison: {}", e))?;

        let prompt = render(
            &self.prompts.user_compare,
            &[
                ("question", question),
                ("previousMonthKey", &comparison.previous_month_key),
                ("currentMonthKey", &comparison.current_month_key),
                ("employeeNumber", &comparison.employee_number),
                ("nationalId", &comparison.national_id),
                ("previousPayslip", &previous_view),
                ("currentPayslip", &current_view),
                ("comparison", &comparison_json),
            ],
        );

        let answer = self
            .llm
            .complete(&self.prompts.system_compare, &prompt)
            .await?;

        Ok(CompareAnswer { answer, comparison })
    }
}

/// Compact view of a payslip for the prompt. Benefits are left out because
/// the comparison already covers them.
pub fn json_view(payslip: &ExtractedPayslip) -> Value {
    let text = |v: &Option<String>| v.clone().unwrap_or_default();
    let date = |d: Option<chrono::NaiveDate>| d.map(|d| d.to_string()).unwrap_or_default();

    let personal = payslip.personal.as_ref().map_or(json!({}), |p| {
        json!({
            "name": text(&p.name),
            "nationalId": text(&p.national_id),
            "maritalStatus": text(&p.marital_status),
            "dependents": p.dependents.unwrap_or(0),
        })
    });
    let employer = payslip.employer.as_ref().map_or(json!({}), |e| {
        json!({
            "name": text(&e.name),
            "employerNumber": text(&e.employer_number),
        })
    });
    let employment = payslip.employment.as_ref().map_or(json!({}), |e| {
        json!({
            "employeeNumber": text(&e.employee_number),
            "jobTitle": text(&e.job_title),
            "status": text(&e.status),
            "payCategory": text(&e.pay_category),
            "baseMonthlySalary": money(e.base_monthly_salary),
        })
    });
    let period = payslip.period.as_ref().map_or(json!({}), |p| {
        json!({
            "periodStart": date(p.period_start),
            "periodEnd": date(p.period_end),
            "payDate": date(p.pay_date),
            "currency": text(&p.currency),
            "monthKey": month_key(p.period_start),
        })
    });
    let financial = payslip.financial.as_ref().map_or(json!({}), |f| {
        json!({
            "gross": money(f.gross),
            "taxable": money(f.taxable),
            "socialSecurity": money(f.social_security),
            "withholdingTax": money(f.withholding_tax),
            "net": money(f.net),
        })
    });
    let extras = payslip.extras.as_ref().map_or(json!({}), |x| {
        json!({
            "mealVoucherContributionEmployer": money(x.meal_voucher_contribution_employer),
            "mealVoucherContributionEmployee": money(x.meal_voucher_contribution_employee),
            "mealVoucherCount": x.meal_voucher_count.unwrap_or(0),
        })
    });

    json!({
        "personal": personal,
        "employer": employer,
        "employment": employment,
        "period": period,
        "financial": financial,
        "extras": extras,
    })
}
