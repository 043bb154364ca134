use rust_decimal::Decimal;
use uuid::Uuid;

use crate::models::{
    month_key, Benefit, BenefitChange, ComparisonResult, ExtractedPayslip, FieldChange,
};

pub const ADDED: &str = "ADDED";
pub const REMOVED: &str = "REMOVED";
const AMOUNT_CHANGED: &str = "AMOUNT_CHANGED";
const DIRECTION_CHANGED: &str = "DIRECTION_CHANGED";
const TAXABLE_CHANGED: &str = "TAXABLE_CHANGED";

type FieldGetter = fn(&ExtractedPayslip) -> Option<Decimal>;

const FIELDS: &[(&str, &str, FieldGetter)] = &[
    ("baseMonthlySalary", "Base monthly salary", |p: &ExtractedPayslip| {
        p.employment.as_ref().and_then(|e| e.base_monthly_salary)
    }),
    ("gross", "Gross pay", |p: &ExtractedPayslip| p.financial.as_ref().and_then(|f| f.gross)),
    ("taxable", "Taxable pay", |p: &ExtractedPayslip| {
        p.financial.as_ref().and_then(|f| f.taxable)
    }),
    ("socialSecurity", "Social security (RSZ)", |p: &ExtractedPayslip| {
        p.financial.as_ref().and_then(|f| f.social_security)
    }),
    ("withholdingTax", "Withholding tax", |p: &ExtractedPayslip| {
        p.financial.as_ref().and_then(|f| f.withholding_tax)
    }),
    ("net", "Net pay", |p: &ExtractedPayslip| p.financial.as_ref().and_then(|f| f.net)),
    ("mealVoucherEmployer", "Meal vouchers (employer contribution)", |p: &ExtractedPayslip| {
        p.extras
            .as_ref()
            .and_then(|x| x.meal_voucher_contribution_employer)
    }),
    ("mealVoucherEmployee", "Meal vouchers (employee contribution)", |p: &ExtractedPayslip| {
        p.extras
            .as_ref()
            .and_then(|x| x.meal_voucher_contribution_employee)
    }),
    ("mealVoucherCount", "Meal voucher count", |p: &ExtractedPayslip| {
        p.extras
            .as_ref()
            .and_then(|x| x.meal_voucher_count)
            .map(Decimal::from)
    }),
];

/// Field-by-field and benefit-by-benefit differences between two payslips.
/// Identifiers are taken from `current`.
pub fn compare_payslips(previous: &ExtractedPayslip, current: &ExtractedPayslip) -> ComparisonResult {
    let field_changes = FIELDS
        .iter()
        .filter_map(|(name, description, get)| {
            let previous_value = get(previous).unwrap_or_default();
            let current_value = get(current).unwrap_or_default();
            (previous_value != current_value).then(|| FieldChange {
                field_name: name.to_string(),
                description: description.to_string(),
                previous_value,
                current_value,
                delta: current_value - previous_value,
            })
        })
        .collect();

    ComparisonResult {
        employee_number: current.employee_number(),
        national_id: current.national_id(),
        employer_number: current.employer_number(),
        previous_month_key: month_key(previous.period.as_ref().and_then(|p| p.period_start)),
        current_month_key: month_key(current.period.as_ref().and_then(|p| p.period_start)),
        field_changes,
        benefit_changes: compare_benefits(previous.benefits(), current.benefits()),
    }
}

fn benefit_key(benefit: &Benefit) -> String {
    benefit
        .code
        .as_deref()
        .filter(|code| !code.trim().is_empty())
        .or(benefit.label.as_deref())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

/// Later duplicates replace earlier ones but keep the first position.
fn key_benefits(benefits: &[Benefit]) -> Vec<(String, &Benefit)> {
    let mut keyed: Vec<(String, &Benefit)> = Vec::new();
    for benefit in benefits {
        let key = benefit_key(benefit);
        match keyed.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = benefit,
            None => keyed.push((key, benefit)),
        }
    }
    keyed
}

fn lookup<'a>(keyed: &[(String, &'a Benefit)], key: &str) -> Option<&'a Benefit> {
    keyed.iter().find(|(k, _)| k == key).map(|(_, b)| *b)
}

fn compare_benefits(previous: &[Benefit], current: &[Benefit]) -> Vec<BenefitChange> {
    let previous = key_benefits(previous);
    let current = key_benefits(current);
    let mut keys: Vec<&str> = previous.iter().map(|(k, _)| k.as_str()).collect();
    for (key, _) in &current {
        if !keys.contains(&key.as_str()) {
            keys.push(key);
        }
    }

    let mut changes = Vec::new();
    for key in keys {
        match (lookup(&previous, key), lookup(&current, key)) {
            (None, Some(curr)) => changes.push(BenefitChange {
                code: curr.code.clone(),
                label: curr.label.clone(),
                category: curr.category.clone(),
                change_type: ADDED.to_string(),
                current_amount: curr.amount,
                current_direction: curr.direction.clone(),
                current_taxable: Some(curr.taxable.unwrap_or(false)),
                ..Default::default()
            }),
            (Some(prev), None) => changes.push(BenefitChange {
                code: prev.code.clone(),
                label: prev.label.clone(),
                category: prev.category.clone(),
                change_type: REMOVED.to_string(),
                previous_amount: prev.amount,
                previous_direction: prev.direction.clone(),
                previous_taxable: Some(prev.taxable.unwrap_or(false)),
                ..Default::default()
            }),
            (Some(prev), Some(curr)) => {
                let kinds: Vec<&str> = [
                    (
                        prev.amount.unwrap_or_default() != curr.amount.unwrap_or_default(),
                        AMOUNT_CHANGED,
                    ),
                    (
                        prev.direction.as_deref().unwrap_or("")
                            != curr.direction.as_deref().unwrap_or(""),
                        DIRECTION_CHANGED,
                    ),
                    (
                        prev.taxable.unwrap_or(false) != curr.taxable.unwrap_or(false),
                        TAXABLE_CHANGED,
                    ),
                ]
                .into_iter()
                .filter_map(|(changed, kind)| changed.then_some(kind))
                .collect();

                if !kinds.is_empty() {
                    changes.push(BenefitChange {
                        code: curr.code.clone(),
                        label: curr.label.clone(),
                        category: curr.category.clone(),
                        change_type: kinds.join("+"),
                        previous_amount: prev.amount,
                        current_amount: curr.amount,
                        previous_direction: prev.direction.clone(),
                        current_direction: curr.direction.clone(),
                        previous_taxable: Some(prev.taxable.unwrap_or(false)),
                        current_taxable: Some(curr.taxable.unwrap_or(false)),
                    });
                }
            }
            (None, None) => {}
        }
    }
    changes
}
