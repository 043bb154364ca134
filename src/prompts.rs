use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::config::ConfigError;

/// Prompt texts used by the payslip services.
///
/// Every field falls back to its built-in default, so a prompts file only
/// needs the entries it wants to change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
    pub system_extraction: String,
    pub user_extraction: String,
    pub system_compare: String,
    pub user_compare: String,
    pub system_ask: String,
    pub user_ask: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            system_extraction: DEFAULT_SYSTEM_EXTRACTION.to_string(),
            user_extraction: DEFAULT_USER_EXTRACTION.to_string(),
            system_compare: DEFAULT_SYSTEM_COMPARE.to_string(),
            user_compare: DEFAULT_USER_COMPARE.to_string(),
            system_ask: DEFAULT_SYSTEM_ASK.to_string(),
            user_ask: DEFAULT_USER_ASK.to_string(),
        }
    }
}

impl PromptConfig {
    pub fn from_json(json_str: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json_str)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let prompts_error = |reason: String| ConfigError::Prompts {
            path: path.display().to_string(),
            reason,
        };

        let content = fs::read_to_string(path).map_err(|e| prompts_error(e.to_string()))?;
        let prompts = Self::from_json(&content).map_err(|e| prompts_error(e.to_string()))?;
        log::info!("Loaded prompts from {}", path.display());
        Ok(prompts)
    }
}

/// Fills `{name}` placeholders. Unknown placeholders are left untouched.
pub fn render(template: &str, values: &[(&str, &str)]) -> String {
    values
        .iter()
        .fold(template.to_string(), |text, (name, value)| {
            text.replace(&format!("{{{}}}", name), value)
        })
}

const DEFAULT_SYSTEM_EXTRACTION: &str = "You are a payroll document parser. \
You read Belgian payslips and return the data they contain as a single JSON object. \
Use exactly the field names you are given, ISO dates (YYYY-MM-DD) and plain decimal numbers without currency symbols. \
Use null for anything the document does not show. Never invent values. Return JSON only.";

const DEFAULT_USER_EXTRACTION: &str = r#"Extract the payslip into this JSON structure:
{
  "personal": {"name": "", "nationalId": "", "maritalStatus": "", "dependents": 0, "address": ""},
  "employer": {"name": "", "employerNumber": "", "address": ""},
  "employment": {"employeeNumber": "", "jobTitle": "", "status": "", "payCategory": "", "baseMonthlySalary": 0},
  "period": {"periodStart": "YYYY-MM-DD", "periodEnd": "YYYY-MM-DD", "payDate": "YYYY-MM-DD", "currency": "EUR"},
  "financial": {"gross": 0, "taxable": 0, "socialSecurity": 0, "withholdingTax": 0, "net": 0, "paymentIban": "", "paymentBic": ""},
  "extras": {
    "mealVoucherContributionEmployer": 0,
    "mealVoucherContributionEmployee": 0,
    "mealVoucherCount": 0,
    "benefits": [{"code": "", "label": "", "category": "", "amount": 0, "direction": "EARNING|DEDUCTION", "taxable": false}]
  }
}"#;

const DEFAULT_SYSTEM_COMPARE: &str = "You are a payroll assistant explaining the differences between two payslips of the same employee. \
The comparison you receive was computed exactly; rely on it for every number and do not recompute amounts. \
Explain each relevant change in plain language, mention the amounts with their currency and keep the answer short.";

const DEFAULT_USER_COMPARE: &str = r#"Question: {question}

Employee number: {employeeNumber}
National ID: {nationalId}

Previous payslip ({previousMonthKey}):
{previousPayslip}

Current payslip ({currentMonthKey}):
{currentPayslip}

Computed comparison:
{comparison}"#;

const DEFAULT_SYSTEM_ASK: &str = "You are a payroll assistant answering questions about a single payslip. \
Answer only from the context you are given, which contains sections of the payslip and payroll definitions. \
If the context does not contain the answer, say so. Cite the document ids you used between square brackets.";

const DEFAULT_USER_ASK: &str = r#"Context:
{context}

Available document ids: {citations}

Question: {question}"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_replaces_placeholders() {
        let text = render(
            "Q: {question} ({question}) {missing}",
            &[("question", "why?")],
        );
        assert_eq!(text, "Q: why? (why?) {missing}");
    }

    #[test]
    fn test_partial_override_keeps_defaults() {
        let prompts = PromptConfig::from_json(r#"{"system_ask": "Be brief."}"#).unwrap();
        assert_eq!(prompts.system_ask, "Be brief.");
        assert_eq!(prompts.user_ask, PromptConfig::default().user_ask);
    }

    #[test]
    fn test_default_templates_carry_placeholders() {
        let prompts = PromptConfig::default();
        for name in ["{context}", "{citations}", "{question}"] {
            assert!(prompts.user_ask.contains(name), "missing {}", name);
        }
        for name in ["{previousPayslip}", "{currentPayslip}", "{comparison}"] {
            assert!(prompts.user_compare.contains(name), "missing {}", name);
        }
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = PromptConfig::from_file("/nonexistent/prompts.json").unwrap_err();
        assert!(matches!(err, ConfigError::Prompts { .. }));
    }
}
