//! One-sentence interpretation of a query result
//!
//! The model is asked first; any failure falls through to a deterministic
//! template picked by keywords in the question.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use saasight_duck::QueryResult;
use thiserror::Error;
use tracing::warn;

use crate::model::{complete_within, LanguageModel, ModelError};
use crate::prompt::insight_prompt;
use crate::Source;

pub const NO_DATA_MESSAGE: &str = "No data available for analysis.";

#[derive(Debug, Error)]
pub enum InsightFailure {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("Language model returned an empty insight")]
    Empty,
}

#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, question: &str, result: &QueryResult) -> Result<String, InsightFailure>;
}

pub struct ModelSummarizer {
    model: Arc<dyn LanguageModel>,
    timeout: Duration,
}

impl ModelSummarizer {
    pub fn new(model: Arc<dyn LanguageModel>, timeout: Duration) -> Self {
        Self { model, timeout }
    }
}

#[async_trait]
impl Summarizer for ModelSummarizer {
    async fn summarize(&self, question: &str, result: &QueryResult) -> Result<String, InsightFailure> {
        let prompt = insight_prompt(question, result);
        let raw = complete_within(self.model.as_ref(), &prompt, self.timeout).await?;
        let text = raw.trim();
        if text.is_empty() {
            return Err(InsightFailure::Empty);
        }
        Ok(text.to_string())
    }
}

/// Keyword templates over the first value of the first row.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateSummarizer;

impl TemplateSummarizer {
    pub fn render(&self, question: &str, result: &QueryResult) -> String {
        if result.is_empty() {
            return NO_DATA_MESSAGE.to_string();
        }

        let question = question.to_lowercase();
        let first = result.first_value().and_then(parse_number);

        // A keyword template only applies when the first value is numeric.
        if let Some(value) = first {
            if question.contains("users") {
                return format!(
                    "Strong user base of {} users. Focus on retention and upselling opportunities.",
                    group_thousands(value.round() as i64)
                );
            }
            if question.contains("revenue") || question.contains("mrr") {
                return format!(
                    "Revenue of ${} indicates healthy business performance.",
                    format_currency(value)
                );
            }
            if question.contains("churn") {
                return format!(
                    "{} churned users. Monitor retention strategies and customer satisfaction.",
                    value.round() as i64
                );
            }
        }

        if result.row_count > 1 {
            return format!(
                "Analysis shows {} data points. Look for trends to guide business decisions.",
                result.row_count
            );
        }

        "Data retrieved successfully. Use these metrics to guide your SaaS growth strategy."
            .to_string()
    }
}

#[async_trait]
impl Summarizer for TemplateSummarizer {
    async fn summarize(&self, question: &str, result: &QueryResult) -> Result<String, InsightFailure> {
        Ok(self.render(question, result))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Insight {
    pub text: String,
    pub source: Source,
}

pub struct InsightGenerator {
    primary: Option<Box<dyn Summarizer>>,
    fallback: TemplateSummarizer,
}

impl InsightGenerator {
    pub fn new(primary: Option<Box<dyn Summarizer>>) -> Self {
        Self {
            primary,
            fallback: TemplateSummarizer,
        }
    }

    pub fn with_model(model: Arc<dyn LanguageModel>, timeout: Duration) -> Self {
        Self::new(Some(Box::new(ModelSummarizer::new(model, timeout))))
    }

    pub fn fallback_only() -> Self {
        Self::new(None)
    }

    /// Always returns text. Empty results never reach the model.
    pub async fn generate(&self, question: &str, result: &QueryResult) -> Insight {
        if result.is_empty() {
            return Insight {
                text: NO_DATA_MESSAGE.to_string(),
                source: Source::Fallback,
            };
        }

        if let Some(primary) = &self.primary {
            match primary.summarize(question, result).await {
                Ok(text) => {
                    return Insight {
                        text,
                        source: Source::Model,
                    }
                }
                Err(e) => warn!(error = %e, "Insight model unavailable, using template"),
            }
        }

        Insight {
            text: self.fallback.render(question, result),
            source: Source::Fallback,
        }
    }
}

fn parse_number(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// `1234567` -> `1,234,567`
fn group_thousands(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if value < 0 {
        grouped.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}

/// `1234.5` -> `1,234.50`
fn format_currency(value: f64) -> String {
    let fixed = format!("{:.2}", value.abs());
    let (whole, cents) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    let whole = whole.parse::<i64>().map(group_thousands).unwrap_or_else(|_| whole.to_string());
    let sign = if value < 0.0 { "-" } else { "" };
    format!("{}{}.{}", sign, whole, cents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use saasight_duck::{Cell, RowSet};

    fn result(columns: &[&str], rows: Vec<Vec<Cell>>) -> QueryResult {
        QueryResult::from_row_set(RowSet {
            returns_rows: true,
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows,
        })
    }

    fn metric(value: Cell) -> QueryResult {
        result(&["value"], vec![vec![value]])
    }

    struct Failing;

    #[async_trait]
    impl Summarizer for Failing {
        async fn summarize(&self, _q: &str, _r: &QueryResult) -> Result<String, InsightFailure> {
            Err(InsightFailure::Model(ModelError::Unavailable("down".to_string())))
        }
    }

    struct Fixed(&'static str);

    #[async_trait]
    impl Summarizer for Fixed {
        async fn summarize(&self, _q: &str, _r: &QueryResult) -> Result<String, InsightFailure> {
            Ok(self.0.to_string())
        }
    }

    #[test]
    fn test_users_template() {
        let text = TemplateSummarizer.render("How many users?", &metric(Cell::Int(1000)));
        assert_eq!(
            text,
            "Strong user base of 1,000 users. Focus on retention and upselling opportunities."
        );
    }

    #[test]
    fn test_revenue_template() {
        let text = TemplateSummarizer.render("What's our MRR?", &metric(Cell::Decimal("25431.5".into())));
        assert_eq!(text, "Revenue of $25,431.50 indicates healthy business performance.");

        let text = TemplateSummarizer.render("total revenue", &metric(Cell::Decimal("99.99".into())));
        assert_eq!(text, "Revenue of $99.99 indicates healthy business performance.");
    }

    #[test]
    fn test_churn_template() {
        let text = TemplateSummarizer.render("Show churn", &metric(Cell::Int(312)));
        assert_eq!(
            text,
            "312 churned users. Monitor retention strategies and customer satisfaction."
        );
    }

    #[test]
    fn test_users_checked_before_churn() {
        let text = TemplateSummarizer.render("How many churned users?", &metric(Cell::Int(5)));
        assert!(text.starts_with("Strong user base of 5 users"));
    }

    #[test]
    fn test_non_numeric_first_value_skips_keyword_templates() {
        let plans = result(
            &["plan_type", "user_count"],
            vec![
                vec![Cell::Text("pro".into()), Cell::Int(260)],
                vec![Cell::Text("free".into()), Cell::Int(250)],
            ],
        );
        let text = TemplateSummarizer.render("Which plans do users have?", &plans);
        assert_eq!(
            text,
            "Analysis shows 2 data points. Look for trends to guide business decisions."
        );

        let text = TemplateSummarizer.render("What's our MRR?", &metric(Cell::Null));
        assert_eq!(
            text,
            "Data retrieved successfully. Use these metrics to guide your SaaS growth strategy."
        );
    }

    #[test]
    fn test_number_formatting() {
        assert_eq!(group_thousands(0), "0");
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(1_234_567), "1,234,567");
        assert_eq!(group_thousands(-4_500), "-4,500");
        assert_eq!(format_currency(1_234_567.891), "1,234,567.89");
        assert_eq!(format_currency(0.5), "0.50");
    }

    #[tokio::test]
    async fn test_empty_result_gets_no_data_message() {
        let generator = InsightGenerator::new(Some(Box::new(Fixed("should not be used"))));
        let insight = generator.generate("How many users?", &QueryResult::empty()).await;
        assert_eq!(insight.text, NO_DATA_MESSAGE);
        assert_eq!(insight.source, Source::Fallback);
    }

    #[tokio::test]
    async fn test_model_insight_preferred() {
        let generator = InsightGenerator::new(Some(Box::new(Fixed("  Upsell pro users.\n"))));
        let insight = generator.generate("How many users?", &metric(Cell::Int(10))).await;
        assert_eq!(insight.text, "  Upsell pro users.\n");
        assert_eq!(insight.source, Source::Model);
    }

    #[tokio::test]
    async fn test_model_failure_uses_template() {
        let generator = InsightGenerator::new(Some(Box::new(Failing)));
        let insight = generator.generate("What is our churn?", &metric(Cell::Int(7))).await;
        assert_eq!(insight.source, Source::Fallback);
        assert!(insight.text.starts_with("7 churned users."));
    }
}
