//! Prompts for the two model calls, and cleanup of raw model output

use saasight_duck::catalog::SCHEMA_DESCRIPTION;
use saasight_duck::QueryResult;

/// Rows of a result shown to the model when asking for an insight.
pub const INSIGHT_SAMPLE_ROWS: usize = 5;

/// Instruction prompt for SQL translation. `{schema}` and `{question}` are
/// filled in by [`translation_prompt`].
const TRANSLATION_TEMPLATE: &str = r#"You are an expert SQL generator for SaaS analytics. Your ONLY job is to output one valid DuckDB SELECT statement.

DATABASE SCHEMA:
{schema}

STRICT RULES:
1. Output ONLY the SQL query - no explanations, no markdown, no extra text
2. Use DuckDB syntax (not MySQL or PostgreSQL specific functions)
3. Always add LIMIT 100 for safety
4. Use ROUND(..., 2) for decimal calculations
5. For averages across users, JOIN or sub-select tables appropriately
6. Active subscriptions: WHERE status = 'active'
7. Recent data is a rolling window: WHERE created_at >= current_date - INTERVAL 12 MONTH
8. Read-only: never modify data, never emit more than one statement

EXAMPLES:
Question: "How many users?"
Answer: SELECT COUNT(*) AS total_users FROM users LIMIT 100

Question: "What's our MRR?"
Answer: SELECT ROUND(SUM(mrr), 2) AS total_mrr FROM subscriptions WHERE status = 'active' LIMIT 100

Question: "Average revenue per user?"
Answer: SELECT ROUND(AVG(total_revenue), 2) AS avg_revenue_per_user FROM (SELECT user_id, SUM(amount) AS total_revenue FROM revenue GROUP BY user_id) LIMIT 100

Question: "Show revenue by month for the last 6 months"
Answer: SELECT strftime("date", '%Y-%m') AS month, ROUND(SUM(amount), 2) AS revenue FROM revenue WHERE "date" >= current_date - INTERVAL 6 MONTH GROUP BY month ORDER BY month DESC LIMIT 100

Question: "Compare active vs churned users"
Answer: SELECT status, COUNT(*) AS count FROM users GROUP BY status LIMIT 100

Question: "How many people signed up in the last 30 days?"
Answer: SELECT COUNT(*) AS new_signups FROM users WHERE created_at >= current_date - INTERVAL 30 DAY LIMIT 100

Question: "What are the most used features?"
Answer: SELECT event_name AS feature_name, COUNT(*) AS usage_count FROM events GROUP BY event_name ORDER BY usage_count DESC LIMIT 10

Now generate SQL for this question:
{question}

SQL:"#;

const INSIGHT_TEMPLATE: &str = r#"Based on this SaaS analytics data, provide ONE brief business insight (max 40 words).
Focus on actionable recommendations for SaaS growth.

Question: {question}
Data: {data}

Insight:"#;

pub fn translation_prompt(question: &str) -> String {
    TRANSLATION_TEMPLATE
        .replace("{schema}", SCHEMA_DESCRIPTION)
        .replace("{question}", question)
}

/// Only the first [`INSIGHT_SAMPLE_ROWS`] rows are included.
pub fn insight_prompt(question: &str, result: &QueryResult) -> String {
    let data = serde_json::to_string(&result.records(INSIGHT_SAMPLE_ROWS))
        .unwrap_or_else(|_| "[]".to_string());
    INSIGHT_TEMPLATE
        .replace("{question}", question)
        .replace("{data}", &data)
}

/// Info strings recognised on an opening code fence.
const FENCE_LANGUAGES: &[&str] = &["sql", "duckdb", "postgresql", "postgres", "psql", "sqlite", "mysql"];

/// Strip a surrounding markdown code fence (```` ```sql ```` or bare ```` ``` ````)
/// and whitespace, leaving only the statement text.
pub fn strip_code_fences(raw: &str) -> &str {
    let mut text = raw.trim();

    if let Some(rest) = text.strip_prefix("```") {
        text = strip_language_tag(rest);
    }

    if let Some(rest) = text.trim_end().strip_suffix("```") {
        text = rest;
    }

    text.trim()
}

/// Drop the info string after an opening fence, but only a known language
/// tag: ```` ```SELECT ```` keeps its first word.
fn strip_language_tag(rest: &str) -> &str {
    let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
    let tag = &rest[..end];
    if FENCE_LANGUAGES.iter().any(|lang| tag.eq_ignore_ascii_case(lang)) {
        &rest[end..]
    } else {
        rest
    }
}
