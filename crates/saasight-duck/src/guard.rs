//! Read-only safety gate
//!
//! A textual denylist, not a parser. Every token of the statement is
//! compared case-insensitively against [`FORBIDDEN_KEYWORDS`]; a hit anywhere,
//! string literals and comments included, rejects the statement. This
//! over-rejects queries that merely mention a keyword, and never lets a
//! statement containing one of the keywords verbatim through.

use std::fmt;

use thiserror::Error;

/// Statements that can mutate data or reach outside the database.
pub const FORBIDDEN_KEYWORDS: &[&str] = &[
    "DROP", "DELETE", "UPDATE", "INSERT", "ALTER", "TRUNCATE", "CREATE", "ATTACH", "DETACH",
    "COPY", "INSTALL", "LOAD", "PRAGMA",
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RejectedQuery {
    #[error("Query contains forbidden operation: {keyword}")]
    ForbiddenKeyword { keyword: String },

    #[error("Query contains more than one statement")]
    MultipleStatements,

    #[error("Query is empty")]
    Empty,
}

/// A statement that passed [`validate`]. The executor only accepts these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedQuery(String);

impl ValidatedQuery {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl AsRef<str> for ValidatedQuery {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ValidatedQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Check a statement against the denylist. The statement text is kept as-is.
pub fn validate(query: &str) -> Result<ValidatedQuery, RejectedQuery> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return Err(RejectedQuery::Empty);
    }

    if let Some(keyword) = forbidden_keyword(query) {
        tracing::warn!(keyword, "Rejected query with forbidden keyword");
        return Err(RejectedQuery::ForbiddenKeyword {
            keyword: keyword.to_string(),
        });
    }

    if has_second_statement(trimmed) {
        tracing::warn!("Rejected multi-statement query");
        return Err(RejectedQuery::MultipleStatements);
    }

    Ok(ValidatedQuery(query.to_string()))
}

/// First denylisted token in text order.
fn forbidden_keyword(query: &str) -> Option<&'static str> {
    tokens(query).find_map(|token| {
        FORBIDDEN_KEYWORDS
            .iter()
            .copied()
            .find(|keyword| token.eq_ignore_ascii_case(keyword))
    })
}

/// Maximal runs of identifier characters.
fn tokens(query: &str) -> impl Iterator<Item = &str> {
    query
        .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .filter(|token| !token.is_empty())
}

/// A trailing `;` is fine; any statement text after one is another
/// statement. Semicolons inside quotes or comments do not terminate, and
/// comments after the terminator are not statement text.
fn has_second_statement(query: &str) -> bool {
    let mut terminated = false;
    let mut chars = query.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\'' | '"' => {
                if terminated {
                    return true;
                }
                // A doubled quote closes and reopens, which is the SQL escape.
                for next in chars.by_ref() {
                    if next == c {
                        break;
                    }
                }
            }
            '-' if chars.peek() == Some(&'-') => {
                for next in chars.by_ref() {
                    if next == '\n' {
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                for next in chars.by_ref() {
                    if prev == '*' && next == '/' {
                        break;
                    }
                    prev = next;
                }
            }
            ';' => terminated = true,
            c if c.is_whitespace() => {}
            _ => {
                if terminated {
                    return true;
                }
            }
        }
    }

    false
}
