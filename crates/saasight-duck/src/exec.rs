//! Query executor - runs validated statements and shapes the results

use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use tracing::{debug, error};

use crate::guard::ValidatedQuery;
use crate::result::QueryResult;
use crate::store::{DataStore, StoreError};

/// Any failure while running a validated statement. Carries the store's
/// error detail; never retried.
#[derive(Debug, Error)]
#[error("Query execution failed: {source}")]
pub struct ExecutionError {
    #[from]
    source: StoreError,
}

impl ExecutionError {
    pub fn detail(&self) -> String {
        self.source.to_string()
    }

    pub fn store_error(&self) -> &StoreError {
        &self.source
    }
}

/// Runs statements on a shared [`DataStore`]. Enforces no row cap of its own;
/// the statement's LIMIT is the only bound.
#[derive(Clone)]
pub struct QueryExecutor {
    store: Arc<dyn DataStore>,
}

impl QueryExecutor {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self { store }
    }

    pub fn execute(&self, query: &ValidatedQuery) -> Result<QueryResult, ExecutionError> {
        let started = Instant::now();

        let row_set = self.store.run(query.as_str()).map_err(|e| {
            error!(query = %query, error = %e, "Query execution failed");
            ExecutionError::from(e)
        })?;
        let result = QueryResult::from_row_set(row_set);

        debug!(
            kind = ?result.kind,
            rows = result.row_count,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Query executed"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guard::validate;
    use crate::result::ResultKind;
    use crate::store::DuckStore;

    fn executor() -> QueryExecutor {
        let store = DuckStore::in_memory().unwrap();
        store
            .execute_batch(
                "CREATE TABLE users (id INTEGER, status VARCHAR);
                 INSERT INTO users VALUES (1, 'active'), (2, 'churned'), (3, 'active');",
            )
            .unwrap();
        QueryExecutor::new(Arc::new(store))
    }

    #[test]
    fn test_single_row_is_metric() {
        let result = executor()
            .execute(&validate("SELECT COUNT(*) AS total_users FROM users").unwrap())
            .unwrap();
        assert_eq!(result.kind, ResultKind::Metric);
        assert_eq!(result.columns, vec!["total_users"]);
        assert_eq!(result.rows, vec![vec!["3".to_string()]]);
    }

    #[test]
    fn test_multiple_rows_is_table() {
        let result = executor()
            .execute(
                &validate("SELECT status, COUNT(*) AS count FROM users GROUP BY status ORDER BY status")
                    .unwrap(),
            )
            .unwrap();
        assert_eq!(result.kind, ResultKind::Table);
        assert_eq!(result.row_count, 2);
        assert_eq!(result.get(0, "status"), Some("active"));
        assert_eq!(result.get(0, "count"), Some("2"));
    }

    #[test]
    fn test_no_rows_is_empty() {
        let result = executor()
            .execute(&validate("SELECT id FROM users WHERE status = 'inactive'").unwrap())
            .unwrap();
        assert_eq!(result.kind, ResultKind::Empty);
        assert_eq!(result.row_count, 0);
    }

    #[test]
    fn test_unknown_column_is_execution_error() {
        let err = executor()
            .execute(&validate("SELECT no_such_column FROM users").unwrap())
            .unwrap_err();
        assert!(err.to_string().starts_with("Query execution failed"));
        assert!(err.detail().contains("no_such_column"));
    }

    #[test]
    fn test_repeated_execution_is_identical() {
        let executor = executor();
        let query = validate("SELECT id, status FROM users ORDER BY id LIMIT 100").unwrap();
        let first = executor.execute(&query).unwrap();
        let second = executor.execute(&query).unwrap();
        assert_eq!(first, second);
    }
}
