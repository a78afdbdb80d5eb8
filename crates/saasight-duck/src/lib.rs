//! DuckDB-backed data store for saasight
//!
//! Everything that touches the analytics database lives here: the store
//! itself, the read-only safety gate, the executor that shapes rows into a
//! [`QueryResult`], the demo-data seeder and the schema catalog.

pub mod catalog;
pub mod exec;
pub mod guard;
pub mod result;
pub mod seed;
pub mod store;

pub use exec::{ExecutionError, QueryExecutor};
pub use guard::{validate, RejectedQuery, ValidatedQuery};
pub use result::{QueryResult, ResultKind};
pub use store::{Cell, DataStore, DuckStore, RowSet, StoreError};
