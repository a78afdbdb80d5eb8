//! Data-store collaborator
//!
//! The pipeline only needs `run(sql) -> rows`. [`DuckStore`] is the DuckDB
//! implementation; tests substitute their own [`DataStore`].

use std::fmt;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use duckdb::types::{TimeUnit, ValueRef};
use duckdb::Connection;
use thiserror::Error;

/// Days between 0001-01-01 (CE day 1) and the Unix epoch.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] duckdb::Error),

    #[error("Failed to create database directory: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database connection lock poisoned")]
    Poisoned,

    #[error("Query task did not complete: {0}")]
    Interrupted(String),
}

/// A single cell as read from the store, before stringification.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Bool(bool),
    Int(i128),
    UInt(u64),
    Float(f64),
    Decimal(String),
    Text(String),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
    Time(NaiveTime),
    Interval { months: i32, days: i32, nanos: i64 },
    Other(String),
}

impl Cell {
    fn from_value_ref(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => Cell::Null,
            ValueRef::Boolean(b) => Cell::Bool(b),
            ValueRef::TinyInt(i) => Cell::Int(i.into()),
            ValueRef::SmallInt(i) => Cell::Int(i.into()),
            ValueRef::Int(i) => Cell::Int(i.into()),
            ValueRef::BigInt(i) => Cell::Int(i.into()),
            ValueRef::HugeInt(i) => Cell::Int(i),
            ValueRef::UTinyInt(i) => Cell::UInt(i.into()),
            ValueRef::USmallInt(i) => Cell::UInt(i.into()),
            ValueRef::UInt(i) => Cell::UInt(i.into()),
            ValueRef::UBigInt(i) => Cell::UInt(i),
            ValueRef::Float(f) => Cell::Float(f.into()),
            ValueRef::Double(f) => Cell::Float(f),
            ValueRef::Decimal(d) => Cell::Decimal(d.to_string()),
            ValueRef::Text(bytes) => Cell::Text(String::from_utf8_lossy(bytes).into_owned()),
            ValueRef::Blob(bytes) => Cell::Other(format!("<blob {} bytes>", bytes.len())),
            ValueRef::Date32(days) => days
                .checked_add(UNIX_EPOCH_DAYS_FROM_CE)
                .and_then(NaiveDate::from_num_days_from_ce_opt)
                .map(Cell::Date)
                .unwrap_or_else(|| Cell::Other(format!("<date {}>", days))),
            ValueRef::Timestamp(unit, value) => timestamp_from(unit, value)
                .map(Cell::Timestamp)
                .unwrap_or_else(|| Cell::Other(format!("<timestamp {}>", value))),
            ValueRef::Time64(unit, value) => time_from(unit, value)
                .map(Cell::Time)
                .unwrap_or_else(|| Cell::Other(format!("<time {}>", value))),
            ValueRef::Interval { months, days, nanos } => Cell::Interval { months, days, nanos },
            other => Cell::Other(format!("{:?}", other)),
        }
    }
}

fn timestamp_from(unit: TimeUnit, value: i64) -> Option<NaiveDateTime> {
    let micros = match unit {
        TimeUnit::Second => value.checked_mul(1_000_000)?,
        TimeUnit::Millisecond => value.checked_mul(1_000)?,
        TimeUnit::Microsecond => value,
        TimeUnit::Nanosecond => value / 1_000,
    };
    DateTime::from_timestamp_micros(micros).map(|dt| dt.naive_utc())
}

fn time_from(unit: TimeUnit, value: i64) -> Option<NaiveTime> {
    let micros = match unit {
        TimeUnit::Second => value.checked_mul(1_000_000)?,
        TimeUnit::Millisecond => value.checked_mul(1_000)?,
        TimeUnit::Microsecond => value,
        TimeUnit::Nanosecond => value / 1_000,
    };
    let secs = u32::try_from(micros.div_euclid(1_000_000)).ok()?;
    let nanos = u32::try_from(micros.rem_euclid(1_000_000) * 1_000).ok()?;
    NaiveTime::from_num_seconds_from_midnight_opt(secs, nanos)
}

/// DuckDB's textual interval form: `1 year 2 months 3 days 04:05:06.5`,
/// `00:00:00` when zero.
fn write_interval(f: &mut fmt::Formatter<'_>, months: i32, days: i32, nanos: i64) -> fmt::Result {
    let mut parts: Vec<String> = Vec::new();
    let mut unit = |value: i64, name: &str| {
        if value != 0 {
            let plural = if value.abs() == 1 { "" } else { "s" };
            parts.push(format!("{} {}{}", value, name, plural));
        }
    };
    unit(i64::from(months / 12), "year");
    unit(i64::from(months % 12), "month");
    unit(i64::from(days), "day");

    let micros = nanos / 1_000;
    if micros != 0 || parts.is_empty() {
        let sign = if micros < 0 { "-" } else { "" };
        let total = micros.unsigned_abs();
        let (secs, frac) = (total / 1_000_000, total % 1_000_000);
        let mut clock = format!(
            "{}{:02}:{:02}:{:02}",
            sign,
            secs / 3_600,
            secs / 60 % 60,
            secs % 60
        );
        if frac != 0 {
            let digits = format!("{:06}", frac);
            clock.push('.');
            clock.push_str(digits.trim_end_matches('0'));
        }
        parts.push(clock);
    }

    f.write_str(&parts.join(" "))
}

/// Canonical string form used in every [`crate::QueryResult`].
impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => f.write_str("null"),
            Cell::Bool(b) => write!(f, "{}", b),
            Cell::Int(i) => write!(f, "{}", i),
            Cell::UInt(i) => write!(f, "{}", i),
            Cell::Float(v) => write!(f, "{}", v),
            Cell::Decimal(s) | Cell::Text(s) | Cell::Other(s) => f.write_str(s),
            Cell::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Cell::Timestamp(ts) => write!(f, "{}", ts),
            Cell::Time(t) => write!(f, "{}", t),
            Cell::Interval {
                months,
                days,
                nanos,
            } => write_interval(f, *months, *days, *nanos),
        }
    }
}

/// Raw output of one statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowSet {
    /// False when the statement produced no result set at all.
    pub returns_rows: bool,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

/// Anything that can run a single SQL statement and hand back its rows.
pub trait DataStore: Send + Sync {
    fn run(&self, sql: &str) -> Result<RowSet, StoreError>;
}

/// DuckDB store. The connection is shared behind a mutex since DuckDB
/// connections are `Send` but not `Sync`.
pub struct DuckStore {
    conn: Mutex<Connection>,
}

impl DuckStore {
    /// Open (or create) a database file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Ok(Self::from_connection(conn))
    }

    pub fn in_memory() -> Result<Self, StoreError> {
        Ok(Self::from_connection(Connection::open_in_memory()?))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    /// Run one or more statements without collecting results.
    ///
    /// Used by setup code (seeding, fixtures). Never reachable from `ask`.
    pub fn execute_batch(&self, sql: &str) -> Result<(), StoreError> {
        self.connection()?.execute_batch(sql)?;
        Ok(())
    }

    /// Row count of a table.
    pub fn count_rows(&self, table: &str) -> Result<u64, StoreError> {
        let query = format!("SELECT COUNT(*) FROM \"{}\"", table);
        let count: i64 = self.connection()?.query_row(&query, [], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }

    pub(crate) fn connection(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }
}

impl DataStore for DuckStore {
    fn run(&self, sql: &str) -> Result<RowSet, StoreError> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(sql)?;
        let mut rows = stmt.query([])?;

        let mut row_set = RowSet::default();
        if let Some(executed) = rows.as_ref() {
            row_set.columns = executed.column_names();
            row_set.returns_rows = !row_set.columns.is_empty();
        }

        let width = row_set.columns.len();
        while let Some(row) = rows.next()? {
            let mut cells = Vec::with_capacity(width);
            for i in 0..width {
                cells.push(Cell::from_value_ref(row.get_ref(i)?));
            }
            row_set.rows.push(cells);
        }

        tracing::trace!(rows = row_set.rows.len(), columns = width, "Statement finished");
        Ok(row_set)
    }
}
