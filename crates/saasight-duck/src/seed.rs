//! Synthetic SaaS demo data
//!
//! Setup utility only: builds the four analytics tables and fills them with
//! deterministic pseudo-random rows generated inside DuckDB (`range` +
//! `hash`). Dates are relative to `current_date` so rolling-window questions
//! ("last 30 days") always find data.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::store::{DuckStore, StoreError};

const SCHEMA_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY,
    email VARCHAR UNIQUE,
    created_at TIMESTAMP,
    plan_type VARCHAR,
    status VARCHAR
);
CREATE TABLE IF NOT EXISTS subscriptions (
    id INTEGER PRIMARY KEY,
    user_id INTEGER,
    plan_name VARCHAR,
    mrr DECIMAL(10, 2),
    start_date TIMESTAMP,
    end_date TIMESTAMP,
    status VARCHAR
);
CREATE TABLE IF NOT EXISTS events (
    id INTEGER PRIMARY KEY,
    user_id INTEGER,
    event_name VARCHAR,
    event_date TIMESTAMP,
    properties VARCHAR
);
CREATE TABLE IF NOT EXISTS revenue (
    id INTEGER PRIMARY KEY,
    "date" DATE,
    amount DECIMAL(10, 2),
    source VARCHAR,
    user_id INTEGER
);
"#;

/// Two years, in seconds.
const SIGNUP_WINDOW_SECS: u64 = 63_072_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedOptions {
    pub users: u32,
    /// Each user gets between `min_events_per_user` and this many events.
    pub max_events_per_user: u32,
    pub min_events_per_user: u32,
    /// One revenue record per day, ending yesterday.
    pub revenue_days: u32,
}

impl Default for SeedOptions {
    fn default() -> Self {
        Self {
            users: 1000,
            min_events_per_user: 10,
            max_events_per_user: 100,
            revenue_days: 365,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedReport {
    pub users: u64,
    pub subscriptions: u64,
    pub events: u64,
    pub revenue_records: u64,
}

/// Create the schema if needed without touching existing rows.
pub fn create_schema(store: &DuckStore) -> Result<(), StoreError> {
    store.execute_batch(SCHEMA_DDL)
}

/// True once `users` exists and has at least one row.
pub fn is_initialized(store: &DuckStore) -> Result<bool, StoreError> {
    create_schema(store)?;
    Ok(store.count_rows("users")? > 0)
}

/// Wipe the four tables and regenerate them.
pub fn seed(store: &DuckStore, options: &SeedOptions) -> Result<SeedReport, StoreError> {
    create_schema(store)?;
    store.execute_batch(
        "DELETE FROM revenue; DELETE FROM events; DELETE FROM subscriptions; DELETE FROM users;",
    )?;

    store.execute_batch(&users_sql(options.users))?;
    store.execute_batch(SUBSCRIPTIONS_SQL)?;
    store.execute_batch(&events_sql(
        options.min_events_per_user,
        options.max_events_per_user,
    ))?;
    store.execute_batch(&revenue_sql(options.revenue_days, options.users))?;

    let report = SeedReport {
        users: store.count_rows("users")?,
        subscriptions: store.count_rows("subscriptions")?,
        events: store.count_rows("events")?,
        revenue_records: store.count_rows("revenue")?,
    };
    info!(?report, "Seeded demo data");
    Ok(report)
}

/// Seed only when the store has no users yet. Returns `None` if it already had data.
pub fn seed_if_empty(
    store: &DuckStore,
    options: &SeedOptions,
) -> Result<Option<SeedReport>, StoreError> {
    if is_initialized(store)? {
        return Ok(None);
    }
    seed(store, options).map(Some)
}

fn users_sql(users: u32) -> String {
    format!(
        r#"
INSERT INTO users
SELECT
    CAST(i + 1 AS INTEGER),
    concat('user', i + 1, '@example.com'),
    CAST(current_date AS TIMESTAMP) - to_seconds(CAST(hash(concat('created', i)) % {window} AS BIGINT)),
    ['free', 'basic', 'pro', 'enterprise'][CAST(hash(concat('plan', i)) % 4 AS INTEGER) + 1],
    ['active', 'inactive', 'churned'][CAST(hash(concat('status', i)) % 3 AS INTEGER) + 1]
FROM range({users}) t(i);
"#,
        window = SIGNUP_WINDOW_SECS,
        users = users
    )
}

const SUBSCRIPTIONS_SQL: &str = r#"
INSERT INTO subscriptions
SELECT
    CAST(row_number() OVER (ORDER BY u.id) AS INTEGER),
    u.id,
    u.plan_type,
    CASE u.plan_type WHEN 'basic' THEN 29 WHEN 'pro' THEN 99 WHEN 'enterprise' THEN 299 ELSE 29 END,
    u.created_at,
    CASE WHEN u.status = 'active' THEN NULL
         ELSE u.created_at + to_seconds(CAST(
             hash(concat('ended', u.id)) % GREATEST(date_diff('second', u.created_at, CAST(current_date AS TIMESTAMP)), 1)
             AS BIGINT))
    END,
    u.status
FROM users u
WHERE u.plan_type <> 'free';
"#;

fn events_sql(min_events: u32, max_events: u32) -> String {
    let max_events = max_events.max(min_events);
    let spread = max_events - min_events + 1;
    format!(
        r#"
INSERT INTO events
SELECT
    CAST(row_number() OVER (ORDER BY u.id, r.j) AS INTEGER),
    u.id,
    ['login', 'feature_used', 'export_data', 'create_report', 'invite_user'][CAST(hash(concat('event', u.id, '-', r.j)) % 5 AS INTEGER) + 1],
    u.created_at + to_seconds(CAST(
        hash(concat('at', u.id, '-', r.j)) % GREATEST(date_diff('second', u.created_at, CAST(current_date AS TIMESTAMP)), 1)
        AS BIGINT)),
    concat(
        '{{"feature": "',
        ['search', 'dashboard', 'alerts', 'billing', 'api'][CAST(hash(concat('feature', u.id, '-', r.j)) % 5 AS INTEGER) + 1],
        '", "duration": ',
        1 + hash(concat('duration', u.id, '-', r.j)) % 3600,
        '}}'
    )
FROM users u
CROSS JOIN range({max_events}) r(j)
WHERE r.j < {min_events} + hash(concat('events', u.id)) % {spread};
"#,
        max_events = max_events,
        min_events = min_events,
        spread = spread
    )
}

fn revenue_sql(days: u32, users: u32) -> String {
    let payer = if users == 0 {
        "NULL".to_string()
    } else {
        format!("CAST(1 + hash(concat('payer', i)) % {} AS INTEGER)", users)
    };
    format!(
        r#"
INSERT INTO revenue
SELECT
    CAST(i + 1 AS INTEGER),
    current_date - CAST({days} - i AS INTEGER),
    CAST(1000 + (hash(concat('amount', i)) % 400001) / 100.0 AS DECIMAL(10, 2)),
    'subscriptions',
    {payer}
FROM range({days}) t(i);
"#,
        days = days,
        payer = payer
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::DataStore;

    fn small() -> SeedOptions {
        SeedOptions {
            users: 50,
            min_events_per_user: 2,
            max_events_per_user: 5,
            revenue_days: 30,
        }
    }

    #[test]
    fn test_seed_populates_all_tables() -> Result<(), StoreError> {
        let store = DuckStore::in_memory()?;
        let report = seed(&store, &small())?;

        assert_eq!(report.users, 50);
        assert_eq!(report.revenue_records, 30);
        assert!(report.subscriptions <= 50);
        assert!(report.events >= 100 && report.events <= 250);
        Ok(())
    }

    #[test]
    fn test_seed_is_deterministic_and_replaces_data() -> Result<(), StoreError> {
        let store = DuckStore::in_memory()?;
        let first = seed(&store, &small())?;
        let plans_first = store.run("SELECT plan_type, status FROM users ORDER BY id")?;

        let second = seed(&store, &small())?;
        let plans_second = store.run("SELECT plan_type, status FROM users ORDER BY id")?;

        assert_eq!(first, second);
        assert_eq!(plans_first, plans_second);
        Ok(())
    }

    #[test]
    fn test_free_users_have_no_subscription() -> Result<(), StoreError> {
        let store = DuckStore::in_memory()?;
        seed(&store, &small())?;
        let rows = store.run(
            "SELECT COUNT(*) FROM subscriptions s JOIN users u ON u.id = s.user_id WHERE u.plan_type = 'free'",
        )?;
        assert_eq!(rows.rows[0][0].to_string(), "0");

        let rows = store.run(
            "SELECT COUNT(*) FROM subscriptions WHERE status = 'active' AND end_date IS NOT NULL",
        )?;
        assert_eq!(rows.rows[0][0].to_string(), "0");
        Ok(())
    }

    #[test]
    fn test_seed_if_empty_only_runs_once() -> Result<(), StoreError> {
        let store = DuckStore::in_memory()?;
        assert!(!is_initialized(&store)?);
        assert!(seed_if_empty(&store, &small())?.is_some());
        assert!(is_initialized(&store)?);
        assert!(seed_if_empty(&store, &small())?.is_none());
        Ok(())
    }
}
