//! Schema description and live catalog extraction

use serde::{Deserialize, Serialize};

use crate::store::{DuckStore, StoreError};

/// Tables the analytics pipeline may query, as described to the language model.
pub const SCHEMA_DESCRIPTION: &str = r#"- users: id, email, created_at, plan_type ('free' | 'basic' | 'pro' | 'enterprise'), status ('active' | 'inactive' | 'churned')
- subscriptions: id, user_id, plan_name, mrr (monthly recurring revenue, DECIMAL(10,2)), start_date, end_date (NULL while active), status
- events: id, user_id, event_name, event_date, properties (JSON text)
- revenue: id, "date", amount (DECIMAL(10,2)), source, user_id (nullable)"#;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    pub is_nullable: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableCatalog {
    pub name: String,
    pub columns: Vec<ColumnInfo>,
    pub row_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseCatalog {
    pub tables: Vec<TableCatalog>,
}

impl DatabaseCatalog {
    /// Read tables and columns of the `main` schema from information_schema.
    pub fn from_store(store: &DuckStore) -> Result<Self, StoreError> {
        let layout: Vec<(String, String, String, String)> = {
            let conn = store.connection()?;
            let mut stmt = conn.prepare(
                "SELECT c.table_name, c.column_name, c.data_type, c.is_nullable \
                 FROM information_schema.columns c \
                 JOIN information_schema.tables t \
                   ON t.table_name = c.table_name AND t.table_schema = c.table_schema \
                 WHERE c.table_schema = 'main' AND t.table_type = 'BASE TABLE' \
                 ORDER BY c.table_name, c.ordinal_position",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
            })?;
            let collected = rows.collect::<duckdb::Result<Vec<_>>>()?;
            collected
        };

        let mut tables: Vec<TableCatalog> = Vec::new();
        for (table, column, data_type, nullable) in layout {
            let column = ColumnInfo {
                name: column,
                data_type,
                is_nullable: nullable == "YES",
            };
            match tables.last_mut() {
                Some(last) if last.name == table => last.columns.push(column),
                _ => tables.push(TableCatalog {
                    name: table,
                    columns: vec![column],
                    row_count: 0,
                }),
            }
        }

        for table in &mut tables {
            table.row_count = store.count_rows(&table.name)?;
        }

        Ok(Self { tables })
    }

    pub fn to_markdown(&self) -> String {
        let mut md = String::from("# Database Catalog\n\n");
        md.push_str(&format!("**Tables:** {}\n\n", self.tables.len()));

        for table in &self.tables {
            md.push_str(&format!("## Table: `{}`\n\n", table.name));
            md.push_str(&format!("**Rows:** {}\n\n", table.row_count));
            md.push_str("| Column | Type | Nullable |\n");
            md.push_str("|--------|------|----------|\n");
            for col in &table.columns {
                let nullable = if col.is_nullable { "✓" } else { "" };
                md.push_str(&format!("| `{}` | {} | {} |\n", col.name, col.data_type, nullable));
            }
            md.push('\n');
        }

        md
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seed;

    #[test]
    fn test_catalog_lists_seeded_tables() -> Result<(), StoreError> {
        let store = DuckStore::in_memory()?;
        seed::create_schema(&store)?;
        store.execute_batch(
            "INSERT INTO users VALUES (1, 'a@example.com', TIMESTAMP '2024-01-01 00:00:00', 'pro', 'active');",
        )?;

        let catalog = DatabaseCatalog::from_store(&store)?;
        let names: Vec<&str> = catalog.tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["events", "revenue", "subscriptions", "users"]);

        let users = &catalog.tables[3];
        assert_eq!(users.row_count, 1);
        assert_eq!(users.columns[0].name, "id");
        assert!(users.columns.iter().any(|c| c.name == "plan_type"));

        let md = catalog.to_markdown();
        assert!(md.contains("## Table: `users`"));
        assert!(md.contains("**Rows:** 1"));
        Ok(())
    }

    #[test]
    fn test_schema_description_names_every_table() {
        for table in ["users", "subscriptions", "events", "revenue"] {
            assert!(SCHEMA_DESCRIPTION.contains(&format!("- {}:", table)));
        }
    }
}
