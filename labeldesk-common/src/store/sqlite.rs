//! SQLite-backed table store
//!
//! Each logical table is a SQLite table whose columns carry no declared type,
//! so cells keep the type they were written with. Rows come back in rowid
//! (insertion) order.

use async_trait::async_trait;
use serde_json::{json, Value};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Column, Row, SqlitePool, ValueRef};
use std::path::Path;
use std::str::FromStr;
use tracing::info;

use super::TabularStore;
use crate::models::StoreRow;
use crate::{Error, Result};

/// Store backed by a SQLite database file
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if missing) the database at `db_path`
    pub async fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", db_path.display()))?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        info!("Opened SQLite store at {}", db_path.display());
        Ok(Self { pool })
    }

    /// Wrap an existing pool (e.g. `sqlite::memory:` in tests)
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn table_exists(&self, table: &str) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
        )
        .bind(table)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    async fn table_columns(&self, table: &str) -> Result<Vec<String>> {
        let rows = sqlx::query(&format!("PRAGMA table_info({})", quote(table)))
            .fetch_all(&self.pool)
            .await?;

        // PRAGMA table_info returns: (cid, name, type, notnull, dflt_value, pk)
        Ok(rows.iter().map(|row| row.get::<String, _>(1)).collect())
    }
}

#[async_trait]
impl TabularStore for SqliteStore {
    async fn read_all(&self, table: &str) -> Result<Vec<StoreRow>> {
        check_identifier(table)?;
        if !self.table_exists(table).await? {
            return Err(Error::TableNotFound(table.to_string()));
        }

        let header = self.table_columns(table).await?;
        let rows = sqlx::query(&format!("SELECT * FROM {} ORDER BY rowid", quote(table)))
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .iter()
            .map(|row| {
                (0..row.len())
                    .map(|i| {
                        let name = row
                            .columns()
                            .get(i)
                            .map(|c| c.name().to_string())
                            .or_else(|| header.get(i).cloned())
                            .unwrap_or_default();
                        (name, cell_value(row, i))
                    })
                    .collect()
            })
            .collect())
    }

    async fn append(&self, table: &str, cells: Vec<Value>) -> Result<()> {
        check_identifier(table)?;
        if !self.table_exists(table).await? {
            return Err(Error::TableNotFound(table.to_string()));
        }

        let placeholders = vec!["?"; cells.len()].join(", ");
        let sql = format!("INSERT INTO {} VALUES ({})", quote(table), placeholders);

        let mut query = sqlx::query(&sql);
        for cell in cells {
            query = match cell {
                Value::Null => query.bind(None::<String>),
                Value::String(s) => query.bind(s),
                Value::Number(n) => match n.as_i64() {
                    Some(i) => query.bind(i),
                    None => query.bind(n.as_f64()),
                },
                Value::Bool(b) => query.bind(if b { "TRUE" } else { "FALSE" }),
                other => query.bind(other.to_string()),
            };
        }
        query.execute(&self.pool).await?;
        Ok(())
    }

    async fn ensure_table(&self, table: &str, columns: &[&str]) -> Result<()> {
        check_identifier(table)?;
        for column in columns {
            check_identifier(column)?;
        }
        let column_list = columns.iter().map(|c| quote(c)).collect::<Vec<_>>().join(", ");
        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            quote(table),
            column_list
        ))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "sqlite"
    }
}

/// Convert one SQLite cell to JSON
fn cell_value(row: &sqlx::sqlite::SqliteRow, i: usize) -> Value {
    row.try_get_raw(i)
        .ok()
        .and_then(|val| {
            if val.is_null() {
                Some(Value::Null)
            } else {
                row.try_get::<String, _>(i)
                    .ok()
                    .map(Value::String)
                    .or_else(|| row.try_get::<i64, _>(i).ok().map(|v| json!(v)))
                    .or_else(|| row.try_get::<f64, _>(i).ok().map(|v| json!(v)))
            }
        })
        .unwrap_or(Value::Null)
}

/// Only alphanumerics and underscore are accepted in table/column names
fn check_identifier(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name.len() < 100
        && name.chars().all(|c| c.is_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!("Invalid table or column name: {}", name)))
    }
}

fn quote(name: &str) -> String {
    format!("\"{}\"", name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OUTPUT_COLUMNS;

    async fn memory_store() -> SqliteStore {
        // One connection: every sqlite::memory: connection is its own database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to create in-memory database");
        SqliteStore::from_pool(pool)
    }

    #[tokio::test]
    async fn test_missing_table_reported() {
        let store = memory_store().await;
        let err = store.read_all("sample_30_labelled").await.unwrap_err();
        assert!(matches!(err, Error::TableNotFound(_)));
    }

    #[tokio::test]
    async fn test_append_then_read_keeps_types_and_order() {
        let store = memory_store().await;
        store.ensure_table("labelled", &OUTPUT_COLUMNS).await.unwrap();

        for attempt in [2, 0, 1] {
            let mut cells: Vec<Value> = OUTPUT_COLUMNS.iter().map(|_| json!("FALSE")).collect();
            cells[1] = json!("Leanne");
            cells[3] = json!(attempt);
            store.append("labelled", cells).await.unwrap();
        }

        let rows = store.read_all("labelled").await.unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0]["labeller"], json!("Leanne"));
        let attempts: Vec<Value> = rows.iter().map(|r| r["attempt_id"].clone()).collect();
        assert_eq!(attempts, vec![json!(2), json!(0), json!(1)]);
        assert_eq!(rows[2]["all_other_misconduct"], json!("FALSE"));
    }

    #[tokio::test]
    async fn test_rejects_suspicious_table_names() {
        let store = memory_store().await;
        assert!(store.read_all("x; DROP TABLE y").await.is_err());
        assert!(store.ensure_table("ok", &["bad column"]).await.is_err());
    }

    #[tokio::test]
    async fn test_append_to_missing_table_fails() {
        let store = memory_store().await;
        let err = store.append("nowhere", vec![json!(1)]).await.unwrap_err();
        assert!(matches!(err, Error::TableNotFound(_)));
    }
}
