//! In-process table store for tests and demos

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

use super::{rows_from_grid, TabularStore};
use crate::models::StoreRow;
use crate::{Error, Result};

#[derive(Debug, Default)]
struct Table {
    header: Vec<String>,
    rows: Vec<Vec<Value>>,
}

/// Tables held in memory behind a mutex
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<HashMap<String, Table>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create (or replace) a table with a header and rows
    pub fn with_table(self, name: &str, columns: &[&str], rows: Vec<Vec<Value>>) -> Self {
        self.lock().insert(
            name.to_string(),
            Table {
                header: columns.iter().map(|c| c.to_string()).collect(),
                rows,
            },
        );
        self
    }

    /// Number of rows in `table`, or `None` when it does not exist
    pub fn row_count(&self, table: &str) -> Option<usize> {
        self.lock().get(table).map(|t| t.rows.len())
    }

    /// Raw cells of `table`
    pub fn raw_rows(&self, table: &str) -> Option<Vec<Vec<Value>>> {
        self.lock().get(table).map(|t| t.rows.clone())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Table>> {
        // A poisoned lock only means a test panicked mid-append
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl TabularStore for MemoryStore {
    async fn read_all(&self, table: &str) -> Result<Vec<StoreRow>> {
        let tables = self.lock();
        let t = tables
            .get(table)
            .ok_or_else(|| Error::TableNotFound(table.to_string()))?;
        Ok(rows_from_grid(&t.header, t.rows.clone()))
    }

    async fn append(&self, table: &str, cells: Vec<Value>) -> Result<()> {
        let mut tables = self.lock();
        let t = tables
            .get_mut(table)
            .ok_or_else(|| Error::TableNotFound(table.to_string()))?;
        t.rows.push(cells);
        Ok(())
    }

    async fn ensure_table(&self, table: &str, columns: &[&str]) -> Result<()> {
        self.lock().entry(table.to_string()).or_insert_with(|| Table {
            header: columns.iter().map(|c| c.to_string()).collect(),
            rows: Vec::new(),
        });
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_append_to_missing_table_fails() {
        let store = MemoryStore::new();
        let err = store.append("nope", vec![json!(1)]).await.unwrap_err();
        assert!(matches!(err, Error::TableNotFound(_)));
    }

    #[tokio::test]
    async fn test_ensure_table_keeps_existing_rows() {
        let store = MemoryStore::new().with_table("t", &["a"], vec![vec![json!(1)]]);
        store.ensure_table("t", &["a"]).await.unwrap();
        assert_eq!(store.row_count("t"), Some(1));
    }
}
