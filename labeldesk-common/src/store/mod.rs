//! Tabular store adapter
//!
//! The store is an external collaborator holding two named tables: the
//! input table of unlabelled records and the append-only output table of
//! submitted labels. Backends implement [`TabularStore`]; the helpers in
//! this module apply the table-specific rules on top.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::{StoreBackend, StoreSettings};
use crate::models::{ProgressMark, Record, StoreRow, INPUT_COLUMNS};
use crate::{Error, Result};

mod memory;
mod sheets;
#[cfg(feature = "sqlx")]
mod sqlite;

pub use memory::MemoryStore;
pub use sheets::{SheetsStore, DEFAULT_SHEETS_BASE_URL};
#[cfg(feature = "sqlx")]
pub use sqlite::SqliteStore;

/// Read-all / append access to named tables
#[async_trait]
pub trait TabularStore: Send + Sync {
    /// All rows of `table` in stored order
    ///
    /// Fails with [`Error::TableNotFound`] when the table does not exist.
    async fn read_all(&self, table: &str) -> Result<Vec<StoreRow>>;

    /// Append one row; `cells` follow the table's column order
    async fn append(&self, table: &str, cells: Vec<Value>) -> Result<()>;

    /// Create `table` with the given header if it does not exist yet
    async fn ensure_table(&self, table: &str, columns: &[&str]) -> Result<()>;

    /// Backend name for logs
    fn backend(&self) -> &'static str;
}

/// Shared handle to a store backend
pub type SharedStore = Arc<dyn TabularStore>;

/// Open the backend selected in `settings`
pub async fn open_store(settings: &StoreSettings) -> Result<SharedStore> {
    let store: SharedStore = match settings.backend {
        #[cfg(feature = "sqlx")]
        StoreBackend::Sqlite => Arc::new(SqliteStore::open(&settings.sqlite_path).await?),
        #[cfg(not(feature = "sqlx"))]
        StoreBackend::Sqlite => {
            return Err(Error::Config("Built without SQLite support".to_string()))
        }
        StoreBackend::Sheets => {
            let sheets = settings.sheets.as_ref().ok_or_else(|| {
                Error::Config("Sheets backend selected without connection settings".to_string())
            })?;
            Arc::new(SheetsStore::new(&sheets.base_url, &sheets.spreadsheet_id, &sheets.token)?)
        }
        StoreBackend::Memory => Arc::new(MemoryStore::new()),
    };
    Ok(store)
}

/// Append `records` to the input table, creating it when missing
pub async fn import_records(
    store: &dyn TabularStore,
    input_table: &str,
    records: &[Record],
) -> Result<usize> {
    store.ensure_table(input_table, &INPUT_COLUMNS).await?;
    for record in records {
        store.append(input_table, record.to_row()).await?;
    }
    debug!(table = input_table, count = records.len(), "Imported input records");
    Ok(records.len())
}

/// Read and parse every record of the input table
///
/// A missing input table is an error like any other store failure.
pub async fn read_records(store: &dyn TabularStore, input_table: &str) -> Result<Vec<Record>> {
    let rows = store.read_all(input_table).await?;
    let records = rows
        .iter()
        .map(Record::from_row)
        .collect::<Result<Vec<_>>>()?;
    debug!(table = input_table, count = records.len(), "Loaded input records");
    Ok(records)
}

/// Read the progress marks of the output table
///
/// A missing output table means nobody has submitted yet and yields an
/// empty list. Rows without a usable labeller or attempt id are skipped.
pub async fn read_progress(store: &dyn TabularStore, output_table: &str) -> Result<Vec<ProgressMark>> {
    let rows = match store.read_all(output_table).await {
        Ok(rows) => rows,
        Err(Error::TableNotFound(_)) => {
            debug!(table = output_table, "Output table not created yet");
            return Ok(Vec::new());
        }
        Err(e) => return Err(e),
    };

    let total = rows.len();
    let marks: Vec<ProgressMark> = rows.iter().filter_map(ProgressMark::from_row).collect();
    if marks.len() < total {
        warn!(
            table = output_table,
            skipped = total - marks.len(),
            "Output rows without labeller/attempt_id ignored"
        );
    }
    Ok(marks)
}

/// Pair a header row with data rows the way spreadsheet records are read:
/// missing trailing cells become empty strings, extra cells are dropped
pub(crate) fn rows_from_grid(header: &[String], data: Vec<Vec<Value>>) -> Vec<StoreRow> {
    data.into_iter()
        .map(|cells| {
            let mut cells = cells.into_iter();
            header
                .iter()
                .map(|name| {
                    let value = cells.next().unwrap_or_else(|| Value::String(String::new()));
                    (name.clone(), value)
                })
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OUTPUT_COLUMNS;
    use serde_json::json;

    #[tokio::test]
    async fn test_read_progress_tolerates_missing_output_table() {
        let store = MemoryStore::new();
        let marks = read_progress(&store, "labelled").await.unwrap();
        assert!(marks.is_empty());
    }

    #[tokio::test]
    async fn test_read_records_missing_input_table_is_error() {
        let store = MemoryStore::new();
        let err = read_records(&store, "sampled").await.unwrap_err();
        assert!(matches!(err, Error::TableNotFound(_)));
    }

    #[tokio::test]
    async fn test_read_progress_skips_malformed_rows() {
        let store = MemoryStore::new();
        store.ensure_table("labelled", &OUTPUT_COLUMNS).await.unwrap();
        let mut cells: Vec<Value> = OUTPUT_COLUMNS.iter().map(|_| json!("")).collect();
        cells[1] = json!("Shaun");
        cells[3] = json!(4);
        store.append("labelled", cells.clone()).await.unwrap();
        cells[3] = json!("not a number");
        store.append("labelled", cells).await.unwrap();

        let marks = read_progress(&store, "labelled").await.unwrap();
        assert_eq!(marks, vec![ProgressMark::new("Shaun", 4)]);
    }

    #[tokio::test]
    async fn test_read_records_in_order() {
        let store = MemoryStore::new();
        store.ensure_table("sampled", &INPUT_COLUMNS).await.unwrap();
        for i in 0..3 {
            store
                .append("sampled", vec![json!(i), json!(format!("o{}", i)), json!(format!("t{}", i))])
                .await
                .unwrap();
        }
        let records = read_records(&store, "sampled").await.unwrap();
        let texts: Vec<&str> = records.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["t0", "t1", "t2"]);
    }

    #[tokio::test]
    async fn test_import_records_creates_input_table() {
        let store = MemoryStore::new();
        let records = vec![Record {
            prompt_id: json!(1),
            original_id: json!("a"),
            text: "first".to_string(),
        }];
        assert_eq!(import_records(&store, "sampled", &records).await.unwrap(), 1);
        assert_eq!(read_records(&store, "sampled").await.unwrap(), records);
    }

    #[test]
    fn test_rows_from_grid_pads_short_rows() {
        let header = vec!["a".to_string(), "b".to_string()];
        let rows = rows_from_grid(&header, vec![vec![json!(1)], vec![json!(2), json!(3), json!(4)]]);
        assert_eq!(rows[0]["a"], json!(1));
        assert_eq!(rows[0]["b"], json!(""));
        assert_eq!(rows[1]["b"], json!(3));
        assert_eq!(rows[1].len(), 2);
    }
}
