//! Shared labelling environment: store handle, table names, taxonomy, roster
//!
//! One `Desk` serves every session. Input records are read once and shared
//! read-only; a failed load is not cached, so the next session retries.

use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::info;

use labeldesk_common::models::{ProgressMark, Record, OUTPUT_COLUMNS};
use labeldesk_common::roster::Roster;
use labeldesk_common::store::{read_progress, read_records, SharedStore};
use labeldesk_common::{Result, Taxonomy};

pub struct Desk {
    store: SharedStore,
    input_table: String,
    output_table: String,
    taxonomy: Taxonomy,
    roster: Roster,
    records: OnceCell<Arc<Vec<Record>>>,
    output_ready: OnceCell<()>,
}

impl Desk {
    pub fn new(
        store: SharedStore,
        input_table: impl Into<String>,
        output_table: impl Into<String>,
        taxonomy: Taxonomy,
        roster: Roster,
    ) -> Self {
        Self {
            store,
            input_table: input_table.into(),
            output_table: output_table.into(),
            taxonomy,
            roster,
            records: OnceCell::new(),
            output_ready: OnceCell::new(),
        }
    }

    pub fn taxonomy(&self) -> &Taxonomy {
        &self.taxonomy
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn input_table(&self) -> &str {
        &self.input_table
    }

    pub fn output_table(&self) -> &str {
        &self.output_table
    }

    /// Input records, loaded on first use
    pub async fn records(&self) -> Result<Arc<Vec<Record>>> {
        self.records
            .get_or_try_init(|| async {
                let records = read_records(self.store.as_ref(), &self.input_table).await?;
                info!(
                    table = %self.input_table,
                    backend = self.store.backend(),
                    count = records.len(),
                    "Input records loaded"
                );
                Ok(Arc::new(records))
            })
            .await
            .cloned()
    }

    /// Current progress marks from the output table
    pub async fn progress(&self) -> Result<Vec<ProgressMark>> {
        read_progress(self.store.as_ref(), &self.output_table).await
    }

    /// Append one output row, creating the output table before the first write
    pub async fn append_output(&self, cells: Vec<serde_json::Value>) -> Result<()> {
        self.output_ready
            .get_or_try_init(|| self.store.ensure_table(&self.output_table, &OUTPUT_COLUMNS))
            .await?;
        self.store.append(&self.output_table, cells).await
    }
}
