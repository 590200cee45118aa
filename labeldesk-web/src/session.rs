//! Labelling session controller
//!
//! One [`LabellingSession`] per logged-in browser session. Phases:
//!
//! ```text
//! AwaitingIdentity → AwaitingRecordLoad → Labelling(i) → Submitting(i) → Labelling(i+1) | Done
//!                                    ↘ Halted (no data / store failure)
//! ```
//!
//! `Done` and `Halted` are terminal. Selections are cleared whenever a new
//! record is shown.

use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

use labeldesk_common::models::{LabelledEntry, Record};
use labeldesk_common::resume::{duplicate_attempts, next_index};
use labeldesk_common::roster::Labeller;
use labeldesk_common::taxonomy::Selections;
use labeldesk_common::time::format_submission_timestamp;
use labeldesk_common::Category;

use crate::desk::Desk;

pub const SELECT_NAME_MESSAGE: &str = "Please select your name to begin labelling.";
pub const NO_DATA_MESSAGE: &str = "No data found!";
pub const FINISHED_MESSAGE: &str = "You have finished labelling all records. Thank you!";
pub const SUBMITTED_MESSAGE: &str = "Label submitted successfully! Next example incoming";
pub const INCOMPLETE_MESSAGE: &str = "Please provide labels for all categories before submitting.";

/// Session phase
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionPhase {
    AwaitingIdentity,
    AwaitingRecordLoad,
    Labelling { index: usize },
    Submitting { index: usize },
    Done,
    Halted { reason: String },
}

impl SessionPhase {
    pub fn name(&self) -> &'static str {
        match self {
            SessionPhase::AwaitingIdentity => "awaiting_identity",
            SessionPhase::AwaitingRecordLoad => "awaiting_record_load",
            SessionPhase::Labelling { .. } => "labelling",
            SessionPhase::Submitting { .. } => "submitting",
            SessionPhase::Done => "done",
            SessionPhase::Halted { .. } => "halted",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionPhase::Done | SessionPhase::Halted { .. })
    }
}

/// Rejected session actions; the session stays where it was
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("{}", SELECT_NAME_MESSAGE)]
    IdentityNotSelected,

    #[error("{0}")]
    UnknownLabeller(String),

    #[error("{0}")]
    UnknownOption(String),

    #[error("{}", INCOMPLETE_MESSAGE)]
    Incomplete { missing: Vec<Category> },

    #[error("Session has ended: {0}")]
    Ended(String),
}

/// Result of a submit that passed validation
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Row appended; the session moved on
    Saved(Box<LabelledEntry>),
    /// The append failed and the session halted; nothing was written
    Halted(String),
}

/// Per-session context passed through every controller operation
#[derive(Debug)]
pub struct LabellingSession {
    phase: SessionPhase,
    labeller: Option<Labeller>,
    records: Option<Arc<Vec<Record>>>,
    selections: Selections,
}

impl Default for LabellingSession {
    fn default() -> Self {
        Self::new()
    }
}

impl LabellingSession {
    pub fn new() -> Self {
        Self {
            phase: SessionPhase::AwaitingIdentity,
            labeller: None,
            records: None,
            selections: Selections::default(),
        }
    }

    pub fn phase(&self) -> &SessionPhase {
        &self.phase
    }

    pub fn labeller(&self) -> Option<&Labeller> {
        self.labeller.as_ref()
    }

    pub fn selections(&self) -> &Selections {
        &self.selections
    }

    /// Record on screen, if any
    pub fn current_record(&self) -> Option<&Record> {
        match self.phase {
            SessionPhase::Labelling { index } | SessionPhase::Submitting { index } => {
                self.records.as_ref().and_then(|r| r.get(index))
            }
            _ => None,
        }
    }

    fn ensure_active(&self) -> Result<(), SessionError> {
        match &self.phase {
            SessionPhase::Done => Err(SessionError::Ended(FINISHED_MESSAGE.to_string())),
            SessionPhase::Halted { reason } => Err(SessionError::Ended(reason.clone())),
            _ => Ok(()),
        }
    }

    fn halt(&mut self, reason: String) {
        error!(labeller = ?self.labeller.as_ref().map(Labeller::as_str), "Session halted: {}", reason);
        self.selections.clear_all();
        self.phase = SessionPhase::Halted { reason };
    }

    /// Show the record at `index`, or finish when past the end
    fn show(&mut self, index: usize) {
        self.selections.clear_all();
        let total = self.records.as_ref().map_or(0, |r| r.len());
        self.phase = if index >= total {
            info!(labeller = ?self.labeller.as_ref().map(Labeller::as_str), "All records labelled");
            SessionPhase::Done
        } else {
            SessionPhase::Labelling { index }
        };
    }

    /// Choose the labeller identity and position the session at their
    /// resume point
    ///
    /// Re-choosing the current labeller keeps the current position; a new
    /// labeller recomputes it from the output table. Store failures and an
    /// empty input table halt the session.
    pub async fn choose_labeller(&mut self, desk: &Desk, name: &str) -> Result<(), SessionError> {
        self.ensure_active()?;
        let labeller = desk
            .roster()
            .resolve(name)
            .map_err(|e| SessionError::UnknownLabeller(e.to_string()))?;

        if self.labeller.as_ref() == Some(&labeller) {
            return Ok(());
        }

        self.phase = SessionPhase::AwaitingRecordLoad;
        self.labeller = Some(labeller.clone());

        let records = match desk.records().await {
            Ok(records) => records,
            Err(e) => {
                self.halt(format!("Failed to connect to the data store: {}", e));
                return Ok(());
            }
        };
        if records.is_empty() {
            self.halt(NO_DATA_MESSAGE.to_string());
            return Ok(());
        }

        let marks = match desk.progress().await {
            Ok(marks) => marks,
            Err(e) => {
                self.halt(format!("Failed to connect to the data store: {}", e));
                return Ok(());
            }
        };

        let duplicates = duplicate_attempts(labeller.as_str(), &marks);
        if !duplicates.is_empty() {
            warn!(
                labeller = labeller.as_str(),
                ?duplicates,
                "Labeller has repeated attempt ids in the output table"
            );
        }

        let index = next_index(labeller.as_str(), &marks);
        info!(labeller = labeller.as_str(), index, total = records.len(), "Resuming labeller");
        self.records = Some(records);
        self.show(index);
        Ok(())
    }

    /// Set (or clear, with `None`) the selection for one category
    pub fn select(
        &mut self,
        desk: &Desk,
        category: Category,
        label: Option<&str>,
    ) -> Result<(), SessionError> {
        self.ensure_active()?;
        if !matches!(self.phase, SessionPhase::Labelling { .. }) {
            return Err(SessionError::IdentityNotSelected);
        }

        match label {
            None => self.selections.clear(category),
            Some(label) => {
                let choice = desk
                    .taxonomy()
                    .choose(category, label)
                    .map_err(|e| SessionError::UnknownOption(e.to_string()))?;
                self.selections.set(choice);
            }
        }
        Ok(())
    }

    /// Validate, map and append the current selections
    ///
    /// Incomplete selections are rejected without touching the store. On
    /// success the session advances to the next record.
    pub async fn submit(
        &mut self,
        desk: &Desk,
        timestamp: NaiveDateTime,
    ) -> Result<SubmitOutcome, SessionError> {
        self.ensure_active()?;
        let index = match self.phase {
            SessionPhase::Labelling { index } => index,
            _ => return Err(SessionError::IdentityNotSelected),
        };
        let (Some(labeller), Some(record)) = (self.labeller.clone(), self.current_record().cloned()) else {
            return Err(SessionError::IdentityNotSelected);
        };

        let codes = self
            .selections
            .codes()
            .map_err(|missing| SessionError::Incomplete { missing })?;

        let entry = LabelledEntry {
            timestamp: format_submission_timestamp(&timestamp),
            labeller: labeller.as_str().to_string(),
            prompt_id: record.prompt_id,
            attempt_id: index,
            original_id: record.original_id,
            text: record.text,
            codes,
        };

        self.phase = SessionPhase::Submitting { index };
        if let Err(e) = desk.append_output(entry.to_row()).await {
            let reason = format!("Failed to save label: {}", e);
            self.halt(reason.clone());
            return Ok(SubmitOutcome::Halted(reason));
        }

        info!(labeller = labeller.as_str(), index, "Label submitted");
        self.show(index + 1);
        Ok(SubmitOutcome::Saved(Box::new(entry)))
    }

    /// Snapshot for the UI
    pub fn view(&self) -> SessionView {
        let (index, message) = match &self.phase {
            SessionPhase::AwaitingIdentity => (None, Some(SELECT_NAME_MESSAGE.to_string())),
            SessionPhase::Labelling { index } | SessionPhase::Submitting { index } => {
                (Some(*index), None)
            }
            SessionPhase::Done => (None, Some(FINISHED_MESSAGE.to_string())),
            SessionPhase::Halted { reason } => (None, Some(reason.clone())),
            SessionPhase::AwaitingRecordLoad => (None, None),
        };

        let selections = Category::ALL
            .into_iter()
            .filter_map(|c| {
                self.selections
                    .get(c)
                    .map(|choice| (c.key(), choice.label().to_string()))
            })
            .collect();

        SessionView {
            phase: self.phase.name(),
            labeller: self.labeller.as_ref().map(|l| l.as_str().to_string()),
            index,
            total: self.records.as_ref().map(|r| r.len()),
            record: self.current_record().cloned(),
            selections,
            message,
        }
    }
}

/// Serializable snapshot of a session
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub phase: &'static str,
    pub labeller: Option<String>,
    pub index: Option<usize>,
    pub total: Option<usize>,
    pub record: Option<Record>,
    /// Category key → selected option label
    pub selections: BTreeMap<&'static str, String>,
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use labeldesk_common::models::{INPUT_COLUMNS, OUTPUT_COLUMNS};
    use labeldesk_common::roster::Roster;
    use labeldesk_common::store::{MemoryStore, SharedStore};
    use labeldesk_common::Taxonomy;
    use serde_json::{json, Value};

    const INPUT: &str = "sampled";
    const OUTPUT: &str = "labelled";

    fn ts() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 2)
            .unwrap()
            .and_hms_opt(3, 4, 5)
            .unwrap()
    }

    fn input_rows(n: usize) -> Vec<Vec<Value>> {
        (0..n)
            .map(|i| vec![json!(100 + i), json!(format!("orig-{}", i)), json!(format!("text {}", i))])
            .collect()
    }

    fn output_row(labeller: &str, attempt: usize) -> Vec<Value> {
        let mut cells: Vec<Value> = OUTPUT_COLUMNS.iter().map(|_| json!("FALSE")).collect();
        cells[1] = json!(labeller);
        cells[3] = json!(attempt);
        cells
    }

    fn desk_with(store: MemoryStore) -> (Desk, Arc<MemoryStore>) {
        let store = Arc::new(store);
        let shared: SharedStore = store.clone();
        let desk = Desk::new(shared, INPUT, OUTPUT, Taxonomy::default(), Roster::default());
        (desk, store)
    }

    fn select_all(session: &mut LabellingSession, desk: &Desk, label: &str) {
        for category in Category::ALL {
            session.select(desk, category, Some(label)).unwrap();
        }
    }

    #[tokio::test]
    async fn test_new_labeller_starts_at_zero_and_submits() {
        let (desk, store) = desk_with(MemoryStore::new().with_table(INPUT, &INPUT_COLUMNS, input_rows(3)));
        let mut session = LabellingSession::new();
        assert_eq!(session.phase(), &SessionPhase::AwaitingIdentity);

        session.choose_labeller(&desk, "Jessica").await.unwrap();
        assert_eq!(session.phase(), &SessionPhase::Labelling { index: 0 });
        assert_eq!(session.current_record().unwrap().text, "text 0");

        select_all(&mut session, &desk, "NIL");
        let outcome = session.submit(&desk, ts()).await.unwrap();
        let SubmitOutcome::Saved(entry) = outcome else {
            panic!("expected saved outcome");
        };
        assert_eq!(entry.attempt_id, 0);
        assert!(entry.codes.iter().all(|c| c == "FALSE"));

        let rows = store.raw_rows(OUTPUT).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][1], json!("Jessica"));
        assert_eq!(rows[0][3], json!(0));
        assert_eq!(rows[0][2], json!(100));
        assert_eq!(rows[0][0], json!("2025-01-02T03:04:05.000000"));

        assert_eq!(session.phase(), &SessionPhase::Labelling { index: 1 });
        assert!(session.selections().missing().len() == 6);
    }

    #[tokio::test]
    async fn test_resumes_after_last_attempt() {
        let store = MemoryStore::new()
            .with_table(INPUT, &INPUT_COLUMNS, input_rows(10))
            .with_table(OUTPUT, &OUTPUT_COLUMNS, vec![output_row("Shaun", 4)]);
        let (desk, _) = desk_with(store);

        let mut session = LabellingSession::new();
        session.choose_labeller(&desk, "Shaun").await.unwrap();
        assert_eq!(session.phase(), &SessionPhase::Labelling { index: 5 });
    }

    #[tokio::test]
    async fn test_corrupt_attempt_id_is_ignored_on_resume() {
        let mut corrupt = output_row("Shaun", 0);
        corrupt[3] = json!("1e30");
        let store = MemoryStore::new()
            .with_table(INPUT, &INPUT_COLUMNS, input_rows(10))
            .with_table(OUTPUT, &OUTPUT_COLUMNS, vec![output_row("Shaun", 2), corrupt]);
        let (desk, _) = desk_with(store);

        let mut session = LabellingSession::new();
        session.choose_labeller(&desk, "Shaun").await.unwrap();
        assert_eq!(session.phase(), &SessionPhase::Labelling { index: 3 });
    }

    #[tokio::test]
    async fn test_finished_labeller_goes_straight_to_done() {
        let store = MemoryStore::new()
            .with_table(INPUT, &INPUT_COLUMNS, input_rows(2))
            .with_table(
                OUTPUT,
                &OUTPUT_COLUMNS,
                vec![output_row("Leanne", 0), output_row("Leanne", 1)],
            );
        let (desk, _) = desk_with(store);

        let mut session = LabellingSession::new();
        session.choose_labeller(&desk, "Leanne").await.unwrap();
        assert_eq!(session.phase(), &SessionPhase::Done);
        assert!(session.current_record().is_none());

        let view = session.view();
        assert_eq!(view.phase, "done");
        assert_eq!(view.message.as_deref(), Some(FINISHED_MESSAGE));

        // Terminal: nothing else is processed
        assert!(matches!(
            session.select(&desk, Category::Hateful, Some("NIL")),
            Err(SessionError::Ended(_))
        ));
        assert!(matches!(session.submit(&desk, ts()).await, Err(SessionError::Ended(_))));
    }

    #[tokio::test]
    async fn test_incomplete_submission_writes_nothing() {
        let (desk, store) = desk_with(MemoryStore::new().with_table(INPUT, &INPUT_COLUMNS, input_rows(3)));
        let mut session = LabellingSession::new();
        session.choose_labeller(&desk, "Gabriel").await.unwrap();

        for category in Category::ALL.into_iter().filter(|c| *c != Category::SelfHarm) {
            session.select(&desk, category, Some("NIL")).unwrap();
        }
        let err = session.submit(&desk, ts()).await.unwrap_err();
        assert_eq!(
            err,
            SessionError::Incomplete {
                missing: vec![Category::SelfHarm]
            }
        );
        assert_eq!(store.row_count(OUTPUT), None);
        assert_eq!(session.phase(), &SessionPhase::Labelling { index: 0 });
        // Earlier selections survive a rejected submit
        assert!(session.selections().get(Category::Hateful).is_some());
    }

    #[tokio::test]
    async fn test_hate_speech_maps_to_level_two() {
        let (desk, store) = desk_with(MemoryStore::new().with_table(INPUT, &INPUT_COLUMNS, input_rows(1)));
        let mut session = LabellingSession::new();
        session.choose_labeller(&desk, "Jiayi").await.unwrap();

        select_all(&mut session, &desk, "NIL");
        session
            .select(&desk, Category::Hateful, Some("hate speech"))
            .unwrap();
        session.submit(&desk, ts()).await.unwrap();

        let rows = store.raw_rows(OUTPUT).unwrap();
        assert_eq!(rows[0][6], json!("level_2_hate_speech"));
        assert_eq!(session.phase(), &SessionPhase::Done);
    }

    #[tokio::test]
    async fn test_submit_requires_identity() {
        let (desk, _) = desk_with(MemoryStore::new().with_table(INPUT, &INPUT_COLUMNS, input_rows(1)));
        let mut session = LabellingSession::new();
        assert_eq!(
            session.submit(&desk, ts()).await.unwrap_err(),
            SessionError::IdentityNotSelected
        );
        assert_eq!(
            session.select(&desk, Category::Hateful, Some("NIL")).unwrap_err(),
            SessionError::IdentityNotSelected
        );
    }

    #[tokio::test]
    async fn test_empty_input_halts() {
        let (desk, _) = desk_with(MemoryStore::new().with_table(INPUT, &INPUT_COLUMNS, vec![]));
        let mut session = LabellingSession::new();
        session.choose_labeller(&desk, "Pradyu").await.unwrap();
        assert_eq!(
            session.phase(),
            &SessionPhase::Halted {
                reason: NO_DATA_MESSAGE.to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_missing_input_table_halts() {
        let (desk, _) = desk_with(MemoryStore::new());
        let mut session = LabellingSession::new();
        session.choose_labeller(&desk, "Pradyu").await.unwrap();
        assert_eq!(session.phase().name(), "halted");
        assert!(session.view().message.unwrap().contains("Failed to connect"));
    }

    #[tokio::test]
    async fn test_unknown_labeller_and_option_rejected() {
        let (desk, _) = desk_with(MemoryStore::new().with_table(INPUT, &INPUT_COLUMNS, input_rows(1)));
        let mut session = LabellingSession::new();
        assert!(matches!(
            session.choose_labeller(&desk, "Mallory").await,
            Err(SessionError::UnknownLabeller(_))
        ));
        assert_eq!(session.phase(), &SessionPhase::AwaitingIdentity);

        session.choose_labeller(&desk, "Jessica").await.unwrap();
        assert!(matches!(
            session.select(&desk, Category::Insults, Some("hate speech")),
            Err(SessionError::UnknownOption(_))
        ));
    }

    #[tokio::test]
    async fn test_switching_labeller_recomputes_index() {
        let store = MemoryStore::new()
            .with_table(INPUT, &INPUT_COLUMNS, input_rows(10))
            .with_table(OUTPUT, &OUTPUT_COLUMNS, vec![output_row("Shaun", 6)]);
        let (desk, _) = desk_with(store);

        let mut session = LabellingSession::new();
        session.choose_labeller(&desk, "Jessica").await.unwrap();
        select_all(&mut session, &desk, "NIL");
        session.submit(&desk, ts()).await.unwrap();
        assert_eq!(session.phase(), &SessionPhase::Labelling { index: 1 });

        // Same labeller again: position kept
        session.choose_labeller(&desk, "Jessica").await.unwrap();
        assert_eq!(session.phase(), &SessionPhase::Labelling { index: 1 });

        session.choose_labeller(&desk, "Shaun").await.unwrap();
        assert_eq!(session.phase(), &SessionPhase::Labelling { index: 7 });
        assert_eq!(session.view().labeller.as_deref(), Some("Shaun"));
    }

    #[tokio::test]
    async fn test_clearing_a_selection() {
        let (desk, _) = desk_with(MemoryStore::new().with_table(INPUT, &INPUT_COLUMNS, input_rows(1)));
        let mut session = LabellingSession::new();
        session.choose_labeller(&desk, "Jessica").await.unwrap();
        session.select(&desk, Category::Sexual, Some("NIL")).unwrap();
        assert_eq!(session.view().selections.get("sexual").map(String::as_str), Some("NIL"));
        session.select(&desk, Category::Sexual, None).unwrap();
        assert!(session.view().selections.is_empty());
    }
}
