//! Row models for the input and output tables

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::taxonomy::Category;
use crate::{Error, Result};

/// One table row keyed by header name
pub type StoreRow = BTreeMap<String, Value>;

/// Columns every input-table row must expose
pub const INPUT_COLUMNS: [&str; 3] = ["prompt_id", "original_id", "text"];

/// Output-table column order
pub const OUTPUT_COLUMNS: [&str; 12] = [
    "timestamp",
    "labeller",
    "prompt_id",
    "attempt_id",
    "original_id",
    "text",
    "hateful",
    "insults",
    "sexual",
    "physical_violence",
    "self_harm",
    "all_other_misconduct",
];

/// A unit of text to be judged, read from the input table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub prompt_id: Value,
    pub original_id: Value,
    pub text: String,
}

impl Record {
    /// Build a record from an input-table row
    pub fn from_row(row: &StoreRow) -> Result<Self> {
        let column = |name: &str| {
            row.get(name)
                .cloned()
                .ok_or_else(|| Error::Store(format!("Input table has no '{}' column", name)))
        };

        Ok(Self {
            prompt_id: column("prompt_id")?,
            original_id: column("original_id")?,
            text: cell_to_string(&column("text")?),
        })
    }

    /// Row in [`INPUT_COLUMNS`] order
    pub fn to_row(&self) -> Vec<Value> {
        vec![
            self.prompt_id.clone(),
            self.original_id.clone(),
            Value::String(self.text.clone()),
        ]
    }
}

/// A submitted judgment, appended to the output table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelledEntry {
    pub timestamp: String,
    pub labeller: String,
    pub prompt_id: Value,
    /// Position of the record in the input table at labelling time
    pub attempt_id: usize,
    pub original_id: Value,
    pub text: String,
    /// Canonical codes in [`Category::ALL`] order
    pub codes: [String; 6],
}

impl LabelledEntry {
    pub fn code(&self, category: Category) -> &str {
        &self.codes[category.position()]
    }

    /// Row in [`OUTPUT_COLUMNS`] order
    pub fn to_row(&self) -> Vec<Value> {
        let mut row = vec![
            Value::String(self.timestamp.clone()),
            Value::String(self.labeller.clone()),
            self.prompt_id.clone(),
            Value::from(self.attempt_id as u64),
            self.original_id.clone(),
            Value::String(self.text.clone()),
        ];
        row.extend(self.codes.iter().cloned().map(Value::String));
        row
    }
}

/// The part of an output row the resume tracker needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressMark {
    pub labeller: String,
    pub attempt_id: usize,
}

impl ProgressMark {
    pub fn new(labeller: impl Into<String>, attempt_id: usize) -> Self {
        Self {
            labeller: labeller.into(),
            attempt_id,
        }
    }

    /// Extract labeller and attempt id from an output row
    ///
    /// Returns `None` when either is missing or the attempt id is not a
    /// non-negative integer.
    pub fn from_row(row: &StoreRow) -> Option<Self> {
        let labeller = row.get("labeller").map(cell_to_string)?;
        let attempt_id = row.get("attempt_id").and_then(parse_index)?;
        Some(Self {
            labeller,
            attempt_id,
        })
    }
}

/// Render a cell as display text
pub fn cell_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
            _ => n.to_string(),
        },
        other => other.to_string(),
    }
}

/// Largest attempt id accepted from a cell
///
/// Anything above is treated as a corrupt cell, as are floats past the range
/// where every integer is exactly representable.
pub const MAX_ATTEMPT_ID: u64 = u32::MAX as u64;

/// Parse a non-negative integer index from a cell
///
/// Stores hand back integers as numbers, integral floats or text.
pub fn parse_index(value: &Value) -> Option<usize> {
    let index = match value {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().and_then(integral)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<u64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(integral))
        }
        _ => None,
    }?;

    if index > MAX_ATTEMPT_ID {
        return None;
    }
    usize::try_from(index).ok()
}

fn integral(f: f64) -> Option<u64> {
    (f >= 0.0 && f.fract() == 0.0 && f <= MAX_ATTEMPT_ID as f64).then_some(f as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(pairs: &[(&str, Value)]) -> StoreRow {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_record_from_row() {
        let r = row(&[
            ("prompt_id", json!(17)),
            ("original_id", json!("abc-1")),
            ("text", json!("hello there")),
            ("extra", json!("ignored")),
        ]);
        let record = Record::from_row(&r).unwrap();
        assert_eq!(record.prompt_id, json!(17));
        assert_eq!(record.original_id, json!("abc-1"));
        assert_eq!(record.text, "hello there");
    }

    #[test]
    fn test_record_missing_column_is_error() {
        let r = row(&[("prompt_id", json!(1)), ("text", json!("x"))]);
        let err = Record::from_row(&r).unwrap_err();
        assert!(err.to_string().contains("original_id"));
    }

    #[test]
    fn test_entry_row_follows_output_columns() {
        let entry = LabelledEntry {
            timestamp: "2025-01-01T00:00:00.000000".into(),
            labeller: "Jessica".into(),
            prompt_id: json!(5),
            attempt_id: 3,
            original_id: json!("o-5"),
            text: "some text".into(),
            codes: [
                "level_2_hate_speech".into(),
                "FALSE".into(),
                "FALSE".into(),
                "FALSE".into(),
                "FALSE".into(),
                "FALSE".into(),
            ],
        };

        let cells = entry.to_row();
        assert_eq!(cells.len(), OUTPUT_COLUMNS.len());
        assert_eq!(cells[1], json!("Jessica"));
        assert_eq!(cells[3], json!(3));
        assert_eq!(cells[6], json!("level_2_hate_speech"));
        assert_eq!(entry.code(Category::Hateful), "level_2_hate_speech");
        assert_eq!(entry.code(Category::AllOtherMisconduct), "FALSE");
    }

    #[test]
    fn test_progress_mark_parsing() {
        let mark = ProgressMark::from_row(&row(&[
            ("labeller", json!("Shaun")),
            ("attempt_id", json!(4)),
        ]));
        assert_eq!(mark, Some(ProgressMark::new("Shaun", 4)));

        let text_id = ProgressMark::from_row(&row(&[
            ("labeller", json!("Shaun")),
            ("attempt_id", json!("12")),
        ]));
        assert_eq!(text_id.map(|m| m.attempt_id), Some(12));

        assert!(ProgressMark::from_row(&row(&[("labeller", json!("Shaun"))])).is_none());
        assert!(ProgressMark::from_row(&row(&[
            ("labeller", json!("Shaun")),
            ("attempt_id", json!("")),
        ]))
        .is_none());
    }

    #[test]
    fn test_parse_index_variants() {
        assert_eq!(parse_index(&json!(0)), Some(0));
        assert_eq!(parse_index(&json!(7.0)), Some(7));
        assert_eq!(parse_index(&json!(7.5)), None);
        assert_eq!(parse_index(&json!(-1)), None);
        assert_eq!(parse_index(&json!(" 9 ")), Some(9));
        assert_eq!(parse_index(&json!(null)), None);
    }

    #[test]
    fn test_parse_index_rejects_out_of_range() {
        assert_eq!(parse_index(&json!("1e30")), None);
        assert_eq!(parse_index(&json!(1e30)), None);
        assert_eq!(parse_index(&json!(u64::MAX)), None);
        assert_eq!(parse_index(&json!(u64::MAX.to_string())), None);
        assert_eq!(parse_index(&json!(MAX_ATTEMPT_ID)), Some(MAX_ATTEMPT_ID as usize));
        assert_eq!(parse_index(&json!(MAX_ATTEMPT_ID + 1)), None);
    }

    #[test]
    fn test_progress_mark_with_huge_attempt_id_is_skipped() {
        let huge = ProgressMark::from_row(&row(&[
            ("labeller", json!("Shaun")),
            ("attempt_id", json!("1e30")),
        ]));
        assert!(huge.is_none());
    }

    #[test]
    fn test_cell_to_string() {
        assert_eq!(cell_to_string(&json!(null)), "");
        assert_eq!(cell_to_string(&json!(12)), "12");
        assert_eq!(cell_to_string(&json!(12.0)), "12");
        assert_eq!(cell_to_string(&json!("x")), "x");
    }
}
