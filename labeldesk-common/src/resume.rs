//! Resume tracking: where a labeller picks up in the input table
//!
//! Progress is derived from the append-only output table. The next index is
//! one past the highest `attempt_id` the labeller has submitted, or zero when
//! there is none. Gaps and ordering are not checked.

use std::collections::HashSet;

use crate::models::ProgressMark;

/// Index of the next record `labeller` should see
///
/// Saturates instead of overflowing; an index past the input table means the
/// labeller is done.
pub fn next_index(labeller: &str, marks: &[ProgressMark]) -> usize {
    marks
        .iter()
        .filter(|m| m.labeller == labeller)
        .map(|m| m.attempt_id)
        .max()
        .map_or(0, |last| last.saturating_add(1))
}

/// Attempt ids submitted more than once by `labeller`, ascending
///
/// Rapid double submission from two sessions can produce these; they do not
/// affect [`next_index`].
pub fn duplicate_attempts(labeller: &str, marks: &[ProgressMark]) -> Vec<usize> {
    let mut seen = HashSet::new();
    let mut duplicates: Vec<usize> = marks
        .iter()
        .filter(|m| m.labeller == labeller)
        .filter(|m| !seen.insert(m.attempt_id))
        .map(|m| m.attempt_id)
        .collect();
    duplicates.sort_unstable();
    duplicates.dedup();
    duplicates
}
