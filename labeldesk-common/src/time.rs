//! Timestamp utilities

use chrono::{Local, NaiveDateTime};

/// Current wall-clock time in the server's local zone, without offset
///
/// Submission timestamps are recorded as local naive times.
pub fn now_local() -> NaiveDateTime {
    Local::now().naive_local()
}

/// Format a submission timestamp as ISO 8601 with microseconds
pub fn format_submission_timestamp(ts: &NaiveDateTime) -> String {
    ts.format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_submission_timestamp_format() {
        let ts = NaiveDate::from_ymd_opt(2025, 3, 4)
            .unwrap()
            .and_hms_micro_opt(9, 5, 7, 42)
            .unwrap();
        assert_eq!(format_submission_timestamp(&ts), "2025-03-04T09:05:07.000042");
    }

    #[test]
    fn test_now_local_matches_local_clock() {
        let local = now_local();
        let drift = (Local::now().naive_local() - local).num_seconds().abs();
        assert!(drift < 5);
    }
}
