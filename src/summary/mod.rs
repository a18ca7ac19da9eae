//! Aggregate statistics over a collection of session records.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::tracker::session::SessionRecord;

/// Totals for a set of sessions. `app_switches` is a session-count proxy, not a count of
/// distinct application transitions.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct ActivitySummary {
    pub total_time_sec: f64,
    pub typing_words: u64,
    pub wpm: f64,
    pub backspaces: u64,
    pub keys_pressed: u64,
    pub mouse_distance: f64,
    pub app_switches: u64,
    pub time_by_app_sec: BTreeMap<String, f64>,
}

/// Pure reduction of session records into totals. Deterministic, an empty input yields the
/// all-zero summary.
pub fn summarize(records: &[SessionRecord]) -> ActivitySummary {
    let mut summary = ActivitySummary::default();

    for record in records {
        summary.total_time_sec += record.duration_sec;
        summary.typing_words += record.words_typed;
        summary.backspaces += record.backspaces;
        summary.keys_pressed += record.keys_pressed;
        summary.mouse_distance += record.mouse_distance;
        *summary
            .time_by_app_sec
            .entry(record.exe.to_string())
            .or_insert(0.0) += record.duration_sec;
    }

    summary.app_switches = records.len().saturating_sub(1) as u64;
    summary.wpm = if summary.total_time_sec > 0.0 {
        summary.typing_words as f64 / (summary.total_time_sec / 60.0)
    } else {
        0.0
    };

    summary
}

#[cfg(test)]
mod tests {
    use crate::tracker::session::SessionRecord;

    use super::summarize;

    fn record(exe: &str, duration_sec: f64, words_typed: u64) -> SessionRecord {
        SessionRecord {
            exe: exe.into(),
            title: "window".into(),
            start_ts: 0.0,
            end_ts: duration_sec,
            duration_sec,
            words_typed,
            backspaces: 1,
            keys_pressed: 5,
            mouse_distance: 2.5,
        }
    }

    #[test]
    fn empty_input_yields_all_zero_summary() {
        let summary = summarize(&[]);

        assert_eq!(summary.total_time_sec, 0.0);
        assert_eq!(summary.wpm, 0.0);
        assert_eq!(summary.app_switches, 0);
        assert!(summary.time_by_app_sec.is_empty());
    }

    #[test]
    fn totals_and_wpm_are_computed_over_all_records() {
        let records = [
            record("code.exe", 60.0, 30),
            record("code.exe", 60.0, 10),
            record("chrome.exe", 120.0, 20),
        ];

        let summary = summarize(&records);

        assert_eq!(summary.total_time_sec, 240.0);
        assert_eq!(summary.typing_words, 60);
        // 60 words over 4 minutes.
        assert_eq!(summary.wpm, 15.0);
        assert_eq!(summary.backspaces, 3);
        assert_eq!(summary.keys_pressed, 15);
        assert_eq!(summary.mouse_distance, 7.5);
        assert_eq!(summary.app_switches, 2);
        assert_eq!(summary.time_by_app_sec["code.exe"], 120.0);
        assert_eq!(summary.time_by_app_sec["chrome.exe"], 120.0);
    }

    #[test]
    fn summarize_is_deterministic_on_repeated_calls() {
        let records = [record("code.exe", 30.0, 5), record("nvim", 15.0, 2)];

        assert_eq!(summarize(&records), summarize(&records));
    }

    #[test]
    fn single_record_counts_zero_switches() {
        let summary = summarize(&[record("code.exe", 10.0, 1)]);
        assert_eq!(summary.app_switches, 0);
    }
}
