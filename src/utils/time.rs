use chrono::{DateTime, NaiveDate, Utc};

/// This is the standard way of naming a day partition file in workmeter.
pub fn date_to_partition_name(date: NaiveDate) -> String {
    format!("metrics-{}.jsonl", date.format("%Y%m%d"))
}

/// Converts a moment into float epoch seconds, the timestamp representation used in persisted
/// records.
pub fn epoch_seconds(moment: DateTime<Utc>) -> f64 {
    moment.timestamp_micros() as f64 / 1_000_000.0
}
