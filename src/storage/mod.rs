//! Durable storage for session records. One append-only JSONL file per
//! calendar day; lines are never rewritten after they land on disk.

use std::{
    future::Future,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use anyhow::Result;
use chrono::NaiveDate;
use fs4::tokio::AsyncFileExt;
use tokio::{
    fs::File,
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
};
use tracing::{debug, warn};

use crate::{tracker::session::SessionRecord, utils::time::date_to_partition_name};

/// Interface for abstracting storage of session records.
pub trait RecordStorage {
    /// Appends records to the partition file of the given day.
    fn append_records(
        &self,
        date: NaiveDate,
        records: Vec<SessionRecord>,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Retrieves every readable record of the given day. Malformed lines are skipped, they never
    /// abort the whole read.
    fn records_for(&self, date: NaiveDate) -> impl Future<Output = Result<Vec<SessionRecord>>> + Send;
}

/// The main realization of [RecordStorage], backed by a directory of day partition files.
pub struct JsonlRecordStorage {
    record_dir: PathBuf,
}

impl JsonlRecordStorage {
    pub fn new(record_dir: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&record_dir)?;

        Ok(Self { record_dir })
    }

    fn partition_path(&self, date: NaiveDate) -> PathBuf {
        self.record_dir.join(date_to_partition_name(date))
    }

    async fn read_all_inner(path: &Path) -> Result<Vec<SessionRecord>> {
        async fn extract(path: &Path) -> Result<Vec<SessionRecord>, std::io::Error> {
            debug!("Extracting {path:?}");
            let file = File::open(path).await?;
            file.lock_shared()?;
            let buffer = BufReader::new(file);
            let mut lines = buffer.lines();
            let mut records = vec![];
            while let Ok(Some(v)) = lines.next_line().await {
                match serde_json::from_str::<SessionRecord>(&v) {
                    Ok(v) => records.push(v),
                    Err(e) => {
                        // ignore illegal values. Might happen after shutdowns
                        warn!(
                            "During parsing in path {:?} found illegal json string {}:  {e}",
                            path, &v
                        )
                    }
                }
            }

            lines.into_inner().into_inner().unlock_async().await?;

            Ok(records)
        }

        match extract(path).await {
            Ok(s) => Ok(s),
            Err(e) => {
                if e.kind() == ErrorKind::NotFound {
                    Ok(vec![])
                } else {
                    Err(e)?
                }
            }
        }
    }

    async fn append_inner(path: &Path, records: &[SessionRecord]) -> Result<()> {
        let mut file = File::options()
            .append(true)
            .create(true)
            .open(path)
            .await?;

        // Semi-safe acquire-release for a file
        file.lock_exclusive()?;
        let result = Self::append_with_file(&mut file, records).await;
        file.unlock_async().await?;
        result
    }

    async fn append_with_file(file: &mut File, records: &[SessionRecord]) -> Result<()> {
        let mut buffer = Vec::<u8>::new();
        for record in records {
            serde_json::to_writer(&mut buffer, record)?;
            buffer.push(b'\n');
        }

        file.write_all(&buffer).await?;
        file.flush().await?;
        Ok(())
    }
}

impl RecordStorage for JsonlRecordStorage {
    async fn append_records(&self, date: NaiveDate, records: Vec<SessionRecord>) -> Result<()> {
        Self::append_inner(&self.partition_path(date), &records).await
    }

    async fn records_for(&self, date: NaiveDate) -> Result<Vec<SessionRecord>> {
        Self::read_all_inner(&self.partition_path(date)).await
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use anyhow::Result;
    use chrono::NaiveDate;
    use tempfile::tempdir;

    use crate::utils::time::date_to_partition_name;

    use super::{JsonlRecordStorage, RecordStorage, SessionRecord};

    fn test_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2018, 7, 4).unwrap()
    }

    fn record(exe: &str, start_ts: f64) -> SessionRecord {
        SessionRecord {
            exe: exe.into(),
            title: "window".into(),
            start_ts,
            end_ts: start_ts + 1.5,
            duration_sec: 1.5,
            words_typed: 2,
            backspaces: 1,
            keys_pressed: 10,
            mouse_distance: 12.5,
        }
    }

    #[tokio::test]
    async fn appended_records_can_be_read_back() -> Result<()> {
        let dir = tempdir()?;
        let storage = JsonlRecordStorage::new(dir.path().to_owned())?;

        storage
            .append_records(test_date(), vec![record("a", 0.0), record("b", 2.0)])
            .await?;
        storage.append_records(test_date(), vec![record("c", 4.0)]).await?;

        let stored = storage.records_for(test_date()).await?;
        assert_eq!(
            stored,
            vec![record("a", 0.0), record("b", 2.0), record("c", 4.0)]
        );
        Ok(())
    }

    #[tokio::test]
    async fn appends_never_rewrite_existing_lines() -> Result<()> {
        let dir = tempdir()?;
        let storage = JsonlRecordStorage::new(dir.path().to_owned())?;

        storage.append_records(test_date(), vec![record("a", 0.0)]).await?;
        let first = std::fs::read_to_string(dir.path().join(date_to_partition_name(test_date())))?;

        storage.append_records(test_date(), vec![record("b", 2.0)]).await?;
        let second = std::fs::read_to_string(dir.path().join(date_to_partition_name(test_date())))?;

        assert!(second.starts_with(&first));
        assert_eq!(second.lines().count(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn malformed_lines_are_skipped() -> Result<()> {
        let dir = tempdir()?;
        let storage = JsonlRecordStorage::new(dir.path().to_owned())?;

        storage.append_records(test_date(), vec![record("a", 0.0)]).await?;
        {
            let mut file = std::fs::OpenOptions::new()
                .append(true)
                .open(dir.path().join(date_to_partition_name(test_date())))?;
            file.write_all(b"{ not valid json\n")?;
        }
        storage.append_records(test_date(), vec![record("b", 2.0)]).await?;

        let stored = storage.records_for(test_date()).await?;
        assert_eq!(stored, vec![record("a", 0.0), record("b", 2.0)]);
        Ok(())
    }

    #[tokio::test]
    async fn missing_partition_reads_as_empty() -> Result<()> {
        let dir = tempdir()?;
        let storage = JsonlRecordStorage::new(dir.path().to_owned())?;

        assert!(storage.records_for(test_date()).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn partitions_are_separate_per_day() -> Result<()> {
        let dir = tempdir()?;
        let storage = JsonlRecordStorage::new(dir.path().to_owned())?;
        let next_day = test_date().succ_opt().unwrap();

        storage.append_records(test_date(), vec![record("a", 0.0)]).await?;
        storage.append_records(next_day, vec![record("b", 2.0)]).await?;

        assert_eq!(storage.records_for(test_date()).await?.len(), 1);
        assert_eq!(storage.records_for(next_day).await?.len(), 1);
        assert_eq!(std::fs::read_dir(dir.path())?.count(), 2);
        Ok(())
    }
}
