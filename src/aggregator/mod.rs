//! Buffers completed session records and periodically persists them.
//! Records are appended to the partition file of the day the flush happens
//! on, so a session spanning midnight lands in the later partition.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use anyhow::Result;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::{storage::RecordStorage, tracker::session::SessionRecord, utils::clock::Clock};

pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(60);

/// Accepts batches of completed session records and flushes them to storage on a fixed
/// interval. [Aggregator::stop] drains whatever is still queued, so every record added before
/// it returns is persisted at least once.
pub struct Aggregator<S: RecordStorage + Send + Sync + 'static> {
    queue: Arc<Mutex<Vec<SessionRecord>>>,
    storage: Arc<S>,
    clock: Arc<dyn Clock>,
    shutdown: CancellationToken,
    flush_task: Option<JoinHandle<()>>,
}

impl<S: RecordStorage + Send + Sync + 'static> Aggregator<S> {
    /// Creates the aggregator and spawns its periodic flush loop.
    pub fn new(storage: S, clock: Arc<dyn Clock>, flush_interval: Duration) -> Self {
        let queue = Arc::new(Mutex::new(Vec::new()));
        let storage = Arc::new(storage);
        let shutdown = CancellationToken::new();

        let flush_task = {
            let queue = queue.clone();
            let storage = storage.clone();
            let clock = clock.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                let mut flush_point = clock.instant();
                loop {
                    flush_point += flush_interval;
                    tokio::select! {
                        _ = shutdown.cancelled() => return,
                        _ = clock.sleep_until(flush_point) => ()
                    }

                    if let Err(e) = flush_pending(&*storage, &*clock, &queue).await {
                        error!("Failed to flush session records {e:?}");
                    }
                }
            })
        };

        Self {
            queue,
            storage,
            clock,
            shutdown,
            flush_task: Some(flush_task),
        }
    }

    /// Appends a batch to the in-memory queue. Always succeeds for well-formed input.
    pub fn add_sessions(&self, batch: impl IntoIterator<Item = SessionRecord>) {
        self.queue
            .lock()
            .expect("aggregator queue lock poisoned")
            .extend(batch);
    }

    /// Signals the flush loop to end, waits for in-flight work and performs one final
    /// synchronous flush.
    pub async fn stop(&mut self) -> Result<()> {
        self.shutdown.cancel();
        if let Some(task) = self.flush_task.take() {
            let _ = task.await;
        }
        flush_pending(&*self.storage, &*self.clock, &self.queue).await
    }
}

/// Swaps the queue under its lock, then writes outside of it. Touches no file when there is
/// nothing to flush.
async fn flush_pending<S: RecordStorage>(
    storage: &S,
    clock: &dyn Clock,
    queue: &Mutex<Vec<SessionRecord>>,
) -> Result<()> {
    let pending = std::mem::take(&mut *queue.lock().expect("aggregator queue lock poisoned"));
    if pending.is_empty() {
        return Ok(());
    }

    let date = clock.time().date_naive();
    debug!("Flushing {} session records into {date} partition", pending.len());
    storage.append_records(date, pending).await
}
