use std::{path::PathBuf, sync::Arc, time::Duration};

use ansi_term::Style;
use anyhow::Result;
use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::{
    aggregator::Aggregator,
    input_api::GenericInputListener,
    rules::RulePolicy,
    storage::{JsonlRecordStorage, RecordStorage},
    summary::summarize,
    tracker::{session::SessionRecord, SessionTracker},
    utils::clock::DefaultClock,
    window_api::GenericForegroundQuery,
};

pub mod args;
pub mod shutdown;

/// Period of moving completed sessions from the tracker into the aggregator.
const DRAIN_INTERVAL: Duration = Duration::from_secs(5);

pub struct DaemonConfig {
    pub data_dir: PathBuf,
    pub rules_path: PathBuf,
    pub poll_interval: Duration,
    pub flush_interval: Duration,
}

/// Represents the starting point for the daemon. Runs capture until Ctrl-C, then stops and
/// drains everything before printing the run summary.
pub async fn start_daemon(config: DaemonConfig) -> Result<()> {
    let policy = RulePolicy::load(&config.rules_path)?;
    if !policy.include_apps().is_empty() {
        info!("Collecting input metrics only for {:?}", policy.include_apps());
    }
    if !policy.exclude_apps().is_empty() {
        info!("Suppressing input metrics for {:?}", policy.exclude_apps());
    }

    let query = GenericForegroundQuery::new()?;
    let mut tracker = SessionTracker::new(
        Box::new(query),
        Box::new(GenericInputListener::new()),
        policy,
        Box::new(DefaultClock),
        config.poll_interval,
    );
    tracker.start()?;

    let storage = JsonlRecordStorage::new(config.data_dir.join("records"))?;
    let mut aggregator = Aggregator::new(storage, Arc::new(DefaultClock), config.flush_interval);

    let shutdown_token = CancellationToken::new();
    let mut session_log = Vec::new();

    println!("Workmeter running. Press Ctrl+C to finalize.");
    tokio::join!(
        shutdown::detect_shutdown(shutdown_token.clone()),
        async {
            loop {
                select! {
                    _ = shutdown_token.cancelled() => return,
                    _ = tokio::time::sleep(DRAIN_INTERVAL) => ()
                }
                drain_completed(&tracker, &aggregator, &mut session_log);
            }
        }
    );

    // Stop-and-drain: close the current session, hand everything to the aggregator and force a
    // final flush before the summary.
    tracker.stop().await;
    drain_completed(&tracker, &aggregator, &mut session_log);
    aggregator.stop().await?;

    print_summary(&session_log)
}

/// Moves completed sessions out of the tracker, remembering them for the end-of-run summary.
fn drain_completed<S: RecordStorage + Send + Sync + 'static>(
    tracker: &SessionTracker,
    aggregator: &Aggregator<S>,
    session_log: &mut Vec<SessionRecord>,
) {
    let drained: Vec<SessionRecord> = tracker
        .sessions_flush()
        .into_iter()
        .map(SessionRecord::from)
        .collect();
    if drained.is_empty() {
        return;
    }
    session_log.extend(drained.iter().cloned());
    aggregator.add_sessions(drained);
}

fn print_summary(records: &[SessionRecord]) -> Result<()> {
    let summary = summarize(records);
    println!("\n{}", Style::new().bold().paint("===== Session Summary ====="));
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

#[cfg(test)]
mod daemon_tests {
    use std::{sync::Arc, time::Duration};

    use anyhow::Result;
    use async_trait::async_trait;
    use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
    use tempfile::tempdir;
    use tokio::{sync::mpsc, time::Instant};

    use crate::{
        aggregator::Aggregator,
        input_api::{InputEvent, InputListener, KeyPress},
        rules::RulePolicy,
        storage::{JsonlRecordStorage, RecordStorage},
        summary::summarize,
        tracker::{session::SessionRecord, SessionTracker},
        utils::{clock::Clock, logging::TEST_LOGGING},
        window_api::{ForegroundWindow, MockForegroundQuery},
    };

    const TEST_START_DATE: NaiveDateTime =
        NaiveDateTime::new(NaiveDate::from_ymd_opt(2018, 7, 4).unwrap(), NaiveTime::MIN);

    fn test_items() -> Vec<ForegroundWindow> {
        vec![
            ForegroundWindow::new("code.exe", "lib.rs"),
            ForegroundWindow::new("code.exe", "lib.rs"),
            ForegroundWindow::new("chrome.exe", "docs"),
        ]
    }

    #[derive(Clone)]
    struct TestClock {
        start_time: DateTime<Utc>,
        reference: Instant,
    }

    #[async_trait]
    impl Clock for TestClock {
        fn time(&self) -> DateTime<Utc> {
            self.start_time + self.reference.elapsed()
        }

        fn instant(&self) -> Instant {
            Instant::now()
        }

        async fn sleep_until(&self, instant: tokio::time::Instant) {
            tokio::time::sleep_until(instant).await;
        }
    }

    /// Replays a scripted set of input events shortly after capture starts.
    struct ScriptedListener {
        events: Vec<InputEvent>,
    }

    impl InputListener for ScriptedListener {
        fn start(&mut self, events: mpsc::Sender<InputEvent>) -> Result<()> {
            let script = self.events.clone();
            std::thread::spawn(move || {
                // Give the poller time to open the first session.
                std::thread::sleep(Duration::from_millis(40));
                for event in script {
                    let _ = events.blocking_send(event);
                }
            });
            Ok(())
        }

        fn stop(&mut self) {}
    }

    /// Very simple smoke test to check if the whole capture-to-persistence pipeline is working
    /// properly.
    #[tokio::test]
    async fn smoke_test_capture_to_persistence() -> Result<()> {
        *TEST_LOGGING;
        let mut mock_query = MockForegroundQuery::new();
        let mut items = test_items().into_iter().cycle();
        mock_query
            .expect_foreground_window()
            .returning(move || Ok(items.next().unwrap()));

        let test_clock = TestClock {
            start_time: Utc.from_utc_datetime(&TEST_START_DATE),
            reference: Instant::now(),
        };

        let script = vec![
            InputEvent::Key(KeyPress::Other),
            InputEvent::Key(KeyPress::Other),
            InputEvent::Key(KeyPress::Other),
            InputEvent::Key(KeyPress::WordBoundary),
            InputEvent::Key(KeyPress::Other),
            InputEvent::Key(KeyPress::WordBoundary),
            InputEvent::PointerMove { x: 0.0, y: 0.0 },
            InputEvent::PointerMove { x: 3.0, y: 4.0 },
        ];

        let mut tracker = SessionTracker::new(
            Box::new(mock_query),
            Box::new(ScriptedListener { events: script }),
            RulePolicy::default(),
            Box::new(test_clock.clone()),
            Duration::from_millis(10),
        );

        let dir = tempdir()?;
        let storage = JsonlRecordStorage::new(dir.path().to_path_buf())?;
        let mut aggregator = Aggregator::new(
            storage,
            Arc::new(test_clock.clone()),
            Duration::from_secs(3600),
        );

        tracker.start()?;
        tokio::time::sleep(Duration::from_millis(120)).await;
        tracker.stop().await;

        let records: Vec<SessionRecord> = tracker
            .sessions_flush()
            .into_iter()
            .map(SessionRecord::from)
            .collect();
        assert!(!records.is_empty());
        for pair in records.windows(2) {
            // Completed sessions partition the elapsed time, boundaries meet exactly.
            assert!(pair[1].start_ts >= pair[0].end_ts);
        }

        let summary = summarize(&records);
        assert_eq!(summary.keys_pressed, 6);
        assert_eq!(summary.typing_words, 2);
        assert_eq!(summary.mouse_distance, 5.0);

        aggregator.add_sessions(records.clone());
        aggregator.stop().await?;

        let reader = JsonlRecordStorage::new(dir.path().to_path_buf())?;
        let stored = reader.records_for(test_clock.time().date_naive()).await?;
        assert_eq!(stored.len(), records.len());
        Ok(())
    }
}
