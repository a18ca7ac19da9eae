//! The session tracker is the convergence point of the capture pipeline. A
//! foreground poll loop and an input event loop both mutate one capture state
//! behind a single lock; completed sessions queue up until a caller takes
//! ownership of them through [SessionTracker::sessions_flush].

pub mod session;

use std::{
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use anyhow::{bail, Result};
use session::AppSession;
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{
    input_api::{InputEvent, InputListener, KeyPress, EVENT_QUEUE_CAPACITY},
    rules::RulePolicy,
    utils::clock::Clock,
    window_api::{ForegroundQuery, ForegroundWindow},
};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Idle,
    Running,
    Stopped,
}

struct CaptureState {
    current: Option<AppSession>,
    completed: Vec<AppSession>,
    /// Policy verdict for the current session's exe. Refreshed on every rotation tick.
    metrics_allowed: bool,
    /// Previously observed pointer position. Survives rotation so travel spans session
    /// boundaries without a gap.
    last_pointer: Option<(f64, f64)>,
}

impl Default for CaptureState {
    fn default() -> Self {
        Self {
            current: None,
            completed: Vec::new(),
            metrics_allowed: true,
            last_pointer: None,
        }
    }
}

struct TrackerShared {
    policy: RulePolicy,
    clock: Box<dyn Clock>,
    state: Mutex<CaptureState>,
}

impl TrackerShared {
    fn lock(&self) -> MutexGuard<'_, CaptureState> {
        self.state.lock().expect("capture state lock poisoned")
    }

    /// Executes the rotation algorithm for one poll tick: close the current session when the
    /// foreground identity changed, open a new one when none exists, extend it otherwise.
    fn rotate(&self, window: ForegroundWindow) {
        let now = self.clock.time();
        let mut state = self.lock();

        if let Some(current) = state.current.take() {
            if current.matches(&window) {
                state.current = Some(current);
            } else {
                let mut closed = current;
                closed.last_ts = now;
                state.completed.push(closed);
            }
        }

        match state.current.as_mut() {
            Some(current) => current.last_ts = now,
            None => state.current = Some(AppSession::open(&window, now)),
        }

        state.metrics_allowed = self.policy.is_app_metrics_allowed(&window.exe);
    }

    /// Applies one input event. Liveness (`last_ts`) advances regardless of the policy verdict,
    /// counters only when collection is allowed. Events with no current session are dropped
    /// except for establishing the pointer baseline.
    fn apply_input(&self, event: InputEvent) {
        let now = self.clock.time();
        let mut state = self.lock();
        let allowed = state.metrics_allowed;

        match event {
            InputEvent::Key(key) => {
                let Some(current) = state.current.as_mut() else {
                    return;
                };
                current.last_ts = now;
                if allowed {
                    current.input.keys_pressed += 1;
                    match key {
                        KeyPress::Backspace => current.input.backspaces += 1,
                        KeyPress::WordBoundary => current.input.words_typed += 1,
                        KeyPress::Other => {}
                    }
                }
            }
            InputEvent::PointerMove { x, y } => {
                let previous = state.last_pointer.replace((x, y));
                let Some(current) = state.current.as_mut() else {
                    return;
                };
                current.last_ts = now;
                if allowed {
                    if let Some((px, py)) = previous {
                        current.input.mouse_distance += (x - px).hypot(y - py);
                    }
                }
            }
        }
    }

    fn close_current(&self) {
        let now = self.clock.time();
        let mut state = self.lock();
        if let Some(mut current) = state.current.take() {
            current.last_ts = now;
            state.completed.push(current);
        }
    }

    fn take_completed(&self) -> Vec<AppSession> {
        std::mem::take(&mut self.lock().completed)
    }
}

/// Tracks the application holding foreground focus and its input activity.
///
/// Lifecycle is `Idle -> Running -> Stopped`: [SessionTracker::start] spawns the poll and event
/// loops, [SessionTracker::stop] halts them and closes the current session. Completed sessions
/// stay queued until [SessionTracker::sessions_flush] hands them to the caller.
pub struct SessionTracker {
    shared: Arc<TrackerShared>,
    poll_interval: Duration,
    shutdown: CancellationToken,
    lifecycle: Lifecycle,
    query: Option<Box<dyn ForegroundQuery>>,
    listener: Box<dyn InputListener>,
    tasks: Vec<JoinHandle<()>>,
}

impl SessionTracker {
    pub fn new(
        query: Box<dyn ForegroundQuery>,
        listener: Box<dyn InputListener>,
        policy: RulePolicy,
        clock: Box<dyn Clock>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            shared: Arc::new(TrackerShared {
                policy,
                clock,
                state: Mutex::new(CaptureState::default()),
            }),
            poll_interval,
            shutdown: CancellationToken::new(),
            lifecycle: Lifecycle::Idle,
            query: Some(query),
            listener,
            tasks: Vec::new(),
        }
    }

    /// Launches the foreground poll loop and the input event loop. A listener that fails to
    /// start degrades the tracker to poll-only operation instead of failing it.
    pub fn start(&mut self) -> Result<()> {
        if self.lifecycle != Lifecycle::Idle {
            bail!("Tracker can only be started from the idle state");
        }
        let Some(mut query) = self.query.take() else {
            bail!("Tracker query was already consumed");
        };

        let (sender, mut receiver) = mpsc::channel::<InputEvent>(EVENT_QUEUE_CAPACITY);

        if let Err(e) = self.listener.start(sender) {
            warn!("Input listener failed to start, continuing without input metrics {e:?}");
        }

        let shared = self.shared.clone();
        let shutdown = self.shutdown.clone();
        let poll_interval = self.poll_interval;
        self.tasks.push(tokio::spawn(async move {
            let mut poll_point = shared.clock.instant();
            loop {
                poll_point += poll_interval;

                let window = query.foreground_window().unwrap_or_else(|e| {
                    debug!("Foreground query failed, falling back to empty identity {e:?}");
                    ForegroundWindow::unknown()
                });
                shared.rotate(window);

                tokio::select! {
                    _ = shutdown.cancelled() => return,
                    _ = shared.clock.sleep_until(poll_point) => ()
                }
            }
        }));

        let shared = self.shared.clone();
        let shutdown = self.shutdown.clone();
        self.tasks.push(tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => return,
                    event = receiver.recv() => match event {
                        Some(event) => shared.apply_input(event),
                        None => return,
                    }
                }
            }
        }));

        self.lifecycle = Lifecycle::Running;
        Ok(())
    }

    /// Halts both loops and the OS listener, then closes the current session and appends it to
    /// the completed queue. Stopping an idle or already stopped tracker is a no-op.
    pub async fn stop(&mut self) {
        if self.lifecycle != Lifecycle::Running {
            return;
        }
        self.lifecycle = Lifecycle::Stopped;

        self.shutdown.cancel();
        self.listener.stop();
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                warn!("Tracker task ended abnormally {e:?}");
            }
        }

        self.shared.close_current();
    }

    /// Atomically swaps out the completed-session queue and returns it. Safe to call while
    /// capture is active; returns an empty vec when nothing is pending.
    pub fn sessions_flush(&self) -> Vec<AppSession> {
        self.shared.take_completed()
    }
}
