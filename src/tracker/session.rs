use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{utils::time::epoch_seconds, window_api::ForegroundWindow};

/// Input-activity counters owned by exactly one session at a time. Words are counted through
/// terminator keystrokes, which keeps results comparable with historical data.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct InputStats {
    pub words_typed: u64,
    pub backspaces: u64,
    pub keys_pressed: u64,
    /// Cumulative Euclidean pointer travel in pixels.
    pub mouse_distance: f64,
}

/// A contiguous interval of foreground focus attributed to one `(exe, title)` pair.
/// `last_ts >= start_ts` holds for the whole lifetime of a session.
#[derive(Debug, Clone, PartialEq)]
pub struct AppSession {
    pub exe: Arc<str>,
    pub title: Arc<str>,
    pub start_ts: DateTime<Utc>,
    pub last_ts: DateTime<Utc>,
    pub input: InputStats,
}

impl AppSession {
    pub fn open(window: &ForegroundWindow, now: DateTime<Utc>) -> Self {
        Self {
            exe: window.exe.clone(),
            title: window.title.clone(),
            start_ts: now,
            last_ts: now,
            input: InputStats::default(),
        }
    }

    pub fn matches(&self, window: &ForegroundWindow) -> bool {
        self.exe == window.exe && self.title == window.title
    }
}

/// The entity stored on disk, one JSON object per line of a day partition file. Timestamps are
/// float epoch seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub exe: Arc<str>,
    pub title: Arc<str>,
    pub start_ts: f64,
    pub end_ts: f64,
    pub duration_sec: f64,
    pub words_typed: u64,
    pub backspaces: u64,
    pub keys_pressed: u64,
    pub mouse_distance: f64,
}

impl From<AppSession> for SessionRecord {
    fn from(session: AppSession) -> Self {
        let start_ts = epoch_seconds(session.start_ts);
        let end_ts = epoch_seconds(session.last_ts);
        Self {
            exe: session.exe,
            title: session.title,
            start_ts,
            end_ts,
            duration_sec: (end_ts - start_ts).max(0.0),
            words_typed: session.input.words_typed,
            backspaces: session.input.backspaces,
            keys_pressed: session.input.keys_pressed,
            mouse_distance: session.input.mouse_distance,
        }
    }
}
