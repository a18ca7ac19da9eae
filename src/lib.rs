//! Local activity-session tracker. Continuously attributes foreground focus
//! to per-application sessions, accumulates input-activity counters under a
//! configurable rule policy, and appends completed sessions to
//! day-partitioned JSONL logs.
//!

pub mod aggregator;
pub mod daemon;
pub mod input_api;
pub mod rules;
pub mod storage;
pub mod summary;
pub mod tracker;
pub mod utils;
pub mod window_api;
