use std::path::PathBuf;

use clap::Parser;
use tracing::level_filters::LevelFilter;

#[derive(Parser)]
#[command(name = "workmeter", version)]
#[command(about = "Local activity-session tracker with per-app input metrics")]
pub struct DaemonArgs {
    /// Rules file with [include_apps] and [exclude_apps] sections.
    #[arg(long, default_value = "rules.txt")]
    pub rules: PathBuf,
    #[arg(
        long,
        help = "Application directory. By default tries to save into $XDG_STATE_HOME or $HOME/.local/state"
    )]
    pub dir: Option<PathBuf>,
    /// Flush interval of the aggregator in seconds.
    #[arg(long = "flush-sec", default_value_t = 60)]
    pub flush_sec: u64,
    /// Foreground poll interval in milliseconds.
    #[arg(long = "poll-ms", default_value_t = 500)]
    pub poll_ms: u64,
    /// This option is for debugging purposes only.
    #[arg(long = "log-console")]
    pub log_console: bool,
    #[arg(long = "log-filter")]
    pub log: Option<LevelFilter>,
}
