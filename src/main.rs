use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use workmeter::{
    daemon::{args::DaemonArgs, start_daemon, DaemonConfig},
    utils::{
        dir::create_application_default_path, logging::enable_logging,
        runtime::single_thread_runtime,
    },
};

fn main() -> Result<()> {
    let args = DaemonArgs::parse();

    let data_dir = args.dir.clone().map_or_else(create_application_default_path, Ok)?;
    enable_logging(&data_dir, args.log, args.log_console)?;

    single_thread_runtime()?.block_on(start_daemon(DaemonConfig {
        data_dir,
        rules_path: args.rules,
        poll_interval: Duration::from_millis(args.poll_ms),
        flush_interval: Duration::from_secs(args.flush_sec),
    }))
}
