//! Pager daemon binary
//!
//! # Usage
//!
//! ```bash
//! # Page from a TOML policy, keeping alert status in memory
//! pager-daemon --policy policy.toml < events.jsonl
//!
//! # Persist status and shorten the acknowledgement window
//! PAGER_STATE_PATH=/var/lib/pager/status.json pager-daemon --policy policy.yaml --ack-timeout-secs 300
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{stdin, stdout, BufReader};

use pager_daemon::{run, Args, Daemon};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr; stdout carries pager events.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pager_core=info,pager_daemon=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = args.resolve().context("Invalid configuration")?;
    let daemon = Daemon::start(&config).context("Failed to start pager daemon")?;

    let mut out = stdout();
    let summary = run(daemon, BufReader::new(stdin()), &mut out).await?;

    tracing::info!(
        routed = summary.routed,
        rejected = summary.rejected,
        published = summary.published,
        "Input exhausted"
    );
    Ok(())
}
