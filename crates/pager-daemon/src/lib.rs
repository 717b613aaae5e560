//! Pager daemon
//!
//! Runs the escalation engine as a long-lived process: engine events arrive
//! as JSON lines on stdin, fired acknowledgement timeouts are fed back in,
//! and every decision the engine publishes is written out as a JSON line.

pub mod cli;
pub mod daemon;
pub mod input;

pub use cli::Args;
pub use daemon::{run, Daemon, RunSummary, StartupError};
pub use input::{parse_line, InputError};
