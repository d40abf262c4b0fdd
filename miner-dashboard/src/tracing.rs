//! Logging setup for the dashboard binaries.
//!
//! The daemon calls [`init_journald_or_stdout`] once at startup. Everything
//! else pulls the event macros in through `use crate::tracing::prelude::*`.

use std::env;
use time::{macros::format_description, OffsetDateTime};
use tracing_subscriber::{
    filter::{EnvFilter, LevelFilter},
    fmt::{format::Writer, time::FormatTime},
    prelude::*,
};

pub mod prelude {
    #[allow(unused_imports)]
    pub use tracing::{debug, error, info, trace, warn};
}

use prelude::*;

/// Install the global subscriber.
///
/// Under systemd (`JOURNAL_STREAM` set) events go to journald. Elsewhere, or
/// if the journal socket is unavailable, they go to stdout filtered by
/// `RUST_LOG` with `info` as the floor.
pub fn init_journald_or_stdout() {
    if env::var_os("JOURNAL_STREAM").is_none() {
        init_stdout();
        return;
    }

    match tracing_journald::layer() {
        Ok(layer) => tracing_subscriber::registry().with(layer).init(),
        Err(e) => {
            init_stdout();
            error!(error = %e, "Journald unavailable, logging to stdout.");
        }
    }
}

/// Install a stdout subscriber for short-lived tools such as the CLI.
///
/// Quieter than the daemon: only warnings unless `RUST_LOG` says otherwise.
pub fn init_cli() {
    install_fmt(LevelFilter::WARN);
}

fn init_stdout() {
    install_fmt(LevelFilter::INFO);
}

fn install_fmt(floor: LevelFilter) {
    let filter = EnvFilter::builder()
        .with_default_directive(floor.into())
        .with_env_var("RUST_LOG")
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_timer(ClockTime))
        .init();
}

// Local wall-clock time to the second; the dashboard's own API timestamps
// are UTC, but an operator tailing the log reads local time.
struct ClockTime;

impl FormatTime for ClockTime {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
        let formatted = now
            .format(format_description!("[hour]:[minute]:[second]"))
            .map_err(|_| std::fmt::Error)?;
        w.write_str(&formatted)
    }
}
