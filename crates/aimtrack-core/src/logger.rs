//! Stderr logger for the tracker binaries.
//!
//! Lines look like `[   1.204s  INFO camera-capture capture] connected`:
//! uptime, level, the emitting thread and the last path segment of the log
//! target. Acquisition and targeting each run on a named worker thread, so
//! the thread column tells the two loops apart while the target column says
//! which stage spoke.

use std::io::Write;
use std::sync::OnceLock;
use std::time::Instant;

use log::{Level, LevelFilter, Log, Metadata, Record};

#[cfg(feature = "tracing")]
use tracing_subscriber::fmt::format::FmtSpan;
#[cfg(feature = "tracing")]
use tracing_subscriber::util::SubscriberInitExt;
#[cfg(feature = "tracing")]
use tracing_subscriber::{fmt, EnvFilter};

struct StderrLogger {
    level: LevelFilter,
    started: Instant,
}

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let current = std::thread::current();
        let line = format_line(
            self.started.elapsed().as_secs_f64(),
            record.level(),
            current.name().unwrap_or("main"),
            record.target(),
            record.args(),
        );
        let _ = writeln!(std::io::stderr().lock(), "{line}");
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

/// `aimtrack_pipeline::capture` -> `capture`.
fn stage_name(target: &str) -> &str {
    target.rsplit("::").next().unwrap_or(target)
}

fn format_line(
    elapsed: f64,
    level: Level,
    thread: &str,
    target: &str,
    message: &dyn std::fmt::Display,
) -> String {
    format!(
        "[{:8.3}s {:>5} {} {}] {}",
        elapsed,
        level,
        thread,
        stage_name(target),
        message
    )
}

static LOGGER: OnceLock<StderrLogger> = OnceLock::new();

/// Install the stderr logger with the provided level filter.
///
/// Calling this more than once is a no-op after the first successful
/// initialization.
pub fn init_with_level(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    if LOGGER.get().is_none() {
        let logger = LOGGER.get_or_init(|| StderrLogger {
            level,
            started: Instant::now(),
        });
        log::set_logger(logger)?;
        log::set_max_level(level);
    }
    Ok(())
}

/// Install a `tracing` fmt subscriber filtered by `RUST_LOG` (default `info`).
#[cfg(feature = "tracing")]
pub fn init_tracing(json: bool) {
    init_tracing_with_level(json, LevelFilter::Info);
}

/// Like [`init_tracing`], with `level` as the filter when `RUST_LOG` is unset.
#[cfg(feature = "tracing")]
pub fn init_tracing_with_level(json: bool, level: LevelFilter) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(level)));
    if json {
        let _ = fmt()
            .with_env_filter(filter)
            .with_span_events(FmtSpan::CLOSE)
            .with_thread_names(true)
            .json()
            .flatten_event(true)
            .finish()
            .try_init();
    } else {
        let _ = fmt()
            .with_env_filter(filter)
            .with_span_events(FmtSpan::CLOSE)
            .with_thread_names(true)
            .with_timer(fmt::time::Uptime::default())
            .finish()
            .try_init();
    }
}

#[cfg(feature = "tracing")]
fn default_directive(level: LevelFilter) -> String {
    level.as_str().to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_carries_thread_and_stage() {
        let line = format_line(
            1.2044,
            Level::Info,
            "camera-capture",
            "aimtrack_pipeline::capture",
            &"connected",
        );
        assert_eq!(line, "[   1.204s  INFO camera-capture capture] connected");
    }

    #[test]
    fn bare_target_is_kept() {
        assert_eq!(stage_name("aimtrack"), "aimtrack");
        assert_eq!(stage_name("aimtrack_target::scorer"), "scorer");
    }

    #[cfg(feature = "tracing")]
    #[test]
    fn cli_level_becomes_the_default_directive() {
        assert_eq!(default_directive(LevelFilter::Debug), "debug");
        assert_eq!(default_directive(LevelFilter::Off), "off");
        assert!(EnvFilter::try_new(default_directive(LevelFilter::Warn)).is_ok());
    }
}
