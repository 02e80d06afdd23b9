/*!
 * Logging and tracing initialization
 *
 * Console output goes to stderr so stdout carries only the outcome line or
 * JSON report. `--log FILE` switches to JSON lines in that file instead.
 */

use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::config::RelayConfig;
use crate::error::{RelayError, Result};

/// Where diagnostic events are written
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    /// Compact human-readable lines on stderr
    Console,
    /// JSON lines in a file, with span close events
    File(PathBuf),
}

impl LogTarget {
    pub fn for_config(config: &RelayConfig) -> Self {
        match config.log_file {
            Some(ref path) => LogTarget::File(path.clone()),
            None => LogTarget::Console,
        }
    }
}

/// Install the global subscriber for `config`
pub fn init_logging(config: &RelayConfig) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive(config)))
        .map_err(|e| RelayError::Config(format!("Failed to create log filter: {}", e)))?;

    match LogTarget::for_config(config) {
        LogTarget::Console => init_console_logging(env_filter),
        LogTarget::File(path) => init_file_logging(&path, env_filter)?,
    }
    Ok(())
}

/// Filter used when `RUST_LOG` is not set
fn default_directive(config: &RelayConfig) -> String {
    format!("bundle_relay={}", effective_level(config))
}

/// Level after applying the verbose shorthand
fn effective_level(config: &RelayConfig) -> Level {
    if config.verbose {
        Level::DEBUG
    } else {
        config.log_level.to_tracing_level()
    }
}

fn init_console_logging(env_filter: EnvFilter) {
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_span_events(FmtSpan::NONE)
        .compact();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

fn init_file_logging(log_path: &Path, env_filter: EnvFilter) -> Result<()> {
    let file = File::create(log_path).map_err(|e| {
        RelayError::Config(format!(
            "Failed to create log file {}: {}",
            log_path.display(),
            e
        ))
    })?;

    let fmt_layer = fmt::layer()
        .with_writer(file)
        .with_ansi(false)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::CLOSE)
        .json();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    Ok(())
}

/// Initialize logging for tests; safe to call repeatedly
pub fn init_test_logging() {
    use std::sync::Once;
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("bundle_relay=debug"));

        let fmt_layer = fmt::layer().with_test_writer().with_target(false).compact();

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
            .ok(); // Another test may have installed one already
    });
}
