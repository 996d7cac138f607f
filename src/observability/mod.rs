// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Observability module for structured logging.
//!
//! Message types live in [`messages`] and follow a struct-based pattern with a
//! `Display` implementation, so log text is not scattered as magic strings
//! across the runtime.
//!
//! # Architecture
//!
//! Messages are organized by subsystem:
//! * `messages::stage` - stage worker lifecycle and per-file events
//! * `messages::supervisor` - worker process lifecycle and restart alerts
//! * `messages::validation` - configuration loading and validation
//!
//! Every process writes one append-only log file, `<log_dir>/<process>.log`,
//! and optionally mirrors it to stderr. `RUST_LOG` overrides the configured
//! level when set.

pub mod messages;

use crate::config::LoggingConfig;
use crate::errors::ConfigError;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber for this process.
///
/// The returned guard flushes buffered log lines when dropped and must be held
/// until the process exits.
pub fn init_logging(
    config: &LoggingConfig,
    log_dir: &Path,
    process_name: &str,
) -> Result<WorkerGuard, ConfigError> {
    std::fs::create_dir_all(log_dir).map_err(|e| {
        ConfigError::Logging(format!(
            "cannot create log directory {}: {}",
            log_dir.display(),
            e
        ))
    })?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(process_name)
        .filename_suffix("log")
        .build(log_dir)
        .map_err(|e| ConfigError::Logging(e.to_string()))?;
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(config.level.to_tracing_level()).into())
        .from_env_lossy();

    let file_layer = fmt::layer().with_writer(writer).with_ansi(false);
    let console_layer = config
        .console
        .then(|| fmt::layer().with_writer(std::io::stderr).with_target(false));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(|e| ConfigError::Logging(e.to_string()))?;

    Ok(guard)
}
