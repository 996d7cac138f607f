// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for supervisor control-loop events.
//!
//! This module contains message types for logging events related to:
//! * Launching and stopping worker processes
//! * Crash and staleness detection
//! * Restart scheduling and restart-budget alerts

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use std::path::Path;
use std::time::Duration;
use tracing::Span;

/// Supervisor is about to start its workers.
///
/// # Log Level
/// `info!` - Important operational event
pub struct SupervisorStarted {
    pub modules: usize,
    pub health_check_interval: Duration,
}

impl Display for SupervisorStarted {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Supervisor starting {} module(s), health check every {:?}",
            self.modules, self.health_check_interval
        )
    }
}

impl StructuredLog for SupervisorStarted {
    fn log(&self) {
        tracing::info!(
            modules = self.modules,
            health_check_interval_ms = self.health_check_interval.as_millis() as u64,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("supervisor", span_name = name, modules = self.modules)
    }
}

/// A worker process was spawned.
///
/// # Log Level
/// `info!` - Important operational event
pub struct WorkerLaunched<'a> {
    pub module: &'a str,
    pub pid: Option<u32>,
}

impl Display for WorkerLaunched<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self.pid {
            Some(pid) => write!(f, "Started module '{}' (pid {})", self.module, pid),
            None => write!(f, "Started module '{}'", self.module),
        }
    }
}

impl StructuredLog for WorkerLaunched<'_> {
    fn log(&self) {
        tracing::info!(module = self.module, pid = ?self.pid, "{}", self);
    }
}

/// Spawning a worker failed. Counted against the restart budget.
///
/// # Log Level
/// `error!` - Failure requiring attention
pub struct LaunchFailed<'a> {
    pub module: &'a str,
    pub error: &'a dyn std::error::Error,
}

impl Display for LaunchFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Failed to start module '{}': {}", self.module, self.error)
    }
}

impl StructuredLog for LaunchFailed<'_> {
    fn log(&self) {
        tracing::error!(module = self.module, error = %self.error, "{}", self);
    }
}

/// A worker went down without being asked to, or never came up.
///
/// # Log Level
/// `warn!` - Restart policy decides what happens next
pub struct WorkerCrashed<'a> {
    pub module: &'a str,
    pub error: &'a dyn std::error::Error,
}

impl Display for WorkerCrashed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Module '{}' is down: {}", self.module, self.error)
    }
}

impl StructuredLog for WorkerCrashed<'_> {
    fn log(&self) {
        tracing::warn!(module = self.module, error = %self.error, "{}", self);
    }
}

/// A worker's heartbeat is older than the staleness window.
///
/// # Log Level
/// `warn!` - Worker is killed and treated as crashed
pub struct WorkerStale<'a> {
    pub module: &'a str,
    pub age: Duration,
    pub limit: Duration,
}

impl Display for WorkerStale<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Module '{}' heartbeat is {}s old (limit {}s), killing it",
            self.module,
            self.age.as_secs(),
            self.limit.as_secs()
        )
    }
}

impl StructuredLog for WorkerStale<'_> {
    fn log(&self) {
        tracing::warn!(
            module = self.module,
            age_secs = self.age.as_secs(),
            limit_secs = self.limit.as_secs(),
            "{}", self
        );
    }
}

/// A crashed worker will be restarted after a backoff delay.
///
/// # Log Level
/// `info!` - Important operational event
pub struct RestartScheduled<'a> {
    pub module: &'a str,
    pub attempt: u32,
    pub delay: Duration,
}

impl Display for RestartScheduled<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Restarting module '{}' in {:?} (restart #{} in window)",
            self.module, self.delay, self.attempt
        )
    }
}

impl StructuredLog for RestartScheduled<'_> {
    fn log(&self) {
        tracing::info!(
            module = self.module,
            attempt = self.attempt,
            delay_ms = self.delay.as_millis() as u64,
            "{}", self
        );
    }
}

/// Standing alert: a module used up its restart budget and is stopped.
///
/// # Log Level
/// `error!` - Operator intervention required
pub struct RestartBudgetExhausted<'a> {
    pub module: &'a str,
    pub error: &'a dyn std::error::Error,
}

impl Display for RestartBudgetExhausted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "ALERT: {}", self.error)
    }
}

impl StructuredLog for RestartBudgetExhausted<'_> {
    fn log(&self) {
        tracing::error!(module = self.module, alert = true, "{}", self);
    }
}

/// Shutdown was requested; stop markers are being written.
///
/// # Log Level
/// `info!` - Important operational event
pub struct ShutdownRequested {
    pub running: usize,
    pub grace: Duration,
}

impl Display for ShutdownRequested {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Shutting down {} running module(s), grace period {:?}",
            self.running, self.grace
        )
    }
}

impl StructuredLog for ShutdownRequested {
    fn log(&self) {
        tracing::info!(
            running = self.running,
            grace_ms = self.grace.as_millis() as u64,
            "{}", self
        );
    }
}

/// A worker is gone after shutdown, on its own or by force.
///
/// # Log Level
/// `info!` for graceful exits, `warn!` when killed
pub struct WorkerStopped<'a> {
    pub module: &'a str,
    pub forced: bool,
}

impl Display for WorkerStopped<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        if self.forced {
            write!(f, "Module '{}' did not stop in time and was killed", self.module)
        } else {
            write!(f, "Module '{}' stopped", self.module)
        }
    }
}

impl StructuredLog for WorkerStopped<'_> {
    fn log(&self) {
        if self.forced {
            tracing::warn!(module = self.module, forced = true, "{}", self);
        } else {
            tracing::info!(module = self.module, forced = false, "{}", self);
        }
    }
}

/// The status store could not be written.
///
/// # Log Level
/// `warn!` - `status` may show stale data
pub struct StatusPersistFailed<'a> {
    pub path: &'a Path,
    pub error: &'a dyn std::error::Error,
}

impl Display for StatusPersistFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Failed to write status store {}: {}",
            self.path.display(),
            self.error
        )
    }
}

impl StructuredLog for StatusPersistFailed<'_> {
    fn log(&self) {
        tracing::warn!(path = %self.path.display(), error = %self.error, "{}", self);
    }
}
