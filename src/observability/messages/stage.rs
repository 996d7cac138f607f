// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for stage worker events.
//!
//! This module contains message types for logging events related to:
//! * Worker start-up, crash recovery and shutdown
//! * Claiming, transforming, sinking and archiving one input file
//! * Retries and quarantine

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use std::path::Path;
use std::time::Duration;
use tracing::Span;

/// Worker entered its poll loop.
///
/// # Log Level
/// `info!` - Important operational event
pub struct WorkerStarted<'a> {
    pub stage: &'a str,
    pub description: &'a str,
    pub inbox: &'a Path,
    pub poll_interval: Duration,
    pub retry_limit: u32,
}

impl Display for WorkerStarted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Stage '{}' ({}) watching {} every {:?} (retry_limit={})",
            self.stage,
            self.description,
            self.inbox.display(),
            self.poll_interval,
            self.retry_limit
        )
    }
}

impl StructuredLog for WorkerStarted<'_> {
    fn log(&self) {
        tracing::info!(
            stage = self.stage,
            inbox = %self.inbox.display(),
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            retry_limit = self.retry_limit,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "stage_worker",
            span_name = name,
            stage = self.stage,
            inbox = %self.inbox.display(),
        )
    }
}

/// Claimed files left behind by a crashed worker were returned to the inbox.
///
/// # Log Level
/// `warn!` - Recovered from an abnormal exit
pub struct ClaimsRecovered<'a> {
    pub stage: &'a str,
    pub count: usize,
}

impl Display for ClaimsRecovered<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Stage '{}' returned {} in-progress file(s) from a previous run to the inbox",
            self.stage, self.count
        )
    }
}

impl StructuredLog for ClaimsRecovered<'_> {
    fn log(&self) {
        tracing::warn!(stage = self.stage, count = self.count, "{}", self);
    }
}

/// The inbox could not be listed. Treated as an empty scan.
///
/// # Log Level
/// `warn!` - Retried on the next cycle
pub struct ScanFailed<'a> {
    pub stage: &'a str,
    pub error: &'a dyn std::error::Error,
}

impl Display for ScanFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Inbox scan failed, will retry next cycle: {}", self.error)
    }
}

impl StructuredLog for ScanFailed<'_> {
    fn log(&self) {
        tracing::warn!(stage = self.stage, error = %self.error, "{}", self);
    }
}

/// A file was claimed and is about to be transformed.
///
/// # Log Level
/// `info!` - Important operational event
pub struct FileClaimed<'a> {
    pub stage: &'a str,
    pub file: &'a str,
    pub attempt: u32,
}

impl Display for FileClaimed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Processing '{}' (attempt {})",
            self.file, self.attempt
        )
    }
}

impl StructuredLog for FileClaimed<'_> {
    fn log(&self) {
        tracing::info!(
            stage = self.stage,
            file = self.file,
            attempt = self.attempt,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "work_item",
            span_name = name,
            stage = self.stage,
            file = self.file,
            attempt = self.attempt,
        )
    }
}

/// The JSON result for a file is visible in the output directory.
///
/// # Log Level
/// `info!` - Important operational event
pub struct ResultWritten<'a> {
    pub stage: &'a str,
    pub file: &'a str,
    pub output: &'a Path,
    pub artifacts: usize,
}

impl Display for ResultWritten<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Output written: {} ({} extra artifact(s))",
            self.output.display(),
            self.artifacts
        )
    }
}

impl StructuredLog for ResultWritten<'_> {
    fn log(&self) {
        tracing::info!(
            stage = self.stage,
            file = self.file,
            output = %self.output.display(),
            artifacts = self.artifacts,
            "{}", self
        );
    }
}

/// A result was handed to the next stage's inbox.
///
/// # Log Level
/// `debug!` - Routine hand-off
pub struct AutoTransferred<'a> {
    pub stage: &'a str,
    pub file: &'a str,
    pub destination: &'a Path,
}

impl Display for AutoTransferred<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Transferred '{}' to {}",
            self.file,
            self.destination.display()
        )
    }
}

impl StructuredLog for AutoTransferred<'_> {
    fn log(&self) {
        tracing::debug!(
            stage = self.stage,
            file = self.file,
            destination = %self.destination.display(),
            "{}", self
        );
    }
}

/// A deliverable was copied to the results area and added to the manifest.
///
/// # Log Level
/// `info!` - Important operational event
pub struct DeliveryRecorded<'a> {
    pub stage: &'a str,
    pub file: &'a str,
    pub destination: &'a Path,
    pub checksum: &'a str,
}

impl Display for DeliveryRecorded<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Dispatched '{}' to {} (sha256 {})",
            self.file,
            self.destination.display(),
            self.checksum
        )
    }
}

impl StructuredLog for DeliveryRecorded<'_> {
    fn log(&self) {
        tracing::info!(
            stage = self.stage,
            file = self.file,
            destination = %self.destination.display(),
            checksum = self.checksum,
            "{}", self
        );
    }
}

/// The input was moved to the archive.
///
/// # Log Level
/// `info!` - Important operational event
pub struct FileArchived<'a> {
    pub stage: &'a str,
    pub file: &'a str,
    pub location: &'a Path,
}

impl Display for FileArchived<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Archived '{}' to {}", self.file, self.location.display())
    }
}

impl StructuredLog for FileArchived<'_> {
    fn log(&self) {
        tracing::info!(
            stage = self.stage,
            file = self.file,
            location = %self.location.display(),
            "{}", self
        );
    }
}

/// The output exists but the input could not be archived.
///
/// # Log Level
/// `error!` - Needs operator cleanup, output is kept
pub struct ArchiveFailed<'a> {
    pub stage: &'a str,
    pub file: &'a str,
    pub parked_at: Option<&'a Path>,
    pub error: &'a dyn std::error::Error,
}

impl Display for ArchiveFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self.parked_at {
            Some(path) => write!(
                f,
                "Failed to archive '{}', output kept, input parked at {}: {}",
                self.file,
                path.display(),
                self.error
            ),
            None => write!(
                f,
                "Failed to archive '{}', output kept, input left claimed: {}",
                self.file, self.error
            ),
        }
    }
}

impl StructuredLog for ArchiveFailed<'_> {
    fn log(&self) {
        tracing::error!(
            stage = self.stage,
            file = self.file,
            error = %self.error,
            "{}", self
        );
    }
}

/// An attempt failed and the file went back to the inbox.
///
/// # Log Level
/// `warn!` - Will be retried
pub struct AttemptFailed<'a> {
    pub stage: &'a str,
    pub file: &'a str,
    pub attempt: u32,
    pub retry_limit: u32,
    pub error: &'a dyn std::error::Error,
}

impl Display for AttemptFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Attempt {}/{} for '{}' failed, will retry: {}",
            self.attempt, self.retry_limit, self.file, self.error
        )
    }
}

impl StructuredLog for AttemptFailed<'_> {
    fn log(&self) {
        tracing::warn!(
            stage = self.stage,
            file = self.file,
            attempt = self.attempt,
            retry_limit = self.retry_limit,
            error = %self.error,
            "{}", self
        );
    }
}

/// A file was moved to the rejected area after a terminal failure.
///
/// # Log Level
/// `error!` - Failure requiring attention
pub struct FileQuarantined<'a> {
    pub stage: &'a str,
    pub file: &'a str,
    pub attempts: u32,
    pub location: &'a Path,
    pub error: &'a dyn std::error::Error,
}

impl Display for FileQuarantined<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Quarantined '{}' after {} attempt(s) to {}: {}",
            self.file,
            self.attempts,
            self.location.display(),
            self.error
        )
    }
}

impl StructuredLog for FileQuarantined<'_> {
    fn log(&self) {
        tracing::error!(
            stage = self.stage,
            file = self.file,
            attempts = self.attempts,
            location = %self.location.display(),
            error = %self.error,
            "{}", self
        );
    }
}

/// A file could not be moved back to the inbox or into quarantine.
///
/// # Log Level
/// `error!` - The file stays claimed until the next start-up recovery
pub struct RelocationFailed<'a> {
    pub stage: &'a str,
    pub file: &'a str,
    pub action: &'a str,
    pub error: &'a dyn std::error::Error,
}

impl Display for RelocationFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Failed to {} '{}': {}", self.action, self.file, self.error)
    }
}

impl StructuredLog for RelocationFailed<'_> {
    fn log(&self) {
        tracing::error!(
            stage = self.stage,
            file = self.file,
            action = self.action,
            error = %self.error,
            "{}", self
        );
    }
}

/// The heartbeat file could not be written.
///
/// # Log Level
/// `warn!` - The supervisor may consider this worker stale
pub struct HeartbeatFailed<'a> {
    pub stage: &'a str,
    pub error: &'a dyn std::error::Error,
}

impl Display for HeartbeatFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Heartbeat write failed: {}", self.error)
    }
}

impl StructuredLog for HeartbeatFailed<'_> {
    fn log(&self) {
        tracing::warn!(stage = self.stage, error = %self.error, "{}", self);
    }
}

/// Worker left its loop at an idle boundary.
///
/// # Log Level
/// `info!` - Important operational event
pub struct WorkerStopped<'a> {
    pub stage: &'a str,
    pub processed: u64,
    pub failed: u64,
    pub rejected: u64,
}

impl Display for WorkerStopped<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Stage '{}' stopped: processed={} failed={} rejected={}",
            self.stage, self.processed, self.failed, self.rejected
        )
    }
}

impl StructuredLog for WorkerStopped<'_> {
    fn log(&self) {
        tracing::info!(
            stage = self.stage,
            processed = self.processed,
            failed = self.failed,
            rejected = self.rejected,
            "{}", self
        );
    }
}
