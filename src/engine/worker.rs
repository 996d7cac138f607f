// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The generic stage runtime.
//!
//! Every stage is a [`StageWorker`] driving one [`Transform`] through the same
//! poll cycle:
//!
//! ```text
//! Idle -> Scanning -> Claimed -> Transforming -> Sinking -> Archiving -> Idle
//!                                     |             |
//!                                     +--> Failed <-+
//! ```
//!
//! One file is processed per cycle and a stop request is honoured only while
//! idle, so a running transform is never interrupted and a written output is
//! always followed by its archive step.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::config::{Config, ModuleConfig};
use crate::engine::archive::{
    move_file, relocate, unique_destination, write_failure_report, ArchiveOutcome, FailureReport,
};
use crate::engine::heartbeat::{clear_stop, spawn_stop_watcher, write_heartbeat, Heartbeat};
use crate::engine::manifest::{append_record, compute_checksum, file_type_of, ManifestRecord};
use crate::engine::metadata::{
    source_file_of, split_document, Metadata, StageResult, METADATA_KEY,
};
use crate::engine::scanner::{InboxScanner, CLAIM_SUFFIX, UNARCHIVED_SUFFIX};
use crate::engine::sink::write_atomic;
use crate::engine::work_item::{recover_claims, ClaimState, WorkItem};
use crate::errors::StageError;
use crate::observability::messages::stage::*;
use crate::observability::messages::StructuredLog;
use crate::stages::{base_name, output_file_name, StageFactory, StageKind};
use crate::traits::{Artifact, InputFormat, Payload, StageInput, StageOutput, Transform};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerPhase {
    Starting,
    Idle,
    Scanning,
    Claimed,
    Transforming,
    Sinking,
    Archiving,
    Failed,
    Stopped,
}

impl fmt::Display for WorkerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkerPhase::Starting => "starting",
            WorkerPhase::Idle => "idle",
            WorkerPhase::Scanning => "scanning",
            WorkerPhase::Claimed => "claimed",
            WorkerPhase::Transforming => "transforming",
            WorkerPhase::Sinking => "sinking",
            WorkerPhase::Archiving => "archiving",
            WorkerPhase::Failed => "failed",
            WorkerPhase::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// What one poll cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Nothing to claim
    Empty,
    /// Output written and input archived (or parked if archiving failed)
    Processed,
    /// Attempt failed, input returned to the inbox
    Retrying,
    /// Input moved to the rejected area
    Rejected,
    /// Inbox unreadable, treated as empty
    ScanFailed,
    /// Candidate disappeared before it could be claimed
    Skipped,
}

/// Counters reported in heartbeats.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerStats {
    pub processed: u64,
    /// Failed attempts, including ones that were later retried
    pub failed: u64,
    pub rejected: u64,
}

pub struct StageWorker {
    module: ModuleConfig,
    transform: Arc<dyn Transform>,
    scanner: InboxScanner,
    state_dir: Option<PathBuf>,
    next_inbox: Option<PathBuf>,
    /// Failed attempts per file name; in memory only
    attempts: HashMap<String, u32>,
    /// A failed attempt could not be returned to the inbox
    stranded: bool,
    stats: WorkerStats,
    phase: WorkerPhase,
    last_file: Option<String>,
}

impl StageWorker {
    pub fn new(module: ModuleConfig, transform: Arc<dyn Transform>) -> Self {
        let scanner = InboxScanner::new(module.kind.name(), &module.extensions);
        Self {
            module,
            transform,
            scanner,
            state_dir: None,
            next_inbox: None,
            attempts: HashMap::new(),
            stranded: false,
            stats: WorkerStats::default(),
            phase: WorkerPhase::Starting,
            last_file: None,
        }
    }

    /// A worker for `kind` with its stock transform, heartbeats and hand-off.
    pub fn from_config(cfg: &Config, kind: StageKind) -> Self {
        Self::new(cfg.module(kind), StageFactory::create_transform(kind))
            .with_state_dir(cfg.state_dir())
            .with_next_inbox(cfg.next_inbox(kind))
    }

    /// Write heartbeats under `state_dir`.
    pub fn with_state_dir(mut self, state_dir: PathBuf) -> Self {
        self.state_dir = Some(state_dir);
        self
    }

    /// Copy every result into `next_inbox`.
    pub fn with_next_inbox(mut self, next_inbox: Option<PathBuf>) -> Self {
        self.next_inbox = next_inbox;
        self
    }

    pub fn module(&self) -> &ModuleConfig {
        &self.module
    }

    pub fn stats(&self) -> WorkerStats {
        self.stats
    }

    pub fn phase(&self) -> WorkerPhase {
        self.phase
    }

    fn stage(&self) -> &'static str {
        self.module.kind.name()
    }

    /// Create the working directories and recover claims left by a crash.
    pub async fn prepare(&mut self) -> Result<(), StageError> {
        for dir in [
            &self.module.inbox,
            &self.module.output,
            &self.module.archive,
            &self.module.rejected,
        ] {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|source| StageError::State {
                    path: dir.clone(),
                    source,
                })?;
        }

        let recovered = recover_claims(&self.module.inbox)
            .await
            .map_err(|source| StageError::Scan {
                stage: self.stage().to_string(),
                path: self.module.inbox.clone(),
                source,
            })?;
        if !recovered.is_empty() {
            ClaimsRecovered {
                stage: self.stage(),
                count: recovered.len(),
            }
            .log();
        }
        Ok(())
    }

    /// Poll until `shutdown` is cancelled, then return the final counters.
    pub async fn run(&mut self, shutdown: CancellationToken) -> Result<WorkerStats, StageError> {
        self.prepare().await?;

        let started = WorkerStarted {
            stage: self.stage(),
            description: self.module.kind.description(),
            inbox: &self.module.inbox,
            poll_interval: self.module.poll_interval(),
            retry_limit: self.module.retry_limit,
        };
        started.log();
        let span = started.span("run");

        self.poll_loop(shutdown).instrument(span).await;

        WorkerStopped {
            stage: self.stage(),
            processed: self.stats.processed,
            failed: self.stats.failed,
            rejected: self.stats.rejected,
        }
        .log();
        Ok(self.stats)
    }

    async fn poll_loop(&mut self, shutdown: CancellationToken) {
        let poll_interval = self.module.poll_interval();
        self.beat().await;

        while !shutdown.is_cancelled() {
            self.run_cycle().await;
            self.enter(WorkerPhase::Idle);
            self.beat().await;

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(poll_interval) => {}
            }
        }

        self.enter(WorkerPhase::Stopped);
        self.beat().await;
    }

    /// Scan once and process at most one file.
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        if self.stranded {
            self.recover_stranded().await;
        }
        self.enter(WorkerPhase::Scanning);
        let candidates = match self.scanner.scan(&self.module.inbox).await {
            Ok(candidates) => candidates,
            Err(err) => {
                ScanFailed {
                    stage: self.stage(),
                    error: &err,
                }
                .log();
                return CycleOutcome::ScanFailed;
            }
        };

        let Some(path) = candidates.into_iter().next() else {
            return CycleOutcome::Empty;
        };
        let Some(mut item) = WorkItem::discovered(self.module.kind, path) else {
            return CycleOutcome::Skipped;
        };

        self.enter(WorkerPhase::Claimed);
        if let Err(err) = item.claim().await {
            tracing::warn!(
                stage = self.stage(),
                file = item.name.as_str(),
                error = %err,
                "Claim failed, skipping"
            );
            return CycleOutcome::Skipped;
        }

        self.last_file = Some(item.name.clone());
        let attempt = self.attempts.get(&item.name).copied().unwrap_or(0) + 1;
        let claimed = FileClaimed {
            stage: self.stage(),
            file: &item.name,
            attempt,
        };
        claimed.log();
        let span = claimed.span("process");

        match self.process(&item, attempt).instrument(span.clone()).await {
            Ok(()) => {
                self.attempts.remove(&item.name);
                item.mark(ClaimState::Done);
                self.stats.processed += 1;
                self.archive(&item).instrument(span).await;
                CycleOutcome::Processed
            }
            Err(err) => self.fail(item, attempt, err).instrument(span).await,
        }
    }

    async fn process(&mut self, item: &WorkItem, attempt: u32) -> Result<(), StageError> {
        self.enter(WorkerPhase::Transforming);
        let raw = tokio::fs::read(item.current_path())
            .await
            .map_err(|source| StageError::Input {
                stage: self.stage().to_string(),
                file: item.name.clone(),
                source,
            })?;

        let input = self.decode(item, raw)?;
        let upstream = input.upstream.clone();
        let output = self
            .transform
            .transform(input)
            .await
            .map_err(|source| StageError::Transform {
                stage: self.stage().to_string(),
                file: item.name.clone(),
                attempt,
                source,
            })?;

        self.enter(WorkerPhase::Sinking);
        self.sink(item, upstream, output).await
    }

    fn decode(&self, item: &WorkItem, raw: Vec<u8>) -> Result<StageInput, StageError> {
        let (payload, upstream) = match self.transform.input_format() {
            InputFormat::Raw => {
                // JSON deliverables still carry a chain worth extending
                let upstream = serde_json::from_slice::<Value>(&raw)
                    .ok()
                    .and_then(|doc| doc.get(METADATA_KEY).cloned())
                    .filter(Value::is_object);
                (Payload::Raw(raw), upstream)
            }
            InputFormat::Json => {
                let parse_error = |reason: String| StageError::Parse {
                    stage: self.stage().to_string(),
                    file: item.name.clone(),
                    reason,
                };
                let document: Value =
                    serde_json::from_slice(&raw).map_err(|e| parse_error(e.to_string()))?;
                let Value::Object(document) = document else {
                    return Err(parse_error("expected a JSON object".to_string()));
                };
                let (body, upstream) = split_document(document);
                (Payload::Json(body), upstream)
            }
        };

        Ok(StageInput {
            source_name: item.name.clone(),
            payload,
            upstream,
            formats: self.module.output_formats.clone(),
        })
    }

    /// Artifacts first, then the primary result, then manifest lines, then the
    /// hand-off copy. A downstream reader that sees the result can rely on the
    /// artifacts being present.
    async fn sink(
        &self,
        item: &WorkItem,
        upstream: Option<Value>,
        output: StageOutput,
    ) -> Result<(), StageError> {
        let StageOutput {
            body,
            details,
            artifacts,
        } = output;
        let kind = self.module.kind;
        let file_name = self.result_name(item).await?;

        let result = StageResult {
            body,
            metadata: Metadata::new(
                kind.name(),
                self.transform.version(),
                &item.name,
                upstream,
                details,
            ),
        };
        let bytes = result.to_json_bytes().map_err(|e| StageError::Sink {
            path: self.module.output.join(&file_name),
            source: io::Error::other(e),
        })?;

        let final_output = &self.module.final_output;
        let artifact_count = artifacts.len();
        let mut deliveries = Vec::new();
        for artifact in artifacts {
            match artifact {
                Artifact::File {
                    relative_path,
                    contents,
                } => {
                    write_atomic(final_output, &relative_path, &contents).await?;
                }
                Artifact::ResultCopy { relative_path } => {
                    write_atomic(final_output, &relative_path, &bytes).await?;
                }
                Artifact::Delivery {
                    file_name: delivered,
                    contents,
                } => {
                    let now = Utc::now();
                    let dated = final_output.join(now.format("%Y-%m-%d").to_string());
                    let slot = delivery_slot(&dated, &delivered, &contents)
                        .await
                        .map_err(|source| StageError::Sink {
                            path: dated.join(&delivered),
                            source,
                        })?;
                    let destination = write_atomic(&dated, &slot, &contents).await?;
                    deliveries.push(ManifestRecord {
                        file_type: file_type_of(&delivered),
                        file_size: contents.len() as u64,
                        checksum: compute_checksum(&contents),
                        dispatch_timestamp: now,
                        source_path: item.source_path.clone(),
                        destination_path: destination,
                        file_name: delivered,
                    });
                }
            }
        }

        let output_path = write_atomic(&self.module.output, &file_name, &bytes).await?;
        ResultWritten {
            stage: kind.name(),
            file: &item.name,
            output: &output_path,
            artifacts: artifact_count,
        }
        .log();

        for record in &deliveries {
            append_record(final_output, record).await?;
            DeliveryRecorded {
                stage: kind.name(),
                file: &record.file_name,
                destination: &record.destination_path,
                checksum: &record.checksum,
            }
            .log();
        }

        if let Some(next_inbox) = &self.next_inbox {
            let destination = write_atomic(next_inbox, &file_name, &bytes).await?;
            AutoTransferred {
                stage: kind.name(),
                file: &file_name,
                destination: &destination,
            }
            .log();
        }
        Ok(())
    }

    /// Name of this item's result, free in the output directory and in the
    /// hand-off inbox.
    ///
    /// A result already written for the same input is replaced, so a retry
    /// after a partial sink reuses its name. A result that belongs to another
    /// input is left alone and the next `<base>.<n><suffix>.json` is tried.
    async fn result_name(&self, item: &WorkItem) -> Result<String, StageError> {
        let kind = self.module.kind;
        let mut dirs = vec![self.module.output.as_path()];
        dirs.extend(self.next_inbox.as_deref());

        let mut counter = 0u32;
        loop {
            let name = match counter {
                0 => output_file_name(&item.name, kind),
                n => format!("{}.{}{}.json", base_name(&item.name), n, kind.output_suffix()),
            };
            if name_is_free_for(&dirs, &name, &item.name).await? {
                return Ok(name);
            }
            counter += 1;
        }
    }

    async fn archive(&mut self, item: &WorkItem) {
        self.enter(WorkerPhase::Archiving);
        match relocate(item, &self.module.archive, ArchiveOutcome::Processed).await {
            Ok(record) => FileArchived {
                stage: self.stage(),
                file: &item.name,
                location: &record.location,
            }
            .log(),
            Err(source) => {
                let err = StageError::Archive {
                    stage: self.stage().to_string(),
                    file: item.name.clone(),
                    source,
                };
                // parked files are skipped by the scanner so the input is not processed twice
                let parked = self.park_unarchived(item).await;
                ArchiveFailed {
                    stage: self.stage(),
                    file: &item.name,
                    parked_at: parked.as_deref(),
                    error: &err,
                }
                .log();
            }
        }
    }

    async fn park_unarchived(&self, item: &WorkItem) -> Option<PathBuf> {
        let parked_name = format!("{}{}", item.name, UNARCHIVED_SUFFIX);
        let destination = unique_destination(&self.module.inbox, &parked_name).await.ok()?;
        move_file(&item.current_path(), &destination).await.ok()?;
        Some(destination)
    }

    async fn fail(&mut self, mut item: WorkItem, attempt: u32, err: StageError) -> CycleOutcome {
        self.enter(WorkerPhase::Failed);
        item.mark(ClaimState::Failed);
        self.stats.failed += 1;

        let terminal = err.is_terminal();
        if !terminal && attempt < self.module.retry_limit {
            AttemptFailed {
                stage: self.stage(),
                file: &item.name,
                attempt,
                retry_limit: self.module.retry_limit,
                error: &err,
            }
            .log();
            self.attempts.remove(&item.name);
            self.release(&mut item).await;
            self.attempts.insert(item.name.clone(), attempt);
            return CycleOutcome::Retrying;
        }

        let report = FailureReport {
            stage: self.stage().to_string(),
            file: item.name.clone(),
            cause: err.to_string(),
            attempts: attempt,
            terminal,
            timestamp: Utc::now(),
        };
        match relocate(&item, &self.module.rejected, ArchiveOutcome::Rejected).await {
            Ok(record) => {
                self.attempts.remove(&item.name);
                self.stats.rejected += 1;
                // the input is already out of the inbox, so a missing report is not retried
                if let Err(source) = write_failure_report(&record, &report).await {
                    RelocationFailed {
                        stage: self.stage(),
                        file: &item.name,
                        action: "write the failure report for",
                        error: &source,
                    }
                    .log();
                }
                FileQuarantined {
                    stage: self.stage(),
                    file: &item.name,
                    attempts: attempt,
                    location: &record.location,
                    error: &err,
                }
                .log();
                CycleOutcome::Rejected
            }
            Err(source) => {
                RelocationFailed {
                    stage: self.stage(),
                    file: &item.name,
                    action: "quarantine",
                    error: &source,
                }
                .log();
                self.release(&mut item).await;
                self.attempts.insert(item.name.clone(), attempt);
                CycleOutcome::Retrying
            }
        }
    }

    async fn release(&mut self, item: &mut WorkItem) {
        if let Err(err) = item.unclaim().await {
            RelocationFailed {
                stage: self.stage(),
                file: &item.name,
                action: "return to the inbox (recovery runs next cycle)",
                error: &err,
            }
            .log();
            self.stranded = true;
        }
    }

    /// Return claims left behind by a failed release before scanning again.
    async fn recover_stranded(&mut self) {
        match recover_claims(&self.module.inbox).await {
            Ok(recovered) => {
                self.stranded = false;
                if !recovered.is_empty() {
                    ClaimsRecovered {
                        stage: self.stage(),
                        count: recovered.len(),
                    }
                    .log();
                }
            }
            Err(err) => tracing::warn!(
                stage = self.stage(),
                error = %err,
                "Stranded claims still cannot be returned to the inbox"
            ),
        }
    }

    fn enter(&mut self, phase: WorkerPhase) {
        if self.phase != phase {
            tracing::trace!(stage = self.stage(), from = %self.phase, to = %phase, "phase change");
            self.phase = phase;
        }
    }

    async fn beat(&self) {
        let Some(state_dir) = &self.state_dir else {
            return;
        };
        let heartbeat = Heartbeat {
            module: self.stage().to_string(),
            pid: std::process::id(),
            timestamp: Utc::now(),
            phase: self.phase,
            stats: self.stats,
            last_file: self.last_file.clone(),
        };
        if let Err(err) = write_heartbeat(state_dir, &heartbeat).await {
            HeartbeatFailed {
                stage: self.stage(),
                error: &err,
            }
            .log();
        }
    }
}

/// Whether `name` is unused in every `dirs`, or used only by results of
/// `owner`. In-progress and parked copies in a downstream inbox count too.
async fn name_is_free_for(dirs: &[&Path], name: &str, owner: &str) -> Result<bool, StageError> {
    for dir in dirs {
        for variant in [
            name.to_string(),
            format!("{}{}", name, CLAIM_SUFFIX),
            format!("{}{}", name, UNARCHIVED_SUFFIX),
        ] {
            let path = dir.join(variant);
            match tokio::fs::read(&path).await {
                Ok(existing) => {
                    if source_file_of(&existing).as_deref() != Some(owner) {
                        return Ok(false);
                    }
                }
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(source) => return Err(StageError::Sink { path, source }),
            }
        }
    }
    Ok(true)
}

/// File name for a delivery under `dir`: `name`, unless a different delivery
/// already holds it.
async fn delivery_slot(dir: &Path, name: &str, contents: &[u8]) -> io::Result<String> {
    let destination = match tokio::fs::read(dir.join(name)).await {
        Ok(existing) if existing == contents => return Ok(name.to_string()),
        Ok(_) => unique_destination(dir, name).await?,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(name.to_string()),
        Err(err) => return Err(err),
    };
    destination
        .file_name()
        .and_then(|slot| slot.to_str())
        .map(str::to_string)
        .ok_or_else(|| io::Error::other("delivery name is not valid UTF-8"))
}

/// Run one module standalone until `shutdown` is cancelled or the supervisor
/// drops a stop marker for it.
pub async fn run_module(
    cfg: &Config,
    kind: StageKind,
    shutdown: CancellationToken,
) -> Result<WorkerStats, StageError> {
    let state_dir = cfg.state_dir();
    clear_stop(&state_dir, kind.name()).await?;
    let watcher = spawn_stop_watcher(state_dir, kind.name().to_string(), shutdown.clone());

    let mut worker = StageWorker::from_config(cfg, kind);
    let result = worker.run(shutdown.clone()).await;

    shutdown.cancel();
    let _ = watcher.await;
    result
}
