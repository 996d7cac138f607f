// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Relocation of finished inputs.
//!
//! Inputs are never deleted. A processed input moves to
//! `archive/<YYYY-MM-DD>/<name>`, a quarantined one to
//! `rejected/<YYYY-MM-DD>/<name>` with a `<name>.error.json` report beside it.
//! Name collisions get a numeric suffix (`memo.1.json`) instead of overwriting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};

use crate::engine::sink::write_atomic;
use crate::engine::work_item::WorkItem;

pub const ERROR_REPORT_SUFFIX: &str = ".error.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchiveOutcome {
    Processed,
    Rejected,
}

/// Where an input ended up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveRecord {
    pub original_name: String,
    pub outcome: ArchiveOutcome,
    pub location: PathBuf,
    pub archived_at: DateTime<Utc>,
}

/// Sidecar written next to a quarantined input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureReport {
    pub stage: String,
    pub file: String,
    pub cause: String,
    pub attempts: u32,
    /// True when the input could never succeed (malformed, schema mismatch)
    pub terminal: bool,
    pub timestamp: DateTime<Utc>,
}

/// Move a claimed item under `root/<date>/`.
pub async fn relocate(
    item: &WorkItem,
    root: &Path,
    outcome: ArchiveOutcome,
) -> io::Result<ArchiveRecord> {
    let archived_at = Utc::now();
    let dated = root.join(archived_at.format("%Y-%m-%d").to_string());
    tokio::fs::create_dir_all(&dated).await?;

    let destination = unique_destination(&dated, &item.name).await?;
    move_file(&item.current_path(), &destination).await?;

    Ok(ArchiveRecord {
        original_name: item.name.clone(),
        outcome,
        location: destination,
        archived_at,
    })
}

/// Write the failure report beside an input that was already moved into the
/// rejected area.
pub async fn write_failure_report(
    record: &ArchiveRecord,
    report: &FailureReport,
) -> io::Result<PathBuf> {
    let report_name = format!(
        "{}{}",
        record
            .location
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| record.original_name.clone()),
        ERROR_REPORT_SUFFIX
    );
    let body = serde_json::to_vec_pretty(report).map_err(io::Error::other)?;
    let parent = record
        .location
        .parent()
        .ok_or_else(|| io::Error::other("quarantined file has no parent directory"))?;
    write_atomic(parent, &report_name, &body)
        .await
        .map_err(io::Error::other)
}

/// First free path for `name` in `dir`: `name`, then `stem.1.ext`, `stem.2.ext`...
pub async fn unique_destination(dir: &Path, name: &str) -> io::Result<PathBuf> {
    let candidate = dir.join(name);
    if !tokio::fs::try_exists(&candidate).await? {
        return Ok(candidate);
    }

    let (stem, extension) = match name.rfind('.') {
        Some(dot) if dot > 0 => (&name[..dot], &name[dot..]),
        _ => (name, ""),
    };
    let mut counter = 1u32;
    loop {
        let candidate = dir.join(format!("{}.{}{}", stem, counter, extension));
        if !tokio::fs::try_exists(&candidate).await? {
            return Ok(candidate);
        }
        counter += 1;
    }
}

/// Rename, falling back to copy-then-remove across filesystems.
pub async fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    match tokio::fs::rename(from, to).await {
        Ok(()) => Ok(()),
        Err(rename_error) => {
            if !tokio::fs::try_exists(from).await.unwrap_or(false) {
                return Err(rename_error);
            }
            tokio::fs::copy(from, to).await?;
            tokio::fs::remove_file(from).await
        }
    }
}
