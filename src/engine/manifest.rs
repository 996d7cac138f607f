// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Line-delimited JSON manifest of dispatched deliverables.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

use crate::errors::StageError;

pub const MANIFEST_FILE: &str = "dispatch_manifest.jsonl";

/// One dispatched file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestRecord {
    pub file_name: String,
    pub file_type: String,
    pub file_size: u64,
    /// SHA-256, lower-case hex
    pub checksum: String,
    pub dispatch_timestamp: DateTime<Utc>,
    pub source_path: PathBuf,
    pub destination_path: PathBuf,
}

/// Compute SHA-256 checksum of bytes
pub fn compute_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Extension of `file_name` without the dot, or `unknown`.
pub fn file_type_of(file_name: &str) -> String {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| "unknown".to_string())
}

/// Append one record as a single line to `dir/dispatch_manifest.jsonl`.
pub async fn append_record(dir: &Path, record: &ManifestRecord) -> Result<PathBuf, StageError> {
    let path = dir.join(MANIFEST_FILE);
    let sink_error = |source| StageError::Sink {
        path: path.clone(),
        source,
    };

    let mut line = serde_json::to_vec(record).map_err(|e| sink_error(std::io::Error::other(e)))?;
    line.push(b'\n');

    tokio::fs::create_dir_all(dir).await.map_err(sink_error)?;
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .await
        .map_err(sink_error)?;
    file.write_all(&line).await.map_err(sink_error)?;
    file.sync_data().await.map_err(sink_error)?;
    Ok(path)
}

/// All records in `dir`'s manifest; an absent manifest reads as empty.
pub async fn read_manifest(dir: &Path) -> Result<Vec<ManifestRecord>, StageError> {
    let path = dir.join(MANIFEST_FILE);
    let content = match tokio::fs::read_to_string(&path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => return Err(StageError::State { path, source }),
    };

    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            serde_json::from_str(line).map_err(|e| StageError::State {
                path: path.clone(),
                source: std::io::Error::other(e),
            })
        })
        .collect()
}
