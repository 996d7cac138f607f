// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::path::{Path, PathBuf};

use crate::errors::StageError;

/// Scratch files being written by the atomic sink.
pub const TEMP_SUFFIX: &str = ".tmp";
/// Files currently owned by a worker.
pub const CLAIM_SUFFIX: &str = ".claimed";
/// Processed inputs whose archive move failed; kept for manual cleanup.
pub const UNARCHIVED_SUFFIX: &str = ".unarchived";

/// Lists an inbox and returns the files a worker may claim.
///
/// Ordering is lexicographic by file name (byte order), so repeated scans of an
/// unchanged directory return the same sequence.
#[derive(Debug, Clone)]
pub struct InboxScanner {
    stage: String,
    /// Lower-case, without the leading dot. Empty accepts every file.
    extensions: Vec<String>,
}

impl InboxScanner {
    pub fn new(stage: &str, extensions: &[String]) -> Self {
        Self {
            stage: stage.to_string(),
            extensions: extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
        }
    }

    /// Whether a file name is a candidate for processing.
    pub fn accepts(&self, name: &str) -> bool {
        if name.starts_with('.')
            || name.ends_with(TEMP_SUFFIX)
            || name.ends_with(CLAIM_SUFFIX)
            || name.ends_with(UNARCHIVED_SUFFIX)
        {
            return false;
        }
        if self.extensions.is_empty() {
            return true;
        }
        match Path::new(name).extension().and_then(|ext| ext.to_str()) {
            Some(ext) => self
                .extensions
                .iter()
                .any(|wanted| wanted.eq_ignore_ascii_case(ext)),
            None => false,
        }
    }

    /// Candidate files in `dir`. A missing directory is created and scans empty.
    pub async fn scan(&self, dir: &Path) -> Result<Vec<PathBuf>, StageError> {
        let scan_error = |source| StageError::Scan {
            stage: self.stage.clone(),
            path: dir.to_path_buf(),
            source,
        };

        if !tokio::fs::try_exists(dir).await.map_err(scan_error)? {
            tokio::fs::create_dir_all(dir).await.map_err(scan_error)?;
            return Ok(Vec::new());
        }

        let mut entries = tokio::fs::read_dir(dir).await.map_err(scan_error)?;
        let mut candidates = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(scan_error)? {
            // entries can vanish between listing and stat
            let Ok(file_type) = entry.file_type().await else {
                continue;
            };
            if !file_type.is_file() {
                continue;
            }
            let name = entry.file_name();
            if name.to_str().is_some_and(|name| self.accepts(name)) {
                candidates.push(entry.path());
            }
        }

        candidates.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        Ok(candidates)
    }
}
