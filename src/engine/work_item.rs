// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};

use crate::engine::archive::{move_file, unique_destination};
use crate::engine::scanner::CLAIM_SUFFIX;
use crate::errors::StageError;
use crate::stages::StageKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimState {
    Unclaimed,
    InProgress,
    Done,
    Failed,
}

/// One input file as seen by a stage worker.
///
/// Claiming renames `<name>` to `<name>.claimed` so the scanner skips it while
/// it is being processed. A crash leaves the `.claimed` file behind, and
/// [`recover_claims`] returns it to the inbox on the next start.
#[derive(Debug, Clone)]
pub struct WorkItem {
    pub stage: StageKind,
    pub source_path: PathBuf,
    pub name: String,
    pub discovered_at: DateTime<Utc>,
    state: ClaimState,
}

impl WorkItem {
    /// `None` when the path has no UTF-8 file name.
    pub fn discovered(stage: StageKind, source_path: PathBuf) -> Option<Self> {
        let name = source_path.file_name()?.to_str()?.to_string();
        Some(Self {
            stage,
            source_path,
            name,
            discovered_at: Utc::now(),
            state: ClaimState::Unclaimed,
        })
    }

    pub fn state(&self) -> ClaimState {
        self.state
    }

    pub fn mark(&mut self, state: ClaimState) {
        self.state = state;
    }

    pub fn claimed_path(&self) -> PathBuf {
        claimed_path_for(&self.source_path)
    }

    /// Where the file is right now.
    pub fn current_path(&self) -> PathBuf {
        match self.state {
            ClaimState::Unclaimed => self.source_path.clone(),
            _ => self.claimed_path(),
        }
    }

    pub async fn claim(&mut self) -> Result<(), StageError> {
        tokio::fs::rename(&self.source_path, self.claimed_path())
            .await
            .map_err(|source| self.input_error(source))?;
        self.state = ClaimState::InProgress;
        Ok(())
    }

    /// Return the file to the inbox for a later retry.
    ///
    /// If a new file with the same name arrived meanwhile, the returned file
    /// gets a numeric suffix and `name` / `source_path` are updated.
    pub async fn unclaim(&mut self) -> Result<(), StageError> {
        let inbox = self
            .source_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let destination = unique_destination(&inbox, &self.name)
            .await
            .map_err(|source| self.input_error(source))?;
        move_file(&self.claimed_path(), &destination)
            .await
            .map_err(|source| self.input_error(source))?;

        if let Some(name) = destination.file_name().and_then(|n| n.to_str()) {
            self.name = name.to_string();
        }
        self.source_path = destination;
        self.state = ClaimState::Unclaimed;
        Ok(())
    }

    fn input_error(&self, source: io::Error) -> StageError {
        StageError::Input {
            stage: self.stage.name().to_string(),
            file: self.name.clone(),
            source,
        }
    }
}

fn claimed_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(CLAIM_SUFFIX);
    path.with_file_name(name)
}

/// Rename every `*.claimed` file in `inbox` back to its original name.
///
/// Only the single worker that owns an inbox calls this, at start-up, so any
/// claim found belongs to a predecessor that died mid-file.
pub async fn recover_claims(inbox: &Path) -> io::Result<Vec<PathBuf>> {
    let mut recovered = Vec::new();
    if !tokio::fs::try_exists(inbox).await? {
        return Ok(recovered);
    }

    let mut entries = tokio::fs::read_dir(inbox).await?;
    let mut claimed = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if let Some(original) = entry
            .file_name()
            .to_str()
            .and_then(|name| name.strip_suffix(CLAIM_SUFFIX))
            .filter(|original| !original.is_empty())
        {
            claimed.push((entry.path(), original.to_string()));
        }
    }
    claimed.sort();

    for (path, original) in claimed {
        let destination = unique_destination(inbox, &original).await?;
        move_file(&path, &destination).await?;
        recovered.push(destination);
    }
    Ok(recovered)
}
