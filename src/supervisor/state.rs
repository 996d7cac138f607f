// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The persisted view of every managed worker.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use crate::engine::sink::write_atomic;
use crate::errors::SupervisorError;

pub const STATUS_FILE: &str = "supervisor_status.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleStatus {
    Running,
    Crashed,
    Restarting,
    Stopped,
}

impl fmt::Display for ModuleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ModuleStatus::Running => "running",
            ModuleStatus::Crashed => "crashed",
            ModuleStatus::Restarting => "restarting",
            ModuleStatus::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleState {
    pub pid: Option<u32>,
    pub status: ModuleStatus,
    /// Lifetime restarts, not just the ones inside the budget window
    pub restart_count: u32,
    /// Last health check that found the worker alive
    pub last_seen: Option<DateTime<Utc>>,
    /// Last heartbeat written by the worker
    pub last_activity: Option<DateTime<Utc>>,
    /// Standing alert, set when the restart budget is exhausted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alert: Option<String>,
}

impl ModuleState {
    pub fn new(status: ModuleStatus) -> Self {
        Self {
            pid: None,
            status,
            restart_count: 0,
            last_seen: None,
            last_activity: None,
            alert: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupervisorState {
    pub supervisor_pid: u32,
    pub updated_at: DateTime<Utc>,
    pub modules: BTreeMap<String, ModuleState>,
}

impl SupervisorState {
    pub fn new() -> Self {
        Self {
            supervisor_pid: std::process::id(),
            updated_at: Utc::now(),
            modules: BTreeMap::new(),
        }
    }

    pub fn status_path(state_dir: &Path) -> PathBuf {
        state_dir.join(STATUS_FILE)
    }

    pub fn module_mut(&mut self, module: &str) -> &mut ModuleState {
        self.modules
            .entry(module.to_string())
            .or_insert_with(|| ModuleState::new(ModuleStatus::Stopped))
    }

    /// Atomically replace the status store.
    pub async fn persist(&mut self, state_dir: &Path) -> Result<PathBuf, SupervisorError> {
        let path = Self::status_path(state_dir);
        self.updated_at = Utc::now();
        let store_error = |reason: String| SupervisorError::StatusStore {
            path: path.clone(),
            reason,
        };

        let mut bytes = serde_json::to_vec_pretty(self).map_err(|e| store_error(e.to_string()))?;
        bytes.push(b'\n');
        write_atomic(state_dir, STATUS_FILE, &bytes)
            .await
            .map_err(|e| store_error(e.to_string()))
    }

    /// The last persisted state, or `None` if no supervisor has written one.
    pub async fn load(state_dir: &Path) -> Result<Option<Self>, SupervisorError> {
        let path = Self::status_path(state_dir);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(SupervisorError::StatusStore {
                    path,
                    reason: e.to_string(),
                })
            }
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| SupervisorError::StatusStore {
                path,
                reason: e.to_string(),
            })
    }
}

impl Default for SupervisorState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_persist_then_load() {
        let tmp = TempDir::new().unwrap();
        let mut state = SupervisorState::new();
        let whisper = state.module_mut("whisper");
        whisper.status = ModuleStatus::Running;
        whisper.pid = Some(4242);

        let path = state.persist(tmp.path()).await.unwrap();
        assert_eq!(path, tmp.path().join(STATUS_FILE));

        let loaded = SupervisorState::load(tmp.path()).await.unwrap().unwrap();
        assert_eq!(loaded, state);
    }

    #[tokio::test]
    async fn test_missing_store_is_not_an_error() {
        let tmp = TempDir::new().unwrap();
        assert!(SupervisorState::load(tmp.path()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_corrupt_store_is_reported() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join(STATUS_FILE), "{ truncated").unwrap();

        let err = SupervisorState::load(tmp.path()).await.unwrap_err();
        assert!(matches!(err, SupervisorError::StatusStore { .. }));
    }
}
