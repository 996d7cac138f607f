// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Worker liveness and stop requests, exchanged through `state_dir`.
//!
//! A worker rewrites `<module>.heartbeat.json` at every loop boundary. The
//! supervisor asks a worker to stop by creating `<module>.stop`; the worker
//! notices within [`STOP_POLL_INTERVAL`] and leaves its loop at the next idle
//! boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::engine::sink::write_atomic;
use crate::engine::worker::{WorkerPhase, WorkerStats};
use crate::errors::StageError;

pub const HEARTBEAT_SUFFIX: &str = ".heartbeat.json";
pub const STOP_MARKER_SUFFIX: &str = ".stop";
pub const STOP_POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Heartbeat {
    pub module: String,
    pub pid: u32,
    pub timestamp: DateTime<Utc>,
    pub phase: WorkerPhase,
    #[serde(flatten)]
    pub stats: WorkerStats,
    pub last_file: Option<String>,
}

impl Heartbeat {
    /// Time since the heartbeat was written; zero if the clock went backwards.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.timestamp).to_std().unwrap_or(Duration::ZERO)
    }
}

pub fn heartbeat_path(state_dir: &Path, module: &str) -> PathBuf {
    state_dir.join(format!("{}{}", module, HEARTBEAT_SUFFIX))
}

pub fn stop_marker_path(state_dir: &Path, module: &str) -> PathBuf {
    state_dir.join(format!("{}{}", module, STOP_MARKER_SUFFIX))
}

fn state_error(path: PathBuf) -> impl FnOnce(io::Error) -> StageError {
    move |source| StageError::State { path, source }
}

pub async fn write_heartbeat(state_dir: &Path, heartbeat: &Heartbeat) -> Result<(), StageError> {
    let path = heartbeat_path(state_dir, &heartbeat.module);
    let body = serde_json::to_vec_pretty(heartbeat)
        .map_err(|e| state_error(path.clone())(io::Error::other(e)))?;
    let file_name = format!("{}{}", heartbeat.module, HEARTBEAT_SUFFIX);

    write_atomic(state_dir, &file_name, &body)
        .await
        .map(|_| ())
        .map_err(|err| match err {
            StageError::Sink { path, source } => StageError::State { path, source },
            other => other,
        })
}

/// Latest heartbeat for `module`, or `None` if it never wrote one.
pub async fn read_heartbeat(state_dir: &Path, module: &str) -> Result<Option<Heartbeat>, StageError> {
    let path = heartbeat_path(state_dir, module);
    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => return Err(StageError::State { path, source }),
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|e| state_error(path)(io::Error::other(e)))
}

pub async fn request_stop(state_dir: &Path, module: &str) -> Result<(), StageError> {
    let path = stop_marker_path(state_dir, module);
    tokio::fs::create_dir_all(state_dir)
        .await
        .map_err(state_error(path.clone()))?;
    tokio::fs::write(&path, Utc::now().to_rfc3339())
        .await
        .map_err(state_error(path))
}

/// Remove a stale stop marker; absent markers are fine.
pub async fn clear_stop(state_dir: &Path, module: &str) -> Result<(), StageError> {
    let path = stop_marker_path(state_dir, module);
    match tokio::fs::remove_file(&path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(StageError::State { path, source }),
    }
}

pub async fn stop_requested(state_dir: &Path, module: &str) -> bool {
    tokio::fs::try_exists(stop_marker_path(state_dir, module))
        .await
        .unwrap_or(false)
}

/// Cancel `token` once a stop marker for `module` appears.
pub fn spawn_stop_watcher(
    state_dir: PathBuf,
    module: String,
    token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(STOP_POLL_INTERVAL) => {
                    if stop_requested(&state_dir, &module).await {
                        tracing::info!(module = module.as_str(), "Stop requested by supervisor");
                        token.cancel();
                        break;
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn heartbeat(module: &str) -> Heartbeat {
        Heartbeat {
            module: module.to_string(),
            pid: 42,
            timestamp: Utc::now(),
            phase: WorkerPhase::Idle,
            stats: WorkerStats {
                processed: 3,
                failed: 1,
                rejected: 0,
            },
            last_file: Some("memo.json".to_string()),
        }
    }

    #[tokio::test]
    async fn test_heartbeat_round_trip() {
        let dir = TempDir::new().unwrap();
        assert_eq!(read_heartbeat(dir.path(), "prime").await.unwrap(), None);

        let beat = heartbeat("prime");
        write_heartbeat(dir.path(), &beat).await.unwrap();
        assert_eq!(read_heartbeat(dir.path(), "prime").await.unwrap(), Some(beat));
    }

    #[test]
    fn test_age_never_negative() {
        let mut beat = heartbeat("prime");
        beat.timestamp = Utc::now() + chrono::Duration::seconds(30);
        assert_eq!(beat.age(Utc::now()), Duration::ZERO);

        beat.timestamp = Utc::now() - chrono::Duration::seconds(90);
        assert!(beat.age(Utc::now()) >= Duration::from_secs(90));
    }

    #[tokio::test]
    async fn test_stop_marker_lifecycle() {
        let dir = TempDir::new().unwrap();
        let state = dir.path().join("state");
        assert!(!stop_requested(&state, "whisper").await);

        request_stop(&state, "whisper").await.unwrap();
        assert!(stop_requested(&state, "whisper").await);
        assert!(!stop_requested(&state, "extractor").await);

        clear_stop(&state, "whisper").await.unwrap();
        clear_stop(&state, "whisper").await.unwrap();
        assert!(!stop_requested(&state, "whisper").await);
    }

    #[tokio::test]
    async fn test_stop_watcher_cancels_token() {
        let dir = TempDir::new().unwrap();
        let token = CancellationToken::new();
        let watcher = spawn_stop_watcher(dir.path().to_path_buf(), "synthesis".to_string(), token.clone());

        request_stop(dir.path(), "synthesis").await.unwrap();
        tokio::time::timeout(Duration::from_secs(5), token.cancelled())
            .await
            .unwrap();
        watcher.await.unwrap();
    }
}
