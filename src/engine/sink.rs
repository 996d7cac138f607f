// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Atomic file sink.
//!
//! Writes go to `<name>.tmp` next to the destination, are flushed to disk and
//! then renamed into place in one step. A reader either sees no file or the
//! complete file under its final name. On any failure before the rename the
//! scratch file is removed.

use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

use crate::engine::scanner::TEMP_SUFFIX;
use crate::errors::StageError;

/// Write `payload` to `dir/relative_path` atomically and return the final path.
///
/// `relative_path` may contain sub-directories, which are created.
pub async fn write_atomic(
    dir: &Path,
    relative_path: &str,
    payload: &[u8],
) -> Result<PathBuf, StageError> {
    let destination = dir.join(relative_path);
    let scratch = scratch_path(&destination);

    let sink_error = |source| StageError::Sink {
        path: destination.clone(),
        source,
    };

    if let Some(parent) = destination.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(sink_error)?;
    }

    if let Err(source) = write_and_rename(&scratch, &destination, payload).await {
        let _ = tokio::fs::remove_file(&scratch).await;
        return Err(sink_error(source));
    }
    Ok(destination)
}

async fn write_and_rename(
    scratch: &Path,
    destination: &Path,
    payload: &[u8],
) -> std::io::Result<()> {
    let mut file = tokio::fs::File::create(scratch).await?;
    file.write_all(payload).await?;
    file.sync_all().await?;
    drop(file);
    tokio::fs::rename(scratch, destination).await
}

fn scratch_path(destination: &Path) -> PathBuf {
    let mut name = destination
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(TEMP_SUFFIX);
    destination.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::scanner::InboxScanner;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_creates_directories_and_leaves_no_scratch() {
        let dir = TempDir::new().unwrap();
        let path = write_atomic(dir.path(), "structured_memo/memo_table.txt", b"table")
            .await
            .unwrap();

        assert_eq!(path, dir.path().join("structured_memo/memo_table.txt"));
        assert_eq!(std::fs::read(&path).unwrap(), b"table");
        assert!(!dir.path().join("structured_memo/memo_table.txt.tmp").exists());
    }

    #[tokio::test]
    async fn test_overwrite_replaces_whole_file() {
        let dir = TempDir::new().unwrap();
        write_atomic(dir.path(), "a.json", b"a much longer first version").await.unwrap();
        write_atomic(dir.path(), "a.json", b"short").await.unwrap();

        assert_eq!(std::fs::read(dir.path().join("a.json")).unwrap(), b"short");
    }

    #[tokio::test]
    async fn test_failure_removes_scratch_and_reports_destination() {
        let dir = TempDir::new().unwrap();
        // a directory squatting on the final name makes the rename fail
        std::fs::create_dir(dir.path().join("taken.json")).unwrap();
        std::fs::write(dir.path().join("taken.json/inner"), b"x").unwrap();

        let err = write_atomic(dir.path(), "taken.json", b"payload").await.unwrap_err();
        assert!(matches!(err, StageError::Sink { ref path, .. } if path.ends_with("taken.json")));
        assert!(!dir.path().join("taken.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_concurrent_scanner_never_sees_partial_files() {
        let dir = TempDir::new().unwrap();
        let inbox = dir.path().to_path_buf();
        let payload = vec![b'x'; 4 * 1024 * 1024];

        let writer = {
            let inbox = inbox.clone();
            let payload = payload.clone();
            tokio::spawn(async move {
                for i in 0..5 {
                    write_atomic(&inbox, &format!("big{}.json", i), &payload).await.unwrap();
                }
            })
        };

        let scanner = InboxScanner::new("extractor", &[]);
        while !writer.is_finished() {
            for path in scanner.scan(&inbox).await.unwrap() {
                let len = std::fs::metadata(&path).unwrap().len();
                assert_eq!(len, payload.len() as u64, "{} was partial", path.display());
            }
            tokio::task::yield_now().await;
        }
        writer.await.unwrap();
        assert_eq!(scanner.scan(&inbox).await.unwrap().len(), 5);
    }
}
