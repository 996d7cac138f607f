// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Error taxonomy for the stage runtime.
//!
//! Each variant maps onto one branch of the worker state machine:
//!
//! | Variant     | Worker reaction                                       |
//! |-------------|-------------------------------------------------------|
//! | `Scan`      | logged, treated as an empty scan, retried next cycle  |
//! | `Input`     | retryable failure, file is unclaimed                  |
//! | `Parse`     | terminal, file is quarantined immediately             |
//! | `Transform` | retried up to the retry limit, then quarantined       |
//! | `Sink`      | retryable failure, file is unclaimed                  |
//! | `Archive`   | logged, output is kept, never retried                 |
//! | `State`     | heartbeat/stop-marker I/O, logged and ignored         |

use std::path::PathBuf;
use thiserror::Error;

/// Failure reported by a stage's transform function.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TransformError {
    /// Business logic failed; the same input may succeed on a later attempt.
    #[error("transform failed: {0}")]
    Failed(String),

    /// The input does not satisfy the stage's schema. Retrying cannot help.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

#[derive(Debug, Error)]
pub enum StageError {
    #[error("[{stage}] cannot scan inbox '{}': {source}", .path.display())]
    Scan {
        stage: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[{stage}] cannot read '{file}': {source}")]
    Input {
        stage: String,
        file: String,
        #[source]
        source: std::io::Error,
    },

    #[error("[{stage}] malformed input '{file}': {reason}")]
    Parse {
        stage: String,
        file: String,
        reason: String,
    },

    #[error("[{stage}] transform of '{file}' failed on attempt {attempt}: {source}")]
    Transform {
        stage: String,
        file: String,
        attempt: u32,
        #[source]
        source: TransformError,
    },

    #[error("cannot write '{}': {source}", .path.display())]
    Sink {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[{stage}] cannot archive '{file}': {source}")]
    Archive {
        stage: String,
        file: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot update worker state file '{}': {source}", .path.display())]
    State {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StageError {
    /// Whether the failed file should go straight to quarantine.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StageError::Parse { .. }
                | StageError::Transform {
                    source: TransformError::InvalidInput(_),
                    ..
                }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_invalid_input_are_terminal() {
        let parse = StageError::Parse {
            stage: "extractor".to_string(),
            file: "a.json".to_string(),
            reason: "expected value".to_string(),
        };
        assert!(parse.is_terminal());

        let invalid = StageError::Transform {
            stage: "extractor".to_string(),
            file: "a.json".to_string(),
            attempt: 1,
            source: TransformError::InvalidInput("missing transcript".to_string()),
        };
        assert!(invalid.is_terminal());
    }

    #[test]
    fn test_transient_failures_are_retryable() {
        let failed = StageError::Transform {
            stage: "prime".to_string(),
            file: "a.json".to_string(),
            attempt: 2,
            source: TransformError::Failed("model offline".to_string()),
        };
        assert!(!failed.is_terminal());

        let sink = StageError::Sink {
            path: PathBuf::from("/tmp/out.json"),
            source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
        };
        assert!(!sink.is_terminal());
        assert!(sink.to_string().contains("disk full"));
    }

    #[test]
    fn test_error_messages_carry_context() {
        let err = StageError::Transform {
            stage: "categorizer".to_string(),
            file: "memo_extracted.json".to_string(),
            attempt: 3,
            source: TransformError::Failed("timeout".to_string()),
        };
        let msg = err.to_string();
        assert!(msg.contains("categorizer"));
        assert!(msg.contains("memo_extracted.json"));
        assert!(msg.contains("attempt 3"));
    }
}
