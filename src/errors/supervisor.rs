// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::path::PathBuf;
use thiserror::Error;

/// Control-plane errors raised by the supervisor and the status query.
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("worker '{module}' exited unexpectedly: {reason}")]
    WorkerCrash { module: String, reason: String },

    #[error(
        "worker '{module}' exceeded its restart budget ({restarts} restarts within {window_secs}s); \
         module stopped, operator intervention required"
    )]
    RestartBudgetExceeded {
        module: String,
        restarts: u32,
        window_secs: u64,
    },

    #[error("failed to spawn worker '{module}': {source}")]
    Spawn {
        module: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to control worker '{module}': {source}")]
    Control {
        module: String,
        #[source]
        source: std::io::Error,
    },

    #[error("status store '{}' is unreadable: {reason}", .path.display())]
    StatusStore { path: PathBuf, reason: String },

    #[error("unknown module '{name}'. Available modules: {available}")]
    UnknownModule { name: String, available: String },
}
