// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;

use crate::errors::SupervisorError;

/// How a worker process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerExit {
    pub code: Option<i32>,
    pub success: bool,
}

/// A running worker owned by the supervisor.
#[async_trait]
pub trait WorkerHandle: Send {
    fn pid(&self) -> Option<u32>;

    /// Non-blocking exit check. `Ok(None)` while the worker is still running.
    fn try_exit(&mut self) -> Result<Option<WorkerExit>, SupervisorError>;

    /// Terminate the worker and reap it.
    async fn kill(&mut self) -> Result<(), SupervisorError>;
}

/// Starts stage workers. The production launcher spawns OS processes.
#[async_trait]
pub trait WorkerLauncher: Send + Sync {
    async fn launch(&self, module: &str) -> Result<Box<dyn WorkerHandle>, SupervisorError>;
}
