// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Stage workers as child processes of the supervisor.

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::{Child, Command};

use crate::errors::SupervisorError;
use crate::traits::{WorkerExit, WorkerHandle, WorkerLauncher};

/// Runs `<exe> --config <path> run-module <name>` for each module.
pub struct ProcessLauncher {
    exe: PathBuf,
    config_path: PathBuf,
}

impl ProcessLauncher {
    pub fn new(exe: PathBuf, config_path: PathBuf) -> Self {
        Self { exe, config_path }
    }
}

#[async_trait]
impl WorkerLauncher for ProcessLauncher {
    async fn launch(&self, module: &str) -> Result<Box<dyn WorkerHandle>, SupervisorError> {
        let child = Command::new(&self.exe)
            .arg("--config")
            .arg(&self.config_path)
            .arg("run-module")
            .arg(module)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| SupervisorError::Spawn {
                module: module.to_string(),
                source,
            })?;

        Ok(Box::new(ProcessHandle {
            module: module.to_string(),
            child,
        }))
    }
}

pub struct ProcessHandle {
    module: String,
    child: Child,
}

impl ProcessHandle {
    fn control_error(&self, source: std::io::Error) -> SupervisorError {
        SupervisorError::Control {
            module: self.module.clone(),
            source,
        }
    }
}

#[async_trait]
impl WorkerHandle for ProcessHandle {
    fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    fn try_exit(&mut self) -> Result<Option<WorkerExit>, SupervisorError> {
        match self.child.try_wait() {
            Ok(status) => Ok(status.map(|status| WorkerExit {
                code: status.code(),
                success: status.success(),
            })),
            Err(e) => Err(self.control_error(e)),
        }
    }

    async fn kill(&mut self) -> Result<(), SupervisorError> {
        match self.child.kill().await {
            Ok(()) => Ok(()),
            Err(e) => Err(self.control_error(e)),
        }
    }
}
