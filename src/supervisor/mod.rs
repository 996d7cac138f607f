// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod control;
mod process;
pub mod restart;
pub mod state;
mod status;
#[cfg(test)]
mod integration_tests;

pub use control::Supervisor;
pub use process::{ProcessHandle, ProcessLauncher};
pub use restart::{RestartDecision, RestartPolicy, RestartTracker};
pub use state::{ModuleState, ModuleStatus, SupervisorState, STATUS_FILE};
pub use status::{StatusReport, StatusRow};
