// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod config;
mod stage;
mod supervisor;

pub use config::{ConfigError, ValidationError};
pub use stage::{StageError, TransformError};
pub use supervisor::SupervisorError;
