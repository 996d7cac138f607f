// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod loader;
mod validation;

#[cfg(test)]
mod integration_tests;
pub mod consts;

pub use loader::{
    load_and_validate_config, load_config, Config, LogLevel, LoggingConfig, ModuleConfig,
    ModuleSettings, SupervisorConfig,
};
pub use validation::validate_config;
