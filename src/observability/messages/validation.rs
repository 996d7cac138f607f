// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for configuration loading and validation.

use crate::errors::ValidationError;
use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use std::path::Path;

/// Configuration file parsed and accepted.
///
/// # Log Level
/// `info!` - Important operational event
pub struct ConfigLoaded<'a> {
    pub path: &'a Path,
    pub enabled_modules: usize,
    pub auto_transfer: bool,
}

impl Display for ConfigLoaded<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Loaded {} with {} enabled module(s), auto_transfer={}",
            self.path.display(),
            self.enabled_modules,
            self.auto_transfer
        )
    }
}

impl StructuredLog for ConfigLoaded<'_> {
    fn log(&self) {
        tracing::info!(
            path = %self.path.display(),
            enabled_modules = self.enabled_modules,
            auto_transfer = self.auto_transfer,
            "{}", self
        );
    }
}

/// One problem found while validating the configuration.
///
/// # Log Level
/// `error!` - The process refuses to start
pub struct ValidationProblem<'a> {
    pub path: &'a Path,
    pub error: &'a ValidationError,
}

impl Display for ValidationProblem<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Invalid configuration in {}: {}", self.path.display(), self.error)
    }
}

impl StructuredLog for ValidationProblem<'_> {
    fn log(&self) {
        tracing::error!(path = %self.path.display(), error = %self.error, "{}", self);
    }
}
