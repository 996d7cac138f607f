// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::fmt;
use std::path::PathBuf;

/// Problems found while validating a loaded configuration.
///
/// Validation collects every problem rather than stopping at the first one, so
/// an operator can fix a config file in a single pass.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// A `modules` entry names a stage that does not exist
    UnknownModule {
        /// The unrecognized module name
        name: String,
    },
    /// Poll interval must be a positive, finite number of seconds
    InvalidPollInterval {
        module: String,
        value: f64,
    },
    /// A retry limit of zero would quarantine files without ever trying them
    ZeroRetryLimit {
        module: String,
    },
    /// A stage writing into its own inbox would consume its own output
    OutputIsInbox {
        module: String,
        path: PathBuf,
    },
    /// Two stages polling the same directory break the one-consumer rule
    SharedInbox {
        first: String,
        second: String,
        path: PathBuf,
    },
    /// A worker that polls slower than the heartbeat window looks hung
    HeartbeatWindowTooShort {
        module: String,
        poll_interval_secs: f64,
        staleness_secs: u64,
    },
    ZeroHealthCheckInterval,
    BackoffExceedsCap {
        base_secs: u64,
        cap_secs: u64,
    },
    ZeroRestartBudget,
    NoModulesEnabled,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::UnknownModule { name } => {
                write!(f, "Unknown module '{}' in configuration", name)
            }
            ValidationError::InvalidPollInterval { module, value } => {
                write!(
                    f,
                    "Module '{}' has invalid poll_interval_secs {}: must be a positive number",
                    module, value
                )
            }
            ValidationError::ZeroRetryLimit { module } => {
                write!(f, "Module '{}' has retry_limit 0: must be at least 1", module)
            }
            ValidationError::OutputIsInbox { module, path } => {
                write!(
                    f,
                    "Module '{}' writes output into its own inbox '{}'",
                    module,
                    path.display()
                )
            }
            ValidationError::SharedInbox { first, second, path } => {
                write!(
                    f,
                    "Modules '{}' and '{}' both poll inbox '{}'",
                    first,
                    second,
                    path.display()
                )
            }
            ValidationError::HeartbeatWindowTooShort {
                module,
                poll_interval_secs,
                staleness_secs,
            } => {
                write!(
                    f,
                    "Module '{}' polls every {}s but heartbeats go stale after {}s; \
                     the supervisor would restart a healthy worker",
                    module, poll_interval_secs, staleness_secs
                )
            }
            ValidationError::ZeroHealthCheckInterval => {
                write!(f, "supervisor.health_check_interval_secs must be at least 1")
            }
            ValidationError::BackoffExceedsCap { base_secs, cap_secs } => {
                write!(
                    f,
                    "supervisor.restart_backoff_secs ({}) exceeds max_restart_backoff_secs ({})",
                    base_secs, cap_secs
                )
            }
            ValidationError::ZeroRestartBudget => {
                write!(f, "supervisor.max_restarts must be at least 1")
            }
            ValidationError::NoModulesEnabled => {
                write!(f, "Every module is disabled; nothing to run")
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Errors raised while loading configuration or setting up logging.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Configuration validation failed:\n{}", format_validation_errors(.0))]
    Invalid(Vec<ValidationError>),

    #[error("Failed to initialize logging: {0}")]
    Logging(String),
}

fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}
