// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Configuration validation.
//!
//! Checks run in four groups and every problem found is reported, not just
//! the first:
//!
//! 1. **Module names**: every key under `modules` must name a known stage.
//! 2. **Per-module settings**: poll interval, retry limit and directory layout
//!    for each enabled stage.
//! 3. **Directory ownership**: each inbox has exactly one consumer, so no two
//!    enabled stages may poll the same directory.
//! 4. **Supervisor timing**: health-check interval and restart budget.

use crate::config::{Config, ModuleConfig};
use crate::errors::ValidationError;
use crate::stages::StageKind;
use std::collections::HashMap;
use std::path::PathBuf;

/// Validates a loaded configuration.
///
/// # Returns
/// * `Ok(())` - The configuration can be run
/// * `Err(Vec<ValidationError>)` - Every problem that was found
pub fn validate_config(cfg: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    validate_module_names(cfg, &mut errors);

    let enabled: Vec<ModuleConfig> = cfg
        .enabled_modules()
        .into_iter()
        .map(|kind| cfg.module(kind))
        .collect();

    if enabled.is_empty() {
        errors.push(ValidationError::NoModulesEnabled);
    }

    for module in &enabled {
        validate_module(cfg, module, &mut errors);
    }
    validate_inbox_ownership(&enabled, &mut errors);
    validate_supervisor(cfg, &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_module_names(cfg: &Config, errors: &mut Vec<ValidationError>) {
    for name in cfg.modules.keys() {
        if StageKind::from_name(name).is_none() {
            errors.push(ValidationError::UnknownModule { name: name.clone() });
        }
    }
}

fn validate_module(cfg: &Config, module: &ModuleConfig, errors: &mut Vec<ValidationError>) {
    let name = module.kind.name().to_string();

    if !module.poll_interval_secs.is_finite() || module.poll_interval_secs <= 0.0 {
        errors.push(ValidationError::InvalidPollInterval {
            module: name.clone(),
            value: module.poll_interval_secs,
        });
    } else if module.poll_interval_secs >= cfg.supervisor.heartbeat_staleness_secs as f64 {
        errors.push(ValidationError::HeartbeatWindowTooShort {
            module: name.clone(),
            poll_interval_secs: module.poll_interval_secs,
            staleness_secs: cfg.supervisor.heartbeat_staleness_secs,
        });
    }

    if module.retry_limit == 0 {
        errors.push(ValidationError::ZeroRetryLimit {
            module: name.clone(),
        });
    }

    if module.output == module.inbox {
        errors.push(ValidationError::OutputIsInbox {
            module: name,
            path: module.inbox.clone(),
        });
    }
}

fn validate_inbox_ownership(modules: &[ModuleConfig], errors: &mut Vec<ValidationError>) {
    let mut owners: HashMap<&PathBuf, StageKind> = HashMap::new();
    for module in modules {
        if let Some(first) = owners.get(&module.inbox) {
            errors.push(ValidationError::SharedInbox {
                first: first.name().to_string(),
                second: module.kind.name().to_string(),
                path: module.inbox.clone(),
            });
        } else {
            owners.insert(&module.inbox, module.kind);
        }
    }
}

fn validate_supervisor(cfg: &Config, errors: &mut Vec<ValidationError>) {
    let supervisor = &cfg.supervisor;

    if supervisor.health_check_interval_secs == 0 {
        errors.push(ValidationError::ZeroHealthCheckInterval);
    }
    if supervisor.restart_backoff_secs > supervisor.max_restart_backoff_secs {
        errors.push(ValidationError::BackoffExceedsCap {
            base_secs: supervisor.restart_backoff_secs,
            cap_secs: supervisor.max_restart_backoff_secs,
        });
    }
    if supervisor.max_restarts == 0 {
        errors.push(ValidationError::ZeroRestartBudget);
    }
}
