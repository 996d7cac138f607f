// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Read-only status query behind the `status` command.

use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt;

use crate::config::Config;
use crate::engine::heartbeat::read_heartbeat;
use crate::errors::SupervisorError;
use crate::supervisor::state::{ModuleState, SupervisorState};

/// One line of the status table.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusRow {
    pub module: String,
    /// `None` when no supervisor has recorded the module yet
    pub state: Option<ModuleState>,
    pub last_activity: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatusReport {
    pub updated_at: Option<DateTime<Utc>>,
    pub rows: Vec<StatusRow>,
}

impl StatusReport {
    /// Combine the status store with the workers' heartbeats. Never signals
    /// or otherwise touches a worker.
    pub async fn load(cfg: &Config) -> Result<Self, SupervisorError> {
        let state_dir = cfg.state_dir();
        let stored = SupervisorState::load(&state_dir).await?;

        let mut modules: Vec<String> = cfg
            .enabled_modules()
            .into_iter()
            .map(|kind| kind.name().to_string())
            .collect();
        if let Some(stored) = &stored {
            for module in stored.modules.keys() {
                if !modules.contains(module) {
                    modules.push(module.clone());
                }
            }
        }

        let mut rows = Vec::with_capacity(modules.len());
        for module in modules {
            let state = stored
                .as_ref()
                .and_then(|stored| stored.modules.get(&module))
                .cloned();
            let heartbeat = match read_heartbeat(&state_dir, &module).await {
                Ok(heartbeat) => heartbeat.map(|heartbeat| heartbeat.timestamp),
                Err(err) => {
                    tracing::warn!(module = module.as_str(), error = %err, "Heartbeat unreadable");
                    None
                }
            };
            let recorded = state.as_ref().and_then(|state| state.last_activity);
            rows.push(StatusRow {
                last_activity: heartbeat.max(recorded),
                module,
                state,
            });
        }

        Ok(Self {
            updated_at: stored.map(|stored| stored.updated_at),
            rows,
        })
    }
}

fn timestamp(value: Option<DateTime<Utc>>) -> String {
    value
        .map(|at| at.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_else(|| "-".to_string())
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.updated_at {
            Some(_) => writeln!(f, "Supervisor status as of {}", timestamp(self.updated_at))?,
            None => writeln!(f, "No supervisor status recorded yet")?,
        }
        writeln!(
            f,
            "{:<16} {:<11} {:>8} {:>8}  {:<21} ALERT",
            "MODULE", "STATE", "PID", "RESTARTS", "LAST ACTIVITY"
        )?;
        for row in &self.rows {
            let (status, pid, restarts, alert) = match &row.state {
                Some(state) => (
                    state.status.to_string(),
                    state
                        .pid
                        .map(|pid| pid.to_string())
                        .unwrap_or_else(|| "-".to_string()),
                    state.restart_count.to_string(),
                    state.alert.clone().unwrap_or_default(),
                ),
                None => (
                    "not started".to_string(),
                    "-".to_string(),
                    "0".to_string(),
                    String::new(),
                ),
            };
            writeln!(
                f,
                "{:<16} {:<11} {:>8} {:>8}  {:<21} {}",
                row.module,
                status,
                pid,
                restarts,
                timestamp(row.last_activity),
                alert
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::supervisor::state::ModuleStatus;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_report_without_store_lists_enabled_modules() {
        let tmp = TempDir::new().unwrap();
        let cfg = Config::rooted_at(tmp.path());

        let report = StatusReport::load(&cfg).await.unwrap();
        assert!(report.updated_at.is_none());
        assert_eq!(report.rows.len(), 8);
        assert!(report.rows.iter().all(|row| row.state.is_none()));

        let rendered = report.to_string();
        assert!(rendered.starts_with("No supervisor status recorded yet\n"));
        assert!(rendered.contains("cloud_dispatch"));
        assert!(rendered.contains("not started"));
    }

    #[tokio::test]
    async fn test_report_shows_alerts_and_restarts() {
        let tmp = TempDir::new().unwrap();
        let cfg = Config::rooted_at(tmp.path());

        let mut state = SupervisorState::new();
        let prime = state.module_mut("prime");
        prime.status = ModuleStatus::Stopped;
        prime.restart_count = 6;
        prime.alert = Some("restart budget exceeded".to_string());
        state.persist(&cfg.state_dir()).await.unwrap();

        let report = StatusReport::load(&cfg).await.unwrap();
        let row = report
            .rows
            .iter()
            .find(|row| row.module == "prime")
            .unwrap();
        assert_eq!(row.state.as_ref().unwrap().restart_count, 6);

        let line = report
            .to_string()
            .lines()
            .find(|line| line.starts_with("prime"))
            .unwrap()
            .to_string();
        assert!(line.contains("stopped"));
        assert!(line.ends_with("restart budget exceeded"));
    }
}
