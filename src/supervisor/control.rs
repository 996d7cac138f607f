// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The supervisor control loop.
//!
//! The supervisor never touches pipeline data. It starts one worker per enabled
//! module, checks on them every health-check interval and restarts the ones
//! that died. A module that keeps dying is parked as `stopped` with an alert
//! once its restart budget for the rolling window is used up.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::config::{Config, SupervisorConfig};
use crate::engine::heartbeat::{clear_stop, read_heartbeat, request_stop};
use crate::errors::SupervisorError;
use crate::observability::messages::supervisor::*;
use crate::observability::messages::StructuredLog;
use crate::supervisor::restart::{RestartDecision, RestartPolicy, RestartTracker};
use crate::supervisor::state::{ModuleStatus, SupervisorState};
use crate::traits::{WorkerExit, WorkerHandle, WorkerLauncher};

const SHUTDOWN_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Default)]
struct ManagedWorker {
    handle: Option<Box<dyn WorkerHandle>>,
    tracker: RestartTracker,
    restart_at: Option<Instant>,
    launched_at: Option<DateTime<Utc>>,
}

/// What a health check found out about a running worker.
enum Health {
    Alive { last_activity: Option<DateTime<Utc>> },
    Exited(String),
    Stale(Duration),
}

pub struct Supervisor {
    settings: SupervisorConfig,
    state_dir: PathBuf,
    /// Pipeline order
    modules: Vec<String>,
    launcher: Box<dyn WorkerLauncher>,
    policy: RestartPolicy,
    workers: HashMap<String, ManagedWorker>,
    state: SupervisorState,
}

impl Supervisor {
    pub fn new(cfg: &Config, launcher: Box<dyn WorkerLauncher>) -> Self {
        let modules: Vec<String> = cfg
            .enabled_modules()
            .into_iter()
            .map(|kind| kind.name().to_string())
            .collect();
        let mut state = SupervisorState::new();
        for module in &modules {
            state.module_mut(module);
        }

        Self {
            settings: cfg.supervisor.clone(),
            state_dir: cfg.state_dir(),
            policy: RestartPolicy::from_config(&cfg.supervisor),
            workers: modules
                .iter()
                .map(|module| (module.clone(), ManagedWorker::default()))
                .collect(),
            modules,
            launcher,
            state,
        }
    }

    pub fn modules(&self) -> &[String] {
        &self.modules
    }

    pub fn state(&self) -> &SupervisorState {
        &self.state
    }

    /// Start workers, check on them until `shutdown` fires, then stop them.
    pub async fn run(&mut self, shutdown: CancellationToken) {
        let started = SupervisorStarted {
            modules: self.modules.len(),
            health_check_interval: self.settings.health_check_interval(),
        };
        started.log();
        let span = started.span("run");

        async {
            self.start_all(&shutdown).await;
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(self.settings.health_check_interval()) => {
                        self.check_health().await;
                    }
                }
            }
            self.shutdown().await;
        }
        .instrument(span)
        .await
    }

    /// Launch every module in pipeline order, `start_stagger` apart.
    pub async fn start_all(&mut self, shutdown: &CancellationToken) {
        for (index, module) in self.modules.clone().into_iter().enumerate() {
            if index > 0 {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(self.settings.start_stagger()) => {}
                }
            }
            if let Err(err) = clear_stop(&self.state_dir, &module).await {
                tracing::warn!(module = module.as_str(), error = %err, "Could not clear stop marker");
            }
            self.launch(&module).await;
        }
        self.persist().await;
    }

    /// One pass over all modules: detect exits and stale heartbeats, then
    /// relaunch whatever is due.
    pub async fn check_health(&mut self) {
        for module in self.modules.clone() {
            if self.state.module_mut(&module).status == ModuleStatus::Running {
                match self.probe(&module).await {
                    Health::Alive { last_activity } => {
                        let entry = self.state.module_mut(&module);
                        entry.last_seen = Some(Utc::now());
                        if last_activity.is_some() {
                            entry.last_activity = last_activity;
                        }
                    }
                    Health::Exited(reason) => {
                        self.on_crash(&module, crash(&module, reason));
                    }
                    Health::Stale(age) => {
                        WorkerStale {
                            module: &module,
                            age,
                            limit: self.settings.heartbeat_staleness(),
                        }
                        .log();
                        self.kill(&module).await;
                        let cause = crash(&module, "heartbeat went stale".to_string());
                        self.on_crash(&module, cause);
                    }
                }
            }

            let due = self
                .workers
                .get(&module)
                .and_then(|worker| worker.restart_at)
                .is_some_and(|at| at <= Instant::now());
            if due && self.state.module_mut(&module).status == ModuleStatus::Restarting {
                self.launch(&module).await;
            }
        }
        self.persist().await;
    }

    /// Ask every worker to stop at its next idle boundary, wait out the grace
    /// period, then kill whatever is left.
    pub async fn shutdown(&mut self) {
        let running: Vec<String> = self
            .modules
            .iter()
            .rev()
            .filter(|module| {
                self.workers
                    .get(*module)
                    .is_some_and(|worker| worker.handle.is_some())
            })
            .cloned()
            .collect();
        ShutdownRequested {
            running: running.len(),
            grace: self.settings.shutdown_grace(),
        }
        .log();

        for module in &running {
            if let Err(err) = request_stop(&self.state_dir, module).await {
                tracing::warn!(module = module.as_str(), error = %err, "Could not write stop marker");
            }
        }

        let deadline = Instant::now() + self.settings.shutdown_grace();
        let mut remaining = running;
        loop {
            let mut still_running = Vec::new();
            for module in remaining {
                match self.exit_status(&module) {
                    Ok(Some(_)) => {
                        self.release(&module);
                        WorkerStopped {
                            module: &module,
                            forced: false,
                        }
                        .log();
                    }
                    Ok(None) => still_running.push(module),
                    Err(err) => {
                        tracing::warn!(module = module.as_str(), error = %err, "Exit check failed");
                        still_running.push(module);
                    }
                }
            }
            remaining = still_running;
            if remaining.is_empty() || Instant::now() >= deadline {
                break;
            }
            tokio::time::sleep(SHUTDOWN_POLL_INTERVAL).await;
        }

        for module in &remaining {
            self.kill(module).await;
            WorkerStopped {
                module,
                forced: true,
            }
            .log();
        }

        for module in self.modules.clone() {
            let entry = self.state.module_mut(&module);
            entry.status = ModuleStatus::Stopped;
            entry.pid = None;
            if let Some(worker) = self.workers.get_mut(&module) {
                worker.restart_at = None;
            }
        }
        self.persist().await;
    }

    async fn launch(&mut self, module: &str) {
        match self.launcher.launch(module).await {
            Ok(handle) => {
                let pid = handle.pid();
                WorkerLaunched { module, pid }.log();
                let now = Utc::now();
                if let Some(worker) = self.workers.get_mut(module) {
                    worker.handle = Some(handle);
                    worker.restart_at = None;
                    worker.launched_at = Some(now);
                }
                let entry = self.state.module_mut(module);
                entry.status = ModuleStatus::Running;
                entry.pid = pid;
                entry.last_seen = Some(now);
            }
            Err(err) => {
                LaunchFailed {
                    module,
                    error: &err,
                }
                .log();
                self.on_crash(module, err);
            }
        }
    }

    async fn probe(&mut self, module: &str) -> Health {
        match self.exit_status(module) {
            Ok(Some(exit)) => return Health::Exited(describe_exit(exit)),
            Ok(None) => {}
            Err(err) => {
                // a worker we can no longer observe is replaced
                self.kill(module).await;
                return Health::Exited(err.to_string());
            }
        }

        let heartbeat = match read_heartbeat(&self.state_dir, module).await {
            Ok(heartbeat) => heartbeat,
            Err(err) => {
                tracing::warn!(module, error = %err, "Heartbeat unreadable");
                None
            }
        };
        let launched_at = self
            .workers
            .get(module)
            .and_then(|worker| worker.launched_at)
            .unwrap_or_else(Utc::now);
        let last_activity = heartbeat
            .map(|heartbeat| heartbeat.timestamp)
            .filter(|timestamp| *timestamp >= launched_at);

        let last_alive = last_activity.unwrap_or(launched_at);
        let age = (Utc::now() - last_alive).to_std().unwrap_or(Duration::ZERO);
        if age > self.settings.heartbeat_staleness() {
            return Health::Stale(age);
        }
        Health::Alive { last_activity }
    }

    fn exit_status(&mut self, module: &str) -> Result<Option<WorkerExit>, SupervisorError> {
        match self
            .workers
            .get_mut(module)
            .and_then(|worker| worker.handle.as_mut())
        {
            Some(handle) => handle.try_exit(),
            None => Ok(Some(WorkerExit {
                code: None,
                success: false,
            })),
        }
    }

    async fn kill(&mut self, module: &str) {
        if let Some(mut handle) = self
            .workers
            .get_mut(module)
            .and_then(|worker| worker.handle.take())
        {
            if let Err(err) = handle.kill().await {
                tracing::error!(module, error = %err, "Failed to kill worker");
            }
        }
    }

    fn release(&mut self, module: &str) {
        if let Some(worker) = self.workers.get_mut(module) {
            worker.handle = None;
        }
        self.state.module_mut(module).pid = None;
    }

    fn on_crash(&mut self, module: &str, cause: SupervisorError) {
        WorkerCrashed {
            module,
            error: &cause,
        }
        .log();
        self.release(module);
        self.state.module_mut(module).status = ModuleStatus::Crashed;

        let Some(worker) = self.workers.get_mut(module) else {
            return;
        };
        match worker.tracker.record_crash(Instant::now(), &self.policy) {
            RestartDecision::Restart { attempt, after } => {
                worker.restart_at = Some(Instant::now() + after);
                RestartScheduled {
                    module,
                    attempt,
                    delay: after,
                }
                .log();
                let entry = self.state.module_mut(module);
                entry.status = ModuleStatus::Restarting;
                entry.restart_count += 1;
            }
            RestartDecision::GiveUp { restarts } => {
                worker.restart_at = None;
                let err = SupervisorError::RestartBudgetExceeded {
                    module: module.to_string(),
                    restarts,
                    window_secs: self.policy.window().as_secs(),
                };
                RestartBudgetExhausted { module, error: &err }.log();
                let entry = self.state.module_mut(module);
                entry.status = ModuleStatus::Stopped;
                entry.alert = Some(err.to_string());
            }
        }
    }

    async fn persist(&mut self) {
        if let Err(err) = self.state.persist(&self.state_dir).await {
            StatusPersistFailed {
                path: &SupervisorState::status_path(&self.state_dir),
                error: &err,
            }
            .log();
        }
    }
}

fn crash(module: &str, reason: String) -> SupervisorError {
    SupervisorError::WorkerCrash {
        module: module.to_string(),
        reason,
    }
}

fn describe_exit(exit: WorkerExit) -> String {
    match exit.code {
        Some(code) => format!("exited with code {}", code),
        None if exit.success => "exited".to_string(),
        None => "terminated by signal".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_exit() {
        let code = WorkerExit {
            code: Some(3),
            success: false,
        };
        let signal = WorkerExit {
            code: None,
            success: false,
        };
        assert_eq!(describe_exit(code), "exited with code 3");
        assert_eq!(describe_exit(signal), "terminated by signal");
    }
}
