// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use crate::config::{Config, ModuleSettings, SupervisorConfig};
use crate::engine::heartbeat::{stop_marker_path, write_heartbeat, Heartbeat};
use crate::engine::{WorkerPhase, WorkerStats};
use crate::errors::SupervisorError;
use crate::stages::StageKind;
use crate::supervisor::{ModuleStatus, StatusReport, Supervisor, SupervisorState};
use crate::traits::{WorkerExit, WorkerHandle, WorkerLauncher};

/// Integration tests for the supervisor control loop against in-memory workers
#[cfg(test)]
mod tests {
    use super::*;

    type ExitSlot = Arc<Mutex<Option<WorkerExit>>>;

    #[derive(Default)]
    struct FakeState {
        next_pid: u32,
        launches: Vec<String>,
        kills: Vec<String>,
        failing: HashSet<String>,
        /// Modules whose workers exit on their own once a stop marker appears
        obedient: HashSet<String>,
        /// Exit slot of the latest handle per module
        current: HashMap<String, ExitSlot>,
    }

    #[derive(Clone)]
    struct FakeLauncher {
        state_dir: PathBuf,
        inner: Arc<Mutex<FakeState>>,
    }

    impl FakeLauncher {
        fn new(state_dir: &Path) -> Self {
            Self {
                state_dir: state_dir.to_path_buf(),
                inner: Arc::new(Mutex::new(FakeState {
                    next_pid: 1000,
                    ..Default::default()
                })),
            }
        }

        fn crash(&self, module: &str, code: i32) {
            let inner = self.inner.lock().unwrap();
            *inner.current[module].lock().unwrap() = Some(WorkerExit {
                code: Some(code),
                success: false,
            });
        }

        fn fail_launches(&self, module: &str) {
            self.inner.lock().unwrap().failing.insert(module.to_string());
        }

        fn obey_stop(&self, module: &str) {
            self.inner.lock().unwrap().obedient.insert(module.to_string());
        }

        fn launches(&self, module: &str) -> usize {
            let inner = self.inner.lock().unwrap();
            inner.launches.iter().filter(|name| *name == module).count()
        }

        fn launch_order(&self) -> Vec<String> {
            self.inner.lock().unwrap().launches.clone()
        }

        fn kills(&self) -> Vec<String> {
            self.inner.lock().unwrap().kills.clone()
        }
    }

    #[async_trait]
    impl WorkerLauncher for FakeLauncher {
        async fn launch(&self, module: &str) -> Result<Box<dyn WorkerHandle>, SupervisorError> {
            let mut inner = self.inner.lock().unwrap();
            inner.launches.push(module.to_string());
            if inner.failing.contains(module) {
                return Err(SupervisorError::Spawn {
                    module: module.to_string(),
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such binary"),
                });
            }

            inner.next_pid += 1;
            let exit: ExitSlot = Arc::new(Mutex::new(None));
            inner.current.insert(module.to_string(), exit.clone());
            Ok(Box::new(FakeHandle {
                module: module.to_string(),
                pid: inner.next_pid,
                exit,
                obeys_stop: inner.obedient.contains(module),
                state_dir: self.state_dir.clone(),
                launcher: self.inner.clone(),
            }))
        }
    }

    struct FakeHandle {
        module: String,
        pid: u32,
        exit: ExitSlot,
        obeys_stop: bool,
        state_dir: PathBuf,
        launcher: Arc<Mutex<FakeState>>,
    }

    #[async_trait]
    impl WorkerHandle for FakeHandle {
        fn pid(&self) -> Option<u32> {
            Some(self.pid)
        }

        fn try_exit(&mut self) -> Result<Option<WorkerExit>, SupervisorError> {
            let mut exit = self.exit.lock().unwrap();
            if exit.is_none()
                && self.obeys_stop
                && stop_marker_path(&self.state_dir, &self.module).exists()
            {
                *exit = Some(WorkerExit {
                    code: Some(0),
                    success: true,
                });
            }
            Ok(*exit)
        }

        async fn kill(&mut self) -> Result<(), SupervisorError> {
            self.launcher.lock().unwrap().kills.push(self.module.clone());
            *self.exit.lock().unwrap() = Some(WorkerExit {
                code: None,
                success: false,
            });
            Ok(())
        }
    }

    /// Only whisper and extractor enabled; restarts happen without delay.
    fn two_module_config(root: &Path) -> Config {
        let mut cfg = Config::rooted_at(root);
        for kind in StageKind::ALL {
            if !matches!(kind, StageKind::Whisper | StageKind::Extractor) {
                cfg.modules.insert(
                    kind.name().to_string(),
                    ModuleSettings {
                        enabled: Some(false),
                        ..Default::default()
                    },
                );
            }
        }
        cfg.supervisor = SupervisorConfig {
            health_check_interval_secs: 1,
            heartbeat_staleness_secs: 60,
            restart_backoff_secs: 0,
            max_restart_backoff_secs: 0,
            max_restarts: 2,
            restart_window_secs: 300,
            shutdown_grace_secs: 1,
            start_stagger_ms: 0,
        };
        cfg
    }

    async fn started(cfg: &Config, launcher: &FakeLauncher) -> Supervisor {
        let mut supervisor = Supervisor::new(cfg, Box::new(launcher.clone()));
        supervisor.start_all(&CancellationToken::new()).await;
        supervisor
    }

    async fn stored(cfg: &Config) -> SupervisorState {
        SupervisorState::load(&cfg.state_dir())
            .await
            .unwrap()
            .expect("status store written")
    }

    #[tokio::test]
    async fn test_start_all_launches_in_pipeline_order() {
        let tmp = TempDir::new().unwrap();
        let cfg = two_module_config(tmp.path());
        let launcher = FakeLauncher::new(&cfg.state_dir());

        let supervisor = started(&cfg, &launcher).await;
        assert_eq!(supervisor.modules(), ["whisper", "extractor"]);
        assert_eq!(launcher.launch_order(), vec!["whisper", "extractor"]);

        let state = stored(&cfg).await;
        assert_eq!(state.modules.len(), 2);
        let whisper = &state.modules["whisper"];
        assert_eq!(whisper.status, ModuleStatus::Running);
        assert_eq!(whisper.pid, Some(1001));
        assert_eq!(whisper.restart_count, 0);
    }

    #[tokio::test]
    async fn test_crashed_worker_is_restarted() {
        let tmp = TempDir::new().unwrap();
        let cfg = two_module_config(tmp.path());
        let launcher = FakeLauncher::new(&cfg.state_dir());
        let mut supervisor = started(&cfg, &launcher).await;

        launcher.crash("whisper", 1);
        supervisor.check_health().await;

        assert_eq!(launcher.launches("whisper"), 2);
        assert_eq!(launcher.launches("extractor"), 1);
        let state = stored(&cfg).await;
        let whisper = &state.modules["whisper"];
        assert_eq!(whisper.status, ModuleStatus::Running);
        assert_eq!(whisper.restart_count, 1);
        assert_eq!(whisper.pid, Some(1003));
        assert!(whisper.alert.is_none());
    }

    #[tokio::test]
    async fn test_restart_budget_stops_module_with_alert() {
        let tmp = TempDir::new().unwrap();
        let cfg = two_module_config(tmp.path());
        let launcher = FakeLauncher::new(&cfg.state_dir());
        let mut supervisor = started(&cfg, &launcher).await;

        for _ in 0..3 {
            launcher.crash("extractor", 2);
            supervisor.check_health().await;
        }

        assert_eq!(launcher.launches("extractor"), 3);
        let state = stored(&cfg).await;
        let extractor = &state.modules["extractor"];
        assert_eq!(extractor.status, ModuleStatus::Stopped);
        assert_eq!(extractor.restart_count, 2);
        assert!(extractor.alert.as_deref().unwrap().contains("restart budget"));
        assert_eq!(state.modules["whisper"].status, ModuleStatus::Running);

        // a stopped module stays stopped
        supervisor.check_health().await;
        assert_eq!(launcher.launches("extractor"), 3);
    }

    #[tokio::test]
    async fn test_failed_launch_counts_against_budget() {
        let tmp = TempDir::new().unwrap();
        let cfg = two_module_config(tmp.path());
        let launcher = FakeLauncher::new(&cfg.state_dir());
        launcher.fail_launches("whisper");

        let mut supervisor = started(&cfg, &launcher).await;
        assert_eq!(
            supervisor.state().modules["whisper"].status,
            ModuleStatus::Restarting
        );

        supervisor.check_health().await;
        supervisor.check_health().await;

        assert_eq!(launcher.launches("whisper"), 3);
        let whisper = &supervisor.state().modules["whisper"];
        assert_eq!(whisper.status, ModuleStatus::Stopped);
        assert!(whisper.alert.is_some());
    }

    #[tokio::test]
    async fn test_stale_heartbeat_gets_worker_replaced() {
        let tmp = TempDir::new().unwrap();
        let mut cfg = two_module_config(tmp.path());
        cfg.supervisor.heartbeat_staleness_secs = 0;
        let launcher = FakeLauncher::new(&cfg.state_dir());
        let mut supervisor = started(&cfg, &launcher).await;

        tokio::time::sleep(Duration::from_millis(20)).await;
        supervisor.check_health().await;

        assert_eq!(launcher.kills(), vec!["whisper", "extractor"]);
        assert_eq!(launcher.launches("whisper"), 2);
        assert_eq!(supervisor.state().modules["whisper"].restart_count, 1);
    }

    #[tokio::test]
    async fn test_fresh_heartbeat_updates_last_activity() {
        let tmp = TempDir::new().unwrap();
        let cfg = two_module_config(tmp.path());
        let launcher = FakeLauncher::new(&cfg.state_dir());
        let mut supervisor = started(&cfg, &launcher).await;

        let heartbeat = Heartbeat {
            module: "whisper".to_string(),
            pid: 1001,
            timestamp: chrono::Utc::now(),
            phase: WorkerPhase::Idle,
            stats: WorkerStats::default(),
            last_file: None,
        };
        write_heartbeat(&cfg.state_dir(), &heartbeat).await.unwrap();
        supervisor.check_health().await;

        let whisper = &supervisor.state().modules["whisper"];
        assert_eq!(whisper.status, ModuleStatus::Running);
        assert_eq!(whisper.last_activity, Some(heartbeat.timestamp));
        assert!(launcher.kills().is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_stops_gracefully_then_kills_stragglers() {
        let tmp = TempDir::new().unwrap();
        let cfg = two_module_config(tmp.path());
        let launcher = FakeLauncher::new(&cfg.state_dir());
        launcher.obey_stop("whisper");
        let mut supervisor = started(&cfg, &launcher).await;

        supervisor.shutdown().await;

        assert!(stop_marker_path(&cfg.state_dir(), "whisper").exists());
        assert!(stop_marker_path(&cfg.state_dir(), "extractor").exists());
        assert_eq!(launcher.kills(), vec!["extractor"]);

        let state = stored(&cfg).await;
        assert!(state
            .modules
            .values()
            .all(|module| module.status == ModuleStatus::Stopped && module.pid.is_none()));
    }

    #[tokio::test]
    async fn test_run_returns_after_cancellation() {
        let tmp = TempDir::new().unwrap();
        let cfg = two_module_config(tmp.path());
        let launcher = FakeLauncher::new(&cfg.state_dir());
        launcher.obey_stop("whisper");
        launcher.obey_stop("extractor");

        let mut supervisor = Supervisor::new(&cfg, Box::new(launcher.clone()));
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            canceller.cancel();
        });

        tokio::time::timeout(Duration::from_secs(5), supervisor.run(token))
            .await
            .expect("supervisor stopped in time");
        assert!(launcher.kills().is_empty());

        let report = StatusReport::load(&cfg).await.unwrap();
        assert_eq!(report.rows.len(), 2);
        assert!(report
            .rows
            .iter()
            .all(|row| row.state.as_ref().unwrap().status == ModuleStatus::Stopped));
    }

    #[tokio::test]
    async fn test_status_query_fails_on_corrupt_store() {
        let tmp = TempDir::new().unwrap();
        let cfg = two_module_config(tmp.path());
        std::fs::create_dir_all(cfg.state_dir()).unwrap();
        std::fs::write(
            SupervisorState::status_path(&cfg.state_dir()),
            b"not json at all",
        )
        .unwrap();

        let err = StatusReport::load(&cfg).await.unwrap_err();
        assert!(matches!(err, SupervisorError::StatusStore { .. }));
    }
}
