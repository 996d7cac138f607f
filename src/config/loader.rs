// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::config::consts::{
    ARCHIVE_DIR_NAME, DEFAULT_HEALTH_CHECK_INTERVAL_SECS, DEFAULT_HEARTBEAT_STALENESS_SECS,
    DEFAULT_LOG_DIR, DEFAULT_MAX_RESTARTS, DEFAULT_MAX_RESTART_BACKOFF_SECS,
    DEFAULT_POLL_INTERVAL_SECS, DEFAULT_RESTART_BACKOFF_SECS, DEFAULT_RESTART_WINDOW_SECS,
    DEFAULT_RETRY_LIMIT, DEFAULT_SHUTDOWN_GRACE_SECS, DEFAULT_START_STAGGER_MS,
    DEFAULT_STATE_DIR, REJECTED_DIR_NAME,
};
use crate::errors::ConfigError;
use crate::stages::StageKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Whole-pipeline configuration, loaded once per process and never mutated.
///
/// Every relative path in the file (module directories, `state_dir`,
/// `logging.log_dir`) is resolved against `root`.
///
/// # Example
/// ```yaml
/// root: /srv/filechain
/// auto_transfer: true
/// logging:
///   level: debug
/// supervisor:
///   health_check_interval_secs: 5
/// modules:
///   whisper:
///     poll_interval_secs: 2
///   synthesis:
///     enabled: false
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_root")]
    pub root: PathBuf,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Copy each stage's result into the next stage's inbox
    #[serde(default)]
    pub auto_transfer: bool,
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
    #[serde(default)]
    pub supervisor: SupervisorConfig,
    /// Keyed by stage name. Stages without an entry run with defaults.
    #[serde(default)]
    pub modules: BTreeMap<String, ModuleSettings>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root: default_root(),
            logging: LoggingConfig::default(),
            auto_transfer: false,
            state_dir: default_state_dir(),
            supervisor: SupervisorConfig::default(),
            modules: BTreeMap::new(),
        }
    }
}

impl Config {
    /// A default configuration whose directory tree lives under `root`.
    pub fn rooted_at(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        self.root.join(path)
    }

    pub fn state_dir(&self) -> PathBuf {
        self.resolve(&self.state_dir)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.resolve(&self.logging.log_dir)
    }

    /// Settings for one stage with every default filled in.
    pub fn module(&self, kind: StageKind) -> ModuleConfig {
        let settings = self.modules.get(kind.name()).cloned().unwrap_or_default();

        let inbox = self.resolve(settings.inbox.as_deref().unwrap_or(&kind.default_inbox()));
        let output = self.resolve(settings.output.as_deref().unwrap_or(&kind.default_output()));
        let final_output = self.resolve(
            settings
                .final_output
                .as_deref()
                .unwrap_or(&kind.default_final_output()),
        );
        let archive = settings
            .archive
            .map(|path| self.resolve(&path))
            .unwrap_or_else(|| inbox.join(ARCHIVE_DIR_NAME));
        let rejected = settings
            .rejected
            .map(|path| self.resolve(&path))
            .unwrap_or_else(|| inbox.join(REJECTED_DIR_NAME));

        ModuleConfig {
            kind,
            enabled: settings.enabled.unwrap_or(true),
            inbox,
            output,
            archive,
            rejected,
            final_output,
            poll_interval_secs: settings
                .poll_interval_secs
                .unwrap_or(DEFAULT_POLL_INTERVAL_SECS),
            retry_limit: settings.retry_limit.unwrap_or(DEFAULT_RETRY_LIMIT),
            output_formats: settings
                .output_formats
                .unwrap_or_else(|| kind.default_output_formats()),
            extensions: settings
                .extensions
                .unwrap_or_else(|| kind.default_extensions()),
        }
    }

    /// Stages that will run, in pipeline order.
    pub fn enabled_modules(&self) -> Vec<StageKind> {
        StageKind::ALL
            .into_iter()
            .filter(|kind| self.module(*kind).enabled)
            .collect()
    }

    /// Where results of `kind` are copied when auto-transfer is on.
    pub fn next_inbox(&self, kind: StageKind) -> Option<PathBuf> {
        if !self.auto_transfer {
            return None;
        }
        kind.next().map(|next| self.module(next).inbox)
    }
}

/// Per-stage settings as written in the YAML file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModuleSettings {
    pub enabled: Option<bool>,
    pub inbox: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub archive: Option<PathBuf>,
    pub rejected: Option<PathBuf>,
    pub final_output: Option<PathBuf>,
    pub poll_interval_secs: Option<f64>,
    pub retry_limit: Option<u32>,
    pub output_formats: Option<Vec<String>>,
    pub extensions: Option<Vec<String>>,
}

/// Resolved settings owned by a single stage worker.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleConfig {
    pub kind: StageKind,
    pub enabled: bool,
    pub inbox: PathBuf,
    pub output: PathBuf,
    /// Successfully processed inputs
    pub archive: PathBuf,
    /// Quarantined inputs
    pub rejected: PathBuf,
    /// Extra artifacts: formatted reports, narratives, dispatched deliveries
    pub final_output: PathBuf,
    pub poll_interval_secs: f64,
    pub retry_limit: u32,
    pub output_formats: Vec<String>,
    pub extensions: Vec<String>,
}

impl ModuleConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.poll_interval_secs)
            .unwrap_or_else(|_| Duration::from_secs_f64(DEFAULT_POLL_INTERVAL_SECS))
    }

    pub fn format_enabled(&self, format: &str) -> bool {
        self.output_formats
            .iter()
            .any(|enabled| enabled.eq_ignore_ascii_case(format))
    }
}

/// Log level for filtering messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
    /// One append-only file per process lands here
    pub log_dir: PathBuf,
    /// Mirror log output to stdout
    pub console: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
            console: true,
        }
    }
}

/// Control-loop timing for the supervisor.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    pub health_check_interval_secs: u64,
    /// A heartbeat older than this marks the worker as hung
    pub heartbeat_staleness_secs: u64,
    pub restart_backoff_secs: u64,
    pub max_restart_backoff_secs: u64,
    pub max_restarts: u32,
    pub restart_window_secs: u64,
    pub shutdown_grace_secs: u64,
    pub start_stagger_ms: u64,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            health_check_interval_secs: DEFAULT_HEALTH_CHECK_INTERVAL_SECS,
            heartbeat_staleness_secs: DEFAULT_HEARTBEAT_STALENESS_SECS,
            restart_backoff_secs: DEFAULT_RESTART_BACKOFF_SECS,
            max_restart_backoff_secs: DEFAULT_MAX_RESTART_BACKOFF_SECS,
            max_restarts: DEFAULT_MAX_RESTARTS,
            restart_window_secs: DEFAULT_RESTART_WINDOW_SECS,
            shutdown_grace_secs: DEFAULT_SHUTDOWN_GRACE_SECS,
            start_stagger_ms: DEFAULT_START_STAGGER_MS,
        }
    }
}

impl SupervisorConfig {
    pub fn health_check_interval(&self) -> Duration {
        Duration::from_secs(self.health_check_interval_secs)
    }

    pub fn heartbeat_staleness(&self) -> Duration {
        Duration::from_secs(self.heartbeat_staleness_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    pub fn start_stagger(&self) -> Duration {
        Duration::from_millis(self.start_stagger_ms)
    }
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_state_dir() -> PathBuf {
    PathBuf::from(DEFAULT_STATE_DIR)
}

/// Load a config from a YAML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Load a config from a YAML file and reject it if validation finds problems.
pub fn load_and_validate_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let cfg = load_config(path)?;
    crate::config::validate_config(&cfg).map_err(ConfigError::Invalid)?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_empty_config_uses_defaults() {
        let cfg: Config = serde_yaml::from_str("{}").unwrap();

        assert!(!cfg.auto_transfer);
        assert_eq!(cfg.logging.level, LogLevel::Info);
        assert_eq!(cfg.supervisor.max_restarts, DEFAULT_MAX_RESTARTS);
        assert_eq!(cfg.enabled_modules(), StageKind::ALL.to_vec());

        let whisper = cfg.module(StageKind::Whisper);
        assert_eq!(
            whisper.inbox,
            PathBuf::from("./pipeline/1_whisper/Whisper_Inbox")
        );
        assert_eq!(whisper.archive, whisper.inbox.join("archive"));
        assert_eq!(whisper.rejected, whisper.inbox.join("rejected"));
        assert_eq!(whisper.retry_limit, DEFAULT_RETRY_LIMIT);
        assert!(whisper.extensions.is_empty());
    }

    #[test]
    fn parse_module_overrides() {
        let yaml = r#"
root: /srv/chain
auto_transfer: true
logging:
  level: debug
  console: false
modules:
  extractor:
    inbox: custom/in
    output: /abs/out
    poll_interval_secs: 0.5
    retry_limit: 7
  synthesis:
    enabled: false
"#;
        let cfg: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.logging.level, LogLevel::Debug);
        assert!(!cfg.logging.console);

        let extractor = cfg.module(StageKind::Extractor);
        assert_eq!(extractor.inbox, PathBuf::from("/srv/chain/custom/in"));
        assert_eq!(extractor.output, PathBuf::from("/abs/out"));
        assert_eq!(extractor.poll_interval(), Duration::from_millis(500));
        assert_eq!(extractor.retry_limit, 7);
        assert_eq!(extractor.extensions, vec!["json".to_string()]);

        assert!(!cfg.enabled_modules().contains(&StageKind::Synthesis));
        assert_eq!(
            cfg.next_inbox(StageKind::Whisper),
            Some(PathBuf::from("/srv/chain/custom/in"))
        );
        assert_eq!(cfg.next_inbox(StageKind::CloudDispatch), None);
    }

    #[test]
    fn next_inbox_requires_auto_transfer() {
        let cfg = Config::rooted_at("/tmp/x");
        assert_eq!(cfg.next_inbox(StageKind::Whisper), None);
    }

    #[test]
    fn output_formats_are_case_insensitive() {
        let cfg = Config::default();
        let output = cfg.module(StageKind::OutputEngine);
        assert!(output.format_enabled("TABLE"));
        assert!(!cfg.module(StageKind::Whisper).format_enabled("table"));
    }

    #[test]
    fn load_config_reports_missing_file() {
        let err = load_config("/definitely/not/here.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
