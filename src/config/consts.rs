// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

/// Path used when `--config` is not given
pub const DEFAULT_CONFIG_PATH: &str = "config/pipeline.yaml";
/// Directory holding heartbeats, stop markers and the supervisor status store
pub const DEFAULT_STATE_DIR: &str = "pipeline/.state";
pub const DEFAULT_LOG_DIR: &str = "logs";

/// Seconds a worker sleeps between poll cycles
pub const DEFAULT_POLL_INTERVAL_SECS: f64 = 5.0;
/// Failed attempts before a file is quarantined
pub const DEFAULT_RETRY_LIMIT: u32 = 3;
pub const ARCHIVE_DIR_NAME: &str = "archive";
pub const REJECTED_DIR_NAME: &str = "rejected";

pub const DEFAULT_HEALTH_CHECK_INTERVAL_SECS: u64 = 10;
pub const DEFAULT_HEARTBEAT_STALENESS_SECS: u64 = 60;
pub const DEFAULT_RESTART_BACKOFF_SECS: u64 = 1;
pub const DEFAULT_MAX_RESTART_BACKOFF_SECS: u64 = 60;
/// Restarts allowed inside one rolling window before a module is stopped
pub const DEFAULT_MAX_RESTARTS: u32 = 5;
pub const DEFAULT_RESTART_WINDOW_SECS: u64 = 300;
/// Time workers get to reach their next idle boundary on shutdown
pub const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 10;
pub const DEFAULT_START_STAGGER_MS: u64 = 250;
