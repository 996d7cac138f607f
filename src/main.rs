// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use anyhow::Context;
use clap::{Parser, Subcommand};
use filechain::config::{consts::DEFAULT_CONFIG_PATH, load_config, validate_config, Config};
use filechain::engine::run_module;
use filechain::errors::{ConfigError, SupervisorError};
use filechain::observability::init_logging;
use filechain::observability::messages::validation::{ConfigLoaded, ValidationProblem};
use filechain::observability::messages::StructuredLog;
use filechain::stages::StageKind;
use filechain::supervisor::{ProcessLauncher, StatusReport, Supervisor};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

/// Filesystem-driven eight stage processing pipeline
#[derive(Debug, Parser)]
#[command(name = "filechain", version, about)]
struct Cli {
    /// Pipeline configuration file
    #[arg(
        short,
        long,
        global = true,
        env = "FILECHAIN_CONFIG",
        default_value = DEFAULT_CONFIG_PATH
    )]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start the supervisor and every enabled module
    RunAll,
    /// Run a single module in the foreground
    RunModule {
        /// Module name, e.g. `whisper` or `output_engine`
        name: String,
    },
    /// Print the last recorded state of every module
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Command::RunAll => {
            let cfg = load_checked(&cli.config, "supervisor")?;
            let exe = std::env::current_exe().context("cannot locate the filechain executable")?;
            let launcher = ProcessLauncher::new(exe, cli.config.clone());
            let mut supervisor = Supervisor::new(&cfg.config, Box::new(launcher));
            supervisor.run(shutdown_on_signal()).await;
        }
        Command::RunModule { name } => {
            let kind = StageKind::from_name(name).ok_or_else(|| SupervisorError::UnknownModule {
                name: name.clone(),
                available: StageKind::available_names(),
            })?;
            let cfg = load_checked(&cli.config, kind.name())?;
            if !cfg.config.module(kind).enabled {
                tracing::warn!(module = kind.name(), "Module is disabled in the configuration, running it anyway");
            }
            run_module(&cfg.config, kind, shutdown_on_signal()).await?;
        }
        Command::Status => {
            let cfg = load_config(&cli.config)?;
            let report = StatusReport::load(&cfg).await?;
            print!("{}", report);
        }
    }
    Ok(())
}

/// A validated configuration plus the guard that keeps its log file open.
struct LoadedConfig {
    config: Config,
    _log_guard: tracing_appender::non_blocking::WorkerGuard,
}

/// Load the configuration, start logging for `process_name`, then validate.
///
/// Logging comes first so that every validation problem ends up in the log.
fn load_checked(path: &Path, process_name: &str) -> anyhow::Result<LoadedConfig> {
    let config = load_config(path)?;
    let guard = init_logging(&config.logging, &config.log_dir(), process_name)?;

    if let Err(errors) = validate_config(&config) {
        for error in &errors {
            ValidationProblem { path, error }.log();
        }
        return Err(ConfigError::Invalid(errors).into());
    }

    ConfigLoaded {
        path,
        enabled_modules: config.enabled_modules().len(),
        auto_transfer: config.auto_transfer,
    }
    .log();
    Ok(LoadedConfig {
        config,
        _log_guard: guard,
    })
}

/// A token cancelled by SIGINT or SIGTERM.
fn shutdown_on_signal() -> CancellationToken {
    let token = CancellationToken::new();
    let cancel = token.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        tracing::info!("Shutdown signal received");
        cancel.cancel();
    });
    token
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = terminate.recv() => {}
            }
        }
        Err(err) => {
            tracing::warn!(error = %err, "SIGTERM handler unavailable, listening for Ctrl-C only");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
