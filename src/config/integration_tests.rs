// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

#[cfg(test)]
mod integration_tests {
    use crate::config::{load_and_validate_config, load_config, LogLevel};
    use crate::errors::{ConfigError, ValidationError};
    use crate::stages::StageKind;
    use std::fs;
    use std::path::PathBuf;
    use std::time::Duration;
    use tempfile::TempDir;

    /// The shipped sample configuration must load and validate
    #[test]
    fn test_sample_pipeline_yaml_loading() {
        let config = load_and_validate_config("config/pipeline.yaml").unwrap();

        assert!(config.auto_transfer);
        assert_eq!(config.logging.level, LogLevel::Info);
        assert_eq!(config.enabled_modules().len(), 8);
        assert_eq!(config.supervisor.start_stagger(), Duration::from_secs(1));

        let whisper = config.module(StageKind::Whisper);
        assert!(whisper.extensions.contains(&"wav".to_string()));
        assert_eq!(
            config.next_inbox(StageKind::Whisper),
            Some(PathBuf::from("./pipeline/2_extractor/Extractor_Inbox"))
        );

        let synthesis = config.module(StageKind::Synthesis);
        assert_eq!(synthesis.poll_interval(), Duration::from_secs(10));
        assert!(synthesis.format_enabled("markdown"));
    }

    #[test]
    fn test_invalid_file_reports_every_problem() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.yaml");
        fs::write(
            &path,
            r#"
modules:
  whisper:
    retry_limit: 0
  transcoder:
    enabled: true
supervisor:
  max_restarts: 0
"#,
        )
        .unwrap();

        let err = load_and_validate_config(&path).unwrap_err();
        match err {
            ConfigError::Invalid(errors) => {
                assert_eq!(errors.len(), 3);
                assert!(errors.contains(&ValidationError::ZeroRetryLimit {
                    module: "whisper".to_string()
                }));
                assert!(errors.contains(&ValidationError::UnknownModule {
                    name: "transcoder".to_string()
                }));
                assert!(errors.contains(&ValidationError::ZeroRestartBudget));
            }
            other => panic!("expected validation failure, got {other}"),
        }
    }

    #[test]
    fn test_malformed_yaml_is_a_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.yaml");
        fs::write(&path, "modules: [not, a, map").unwrap();

        let err = load_config(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("broken.yaml"));
    }

    #[test]
    fn test_root_rebases_state_and_log_dirs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rooted.yaml");
        fs::write(
            &path,
            format!("root: {}\nlogging:\n  log_dir: var/log\n", dir.path().display()),
        )
        .unwrap();

        let config = load_and_validate_config(&path).unwrap();
        assert_eq!(config.log_dir(), dir.path().join("var/log"));
        assert_eq!(config.state_dir(), dir.path().join("pipeline/.state"));
        assert!(config
            .module(StageKind::Prime)
            .final_output
            .starts_with(dir.path()));
    }
}
