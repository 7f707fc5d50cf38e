use mc_runner::config::{Config, CountdownStep, ServerConfig, validate_config};
use mc_runner::error::{Error, Result};
use std::io::Write;
use std::path::PathBuf;
use tempfile::Builder;

#[test]
fn test_parse_config() -> Result<()> {
    let config_str = r#"{
        "server": {
            "command": "java",
            "args": ["-Xms1G", "-Xmx3G", "-jar", "server.jar", "-nogui"],
            "workingDir": "/srv/minecraft",
            "env": {
                "JAVA_HOME": "/opt/java"
            }
        },
        "shutdown": {
            "countdown": [
                { "remainingSecs": 10, "waitMs": 5000 },
                { "remainingSecs": 5, "waitMs": 5000 }
            ],
            "exitTimeoutSecs": 60
        },
        "backup": {
            "sources": ["world"],
            "maxBackups": 7
        },
        "playerPollSecs": 120
    }"#;

    let config = Config::parse_from_str(config_str)?;

    assert_eq!(config.server.command, "java");
    assert_eq!(config.server.args.len(), 5);
    assert_eq!(config.server.working_dir, PathBuf::from("/srv/minecraft"));
    assert_eq!(config.server.env["JAVA_HOME"], "/opt/java");

    assert_eq!(
        config.shutdown.countdown,
        vec![
            CountdownStep {
                remaining_secs: 10,
                wait_ms: 5000
            },
            CountdownStep {
                remaining_secs: 5,
                wait_ms: 5000
            },
        ]
    );
    assert_eq!(config.shutdown.exit_timeout_secs, Some(60));

    assert_eq!(config.backup.sources, vec![PathBuf::from("world")]);
    assert_eq!(config.backup.staging_dir, PathBuf::from(".temp"));
    assert_eq!(config.backup.backup_dir, PathBuf::from("backups"));
    assert_eq!(config.backup.max_backups, 7);
    assert_eq!(config.player_poll_secs, Some(120));

    validate_config(&config)?;
    Ok(())
}

#[test]
fn test_minimal_config_uses_defaults() -> Result<()> {
    let config = Config::parse_from_str(r#"{ "server": { "command": "java" } }"#)?;

    assert!(config.server.args.is_empty());
    assert_eq!(config.server.working_dir, PathBuf::from("."));
    assert_eq!(config.shutdown.countdown.len(), 8);
    assert_eq!(config.shutdown.countdown[0].remaining_secs, 30);
    assert_eq!(config.shutdown.exit_timeout_secs, None);
    assert_eq!(config.backup.sources.len(), 3);
    assert_eq!(config.backup.max_backups, 3);
    assert_eq!(config.player_poll_secs, None);

    validate_config(&config)?;
    Ok(())
}

#[test]
fn test_yaml_file() -> Result<()> {
    let mut file = Builder::new().suffix(".yaml").tempfile().unwrap();
    writeln!(
        file,
        "server:\n  command: java\n  args: [\"-jar\", \"paper.jar\", \"-nogui\"]\nbackup:\n  maxBackups: 2\n"
    )
    .unwrap();

    let config = Config::from_file(file.path())?;
    assert_eq!(config.server.args, vec!["-jar", "paper.jar", "-nogui"]);
    assert_eq!(config.backup.max_backups, 2);
    Ok(())
}

#[test]
fn test_json_file() -> Result<()> {
    let mut file = Builder::new().suffix(".json").tempfile().unwrap();
    write!(file, r#"{{ "server": {{ "command": "java" }}, "playerPollSecs": 30 }}"#).unwrap();

    let config = Config::from_file(file.path())?;
    assert_eq!(config.player_poll_secs, Some(30));
    Ok(())
}

#[test]
fn test_missing_file() {
    let result = Config::from_file("/nonexistent/mc-runner.json");
    assert!(matches!(result, Err(Error::ConfigParse(_))));
}

#[test]
fn test_parse_error() {
    let result = Config::parse_from_str(r#"{ "server": { "args": [] } }"#);
    assert!(matches!(result, Err(Error::ConfigParse(_))));

    let result = Config::parse_from_yaml_str("server: [");
    assert!(matches!(result, Err(Error::ConfigParse(_))));
}

#[test]
fn test_validation_rejects_bad_values() {
    let valid = Config::new(ServerConfig::java("1G", "3G", "server.jar"));
    assert!(validate_config(&valid).is_ok());

    let mut config = valid.clone();
    config.server.command = "  ".to_string();
    assert!(matches!(validate_config(&config), Err(Error::ConfigInvalid(_))));

    let mut config = valid.clone();
    config.shutdown.countdown = vec![
        CountdownStep {
            remaining_secs: 5,
            wait_ms: 1000,
        },
        CountdownStep {
            remaining_secs: 10,
            wait_ms: 1000,
        },
    ];
    assert!(matches!(validate_config(&config), Err(Error::ConfigInvalid(_))));

    let mut config = valid.clone();
    config.backup.max_backups = 0;
    assert!(matches!(validate_config(&config), Err(Error::ConfigInvalid(_))));

    // A cap of one would evict every fresh archive
    let mut config = valid.clone();
    config.backup.max_backups = 1;
    assert!(matches!(validate_config(&config), Err(Error::ConfigInvalid(_))));

    let mut config = valid.clone();
    config.backup.sources.clear();
    assert!(matches!(validate_config(&config), Err(Error::ConfigInvalid(_))));

    let mut config = valid;
    config.backup.staging_dir = config.backup.backup_dir.clone();
    assert!(matches!(validate_config(&config), Err(Error::ConfigInvalid(_))));
}
