use crate::config::{BackupConfig, Config, ServerConfig, ShutdownConfig};
use crate::error::{Error, Result};

/// Validates the launch configuration
pub fn validate_server_config(config: &ServerConfig) -> Result<()> {
    if config.command.trim().is_empty() {
        return Err(Error::ConfigInvalid("Server command is empty".to_string()));
    }

    // The working directory is checked at launch time; a missing one is a launch failure.

    Ok(())
}

/// Validates the shutdown countdown
pub fn validate_shutdown_config(config: &ShutdownConfig) -> Result<()> {
    for pair in config.countdown.windows(2) {
        if pair[1].remaining_secs >= pair[0].remaining_secs {
            return Err(Error::ConfigInvalid(format!(
                "Shutdown countdown must be strictly decreasing ({} then {})",
                pair[0].remaining_secs, pair[1].remaining_secs
            )));
        }
    }

    if config.exit_timeout_secs == Some(0) {
        return Err(Error::ConfigInvalid(
            "exitTimeoutSecs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

/// Validates the backup settings
pub fn validate_backup_config(config: &BackupConfig) -> Result<()> {
    if config.sources.is_empty() {
        return Err(Error::ConfigInvalid("No backup sources configured".to_string()));
    }

    // Cleanup runs once the cap is reached, so a cap of 1 would evict the archive just written.
    if config.max_backups < 2 {
        return Err(Error::ConfigInvalid(
            "maxBackups must be at least 2".to_string(),
        ));
    }

    if config.staging_dir == config.backup_dir {
        return Err(Error::ConfigInvalid(
            "stagingDir and backupDir must differ".to_string(),
        ));
    }

    Ok(())
}

/// Full configuration validation
pub fn validate_config(config: &Config) -> Result<()> {
    validate_server_config(&config.server)?;
    validate_shutdown_config(&config.shutdown)?;
    validate_backup_config(&config.backup)?;

    if config.event_capacity == 0 {
        return Err(Error::ConfigInvalid(
            "eventCapacity must be greater than zero".to_string(),
        ));
    }

    if config.player_poll_secs == Some(0) {
        return Err(Error::ConfigInvalid(
            "playerPollSecs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}
