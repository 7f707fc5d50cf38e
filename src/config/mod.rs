//! Configuration module for MC Runner.
//!
//! This module handles parsing and validation of the settings the supervisor
//! needs: how to launch the server, how to count down a graceful stop and
//! what to back up. Configurations load from JSON or YAML files or strings.
//!
//! # Examples
//!
//! Loading a configuration from a file:
//!
//! ```no_run
//! use mc_runner::config::Config;
//!
//! let config = Config::from_file("mc-runner.json").unwrap();
//! println!("Launching {}", config.server.command);
//! ```
//!
//! Creating a configuration programmatically:
//!
//! ```
//! use mc_runner::config::{Config, ServerConfig, validate_config};
//!
//! let mut config = Config::new(ServerConfig::java("1G", "3G", "server.jar"));
//! config.backup.max_backups = 5;
//! config.player_poll_secs = Some(60);
//!
//! assert!(validate_config(&config).is_ok());
//! ```
mod parser;
pub mod validator;

pub use parser::{BackupConfig, Config, CountdownStep, ServerConfig, ShutdownConfig};
pub use validator::validate_config;
