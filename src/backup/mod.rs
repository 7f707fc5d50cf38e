//! World backups for MC Runner.
//!
//! The engine snapshots the configured directories into a dated
//! `backup_<DD-MM-YYYY>.tar.gz` once per calendar day. Whenever `max_backups`
//! archives have piled up, the oldest one is evicted.
//!
//! # Examples
//!
//! ```no_run
//! use mc_runner::backup::BackupEngine;
//! use mc_runner::config::BackupConfig;
//! use std::path::Path;
//!
//! let engine = BackupEngine::new(BackupConfig::default().resolve_against(Path::new("/srv/mc")));
//! let outcome = engine.make_backup().unwrap();
//! println!("{} ({})", outcome.message(), outcome.path().display());
//! ```
pub mod archive;
mod engine;

pub use archive::{archive_name, parse_archive_date};
pub use engine::{BackupArchive, BackupEngine, BackupOutcome, MARKER_FILE, cleanup, list_archives};
