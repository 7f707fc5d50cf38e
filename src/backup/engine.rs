use crate::backup::archive::{
    archive_name, copy_dir_all, is_archive_name, parse_archive_date, write_archive,
};
use crate::config::BackupConfig;
use crate::error::{Error, Result};
use chrono::{Local, NaiveDate, NaiveDateTime};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Name of the capture-time marker written into every snapshot.
pub const MARKER_FILE: &str = "time.txt";

/// Result of a backup request. Both variants are successes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackupOutcome {
    /// A new archive was written.
    Saved(PathBuf),
    /// Today's archive already existed; nothing was written.
    AlreadyDoneToday(PathBuf),
}

impl BackupOutcome {
    /// Status message for the event bus.
    pub fn message(&self) -> &'static str {
        match self {
            BackupOutcome::Saved(_) => "Backup saved!",
            BackupOutcome::AlreadyDoneToday(_) => "Backup for today is already done!",
        }
    }

    /// Path of today's archive.
    pub fn path(&self) -> &Path {
        match self {
            BackupOutcome::Saved(path) | BackupOutcome::AlreadyDoneToday(path) => path,
        }
    }
}

/// An archive found in the backup directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupArchive {
    /// Date parsed from the file name
    pub date: NaiveDate,
    /// Full path
    pub path: PathBuf,
}

/// Takes dated snapshots of the configured directories and enforces the retention cap.
///
/// One archive per calendar day. Archives are assembled in the staging
/// directory, written next to their final name with a `.part` suffix and
/// renamed into place, so a failed run never leaves a half-written archive that
/// looks real.
#[derive(Debug, Clone)]
pub struct BackupEngine {
    config: BackupConfig,
    in_flight: Arc<Mutex<()>>,
}

impl BackupEngine {
    pub fn new(config: BackupConfig) -> Self {
        Self {
            config,
            in_flight: Arc::new(Mutex::new(())),
        }
    }

    pub fn config(&self) -> &BackupConfig {
        &self.config
    }

    /// Back up now, by the local clock.
    pub fn make_backup(&self) -> Result<BackupOutcome> {
        self.make_backup_at(Local::now().naive_local())
    }

    /// Back up as if the current local time were `now`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Backup` if another backup is running on this engine, none of
    /// the sources exist, or any copy, compression or cleanup step fails.
    #[tracing::instrument(skip(self), fields(backup_dir = %self.config.backup_dir.display()))]
    pub fn make_backup_at(&self, now: NaiveDateTime) -> Result<BackupOutcome> {
        let _guard = self
            .in_flight
            .try_lock()
            .map_err(|_| Error::Backup("Another backup is already in progress".to_string()))?;

        let backup_dir = &self.config.backup_dir;
        fs::create_dir_all(backup_dir)
            .map_err(|e| io_failure("create backup directory", backup_dir, e))?;

        let target = backup_dir.join(archive_name(now.date()));
        let result = if target.exists() {
            tracing::info!(archive = %target.display(), "Backup for today already exists");
            Ok(BackupOutcome::AlreadyDoneToday(target))
        } else {
            self.capture(now, &target)
                .map(|()| BackupOutcome::Saved(target))
        };

        self.clear_staging();
        let outcome = result?;

        cleanup(backup_dir, self.config.max_backups)?;
        Ok(outcome)
    }

    /// Apply the retention cap to the configured backup directory.
    pub fn cleanup(&self) -> Result<Option<PathBuf>> {
        cleanup(&self.config.backup_dir, self.config.max_backups)
    }

    /// Archives currently in the backup directory, oldest first.
    pub fn archives(&self) -> Result<Vec<BackupArchive>> {
        list_archives(&self.config.backup_dir)
    }

    fn capture(&self, now: NaiveDateTime, target: &Path) -> Result<()> {
        let staging = &self.config.staging_dir;

        // Leftovers from an interrupted run must not end up in this archive.
        if staging.exists() {
            fs::remove_dir_all(staging)
                .map_err(|e| io_failure("clear staging directory", staging, e))?;
        }
        fs::create_dir_all(staging)
            .map_err(|e| io_failure("create staging directory", staging, e))?;

        let mut copied_dirs = 0;
        for source in &self.config.sources {
            if !source.is_dir() {
                tracing::debug!(source = %source.display(), "Skipping missing source directory");
                continue;
            }
            let name = source.file_name().ok_or_else(|| {
                Error::Backup(format!("Source {} has no directory name", source.display()))
            })?;

            let files = copy_dir_all(source, &staging.join(name))
                .map_err(|e| io_failure("copy", source, e))?;
            tracing::debug!(source = %source.display(), files, "Copied source directory");
            copied_dirs += 1;
        }

        if copied_dirs == 0 {
            return Err(Error::Backup(
                "None of the configured source directories exist".to_string(),
            ));
        }

        let marker = staging.join(MARKER_FILE);
        fs::write(&marker, now.format("%H:%M:%S").to_string())
            .map_err(|e| io_failure("write", &marker, e))?;

        let partial = target.with_extension("gz.part");
        if let Err(e) = write_archive(staging, &partial) {
            discard_partial(&partial);
            return Err(io_failure("write archive", &partial, e));
        }
        if let Err(e) = fs::rename(&partial, target) {
            discard_partial(&partial);
            return Err(io_failure("move archive into", target, e));
        }

        tracing::info!(archive = %target.display(), sources = copied_dirs, "Backup saved");
        Ok(())
    }

    fn clear_staging(&self) {
        let staging = &self.config.staging_dir;
        if staging.exists() {
            if let Err(e) = fs::remove_dir_all(staging) {
                tracing::warn!(staging = %staging.display(), error = %e, "Failed to clear staging directory");
            }
        }
    }
}

/// Removes whatever a failed run left at `partial`, file or directory.
fn discard_partial(partial: &Path) {
    let result = if partial.is_dir() {
        fs::remove_dir_all(partial)
    } else {
        fs::remove_file(partial)
    };
    match result {
        Ok(()) => tracing::debug!(partial = %partial.display(), "Discarded partial archive"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!(partial = %partial.display(), error = %e, "Failed to discard partial archive")
        }
    }
}

fn io_failure(action: &str, path: &Path, error: io::Error) -> Error {
    Error::Backup(format!("Failed to {} {}: {}", action, path.display(), error))
}

/// Lists archives in `dir` that follow the naming convention, oldest first.
///
/// Names that look like archives but carry an invalid date are logged and left
/// out. A missing directory yields an empty list.
pub fn list_archives(dir: &Path) -> Result<Vec<BackupArchive>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(io_failure("list", dir, e)),
    };

    let mut archives = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| io_failure("list", dir, e))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !is_archive_name(name) {
            continue;
        }

        match parse_archive_date(name) {
            Some(date) => archives.push(BackupArchive { date, path }),
            None => tracing::warn!(archive = %path.display(), "Ignoring backup with unparseable date"),
        }
    }

    archives.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.path.cmp(&b.path)));
    Ok(archives)
}

/// Enforces the retention cap on `dir`.
///
/// When `max_count` or more valid archives are present, deletes exactly one:
/// the oldest by parsed date. Returns the removed path.
#[tracing::instrument]
pub fn cleanup(dir: &Path, max_count: usize) -> Result<Option<PathBuf>> {
    let archives = list_archives(dir)?;
    if archives.len() < max_count {
        return Ok(None);
    }

    let Some(oldest) = archives.into_iter().next() else {
        return Ok(None);
    };
    fs::remove_file(&oldest.path).map_err(|e| io_failure("remove", &oldest.path, e))?;

    tracing::info!(archive = %oldest.path.display(), date = %oldest.date, "Removed oldest backup");
    Ok(Some(oldest.path))
}
