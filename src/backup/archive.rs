//! Archive naming, directory copying and tar.gz creation.

use chrono::NaiveDate;
use flate2::Compression;
use flate2::write::GzEncoder;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

const ARCHIVE_PREFIX: &str = "backup_";
const ARCHIVE_SUFFIX: &str = ".tar.gz";
const DATE_FORMAT: &str = "%d-%m-%Y";

/// File name of the archive for `date`, e.g. `backup_19-10-2026.tar.gz`.
pub fn archive_name(date: NaiveDate) -> String {
    format!("{}{}{}", ARCHIVE_PREFIX, date.format(DATE_FORMAT), ARCHIVE_SUFFIX)
}

/// Whether `file_name` follows the archive naming convention, valid date or not.
pub fn is_archive_name(file_name: &str) -> bool {
    file_name.starts_with(ARCHIVE_PREFIX) && file_name.ends_with(ARCHIVE_SUFFIX)
}

/// Date embedded in an archive file name. `None` for foreign or malformed names.
pub fn parse_archive_date(file_name: &str) -> Option<NaiveDate> {
    let date = file_name
        .strip_prefix(ARCHIVE_PREFIX)?
        .strip_suffix(ARCHIVE_SUFFIX)?;

    // DD-MM-YYYY, zero padded
    if date.len() != 10 {
        return None;
    }
    NaiveDate::parse_from_str(date, DATE_FORMAT).ok()
}

/// Recursively copies `src` into `dst`, merging into existing directories.
///
/// Returns the number of files copied. Symlinks and other special files are skipped.
pub fn copy_dir_all(src: &Path, dst: &Path) -> io::Result<u64> {
    fs::create_dir_all(dst)?;
    let mut copied = 0;

    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let target = dst.join(entry.file_name());

        if file_type.is_dir() {
            copied += copy_dir_all(&entry.path(), &target)?;
        } else if file_type.is_file() {
            fs::copy(entry.path(), &target)?;
            copied += 1;
        }
    }

    Ok(copied)
}

/// Packs the contents of `staging` (not the directory itself) into a gzip tarball at `dest`.
pub fn write_archive(staging: &Path, dest: &Path) -> io::Result<()> {
    let file = File::create(dest)?;
    let mut archive = tar::Builder::new(GzEncoder::new(file, Compression::default()));

    let mut entries: Vec<PathBuf> = fs::read_dir(staging)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<io::Result<_>>()?;
    entries.sort();

    for path in entries {
        let Some(name) = path.file_name() else {
            continue;
        };
        if path.is_dir() {
            archive.append_dir_all(name, &path)?;
        } else {
            archive.append_path_with_name(&path, name)?;
        }
    }

    let file = archive.into_inner()?.finish()?;
    file.sync_all()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use tempfile::tempdir;

    #[test]
    fn test_archive_name_round_trip() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 7).unwrap();
        let name = archive_name(date);
        assert_eq!(name, "backup_07-03-2026.tar.gz");
        assert!(is_archive_name(&name));
        assert_eq!(parse_archive_date(&name), Some(date));
    }

    #[test]
    fn test_malformed_names_do_not_parse() {
        assert_eq!(parse_archive_date("backup_31-02-2026.tar.gz"), None);
        assert_eq!(parse_archive_date("backup_7-3-2026.tar.gz"), None);
        assert_eq!(parse_archive_date("backup_today.tar.gz"), None);
        assert_eq!(parse_archive_date("notes.txt"), None);
        assert!(is_archive_name("backup_today.tar.gz"));
        assert!(!is_archive_name("backup_07-03-2026.tar.gz.part"));
    }

    #[test]
    fn test_copy_and_pack() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("world");
        fs::create_dir_all(src.join("region")).unwrap();
        fs::write(src.join("level.dat"), b"level").unwrap();
        fs::write(src.join("region/r.0.0.mca"), b"chunk").unwrap();

        let staging = dir.path().join(".temp");
        assert_eq!(copy_dir_all(&src, &staging.join("world")).unwrap(), 2);
        fs::write(staging.join("time.txt"), b"12:00:00").unwrap();

        let dest = dir.path().join("out.tar.gz");
        write_archive(&staging, &dest).unwrap();

        let mut archive = tar::Archive::new(GzDecoder::new(File::open(&dest).unwrap()));
        let names: Vec<String> = archive
            .entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().to_string_lossy().into_owned())
            .collect();

        assert!(names.iter().any(|n| n == "time.txt"));
        assert!(names.iter().any(|n| n == "world/level.dat"));
        assert!(names.iter().any(|n| n == "world/region/r.0.0.mca"));
    }
}
