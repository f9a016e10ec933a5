//! Unpacks recorded movement data: every `*.zip` below a folder is extracted
//! next to itself, its `meta/` folder is dropped and the archive is deleted.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, error, info, warn};
use zip::result::ZipError;
use zip::ZipArchive;

use crate::error::{GestureError, Result};

/// Folder removed from every extracted archive.
pub const META_DIR: &str = "meta";

#[derive(Debug, Default, PartialEq, Eq)]
pub struct UnpackReport {
    pub extracted: Vec<PathBuf>,
    pub bad: Vec<PathBuf>,
    pub failed: Vec<PathBuf>,
}

/// A missing `root` is logged and yields an empty report. Per-archive failures
/// are logged and recorded, never returned.
pub fn unpack_and_clean(root: &Path) -> Result<UnpackReport> {
    let mut report = UnpackReport::default();
    if !root.is_dir() {
        warn!("Directory not found: {}", root.display());
        return Ok(report);
    }

    let mut archives = Vec::new();
    collect_archives(root, &mut archives)?;
    archives.sort();
    debug!("{} archive(s) under {}", archives.len(), root.display());

    for archive in archives {
        match unpack_one(&archive) {
            Ok(dest) => {
                debug!("Extracted {} into {}", archive.display(), dest.display());
                report.extracted.push(dest);
            }
            Err(e @ GestureError::BadArchive(_)) => {
                warn!("Error: {}", e);
                report.bad.push(archive);
            }
            Err(e) => {
                error!("{}", e);
                report.failed.push(archive);
            }
        }
    }
    Ok(report)
}

fn collect_archives(dir: &Path, out: &mut Vec<PathBuf>) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            collect_archives(&path, out)?;
        } else if is_zip(&path) {
            out.push(path);
        }
    }
    Ok(())
}

fn is_zip(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"))
}

/// Extracts `archive` into a sibling folder named after its stem.
fn unpack_one(archive: &Path) -> Result<PathBuf> {
    let archive_error = |reason: String| GestureError::Archive { path: archive.to_path_buf(), reason };

    let stem = archive
        .file_stem()
        .ok_or_else(|| archive_error("archive has no file name".to_string()))?;
    let dest = archive.with_file_name(stem);

    let file = File::open(archive).map_err(|e| archive_error(e.to_string()))?;
    let mut zip = ZipArchive::new(file).map_err(|e| classify_zip_error(archive, e))?;
    zip.extract(&dest).map_err(|e| classify_zip_error(archive, e))?;

    let meta = dest.join(META_DIR);
    if meta.is_dir() {
        fs::remove_dir_all(&meta).map_err(|e| archive_error(e.to_string()))?;
    }
    fs::remove_file(archive).map_err(|e| archive_error(e.to_string()))?;
    Ok(dest)
}

/// Damaged or unsupported archives (including checksum mismatches while
/// extracting) are reported as bad; anything else is a plain failure.
fn classify_zip_error(archive: &Path, e: ZipError) -> GestureError {
    match e {
        ZipError::InvalidArchive(_) | ZipError::UnsupportedArchive(_) => {
            GestureError::BadArchive(archive.to_path_buf())
        }
        ZipError::Io(ref err) if err.kind() == io::ErrorKind::InvalidData => {
            GestureError::BadArchive(archive.to_path_buf())
        }
        other => GestureError::Archive { path: archive.to_path_buf(), reason: other.to_string() },
    }
}

/// Runs `unpack_and_clean` on each named folder below `base`, or on the
/// default movement data folders when none are named.
pub fn unpack_movement_data(base: &Path, dirs: &[String]) -> Result<UnpackReport> {
    let names: Vec<&str> = if dirs.is_empty() {
        crate::config::MOVEMENT_DIRS.to_vec()
    } else {
        dirs.iter().map(String::as_str).collect()
    };

    let mut total = UnpackReport::default();
    for name in names {
        let target = base.join(name);
        if !target.is_dir() {
            debug!("Skipping {}, not a directory", target.display());
            continue;
        }
        info!("Processing: {}", name);
        let report = unpack_and_clean(&target)?;
        total.extracted.extend(report.extracted);
        total.bad.extend(report.bad);
        total.failed.extend(report.failed);
    }
    info!(
        "Done! {} extracted, {} bad, {} failed",
        total.extracted.len(),
        total.bad.len(),
        total.failed.len()
    );
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use tempfile::tempdir;
    use zip::write::SimpleFileOptions;
    use zip::{CompressionMethod, ZipWriter};

    fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let mut zip = ZipWriter::new(File::create(path).unwrap());
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        for (name, data) in entries {
            zip.start_file(*name, options).unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn extracts_drops_meta_and_removes_archive() {
        let tmp = tempdir().unwrap();
        let nested = tmp.path().join("participant_1");
        fs::create_dir_all(&nested).unwrap();
        let archive = nested.join("Recording.ZIP");
        write_zip(
            &archive,
            &[("Accelerometer.csv", b"t,x,y,z\n"), ("meta/device.csv", b"phone\n")],
        );

        let report = unpack_and_clean(tmp.path()).unwrap();

        let dest = nested.join("Recording");
        assert_eq!(report.extracted, vec![dest.clone()]);
        assert!(report.bad.is_empty() && report.failed.is_empty());
        assert_eq!(fs::read(dest.join("Accelerometer.csv")).unwrap(), b"t,x,y,z\n");
        assert!(!dest.join(META_DIR).exists());
        assert!(!archive.exists());
    }

    #[test]
    fn corrupt_archive_is_skipped_and_kept() {
        let tmp = tempdir().unwrap();
        let broken = tmp.path().join("broken.zip");
        fs::write(&broken, b"definitely not a zip").unwrap();
        let good = tmp.path().join("good.zip");
        write_zip(&good, &[("data.csv", b"1\n")]);

        let report = unpack_and_clean(tmp.path()).unwrap();

        assert_eq!(report.bad, vec![broken.clone()]);
        assert_eq!(report.extracted, vec![tmp.path().join("good")]);
        assert!(broken.exists());
        assert!(!good.exists());
    }

    #[test]
    fn checksum_mismatch_counts_as_bad_archive() {
        let tmp = tempdir().unwrap();
        let archive = tmp.path().join("damaged.zip");
        write_zip(&archive, &[("samples.csv", b"0123456789abcdef")]);

        // Flip one stored payload byte; the directory stays intact, the CRC no longer matches.
        let mut bytes = fs::read(&archive).unwrap();
        let at = bytes.windows(16).position(|w| w == b"0123456789abcdef").unwrap();
        bytes[at] ^= 0xFF;
        fs::write(&archive, &bytes).unwrap();

        let report = unpack_and_clean(tmp.path()).unwrap();

        assert_eq!(report.bad, vec![archive.clone()]);
        assert!(report.failed.is_empty());
        assert!(archive.exists());
    }

    #[test]
    fn missing_directory_is_not_an_error() {
        let tmp = tempdir().unwrap();
        let report = unpack_and_clean(&tmp.path().join("nope")).unwrap();
        assert_eq!(report, UnpackReport::default());
    }

    #[test]
    fn other_files_are_left_alone() {
        let tmp = tempdir().unwrap();
        fs::write(tmp.path().join("notes.txt"), b"keep").unwrap();

        let report = unpack_and_clean(tmp.path()).unwrap();
        assert!(report.extracted.is_empty());
        assert!(tmp.path().join("notes.txt").exists());
    }

    #[test]
    fn default_movement_folders_are_used_when_none_named() {
        let tmp = tempdir().unwrap();
        let door = tmp.path().join("Door movement data");
        fs::create_dir_all(&door).unwrap();
        write_zip(&door.join("run1.zip"), &[("a.csv", b"a")]);

        let report = unpack_movement_data(tmp.path(), &[]).unwrap();
        assert_eq!(report.extracted, vec![door.join("run1")]);
    }
}
