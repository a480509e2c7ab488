//! Two-stage archive unpacking.
//!
//! One extraction job carries a zip archive that itself contains a tar.gz
//! archive. [`extract_archives`] runs the chain: extract the outer zip,
//! delete it on success, locate the nested tar.gz, extract it, delete it on
//! success. Every stage is terminal on its own failure; a failed stage
//! leaves its source archive intact and never fails the surrounding job.

use crate::errors::{AppError, AppResult};
use crate::ui;
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;
use zip::result::ZipError;
use zip::ZipArchive;

/// The archive-bearing portion of an extraction job.
#[derive(Debug, Clone)]
pub struct ArchiveSpec {
    /// Source folder (beneath the data directory) holding the outer archive
    pub folder: String,
    /// File name of the outer zip archive
    pub archive_name: String,
}

/// Extracts a zip archive into `extract_to`, returning the number of entries
/// processed.
///
/// Entries are extracted one at a time with per-entry progress; on success
/// the returned count equals the archive's entry count. The archive file is
/// never touched here; deletion is the caller's decision after completion.
///
/// # Errors
///
/// - `ArchiveIoError` when the archive file is missing or the filesystem
///   fails mid-extraction (the archive stays intact)
/// - `ArchiveFormatError` when the archive is corrupt or unreadable
pub fn extract_zip(archive_path: &Path, extract_to: &Path) -> AppResult<usize> {
    if !archive_path.is_file() {
        return Err(AppError::ArchiveIoError(format!(
            "Archive file does not exist: {}",
            archive_path.display()
        )));
    }

    let file = File::open(archive_path).map_err(|e| {
        AppError::ArchiveIoError(format!("Failed to open {}: {e}", archive_path.display()))
    })?;

    let mut archive =
        ZipArchive::new(file).map_err(|e| zip_error(archive_path, e))?;
    let entry_count = archive.len();

    std::fs::create_dir_all(extract_to).map_err(|e| {
        AppError::ArchiveIoError(format!(
            "Failed to create directory {}: {e}",
            extract_to.display()
        ))
    })?;

    info!(
        archive = %archive_path.display(),
        entries = entry_count,
        "Starting zip extraction"
    );

    let pb = ui::create_progress_bar(entry_count as u64)
        .map_err(|e| AppError::ArchiveIoError(e.to_string()))?;
    let mut entries_done = 0usize;

    for i in 0..entry_count {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| zip_error(archive_path, e))?;

        // Entries without a safe relative path, and bare directory markers,
        // still count as processed.
        let out_path = match entry.enclosed_name() {
            Some(path) => extract_to.join(path),
            None => {
                entries_done += 1;
                pb.inc(1);
                continue;
            }
        };

        if entry.name().ends_with('/') {
            entries_done += 1;
            pb.inc(1);
            continue;
        }

        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AppError::ArchiveIoError(format!(
                    "Failed to create directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        let mut out_file = File::create(&out_path).map_err(|e| {
            AppError::ArchiveIoError(format!("Failed to create {}: {e}", out_path.display()))
        })?;

        std::io::copy(&mut entry, &mut out_file).map_err(|e| {
            AppError::ArchiveIoError(format!("Failed to write {}: {e}", out_path.display()))
        })?;

        entries_done += 1;
        pb.inc(1);
    }

    pb.finish_with_message(format!("Extracted {entries_done} entries"));
    info!(
        archive = %archive_path.display(),
        entries = entries_done,
        "Zip extraction completed"
    );

    Ok(entries_done)
}

/// Extracts a tar.gz archive into `extract_to`, returning the number of
/// entries processed.
///
/// The archive is walked once to count entries, then again to extract them,
/// so progress reporting has a total to work against.
///
/// # Errors
///
/// Same taxonomy as [`extract_zip`]: `ArchiveIoError` for a missing file or
/// filesystem failure, `ArchiveFormatError` for a corrupt stream.
pub fn extract_tar_gz(archive_path: &Path, extract_to: &Path) -> AppResult<usize> {
    if !archive_path.is_file() {
        return Err(AppError::ArchiveIoError(format!(
            "Archive file does not exist: {}",
            archive_path.display()
        )));
    }

    let entry_count = count_tar_entries(archive_path)?;

    std::fs::create_dir_all(extract_to).map_err(|e| {
        AppError::ArchiveIoError(format!(
            "Failed to create directory {}: {e}",
            extract_to.display()
        ))
    })?;

    info!(
        archive = %archive_path.display(),
        entries = entry_count,
        "Starting tar.gz extraction"
    );

    let pb = ui::create_progress_bar(entry_count as u64)
        .map_err(|e| AppError::ArchiveIoError(e.to_string()))?;

    let file = File::open(archive_path).map_err(|e| {
        AppError::ArchiveIoError(format!("Failed to open {}: {e}", archive_path.display()))
    })?;
    let mut archive = tar::Archive::new(GzDecoder::new(file));

    let mut entries_done = 0usize;
    let entries = archive
        .entries()
        .map_err(|e| tar_error(archive_path, e))?;
    for entry in entries {
        let mut entry = entry.map_err(|e| tar_error(archive_path, e))?;
        entry
            .unpack_in(extract_to)
            .map_err(|e| tar_error(archive_path, e))?;
        entries_done += 1;
        pb.inc(1);
    }

    pb.finish_with_message(format!("Extracted {entries_done} entries"));
    info!(
        archive = %archive_path.display(),
        entries = entries_done,
        "Tar.gz extraction completed"
    );

    Ok(entries_done)
}

/// Deletes a consumed archive after a completed extraction.
///
/// A deletion failure is a `CleanupError`; it is reported but never
/// retracts the completed extraction.
pub fn cleanup_archive(archive_path: &Path) -> AppResult<()> {
    std::fs::remove_file(archive_path).map_err(|e| {
        AppError::CleanupError(format!(
            "Failed to delete consumed archive {}: {e}",
            archive_path.display()
        ))
    })?;
    info!(archive = %archive_path.display(), "Deleted consumed archive");
    Ok(())
}

/// Runs the two-stage chain for one job's archive folder.
///
/// Stage failures are logged and isolated: a failed zip stage skips the
/// tar.gz stage and keeps the zip on disk; a failed tar.gz stage keeps the
/// tar.gz on disk. Cleanup failures are logged only. The returned error is
/// reserved for an extraction task that terminated abnormally.
pub async fn extract_archives(
    data_dir: &Path,
    spec: &ArchiveSpec,
    cleanup: bool,
) -> AppResult<()> {
    let stage_dir = data_dir.join(&spec.folder);
    let zip_path = stage_dir.join(&spec.archive_name);

    let result = {
        let zip_path = zip_path.clone();
        let stage_dir = stage_dir.clone();
        tokio::task::spawn_blocking(move || extract_zip(&zip_path, &stage_dir))
            .await
            .map_err(|e| AppError::JobError(format!("Extraction task panicked: {e}")))?
    };

    if let Err(e) = result {
        warn!(
            archive = %zip_path.display(),
            error = %e,
            "Zip extraction failed, archive retained"
        );
        return Ok(());
    }

    if cleanup {
        if let Err(e) = cleanup_archive(&zip_path) {
            warn!(error = %e, "Cleanup failed after completed extraction");
        }
    }

    let Some(tgz_path) = find_nested_archive(&stage_dir) else {
        debug!(directory = %stage_dir.display(), "No nested archive found");
        return Ok(());
    };

    let destination = nested_destination(&tgz_path);
    let result = {
        let tgz_path = tgz_path.clone();
        let destination = destination.clone();
        tokio::task::spawn_blocking(move || extract_tar_gz(&tgz_path, &destination))
            .await
            .map_err(|e| AppError::JobError(format!("Extraction task panicked: {e}")))?
    };

    match result {
        Ok(_) => {
            if cleanup {
                if let Err(e) = cleanup_archive(&tgz_path) {
                    warn!(error = %e, "Cleanup failed after completed extraction");
                }
            }
        }
        Err(e) => {
            warn!(
                archive = %tgz_path.display(),
                error = %e,
                "Nested archive extraction failed, archive retained"
            );
        }
    }

    Ok(())
}

/// Locates the first tar.gz archive beneath `dir`, in file-name order.
pub fn find_nested_archive(dir: &Path) -> Option<PathBuf> {
    WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.into_path())
        .find(|path| is_tar_gz(path))
}

fn is_tar_gz(path: &Path) -> bool {
    if !path.is_file() {
        return false;
    }
    match path.file_name().and_then(|n| n.to_str()) {
        Some(name) => name.ends_with(".tgz") || name.ends_with(".tar.gz"),
        None => false,
    }
}

/// Destination directory for a nested archive: its own name with the archive
/// extensions stripped, beside the archive itself.
fn nested_destination(archive_path: &Path) -> PathBuf {
    let stem = archive_path
        .file_name()
        .and_then(|n| n.to_str())
        .map(|name| {
            name.trim_end_matches(".tar.gz")
                .trim_end_matches(".tgz")
                .to_string()
        })
        .unwrap_or_else(|| "extracted".to_string());
    archive_path.with_file_name(stem)
}

fn zip_error(archive_path: &Path, err: ZipError) -> AppError {
    match err {
        ZipError::Io(io) => AppError::ArchiveIoError(format!(
            "Extraction failed for {}: {io}",
            archive_path.display()
        )),
        other => AppError::ArchiveFormatError(format!(
            "Invalid or corrupt archive {}: {other}",
            archive_path.display()
        )),
    }
}

fn tar_error(archive_path: &Path, err: std::io::Error) -> AppError {
    // Gzip/tar corruption surfaces as InvalidData or a truncated stream;
    // everything else is the filesystem.
    match err.kind() {
        ErrorKind::InvalidData | ErrorKind::InvalidInput | ErrorKind::UnexpectedEof => {
            AppError::ArchiveFormatError(format!(
                "Invalid or corrupt archive {}: {err}",
                archive_path.display()
            ))
        }
        _ => AppError::ArchiveIoError(format!(
            "Extraction failed for {}: {err}",
            archive_path.display()
        )),
    }
}

fn count_tar_entries(archive_path: &Path) -> AppResult<usize> {
    let file = File::open(archive_path).map_err(|e| {
        AppError::ArchiveIoError(format!("Failed to open {}: {e}", archive_path.display()))
    })?;
    let mut archive = tar::Archive::new(GzDecoder::new(file));
    let mut count = 0usize;
    for entry in archive
        .entries()
        .map_err(|e| tar_error(archive_path, e))?
    {
        entry.map_err(|e| tar_error(archive_path, e))?;
        count += 1;
    }
    Ok(count)
}
