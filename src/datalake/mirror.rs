use super::client::ContainerClient;
use crate::errors::{AppError, AppResult};
use crate::models::{mirror_path, RemoteObjectRef};
use crate::ui;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Result type for parallel download tasks.
/// Returns (object name, success, optional error message)
type DownloadTaskResult = (String, bool, Option<String>);

/// One object that could not be transferred, with the reason.
#[derive(Debug, Clone)]
pub struct FailedObject {
    pub name: String,
    pub reason: String,
}

/// Outcome of mirroring one listed set of objects.
///
/// Individual failures never abort sibling transfers, so callers read this
/// report instead of an error: the parent job only fails on setup errors,
/// keeping partial success available on disk.
#[derive(Debug, Default)]
pub struct DownloadReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: Vec<FailedObject>,
}

impl DownloadReport {
    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }
}

/// Mirrors the listed objects beneath `local_root`.
///
/// Each object's full relative path is reproduced under the root, with every
/// missing intermediate directory created first; an existing file at the
/// same path is overwritten. Transfers run with bounded concurrency and each
/// one fails independently.
///
/// An empty listing is not an error; it yields a report with
/// `attempted == 0`.
///
/// # Errors
///
/// Only setup failures (local root creation, progress bar construction) are
/// returned as errors; per-object failures land in the report.
pub async fn download_all(
    client: &ContainerClient,
    objects: &[RemoteObjectRef],
    local_root: &Path,
    concurrent_downloads: usize,
) -> AppResult<DownloadReport> {
    if objects.is_empty() {
        debug!(local_root = %local_root.display(), "No objects listed, nothing to download");
        return Ok(DownloadReport::default());
    }

    fs::create_dir_all(local_root)
        .await
        .map_err(|e| AppError::IoError(format!("Failed to create local root: {e}")))?;

    let total = objects.len();
    let pb = ui::create_progress_bar(total as u64)?;

    info!(total = total, "Starting download");

    let semaphore = Arc::new(Semaphore::new(concurrent_downloads.max(1)));
    let client = Arc::new(client.clone());
    let local_root_arc = Arc::new(local_root.to_path_buf());
    let pb = Arc::new(pb);

    let mut handles: Vec<JoinHandle<DownloadTaskResult>> = Vec::with_capacity(total);

    for object in objects {
        let semaphore = semaphore.clone();
        let client = client.clone();
        let local_root = local_root_arc.clone();
        let pb = pb.clone();
        let name = object.name.clone();

        let handle = tokio::spawn(async move {
            let permit = match semaphore.acquire().await {
                Ok(permit) => permit,
                Err(e) => {
                    return (name, false, Some(format!("Semaphore closed: {e}")));
                }
            };

            pb.set_message(format!("Downloading {name}..."));

            let result = download_one(&client, &name, &local_root).await;
            drop(permit);

            match result {
                Ok(()) => {
                    pb.set_message(format!("Completed {name}"));
                    (name, true, None)
                }
                Err(e) => {
                    pb.set_message(format!("Failed {name}"));
                    (name, false, Some(e.to_string()))
                }
            }
        });

        handles.push(handle);
    }

    let mut report = DownloadReport {
        attempted: total,
        ..DownloadReport::default()
    };

    for handle in handles {
        pb.inc(1);
        match handle.await {
            Ok((_name, true, _)) => report.succeeded += 1,
            Ok((name, false, reason)) => {
                let reason = reason.unwrap_or_else(|| "unknown failure".to_string());
                warn!(object = name, reason = reason, "Failed to download object");
                report.failed.push(FailedObject { name, reason });
            }
            Err(e) => {
                warn!(error = %e, "Download task terminated abnormally");
                report.failed.push(FailedObject {
                    name: "<unknown>".to_string(),
                    reason: format!("Task join error: {e}"),
                });
            }
        }
    }

    pb.finish_with_message(format!(
        "Downloaded {} object(s), {} failed",
        report.succeeded,
        report.failed_count()
    ));

    info!(
        attempted = report.attempted,
        succeeded = report.succeeded,
        failed = report.failed_count(),
        "Download completed"
    );

    Ok(report)
}

/// Downloads a single object to its mirrored path, streaming through a
/// `.part` file that is renamed into place once complete.
async fn download_one(
    client: &ContainerClient,
    name: &str,
    local_root: &Path,
) -> AppResult<()> {
    let dest = mirror_path(local_root, name).ok_or_else(|| {
        AppError::TransferError(format!("Object name '{name}' yields no usable local path"))
    })?;

    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).await.map_err(|e| {
            AppError::TransferError(format!(
                "Failed to create directory {}: {e}",
                parent.display()
            ))
        })?;
    }

    let tmp_path = part_path(&dest);

    // Remove stale tmp file if present (best-effort)
    if tmp_path.exists() {
        if let Err(e) = fs::remove_file(&tmp_path).await {
            warn!(
                file_path = %tmp_path.display(),
                error = %e,
                "Failed to remove stale temp file"
            );
        }
    }

    let url = client.object_url(name)?;
    let response = client
        .http()
        .get(url)
        .send()
        .await
        .map_err(|e| AppError::TransferError(format!("Failed to download {name}: {e}")))?;

    let status = response.status();
    let mut response = response.error_for_status().map_err(|e| {
        AppError::TransferError(format!(
            "HTTP {}: Failed to download {name}: {e}",
            status.as_u16()
        ))
    })?;

    let mut file = File::create(&tmp_path).await.map_err(|e| {
        AppError::TransferError(format!(
            "Failed to create temp file {}: {e}",
            tmp_path.display()
        ))
    })?;

    loop {
        let chunk = response
            .chunk()
            .await
            .map_err(|e| AppError::TransferError(format!("Failed mid-transfer for {name}: {e}")))?;
        let Some(chunk) = chunk else { break };
        file.write_all(&chunk).await.map_err(|e| {
            AppError::TransferError(format!(
                "Failed to write to temp file {}: {e}",
                tmp_path.display()
            ))
        })?;
    }

    // Ensure the file is closed before renaming
    drop(file);

    fs::rename(&tmp_path, &dest).await.map_err(|e| {
        AppError::TransferError(format!(
            "Failed to rename temp file {} to {}: {e}",
            tmp_path.display(),
            dest.display()
        ))
    })?;

    Ok(())
}

fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    dest.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn part_path_appends_suffix_in_same_directory() {
        let dest = Path::new("data/a/file.csv");
        assert_eq!(part_path(dest), Path::new("data/a/file.csv.part"));
    }

    #[test]
    fn empty_report_counts() {
        let report = DownloadReport::default();
        assert_eq!(report.attempted, 0);
        assert_eq!(report.succeeded, 0);
        assert_eq!(report.failed_count(), 0);
    }
}
