//! Download lifecycle manager.
//!
//! Owns the state machine `pending → downloading → {completed | failed |
//! stopped}` and the orchestration around one external process per
//! download: title probe, spawn, stream parsing, finalization, stop and
//! delete. Records are patched through the injected store; cancellation
//! handles live in the injected process registry.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use crate::core::config;
use crate::core::error::{AppError, AppResult};
use crate::download::progress::{parse_output_line, LineUpdate};
use crate::download::registry::ProcessRegistry;
use crate::download::ytdlp;
use crate::download::ytdlp_errors::classify_stderr_line;
use crate::storage::{Download, DownloadId, DownloadPatch, DownloadStatus, DownloadStore, NewDownload};

pub struct DownloadManager {
    store: Arc<dyn DownloadStore>,
    registry: Arc<ProcessRegistry>,
    downloads_dir: PathBuf,
}

impl DownloadManager {
    pub fn new(store: Arc<dyn DownloadStore>, registry: Arc<ProcessRegistry>) -> Self {
        Self::with_downloads_dir(store, registry, config::downloads_dir())
    }

    pub fn with_downloads_dir(
        store: Arc<dyn DownloadStore>,
        registry: Arc<ProcessRegistry>,
        downloads_dir: PathBuf,
    ) -> Self {
        Self {
            store,
            registry,
            downloads_dir,
        }
    }

    /// Create a record and kick off its lifecycle. The returned record is
    /// in `Pending`; everything after creation happens asynchronously and
    /// is observed by the client through polling.
    pub async fn start(self: &Arc<Self>, request: NewDownload) -> Download {
        let record = self.store.create(request).await;
        log::info!("Created download {} for {}", record.id, record.url);

        let manager = Arc::clone(self);
        let job = record.clone();
        tokio::spawn(async move {
            let id = job.id;
            if let Err(e) = Arc::clone(&manager).run(job).await {
                log::error!("Download {} failed during orchestration: {}", id, e);
                manager.registry.remove(id);
                manager
                    .apply_if_active(
                        id,
                        DownloadPatch {
                            status: Some(DownloadStatus::Failed),
                            error: Some(e.to_string()),
                            ..Default::default()
                        },
                    )
                    .await;
            }
        });

        record
    }

    /// One full lifecycle run: probe, spawn, stream-parse, finalize.
    async fn run(self: Arc<Self>, job: Download) -> AppResult<()> {
        let id = job.id;

        // Best-effort title pre-population; absence never blocks the run.
        if let Some(title) = ytdlp::probe_title(&job.url).await {
            log::debug!("Probed title for download {}: {}", id, title);
            self.apply_if_active(
                id,
                DownloadPatch {
                    title: Some(title),
                    ..Default::default()
                },
            )
            .await;
        }

        // The user may have stopped or deleted the record while the probe
        // ran; in that case nothing is spawned.
        match self.store.get(id).await {
            None => {
                log::debug!("Download {} removed before spawn; skipping", id);
                return Ok(());
            }
            Some(d) if d.status.is_terminal() => {
                log::debug!("Download {} already {} before spawn; skipping", id, d.status);
                return Ok(());
            }
            Some(_) => {}
        }

        tokio::fs::create_dir_all(&self.downloads_dir).await?;

        let _ = self.store
            .patch(
                id,
                DownloadPatch {
                    status: Some(DownloadStatus::Downloading),
                    ..Default::default()
                },
            )
            .await;

        let output_template = self
            .downloads_dir
            .join("%(title)s.%(ext)s")
            .to_string_lossy()
            .into_owned();
        let args = ytdlp::build_download_args(&job.url, &job.format, &job.quality, &output_template);
        let ytdl_bin = &*config::YTDL_BIN;
        log::debug!("Spawning for download {}: {} {}", id, ytdl_bin, args.join(" "));

        let mut child = Command::new(ytdl_bin)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| AppError::Download(format!("Failed to spawn {}: {}", ytdl_bin, e)))?;

        let token = CancellationToken::new();
        self.registry.register(id, token.clone());

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let stdout_manager = Arc::clone(&self);
        let stdout_task = tokio::spawn(async move {
            if let Some(stream) = stdout {
                let mut lines = BufReader::new(stream).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    log::debug!("yt-dlp stdout: {}", line);
                    let update = parse_output_line(&line);
                    if !update.is_empty() {
                        stdout_manager.apply_line_update(id, update).await;
                    }
                }
            }
        });

        let stderr_manager = Arc::clone(&self);
        let stderr_task = tokio::spawn(async move {
            if let Some(stream) = stderr {
                let mut lines = BufReader::new(stream).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    log::debug!("yt-dlp stderr: {}", line);
                    // Progress can land on stderr as well.
                    let update = parse_output_line(&line);
                    if !update.is_empty() {
                        stderr_manager.apply_line_update(id, update).await;
                    }
                    // Known failure lines surface a message on the record
                    // without touching status. Only exit codes do that.
                    if let Some(kind) = classify_stderr_line(&line) {
                        log::warn!("Download {} stderr: {}", id, line);
                        stderr_manager
                            .apply_if_active(
                                id,
                                DownloadPatch {
                                    error: Some(kind.user_message().to_string()),
                                    ..Default::default()
                                },
                            )
                            .await;
                    }
                }
            }
        });

        tokio::select! {
            status = child.wait() => {
                // Exit handling runs exactly once, after all buffered
                // output: both readers are drained before finalizing.
                let _ = stdout_task.await;
                let _ = stderr_task.await;
                self.registry.remove(id);
                let status = status
                    .map_err(|e| AppError::Download(format!("Failed to wait on {}: {}", ytdl_bin, e)))?;
                self.finalize(id, status.code(), status.success()).await;
            }
            _ = token.cancelled() => {
                // Stop request. The record is already terminal; trailing
                // output is dropped.
                log::info!("Killing process for stopped download {}", id);
                stdout_task.abort();
                stderr_task.abort();
                if let Err(e) = child.start_kill() {
                    log::warn!("Failed to kill process for download {}: {}", id, e);
                }
                let _ = child.wait().await;
            }
        }

        Ok(())
    }

    /// Coalesce everything matched on one output line into one patch.
    async fn apply_line_update(&self, id: DownloadId, update: LineUpdate) {
        let patch = DownloadPatch {
            title: update.title,
            progress: update.progress,
            file_size: update.file_size,
            download_speed: update.download_speed,
            eta: update.eta,
            ..Default::default()
        };
        self.apply_if_active(id, patch).await;
    }

    /// Patch guard: late events targeting a stopped or deleted record are
    /// discarded instead of reapplied.
    async fn apply_if_active(&self, id: DownloadId, patch: DownloadPatch) -> bool {
        match self.store.get(id).await {
            None => {
                log::debug!("Discarding update for removed download {}", id);
                false
            }
            Some(d) if d.status.is_terminal() => {
                log::debug!("Discarding update for {} download {}", d.status, id);
                false
            }
            Some(_) => self.store.patch(id, patch).await.is_some(),
        }
    }

    /// Apply the terminal transition for a process exit.
    async fn finalize(&self, id: DownloadId, code: Option<i32>, success: bool) {
        let Some(record) = self.store.get(id).await else {
            log::debug!("Discarding exit event for removed download {}", id);
            return;
        };
        if record.status.is_terminal() {
            log::debug!("Discarding exit event for {} download {}", record.status, id);
            return;
        }

        if success {
            let file_path = self.compute_file_path(&record);
            log::info!("Download {} completed: {}", id, file_path);
            let _ = self.store
                .patch(
                    id,
                    DownloadPatch {
                        status: Some(DownloadStatus::Completed),
                        progress: Some(100),
                        file_path: Some(file_path),
                        ..Default::default()
                    },
                )
                .await;
        } else {
            let error = match code {
                Some(code) => format!("{} exited with code {}", &*config::YTDL_BIN, code),
                None => format!("{} was terminated by a signal", &*config::YTDL_BIN),
            };
            log::warn!("Download {} failed: {}", id, error);
            let _ = self.store
                .patch(
                    id,
                    DownloadPatch {
                        status: Some(DownloadStatus::Failed),
                        error: Some(error),
                        ..Default::default()
                    },
                )
                .await;
        }
    }

    /// Expected final path: downloads dir, title stem, requested format.
    ///
    /// The destination-derived title was patched into the record when the
    /// marker line was seen, so it wins over the probed title by
    /// overwrite order. With no title at all the stem falls back to the
    /// record id.
    fn compute_file_path(&self, record: &Download) -> String {
        let stem = record
            .title
            .clone()
            .unwrap_or_else(|| format!("download-{}", record.id));
        self.downloads_dir
            .join(format!("{}.{}", stem, record.format))
            .to_string_lossy()
            .into_owned()
    }

    /// Stop a download: signal its process (if any) and force the status
    /// to `Stopped`. Idempotent on terminal records. Returns `None` when
    /// the id is unknown.
    pub async fn stop(&self, id: DownloadId) -> Option<Download> {
        let record = self.store.get(id).await?;

        if self.registry.cancel(id) {
            log::info!("Signalled process for download {}", id);
        }

        if record.status.is_terminal() {
            return Some(record);
        }

        log::info!("Stopping download {}", id);
        self.store
            .patch(
                id,
                DownloadPatch {
                    status: Some(DownloadStatus::Stopped),
                    ..Default::default()
                },
            )
            .await
    }

    /// Delete a download: implicit stop if active, best-effort removal of
    /// the backing file, then erase the record. Returns `Ok(false)` when
    /// the id is unknown; filesystem failures propagate.
    pub async fn delete(&self, id: DownloadId) -> AppResult<bool> {
        let Some(record) = self.store.get(id).await else {
            return Ok(false);
        };

        self.registry.cancel(id);
        if !record.status.is_terminal() {
            let _ = self.store
                .patch(
                    id,
                    DownloadPatch {
                        status: Some(DownloadStatus::Stopped),
                        ..Default::default()
                    },
                )
                .await;
        }

        if let Some(path) = &record.file_path {
            match tokio::fs::remove_file(path).await {
                Ok(()) => log::info!("Removed file {} for download {}", path, id),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(AppError::Io(e)),
            }
        }

        log::info!("Deleting download {}", id);
        Ok(self.store.delete(id).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use pretty_assertions::assert_eq;

    fn manager() -> (Arc<DownloadManager>, Arc<dyn DownloadStore>, Arc<ProcessRegistry>) {
        let store: Arc<dyn DownloadStore> = Arc::new(MemoryStore::new());
        let registry = Arc::new(ProcessRegistry::new());
        let manager = Arc::new(DownloadManager::with_downloads_dir(
            Arc::clone(&store),
            Arc::clone(&registry),
            PathBuf::from("downloads"),
        ));
        (manager, store, registry)
    }

    fn request(url: &str) -> NewDownload {
        NewDownload {
            url: url.to_string(),
            format: None,
            quality: None,
        }
    }

    async fn mark_downloading(store: &Arc<dyn DownloadStore>, id: DownloadId) {
        let _ = store
            .patch(
                id,
                DownloadPatch {
                    status: Some(DownloadStatus::Downloading),
                    ..Default::default()
                },
            )
            .await;
    }

    #[tokio::test]
    async fn test_line_update_coalesces_into_one_patch() {
        let (manager, store, _) = manager();
        let record = store.create(request("https://youtu.be/abc")).await;
        mark_downloading(&store, record.id).await;

        let update = parse_output_line("[download]  42.5% of 10.00MiB at 512.00KiB/s ETA 00:12");
        manager.apply_line_update(record.id, update).await;

        let patched = store.get(record.id).await.unwrap();
        assert_eq!(patched.progress, 43);
        assert_eq!(patched.file_size.as_deref(), Some("10.00MiB"));
        assert_eq!(patched.download_speed.as_deref(), Some("512.00KiB/s"));
        assert_eq!(patched.eta.as_deref(), Some("00:12"));
        assert_eq!(patched.status, DownloadStatus::Downloading);
    }

    #[tokio::test]
    async fn test_late_update_for_stopped_record_is_discarded() {
        let (manager, store, _) = manager();
        let record = store.create(request("https://youtu.be/abc")).await;
        let _ = store
            .patch(
                record.id,
                DownloadPatch {
                    status: Some(DownloadStatus::Stopped),
                    ..Default::default()
                },
            )
            .await;

        let applied = manager
            .apply_if_active(
                record.id,
                DownloadPatch {
                    progress: Some(50),
                    ..Default::default()
                },
            )
            .await;

        assert!(!applied);
        assert_eq!(store.get(record.id).await.unwrap().progress, 0);
    }

    #[tokio::test]
    async fn test_update_for_removed_record_is_discarded() {
        let (manager, _, _) = manager();
        let applied = manager
            .apply_if_active(
                999,
                DownloadPatch {
                    progress: Some(50),
                    ..Default::default()
                },
            )
            .await;
        assert!(!applied);
    }

    #[tokio::test]
    async fn test_finalize_success_completes_record() {
        let (manager, store, _) = manager();
        let record = store.create(request("https://youtu.be/abc")).await;
        mark_downloading(&store, record.id).await;
        let _ = store
            .patch(
                record.id,
                DownloadPatch {
                    title: Some("My Clip".to_string()),
                    progress: Some(97),
                    ..Default::default()
                },
            )
            .await;

        manager.finalize(record.id, Some(0), true).await;

        let done = store.get(record.id).await.unwrap();
        assert_eq!(done.status, DownloadStatus::Completed);
        assert_eq!(done.progress, 100);
        let path = done.file_path.unwrap();
        assert!(path.ends_with("My Clip.mp4"), "unexpected path: {}", path);
    }

    #[tokio::test]
    async fn test_finalize_success_without_title_uses_id_stem() {
        let (manager, store, _) = manager();
        let record = store.create(request("https://youtu.be/abc")).await;
        mark_downloading(&store, record.id).await;

        manager.finalize(record.id, Some(0), true).await;

        let done = store.get(record.id).await.unwrap();
        let path = done.file_path.unwrap();
        assert!(
            path.ends_with(&format!("download-{}.mp4", record.id)),
            "unexpected path: {}",
            path
        );
    }

    #[tokio::test]
    async fn test_finalize_failure_records_exit_code() {
        let (manager, store, _) = manager();
        let record = store.create(request("https://youtu.be/abc")).await;
        mark_downloading(&store, record.id).await;

        manager.finalize(record.id, Some(1), false).await;

        let failed = store.get(record.id).await.unwrap();
        assert_eq!(failed.status, DownloadStatus::Failed);
        assert!(failed.error.unwrap().contains("exited with code 1"));
        assert!(failed.file_path.is_none());
    }

    #[tokio::test]
    async fn test_finalize_after_stop_is_discarded() {
        let (manager, store, _) = manager();
        let record = store.create(request("https://youtu.be/abc")).await;
        let _ = store
            .patch(
                record.id,
                DownloadPatch {
                    status: Some(DownloadStatus::Stopped),
                    ..Default::default()
                },
            )
            .await;

        manager.finalize(record.id, Some(0), true).await;

        let still_stopped = store.get(record.id).await.unwrap();
        assert_eq!(still_stopped.status, DownloadStatus::Stopped);
        assert!(still_stopped.file_path.is_none());
    }

    #[tokio::test]
    async fn test_stop_downloading_record() {
        let (manager, store, registry) = manager();
        let record = store.create(request("https://youtu.be/abc")).await;
        mark_downloading(&store, record.id).await;

        let token = CancellationToken::new();
        registry.register(record.id, token.clone());

        let stopped = manager.stop(record.id).await.unwrap();
        assert_eq!(stopped.status, DownloadStatus::Stopped);
        assert!(token.is_cancelled());
        assert!(!registry.contains(record.id));
    }

    #[tokio::test]
    async fn test_stop_before_any_progress_keeps_progress_zero() {
        let (manager, store, _) = manager();
        let record = store.create(request("https://youtu.be/abc")).await;

        let stopped = manager.stop(record.id).await.unwrap();
        assert_eq!(stopped.status, DownloadStatus::Stopped);
        assert_eq!(stopped.progress, 0);
    }

    #[tokio::test]
    async fn test_stop_terminal_record_is_idempotent() {
        let (manager, store, _) = manager();
        let record = store.create(request("https://youtu.be/abc")).await;
        let _ = store
            .patch(
                record.id,
                DownloadPatch {
                    status: Some(DownloadStatus::Completed),
                    progress: Some(100),
                    ..Default::default()
                },
            )
            .await;

        let result = manager.stop(record.id).await.unwrap();
        assert_eq!(result.status, DownloadStatus::Completed);
    }

    #[tokio::test]
    async fn test_stop_unknown_id() {
        let (manager, _, _) = manager();
        assert!(manager.stop(999).await.is_none());
    }

    #[tokio::test]
    async fn test_delete_active_record_cancels_process() {
        let (manager, store, registry) = manager();
        let record = store.create(request("https://youtu.be/abc")).await;
        mark_downloading(&store, record.id).await;

        let token = CancellationToken::new();
        registry.register(record.id, token.clone());

        assert!(manager.delete(record.id).await.unwrap());
        assert!(token.is_cancelled());
        assert!(store.get(record.id).await.is_none());
        assert!(store.list_all().await.is_empty());
    }

    #[tokio::test]
    async fn test_delete_removes_backing_file() {
        let (manager, store, _) = manager();
        let record = store.create(request("https://youtu.be/abc")).await;

        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("clip.mp4");
        std::fs::write(&file_path, b"data").unwrap();

        let _ = store
            .patch(
                record.id,
                DownloadPatch {
                    status: Some(DownloadStatus::Completed),
                    file_path: Some(file_path.to_string_lossy().into_owned()),
                    ..Default::default()
                },
            )
            .await;

        assert!(manager.delete(record.id).await.unwrap());
        assert!(!file_path.exists());
        assert!(store.get(record.id).await.is_none());
    }

    #[tokio::test]
    async fn test_delete_tolerates_already_missing_file() {
        let (manager, store, _) = manager();
        let record = store.create(request("https://youtu.be/abc")).await;
        let _ = store
            .patch(
                record.id,
                DownloadPatch {
                    status: Some(DownloadStatus::Completed),
                    file_path: Some("/nonexistent/path/clip.mp4".to_string()),
                    ..Default::default()
                },
            )
            .await;

        assert!(manager.delete(record.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_unknown_id() {
        let (manager, _, _) = manager();
        assert!(!manager.delete(999).await.unwrap());
    }
}
