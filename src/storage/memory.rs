//! In-memory download store.
//!
//! Records live only for the process's runtime; restarts drop history.
//! A single async RwLock over the table serializes writers, which is the
//! per-record ordering guarantee the lifecycle manager relies on.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::storage::store::{Download, DownloadId, DownloadPatch, DownloadStatus, DownloadStore, NewDownload};

struct Inner {
    downloads: HashMap<DownloadId, Download>,
    next_id: DownloadId,
}

pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                downloads: HashMap::new(),
                next_id: 1,
            }),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DownloadStore for MemoryStore {
    async fn create(&self, new: NewDownload) -> Download {
        let mut inner = self.inner.write().await;
        let id = inner.next_id;
        inner.next_id += 1;

        let now = Utc::now();
        let download = Download {
            id,
            url: new.url,
            title: None,
            status: DownloadStatus::Pending,
            progress: 0,
            file_size: None,
            download_speed: None,
            eta: None,
            file_path: None,
            format: new.format.unwrap_or_else(|| "mp4".to_string()),
            quality: new.quality.unwrap_or_else(|| "best".to_string()),
            error: None,
            created_at: now,
            updated_at: now,
        };
        inner.downloads.insert(id, download.clone());
        download
    }

    async fn get(&self, id: DownloadId) -> Option<Download> {
        self.inner.read().await.downloads.get(&id).cloned()
    }

    async fn patch(&self, id: DownloadId, patch: DownloadPatch) -> Option<Download> {
        let mut inner = self.inner.write().await;
        let download = inner.downloads.get_mut(&id)?;

        if let Some(title) = patch.title {
            download.title = Some(title);
        }
        if let Some(status) = patch.status {
            download.status = status;
        }
        if let Some(progress) = patch.progress {
            download.progress = progress.min(100);
        }
        if let Some(file_size) = patch.file_size {
            download.file_size = Some(file_size);
        }
        if let Some(download_speed) = patch.download_speed {
            download.download_speed = Some(download_speed);
        }
        if let Some(eta) = patch.eta {
            download.eta = Some(eta);
        }
        if let Some(file_path) = patch.file_path {
            download.file_path = Some(file_path);
        }
        if let Some(error) = patch.error {
            download.error = Some(error);
        }
        download.updated_at = Utc::now();

        Some(download.clone())
    }

    async fn list_all(&self) -> Vec<Download> {
        let inner = self.inner.read().await;
        let mut all: Vec<Download> = inner.downloads.values().cloned().collect();
        // Newest first; ids break ties for records created in the same instant.
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        all
    }

    async fn list_active(&self) -> Vec<Download> {
        let inner = self.inner.read().await;
        let mut active: Vec<Download> = inner
            .downloads
            .values()
            .filter(|d| d.status.is_active())
            .cloned()
            .collect();
        active.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        active
    }

    async fn delete(&self, id: DownloadId) -> bool {
        self.inner.write().await.downloads.remove(&id).is_some()
    }
}
