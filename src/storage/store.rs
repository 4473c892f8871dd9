//! Download entity and the storage contract.
//!
//! The store is deliberately a trait with one in-memory implementation:
//! a persistent backend is a drop-in alternate implementation, not a
//! redesign of the lifecycle manager.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier assigned to a download at creation. Monotonically
/// increasing, never reused within the process lifetime.
pub type DownloadId = i64;

/// Lifecycle state of a download.
///
/// `Pending → Downloading → {Completed | Failed | Stopped}`; the three
/// right-hand states are terminal and a record never re-enters `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadStatus {
    Pending,
    Downloading,
    Completed,
    Failed,
    Stopped,
}

impl DownloadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DownloadStatus::Pending => "pending",
            DownloadStatus::Downloading => "downloading",
            DownloadStatus::Completed => "completed",
            DownloadStatus::Failed => "failed",
            DownloadStatus::Stopped => "stopped",
        }
    }

    /// Terminal states accept no further automatic transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DownloadStatus::Completed | DownloadStatus::Failed | DownloadStatus::Stopped
        )
    }

    /// Active records are the ones the panel's "active" view polls.
    pub fn is_active(&self) -> bool {
        matches!(self, DownloadStatus::Pending | DownloadStatus::Downloading)
    }
}

impl fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One tracked extraction job. Field names are camelCase on the wire;
/// that is the frontend's polling contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Download {
    pub id: DownloadId,
    pub url: String,
    pub title: Option<String>,
    pub status: DownloadStatus,
    /// Integer percentage, 0-100. Only meaningful while downloading;
    /// fixed at 100 once completed.
    pub progress: u8,
    pub file_size: Option<String>,
    pub download_speed: Option<String>,
    pub eta: Option<String>,
    /// Set if and only if the download completed.
    pub file_path: Option<String>,
    pub format: String,
    pub quality: String,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Creation request. `format` and `quality` default to "mp4" / "best"
/// when absent and are immutable afterwards.
#[derive(Debug, Clone, Deserialize)]
pub struct NewDownload {
    pub url: String,
    pub format: Option<String>,
    pub quality: Option<String>,
}

/// Partial update merged into an existing record. `None` fields are left
/// untouched; every applied patch refreshes `updated_at`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DownloadPatch {
    pub title: Option<String>,
    pub status: Option<DownloadStatus>,
    pub progress: Option<u8>,
    pub file_size: Option<String>,
    pub download_speed: Option<String>,
    pub eta: Option<String>,
    pub file_path: Option<String>,
    pub error: Option<String>,
}

impl DownloadPatch {
    pub fn is_empty(&self) -> bool {
        *self == DownloadPatch::default()
    }
}

/// Storage contract for download records.
///
/// All methods are `&self`; implementations provide the per-record
/// mutual-exclusion guarantee (the lifecycle manager patches records
/// from several async contexts).
#[async_trait]
pub trait DownloadStore: Send + Sync {
    /// Create a record in `Pending` with a freshly assigned id.
    async fn create(&self, new: NewDownload) -> Download;

    async fn get(&self, id: DownloadId) -> Option<Download>;

    /// Merge `patch` into an existing record and refresh `updated_at`.
    /// Returns `None` (no-op) when the id is absent.
    async fn patch(&self, id: DownloadId, patch: DownloadPatch) -> Option<Download>;

    /// All records, newest first.
    async fn list_all(&self) -> Vec<Download>;

    /// Records whose status is `Pending` or `Downloading`.
    async fn list_active(&self) -> Vec<Download>;

    /// Remove a record. Returns whether one existed.
    async fn delete(&self, id: DownloadId) -> bool;
}
