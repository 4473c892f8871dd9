//! Aggregate download statistics.
//!
//! A derived read-only view recomputed on every request. Nothing here
//! is cached or stored, so there is no invalidation to get wrong.

use serde::Serialize;

use crate::storage::{DownloadStatus, DownloadStore};

/// Counters shown in the panel's header.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadStats {
    pub total_downloads: usize,
    pub active_downloads: usize,
    pub completed_downloads: usize,
    pub failed_downloads: usize,
    /// Best-effort sum over completed records' fileSize strings,
    /// rendered with a fixed unit suffix.
    pub storage_used: String,
}

/// Recompute the projection from the store.
pub async fn collect_stats(store: &dyn DownloadStore) -> DownloadStats {
    let all = store.list_all().await;
    let active = store.list_active().await;

    let completed = all
        .iter()
        .filter(|d| d.status == DownloadStatus::Completed)
        .count();
    let failed = all.iter().filter(|d| d.status == DownloadStatus::Failed).count();

    let storage: f64 = all
        .iter()
        .filter(|d| d.status == DownloadStatus::Completed)
        .filter_map(|d| d.file_size.as_deref())
        .map(parse_size_estimate)
        .sum();

    DownloadStats {
        total_downloads: all.len(),
        active_downloads: active.len(),
        completed_downloads: completed,
        failed_downloads: failed,
        storage_used: format!("{:.1} MB", storage),
    }
}

/// Numeric estimate of a display size string: strip everything that is
/// not a digit or decimal point and parse the rest. Units are not
/// normalized; this mirrors what the panel has always shown.
fn parse_size_estimate(size: &str) -> f64 {
    let numeric: String = size.chars().filter(|c| c.is_ascii_digit() || *c == '.').collect();
    numeric.parse().unwrap_or(0.0)
}
