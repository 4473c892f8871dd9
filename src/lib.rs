//! Tubedeck - browser-based control panel for yt-dlp downloads
//!
//! This library provides the backend for the panel: the download
//! lifecycle manager, the in-memory record store, and the JSON API the
//! frontend polls.
//!
//! # Module Structure
//!
//! - `core`: configuration, errors, logging, stats, and the HTTP layer
//! - `download`: lifecycle management and yt-dlp plumbing
//! - `storage`: download record storage

pub mod core;
pub mod download;
pub mod storage;

// Re-export commonly used types for convenience
pub use crate::core::{build_router, start_web_server, AppError, AppResult, AppState};
pub use download::{DownloadManager, ProcessRegistry};
pub use storage::{Download, DownloadStatus, DownloadStore, MemoryStore};
