use once_cell::sync::Lazy;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the control panel service
/// Cached yt-dlp binary path
/// Read once at startup from YTDL_BIN environment variable or defaults to "yt-dlp"
pub static YTDL_BIN: Lazy<String> = Lazy::new(|| env::var("YTDL_BIN").unwrap_or_else(|_| "yt-dlp".to_string()));

/// Downloads directory
/// Read from DOWNLOAD_FOLDER environment variable
/// Defaults to a "downloads" directory relative to the working directory,
/// created on demand. Supports tilde (~) expansion for home directory.
pub static DOWNLOAD_FOLDER: Lazy<String> =
    Lazy::new(|| env::var("DOWNLOAD_FOLDER").unwrap_or_else(|_| "downloads".to_string()));

/// Resolved downloads directory with tilde expansion applied.
pub fn downloads_dir() -> PathBuf {
    PathBuf::from(shellexpand::tilde(&*DOWNLOAD_FOLDER).into_owned())
}

/// HTTP listen port
/// Read from PORT environment variable
/// Default: 5000
pub static SERVER_PORT: Lazy<u16> = Lazy::new(|| {
    env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(5000)
});

/// Directory of built frontend assets served at the root path
/// Read from STATIC_DIR environment variable
/// Default: public
pub static STATIC_DIR: Lazy<String> = Lazy::new(|| env::var("STATIC_DIR").unwrap_or_else(|_| "public".to_string()));

/// Probe configuration
pub mod probe {
    use super::Duration;

    /// Timeout for metadata-only yt-dlp invocations (in seconds).
    /// Probes back synchronous HTTP responses, so they are bounded;
    /// the main download is not.
    pub const TIMEOUT_SECS: u64 = 30;

    /// Probe timeout duration
    pub fn timeout() -> Duration {
        Duration::from_secs(TIMEOUT_SECS)
    }
}

/// HTTP header overrides passed to the extraction tool for platform
/// compatibility
pub mod http {
    pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";
    pub const REFERER: &str = "https://www.youtube.com/";
    pub const ACCEPT_LANGUAGE_HEADER: &str = "Accept-Language:en-US,en;q=0.9";
}

/// Validation configuration
pub mod validation {
    /// Maximum URL length (RFC 7230 recommends 8000, but we use 2048 for safety)
    pub const MAX_URL_LENGTH: usize = 2048;
}
