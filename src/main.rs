use anyhow::Result;
use dotenvy::dotenv;
use std::sync::Arc;

use tubedeck::core::{config, init_logger, start_web_server, AppState};
use tubedeck::download::{DownloadManager, ProcessRegistry};
use tubedeck::storage::{DownloadStore, MemoryStore};

/// Main entry point for the control panel service.
///
/// # Errors
/// Returns an error if initialization fails (logging, downloads
/// directory, listener bind).
#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env if present, before any
    // config statics are read.
    let _ = dotenv();

    init_logger()?;

    let downloads_dir = config::downloads_dir();
    std::fs::create_dir_all(&downloads_dir)?;

    log::info!("Using extraction tool: {}", &*config::YTDL_BIN);
    log::info!("Downloads directory: {}", downloads_dir.display());
    log::info!("Serving frontend assets from: {}", &*config::STATIC_DIR);

    let store: Arc<dyn DownloadStore> = Arc::new(MemoryStore::new());
    let registry = Arc::new(ProcessRegistry::new());
    let manager = Arc::new(DownloadManager::new(Arc::clone(&store), registry));

    let state = AppState { manager, store };

    start_web_server(*config::SERVER_PORT, state)
        .await
        .map_err(|e| anyhow::anyhow!("Web server error: {}", e))?;

    Ok(())
}
