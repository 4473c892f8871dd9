//! yt-dlp invocation: argument construction and metadata probes.
//!
//! The tool is an opaque collaborator. Everything here is plumbing for
//! spawning it with the right flags and harvesting its first lines of
//! output. Probes are bounded by a timeout because they back synchronous
//! HTTP responses; the main download deliberately is not.

use std::process::Stdio;
use tokio::process::Command;
use tokio::time::timeout;

use crate::core::config;

/// Arguments for the main extraction run.
///
/// Quality and format translate as the frontend expects: `quality ==
/// "audio"` or `format == "mp3"` switch to audio extraction; any other
/// quality is passed through as a format selector and any other format
/// as a recode target. Header overrides keep picky platforms happy.
pub fn build_download_args(url: &str, format: &str, quality: &str, output_template: &str) -> Vec<String> {
    let mut args: Vec<String> = vec![
        url.to_string(),
        "--newline".to_string(),
        "--no-playlist".to_string(),
        "--output".to_string(),
        output_template.to_string(),
        "--user-agent".to_string(),
        config::http::USER_AGENT.to_string(),
        "--referer".to_string(),
        config::http::REFERER.to_string(),
        "--add-header".to_string(),
        config::http::ACCEPT_LANGUAGE_HEADER.to_string(),
    ];

    if quality == "audio" {
        args.extend(["--extract-audio", "--audio-format", "mp3"].map(String::from));
    } else {
        args.push("-f".to_string());
        args.push(quality.to_string());
    }

    if format == "mp3" {
        args.extend(["--extract-audio", "--audio-format", "mp3"].map(String::from));
    } else {
        args.push("--recode-video".to_string());
        args.push(format.to_string());
    }

    args
}

/// Best-effort title lookup before the main download starts.
///
/// Returns `None` on any failure; a missing title never blocks the
/// download itself.
pub async fn probe_title(url: &str) -> Option<String> {
    let ytdl_bin = &*config::YTDL_BIN;

    let result = timeout(
        config::probe::timeout(),
        Command::new(ytdl_bin)
            .args([url, "--get-title", "--no-warnings"])
            .stdin(Stdio::null())
            .output(),
    )
    .await;

    match result {
        Ok(Ok(output)) if output.status.success() => {
            let title = String::from_utf8_lossy(&output.stdout)
                .lines()
                .next()
                .unwrap_or("")
                .trim()
                .to_string();
            if title.is_empty() {
                None
            } else {
                Some(title)
            }
        }
        Ok(Ok(output)) => {
            log::debug!(
                "Title probe for {} exited with {:?}: {}",
                url,
                output.status.code(),
                String::from_utf8_lossy(&output.stderr).trim()
            );
            None
        }
        Ok(Err(e)) => {
            log::warn!("Failed to execute {} for title probe: {}", ytdl_bin, e);
            None
        }
        Err(_) => {
            log::warn!("Title probe timed out for {}", url);
            None
        }
    }
}

/// Result of a pre-flight URL check. Not tied to any download record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The tool resolved the URL: exit 0 and a non-empty title.
    Resolved { title: String, duration: String },
    /// Anything else; `detail` carries the captured error output.
    Unresolved { detail: String },
}

/// Metadata-only invocation used by the test-url endpoint: first two
/// stdout lines are title and duration, no download happens.
pub async fn probe_url(url: &str) -> ProbeOutcome {
    let ytdl_bin = &*config::YTDL_BIN;

    let result = timeout(
        config::probe::timeout(),
        Command::new(ytdl_bin)
            .args([url, "--get-title", "--get-duration", "--no-warnings"])
            .stdin(Stdio::null())
            .output(),
    )
    .await;

    match result {
        Ok(Ok(output)) => {
            let stdout = String::from_utf8_lossy(&output.stdout);
            let mut lines = stdout.lines();
            let title = lines.next().unwrap_or("").trim().to_string();
            let duration = lines.next().unwrap_or("").trim().to_string();

            if output.status.success() && !title.is_empty() {
                ProbeOutcome::Resolved {
                    title,
                    duration: if duration.is_empty() {
                        "Unknown".to_string()
                    } else {
                        duration
                    },
                }
            } else {
                let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
                ProbeOutcome::Unresolved {
                    detail: if stderr.is_empty() {
                        "Unable to access video".to_string()
                    } else {
                        stderr
                    },
                }
            }
        }
        Ok(Err(e)) => ProbeOutcome::Unresolved {
            detail: format!("Failed to execute {}: {}", ytdl_bin, e),
        },
        Err(_) => ProbeOutcome::Unresolved {
            detail: format!("{} timed out", ytdl_bin),
        },
    }
}
