//! Progress extraction from yt-dlp output lines.
//!
//! A small ordered set of independent matchers, each optional, applied to
//! every line of the tool's stdout and stderr. The exact patterns are the
//! regression surface: yt-dlp's text format is the unstated contract this
//! module relies on, e.g.
//!
//! `[download]  42.5% of 10.00MiB at 512.00KiB/s ETA 00:12`

use lazy_regex::{lazy_regex, Lazy};
use regex::Regex;
use std::path::Path;

static PERCENT_RE: Lazy<Regex> = lazy_regex!(r"(\d+\.?\d*)%");
static SPEED_RE: Lazy<Regex> = lazy_regex!(r"(\d+\.?\d*[KMGT]?iB/s)");
static ETA_RE: Lazy<Regex> = lazy_regex!(r"ETA (\d+:\d+)");
static SIZE_RE: Lazy<Regex> = lazy_regex!(r"(\d+\.?\d*[KMGT]?iB)");
static DESTINATION_RE: Lazy<Regex> = lazy_regex!(r"\[download\] Destination: (.+)");

/// Fields extracted from one output line. All optional; most lines
/// match nothing at all.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LineUpdate {
    /// Percentage rounded to the nearest integer, clamped to 0-100.
    pub progress: Option<u8>,
    /// Transfer rate, verbatim (e.g. "512.00KiB/s").
    pub download_speed: Option<String>,
    /// Remaining time, verbatim (e.g. "00:12").
    pub eta: Option<String>,
    /// Total size, verbatim (e.g. "10.00MiB").
    pub file_size: Option<String>,
    /// Title derived from a `Destination:` marker line: the path
    /// basename without its extension.
    pub title: Option<String>,
}

impl LineUpdate {
    pub fn is_empty(&self) -> bool {
        *self == LineUpdate::default()
    }
}

/// Run every matcher over `line` and coalesce the hits into one update.
pub fn parse_output_line(line: &str) -> LineUpdate {
    let mut update = LineUpdate::default();

    if let Some(caps) = PERCENT_RE.captures(line) {
        if let Ok(percent) = caps[1].parse::<f64>() {
            update.progress = Some(percent.round().clamp(0.0, 100.0) as u8);
        }
    }
    if let Some(caps) = SPEED_RE.captures(line) {
        update.download_speed = Some(caps[1].to_string());
    }
    if let Some(caps) = ETA_RE.captures(line) {
        update.eta = Some(caps[1].to_string());
    }
    if let Some(caps) = SIZE_RE.captures(line) {
        update.file_size = Some(caps[1].to_string());
    }
    if let Some(caps) = DESTINATION_RE.captures(line) {
        update.title = title_from_destination(&caps[1]);
    }

    update
}

/// Basename of the destination path without its extension.
fn title_from_destination(dest: &str) -> Option<String> {
    Path::new(dest.trim())
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
}
