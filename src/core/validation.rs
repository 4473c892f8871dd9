//! Request input validation.
//!
//! The panel forwards whatever URL the user pastes to the extraction
//! tool, which supports hundreds of sites, so there is no domain
//! allowlist here, only scheme/host/length checks that keep obvious
//! garbage and non-web schemes out of a spawned command line.

use thiserror::Error;
use url::Url;

use crate::core::config;

/// Validation errors
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Invalid URL format
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// URL exceeds the configured maximum length
    #[error("URL too long: {0} characters (max {1})")]
    UrlTooLong(usize, usize),
}

/// Validates a URL submitted for download or probing.
///
/// Only HTTP/HTTPS schemes with a host are accepted, capped at
/// [`config::validation::MAX_URL_LENGTH`] characters.
pub fn validate_download_url(url: &str) -> Result<Url, ValidationError> {
    let max = config::validation::MAX_URL_LENGTH;
    if url.len() > max {
        return Err(ValidationError::UrlTooLong(url.len(), max));
    }

    let parsed = Url::parse(url).map_err(|_| ValidationError::InvalidUrl(url.to_string()))?;

    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(ValidationError::InvalidUrl(format!(
            "{} (invalid scheme: {})",
            url,
            parsed.scheme()
        )));
    }

    if parsed.host_str().is_none() {
        return Err(ValidationError::InvalidUrl(format!("{} (no host)", url)));
    }

    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url_valid() {
        let valid_urls = vec![
            "https://youtube.com/watch?v=dQw4w9WgXcQ",
            "https://youtu.be/dQw4w9WgXcQ",
            "http://vimeo.com/12345",
            "https://soundcloud.com/artist/track",
        ];

        for url in valid_urls {
            assert!(validate_download_url(url).is_ok(), "Failed for: {}", url);
        }
    }

    #[test]
    fn test_validate_url_invalid_scheme() {
        let invalid_urls = vec![
            "ftp://youtube.com/watch?v=abc",
            "file:///etc/passwd",
            "javascript:alert('xss')",
        ];

        for url in invalid_urls {
            assert!(validate_download_url(url).is_err(), "Should fail for: {}", url);
        }
    }

    #[test]
    fn test_validate_url_malformed() {
        let invalid_urls = vec!["not a url", "htt://broken", "youtube.com", ""];

        for url in invalid_urls {
            assert!(validate_download_url(url).is_err(), "Should fail for: {}", url);
        }
    }

    #[test]
    fn test_validate_url_too_long() {
        let url = format!("https://example.com/{}", "a".repeat(3000));
        let err = validate_download_url(&url).unwrap_err();
        assert!(matches!(err, ValidationError::UrlTooLong(_, _)));
    }
}
