//! Document fetching from URLs, files, and stdin.
//!
//! This module provides functions for retrieving HTML markup from the
//! sources the transcoder accepts: HTTP/HTTPS URLs, local files, and
//! standard input. Fetching is deliberately separate from transcoding so
//! the core pipeline stays synchronous and side-effect free.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use reqwest::Client;
use url::Url;

use crate::dom::Document;
use crate::{Result, TranscodeError};

/// HTTP client configuration for fetching pages to transcode.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Request timeout in seconds.
    pub timeout: u64,
    /// Custom User-Agent string.
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: 30,
            user_agent: "Mozilla/5.0 (compatible; Mobilis/1.0; +https://github.com/stormlightlabs/mobilis)".to_string(),
        }
    }
}

/// Fetches HTML markup from a URL.
///
/// This function performs an HTTP GET request and returns the response body
/// as text. It follows redirects, respects the configured timeout, and
/// identifies itself as a mobile transcoder.
pub async fn fetch_url(url: &str, config: &FetchConfig) -> Result<String> {
    let parsed_url = Url::parse(url).map_err(|e| TranscodeError::InvalidUrl(e.to_string()))?;

    if parsed_url.scheme().is_empty() {
        return Err(TranscodeError::InvalidUrl(
            "URL must include a scheme (http:// or https://)".to_string(),
        ));
    }

    let client = Client::builder()
        .timeout(Duration::from_secs(config.timeout))
        .build()
        .map_err(TranscodeError::Http)?;

    let response = client
        .get(parsed_url)
        .header("User-Agent", &config.user_agent)
        .header(
            "Accept",
            "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
        )
        .header("Accept-Language", "en-US,en;q=0.9")
        .send()
        .await
        .map_err(|e| {
            if e.is_timeout() {
                TranscodeError::Timeout { timeout: config.timeout }
            } else {
                TranscodeError::Http(e)
            }
        })?;

    let content = response.text().await?;

    Ok(content)
}

/// Fetches a URL and parses the response into a document tree.
pub async fn fetch_document(url: &str, config: &FetchConfig) -> Result<Document> {
    let markup = fetch_url(url, config).await?;
    Document::parse(&markup)
}

/// Reads HTML markup from a local file.
///
/// Callers should validate and sanitize the path when accepting user input.
pub fn fetch_file(path: &str) -> Result<String> {
    let path_buf = PathBuf::from(path);

    if !path_buf.exists() {
        Err(TranscodeError::FileNotFound(path_buf))
    } else {
        fs::read_to_string(&path_buf).map_err(TranscodeError::from)
    }
}

/// Reads HTML markup from standard input.
///
/// This function reads all available input from stdin until EOF.
/// Useful for piping content from other commands.
pub fn fetch_stdin() -> Result<String> {
    use std::io::{self, Read};

    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer).map_err(TranscodeError::from)?;

    Ok(buffer)
}
