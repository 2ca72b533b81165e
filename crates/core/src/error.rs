//! Error types for transcoding operations.
//!
//! This module defines the main error type [`TranscodeError`] which
//! represents all possible errors that can occur during configuration
//! resolution, feature extraction, classification, and document fetching.
//!
//! Feature and classifier lookup failures indicate that the configuration
//! and the feature registry are out of sync. They are programmer errors:
//! they propagate immediately and abort the current transcode call rather
//! than being retried or swallowed.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for transcoding operations.
///
/// # Example
///
/// ```rust
/// use mobilis_core::{Document, Transcoder};
///
/// let transcoder = Transcoder::new().unwrap();
/// let doc = Document::parse("<html><body><p>Hello</p></body></html>").unwrap();
/// match transcoder.transcode("https://example.com/a", Some(doc)) {
///     Ok(Some(doc)) => println!("{}", doc.to_html()),
///     Ok(None) => println!("no document"),
///     Err(e) => eprintln!("transcode failed: {}", e),
/// }
/// ```
#[derive(Error, Debug)]
pub enum TranscodeError {
    /// A classifier configuration names a kind the framework does not implement.
    #[error("Unsupported classifier type: {0}")]
    UnsupportedClassifierType(String),

    /// A boolean classifier condition resolves to neither an extracted
    /// feature nor a named switch function.
    #[error("Classifier {classifier} references unsupported feature: {name}")]
    UnsupportedFeature { classifier: String, name: String },

    /// A requested feature is missing from the registry, or a derived
    /// feature was requested before the feature it depends on was computed.
    #[error("Feature not found: {0}")]
    FeatureNotFound(String),

    /// A pretrained model artifact could not be read or parsed.
    ///
    /// This is an unrecoverable construction-time failure: a classifier set
    /// referencing the artifact cannot be built.
    #[error("Failed to load model {path}: {reason}")]
    ModelLoad { path: String, reason: String },

    /// Malformed configuration (missing classifier definitions, bad values).
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTML parsing errors.
    #[error("Failed to parse HTML: {0}")]
    HtmlParse(String),

    /// Invalid URL provided.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Request timeout.
    ///
    /// Returned when an HTTP request exceeds the configured timeout duration.
    #[cfg(feature = "fetch")]
    #[error("Request timed out after {timeout} seconds")]
    Timeout { timeout: u64 },

    /// HTTP request errors from reqwest.
    #[cfg(feature = "fetch")]
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// File not found.
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// File read/write errors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for TranscodeError.
pub type Result<T> = std::result::Result<T, TranscodeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TranscodeError::FeatureNotFound("image_text_ratio".to_string());
        assert!(err.to_string().contains("image_text_ratio"));
    }

    #[test]
    fn test_unsupported_classifier_type() {
        let err = TranscodeError::UnsupportedClassifierType("bayes".to_string());
        assert!(err.to_string().contains("bayes"));
    }

    #[test]
    fn test_unsupported_feature_names_classifier() {
        let err = TranscodeError::UnsupportedFeature {
            classifier: "valid_node".to_string(),
            name: "mystery".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("valid_node"));
        assert!(msg.contains("mystery"));
    }

    #[test]
    fn test_model_load_error() {
        let err = TranscodeError::ModelLoad {
            path: "/tmp/missing.json".to_string(),
            reason: "no such file".to_string(),
        };
        assert!(err.to_string().contains("/tmp/missing.json"));
    }
}
