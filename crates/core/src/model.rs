//! Pretrained binary prediction models.
//!
//! A [`Model`] is an opaque scoring function loaded from a JSON artifact:
//! a weight vector, a bias term, and the two output labels (positive
//! first). Loading happens once when a classifier set is built; a missing
//! or corrupt artifact is an unrecoverable construction error. Once
//! loaded, a model is read-only and safe to share across calls.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::{Result, TranscodeError};

/// The default list-page model, shipped with the crate and used when a
/// model classifier configuration names no artifact path.
pub const DEFAULT_LIST_PAGE_MODEL: &str = include_str!("../models/list_page.json");

/// A pretrained binary decision model.
#[derive(Debug, Clone, Deserialize)]
pub struct Model {
    weights: Vec<f64>,
    bias: f64,
    /// Output labels, positive label first.
    labels: [f64; 2],
}

impl Model {
    /// Loads a model artifact from disk. Fails with
    /// [`TranscodeError::ModelLoad`] when the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|e| TranscodeError::ModelLoad {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_json(&raw).map_err(|e| match e {
            TranscodeError::ModelLoad { reason, .. } => TranscodeError::ModelLoad {
                path: path.display().to_string(),
                reason,
            },
            other => other,
        })
    }

    /// Parses a model artifact from its JSON text.
    pub fn from_json(raw: &str) -> Result<Self> {
        let model: Model = serde_json::from_str(raw).map_err(|e| TranscodeError::ModelLoad {
            path: "<inline>".to_string(),
            reason: e.to_string(),
        })?;
        if model.weights.is_empty() {
            return Err(TranscodeError::ModelLoad {
                path: "<inline>".to_string(),
                reason: "empty weight vector".to_string(),
            });
        }
        Ok(model)
    }

    /// The label meaning a positive verdict.
    pub fn positive_label(&self) -> f64 {
        self.labels[0]
    }

    /// Number of input features the model expects.
    pub fn dimensions(&self) -> usize {
        self.weights.len()
    }

    /// Predicts a label for a fixed-order feature vector. Vectors shorter
    /// than the weight vector are treated as zero-padded.
    pub fn predict(&self, features: &[f64]) -> f64 {
        let score: f64 = self
            .weights
            .iter()
            .zip(features.iter())
            .map(|(weight, feature)| weight * feature)
            .sum::<f64>()
            + self.bias;
        if score >= 0.0 { self.labels[0] } else { self.labels[1] }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_from_json() {
        let model = Model::from_json(r#"{"weights": [1.0, -1.0], "bias": 0.0, "labels": [1.0, -1.0]}"#).unwrap();
        assert_eq!(model.dimensions(), 2);
        assert_eq!(model.positive_label(), 1.0);
    }

    #[test]
    fn test_predict_sign() {
        let model = Model::from_json(r#"{"weights": [2.0, -1.0], "bias": -0.5, "labels": [1.0, -1.0]}"#).unwrap();
        assert_eq!(model.predict(&[1.0, 0.0]), 1.0);
        assert_eq!(model.predict(&[0.0, 1.0]), -1.0);
    }

    #[test]
    fn test_load_missing_file() {
        let result = Model::load(Path::new("/nonexistent/model.json"));
        assert!(matches!(result, Err(TranscodeError::ModelLoad { .. })));
    }

    #[test]
    fn test_load_corrupt_artifact() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"not json at all").unwrap();
        let result = Model::load(file.path());
        assert!(matches!(result, Err(TranscodeError::ModelLoad { .. })));
    }

    #[test]
    fn test_load_valid_artifact() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(br#"{"weights": [1.0], "bias": 0.0, "labels": [1.0, 0.0]}"#).unwrap();
        let model = Model::load(file.path()).unwrap();
        assert_eq!(model.predict(&[3.0]), 1.0);
    }

    #[test]
    fn test_empty_weights_rejected() {
        let result = Model::from_json(r#"{"weights": [], "bias": 0.0, "labels": [1.0, -1.0]}"#);
        assert!(matches!(result, Err(TranscodeError::ModelLoad { .. })));
    }

    #[test]
    fn test_default_artifact_parses() {
        let model = Model::from_json(DEFAULT_LIST_PAGE_MODEL).unwrap();
        assert_eq!(model.dimensions(), 4);
        assert_eq!(model.positive_label(), 1.0);
    }
}
