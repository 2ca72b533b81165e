//! Node classifiers.
//!
//! A classifier consumes a feature map and produces a verdict: a boolean
//! decision or a raw numeric score. Three kinds exist, resolved once at
//! configuration-build time into a closed variant:
//!
//! - **Boolean**: short-circuiting AND over an ordered condition list.
//! - **Linear**: weighted sum over the configured features; the raw score
//!   is only ever compared between siblings, never against a cutoff.
//! - **Model**: pretrained binary predictor over a fixed-order feature
//!   vector.
//!
//! The seven classifiers driving a transcode are bundled in a
//! [`ClassifierSet`], built once per configuration and shared read-only
//! across calls.

use std::collections::HashMap;

use crate::config::{ClassifierConfig, Config, FeatureParams};
use crate::dom::{Document, NodeId};
use crate::features::{FeatureExtractor, FeatureMap, FeatureState};
use crate::model::{DEFAULT_LIST_PAGE_MODEL, Model};
use crate::{Result, TranscodeError};

/// Outcome of a classification.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Verdict {
    Decision(bool),
    Score(f64),
}

impl Verdict {
    /// Boolean view of the verdict; a score is positive when non-zero.
    pub fn is_positive(&self) -> bool {
        match self {
            Verdict::Decision(value) => *value,
            Verdict::Score(score) => *score != 0.0,
        }
    }

    /// Numeric view of the verdict.
    pub fn score(&self) -> f64 {
        match self {
            Verdict::Decision(value) => {
                if *value {
                    1.0
                } else {
                    0.0
                }
            }
            Verdict::Score(score) => *score,
        }
    }
}

/// A named boolean switch over extracted features and parameters, used by
/// boolean classifiers for conditions that are not data-derived.
pub type SwitchFn = fn(&FeatureMap, &FeatureParams) -> bool;

/// A configured classifier.
#[derive(Debug, Clone)]
pub enum Classifier {
    Boolean(BooleanClassifier),
    Linear(LinearClassifier),
    Model(ModelClassifier),
}

impl Classifier {
    /// Builds a classifier from its configuration. Unknown kind strings
    /// fail with [`TranscodeError::UnsupportedClassifierType`]; model
    /// classifiers load their artifact here and fail fatally when it is
    /// missing or corrupt.
    pub fn from_config(name: &str, params: &FeatureParams, config: &ClassifierConfig) -> Result<Self> {
        let extractor = FeatureExtractor::new(params.clone());
        match config.kind.as_str() {
            "boolean" => Ok(Classifier::Boolean(BooleanClassifier {
                name: name.to_string(),
                features: config.features.clone(),
                params: params.clone(),
                extractor,
                switches: HashMap::new(),
            })),
            "linear" => {
                if config.weights.is_empty() {
                    return Err(TranscodeError::Config(format!(
                        "linear classifier {} has no weights",
                        name
                    )));
                }
                Ok(Classifier::Linear(LinearClassifier { weights: config.weights.clone(), extractor }))
            }
            "model" => {
                let model = match &config.model_path {
                    Some(path) => Model::load(path)?,
                    None => Model::from_json(DEFAULT_LIST_PAGE_MODEL)?,
                };
                Ok(Classifier::Model(ModelClassifier {
                    features: config.features.clone(),
                    extractor,
                    model,
                }))
            }
            other => Err(TranscodeError::UnsupportedClassifierType(other.to_string())),
        }
    }

    /// Extracts this classifier's features for the node and classifies them.
    pub fn classify(&self, doc: &Document, id: NodeId, state: &FeatureState) -> Result<Verdict> {
        match self {
            Classifier::Boolean(classifier) => classifier.classify(doc, id, state).map(Verdict::Decision),
            Classifier::Linear(classifier) => classifier.classify(doc, id, state).map(Verdict::Score),
            Classifier::Model(classifier) => classifier.classify(doc, id, state).map(Verdict::Decision),
        }
    }
}

/// Ordered short-circuiting AND over named conditions.
#[derive(Debug, Clone)]
pub struct BooleanClassifier {
    name: String,
    features: Vec<String>,
    params: FeatureParams,
    extractor: FeatureExtractor,
    switches: HashMap<String, SwitchFn>,
}

impl BooleanClassifier {
    /// Registers a named switch function, resolved for condition names
    /// absent from the extracted feature map.
    pub fn with_switch(mut self, name: &str, switch: SwitchFn) -> Self {
        self.switches.insert(name.to_string(), switch);
        self
    }

    fn classify(&self, doc: &Document, id: NodeId, state: &FeatureState) -> Result<bool> {
        // Names that resolve to switches rather than registry features are
        // left out of the map; dependency failures still propagate.
        let mut features = FeatureMap::new();
        for name in &self.features {
            match self.extractor.extract(doc, id, state, std::slice::from_ref(name)) {
                Ok(extracted) => features.extend(extracted),
                Err(TranscodeError::FeatureNotFound(missing)) if missing == *name => {}
                Err(e) => return Err(e),
            }
        }

        for name in &self.features {
            let success = match features.get(name) {
                Some(value) => value.is_truthy(),
                None => match self.switches.get(name) {
                    Some(switch) => switch(&features, &self.params),
                    None => {
                        return Err(TranscodeError::UnsupportedFeature {
                            classifier: self.name.clone(),
                            name: name.clone(),
                        });
                    }
                },
            };
            if !success {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// Weighted sum over the configured features; no thresholding.
#[derive(Debug, Clone)]
pub struct LinearClassifier {
    weights: Vec<(String, f64)>,
    extractor: FeatureExtractor,
}

impl LinearClassifier {
    fn classify(&self, doc: &Document, id: NodeId, state: &FeatureState) -> Result<f64> {
        let names: Vec<String> = self.weights.iter().map(|(name, _)| name.clone()).collect();
        let features = self.extractor.extract(doc, id, state, &names)?;

        let mut score = 0.0;
        for (name, weight) in &self.weights {
            let value = features
                .get(name)
                .ok_or_else(|| TranscodeError::FeatureNotFound(name.clone()))?;
            score += value.as_f64() * weight;
        }
        Ok(score)
    }
}

/// Pretrained binary predictor over a fixed-order feature vector.
#[derive(Debug, Clone)]
pub struct ModelClassifier {
    features: Vec<String>,
    extractor: FeatureExtractor,
    model: Model,
}

impl ModelClassifier {
    fn classify(&self, doc: &Document, id: NodeId, state: &FeatureState) -> Result<bool> {
        let features = self.extractor.extract(doc, id, state, &self.features)?;

        let mut vector = Vec::with_capacity(self.features.len());
        for name in &self.features {
            let value = features
                .get(name)
                .ok_or_else(|| TranscodeError::FeatureNotFound(name.clone()))?;
            // booleans normalize to 0/1 before inference
            vector.push(value.as_f64());
        }

        let label = self.model.predict(&vector);
        Ok(label == self.model.positive_label())
    }
}

/// The seven classifiers a transcode call runs with.
#[derive(Debug, Clone)]
pub struct ClassifierSet {
    pub valid_node: Classifier,
    pub valid_link: Classifier,
    pub reorder_parent: Classifier,
    pub reorder_child: Classifier,
    pub reorder_rating: Classifier,
    pub link_node: Classifier,
    pub list_page: Classifier,
}

impl ClassifierSet {
    /// Builds the full set from a configuration. Every classifier must be
    /// defined; model artifacts load here.
    pub fn from_config(config: &Config) -> Result<Self> {
        let build = |name: &str| -> Result<Classifier> {
            let classifier_config = config
                .classifiers
                .get(name)
                .ok_or_else(|| TranscodeError::Config(format!("missing classifier definition: {}", name)))?;
            Classifier::from_config(name, &config.feature_params, classifier_config)
        };

        Ok(Self {
            valid_node: build("valid_node")?,
            valid_link: build("valid_link")?,
            reorder_parent: build("reorder_parent")?,
            reorder_child: build("reorder_child")?,
            reorder_rating: build("reorder_rating")?,
            link_node: build("link_node")?,
            list_page: build("list_page")?,
        })
    }
}
