//! Transcoder configuration.
//!
//! The default configuration is a typed struct tree. Site-specific
//! overrides are partial JSON patches deep-merged onto the serialized
//! default: nested objects merge recursively, every other value replaces,
//! and patch keys absent from the default are silently dropped — a site
//! patch can never introduce configuration the transcoder does not know.
//!
//! # Example
//!
//! ```rust
//! use mobilis_core::config::{Config, SiteConfigTable};
//! use serde_json::json;
//!
//! let mut sites = SiteConfigTable::new();
//! sites.insert("news.example.com", json!({"large_text_threshold": 40}));
//!
//! let patch = sites.get("news.example.com").unwrap();
//! let config = Config::resolve(patch).unwrap();
//! assert_eq!(config.large_text_threshold, 40);
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Result, TranscodeError};

/// References to the injected mobile stylesheet and script.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetRefs {
    pub stylesheet: String,
    pub script: String,
}

/// Independently switchable transform operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct OperationSwitches {
    /// Relocate `<style>` elements found outside `head` into `head`.
    pub move_internal_styles: bool,
    /// Rewrite inline style attributes through the CSS property filter.
    pub change_inline_styles: bool,
    /// Overwrite configured attribute values (e.g. force `width=auto`).
    pub change_tag_attributes: bool,
    /// Strip configured attribute names per tag.
    pub filter_tag_attributes: bool,
    /// Re-append reorder-eligible children in rating order.
    pub reorder_nodes: bool,
    /// Tag link-block nodes with the marker class.
    pub classify_nodes: bool,
    /// Hide nodes that end up empty after traversal.
    pub hide_empty_nodes: bool,
    /// Physically remove nodes that end up empty (alternative to hiding).
    pub drop_empty_nodes: bool,
    /// Run navigation/spam tagging on link containers.
    pub mark_link_containers: bool,
    /// Remove script elements everywhere.
    pub drop_scripts: bool,
    /// Remove script elements on details pages only.
    pub drop_scripts_for_details: bool,
    /// Annotate nodes with a debug summary of their aggregate features.
    pub annotate_features: bool,
}

/// Parameters consumed by the feature-extraction registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureParams {
    pub white_tags: Vec<String>,
    pub black_tags: Vec<String>,
    /// Substring blacklist against class/id values.
    pub removed_names: Vec<String>,
    /// Tokenized word blacklist against class/id values.
    pub removed_words: Vec<String>,
    pub large_text_count_threshold: i64,
    pub non_link_text_threshold: i64,
    pub url_filename_blacklist: Vec<String>,
    pub min_child_count: usize,
    pub max_child_count: usize,
    pub valid_reorder_parent_tags: Vec<String>,
    pub valid_reorder_child_tags: Vec<String>,
    pub min_text_length: i64,
    pub min_image_count: i64,
    pub link_ratio_threshold: f64,
    pub non_link_length_threshold: i64,
    pub filtered_url_domains: Vec<String>,
}

/// Configuration of a single classifier. Immutable after construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// One of `boolean`, `linear`, `model`.
    pub kind: String,
    /// Ordered condition/feature names (boolean and model kinds).
    #[serde(default)]
    pub features: Vec<String>,
    /// Ordered feature weights (linear kind).
    #[serde(default)]
    pub weights: Vec<(String, f64)>,
    /// Model artifact path; the embedded default artifact is used when absent.
    #[serde(default)]
    pub model_path: Option<PathBuf>,
}

/// The full transcoder configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Tags never considered empty (structural or inherently void).
    pub empty_tags: Vec<String>,
    /// Label count at which a text block counts as large.
    pub large_text_threshold: usize,
    /// Link-to-total text ratio above which a container is navigation-like.
    pub link_threshold: f64,
    /// Short-link fraction above which a navigation container collapses.
    pub short_link_threshold: f64,
    /// Tags eligible for navigation/spam tagging.
    pub link_containers: Vec<String>,
    /// Maximum label count of a link still considered short.
    pub min_link_length: usize,
    /// Attribute names stripped per tag.
    pub filtered_tag_attributes: BTreeMap<String, Vec<String>>,
    /// Attribute values overwritten wherever the attribute is present.
    pub changed_tag_attributes: Vec<(String, String)>,
    /// Inline CSS properties removed outright.
    pub filtered_css_properties: Vec<String>,
    /// Inline CSS properties replaced with fixed values.
    pub changed_css_properties: Vec<(String, String)>,
    /// Non-visible tags that contribute no features.
    pub skipped_tags: Vec<String>,
    /// Tags ignored when counting a node's visible children.
    pub invisible_tags: Vec<String>,
    /// Injected stylesheet/script references.
    pub assets: AssetRefs,
    pub switches: OperationSwitches,
    pub feature_params: FeatureParams,
    pub classifiers: BTreeMap<String, ClassifierConfig>,
}

impl Default for Config {
    fn default() -> Self {
        let strings = |items: &[&str]| -> Vec<String> { items.iter().map(|s| s.to_string()).collect() };

        let boolean = |features: &[&str]| ClassifierConfig {
            kind: "boolean".to_string(),
            features: strings(features),
            weights: Vec::new(),
            model_path: None,
        };

        let mut classifiers = BTreeMap::new();
        classifiers.insert(
            "valid_node".to_string(),
            boolean(&["is_elem", "not_in_blacklist", "not_hidden", "not_filtered_by_name", "not_filtered_by_word"]),
        );
        classifiers.insert(
            "valid_link".to_string(),
            boolean(&["link_not_nofollow", "link_not_empty", "link_not_filtered"]),
        );
        classifiers.insert(
            "reorder_parent".to_string(),
            boolean(&["valid_reorder_parent_tag", "node_not_empty", "child_count_in_range"]),
        );
        classifiers.insert(
            "reorder_child".to_string(),
            boolean(&["valid_reorder_child_tag", "large_content"]),
        );
        classifiers.insert(
            "reorder_rating".to_string(),
            ClassifierConfig {
                kind: "linear".to_string(),
                features: Vec::new(),
                weights: vec![("image_text_ratio".to_string(), 1.0)],
                model_path: None,
            },
        );
        classifiers.insert(
            "link_node".to_string(),
            boolean(&["link_ratio_high", "non_link_length_low"]),
        );
        classifiers.insert(
            "list_page".to_string(),
            ClassifierConfig {
                kind: "model".to_string(),
                features: strings(&[
                    "link_text_ratio",
                    "url_is_filename",
                    "non_link_text_length_high",
                    "large_text_count_high",
                ]),
                weights: Vec::new(),
                model_path: None,
            },
        );

        let mut filtered_tag_attributes = BTreeMap::new();
        filtered_tag_attributes.insert("table".to_string(), strings(&["cellspacing", "cellpadding"]));

        Self {
            empty_tags: strings(&["frame", "img", "base", "br", "link", "body", "head", "input"]),
            large_text_threshold: 80,
            link_threshold: 0.5,
            short_link_threshold: 0.8,
            link_containers: strings(&["div", "p", "h1", "h2", "h3", "h4", "h5", "h6", "ul", "li"]),
            min_link_length: 7,
            filtered_tag_attributes,
            changed_tag_attributes: vec![("width".to_string(), "auto".to_string())],
            filtered_css_properties: strings(&["width", "float", "position", "padding", "margin"]),
            changed_css_properties: Vec::new(),
            skipped_tags: strings(&["noscript", "noframes", "script", "style", "param", "object", "applet", "meta", "title"]),
            invisible_tags: strings(&["noscript", "noframes", "script", "style", "param"]),
            assets: AssetRefs { stylesheet: "./mobilis.css".to_string(), script: "/mobilis.js".to_string() },
            switches: OperationSwitches {
                move_internal_styles: true,
                change_inline_styles: true,
                change_tag_attributes: true,
                filter_tag_attributes: true,
                reorder_nodes: true,
                classify_nodes: true,
                hide_empty_nodes: true,
                drop_empty_nodes: false,
                mark_link_containers: true,
                drop_scripts: false,
                drop_scripts_for_details: true,
                annotate_features: false,
            },
            feature_params: FeatureParams {
                white_tags: Vec::new(),
                black_tags: strings(&["iframe", "embed"]),
                removed_names: strings(&["bar", "foot", "friend", "slide", "calendar", "header", "sidebar"]),
                removed_words: strings(&["ad"]),
                large_text_count_threshold: 2,
                non_link_text_threshold: 600,
                url_filename_blacklist: strings(&["forum.", "list", "default.", "index."]),
                min_child_count: 1,
                max_child_count: 4,
                valid_reorder_parent_tags: strings(&["div"]),
                valid_reorder_child_tags: strings(&["div"]),
                min_text_length: 500,
                min_image_count: 2,
                link_ratio_threshold: 0.5,
                non_link_length_threshold: 20,
                filtered_url_domains: strings(&["allyes.com", "ad-plus.cn"]),
            },
            classifiers,
        }
    }
}

impl Config {
    /// The default configuration as a JSON value, the base every site
    /// patch merges onto.
    pub fn default_value() -> Value {
        serde_json::to_value(Config::default()).expect("default config serializes")
    }

    /// Resolves a site patch against the default configuration.
    pub fn resolve(patch: &Value) -> Result<Config> {
        let mut merged = Config::default_value();
        merge_config(&mut merged, patch);
        serde_json::from_value(merged).map_err(|e| TranscodeError::Config(e.to_string()))
    }
}

/// Deep-merges `patch` into `dst`. Keys absent from `dst` are ignored;
/// nested objects merge recursively; every other value replaces.
pub fn merge_config(dst: &mut Value, patch: &Value) {
    let (Value::Object(dst_map), Value::Object(patch_map)) = (dst, patch) else {
        return;
    };
    for (key, patch_value) in patch_map {
        let Some(dst_value) = dst_map.get_mut(key) else {
            continue;
        };
        if dst_value.is_object() && patch_value.is_object() {
            merge_config(dst_value, patch_value);
        } else {
            *dst_value = patch_value.clone();
        }
    }
}

/// Whether a site patch forces rebuilding the classifier set: classifier
/// definitions and feature-extraction parameters feed into classifier
/// construction, everything else only affects the transform itself.
pub fn patch_touches_classifiers(patch: &Value) -> bool {
    match patch {
        Value::Object(map) => map.contains_key("classifiers") || map.contains_key("feature_params"),
        _ => false,
    }
}

/// Mapping from destination host to a partial configuration patch.
#[derive(Debug, Clone, Default)]
pub struct SiteConfigTable {
    entries: BTreeMap<String, Value>,
}

impl SiteConfigTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, host: &str, patch: Value) {
        self.entries.insert(host.to_string(), patch);
    }

    pub fn get(&self, host: &str) -> Option<&Value> {
        self.entries.get(host)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(host, patch)| (host.as_str(), patch))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Loads a site table from a JSON file shaped `{host: patch, ...}`.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(TranscodeError::FileNotFound(path.to_path_buf()));
        }
        let raw = fs::read_to_string(path)?;
        let parsed: BTreeMap<String, Value> =
            serde_json::from_str(&raw).map_err(|e| TranscodeError::Config(e.to_string()))?;
        Ok(Self { entries: parsed })
    }
}
