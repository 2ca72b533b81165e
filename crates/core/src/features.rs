//! Feature extraction over document nodes.
//!
//! A feature is a named scalar (boolean, integer, or float) derived from a
//! node, the extractor's configured parameters, and — for derived features
//! — values already stored for that node during traversal. The registry is
//! fixed: every classifier condition must resolve to one of the entries
//! here or to a base feature computed by the transcoder (`text_length`,
//! `link_length`, `image_count`, ...).
//!
//! Derived entries that read another feature require it to already be
//! present in the node's stored map; requesting them out of dependency
//! order fails with [`TranscodeError::FeatureNotFound`]. The transcoder
//! computes base features bottom-up, so by the time a classifier runs on a
//! node its aggregates exist.

use std::collections::HashMap;

use url::Url;

use crate::config::FeatureParams;
use crate::dom::{Document, NodeId};
use crate::utils;
use crate::{Result, TranscodeError};

/// A single feature value.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureValue {
    Bool(bool),
    Int(i64),
    Float(f64),
}

impl FeatureValue {
    /// Numeric view; booleans normalize to 0/1.
    pub fn as_f64(&self) -> f64 {
        match self {
            FeatureValue::Bool(value) => {
                if *value {
                    1.0
                } else {
                    0.0
                }
            }
            FeatureValue::Int(value) => *value as f64,
            FeatureValue::Float(value) => *value,
        }
    }

    /// Boolean view: any non-zero value is true.
    pub fn is_truthy(&self) -> bool {
        self.as_f64() != 0.0
    }

    /// Additive merge: integral values stay integral, anything else
    /// widens to float.
    pub fn sum(&self, other: &FeatureValue) -> FeatureValue {
        match (self.as_i64(), other.as_i64()) {
            (Some(a), Some(b)) => FeatureValue::Int(a + b),
            _ => FeatureValue::Float(self.as_f64() + other.as_f64()),
        }
    }

    fn as_i64(&self) -> Option<i64> {
        match self {
            FeatureValue::Bool(value) => Some(*value as i64),
            FeatureValue::Int(value) => Some(*value),
            FeatureValue::Float(_) => None,
        }
    }
}

/// Mapping from feature name to value, one per node.
pub type FeatureMap = HashMap<String, FeatureValue>;

/// Features stored for a node after traversal: either a valid node's
/// aggregate map or the invalid sentinel.
#[derive(Debug, Clone)]
struct NodeFeatures {
    valid: bool,
    values: FeatureMap,
}

/// Per-call traversal state: the node-to-features table plus out-of-band
/// context (the request URL).
///
/// One `FeatureState` exists per transcode call and is threaded explicitly
/// through the recursion, so concurrent calls on one transcoder never
/// share mutable state.
#[derive(Debug, Default)]
pub struct FeatureState {
    entries: HashMap<NodeId, NodeFeatures>,
    url: Option<Url>,
}

impl FeatureState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_url(&mut self, url: Url) {
        self.url = Some(url);
    }

    pub fn url(&self) -> Option<&Url> {
        self.url.as_ref()
    }

    /// Records the invalid sentinel for a node.
    pub fn mark_invalid(&mut self, id: NodeId) {
        self.entries.insert(id, NodeFeatures { valid: false, values: FeatureMap::new() });
    }

    /// Stores a valid node's aggregate feature map.
    pub fn store(&mut self, id: NodeId, values: FeatureMap) {
        self.entries.insert(id, NodeFeatures { valid: true, values });
    }

    /// Whether the node was classified valid during traversal.
    pub fn is_valid(&self, id: NodeId) -> bool {
        self.entries.get(&id).map(|entry| entry.valid).unwrap_or(false)
    }

    /// A stored feature value for a node, if the node is valid and the
    /// feature was computed.
    pub fn value(&self, id: NodeId, name: &str) -> Option<&FeatureValue> {
        self.entries.get(&id).and_then(|entry| entry.values.get(name))
    }
}

/// Computes named features for a node from the fixed registry.
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    params: FeatureParams,
}

impl FeatureExtractor {
    pub fn new(params: FeatureParams) -> Self {
        Self { params }
    }

    /// Extracts the requested features in order. Names already present in
    /// the node's stored map (base features from traversal) are reused;
    /// everything else goes through the registry.
    pub fn extract(
        &self,
        doc: &Document,
        id: NodeId,
        state: &FeatureState,
        names: &[String],
    ) -> Result<FeatureMap> {
        let mut features = FeatureMap::new();
        for name in names {
            let value = match state.value(id, name) {
                Some(stored) => stored.clone(),
                None => self.compute(doc, id, state, name)?,
            };
            features.insert(name.clone(), value);
        }
        Ok(features)
    }

    /// Registry dispatch. Entries are total functions of the parameters,
    /// the node's stored feature state, and the node itself.
    fn compute(&self, doc: &Document, id: NodeId, state: &FeatureState, name: &str) -> Result<FeatureValue> {
        let value = match name {
            "is_elem" => FeatureValue::Bool(doc.is_element(id)),
            "in_whitelist" => FeatureValue::Bool(self.tag_in(doc, id, &self.params.white_tags)),
            "not_in_blacklist" => FeatureValue::Bool(!self.tag_in(doc, id, &self.params.black_tags)),
            "not_hidden" => FeatureValue::Bool(!utils::is_hidden_node(doc, id)),
            "not_filtered_by_name" => FeatureValue::Bool(self.not_filtered_by_name(doc, id)),
            "not_filtered_by_word" => FeatureValue::Bool(self.not_filtered_by_word(doc, id)),
            "not_dynamic_node" => FeatureValue::Bool(not_dynamic_node(doc, id)),

            "valid_reorder_parent_tag" => {
                FeatureValue::Bool(self.tag_in(doc, id, &self.params.valid_reorder_parent_tags))
            }
            "node_not_empty" => {
                let text_length = self.require(state, id, "text_length")?.as_f64();
                FeatureValue::Bool(doc.child_count(id) > 0 || text_length > 0.0)
            }
            "child_count_in_range" => {
                let count = doc.child_count(id);
                FeatureValue::Bool(count > self.params.min_child_count && count < self.params.max_child_count)
            }

            "valid_reorder_child_tag" => {
                FeatureValue::Bool(self.tag_in(doc, id, &self.params.valid_reorder_child_tags))
            }
            "large_content" => {
                let text_length = self.require(state, id, "text_length")?.as_f64();
                let image_count = self.require(state, id, "image_count")?.as_f64();
                FeatureValue::Bool(
                    text_length > self.params.min_text_length as f64
                        || image_count > self.params.min_image_count as f64,
                )
            }

            "image_text_ratio" => {
                let text_length = self.require(state, id, "text_length")?.as_f64();
                let image_count = self.require(state, id, "image_count")?.as_f64();
                // text-free nodes rate 1.0 by policy, regardless of image count
                if text_length != 0.0 {
                    FeatureValue::Float(image_count / text_length)
                } else {
                    FeatureValue::Float(1.0)
                }
            }

            "link_ratio_high" => {
                let ratio = self.link_text_ratio(state, id)?;
                FeatureValue::Bool(ratio > self.params.link_ratio_threshold)
            }
            "non_link_length_low" => {
                let text_length = self.require(state, id, "text_length")?.as_f64();
                let link_length = self.require(state, id, "link_length")?.as_f64();
                FeatureValue::Bool(text_length - link_length < self.params.non_link_length_threshold as f64)
            }

            "link_text_ratio" => FeatureValue::Float(self.link_text_ratio(state, id)?),
            "url_is_filename" => {
                let url = state
                    .url()
                    .ok_or_else(|| TranscodeError::FeatureNotFound("url".to_string()))?;
                FeatureValue::Bool(self.url_is_filename(url))
            }
            "non_link_text_length_high" => {
                let text_length = self.require(state, id, "text_length")?.as_f64();
                let link_length = self.require(state, id, "link_length")?.as_f64();
                FeatureValue::Bool(text_length - link_length >= self.params.non_link_text_threshold as f64)
            }
            "large_text_count_high" => {
                let large_text_count = self.require(state, id, "large_text_count")?.as_f64();
                FeatureValue::Bool(large_text_count >= self.params.large_text_count_threshold as f64)
            }

            "link_not_nofollow" => FeatureValue::Bool(doc.attr(id, "rel") != Some("nofollow")),
            "link_not_empty" => FeatureValue::Bool(doc.attr(id, "href").map(|h| !h.is_empty()).unwrap_or(false)),
            "link_not_filtered" => FeatureValue::Bool(self.link_not_filtered(doc, id)),

            _ => return Err(TranscodeError::FeatureNotFound(name.to_string())),
        };
        Ok(value)
    }

    fn require<'a>(&self, state: &'a FeatureState, id: NodeId, name: &str) -> Result<&'a FeatureValue> {
        state
            .value(id, name)
            .ok_or_else(|| TranscodeError::FeatureNotFound(name.to_string()))
    }

    fn link_text_ratio(&self, state: &FeatureState, id: NodeId) -> Result<f64> {
        let text_length = self.require(state, id, "text_length")?.as_f64();
        let link_length = self.require(state, id, "link_length")?.as_f64();
        if text_length != 0.0 {
            Ok(link_length / text_length)
        } else {
            Ok(0.0)
        }
    }

    fn tag_in(&self, doc: &Document, id: NodeId, tags: &[String]) -> bool {
        match doc.tag(id) {
            Some(tag) => tags.iter().any(|t| t == tag),
            None => false,
        }
    }

    /// Substring blacklist on the class and id attributes.
    fn not_filtered_by_name(&self, doc: &Document, id: NodeId) -> bool {
        for attr_name in ["class", "id"] {
            if let Some(value) = doc.attr(id, attr_name) {
                if !value.is_empty() && self.params.removed_names.iter().any(|name| value.contains(name.as_str())) {
                    return false;
                }
            }
        }
        true
    }

    /// Tokenized word blacklist on class and id: an attribute token matches
    /// when it equals or is a prefix of a blacklisted word.
    fn not_filtered_by_word(&self, doc: &Document, id: NodeId) -> bool {
        for attr_name in ["class", "id"] {
            if let Some(value) = doc.attr(id, attr_name) {
                if self.contains_word(value) {
                    return false;
                }
            }
        }
        true
    }

    fn contains_word(&self, text: &str) -> bool {
        let normalized: String = text
            .chars()
            .map(|ch| if ch.is_alphanumeric() { ch } else { ' ' })
            .collect();
        normalized.split_whitespace().any(|token| {
            self.params
                .removed_words
                .iter()
                .any(|word| word == token || word.starts_with(token))
        })
    }

    /// URL path basename is non-empty and not matching the filename blacklist.
    fn url_is_filename(&self, url: &Url) -> bool {
        let filename = url.path().rsplit('/').next().unwrap_or("");
        if filename.is_empty() {
            return false;
        }
        !self
            .params
            .url_filename_blacklist
            .iter()
            .any(|entry| filename.contains(entry.as_str()))
    }

    /// Link target domain is not in the filtered-domain blacklist.
    fn link_not_filtered(&self, doc: &Document, id: NodeId) -> bool {
        let Some(href) = doc.attr(id, "href") else {
            return true;
        };
        let Ok(parsed) = Url::parse(href) else {
            // relative targets carry no host to filter on
            return true;
        };
        match parsed.host_str() {
            Some(host) if !host.is_empty() => !self
                .params
                .filtered_url_domains
                .iter()
                .any(|domain| host.contains(domain.as_str())),
            _ => true,
        }
    }
}

/// Has script children but not exclusively script children.
fn not_dynamic_node(doc: &Document, id: NodeId) -> bool {
    let mut tag_count = 0;
    let mut script_count = 0;
    for child in doc.children(id) {
        if let Some(tag) = doc.tag(child) {
            tag_count += 1;
            if tag == "script" {
                script_count += 1;
            }
        }
    }
    script_count == 0 || tag_count != script_count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn extractor() -> FeatureExtractor {
        FeatureExtractor::new(Config::default().feature_params)
    }

    fn parse(html: &str) -> Document {
        Document::parse(html).unwrap()
    }

    fn extract_one(doc: &Document, id: NodeId, state: &FeatureState, name: &str) -> FeatureValue {
        let features = extractor().extract(doc, id, state, &[name.to_string()]).unwrap();
        features[name].clone()
    }

    #[test]
    fn test_unknown_feature_fails() {
        let doc = parse("<html><body></body></html>");
        let state = FeatureState::new();
        let result = extractor().extract(&doc, doc.root(), &state, &["no_such_feature".to_string()]);
        assert!(matches!(result, Err(TranscodeError::FeatureNotFound(_))));
    }

    #[test]
    fn test_stored_feature_reused() {
        let doc = parse("<html><body></body></html>");
        let mut state = FeatureState::new();
        let mut map = FeatureMap::new();
        map.insert("text_length".to_string(), FeatureValue::Int(42));
        state.store(doc.root(), map);

        let features = extractor()
            .extract(&doc, doc.root(), &state, &["text_length".to_string()])
            .unwrap();
        assert_eq!(features["text_length"], FeatureValue::Int(42));
    }

    #[test]
    fn test_derived_feature_requires_dependency() {
        let doc = parse("<html><body><div></div></body></html>");
        let div = doc.find_descendant(doc.root(), "div").unwrap();
        let state = FeatureState::new();
        let result = extractor().extract(&doc, div, &state, &["image_text_ratio".to_string()]);
        assert!(matches!(result, Err(TranscodeError::FeatureNotFound(_))));
    }

    #[test]
    fn test_image_text_ratio_zero_text_policy() {
        let doc = parse("<html><body><div></div></body></html>");
        let div = doc.find_descendant(doc.root(), "div").unwrap();
        let mut state = FeatureState::new();
        let mut map = FeatureMap::new();
        map.insert("text_length".to_string(), FeatureValue::Int(0));
        map.insert("image_count".to_string(), FeatureValue::Int(5));
        state.store(div, map);

        assert_eq!(extract_one(&doc, div, &state, "image_text_ratio"), FeatureValue::Float(1.0));
    }

    #[test]
    fn test_image_text_ratio_with_text() {
        let doc = parse("<html><body><div></div></body></html>");
        let div = doc.find_descendant(doc.root(), "div").unwrap();
        let mut state = FeatureState::new();
        let mut map = FeatureMap::new();
        map.insert("text_length".to_string(), FeatureValue::Int(4));
        map.insert("image_count".to_string(), FeatureValue::Int(2));
        state.store(div, map);

        assert_eq!(extract_one(&doc, div, &state, "image_text_ratio"), FeatureValue::Float(0.5));
    }

    #[test]
    fn test_blacklist_and_element_checks() {
        let doc = parse("<html><body><iframe></iframe><div></div><!-- c --></body></html>");
        let state = FeatureState::new();
        let iframe = doc.find_descendant(doc.root(), "iframe").unwrap();
        let div = doc.find_descendant(doc.root(), "div").unwrap();
        let body = doc.find_descendant(doc.root(), "body").unwrap();
        let comment = doc.children(body).into_iter().find(|&c| !doc.is_element(c)).unwrap();

        assert_eq!(extract_one(&doc, iframe, &state, "not_in_blacklist"), FeatureValue::Bool(false));
        assert_eq!(extract_one(&doc, div, &state, "not_in_blacklist"), FeatureValue::Bool(true));
        assert_eq!(extract_one(&doc, div, &state, "is_elem"), FeatureValue::Bool(true));
        assert_eq!(extract_one(&doc, comment, &state, "is_elem"), FeatureValue::Bool(false));
    }

    #[test]
    fn test_name_blacklist_substring_match() {
        let doc = parse(r#"<html><body><div class="left-sidebar"></div><div id="content"></div></body></html>"#);
        let state = FeatureState::new();
        let divs = doc.find_descendants(doc.root(), "div");

        assert_eq!(extract_one(&doc, divs[0], &state, "not_filtered_by_name"), FeatureValue::Bool(false));
        assert_eq!(extract_one(&doc, divs[1], &state, "not_filtered_by_name"), FeatureValue::Bool(true));
    }

    #[test]
    fn test_word_blacklist_prefix_match() {
        // token "ad" equals the blacklisted word, token "a" is a prefix of it,
        // token "adsense" is neither
        let doc = parse(
            r#"<html><body>
                <div class="ad banner"></div>
                <div class="a"></div>
                <div class="adsense"></div>
            </body></html>"#,
        );
        let state = FeatureState::new();
        let divs = doc.find_descendants(doc.root(), "div");

        assert_eq!(extract_one(&doc, divs[0], &state, "not_filtered_by_word"), FeatureValue::Bool(false));
        assert_eq!(extract_one(&doc, divs[1], &state, "not_filtered_by_word"), FeatureValue::Bool(false));
        assert_eq!(extract_one(&doc, divs[2], &state, "not_filtered_by_word"), FeatureValue::Bool(true));
    }

    #[test]
    fn test_not_dynamic_node() {
        let doc = parse(
            r#"<html><body>
                <div id="scripts-only"><script>a()</script><script>b()</script></div>
                <div id="mixed"><script>a()</script><p>text</p></div>
                <div id="none"><p>text</p></div>
            </body></html>"#,
        );
        let state = FeatureState::new();
        let divs = doc.find_descendants(doc.root(), "div");

        assert_eq!(extract_one(&doc, divs[0], &state, "not_dynamic_node"), FeatureValue::Bool(false));
        assert_eq!(extract_one(&doc, divs[1], &state, "not_dynamic_node"), FeatureValue::Bool(true));
        assert_eq!(extract_one(&doc, divs[2], &state, "not_dynamic_node"), FeatureValue::Bool(true));
    }

    #[test]
    fn test_link_features() {
        let doc = parse(
            r#"<html><body>
                <a id="plain" href="https://example.com/page">ok</a>
                <a id="nofollow" rel="nofollow" href="x">no</a>
                <a id="empty" href="">no</a>
                <a id="bare">no</a>
                <a id="filtered" href="http://ads.allyes.com/click">no</a>
                <a id="relative" href="/local/page">ok</a>
            </body></html>"#,
        );
        let state = FeatureState::new();
        let anchors = doc.find_descendants(doc.root(), "a");

        assert_eq!(extract_one(&doc, anchors[0], &state, "link_not_nofollow"), FeatureValue::Bool(true));
        assert_eq!(extract_one(&doc, anchors[1], &state, "link_not_nofollow"), FeatureValue::Bool(false));
        assert_eq!(extract_one(&doc, anchors[0], &state, "link_not_empty"), FeatureValue::Bool(true));
        assert_eq!(extract_one(&doc, anchors[2], &state, "link_not_empty"), FeatureValue::Bool(false));
        assert_eq!(extract_one(&doc, anchors[3], &state, "link_not_empty"), FeatureValue::Bool(false));
        assert_eq!(extract_one(&doc, anchors[4], &state, "link_not_filtered"), FeatureValue::Bool(false));
        assert_eq!(extract_one(&doc, anchors[5], &state, "link_not_filtered"), FeatureValue::Bool(true));
    }

    #[test]
    fn test_url_is_filename() {
        let doc = parse("<html><body></body></html>");
        let mut state = FeatureState::new();

        state.set_url(Url::parse("https://example.com/news/story-123.html").unwrap());
        assert_eq!(extract_one(&doc, doc.root(), &state, "url_is_filename"), FeatureValue::Bool(true));

        state.set_url(Url::parse("https://example.com/news/").unwrap());
        assert_eq!(extract_one(&doc, doc.root(), &state, "url_is_filename"), FeatureValue::Bool(false));

        state.set_url(Url::parse("https://example.com/index.html").unwrap());
        assert_eq!(extract_one(&doc, doc.root(), &state, "url_is_filename"), FeatureValue::Bool(false));
    }

    #[test]
    fn test_url_is_filename_requires_url_context() {
        let doc = parse("<html><body></body></html>");
        let state = FeatureState::new();
        let result = extractor().extract(&doc, doc.root(), &state, &["url_is_filename".to_string()]);
        assert!(matches!(result, Err(TranscodeError::FeatureNotFound(_))));
    }

    #[test]
    fn test_feature_value_sum() {
        assert_eq!(FeatureValue::Int(2).sum(&FeatureValue::Int(3)), FeatureValue::Int(5));
        assert_eq!(FeatureValue::Bool(true).sum(&FeatureValue::Int(1)), FeatureValue::Int(2));
        assert_eq!(FeatureValue::Float(0.5).sum(&FeatureValue::Int(1)), FeatureValue::Float(1.5));
    }

    #[test]
    fn test_feature_state_validity() {
        let doc = parse("<html><body></body></html>");
        let mut state = FeatureState::new();
        assert!(!state.is_valid(doc.root()));

        state.mark_invalid(doc.root());
        assert!(!state.is_valid(doc.root()));
        assert_eq!(state.value(doc.root(), "text_length"), None);

        state.store(doc.root(), FeatureMap::new());
        assert!(state.is_valid(doc.root()));
    }
}
