//! The recursive transcode pipeline.
//!
//! [`Transcoder`] holds the default configuration, the classifier set
//! built from it, and per-host overrides resolved once at construction.
//! Each call looks up the effective configuration for the request host
//! and runs a single
//! bottom-up pass over the node tree: every node is validated, its layout
//! adjusted, its base features measured, its children's features
//! aggregated, and its structural role (reorderable content, link block,
//! navigation container) acted on. A final whole-page classification
//! decides between a list rendering and a details rendering.
//!
//! All per-call mutable state lives in a [`FeatureState`] threaded through
//! the recursion, so one transcoder can serve concurrent calls.
//!
//! # Example
//!
//! ```rust
//! use mobilis_core::{Document, Transcoder};
//!
//! let transcoder = Transcoder::new().unwrap();
//! let doc = Document::parse("<html><body><p>Hello</p></body></html>").unwrap();
//! let result = transcoder.transcode("https://example.com/story.html", Some(doc)).unwrap();
//! assert!(result.unwrap().to_html().contains("mobilis.css"));
//! ```

use std::collections::BTreeMap;

use url::Url;

use crate::classify::ClassifierSet;
use crate::config::{Config, SiteConfigTable, patch_touches_classifiers};
use crate::dom::{Document, NodeId};
use crate::features::{FeatureMap, FeatureState, FeatureValue};
use crate::utils::{
    self, CLASS_LINK_BLOCK, CLASS_LIST, CLASS_NAV, CLASS_NAV_BLOCK, CLASS_NAV_GROUP,
};
use crate::{Result, TranscodeError};

/// Inline style marking a node the transcoder decided to hide. Kept
/// distinct from a plain `display: none` so hidden-node detection does not
/// mistake our own markers for author styling.
const HIDDEN_STYLE: &str = "display: none !important";

/// Feature names measured directly during traversal, as opposed to the
/// derived entries in the extraction registry. Every valid node starts
/// from a zeroed map over these.
const BASE_FEATURES: &[&str] = &[
    "link_length",
    "link_length_bak",
    "link_count",
    "image_link_count",
    "short_link_count",
    "text_length",
    "large_text_count",
    "image_count",
];

/// A host's resolved override: the merged configuration, plus a dedicated
/// classifier set when the patch touched classifier inputs.
#[derive(Debug)]
struct SiteEntry {
    config: Config,
    classifiers: Option<ClassifierSet>,
}

/// Rewrites HTML documents for small-screen rendering.
#[derive(Debug)]
pub struct Transcoder {
    config: Config,
    classifiers: ClassifierSet,
    sites: BTreeMap<String, SiteEntry>,
}

impl Transcoder {
    /// Builds a transcoder with the default configuration and no site
    /// overrides. Fails when the default classifier set cannot be built.
    pub fn new() -> Result<Self> {
        Self::with_site_configs(SiteConfigTable::new())
    }

    /// Builds a transcoder carrying a table of per-host configuration
    /// patches. Every patch is resolved here, so a malformed site entry or
    /// an unloadable model artifact fails construction instead of the
    /// first request for that host.
    pub fn with_site_configs(site_configs: SiteConfigTable) -> Result<Self> {
        let config = Config::default();
        let classifiers = ClassifierSet::from_config(&config)?;

        let mut sites = BTreeMap::new();
        for (host, patch) in site_configs.iter() {
            let site_config = Config::resolve(patch)?;
            let site_classifiers = if patch_touches_classifiers(patch) {
                Some(ClassifierSet::from_config(&site_config)?)
            } else {
                None
            };
            sites.insert(host.to_string(), SiteEntry { config: site_config, classifiers: site_classifiers });
        }

        Ok(Self { config, classifiers, sites })
    }

    /// Transcodes a document fetched from `url`. A `None` document passes
    /// through as `None`; anything else comes back rewritten in place.
    ///
    /// The URL must be absolute: its host selects the site override and
    /// its path feeds the list-page classification.
    pub fn transcode(&self, url: &str, doc: Option<Document>) -> Result<Option<Document>> {
        let Some(mut doc) = doc else {
            return Ok(None);
        };
        let parsed = Url::parse(url).map_err(|_| TranscodeError::InvalidUrl(url.to_string()))?;
        doc.check_root()?;

        let (config, classifiers) = match parsed.host_str().and_then(|host| self.sites.get(host)) {
            Some(entry) => (&entry.config, entry.classifiers.as_ref().unwrap_or(&self.classifiers)),
            None => (&self.config, &self.classifiers),
        };

        let mut state = FeatureState::new();
        state.set_url(parsed);

        // Relocated internal styles and injected headers both need a head.
        doc.ensure_head();

        let pass = Pass { config, classifiers };
        let root = doc.root();
        pass.transcode_node(&mut doc, root, &mut state)?;

        utils::add_default_headers(&mut doc, &config.assets);
        utils::build_nav_shadows(&mut doc);

        let is_list = classifiers.list_page.classify(&doc, root, &state)?.is_positive();
        if !is_list {
            pass.details_pass(&mut doc, root);
        }

        Ok(Some(doc))
    }
}

/// One transcode call's resolved configuration and classifiers.
struct Pass<'a> {
    config: &'a Config,
    classifiers: &'a ClassifierSet,
}

impl Pass<'_> {
    /// Processes one node bottom-up. Returns the node's aggregate feature
    /// map when it is valid, `None` when it was rejected or consumed
    /// (skipped tag, relocated style, dropped script).
    fn transcode_node(
        &self,
        doc: &mut Document,
        id: NodeId,
        state: &mut FeatureState,
    ) -> Result<Option<FeatureMap>> {
        if !self.classifiers.valid_node.classify(doc, id, state)?.is_positive() {
            hide_node(doc, id);
            state.mark_invalid(id);
            return Ok(None);
        }

        self.adjust_layout(doc, id);

        let mut features = FeatureMap::new();
        for name in BASE_FEATURES {
            features.insert(name.to_string(), FeatureValue::Int(0));
        }

        match doc.tag(id) {
            Some("a") => {
                if !self.classifiers.valid_link.classify(doc, id, state)?.is_positive() {
                    hide_node(doc, id);
                    state.mark_invalid(id);
                    return Ok(None);
                }
                // falls through: anchor children still get layout
                // adjustment and aggregate into the anchor's map
                self.measure_link(doc, id, &mut features);
            }
            Some("img") => {
                features.insert("image_count".to_string(), FeatureValue::Int(1));
                state.store(id, features.clone());
                return Ok(Some(features));
            }
            Some("style") => {
                if self.config.switches.move_internal_styles {
                    self.move_style_to_head(doc, id);
                }
                state.mark_invalid(id);
                return Ok(None);
            }
            Some("script") => {
                if self.config.switches.drop_scripts {
                    doc.detach(id);
                }
                state.mark_invalid(id);
                return Ok(None);
            }
            Some(tag) if self.config.skipped_tags.iter().any(|t| t == tag) => {
                state.mark_invalid(id);
                return Ok(None);
            }
            _ => {}
        }

        for child in doc.children(id) {
            if let Some(child_features) = self.transcode_node(doc, child, state)? {
                utils::aggregate_features(&mut features, &child_features);
            }
        }
        self.measure_text(doc, id, &mut features);

        if (self.config.switches.hide_empty_nodes || self.config.switches.drop_empty_nodes)
            && utils::is_empty_node(doc, id, &self.config.empty_tags, &self.config.invisible_tags)
        {
            if self.config.switches.hide_empty_nodes {
                hide_node(doc, id);
            } else {
                doc.detach(id);
            }
            state.mark_invalid(id);
            return Ok(None);
        }

        // Aggregates must be visible to the structural classifiers below.
        state.store(id, features.clone());

        if self.config.switches.reorder_nodes {
            self.reorder_children(doc, id, state)?;
        }
        if self.config.switches.classify_nodes
            && self.classifiers.link_node.classify(doc, id, state)?.is_positive()
        {
            doc.add_class(id, CLASS_LINK_BLOCK);
        }
        if self.config.switches.mark_link_containers {
            self.mark_link_container(doc, id, &features);
        }
        if self.config.switches.annotate_features {
            annotate_node(doc, id, &features);
        }

        Ok(Some(features))
    }

    /// Attribute and inline-style rewrites applied to every valid element.
    fn adjust_layout(&self, doc: &mut Document, id: NodeId) {
        let Some(tag) = doc.tag(id).map(str::to_string) else {
            return;
        };

        if self.config.switches.filter_tag_attributes {
            if let Some(filtered) = self.config.filtered_tag_attributes.get(&tag) {
                for name in filtered.clone() {
                    doc.remove_attr(id, &name);
                }
            }
        }

        if self.config.switches.change_tag_attributes {
            for (name, value) in self.config.changed_tag_attributes.clone() {
                let present = doc.attr(id, &name).map(|v| !v.is_empty()).unwrap_or(false);
                if present {
                    doc.set_attr(id, &name, &value);
                }
            }
        }

        if self.config.switches.change_inline_styles {
            if let Some(style) = doc.attr(id, "style").map(str::to_string) {
                match utils::shrink_style(
                    &style,
                    &self.config.filtered_css_properties,
                    &self.config.changed_css_properties,
                ) {
                    Some(shrunk) => doc.set_attr(id, "style", &shrunk),
                    None => doc.remove_attr(id, "style"),
                }
            }
        }
    }

    /// Base features of a validated link: label count of the subtree text,
    /// shortness, and embedded images. Text length comes from the common
    /// measurement plus child aggregation, like any other eligible node.
    fn measure_link(&self, doc: &Document, id: NodeId, features: &mut FeatureMap) {
        let link_length = utils::label_count(doc.text_content(id).trim()) as i64;
        let image_link_count = doc.find_descendants(id, "img").len() as i64;

        features.insert("link_length".to_string(), FeatureValue::Int(link_length));
        features.insert("link_length_bak".to_string(), FeatureValue::Int(link_length));
        features.insert("link_count".to_string(), FeatureValue::Int(1));
        features.insert("image_link_count".to_string(), FeatureValue::Int(image_link_count));
        if link_length <= self.config.min_link_length as i64 {
            features.insert("short_link_count".to_string(), FeatureValue::Int(1));
        }
    }

    /// Adds the node's own character data on top of the aggregated child
    /// features: label counts of text and tail, plus the large-text tally.
    fn measure_text(&self, doc: &Document, id: NodeId, features: &mut FeatureMap) {
        let node = doc.node(id);
        let own_text = node.text.as_deref().map(utils::label_count).unwrap_or(0);
        let tail_text = node.tail.as_deref().map(utils::label_count).unwrap_or(0);

        let addition = FeatureMap::from([(
            "text_length".to_string(),
            FeatureValue::Int((own_text + tail_text) as i64),
        )]);
        utils::aggregate_features(features, &addition);

        if own_text + tail_text >= self.config.large_text_threshold {
            let bump = FeatureMap::from([("large_text_count".to_string(), FeatureValue::Int(1))]);
            utils::aggregate_features(features, &bump);
        }
    }

    /// Relocates an internal `style` element into `head`, dropping its tail
    /// so no stray text travels with it.
    fn move_style_to_head(&self, doc: &mut Document, id: NodeId) {
        let head = doc.ensure_head();
        if doc.parent(id) == Some(head) {
            return;
        }
        doc.node_mut(id).tail = None;
        doc.append(head, id);
    }

    /// Re-appends a node's children in ascending rating order. All or
    /// nothing: one invalid or non-reorderable child cancels the whole
    /// reorder, so sibling order is never partially rewritten.
    fn reorder_children(&self, doc: &mut Document, id: NodeId, state: &FeatureState) -> Result<()> {
        if !self.classifiers.reorder_parent.classify(doc, id, state)?.is_positive() {
            return Ok(());
        }

        let children = doc.children(id);
        let mut rated: Vec<(NodeId, f64)> = Vec::with_capacity(children.len());
        for child in children {
            if !state.is_valid(child)
                || !self.classifiers.reorder_child.classify(doc, child, state)?.is_positive()
            {
                return Ok(());
            }
            let rating = self.classifiers.reorder_rating.classify(doc, child, state)?.score();
            rated.push((child, rating));
        }

        rated.sort_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        for (child, _) in rated {
            doc.append(id, child);
        }
        Ok(())
    }

    /// Navigation/spam tagging of link containers. A container whose text
    /// is mostly link text is either navigation (mostly short links, with
    /// the marker promoted from its children) or a spam-like link list.
    fn mark_link_container(&self, doc: &mut Document, id: NodeId, features: &FeatureMap) {
        let Some(tag) = doc.tag(id) else {
            return;
        };
        if !self.config.link_containers.iter().any(|t| t == tag) {
            return;
        }

        let text_length = feature_f64(features, "text_length");
        let link_length = feature_f64(features, "link_length");
        let link_count = feature_f64(features, "link_count");
        let short_link_count = feature_f64(features, "short_link_count");

        let link_ratio = if text_length > 0.0 { link_length / text_length } else { 0.0 };
        if link_ratio <= self.config.link_threshold {
            return;
        }

        let short_ratio = if link_count > 0.0 { short_link_count / link_count } else { 0.0 };
        if short_ratio <= self.config.short_link_threshold {
            doc.add_class(id, CLASS_LIST);
            return;
        }

        // Collapsed navigation flows without inter-link text.
        for anchor in doc.find_descendants(id, "a") {
            doc.node_mut(anchor).tail = None;
        }

        // competing markers anywhere in the subtree get relabeled, so a
        // collapsed block nested behind a non-container never duplicates
        if short_link_count == 1.0 {
            for nested in doc.find_by_class(id, CLASS_NAV) {
                doc.replace_class_token(nested, CLASS_NAV, "");
            }
            doc.add_class(id, CLASS_NAV);
        } else if short_link_count > 3.0 {
            for nested in doc.find_by_class(id, CLASS_NAV_BLOCK) {
                doc.replace_class_token(nested, CLASS_NAV_BLOCK, CLASS_NAV_GROUP);
            }
            doc.add_class(id, CLASS_NAV_BLOCK);
        } else {
            for nested in doc.find_by_class(id, CLASS_NAV_GROUP) {
                doc.replace_class_token(nested, CLASS_NAV_GROUP, "");
            }
            doc.add_class(id, CLASS_NAV_GROUP);
        }
    }

    /// Details rendering: link blocks disappear wholesale and scripts are
    /// dropped when the details-only script switch asks for it.
    fn details_pass(&self, doc: &mut Document, id: NodeId) {
        let drop_scripts =
            !self.config.switches.drop_scripts && self.config.switches.drop_scripts_for_details;
        for child in doc.children(id) {
            if doc.has_class(child, CLASS_LINK_BLOCK) {
                hide_node(doc, child);
                continue;
            }
            if doc.tag(child) == Some("script") && drop_scripts {
                doc.detach(child);
                continue;
            }
            self.details_pass(doc, child);
        }
    }
}

fn hide_node(doc: &mut Document, id: NodeId) {
    if !doc.is_element(id) {
        return;
    }
    // author declarations stay; the marker is appended
    match doc.attr(id, "style").map(str::to_string) {
        Some(style) if !style.is_empty() => {
            doc.set_attr(id, "style", &format!("{} ; {}", style, HIDDEN_STYLE));
        }
        _ => doc.set_attr(id, "style", HIDDEN_STYLE),
    }
}

fn feature_f64(features: &FeatureMap, name: &str) -> f64 {
    features.get(name).map(FeatureValue::as_f64).unwrap_or(0.0)
}

/// Writes the node's aggregate features into a `data-features` attribute,
/// sorted by name so the output is diffable.
fn annotate_node(doc: &mut Document, id: NodeId, features: &FeatureMap) {
    let mut entries: Vec<(&String, &FeatureValue)> = features.iter().collect();
    entries.sort_by(|(a, _), (b, _)| a.cmp(b));
    let rendered = entries
        .iter()
        .map(|(name, value)| match value {
            FeatureValue::Bool(v) => format!("{}: {}", name, v),
            FeatureValue::Int(v) => format!("{}: {}", name, v),
            FeatureValue::Float(v) => format!("{}: {:.3}", name, v),
        })
        .collect::<Vec<_>>()
        .join("; ");
    doc.set_attr(id, "data-features", &rendered);
}
