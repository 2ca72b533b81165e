//! Pure helper predicates and document-level cosmetic rewrites.
//!
//! Everything in this module is either a small predicate over a single
//! node (hidden detection, empty detection), a text measurement, or a
//! whole-document cosmetic pass (header injection, collapsed-navigation
//! shadow generation). None of it consults classifiers.

use crate::config::AssetRefs;
use crate::dom::{Document, NodeId};
use crate::features::FeatureMap;

/// Class marker for nodes with a high link-to-text ratio (link blocks).
pub const CLASS_LINK_BLOCK: &str = "mb-links";
/// Class marker for a primary navigation block (single short link).
pub const CLASS_NAV: &str = "mb-nav";
/// Class marker for a collapsed navigation block (many short links).
pub const CLASS_NAV_BLOCK: &str = "mb-navb";
/// Class marker for a navigation group.
pub const CLASS_NAV_GROUP: &str = "mb-navg";
/// Class marker added to collapsed blocks once a shadow preview exists.
pub const CLASS_NAV_HIDDEN: &str = "mb-navh";
/// Class marker for list/spam-like link collections.
pub const CLASS_LIST: &str = "mb-list";

/// Counts text labels: each maximal run of ASCII alphanumerics (a word or
/// number) counts once, every other non-whitespace character counts on its
/// own. CJK text therefore counts per character while English counts per
/// word.
pub fn label_count(text: &str) -> usize {
    let mut count = 0;
    for fragment in text.split_whitespace() {
        let mut in_run = false;
        for ch in fragment.chars() {
            if ch.is_ascii_alphanumeric() {
                in_run = true;
            } else {
                if in_run {
                    count += 1;
                    in_run = false;
                }
                count += 1;
            }
        }
        if in_run {
            count += 1;
        }
    }
    count
}

/// Collapses whitespace runs to single spaces and trims the ends.
pub fn normalize_space(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Checks whether a node is hidden through an inline `display: none`.
///
/// The value comparison is exact: `display: none !important` is the
/// transcoder's own hiding marker and is not treated as author-hidden.
pub fn is_hidden_node(doc: &Document, id: NodeId) -> bool {
    let Some(style) = doc.attr(id, "style") else {
        return false;
    };
    for declaration in style.split(';') {
        let mut tokens = declaration.splitn(2, ':');
        let (Some(name), Some(value)) = (tokens.next(), tokens.next()) else {
            continue;
        };
        if name.trim().eq_ignore_ascii_case("display") && value.trim().eq_ignore_ascii_case("none") {
            return true;
        }
    }
    false
}

/// Checks whether a node is empty: not in the always-nonempty tag list,
/// no subtree text, and no element child outside the invisible tag list.
pub fn is_empty_node(doc: &Document, id: NodeId, empty_tags: &[String], invisible_tags: &[String]) -> bool {
    let Some(tag) = doc.tag(id) else {
        return false;
    };
    if empty_tags.iter().any(|t| t == tag) {
        return false;
    }

    let visible_children = doc
        .children(id)
        .into_iter()
        .filter(|&child| match doc.tag(child) {
            Some(child_tag) => !invisible_tags.iter().any(|t| t == child_tag),
            None => false,
        })
        .count();

    visible_children == 0 && normalize_space(&doc.text_content(id)).is_empty()
}

/// Sum-merges `from` into `into` key by key. Keys present on only one side
/// pass through unchanged; this is additive aggregation, not overriding.
pub fn aggregate_features(into: &mut FeatureMap, from: &FeatureMap) {
    for (name, value) in from {
        match into.get(name) {
            Some(existing) => {
                let summed = existing.sum(value);
                into.insert(name.clone(), summed);
            }
            None => {
                into.insert(name.clone(), value.clone());
            }
        }
    }
}

/// Rewrites an inline style string: drops filtered properties, substitutes
/// configured replacements, and strips `!important` from values.
///
/// Returns `None` when no properties remain — the caller should remove the
/// style attribute instead of writing an empty value. The output carries
/// properties in first-occurrence order (last value wins for duplicates),
/// so shrinking an already-shrunk string is a no-op.
pub fn shrink_style(
    style: &str,
    filtered_properties: &[String],
    changed_properties: &[(String, String)],
) -> Option<String> {
    let mut result: Vec<(String, String)> = Vec::new();
    for declaration in style.split(';') {
        if declaration.trim().is_empty() {
            continue;
        }
        let mut tokens = declaration.splitn(2, ':');
        let (Some(name), Some(value)) = (tokens.next(), tokens.next()) else {
            continue;
        };
        let name = name.trim();
        if filtered_properties.iter().any(|p| p == name) {
            continue;
        }

        let value = match changed_properties.iter().find(|(changed, _)| changed == name) {
            Some((_, replacement)) => replacement.clone(),
            None => value.trim().replace("!important", "").trim().to_string(),
        };

        match result.iter_mut().find(|(existing, _)| existing == name) {
            Some((_, existing_value)) => *existing_value = value,
            None => result.push((name.to_string(), value)),
        }
    }

    if result.is_empty() {
        return None;
    }
    let joined = result
        .iter()
        .map(|(name, value)| format!("{}: {}", name, value))
        .collect::<Vec<_>>()
        .join("; ");
    Some(joined)
}

/// Injects the mobile stylesheet link and companion script into `head`.
pub fn add_default_headers(doc: &mut Document, assets: &AssetRefs) {
    let head = doc.ensure_head();

    let link = doc.create_element("link");
    doc.set_attr(link, "href", &assets.stylesheet);
    doc.set_attr(link, "rel", "stylesheet");
    doc.append(head, link);

    let script = doc.create_element("script");
    doc.set_attr(script, "src", &assets.script);
    doc.set_attr(script, "charset", "utf-8");
    doc.append(head, script);
}

/// Gives every collapsed navigation block a stable sequential id and a
/// shadow preview: a group div holding up to three cloned anchors plus an
/// ellipsis anchor, inserted as the block's first child.
pub fn build_nav_shadows(doc: &mut Document) {
    let blocks = doc.find_by_class(doc.root(), CLASS_NAV_BLOCK);
    for (index, block) in blocks.into_iter().enumerate() {
        doc.set_attr(block, "id", &format!("{}_{}", CLASS_NAV_BLOCK, index + 1));
        doc.add_class(block, CLASS_NAV_HIDDEN);

        let shadow = doc.create_element("div");
        doc.set_attr(shadow, "class", &format!("{} show", CLASS_NAV_GROUP));

        let anchors: Vec<NodeId> = doc.find_descendants(block, "a").into_iter().take(3).collect();
        doc.insert(block, 0, shadow);
        for anchor in anchors {
            let copy = doc.clone_subtree(anchor);
            doc.node_mut(copy).tail = None;
            doc.append(shadow, copy);
        }

        let ellipsis = doc.create_element("a");
        doc.node_mut(ellipsis).text = Some("...".to_string());
        doc.append(shadow, ellipsis);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FeatureValue;
    use rstest::rstest;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[rstest]
    #[case("hello world", 2)]
    #[case("hello, world!", 4)]
    #[case("abc123", 1)]
    #[case("", 0)]
    #[case("   ", 0)]
    #[case("你好", 2)]
    #[case("你好world", 3)]
    #[case("新闻 news", 3)]
    fn test_label_count(#[case] text: &str, #[case] expected: usize) {
        assert_eq!(label_count(text), expected);
    }

    #[test]
    fn test_normalize_space() {
        assert_eq!(normalize_space("  a \n b  "), "a b");
        assert_eq!(normalize_space(" \t\n "), "");
    }

    #[test]
    fn test_is_hidden_node() {
        let html = r#"<html><body>
            <div id="a" style="display: none"></div>
            <div id="b" style="color: red; display:none"></div>
            <div id="c" style="display: block"></div>
            <div id="d"></div>
            <div id="e" style="display: none !important"></div>
        </body></html>"#;
        let doc = Document::parse(html).unwrap();
        let divs = doc.find_descendants(doc.root(), "div");

        assert!(is_hidden_node(&doc, divs[0]));
        assert!(is_hidden_node(&doc, divs[1]));
        assert!(!is_hidden_node(&doc, divs[2]));
        assert!(!is_hidden_node(&doc, divs[3]));
        // the transcoder's own marker is not author-hidden
        assert!(!is_hidden_node(&doc, divs[4]));
    }

    #[test]
    fn test_is_empty_node() {
        let html = r#"<html><body>
            <div id="empty"></div>
            <div id="text">hello</div>
            <div id="nested"><span></span></div>
            <div id="invisible"><script>x()</script></div>
        </body></html>"#;
        let doc = Document::parse(html).unwrap();
        let empty_tags = strings(&["frame", "img", "base", "br", "link", "body", "head", "input"]);
        let invisible = strings(&["noscript", "noframes", "script", "style", "param"]);
        let divs = doc.find_descendants(doc.root(), "div");

        assert!(is_empty_node(&doc, divs[0], &empty_tags, &invisible));
        assert!(!is_empty_node(&doc, divs[1], &empty_tags, &invisible));
        assert!(!is_empty_node(&doc, divs[2], &empty_tags, &invisible));
        // script child is invisible and script text is still subtree text
        assert!(!is_empty_node(&doc, divs[3], &empty_tags, &invisible));

        let body = doc.find_descendant(doc.root(), "body").unwrap();
        assert!(!is_empty_node(&doc, body, &empty_tags, &invisible));
    }

    #[test]
    fn test_aggregate_features_sums_and_passes_through() {
        let mut into = FeatureMap::from([
            ("text_length".to_string(), FeatureValue::Int(3)),
            ("link_count".to_string(), FeatureValue::Int(1)),
        ]);
        let from = FeatureMap::from([
            ("text_length".to_string(), FeatureValue::Int(4)),
            ("image_count".to_string(), FeatureValue::Int(2)),
        ]);
        aggregate_features(&mut into, &from);

        assert_eq!(into["text_length"], FeatureValue::Int(7));
        assert_eq!(into["link_count"], FeatureValue::Int(1));
        assert_eq!(into["image_count"], FeatureValue::Int(2));
    }

    #[test]
    fn test_shrink_style_filters_and_replaces() {
        let filtered = strings(&["width", "float", "position", "padding", "margin"]);
        let changed = vec![("height".to_string(), "auto".to_string())];
        let result = shrink_style("width: 10px; color: red !important; height: 50px", &filtered, &changed);
        assert_eq!(result.as_deref(), Some("color: red; height: auto"));
    }

    #[test]
    fn test_shrink_style_empty_result() {
        let filtered = strings(&["width"]);
        assert_eq!(shrink_style("width: 10px", &filtered, &[]), None);
        assert_eq!(shrink_style("  ;  ; ", &filtered, &[]), None);
    }

    #[test]
    fn test_shrink_style_idempotent() {
        let filtered = strings(&["width", "float"]);
        let changed = vec![("margin".to_string(), "0".to_string())];
        let once = shrink_style("float: left; color: blue !important; margin: 4px", &filtered, &changed).unwrap();
        let twice = shrink_style(&once, &filtered, &changed).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_shrink_style_duplicate_property_last_wins() {
        let result = shrink_style("color: red; color: blue", &[], &[]);
        assert_eq!(result.as_deref(), Some("color: blue"));
    }

    #[test]
    fn test_add_default_headers() {
        let mut doc = Document::parse("<html><head></head><body></body></html>").unwrap();
        let assets = AssetRefs { stylesheet: "./mobilis.css".to_string(), script: "/mobilis.js".to_string() };
        add_default_headers(&mut doc, &assets);

        let head = doc.ensure_head();
        let link = doc.find_descendant(head, "link").unwrap();
        let script = doc.find_descendant(head, "script").unwrap();
        assert_eq!(doc.attr(link, "href"), Some("./mobilis.css"));
        assert_eq!(doc.attr(link, "rel"), Some("stylesheet"));
        assert_eq!(doc.attr(script, "src"), Some("/mobilis.js"));
        assert_eq!(doc.attr(script, "charset"), Some("utf-8"));
    }

    #[test]
    fn test_build_nav_shadows() {
        let html = format!(
            r#"<html><body><div class="{}">
                <a href="1">a</a><a href="2">b</a><a href="3">c</a><a href="4">d</a><a href="5">e</a>
            </div></body></html>"#,
            CLASS_NAV_BLOCK
        );
        let mut doc = Document::parse(&html).unwrap();
        build_nav_shadows(&mut doc);

        let block = doc.find_by_class(doc.root(), CLASS_NAV_BLOCK)[0];
        assert_eq!(doc.attr(block, "id"), Some("mb-navb_1"));
        assert!(doc.has_class(block, CLASS_NAV_HIDDEN));

        let shadow = doc.children(block)[0];
        assert_eq!(doc.tag(shadow), Some("div"));
        assert!(doc.has_class(shadow, CLASS_NAV_GROUP));
        assert!(doc.has_class(shadow, "show"));

        // three clones plus the ellipsis anchor
        let shadow_anchors = doc.find_descendants(shadow, "a");
        assert_eq!(shadow_anchors.len(), 4);
        assert_eq!(doc.node(shadow_anchors[3]).text.as_deref(), Some("..."));
        // clones, not moves: the block still holds its original five anchors
        assert_eq!(doc.find_descendants(block, "a").len(), 9);
    }

    #[test]
    fn test_build_nav_shadows_sequential_ids() {
        let html = format!(
            r#"<html><body>
                <div class="{0}"><a href="1">a</a></div>
                <div class="{0}"><a href="2">b</a></div>
            </body></html>"#,
            CLASS_NAV_BLOCK
        );
        let mut doc = Document::parse(&html).unwrap();
        build_nav_shadows(&mut doc);

        let blocks = doc.find_by_class(doc.root(), CLASS_NAV_BLOCK);
        assert_eq!(doc.attr(blocks[0], "id"), Some("mb-navb_1"));
        assert_eq!(doc.attr(blocks[1], "id"), Some("mb-navb_2"));
    }
}
