//! Mutable HTML node tree backed by a flat arena.
//!
//! This module provides the [`Document`] and [`NodeId`] types. A document
//! owns every node in a `Vec`; nodes address each other through stable
//! integer ids, so parent references are plain lookups and never own
//! anything. Detached subtrees stay in the arena but become unreachable
//! from the root.
//!
//! Text placement follows the text/tail model: an element's `text` is the
//! character data before its first child, and each node's `tail` is the
//! character data between its closing tag and the next sibling. This keeps
//! whole-tree rewrites (detach, reorder, reattach) cheap and deterministic.
//!
//! # Example
//!
//! ```rust
//! use mobilis_core::Document;
//!
//! let doc = Document::parse("<html><body><p id=\"x\">Hello</p></body></html>").unwrap();
//! let p = doc.find_descendant(doc.root(), "p").unwrap();
//! assert_eq!(doc.attr(p, "id"), Some("x"));
//! assert_eq!(doc.text_content(p), "Hello");
//! ```

use scraper::Html;

use crate::{Result, TranscodeError};

/// Stable identifier of a node inside a [`Document`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// Returns the raw arena index.
    pub fn index(self) -> usize {
        self.0
    }
}

/// What a node is: a tagged element or a comment.
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// An element with a lowercase tag name and ordered attributes.
    Element {
        tag: String,
        attrs: Vec<(String, String)>,
    },
    /// A comment node; kept in the tree but skipped by element logic.
    Comment(String),
}

/// A single node in the arena.
#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    /// Character data before the first child.
    pub text: Option<String>,
    /// Character data after this node's closing tag.
    pub tail: Option<String>,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

impl Node {
    fn element(tag: &str) -> Self {
        Self {
            kind: NodeKind::Element { tag: tag.to_string(), attrs: Vec::new() },
            text: None,
            tail: None,
            parent: None,
            children: Vec::new(),
        }
    }
}

/// Tags serialized without a closing tag.
const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source", "track", "wbr",
];

/// Tags whose character data is serialized verbatim.
const RAW_TEXT_TAGS: &[&str] = &["script", "style"];

/// A parsed HTML document with a mutable node tree.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    root: NodeId,
}

impl Document {
    /// Parses HTML markup into a document tree.
    ///
    /// The markup goes through an html5ever parse first, which normalizes
    /// tag casing and guarantees an `html` root element; the parsed tree is
    /// then converted into the arena with text/tail placement.
    pub fn parse(html: &str) -> Result<Self> {
        let parsed = Html::parse_document(html);
        let root_ref = parsed.root_element();

        let mut doc = Self { nodes: Vec::new(), root: NodeId(0) };
        let root = doc.convert_element(&root_ref);
        doc.root = root;
        Ok(doc)
    }

    fn convert_element(&mut self, element: &scraper::ElementRef<'_>) -> NodeId {
        let tag = element.value().name().to_lowercase();
        let attrs = element
            .value()
            .attrs()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();

        let id = self.push_node(Node {
            kind: NodeKind::Element { tag, attrs },
            text: None,
            tail: None,
            parent: None,
            children: Vec::new(),
        });

        let mut last_child: Option<NodeId> = None;
        for child in element.children() {
            match child.value() {
                scraper::Node::Text(text) => {
                    self.append_character_data(id, last_child, text);
                }
                scraper::Node::Element(_) => {
                    if let Some(child_ref) = scraper::ElementRef::wrap(child) {
                        let child_id = self.convert_element(&child_ref);
                        self.attach(id, child_id);
                        last_child = Some(child_id);
                    }
                }
                scraper::Node::Comment(comment) => {
                    let child_id = self.push_node(Node {
                        kind: NodeKind::Comment(comment.to_string()),
                        text: None,
                        tail: None,
                        parent: None,
                        children: Vec::new(),
                    });
                    self.attach(id, child_id);
                    last_child = Some(child_id);
                }
                _ => {}
            }
        }

        id
    }

    /// Text before the first child goes to the element, anything after a
    /// child becomes that child's tail.
    fn append_character_data(&mut self, parent: NodeId, last_child: Option<NodeId>, data: &str) {
        let slot = match last_child {
            Some(child) => &mut self.node_mut(child).tail,
            None => &mut self.node_mut(parent).text,
        };
        match slot {
            Some(existing) => existing.push_str(data),
            None => *slot = Some(data.to_string()),
        }
    }

    fn push_node(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        id
    }

    fn attach(&mut self, parent: NodeId, child: NodeId) {
        self.node_mut(child).parent = Some(parent);
        self.node_mut(parent).children.push(child);
    }

    /// The `html` root element.
    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    /// Returns the tag name for element nodes, `None` for comments.
    pub fn tag(&self, id: NodeId) -> Option<&str> {
        match &self.node(id).kind {
            NodeKind::Element { tag, .. } => Some(tag),
            NodeKind::Comment(_) => None,
        }
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        matches!(self.node(id).kind, NodeKind::Element { .. })
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.node(id).children.clone()
    }

    pub fn child_count(&self, id: NodeId) -> usize {
        self.node(id).children.len()
    }

    /// Creates a detached element node.
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.push_node(Node::element(tag))
    }

    /// Appends `child` as the last child of `parent`, detaching it from any
    /// previous parent first.
    pub fn append(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.attach(parent, child);
    }

    /// Inserts `child` at `index` among the children of `parent`.
    pub fn insert(&mut self, parent: NodeId, index: usize, child: NodeId) {
        self.detach(child);
        self.node_mut(child).parent = Some(parent);
        let children = &mut self.node_mut(parent).children;
        let index = index.min(children.len());
        children.insert(index, child);
    }

    /// Removes a node (and its subtree) from its parent. The nodes remain
    /// in the arena but are no longer reachable from the root.
    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.node(id).parent {
            self.node_mut(parent).children.retain(|&child| child != id);
            self.node_mut(id).parent = None;
        }
    }

    /// Deep-copies a subtree, returning the detached copy's root.
    pub fn clone_subtree(&mut self, id: NodeId) -> NodeId {
        let mut copy = self.node(id).clone();
        copy.parent = None;
        let children = std::mem::take(&mut copy.children);
        let copy_id = self.push_node(copy);
        for child in children {
            let child_copy = self.clone_subtree(child);
            self.attach(copy_id, child_copy);
        }
        copy_id
    }

    /// All nodes below `id` in document (preorder) order, excluding `id`.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut result = Vec::new();
        let mut stack: Vec<NodeId> = self.node(id).children.iter().rev().copied().collect();
        while let Some(current) = stack.pop() {
            result.push(current);
            stack.extend(self.node(current).children.iter().rev());
        }
        result
    }

    /// First descendant element with the given tag, in document order.
    pub fn find_descendant(&self, id: NodeId, tag: &str) -> Option<NodeId> {
        self.descendants(id).into_iter().find(|&n| self.tag(n) == Some(tag))
    }

    /// All descendant elements with the given tag, in document order.
    pub fn find_descendants(&self, id: NodeId, tag: &str) -> Vec<NodeId> {
        self.descendants(id)
            .into_iter()
            .filter(|&n| self.tag(n) == Some(tag))
            .collect()
    }

    /// The node itself plus descendants carrying `class_name` as a class token.
    pub fn find_by_class(&self, id: NodeId, class_name: &str) -> Vec<NodeId> {
        std::iter::once(id)
            .chain(self.descendants(id))
            .filter(|&n| self.has_class(n, class_name))
            .collect()
    }

    /// Concatenated character data of the subtree (own text, children
    /// recursively, children's tails).
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        let node = self.node(id);
        if let Some(text) = &node.text {
            out.push_str(text);
        }
        for &child in &node.children {
            self.collect_text(child, out);
            if let Some(tail) = &self.node(child).tail {
                out.push_str(tail);
            }
        }
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        match &self.node(id).kind {
            NodeKind::Element { attrs, .. } => attrs
                .iter()
                .find(|(attr_name, _)| attr_name == name)
                .map(|(_, value)| value.as_str()),
            NodeKind::Comment(_) => None,
        }
    }

    /// Sets an attribute, replacing the value in place when it exists so
    /// attribute order stays stable.
    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) {
        if let NodeKind::Element { attrs, .. } = &mut self.node_mut(id).kind {
            match attrs.iter_mut().find(|(attr_name, _)| attr_name == name) {
                Some((_, existing)) => *existing = value.to_string(),
                None => attrs.push((name.to_string(), value.to_string())),
            }
        }
    }

    pub fn remove_attr(&mut self, id: NodeId, name: &str) {
        if let NodeKind::Element { attrs, .. } = &mut self.node_mut(id).kind {
            attrs.retain(|(attr_name, _)| attr_name != name);
        }
    }

    pub fn has_class(&self, id: NodeId, class_name: &str) -> bool {
        self.attr(id, "class")
            .map(|value| value.split_whitespace().any(|token| token == class_name))
            .unwrap_or(false)
    }

    /// Appends a class token to the `class` attribute.
    pub fn add_class(&mut self, id: NodeId, class_name: &str) {
        let value = match self.attr(id, "class") {
            Some(existing) if !existing.is_empty() => format!("{} {}", existing, class_name),
            _ => class_name.to_string(),
        };
        self.set_attr(id, "class", &value);
    }

    /// Replaces a class token with another (or removes it when `new` is
    /// empty); removes the attribute entirely when no tokens remain.
    pub fn replace_class_token(&mut self, id: NodeId, old: &str, new: &str) {
        let Some(value) = self.attr(id, "class") else { return };
        let tokens: Vec<&str> = value
            .split_whitespace()
            .map(|token| if token == old { new } else { token })
            .filter(|token| !token.is_empty())
            .collect();
        if tokens.is_empty() {
            self.remove_attr(id, "class");
        } else {
            let joined = tokens.join(" ");
            self.set_attr(id, "class", &joined);
        }
    }

    /// Returns the `head` element directly under the root, creating and
    /// appending one when absent.
    pub fn ensure_head(&mut self) -> NodeId {
        let existing = self
            .children(self.root)
            .into_iter()
            .find(|&child| self.tag(child) == Some("head"));
        match existing {
            Some(head) => head,
            None => {
                let head = self.create_element("head");
                self.append(self.root, head);
                head
            }
        }
    }

    /// Serializes the tree back to markup, preserving attribute order.
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        self.write_node(self.root, &mut out);
        out
    }

    fn write_node(&self, id: NodeId, out: &mut String) {
        let node = self.node(id);
        match &node.kind {
            NodeKind::Comment(comment) => {
                out.push_str("<!--");
                out.push_str(comment);
                out.push_str("-->");
            }
            NodeKind::Element { tag, attrs } => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in attrs {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    out.push_str(&escape_attr(value));
                    out.push('"');
                }
                out.push('>');

                if VOID_TAGS.contains(&tag.as_str()) {
                    return;
                }

                let raw = RAW_TEXT_TAGS.contains(&tag.as_str());
                if let Some(text) = &node.text {
                    if raw {
                        out.push_str(text);
                    } else {
                        out.push_str(&escape_text(text));
                    }
                }
                for &child in &node.children {
                    self.write_node(child, out);
                    if let Some(tail) = &self.node(child).tail {
                        out.push_str(&escape_text(tail));
                    }
                }
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
        }
    }

    /// Validates the parse result contains a usable root element.
    pub fn check_root(&self) -> Result<()> {
        match self.tag(self.root) {
            Some("html") => Ok(()),
            _ => Err(TranscodeError::HtmlParse("document has no html root element".to_string())),
        }
    }
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn escape_attr(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_builds_root() {
        let doc = Document::parse("<html><body><p>hi</p></body></html>").unwrap();
        assert_eq!(doc.tag(doc.root()), Some("html"));
        assert!(doc.check_root().is_ok());
    }

    #[test]
    fn test_text_and_tail_placement() {
        let doc = Document::parse("<html><body><div>before<span>mid</span>after</div></body></html>").unwrap();
        let div = doc.find_descendant(doc.root(), "div").unwrap();
        let span = doc.find_descendant(doc.root(), "span").unwrap();

        assert_eq!(doc.node(div).text.as_deref(), Some("before"));
        assert_eq!(doc.node(span).text.as_deref(), Some("mid"));
        assert_eq!(doc.node(span).tail.as_deref(), Some("after"));
    }

    #[test]
    fn test_text_content_includes_tails() {
        let doc = Document::parse("<html><body><div>a<span>b</span>c</div></body></html>").unwrap();
        let div = doc.find_descendant(doc.root(), "div").unwrap();
        assert_eq!(doc.text_content(div), "abc");
    }

    #[test]
    fn test_attribute_order_preserved() {
        let doc = Document::parse(r#"<html><body><img src="a.png" width="10" alt="x"></body></html>"#).unwrap();
        let html = doc.to_html();
        let src = html.find("src").unwrap();
        let width = html.find("width").unwrap();
        let alt = html.find("alt").unwrap();
        assert!(src < width && width < alt);
    }

    #[test]
    fn test_set_attr_replaces_in_place() {
        let doc_html = r#"<html><body><table cellspacing="2" width="400"></table></body></html>"#;
        let mut doc = Document::parse(doc_html).unwrap();
        let table = doc.find_descendant(doc.root(), "table").unwrap();
        doc.set_attr(table, "width", "auto");
        assert_eq!(doc.attr(table, "width"), Some("auto"));

        let html = doc.to_html();
        assert!(html.find("cellspacing").unwrap() < html.find("width").unwrap());
    }

    #[test]
    fn test_detach_and_append_reorders() {
        let mut doc = Document::parse("<html><body><ul><li id=\"a\"></li><li id=\"b\"></li></ul></body></html>").unwrap();
        let ul = doc.find_descendant(doc.root(), "ul").unwrap();
        let first = doc.children(ul)[0];
        doc.detach(first);
        assert_eq!(doc.child_count(ul), 1);
        doc.append(ul, first);
        assert_eq!(doc.attr(doc.children(ul)[1], "id"), Some("a"));
    }

    #[test]
    fn test_insert_at_front() {
        let mut doc = Document::parse("<html><body><div><p></p></div></body></html>").unwrap();
        let div = doc.find_descendant(doc.root(), "div").unwrap();
        let shadow = doc.create_element("span");
        doc.insert(div, 0, shadow);
        assert_eq!(doc.tag(doc.children(div)[0]), Some("span"));
    }

    #[test]
    fn test_clone_subtree_is_deep() {
        let mut doc = Document::parse(r#"<html><body><a href="x"><img src="i.png"></a></body></html>"#).unwrap();
        let anchor = doc.find_descendant(doc.root(), "a").unwrap();
        let copy = doc.clone_subtree(anchor);

        assert!(doc.parent(copy).is_none());
        assert_eq!(doc.attr(copy, "href"), Some("x"));
        assert_eq!(doc.find_descendants(copy, "img").len(), 1);

        doc.set_attr(anchor, "href", "y");
        assert_eq!(doc.attr(copy, "href"), Some("x"));
    }

    #[test]
    fn test_find_by_class_token_match() {
        let doc_html = r#"<html><body><div class="nav main"></div><div class="navbar"></div></body></html>"#;
        let doc = Document::parse(doc_html).unwrap();
        let matches = doc.find_by_class(doc.root(), "nav");
        assert_eq!(matches.len(), 1);
    }

    #[test]
    fn test_replace_class_token_removes_empty() {
        let mut doc = Document::parse(r#"<html><body><div class="old"></div></body></html>"#).unwrap();
        let div = doc.find_descendant(doc.root(), "div").unwrap();
        doc.replace_class_token(div, "old", "");
        assert_eq!(doc.attr(div, "class"), None);
    }

    #[test]
    fn test_ensure_head_creates_when_missing() {
        let mut doc = Document::parse("<html><body></body></html>").unwrap();
        let head = doc.ensure_head();
        assert_eq!(doc.tag(head), Some("head"));
        assert_eq!(doc.ensure_head(), head);
    }

    #[test]
    fn test_serialize_void_and_comment() {
        let mut doc = Document::parse("<html><head></head><body></body></html>").unwrap();
        let head = doc.ensure_head();
        let link = doc.create_element("link");
        doc.set_attr(link, "rel", "stylesheet");
        doc.append(head, link);

        let html = doc.to_html();
        assert!(html.contains(r#"<link rel="stylesheet">"#));
        assert!(!html.contains("</link>"));
    }

    #[test]
    fn test_serialize_escapes_text_and_attrs() {
        let mut doc = Document::parse("<html><body><p></p></body></html>").unwrap();
        let p = doc.find_descendant(doc.root(), "p").unwrap();
        doc.node_mut(p).text = Some("a < b & c".to_string());
        doc.set_attr(p, "title", "say \"hi\"");

        let html = doc.to_html();
        assert!(html.contains("a &lt; b &amp; c"));
        assert!(html.contains("title=\"say &quot;hi&quot;\""));
    }

    #[test]
    fn test_script_text_not_escaped() {
        let doc = Document::parse("<html><head><script>if (a < b) {}</script></head></html>").unwrap();
        assert!(doc.to_html().contains("if (a < b) {}"));
    }

    #[test]
    fn test_comment_preserved() {
        let doc = Document::parse("<html><body><!-- keep me --><p>x</p></body></html>").unwrap();
        let body = doc.find_descendant(doc.root(), "body").unwrap();
        assert!(doc.children(body).iter().any(|&c| !doc.is_element(c)));
        assert!(doc.to_html().contains("<!-- keep me -->"));
    }
}
