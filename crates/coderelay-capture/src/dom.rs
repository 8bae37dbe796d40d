//! Document abstraction and an in-memory DOM.
//!
//! The capture pipeline only talks to [`Document`]. [`Dom`] is a small arena
//! tree that records added nodes the way a mutation observer would, so the
//! watcher can be driven without a browser.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Handle to a node inside a [`Document`].
pub type NodeId = usize;

/// Simple element matcher: tag, exact attribute values, and a class name.
///
/// Class matching ignores a leading `!` (utility-class "important" marker),
/// so `overflow-visible` matches `!overflow-visible`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<(String, String)>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
}

impl NodeQuery {
    pub fn tag(tag: &str) -> Self {
        Self {
            tag: Some(tag.to_lowercase()),
            ..Self::default()
        }
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attributes.push((name.to_string(), value.to_string()));
        self
    }

    pub fn class(mut self, class: &str) -> Self {
        self.class = Some(class.to_string());
        self
    }

    /// Whether an element with this tag and attribute map matches.
    pub fn matches(&self, tag: &str, attributes: &BTreeMap<String, String>) -> bool {
        if let Some(expected) = &self.tag {
            if !tag.eq_ignore_ascii_case(expected) {
                return false;
            }
        }
        for (name, value) in &self.attributes {
            if attributes.get(name) != Some(value) {
                return false;
            }
        }
        if let Some(class) = &self.class {
            let has_class = attributes
                .get("class")
                .map(|classes| {
                    classes
                        .split_whitespace()
                        .any(|c| c.trim_start_matches('!') == class)
                })
                .unwrap_or(false);
            if !has_class {
                return false;
            }
        }
        true
    }
}

/// Structural changes since the last drain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MutationBatch {
    pub added: Vec<NodeId>,
    pub removed: Vec<NodeId>,
}

impl MutationBatch {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// What the capture pipeline needs from a live page.
pub trait Document {
    /// All attached elements matching `query`, in document order.
    fn query_all(&self, query: &NodeQuery) -> Vec<NodeId>;

    /// Whether the node is an element matching `query`.
    fn matches(&self, node: NodeId, query: &NodeQuery) -> bool;

    /// Rendered text of the node and its descendants.
    fn text_content(&self, node: NodeId) -> String;

    /// Serialized markup of the node including itself.
    fn outer_html(&self, node: NodeId) -> String;

    fn attribute(&self, node: NodeId, name: &str) -> Option<String>;

    fn set_attribute(&mut self, node: NodeId, name: &str, value: &str);

    fn append_element(&mut self, parent: NodeId, tag: &str) -> NodeId;

    fn append_text(&mut self, parent: NodeId, text: &str) -> NodeId;

    /// Drain structural changes observed since the previous call.
    fn take_mutations(&mut self) -> MutationBatch;

    fn exists(&self, query: &NodeQuery) -> bool {
        !self.query_all(query).is_empty()
    }
}

#[derive(Debug, Clone)]
enum NodeData {
    Element {
        tag: String,
        attributes: BTreeMap<String, String>,
    },
    Text(String),
}

#[derive(Debug, Clone)]
struct Node {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// In-memory document rooted at a `<body>` element.
#[derive(Debug, Clone)]
pub struct Dom {
    nodes: Vec<Node>,
    pending: Vec<NodeId>,
    pending_removed: Vec<NodeId>,
}

impl Default for Dom {
    fn default() -> Self {
        Self::new()
    }
}

impl Dom {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                data: NodeData::Element {
                    tag: "body".to_string(),
                    attributes: BTreeMap::new(),
                },
                parent: None,
                children: Vec::new(),
            }],
            pending: Vec::new(),
            pending_removed: Vec::new(),
        }
    }

    pub fn body(&self) -> NodeId {
        0
    }

    /// Append an element with attributes under `parent`.
    pub fn append(&mut self, parent: NodeId, tag: &str, attributes: &[(&str, &str)]) -> NodeId {
        let attributes = attributes
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        self.push_node(
            parent,
            NodeData::Element {
                tag: tag.to_lowercase(),
                attributes,
            },
        )
    }

    /// Append `<tag>` containing a single text node.
    pub fn append_with_text(
        &mut self,
        parent: NodeId,
        tag: &str,
        attributes: &[(&str, &str)],
        text: &str,
    ) -> NodeId {
        let node = self.append(parent, tag, attributes);
        let text_node = self.push_node(node, NodeData::Text(text.to_string()));
        // Only the subtree root is reported, as a mutation observer would.
        self.pending.retain(|id| *id != text_node);
        node
    }

    /// Detach a node (and its subtree) from the document.
    pub fn remove(&mut self, node: NodeId) {
        if let Some(parent) = self.nodes.get(node).and_then(|n| n.parent) {
            self.nodes[parent].children.retain(|c| *c != node);
            self.nodes[node].parent = None;
            self.pending_removed.push(node);
        }
    }

    fn push_node(&mut self, parent: NodeId, data: NodeData) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Node {
            data,
            parent: Some(parent),
            children: Vec::new(),
        });
        if let Some(p) = self.nodes.get_mut(parent) {
            p.children.push(id);
        }
        self.pending.push(id);
        id
    }

    fn walk(&self, node: NodeId, out: &mut Vec<NodeId>) {
        out.push(node);
        for child in &self.nodes[node].children {
            self.walk(*child, out);
        }
    }

    fn collect_text(&self, node: NodeId, out: &mut String) {
        match &self.nodes[node].data {
            NodeData::Text(text) => out.push_str(text),
            NodeData::Element { tag, .. } => {
                if tag == "br" {
                    out.push('\n');
                }
                for child in &self.nodes[node].children {
                    self.collect_text(*child, out);
                }
            }
        }
    }

    fn write_html(&self, node: NodeId, out: &mut String) {
        match &self.nodes[node].data {
            NodeData::Text(text) => out.push_str(&escape_text(text)),
            NodeData::Element { tag, attributes } => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in attributes {
                    out.push_str(&format!(" {}=\"{}\"", name, escape_attr(value)));
                }
                out.push('>');
                if tag == "br" {
                    return;
                }
                for child in &self.nodes[node].children {
                    self.write_html(*child, out);
                }
                out.push_str(&format!("</{}>", tag));
            }
        }
    }
}

impl Document for Dom {
    fn query_all(&self, query: &NodeQuery) -> Vec<NodeId> {
        let mut order = Vec::new();
        self.walk(self.body(), &mut order);
        order
            .into_iter()
            .filter(|id| self.matches(*id, query))
            .collect()
    }

    fn matches(&self, node: NodeId, query: &NodeQuery) -> bool {
        match self.nodes.get(node).map(|n| &n.data) {
            Some(NodeData::Element { tag, attributes }) => query.matches(tag, attributes),
            _ => false,
        }
    }

    fn text_content(&self, node: NodeId) -> String {
        let mut out = String::new();
        if node < self.nodes.len() {
            self.collect_text(node, &mut out);
        }
        out
    }

    fn outer_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        if node < self.nodes.len() {
            self.write_html(node, &mut out);
        }
        out
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        match self.nodes.get(node).map(|n| &n.data) {
            Some(NodeData::Element { attributes, .. }) => attributes.get(name).cloned(),
            _ => None,
        }
    }

    fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) {
        if let Some(NodeData::Element { attributes, .. }) =
            self.nodes.get_mut(node).map(|n| &mut n.data)
        {
            attributes.insert(name.to_string(), value.to_string());
        }
    }

    fn append_element(&mut self, parent: NodeId, tag: &str) -> NodeId {
        self.append(parent, tag, &[])
    }

    fn append_text(&mut self, parent: NodeId, text: &str) -> NodeId {
        self.push_node(parent, NodeData::Text(text.to_string()))
    }

    fn take_mutations(&mut self) -> MutationBatch {
        MutationBatch {
            added: std::mem::take(&mut self.pending),
            removed: std::mem::take(&mut self.pending_removed),
        }
    }
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attr(value: &str) -> String {
    escape_text(value).replace('"', "&quot;")
}
