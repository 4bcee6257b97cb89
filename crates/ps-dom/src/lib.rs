//! Detached document trees.
//!
//! Documents are arenas: nodes are never freed, only detached, so a `NodeId`
//! stays valid for the lifetime of its document.

mod ops;
mod selector;

pub use ops::DocumentOps;
pub use selector::Selector;

use ps_core::ShellError;
use ps_core::ShellResult;

/// ID used to address nodes in the document arena.
pub type NodeId = usize;

const ROOT: NodeId = 0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub tag: String,
    pub attributes: Vec<Attribute>,
}

impl Element {
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|attribute| attribute.name.eq_ignore_ascii_case(name))
            .map(|attribute| attribute.value.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Document,
    Element(Element),
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Parsed document that is not attached to any host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    nodes: Vec<Node>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                kind: NodeKind::Document,
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    pub fn root(&self) -> NodeId {
        ROOT
    }

    /// Number of nodes ever created, detached ones included.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn kind(&self, node: NodeId) -> Option<&NodeKind> {
        self.nodes.get(node).map(|entry| &entry.kind)
    }

    pub fn element(&self, node: NodeId) -> Option<&Element> {
        match self.kind(node) {
            Some(NodeKind::Element(element)) => Some(element),
            _ => None,
        }
    }

    pub fn tag_name(&self, node: NodeId) -> Option<&str> {
        self.element(node).map(|element| element.tag.as_str())
    }

    pub fn is_element(&self, node: NodeId) -> bool {
        self.element(node).is_some()
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(node).and_then(|entry| entry.parent)
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.nodes
            .get(node)
            .map(|entry| entry.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.push_node(NodeKind::Element(Element {
            tag: tag.to_ascii_lowercase(),
            attributes: Vec::new(),
        }))
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.push_node(NodeKind::Text(text.to_owned()))
    }

    pub fn create_comment(&mut self, text: &str) -> NodeId {
        self.push_node(NodeKind::Comment(text.to_owned()))
    }

    fn push_node(&mut self, kind: NodeKind) -> NodeId {
        self.nodes.push(Node {
            kind,
            parent: None,
            children: Vec::new(),
        });
        self.nodes.len() - 1
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> ShellResult<()> {
        self.ensure_exists(parent)?;
        self.ensure_exists(child)?;

        if child == ROOT {
            return Err(ShellError::new(
                "dom.hierarchy_invalid",
                "the document node cannot be re-parented",
            ));
        }

        if !matches!(
            self.kind(parent),
            Some(NodeKind::Element(_) | NodeKind::Document)
        ) {
            return Err(ShellError::new(
                "dom.hierarchy_invalid",
                format!("node {parent} cannot have children"),
            ));
        }

        if self.is_inclusive_ancestor(child, parent) {
            return Err(ShellError::new(
                "dom.hierarchy_invalid",
                format!("node {child} is an ancestor of node {parent}"),
            ));
        }

        self.detach(child);
        self.nodes[child].parent = Some(parent);
        self.nodes[parent].children.push(child);
        Ok(())
    }

    /// Unlinks a node from its parent. The subtree stays intact and can be re-inserted.
    pub fn detach(&mut self, node: NodeId) {
        let Some(parent) = self.parent(node) else {
            return;
        };
        self.nodes[parent].children.retain(|candidate| *candidate != node);
        self.nodes[node].parent = None;
    }

    /// Puts detached `replacement` where `old` sits; `old` ends up detached.
    pub fn replace_node(&mut self, old: NodeId, replacement: NodeId) -> ShellResult<()> {
        self.ensure_exists(old)?;
        self.ensure_exists(replacement)?;

        let Some(parent) = self.parent(old) else {
            return Err(ShellError::new(
                "dom.hierarchy_invalid",
                format!("node {old} has no parent to replace it in"),
            ));
        };

        if replacement == ROOT || self.is_inclusive_ancestor(replacement, parent) {
            return Err(ShellError::new(
                "dom.hierarchy_invalid",
                format!("node {replacement} cannot replace node {old}"),
            ));
        }

        self.detach(replacement);
        if let Some(position) = self.nodes[parent]
            .children
            .iter()
            .position(|candidate| *candidate == old)
        {
            self.nodes[parent].children[position] = replacement;
        }
        self.nodes[replacement].parent = Some(parent);
        self.nodes[old].parent = None;
        Ok(())
    }

    pub fn remove_children(&mut self, node: NodeId) {
        let children = match self.nodes.get_mut(node) {
            Some(entry) => std::mem::take(&mut entry.children),
            None => return,
        };
        for child in children {
            self.nodes[child].parent = None;
        }
    }

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        self.element(node).and_then(|element| element.attribute(name))
    }

    pub fn has_attribute(&self, node: NodeId, name: &str) -> bool {
        self.attribute(node, name).is_some()
    }

    pub fn attributes(&self, node: NodeId) -> &[Attribute] {
        self.element(node)
            .map(|element| element.attributes.as_slice())
            .unwrap_or(&[])
    }

    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) -> ShellResult<()> {
        let element = self.element_mut(node)?;
        match element
            .attributes
            .iter_mut()
            .find(|attribute| attribute.name.eq_ignore_ascii_case(name))
        {
            Some(existing) => existing.value = value.to_owned(),
            None => element.attributes.push(Attribute {
                name: name.to_ascii_lowercase(),
                value: value.to_owned(),
            }),
        }
        Ok(())
    }

    pub fn remove_attribute(&mut self, node: NodeId, name: &str) -> bool {
        let Ok(element) = self.element_mut(node) else {
            return false;
        };
        let before = element.attributes.len();
        element
            .attributes
            .retain(|attribute| !attribute.name.eq_ignore_ascii_case(name));
        element.attributes.len() != before
    }

    fn element_mut(&mut self, node: NodeId) -> ShellResult<&mut Element> {
        match self.nodes.get_mut(node).map(|entry| &mut entry.kind) {
            Some(NodeKind::Element(element)) => Ok(element),
            Some(_) => Err(ShellError::new(
                "dom.not_an_element",
                format!("node {node} is not an element"),
            )),
            None => Err(missing_node(node)),
        }
    }

    /// Pre-order walk below `node`, excluding `node` itself.
    pub fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(node).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).iter().rev().copied());
        }
        out
    }

    pub fn find_first(&self, from: NodeId, predicate: impl Fn(&Self, NodeId) -> bool) -> Option<NodeId> {
        self.descendants(from)
            .into_iter()
            .find(|candidate| predicate(self, *candidate))
    }

    pub fn find_all(&self, from: NodeId, predicate: impl Fn(&Self, NodeId) -> bool) -> Vec<NodeId> {
        self.descendants(from)
            .into_iter()
            .filter(|candidate| predicate(self, *candidate))
            .collect()
    }

    pub fn query_selector_all(&self, from: NodeId, selector: &Selector) -> Vec<NodeId> {
        self.find_all(from, |doc, node| selector.matches(doc, node))
    }

    pub fn query_selector(&self, from: NodeId, selector: &Selector) -> Option<NodeId> {
        self.find_first(from, |doc, node| selector.matches(doc, node))
    }

    pub fn element_by_id(&self, id: &str) -> Option<NodeId> {
        self.find_first(ROOT, |doc, node| doc.attribute(node, "id") == Some(id))
    }

    /// The `<html>` element, or whichever element is the document's first child element.
    pub fn document_element(&self) -> Option<NodeId> {
        self.children(ROOT)
            .iter()
            .copied()
            .find(|child| self.is_element(*child))
    }

    pub fn head(&self) -> Option<NodeId> {
        self.child_element_named("head")
    }

    pub fn body(&self) -> Option<NodeId> {
        self.child_element_named("body")
    }

    fn child_element_named(&self, tag: &str) -> Option<NodeId> {
        let html = self.document_element()?;
        self.children(html)
            .iter()
            .copied()
            .find(|child| self.tag_name(*child) == Some(tag))
    }

    pub fn title(&self) -> String {
        self.find_first(ROOT, |doc, node| doc.tag_name(node) == Some("title"))
            .map(|node| collapse_whitespace(&self.text_content(node)))
            .unwrap_or_default()
    }

    pub fn text_content(&self, node: NodeId) -> String {
        if let Some(NodeKind::Text(text)) = self.kind(node) {
            return text.clone();
        }

        let mut out = String::new();
        for descendant in self.descendants(node) {
            if let Some(NodeKind::Text(text)) = self.kind(descendant) {
                out.push_str(text);
            }
        }
        out
    }

    pub fn set_text_content(&mut self, node: NodeId, text: &str) -> ShellResult<()> {
        self.ensure_exists(node)?;
        self.remove_children(node);
        let text_node = self.create_text(text);
        self.append_child(node, text_node)
    }

    /// Whether the node is reachable from the document root.
    pub fn is_connected(&self, node: NodeId) -> bool {
        self.is_inclusive_ancestor(ROOT, node)
    }

    /// Copies `node` (and, when `deep`, its subtree) from `source` into this
    /// document. The copy is returned detached.
    pub fn import_node(&mut self, source: &Document, node: NodeId, deep: bool) -> ShellResult<NodeId> {
        let kind = source
            .kind(node)
            .ok_or_else(|| missing_node(node))?
            .clone();
        if matches!(kind, NodeKind::Document) {
            return Err(ShellError::new(
                "dom.hierarchy_invalid",
                "a document node cannot be imported",
            ));
        }

        let copy = self.push_node(kind);
        if deep {
            for child in source.children(node).to_vec() {
                let imported = self.import_node(source, child, true)?;
                self.append_child(copy, imported)?;
            }
        }
        Ok(copy)
    }

    fn is_inclusive_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut cursor = Some(node);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.parent(current);
        }
        false
    }

    fn ensure_exists(&self, node: NodeId) -> ShellResult<()> {
        if node < self.nodes.len() {
            Ok(())
        } else {
            Err(missing_node(node))
        }
    }
}

fn missing_node(node: NodeId) -> ShellError {
    ShellError::new("dom.node_missing", format!("node {node} does not exist"))
}

fn collapse_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::Document;
    use super::NodeKind;

    fn page() -> (Document, usize, usize) {
        let mut doc = Document::new();
        let html = doc.create_element("HTML");
        let body = doc.create_element("body");
        let root = doc.root();
        assert!(doc.append_child(root, html).is_ok());
        assert!(doc.append_child(html, body).is_ok());
        (doc, html, body)
    }

    #[test]
    fn builds_tree_and_finds_body() {
        let (doc, html, body) = page();
        assert_eq!(doc.document_element(), Some(html));
        assert_eq!(doc.tag_name(html), Some("html"));
        assert_eq!(doc.body(), Some(body));
        assert!(doc.head().is_none());
    }

    #[test]
    fn rejects_cycles() {
        let (mut doc, html, body) = page();
        let result = doc.append_child(body, html);
        assert!(result.is_err());
        if let Err(error) = result {
            assert_eq!(error.code, "dom.hierarchy_invalid");
        }
    }

    #[test]
    fn append_moves_node_between_parents() {
        let (mut doc, html, body) = page();
        let div = doc.create_element("div");
        assert!(doc.append_child(html, div).is_ok());
        assert!(doc.append_child(body, div).is_ok());
        assert_eq!(doc.children(body), &[div]);
        assert!(!doc.children(html).contains(&div));
        assert_eq!(doc.parent(div), Some(body));
    }

    #[test]
    fn attributes_are_case_insensitive_and_replaced_in_place() {
        let (mut doc, _, body) = page();
        assert!(doc.set_attribute(body, "Data-Slot", "1").is_ok());
        assert!(doc.set_attribute(body, "data-slot", "2").is_ok());
        assert_eq!(doc.attribute(body, "DATA-SLOT"), Some("2"));
        assert_eq!(doc.attributes(body).len(), 1);
        assert!(doc.remove_attribute(body, "data-slot"));
        assert!(!doc.has_attribute(body, "data-slot"));
    }

    #[test]
    fn detached_nodes_are_not_connected() {
        let (mut doc, _, body) = page();
        let span = doc.create_element("span");
        assert!(!doc.is_connected(span));
        assert!(doc.append_child(body, span).is_ok());
        assert!(doc.is_connected(span));
        doc.detach(span);
        assert!(!doc.is_connected(span));
    }

    #[test]
    fn import_copies_subtree_across_documents() {
        let (mut source, _, body) = page();
        let p = source.create_element("p");
        let text = source.create_text("hello");
        assert!(source.append_child(p, text).is_ok());
        assert!(source.append_child(body, p).is_ok());

        let (mut target, _, target_body) = page();
        let imported = match target.import_node(&source, p, true) {
            Ok(node) => node,
            Err(error) => panic!("{error}"),
        };
        assert!(target.append_child(target_body, imported).is_ok());
        assert_eq!(target.text_content(target_body), "hello");

        let shallow = match target.import_node(&source, p, false) {
            Ok(node) => node,
            Err(error) => panic!("{error}"),
        };
        assert!(target.children(shallow).is_empty());
        assert!(matches!(target.kind(shallow), Some(NodeKind::Element(_))));
    }

    #[test]
    fn set_text_content_replaces_children() {
        let (mut doc, _, body) = page();
        let old = doc.create_element("div");
        assert!(doc.append_child(body, old).is_ok());
        assert!(doc.set_text_content(body, "fresh").is_ok());
        assert_eq!(doc.children(body).len(), 1);
        assert_eq!(doc.text_content(body), "fresh");
    }

    #[test]
    fn replace_node_keeps_position() {
        let (mut doc, html, body) = page();
        let head = doc.create_element("head");
        let root = doc.root();
        assert!(doc.append_child(html, head).is_ok());
        let placeholder = doc.create_element("main");

        assert!(doc.replace_node(body, placeholder).is_ok());
        assert_eq!(doc.children(html), &[placeholder, head]);
        assert_eq!(doc.parent(body), None);
        assert!(doc.replace_node(root, placeholder).is_err());
    }
}
