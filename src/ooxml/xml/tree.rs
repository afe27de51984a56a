//! Arena-backed mutable XML tree.
//!
//! Nodes live in a single `Vec` and are addressed by [`NodeId`]. Detaching a
//! node only unlinks it from its parent, so field models can hold on to
//! detached markup and re-insert deep copies of it later.

use std::fmt;

/// Compact node identifier (index into the arena)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    #[inline]
    fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Namespace-qualified name of an element or attribute.
///
/// `prefix` is the prefix the name was read with (or should be written with);
/// `namespace` is the resolved URI. Namespace declarations themselves are kept
/// as plain attributes with the `xmlns` prefix and no namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QName {
    pub prefix: Option<String>,
    pub local: String,
    pub namespace: Option<String>,
}

impl QName {
    pub fn new(namespace: Option<&str>, prefix: Option<&str>, local: &str) -> Self {
        Self {
            prefix: prefix.map(str::to_string),
            local: local.to_string(),
            namespace: namespace.map(str::to_string),
        }
    }

    /// Whether this name is `{namespace}local`.
    #[inline]
    pub fn is(&self, namespace: &str, local: &str) -> bool {
        self.local == local && self.namespace.as_deref() == Some(namespace)
    }

    /// Whether this attribute is a namespace declaration.
    #[inline]
    pub fn is_xmlns(&self) -> bool {
        self.namespace.is_none()
            && (self.prefix.as_deref() == Some("xmlns")
                || (self.prefix.is_none() && self.local == "xmlns"))
    }

    /// The name as written in markup (`prefix:local`).
    pub fn qualified(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}:{}", prefix, self.local),
            None => self.local.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: QName,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: QName,
    pub attrs: Vec<Attribute>,
}

/// XML declaration of a parsed part
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub version: String,
    pub encoding: Option<String>,
    pub standalone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeData {
    Document,
    Element(Element),
    Text(String),
    CData(String),
    /// Raw comment content
    Comment(String),
    /// Raw processing instruction content (target and data)
    Pi(String),
    /// Raw doctype content
    DocType(String),
}

#[derive(Debug, Clone)]
struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    data: NodeData,
}

/// A mutable XML document.
#[derive(Debug, Clone)]
pub struct XmlTree {
    nodes: Vec<Node>,
    pub(crate) declaration: Option<Declaration>,
}

impl Default for XmlTree {
    fn default() -> Self {
        Self::new()
    }
}

impl XmlTree {
    /// Create an empty document holding only the document node.
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                parent: None,
                children: Vec::new(),
                data: NodeData::Document,
            }],
            declaration: None,
        }
    }

    /// The document node.
    #[inline]
    pub fn document(&self) -> NodeId {
        NodeId(0)
    }

    /// The root element, if the document has one.
    pub fn root_element(&self) -> Option<NodeId> {
        self.children(self.document())
            .iter()
            .copied()
            .find(|&id| self.element(id).is_some())
    }

    /// Number of nodes ever allocated, attached or not.
    #[inline]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    // ---- construction ----------------------------------------------------

    /// Allocate a detached node.
    pub fn create(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            parent: None,
            children: Vec::new(),
            data,
        });
        id
    }

    /// Allocate a detached element without attributes.
    pub fn create_element(&mut self, namespace: &str, prefix: &str, local: &str) -> NodeId {
        self.create(NodeData::Element(Element {
            name: QName::new(Some(namespace), Some(prefix), local),
            attrs: Vec::new(),
        }))
    }

    /// Allocate a detached text node.
    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.create(NodeData::Text(text.into()))
    }

    /// Copy a subtree into fresh, detached nodes.
    pub fn deep_copy(&mut self, id: NodeId) -> NodeId {
        let data = self.nodes[id.index()].data.clone();
        let copy = self.create(data);
        let children = self.nodes[id.index()].children.clone();
        for child in children {
            let child_copy = self.deep_copy(child);
            self.append_child(copy, child_copy);
        }
        copy
    }

    // ---- access ----------------------------------------------------------

    #[inline]
    pub fn data(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.index()].data
    }

    #[inline]
    pub fn data_mut(&mut self, id: NodeId) -> &mut NodeData {
        &mut self.nodes[id.index()].data
    }

    #[inline]
    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match &self.nodes[id.index()].data {
            NodeData::Element(element) => Some(element),
            _ => None,
        }
    }

    #[inline]
    pub fn element_mut(&mut self, id: NodeId) -> Option<&mut Element> {
        match &mut self.nodes[id.index()].data {
            NodeData::Element(element) => Some(element),
            _ => None,
        }
    }

    /// Whether `id` is the element `{namespace}local`.
    #[inline]
    pub fn is_element(&self, id: NodeId, namespace: &str, local: &str) -> bool {
        self.element(id).is_some_and(|e| e.name.is(namespace, local))
    }

    /// Text of a text or CDATA node.
    pub fn text(&self, id: NodeId) -> Option<&str> {
        match &self.nodes[id.index()].data {
            NodeData::Text(text) | NodeData::CData(text) => Some(text),
            _ => None,
        }
    }

    /// Concatenated text of every text node below `id`.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        for node in self.descendants(id) {
            if let Some(text) = self.text(node) {
                out.push_str(text);
            }
        }
        out
    }

    /// Attribute value by namespace and local name.
    ///
    /// `namespace` is `None` for unqualified attributes.
    pub fn attr(&self, id: NodeId, namespace: Option<&str>, local: &str) -> Option<&str> {
        self.element(id)?
            .attrs
            .iter()
            .find(|a| a.name.local == local && a.name.namespace.as_deref() == namespace && !a.name.is_xmlns())
            .map(|a| a.value.as_str())
    }

    /// Set an attribute, replacing an existing one with the same name.
    pub fn set_attr(
        &mut self,
        id: NodeId,
        namespace: Option<&str>,
        prefix: Option<&str>,
        local: &str,
        value: impl Into<String>,
    ) {
        let value = value.into();
        let Some(element) = self.element_mut(id) else {
            return;
        };
        if let Some(attr) = element
            .attrs
            .iter_mut()
            .find(|a| a.name.local == local && a.name.namespace.as_deref() == namespace)
        {
            attr.value = value;
        } else {
            element.attrs.push(Attribute {
                name: QName::new(namespace, prefix, local),
                value,
            });
        }
    }

    /// Remove an attribute, returning its value.
    pub fn remove_attr(&mut self, id: NodeId, namespace: Option<&str>, local: &str) -> Option<String> {
        let element = self.element_mut(id)?;
        let index = element
            .attrs
            .iter()
            .position(|a| a.name.local == local && a.name.namespace.as_deref() == namespace)?;
        Some(element.attrs.remove(index).value)
    }

    // ---- navigation ------------------------------------------------------

    #[inline]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.index()].parent
    }

    #[inline]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.index()].children
    }

    /// Position of `id` among its parent's children.
    pub fn index_in_parent(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|&c| c == id)
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let index = self.index_in_parent(id)?;
        self.children(parent).get(index + 1).copied()
    }

    pub fn previous_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let index = self.index_in_parent(id)?;
        index.checked_sub(1).map(|i| self.children(parent)[i])
    }

    /// Direct child elements named `{namespace}local`.
    pub fn child_elements<'a>(
        &'a self,
        id: NodeId,
        namespace: &'a str,
        local: &'a str,
    ) -> impl Iterator<Item = NodeId> + 'a {
        self.children(id)
            .iter()
            .copied()
            .filter(move |&c| self.is_element(c, namespace, local))
    }

    pub fn first_child_element(&self, id: NodeId, namespace: &str, local: &str) -> Option<NodeId> {
        self.child_elements(id, namespace, local).next()
    }

    /// Ancestors of `id`, nearest first, excluding `id` itself.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |&p| self.parent(p))
    }

    /// Nearest ancestor named `{namespace}local`.
    pub fn ancestor_element(&self, id: NodeId, namespace: &str, local: &str) -> Option<NodeId> {
        self.ancestors(id).find(|&a| self.is_element(a, namespace, local))
    }

    /// Whether `id` is reachable from the document node.
    pub fn is_attached(&self, id: NodeId) -> bool {
        id == self.document() || self.ancestors(id).any(|a| a == self.document())
    }

    /// Pre-order traversal of the subtree rooted at `id`, including `id`.
    pub fn descendants(&self, id: NodeId) -> Descendants<'_> {
        Descendants {
            tree: self,
            stack: vec![id],
        }
    }

    /// Descendant elements named `{namespace}local`, in document order.
    pub fn find_all(&self, id: NodeId, namespace: &str, local: &str) -> Vec<NodeId> {
        self.descendants(id)
            .filter(|&n| self.is_element(n, namespace, local))
            .collect()
    }

    // ---- mutation --------------------------------------------------------

    /// Unlink `id` from its parent. The node stays in the arena.
    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.index()].parent.take() {
            self.nodes[parent.index()].children.retain(|&c| c != id);
        }
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.nodes[child.index()].parent = Some(parent);
        self.nodes[parent.index()].children.push(child);
    }

    /// Insert `child` at `index` among `parent`'s children (clamped).
    pub fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) {
        self.detach(child);
        let children = &mut self.nodes[parent.index()].children;
        let index = index.min(children.len());
        children.insert(index, child);
        self.nodes[child.index()].parent = Some(parent);
    }

    /// Insert `new` immediately before `sibling`.
    pub fn insert_before(&mut self, sibling: NodeId, new: NodeId) {
        if let (Some(parent), Some(index)) = (self.parent(sibling), self.index_in_parent(sibling)) {
            self.insert_child(parent, index, new);
        }
    }

    /// Insert `new` immediately after `sibling`.
    pub fn insert_after(&mut self, sibling: NodeId, new: NodeId) {
        if let (Some(parent), Some(index)) = (self.parent(sibling), self.index_in_parent(sibling)) {
            self.insert_child(parent, index + 1, new);
        }
    }

    /// Put `replacement` where `old` is, in order, and detach `old`.
    pub fn replace_with(&mut self, old: NodeId, replacement: &[NodeId]) {
        let (Some(parent), Some(index)) = (self.parent(old), self.index_in_parent(old)) else {
            return;
        };
        self.detach(old);
        for (offset, &node) in replacement.iter().enumerate() {
            self.insert_child(parent, index + offset, node);
        }
    }

    /// Detach every child of `id`, returning them in order.
    pub fn take_children(&mut self, id: NodeId) -> Vec<NodeId> {
        let children = std::mem::take(&mut self.nodes[id.index()].children);
        for &child in &children {
            self.nodes[child.index()].parent = None;
        }
        children
    }

    /// Append a text node, merging with a trailing text sibling.
    pub fn append_text(&mut self, parent: NodeId, text: &str) {
        if let Some(&last) = self.children(parent).last()
            && let NodeData::Text(existing) = &mut self.nodes[last.index()].data
        {
            existing.push_str(text);
            return;
        }
        let node = self.create_text(text);
        self.append_child(parent, node);
    }
}

/// Pre-order iterator over a subtree
pub struct Descendants<'a> {
    tree: &'a XmlTree,
    stack: Vec<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.stack.pop()?;
        self.stack
            .extend(self.tree.children(id).iter().rev().copied());
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NS: &str = "urn:test";

    fn sample() -> (XmlTree, NodeId, NodeId, NodeId) {
        let mut tree = XmlTree::new();
        let root = tree.create_element(NS, "t", "root");
        let a = tree.create_element(NS, "t", "a");
        let b = tree.create_element(NS, "t", "b");
        tree.append_child(tree.document(), root);
        tree.append_child(root, a);
        tree.append_child(root, b);
        tree.append_text(a, "hello ");
        tree.append_text(a, "world");
        (tree, root, a, b)
    }

    #[test]
    fn test_navigation() {
        let (tree, root, a, b) = sample();
        assert_eq!(tree.root_element(), Some(root));
        assert_eq!(tree.next_sibling(a), Some(b));
        assert_eq!(tree.previous_sibling(b), Some(a));
        assert_eq!(tree.previous_sibling(a), None);
        assert_eq!(tree.children(a).len(), 1);
        assert_eq!(tree.text_content(root), "hello world");
        assert_eq!(tree.ancestor_element(a, NS, "root"), Some(root));
        assert_eq!(tree.find_all(root, NS, "b"), vec![b]);
    }

    #[test]
    fn test_detach_keeps_node() {
        let (mut tree, root, a, b) = sample();
        tree.detach(a);
        assert!(!tree.is_attached(a));
        assert_eq!(tree.children(root), &[b]);
        assert_eq!(tree.text_content(a), "hello world");

        tree.insert_before(b, a);
        assert_eq!(tree.children(root), &[a, b]);
        assert!(tree.is_attached(a));
    }

    #[test]
    fn test_deep_copy_is_independent() {
        let (mut tree, root, a, _) = sample();
        tree.set_attr(a, Some(NS), Some("t"), "val", "1");
        let copy = tree.deep_copy(a);
        assert!(tree.parent(copy).is_none());
        assert_eq!(tree.attr(copy, Some(NS), "val"), Some("1"));

        tree.set_attr(copy, Some(NS), Some("t"), "val", "2");
        assert_eq!(tree.attr(a, Some(NS), "val"), Some("1"));

        tree.append_child(root, copy);
        assert_eq!(tree.text_content(root), "hello worldhello world");
    }

    #[test]
    fn test_replace_with() {
        let (mut tree, root, a, b) = sample();
        let x = tree.create_element(NS, "t", "x");
        let y = tree.create_element(NS, "t", "y");
        tree.replace_with(a, &[x, y]);
        assert_eq!(tree.children(root), &[x, y, b]);
        assert_eq!(tree.remove_attr(x, Some(NS), "missing"), None);
    }
}
