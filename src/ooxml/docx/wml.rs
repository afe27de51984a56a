//! Small WordprocessingML helpers over [`XmlTree`].

use crate::ooxml::opc::constants::namespace::{MERGE_INTERNAL, WML_MAIN, XML};
use crate::ooxml::xml::{NodeData, NodeId, XmlTree};

/// Preferred prefix for elements created in the WordprocessingML namespace
pub const W_PREFIX: &str = "w";

/// Local name of placeholder elements
pub const PLACEHOLDER: &str = "MergeField";
pub const PLACEHOLDER_KEY: &str = "merge_key";
pub const PLACEHOLDER_NAME: &str = "name";

#[inline]
pub fn is_w(tree: &XmlTree, id: NodeId, local: &str) -> bool {
    tree.is_element(id, WML_MAIN, local)
}

/// `w:`-qualified attribute value.
#[inline]
pub fn w_attr<'a>(tree: &'a XmlTree, id: NodeId, local: &str) -> Option<&'a str> {
    tree.attr(id, Some(WML_MAIN), local)
}

#[inline]
pub fn set_w_attr(tree: &mut XmlTree, id: NodeId, local: &str, value: impl Into<String>) {
    tree.set_attr(id, Some(WML_MAIN), Some(W_PREFIX), local, value);
}

#[inline]
pub fn new_w(tree: &mut XmlTree, local: &str) -> NodeId {
    tree.create_element(WML_MAIN, W_PREFIX, local)
}

/// A text-bearing element (`w:t` or `w:instrText`) with `xml:space="preserve"`.
pub fn new_text_element(tree: &mut XmlTree, local: &str, text: &str) -> NodeId {
    let element = new_w(tree, local);
    tree.set_attr(element, Some(XML), Some("xml"), "space", "preserve");
    if !text.is_empty() {
        let node = tree.create_text(text);
        tree.append_child(element, node);
    }
    element
}

/// A run shaped like `template`: same attributes, a copy of its `w:rPr`.
pub fn run_like(tree: &mut XmlTree, template: Option<NodeId>) -> NodeId {
    let Some(template) = template else {
        return new_w(tree, "r");
    };
    let Some(element) = tree.element(template).cloned() else {
        return new_w(tree, "r");
    };

    let run = tree.create(NodeData::Element(element));
    if let Some(props) = tree.first_child_element(template, WML_MAIN, "rPr") {
        let props = tree.deep_copy(props);
        tree.append_child(run, props);
    }
    run
}

/// `fldCharType` of a `w:fldChar` element.
#[inline]
pub fn fld_char_type<'a>(tree: &'a XmlTree, fld_char: NodeId) -> Option<&'a str> {
    w_attr(tree, fld_char, "fldCharType")
}

// ---- placeholders ------------------------------------------------------

pub fn new_placeholder(tree: &mut XmlTree, key: u32, name: &str) -> NodeId {
    let placeholder = tree.create_element(MERGE_INTERNAL, "mm", PLACEHOLDER);
    tree.set_attr(placeholder, None, None, PLACEHOLDER_KEY, key.to_string());
    tree.set_attr(placeholder, None, None, PLACEHOLDER_NAME, name);
    placeholder
}

#[inline]
pub fn is_placeholder(tree: &XmlTree, id: NodeId) -> bool {
    tree.is_element(id, MERGE_INTERNAL, PLACEHOLDER)
}

/// Field key carried by a placeholder.
pub fn placeholder_key(tree: &XmlTree, id: NodeId) -> Option<u32> {
    if !is_placeholder(tree, id) {
        return None;
    }
    tree.attr(id, None, PLACEHOLDER_KEY)?.parse().ok()
}

/// Placeholders below (and including) each root, in document order.
pub fn placeholders_in(tree: &XmlTree, roots: &[NodeId]) -> Vec<NodeId> {
    roots
        .iter()
        .flat_map(|&root| tree.descendants(root))
        .filter(|&id| is_placeholder(tree, id))
        .collect()
}
