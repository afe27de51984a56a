//! The encoding-independent model of one field occurrence.
//!
//! A model owns the detached original markup of its field. Every edit of
//! the live tree inserts deep copies of that markup, so one model serves any
//! number of placeholders (duplicated table rows, template copies).

use crate::ooxml::docx::field::instruction::{FieldKind, Instruction};
use crate::ooxml::docx::wml::{
    new_text_element, new_w, placeholder_key, placeholders_in, run_like, set_w_attr,
};
use crate::ooxml::opc::constants::namespace::WML_MAIN;
use crate::ooxml::xml::{NodeId, XmlTree};
use std::collections::{HashMap, HashSet};

/// On-disk encoding a field was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldEncoding {
    /// `w:fldSimple` with a `w:instr` attribute
    Simple,
    /// `w:fldChar` begin / separate / end runs with `w:instrText`
    Complex,
}

/// One piece of an instruction: literal text or a nested field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstrPiece {
    Text(String),
    Nested(u32),
}

/// Markup of a complex field that ran over several sibling paragraphs.
///
/// At normalization the paragraphs are collapsed into the one holding the
/// `begin` run; restoring rebuilds them.
#[derive(Debug, Clone)]
pub struct ParagraphSpan {
    /// Whole paragraphs between the first and the last one
    pub middle: Vec<NodeId>,
    /// The last paragraph, emptied of everything but its `w:pPr`
    pub end_paragraph: NodeId,
    /// Content of the last paragraph up to and including the `end` run
    pub end_runs: Vec<NodeId>,
}

/// Element used for value text: `w:t` in a result, `w:instrText` inside an
/// outer field's instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextKind {
    Display,
    Instruction,
}

impl TextKind {
    fn local_name(self) -> &'static str {
        match self {
            TextKind::Display => "t",
            TextKind::Instruction => "instrText",
        }
    }
}

#[derive(Debug, Clone)]
pub struct FieldModel {
    pub key: u32,
    pub encoding: FieldEncoding,
    pub instruction: Instruction,
    pub pieces: Vec<InstrPiece>,
    /// The field sits inside another field's instruction
    pub nested: bool,
    /// Original markup, in document order (detached)
    pub nodes: Vec<NodeId>,
    /// Runs carrying the instruction text
    pub instr_nodes: Vec<NodeId>,
    /// Runs showing the cached result, between `separate` and `end`
    pub show_nodes: Vec<NodeId>,
    /// Position of the `separate` run in `nodes`
    pub separate_index: Option<usize>,
    /// Run whose properties format rendered values
    pub template_run: Option<NodeId>,
    pub span: Option<ParagraphSpan>,
}

impl FieldModel {
    #[inline]
    pub fn kind(&self) -> FieldKind {
        self.instruction.kind
    }

    /// Field name when this is a MERGEFIELD.
    #[inline]
    pub fn merge_field_name(&self) -> Option<&str> {
        self.instruction.merge_field_name()
    }

    /// Name stored on placeholders: the MERGEFIELD name or the keyword.
    pub fn placeholder_name(&self) -> String {
        placeholder_name(&self.instruction, &self.instruction_text(None))
    }

    /// Instruction text. With a store, nested fields are expanded into their
    /// own instruction text; without one they appear as `{key}`.
    pub fn instruction_text(&self, store: Option<&FieldStore>) -> String {
        render_pieces(&self.pieces, store)
    }

    /// Concatenated text of the cached result runs.
    pub fn cached_text(&self, tree: &XmlTree) -> String {
        self.show_nodes
            .iter()
            .flat_map(|&run| tree.find_all(run, WML_MAIN, "t"))
            .map(|t| tree.text_content(t))
            .collect()
    }

    /// Element kind for this field's rendered value.
    #[inline]
    pub fn text_kind(&self) -> TextKind {
        if self.nested {
            TextKind::Instruction
        } else {
            TextKind::Display
        }
    }

    /// Runs showing `text`, one per line; every line after the first starts
    /// with a `w:br`. An empty value yields one run with an empty text element.
    pub fn value_runs(&self, tree: &mut XmlTree, text: &str, kind: TextKind) -> Vec<NodeId> {
        let normalized = text.replace("\r\n", "\n");
        normalized
            .split('\n')
            .enumerate()
            .map(|(index, line)| {
                let run = run_like(tree, self.template_run);
                if index > 0 {
                    let br = new_w(tree, "br");
                    tree.append_child(run, br);
                }
                let t = new_text_element(tree, kind.local_name(), line);
                tree.append_child(run, t);
                run
            })
            .collect()
    }

    /// Replace `placeholder` with plain runs showing `text`.
    pub fn replace_with_text(&self, tree: &mut XmlTree, placeholder: NodeId, text: &str) {
        let runs = self.value_runs(tree, text, self.text_kind());
        tree.replace_with(placeholder, &runs);
    }

    /// Put copies of the original markup back in place of `placeholder`.
    ///
    /// Returns the inserted subtrees that may hold further placeholders.
    pub fn restore(&self, tree: &mut XmlTree, placeholder: NodeId) -> Vec<NodeId> {
        let copies: Vec<NodeId> = self.nodes.iter().map(|&n| tree.deep_copy(n)).collect();

        let Some(span) = &self.span else {
            tree.replace_with(placeholder, &copies);
            return copies;
        };
        let (Some(paragraph), Some(index)) = (tree.parent(placeholder), tree.index_in_parent(placeholder)) else {
            return Vec::new();
        };

        let trailing = tree.children(paragraph)[index + 1..].to_vec();
        tree.replace_with(placeholder, &copies);

        let mut inserted = copies;
        let mut anchor = paragraph;
        for &middle in &span.middle {
            let copy = tree.deep_copy(middle);
            tree.insert_after(anchor, copy);
            inserted.push(copy);
            anchor = copy;
        }

        let end_paragraph = tree.deep_copy(span.end_paragraph);
        for &run in &span.end_runs {
            let copy = tree.deep_copy(run);
            tree.append_child(end_paragraph, copy);
            inserted.push(copy);
        }
        for node in trailing {
            tree.append_child(end_paragraph, node);
        }
        tree.insert_after(anchor, end_paragraph);

        inserted
    }

    /// Keep the field but replace its cached result with `text`.
    ///
    /// Returns the inserted subtrees that may hold further placeholders.
    pub fn replace_keeping_field(&self, tree: &mut XmlTree, placeholder: NodeId, text: &str) -> Vec<NodeId> {
        match self.encoding {
            FieldEncoding::Simple => {
                let Some(&simple) = self.nodes.first() else {
                    return Vec::new();
                };
                let copy = tree.deep_copy(simple);
                tree.take_children(copy);
                for run in self.value_runs(tree, text, TextKind::Display) {
                    tree.append_child(copy, run);
                }
                tree.replace_with(placeholder, &[copy]);
                vec![copy]
            },
            FieldEncoding::Complex if self.span.is_some() => {
                log::debug!("field {} spans paragraphs; keeping its cached result", self.key);
                self.restore(tree, placeholder)
            },
            FieldEncoding::Complex => {
                let copies: Vec<NodeId> = self.nodes.iter().map(|&n| tree.deep_copy(n)).collect();
                let Some((&end, before_end)) = copies.split_last() else {
                    return Vec::new();
                };

                let mut replacement = match self.separate_index {
                    Some(separate) => copies[..=separate].to_vec(),
                    None => {
                        let mut head = before_end.to_vec();
                        head.push(separate_run_from(tree, copies[0]));
                        head
                    },
                };
                replacement.extend(self.value_runs(tree, text, TextKind::Display));
                replacement.push(end);

                tree.replace_with(placeholder, &replacement);
                replacement
            },
        }
    }
}

/// Render instruction pieces; see [`FieldModel::instruction_text`].
pub fn render_pieces(pieces: &[InstrPiece], store: Option<&FieldStore>) -> String {
    let mut text = String::new();
    for piece in pieces {
        match piece {
            InstrPiece::Text(t) => text.push_str(t),
            InstrPiece::Nested(key) => match store {
                Some(store) => {
                    if let Some(inner) = store.get(*key) {
                        text.push_str(&inner.instruction_text(Some(store)));
                    }
                },
                None => {
                    text.push('{');
                    text.push_str(itoa::Buffer::new().format(*key));
                    text.push('}');
                },
            },
        }
    }
    text
}

/// The MERGEFIELD name, or the instruction keyword for other fields.
pub fn placeholder_name(instruction: &Instruction, text: &str) -> String {
    match instruction.merge_field_name() {
        Some(name) => name.to_string(),
        None => text.split_whitespace().next().unwrap_or_default().to_string(),
    }
}

/// A `separate` run built from a copy of the `begin` run.
fn separate_run_from(tree: &mut XmlTree, begin: NodeId) -> NodeId {
    let run = tree.deep_copy(begin);
    let fld_chars: Vec<NodeId> = tree.child_elements(run, WML_MAIN, "fldChar").collect();
    for fld_char in fld_chars {
        set_w_attr(tree, fld_char, "fldCharType", "separate");
        tree.remove_attr(fld_char, Some(WML_MAIN), "dirty");
    }
    run
}

/// Field models of one part, by key.
#[derive(Debug, Default)]
pub struct FieldStore {
    fields: HashMap<u32, FieldModel>,
}

impl FieldStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, model: FieldModel) {
        self.fields.insert(model.key, model);
    }

    #[inline]
    pub fn get(&self, key: u32) -> Option<&FieldModel> {
        self.fields.get(&key)
    }

    #[inline]
    pub fn get_mut(&mut self, key: u32) -> Option<&mut FieldModel> {
        self.fields.get_mut(&key)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Whether any field sits inside another field's instruction.
    pub fn has_nested(&self) -> bool {
        self.fields.values().any(|f| f.nested)
    }

    /// MERGEFIELD names reachable from the live placeholders under `roots`,
    /// including fields held inside the markup of other live fields.
    pub fn merge_field_names(&self, tree: &XmlTree, roots: &[NodeId], names: &mut Vec<String>) {
        let mut pending = placeholders_in(tree, roots);
        let mut visited = HashSet::new();

        while let Some(placeholder) = pending.pop() {
            let Some(model) = placeholder_key(tree, placeholder).and_then(|key| self.get(key))
            else {
                continue;
            };
            if !visited.insert(model.key) {
                continue;
            }
            if let Some(name) = model.merge_field_name() {
                names.push(name.to_string());
            }

            let mut stored = model.nodes.clone();
            if let Some(span) = &model.span {
                stored.extend(&span.middle);
                stored.extend(&span.end_runs);
            }
            pending.extend(placeholders_in(tree, &stored));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ooxml::docx::warning::Diagnostics;
    use crate::ooxml::docx::wml::new_placeholder;

    const W: &str = r#"xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main""#;

    fn model(instruction: &str, nodes: Vec<NodeId>, template: Option<NodeId>) -> FieldModel {
        FieldModel {
            key: 1,
            encoding: FieldEncoding::Simple,
            instruction: Instruction::parse(instruction, &mut Diagnostics::new()),
            pieces: vec![InstrPiece::Text(instruction.to_string())],
            nested: false,
            nodes,
            instr_nodes: Vec::new(),
            show_nodes: Vec::new(),
            separate_index: None,
            template_run: template,
            span: None,
        }
    }

    fn paragraph_xml(tree: &XmlTree) -> String {
        let p = tree.find_all(tree.document(), WML_MAIN, "p")[0];
        String::from_utf8(tree.subtree_to_xml(p).unwrap()).unwrap()
    }

    #[test]
    fn test_value_runs_split_lines() {
        let xml = format!(r#"<w:p {W}><w:fldSimple w:instr=" MERGEFIELD a "><w:r><w:rPr><w:b/></w:rPr><w:t>«a»</w:t></w:r></w:fldSimple></w:p>"#);
        let mut tree = XmlTree::parse(xml.as_bytes()).unwrap();
        let p = tree.root_element().unwrap();
        let simple = tree.children(p)[0];
        let run = tree.children(simple)[0];

        let placeholder = new_placeholder(&mut tree, 1, "a");
        tree.replace_with(simple, &[placeholder]);
        let field = model(" MERGEFIELD a ", vec![simple], Some(run));

        field.replace_with_text(&mut tree, placeholder, "one\ntwo");
        assert_eq!(
            paragraph_xml(&tree),
            format!(
                r#"<w:p {W}><w:r><w:rPr><w:b/></w:rPr><w:t xml:space="preserve">one</w:t></w:r><w:r><w:rPr><w:b/></w:rPr><w:br/><w:t xml:space="preserve">two</w:t></w:r></w:p>"#
            )
        );
    }

    #[test]
    fn test_restore_and_keep_simple() {
        let xml = format!(r#"<w:p {W}><w:fldSimple w:instr=" MERGEFIELD a "><w:r><w:t>«a»</w:t></w:r></w:fldSimple></w:p>"#);
        let mut tree = XmlTree::parse(xml.as_bytes()).unwrap();
        let p = tree.root_element().unwrap();
        let simple = tree.children(p)[0];
        let run = tree.children(simple)[0];

        let placeholder = new_placeholder(&mut tree, 1, "a");
        tree.replace_with(simple, &[placeholder]);
        let field = model(" MERGEFIELD a ", vec![simple], Some(run));

        let second = new_placeholder(&mut tree, 1, "a");
        tree.append_child(p, second);

        field.restore(&mut tree, placeholder);
        field.replace_keeping_field(&mut tree, second, "");
        assert_eq!(
            paragraph_xml(&tree),
            format!(
                r#"<w:p {W}><w:fldSimple w:instr=" MERGEFIELD a "><w:r><w:t>«a»</w:t></w:r></w:fldSimple><w:fldSimple w:instr=" MERGEFIELD a "><w:r><w:t xml:space="preserve"/></w:r></w:fldSimple></w:p>"#
            )
        );
    }

    #[test]
    fn test_instruction_text_nesting() {
        let mut diag = Diagnostics::new();
        let mut store = FieldStore::new();
        let inner = FieldModel {
            key: 0,
            encoding: FieldEncoding::Complex,
            instruction: Instruction::parse(" MERGEFIELD a ", &mut diag),
            pieces: vec![InstrPiece::Text(" MERGEFIELD a ".into())],
            nested: true,
            nodes: Vec::new(),
            instr_nodes: Vec::new(),
            show_nodes: Vec::new(),
            separate_index: None,
            template_run: None,
            span: None,
        };
        let outer = FieldModel {
            key: 1,
            pieces: vec![
                InstrPiece::Text(" IF ".into()),
                InstrPiece::Nested(0),
                InstrPiece::Text(r#" = "x" "yes" "no" "#.into()),
            ],
            instruction: Instruction::parse(" IF {0} = \"x\" ", &mut diag),
            nested: false,
            ..inner.clone()
        };
        store.insert(inner);
        store.insert(outer.clone());

        assert_eq!(outer.instruction_text(None), r#" IF {0} = "x" "yes" "no" "#);
        assert_eq!(
            outer.instruction_text(Some(&store)),
            r#" IF  MERGEFIELD a  = "x" "yes" "no" "#
        );
        assert!(store.has_nested());
        assert_eq!(outer.placeholder_name(), "IF");
        assert_eq!(outer.text_kind(), TextKind::Display);
    }
}
