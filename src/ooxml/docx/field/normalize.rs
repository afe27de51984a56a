//! Rewriting field markup into placeholders.
//!
//! After a part is normalized every field it holds, simple or complex, is a
//! single `mm:MergeField` element in the live tree and a [`FieldModel`] in
//! the part's [`FieldStore`]. Fields nested in another field's instruction
//! stay inside the outer field's stored markup as placeholders of their own.

use crate::common::error::{MergeError, Result};
use crate::ooxml::docx::field::instruction::Instruction;
use crate::ooxml::docx::field::model::{
    FieldEncoding, FieldModel, FieldStore, InstrPiece, ParagraphSpan, placeholder_name, render_pieces,
};
use crate::ooxml::docx::warning::{Diagnostics, Warning};
use crate::ooxml::docx::wml::{fld_char_type, is_placeholder, is_w, new_placeholder, placeholder_key, w_attr};
use crate::ooxml::opc::constants::namespace::WML_MAIN;
use crate::ooxml::xml::{NodeData, NodeId, XmlTree};

/// What a run contributes to the field walk.
#[derive(Debug, Clone, PartialEq, Eq)]
enum RunItem {
    Begin,
    Separate,
    End,
    Instr(String),
}

/// A complex field whose `end` has not been seen yet.
#[derive(Debug)]
struct Frame {
    begin: NodeId,
    separate: Option<NodeId>,
    pieces: Vec<InstrPiece>,
    instr_runs: Vec<NodeId>,
}

impl Frame {
    fn new(begin: NodeId) -> Self {
        Self {
            begin,
            separate: None,
            pieces: Vec::new(),
            instr_runs: Vec::new(),
        }
    }

    /// Still collecting the instruction (no `separate` yet).
    #[inline]
    fn in_instruction(&self) -> bool {
        self.separate.is_none()
    }

    fn push_text(&mut self, text: &str) {
        if let Some(InstrPiece::Text(last)) = self.pieces.last_mut() {
            last.push_str(text);
        } else {
            self.pieces.push(InstrPiece::Text(text.to_string()));
        }
    }
}

/// Normalizes the fields of one part.
pub struct Normalizer<'a> {
    tree: &'a mut XmlTree,
    store: &'a mut FieldStore,
    next_key: &'a mut u32,
    diagnostics: &'a mut Diagnostics,
    part: &'a str,
}

impl<'a> Normalizer<'a> {
    /// `next_key` is shared by every part of a document so keys never clash.
    pub fn new(
        tree: &'a mut XmlTree,
        store: &'a mut FieldStore,
        next_key: &'a mut u32,
        diagnostics: &'a mut Diagnostics,
        part: &'a str,
    ) -> Self {
        Self {
            tree,
            store,
            next_key,
            diagnostics,
            part,
        }
    }

    /// Replace every field of the part with a placeholder.
    ///
    /// Fails when a complex field is never closed.
    pub fn run(mut self) -> Result<()> {
        let before = self.store.len();
        self.split_field_runs();
        self.convert_simple_fields();
        self.convert_complex_fields()?;
        log::debug!("{}: {} fields", self.part, self.store.len() - before);
        Ok(())
    }

    fn take_key(&mut self) -> u32 {
        let key = *self.next_key;
        *self.next_key += 1;
        key
    }

    /// Give each field character and instruction text a run of its own.
    fn split_field_runs(&mut self) {
        let document = self.tree.document();
        let runs = self.tree.find_all(document, WML_MAIN, "r");

        for run in runs {
            let items: Vec<NodeId> = self
                .tree
                .children(run)
                .iter()
                .copied()
                .filter(|&c| !is_w(self.tree, c, "rPr"))
                .collect();
            let has_field_markup = items
                .iter()
                .any(|&c| is_w(self.tree, c, "fldChar") || is_w(self.tree, c, "instrText"));
            if items.len() < 2 || !has_field_markup {
                continue;
            }

            let Some(shell) = self.tree.element(run).cloned() else {
                continue;
            };
            let props = self.tree.first_child_element(run, WML_MAIN, "rPr");
            for item in items {
                let piece = self.tree.create(NodeData::Element(shell.clone()));
                if let Some(props) = props {
                    let props = self.tree.deep_copy(props);
                    self.tree.append_child(piece, props);
                }
                self.tree.append_child(piece, item);
                self.tree.insert_before(run, piece);
            }
            self.tree.detach(run);
        }
    }

    /// Innermost first, so an outer simple field stores its inner one as a
    /// placeholder.
    fn convert_simple_fields(&mut self) {
        let document = self.tree.document();
        let simples = self.tree.find_all(document, WML_MAIN, "fldSimple");

        for &simple in simples.iter().rev() {
            let text = w_attr(self.tree, simple, "instr").unwrap_or_default().to_string();
            let instruction = Instruction::parse(&text, self.diagnostics);
            let name = placeholder_name(&instruction, &text);
            let key = self.take_key();

            let model = FieldModel {
                key,
                encoding: FieldEncoding::Simple,
                instruction,
                pieces: vec![InstrPiece::Text(text)],
                nested: false,
                nodes: vec![simple],
                instr_nodes: Vec::new(),
                show_nodes: self.tree.children(simple).to_vec(),
                separate_index: None,
                template_run: self.tree.first_child_element(simple, WML_MAIN, "r"),
                span: None,
            };

            let placeholder = new_placeholder(self.tree, key, &name);
            self.tree.replace_with(simple, &[placeholder]);
            self.store.insert(model);
        }
    }

    fn run_item(&self, run: NodeId) -> Option<RunItem> {
        if let Some(fld_char) = self.tree.first_child_element(run, WML_MAIN, "fldChar") {
            return match fld_char_type(self.tree, fld_char) {
                Some("begin") => Some(RunItem::Begin),
                Some("separate") => Some(RunItem::Separate),
                Some("end") => Some(RunItem::End),
                _ => None,
            };
        }
        let mut text = String::new();
        let mut found = false;
        for instr in self.tree.child_elements(run, WML_MAIN, "instrText") {
            found = true;
            text.push_str(&self.tree.text_content(instr));
        }
        found.then_some(RunItem::Instr(text))
    }

    fn stray(&mut self, kind: &str) {
        self.diagnostics.warn(Warning::StrayFieldChar {
            part: self.part.to_string(),
            kind: kind.to_string(),
        });
    }

    fn convert_complex_fields(&mut self) -> Result<()> {
        let document = self.tree.document();
        let items: Vec<NodeId> = self
            .tree
            .descendants(document)
            .filter(|&n| is_placeholder(self.tree, n) || is_w(self.tree, n, "r"))
            .collect();

        let mut stack: Vec<Frame> = Vec::new();
        for item in items {
            if is_placeholder(self.tree, item) {
                let Some(key) = placeholder_key(self.tree, item) else {
                    continue;
                };
                if let Some(frame) = stack.last_mut()
                    && frame.in_instruction()
                {
                    frame.pieces.push(InstrPiece::Nested(key));
                    if let Some(model) = self.store.get_mut(key) {
                        model.nested = true;
                    }
                }
                continue;
            }

            match self.run_item(item) {
                Some(RunItem::Begin) => stack.push(Frame::new(item)),
                Some(RunItem::Instr(text)) => match stack.last_mut() {
                    Some(frame) if frame.in_instruction() => {
                        frame.push_text(&text);
                        frame.instr_runs.push(item);
                    },
                    Some(_) => {},
                    None => log::debug!("{}: instruction text outside a field", self.part),
                },
                Some(RunItem::Separate) => match stack.last_mut() {
                    Some(frame) if frame.in_instruction() => frame.separate = Some(item),
                    _ => self.stray("separate"),
                },
                Some(RunItem::End) => {
                    let Some(frame) = stack.pop() else {
                        self.stray("end");
                        continue;
                    };
                    let Some(key) = self.finish(frame, item) else {
                        continue;
                    };
                    if let Some(parent) = stack.last_mut()
                        && parent.in_instruction()
                    {
                        parent.pieces.push(InstrPiece::Nested(key));
                        if let Some(model) = self.store.get_mut(key) {
                            model.nested = true;
                        }
                    }
                },
                None => {},
            }
        }

        match stack.pop() {
            Some(frame) => Err(MergeError::UnterminatedField {
                part: self.part.to_string(),
                instruction: render_pieces(&frame.pieces, Some(&*self.store)),
            }),
            None => Ok(()),
        }
    }

    /// Turn the closed field into a placeholder. Returns its key, or `None`
    /// when the markup was left untouched.
    fn finish(&mut self, frame: Frame, end: NodeId) -> Option<u32> {
        let text = render_pieces(&frame.pieces, None);
        let (begin_parent, end_parent) = (self.tree.parent(frame.begin)?, self.tree.parent(end)?);

        let collapsed = if begin_parent == end_parent {
            self.take_sibling_range(frame.begin, end)
                .map(|(nodes, index)| (nodes, index, None))
        } else {
            self.collapse_paragraphs(frame.begin, end, begin_parent, end_parent)
                .map(|(nodes, index, span)| (nodes, index, Some(span)))
        };
        let Some((nodes, index, span)) = collapsed else {
            self.diagnostics.warn(Warning::UnsupportedFieldLayout {
                part: self.part.to_string(),
                instruction: text,
            });
            return None;
        };

        let instruction = Instruction::parse(&text, self.diagnostics);
        let name = placeholder_name(&instruction, &text);
        let key = self.take_key();
        let placeholder = new_placeholder(self.tree, key, &name);
        self.tree.insert_child(begin_parent, index, placeholder);
        if let Some(span) = &span {
            self.move_trailing(span, begin_parent);
        }

        let separate_index = frame
            .separate
            .and_then(|separate| nodes.iter().position(|&n| n == separate));
        let show_nodes = match separate_index {
            Some(separate) if nodes.last() == Some(&end) => nodes[separate + 1..nodes.len() - 1].to_vec(),
            Some(separate) => nodes[separate + 1..].to_vec(),
            None => Vec::new(),
        };

        self.store.insert(FieldModel {
            key,
            encoding: FieldEncoding::Complex,
            instruction,
            pieces: frame.pieces,
            nested: false,
            nodes,
            template_run: frame.instr_runs.first().copied().or(Some(frame.begin)),
            instr_nodes: frame.instr_runs,
            show_nodes,
            separate_index,
            span,
        });
        Some(key)
    }

    /// Detach `begin..=end` from their shared parent.
    fn take_sibling_range(&mut self, begin: NodeId, end: NodeId) -> Option<(Vec<NodeId>, usize)> {
        let start = self.tree.index_in_parent(begin)?;
        let stop = self.tree.index_in_parent(end)?;
        if start > stop {
            return None;
        }
        let parent = self.tree.parent(begin)?;
        let nodes = self.tree.children(parent)[start..=stop].to_vec();
        for &node in &nodes {
            self.tree.detach(node);
        }
        Some((nodes, start))
    }

    /// Collapse a field running from one paragraph into a later sibling
    /// paragraph. The begin paragraph keeps its content up to the field; the
    /// paragraphs in between and the end paragraph are stored in the span.
    fn collapse_paragraphs(
        &mut self,
        begin: NodeId,
        end: NodeId,
        first: NodeId,
        last: NodeId,
    ) -> Option<(Vec<NodeId>, usize, ParagraphSpan)> {
        if !is_w(self.tree, first, "p") || !is_w(self.tree, last, "p") {
            return None;
        }
        let container = self.tree.parent(first)?;
        if self.tree.parent(last)? != container {
            return None;
        }
        let (first_index, last_index) = (self.tree.index_in_parent(first)?, self.tree.index_in_parent(last)?);
        if first_index >= last_index {
            return None;
        }

        let start = self.tree.index_in_parent(begin)?;
        let stop = self.tree.index_in_parent(end)?;
        let nodes = self.tree.children(first)[start..].to_vec();
        let middle = self.tree.children(container)[first_index + 1..last_index].to_vec();
        let end_runs: Vec<NodeId> = self.tree.children(last)[..=stop]
            .iter()
            .copied()
            .filter(|&n| !is_w(self.tree, n, "pPr"))
            .collect();

        for &node in nodes.iter().chain(&middle).chain(&end_runs) {
            self.tree.detach(node);
        }

        Some((
            nodes,
            start,
            ParagraphSpan {
                middle,
                end_paragraph: last,
                end_runs,
            },
        ))
    }

    /// Move what followed the field in its last paragraph into the first one,
    /// then drop the emptied last paragraph from the tree.
    fn move_trailing(&mut self, span: &ParagraphSpan, first: NodeId) {
        let trailing: Vec<NodeId> = self
            .tree
            .children(span.end_paragraph)
            .iter()
            .copied()
            .filter(|&n| !is_w(self.tree, n, "pPr"))
            .collect();
        for node in trailing {
            self.tree.append_child(first, node);
        }
        self.tree.detach(span.end_paragraph);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ooxml::docx::field::instruction::FieldKind;
    use crate::ooxml::docx::wml::placeholders_in;

    const W: &str = r#"xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main""#;

    fn body(content: &str) -> String {
        format!(r#"<w:document {W}><w:body>{content}</w:body></w:document>"#)
    }

    fn complex(instr: &str, result: &str) -> String {
        format!(
            r#"<w:r><w:fldChar w:fldCharType="begin"/></w:r><w:r><w:instrText xml:space="preserve">{instr}</w:instrText></w:r><w:r><w:fldChar w:fldCharType="separate"/></w:r><w:r><w:t>{result}</w:t></w:r><w:r><w:fldChar w:fldCharType="end"/></w:r>"#
        )
    }

    fn normalize(xml: &str) -> (XmlTree, FieldStore, Diagnostics) {
        let mut tree = XmlTree::parse(xml.as_bytes()).unwrap();
        let mut store = FieldStore::new();
        let mut diagnostics = Diagnostics::new();
        let mut next_key = 0;
        Normalizer::new(&mut tree, &mut store, &mut next_key, &mut diagnostics, "word/document.xml")
            .run()
            .unwrap();
        (tree, store, diagnostics)
    }

    fn live_names(tree: &XmlTree, store: &FieldStore) -> Vec<String> {
        placeholders_in(tree, &[tree.document()])
            .into_iter()
            .filter_map(|p| store.get(placeholder_key(tree, p)?))
            .map(|m| m.placeholder_name())
            .collect()
    }

    #[test]
    fn test_simple_field() {
        let xml = body(
            r#"<w:p><w:fldSimple w:instr=" MERGEFIELD Name \* Upper "><w:r><w:t>«Name»</w:t></w:r></w:fldSimple></w:p>"#,
        );
        let (tree, store, diagnostics) = normalize(&xml);

        assert_eq!(live_names(&tree, &store), vec!["Name"]);
        let model = store.get(0).unwrap();
        assert_eq!(model.encoding, FieldEncoding::Simple);
        assert_eq!(model.cached_text(&tree), "«Name»");
        assert!(tree.find_all(tree.document(), WML_MAIN, "fldSimple").is_empty());
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_complex_field_split_instruction() {
        let xml = body(&format!(
            r#"<w:p><w:r><w:t>Dear </w:t></w:r><w:r><w:fldChar w:fldCharType="begin"/></w:r><w:r><w:instrText> MERGEFIELD </w:instrText></w:r><w:r><w:instrText>"First Name" </w:instrText></w:r><w:r><w:fldChar w:fldCharType="separate"/></w:r><w:r><w:t>«First Name»</w:t></w:r><w:r><w:fldChar w:fldCharType="end"/></w:r><w:r><w:t>,</w:t></w:r></w:p>"#
        ));
        let (tree, store, _) = normalize(&xml);

        let model = store.get(0).unwrap();
        assert_eq!(model.encoding, FieldEncoding::Complex);
        assert_eq!(model.instruction_text(None), r#" MERGEFIELD "First Name" "#);
        assert_eq!(model.merge_field_name(), Some("First Name"));
        assert_eq!(model.nodes.len(), 6);
        assert_eq!(model.separate_index, Some(3));
        assert_eq!(model.show_nodes.len(), 1);
        assert_eq!(model.instr_nodes.len(), 2);

        let p = tree.find_all(tree.document(), WML_MAIN, "p")[0];
        let children = tree.children(p);
        assert_eq!(children.len(), 3);
        assert!(is_placeholder(&tree, children[1]));
    }

    #[test]
    fn test_shared_run_is_split() {
        let xml = body(
            r#"<w:p><w:r><w:rPr><w:i/></w:rPr><w:fldChar w:fldCharType="begin"/><w:instrText> MERGEFIELD a </w:instrText><w:fldChar w:fldCharType="end"/></w:r></w:p>"#,
        );
        let (tree, store, _) = normalize(&xml);

        let model = store.get(0).unwrap();
        assert_eq!(model.nodes.len(), 3);
        for &run in &model.nodes {
            assert!(tree.first_child_element(run, WML_MAIN, "rPr").is_some());
        }
        assert_eq!(model.separate_index, None);
        assert_eq!(live_names(&tree, &store), vec!["a"]);
    }

    #[test]
    fn test_nested_fields() {
        let xml = body(&format!(
            r#"<w:p><w:r><w:fldChar w:fldCharType="begin"/></w:r><w:r><w:instrText> IF </w:instrText></w:r>{}<w:r><w:instrText> = "x" "yes" "no" </w:instrText></w:r><w:r><w:fldChar w:fldCharType="separate"/></w:r><w:r><w:t>no</w:t></w:r><w:r><w:fldChar w:fldCharType="end"/></w:r></w:p>"#,
            complex(" MERGEFIELD flag ", "«flag»")
        ));
        let (tree, store, _) = normalize(&xml);

        assert_eq!(store.len(), 2);
        assert!(store.has_nested());
        let (inner, outer) = (store.get(0).unwrap(), store.get(1).unwrap());
        assert!(inner.nested);
        assert_eq!(outer.instruction.kind, FieldKind::If);
        assert_eq!(outer.instruction_text(None), r#" IF {0} = "x" "yes" "no" "#);
        assert_eq!(
            outer.instruction_text(Some(&store)),
            r#" IF  MERGEFIELD flag  = "x" "yes" "no" "#
        );
        assert_eq!(live_names(&tree, &store), vec!["IF"]);

        let mut names = Vec::new();
        store.merge_field_names(&tree, &[tree.document()], &mut names);
        assert_eq!(names, vec!["flag"]);
    }

    #[test]
    fn test_simple_inside_complex_instruction() {
        let xml = body(
            r#"<w:p><w:r><w:fldChar w:fldCharType="begin"/></w:r><w:r><w:instrText> IF </w:instrText></w:r><w:fldSimple w:instr=" MERGEFIELD a "><w:r><w:t>«a»</w:t></w:r></w:fldSimple><w:r><w:instrText> = 1 "one" "" </w:instrText></w:r><w:r><w:fldChar w:fldCharType="end"/></w:r></w:p>"#,
        );
        let (_, store, _) = normalize(&xml);

        let outer = store.get(1).unwrap();
        assert!(store.get(0).unwrap().nested);
        assert_eq!(outer.instruction_text(None), r#" IF {0} = 1 "one" "" "#);
    }

    #[test]
    fn test_field_over_paragraphs_collapses() {
        let xml = body(
            r#"<w:p><w:r><w:t>A</w:t></w:r><w:r><w:fldChar w:fldCharType="begin"/></w:r><w:r><w:instrText> MERGEFIELD a </w:instrText></w:r><w:r><w:fldChar w:fldCharType="separate"/></w:r><w:r><w:t>x</w:t></w:r></w:p><w:p><w:r><w:t>y</w:t></w:r></w:p><w:p><w:pPr><w:jc w:val="center"/></w:pPr><w:r><w:t>z</w:t></w:r><w:r><w:fldChar w:fldCharType="end"/></w:r><w:r><w:t>B</w:t></w:r></w:p>"#,
        );
        let (mut tree, store, _) = normalize(&xml);

        let paragraphs = tree.find_all(tree.document(), WML_MAIN, "p");
        assert_eq!(paragraphs.len(), 1);
        assert_eq!(tree.text_content(paragraphs[0]), "AB");

        let model = store.get(0).unwrap();
        let span = model.span.as_ref().unwrap();
        assert_eq!(span.middle.len(), 1);
        assert_eq!(span.end_runs.len(), 2);

        let placeholder = placeholders_in(&tree, &[tree.document()])[0];
        model.restore(&mut tree, placeholder);
        let paragraphs = tree.find_all(tree.document(), WML_MAIN, "p");
        assert_eq!(paragraphs.len(), 3);
        let texts: Vec<String> = paragraphs.iter().map(|&p| tree.text_content(p)).collect();
        assert_eq!(texts, vec!["A MERGEFIELD a x", "y", "zB"]);
        assert!(tree.first_child_element(paragraphs[2], WML_MAIN, "pPr").is_some());
    }

    #[test]
    fn test_unterminated_field_fails() {
        let xml = body(
            r#"<w:p><w:r><w:fldChar w:fldCharType="begin"/></w:r><w:r><w:instrText> MERGEFIELD a </w:instrText></w:r></w:p>"#,
        );
        let mut tree = XmlTree::parse(xml.as_bytes()).unwrap();
        let mut store = FieldStore::new();
        let mut diagnostics = Diagnostics::new();
        let mut next_key = 0;
        let err = Normalizer::new(&mut tree, &mut store, &mut next_key, &mut diagnostics, "word/document.xml")
            .run()
            .unwrap_err();
        assert!(matches!(
            err,
            MergeError::UnterminatedField { ref instruction, .. } if instruction == " MERGEFIELD a "
        ));
    }

    #[test]
    fn test_stray_end_warns() {
        let xml = body(r#"<w:p><w:r><w:fldChar w:fldCharType="end"/></w:r><w:r><w:t>text</w:t></w:r></w:p>"#);
        let (tree, store, diagnostics) = normalize(&xml);
        assert!(store.is_empty());
        assert!(matches!(diagnostics.warnings(), [Warning::StrayFieldChar { kind, .. }] if kind == "end"));
        assert_eq!(tree.find_all(tree.document(), WML_MAIN, "fldChar").len(), 1);
    }

    #[test]
    fn test_unrelated_parents_left_alone() {
        let xml = body(
            r#"<w:tbl><w:tr><w:tc><w:p><w:r><w:fldChar w:fldCharType="begin"/></w:r><w:r><w:instrText> MERGEFIELD a </w:instrText></w:r></w:p></w:tc></w:tr></w:tbl><w:p><w:r><w:fldChar w:fldCharType="end"/></w:r></w:p>"#,
        );
        let (tree, store, diagnostics) = normalize(&xml);
        assert!(store.is_empty());
        assert!(matches!(diagnostics.warnings(), [Warning::UnsupportedFieldLayout { .. }]));
        assert_eq!(tree.find_all(tree.document(), WML_MAIN, "fldChar").len(), 2);
    }

    #[test]
    fn test_keys_continue_across_parts() {
        let xml = body(r#"<w:p><w:fldSimple w:instr=" MERGEFIELD a "/></w:p>"#);
        let mut next_key = 7;
        for _ in 0..2 {
            let mut tree = XmlTree::parse(xml.as_bytes()).unwrap();
            let mut store = FieldStore::new();
            let mut diagnostics = Diagnostics::new();
            Normalizer::new(&mut tree, &mut store, &mut next_key, &mut diagnostics, "word/header1.xml")
                .run()
                .unwrap();
        }
        assert_eq!(next_key, 9);
    }
}
