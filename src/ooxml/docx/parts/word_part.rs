/// A classified package part held as a mutable tree.
use crate::common::error::Result;
use crate::common::id::UniqueIdRegistry;
use crate::ooxml::docx::field::{FieldStore, Normalizer};
use crate::ooxml::docx::warning::Diagnostics;
use crate::ooxml::docx::wml::{is_w, placeholder_key, placeholders_in};
use crate::ooxml::opc::constants::namespace::{DML_WORDPROCESSING_DRAWING, VML, WML_MAIN};
use crate::ooxml::opc::PartRole;
use crate::ooxml::xml::{NodeId, XmlTree};

/// One parsed part together with the models of the fields it holds.
#[derive(Debug)]
pub struct WordPart {
    /// ZIP member name (`word/document.xml`)
    pub member: String,
    pub role: PartRole,
    pub tree: XmlTree,
    pub fields: FieldStore,
}

impl WordPart {
    /// Parse `blob` as the part `member`.
    pub fn parse(member: impl Into<String>, role: PartRole, blob: &[u8]) -> Result<Self> {
        let member = member.into();
        let tree = XmlTree::parse(blob)?;
        log::debug!("loaded {} ({:?})", member, role);
        Ok(Self {
            member,
            role,
            tree,
            fields: FieldStore::new(),
        })
    }

    #[inline]
    pub fn has_fields(&self) -> bool {
        self.role.has_fields()
    }

    /// Replace the part's field markup with placeholders.
    pub fn normalize(&mut self, next_key: &mut u32, diagnostics: &mut Diagnostics) -> Result<()> {
        Normalizer::new(&mut self.tree, &mut self.fields, next_key, diagnostics, &self.member).run()
    }

    /// Live placeholders, in document order.
    pub fn placeholders(&self) -> Vec<NodeId> {
        placeholders_in(&self.tree, &[self.tree.document()])
    }

    /// MERGEFIELD names reachable from the live tree.
    pub fn merge_field_names(&self, names: &mut Vec<String>) {
        self.fields
            .merge_field_names(&self.tree, &[self.tree.document()], names);
    }

    /// Instruction text of each live top-level field.
    pub fn field_instructions(&self, recursive: bool) -> Vec<String> {
        self.placeholders()
            .into_iter()
            .filter_map(|p| self.fields.get(placeholder_key(&self.tree, p)?))
            .map(|model| model.instruction_text(recursive.then_some(&self.fields)))
            .collect()
    }

    /// The `w:body` of a main document part.
    pub fn body(&self) -> Option<NodeId> {
        let root = self.tree.root_element()?;
        self.tree.first_child_element(root, WML_MAIN, "body")
    }

    pub fn to_xml(&self) -> Result<Vec<u8>> {
        Ok(self.tree.to_xml()?)
    }
}

/// Make the drawing and shape ids under `roots` unique.
///
/// Ids not seen before are recorded; clashing ones are rewritten with fresh
/// values from `registry`.
pub fn assign_unique_ids(tree: &mut XmlTree, roots: &[NodeId], registry: &mut UniqueIdRegistry) {
    visit_unique_ids(tree, roots, registry, true);
}

/// Record the drawing and shape ids under `roots` without changing any.
pub fn record_unique_ids(tree: &mut XmlTree, roots: &[NodeId], registry: &mut UniqueIdRegistry) {
    visit_unique_ids(tree, roots, registry, false);
}

fn visit_unique_ids(tree: &mut XmlTree, roots: &[NodeId], registry: &mut UniqueIdRegistry, rewrite: bool) {
    let nodes: Vec<NodeId> = roots.iter().flat_map(|&root| tree.descendants(root)).collect();

    for node in nodes {
        if tree.is_element(node, DML_WORDPROCESSING_DRAWING, "docPr") {
            let current = tree.attr(node, None, "id").and_then(|id| id.parse::<u32>().ok());
            if let Some(fresh) = registry.register_id("docPr", current)
                && rewrite
            {
                tree.set_attr(node, None, None, "id", fresh.to_string());
            }
        } else if tree.is_element(node, VML, "shape") {
            let Some(current) = tree.attr(node, None, "id").map(str::to_string) else {
                continue;
            };
            if let Some(fresh) = registry.register_id_str(&current)
                && rewrite
            {
                tree.set_attr(node, None, None, "id", fresh);
            }
        }
    }
}

/// Whether `node` is a `w:sectPr`.
#[inline]
pub(crate) fn is_section_properties(tree: &XmlTree, node: NodeId) -> bool {
    is_w(tree, node, "sectPr")
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" xmlns:wp="http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing" xmlns:v="urn:schemas-microsoft-com:vml"><w:body><w:p><w:r><w:drawing><wp:inline><wp:docPr id="1" name="Picture 1"/></wp:inline></w:drawing></w:r><w:r><w:pict><v:shape id="_x0000_s1026"/></w:pict></w:r><w:fldSimple w:instr=" MERGEFIELD a "/></w:p><w:sectPr/></w:body></w:document>"#;

    #[test]
    fn test_parse_and_normalize() {
        let mut part = WordPart::parse("word/document.xml", PartRole::Main, DOC.as_bytes()).unwrap();
        let mut diagnostics = Diagnostics::new();
        let mut next_key = 0;
        part.normalize(&mut next_key, &mut diagnostics).unwrap();

        assert_eq!(part.placeholders().len(), 1);
        assert_eq!(part.field_instructions(false), vec![" MERGEFIELD a "]);
        let mut names = Vec::new();
        part.merge_field_names(&mut names);
        assert_eq!(names, vec!["a"]);

        let body = part.body().unwrap();
        let last = *part.tree.children(body).last().unwrap();
        assert!(is_section_properties(&part.tree, last));
    }

    #[test]
    fn test_assign_unique_ids() {
        let mut part = WordPart::parse("word/document.xml", PartRole::Main, DOC.as_bytes()).unwrap();
        let mut registry = UniqueIdRegistry::new();
        let body = part.body().unwrap();
        let paragraph = part.tree.children(body)[0];

        assign_unique_ids(&mut part.tree, &[paragraph], &mut registry);
        let copy = part.tree.deep_copy(paragraph);
        assign_unique_ids(&mut part.tree, &[copy], &mut registry);

        let doc_pr = part.tree.find_all(copy, DML_WORDPROCESSING_DRAWING, "docPr")[0];
        assert_eq!(part.tree.attr(doc_pr, None, "id"), Some("2"));
        let shape = part.tree.find_all(copy, VML, "shape")[0];
        assert_eq!(part.tree.attr(shape, None, "id"), Some("_x0000_s1027"));

        let original = part.tree.find_all(paragraph, DML_WORDPROCESSING_DRAWING, "docPr")[0];
        assert_eq!(part.tree.attr(original, None, "id"), Some("1"));
    }

    #[test]
    fn test_record_keeps_duplicates() {
        let mut part = WordPart::parse("word/document.xml", PartRole::Main, DOC.as_bytes()).unwrap();
        let mut registry = UniqueIdRegistry::new();
        let body = part.body().unwrap();
        let paragraph = part.tree.children(body)[0];
        let copy = part.tree.deep_copy(paragraph);

        record_unique_ids(&mut part.tree, &[paragraph, copy], &mut registry);
        let doc_pr = part.tree.find_all(copy, DML_WORDPROCESSING_DRAWING, "docPr")[0];
        assert_eq!(part.tree.attr(doc_pr, None, "id"), Some("1"));
        assert_eq!(registry.register_id("docPr", None), Some(3));
    }

    #[test]
    fn test_named_shape_ids_survive_until_they_clash() {
        let xml = DOC.replace("_x0000_s1026", "Rectangle");
        let mut part = WordPart::parse("word/document.xml", PartRole::Main, xml.as_bytes()).unwrap();
        let mut registry = UniqueIdRegistry::new();
        let body = part.body().unwrap();
        let paragraph = part.tree.children(body)[0];

        assign_unique_ids(&mut part.tree, &[paragraph], &mut registry);
        let shape = part.tree.find_all(paragraph, VML, "shape")[0];
        assert_eq!(part.tree.attr(shape, None, "id"), Some("Rectangle"));

        let copy = part.tree.deep_copy(paragraph);
        assign_unique_ids(&mut part.tree, &[copy], &mut registry);
        let shape = part.tree.find_all(copy, VML, "shape")[0];
        assert_eq!(part.tree.attr(shape, None, "id"), Some("Rectangle1"));
    }
}
