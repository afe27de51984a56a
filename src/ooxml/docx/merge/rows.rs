//! Table row repetition.

use crate::common::id::UniqueIdRegistry;
use crate::ooxml::docx::field::FieldKind;
use crate::ooxml::docx::merge::{MergePass, Row, Value};
use crate::ooxml::docx::options::EmptyRows;
use crate::ooxml::docx::parts::WordPart;
use crate::ooxml::docx::parts::word_part::assign_unique_ids;
use crate::ooxml::docx::wml::{PLACEHOLDER_NAME, is_w, placeholder_key, placeholders_in};
use crate::ooxml::opc::constants::namespace::WML_MAIN;
use crate::ooxml::xml::NodeId;

/// The first table row under `roots` holding a MERGEFIELD named `anchor`,
/// with its table.
pub fn find_anchor_row(part: &WordPart, roots: &[NodeId], anchor: &str) -> Option<(NodeId, NodeId)> {
    let tree = &part.tree;
    let tables = roots.iter().flat_map(|&root| tree.find_all(root, WML_MAIN, "tbl"));
    for table in tables {
        for &row in tree.children(table) {
            if !is_w(tree, row, "tr") {
                continue;
            }
            let anchored = placeholders_in(tree, &[row]).into_iter().any(|p| {
                tree.attr(p, None, PLACEHOLDER_NAME) == Some(anchor)
                    && placeholder_key(tree, p)
                        .and_then(|key| part.fields.get(key))
                        .is_some_and(|model| model.kind() == FieldKind::MergeField)
            });
            if anchored {
                return Some((table, row));
            }
        }
    }
    None
}

impl MergePass<'_> {
    /// Repeat the table row anchored on `anchor` once per entry of `rows`.
    ///
    /// Only tables under `roots` are searched. Each copy is inserted where
    /// the template row stood, in order, and merged with its own entry.
    /// Returns `false` when no such row holds the anchor.
    pub fn merge_rows(
        &mut self,
        part: &mut WordPart,
        roots: &[NodeId],
        anchor: &str,
        rows: &[Row],
        ids: &mut UniqueIdRegistry,
    ) -> bool {
        let Some((table, template)) = find_anchor_row(part, roots, anchor) else {
            return false;
        };

        if rows.is_empty() {
            match self.options.empty_rows {
                EmptyRows::KeepTemplateRow => {},
                EmptyRows::RemoveTemplateRow => part.tree.detach(template),
                EmptyRows::RemoveTable => part.tree.detach(table),
            }
            return true;
        }

        let Some(index) = part.tree.index_in_parent(template) else {
            return true;
        };
        part.tree.detach(template);

        for (offset, row) in rows.iter().enumerate() {
            let copy = part.tree.deep_copy(template);
            part.tree.insert_child(table, index + offset, copy);
            assign_unique_ids(&mut part.tree, &[copy], ids);
            self.merge_row_tables(part, &[copy], row, ids);
            self.run(part, &[copy], row);
        }
        true
    }

    /// Expand every table anchored on a [`Value::Rows`] entry of `row`
    /// under `roots`.
    pub fn merge_row_tables(
        &mut self,
        part: &mut WordPart,
        roots: &[NodeId],
        row: &Row,
        ids: &mut UniqueIdRegistry,
    ) {
        for (name, value) in row.iter() {
            if let Value::Rows(rows) = value
                && !self.merge_rows(part, roots, name, rows, ids)
            {
                log::debug!("{}: no table row holds field {:?}", part.member, name);
            }
        }
    }
}
