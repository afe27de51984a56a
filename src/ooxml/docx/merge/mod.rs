//! The merge driver.
//!
//! A pass walks the placeholders under a set of roots in document order and
//! resolves each one against a data row:
//!
//! - `MERGEFIELD` with a value: replaced by the formatted value, either as
//!   plain runs or inside a kept field (see [`KeepFields`])
//! - `MERGEFIELD` without a value: handled by [`MissingField`]
//! - `NEXT`: removed, and the pass stops so the caller can move on to the
//!   next row
//! - `IF` and every other field: original markup restored unchanged
//!
//! Restoring a field can bring back placeholders of fields nested in its
//! instruction; those are resolved in the same pass, before anything that
//! follows the outer field.

pub mod rows;
pub mod template;
pub mod value;


pub use template::{BreakKind, SectionKind, Separator};
pub use value::{Row, Value};

use crate::ooxml::docx::field::{FieldKind, FieldModel, format_value};
use crate::ooxml::docx::options::{KeepFields, MergeOptions, MissingField};
use crate::ooxml::docx::parts::WordPart;
use crate::ooxml::docx::warning::Diagnostics;
use crate::ooxml::docx::wml::{placeholder_key, placeholders_in};
use crate::ooxml::xml::{NodeId, XmlTree};
use std::collections::VecDeque;

/// How a pass over placeholders ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    /// Every placeholder was visited
    Completed,
    /// A `NEXT` field asked for the next row; later placeholders are untouched
    NextRecord,
}

/// What resolving one placeholder did.
enum Step {
    Done,
    /// Subtrees inserted in place of the placeholder
    Expanded(Vec<NodeId>),
    Stop,
}

/// Visit the placeholders under `roots`, queueing placeholders that come
/// back with restored markup ahead of the rest.
fn walk<F>(part: &mut WordPart, roots: &[NodeId], mut resolve: F) -> PassOutcome
where
    F: FnMut(&FieldModel, &mut XmlTree, NodeId) -> Step,
{
    let WordPart { tree, fields, .. } = part;
    let mut worklist: VecDeque<NodeId> = placeholders_in(tree, roots).into();

    while let Some(placeholder) = worklist.pop_front() {
        let Some(model) = placeholder_key(tree, placeholder).and_then(|key| fields.get(key)) else {
            continue;
        };
        match resolve(model, tree, placeholder) {
            Step::Done => {},
            Step::Expanded(inserted) => {
                for found in placeholders_in(tree, &inserted).into_iter().rev() {
                    worklist.push_front(found);
                }
            },
            Step::Stop => return PassOutcome::NextRecord,
        }
    }
    PassOutcome::Completed
}

/// Shared state of the passes run by one document operation.
pub struct MergePass<'a> {
    pub options: &'a MergeOptions,
    pub diagnostics: &'a mut Diagnostics,
}

impl<'a> MergePass<'a> {
    pub fn new(options: &'a MergeOptions, diagnostics: &'a mut Diagnostics) -> Self {
        Self { options, diagnostics }
    }

    /// Resolve the placeholders under `roots` against `row`.
    pub fn run(&mut self, part: &mut WordPart, roots: &[NodeId], row: &Row) -> PassOutcome {
        let options = self.options;
        let diagnostics = &mut *self.diagnostics;

        walk(part, roots, |model, tree, placeholder| match model.kind() {
            FieldKind::Next => {
                tree.detach(placeholder);
                Step::Stop
            },
            FieldKind::If | FieldKind::Unsupported => Step::Expanded(model.restore(tree, placeholder)),
            FieldKind::MergeField => match model.merge_field_name().and_then(|name| row.get(name)) {
                // tables anchored here were expanded before the pass
                Some(Value::Rows(_)) => Step::Done,
                Some(value) => {
                    let text = format_value(value, &model.instruction.switches, diagnostics);
                    if options.keep_fields == KeepFields::All {
                        Step::Expanded(model.replace_keeping_field(tree, placeholder, &text))
                    } else {
                        model.replace_with_text(tree, placeholder, &text);
                        Step::Done
                    }
                },
                None => match options.missing_field {
                    MissingField::Skip => Step::Done,
                    MissingField::Empty => {
                        model.replace_with_text(tree, placeholder, "");
                        Step::Done
                    },
                    MissingField::KeepField => Step::Expanded(model.restore(tree, placeholder)),
                },
            },
        })
    }

    /// Resolve every placeholder left in `part` before it is written.
    ///
    /// With [`KeepFields::None`] unmerged MERGEFIELDs become empty text and
    /// `NEXT` fields are dropped; otherwise both are restored as fields.
    pub fn finish(&mut self, part: &mut WordPart, keep: KeepFields) {
        let document = part.tree.document();
        walk(part, &[document], |model, tree, placeholder| match (model.kind(), keep) {
            (FieldKind::MergeField, KeepFields::None) => {
                model.replace_with_text(tree, placeholder, "");
                Step::Done
            },
            (FieldKind::Next, KeepFields::None) => {
                tree.detach(placeholder);
                Step::Done
            },
            _ => Step::Expanded(model.restore(tree, placeholder)),
        });
    }
}
