/// Word (.docx) mail merge.
///
/// # Architecture
///
/// The module is organized around these key types:
/// - `Document`: the opened package and the merge API
/// - `WordPart`: one parsed part and the models of its fields
/// - `FieldModel`: one field occurrence, replaced in the tree by a placeholder
/// - `MergePass`: resolution of placeholders against a data row
/// - `MergeOptions`: merge and write policies
///
/// # Example
///
/// ```rust,no_run
/// use docx_mailmerge::ooxml::docx::{Document, Separator};
/// use docx_mailmerge::{Row, Value};
///
/// let mut doc = Document::open("labels.docx")?;
/// let rows = vec![
///     Row::new().with("name", "Ada"),
///     Row::new().with("name", "Grace"),
/// ];
/// doc.merge_templates(&rows, "page_break".parse::<Separator>()?)?;
///
/// let items = vec![Row::new().with("sku", "A-1").with("qty", 2)];
/// doc.merge(&Row::new().with("sku", Value::Rows(items)))?;
/// doc.write_to_path("labels-merged.docx")?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub mod document;
pub mod field;
pub mod merge;
pub mod options;
pub mod parts;
pub mod settings;
pub mod warning;
pub mod wml;

pub use document::{Document, MergeState};
pub use field::{FieldKind, FieldModel, FieldStore};
pub use merge::{BreakKind, MergePass, PassOutcome, Row, SectionKind, Separator, Value};
pub use options::{EmptyRows, KeepFields, MergeOptions, MissingField, UpdateFields};
pub use parts::WordPart;
pub use warning::{Diagnostics, Warning};
