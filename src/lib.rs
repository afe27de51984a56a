//! docx-mailmerge - mail merge for Word (.docx) documents
//!
//! This library fills MERGEFIELDs in Office Open XML word-processing
//! packages with caller-supplied values and writes a new package that Word
//! opens without complaint.
//!
//! # Features
//!
//! - **Both field encodings**: simple (`w:fldSimple`) and complex
//!   (`w:fldChar` begin/separate/end) fields, including fields nested in
//!   other fields' instructions
//! - **Field switches**: `\b`, `\f`, `\#` number pictures, `\@` date
//!   pictures and `\*` text case
//! - **Table rows**: repeat a table row once per record
//! - **Template copies**: one copy of the body per record, joined by page,
//!   column or section breaks, with drawing ids kept unique
//! - **`NEXT` fields**: several records per copy
//! - **Pass-through**: members that are not edited are copied byte for byte
//!
//! # Example - Merging a letter
//!
//! ```no_run
//! use docx_mailmerge::{Document, Row};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut doc = Document::open("letter.docx")?;
//! for name in doc.get_merge_field_names() {
//!     println!("Field: {}", name);
//! }
//!
//! doc.merge(&Row::new().with("first_name", "Ada").with("balance", 12.5))?;
//! doc.write_to_path("letter-ada.docx")?;
//! # Ok(())
//! # }
//! ```
//!
//! # Example - One copy per record
//!
//! ```no_run
//! use docx_mailmerge::{Document, MergeOptions, Row, Separator};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let options = MergeOptions::from_yaml_str("keep_fields: some\n")?;
//! let mut doc = Document::open("badge.docx")?.with_options(options);
//!
//! let rows: Vec<Row> = ["Ada", "Grace", "Edsger"]
//!     .into_iter()
//!     .map(|name| Row::new().with("name", name))
//!     .collect();
//! doc.merge_templates(&rows, Separator::from_parts("section", "nextPage")?)?;
//! doc.write_to_path("badges.docx")?;
//! # Ok(())
//! # }
//! ```

/// Error type and unique-id bookkeeping shared by every layer
pub mod common;

/// OOXML packaging, XML trees and the Word merge engine
pub mod ooxml;

// Re-export commonly used types for convenience
pub use common::error::{MergeError as Error, Result};
pub use ooxml::docx::{
    BreakKind, Document, EmptyRows, KeepFields, MergeOptions, MergeState, MissingField, Row,
    SectionKind, Separator, UpdateFields, Value, Warning,
};
