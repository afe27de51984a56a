//! Merge fields: instruction parsing, value formatting, and the
//! placeholder model that lets fields be replaced, kept or restored.

pub mod format;
pub mod instruction;
pub mod model;
pub mod normalize;

pub use format::format_value;
pub use instruction::{FieldKind, Instruction, Switch};
pub use model::{FieldEncoding, FieldModel, FieldStore, InstrPiece, ParagraphSpan, TextKind};
pub use normalize::Normalizer;
