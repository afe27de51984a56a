use crate::ooxml::opc::error::OpcError;
use crate::ooxml::xml::error::XmlError;
use thiserror::Error;

/// Main error type for merge operations.
#[derive(Error, Debug)]
pub enum MergeError {
    /// Package could not be read or written
    #[error("Package error: {0}")]
    Opc(#[from] OpcError),

    /// A part is not well-formed XML
    #[error("XML error: {0}")]
    Xml(#[from] XmlError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A complex field `begin` has no matching `end` in its part
    #[error("Unterminated field in {part}: {instruction:?}")]
    UnterminatedField { part: String, instruction: String },

    /// Unknown separator name passed to `merge_templates`
    #[error("Invalid separator: {0}")]
    InvalidSeparator(String),

    /// `merge_templates` needs at least one row
    #[error("At least one row is required")]
    EmptyRows,

    /// A configuration document could not be read
    #[error("Invalid options: {0}")]
    Options(String),

    /// The document was already written; no further merging is possible
    #[error("Document has already been written")]
    AlreadyWritten,
}

/// Result type for merge operations.
pub type Result<T> = std::result::Result<T, MergeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversions() {
        let err: MergeError = OpcError::MissingContentTypes.into();
        assert!(matches!(err, MergeError::Opc(_)));
        assert_eq!(err.to_string(), "Package error: Content types manifest is missing");

        let err = MergeError::UnterminatedField {
            part: "word/document.xml".to_string(),
            instruction: " MERGEFIELD name ".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Unterminated field in word/document.xml: \" MERGEFIELD name \""
        );
    }
}
