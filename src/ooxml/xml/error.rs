/// Error types for part parsing and serialization
use thiserror::Error;

#[derive(Error, Debug)]
pub enum XmlError {
    #[error("XML parse error at position {position}: {message}")]
    Parse { position: u64, message: String },

    #[error("Unexpected end tag: {0}")]
    UnexpectedEnd(String),

    #[error("Unclosed element: {0}")]
    UnclosedElement(String),

    #[error("Invalid escape: {0}")]
    Escape(String),

    #[error("UTF-8 conversion error: {0}")]
    Utf8Error(#[from] std::str::Utf8Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Quick-XML error: {0}")]
    QuickXmlError(#[from] quick_xml::Error),
}

impl From<quick_xml::escape::EscapeError> for XmlError {
    fn from(err: quick_xml::escape::EscapeError) -> Self {
        XmlError::Escape(err.to_string())
    }
}

impl From<quick_xml::events::attributes::AttrError> for XmlError {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        XmlError::QuickXmlError(err.into())
    }
}

pub type Result<T> = std::result::Result<T, XmlError>;
