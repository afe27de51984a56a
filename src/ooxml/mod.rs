//! Office Open XML (OOXML) support for mail merge.
//!
//! The module is organized into layers:
//!
//! 1. **OPC Layer** (`opc`): ZIP packaging and content-type classification
//! 2. **XML Layer** (`xml`): mutable trees for the parts that are edited
//! 3. **Word Layer** (`docx`): fields, merging, and the [`docx::Document`] handle
//!
//! # Example
//!
//! ```rust,no_run
//! use docx_mailmerge::ooxml::docx::Document;
//! use docx_mailmerge::Row;
//!
//! let mut doc = Document::open("invoice.docx")?;
//! doc.merge(&Row::new().with("customer", "ACME"))?;
//! doc.write_to_path("invoice-acme.docx")?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
pub mod docx;
pub mod opc;
pub mod xml;

// Re-export commonly used types from OPC layer
pub use opc::{OpcError, PhysPkgReader, PhysPkgWriter};
pub use xml::{XmlError, XmlTree};
