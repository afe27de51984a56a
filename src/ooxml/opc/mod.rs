//! Open Packaging Conventions (OPC) support.
//!
//! This module covers the parts of the OPC specification the merge engine
//! needs:
//!
//! - ZIP-based physical packaging, with raw pass-through of untouched members
//! - `[Content_Types].xml` discovery
//! - Classification of word-processing parts by content type

pub mod constants;
pub mod error;
pub mod part;
pub mod phys_pkg;
pub mod pkgreader;

// Re-export commonly used types
pub use error::OpcError;
pub use part::PartRole;
pub use phys_pkg::{PhysPkgReader, PhysPkgWriter};
pub use pkgreader::ContentTypeMap;
