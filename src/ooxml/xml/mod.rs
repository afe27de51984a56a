//! Mutable XML trees for the parts the merge engine edits.
//!
//! Parts are read with `quick-xml` into an arena ([`XmlTree`]) whose nodes are
//! addressed by [`NodeId`], edited in place, and written back with the same
//! prefixes, declarations and whitespace they were read with.

pub mod error;
mod parse;
mod scope;
pub mod tree;
mod write;

pub use error::XmlError;
pub use tree::{Attribute, Declaration, Element, NodeData, NodeId, QName, XmlTree};
