//! Unified error types for docx-mailmerge.
//!
//! Package and tree errors convert into [`MergeError`] so that every public
//! operation returns a single error type.

pub mod types;

// Re-exports
pub use types::{MergeError, Result};
