//! Common types shared across the package and merge layers.

pub mod error;
pub mod id;

// Re-exports for convenience
pub use error::{MergeError, Result};
pub use id::UniqueIdRegistry;
