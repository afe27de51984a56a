/// Parsed parts of a word-processing package.
pub mod word_part;

pub use word_part::WordPart;
