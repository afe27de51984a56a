//! Unique id bookkeeping for duplicated subtrees.
//!
//! Drawing objects and legacy shapes carry ids that must stay unique across a
//! whole document. Every id met while walking the output is registered; a
//! clash is answered with a fresh id above the largest one seen for that kind.

use std::collections::{HashMap, HashSet};

#[derive(Debug, Default)]
struct IdSet {
    seen: HashSet<u32>,
    max: u32,
    /// String ids without a numeric suffix, kept verbatim
    names: HashSet<String>,
}

impl IdSet {
    fn allocate(&mut self) -> u32 {
        let id = match self.max.checked_add(1) {
            Some(next) => {
                self.max = next;
                next
            },
            // ids run up to u32::MAX; take the lowest free one
            None => (1..=u32::MAX).find(|id| !self.seen.contains(id)).unwrap_or(0),
        };
        self.seen.insert(id);
        id
    }
}

/// Registry of ids per kind (`"docPr"`, `"_x0000_s"`, ...).
///
/// One registry lives per document, so separate documents never share state.
#[derive(Debug, Default)]
pub struct UniqueIdRegistry {
    kinds: HashMap<String, IdSet>,
}

impl UniqueIdRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `id` under `kind`.
    ///
    /// Returns `None` when the id was free and is now taken, or the
    /// replacement id when it clashes (or when no id was given).
    pub fn register_id(&mut self, kind: &str, id: Option<u32>) -> Option<u32> {
        let set = self.kinds.entry(kind.to_string()).or_default();
        match id {
            Some(id) if set.seen.insert(id) => {
                set.max = set.max.max(id);
                None
            },
            _ => Some(set.allocate()),
        }
    }

    /// Register a string id made of a prefix and a numeric suffix
    /// (`"footer2"`, `"_x0000_s1026"`), the prefix being the kind.
    ///
    /// Ids without a numeric suffix are kept verbatim until they clash.
    /// Returns the replacement string on a clash.
    pub fn register_id_str(&mut self, id: &str) -> Option<String> {
        let split = id
            .char_indices()
            .rev()
            .take_while(|(_, c)| c.is_ascii_digit())
            .last()
            .map_or(id.len(), |(i, _)| i);
        let (prefix, digits) = id.split_at(split);

        if digits.is_empty() {
            let set = self.kinds.entry(prefix.to_string()).or_default();
            if set.names.insert(id.to_string()) {
                return None;
            }
            return Some(format!("{}{}", prefix, set.allocate()));
        }

        self.register_id(prefix, digits.parse::<u32>().ok())
            .map(|new_id| format!("{}{}", prefix, new_id))
    }

    /// Forget every registered id.
    pub fn clear(&mut self) {
        self.kinds.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_sequence() {
        let mut registry = UniqueIdRegistry::new();
        assert_eq!(registry.register_id("id", Some(2)), None);
        assert_eq!(registry.register_id("id", Some(2)), Some(3));
        assert_eq!(registry.register_id("id", None), Some(4));
        assert_eq!(registry.register_id("footer", Some(1)), None);
        assert_eq!(registry.register_id("footer", None), Some(2));
        assert_eq!(registry.register_id_str("footer2"), Some("footer3".to_string()));
        assert_eq!(registry.register_id_str("header7"), None);
    }

    #[test]
    fn test_allocation_past_largest_id() {
        let mut registry = UniqueIdRegistry::new();
        assert_eq!(registry.register_id("docPr", Some(u32::MAX)), None);
        assert_eq!(registry.register_id("docPr", Some(u32::MAX)), Some(1));
        assert_eq!(registry.register_id("docPr", Some(1)), Some(2));
        assert_eq!(registry.register_id("docPr", None), Some(3));
    }

    #[test]
    fn test_string_ids() {
        let mut registry = UniqueIdRegistry::new();
        assert_eq!(registry.register_id_str("_x0000_s1026"), None);
        assert_eq!(
            registry.register_id_str("_x0000_s1026"),
            Some("_x0000_s1027".to_string())
        );
        assert_eq!(registry.register_id_str("Rectangle"), None);
        assert_eq!(registry.register_id_str("Rectangle"), Some("Rectangle1".to_string()));
        assert_eq!(registry.register_id_str("Rectangle"), Some("Rectangle2".to_string()));

        registry.clear();
        assert_eq!(registry.register_id_str("Rectangle"), None);
        assert_eq!(registry.register_id_str("_x0000_s1026"), None);
    }
}
