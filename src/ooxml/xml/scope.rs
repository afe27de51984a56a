//! In-scope namespace bindings while reading or writing a tree.

use crate::ooxml::opc::constants::namespace;

#[derive(Debug, Default)]
pub(crate) struct NamespaceScopes {
    frames: Vec<Vec<(Option<String>, String)>>,
}

impl NamespaceScopes {
    pub(crate) fn push(&mut self, bindings: Vec<(Option<String>, String)>) {
        self.frames.push(bindings);
    }

    pub(crate) fn pop(&mut self) {
        self.frames.pop();
    }

    /// Bind `prefix` in the innermost frame.
    pub(crate) fn bind(&mut self, prefix: Option<String>, uri: String) {
        if let Some(frame) = self.frames.last_mut() {
            frame.push((prefix, uri));
        } else {
            self.frames.push(vec![(prefix, uri)]);
        }
    }

    /// Namespace URI bound to `prefix`. An empty default declaration unbinds.
    pub(crate) fn lookup(&self, prefix: Option<&str>) -> Option<&str> {
        if prefix == Some("xml") {
            return Some(namespace::XML);
        }
        self.frames
            .iter()
            .rev()
            .flat_map(|frame| frame.iter().rev())
            .find(|(p, _)| p.as_deref() == prefix)
            .map(|(_, uri)| uri.as_str())
            .filter(|uri| !uri.is_empty())
    }

    /// A prefix currently bound to `uri`, skipping shadowed bindings.
    ///
    /// With `allow_default` unset, only named prefixes qualify (attributes
    /// never take the default namespace).
    pub(crate) fn prefix_of(&self, uri: &str, allow_default: bool) -> Option<Option<&str>> {
        if uri == namespace::XML {
            return Some(Some("xml"));
        }
        self.frames
            .iter()
            .rev()
            .flat_map(|frame| frame.iter().rev())
            .filter(|(p, u)| u == uri && (allow_default || p.is_some()))
            .map(|(p, _)| p.as_deref())
            .find(|&p| self.lookup(p) == Some(uri))
    }
}
