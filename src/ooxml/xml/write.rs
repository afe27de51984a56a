//! Serializing [`XmlTree`]s back into part bytes.

use super::error::Result;
use super::scope::NamespaceScopes;
use super::tree::{Element, NodeData, NodeId, QName, XmlTree};
use quick_xml::Writer;
use quick_xml::escape::partial_escape;
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesPI, BytesStart, BytesText, Event};

impl XmlTree {
    /// Serialize the document, declaration first.
    pub fn to_xml(&self) -> Result<Vec<u8>> {
        let mut writer = Writer::new(Vec::new());

        if let Some(decl) = &self.declaration {
            writer.write_event(Event::Decl(BytesDecl::new(
                &decl.version,
                decl.encoding.as_deref(),
                decl.standalone.as_deref(),
            )))?;
        }

        let mut scopes = NamespaceScopes::default();
        for &child in self.children(self.document()) {
            self.write_node(&mut writer, child, &mut scopes)?;
        }

        Ok(writer.into_inner())
    }

    /// Serialize a single subtree without a declaration.
    pub fn subtree_to_xml(&self, id: NodeId) -> Result<Vec<u8>> {
        let mut writer = Writer::new(Vec::new());
        let mut scopes = NamespaceScopes::default();
        self.write_node(&mut writer, id, &mut scopes)?;
        Ok(writer.into_inner())
    }

    fn write_node(
        &self,
        writer: &mut Writer<Vec<u8>>,
        id: NodeId,
        scopes: &mut NamespaceScopes,
    ) -> Result<()> {
        match self.data(id) {
            NodeData::Document => {
                for &child in self.children(id) {
                    self.write_node(writer, child, scopes)?;
                }
            },
            NodeData::Element(element) => self.write_element(writer, id, element, scopes)?,
            NodeData::Text(text) => {
                writer.write_event(Event::Text(BytesText::from_escaped(partial_escape(text))))?;
            },
            NodeData::CData(text) => writer.write_event(Event::CData(BytesCData::new(text.as_str())))?,
            NodeData::Comment(text) => {
                writer.write_event(Event::Comment(BytesText::from_escaped(text.as_str())))?;
            },
            NodeData::Pi(text) => writer.write_event(Event::PI(BytesPI::new(text.as_str())))?,
            NodeData::DocType(text) => {
                writer.write_event(Event::DocType(BytesText::from_escaped(text.as_str())))?;
            },
        }
        Ok(())
    }

    fn write_element(
        &self,
        writer: &mut Writer<Vec<u8>>,
        id: NodeId,
        element: &Element,
        scopes: &mut NamespaceScopes,
    ) -> Result<()> {
        let bindings = element
            .attrs
            .iter()
            .filter(|a| a.name.is_xmlns())
            .map(|a| {
                let prefix = a.name.prefix.as_ref().map(|_| a.name.local.clone());
                (prefix, a.value.clone())
            })
            .collect();
        scopes.push(bindings);

        // Declarations needed for names whose namespace is not in scope
        let mut declared = Vec::new();
        let name = bind_name(&element.name, true, scopes, &mut declared);
        let mut start = BytesStart::new(name.clone());

        for attr in &element.attrs {
            let key = bind_name(&attr.name, false, scopes, &mut declared);
            start.push_attribute((key.as_str(), attr.value.as_str()));
        }
        for (prefix, uri) in &declared {
            start.push_attribute((format!("xmlns:{}", prefix).as_str(), uri.as_str()));
        }

        let children = self.children(id);
        if children.is_empty() {
            writer.write_event(Event::Empty(start))?;
        } else {
            writer.write_event(Event::Start(start))?;
            for &child in children {
                self.write_node(writer, child, scopes)?;
            }
            writer.write_event(Event::End(BytesEnd::new(name)))?;
        }

        scopes.pop();
        Ok(())
    }
}

/// Pick the markup name for `name`, declaring its namespace when no
/// in-scope prefix maps to it.
fn bind_name(
    name: &QName,
    is_element: bool,
    scopes: &mut NamespaceScopes,
    declared: &mut Vec<(String, String)>,
) -> String {
    let Some(uri) = name.namespace.as_deref() else {
        return name.qualified();
    };

    if scopes.lookup(name.prefix.as_deref()) == Some(uri) && (is_element || name.prefix.is_some()) {
        return name.qualified();
    }
    if let Some(prefix) = scopes.prefix_of(uri, is_element) {
        return match prefix {
            Some(prefix) => format!("{}:{}", prefix, name.local),
            None => name.local.clone(),
        };
    }

    let mut prefix = name.prefix.clone().unwrap_or_else(|| "ns0".to_string());
    let mut counter = 0;
    while scopes.lookup(Some(&prefix)).is_some() {
        counter += 1;
        prefix = format!("ns{}", counter);
    }
    scopes.bind(Some(prefix.clone()), uri.to_string());
    declared.push((prefix.clone(), uri.to_string()));
    format!("{}:{}", prefix, name.local)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ooxml::opc::constants::namespace::WML_MAIN;

    const DOC: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" xmlns:mc="urn:mc" mc:Ignorable="w14"><w:body><w:p><w:r><w:t xml:space="preserve">a &lt; b &amp; "c"</w:t></w:r></w:p><!-- note --><w:sectPr/></w:body></w:document>"#;

    #[test]
    fn test_write_preserves_markup() {
        let tree = XmlTree::parse(DOC.as_bytes()).unwrap();
        let out = String::from_utf8(tree.to_xml().unwrap()).unwrap();
        assert_eq!(out, DOC);
    }

    #[test]
    fn test_created_element_reuses_prefix() {
        let mut tree = XmlTree::parse(DOC.as_bytes()).unwrap();
        let body = tree.find_all(tree.document(), WML_MAIN, "body")[0];
        let p = tree.create_element(WML_MAIN, "w", "p");
        tree.append_child(body, p);
        let x = tree.create_element("urn:other", "o", "x");
        tree.append_child(p, x);

        let out = String::from_utf8(tree.to_xml().unwrap()).unwrap();
        assert!(out.ends_with(r#"<w:sectPr/><w:p><o:x xmlns:o="urn:other"/></w:p></w:body></w:document>"#));
    }

    #[test]
    fn test_foreign_prefix_is_rebound() {
        let mut tree = XmlTree::parse(br#"<x:root xmlns:x="http://schemas.openxmlformats.org/wordprocessingml/2006/main"/>"#).unwrap();
        let root = tree.root_element().unwrap();
        let r = tree.create_element(WML_MAIN, "w", "r");
        tree.append_child(root, r);
        let out = String::from_utf8(tree.to_xml().unwrap()).unwrap();
        assert!(out.contains("<x:r/>"));
    }
}
