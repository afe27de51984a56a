//! Reading parts into [`XmlTree`]s.

use super::error::{Result, XmlError};
use super::scope::NamespaceScopes;
use super::tree::{Attribute, Declaration, Element, NodeData, NodeId, QName, XmlTree};
use quick_xml::Reader;
use quick_xml::escape::unescape;
use quick_xml::events::{BytesStart, Event};

/// Split a raw qualified name into prefix and local part.
fn split_qname(raw: &[u8]) -> Result<(Option<String>, String)> {
    let name = std::str::from_utf8(raw)?;
    Ok(match name.split_once(':') {
        Some((prefix, local)) => (Some(prefix.to_string()), local.to_string()),
        None => (None, name.to_string()),
    })
}

impl XmlTree {
    /// Parse a part. Whitespace is kept verbatim and entity references are
    /// folded into the surrounding text.
    pub fn parse(xml: &[u8]) -> Result<Self> {
        let mut tree = XmlTree::new();
        let mut reader = Reader::from_reader(xml);
        reader.config_mut().trim_text(false);

        let mut buf = Vec::new();
        let mut stack: Vec<NodeId> = vec![tree.document()];
        let mut scopes = NamespaceScopes::default();

        loop {
            let event = reader.read_event_into(&mut buf).map_err(|e| XmlError::Parse {
                position: reader.buffer_position() as u64,
                message: e.to_string(),
            })?;
            let parent = stack.last().copied().unwrap_or_else(|| tree.document());

            match event {
                Event::Start(ref e) => {
                    let id = tree.read_element(e, &mut scopes)?;
                    tree.append_child(parent, id);
                    stack.push(id);
                },
                Event::Empty(ref e) => {
                    let id = tree.read_element(e, &mut scopes)?;
                    tree.append_child(parent, id);
                    scopes.pop();
                },
                Event::End(ref e) => {
                    if stack.len() <= 1 {
                        let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                        return Err(XmlError::UnexpectedEnd(name));
                    }
                    stack.pop();
                    scopes.pop();
                },
                Event::Text(ref t) => {
                    let raw = std::str::from_utf8(t)?;
                    let text = unescape(raw)?;
                    tree.append_text(parent, &text);
                },
                Event::GeneralRef(ref r) => {
                    let raw = std::str::from_utf8(r)?;
                    let reference = format!("&{};", raw);
                    let text = unescape(&reference)?;
                    tree.append_text(parent, &text);
                },
                Event::CData(ref c) => {
                    let text = std::str::from_utf8(c)?.to_string();
                    let id = tree.create(NodeData::CData(text));
                    tree.append_child(parent, id);
                },
                Event::Comment(ref c) => {
                    let text = std::str::from_utf8(c)?.to_string();
                    let id = tree.create(NodeData::Comment(text));
                    tree.append_child(parent, id);
                },
                Event::PI(ref p) => {
                    let text = std::str::from_utf8(p)?.to_string();
                    let id = tree.create(NodeData::Pi(text));
                    tree.append_child(parent, id);
                },
                Event::DocType(ref d) => {
                    let text = std::str::from_utf8(d)?.to_string();
                    let id = tree.create(NodeData::DocType(text));
                    tree.append_child(parent, id);
                },
                Event::Decl(ref d) => {
                    let version = std::str::from_utf8(&d.version()?)?.to_string();
                    let encoding = match d.encoding().transpose()? {
                        Some(raw) => Some(std::str::from_utf8(&raw)?.to_string()),
                        None => None,
                    };
                    let standalone = match d.standalone().transpose()? {
                        Some(raw) => Some(std::str::from_utf8(&raw)?.to_string()),
                        None => None,
                    };
                    tree.declaration = Some(Declaration {
                        version,
                        encoding,
                        standalone,
                    });
                },
                Event::Eof => break,
            }
            buf.clear();
        }

        if let Some(&open) = stack.get(1) {
            let name = tree
                .element(open)
                .map(|e| e.name.qualified())
                .unwrap_or_default();
            return Err(XmlError::UnclosedElement(name));
        }

        Ok(tree)
    }

    /// Build a detached element from a start tag, pushing its namespace frame.
    fn read_element(&mut self, start: &BytesStart<'_>, scopes: &mut NamespaceScopes) -> Result<NodeId> {
        let mut raw_attrs = Vec::new();
        let mut bindings = Vec::new();

        for attr in start.attributes() {
            let attr = attr?;
            let (prefix, local) = split_qname(attr.key.as_ref())?;
            let value = unescape(std::str::from_utf8(&attr.value)?)?.into_owned();

            match (prefix.as_deref(), local.as_str()) {
                (Some("xmlns"), name) => bindings.push((Some(name.to_string()), value.clone())),
                (None, "xmlns") => bindings.push((None, value.clone())),
                _ => {},
            }
            raw_attrs.push((prefix, local, value));
        }
        scopes.push(bindings);

        let (prefix, local) = split_qname(start.name().as_ref())?;
        let namespace = scopes.lookup(prefix.as_deref()).map(str::to_string);
        if namespace.is_none() && prefix.is_some() {
            log::debug!("unbound prefix on element {}", local);
        }

        let attrs = raw_attrs
            .into_iter()
            .map(|(prefix, local, value)| {
                let namespace = match prefix.as_deref() {
                    None | Some("xmlns") => None,
                    p => scopes.lookup(p).map(str::to_string),
                };
                Attribute {
                    name: QName {
                        prefix,
                        local,
                        namespace,
                    },
                    value,
                }
            })
            .collect();

        Ok(self.create(NodeData::Element(Element {
            name: QName {
                prefix,
                local,
                namespace,
            },
            attrs,
        })))
    }
}
