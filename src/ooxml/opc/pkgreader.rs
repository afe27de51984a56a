//! Content type discovery for a serialized OPC package.
//!
//! Parses `[Content_Types].xml` and classifies package members into the
//! part roles the merge engine edits.

use crate::ooxml::opc::error::{OpcError, Result};
use crate::ooxml::opc::part::{PartRole, role_for_content_type};
use quick_xml::Reader;
use quick_xml::events::Event;
use std::collections::HashMap;

/// Content type map for looking up content types by part name or extension.
///
/// Implements the OPC content type discovery algorithm using Default and Override elements
/// from [Content_Types].xml.
#[derive(Debug, Default)]
pub struct ContentTypeMap {
    /// Maps lower-cased file extensions to default content types
    defaults: HashMap<String, String>,

    /// Maps member names (without the leading slash) to override content types
    overrides: HashMap<String, String>,
}

impl ContentTypeMap {
    /// Parse content types from [Content_Types].xml.
    pub fn from_xml(xml: &[u8]) -> Result<Self> {
        let mut map = Self::default();
        let mut reader = Reader::from_reader(xml);
        reader.config_mut().trim_text(true);

        let mut buf = Vec::new();
        let mut saw_types = false;

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => match e.local_name().as_ref() {
                    b"Types" => saw_types = true,
                    b"Default" => {
                        // <Default Extension="xml" ContentType="application/xml"/>
                        let mut extension = None;
                        let mut content_type = None;

                        for attr in e.attributes() {
                            let attr = attr?;
                            match attr.key.as_ref() {
                                b"Extension" => extension = Some(attr.unescape_value()?.to_string()),
                                b"ContentType" => {
                                    content_type = Some(attr.unescape_value()?.to_string())
                                },
                                _ => {},
                            }
                        }

                        if let (Some(ext), Some(ct)) = (extension, content_type) {
                            map.add_default(ext, ct);
                        }
                    },
                    b"Override" => {
                        // <Override PartName="/word/document.xml" ContentType="..."/>
                        let mut partname = None;
                        let mut content_type = None;

                        for attr in e.attributes() {
                            let attr = attr?;
                            match attr.key.as_ref() {
                                b"PartName" => partname = Some(attr.unescape_value()?.to_string()),
                                b"ContentType" => {
                                    content_type = Some(attr.unescape_value()?.to_string())
                                },
                                _ => {},
                            }
                        }

                        if let (Some(pn), Some(ct)) = (partname, content_type) {
                            map.add_override(&pn, ct);
                        }
                    },
                    _ => {},
                },
                Ok(Event::Eof) => break,
                Err(e) => return Err(OpcError::ContentTypes(e.to_string())),
                _ => {},
            }
            buf.clear();
        }

        if !saw_types {
            return Err(OpcError::ContentTypes("missing <Types> root element".to_string()));
        }

        Ok(map)
    }

    /// Add a default content type mapping for a file extension.
    fn add_default(&mut self, extension: String, content_type: String) {
        self.defaults.insert(extension.to_lowercase(), content_type);
    }

    /// Add an override content type mapping for a partname such as `/word/document.xml`.
    fn add_override(&mut self, partname: &str, content_type: String) {
        self.overrides
            .insert(member_name(partname).to_string(), content_type);
    }

    /// Get the content type for a ZIP member name.
    ///
    /// Overrides win, then the default for the member's extension.
    pub fn get(&self, member: &str) -> Option<&str> {
        if let Some(ct) = self.overrides.get(member) {
            return Some(ct);
        }
        // Part names are compared case-insensitively by OPC consumers
        if let Some((_, ct)) = self
            .overrides
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(member))
        {
            return Some(ct);
        }

        let ext = member.rsplit_once('.').map(|(_, ext)| ext)?;
        self.defaults.get(&ext.to_lowercase()).map(String::as_str)
    }

    /// Classify package members into part roles, keeping archive order.
    pub fn classify<'a, I>(&self, members: I) -> Vec<(String, PartRole)>
    where
        I: IntoIterator<Item = &'a str>,
    {
        members
            .into_iter()
            .filter_map(|member| {
                let role = role_for_content_type(self.get(member)?)?;
                Some((member.to_string(), role))
            })
            .collect()
    }
}

/// Strip the leading slash of a pack URI to obtain the ZIP member name.
#[inline]
pub fn member_name(partname: &str) -> &str {
    partname.strip_prefix('/').unwrap_or(partname)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONTENT_TYPES: &[u8] = br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
  <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
  <Default Extension="xml" ContentType="application/xml"/>
  <Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/>
  <Override PartName="/word/header1.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.header+xml"/>
  <Override PartName="/word/settings.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.settings+xml"/>
</Types>"#;

    #[test]
    fn test_lookup() {
        let map = ContentTypeMap::from_xml(CONTENT_TYPES).unwrap();
        assert_eq!(
            map.get("word/document.xml"),
            Some("application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml")
        );
        assert_eq!(map.get("word/styles.xml"), Some("application/xml"));
        assert_eq!(
            map.get("_rels/.rels"),
            Some("application/vnd.openxmlformats-package.relationships+xml")
        );
        assert_eq!(map.get("media/image1.png"), None);
    }

    #[test]
    fn test_classify_keeps_order() {
        let map = ContentTypeMap::from_xml(CONTENT_TYPES).unwrap();
        let members = [
            "[Content_Types].xml",
            "word/settings.xml",
            "word/styles.xml",
            "word/document.xml",
            "word/header1.xml",
        ];
        let parts = map.classify(members);
        assert_eq!(
            parts,
            vec![
                ("word/settings.xml".to_string(), PartRole::Settings),
                ("word/document.xml".to_string(), PartRole::Main),
                ("word/header1.xml".to_string(), PartRole::RelPart),
            ]
        );
    }

    #[test]
    fn test_unparseable_manifest() {
        assert!(ContentTypeMap::from_xml(b"<Types><Override </Types>").is_err());
        assert!(ContentTypeMap::from_xml(b"not xml at all").is_err());
    }
}
