//! Whole-body copies, one per data row, joined by separators.

use crate::common::error::{MergeError, Result};
use crate::common::id::UniqueIdRegistry;
use crate::ooxml::docx::merge::{MergePass, PassOutcome, Row};
use crate::ooxml::docx::parts::WordPart;
use crate::ooxml::docx::parts::word_part::{assign_unique_ids, is_section_properties};
use crate::ooxml::docx::wml::{is_w, new_w, set_w_attr};
use crate::ooxml::opc::constants::namespace::WML_MAIN;
use crate::ooxml::xml::{NodeId, XmlTree};
use std::fmt;
use std::str::FromStr;

/// `w:br/@w:type` of a break separator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakKind {
    Page,
    Column,
    TextWrapping,
}

impl BreakKind {
    pub const fn to_xml(self) -> &'static str {
        match self {
            Self::Page => "page",
            Self::Column => "column",
            Self::TextWrapping => "textWrapping",
        }
    }

    fn from_xml(s: &str) -> Option<Self> {
        match s {
            "page" => Some(Self::Page),
            "column" => Some(Self::Column),
            "textWrapping" => Some(Self::TextWrapping),
            _ => None,
        }
    }
}

/// `w:type/@w:val` of a section separator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionKind {
    NextPage,
    Continuous,
    EvenPage,
    OddPage,
    NextColumn,
}

impl SectionKind {
    pub const fn to_xml(self) -> &'static str {
        match self {
            Self::NextPage => "nextPage",
            Self::Continuous => "continuous",
            Self::EvenPage => "evenPage",
            Self::OddPage => "oddPage",
            Self::NextColumn => "nextColumn",
        }
    }

    fn from_xml(s: &str) -> Option<Self> {
        match s {
            "nextPage" => Some(Self::NextPage),
            "continuous" => Some(Self::Continuous),
            "evenPage" => Some(Self::EvenPage),
            "oddPage" => Some(Self::OddPage),
            "nextColumn" => Some(Self::NextColumn),
            _ => None,
        }
    }
}

/// Markup placed between two copies of the document body.
///
/// Parsed from names such as `page_break` or `oddPage_section`:
///
/// ```rust
/// use docx_mailmerge::{BreakKind, SectionKind, Separator};
///
/// assert_eq!("page_break".parse::<Separator>()?, Separator::Break(BreakKind::Page));
/// assert_eq!(
///     Separator::from_parts("section", "oddPage")?,
///     Separator::Section(SectionKind::OddPage)
/// );
/// assert!("page".parse::<Separator>().is_err());
/// # Ok::<(), docx_mailmerge::Error>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Separator {
    /// A paragraph holding a single `w:br`
    Break(BreakKind),
    /// A paragraph closing a section, so every copy gets its own section
    Section(SectionKind),
}

impl Default for Separator {
    fn default() -> Self {
        Self::Break(BreakKind::Page)
    }
}

impl Separator {
    /// Build a separator from a kind (`break` or `section`) and a subtype.
    pub fn from_parts(kind: &str, subtype: &str) -> Result<Self> {
        let separator = match kind {
            "break" => BreakKind::from_xml(subtype).map(Self::Break),
            "section" => SectionKind::from_xml(subtype).map(Self::Section),
            _ => None,
        };
        separator.ok_or_else(|| MergeError::InvalidSeparator(format!("{}_{}", subtype, kind)))
    }

    /// Paragraph inserted before copy number `copy` (1-based for the second
    /// copy). `section` is the body's final `w:sectPr`, if any.
    fn markup(self, tree: &mut XmlTree, section: Option<NodeId>, copy: usize) -> NodeId {
        let paragraph = new_w(tree, "p");
        match self {
            Separator::Break(kind) => {
                let run = new_w(tree, "r");
                let br = new_w(tree, "br");
                set_w_attr(tree, br, "type", kind.to_xml());
                tree.append_child(run, br);
                tree.append_child(paragraph, run);
            },
            Separator::Section(kind) => {
                let props = new_w(tree, "pPr");
                let section = match section {
                    Some(section) => tree.deep_copy(section),
                    None => new_w(tree, "sectPr"),
                };
                // the first copy keeps the template's own section start
                if copy > 1 {
                    set_section_type(tree, section, kind);
                }
                tree.append_child(props, section);
                tree.append_child(paragraph, props);
            },
        }
        paragraph
    }
}

impl FromStr for Separator {
    type Err = MergeError;

    fn from_str(s: &str) -> Result<Self> {
        let (subtype, kind) = s
            .rsplit_once('_')
            .ok_or_else(|| MergeError::InvalidSeparator(s.to_string()))?;
        Self::from_parts(kind, subtype)
    }
}

impl fmt::Display for Separator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Separator::Break(kind) => write!(f, "{}_break", kind.to_xml()),
            Separator::Section(kind) => write!(f, "{}_section", kind.to_xml()),
        }
    }
}

/// Children of `w:sectPr` that precede `w:type`.
const BEFORE_SECTION_TYPE: &[&str] = &["headerReference", "footerReference", "footnotePr", "endnotePr"];

/// Set `w:type` of a `w:sectPr`, adding it in schema order when absent.
fn set_section_type(tree: &mut XmlTree, section: NodeId, kind: SectionKind) {
    if let Some(existing) = tree.first_child_element(section, WML_MAIN, "type") {
        set_w_attr(tree, existing, "val", kind.to_xml());
        return;
    }

    let element = new_w(tree, "type");
    set_w_attr(tree, element, "val", kind.to_xml());
    let index = tree
        .children(section)
        .iter()
        .position(|&c| {
            tree.element(c).is_some() && !BEFORE_SECTION_TYPE.iter().any(|local| is_w(tree, c, local))
        })
        .unwrap_or(tree.children(section).len());
    tree.insert_child(section, index, element);
}

impl MergePass<'_> {
    /// Replace the body of `part` with one merged copy of it per row.
    ///
    /// A `NEXT` field moves the current copy on to the following row; once
    /// the rows run out, remaining passes merge against an empty row. The
    /// body's final `w:sectPr` is put back after the last copy.
    pub fn merge_body_copies(
        &mut self,
        part: &mut WordPart,
        rows: &[Row],
        separator: Separator,
        ids: &mut UniqueIdRegistry,
    ) -> Result<usize> {
        if rows.is_empty() {
            return Err(MergeError::EmptyRows);
        }
        let Some(body) = part.body() else {
            log::debug!("{} has no body", part.member);
            return Ok(0);
        };

        let section = part
            .tree
            .children(body)
            .last()
            .copied()
            .filter(|&last| is_section_properties(&part.tree, last));
        if let Some(section) = section {
            part.tree.detach(section);
        }
        let template = part.tree.take_children(body);

        let empty = Row::new();
        let mut cursor = 0;
        let mut copies = 0;
        while cursor < rows.len() {
            if copies > 0 {
                let markup = separator.markup(&mut part.tree, section, copies);
                part.tree.append_child(body, markup);
            }

            let start = part.tree.children(body).len();
            for &node in &template {
                let copy = part.tree.deep_copy(node);
                part.tree.append_child(body, copy);
            }
            let roots = part.tree.children(body)[start..].to_vec();
            assign_unique_ids(&mut part.tree, &roots, ids);

            loop {
                let row = rows.get(cursor).unwrap_or(&empty);
                cursor += 1;
                let roots = part.tree.children(body)[start..].to_vec();
                self.merge_row_tables(part, &roots, row, ids);
                let roots = part.tree.children(body)[start..].to_vec();
                if self.run(part, &roots, row) == PassOutcome::Completed {
                    break;
                }
            }
            copies += 1;
        }

        if let Some(section) = section {
            if copies > 1
                && let Separator::Section(kind) = separator
            {
                set_section_type(&mut part.tree, section, kind);
            }
            part.tree.append_child(body, section);
        }
        log::debug!("{}: {} copies for {} rows", part.member, copies, rows.len());
        Ok(copies)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_names() {
        let names = [
            ("page_break", Separator::Break(BreakKind::Page)),
            ("column_break", Separator::Break(BreakKind::Column)),
            ("textWrapping_break", Separator::Break(BreakKind::TextWrapping)),
            ("nextPage_section", Separator::Section(SectionKind::NextPage)),
            ("continuous_section", Separator::Section(SectionKind::Continuous)),
            ("evenPage_section", Separator::Section(SectionKind::EvenPage)),
            ("oddPage_section", Separator::Section(SectionKind::OddPage)),
            ("nextColumn_section", Separator::Section(SectionKind::NextColumn)),
        ];
        for (name, expected) in names {
            assert_eq!(name.parse::<Separator>().unwrap(), expected);
            assert_eq!(expected.to_string(), name);
        }
        assert!(matches!("page_section".parse::<Separator>(), Err(MergeError::InvalidSeparator(_))));
        assert!(matches!("bogus".parse::<Separator>(), Err(MergeError::InvalidSeparator(_))));
        assert!(Separator::from_parts("break", "column").is_ok());
        assert!(Separator::from_parts("line", "column").is_err());
    }

    #[test]
    fn test_section_type_position() {
        let xml = r#"<w:sectPr xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:headerReference w:type="default"/><w:footnotePr/><w:pgSz w:w="12240"/></w:sectPr>"#;
        let mut tree = XmlTree::parse(xml.as_bytes()).unwrap();
        let section = tree.root_element().unwrap();
        set_section_type(&mut tree, section, SectionKind::OddPage);
        assert_eq!(
            String::from_utf8(tree.subtree_to_xml(section).unwrap()).unwrap(),
            r#"<w:sectPr xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:headerReference w:type="default"/><w:footnotePr/><w:type w:val="oddPage"/><w:pgSz w:w="12240"/></w:sectPr>"#
        );

        set_section_type(&mut tree, section, SectionKind::Continuous);
        let types = tree.find_all(section, WML_MAIN, "type");
        assert_eq!(types.len(), 1);
        assert_eq!(tree.attr(types[0], Some(WML_MAIN), "val"), Some("continuous"));
    }

    #[test]
    fn test_break_markup() {
        let mut tree = XmlTree::new();
        let root = tree.create_element(WML_MAIN, "w", "body");
        let document = tree.document();
        tree.append_child(document, root);
        let p = Separator::Break(BreakKind::Column).markup(&mut tree, None, 1);
        tree.append_child(root, p);
        let br = tree.find_all(p, WML_MAIN, "br")[0];
        assert_eq!(tree.attr(br, Some(WML_MAIN), "type"), Some("column"));
    }
}
