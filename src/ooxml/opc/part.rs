//! Part roles for the word-processing parts the merge engine edits.
//!
//! Only parts whose content type appears in [`PART_ROLES`] are parsed into
//! trees; every other package member is copied through untouched.

use phf::phf_map;

/// Role of a classified part inside a word-processing package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PartRole {
    /// The main document body (`word/document.xml`)
    Main,
    /// A header or footer part
    RelPart,
    /// Footnotes or endnotes
    Notes,
    /// Document settings (`word/settings.xml`)
    Settings,
}

impl PartRole {
    /// Whether fields inside parts of this role take part in merging.
    #[inline]
    pub const fn has_fields(self) -> bool {
        !matches!(self, Self::Settings)
    }
}

/// Content type to role lookup table.
pub static PART_ROLES: phf::Map<&'static str, PartRole> = phf_map! {
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml" => PartRole::Main,
    "application/vnd.openxmlformats-officedocument.wordprocessingml.template.main+xml" => PartRole::Main,
    "application/vnd.ms-word.document.macroEnabled.main+xml" => PartRole::Main,
    "application/vnd.ms-word.template.macroEnabledTemplate.main+xml" => PartRole::Main,
    "application/vnd.openxmlformats-officedocument.wordprocessingml.header+xml" => PartRole::RelPart,
    "application/vnd.openxmlformats-officedocument.wordprocessingml.footer+xml" => PartRole::RelPart,
    "application/vnd.openxmlformats-officedocument.wordprocessingml.footnotes+xml" => PartRole::Notes,
    "application/vnd.openxmlformats-officedocument.wordprocessingml.endnotes+xml" => PartRole::Notes,
    "application/vnd.openxmlformats-officedocument.wordprocessingml.settings+xml" => PartRole::Settings,
};

/// Look up the role of a part by its content type.
#[inline]
pub fn role_for_content_type(content_type: &str) -> Option<PartRole> {
    PART_ROLES.get(content_type).copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ooxml::opc::constants::content_type as ct;

    #[test]
    fn test_roles() {
        assert_eq!(role_for_content_type(ct::WML_DOCUMENT_MAIN), Some(PartRole::Main));
        assert_eq!(role_for_content_type(ct::WML_TEMPLATE_MACRO_MAIN), Some(PartRole::Main));
        assert_eq!(role_for_content_type(ct::WML_HEADER), Some(PartRole::RelPart));
        assert_eq!(role_for_content_type(ct::WML_FOOTER), Some(PartRole::RelPart));
        assert_eq!(role_for_content_type(ct::WML_ENDNOTES), Some(PartRole::Notes));
        assert_eq!(role_for_content_type(ct::WML_SETTINGS), Some(PartRole::Settings));
        assert_eq!(role_for_content_type(ct::OPC_RELATIONSHIPS), None);
        assert!(!PartRole::Settings.has_fields());
        assert!(PartRole::Notes.has_fields());
    }
}
