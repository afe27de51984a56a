/// Settings part (`word/settings.xml`) adjustments made when writing.
///
/// A merged document must not point Word at the original data source, so
/// `w:mailMerge` is dropped. Documents with nested fields can ask Word to
/// refresh every field when opened through `w:updateFields`.
use crate::ooxml::docx::options::{MergeOptions, UpdateFields};
use crate::ooxml::docx::wml::{is_w, new_w, set_w_attr, w_attr};
use crate::ooxml::opc::constants::namespace::WML_MAIN;
use crate::ooxml::xml::{NodeId, XmlTree};

/// Children of `w:settings` that must come after `w:updateFields`, in
/// schema order.
const AFTER_UPDATE_FIELDS: &[&str] = &[
    "hdrShapeDefaults",
    "footnotePr",
    "endnotePr",
    "compat",
    "docVars",
    "rsids",
    "mathPr",
    "attachedSchema",
    "themeFontLang",
    "clrSchemeMapping",
    "doNotIncludeSubdocsInStats",
    "doNotAutoCompressPictures",
    "forceUpgrade",
    "captions",
    "readModeInkLockDown",
    "smartTagType",
    "schemaLibrary",
    "shapeDefaults",
    "doNotEmbedSmartTags",
    "decimalSymbol",
    "listSeparator",
];

/// Mutable view of a parsed settings part.
pub struct Settings<'a> {
    tree: &'a mut XmlTree,
    root: NodeId,
}

impl<'a> Settings<'a> {
    /// `None` when the part has no `w:settings` root.
    pub fn new(tree: &'a mut XmlTree) -> Option<Self> {
        let root = tree.root_element().filter(|&r| is_w(tree, r, "settings"))?;
        Some(Self { tree, root })
    }

    fn child(&self, local: &str) -> Option<NodeId> {
        self.tree.first_child_element(self.root, WML_MAIN, local)
    }

    #[inline]
    pub fn has_mail_merge(&self) -> bool {
        self.child("mailMerge").is_some()
    }

    /// Remove `w:mailMerge`. Returns whether it was present.
    pub fn remove_mail_merge(&mut self) -> bool {
        let Some(mail_merge) = self.child("mailMerge") else {
            return false;
        };
        self.tree.detach(mail_merge);
        true
    }

    pub fn update_fields_on_open(&self) -> bool {
        self.child("updateFields")
            .map(|e| matches!(w_attr(self.tree, e, "val"), None | Some("true" | "1" | "on")))
            .unwrap_or(false)
    }

    /// Set `w:updateFields w:val="true"`, adding the element in schema order.
    pub fn set_update_fields_on_open(&mut self) {
        if let Some(existing) = self.child("updateFields") {
            set_w_attr(self.tree, existing, "val", "true");
            return;
        }

        let element = new_w(self.tree, "updateFields");
        set_w_attr(self.tree, element, "val", "true");

        let successor = self
            .tree
            .children(self.root)
            .iter()
            .copied()
            .find(|&c| AFTER_UPDATE_FIELDS.iter().any(|local| is_w(self.tree, c, local)));
        match successor {
            Some(successor) => self.tree.insert_before(successor, element),
            None => self.tree.append_child(self.root, element),
        }
    }

    /// Apply the write-time adjustments selected by `options`.
    pub fn apply(&mut self, options: &MergeOptions, has_nested_fields: bool) {
        if options.remove_mail_merge_setting && self.remove_mail_merge() {
            log::debug!("removed mailMerge setting");
        }
        let update = match options.auto_update_fields_on_open {
            UpdateFields::Never => false,
            UpdateFields::Auto => has_nested_fields,
            UpdateFields::Always => true,
        };
        if update {
            self.set_update_fields_on_open();
        }
    }
}
