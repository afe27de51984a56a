//! Merge configuration.
//!
//! Options can be built in code or read from YAML:
//!
//! ```rust
//! use docx_mailmerge::{KeepFields, MergeOptions};
//!
//! let options = MergeOptions::from_yaml_str("keep_fields: some\nremove_mail_merge_setting: false\n")?;
//! assert_eq!(options.keep_fields, KeepFields::Some);
//! assert!(!options.remove_mail_merge_setting);
//! # Ok::<(), docx_mailmerge::Error>(())
//! ```

use crate::common::error::{MergeError, Result};
use serde::{Deserialize, Serialize};

/// What happens to MERGEFIELDs in the written document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeepFields {
    /// Merged fields become plain text; unmerged ones are emptied
    #[default]
    None,
    /// Merged fields become plain text; unmerged ones stay fields
    Some,
    /// Every field stays a field; merged ones show their value as the result
    All,
}

/// Behaviour of `merge` for a field whose name is not in the row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingField {
    /// Leave the placeholder for a later merge or for `write`
    #[default]
    Skip,
    /// Replace with empty text
    Empty,
    /// Put the original field back
    KeepField,
}

/// When to ask Word to update fields on open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateFields {
    #[default]
    Never,
    /// Only when a field sits inside another field's instruction
    Auto,
    Always,
}

/// Behaviour of `merge_rows` with no rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyRows {
    /// Leave the table as it is
    #[default]
    KeepTemplateRow,
    /// Remove the template row, keeping the rest of the table
    RemoveTemplateRow,
    /// Remove the whole table
    RemoveTable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeOptions {
    pub keep_fields: KeepFields,
    pub missing_field: MissingField,
    pub auto_update_fields_on_open: UpdateFields,
    pub empty_rows: EmptyRows,
    /// Drop `w:mailMerge` from the settings part on write
    pub remove_mail_merge_setting: bool,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            keep_fields: KeepFields::default(),
            missing_field: MissingField::default(),
            auto_update_fields_on_open: UpdateFields::default(),
            empty_rows: EmptyRows::default(),
            remove_mail_merge_setting: true,
        }
    }
}

impl MergeOptions {
    /// Parse options from a YAML document. Absent keys keep their defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        serde_saphyr::from_str(yaml).map_err(|e| MergeError::Options(e.to_string()))
    }

    /// Serialize the options as YAML.
    pub fn to_yaml_string(&self) -> Result<String> {
        serde_saphyr::to_string(self).map_err(|e| MergeError::Options(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = MergeOptions::default();
        assert_eq!(options.keep_fields, KeepFields::None);
        assert_eq!(options.missing_field, MissingField::Skip);
        assert_eq!(options.auto_update_fields_on_open, UpdateFields::Never);
        assert_eq!(options.empty_rows, EmptyRows::KeepTemplateRow);
        assert!(options.remove_mail_merge_setting);
    }

    #[test]
    fn test_from_yaml() {
        let options = MergeOptions::from_yaml_str(
            "keep_fields: all\nmissing_field: keep_field\nauto_update_fields_on_open: auto\nempty_rows: remove_table\n",
        )
        .unwrap();
        assert_eq!(options.keep_fields, KeepFields::All);
        assert_eq!(options.missing_field, MissingField::KeepField);
        assert_eq!(options.auto_update_fields_on_open, UpdateFields::Auto);
        assert_eq!(options.empty_rows, EmptyRows::RemoveTable);
        assert!(options.remove_mail_merge_setting);
    }

    #[test]
    fn test_yaml_round_trip() {
        let options = MergeOptions {
            keep_fields: KeepFields::Some,
            remove_mail_merge_setting: false,
            ..MergeOptions::default()
        };
        let yaml = options.to_yaml_string().unwrap();
        assert_eq!(MergeOptions::from_yaml_str(&yaml).unwrap(), options);
    }

    #[test]
    fn test_bad_yaml() {
        let err = MergeOptions::from_yaml_str("keep_fields: sometimes\n").unwrap_err();
        assert!(matches!(err, MergeError::Options(_)));
    }
}
