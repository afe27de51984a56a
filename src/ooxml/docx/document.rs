/// Document - the mail merge handle over one word-processing package.
use crate::common::error::{MergeError, Result};
use crate::common::id::UniqueIdRegistry;
use crate::ooxml::docx::merge::{MergePass, PassOutcome, Row, Separator, Value};
use crate::ooxml::docx::options::{KeepFields, MergeOptions};
use crate::ooxml::docx::parts::WordPart;
use crate::ooxml::docx::parts::word_part::record_unique_ids;
use crate::ooxml::docx::settings::Settings;
use crate::ooxml::docx::warning::{Diagnostics, Warning};
use crate::ooxml::opc::{ContentTypeMap, PartRole, PhysPkgReader, PhysPkgWriter};
use std::collections::BTreeSet;
use std::io::{Read, Seek, Write};
use std::path::Path;

/// Progress of a document through merging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeState {
    NotStarted,
    /// At least one row was merged; `row_index` is the last one
    Merging { row_index: usize },
    /// Written; no further merging is possible
    Done,
}

/// A word-processing document opened for mail merge.
///
/// Every part whose content type is known (main document, headers, footers,
/// footnotes, endnotes, settings) is parsed when the document is opened and
/// its fields are replaced with placeholders. Merging edits those trees in
/// place; [`Document::write`] resolves what is left and writes a new package
/// holding every other member byte for byte.
///
/// # Examples
///
/// ```rust,no_run
/// use docx_mailmerge::{Document, Row};
///
/// let mut doc = Document::open("letter.docx")?;
/// println!("fields: {:?}", doc.get_merge_field_names());
///
/// doc.merge(&Row::new().with("first_name", "Ada").with("city", "London"))?;
/// doc.write_to_path("letter-ada.docx")?;
/// # Ok::<(), docx_mailmerge::Error>(())
/// ```
#[derive(Debug)]
pub struct Document {
    /// Open archive; taken when the document is written
    reader: Option<PhysPkgReader>,
    /// Classified parts, in archive order
    parts: Vec<WordPart>,
    options: MergeOptions,
    diagnostics: Diagnostics,
    ids: UniqueIdRegistry,
    state: MergeState,
}

impl Document {
    /// Open a package from a file path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load(PhysPkgReader::open(path)?)
    }

    /// Open a package from any reader.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        Self::load(PhysPkgReader::from_reader(reader)?)
    }

    /// Open a package held in memory.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        Self::load(PhysPkgReader::from_bytes(data)?)
    }

    /// Replace the merge options.
    pub fn with_options(mut self, options: MergeOptions) -> Self {
        self.options = options;
        self
    }

    /// Parse and normalize every classified part. Any failure drops the
    /// reader, closing the archive.
    fn load(mut reader: PhysPkgReader) -> Result<Self> {
        let manifest = ContentTypeMap::from_xml(&reader.content_types_xml()?)?;
        let classified = manifest.classify(reader.member_names().iter().map(String::as_str));

        let mut parts = Vec::with_capacity(classified.len());
        for (member, role) in classified {
            let blob = reader.read(&member)?;
            parts.push(WordPart::parse(member, role, &blob)?);
        }

        let mut diagnostics = Diagnostics::new();
        let mut next_key = 0;
        for part in parts.iter_mut().filter(|p| p.has_fields()) {
            part.normalize(&mut next_key, &mut diagnostics)?;
        }

        let mut ids = UniqueIdRegistry::new();
        for part in &mut parts {
            let document = part.tree.document();
            record_unique_ids(&mut part.tree, &[document], &mut ids);
        }

        log::debug!("opened package: {} parts, {} fields", parts.len(), next_key);
        Ok(Self {
            reader: Some(reader),
            parts,
            options: MergeOptions::default(),
            diagnostics,
            ids,
            state: MergeState::NotStarted,
        })
    }

    #[inline]
    pub fn options(&self) -> &MergeOptions {
        &self.options
    }

    #[inline]
    pub fn state(&self) -> MergeState {
        self.state
    }

    /// Warnings collected so far.
    #[inline]
    pub fn warnings(&self) -> &[Warning] {
        self.diagnostics.warnings()
    }

    /// Names of the MERGEFIELDs still waiting for data, across all parts.
    pub fn get_merge_field_names(&self) -> BTreeSet<String> {
        let mut names = Vec::new();
        for part in self.parts.iter().filter(|p| p.has_fields()) {
            part.merge_field_names(&mut names);
        }
        names.into_iter().collect()
    }

    /// Instruction text of each top-level field not yet resolved.
    ///
    /// Fields nested in an instruction appear as `{key}` unless `recursive`
    /// is set, in which case their own instruction text is spliced in.
    pub fn field_instructions(&self, recursive: bool) -> Vec<String> {
        self.parts
            .iter()
            .filter(|p| p.has_fields())
            .flat_map(|p| p.field_instructions(recursive))
            .collect()
    }

    fn ensure_open(&self) -> Result<()> {
        match self.state {
            MergeState::Done => Err(MergeError::AlreadyWritten),
            _ => Ok(()),
        }
    }

    fn advance(&mut self, rows: usize) {
        let row_index = match self.state {
            MergeState::Merging { row_index } => row_index + rows,
            _ => rows.saturating_sub(1),
        };
        self.state = MergeState::Merging { row_index };
    }

    /// Merge one row into every part.
    ///
    /// Entries holding [`Value::Rows`] first repeat the table row anchored
    /// on their name. A `NEXT` field stops the merge of the part it sits in.
    pub fn merge(&mut self, row: &Row) -> Result<()> {
        self.ensure_open()?;
        let mut pass = MergePass::new(&self.options, &mut self.diagnostics);

        for (name, value) in row.iter() {
            if let Value::Rows(rows) = value {
                let found = self.parts.iter_mut().filter(|p| p.has_fields()).any(|part| {
                    let document = part.tree.document();
                    pass.merge_rows(part, &[document], name, rows, &mut self.ids)
                });
                if !found {
                    log::debug!("no table row holds field {:?}", name);
                }
            }
        }

        for part in self.parts.iter_mut().filter(|p| p.has_fields()) {
            let document = part.tree.document();
            if pass.run(part, &[document], row) == PassOutcome::NextRecord {
                log::debug!("{}: NEXT field ended the merge of this part", part.member);
            }
        }

        self.advance(1);
        Ok(())
    }

    /// Repeat the table row holding the MERGEFIELD `anchor` once per row.
    ///
    /// Nothing happens when no table row holds the field. An empty `rows`
    /// is handled by [`MergeOptions::empty_rows`].
    pub fn merge_rows(&mut self, anchor: &str, rows: &[Row]) -> Result<()> {
        self.ensure_open()?;
        let mut pass = MergePass::new(&self.options, &mut self.diagnostics);
        let found = self.parts.iter_mut().filter(|p| p.has_fields()).any(|part| {
            let document = part.tree.document();
            pass.merge_rows(part, &[document], anchor, rows, &mut self.ids)
        });
        if !found {
            log::debug!("no table row holds field {:?}", anchor);
        }
        Ok(())
    }

    /// Build one copy of the document body per row, joined by `separator`.
    ///
    /// [`Value::Rows`] entries repeat their anchored table row inside the
    /// copy they are merged into. Headers, footers and notes are merged once
    /// with the first row.
    pub fn merge_templates(&mut self, rows: &[Row], separator: Separator) -> Result<()> {
        self.ensure_open()?;
        let Some(first) = rows.first() else {
            return Err(MergeError::EmptyRows);
        };

        self.ids.clear();
        for part in self.parts.iter_mut().filter(|p| p.role != PartRole::Main) {
            let document = part.tree.document();
            record_unique_ids(&mut part.tree, &[document], &mut self.ids);
        }

        let mut pass = MergePass::new(&self.options, &mut self.diagnostics);
        for part in self.parts.iter_mut().filter(|p| p.role == PartRole::Main) {
            pass.merge_body_copies(part, rows, separator, &mut self.ids)?;
        }
        for part in self
            .parts
            .iter_mut()
            .filter(|p| p.has_fields() && p.role != PartRole::Main)
        {
            let document = part.tree.document();
            pass.run(part, &[document], first);
        }

        self.advance(rows.len());
        Ok(())
    }

    /// Write the merged package using the configured [`KeepFields`] policy.
    pub fn write<W: Write + Seek>(&mut self, writer: W) -> Result<W> {
        let keep = self.options.keep_fields;
        self.write_with_policy(writer, keep)
    }

    /// Write the merged package, resolving leftover fields with `keep`.
    ///
    /// The document cannot be merged or written again afterwards.
    pub fn write_with_policy<W: Write + Seek>(&mut self, writer: W, keep: KeepFields) -> Result<W> {
        let mut reader = self.reader.take().ok_or(MergeError::AlreadyWritten)?;
        self.state = MergeState::Done;

        let has_nested = self.parts.iter().any(|p| p.fields.has_nested());
        let mut pass = MergePass::new(&self.options, &mut self.diagnostics);
        for part in self.parts.iter_mut() {
            match part.role {
                PartRole::Settings => {
                    if let Some(mut settings) = Settings::new(&mut part.tree) {
                        settings.apply(pass.options, has_nested);
                    }
                },
                _ => pass.finish(part, keep),
            }
        }

        let mut package = PhysPkgWriter::new(writer);
        let members = reader.member_names().to_vec();
        for (index, member) in members.iter().enumerate() {
            match self.parts.iter().find(|p| &p.member == member) {
                Some(part) => package.write(member, &part.to_xml()?)?,
                None => reader.raw_copy_into(index, &mut package)?,
            }
        }
        Ok(package.finish()?)
    }

    /// Write the merged package to `path`.
    pub fn write_to_path<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let file = std::fs::File::create(path)?;
        self.write(file)?;
        Ok(())
    }

    /// Release the package without writing it.
    pub fn close(self) {
        log::debug!("closing document in state {:?}", self.state);
    }
}
