//! Provides a general interface to a physical OPC package (ZIP file).
//!
//! This module handles the low-level reading and writing of OPC packages,
//! keeping the archive's member order so that a rewritten package lists its
//! entries exactly as the input did.

use crate::ooxml::opc::constants::CONTENT_TYPES_MEMBER;
use crate::ooxml::opc::error::{OpcError, Result};
use std::io::{Cursor, Read, Seek, Write};
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Physical package reader that owns the archive bytes for its whole lifetime.
///
/// Dropping the reader releases the archive; there is no separate close step
/// that could be skipped on an error path.
pub struct PhysPkgReader {
    /// The underlying ZIP archive
    archive: ZipArchive<Cursor<Vec<u8>>>,
    /// Member names in central directory order
    members: Vec<String>,
}

impl PhysPkgReader {
    /// Open an OPC package from a file path.
    ///
    /// # Errors
    /// Returns an error if the file doesn't exist, isn't a valid ZIP file,
    /// or cannot be read.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(OpcError::PackageNotFound(path.display().to_string()));
        }

        let data = std::fs::read(path)?;
        Self::from_bytes(data)
    }

    /// Create a reader from a reader, buffering the whole archive.
    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Self::from_bytes(data)
    }

    /// Create a reader from owned bytes.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        let mut archive = ZipArchive::new(Cursor::new(data))?;

        let mut members = Vec::with_capacity(archive.len());
        for index in 0..archive.len() {
            let entry = archive.by_index_raw(index)?;
            members.push(entry.name().to_string());
        }

        Ok(Self { archive, members })
    }

    /// Member names in archive order.
    #[inline]
    pub fn member_names(&self) -> &[String] {
        &self.members
    }

    /// Check if a specific member exists in the package.
    #[inline]
    pub fn contains(&self, member: &str) -> bool {
        self.members.iter().any(|name| name == member)
    }

    /// Decompress and return one member.
    pub fn read(&mut self, member: &str) -> Result<Vec<u8>> {
        let mut entry = match self.archive.by_name(member) {
            Ok(entry) => entry,
            Err(zip::result::ZipError::FileNotFound) => {
                return Err(OpcError::PartNotFound(member.to_string()));
            },
            Err(e) => return Err(e.into()),
        };

        let mut blob = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut blob)?;
        Ok(blob)
    }

    /// Get the [Content_Types].xml content.
    ///
    /// This is a required part of every OPC package that maps parts to content types.
    pub fn content_types_xml(&mut self) -> Result<Vec<u8>> {
        match self.read(CONTENT_TYPES_MEMBER) {
            Err(OpcError::PartNotFound(_)) => Err(OpcError::MissingContentTypes),
            other => other,
        }
    }

    /// Copy the member at `index` into `writer` without recompressing it.
    pub fn raw_copy_into<W: Write + Seek>(
        &mut self,
        index: usize,
        writer: &mut PhysPkgWriter<W>,
    ) -> Result<()> {
        let entry = self.archive.by_index_raw(index)?;
        writer.archive.raw_copy_file(entry)?;
        Ok(())
    }
}

impl std::fmt::Debug for PhysPkgReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhysPkgReader")
            .field("member_count", &self.members.len())
            .finish()
    }
}

/// Physical package writer for creating OPC packages.
pub struct PhysPkgWriter<W: Write + Seek> {
    /// The underlying ZIP archive writer
    archive: ZipWriter<W>,
}

impl<W: Write + Seek> PhysPkgWriter<W> {
    /// Create a new package writer over `writer`.
    pub fn new(writer: W) -> Self {
        Self {
            archive: ZipWriter::new(writer),
        }
    }

    /// Write a member with Deflate compression.
    pub fn write(&mut self, member: &str, blob: &[u8]) -> Result<()> {
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        self.archive.start_file(member, options)?;
        self.archive.write_all(blob)?;
        Ok(())
    }

    /// Finish writing and return the underlying writer.
    pub fn finish(self) -> Result<W> {
        Ok(self.archive.finish()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(members: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = PhysPkgWriter::new(Cursor::new(Vec::new()));
        for (name, blob) in members {
            writer.write(name, blob).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_round_trip() {
        let data = build(&[("test.txt", b"Hello, World!")]);
        let mut reader = PhysPkgReader::from_bytes(data).unwrap();
        assert_eq!(reader.read("test.txt").unwrap(), b"Hello, World!");
        assert!(matches!(reader.read("missing.txt"), Err(OpcError::PartNotFound(_))));
    }

    #[test]
    fn test_member_order_and_raw_copy() {
        let data = build(&[
            ("[Content_Types].xml", b"<Types/>"),
            ("word/document.xml", b"<document/>"),
            ("_rels/.rels", b"<Relationships/>"),
        ]);
        let mut reader = PhysPkgReader::from_bytes(data).unwrap();
        assert_eq!(
            reader.member_names(),
            &["[Content_Types].xml", "word/document.xml", "_rels/.rels"]
        );
        assert!(reader.contains("_rels/.rels"));
        assert_eq!(reader.content_types_xml().unwrap(), b"<Types/>");

        let mut writer = PhysPkgWriter::new(Cursor::new(Vec::new()));
        for index in 0..reader.member_names().len() {
            reader.raw_copy_into(index, &mut writer).unwrap();
        }
        let copied = writer.finish().unwrap().into_inner();
        let mut again = PhysPkgReader::from_bytes(copied).unwrap();
        assert_eq!(again.member_names(), reader.member_names());
        assert_eq!(again.read("word/document.xml").unwrap(), b"<document/>");
    }

    #[test]
    fn test_missing_content_types() {
        let data = build(&[("word/document.xml", b"<document/>")]);
        let mut reader = PhysPkgReader::from_bytes(data).unwrap();
        assert!(matches!(
            reader.content_types_xml(),
            Err(OpcError::MissingContentTypes)
        ));
    }

    #[test]
    fn test_not_a_zip() {
        assert!(PhysPkgReader::from_bytes(b"definitely not a zip".to_vec()).is_err());
    }
}
