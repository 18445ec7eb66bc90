//! ZIP archive helper utilities for Excel (.xlsx) packages
//! Provides convenient methods for accessing parts within the archive

use crate::error::Xlsx2CsvError;
use crate::helpers::xml::XmlReader;
use std::io::BufReader;
use std::io::Read;
use std::io::Seek;
use zip::read::ZipFile;
use zip::result::ZipError;
use zip::ZipArchive;

/// Buffered XML reader over a single archive part
pub(crate) type PartReader<'a, RS> = XmlReader<BufReader<ZipFile<'a, RS>>>;

/// Helper trait for ZIP archive operations with XML reader creation
pub(crate) trait ZipHelper<RS: Read + Seek> {
    /// Gets a part from the ZIP archive by name (case-insensitive, path separator agnostic).
    /// A missing part is `Ok(None)`, never an error.
    fn file(&'_ mut self, name: &str) -> Result<Option<ZipFile<'_, RS>>, Xlsx2CsvError>;

    /// Creates an XML reader for a part within the ZIP archive
    fn xml_reader(&'_ mut self, name: &str) -> Result<Option<PartReader<'_, RS>>, Xlsx2CsvError>;
}

impl<RS: Read + Seek> ZipHelper<RS> for ZipArchive<RS> {
    fn file(&'_ mut self, name: &str) -> Result<Option<ZipFile<'_, RS>>, Xlsx2CsvError> {
        let pattern = name.replace('\\', "/");
        let path = self.file_names()
            .find(|file_name| pattern.eq_ignore_ascii_case(*file_name))
            .map(|file_name| file_name.to_owned());
        match path.map(|file_name| self.by_name(&file_name)).transpose() {
            Ok(Some(file)) => Ok(Some(file)),
            Ok(None) | Err(ZipError::FileNotFound) => Ok(None),
            Err(error) => Err(error)?,
        }
    }

    fn xml_reader(&'_ mut self, name: &str) -> Result<Option<PartReader<'_, RS>>, Xlsx2CsvError> {
        let reader = self
            .file(name)?
            .map(|file| XmlReader::new(BufReader::new(file)));
        Ok(reader)
    }
}
