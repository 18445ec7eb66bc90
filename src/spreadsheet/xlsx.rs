use crate::error::ResultMessage;
use crate::error::Xlsx2CsvError;
use crate::helpers::zip::ZipHelper;
use crate::spreadsheet::cell::CellResolver;
use crate::spreadsheet::criteria::Criteria;
use crate::spreadsheet::shared_strings::load_shared_strings;
use crate::spreadsheet::shared_strings::SharedStrings;
use crate::spreadsheet::styles::load_styles;
use crate::spreadsheet::styles::NumberFormatTable;
use crate::spreadsheet::workbook::load_relationships;
use crate::spreadsheet::workbook::load_workbook;
use crate::spreadsheet::workbook::SheetInfo;
use crate::spreadsheet::workbook::WorkbookMetadata;
use crate::spreadsheet::worksheet::decode_worksheet;
use crate::spreadsheet::worksheet::Row;
use crate::spreadsheet::worksheet::RowConsumer;
use crate::spreadsheet::SpreadsheetError;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::io::Read;
use std::io::Seek;
use std::ops::ControlFlow;
use std::path::Path;
use tracing::debug;
use zip::ZipArchive;

/// An opened xlsx archive with its workbook tables loaded.
///
/// Metadata, number formats and shared strings are read once when the workbook is
/// opened; worksheets are then streamed one at a time.
pub struct XlsxWorkbook<RS: Read + Seek> {
    /// Name used in error messages
    name: String,
    zip: ZipArchive<RS>,
    metadata: WorkbookMetadata,
    number_formats: NumberFormatTable,
    shared_strings: SharedStrings,
    /// Relationship id -> worksheet part
    relationships: HashMap<String, String>,
}

impl XlsxWorkbook<BufReader<File>> {
    /// Opens an xlsx file from disk.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Xlsx2CsvError> {
        let path = path.as_ref();
        let name = path.display().to_string();
        let file = File::open(path).map_err(Xlsx2CsvError::from).with_prefix(&name)?;
        Self::from_reader(&name, BufReader::new(file))
    }
}

impl<RS: Read + Seek> XlsxWorkbook<RS> {
    /// Reads the workbook tables from an archive stream.
    ///
    /// # Arguments
    /// * `name` - Display name for error messages
    /// * `reader` - Seekable archive stream
    pub fn from_reader(name: &str, reader: RS) -> Result<Self, Xlsx2CsvError> {
        let mut zip = ZipArchive::new(reader).map_err(Xlsx2CsvError::from).with_prefix(name)?;
        let metadata = load_workbook(&mut zip).with_prefix(name)?;
        let relationships = load_relationships(&mut zip).with_prefix(name)?;
        let number_formats = load_styles(&mut zip).with_prefix(name)?;
        let shared_strings = load_shared_strings(&mut zip).with_prefix(name)?;
        debug!("Opened '{}' (1904 dates: {})", name, metadata.date_epoch_1904);
        Ok(Self {
            name: name.to_owned(),
            zip,
            metadata,
            number_formats,
            shared_strings,
            relationships,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn metadata(&self) -> &WorkbookMetadata {
        &self.metadata
    }

    pub fn sheets(&self) -> &[SheetInfo] {
        &self.metadata.sheets
    }

    pub fn number_formats(&self) -> &NumberFormatTable {
        &self.number_formats
    }

    pub fn shared_strings(&self) -> &SharedStrings {
        &self.shared_strings
    }

    /// Resolver closed over this workbook's tables.
    pub fn resolver(&self) -> CellResolver<'_> {
        CellResolver::new(&self.number_formats, &self.shared_strings, self.metadata.date_epoch_1904)
    }

    /// Picks the sheet matching the criteria.
    pub fn select_sheet(&self, criteria: &Criteria) -> Result<SheetInfo, Xlsx2CsvError> {
        if self.metadata.sheets.is_empty() {
            Err(SpreadsheetError::SpreadsheetEmptyError(self.name.to_owned()))?
        }
        criteria
            .select(&self.metadata.sheets)
            .cloned()
            .ok_or_else(|| SpreadsheetError::SheetNotFoundError(self.name.to_owned()).into())
    }

    /// Archive path of a sheet's worksheet part: its relationship target, or
    /// `xl/worksheets/sheet{index}.xml` when the workbook has no such relationship.
    pub fn worksheet_path(&self, sheet: &SheetInfo) -> String {
        sheet
            .relationship_id
            .as_ref()
            .and_then(|id| self.relationships.get(id))
            .cloned()
            .unwrap_or_else(|| format!("xl/worksheets/sheet{}.xml", sheet.index))
    }

    /// Streams one sheet into `consumer`.
    ///
    /// # Returns
    /// Number of rows delivered
    pub fn read_sheet<C>(&mut self, sheet: &SheetInfo, consumer: &mut C) -> Result<usize, Xlsx2CsvError>
    where
        C: RowConsumer + ?Sized,
    {
        let path = self.worksheet_path(sheet);
        let prefix = format!("{} [{}]", self.name, sheet.name);
        let resolver = CellResolver::new(&self.number_formats, &self.shared_strings, self.metadata.date_epoch_1904);
        let mut reader = self.zip.xml_reader(&path)
            .with_prefix(&prefix)?
            .ok_or_else(|| SpreadsheetError::FileError(path.to_owned()))
            .map_err(Xlsx2CsvError::from)
            .with_prefix(&prefix)?;
        debug!("Decoding '{}' from {}", sheet.name, path);
        decode_worksheet(&mut reader, |cell| Ok(resolver.resolve(cell)?.value), consumer).with_prefix(&prefix)
    }

    /// Selects a sheet with `criteria` and streams it into `consumer`,
    /// stopping after `criteria.rows_limit` rows.
    pub fn convert<C>(&mut self, criteria: &Criteria, consumer: &mut C) -> Result<usize, Xlsx2CsvError>
    where
        C: RowConsumer + ?Sized,
    {
        let sheet = self.select_sheet(criteria)?;
        match criteria.rows_limit {
            Some(0) => Ok(0),
            Some(limit) => {
                let mut limited = LimitedConsumer { inner: consumer, remaining: limit };
                self.read_sheet(&sheet, &mut limited)
            }
            None => self.read_sheet(&sheet, consumer),
        }
    }
}

/// Forwards at most `remaining` rows, then stops decoding.
struct LimitedConsumer<'a, C: RowConsumer + ?Sized> {
    inner: &'a mut C,
    remaining: usize,
}

impl<C: RowConsumer + ?Sized> RowConsumer for LimitedConsumer<'_, C> {
    fn on_row(&mut self, row: Row) -> Result<ControlFlow<()>, Xlsx2CsvError> {
        self.remaining = self.remaining.saturating_sub(1);
        let flow = self.inner.on_row(row)?;
        if self.remaining == 0 {
            Ok(ControlFlow::Break(()))
        } else {
            Ok(flow)
        }
    }
}
