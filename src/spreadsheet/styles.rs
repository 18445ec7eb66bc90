use crate::error::Xlsx2CsvError;
use crate::helpers::xml::XmlNodeHelper;
use crate::helpers::xml::XmlReader;
use crate::helpers::zip::ZipHelper;
use crate::match_xml_events;
use crate::spreadsheet::cell::FormatClass;
use quick_xml::events::Event;
use quick_xml::name::QName;
use std::collections::HashMap;
use std::io::BufRead;
use std::io::Read;
use std::io::Seek;
use tracing::debug;
use zip::ZipArchive;

pub(crate) const STYLES_PART: &str = "xl/styles.xml";

const TAG_CUSTOM_FORMATS: QName = QName(b"numFmts"); // Custom number formats container
const TAG_CUSTOM_FORMAT: QName = QName(b"numFmt");   // Individual custom number format
const TAG_FORMAT_INDEXES: QName = QName(b"cellXfs");  // Cell format records container
const TAG_FORMAT_INDEX: QName = QName(b"xf");         // Individual cell format record

/// Number formats of a workbook: custom format codes and the style records cells point at.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NumberFormatTable {
    /// Format id -> format code (lower-cased, backslashes removed)
    custom_formats: HashMap<String, String>,
    /// Format id per style index, empty when the record has none
    style_records: Vec<String>,
}

impl NumberFormatTable {
    pub fn new(custom_formats: HashMap<String, String>, style_records: Vec<String>) -> Self {
        Self { custom_formats, style_records }
    }

    /// Format id applied by a style index, `None` when out of range or empty.
    pub fn format_id(&self, style_index: usize) -> Option<&str> {
        self.style_records
            .get(style_index)
            .map(String::as_str)
            .filter(|id| !id.is_empty())
    }

    /// Format code of a format id, custom definitions taking precedence over built-ins.
    pub fn format_code(&self, format_id: &str) -> Option<&str> {
        self.custom_formats
            .get(format_id)
            .map(String::as_str)
            .or_else(|| FormatClass::builtin_format_code(format_id))
    }

    pub fn custom_formats(&self) -> &HashMap<String, String> {
        &self.custom_formats
    }

    pub fn style_records(&self) -> &[String] {
        &self.style_records
    }
}

/// Normalizes a format code for classification: lower case, backslash escapes dropped.
pub fn normalize_format_code(code: &str) -> String {
    code.to_lowercase().replace('\\', "")
}

/// Loads the number format table from `xl/styles.xml`; an absent part yields an empty table.
pub(crate) fn load_styles<RS: Read + Seek>(zip: &mut ZipArchive<RS>) -> Result<NumberFormatTable, Xlsx2CsvError> {
    match zip.xml_reader(STYLES_PART)? {
        Some(mut reader) => parse_styles(&mut reader),
        None => {
            debug!("No {} in archive, cells keep their raw values", STYLES_PART);
            Ok(NumberFormatTable::default())
        }
    }
}

/// Parses custom number formats and the cell format records.
///
/// Only the first `cellXfs` container is read; the `cellStyleXfs` records share the
/// `xf` tag but are never indexed by cells.
pub(crate) fn parse_styles<R: BufRead>(reader: &mut XmlReader<R>) -> Result<NumberFormatTable, Xlsx2CsvError> {
    let mut custom_formats_context = false;
    let mut custom_formats = HashMap::<String, String>::new();

    let mut has_format_indexes = false;
    let mut format_indexes_context = false;
    let mut style_records = Vec::<String>::new();

    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TAG_CUSTOM_FORMATS => custom_formats_context = true,
        Event::End(event) if event.name() == TAG_CUSTOM_FORMATS => custom_formats_context = false,
        Event::Start(event) if custom_formats_context && event.name() == TAG_CUSTOM_FORMAT => {
            let id = event.get_attribute_value("numFmtId")?;
            let code = event.get_attribute_value("formatCode")?;
            if let Some((id, code)) = id.zip(code) {
                custom_formats.insert(id.into_owned(), normalize_format_code(&code));
            }
        }

        Event::Start(event) if !has_format_indexes && event.name() == TAG_FORMAT_INDEXES => {
            has_format_indexes = true;
            format_indexes_context = true;
        }
        Event::End(event) if format_indexes_context && event.name() == TAG_FORMAT_INDEXES => {
            format_indexes_context = false;
        }
        Event::Start(event) if format_indexes_context && event.name() == TAG_FORMAT_INDEX => {
            let record = match event.get_owned_attribute_value("numFmtId")? {
                Some(id) if !id.is_empty() => id,
                _ => event.get_owned_attribute_value("applyNumberFormat")?.unwrap_or_default(),
            };
            style_records.push(record);
        }
    });

    debug!("Loaded {} custom number formats and {} cell formats", custom_formats.len(), style_records.len());
    Ok(NumberFormatTable::new(custom_formats, style_records))
}
