use crate::error::Xlsx2CsvError;
use crate::helpers::xml::XmlReader;
use crate::helpers::xml::XmlTextContextHelper;
use crate::helpers::zip::ZipHelper;
use crate::match_xml_events;
use quick_xml::events::Event;
use quick_xml::name::QName;
use std::io::BufRead;
use std::io::Read;
use std::io::Seek;
use tracing::debug;
use zip::ZipArchive;

pub(crate) const SHARED_STRINGS_PART: &str = "xl/sharedStrings.xml";

const TAG_SHARED_STRING_ITEM: QName = QName(b"si"); // Shared string table item
const TAG_TEXT: QName = QName(b"t");                // Text run content

/// Deduplicated strings of a workbook, indexed by position.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SharedStrings(Vec<String>);

impl SharedStrings {
    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl From<Vec<String>> for SharedStrings {
    fn from(strings: Vec<String>) -> Self {
        Self(strings)
    }
}

/// Loads `xl/sharedStrings.xml`. Workbooks without string cells have no such part,
/// which yields an empty table.
pub(crate) fn load_shared_strings<RS: Read + Seek>(zip: &mut ZipArchive<RS>) -> Result<SharedStrings, Xlsx2CsvError> {
    match zip.xml_reader(SHARED_STRINGS_PART)? {
        Some(mut reader) => parse_shared_strings(&mut reader),
        None => {
            debug!("No {} in archive", SHARED_STRINGS_PART);
            Ok(SharedStrings::default())
        }
    }
}

/// Streams the shared string table. Every text run of an item is concatenated into a
/// single string, phonetic runs included.
pub(crate) fn parse_shared_strings<R: BufRead>(reader: &mut XmlReader<R>) -> Result<SharedStrings, Xlsx2CsvError> {
    let mut strings = Vec::<String>::new();
    let mut is_item = false;
    let mut is_text = false;
    let mut text = String::new();
    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TAG_SHARED_STRING_ITEM => {
            is_item = true;
            text.clear();
        }
        Event::End(event) if is_item && event.name() == TAG_SHARED_STRING_ITEM => {
            is_item = false;
            strings.push(std::mem::take(&mut text));
        }
        Event::Start(event) if is_item && event.name() == TAG_TEXT => is_text = true,
        Event::End(event) if event.name() == TAG_TEXT => is_text = false,
        Event::Text(event) if is_text => text.push_bytes_text(&event)?,
        Event::CData(event) if is_text => text.push_str(&event.xml_content()?),
        Event::GeneralRef(event) if is_text => text.push_bytes_ref(&event)?,
    });
    debug!("Loaded {} shared strings", strings.len());
    Ok(SharedStrings(strings))
}
