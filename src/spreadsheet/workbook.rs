use crate::error::Xlsx2CsvError;
use crate::helpers::xml::XmlAttributeHelper;
use crate::helpers::xml::XmlNodeHelper;
use crate::helpers::xml::XmlReader;
use crate::helpers::zip::ZipHelper;
use crate::match_xml_events;
use crate::spreadsheet::SpreadsheetError;
use quick_xml::events::Event;
use quick_xml::name::QName;
use std::borrow::Cow;
use std::collections::HashMap;
use std::io::BufRead;
use std::io::Read;
use std::io::Seek;
use tracing::debug;
use zip::ZipArchive;

pub(crate) const WORKBOOK_PART: &str = "xl/workbook.xml";
pub(crate) const WORKBOOK_RELATIONSHIPS_PART: &str = "xl/_rels/workbook.xml.rels";

const TAG_WORKBOOK_PROPERTIES: QName = QName(b"workbookPr"); // Workbook properties
const TAG_SHEET: QName = QName(b"sheet");                    // Worksheet definition
const TAG_RELATIONSHIP: &[u8] = b"Relationship";             // Package relationship

/// A sheet as listed in the workbook.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SheetInfo {
    /// Sheet name, verbatim
    pub name: String,
    /// 1-based position in the workbook, independent of `sheetId`
    pub index: usize,
    /// Relationship id (`r:id`) pointing at the worksheet part
    pub relationship_id: Option<String>,
}

/// Sheets and date system of a workbook.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WorkbookMetadata {
    pub date_epoch_1904: bool,
    pub sheets: Vec<SheetInfo>,
}

/// Loads `xl/workbook.xml`. The part is mandatory.
pub(crate) fn load_workbook<RS: Read + Seek>(zip: &mut ZipArchive<RS>) -> Result<WorkbookMetadata, Xlsx2CsvError> {
    let mut reader = zip.xml_reader(WORKBOOK_PART)?
        .ok_or_else(|| SpreadsheetError::FileError(WORKBOOK_PART.to_owned()))?;
    parse_workbook(&mut reader)
}

/// Parses the sheet list and the date system.
///
/// Only the first `workbookPr` element counts. Its absence means the 1900 system;
/// when present, any `date1904` value other than the literal `false` (a missing
/// attribute included) selects the 1904 system.
pub(crate) fn parse_workbook<R: BufRead>(reader: &mut XmlReader<R>) -> Result<WorkbookMetadata, Xlsx2CsvError> {
    let mut date_epoch_1904 = None::<bool>;
    let mut sheets = Vec::<SheetInfo>::new();
    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TAG_SHEET => {
            let mut name = None::<Cow<str>>;
            let mut relationship_id = None::<Cow<str>>;
            for result in event.attributes() {
                let attribute = result?;
                let key = attribute.key;
                if key.as_ref() == b"name" {
                    name = Some(attribute.get_value()?);
                } else if key.local_name().as_ref() == b"id" && key.prefix().is_some() {
                    relationship_id = Some(attribute.get_value()?);
                }
            }
            sheets.push(SheetInfo {
                name: name.map(Cow::into_owned).unwrap_or_default(),
                index: sheets.len() + 1,
                relationship_id: relationship_id.map(Cow::into_owned),
            });
        }
        Event::Start(event) if date_epoch_1904.is_none() && event.name() == TAG_WORKBOOK_PROPERTIES => {
            date_epoch_1904 = Some(event.get_attribute_value("date1904")?
                .map(|value| value != "false")
                .unwrap_or(true));
        }
    });
    debug!("Workbook lists {} sheets", sheets.len());
    Ok(WorkbookMetadata {
        date_epoch_1904: date_epoch_1904.unwrap_or(false),
        sheets,
    })
}

/// Loads worksheet relationships: relationship id -> archive path.
/// An absent relationships part yields an empty mapping.
pub(crate) fn load_relationships<RS: Read + Seek>(zip: &mut ZipArchive<RS>) -> Result<HashMap<String, String>, Xlsx2CsvError> {
    match zip.xml_reader(WORKBOOK_RELATIONSHIPS_PART)? {
        Some(mut reader) => parse_relationships(&mut reader),
        None => Ok(HashMap::new()),
    }
}

pub(crate) fn parse_relationships<R: BufRead>(reader: &mut XmlReader<R>) -> Result<HashMap<String, String>, Xlsx2CsvError> {
    let mut relationships: HashMap<String, String> = HashMap::new();
    match_xml_events!(reader => {
        Event::Start(event) if event.local_name().as_ref() == TAG_RELATIONSHIP => {
            let id = event.get_attribute_value("Id")?;
            let kind = event.get_attribute_value("Type")?;
            let target = event.get_attribute_value("Target")?;
            // Only worksheet relationships
            if kind.map(|it| it.ends_with("/worksheet")).unwrap_or(true) {
                if let Some((id, target)) = id.zip(target) {
                    relationships.insert(id.into_owned(), to_zip_path(&target));
                }
            }
        }
    });
    Ok(relationships)
}

/// Normalizes a relationship target to a path inside the archive.
pub(crate) fn to_zip_path(path: &str) -> String {
    if let Some(path) = path.strip_prefix('/') {
        path.to_owned()
    } else if path.starts_with("xl/") {
        path.to_owned()
    } else {
        format!("xl/{path}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(xml: &str) -> WorkbookMetadata {
        parse_workbook(&mut XmlReader::new(xml.as_bytes())).unwrap()
    }

    fn workbook(properties: &str) -> String {
        format!(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
  {properties}
  <sheets>
    <sheet name="Summary &amp; Totals" sheetId="7" r:id="rId3"/>
    <sheet name="Data" sheetId="2" r:id="rId1"/>
  </sheets>
</workbook>"#)
    }

    #[test]
    fn sheets_are_numbered_by_position() {
        let metadata = parse(&workbook(""));
        assert_eq!(metadata.sheets, vec![
            SheetInfo { name: "Summary & Totals".to_owned(), index: 1, relationship_id: Some("rId3".to_owned()) },
            SheetInfo { name: "Data".to_owned(), index: 2, relationship_id: Some("rId1".to_owned()) },
        ]);
    }

    #[test]
    fn date_system() {
        assert!(!parse(&workbook("")).date_epoch_1904);
        assert!(!parse(&workbook(r#"<workbookPr date1904="false"/>"#)).date_epoch_1904);
        assert!(parse(&workbook(r#"<workbookPr date1904="true"/>"#)).date_epoch_1904);
        assert!(parse(&workbook(r#"<workbookPr date1904="1"/>"#)).date_epoch_1904);
        assert!(parse(&workbook(r#"<workbookPr date1904="0"/>"#)).date_epoch_1904);
        assert!(parse(&workbook(r#"<workbookPr defaultThemeVersion="124226"/>"#)).date_epoch_1904);
    }

    #[test]
    fn only_first_workbook_properties_count() {
        let metadata = parse(&workbook(r#"<workbookPr date1904="false"/><workbookPr date1904="true"/>"#));
        assert!(!metadata.date_epoch_1904);
    }

    #[test]
    fn relationships_map_to_archive_paths() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>
  <Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>
  <Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="/xl/worksheets/sheet2.xml"/>
</Relationships>"#;
        let relationships = parse_relationships(&mut XmlReader::new(xml.as_bytes())).unwrap();
        assert_eq!(relationships.len(), 2);
        assert_eq!(relationships["rId1"], "xl/worksheets/sheet1.xml");
        assert_eq!(relationships["rId3"], "xl/worksheets/sheet2.xml");
    }

    #[test]
    fn zip_paths() {
        assert_eq!(to_zip_path("worksheets/sheet1.xml"), "xl/worksheets/sheet1.xml");
        assert_eq!(to_zip_path("/xl/worksheets/sheet1.xml"), "xl/worksheets/sheet1.xml");
        assert_eq!(to_zip_path("xl/worksheets/sheet1.xml"), "xl/worksheets/sheet1.xml");
    }
}
