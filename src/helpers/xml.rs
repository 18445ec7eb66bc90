//! XML parsing utilities for the SpreadsheetML parts of an xlsx archive
//! Provides a pull-reader wrapper and helper traits for attribute and text processing

use crate::error::Xlsx2CsvError;
use quick_xml::escape::resolve_xml_entity;
use quick_xml::events::attributes::Attribute;
use quick_xml::events::BytesRef;
use quick_xml::events::BytesStart;
use quick_xml::events::BytesText;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::borrow::Cow;
use std::io::BufRead;
use thiserror::Error;

/// Errors specific to XML parsing operations
#[derive(Error, Debug)]
pub enum XmlError {
    #[error("Parse entity '{0}' failed")]
    ParseEntityError(String),
}

/// XML reader wrapper configured for streaming spreadsheet parts
pub(crate) struct XmlReader<R: BufRead> {
    reader: Reader<R>,
    buffer: Vec<u8>,
}

impl<R: BufRead> XmlReader<R> {
    /// Creates a new XML reader. Empty elements are expanded into start/end pairs
    /// so `<c r="A1"/>` drives the same transitions as `<c r="A1"></c>`.
    pub(crate) fn new(buf_reader: R) -> XmlReader<R> {
        let mut reader = Reader::from_reader(buf_reader);
        let config = reader.config_mut();
        config.check_comments = false;
        config.check_end_names = true;
        config.expand_empty_elements = true;
        config.trim_text(false);

        let buffer = Vec::with_capacity(1024);
        XmlReader { reader, buffer }
    }

    /// Reads the next XML event from the reader
    pub(crate) fn next(&'_ mut self) -> Result<Option<Event<'_>>, Xlsx2CsvError> {
        self.buffer.clear();
        match self.reader.read_event_into(&mut self.buffer) {
            Ok(Event::Eof) => Ok(None),
            Ok(event) => Ok(Some(event)),
            Err(error) => Err(Xlsx2CsvError::XmlError(error)),
        }
    }
}

/// Helper trait for XML attributes providing convenient value extraction and parsing
pub(crate) trait XmlAttributeHelper<'a> {
    /// Gets the unescaped attribute value as a string
    fn get_value(&self) -> Result<Cow<'a, str>, Xlsx2CsvError>;
}

impl<'a> XmlAttributeHelper<'a> for Attribute<'a> {
    fn get_value(&self) -> Result<Cow<'a, str>, Xlsx2CsvError> {
        Ok(self.unescape_value()?)
    }
}

/// Helper trait for XML nodes providing attribute access methods
pub(crate) trait XmlNodeHelper<'a> {
    /// Gets an attribute value by name
    fn get_attribute_value(&'a self, name: &str) -> Result<Option<Cow<'a, str>>, Xlsx2CsvError>;

    /// Gets an attribute value by name as an owned string
    fn get_owned_attribute_value(&'a self, name: &str) -> Result<Option<String>, Xlsx2CsvError>;
}

impl<'a> XmlNodeHelper<'a> for BytesStart<'a> {
    fn get_attribute_value(&'a self, name: &str) -> Result<Option<Cow<'a, str>>, Xlsx2CsvError> {
        self.try_get_attribute(name)?
            .map(|attribute| attribute.get_value())
            .transpose()
    }

    fn get_owned_attribute_value(&'a self, name: &str) -> Result<Option<String>, Xlsx2CsvError> {
        Ok(self.get_attribute_value(name)?.map(Cow::into_owned))
    }
}

/// Helper trait for building text content from XML events
pub(crate) trait XmlTextContextHelper {
    /// Appends text content from BytesText event
    fn push_bytes_text(&mut self, text: &BytesText) -> Result<(), Xlsx2CsvError>;

    /// Appends text content from BytesRef event (handles entities and character references)
    fn push_bytes_ref(&mut self, bytes: &BytesRef) -> Result<(), Xlsx2CsvError>;
}

impl XmlTextContextHelper for String {
    fn push_bytes_text(&mut self, text: &BytesText) -> Result<(), Xlsx2CsvError> {
        self.push_str(&text.xml_content()?);
        Ok(())
    }

    fn push_bytes_ref(&mut self, bytes: &BytesRef) -> Result<(), Xlsx2CsvError> {
        let raw = bytes.xml_content()?;
        if let Some(number) = raw.strip_prefix('#') {
            let code = if let Some(hex) = number.strip_prefix('x') {
                u32::from_str_radix(hex, 16)?
            } else {
                number.parse::<u32>()?
            };
            if let Some(character) = char::from_u32(code) {
                self.push(character);
            }
        } else if let Some(entity) = resolve_xml_entity(&raw) {
            self.push_str(entity);
        } else {
            Err(XmlError::ParseEntityError(raw.to_string()))?;
        }

        Ok(())
    }
}

#[macro_export]
macro_rules! match_xml_events {
    ($reader:expr => { $($arms:tt)* }) => {
        while let Some(result) = $reader.next()? {
            match result {
                Event::Eof => break,
                $($arms)*
                _ => (),
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect_text(xml: &str) -> Result<String, Xlsx2CsvError> {
        let mut reader = XmlReader::new(xml.as_bytes());
        let mut text = String::new();
        match_xml_events!(reader => {
            Event::Text(event) => text.push_bytes_text(&event)?,
            Event::GeneralRef(event) => text.push_bytes_ref(&event)?,
        });
        Ok(text)
    }

    #[test]
    fn text_resolves_entities_and_character_references() {
        let text = collect_text("<t>a &amp; b &lt;&#65;&#x42;&gt;</t>").unwrap();
        assert_eq!(text, "a & b <AB>");
    }

    #[test]
    fn unknown_entity_is_an_error() {
        assert!(collect_text("<t>&nope;</t>").is_err());
    }

    #[test]
    fn attribute_helpers() -> Result<(), Xlsx2CsvError> {
        let mut reader = XmlReader::new(r#"<c r="B7" s="12" t="a&amp;b"/>"#.as_bytes());
        let mut checked = false;
        match_xml_events!(reader => {
            Event::Start(event) => {
                assert_eq!(event.get_owned_attribute_value("r").unwrap(), Some("B7".to_owned()));
                assert_eq!(event.get_attribute_value("s").unwrap().as_deref(), Some("12"));
                assert_eq!(event.get_owned_attribute_value("t").unwrap(), Some("a&b".to_owned()));
                assert_eq!(event.get_owned_attribute_value("x").unwrap(), None);
                checked = true;
            }
        });
        assert!(checked);
        Ok(())
    }

    #[test]
    fn empty_elements_are_expanded() -> Result<(), Xlsx2CsvError> {
        let mut reader = XmlReader::new("<row><c/></row>".as_bytes());
        let mut events = Vec::new();
        match_xml_events!(reader => {
            Event::Start(event) => events.push(format!("+{}", String::from_utf8_lossy(event.name().as_ref()))),
            Event::End(event) => events.push(format!("-{}", String::from_utf8_lossy(event.name().as_ref()))),
        });
        assert_eq!(events, vec!["+row", "+c", "-c", "-row"]);
        Ok(())
    }

    #[test]
    fn malformed_xml_is_an_error() {
        assert!(collect_text("<t>open</x>").is_err());
    }
}
