//! Worksheet stream decoder.
//!
//! Rows are rebuilt from a flat stream of start/end/text events by an explicit state
//! machine (`Idle -> InRow -> InCell -> InValue`). Cell values are produced by an
//! injected resolver and finished rows are handed to a [`RowConsumer`], so the decoder
//! never touches shared strings or number formats itself.

use crate::error::Xlsx2CsvError;
use crate::helpers::xml::XmlNodeHelper;
use crate::helpers::xml::XmlReader;
use crate::helpers::xml::XmlTextContextHelper;
use crate::spreadsheet::cell::RawCell;
use crate::spreadsheet::reference::column_key;
use crate::spreadsheet::SpreadsheetError;
use indexmap::IndexMap;
use quick_xml::events::Event;
use quick_xml::name::QName;
use std::io::BufRead;
use std::ops::ControlFlow;
use tracing::debug;

const TAG_ROW: QName = QName(b"row");            // Row in worksheet
const TAG_CELL: QName = QName(b"c");             // Cell in worksheet
const TAG_VALUE: QName = QName(b"v");            // Cell value content
const TAG_INLINE_STRING: QName = QName(b"is");   // Inline string value
const TAG_TEXT: QName = QName(b"t");             // Text run inside inline strings

/// Column key -> resolved value, in document order.
pub type Row = IndexMap<String, String>;

/// Receives every completed row. `Break` stops decoding early, `Err` aborts it.
pub trait RowConsumer {
    fn on_row(&mut self, row: Row) -> Result<ControlFlow<()>, Xlsx2CsvError>;
}

impl<F> RowConsumer for F
where
    F: FnMut(Row) -> Result<ControlFlow<()>, Xlsx2CsvError>,
{
    fn on_row(&mut self, row: Row) -> Result<ControlFlow<()>, Xlsx2CsvError> {
        self(row)
    }
}

/// Parser-independent worksheet events.
#[derive(Clone, Debug, PartialEq)]
pub enum SheetEvent {
    RowStart { reference: Option<String> },
    CellStart { reference: Option<String>, style_index: Option<String>, type_code: Option<String> },
    ValueStart,
    Text(String),
    ValueEnd,
    CellEnd,
    RowEnd,
}

/// Row being assembled.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RowContext {
    /// The row's own `r` attribute
    pub reference: Option<String>,
    pub cells: Row,
}

/// Cell being assembled.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CellContext {
    pub reference: Option<String>,
    pub style_index: Option<String>,
    pub type_code: Option<String>,
    pub text: String,
}

impl CellContext {
    fn into_raw_cell(self) -> Option<RawCell> {
        match self.reference {
            Some(reference) if !reference.is_empty() => Some(RawCell {
                reference,
                type_code: self.type_code,
                style_index: self.style_index,
                raw_text: self.text,
            }),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub enum DecoderState {
    #[default]
    Idle,
    InRow(RowContext),
    InCell(RowContext, CellContext),
    InValue(RowContext, CellContext),
}

/// Worksheet state machine. Feed it [`SheetEvent`]s; it returns each row as it completes.
#[derive(Debug, Default)]
pub struct SheetDecoder {
    state: DecoderState,
}

impl SheetDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &DecoderState {
        &self.state
    }

    /// Applies one event.
    ///
    /// # Arguments
    /// * `event` - Next worksheet event
    /// * `resolve` - Turns a finished cell into its display value
    ///
    /// # Returns
    /// The completed row when `event` closes one
    pub fn handle<F>(&mut self, event: SheetEvent, resolve: &mut F) -> Result<Option<Row>, Xlsx2CsvError>
    where
        F: FnMut(&RawCell) -> Result<String, Xlsx2CsvError>,
    {
        let (state, row) = match (std::mem::take(&mut self.state), event) {
            (DecoderState::Idle, SheetEvent::RowStart { reference }) => {
                (DecoderState::InRow(RowContext { reference, cells: Row::new() }), None)
            }
            (DecoderState::InRow(row), SheetEvent::CellStart { reference, style_index, type_code }) => {
                let cell = CellContext { reference, style_index, type_code, text: String::new() };
                (DecoderState::InCell(row, cell), None)
            }
            (DecoderState::InCell(row, mut cell), SheetEvent::ValueStart) => {
                cell.text.clear();
                (DecoderState::InValue(row, cell), None)
            }
            (DecoderState::InValue(row, mut cell), SheetEvent::Text(text)) => {
                cell.text.push_str(&text);
                (DecoderState::InValue(row, cell), None)
            }
            (DecoderState::InValue(row, cell), SheetEvent::ValueEnd) => (DecoderState::InCell(row, cell), None),
            (DecoderState::InCell(row, cell) | DecoderState::InValue(row, cell), SheetEvent::CellEnd) => {
                (DecoderState::InRow(finish_cell(row, cell, resolve)?), None)
            }
            (DecoderState::InRow(row), SheetEvent::RowEnd) => (DecoderState::Idle, Some(row.cells)),
            (DecoderState::InCell(row, cell) | DecoderState::InValue(row, cell), SheetEvent::RowEnd) => {
                (DecoderState::Idle, Some(finish_cell(row, cell, resolve)?.cells))
            }
            (state, _) => (state, None),
        };
        self.state = state;
        Ok(row)
    }
}

/// Resolves a finished cell and stores it under its column key.
/// Cells without a reference are dropped.
fn finish_cell<F>(mut row: RowContext, cell: CellContext, resolve: &mut F) -> Result<RowContext, Xlsx2CsvError>
where
    F: FnMut(&RawCell) -> Result<String, Xlsx2CsvError>,
{
    if let Some(cell) = cell.into_raw_cell() {
        let key = column_key(&cell.reference)
            .ok_or_else(|| SpreadsheetError::CellReferenceError(cell.reference.to_owned()))?
            .to_owned();
        let value = resolve(&cell)?;
        row.cells.insert(key, value);
    }
    Ok(row)
}

/// Decodes a worksheet part, delivering every row to `consumer`.
///
/// # Arguments
/// * `reader` - XML reader over the worksheet part
/// * `resolve` - Cell value resolver
/// * `consumer` - Row consumer; decoding stops early when it breaks
///
/// # Returns
/// Number of rows delivered to the consumer
pub(crate) fn decode_worksheet<R, F, C>(reader: &mut XmlReader<R>, mut resolve: F, consumer: &mut C) -> Result<usize, Xlsx2CsvError>
where
    R: BufRead,
    F: FnMut(&RawCell) -> Result<String, Xlsx2CsvError>,
    C: RowConsumer + ?Sized,
{
    let mut decoder = SheetDecoder::new();
    let mut rows = 0usize;
    // Inside `<is>` only `<t>` content counts, not the whitespace between runs
    let mut is_inline_string = false;
    let mut is_inline_text = false;
    loop {
        let accepts_text = !is_inline_string || is_inline_text;
        let event = match reader.next()? {
            None => break,
            Some(Event::Start(event)) if event.name() == TAG_ROW => SheetEvent::RowStart {
                reference: event.get_owned_attribute_value("r")?,
            },
            Some(Event::Start(event)) if event.name() == TAG_CELL => SheetEvent::CellStart {
                reference: event.get_owned_attribute_value("r")?,
                style_index: event.get_owned_attribute_value("s")?,
                type_code: event.get_owned_attribute_value("t")?,
            },
            Some(Event::Start(event)) if event.name() == TAG_VALUE => SheetEvent::ValueStart,
            Some(Event::End(event)) if event.name() == TAG_VALUE => SheetEvent::ValueEnd,
            Some(Event::Start(event)) if event.name() == TAG_INLINE_STRING => {
                is_inline_string = true;
                SheetEvent::ValueStart
            }
            Some(Event::End(event)) if event.name() == TAG_INLINE_STRING => {
                is_inline_string = false;
                is_inline_text = false;
                SheetEvent::ValueEnd
            }
            Some(Event::Start(event)) if is_inline_string && event.name() == TAG_TEXT => {
                is_inline_text = true;
                continue;
            }
            Some(Event::End(event)) if is_inline_string && event.name() == TAG_TEXT => {
                is_inline_text = false;
                continue;
            }
            Some(Event::End(event)) if event.name() == TAG_CELL => SheetEvent::CellEnd,
            Some(Event::End(event)) if event.name() == TAG_ROW => SheetEvent::RowEnd,
            Some(Event::Text(event)) if accepts_text => {
                let mut text = String::new();
                text.push_bytes_text(&event)?;
                SheetEvent::Text(text)
            }
            Some(Event::CData(event)) if accepts_text => SheetEvent::Text(event.xml_content()?.into_owned()),
            Some(Event::GeneralRef(event)) if accepts_text => {
                let mut text = String::new();
                text.push_bytes_ref(&event)?;
                SheetEvent::Text(text)
            }
            Some(_) => continue,
        };

        if let Some(row) = decoder.handle(event, &mut resolve)? {
            rows += 1;
            if consumer.on_row(row)?.is_break() {
                debug!("Row consumer stopped decoding after {} rows", rows);
                break;
            }
        }
    }
    Ok(rows)
}
