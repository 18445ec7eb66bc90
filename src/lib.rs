//! # Streaming xlsx to csv conversion
//!
//! Decodes the SpreadsheetML parts of an `.xlsx` archive into row records without
//! loading the whole workbook into memory.
//!
//! ## Pipeline
//!
//! - **Workbook tables**: sheet list and date system (`xl/workbook.xml`), number
//!   formats (`xl/styles.xml`) and shared strings (`xl/sharedStrings.xml`) are read once.
//! - **Worksheet stream**: the selected worksheet part is streamed through a row/cell
//!   state machine; each cell is resolved to its display string (shared string lookup,
//!   date, time and float formatting) and every finished row goes to a [`RowConsumer`].
//! - **Output**: [`CsvRowWriter`] is the stock consumer, writing one CSV record per row.
//!
//! ```no_run
//! use rusty_xlsx2csv::{Criteria, CsvOptions, CsvRowWriter, XlsxWorkbook};
//!
//! let mut workbook = XlsxWorkbook::open("book.xlsx")?;
//! let mut writer = CsvRowWriter::new(std::io::stdout(), CsvOptions::default());
//! workbook.convert(&Criteria::default(), &mut writer)?;
//! writer.flush()?;
//! # Ok::<(), rusty_xlsx2csv::Xlsx2CsvError>(())
//! ```

pub mod error;
mod helpers;
pub mod output;
pub mod spreadsheet;

pub use crate::error::Xlsx2CsvError;
pub use crate::helpers::xml::XmlError;
pub use crate::output::csv::CsvOptions;
pub use crate::output::csv::CsvRowWriter;
pub use crate::output::OutputError;
pub use crate::spreadsheet::cell::resolve;
pub use crate::spreadsheet::cell::CellResolver;
pub use crate::spreadsheet::cell::FallbackPolicy;
pub use crate::spreadsheet::cell::FormatClass;
pub use crate::spreadsheet::cell::RawCell;
pub use crate::spreadsheet::cell::ResolvedValue;
pub use crate::spreadsheet::cell::ValueOrigin;
pub use crate::spreadsheet::criteria::Criteria;
pub use crate::spreadsheet::shared_strings::SharedStrings;
pub use crate::spreadsheet::styles::NumberFormatTable;
pub use crate::spreadsheet::workbook::SheetInfo;
pub use crate::spreadsheet::workbook::WorkbookMetadata;
pub use crate::spreadsheet::worksheet::Row;
pub use crate::spreadsheet::worksheet::RowConsumer;
pub use crate::spreadsheet::xlsx::XlsxWorkbook;
pub use crate::spreadsheet::SpreadsheetError;
