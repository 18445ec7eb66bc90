//! # Spreadsheet Decoding
//!
//! Streaming decoder for xlsx workbooks: the workbook, style and shared string tables
//! are loaded first, then one worksheet is streamed row by row with every cell
//! resolved against those tables.
use crate::spreadsheet::cell::FormatClass;
use thiserror::Error;

pub mod cell;
pub mod criteria;
pub mod reference;
pub mod shared_strings;
pub mod styles;
pub mod workbook;
pub mod worksheet;
pub mod xlsx;

/// Errors raised while decoding a workbook. All of them abort the conversion.
#[derive(Error, Debug)]
pub enum SpreadsheetError {
    #[error("Missing part '{0}' in archive")]
    FileError(String),

    #[error("Spreadsheet '{0}' contains no sheets")]
    SpreadsheetEmptyError(String),

    #[error("No sheet in '{0}' matches the selection")]
    SheetNotFoundError(String),

    #[error("Invalid cell reference '{0}'")]
    CellReferenceError(String),

    #[error("Shared string index '{1}' at {0} is out of range")]
    SharedStringIndexError(String, String),

    #[error("Invalid style index '{1}' at {0}")]
    StyleIndexError(String, String),

    #[error("Cannot convert '{0}' to {1}")]
    CellValueError(String, FormatClass),
}
