use thiserror::Error;

/// Main error type for the xlsx to csv converter.
/// Aggregates errors from the standard library, dependencies, and internal modules.
#[derive(Error, Debug)]
pub enum Xlsx2CsvError {
    #[error("{0}")]
    WithContextError(String),

    // Standard library errors
    #[error("{0}")]
    IoError(#[from] std::io::Error),

    #[error("{0}")]
    ParseIntError(#[from] std::num::ParseIntError),

    #[error("{0}")]
    ParseFloatError(#[from] std::num::ParseFloatError),

    #[error("{0}")]
    PatternError(#[from] glob::PatternError),

    // Third-party library errors
    #[error("{0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("{0}")]
    XmlError(#[from] quick_xml::Error),

    #[error("{0}")]
    XmlEncodingError(#[from] quick_xml::encoding::EncodingError),

    #[error("{0}")]
    XmlAttributeError(#[from] quick_xml::events::attributes::AttrError),

    #[error("{0}")]
    CsvError(#[from] csv::Error),

    // Helper module errors
    #[error("{0}")]
    XmlHelperError(#[from] crate::helpers::xml::XmlError),

    // Spreadsheet module errors
    #[error("{0}")]
    SpreadsheetError(#[from] crate::spreadsheet::SpreadsheetError),

    // Output module errors
    #[error("{0}")]
    OutputError(#[from] crate::output::OutputError),
}

pub(crate) trait ResultMessage {
    fn with_prefix(self, message: &str) -> Self;
}

impl<T> ResultMessage for Result<T, Xlsx2CsvError> {
    fn with_prefix(self, message: &str) -> Self {
        self.map_err(|e| Xlsx2CsvError::WithContextError(format!("{}: {}", message, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spreadsheet::SpreadsheetError;

    #[test]
    fn with_prefix_keeps_inner_message() {
        let result: Result<(), Xlsx2CsvError> =
            Err(SpreadsheetError::FileError("xl/workbook.xml".to_owned()).into());
        let error = result.with_prefix("Open 'book.xlsx'").unwrap_err();
        assert_eq!(
            error.to_string(),
            "Open 'book.xlsx': Missing part 'xl/workbook.xml' in archive"
        );
    }

    #[test]
    fn with_prefix_passes_ok_through() {
        let result: Result<usize, Xlsx2CsvError> = Ok(3);
        assert_eq!(result.with_prefix("ignored").unwrap(), 3);
    }
}
