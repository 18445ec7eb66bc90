use crate::error::Xlsx2CsvError;
use crate::output::OutputError;
use crate::spreadsheet::worksheet::Row;
use crate::spreadsheet::worksheet::RowConsumer;
use std::io::Write;
use std::ops::ControlFlow;

/// CSV writer options
#[derive(Debug, Clone)]
pub struct CsvOptions {
    /// Field delimiter (default: ',')
    pub delimiter: u8,
    /// Write the column keys as a first line (default: false)
    pub write_header: bool,
}

impl Default for CsvOptions {
    fn default() -> Self {
        CsvOptions {
            delimiter: b',',
            write_header: false,
        }
    }
}

impl CsvOptions {
    /// Set the delimiter
    #[must_use]
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Set whether the column keys are written as a header line
    #[must_use]
    pub fn with_header(mut self, write_header: bool) -> Self {
        self.write_header = write_header;
        self
    }
}

/// Writes decoded rows as CSV records, each terminated by `\r\n`.
///
/// The key set of the first row fixes the columns. Later rows are written in that
/// column order with missing keys left empty; a key outside the schema is an error.
pub struct CsvRowWriter<W: Write> {
    writer: csv::Writer<W>,
    options: CsvOptions,
    schema: Option<Vec<String>>,
    rows: usize,
}

impl<W: Write> CsvRowWriter<W> {
    pub fn new(inner: W, options: CsvOptions) -> Self {
        let writer = csv::WriterBuilder::new()
            .delimiter(options.delimiter)
            .terminator(csv::Terminator::CRLF)
            .flexible(true)
            .from_writer(inner);
        Self { writer, options, schema: None, rows: 0 }
    }

    /// Columns fixed by the first row, if any row was written.
    pub fn schema(&self) -> Option<&[String]> {
        self.schema.as_deref()
    }

    /// Number of rows written, header excluded.
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn flush(&mut self) -> Result<(), Xlsx2CsvError> {
        self.writer.flush()?;
        Ok(())
    }

    /// Flushes and returns the underlying writer.
    pub fn into_inner(self) -> Result<W, Xlsx2CsvError> {
        self.writer
            .into_inner()
            .map_err(|error| Xlsx2CsvError::IoError(error.into_error()))
    }

    fn write_row(&mut self, row: &Row) -> Result<(), Xlsx2CsvError> {
        if self.schema.is_none() {
            let schema = row.keys().cloned().collect::<Vec<_>>();
            if self.options.write_header {
                self.writer.write_record(&schema)?;
            }
            self.schema = Some(schema);
        }
        let schema = self.schema.as_deref().unwrap_or_default();
        if let Some(key) = row.keys().find(|key| !schema.contains(key)) {
            Err(OutputError::UnexpectedColumn(key.to_owned(), schema.to_vec()))?
        }
        let record = schema
            .iter()
            .map(|key| row.get(key).map(String::as_str).unwrap_or(""));
        self.writer.write_record(record)?;
        self.rows += 1;
        Ok(())
    }
}

impl<W: Write> RowConsumer for CsvRowWriter<W> {
    fn on_row(&mut self, row: Row) -> Result<ControlFlow<()>, Xlsx2CsvError> {
        self.write_row(&row)?;
        Ok(ControlFlow::Continue(()))
    }
}
