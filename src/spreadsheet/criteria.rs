use crate::error::Xlsx2CsvError;
use crate::spreadsheet::workbook::SheetInfo;
use glob::Pattern;

/// Criteria for selecting the sheet to convert and how much of it.
#[derive(Clone, Debug, Default)]
pub struct Criteria {
    /// Sheet name patterns; the first sheet matching any of them is selected.
    pub sheet_name_patterns: Option<Vec<Pattern>>,

    /// 1-based position of the sheet to select.
    pub sheet_index: Option<usize>,

    /// Maximum number of rows to deliver.
    pub rows_limit: Option<usize>,
}

impl Criteria {
    /// Builds criteria from glob pattern strings.
    pub fn with_sheet_names<S: AsRef<str>>(mut self, names: &[S]) -> Result<Self, Xlsx2CsvError> {
        if names.is_empty() {
            self.sheet_name_patterns = None;
        } else {
            let patterns = names
                .iter()
                .map(|name| Pattern::new(name.as_ref()))
                .collect::<Result<Vec<_>, _>>()?;
            self.sheet_name_patterns = Some(patterns);
        }
        Ok(self)
    }

    pub fn with_sheet_index(mut self, sheet_index: Option<usize>) -> Self {
        self.sheet_index = sheet_index;
        self
    }

    pub fn with_rows_limit(mut self, rows_limit: Option<usize>) -> Self {
        self.rows_limit = rows_limit;
        self
    }

    /// Checks if a sheet matches the criteria.
    /// Returns true if neither patterns nor index are given.
    pub fn accept(&self, sheet: &SheetInfo) -> bool {
        let index_matches = self.sheet_index.map(|index| index == sheet.index).unwrap_or(true);
        let name_matches = match &self.sheet_name_patterns {
            Some(patterns) => patterns.iter().any(|pattern| pattern.matches(&sheet.name)),
            None => true,
        };
        index_matches && name_matches
    }

    /// Returns the first sheet, in workbook order, accepted by the criteria.
    pub fn select<'a>(&self, sheets: &'a [SheetInfo]) -> Option<&'a SheetInfo> {
        sheets.iter().find(|sheet| self.accept(sheet))
    }
}
