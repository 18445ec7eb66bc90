use crate::error::Xlsx2CsvError;
use crate::spreadsheet::shared_strings::SharedStrings;
use crate::spreadsheet::styles::NumberFormatTable;
use crate::spreadsheet::SpreadsheetError;
use chrono::Duration;
use chrono::NaiveDate;
use regex::Regex;
use std::fmt::Display;
use std::sync::LazyLock;
use tracing::warn;

/// Unsigned decimal number, the only raw text the date heuristics accept.
static NUMERIC_TEXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]+(\.[0-9]+)?$").expect("Hardcode regex pattern"));

/// A cell as read from the worksheet, before any table lookup.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawCell {
    /// Cell address, e.g. `B7`
    pub reference: String,
    /// Value of the `t` attribute (`s` shared string, `e` error, ...)
    pub type_code: Option<String>,
    /// Value of the `s` attribute, an index into the style records
    pub style_index: Option<String>,
    /// Accumulated text of the value element
    pub raw_text: String,
}

/// Semantic interpretation of a numeric cell, derived from its format code.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FormatClass {
    Date,
    Time,
    Float,
    Plain,
}

impl FormatClass {
    /// Looks up a format code in the table of known codes.
    /// Codes are expected lower-cased with backslash escapes removed.
    pub fn from_known_code(code: &str) -> Option<Self> {
        match code {
            "dd-mmm-yyyy" | "yy-mm-dd" | "d-mmm-yyyy" | "m/d/yy h:m" | "d-mmm" | "mm-dd-yy"
            | "dd\"-\"mm\"-\"yyyy\" \"hh:mm:ss" | "d-mmm-yy" | "mmm-yy" => Some(Self::Date),
            "hh:mm:ss" | "h:mm:ss" | "h:mm" | "hh:mm" | "mm:ss" | "[h]:mm:ss" | "h:mm am/pm"
            | "h:mm:ss am/pm" => Some(Self::Time),
            "0.0" | "0.00" | "0.000" | "0.0000" | "0.00000" => Some(Self::Float),
            "general" | "@" | "0" | "#,##0" | "#,##0.00" | "0%" | "0.00%" | "0.00e+00"
            | "# ?/?" | "# ??/??" | "##0.0e+0" | "mmss.0" | "#,##0 ;(#,##0)"
            | "#,##0 ;[red](#,##0)" | "#,##0.00;(#,##0.00)" | "#,##0.00;[red](#,##0.00)" => Some(Self::Plain),
            _ => None,
        }
    }

    /// Returns the built-in format code of a standard number format id.
    pub fn builtin_format_code(id: &str) -> Option<&'static str> {
        match id {
            "0" => Some("general"),
            "1" => Some("0"),
            "2" => Some("0.00"),
            "3" => Some("#,##0"),
            "4" => Some("#,##0.00"),
            "9" => Some("0%"),
            "10" => Some("0.00%"),
            "11" => Some("0.00e+00"),
            "12" => Some("# ?/?"),
            "13" => Some("# ??/??"),
            "14" => Some("mm-dd-yy"),
            "15" => Some("d-mmm-yy"),
            "16" => Some("d-mmm"),
            "17" => Some("mmm-yy"),
            "18" => Some("h:mm am/pm"),
            "19" => Some("h:mm:ss am/pm"),
            "20" => Some("h:mm"),
            "21" => Some("h:mm:ss"),
            "22" => Some("m/d/yy h:m"),
            "37" => Some("#,##0 ;(#,##0)"),
            "38" => Some("#,##0 ;[red](#,##0)"),
            "39" => Some("#,##0.00;(#,##0.00)"),
            "40" => Some("#,##0.00;[red](#,##0.00)"),
            "45" => Some("mm:ss"),
            "46" => Some("[h]:mm:ss"),
            "47" => Some("mmss.0"),
            "48" => Some("##0.0e+0"),
            "49" => Some("@"),
            _ => None,
        }
    }
}

impl Display for FormatClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Date => "date",
            Self::Time => "time",
            Self::Float => "float",
            Self::Plain => "plain",
        };
        write!(f, "{name}")
    }
}

/// Heuristic that produced a value when no table lookup could.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FallbackPolicy {
    /// Format id has no known code, raw text is numeric: rendered as a date
    UnknownFormatIdAsDate,
    /// Format id has no known code, raw text is not numeric: kept as is
    UnknownFormatId,
    /// Format code is not in the known table but contains `yyyy`: rendered as a date
    YearPatternAsDate,
    /// Format code could not be classified: kept as is
    UnclassifiedFormatCode,
    /// Format class is known but the raw text is not a usable number: kept as is
    UnconvertibleValue,
}

/// Where a resolved value came from.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ValueOrigin {
    SharedString,
    ErrorValue,
    Raw,
    Formatted(FormatClass),
    Fallback(FallbackPolicy),
}

/// Final display string of a cell together with its origin.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedValue {
    pub value: String,
    pub origin: ValueOrigin,
}

impl ResolvedValue {
    fn new(value: impl Into<String>, origin: ValueOrigin) -> Self {
        Self { value: value.into(), origin }
    }
}

/// Resolves cells against loaded workbook tables.
#[derive(Clone, Copy, Debug)]
pub struct CellResolver<'a> {
    formats: &'a NumberFormatTable,
    shared_strings: &'a SharedStrings,
    is_1904: bool,
}

impl<'a> CellResolver<'a> {
    pub fn new(formats: &'a NumberFormatTable, shared_strings: &'a SharedStrings, is_1904: bool) -> Self {
        Self { formats, shared_strings, is_1904 }
    }

    pub fn resolve(&self, cell: &RawCell) -> Result<ResolvedValue, Xlsx2CsvError> {
        resolve(cell, self.formats, self.shared_strings, self.is_1904)
    }
}

/// Resolves a raw cell into its final textual value.
///
/// Shared strings and error cells are handled first; any other cell with a style
/// index inside the style table is formatted according to its number format. All
/// remaining cells keep their raw text.
///
/// # Errors
///
/// Malformed shared string or style indexes are fatal. Unknown format ids and
/// unclassifiable format codes are not: they fall back to the raw text and are
/// reported through [`ValueOrigin::Fallback`].
pub fn resolve(
    cell: &RawCell,
    formats: &NumberFormatTable,
    shared_strings: &SharedStrings,
    is_1904: bool,
) -> Result<ResolvedValue, Xlsx2CsvError> {
    match cell.type_code.as_deref() {
        Some("s") => {
            let string = cell.raw_text.trim().parse::<usize>()
                .ok()
                .and_then(|index| shared_strings.get(index))
                .ok_or_else(|| SpreadsheetError::SharedStringIndexError(
                    cell.reference.to_owned(),
                    cell.raw_text.to_owned(),
                ))?;
            return Ok(ResolvedValue::new(string, ValueOrigin::SharedString));
        }
        Some("e") => return Ok(ResolvedValue::new("", ValueOrigin::ErrorValue)),
        _ => (),
    }

    let style_index = match cell.style_index.as_deref() {
        Some(style_index) if !style_index.is_empty() => style_index,
        _ => return Ok(ResolvedValue::new(cell.raw_text.as_str(), ValueOrigin::Raw)),
    };
    let style_index = style_index.parse::<usize>().map_err(|_| {
        SpreadsheetError::StyleIndexError(cell.reference.to_owned(), style_index.to_owned())
    })?;
    match formats.format_id(style_index) {
        Some(format_id) => Ok(format_by_format_id(cell, format_id, formats, is_1904)),
        None => Ok(ResolvedValue::new(cell.raw_text.as_str(), ValueOrigin::Raw)),
    }
}

/// Returns true if the raw text is an unsigned decimal number.
pub fn is_numeric_text(text: &str) -> bool {
    NUMERIC_TEXT.is_match(text)
}

/// Outcome of classifying a format code against a cell's raw text.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Classification {
    Known(FormatClass),
    Fallback(FormatClass, FallbackPolicy),
    Unclassified,
}

/// Classifies a format code: known table first, then the `yyyy` heuristic for numeric text.
pub fn classify(format_code: &str, raw_text: &str) -> Classification {
    if let Some(class) = FormatClass::from_known_code(format_code) {
        Classification::Known(class)
    } else if is_numeric_text(raw_text) && format_code.contains("yyyy") {
        Classification::Fallback(FormatClass::Date, FallbackPolicy::YearPatternAsDate)
    } else {
        Classification::Unclassified
    }
}

fn format_by_format_id(cell: &RawCell, format_id: &str, formats: &NumberFormatTable, is_1904: bool) -> ResolvedValue {
    let raw_text = cell.raw_text.as_str();
    let (class, code, policy) = match formats.format_code(format_id) {
        None if is_numeric_text(raw_text) => (FormatClass::Date, "", Some(FallbackPolicy::UnknownFormatIdAsDate)),
        None => {
            warn!("Format code not found for id '{}' at {}: '{}'", format_id, cell.reference, raw_text);
            return ResolvedValue::new(raw_text, ValueOrigin::Fallback(FallbackPolicy::UnknownFormatId));
        }
        Some(code) => match classify(code, raw_text) {
            Classification::Known(class) => (class, code, None),
            Classification::Fallback(class, policy) => (class, code, Some(policy)),
            Classification::Unclassified => {
                warn!("Format class not found for code '{}' at {}: '{}'", code, cell.reference, raw_text);
                return ResolvedValue::new(raw_text, ValueOrigin::Fallback(FallbackPolicy::UnclassifiedFormatCode));
            }
        },
    };

    let formatted = match class {
        FormatClass::Date => to_datetime_string(raw_text, is_1904),
        FormatClass::Time => to_time_string(raw_text),
        FormatClass::Float => to_float_string(raw_text, code),
        FormatClass::Plain => return ResolvedValue::new(raw_text, ValueOrigin::Formatted(FormatClass::Plain)),
    };
    match formatted {
        Ok(value) => {
            let origin = policy.map(ValueOrigin::Fallback).unwrap_or(ValueOrigin::Formatted(class));
            ResolvedValue::new(value, origin)
        }
        Err(error) => {
            warn!("Format '{}' at {} as {} failed: {}", raw_text, cell.reference, class, error);
            ResolvedValue::new(raw_text, ValueOrigin::Fallback(FallbackPolicy::UnconvertibleValue))
        }
    }
}

/// Converts a serial date number to `YYYY-MM-DD HH:MM:SS`.
/// The integer part counts days since the epoch, the fraction is the time of day.
pub fn to_datetime_string(value: &str, is_1904: bool) -> Result<String, Xlsx2CsvError> {
    let days = value.parse::<f64>()?;
    let invalid = || SpreadsheetError::CellValueError(value.to_owned(), FormatClass::Date);
    if !days.is_finite() {
        Err(invalid())?
    }
    let epoch = if is_1904 {
        NaiveDate::from_ymd_opt(1904, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(1899, 12, 30)
    }
    .and_then(|date| date.and_hms_opt(0, 0, 0))
    .ok_or_else(invalid)?;
    let microseconds = (days * 86_400_000_000f64).round() as i64;
    let datetime = epoch
        .checked_add_signed(Duration::microseconds(microseconds))
        .ok_or_else(invalid)?;
    Ok(datetime.format("%Y-%m-%d %H:%M:%S").to_string())
}

/// Converts the fractional part of a serial number to `HH:MM:SS`.
pub fn to_time_string(value: &str) -> Result<String, Xlsx2CsvError> {
    let number = value.parse::<f64>()?;
    if !number.is_finite() {
        Err(SpreadsheetError::CellValueError(value.to_owned(), FormatClass::Time))?
    }
    let fraction = number.rem_euclid(1.0);
    let seconds = ((fraction * 86_400f64 * 1_000_000f64).round() / 1_000_000f64) as i64;
    let hours = (seconds / 3600) % 24;
    let minutes = (seconds / 60) % 60;
    let seconds = seconds % 60;
    Ok(format!("{hours:02}:{minutes:02}:{seconds:02}"))
}

/// Renders a number with as many decimal places as the format code has after its `.`.
pub fn to_float_string(value: &str, format_code: &str) -> Result<String, Xlsx2CsvError> {
    let number = value.parse::<f64>()?;
    let decimals = format_code.split('.').nth(1).map(str::len).unwrap_or(0);
    Ok(format!("{number:.decimals$}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn tables() -> (NumberFormatTable, SharedStrings) {
        let custom_formats = HashMap::from([
            ("164".to_owned(), "dd-mmm-yyyy".to_owned()),
            ("165".to_owned(), "0.00000".to_owned()),
            ("166".to_owned(), "hh:mm:ss".to_owned()),
            ("167".to_owned(), "yyyy\"年\"m\"月\"".to_owned()),
            ("168".to_owned(), "[blue]0;[red]-0".to_owned()),
        ]);
        let style_records = ["0", "164", "165", "166", "167", "168", "", "14", "999"]
            .into_iter()
            .map(str::to_owned)
            .collect();
        let formats = NumberFormatTable::new(custom_formats, style_records);
        let shared_strings = SharedStrings::from(vec!["alpha".to_owned(), "beta".to_owned(), "".to_owned()]);
        (formats, shared_strings)
    }

    fn cell(type_code: Option<&str>, style_index: Option<&str>, raw_text: &str) -> RawCell {
        RawCell {
            reference: "A1".to_owned(),
            type_code: type_code.map(str::to_owned),
            style_index: style_index.map(str::to_owned),
            raw_text: raw_text.to_owned(),
        }
    }

    fn resolve_with(cell: &RawCell, is_1904: bool) -> ResolvedValue {
        let (formats, shared_strings) = tables();
        resolve(cell, &formats, &shared_strings, is_1904).unwrap()
    }

    #[test]
    fn shared_strings_are_returned_verbatim() {
        let (formats, shared_strings) = tables();
        for (index, expected) in ["alpha", "beta", ""].iter().enumerate() {
            let resolved = resolve(&cell(Some("s"), Some("2"), &index.to_string()), &formats, &shared_strings, false).unwrap();
            assert_eq!(resolved.value, *expected);
            assert_eq!(resolved.origin, ValueOrigin::SharedString);
        }
    }

    #[test]
    fn shared_string_index_out_of_range_is_fatal() {
        let (formats, shared_strings) = tables();
        assert!(resolve(&cell(Some("s"), None, "3"), &formats, &shared_strings, false).is_err());
        assert!(resolve(&cell(Some("s"), None, "x"), &formats, &shared_strings, false).is_err());
    }

    #[test]
    fn error_cells_are_empty() {
        let resolved = resolve_with(&cell(Some("e"), Some("1"), "#DIV/0!"), false);
        assert_eq!(resolved, ResolvedValue::new("", ValueOrigin::ErrorValue));
    }

    #[test]
    fn unstyled_cells_keep_raw_text() {
        for raw_text in ["42", "hello", "", "3.5", "TRUE"] {
            let resolved = resolve_with(&cell(None, None, raw_text), false);
            assert_eq!(resolved, ResolvedValue::new(raw_text, ValueOrigin::Raw));
            let resolved = resolve_with(&cell(Some("str"), Some(""), raw_text), false);
            assert_eq!(resolved, ResolvedValue::new(raw_text, ValueOrigin::Raw));
        }
    }

    #[test]
    fn general_format_keeps_raw_text() {
        let resolved = resolve_with(&cell(None, Some("0"), "1234.5"), false);
        assert_eq!(resolved, ResolvedValue::new("1234.5", ValueOrigin::Formatted(FormatClass::Plain)));
    }

    #[test]
    fn style_index_beyond_table_keeps_raw_text() {
        let resolved = resolve_with(&cell(None, Some("100"), "44197"), false);
        assert_eq!(resolved, ResolvedValue::new("44197", ValueOrigin::Raw));
    }

    #[test]
    fn malformed_style_index_is_fatal() {
        let (formats, shared_strings) = tables();
        assert!(resolve(&cell(None, Some("x"), "1"), &formats, &shared_strings, false).is_err());
    }

    #[test]
    fn empty_style_record_keeps_raw_text() {
        let resolved = resolve_with(&cell(None, Some("6"), "44197"), false);
        assert_eq!(resolved, ResolvedValue::new("44197", ValueOrigin::Raw));
    }

    #[test]
    fn custom_date_format() {
        let resolved = resolve_with(&cell(None, Some("1"), "44197.75"), false);
        assert_eq!(resolved.value, "2021-01-01 18:00:00");
        assert_eq!(resolved.origin, ValueOrigin::Formatted(FormatClass::Date));
    }

    #[test]
    fn builtin_date_format() {
        let resolved = resolve_with(&cell(None, Some("7"), "0"), false);
        assert_eq!(resolved.value, "1899-12-30 00:00:00");
        let resolved = resolve_with(&cell(None, Some("7"), "0"), true);
        assert_eq!(resolved.value, "1904-01-01 00:00:00");
    }

    #[test]
    fn float_format_rounds_to_code_decimals() {
        let resolved = resolve_with(&cell(None, Some("2"), "3.14159265"), false);
        assert_eq!(resolved, ResolvedValue::new("3.14159", ValueOrigin::Formatted(FormatClass::Float)));
        let resolved = resolve_with(&cell(None, Some("2"), "2.718281828"), false);
        assert_eq!(resolved.value, "2.71828");
        let resolved = resolve_with(&cell(None, Some("2"), "1"), false);
        assert_eq!(resolved.value, "1.00000");
    }

    #[test]
    fn time_format_uses_fraction_only() {
        let resolved = resolve_with(&cell(None, Some("3"), "0.5"), false);
        assert_eq!(resolved, ResolvedValue::new("12:00:00", ValueOrigin::Formatted(FormatClass::Time)));
        let resolved = resolve_with(&cell(None, Some("3"), "44197.25"), false);
        assert_eq!(resolved.value, "06:00:00");
    }

    #[test]
    fn year_pattern_falls_back_to_date() {
        let resolved = resolve_with(&cell(None, Some("4"), "44197"), false);
        assert_eq!(resolved.value, "2021-01-01 00:00:00");
        assert_eq!(resolved.origin, ValueOrigin::Fallback(FallbackPolicy::YearPatternAsDate));
    }

    #[test]
    fn unclassified_code_keeps_raw_text() {
        let resolved = resolve_with(&cell(None, Some("5"), "17"), false);
        assert_eq!(resolved, ResolvedValue::new("17", ValueOrigin::Fallback(FallbackPolicy::UnclassifiedFormatCode)));
    }

    #[test]
    fn unknown_format_id_falls_back() {
        let resolved = resolve_with(&cell(None, Some("8"), "1"), false);
        assert_eq!(resolved, ResolvedValue::new("1899-12-31 00:00:00", ValueOrigin::Fallback(FallbackPolicy::UnknownFormatIdAsDate)));
        let resolved = resolve_with(&cell(None, Some("8"), "-1"), false);
        assert_eq!(resolved, ResolvedValue::new("-1", ValueOrigin::Fallback(FallbackPolicy::UnknownFormatId)));
    }

    #[test]
    fn unconvertible_value_keeps_raw_text() {
        let resolved = resolve_with(&cell(Some("str"), Some("1"), "n/a"), false);
        assert_eq!(resolved, ResolvedValue::new("n/a", ValueOrigin::Fallback(FallbackPolicy::UnconvertibleValue)));
    }

    #[test]
    fn classification() {
        assert_eq!(classify("hh:mm:ss", "x"), Classification::Known(FormatClass::Time));
        assert_eq!(classify("yyyy/mm/dd", "1.5"), Classification::Fallback(FormatClass::Date, FallbackPolicy::YearPatternAsDate));
        assert_eq!(classify("yyyy/mm/dd", "abc"), Classification::Unclassified);
        assert_eq!(classify("yy/mm", "1"), Classification::Unclassified);
    }

    #[test]
    fn numeric_text() {
        assert!(is_numeric_text("0"));
        assert!(is_numeric_text("44197.5"));
        assert!(!is_numeric_text("-1"));
        assert!(!is_numeric_text("1."));
        assert!(!is_numeric_text("1e5"));
        assert!(!is_numeric_text(""));
    }

    #[test]
    fn datetime_conversion() {
        assert_eq!(to_datetime_string("0", false).unwrap(), "1899-12-30 00:00:00");
        assert_eq!(to_datetime_string("60", false).unwrap(), "1900-02-28 00:00:00");
        assert_eq!(to_datetime_string("43831.5", false).unwrap(), "2020-01-01 12:00:00");
        assert_eq!(to_datetime_string("0.999999999", false).unwrap(), "1899-12-30 23:59:59");
        assert_eq!(to_datetime_string("1462", true).unwrap(), "1908-01-02 00:00:00");
        assert!(to_datetime_string("inf", false).is_err());
        assert!(to_datetime_string("1e300", false).is_err());
    }

    #[test]
    fn time_conversion() {
        assert_eq!(to_time_string("0").unwrap(), "00:00:00");
        assert_eq!(to_time_string("0.75").unwrap(), "18:00:00");
        assert_eq!(to_time_string("0.0000115740740740741").unwrap(), "00:00:01");
        assert_eq!(to_time_string("-0.25").unwrap(), "18:00:00");
    }

    #[test]
    fn float_conversion() {
        assert_eq!(to_float_string("1.005", "0.00").unwrap(), "1.00");
        assert_eq!(to_float_string("2.4", "0").unwrap(), "2");
        assert!(to_float_string("abc", "0.00").is_err());
    }
}
