//! A1-style cell reference helpers.

/// Splits a cell reference such as `"AB12"` into its column letters and row digits.
///
/// Returns `None` unless the reference is one or more ASCII letters followed by
/// one or more ASCII digits.
pub fn split_reference(reference: &str) -> Option<(&str, &str)> {
    let index = reference
        .find(|character: char| !character.is_ascii_alphabetic())
        .unwrap_or(reference.len());
    let (column, row) = reference.split_at(index);
    if column.is_empty() || row.is_empty() || !row.bytes().all(|byte| byte.is_ascii_digit()) {
        None
    } else {
        Some((column, row))
    }
}

/// Returns the column key of a cell reference (`"B7"` -> `"B"`).
pub fn column_key(reference: &str) -> Option<&str> {
    split_reference(reference).map(|(column, _)| column)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_simple_references() {
        assert_eq!(split_reference("A1"), Some(("A", "1")));
        assert_eq!(split_reference("B7"), Some(("B", "7")));
        assert_eq!(split_reference("XFD1048576"), Some(("XFD", "1048576")));
    }

    #[test]
    fn column_key_does_not_depend_on_row_width() {
        assert_eq!(column_key("Z10"), Some("Z"));
        assert_eq!(column_key("AA9"), Some("AA"));
        assert_eq!(column_key("AB100"), Some("AB"));
    }

    #[test]
    fn reject_malformed_references() {
        assert_eq!(split_reference(""), None);
        assert_eq!(split_reference("7"), None);
        assert_eq!(split_reference("A"), None);
        assert_eq!(split_reference("A1B"), None);
        assert_eq!(split_reference("$A$1"), None);
    }
}
