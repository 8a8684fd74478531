//! CSV schema: canonical headers, legacy aliases and header matching.
//!
//! This is the single source of truth for column names. The loader and the
//! template generator both go through it.

use std::collections::HashMap;

use crate::error::CsvLoadError;
use crate::models::Weekday;

pub const PROJECT_NUMBER: &str = "project_number";
pub const PROJECT_NAME: &str = "project_name";
pub const PROJECT_TASK: &str = "project_task";

/// Canonical headers in file order.
pub const CANONICAL_HEADERS: [&str; 10] = [
    PROJECT_NUMBER,
    PROJECT_NAME,
    PROJECT_TASK,
    Weekday::Monday.as_str(),
    Weekday::Tuesday.as_str(),
    Weekday::Wednesday.as_str(),
    Weekday::Thursday.as_str(),
    Weekday::Friday.as_str(),
    Weekday::Saturday.as_str(),
    Weekday::Sunday.as_str(),
];

/// Older generator output: legacy name -> canonical name.
pub const LEGACY_ALIASES: [(&str, &str); 2] =
    [("project_text", PROJECT_NAME), ("task", PROJECT_TASK)];

pub const DELIMITER: u8 = b',';

/// Trim, lowercase, then map legacy aliases to their canonical name.
pub fn normalize_header(header: &str) -> String {
    let normalized = header.trim().to_lowercase();
    LEGACY_ALIASES
        .iter()
        .find(|(legacy, _)| *legacy == normalized)
        .map(|(_, canonical)| canonical.to_string())
        .unwrap_or(normalized)
}

/// Canonical headers absent from `headers`, in canonical order.
pub fn missing_headers<'a, I>(headers: I) -> Vec<&'static str>
where
    I: IntoIterator<Item = &'a str>,
{
    let present: Vec<String> = headers.into_iter().map(normalize_header).collect();
    CANONICAL_HEADERS
        .iter()
        .copied()
        .filter(|canonical| !present.iter().any(|h| h == canonical))
        .collect()
}

pub fn validate_headers<'a, I>(headers: I) -> Result<(), CsvLoadError>
where
    I: IntoIterator<Item = &'a str>,
{
    let headers: Vec<&str> = headers.into_iter().collect();
    if headers.iter().all(|h| h.trim().is_empty()) {
        return Err(CsvLoadError::NoHeaders);
    }

    let missing = missing_headers(headers);
    if missing.is_empty() {
        Ok(())
    } else {
        Err(CsvLoadError::MissingHeaders { missing })
    }
}

/// Column index for each normalized header. The first occurrence wins.
pub fn column_index<'a, I>(headers: I) -> HashMap<String, usize>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut columns = HashMap::new();
    for (index, header) in headers.into_iter().enumerate() {
        columns.entry(normalize_header(header)).or_insert(index);
    }
    columns
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_case_whitespace_and_aliases() {
        assert_eq!(normalize_header("  Project_Name  "), "project_name");
        assert_eq!(normalize_header("project_text"), "project_name");
        assert_eq!(normalize_header("TASK"), "project_task");
        assert_eq!(normalize_header("notes"), "notes");
    }

    #[test]
    fn accepts_canonical_legacy_and_extra_columns_in_any_order() {
        let legacy = [
            "sunday", "Monday", "tuesday", "wednesday", "thursday", "friday", "saturday",
            "task", "project_text", "Project_Number", "comment",
        ];
        assert!(validate_headers(legacy).is_ok());
        assert!(validate_headers(CANONICAL_HEADERS).is_ok());
    }

    #[test]
    fn reports_exactly_the_missing_names() {
        let err = validate_headers(["project_number", "monday"]).unwrap_err();
        match err {
            CsvLoadError::MissingHeaders { missing } => assert_eq!(
                missing,
                vec![
                    "project_name",
                    "project_task",
                    "tuesday",
                    "wednesday",
                    "thursday",
                    "friday",
                    "saturday",
                    "sunday"
                ]
            ),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn empty_header_row_is_rejected() {
        assert!(matches!(validate_headers([""]), Err(CsvLoadError::NoHeaders)));
        assert!(matches!(
            validate_headers(Vec::<&str>::new()),
            Err(CsvLoadError::NoHeaders)
        ));
    }

    #[test]
    fn column_index_keeps_first_occurrence() {
        let columns = column_index(["project_number", "project_text", "project_name"]);
        assert_eq!(columns["project_name"], 1);
        assert_eq!(columns["project_number"], 0);
    }
}
