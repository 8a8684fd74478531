use csv::{ReaderBuilder, StringRecord};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{debug, info};

use crate::error::CsvLoadError;
use crate::helpers::schema;
use crate::models::{TimesheetRow, Weekday};

/// Load timesheet rows from a CSV file.
pub fn load_csv(path: impl AsRef<Path>) -> Result<Vec<TimesheetRow>, CsvLoadError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(CsvLoadError::NotFound(path.to_path_buf()));
    }

    info!("Loading timesheet rows from {}", path.display());
    let file = File::open(path)?;
    load_rows(BufReader::new(file))
}

/// Parse timesheet rows from any CSV source.
///
/// Rows with an empty project number are skipped. Everything else must
/// parse, and at least one row must survive.
pub fn load_rows<R: Read>(reader: R) -> Result<Vec<TimesheetRow>, CsvLoadError> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .delimiter(schema::DELIMITER)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    schema::validate_headers(headers.iter())?;
    let columns = schema::column_index(headers.iter());

    let mut rows = Vec::new();
    for (index, record) in rdr.records().enumerate() {
        let record = record?;
        let line = record
            .position()
            .map(|position| position.line())
            .unwrap_or(index as u64 + 2);

        match parse_record(&record, &columns, line)? {
            Some(row) => rows.push(row),
            None => debug!("Skipping line {}: empty project number", line),
        }
    }

    if rows.is_empty() {
        return Err(CsvLoadError::NoDataRows);
    }

    info!("Loaded {} row(s)", rows.len());
    Ok(rows)
}

fn cell<'r>(record: &'r StringRecord, columns: &HashMap<String, usize>, name: &str) -> &'r str {
    columns
        .get(name)
        .and_then(|&index| record.get(index))
        .map(str::trim)
        .unwrap_or("")
}

fn parse_record(
    record: &StringRecord,
    columns: &HashMap<String, usize>,
    line: u64,
) -> Result<Option<TimesheetRow>, CsvLoadError> {
    let project_number = cell(record, columns, schema::PROJECT_NUMBER);
    if project_number.is_empty() {
        return Ok(None);
    }

    let mut hours = [None; 7];
    for day in Weekday::ALL {
        hours[day.index()] = parse_hours(cell(record, columns, day.as_str()), day.as_str(), line)?;
    }

    TimesheetRow::new(
        project_number,
        cell(record, columns, schema::PROJECT_NAME),
        cell(record, columns, schema::PROJECT_TASK),
        hours,
    )
    .map(Some)
    .map_err(|source| CsvLoadError::Row { line, source })
}

/// Empty means unset; anything else must be a finite, non-negative number.
pub fn parse_hours(
    value: &str,
    field: &'static str,
    line: u64,
) -> Result<Option<f64>, CsvLoadError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }

    let hours: f64 = value.parse().map_err(|_| CsvLoadError::InvalidHours {
        line,
        field,
        value: value.to_string(),
    })?;

    if !hours.is_finite() {
        return Err(CsvLoadError::InvalidHours {
            line,
            field,
            value: value.to_string(),
        });
    }
    if hours < 0.0 {
        return Err(CsvLoadError::NegativeHours {
            line,
            field,
            value: value.to_string(),
        });
    }

    Ok(Some(hours))
}
