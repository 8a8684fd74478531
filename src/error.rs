//! Error types.
//!
//! Validation errors (`CsvLoadError`, `WeekSpecError`, `ConfigError`) surface
//! before a browser is touched. `FillIssue` is recorded inside a result and
//! never aborts a run; `FillError` is what a run returns when it aborts.

use serde::Serialize;
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::models::{Direction, WeekId, Weekday};

#[derive(Debug, Error)]
pub enum RowError {
    #[error("Project number cannot be empty")]
    EmptyProjectNumber,

    #[error("Hours value for {weekday} cannot be negative: {value}")]
    NegativeHours { weekday: Weekday, value: f64 },

    #[error("Hours value for {weekday} must be a finite number")]
    NonFiniteHours { weekday: Weekday },
}

#[derive(Debug, Error)]
pub enum CsvLoadError {
    #[error("CSV file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("CSV file is empty or has no headers")]
    NoHeaders,

    #[error(
        "CSV missing required headers: {}\n\nNote: both canonical headers \
         (project_name, project_task) and legacy headers (project_text, task) are accepted.",
        .missing.join(", ")
    )]
    MissingHeaders { missing: Vec<&'static str> },

    #[error(
        "Error on line {line}: Invalid hours value for {field}: '{value}' \
         (must be a number or empty)"
    )]
    InvalidHours {
        line: u64,
        field: &'static str,
        value: String,
    },

    #[error("Error on line {line}: Hours value for {field} cannot be negative: {value}")]
    NegativeHours {
        line: u64,
        field: &'static str,
        value: String,
    },

    #[error("Error on line {line}: {source}")]
    Row {
        line: u64,
        #[source]
        source: RowError,
    },

    #[error("CSV file contains no valid data rows")]
    NoDataRows,

    #[error("Failed to parse CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("Failed to read CSV: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WeekSpecError {
    #[error("Week specification cannot be empty")]
    Empty,

    #[error("Invalid week specification: empty part in '{spec}'")]
    EmptyAtom { spec: String },

    #[error("Invalid week format: '{atom}'. Expected 'N' or 'N-M' where N and M are week numbers")]
    MalformedAtom { atom: String },

    #[error("Week number {value} out of range (must be 1-53)")]
    OutOfRange { value: String },

    #[error("Invalid range '{atom}': start week ({start}) is greater than end week ({end})")]
    ReversedRange { atom: String, start: u64, end: u64 },

    #[error("No valid week numbers found in '{spec}'")]
    NoWeeks { spec: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WeekDisplayError {
    #[error("Could not parse week display text: '{0}'")]
    Unrecognized(String),

    #[error("Invalid week number {0} (must be 1-53)")]
    InvalidWeek(u32),

    #[error("Invalid year {0}")]
    InvalidYear(i32),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OffsetBoundsError {
    #[error("Week offset {offset} exceeds maximum forward navigation limit (+{max} weeks)")]
    Forward { offset: i64, max: u32 },

    #[error("Week offset {offset} exceeds maximum backward navigation limit (-{max} weeks)")]
    Backward { offset: i64, max: u32 },
}

/// Failures reported by a page driver.
#[derive(Debug, Error)]
pub enum PageError {
    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Script evaluation failed: {0}")]
    Script(String),

    #[error("Timed out after {timeout:?} waiting for {what}")]
    Timeout { timeout: Duration, what: String },

    #[error("Week display not found on page")]
    WeekDisplayMissing,

    #[error(transparent)]
    WeekDisplay(#[from] WeekDisplayError),

    #[error("Page is closed")]
    Closed,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Non-fatal, per-project or per-cell problems recorded in the summary.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FillIssue {
    #[error("Project row not found in table")]
    RowNotFound,

    #[error("Input field for {weekday} not found")]
    FieldNotFound { weekday: Weekday },

    #[error("Fill verification failed for {weekday}")]
    VerificationMismatch { weekday: Weekday },

    #[error("{message}")]
    Driver { message: String },
}

/// Why a single target week could not be completed.
#[derive(Debug, Error)]
pub enum WeekFailure {
    #[error("could not detect the displayed week: {0}")]
    Detect(#[source] PageError),

    #[error(transparent)]
    OffsetOutOfBounds(#[from] OffsetBoundsError),

    #[error("{direction} week navigation control not found")]
    NavigationControlMissing { direction: Direction },

    #[error("expected {expected} after navigation but the page shows {actual}")]
    ArrivalMismatch { expected: WeekId, actual: WeekId },

    #[error("commit control not available after trying {attempts} locator(s)")]
    CommitUnavailable { attempts: usize },

    #[error("Promark control not available after trying {attempts} locator(s)")]
    SubmitUnavailable { attempts: usize },

    #[error(transparent)]
    Page(#[from] PageError),
}

#[derive(Debug, Error)]
pub enum LoginError {
    #[error("Failed to read operator confirmation: {0}")]
    Prompt(#[from] io::Error),

    #[error("Operator input closed before login was confirmed")]
    PromptClosed,

    #[error(transparent)]
    Page(#[from] PageError),
}

/// A run that aborted. No partial summary accompanies it.
#[derive(Debug, Error)]
pub enum FillError {
    #[error("Could not detect the baseline week: {0}")]
    BaselineUndetected(#[source] PageError),

    #[error("Run stopped at {week}: {cause}")]
    WeekAborted {
        week: WeekId,
        #[source]
        cause: WeekFailure,
    },

    #[error("Failed to find timesheet table after login")]
    TableNotVisible,

    #[error("Login confirmation failed: {0}")]
    Login(#[source] LoginError),

    #[error(transparent)]
    Page(#[from] PageError),
}

impl FillError {
    /// The week the run stopped at, when the failure belongs to one.
    pub fn week(&self) -> Option<WeekId> {
        match self {
            FillError::WeekAborted { week, .. } => Some(*week),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot use --auto-submit with --dry-run")]
    DryRunWithAutoSubmit,

    #[error("Year must be between 2000 and 2100, got: {0}")]
    YearOutOfRange(i32),

    #[error("{name} timeout must be greater than zero")]
    ZeroTimeout { name: &'static str },

    #[error("At least one commit locator is required")]
    NoCommitLocators,

    #[error("Cannot use --promark without --auto-submit")]
    SubmitWithoutSave,

    #[error("At least one Promark locator is required")]
    NoSubmitLocators,

    #[error("Failed to read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid config file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectivityError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("HTTP {status}: {reason}")]
    Status { status: u16, reason: String },

    #[error("Connection timeout after {0}s")]
    Timeout(u64),

    #[error("DNS resolution failed: {0}")]
    Dns(String),

    #[error("Network error: {0}")]
    Connect(String),

    #[error("Unexpected error: {0}")]
    Other(String),
}

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Output file already exists: {}. Use --force to overwrite.", .0.display())]
    Exists(PathBuf),

    #[error("No project data to generate CSV from")]
    NoProjects,

    #[error("Error in project {index}: Project number cannot be empty")]
    EmptyProjectNumber { index: usize },

    #[error("Failed to write CSV file: {0}")]
    Csv(#[from] csv::Error),

    #[error("Failed to write CSV file: {0}")]
    Io(#[from] io::Error),
}
