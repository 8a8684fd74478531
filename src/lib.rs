//! TMS Timesheet Bot Library
//!
//! This library fills weekly hours from a CSV file into the Timesheet
//! Management System web form. It drives the week selector across one or
//! more weeks, writes each project/day cell, optionally saves every week and
//! reports what happened in a [`FillSummary`].

pub mod cli;
pub mod config;
pub mod error;
pub mod helpers;
pub mod logging;
pub mod models;
pub mod page;
pub mod service;

pub use config::Config;
pub use error::{FillError, FillIssue, WeekFailure};
pub use service::{FailureStrategy, FillService};

// Re-export key types for convenience
pub use helpers::csv_loader::{load_csv, load_rows};
pub use models::{FillSummary, TimesheetRow, WeekId, WeekSpec, Weekday};
pub use page::TimesheetPage;
