use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::RowError;

/// Day columns of the TMS week view, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl Weekday {
    pub const ALL: [Weekday; 7] = [
        Weekday::Monday,
        Weekday::Tuesday,
        Weekday::Wednesday,
        Weekday::Thursday,
        Weekday::Friday,
        Weekday::Saturday,
        Weekday::Sunday,
    ];

    /// Lowercase name, shared by the CSV header and the DOM input `name`.
    pub const fn as_str(self) -> &'static str {
        match self {
            Weekday::Monday => "monday",
            Weekday::Tuesday => "tuesday",
            Weekday::Wednesday => "wednesday",
            Weekday::Thursday => "thursday",
            Weekday::Friday => "friday",
            Weekday::Saturday => "saturday",
            Weekday::Sunday => "sunday",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Weekday::Monday => "Monday",
            Weekday::Tuesday => "Tuesday",
            Weekday::Wednesday => "Wednesday",
            Weekday::Thursday => "Thursday",
            Weekday::Friday => "Friday",
            Weekday::Saturday => "Saturday",
            Weekday::Sunday => "Sunday",
        }
    }

    pub const fn index(self) -> usize {
        self as usize
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|day| day.as_str().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for Weekday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One project line of the input CSV.
///
/// A `None` hour value means "leave this cell alone", not zero.
#[derive(Debug, Clone, PartialEq)]
pub struct TimesheetRow {
    project_number: String,
    project_name: String,
    project_task: String,
    hours: [Option<f64>; 7],
}

impl TimesheetRow {
    /// Build a row, trimming the text fields.
    ///
    /// Rejects an empty project number and negative or non-finite hours.
    pub fn new(
        project_number: &str,
        project_name: &str,
        project_task: &str,
        hours: [Option<f64>; 7],
    ) -> Result<Self, RowError> {
        let project_number = project_number.trim();
        if project_number.is_empty() {
            return Err(RowError::EmptyProjectNumber);
        }

        for (weekday, value) in Weekday::ALL.into_iter().zip(hours) {
            match value {
                Some(v) if !v.is_finite() => return Err(RowError::NonFiniteHours { weekday }),
                Some(v) if v < 0.0 => return Err(RowError::NegativeHours { weekday, value: v }),
                _ => {}
            }
        }

        Ok(Self {
            project_number: project_number.to_string(),
            project_name: project_name.trim().to_string(),
            project_task: project_task.trim().to_string(),
            hours,
        })
    }

    /// Convenience constructor for rows that only set a few days.
    pub fn with_entries(
        project_number: &str,
        entries: &[(Weekday, f64)],
    ) -> Result<Self, RowError> {
        let mut hours = [None; 7];
        for (weekday, value) in entries {
            hours[weekday.index()] = Some(*value);
        }
        Self::new(project_number, "", "", hours)
    }

    pub fn project_number(&self) -> &str {
        &self.project_number
    }

    pub fn project_name(&self) -> &str {
        &self.project_name
    }

    pub fn project_task(&self) -> &str {
        &self.project_task
    }

    pub fn hours(&self, weekday: Weekday) -> Option<f64> {
        self.hours[weekday.index()]
    }

    /// Days that carry an instruction, in weekday order.
    pub fn entries(&self) -> impl Iterator<Item = (Weekday, f64)> + '_ {
        Weekday::ALL
            .into_iter()
            .filter_map(|day| self.hours(day).map(|value| (day, value)))
    }

    pub fn planned_days(&self) -> usize {
        self.entries().count()
    }

    pub fn total_hours(&self) -> f64 {
        self.entries().map(|(_, value)| value).sum()
    }
}
