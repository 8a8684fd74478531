//! The page automation capability the fill orchestrator drives.
//!
//! [`TimesheetPage`] is everything the orchestrator needs from a browser.
//! [`chromium::ChromiumPage`] drives a real Chromium over CDP and
//! [`fake::FakePage`] is an in-memory TMS for tests and demos.

pub mod chromium;
pub mod fake;
pub mod selectors;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;

use crate::error::PageError;
use crate::helpers::template::ProjectData;
use crate::models::{WeekId, Weekday};

pub type PageResult<T> = Result<T, PageError>;

/// What a locator points at. Drivers without CSS support key off this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlRole {
    Table,
    PreviousWeek,
    NextWeek,
    Commit,
    /// The Promark button that submits a saved week.
    Submit,
}

/// An opaque reference to a page control: a CSS selector plus an optional
/// text the element must contain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Locator {
    pub role: ControlRole,
    pub css: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl Locator {
    pub fn new(role: ControlRole, css: impl Into<String>) -> Self {
        Self {
            role,
            css: css.into(),
            text: None,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.text {
            Some(text) => write!(f, "{} containing {:?}", self.css, text),
            None => f.write_str(&self.css),
        }
    }
}

/// A located project row. Valid until the next navigation.
///
/// `id` is the row position when it was located; drivers that can re-resolve
/// the row by `project_number` should prefer that.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowHandle {
    pub id: usize,
    pub project_number: String,
}

/// A located day input inside a row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldHandle {
    pub row: RowHandle,
    pub weekday: Weekday,
}

#[async_trait]
pub trait TimesheetPage: Send {
    async fn navigate(&mut self, url: &str) -> PageResult<()>;

    /// Wait up to `timeout` for `locator` to be visible. A zero timeout is a
    /// single probe.
    async fn wait_for_visible(&mut self, locator: &Locator, timeout: Duration) -> PageResult<bool>;

    /// Read the `(year, week)` currently shown by the week selector.
    async fn detect_current_week(&mut self) -> PageResult<WeekId>;

    async fn locate_row(&mut self, project_number: &str) -> PageResult<Option<RowHandle>>;

    async fn locate_field(
        &mut self,
        row: &RowHandle,
        weekday: Weekday,
    ) -> PageResult<Option<FieldHandle>>;

    async fn read_value(&mut self, field: &FieldHandle) -> PageResult<String>;

    async fn clear(&mut self, field: &FieldHandle) -> PageResult<()>;

    async fn write_value(&mut self, field: &FieldHandle, text: &str) -> PageResult<()>;

    /// Click the first element matching `locator`. `Ok(false)` when none
    /// is present.
    async fn click(&mut self, locator: &Locator) -> PageResult<bool>;

    /// Click the first locator that matches, returning its index.
    async fn click_fallback(&mut self, locators: &[Locator]) -> PageResult<Option<usize>> {
        for (index, locator) in locators.iter().enumerate() {
            if self.click(locator).await? {
                return Ok(Some(index));
            }
        }
        Ok(None)
    }

    /// Wait up to `timeout` for the page to settle after the last click.
    /// `Ok(false)` when no transition was observed.
    async fn wait_for_transition(&mut self, timeout: Duration) -> PageResult<bool>;

    /// Project rows currently listed in the timesheet table.
    async fn list_projects(&mut self) -> PageResult<Vec<ProjectData>>;

    async fn screenshot(&mut self, path: &Path) -> PageResult<()>;

    async fn close(&mut self) -> PageResult<()>;
}
