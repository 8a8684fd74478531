//! In-memory TMS used by tests and the standalone demo.
//!
//! The fake keeps one value map per week, moves between weeks when the
//! navigation arrows are clicked and records every call it receives,
//! tagged with the week displayed at the time.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::error::PageError;
use crate::helpers::template::ProjectData;
use crate::models::{Direction, WeekId, Weekday};
use crate::page::{ControlRole, FieldHandle, Locator, PageResult, RowHandle, TimesheetPage};

/// One recorded interaction.
#[derive(Debug, Clone, PartialEq)]
pub enum PageCall {
    Navigate(String),
    DetectWeek,
    WaitVisible(ControlRole),
    LocateRow(String),
    LocateField(String, Weekday),
    Read(String, Weekday),
    Clear(String, Weekday),
    Write(String, Weekday, String),
    Click(ControlRole),
    WaitTransition,
    ListProjects,
    Screenshot(PathBuf),
    Close,
}

type CellKey = (String, Weekday);

#[derive(Debug)]
pub struct FakePage {
    current: WeekId,
    projects: Vec<ProjectData>,
    values: HashMap<(WeekId, String, Weekday), String>,
    missing_fields: HashSet<CellKey>,
    rejected_writes: HashSet<CellKey>,
    failing_writes: HashSet<CellKey>,
    hidden_commit: HashSet<WeekId>,
    hidden_submit: HashSet<WeekId>,
    commit_css: Option<String>,
    hidden_navigation: Vec<Direction>,
    stuck_navigation: bool,
    broken_detection: bool,
    silent_commit: bool,
    table_hidden_checks: Option<usize>,
    transition_pending: bool,
    committed: Vec<WeekId>,
    submitted: Vec<WeekId>,
    missed_transitions: usize,
    calls: Vec<(WeekId, PageCall)>,
    closed: bool,
}

impl FakePage {
    /// A TMS currently displaying `week`, with a visible table and all controls.
    pub fn new(week: WeekId) -> Self {
        Self {
            current: week,
            projects: Vec::new(),
            values: HashMap::new(),
            missing_fields: HashSet::new(),
            rejected_writes: HashSet::new(),
            failing_writes: HashSet::new(),
            hidden_commit: HashSet::new(),
            hidden_submit: HashSet::new(),
            commit_css: None,
            hidden_navigation: Vec::new(),
            stuck_navigation: false,
            broken_detection: false,
            silent_commit: false,
            table_hidden_checks: None,
            transition_pending: false,
            committed: Vec::new(),
            submitted: Vec::new(),
            missed_transitions: 0,
            calls: Vec::new(),
            closed: false,
        }
    }

    pub fn with_project(mut self, number: &str, name: &str, task: &str) -> Self {
        self.projects.push(ProjectData::new(number, name, task));
        self
    }

    /// Pre-fill a cell, as if someone had already entered it.
    pub fn with_value(
        mut self,
        week: WeekId,
        project: &str,
        weekday: Weekday,
        value: &str,
    ) -> Self {
        self.values
            .insert((week, project.to_string(), weekday), value.to_string());
        self
    }

    pub fn without_field(mut self, project: &str, weekday: Weekday) -> Self {
        self.missing_fields.insert((project.to_string(), weekday));
        self
    }

    /// Writes to this cell are accepted but never land.
    pub fn rejecting_writes(mut self, project: &str, weekday: Weekday) -> Self {
        self.rejected_writes.insert((project.to_string(), weekday));
        self
    }

    /// Writes to this cell fail with a driver error.
    pub fn failing_writes(mut self, project: &str, weekday: Weekday) -> Self {
        self.failing_writes.insert((project.to_string(), weekday));
        self
    }

    /// The Save control never appears while `week` is displayed.
    pub fn without_commit_on(mut self, week: WeekId) -> Self {
        self.hidden_commit.insert(week);
        self
    }

    /// The Promark link never appears while `week` is displayed.
    pub fn without_submit_on(mut self, week: WeekId) -> Self {
        self.hidden_submit.insert(week);
        self
    }

    /// Only commit locators with this CSS selector match.
    pub fn with_commit_control(mut self, css: &str) -> Self {
        self.commit_css = Some(css.to_string());
        self
    }

    pub fn without_navigation(mut self, direction: Direction) -> Self {
        self.hidden_navigation.push(direction);
        self
    }

    /// Arrow clicks are accepted but the displayed week never changes.
    pub fn with_stuck_navigation(mut self) -> Self {
        self.stuck_navigation = true;
        self
    }

    pub fn with_broken_week_display(mut self) -> Self {
        self.broken_detection = true;
        self
    }

    /// Saving works but no page transition is observed.
    pub fn with_silent_commit(mut self) -> Self {
        self.silent_commit = true;
        self
    }

    /// The table stays hidden for the first `checks` visibility checks.
    pub fn with_table_after_checks(mut self, checks: usize) -> Self {
        self.table_hidden_checks = Some(checks);
        self
    }

    /// The table never becomes visible, as before a login.
    pub fn with_hidden_table(mut self) -> Self {
        self.table_hidden_checks = Some(usize::MAX);
        self
    }

    pub fn current_week(&self) -> WeekId {
        self.current
    }

    pub fn value(&self, week: WeekId, project: &str, weekday: Weekday) -> Option<&str> {
        self.values
            .get(&(week, project.to_string(), weekday))
            .map(String::as_str)
    }

    pub fn calls(&self) -> &[(WeekId, PageCall)] {
        &self.calls
    }

    /// Calls made while `week` was displayed.
    pub fn calls_during(&self, week: WeekId) -> Vec<&PageCall> {
        self.calls
            .iter()
            .filter(|(w, _)| *w == week)
            .map(|(_, call)| call)
            .collect()
    }

    pub fn clicks(&self, role: ControlRole) -> usize {
        self.calls
            .iter()
            .filter(|(_, call)| *call == PageCall::Click(role))
            .count()
    }

    pub fn writes(&self) -> usize {
        self.calls
            .iter()
            .filter(|(_, call)| matches!(call, PageCall::Write(..)))
            .count()
    }

    pub fn committed(&self) -> &[WeekId] {
        &self.committed
    }

    pub fn submitted(&self) -> &[WeekId] {
        &self.submitted
    }

    /// How many transition waits ended without seeing one.
    pub fn missed_transitions(&self) -> usize {
        self.missed_transitions
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn record(&mut self, call: PageCall) -> PageResult<()> {
        if self.closed {
            return Err(PageError::Closed);
        }
        debug!("fake page {}: {:?}", self.current, call);
        self.calls.push((self.current, call));
        Ok(())
    }

    fn cell_key(field: &FieldHandle) -> CellKey {
        (field.row.project_number.clone(), field.weekday)
    }

    fn is_visible(&mut self, locator: &Locator) -> bool {
        match locator.role {
            ControlRole::Table => match self.table_hidden_checks.as_mut() {
                Some(0) | None => true,
                Some(remaining) => {
                    *remaining = remaining.saturating_sub(1);
                    false
                }
            },
            ControlRole::PreviousWeek => !self.hidden_navigation.contains(&Direction::Backward),
            ControlRole::NextWeek => !self.hidden_navigation.contains(&Direction::Forward),
            ControlRole::Commit => {
                !self.hidden_commit.contains(&self.current)
                    && self
                        .commit_css
                        .as_ref()
                        .is_none_or(|css| *css == locator.css)
            }
            ControlRole::Submit => !self.hidden_submit.contains(&self.current),
        }
    }
}

#[async_trait]
impl TimesheetPage for FakePage {
    async fn navigate(&mut self, url: &str) -> PageResult<()> {
        self.record(PageCall::Navigate(url.to_string()))
    }

    async fn wait_for_visible(
        &mut self,
        locator: &Locator,
        _timeout: Duration,
    ) -> PageResult<bool> {
        self.record(PageCall::WaitVisible(locator.role))?;
        Ok(self.is_visible(locator))
    }

    async fn detect_current_week(&mut self) -> PageResult<WeekId> {
        self.record(PageCall::DetectWeek)?;
        if self.broken_detection {
            return Err(PageError::WeekDisplayMissing);
        }
        Ok(self.current)
    }

    async fn locate_row(&mut self, project_number: &str) -> PageResult<Option<RowHandle>> {
        self.record(PageCall::LocateRow(project_number.to_string()))?;
        Ok(self
            .projects
            .iter()
            .position(|p| p.project_number == project_number)
            .map(|id| RowHandle {
                id,
                project_number: project_number.to_string(),
            }))
    }

    async fn locate_field(
        &mut self,
        row: &RowHandle,
        weekday: Weekday,
    ) -> PageResult<Option<FieldHandle>> {
        self.record(PageCall::LocateField(row.project_number.clone(), weekday))?;
        if self
            .missing_fields
            .contains(&(row.project_number.clone(), weekday))
        {
            return Ok(None);
        }
        Ok(Some(FieldHandle {
            row: row.clone(),
            weekday,
        }))
    }

    async fn read_value(&mut self, field: &FieldHandle) -> PageResult<String> {
        self.record(PageCall::Read(field.row.project_number.clone(), field.weekday))?;
        let (project, weekday) = Self::cell_key(field);
        Ok(self
            .value(self.current, &project, weekday)
            .unwrap_or_default()
            .to_string())
    }

    async fn clear(&mut self, field: &FieldHandle) -> PageResult<()> {
        self.record(PageCall::Clear(field.row.project_number.clone(), field.weekday))?;
        let (project, weekday) = Self::cell_key(field);
        self.values.remove(&(self.current, project, weekday));
        Ok(())
    }

    async fn write_value(&mut self, field: &FieldHandle, text: &str) -> PageResult<()> {
        self.record(PageCall::Write(
            field.row.project_number.clone(),
            field.weekday,
            text.to_string(),
        ))?;

        let key = Self::cell_key(field);
        if self.failing_writes.contains(&key) {
            return Err(PageError::Script(format!(
                "{} input for {} detached",
                key.1, key.0
            )));
        }
        if !self.rejected_writes.contains(&key) {
            self.values
                .insert((self.current, key.0, key.1), text.to_string());
        }
        Ok(())
    }

    async fn click(&mut self, locator: &Locator) -> PageResult<bool> {
        self.record(PageCall::Click(locator.role))?;
        if !self.is_visible(locator) {
            return Ok(false);
        }

        match locator.role {
            ControlRole::NextWeek | ControlRole::PreviousWeek => {
                if !self.stuck_navigation {
                    let direction = if locator.role == ControlRole::NextWeek {
                        Direction::Forward
                    } else {
                        Direction::Backward
                    };
                    self.current = self.current.step(direction);
                }
                self.transition_pending = true;
            }
            ControlRole::Commit => {
                self.committed.push(self.current);
                self.transition_pending = !self.silent_commit;
            }
            ControlRole::Submit => {
                self.submitted.push(self.current);
                self.transition_pending = !self.silent_commit;
            }
            ControlRole::Table => {}
        }
        Ok(true)
    }

    async fn wait_for_transition(&mut self, _timeout: Duration) -> PageResult<bool> {
        self.record(PageCall::WaitTransition)?;
        let observed = std::mem::take(&mut self.transition_pending);
        if !observed {
            self.missed_transitions += 1;
        }
        Ok(observed)
    }

    async fn list_projects(&mut self) -> PageResult<Vec<ProjectData>> {
        self.record(PageCall::ListProjects)?;
        Ok(self.projects.clone())
    }

    async fn screenshot(&mut self, path: &Path) -> PageResult<()> {
        self.record(PageCall::Screenshot(path.to_path_buf()))
    }

    async fn close(&mut self) -> PageResult<()> {
        if !self.closed {
            self.calls.push((self.current, PageCall::Close));
            self.closed = true;
        }
        Ok(())
    }
}
