use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::{
    config::Config,
    error::{FillError, FillIssue, PageError, WeekFailure},
    helpers::{
        login::{LoginGate, LoginOutcome},
        template::ProjectData,
        week::{check_offset, week_offset},
    },
    logging,
    models::{
        CellFillResult, Direction, FillSummary, ProjectFillResult, TimesheetRow, WeekFill, WeekId,
        WeekSpec, Weekday,
    },
    page::{Locator, RowHandle, TimesheetPage},
};

/// What a week-level failure does to the rest of the batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStrategy {
    /// Stop at the first failed week. Nothing is returned for earlier weeks.
    #[default]
    AbortBatch,
    /// Record the failed week in the summary and carry on.
    SkipWeek,
}

/// Where a fill run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    DetectingBaseline,
    NavigatingToWeek(WeekId),
    VerifyingArrival(WeekId),
    FillingWeek(WeekId),
    SavingWeek(WeekId),
    SubmittingWeek(WeekId),
    Done,
    Failed,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Idle => f.write_str("idle"),
            RunState::DetectingBaseline => f.write_str("detecting baseline"),
            RunState::NavigatingToWeek(week) => write!(f, "navigating to {week}"),
            RunState::VerifyingArrival(week) => write!(f, "verifying arrival at {week}"),
            RunState::FillingWeek(week) => write!(f, "filling {week}"),
            RunState::SavingWeek(week) => write!(f, "saving {week}"),
            RunState::SubmittingWeek(week) => write!(f, "submitting {week}"),
            RunState::Done => f.write_str("done"),
            RunState::Failed => f.write_str("failed"),
        }
    }
}

fn enter(state: &mut RunState, next: RunState) {
    info!("State: {} -> {}", state, next);
    *state = next;
}

/// Text written into a day input: whole hours keep one decimal ("8.0").
pub fn hours_text(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.1}")
    } else {
        value.to_string()
    }
}

/// Drives the TMS week selector and fills timesheet rows, week by week.
#[derive(Debug, Clone)]
pub struct FillService {
    pub config: Config,
}

impl FillService {
    pub fn new(config: Config) -> Self {
        info!("Creating new FillService instance");
        Self { config }
    }

    /// Weeks to process: the requested ones in the configured year (or the
    /// baseline's), otherwise just the displayed week.
    pub fn target_weeks(&self, baseline: WeekId, weeks: Option<&WeekSpec>) -> Vec<WeekId> {
        match weeks {
            Some(spec) => {
                let year = self.config.year.unwrap_or(baseline.year);
                spec.iter().map(|week| WeekId::new(year, week)).collect()
            }
            None => vec![baseline],
        }
    }

    /// Fill `rows` into every target week.
    ///
    /// Returns the aggregate only if the run completes. Under
    /// [`FailureStrategy::AbortBatch`] the first failed week ends the run with
    /// an error and whatever was gathered so far is dropped.
    pub async fn fill<P>(
        &self,
        page: &mut P,
        rows: &[TimesheetRow],
        weeks: Option<&WeekSpec>,
    ) -> Result<FillSummary, FillError>
    where
        P: TimesheetPage + ?Sized,
    {
        let span = info_span!("fill", rows = rows.len());
        async move {
            let mut state = RunState::Idle;
            let mut summary = FillSummary::start(rows);

            enter(&mut state, RunState::DetectingBaseline);
            let baseline = match page.detect_current_week().await {
                Ok(week) => week,
                Err(e) => {
                    enter(&mut state, RunState::Failed);
                    error!("Could not detect the displayed week: {}", e);
                    return Err(FillError::BaselineUndetected(e));
                }
            };

            let targets = self.target_weeks(baseline, weeks);
            info!(
                "Baseline is {}; {} target week(s) to process",
                baseline,
                targets.len()
            );

            for target in targets {
                let span = info_span!("week", year = target.year, week = target.week);
                match self
                    .process_week(page, rows, target, &mut state)
                    .instrument(span)
                    .await
                {
                    Ok(fill) => {
                        info!(
                            "Finished {} ({} project(s))",
                            target,
                            fill.project_results.len()
                        );
                        summary.merge_week(fill);
                    }
                    Err(cause) => match self.config.failure_strategy {
                        FailureStrategy::AbortBatch => {
                            enter(&mut state, RunState::Failed);
                            error!("Stopping at {}: {}", target, cause);
                            return Err(FillError::WeekAborted {
                                week: target,
                                cause,
                            });
                        }
                        FailureStrategy::SkipWeek => {
                            warn!("Skipping {}: {}", target, cause);
                            summary.skip_week(target, &cause);
                        }
                    },
                }
            }

            enter(&mut state, RunState::Done);
            summary.finish();
            Ok(summary)
        }
        .instrument(span)
        .await
    }

    async fn process_week<P>(
        &self,
        page: &mut P,
        rows: &[TimesheetRow],
        target: WeekId,
        state: &mut RunState,
    ) -> Result<WeekFill, WeekFailure>
    where
        P: TimesheetPage + ?Sized,
    {
        let current = page.detect_current_week().await.map_err(WeekFailure::Detect)?;
        let offset = week_offset(current, target);
        check_offset(offset, self.config.bounds)?;

        let arrived = match Direction::from_offset(offset) {
            Some(direction) => {
                enter(state, RunState::NavigatingToWeek(target));
                self.navigate(page, direction, offset.unsigned_abs()).await?;
                enter(state, RunState::VerifyingArrival(target));
                page.detect_current_week().await.map_err(WeekFailure::Detect)?
            }
            None => {
                info!("Already on {}", target);
                current
            }
        };
        if arrived != target {
            return Err(WeekFailure::ArrivalMismatch {
                expected: target,
                actual: arrived,
            });
        }

        enter(state, RunState::FillingWeek(target));
        let mut project_results = Vec::with_capacity(rows.len());
        for row in rows {
            project_results.push(self.fill_project(page, row, target).await);
        }

        let committed = if self.config.auto_submit {
            enter(state, RunState::SavingWeek(target));
            self.commit_week(page).await?;
            true
        } else {
            false
        };

        let submitted = if committed && self.config.submit_after_save {
            enter(state, RunState::SubmittingWeek(target));
            self.submit_week(page).await?;
            true
        } else {
            false
        };

        Ok(WeekFill {
            week: target,
            project_results,
            committed,
            submitted,
        })
    }

    async fn navigate<P>(
        &self,
        page: &mut P,
        direction: Direction,
        steps: u64,
    ) -> Result<(), WeekFailure>
    where
        P: TimesheetPage + ?Sized,
    {
        let control = match direction {
            Direction::Forward => &self.config.controls.next_week,
            Direction::Backward => &self.config.controls.previous_week,
        };
        info!("Navigating {} {} week(s)", direction, steps);

        for step in 1..=steps {
            let visible = page
                .wait_for_visible(control, self.config.timeouts.element())
                .await?;
            if !visible || !page.click(control).await? {
                error!("{} navigation control not found ({})", direction, control);
                return Err(WeekFailure::NavigationControlMissing { direction });
            }
            debug!("Clicked {} ({}/{})", direction, step, steps);
            self.settle(page).await?;
        }
        Ok(())
    }

    async fn settle<P>(&self, page: &mut P) -> Result<(), PageError>
    where
        P: TimesheetPage + ?Sized,
    {
        let pause = self.config.timeouts.navigation_settle();
        if !pause.is_zero() {
            sleep(pause).await;
        }
        let table = &self.config.controls.table;
        if !page
            .wait_for_visible(table, self.config.timeouts.navigation())
            .await?
        {
            warn!("Timesheet table not visible after navigation");
        }
        Ok(())
    }

    async fn fill_project<P>(
        &self,
        page: &mut P,
        row: &TimesheetRow,
        week: WeekId,
    ) -> ProjectFillResult
    where
        P: TimesheetPage + ?Sized,
    {
        let project = row.project_number();
        let handle = match page.locate_row(project).await {
            Ok(Some(handle)) => handle,
            Ok(None) => {
                warn!("Project {} not found in table", project);
                return ProjectFillResult::not_found(project, week, FillIssue::RowNotFound);
            }
            Err(e) => {
                warn!("Failed to locate project {}: {}", project, e);
                return ProjectFillResult::not_found(
                    project,
                    week,
                    FillIssue::Driver {
                        message: e.to_string(),
                    },
                );
            }
        };

        let mut result = ProjectFillResult::found(project, week);
        for (weekday, value) in row.entries() {
            result.record(self.fill_cell(page, &handle, weekday, value).await);
        }

        info!(
            "Project {}: {} filled, {} skipped, {} failed",
            project, result.cells_filled, result.cells_skipped, result.cells_failed
        );
        result
    }

    async fn fill_cell<P>(
        &self,
        page: &mut P,
        row: &RowHandle,
        weekday: Weekday,
        value: f64,
    ) -> CellFillResult
    where
        P: TimesheetPage + ?Sized,
    {
        match self.try_fill_cell(page, row, weekday, value).await {
            Ok(cell) => cell,
            Err(e) => {
                warn!("{} {}: {}", row.project_number, weekday, e);
                CellFillResult::failed(
                    &row.project_number,
                    weekday,
                    value,
                    FillIssue::Driver {
                        message: e.to_string(),
                    },
                )
            }
        }
    }

    async fn try_fill_cell<P>(
        &self,
        page: &mut P,
        row: &RowHandle,
        weekday: Weekday,
        value: f64,
    ) -> Result<CellFillResult, PageError>
    where
        P: TimesheetPage + ?Sized,
    {
        let project = row.project_number.as_str();
        let Some(field) = page.locate_field(row, weekday).await? else {
            warn!("{} {}: input field not found", project, weekday);
            return Ok(CellFillResult::failed(
                project,
                weekday,
                value,
                FillIssue::FieldNotFound { weekday },
            ));
        };

        let existing = page.read_value(&field).await?;
        let occupied = !existing.trim().is_empty();
        if occupied && self.config.no_overwrite {
            debug!("{} {}: keeping existing value {:?}", project, weekday, existing);
            return Ok(CellFillResult::skipped(project, weekday, value));
        }

        if occupied {
            page.clear(&field).await?;
        }
        let text = hours_text(value);
        page.write_value(&field, &text).await?;

        let written = page.read_value(&field).await?;
        if written.trim().is_empty() {
            warn!("{} {}: value {} did not stick", project, weekday, text);
            return Ok(CellFillResult::failed(
                project,
                weekday,
                value,
                FillIssue::VerificationMismatch { weekday },
            ));
        }

        debug!("{} {} = {}", project, weekday, text);
        Ok(CellFillResult::success(project, weekday, value))
    }

    async fn commit_week<P>(&self, page: &mut P) -> Result<(), WeekFailure>
    where
        P: TimesheetPage + ?Sized,
    {
        let locators = &self.config.controls.commit;
        if !self.press(page, locators, "Save").await? {
            return Err(WeekFailure::CommitUnavailable {
                attempts: locators.len(),
            });
        }
        info!("Week saved");
        Ok(())
    }

    async fn submit_week<P>(&self, page: &mut P) -> Result<(), WeekFailure>
    where
        P: TimesheetPage + ?Sized,
    {
        let locators = &self.config.controls.submit;
        if !self.press(page, locators, "Promark").await? {
            return Err(WeekFailure::SubmitUnavailable {
                attempts: locators.len(),
            });
        }
        info!("Week submitted");
        Ok(())
    }

    /// Click the first available control in `locators`, then wait for the
    /// page to settle. `Ok(false)` when none could be clicked.
    async fn press<P>(
        &self,
        page: &mut P,
        locators: &[Locator],
        name: &str,
    ) -> Result<bool, WeekFailure>
    where
        P: TimesheetPage + ?Sized,
    {
        let timeouts = &self.config.timeouts;

        // The primary locator gets the full wait; fallbacks are probed once.
        let mut first_visible = None;
        for (index, locator) in locators.iter().enumerate() {
            let timeout = if index == 0 {
                timeouts.commit()
            } else {
                Duration::ZERO
            };
            if page.wait_for_visible(locator, timeout).await? {
                first_visible = Some(index);
                break;
            }
            debug!("{} control {} not visible", name, locator);
        }

        let clicked = match first_visible {
            Some(start) => page.click_fallback(&locators[start..]).await?,
            None => None,
        };
        if clicked.is_none() {
            error!("{} control not available", name);
            return Ok(false);
        }

        if !page.wait_for_transition(timeouts.post_commit_settle()).await? {
            debug!(
                "No transition observed after {}, waiting {:?}",
                name,
                timeouts.post_commit_delay()
            );
            sleep(timeouts.post_commit_delay()).await;
        }
        Ok(true)
    }

    /// Navigate to the TMS, wait for login and for the timesheet table.
    async fn open<P: TimesheetPage>(
        &self,
        page: &mut P,
        login: &dyn LoginGate,
    ) -> Result<(), FillError> {
        page.navigate(&self.config.tms_url).await?;

        let outcome = login.confirm(page).await.map_err(FillError::Login)?;
        if outcome == LoginOutcome::AssumedAfterTimeout {
            warn!("Proceeding without a confirmed login");
        }

        if !page
            .wait_for_visible(&self.config.controls.table, self.config.timeouts.element())
            .await?
        {
            error!("Timesheet table not visible after login");
            return Err(FillError::TableNotVisible);
        }
        info!("Timesheet table found");
        Ok(())
    }

    /// One complete session: open the TMS, log in, fill, then close the page
    /// whatever happened.
    pub async fn run_session<P: TimesheetPage>(
        &self,
        page: &mut P,
        login: &dyn LoginGate,
        rows: &[TimesheetRow],
        weeks: Option<&WeekSpec>,
    ) -> Result<FillSummary, FillError> {
        logging::section("TMS TIMESHEET FILL");
        let result = match self.open(page, login).await {
            Ok(()) => self.fill(page, rows, weeks).await,
            Err(e) => Err(e),
        };

        if result.is_err() {
            if let Some(path) = &self.config.screenshot_on_error {
                if let Err(e) = page.screenshot(path).await {
                    warn!("Failed to save error screenshot: {}", e);
                }
            }
        }
        if let Err(e) = page.close().await {
            warn!("Failed to close page: {}", e);
        }
        result
    }

    /// Open the TMS and list the projects in its table, for the CSV template.
    pub async fn collect_projects<P: TimesheetPage>(
        &self,
        page: &mut P,
        login: &dyn LoginGate,
    ) -> Result<Vec<ProjectData>, FillError> {
        let result = match self.open(page, login).await {
            Ok(()) => page.list_projects().await.map_err(FillError::from),
            Err(e) => Err(e),
        };
        if let Err(e) = page.close().await {
            warn!("Failed to close page: {}", e);
        }
        result
    }

    /// Log what a run would do, without touching a browser.
    pub fn describe_plan(&self, rows: &[TimesheetRow], weeks: Option<&WeekSpec>) {
        logging::section("DRY RUN");
        info!("Loaded {} project(s):", rows.len());
        for row in rows {
            info!(
                "  {} {} ({} day(s), {:.2} hours)",
                row.project_number(),
                row.project_name(),
                row.planned_days(),
                row.total_hours()
            );
        }

        match (weeks, self.config.year) {
            (Some(spec), Some(year)) => info!("Target weeks: {} of {}", spec, year),
            (Some(spec), None) => info!("Target weeks: {} of the displayed year", spec),
            (None, _) => info!("Target week: the week displayed after login"),
        }
        info!(
            "Overwrite existing values: {}; save each week: {}",
            !self.config.no_overwrite, self.config.auto_submit
        );

        let planned = FillSummary::start(rows);
        info!("Daily totals (planned):");
        for (day, total) in &planned.daily_totals {
            info!("  {}: {:.2} hours", day.label(), total);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hours_keep_a_decimal() {
        assert_eq!(hours_text(8.0), "8.0");
        assert_eq!(hours_text(7.5), "7.5");
        assert_eq!(hours_text(7.4), "7.4");
        assert_eq!(hours_text(0.0), "0.0");
    }

    #[test]
    fn target_weeks_default_to_the_displayed_one() {
        let service = FillService::new(Config::default());
        let baseline = WeekId::new(2025, 48);
        assert_eq!(service.target_weeks(baseline, None), vec![baseline]);

        let spec = WeekSpec::parse("49,47").unwrap();
        assert_eq!(
            service.target_weeks(baseline, Some(&spec)),
            vec![WeekId::new(2025, 47), WeekId::new(2025, 49)]
        );
    }

    #[test]
    fn configured_year_overrides_the_displayed_one() {
        let service = FillService::new(Config {
            year: Some(2026),
            ..Config::default()
        });
        let spec = WeekSpec::parse("1").unwrap();
        assert_eq!(
            service.target_weeks(WeekId::new(2025, 52), Some(&spec)),
            vec![WeekId::new(2026, 1)]
        );
    }

    #[test]
    fn dry_run_plan_needs_no_page() {
        let service = FillService::new(Config {
            dry_run: true,
            year: Some(2025),
            ..Config::default()
        });
        let rows = vec![TimesheetRow::with_entries("A", &[(Weekday::Monday, 7.5)]).unwrap()];
        service.describe_plan(&rows, Some(&WeekSpec::parse("48-49").unwrap()));
        service.describe_plan(&rows, None);
    }

    #[test]
    fn states_render_for_logs() {
        let week = WeekId::new(2025, 48);
        assert_eq!(RunState::NavigatingToWeek(week).to_string(), "navigating to week 48 of 2025");
        assert_eq!(RunState::Failed.to_string(), "failed");
    }
}
