use chrono::{DateTime, Local};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::error::FillIssue;
use crate::models::row::{TimesheetRow, Weekday};
use crate::models::week::WeekId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CellOutcome {
    Success,
    Skipped,
    Failed,
}

/// Outcome of writing one (project, weekday) cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CellFillResult {
    pub project_number: String,
    pub weekday: Weekday,
    pub value: f64,
    pub outcome: CellOutcome,
    pub error: Option<FillIssue>,
}

impl CellFillResult {
    pub fn success(project_number: &str, weekday: Weekday, value: f64) -> Self {
        Self {
            project_number: project_number.to_string(),
            weekday,
            value,
            outcome: CellOutcome::Success,
            error: None,
        }
    }

    pub fn skipped(project_number: &str, weekday: Weekday, value: f64) -> Self {
        Self {
            outcome: CellOutcome::Skipped,
            ..Self::success(project_number, weekday, value)
        }
    }

    pub fn failed(project_number: &str, weekday: Weekday, value: f64, issue: FillIssue) -> Self {
        Self {
            outcome: CellOutcome::Failed,
            error: Some(issue),
            ..Self::success(project_number, weekday, value)
        }
    }
}

/// Outcome of filling every instructed cell of one project for one week.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectFillResult {
    pub project_number: String,
    pub week: WeekId,
    pub cells_filled: usize,
    pub cells_skipped: usize,
    pub cells_failed: usize,
    pub cell_results: Vec<CellFillResult>,
    pub found: bool,
    /// Only set when `found` is false.
    pub error: Option<FillIssue>,
}

impl ProjectFillResult {
    pub fn found(project_number: &str, week: WeekId) -> Self {
        Self {
            project_number: project_number.to_string(),
            week,
            cells_filled: 0,
            cells_skipped: 0,
            cells_failed: 0,
            cell_results: Vec::new(),
            found: true,
            error: None,
        }
    }

    pub fn not_found(project_number: &str, week: WeekId, issue: FillIssue) -> Self {
        Self {
            found: false,
            error: Some(issue),
            ..Self::found(project_number, week)
        }
    }

    pub fn record(&mut self, cell: CellFillResult) {
        match cell.outcome {
            CellOutcome::Success => self.cells_filled += 1,
            CellOutcome::Skipped => self.cells_skipped += 1,
            CellOutcome::Failed => self.cells_failed += 1,
        }
        self.cell_results.push(cell);
    }
}

/// Everything gathered for one target week before it is merged into the run.
#[derive(Debug, Clone, PartialEq)]
pub struct WeekFill {
    pub week: WeekId,
    pub project_results: Vec<ProjectFillResult>,
    pub committed: bool,
    pub submitted: bool,
}

/// A week abandoned under the skip-week failure strategy.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedWeek {
    pub week: WeekId,
    pub reason: String,
}

/// Run-level aggregate handed to the caller after a successful run.
///
/// `daily_totals` are the planned hours from the input rows, not what the
/// page confirmed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FillSummary {
    pub total_projects: usize,
    pub projects_found: usize,
    pub projects_not_found: usize,
    pub total_cells_filled: usize,
    pub total_cells_skipped: usize,
    pub total_cells_failed: usize,
    pub project_results: Vec<ProjectFillResult>,
    pub missing_projects: Vec<String>,
    pub daily_totals: BTreeMap<Weekday, f64>,
    pub weeks_processed: Vec<WeekId>,
    pub weeks_committed: Vec<WeekId>,
    pub weeks_submitted: Vec<WeekId>,
    pub skipped_weeks: Vec<SkippedWeek>,
    pub started_at: Option<DateTime<Local>>,
    pub finished_at: Option<DateTime<Local>>,
}

impl FillSummary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh summary for a run over `rows`, stamped with the start time.
    pub fn start(rows: &[TimesheetRow]) -> Self {
        let mut summary = Self::new();
        summary.calculate_daily_totals(rows);
        summary.started_at = Some(Local::now());
        summary
    }

    pub fn add_project_result(&mut self, result: ProjectFillResult) {
        self.total_projects += 1;

        if result.found {
            self.projects_found += 1;
            self.total_cells_filled += result.cells_filled;
            self.total_cells_skipped += result.cells_skipped;
            self.total_cells_failed += result.cells_failed;
        } else {
            self.projects_not_found += 1;
            // Listed once however many weeks it was missing from.
            if !self.missing_projects.contains(&result.project_number) {
                self.missing_projects.push(result.project_number.clone());
            }
        }

        self.project_results.push(result);
    }

    pub fn merge_week(&mut self, fill: WeekFill) {
        self.weeks_processed.push(fill.week);
        if fill.committed {
            self.weeks_committed.push(fill.week);
        }
        if fill.submitted {
            self.weeks_submitted.push(fill.week);
        }
        for result in fill.project_results {
            self.add_project_result(result);
        }
    }

    pub fn skip_week(&mut self, week: WeekId, reason: impl fmt::Display) {
        self.skipped_weeks.push(SkippedWeek {
            week,
            reason: reason.to_string(),
        });
    }

    pub fn calculate_daily_totals(&mut self, rows: &[TimesheetRow]) {
        let mut totals: BTreeMap<Weekday, f64> =
            Weekday::ALL.into_iter().map(|day| (day, 0.0)).collect();

        for row in rows {
            for (day, value) in row.entries() {
                *totals.entry(day).or_default() += value;
            }
        }

        self.daily_totals = totals;
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Local::now());
    }

    /// True when any cell failed, any project was missing or any week was skipped.
    pub fn has_failures(&self) -> bool {
        self.total_cells_failed > 0 || self.projects_not_found > 0 || !self.skipped_weeks.is_empty()
    }
}

impl fmt::Display for FillSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(60);
        writeln!(f, "{rule}")?;
        writeln!(f, "FILL OPERATION SUMMARY")?;
        writeln!(f, "{rule}")?;

        if !self.weeks_processed.is_empty() {
            writeln!(f, "\nWeeks:")?;
            for week in &self.weeks_processed {
                let committed = match (
                    self.weeks_committed.contains(week),
                    self.weeks_submitted.contains(week),
                ) {
                    (true, true) => " (saved, submitted)",
                    (true, false) => " (saved)",
                    _ => "",
                };
                writeln!(f, "  - {week}{committed}")?;
            }
        }

        writeln!(f, "\nProjects:")?;
        writeln!(f, "  Total: {}", self.total_projects)?;
        writeln!(f, "  Found: {}", self.projects_found)?;
        writeln!(f, "  Not Found: {}", self.projects_not_found)?;
        writeln!(f, "\nCells:")?;
        writeln!(f, "  Filled: {}", self.total_cells_filled)?;
        writeln!(f, "  Skipped: {}", self.total_cells_skipped)?;
        writeln!(f, "  Failed: {}", self.total_cells_failed)?;

        if !self.missing_projects.is_empty() {
            writeln!(f, "\nMissing Projects:")?;
            for project in &self.missing_projects {
                writeln!(f, "  - {project}")?;
            }
        }

        if !self.skipped_weeks.is_empty() {
            writeln!(f, "\nSkipped Weeks:")?;
            for skipped in &self.skipped_weeks {
                writeln!(f, "  - {}: {}", skipped.week, skipped.reason)?;
            }
        }

        if !self.daily_totals.is_empty() {
            writeln!(f, "\nDaily Totals (planned):")?;
            for (day, total) in &self.daily_totals {
                writeln!(f, "  {}: {:.2} hours", day.label(), total)?;
            }
        }

        write!(f, "{rule}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn week() -> WeekId {
        WeekId::new(2025, 48)
    }

    #[test]
    fn project_result_counts_outcomes() {
        let mut result = ProjectFillResult::found("P-1", week());
        result.record(CellFillResult::success("P-1", Weekday::Monday, 7.5));
        result.record(CellFillResult::skipped("P-1", Weekday::Tuesday, 7.5));
        result.record(CellFillResult::failed(
            "P-1",
            Weekday::Wednesday,
            7.5,
            FillIssue::FieldNotFound {
                weekday: Weekday::Wednesday,
            },
        ));

        assert_eq!(
            (result.cells_filled, result.cells_skipped, result.cells_failed),
            (1, 1, 1)
        );
        assert_eq!(result.cell_results.len(), 3);
    }

    #[test]
    fn missing_projects_do_not_touch_cell_counters() {
        let mut summary = FillSummary::new();
        let mut found = ProjectFillResult::found("A", week());
        found.record(CellFillResult::success("A", Weekday::Monday, 7.5));
        summary.add_project_result(found);
        summary.add_project_result(ProjectFillResult::not_found(
            "B",
            week(),
            FillIssue::RowNotFound,
        ));

        assert_eq!(summary.total_projects, 2);
        assert_eq!(summary.projects_found, 1);
        assert_eq!(summary.projects_not_found, 1);
        assert_eq!(summary.total_cells_filled, 1);
        assert_eq!(summary.missing_projects, vec!["B".to_string()]);
        assert!(summary.has_failures());
    }

    #[test]
    fn daily_totals_reflect_planned_hours() {
        let rows = vec![
            TimesheetRow::with_entries("A", &[(Weekday::Monday, 7.5), (Weekday::Friday, 1.0)])
                .unwrap(),
            TimesheetRow::with_entries("B", &[(Weekday::Monday, 0.5)]).unwrap(),
        ];
        let summary = FillSummary::start(&rows);

        assert_eq!(summary.daily_totals[&Weekday::Monday], 8.0);
        assert_eq!(summary.daily_totals[&Weekday::Friday], 1.0);
        assert_eq!(summary.daily_totals[&Weekday::Sunday], 0.0);
        assert_eq!(summary.daily_totals.len(), 7);
        assert!(summary.started_at.is_some());
    }

    #[test]
    fn merge_week_tracks_commits() {
        let mut summary = FillSummary::new();
        summary.merge_week(WeekFill {
            week: week(),
            project_results: vec![ProjectFillResult::found("A", week())],
            committed: true,
            submitted: true,
        });
        summary.merge_week(WeekFill {
            week: WeekId::new(2025, 49),
            project_results: vec![],
            committed: false,
            submitted: false,
        });

        assert_eq!(summary.weeks_processed.len(), 2);
        assert_eq!(summary.weeks_committed, vec![week()]);
        assert_eq!(summary.weeks_submitted, vec![week()]);
        assert_eq!(summary.projects_found, 1);
        assert!(summary.to_string().contains("week 48 of 2025 (saved, submitted)"));
    }

    #[test]
    fn project_missing_every_week_is_listed_once() {
        let mut summary = FillSummary::new();
        for n in 48..=50 {
            let week = WeekId::new(2025, n);
            summary.merge_week(WeekFill {
                week,
                project_results: vec![ProjectFillResult::not_found(
                    "B",
                    week,
                    FillIssue::RowNotFound,
                )],
                committed: false,
                submitted: false,
            });
        }

        assert_eq!(summary.missing_projects, vec!["B".to_string()]);
        assert_eq!(summary.projects_not_found, 3);
        let weeks: Vec<_> = summary.project_results.iter().map(|r| r.week.week).collect();
        assert_eq!(weeks, vec![48, 49, 50]);
    }

    #[test]
    fn display_lists_missing_projects_and_totals() {
        let mut summary = FillSummary::start(&[TimesheetRow::with_entries(
            "A",
            &[(Weekday::Monday, 7.5)],
        )
        .unwrap()]);
        summary.add_project_result(ProjectFillResult::not_found(
            "B",
            week(),
            FillIssue::RowNotFound,
        ));

        let text = summary.to_string();
        assert!(text.contains("FILL OPERATION SUMMARY"));
        assert!(text.contains("Missing Projects:\n  - B"));
        assert!(text.contains("Monday: 7.50 hours"));
    }
}
