//! DOM selectors for the live TMS (an Angular Material application).

use crate::models::Weekday;
use crate::page::{ControlRole, Locator};

pub const TABLE: &str = "table[mat-table]";

/// Project rows. Header and footer rows are not `mat-row`.
pub const PROJECT_ROWS: &str = "tr.mat-row, tbody tr[mat-row]";

pub const PROJECT_CELL: &str = "td.cdk-column-Project";
pub const NAME_CELL: &str = "td.cdk-column-ProjectName, td.cdk-column-Name";
pub const TASK_CELL: &str = "td.cdk-column-Task";

/// Candidates for the element showing e.g. "Week 48, 2025", in priority order.
pub const WEEK_DISPLAY: &str = r#".week-display, .week-selector, [class*="week"], h1, h2, h3"#;

pub const WEEK_ARROW_LEFT: &str = concat!(
    r#"button:has([class*="arrow-left"]), button:has([class*="prev"]), "#,
    r#"a:has([class*="arrow-left"]), a:has([class*="prev"]), "#,
    r#"[class*="arrow-left"], [class*="prev"]"#,
);

pub const WEEK_ARROW_RIGHT: &str = concat!(
    r#"button:has([class*="arrow-right"]), button:has([class*="next"]), "#,
    r#"a:has([class*="arrow-right"]), a:has([class*="next"]), "#,
    r#"[class*="arrow-right"], [class*="next"]"#,
);

pub const SAVE_TEXT: &str = "Save";
pub const SUBMIT_TEXT: &str = "Promark";

/// Day input inside a project row.
pub fn day_input(weekday: Weekday) -> String {
    format!(r#"input[name="{}"].dayField"#, weekday.as_str())
}

pub fn table() -> Locator {
    Locator::new(ControlRole::Table, TABLE)
}

pub fn previous_week() -> Locator {
    Locator::new(ControlRole::PreviousWeek, WEEK_ARROW_LEFT)
}

pub fn next_week() -> Locator {
    Locator::new(ControlRole::NextWeek, WEEK_ARROW_RIGHT)
}

/// The Save control followed by its two fallbacks.
pub fn commit() -> Vec<Locator> {
    vec![
        Locator::new(ControlRole::Commit, "button").with_text(SAVE_TEXT),
        Locator::new(ControlRole::Commit, "a").with_text(SAVE_TEXT),
        Locator::new(ControlRole::Commit, "button.btn").with_text(SAVE_TEXT),
    ]
}

/// The Promark link followed by its styled variant.
pub fn submit() -> Vec<Locator> {
    vec![
        Locator::new(ControlRole::Submit, "a").with_text(SUBMIT_TEXT),
        Locator::new(ControlRole::Submit, "a.btn-primary").with_text(SUBMIT_TEXT),
    ]
}
