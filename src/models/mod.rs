pub mod result;
pub mod row;
pub mod week;

pub use result::{
    CellFillResult, CellOutcome, FillSummary, ProjectFillResult, SkippedWeek, WeekFill,
};
pub use row::{TimesheetRow, Weekday};
pub use week::{Direction, WeekId, WeekSpec};
