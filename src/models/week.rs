use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::WeekSpecError;
use crate::helpers::week::parse_week_spec;

/// Weeks per year used by the linear week index.
///
/// The TMS offset arithmetic treats every year as 52 weeks long; ISO years
/// with a week 53 are not special-cased.
pub const WEEKS_PER_YEAR: i64 = 52;

/// A `(year, week)` pair as displayed by the TMS week selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WeekId {
    pub year: i32,
    pub week: u32,
}

impl WeekId {
    pub const fn new(year: i32, week: u32) -> Self {
        Self { year, week }
    }

    /// Linear index `year * 52 + week`.
    pub fn linear(self) -> i64 {
        i64::from(self.year) * WEEKS_PER_YEAR + i64::from(self.week)
    }

    /// Inverse of [`WeekId::linear`]. Week 53 of a year folds into week 1 of
    /// the next one.
    pub fn from_linear(index: i64) -> Self {
        let zero_based = index - 1;
        Self {
            year: zero_based.div_euclid(WEEKS_PER_YEAR) as i32,
            week: (zero_based.rem_euclid(WEEKS_PER_YEAR) + 1) as u32,
        }
    }

    /// The week one navigation step away in `direction`.
    pub fn step(self, direction: Direction) -> Self {
        match direction {
            Direction::Forward => Self::from_linear(self.linear() + 1),
            Direction::Backward => Self::from_linear(self.linear() - 1),
        }
    }
}

impl fmt::Display for WeekId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "week {} of {}", self.week, self.year)
    }
}

/// Navigation direction of the week selector arrows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Forward,
    Backward,
}

impl Direction {
    /// `None` when no navigation is needed.
    pub fn from_offset(offset: i64) -> Option<Self> {
        match offset {
            0 => None,
            o if o > 0 => Some(Self::Forward),
            _ => Some(Self::Backward),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Forward => f.write_str("forward"),
            Self::Backward => f.write_str("backward"),
        }
    }
}

/// Ascending, duplicate-free week numbers in `1..=53`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeekSpec {
    weeks: Vec<u32>,
}

impl WeekSpec {
    pub fn parse(spec: &str) -> Result<Self, WeekSpecError> {
        parse_week_spec(spec)
    }

    /// Callers guarantee the weeks are sorted, deduplicated and in range.
    pub(crate) fn from_sorted(weeks: Vec<u32>) -> Self {
        debug_assert!(weeks.windows(2).all(|pair| pair[0] < pair[1]));
        Self { weeks }
    }

    pub fn weeks(&self) -> &[u32] {
        &self.weeks
    }

    pub fn len(&self) -> usize {
        self.weeks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weeks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.weeks.iter().copied()
    }
}

impl FromStr for WeekSpec {
    type Err = WeekSpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_week_spec(s)
    }
}

impl fmt::Display for WeekSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .weeks
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        f.write_str(&joined)
    }
}
