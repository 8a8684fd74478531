//! Week list parsing, offset arithmetic and week display parsing.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::LazyLock;

use crate::error::{OffsetBoundsError, WeekDisplayError, WeekSpecError};
use crate::models::{WeekId, WeekSpec};

pub const MIN_WEEK: u32 = 1;
pub const MAX_WEEK: u32 = 53;

const MIN_YEAR: i32 = 2000;
const MAX_YEAR: i32 = 2100;

/// How far the week selector may be driven from the displayed week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OffsetBounds {
    pub max_forward: u32,
    pub max_backward: u32,
}

impl Default for OffsetBounds {
    fn default() -> Self {
        Self {
            max_forward: 10,
            max_backward: 20,
        }
    }
}

/// Parse `"48"`, `"48,50"`, `"48-52"` or `"45-48,50"` into a week list.
///
/// Whitespace around commas is ignored. Whitespace inside an atom is not.
pub fn parse_week_spec(spec: &str) -> Result<WeekSpec, WeekSpecError> {
    let trimmed = spec.trim();
    if trimmed.is_empty() {
        return Err(WeekSpecError::Empty);
    }

    let mut weeks = BTreeSet::new();
    for atom in trimmed.split(',') {
        let atom = atom.trim();
        if atom.is_empty() {
            return Err(WeekSpecError::EmptyAtom {
                spec: trimmed.to_string(),
            });
        }

        let parts: Vec<&str> = atom.split('-').collect();
        match parts.as_slice() {
            [single] => {
                let week = parse_number(single, atom)?;
                weeks.insert(check_range(week, single)?);
            }
            [start, end] => {
                let first = parse_number(start, atom)?;
                let last = parse_number(end, atom)?;
                if first > last {
                    return Err(WeekSpecError::ReversedRange {
                        atom: atom.to_string(),
                        start: first,
                        end: last,
                    });
                }
                let first = check_range(first, start)?;
                let last = check_range(last, end)?;
                weeks.extend(first..=last);
            }
            _ => {
                return Err(WeekSpecError::MalformedAtom {
                    atom: atom.to_string(),
                });
            }
        }
    }

    if weeks.is_empty() {
        return Err(WeekSpecError::NoWeeks {
            spec: trimmed.to_string(),
        });
    }

    Ok(WeekSpec::from_sorted(weeks.into_iter().collect()))
}

fn parse_number(text: &str, atom: &str) -> Result<u64, WeekSpecError> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return Err(WeekSpecError::MalformedAtom {
            atom: atom.to_string(),
        });
    }
    text.parse().map_err(|_| WeekSpecError::OutOfRange {
        value: text.to_string(),
    })
}

fn check_range(value: u64, text: &str) -> Result<u32, WeekSpecError> {
    match u32::try_from(value) {
        Ok(week) if (MIN_WEEK..=MAX_WEEK).contains(&week) => Ok(week),
        _ => Err(WeekSpecError::OutOfRange {
            value: text.to_string(),
        }),
    }
}

/// Signed number of navigation steps from `current` to `target`.
pub fn week_offset(current: WeekId, target: WeekId) -> i64 {
    target.linear() - current.linear()
}

pub fn check_offset(offset: i64, bounds: OffsetBounds) -> Result<(), OffsetBoundsError> {
    if offset > i64::from(bounds.max_forward) {
        return Err(OffsetBoundsError::Forward {
            offset,
            max: bounds.max_forward,
        });
    }
    if offset < -i64::from(bounds.max_backward) {
        return Err(OffsetBoundsError::Backward {
            offset,
            max: bounds.max_backward,
        });
    }
    Ok(())
}

static WEEK_DISPLAY_PATTERNS: LazyLock<[Regex; 3]> = LazyLock::new(|| {
    [
        Regex::new(r"[Ww]eek\s*(\d+)[,\s]+(\d{4})"),
        Regex::new(r"[Ww](\d+)\s+(\d{4})"),
        Regex::new(r"(\d+)[,\s]+(\d{4})"),
    ]
    .map(|pattern| pattern.expect("week display pattern is valid"))
});

/// Parse the TMS week selector text, e.g. `"Week 48, 2025"` or `"W48 2025"`.
pub fn parse_week_display(text: &str) -> Result<WeekId, WeekDisplayError> {
    let text = text.trim();
    let captures = WEEK_DISPLAY_PATTERNS
        .iter()
        .find_map(|pattern| pattern.captures(text))
        .ok_or_else(|| WeekDisplayError::Unrecognized(text.to_string()))?;

    let week: u32 = captures[1]
        .parse()
        .map_err(|_| WeekDisplayError::Unrecognized(text.to_string()))?;
    let year: i32 = captures[2]
        .parse()
        .map_err(|_| WeekDisplayError::Unrecognized(text.to_string()))?;

    if !(MIN_WEEK..=MAX_WEEK).contains(&week) {
        return Err(WeekDisplayError::InvalidWeek(week));
    }
    if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
        return Err(WeekDisplayError::InvalidYear(year));
    }

    Ok(WeekId::new(year, week))
}

/// Year bounds accepted from the command line and the week display.
pub fn year_in_range(year: i32) -> bool {
    (MIN_YEAR..=MAX_YEAR).contains(&year)
}
