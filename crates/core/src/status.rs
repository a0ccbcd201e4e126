//! Lab status cell codec.
//!
//! The spreadsheet stores one short string per student and lab. Anything starting with `?`
//! is pending and will be re-checked; everything else is final and never touched again.
//!
//! | cell | meaning |
//! |---|---|
//! | `?v*0.3` | partial credit from repository activity |
//! | `?! Wrong TASKID!` | CI log reports someone else's task |
//! | `v`, `v@12.0*0.95-1` | accepted, with optional points, reduction and late penalty |

use std::fmt;

use crate::util::{format_general, format_points};

pub const WRONG_TASK_ID: &str = "?! Wrong TASKID!";

#[derive(Debug, Clone, PartialEq)]
pub enum LabStatus {
    Partial { coefficient: f64 },
    WrongTaskId,
    Accepted(Grade),
    /// A value entered by hand that this codec does not understand.
    Manual(String),
}

/// Suffixes of an accepted lab.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Grade {
    pub points: Option<f64>,
    pub reduction: Option<f64>,
    pub penalty: u32,
}

impl LabStatus {
    /// Decode a cell value. Empty cells have no status.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.is_empty() {
            return None;
        }
        if value == WRONG_TASK_ID {
            return Some(Self::WrongTaskId);
        }
        let parsed = if let Some(coefficient) = value.strip_prefix("?v*") {
            coefficient.parse().ok().map(|coefficient| Self::Partial { coefficient })
        } else if let Some(rest) = value.strip_prefix('v') {
            parse_grade(rest).map(Self::Accepted)
        } else {
            None
        };
        Some(parsed.unwrap_or_else(|| Self::Manual(value.to_string())))
    }

    /// Pending statuses are re-evaluated on every run.
    pub fn is_pending(&self) -> bool {
        match self {
            Self::Partial { .. } | Self::WrongTaskId => true,
            Self::Accepted(_) => false,
            Self::Manual(value) => value.starts_with('?'),
        }
    }

    pub fn is_terminal(&self) -> bool { !self.is_pending() }
}

fn parse_grade(mut rest: &str) -> Option<Grade> {
    let mut grade = Grade::default();
    if let Some(points) = rest.strip_prefix('@') {
        let end = points.find(['*', '-']).unwrap_or(points.len());
        grade.points = Some(points[..end].parse().ok()?);
        rest = &points[end..];
    }
    if let Some(reduction) = rest.strip_prefix('*') {
        let end = reduction.find('-').unwrap_or(reduction.len());
        grade.reduction = Some(reduction[..end].parse().ok()?);
        rest = &reduction[end..];
    }
    if let Some(penalty) = rest.strip_prefix('-') {
        grade.penalty = penalty.parse().ok()?;
        rest = "";
    }
    rest.is_empty().then_some(grade)
}

impl fmt::Display for LabStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Partial { coefficient } => write!(f, "?v*{}", format_general(*coefficient)),
            Self::WrongTaskId => f.write_str(WRONG_TASK_ID),
            Self::Accepted(grade) => write!(f, "v{grade}"),
            Self::Manual(value) => f.write_str(value),
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(points) = self.points {
            write!(f, "@{}", format_points(points))?;
        }
        if let Some(reduction) = self.reduction {
            write!(f, "*{}", format_general(reduction))?;
        }
        if self.penalty > 0 {
            write!(f, "-{}", self.penalty)?;
        }
        Ok(())
    }
}
