//! Signals printed by lab test harnesses into CI build logs.
//!
//! Harnesses print lines such as `TASKID is 7`, `Grading reduced by 5%` and `Score is 12`.
//! Shell tracing echoes the harness source into the log as well (`echo "TASKID is $ID"`), so
//! a marker that directly follows a quote character is ignored and the search moves on.

use std::fmt;

/// Task id reported by a build log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskId {
    Valid(u32),
    /// The marker was found but the value is not a number.
    Invalid,
}

impl TaskId {
    pub fn matches(self, expected: u32) -> bool { self == Self::Valid(expected) }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Valid(id) => write!(f, "{id}"),
            Self::Invalid => f.write_str("invalid"),
        }
    }
}

const TASK_ID_MARKER: &str = "TASKID is";
const REDUCTION_MARKER: &str = "Grading reduced by";
const SCORE_MARKER: &str = "Score is";
const POINTS_MARKER: &str = "Points";

/// Byte offset of the first unquoted `marker`.
pub fn find_unquoted(log: &str, marker: &str) -> Option<usize> {
    let mut from = 0;
    loop {
        let pos = from + log.get(from..)?.find(marker)?;
        if !log[..pos].ends_with(['"', '\'']) {
            return Some(pos);
        }
        from = pos + 1;
        while !log.is_char_boundary(from) {
            from += 1;
        }
    }
}

/// Text after the first unquoted `marker` and the single separator character following it.
fn value_after<'a>(log: &'a str, marker: &str) -> Option<&'a str> {
    let rest = &log[find_unquoted(log, marker)? + marker.len()..];
    let mut chars = rest.chars();
    chars.next();
    Some(chars.as_str())
}

/// Task id from a `TASKID is NN` line. Only the two characters after the marker are read.
pub fn extract_task_id(log: &str) -> Option<TaskId> {
    let value = value_after(log, TASK_ID_MARKER)?;
    let end = value.char_indices().nth(2).map_or(value.len(), |(i, _)| i);
    Some(value[..end].trim().parse().map_or(TaskId::Invalid, TaskId::Valid))
}

/// Multiplier from a `Grading reduced by N%` line: `(100 - N) / 100`.
/// A zero reduction, or a line without a readable percentage, yields nothing.
pub fn extract_reduction_coefficient(log: &str) -> Option<f64> {
    let value = value_after(log, REDUCTION_MARKER)?;
    let Some(end) = value.find('%') else {
        tracing::warn!("Grade reduction without a percent sign: {:?}", truncate(value));
        return None;
    };
    let percent: u32 = match value[..end].trim().parse() {
        Ok(percent) if percent <= 100 => percent,
        Ok(percent) => {
            tracing::warn!("Grade reduction of {}% is out of range", percent);
            return None;
        }
        Err(e) => {
            tracing::warn!("Invalid grade reduction {:?}: {}", &value[..end], e);
            return None;
        }
    };
    if percent == 0 {
        return None;
    }
    Some(f64::from(100 - percent) / 100.0)
}

/// Score from a `Score is N` line, or else a `Points N/M` line.
pub fn extract_grading_points(log: &str) -> Option<f64> {
    let (value, end) = if let Some(value) = value_after(log, SCORE_MARKER) {
        (value, value.find('\n'))
    } else {
        let value = value_after(log, POINTS_MARKER)?;
        (value, value.find('/'))
    };
    let value = value[..end.unwrap_or(value.len())].trim();
    match value.parse() {
        Ok(points) => Some(points),
        Err(e) => {
            tracing::warn!("Invalid grading points {:?}: {}", truncate(value), e);
            None
        }
    }
}

fn truncate(value: &str) -> &str {
    value.char_indices().nth(32).map_or(value, |(i, _)| &value[..i])
}
