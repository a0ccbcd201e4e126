//! Column-major model of the course spreadsheet.
//!
//! Every student group is a sheet. Column 0 holds task ids, column 1 student names, and the
//! column labelled `GitHub` holds VCS accounts. Lab `N` lives in column `1 + N`; row 0 of a lab
//! column holds the group's deadline for that lab.

pub const TASK_ID_COLUMN: usize = 0;
pub const NAME_COLUMN: usize = 1;
pub const LAB_COLUMN_OFFSET: usize = 1;
pub const GITHUB_HEADER: &str = "GitHub";

#[derive(Debug, thiserror::Error)]
pub enum SheetError {
    #[error("Group '{0}' not found in spreadsheet")]
    UnknownGroup(String),
    #[error("Student '{name}' not found in group {group}")]
    UnknownStudent { group: String, name: String },
    #[error("GitHub account column not found on sheet {0}")]
    NoGitHubColumn(String),
    #[error("GitHub account '{github}' is already used by {other}")]
    AccountTaken { github: String, other: String },
    #[error("GitHub account of {student} is '{current}', it can't be changed to '{requested}'")]
    AccountChange { student: String, current: String, requested: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sheet {
    pub title: String,
    pub columns: Vec<Vec<String>>,
}

impl Sheet {
    pub fn new(title: impl Into<String>, columns: Vec<Vec<String>>) -> Self {
        Self { title: title.into(), columns }
    }

    /// Non-empty cell value.
    pub fn cell(&self, column: usize, row: usize) -> Option<&str> {
        self.columns.get(column)?.get(row).map(String::as_str).filter(|v| !v.trim().is_empty())
    }

    pub fn set(&mut self, column: usize, row: usize, value: &str) {
        if self.columns.len() <= column {
            self.columns.resize_with(column + 1, Vec::new);
        }
        let cells = &mut self.columns[column];
        if cells.len() <= row {
            cells.resize(row + 1, String::new());
        }
        cells[row] = value.to_string();
    }

    /// First column with a cell equal to `name`.
    pub fn find_column(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|cells| cells.iter().any(|cell| cell.trim() == name))
    }

    pub fn github_column(&self) -> Result<usize, SheetError> {
        self.find_column(GITHUB_HEADER).ok_or_else(|| SheetError::NoGitHubColumn(self.title.clone()))
    }

    pub fn find_row_by_name(&self, name: &str) -> Option<usize> {
        self.columns.get(NAME_COLUMN)?.iter().position(|cell| cell.trim() == name.trim())
    }

    /// Row of a student by VCS account, case-insensitive. Row 0 is never a student.
    pub fn find_row_by_github(&self, github: &str) -> Option<usize> {
        let column = self.find_column(GITHUB_HEADER)?;
        self.columns[column]
            .iter()
            .enumerate()
            .skip(1)
            .find(|(_, cell)| cell.trim().eq_ignore_ascii_case(github.trim()))
            .map(|(row, _)| row)
    }
}

/// Column letters for a zero-based index: 0 is `A`, 26 is `AA`.
pub fn column_letter(index: usize) -> String {
    let mut n = index + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let remainder = (n - 1) % 26;
        letters.push(b'A' + remainder as u8);
        n = (n - 1) / 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

/// A1 notation for a zero-based cell: `'Group 1'!C5`.
pub fn a1_range(sheet: &str, column: usize, row: usize) -> String {
    format!("'{}'!{}{}", sheet.replace('\'', "''"), column_letter(column), row + 1)
}

pub fn lab_column(lab: u32) -> usize { LAB_COLUMN_OFFSET + lab as usize }
