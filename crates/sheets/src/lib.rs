pub mod data;
pub mod google;

use anyhow::{Context, Result, bail};
use lab_grader_core::{
    config::{AuthConfig, GoogleConfig},
    models::Student,
    retry::RetryPolicy,
    service::SpreadsheetStore,
};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use crate::{
    data::{NAME_COLUMN, Sheet, SheetError, TASK_ID_COLUMN, a1_range, lab_column},
    google::{CellUpdate, GoogleSheets},
};

/// Spreadsheet loaded in full, with writes staged until [`SpreadsheetStore::flush`].
pub struct SheetStore {
    sheets: Vec<Sheet>,
    info_sheet: Option<String>,
    pending: Vec<CellUpdate>,
    client: Option<GoogleSheets>,
}

impl SheetStore {
    /// Store without a backend. Flushing only drops staged updates.
    pub fn in_memory(sheets: Vec<Sheet>, info_sheet: Option<String>) -> Self {
        Self { sheets, info_sheet, pending: Vec::new(), client: None }
    }

    pub async fn load(config: &GoogleConfig, auth: &AuthConfig) -> Result<Self> {
        let token = auth.google.as_ref().context("No Google token configured")?.token.clone();
        let client = GoogleSheets::new(token, config.spreadsheet.clone(), RetryPolicy::default())?;
        let sheets = client.load_sheets().await?;
        tracing::info!("Loaded {} sheets from spreadsheet {}", sheets.len(), config.spreadsheet);
        Ok(Self {
            sheets,
            info_sheet: config.info_sheet.clone(),
            pending: Vec::new(),
            client: Some(client),
        })
    }

    pub fn pending(&self) -> &[CellUpdate] { &self.pending }

    /// Sheets holding students, in spreadsheet order.
    pub fn groups(&self) -> impl Iterator<Item = &Sheet> {
        self.sheets.iter().filter(|sheet| Some(&sheet.title) != self.info_sheet.as_ref())
    }

    fn group(&self, group: &str) -> Result<&Sheet, SheetError> {
        self.groups()
            .find(|sheet| sheet.title == group)
            .ok_or_else(|| SheetError::UnknownGroup(group.to_string()))
    }

    fn group_mut(&mut self, group: &str) -> Result<&mut Sheet, SheetError> {
        let info_sheet = self.info_sheet.clone();
        self.sheets
            .iter_mut()
            .find(|sheet| sheet.title == group && Some(&sheet.title) != info_sheet.as_ref())
            .ok_or_else(|| SheetError::UnknownGroup(group.to_string()))
    }

    fn stage(&mut self, range: String, value: &str) {
        match self.pending.iter_mut().find(|update| update.range == range) {
            Some(update) => update.value = value.to_string(),
            None => self.pending.push(CellUpdate { range, value: value.to_string() }),
        }
    }

    fn write(&mut self, group: &str, column: usize, row: usize, value: &str) -> Result<()> {
        self.group_mut(group)?.set(column, row, value);
        self.stage(a1_range(group, column, row), value);
        Ok(())
    }

    pub fn find_student_by_name(&self, group: &str, name: &str) -> Result<Student> {
        let sheet = self.group(group)?;
        let position = sheet.find_row_by_name(name).ok_or_else(|| SheetError::UnknownStudent {
            group: group.to_string(),
            name: name.to_string(),
        })?;
        let github = sheet
            .github_column()
            .ok()
            .and_then(|column| sheet.cell(column, position))
            .map(|github| github.trim().to_string());
        Ok(Student { group: group.to_string(), name: name.trim().to_string(), github, position })
    }

    /// Record a student's VCS account.
    ///
    /// Fails when another student already uses the account, or when the student has a
    /// different account on record. Returns whether an update was staged.
    pub fn register_github(&mut self, group: &str, name: &str, github: &str) -> Result<bool> {
        if let Some(other) = self.find_student(github)? {
            if other.group == group && other.name == name.trim() {
                return Ok(false);
            }
            return Err(SheetError::AccountTaken {
                github: github.to_string(),
                other: other.to_string(),
            }
            .into());
        }
        let student = self.find_student_by_name(group, name)?;
        if let Some(current) = &student.github {
            return Err(SheetError::AccountChange {
                student: student.to_string(),
                current: current.clone(),
                requested: github.to_string(),
            }
            .into());
        }
        let column = self.group(group)?.github_column()?;
        self.write(group, column, student.position, github)?;
        tracing::info!("Registered GitHub account {} for {}", github, student);
        Ok(true)
    }

    /// Replace a student's VCS account regardless of what is on record.
    pub fn override_github(&mut self, group: &str, name: &str, github: &str) -> Result<()> {
        if let Some(other) = self.find_student(github)?
            && (other.group != group || other.name != name.trim())
        {
            return Err(SheetError::AccountTaken {
                github: github.to_string(),
                other: other.to_string(),
            }
            .into());
        }
        let student = self.find_student_by_name(group, name)?;
        let column = self.group(group)?.github_column()?;
        self.write(group, column, student.position, github)?;
        tracing::info!("GitHub account of {} set to {}", student, github);
        Ok(())
    }
}

impl SpreadsheetStore for SheetStore {
    fn find_student(&self, github: &str) -> Result<Option<Student>> {
        for sheet in self.groups() {
            let Some(position) = sheet.find_row_by_github(github) else { continue };
            let name = sheet.cell(NAME_COLUMN, position).unwrap_or_default().trim().to_string();
            let github = sheet
                .github_column()
                .ok()
                .and_then(|column| sheet.cell(column, position))
                .map(|github| github.trim().to_string());
            return Ok(Some(Student { group: sheet.title.clone(), name, github, position }));
        }
        Ok(None)
    }

    fn get_lab_status(&self, student: &Student, lab: u32) -> Result<Option<String>> {
        let sheet = self.group(&student.group)?;
        Ok(sheet.cell(lab_column(lab), student.position).map(|v| v.trim().to_string()))
    }

    fn set_lab_status(&mut self, student: &Student, lab: u32, value: &str) -> Result<()> {
        self.write(&student.group, lab_column(lab), student.position, value)
    }

    fn get_deadline(&self, group: &str, lab: u32) -> Option<String> {
        let sheet = self.group(group).ok()?;
        sheet.cell(lab_column(lab), 0).map(|v| v.trim().to_string())
    }

    fn get_task_id(&self, student: &Student) -> Result<Option<u32>> {
        let sheet = self.group(&student.group)?;
        sheet
            .cell(TASK_ID_COLUMN, student.position)
            .map(|v| {
                v.trim()
                    .parse::<u32>()
                    .with_context(|| format!("Invalid task id '{}' for {}", v.trim(), student))
            })
            .transpose()
    }

    async fn flush(&mut self) -> Result<usize> {
        if self.pending.is_empty() {
            return Ok(0);
        }
        let mut updates = std::mem::take(&mut self.pending);
        if let Some(info_sheet) = &self.info_sheet {
            let now = OffsetDateTime::now_utc().format(&Rfc3339).context("Failed to format time")?;
            updates.push(CellUpdate { range: a1_range(info_sheet, 1, 0), value: now });
        }
        let updated = match &self.client {
            Some(client) => client.batch_update(&updates).await?,
            None => updates.len(),
        };
        if updated != updates.len() {
            bail!("Spreadsheet reported {} updated cells, expected {}", updated, updates.len());
        }
        tracing::info!("Updated {} spreadsheet cells", updated);
        Ok(updated)
    }
}
