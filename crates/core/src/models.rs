use std::fmt;

use serde::Serialize;
use time::OffsetDateTime;

/// A row in the course spreadsheet.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct Student {
    pub group: String,
    pub name: String,
    pub github: Option<String>,
    /// Zero-based row in the group sheet.
    pub position: usize,
}

impl fmt::Display for Student {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.group)
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct Repository {
    pub owner: String,
    pub name: String,
    pub default_branch: Option<String>,
}

impl Repository {
    pub fn full_name(&self) -> String { format!("{}/{}", self.owner, self.name) }

    pub fn branch(&self) -> &str { self.default_branch.as_deref().unwrap_or("master") }

    /// Student account encoded in a `<prefix>-<account>` repository name.
    pub fn account_suffix(&self, prefix: &str) -> Option<&str> {
        self.name.strip_prefix(prefix)?.strip_prefix('-').filter(|account| !account.is_empty())
    }
}

impl fmt::Display for Repository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct RepoCommit {
    pub sha: String,
    /// Account login, if GitHub linked the commit to one.
    pub author: Option<String>,
    pub message: String,
}

/// An issue that is not a pull request.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct Issue {
    pub number: u64,
    pub title: String,
}

/// A "referenced" issue event: a commit mentioning the issue.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct LinkEvent {
    pub actor: Option<String>,
    pub commit_sha: Option<String>,
    pub commit_url: Option<String>,
}

/// A successful CI completion as reported by the VCS host.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize)]
pub struct BuildInfo {
    /// Check run id (equal to the Actions job id).
    pub id: Option<u64>,
    /// Id of the build on the external CI service.
    pub external_id: Option<String>,
    pub completed_at: Option<OffsetDateTime>,
}

/// The build selected for grading a repository.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct BuildSignal {
    pub source: &'static str,
    pub completed_at: OffsetDateTime,
    pub log: String,
}

/// Something a person should hear about. Delivery is up to the sink.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct Notification {
    pub lab: String,
    pub repository: String,
    pub student: Option<String>,
    pub message: String,
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[lab {}] {}", self.lab, self.repository)?;
        if let Some(student) = &self.student {
            write!(f, " ({student})")?;
        }
        write!(f, ": {}", self.message)
    }
}
