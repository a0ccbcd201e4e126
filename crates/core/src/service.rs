//! Collaborators the grading engine talks to.
#![allow(async_fn_in_trait)]

use anyhow::Result;

use crate::{
    config::CiSource,
    models::{BuildInfo, Issue, LinkEvent, Notification, RepoCommit, Repository, Student},
};

/// Course spreadsheet: students, deadlines and lab status cells.
///
/// Reads come from data loaded up front. Writes are staged and only sent on [`flush`].
///
/// [`flush`]: SpreadsheetStore::flush
pub trait SpreadsheetStore {
    /// Find a student in any group by VCS account (case-insensitive).
    fn find_student(&self, github: &str) -> Result<Option<Student>>;

    fn get_lab_status(&self, student: &Student, lab: u32) -> Result<Option<String>>;

    /// Stage a status update. A later update of the same cell replaces it.
    fn set_lab_status(&mut self, student: &Student, lab: u32, value: &str) -> Result<()>;

    /// Raw deadline cell for a group.
    fn get_deadline(&self, group: &str, lab: u32) -> Option<String>;

    fn get_task_id(&self, student: &Student) -> Result<Option<u32>>;

    /// Commit staged updates, returning the number of updated cells.
    async fn flush(&mut self) -> Result<usize>;
}

/// GitHub-shaped repository and CI queries.
pub trait VcsQuery {
    /// Repositories in `org` whose name starts with `prefix`.
    async fn list_repos(&self, org: &str, prefix: &str) -> Result<Vec<Repository>>;

    async fn list_commits(&self, repo: &Repository, branch: &str) -> Result<Vec<RepoCommit>>;

    /// Issues, excluding pull requests.
    async fn list_issues(&self, repo: &Repository) -> Result<Vec<Issue>>;

    /// "referenced" events of an issue.
    async fn list_issue_link_events(&self, repo: &Repository, issue: u64)
    -> Result<Vec<LinkEvent>>;

    async fn get_commit(&self, repo: &Repository, sha: &str) -> Result<RepoCommit>;

    /// Latest successful check run on the default branch whose name contains one of
    /// `names`. With `require_all`, any unsuccessful check run yields nothing.
    async fn get_successful_build(
        &self,
        repo: &Repository,
        names: &[String],
        require_all: bool,
    ) -> Result<Option<BuildInfo>>;

    /// Successful commit status on the default branch whose description mentions `context`.
    async fn get_successful_status(
        &self,
        repo: &Repository,
        context: &str,
    ) -> Result<Option<BuildInfo>>;

    /// Raw log of a build found by one of the queries above.
    async fn get_ci_log(
        &self,
        repo: &Repository,
        source: &CiSource,
        build: &BuildInfo,
    ) -> Result<String>;
}

/// Side channel for failures a person should be told about.
pub trait ErrorReporter {
    fn report(&self, notification: Notification);
}

/// Reports notifications to the log only.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl ErrorReporter for TracingReporter {
    fn report(&self, notification: Notification) { tracing::warn!("{}", notification) }
}
