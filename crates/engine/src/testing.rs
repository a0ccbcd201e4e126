//! In-memory collaborators for engine tests.

use std::{
    cell::{Cell, RefCell},
    collections::HashMap,
};

use anyhow::{Result, anyhow};
use lab_grader_core::{
    config::CiSource,
    models::{BuildInfo, Issue, LinkEvent, Notification, RepoCommit, Repository, Student},
    service::{ErrorReporter, SpreadsheetStore, VcsQuery},
};
use time::OffsetDateTime;

pub fn repo(name: &str) -> Repository {
    Repository { owner: "org".into(), name: name.into(), default_branch: Some("main".into()) }
}

pub fn commit(sha: &str, author: Option<&str>, message: &str) -> RepoCommit {
    RepoCommit { sha: sha.into(), author: author.map(Into::into), message: message.into() }
}

pub fn link(actor: &str, repo_name: &str, sha: &str) -> LinkEvent {
    LinkEvent {
        actor: Some(actor.into()),
        commit_sha: Some(sha.into()),
        commit_url: Some(format!("https://api.github.com/repos/org/{repo_name}/commits/{sha}")),
    }
}

#[derive(Default)]
pub struct FakeVcs {
    pub repos: Vec<Repository>,
    pub commits: HashMap<String, Vec<RepoCommit>>,
    pub issues: HashMap<String, Vec<Issue>>,
    pub events: HashMap<(String, u64), Vec<LinkEvent>>,
    /// Successful builds by repository name and CI source name.
    pub builds: HashMap<(String, &'static str), BuildInfo>,
    pub logs: HashMap<(String, &'static str), String>,
    /// Repositories whose queries fail.
    pub broken: Vec<String>,
    pub log_requests: Cell<usize>,
}

impl FakeVcs {
    pub fn with_build(
        mut self,
        repo: &str,
        source: &'static str,
        completed_at: OffsetDateTime,
        log: &str,
    ) -> Self {
        self.builds.insert((repo.into(), source), BuildInfo {
            id: Some(1),
            external_id: None,
            completed_at: Some(completed_at),
        });
        self.logs.insert((repo.into(), source), log.into());
        self
    }

    fn check(&self, repo: &Repository) -> Result<()> {
        if self.broken.contains(&repo.name) {
            return Err(anyhow!("Upstream failure for {}", repo));
        }
        Ok(())
    }

    fn build(&self, repo: &Repository, source: &'static str) -> Result<Option<BuildInfo>> {
        self.check(repo)?;
        Ok(self.builds.get(&(repo.name.clone(), source)).cloned())
    }
}

impl VcsQuery for FakeVcs {
    async fn list_repos(&self, _org: &str, prefix: &str) -> Result<Vec<Repository>> {
        Ok(self.repos.iter().filter(|r| r.name.starts_with(prefix)).cloned().collect())
    }

    async fn list_commits(&self, repo: &Repository, _branch: &str) -> Result<Vec<RepoCommit>> {
        self.check(repo)?;
        Ok(self.commits.get(&repo.name).cloned().unwrap_or_default())
    }

    async fn list_issues(&self, repo: &Repository) -> Result<Vec<Issue>> {
        self.check(repo)?;
        Ok(self.issues.get(&repo.name).cloned().unwrap_or_default())
    }

    async fn list_issue_link_events(
        &self,
        repo: &Repository,
        issue: u64,
    ) -> Result<Vec<LinkEvent>> {
        Ok(self.events.get(&(repo.name.clone(), issue)).cloned().unwrap_or_default())
    }

    async fn get_commit(&self, repo: &Repository, sha: &str) -> Result<RepoCommit> {
        self.commits
            .get(&repo.name)
            .and_then(|commits| commits.iter().find(|c| c.sha == sha))
            .cloned()
            .ok_or_else(|| anyhow!("Commit {} not found in {}", sha, repo))
    }

    async fn get_successful_build(
        &self,
        repo: &Repository,
        names: &[String],
        _require_all: bool,
    ) -> Result<Option<BuildInfo>> {
        let source = if names.iter().any(|n| n == "Travis CI") { "travis" } else { "workflows" };
        self.build(repo, source)
    }

    async fn get_successful_status(
        &self,
        repo: &Repository,
        _context: &str,
    ) -> Result<Option<BuildInfo>> {
        self.build(repo, "appveyor")
    }

    async fn get_ci_log(
        &self,
        repo: &Repository,
        source: &CiSource,
        _build: &BuildInfo,
    ) -> Result<String> {
        self.log_requests.set(self.log_requests.get() + 1);
        self.logs
            .get(&(repo.name.clone(), source.name()))
            .cloned()
            .ok_or_else(|| anyhow!("No {} log for {}", source.name(), repo))
    }
}

#[derive(Default)]
pub struct FakeStore {
    pub students: Vec<Student>,
    pub task_ids: HashMap<String, u32>,
    pub deadlines: HashMap<(String, u32), String>,
    pub cells: HashMap<(String, u32), String>,
    pub staged: Vec<((String, u32), String)>,
}

impl FakeStore {
    pub fn with_student(mut self, group: &str, name: &str, github: &str, task_id: u32) -> Self {
        self.task_ids.insert(name.into(), task_id);
        self.students.push(Student {
            group: group.into(),
            name: name.into(),
            github: Some(github.into()),
            position: self.students.len() + 1,
        });
        self
    }

    pub fn cell(&self, name: &str, lab: u32) -> Option<&str> {
        self.cells.get(&(name.to_string(), lab)).map(String::as_str)
    }
}

impl SpreadsheetStore for FakeStore {
    fn find_student(&self, github: &str) -> Result<Option<Student>> {
        Ok(self
            .students
            .iter()
            .find(|s| s.github.as_deref().is_some_and(|g| g.eq_ignore_ascii_case(github)))
            .cloned())
    }

    fn get_lab_status(&self, student: &Student, lab: u32) -> Result<Option<String>> {
        Ok(self.cell(&student.name, lab).map(Into::into))
    }

    fn set_lab_status(&mut self, student: &Student, lab: u32, value: &str) -> Result<()> {
        self.staged.push(((student.name.clone(), lab), value.into()));
        Ok(())
    }

    fn get_deadline(&self, group: &str, lab: u32) -> Option<String> {
        self.deadlines.get(&(group.to_string(), lab)).cloned()
    }

    fn get_task_id(&self, student: &Student) -> Result<Option<u32>> {
        Ok(self.task_ids.get(&student.name).copied())
    }

    async fn flush(&mut self) -> Result<usize> {
        let staged = std::mem::take(&mut self.staged);
        let count = staged.len();
        self.cells.extend(staged);
        Ok(count)
    }
}

#[derive(Default)]
pub struct RecordingReporter(pub RefCell<Vec<Notification>>);

impl ErrorReporter for RecordingReporter {
    fn report(&self, notification: Notification) { self.0.borrow_mut().push(notification) }
}
