use std::{collections::HashMap, fmt, time::Duration};

use anyhow::{Context, Result};
use lab_grader_core::{
    config::{CiSource, CourseConfig, LabConfig},
    models::{BuildInfo, BuildSignal, Notification, Repository, Student},
    service::{ErrorReporter, SpreadsheetStore, VcsQuery},
    status::{Grade, LabStatus},
};
use time::OffsetDateTime;
use tokio::time::sleep;

use crate::{
    deadline::{compute_penalty, parse_deadline},
    gradelog::{extract_grading_points, extract_reduction_coefficient, extract_task_id},
    requirements::RequirementEvaluator,
};

/// Check name Travis CI reports its builds under.
const TRAVIS_CHECK: &str = "Travis CI";
/// Commit status description AppVeyor reports its builds under.
const APPVEYOR_CONTEXT: &str = "AppVeyor";

/// What happened to one repository during a lab check.
#[derive(Debug, Clone, PartialEq)]
pub enum RepoOutcome {
    /// No registered student owns the repository.
    UnknownStudent,
    /// The stored status is final.
    AlreadyGraded,
    /// Repository requirements are configured and earned nothing yet.
    NoCredit,
    /// No CI source reported a successful build.
    NoBuild,
    /// Partial credit recorded, waiting for a successful build.
    Pending(f64),
    WrongTaskId,
    Graded(Grade),
}

/// Per-lab run summary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabSummary {
    pub lab: String,
    pub repositories: usize,
    pub graded: usize,
    pub pending: usize,
    pub wrong_task_id: usize,
    pub skipped: usize,
    pub errors: usize,
    /// Status cells staged for update.
    pub updates: usize,
}

impl LabSummary {
    fn record(&mut self, outcome: &RepoOutcome) {
        match outcome {
            RepoOutcome::Graded(_) => self.graded += 1,
            RepoOutcome::Pending(_) => self.pending += 1,
            RepoOutcome::WrongTaskId => self.wrong_task_id += 1,
            RepoOutcome::UnknownStudent
            | RepoOutcome::AlreadyGraded
            | RepoOutcome::NoCredit
            | RepoOutcome::NoBuild => self.skipped += 1,
        }
    }
}

impl fmt::Display for LabSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Lab {}: {} repositories, {} graded, {} pending, {} wrong task id, {} skipped, {} errors, {} updates",
            self.lab,
            self.repositories,
            self.graded,
            self.pending,
            self.wrong_task_id,
            self.skipped,
            self.errors,
            self.updates
        )
    }
}

/// Decides lab statuses for every repository of a lab.
pub struct Grader<'a, V, R> {
    course: &'a CourseConfig,
    vcs: &'a V,
    reporter: &'a R,
    now: OffsetDateTime,
}

struct LabContext<'a> {
    id: &'a str,
    config: &'a LabConfig,
    column: u32,
    deadlines: HashMap<String, Option<OffsetDateTime>>,
}

impl<'a, V: VcsQuery, R: ErrorReporter> Grader<'a, V, R> {
    pub fn new(course: &'a CourseConfig, vcs: &'a V, reporter: &'a R) -> Self {
        Self { course, vcs, reporter, now: OffsetDateTime::now_utc() }
    }

    /// Fix the current time, which supplies the year of deadlines written without one.
    pub fn at(mut self, now: OffsetDateTime) -> Self {
        self.now = now;
        self
    }

    /// Check every repository of a lab, staging status updates in `store`.
    ///
    /// Failures of a single repository are logged and counted. Configuration problems and a
    /// failure to list the lab's repositories abort the lab.
    pub async fn check_lab<S: SpreadsheetStore>(
        &self,
        store: &mut S,
        lab_id: &str,
    ) -> Result<LabSummary> {
        let config = self.course.lab(lab_id)?;
        let mut lab = LabContext {
            id: lab_id,
            config,
            column: config.column(lab_id)?,
            deadlines: HashMap::new(),
        };
        tracing::info!("Checking lab {}", lab_id);
        let prefix = &config.github_prefix;
        let mut repos = self
            .vcs
            .list_repos(&self.course.github.organization, prefix)
            .await
            .with_context(|| format!("Failed to list repositories for lab {}", lab_id))?;
        repos.retain(|repo| {
            let matches = repo.account_suffix(prefix).is_some();
            if !matches {
                tracing::debug!("Ignoring {}: not named {}-<account>", repo, prefix);
            }
            matches
        });
        tracing::debug!("Found {} repositories with prefix {}", repos.len(), prefix);

        let pacing = Duration::from_millis(self.course.pacing_ms);
        let mut summary =
            LabSummary { lab: lab_id.to_string(), repositories: repos.len(), ..Default::default() };
        for (i, repo) in repos.iter().enumerate() {
            if i > 0 && !pacing.is_zero() {
                sleep(pacing).await;
            }
            match self.check_repo(store, &mut lab, repo, &mut summary).await {
                Ok(outcome) => {
                    tracing::debug!("{}: {:?}", repo, outcome);
                    summary.record(&outcome);
                }
                Err(e) => {
                    tracing::error!("Failed to check {}: {:?}", repo, e);
                    summary.errors += 1;
                }
            }
        }
        tracing::info!("{}", summary);
        Ok(summary)
    }

    /// Decide and stage the status of one repository.
    ///
    /// Partial credit earned from repository activity is staged even when grading from CI
    /// fails afterwards.
    async fn check_repo<S: SpreadsheetStore>(
        &self,
        store: &mut S,
        lab: &mut LabContext<'_>,
        repo: &Repository,
        summary: &mut LabSummary,
    ) -> Result<RepoOutcome> {
        let Some(account) = repo.account_suffix(&lab.config.github_prefix) else {
            return Ok(RepoOutcome::UnknownStudent);
        };
        let Some(student) = store.find_student(account)? else {
            tracing::warn!("No student registered with GitHub account '{}' ({})", account, repo);
            self.reporter.report(Notification {
                lab: lab.id.to_string(),
                repository: repo.full_name(),
                student: None,
                message: format!(
                    "GitHub account '{account}' is not registered, the lab cannot be accepted"
                ),
            });
            return Ok(RepoOutcome::UnknownStudent);
        };
        let current = store.get_lab_status(&student, lab.column)?;
        if let Some(status) = current.as_deref().and_then(LabStatus::parse)
            && status.is_terminal()
        {
            tracing::debug!("{} is skipped, lab status is '{}'", student, status);
            return Ok(RepoOutcome::AlreadyGraded);
        }

        let config = lab.config;
        let mut partial = None;
        if let Some(requirements) = &config.repo_requirements {
            let evaluator = RequirementEvaluator::new(self.vcs, &self.course.github.staff);
            match evaluator.evaluate(repo, requirements).await? {
                Some(coefficient) if coefficient > 0.0 => partial = Some(coefficient),
                Some(_) => {
                    tracing::debug!("{} earned no credit for repository activity", student);
                    return Ok(RepoOutcome::NoCredit);
                }
                None => {}
            }
        }

        let (outcome, status) = match self.grade_from_ci(&*store, lab, repo, &student).await {
            Ok(Some(decision)) => decision,
            Ok(None) => match partial {
                Some(coefficient) => {
                    (RepoOutcome::Pending(coefficient), LabStatus::Partial { coefficient })
                }
                None => {
                    tracing::debug!("No successful build found for {}", repo);
                    return Ok(RepoOutcome::NoBuild);
                }
            },
            Err(e) => {
                if let Some(coefficient) = partial {
                    let status = LabStatus::Partial { coefficient };
                    self.stage(store, lab, &student, current.as_deref(), &status, summary)?;
                }
                return Err(e);
            }
        };
        self.stage(store, lab, &student, current.as_deref(), &status, summary)?;
        Ok(outcome)
    }

    /// Stage `status` unless the cell already holds it.
    fn stage<S: SpreadsheetStore>(
        &self,
        store: &mut S,
        lab: &LabContext<'_>,
        student: &Student,
        current: Option<&str>,
        status: &LabStatus,
        summary: &mut LabSummary,
    ) -> Result<()> {
        let value = status.to_string();
        if current.map(str::trim) == Some(value.as_str()) {
            tracing::debug!("{} lab {} status is unchanged ('{}')", student, lab.id, value);
            return Ok(());
        }
        tracing::info!("{} lab {} status: '{}'", student, lab.id, value);
        store.set_lab_status(student, lab.column, &value)?;
        summary.updates += 1;
        Ok(())
    }

    /// Status from the first CI source with a dated successful build, if any.
    async fn grade_from_ci<S: SpreadsheetStore>(
        &self,
        store: &S,
        lab: &mut LabContext<'_>,
        repo: &Repository,
        student: &Student,
    ) -> Result<Option<(RepoOutcome, LabStatus)>> {
        let config = lab.config;
        for source in &config.ci.0 {
            let Some(signal) = self.find_signal(repo, source, config).await else {
                continue;
            };
            if config.ignore_completion_date {
                return Ok(Some((
                    RepoOutcome::Graded(Grade::default()),
                    LabStatus::Accepted(Grade::default()),
                )));
            }
            if config.checks_task_id() {
                let task_id = store
                    .get_task_id(student)?
                    .with_context(|| format!("No task id for {}", student))?;
                let expected = config
                    .expected_task_id(task_id)
                    .with_context(|| format!("Lab {} has no task id range", lab.id))?;
                let actual = extract_task_id(&signal.log);
                if !actual.is_some_and(|id| id.matches(expected)) {
                    tracing::warn!(
                        "{} reported task id {:?} from {}, expected {}",
                        repo,
                        actual,
                        signal.source,
                        expected
                    );
                    self.reporter.report(Notification {
                        lab: lab.id.to_string(),
                        repository: repo.full_name(),
                        student: Some(student.to_string()),
                        message: format!(
                            "Build log reports task id {}, expected {}",
                            actual.map_or("none".to_string(), |id| id.to_string()),
                            expected
                        ),
                    });
                    return Ok(Some((RepoOutcome::WrongTaskId, LabStatus::WrongTaskId)));
                }
            }
            let grade = Grade {
                points: extract_grading_points(&signal.log),
                reduction: extract_reduction_coefficient(&signal.log),
                penalty: self.penalty(store, lab, student, signal.completed_at),
            };
            return Ok(Some((RepoOutcome::Graded(grade.clone()), LabStatus::Accepted(grade))));
        }
        Ok(None)
    }

    /// First dated successful build of `source`. Source failures only skip that source.
    async fn find_signal(
        &self,
        repo: &Repository,
        source: &CiSource,
        lab: &LabConfig,
    ) -> Option<BuildSignal> {
        match self.fetch_signal(repo, source, lab).await {
            Ok(signal) => signal,
            Err(e) => {
                tracing::warn!("{} is unavailable for {}: {:?}", source.name(), repo, e);
                None
            }
        }
    }

    async fn fetch_signal(
        &self,
        repo: &Repository,
        source: &CiSource,
        lab: &LabConfig,
    ) -> Result<Option<BuildSignal>> {
        let build: Option<BuildInfo> = match source {
            CiSource::Workflows { jobs } => {
                self.vcs.get_successful_build(repo, jobs, true).await?
            }
            CiSource::Travis => {
                self.vcs.get_successful_build(repo, &[TRAVIS_CHECK.to_string()], false).await?
            }
            CiSource::AppVeyor => self.vcs.get_successful_status(repo, APPVEYOR_CONTEXT).await?,
            CiSource::None => None,
        };
        let Some(build) = build else {
            return Ok(None);
        };
        let Some(completed_at) = build.completed_at else {
            tracing::debug!("{} build of {} has no completion date", source.name(), repo);
            return Ok(None);
        };
        tracing::debug!("{} build of {} completed at {}", source.name(), repo, completed_at);
        let log = if lab.ignore_completion_date {
            String::new()
        } else {
            self.vcs
                .get_ci_log(repo, source, &build)
                .await
                .with_context(|| format!("Failed to fetch {} log for {}", source.name(), repo))?
        };
        Ok(Some(BuildSignal { source: source.name(), completed_at, log }))
    }

    fn penalty<S: SpreadsheetStore>(
        &self,
        store: &S,
        lab: &mut LabContext<'_>,
        student: &Student,
        completed_at: OffsetDateTime,
    ) -> u32 {
        let timezone = self.course.timezone;
        let year = self.now.to_offset(timezone).year();
        let deadline = *lab.deadlines.entry(student.group.clone()).or_insert_with(|| {
            let Some(raw) = store.get_deadline(&student.group, lab.column) else {
                tracing::warn!("No deadline for lab {} in group {}", lab.id, student.group);
                return None;
            };
            let deadline = parse_deadline(&raw, year, timezone);
            if deadline.is_none() {
                tracing::warn!(
                    "Invalid deadline '{}' for lab {} in group {}",
                    raw,
                    lab.id,
                    student.group
                );
            }
            deadline
        });
        deadline.map_or(0, |deadline| compute_penalty(completed_at, deadline, lab.config.penalty_max))
    }
}

#[cfg(test)]
mod tests {
    use lab_grader_core::{
        config::{CiSource, CiSources, CommitRequirement, CourseConfig, RepoRequirements},
        service::SpreadsheetStore,
        status::Grade,
    };
    use time::macros::datetime;

    use super::{Grader, LabSummary, RepoOutcome};
    use crate::testing::{FakeStore, FakeVcs, RecordingReporter, commit, repo};

    const COURSE: &str = r#"
name: Test course
github:
  organization: org
  staff: [teacher]
labs:
  "2":
    github-prefix: lab2
    taskid-max: 10
    penalty-max: 3
    ci: [workflows]
"#;

    fn course() -> CourseConfig {
        let course: CourseConfig = serde_yaml::from_str(COURSE).unwrap();
        course.validate().unwrap();
        course
    }

    fn fake_store() -> FakeStore {
        let mut store = FakeStore::default().with_student("A-1", "John Doe", "jdoe", 7);
        store.deadlines.insert(("A-1".into(), 2), "2024-03-08".into());
        store
    }

    fn fake_vcs(log: &str) -> FakeVcs {
        let vcs = FakeVcs { repos: vec![repo("lab2-jdoe")], ..Default::default() };
        vcs.with_build("lab2-jdoe", "workflows", datetime!(2024-03-10 12:00 UTC), log)
    }

    async fn run(
        course: &CourseConfig,
        vcs: &FakeVcs,
        store: &mut FakeStore,
    ) -> (LabSummary, RecordingReporter) {
        let reporter = RecordingReporter::default();
        let grader = Grader::new(course, vcs, &reporter).at(datetime!(2024-09-01 0:00 UTC));
        let summary = grader.check_lab(store, "2").await.unwrap();
        (summary, reporter)
    }

    #[tokio::test]
    async fn test_late_submission() {
        let course = course();
        let vcs = fake_vcs("Running tests\nTASKID is 7\nOK\n");
        let mut store = fake_store();
        let (summary, reporter) = run(&course, &vcs, &mut store).await;
        assert_eq!(summary.graded, 1);
        assert_eq!(summary.updates, 1);
        assert_eq!(store.staged, vec![(("John Doe".into(), 2), "v-1".into())]);
        assert!(reporter.0.borrow().is_empty());
    }

    #[tokio::test]
    async fn test_points_and_reduction() {
        let course = course();
        let vcs = fake_vcs("TASKID is 7\nGrading reduced by 5%\nScore is 12\n");
        let mut store = fake_store();
        store.deadlines.insert(("A-1".into(), 2), "20.03".into());
        run(&course, &vcs, &mut store).await;
        assert_eq!(store.staged, vec![(("John Doe".into(), 2), "v@12.0*0.95".into())]);
    }

    #[tokio::test]
    async fn test_wrong_task_id() {
        let course = course();
        let vcs = fake_vcs("TASKID is 3\n");
        let mut store = fake_store();
        let (summary, reporter) = run(&course, &vcs, &mut store).await;
        assert_eq!(summary.wrong_task_id, 1);
        assert_eq!(store.staged, vec![(("John Doe".into(), 2), "?! Wrong TASKID!".into())]);
        assert_eq!(reporter.0.borrow().len(), 1);
        assert_eq!(store.flush().await.unwrap(), 1);

        // The pending status is re-checked, but an identical result stages nothing.
        let (summary, _) = run(&course, &vcs, &mut store).await;
        assert_eq!(summary.wrong_task_id, 1);
        assert_eq!(summary.updates, 0);
        assert!(store.staged.is_empty());
        assert_eq!(vcs.log_requests.get(), 2);
    }

    #[tokio::test]
    async fn test_terminal_status_untouched() {
        let course = course();
        let vcs = fake_vcs("TASKID is 3\n");
        for value in ["v", "v-2", "5", "v@10.0*0.9"] {
            let mut store = fake_store();
            store.cells.insert(("John Doe".into(), 2), value.into());
            let (summary, _) = run(&course, &vcs, &mut store).await;
            assert_eq!(summary.skipped, 1, "{value}");
            assert!(store.staged.is_empty(), "{value}");
        }
        assert_eq!(vcs.log_requests.get(), 0);
    }

    #[tokio::test]
    async fn test_wrong_task_id_corrected() {
        let course = course();
        let vcs = fake_vcs("TASKID is 7\n");
        let mut store = fake_store();
        store.cells.insert(("John Doe".into(), 2), "?! Wrong TASKID!".into());
        run(&course, &vcs, &mut store).await;
        assert_eq!(store.staged, vec![(("John Doe".into(), 2), "v-1".into())]);
    }

    #[tokio::test]
    async fn test_unknown_student() {
        let course = course();
        let mut vcs = fake_vcs("TASKID is 7\n");
        vcs.repos.push(repo("lab2-stranger"));
        vcs.repos.push(repo("lab20-jdoe"));
        let mut store = fake_store();
        let (summary, reporter) = run(&course, &vcs, &mut store).await;
        assert_eq!(summary.repositories, 2);
        assert_eq!((summary.graded, summary.skipped), (1, 1));
        let notifications = reporter.0.borrow();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].repository, "org/lab2-stranger");
    }

    #[tokio::test]
    async fn test_repository_errors_isolated() {
        let course = course();
        let mut vcs = fake_vcs("TASKID is 7\n");
        vcs.repos.insert(0, repo("lab2-alice"));
        let mut store = fake_store().with_student("A-1", "Alice", "alice", 3);
        store.task_ids.remove("Alice");
        vcs = vcs.with_build("lab2-alice", "workflows", datetime!(2024-03-01 12:00 UTC), "TASKID is 3");
        let (summary, _) = run(&course, &vcs, &mut store).await;
        assert_eq!(summary.errors, 1);
        assert_eq!(summary.graded, 1);
        assert_eq!(store.staged, vec![(("John Doe".into(), 2), "v-1".into())]);
    }

    #[tokio::test]
    async fn test_ci_source_fallback() {
        let mut course = course();
        let lab = course.labs.get_mut("2").unwrap();
        lab.ci = CiSources(vec![
            CiSource::AppVeyor,
            CiSource::Travis,
            CiSource::Workflows { jobs: vec!["test".into()] },
        ]);
        let mut vcs = FakeVcs { repos: vec![repo("lab2-jdoe")], ..Default::default() }
            .with_build("lab2-jdoe", "travis", datetime!(2024-03-08 10:00 UTC), "TASKID is 7")
            .with_build("lab2-jdoe", "workflows", datetime!(2024-04-08 10:00 UTC), "TASKID is 7");
        // AppVeyor lost the log: the source is skipped.
        vcs = vcs.with_build("lab2-jdoe", "appveyor", datetime!(2024-05-01 10:00 UTC), "");
        vcs.logs.remove(&("lab2-jdoe".to_string(), "appveyor"));
        let mut store = fake_store();
        run(&course, &vcs, &mut store).await;
        assert_eq!(store.staged, vec![(("John Doe".into(), 2), "v".into())]);
        assert_eq!(vcs.log_requests.get(), 2);
    }

    #[tokio::test]
    async fn test_no_build_leaves_status() {
        let course = course();
        let vcs = FakeVcs { repos: vec![repo("lab2-jdoe")], ..Default::default() };
        let mut store = fake_store();
        let (summary, _) = run(&course, &vcs, &mut store).await;
        assert_eq!(summary.skipped, 1);
        assert!(store.staged.is_empty());
    }

    #[tokio::test]
    async fn test_repo_requirements() {
        let mut course = course();
        course.labs.get_mut("2").unwrap().repo_requirements = Some(RepoRequirements {
            commit: Some(CommitRequirement { min_quantity: 5, grade_percent: 20, msg_part: None }),
            issue: None,
            max_coefficient: None,
        });
        let commits = |n: usize| {
            (0..n).map(|i| commit(&format!("c{i}"), Some("jdoe"), "work")).collect::<Vec<_>>()
        };

        // Not enough commits: nothing is recorded even with a successful build.
        let mut vcs = fake_vcs("TASKID is 7\n");
        vcs.commits.insert("lab2-jdoe".into(), commits(3));
        let mut store = fake_store();
        let (summary, _) = run(&course, &vcs, &mut store).await;
        assert_eq!(summary.skipped, 1);
        assert!(store.staged.is_empty());

        // Enough commits, no build yet: partial credit.
        let mut vcs = FakeVcs { repos: vec![repo("lab2-jdoe")], ..Default::default() };
        vcs.commits.insert("lab2-jdoe".into(), commits(5));
        let (summary, _) = run(&course, &vcs, &mut store).await;
        assert_eq!(summary.pending, 1);
        assert_eq!(store.staged, vec![(("John Doe".into(), 2), "?v*0.2".into())]);
        store.flush().await.unwrap();

        // Build arrives: the final status replaces the partial one.
        let mut vcs = fake_vcs("TASKID is 7\n");
        vcs.commits.insert("lab2-jdoe".into(), commits(5));
        let (summary, _) = run(&course, &vcs, &mut store).await;
        assert_eq!(summary.graded, 1);
        assert_eq!(store.staged, vec![(("John Doe".into(), 2), "v-1".into())]);
    }

    fn commit_requirement() -> Option<RepoRequirements> {
        Some(RepoRequirements {
            commit: Some(CommitRequirement { min_quantity: 5, grade_percent: 20, msg_part: None }),
            issue: None,
            max_coefficient: None,
        })
    }

    fn student_commits(vcs: &mut FakeVcs, repo_name: &str, account: &str) {
        let commits = (0..5).map(|i| commit(&format!("c{i}"), Some(account), "work")).collect();
        vcs.commits.insert(repo_name.into(), commits);
    }

    #[tokio::test]
    async fn test_partial_credit_kept_on_error() {
        let mut course = course();
        course.labs.get_mut("2").unwrap().repo_requirements = commit_requirement();
        let mut vcs = fake_vcs("TASKID is 7\n");
        student_commits(&mut vcs, "lab2-jdoe", "jdoe");
        let mut store = fake_store();
        store.task_ids.remove("John Doe");
        let (summary, _) = run(&course, &vcs, &mut store).await;
        assert_eq!((summary.errors, summary.updates), (1, 1));
        assert_eq!(store.staged, vec![(("John Doe".into(), 2), "?v*0.2".into())]);
    }

    #[tokio::test]
    async fn test_upstream_failure_isolated() {
        let mut course = course();
        let mut vcs = fake_vcs("TASKID is 7\n")
            .with_build("lab2-alice", "workflows", datetime!(2024-03-01 12:00 UTC), "TASKID is 3");
        vcs.repos.insert(0, repo("lab2-alice"));
        vcs.broken.push("lab2-alice".into());
        student_commits(&mut vcs, "lab2-jdoe", "jdoe");

        // A failing build lookup only makes that CI source unavailable.
        let mut store = fake_store().with_student("A-1", "Alice", "alice", 3);
        let (summary, _) = run(&course, &vcs, &mut store).await;
        assert_eq!((summary.errors, summary.skipped, summary.graded), (0, 1, 1));
        assert_eq!(store.staged, vec![(("John Doe".into(), 2), "v-1".into())]);

        // A failing activity query fails the repository, the others are still graded.
        course.labs.get_mut("2").unwrap().repo_requirements = commit_requirement();
        let mut store = fake_store().with_student("A-1", "Alice", "alice", 3);
        let (summary, _) = run(&course, &vcs, &mut store).await;
        assert_eq!((summary.errors, summary.graded), (1, 1));
        assert_eq!(store.staged, vec![(("John Doe".into(), 2), "v-1".into())]);
    }

    #[tokio::test]
    async fn test_ignore_flags() {
        let mut course = course();
        let lab = course.labs.get_mut("2").unwrap();
        lab.ignore_task_id = true;
        let vcs = fake_vcs("TASKID is 3\nPoints 4/5\n");
        let mut store = fake_store();
        run(&course, &vcs, &mut store).await;
        assert_eq!(store.staged, vec![(("John Doe".into(), 2), "v@4.0-1".into())]);

        let lab = course.labs.get_mut("2").unwrap();
        lab.ignore_task_id = false;
        lab.ignore_completion_date = true;
        let mut store = fake_store();
        let (summary, _) = run(&course, &vcs, &mut store).await;
        assert_eq!(summary.graded, 1);
        assert_eq!(store.staged, vec![(("John Doe".into(), 2), "v".into())]);
        assert_eq!(vcs.log_requests.get(), 1);
    }

    #[tokio::test]
    async fn test_missing_deadline() {
        let course = course();
        let vcs = fake_vcs("TASKID is 7\n");
        let mut store = fake_store();
        store.deadlines.clear();
        let (summary, _) = run(&course, &vcs, &mut store).await;
        assert_eq!(summary.graded, 1);
        assert_eq!(store.staged, vec![(("John Doe".into(), 2), "v".into())]);

        let mut store = fake_store();
        store.deadlines.insert(("A-1".into(), 2), "soon".into());
        run(&course, &vcs, &mut store).await;
        assert_eq!(store.staged, vec![(("John Doe".into(), 2), "v".into())]);
    }

    #[test]
    fn test_summary_counts() {
        let mut summary = LabSummary::default();
        for outcome in [
            RepoOutcome::Graded(Grade::default()),
            RepoOutcome::Pending(0.2),
            RepoOutcome::WrongTaskId,
            RepoOutcome::NoBuild,
            RepoOutcome::AlreadyGraded,
        ] {
            summary.record(&outcome);
        }
        assert_eq!(
            (summary.graded, summary.pending, summary.wrong_task_id, summary.skipped),
            (1, 1, 1, 2)
        );
    }
}
