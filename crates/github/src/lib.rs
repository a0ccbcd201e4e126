pub mod checks;
pub mod logs;

use anyhow::{Context, Result, anyhow};
use lab_grader_core::{
    UpstreamError,
    config::{AuthConfig, CiSource},
    models::{BuildInfo, Issue, LinkEvent, RepoCommit, Repository},
    retry::RetryPolicy,
    service::VcsQuery,
};
use octocrab::Octocrab;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{
    checks::{CheckRuns, CombinedStatus, select_successful_run, select_successful_status},
    logs::LogClient,
};

const PER_PAGE: u8 = 100;

pub struct GitHub {
    pub client: Octocrab,
    logs: LogClient,
    retry: RetryPolicy,
}

#[derive(Serialize)]
struct PageParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    per_page: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    page: Option<u32>,
}

#[derive(Deserialize)]
struct Account {
    login: String,
}

#[derive(Deserialize)]
struct ApiRepository {
    name: String,
    owner: Option<Account>,
    default_branch: Option<String>,
}

#[derive(Deserialize)]
struct ApiCommit {
    sha: String,
    author: Option<Account>,
    commit: ApiCommitDetail,
}

#[derive(Deserialize)]
struct ApiCommitDetail {
    message: String,
}

impl From<ApiCommit> for RepoCommit {
    fn from(value: ApiCommit) -> Self {
        Self { sha: value.sha, author: value.author.map(|a| a.login), message: value.commit.message }
    }
}

#[derive(Deserialize)]
struct ApiIssue {
    number: u64,
    title: String,
    pull_request: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct ApiIssueEvent {
    event: String,
    actor: Option<Account>,
    commit_id: Option<String>,
    commit_url: Option<String>,
}

impl GitHub {
    pub async fn new(auth: &AuthConfig) -> Result<Self> {
        let token = auth.github.as_ref().context("No GitHub token configured")?.token.clone();
        let client = Octocrab::builder()
            .personal_token(token.clone())
            .build()
            .context("Failed to create GitHub client")?;
        let profile = client.current().user().await.context("Failed to fetch current user")?;
        tracing::info!("Logged in as {}", profile.login);
        let retry = RetryPolicy::default();
        let logs = LogClient::new(token, auth, retry)?;
        Ok(Self { client, logs, retry })
    }

    async fn get<T, P>(
        &self,
        operation: &str,
        target: &str,
        route: &str,
        params: Option<&P>,
    ) -> Result<T>
    where
        T: DeserializeOwned,
        P: Serialize + ?Sized,
    {
        self.retry
            .run(operation, || async move {
                self.client
                    .get::<T, _, P>(route, params)
                    .await
                    .map_err(|e| upstream_error(e, operation, target))
            })
            .await
    }

    /// Fetch every page of a list endpoint.
    async fn get_all<T>(&self, operation: &str, target: &str, route: &str) -> Result<Vec<T>>
    where T: DeserializeOwned {
        let mut page = 1;
        let mut items = Vec::new();
        loop {
            let params = PageParams { per_page: Some(PER_PAGE), page: Some(page) };
            let batch: Vec<T> = self.get(operation, target, route, Some(&params)).await?;
            let done = batch.len() < PER_PAGE as usize;
            items.extend(batch);
            if done {
                return Ok(items);
            }
            page += 1;
        }
    }

    async fn check_runs(&self, repo: &Repository) -> Result<CheckRuns> {
        let route =
            format!("/repos/{}/commits/{}/check-runs", repo.full_name(), repo.branch());
        let params = PageParams { per_page: Some(PER_PAGE), page: None };
        self.get("Fetch check runs", &repo.full_name(), &route, Some(&params)).await
    }
}

fn upstream_error(err: octocrab::Error, operation: &str, target: &str) -> anyhow::Error {
    match err {
        octocrab::Error::GitHub { source, .. } => {
            UpstreamError::new(operation, target, source.status_code).into()
        }
        e => anyhow::Error::new(e).context(format!("{} failed for '{}'", operation, target)),
    }
}

impl VcsQuery for GitHub {
    async fn list_repos(&self, org: &str, prefix: &str) -> Result<Vec<Repository>> {
        let repos: Vec<ApiRepository> =
            self.get_all("List repositories", org, &format!("/orgs/{}/repos", org)).await?;
        Ok(repos
            .into_iter()
            .filter(|r| r.name.starts_with(prefix))
            .map(|r| Repository {
                owner: r.owner.map_or_else(|| org.to_string(), |o| o.login),
                name: r.name,
                default_branch: r.default_branch,
            })
            .collect())
    }

    async fn list_commits(&self, repo: &Repository, branch: &str) -> Result<Vec<RepoCommit>> {
        let route = format!("/repos/{}/commits?sha={}", repo.full_name(), branch);
        let commits: Vec<ApiCommit> =
            self.get_all("Fetch commits", &repo.full_name(), &route).await?;
        Ok(commits.into_iter().map(RepoCommit::from).collect())
    }

    async fn list_issues(&self, repo: &Repository) -> Result<Vec<Issue>> {
        let route = format!("/repos/{}/issues", repo.full_name());
        let issues: Vec<ApiIssue> = self.get_all("Fetch issues", &repo.full_name(), &route).await?;
        Ok(issues
            .into_iter()
            .filter(|issue| issue.pull_request.is_none())
            .map(|issue| Issue { number: issue.number, title: issue.title })
            .collect())
    }

    async fn list_issue_link_events(
        &self,
        repo: &Repository,
        issue: u64,
    ) -> Result<Vec<LinkEvent>> {
        let route = format!("/repos/{}/issues/{}/events", repo.full_name(), issue);
        let target = format!("{}#{}", repo.full_name(), issue);
        let events: Vec<ApiIssueEvent> = self.get_all("Fetch issue events", &target, &route).await?;
        Ok(events
            .into_iter()
            .filter(|e| e.event == "referenced")
            .map(|e| LinkEvent {
                actor: e.actor.map(|a| a.login),
                commit_sha: e.commit_id,
                commit_url: e.commit_url,
            })
            .collect())
    }

    async fn get_commit(&self, repo: &Repository, sha: &str) -> Result<RepoCommit> {
        let route = format!("/repos/{}/commits/{}", repo.full_name(), sha);
        let commit: ApiCommit =
            self.get("Fetch commit", &repo.full_name(), &route, None::<&()>).await?;
        Ok(commit.into())
    }

    async fn get_successful_build(
        &self,
        repo: &Repository,
        names: &[String],
        require_all: bool,
    ) -> Result<Option<BuildInfo>> {
        let runs = self.check_runs(repo).await?;
        tracing::debug!("{} check runs on {}:{}", runs.check_runs.len(), repo, repo.branch());
        Ok(select_successful_run(&runs.check_runs, names, require_all))
    }

    async fn get_successful_status(
        &self,
        repo: &Repository,
        context: &str,
    ) -> Result<Option<BuildInfo>> {
        let route = format!("/repos/{}/commits/{}/status", repo.full_name(), repo.branch());
        let status: CombinedStatus =
            self.get("Fetch commit status", &repo.full_name(), &route, None::<&()>).await?;
        Ok(select_successful_status(&status, context))
    }

    async fn get_ci_log(
        &self,
        repo: &Repository,
        source: &CiSource,
        build: &BuildInfo,
    ) -> Result<String> {
        match source {
            CiSource::Workflows { .. } => {
                let job_id = build.id.context("Check run has no id")?;
                self.logs.workflow_log(repo, job_id).await
            }
            CiSource::Travis => {
                let build_id =
                    build.external_id.as_deref().context("Check run has no Travis build id")?;
                self.logs.travis_log(repo, build_id).await
            }
            CiSource::AppVeyor => self.logs.appveyor_log(repo).await,
            CiSource::None => Err(anyhow!("No CI service configured for {}", repo)),
        }
    }
}
