//! Raw build log downloads from GitHub Actions, Travis CI and AppVeyor.

use anyhow::{Context, Result, anyhow};
use http::StatusCode;
use lab_grader_core::{
    UpstreamError,
    config::{AppVeyorConfig, AuthConfig},
    models::Repository,
    retry::RetryPolicy,
};
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, de::DeserializeOwned};

const GITHUB_API: &str = "https://api.github.com";
const TRAVIS_API: &str = "https://api.travis-ci.com";
const APPVEYOR_API: &str = "https://ci.appveyor.com/api";
const USER_AGENT: &str = concat!("lab-grader/", env!("CARGO_PKG_VERSION"));

pub struct LogClient {
    http: Client,
    github_token: String,
    travis_token: Option<String>,
    appveyor: Option<AppVeyorConfig>,
    retry: RetryPolicy,
}

#[derive(Debug, Deserialize)]
pub struct TravisBuild {
    #[serde(default)]
    pub jobs: Vec<TravisJob>,
}

#[derive(Debug, Deserialize)]
pub struct TravisJob {
    pub id: u64,
}

#[derive(Debug, Deserialize)]
struct TravisLog {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppVeyorProjectsPage {
    pub list: Vec<AppVeyorProject>,
    #[serde(default)]
    pub has_next_page: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppVeyorProject {
    pub repository_name: String,
    pub slug: String,
}

#[derive(Debug, Deserialize)]
pub struct AppVeyorLatest {
    pub build: AppVeyorBuild,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppVeyorBuild {
    pub build_id: u64,
    pub status: String,
    #[serde(default)]
    pub jobs: Vec<AppVeyorJob>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppVeyorJob {
    pub job_id: String,
}

impl LogClient {
    pub fn new(github_token: String, auth: &AuthConfig, retry: RetryPolicy) -> Result<Self> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            http,
            github_token,
            travis_token: auth.travis.as_ref().map(|t| t.token.clone()),
            appveyor: auth.appveyor.clone(),
            retry,
        })
    }

    async fn send<F>(&self, operation: &str, target: &str, request: F) -> Result<Response>
    where F: Fn() -> RequestBuilder {
        let request = &request;
        self.retry
            .run(operation, || async move {
                let response = request()
                    .send()
                    .await
                    .with_context(|| format!("{} failed for '{}'", operation, target))?;
                UpstreamError::check(response.status(), operation, target)?;
                Ok(response)
            })
            .await
    }

    async fn json<T, F>(&self, operation: &str, target: &str, request: F) -> Result<T>
    where
        T: DeserializeOwned,
        F: Fn() -> RequestBuilder,
    {
        self.send(operation, target, request)
            .await?
            .json()
            .await
            .with_context(|| format!("Failed to parse {} response for '{}'", operation, target))
    }

    /// GitHub Actions job log. The check run id doubles as the job id.
    /// Expired logs (410 Gone) are returned as an empty log.
    pub async fn workflow_log(&self, repo: &Repository, job_id: u64) -> Result<String> {
        let url = format!("{}/repos/{}/actions/jobs/{}/logs", GITHUB_API, repo.full_name(), job_id);
        let result = self
            .send("Fetch workflow job log", &repo.full_name(), || {
                self.http
                    .get(&url)
                    .header("Authorization", format!("token {}", self.github_token))
                    .header("Accept", "application/vnd.github.v3+json")
            })
            .await;
        let response = match result {
            Ok(response) => response,
            Err(e)
                if e.downcast_ref::<UpstreamError>()
                    .is_some_and(|e| e.status == StatusCode::GONE) =>
            {
                tracing::warn!("Log of job {} in {} has expired", job_id, repo);
                return Ok(String::new());
            }
            Err(e) => return Err(e),
        };
        response.text().await.with_context(|| format!("Failed to read log of job {}", job_id))
    }

    /// Log of the last job of a Travis CI build.
    pub async fn travis_log(&self, repo: &Repository, build_id: &str) -> Result<String> {
        let token = self.travis_token.as_deref().context("No Travis CI token configured")?;
        let travis = |url: String| {
            move || {
                self.http
                    .get(&url)
                    .header("Travis-API-Version", "3")
                    .header("Authorization", format!("token {}", token))
            }
        };
        let build: TravisBuild = self
            .json(
                "Fetch Travis CI build",
                &repo.full_name(),
                travis(format!("{}/build/{}", TRAVIS_API, build_id)),
            )
            .await?;
        let job = build
            .jobs
            .last()
            .ok_or_else(|| anyhow!("No jobs in Travis CI build {} of {}", build_id, repo))?;
        let log: TravisLog = self
            .json(
                "Fetch Travis CI log",
                &repo.full_name(),
                travis(format!("{}/job/{}/log", TRAVIS_API, job.id)),
            )
            .await?;
        Ok(log.content.unwrap_or_default())
    }

    /// Log of the first job of the latest AppVeyor build of the repository's project.
    pub async fn appveyor_log(&self, repo: &Repository) -> Result<String> {
        let config = self.appveyor.as_ref().context("No AppVeyor account configured")?;
        let appveyor = |url: String| {
            move || self.http.get(&url).bearer_auth(&config.token)
        };
        let slug = self.appveyor_slug(config, repo).await?;
        let latest: AppVeyorLatest = self
            .json(
                "Fetch AppVeyor build",
                &repo.full_name(),
                appveyor(format!("{}/projects/{}/{}", APPVEYOR_API, config.account, slug)),
            )
            .await?;
        let job_id = latest_job(&latest.build)
            .with_context(|| format!("AppVeyor project '{}' of {}", slug, repo))?;
        self.send(
            "Fetch AppVeyor log",
            &repo.full_name(),
            appveyor(format!("{}/buildjobs/{}/log", APPVEYOR_API, job_id)),
        )
        .await?
        .text()
        .await
        .with_context(|| format!("Failed to read AppVeyor log of job {}", job_id))
    }

    async fn appveyor_slug(&self, config: &AppVeyorConfig, repo: &Repository) -> Result<String> {
        let full_name = repo.full_name();
        let mut page_index = 0;
        loop {
            let url = format!(
                "{}/account/{}/projects/paged?pageIndex={}&pageSize=100",
                APPVEYOR_API, config.account, page_index
            );
            let page: AppVeyorProjectsPage = self
                .json("Fetch AppVeyor projects", &config.account, || {
                    self.http.get(&url).bearer_auth(&config.token)
                })
                .await?;
            if let Some(project) = page.list.iter().find(|p| p.repository_name == full_name) {
                return Ok(project.slug.clone());
            }
            if !page.has_next_page {
                return Err(anyhow!("No AppVeyor project for {}", repo));
            }
            page_index += 1;
        }
    }
}

/// First job of a successful build.
pub fn latest_job(build: &AppVeyorBuild) -> Result<&str> {
    if build.status != "success" {
        return Err(anyhow!("Build {} was not successful ({})", build.build_id, build.status));
    }
    build
        .jobs
        .first()
        .map(|job| job.job_id.as_str())
        .ok_or_else(|| anyhow!("No jobs in build {}", build.build_id))
}
