use std::collections::HashSet;

use anyhow::{Context, Result};
use lab_grader_core::{
    config::{CommitRequirement, IssueRequirement, RepoRequirements},
    models::{Issue, Repository},
    service::VcsQuery,
};

/// Partial credit for repository activity by the student.
pub struct RequirementEvaluator<'a, V> {
    vcs: &'a V,
    staff: HashSet<String>,
}

impl<'a, V: VcsQuery> RequirementEvaluator<'a, V> {
    pub fn new(vcs: &'a V, staff: &[String]) -> Self {
        Self { vcs, staff: staff.iter().map(|login| login.to_lowercase()).collect() }
    }

    fn is_staff(&self, login: &str) -> bool { self.staff.contains(&login.to_lowercase()) }

    /// Sum of the configured commit and issue coefficients, or `None` if neither is configured.
    pub async fn evaluate(
        &self,
        repo: &Repository,
        requirements: &RepoRequirements,
    ) -> Result<Option<f64>> {
        let commit = match &requirements.commit {
            Some(requirement) => Some(self.commit_coefficient(repo, requirement).await?),
            None => None,
        };
        let issue = match &requirements.issue {
            Some(requirement) => Some(self.issue_coefficient(repo, requirement).await?),
            None => None,
        };
        if commit.is_none() && issue.is_none() {
            return Ok(None);
        }
        let sum = commit.unwrap_or_default() + issue.unwrap_or_default();
        tracing::debug!("Requirement coefficients for {}: commit {:?}, issue {:?}", repo, commit, issue);
        Ok(Some(requirements.max_coefficient.map_or(sum, |max| sum.min(max))))
    }

    /// Commits on the default branch not authored by staff, optionally filtered by message.
    pub async fn commit_coefficient(
        &self,
        repo: &Repository,
        requirement: &CommitRequirement,
    ) -> Result<f64> {
        let commits = self
            .vcs
            .list_commits(repo, repo.branch())
            .await
            .with_context(|| format!("Failed to fetch commits for {}", repo))?;
        let count = commits
            .iter()
            .filter(|c| c.author.as_deref().is_none_or(|login| !self.is_staff(login)))
            .filter(|c| requirement.msg_part.as_deref().is_none_or(|part| c.message.contains(part)))
            .count();
        Ok(award(count, requirement.min_quantity, requirement.grade_percent))
    }

    /// Issues the student linked to their own commits.
    pub async fn issue_coefficient(
        &self,
        repo: &Repository,
        requirement: &IssueRequirement,
    ) -> Result<f64> {
        let issues = self
            .vcs
            .list_issues(repo)
            .await
            .with_context(|| format!("Failed to fetch issues for {}", repo))?
            .into_iter()
            .filter(|issue| {
                requirement.prefix.as_deref().is_none_or(|prefix| issue.title.starts_with(prefix))
            })
            .collect::<Vec<_>>();
        if issues.len() < requirement.min_quantity as usize {
            return Ok(0.0);
        }
        let mut correct = 0;
        for issue in &issues {
            if self.issue_is_linked(repo, issue, requirement).await? {
                correct += 1;
            }
        }
        Ok(award(correct, requirement.min_quantity, requirement.grade_percent))
    }

    async fn issue_is_linked(
        &self,
        repo: &Repository,
        issue: &Issue,
        requirement: &IssueRequirement,
    ) -> Result<bool> {
        let events = self
            .vcs
            .list_issue_link_events(repo, issue.number)
            .await
            .with_context(|| format!("Failed to fetch events for {}#{}", repo, issue.number))?;
        let repo_path = format!("/{}/", repo.full_name());
        let shas = events
            .iter()
            .filter(|e| e.actor.as_deref().is_some_and(|login| !self.is_staff(login)))
            .filter(|e| e.commit_url.as_deref().is_some_and(|url| url.contains(&repo_path)))
            .filter_map(|e| e.commit_sha.as_deref())
            .collect::<Vec<_>>();
        let Some(part) = requirement.linked_commit_msg_part.as_deref() else {
            return Ok(!shas.is_empty());
        };
        for sha in shas {
            let commit = self
                .vcs
                .get_commit(repo, sha)
                .await
                .with_context(|| format!("Failed to fetch commit {} of {}", sha, repo))?;
            if commit.message.contains(part) {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

fn award(count: usize, min_quantity: u32, grade_percent: u32) -> f64 {
    if count >= min_quantity as usize { f64::from(grade_percent) / 100.0 } else { 0.0 }
}
