//! Check runs and commit statuses of a branch head.

use lab_grader_core::models::BuildInfo;
use serde::Deserialize;
use time::OffsetDateTime;

#[derive(Debug, Clone, Deserialize)]
pub struct CheckRuns {
    #[serde(default)]
    pub total_count: u64,
    pub check_runs: Vec<CheckRun>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckRun {
    pub id: u64,
    pub name: String,
    pub conclusion: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub completed_at: Option<OffsetDateTime>,
    pub external_id: Option<String>,
}

impl CheckRun {
    fn is_success(&self) -> bool { self.conclusion.as_deref() == Some("success") }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CombinedStatus {
    pub state: String,
    #[serde(default)]
    pub statuses: Vec<CommitStatus>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommitStatus {
    pub state: String,
    pub description: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
}

/// Latest successful run whose name contains one of `names`.
/// With `require_all`, a single run that did not succeed rejects the whole head.
pub fn select_successful_run(
    runs: &[CheckRun],
    names: &[String],
    require_all: bool,
) -> Option<BuildInfo> {
    if require_all && runs.iter().any(|run| !run.is_success()) {
        return None;
    }
    runs.iter()
        .filter(|run| run.is_success())
        .filter(|run| names.iter().any(|name| run.name.contains(name.as_str())))
        .filter(|run| run.completed_at.is_some())
        .max_by_key(|run| run.completed_at)
        .map(|run| BuildInfo {
            id: Some(run.id),
            external_id: run.external_id.clone(),
            completed_at: run.completed_at,
        })
}

/// Successful status whose description mentions `context`, if the combined state is a success.
pub fn select_successful_status(status: &CombinedStatus, context: &str) -> Option<BuildInfo> {
    if status.state != "success" {
        return None;
    }
    status
        .statuses
        .iter()
        .find(|s| {
            s.state == "success" && s.description.as_deref().is_some_and(|d| d.contains(context))
        })
        .map(|s| BuildInfo { id: None, external_id: None, completed_at: s.updated_at })
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    const CHECK_RUNS: &str = r#"{
      "total_count": 3,
      "check_runs": [
        {"id": 11, "name": "build (ubuntu-latest)", "status": "completed", "conclusion": "success",
         "completed_at": "2024-03-09T10:00:00Z", "external_id": "a"},
        {"id": 12, "name": "Autograding", "status": "completed", "conclusion": "success",
         "completed_at": "2024-03-10T12:00:00Z", "external_id": "b"},
        {"id": 13, "name": "lint", "status": "completed", "conclusion": "failure",
         "completed_at": "2024-03-10T12:05:00Z", "external_id": null}
      ]
    }"#;

    fn names(names: &[&str]) -> Vec<String> { names.iter().map(|s| s.to_string()).collect() }

    #[test]
    fn test_select_successful_run() {
        let runs: CheckRuns = serde_json::from_str(CHECK_RUNS).unwrap();
        let cases: &[(&[&str], bool, Option<u64>)] = &[
            (&["Autograding", "test", "build"], false, Some(12)),
            (&["build"], false, Some(11)),
            (&["lint"], false, None),
            (&["Travis CI"], false, None),
            (&["Autograding", "test", "build"], true, None),
        ];
        for &(filter, require_all, expected) in cases {
            let build = select_successful_run(&runs.check_runs, &names(filter), require_all);
            assert_eq!(build.and_then(|b| b.id), expected, "{filter:?} {require_all}");
        }

        let passing = runs.check_runs[..2].to_vec();
        let build = select_successful_run(&passing, &names(&["Autograding"]), true).unwrap();
        assert_eq!(build.completed_at, Some(datetime!(2024-03-10 12:00 UTC)));
        assert_eq!(build.external_id.as_deref(), Some("b"));
    }

    #[test]
    fn test_pending_run() {
        let runs: CheckRuns = serde_json::from_str(
            r#"{"check_runs": [{"id": 1, "name": "Travis CI - Branch", "status": "in_progress",
                "conclusion": null, "completed_at": null, "external_id": "77"}]}"#,
        )
        .unwrap();
        assert_eq!(select_successful_run(&runs.check_runs, &names(&["Travis CI"]), false), None);
    }

    #[test]
    fn test_select_successful_status() {
        let status: CombinedStatus = serde_json::from_str(
            r#"{"state": "success", "statuses": [
                {"state": "success", "description": "Coverage ok", "updated_at": "2024-03-01T00:00:00Z"},
                {"state": "success", "description": "AppVeyor build succeeded",
                 "updated_at": "2024-03-02T08:30:00Z"}
            ]}"#,
        )
        .unwrap();
        let build = select_successful_status(&status, "AppVeyor").unwrap();
        assert_eq!(build.completed_at, Some(datetime!(2024-03-02 8:30 UTC)));

        let failed = CombinedStatus { state: "failure".into(), ..status };
        assert_eq!(select_successful_status(&failed, "AppVeyor"), None);
    }
}
