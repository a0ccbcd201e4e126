use std::{
    collections::BTreeMap,
    fs::File,
    io::BufReader,
    path::Path,
    sync::OnceLock,
};

use anyhow::{Context, Result, bail};
use regex::Regex;
use serde::{Deserialize, Deserializer};
use time::UtcOffset;

/// Configuration errors. These abort the run: they are operator mistakes, not data conditions.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Unsupported CI/CD service '{0}'")]
    UnsupportedCi(String),
    #[error("Invalid CI/CD entry '{name}': {reason}")]
    InvalidCi { name: String, reason: String },
    #[error("Lab {lab}: 'taskid-max' must be set to a positive value unless task ids are ignored")]
    MissingTaskIdMax { lab: String },
    #[error("Lab {lab}: 'github-prefix' must not be empty")]
    EmptyPrefix { lab: String },
    #[error("Lab {lab}: lab key is not numeric, set 'short-name' to its spreadsheet column")]
    LabColumn { lab: String },
    #[error("Invalid timezone '{0}', expected UTC or an offset like +03:00")]
    InvalidTimezone(String),
    #[error("Lab {0} not found in course config")]
    UnknownLab(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub course: CourseConfig,
    pub auth: AuthConfig,
}

impl Config {
    /// Load the course config, merging in the authentication config if present.
    /// Top-level keys in the course config take precedence.
    pub fn load(course_path: &Path, auth_path: Option<&Path>) -> Result<Self> {
        let mut merged = match auth_path {
            Some(path) if path.exists() => read_yaml(path)?,
            Some(path) => {
                tracing::warn!("Authentication config file '{}' does not exist", path.display());
                serde_yaml::Mapping::new()
            }
            None => serde_yaml::Mapping::new(),
        };
        for (key, value) in read_yaml(course_path)? {
            merged.insert(key, value);
        }
        if !merged.contains_key("auth") {
            bail!("No authentication data found in course config and auth config files");
        }
        let config: Config = serde_yaml::from_value(serde_yaml::Value::Mapping(merged))
            .with_context(|| format!("Failed to parse config '{}'", course_path.display()))?;
        config.course.validate()?;
        Ok(config)
    }
}

fn read_yaml(path: &Path) -> Result<serde_yaml::Mapping> {
    let file = BufReader::new(
        File::open(path).with_context(|| format!("Failed to open {}", path.display()))?,
    );
    serde_yaml::from_reader(file).with_context(|| format!("Failed to parse {}", path.display()))
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CourseConfig {
    pub name: String,
    /// Offset applied to spreadsheet deadlines.
    #[serde(default = "utc", deserialize_with = "deserialize_offset")]
    pub timezone: UtcOffset,
    pub github: CourseGitHubConfig,
    pub google: Option<GoogleConfig>,
    /// Delay between repositories, to stay under third-party rate limits.
    #[serde(default)]
    pub pacing_ms: u64,
    pub labs: BTreeMap<String, LabConfig>,
}

impl CourseConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (id, lab) in &self.labs {
            lab.validate(id)?;
        }
        Ok(())
    }

    pub fn lab(&self, id: &str) -> Result<&LabConfig, ConfigError> {
        self.labs.get(id).ok_or_else(|| ConfigError::UnknownLab(id.to_string()))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CourseGitHubConfig {
    pub organization: String,
    /// Staff accounts, never counted as student activity.
    #[serde(default)]
    pub staff: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GoogleConfig {
    pub spreadsheet: String,
    /// Sheet that is not a student group; receives the last run timestamp.
    pub info_sheet: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct LabConfig {
    pub github_prefix: String,
    /// Spreadsheet lab column, when the lab key itself is not numeric.
    pub short_name: Option<u32>,
    pub taskid_max: Option<u32>,
    #[serde(default)]
    pub taskid_shift: i64,
    #[serde(default)]
    pub penalty_max: u32,
    #[serde(default)]
    pub ignore_completion_date: bool,
    #[serde(default)]
    pub ignore_task_id: bool,
    #[serde(default)]
    pub ci: CiSources,
    #[serde(rename = "repo_requirements")]
    pub repo_requirements: Option<RepoRequirements>,
}

impl LabConfig {
    pub fn validate(&self, id: &str) -> Result<(), ConfigError> {
        if self.github_prefix.is_empty() {
            return Err(ConfigError::EmptyPrefix { lab: id.to_string() });
        }
        if self.checks_task_id() && self.taskid_max.is_none_or(|max| max == 0) {
            return Err(ConfigError::MissingTaskIdMax { lab: id.to_string() });
        }
        self.column(id)?;
        Ok(())
    }

    /// Whether CI logs are checked for the student's task id.
    pub fn checks_task_id(&self) -> bool { !self.ignore_task_id && !self.ignore_completion_date }

    /// Spreadsheet column number of this lab.
    pub fn column(&self, id: &str) -> Result<u32, ConfigError> {
        match self.short_name {
            Some(column) => Ok(column),
            None => id.trim().parse().map_err(|_| ConfigError::LabColumn { lab: id.to_string() }),
        }
    }

    /// Task id a student must report: `(task_id + shift) mod max`, where 0 maps to `max`.
    pub fn expected_task_id(&self, student_task_id: u32) -> Option<u32> {
        let max = i64::from(self.taskid_max.filter(|&max| max > 0)?);
        let id = (i64::from(student_task_id) + self.taskid_shift).rem_euclid(max);
        u32::try_from(if id == 0 { max } else { id }).ok()
    }
}

/// A CI service that may report a successful build for a repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CiSource {
    /// GitHub Actions; every check run must succeed and one of `jobs` must match.
    Workflows { jobs: Vec<String> },
    Travis,
    AppVeyor,
    /// No CI service; the repository is never graded from CI.
    None,
}

pub const DEFAULT_WORKFLOW_JOBS: &[&str] = &["Autograding", "test", "build"];

impl CiSource {
    pub fn parse(name: &str, jobs: Option<Vec<String>>) -> Result<Self, ConfigError> {
        match name.trim() {
            "workflows" => Ok(Self::Workflows {
                jobs: jobs.unwrap_or_else(|| {
                    DEFAULT_WORKFLOW_JOBS.iter().map(|s| s.to_string()).collect()
                }),
            }),
            "travis" => Ok(Self::Travis),
            "appveyor" => Ok(Self::AppVeyor),
            "" | "none" => Ok(Self::None),
            other => Err(ConfigError::UnsupportedCi(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Workflows { .. } => "workflows",
            Self::Travis => "travis",
            Self::AppVeyor => "appveyor",
            Self::None => "none",
        }
    }
}

/// Ordered list of CI services to try.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawCiSources")]
pub struct CiSources(pub Vec<CiSource>);

impl Default for CiSources {
    fn default() -> Self { Self(vec![CiSource::None]) }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawCiSources {
    List(Vec<RawCiEntry>),
    Map(serde_yaml::Mapping),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawCiEntry {
    Name(String),
    WithJobs(serde_yaml::Mapping),
}

impl TryFrom<RawCiSources> for CiSources {
    type Error = ConfigError;

    fn try_from(value: RawCiSources) -> Result<Self, Self::Error> {
        let mut out = Vec::new();
        match value {
            RawCiSources::List(entries) => {
                for entry in entries {
                    match entry {
                        RawCiEntry::Name(name) => out.push(CiSource::parse(&name, None)?),
                        RawCiEntry::WithJobs(map) => out.extend(parse_ci_map(map)?),
                    }
                }
            }
            RawCiSources::Map(map) => out.extend(parse_ci_map(map)?),
        }
        Ok(Self(out))
    }
}

/// `name: [jobs]` entries, in the order they are written.
fn parse_ci_map(map: serde_yaml::Mapping) -> Result<Vec<CiSource>, ConfigError> {
    map.into_iter()
        .map(|(name, jobs)| {
            let name = match name {
                serde_yaml::Value::String(name) => name,
                other => {
                    return Err(ConfigError::InvalidCi {
                        name: format!("{other:?}"),
                        reason: "service name must be a string".to_string(),
                    });
                }
            };
            let jobs = match jobs {
                serde_yaml::Value::Null => None,
                jobs => Some(serde_yaml::from_value::<Vec<String>>(jobs).map_err(|e| {
                    ConfigError::InvalidCi { name: name.clone(), reason: e.to_string() }
                })?),
            };
            CiSource::parse(&name, jobs)
        })
        .collect()
}

/// Partial credit awarded for repository activity.
#[derive(Debug, Clone, Deserialize)]
pub struct RepoRequirements {
    pub commit: Option<CommitRequirement>,
    pub issue: Option<IssueRequirement>,
    /// Cap for the summed coefficient. Uncapped when absent.
    pub max_coefficient: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommitRequirement {
    pub min_quantity: u32,
    pub grade_percent: u32,
    /// Only commits whose message contains this are counted.
    pub msg_part: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IssueRequirement {
    pub min_quantity: u32,
    pub grade_percent: u32,
    /// Only issues whose title starts with this are counted.
    pub prefix: Option<String>,
    /// At least one linked commit message must contain this.
    pub linked_commit_msg_part: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthConfig {
    pub github: Option<TokenConfig>,
    pub google: Option<TokenConfig>,
    pub travis: Option<TokenConfig>,
    pub appveyor: Option<AppVeyorConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenConfig {
    pub token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppVeyorConfig {
    pub token: String,
    pub account: String,
}

fn utc() -> UtcOffset { UtcOffset::UTC }

fn deserialize_offset<'de, D>(deserializer: D) -> Result<UtcOffset, D::Error>
where D: Deserializer<'de> {
    let value = String::deserialize(deserializer)?;
    parse_utc_offset(&value)
        .ok_or_else(|| serde::de::Error::custom(ConfigError::InvalidTimezone(value)))
}

/// Parse `UTC`, `Z`, `+03:00`, `+0300`, `+3` or `UTC+3`.
pub fn parse_utc_offset(value: &str) -> Option<UtcOffset> {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    let value = value.trim();
    if value.is_empty() || ["UTC", "GMT", "Z"].iter().any(|v| value.eq_ignore_ascii_case(v)) {
        return Some(UtcOffset::UTC);
    }
    let caps = REGEX
        .get_or_init(|| {
            Regex::new(r"^(?i:UTC|GMT)?(?P<sign>[+-])(?P<hours>\d{1,2})(?::?(?P<minutes>\d{2}))?$")
                .unwrap()
        })
        .captures(value)?;
    let hours: i8 = caps.name("hours")?.as_str().parse().ok()?;
    let minutes: i8 = caps.name("minutes").map_or(Some(0), |m| m.as_str().parse().ok())?;
    let sign = if &caps["sign"] == "-" { -1 } else { 1 };
    UtcOffset::from_hms(sign * hours, sign * minutes, 0).ok()
}
