//! Core type definitions: work items, repo configs, and API snapshots

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::Error;

/// Repository identity in `owner/name` form
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RepoId {
    /// Account or organization
    pub owner: String,
    /// Repository name
    pub name: String,
}

impl RepoId {
    /// Build from separate owner and name
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

impl FromStr for RepoId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().split_once('/') {
            Some((owner, name))
                if !owner.is_empty() && !name.is_empty() && !name.contains('/') =>
            {
                Ok(Self::new(owner, name))
            }
            _ => Err(Error::Config(format!(
                "Invalid repository format (expected owner/name): {}",
                s
            ))),
        }
    }
}

impl TryFrom<String> for RepoId {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<RepoId> for String {
    fn from(repo: RepoId) -> Self {
        repo.to_string()
    }
}

/// Pull request state of a work item
///
/// Persisted as a stable string discriminant; unknown values decode to `NoPr`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
#[repr(u8)]
pub enum PrState {
    /// No pull request found for the branch
    #[default]
    NoPr,
    /// Open pull request
    Open,
    /// Merged pull request
    Merged,
    /// Closed without merge
    Closed,
}

impl PrState {
    /// Get string representation
    #[inline]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NoPr => "no_pr",
            Self::Open => "open",
            Self::Merged => "merged",
            Self::Closed => "closed",
        }
    }

    /// Decode a persisted discriminant, falling back to `NoPr`
    #[inline]
    pub fn from_discriminant(s: &str) -> Self {
        match s {
            "open" => Self::Open,
            "merged" => Self::Merged,
            "closed" => Self::Closed,
            _ => Self::NoPr,
        }
    }
}

impl From<String> for PrState {
    fn from(s: String) -> Self {
        Self::from_discriminant(&s)
    }
}

impl From<PrState> for String {
    fn from(state: PrState) -> Self {
        state.as_str().to_string()
    }
}

/// Combined commit status of a PR head
///
/// Persisted as a stable string discriminant; unknown values decode to `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
#[repr(u8)]
pub enum CheckState {
    /// Pending, absent, or unrecognized
    #[default]
    Unknown,
    /// All checks passed
    Passing,
    /// At least one check failed or errored
    Failing,
}

impl CheckState {
    /// Get string representation
    #[inline]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Passing => "passing",
            Self::Failing => "failing",
        }
    }

    /// Decode a persisted discriminant, falling back to `Unknown`
    #[inline]
    pub fn from_discriminant(s: &str) -> Self {
        match s {
            "passing" => Self::Passing,
            "failing" => Self::Failing,
            _ => Self::Unknown,
        }
    }

    /// Map a provider combined-status string
    #[inline]
    pub fn from_provider(state: &str) -> Self {
        match state {
            "success" => Self::Passing,
            "failure" | "error" => Self::Failing,
            _ => Self::Unknown,
        }
    }
}

impl From<String> for CheckState {
    fn from(s: String) -> Self {
        Self::from_discriminant(&s)
    }
}

impl From<CheckState> for String {
    fn from(state: CheckState) -> Self {
        state.as_str().to_string()
    }
}

/// A tracked unit of work: ticket, branch, PR, build, deployment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: Uuid,
    pub ticket: String,
    pub repo: RepoId,
    pub branch: String,
    #[serde(default)]
    pub pr_number: Option<u64>,
    #[serde(default)]
    pub pr_url: Option<String>,
    #[serde(default)]
    pub head_sha: Option<String>,
    #[serde(default)]
    pub pr_state: PrState,
    #[serde(default)]
    pub check_state: CheckState,
    #[serde(default)]
    pub latest_tag: Option<String>,
    #[serde(default)]
    pub tag_run_url: Option<String>,
    #[serde(default)]
    pub deployment_pr_url: Option<String>,
    // Counters never decrease while the PR number stays the same; a new PR
    // number starts them over from its own fetched values.
    #[serde(default)]
    pub review_requests: u32,
    #[serde(default)]
    pub issue_comments: u32,
    #[serde(default)]
    pub review_comments: u32,
    #[serde(default)]
    pub last_error: Option<String>,
    #[serde(default)]
    pub last_synced_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkItem {
    /// Start tracking a ticket on a branch
    pub fn new(ticket: impl Into<String>, repo: RepoId, branch: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            ticket: ticket.into(),
            repo,
            branch: branch.into(),
            pr_number: None,
            pr_url: None,
            head_sha: None,
            pr_state: PrState::NoPr,
            check_state: CheckState::Unknown,
            latest_tag: None,
            tag_run_url: None,
            deployment_pr_url: None,
            review_requests: 0,
            issue_comments: 0,
            review_comments: 0,
            last_error: None,
            last_synced_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Capture the fields used for notification deltas
    pub fn signal_snapshot(&self) -> SignalSnapshot {
        SignalSnapshot {
            pr_state: self.pr_state,
            check_state: self.check_state,
            review_requests: self.review_requests,
            issue_comments: self.issue_comments,
            review_comments: self.review_comments,
        }
    }

    /// Reset PR-derived fields after the branch's PR disappeared.
    ///
    /// Counters are kept; see `DESIGN.md` (no-PR counters).
    pub fn clear_pull_request(&mut self) {
        self.pr_number = None;
        self.pr_url = None;
        self.head_sha = None;
        self.pr_state = PrState::NoPr;
        self.check_state = CheckState::Unknown;
    }

    /// Stamp sync and update times
    pub fn touch_synced(&mut self) {
        let now = Utc::now();
        self.last_synced_at = Some(now);
        self.updated_at = now;
    }

    /// Stamp the update time only
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Copy the fields a refresh owns from `synced`, leaving the rest as is.
    pub fn apply_sync(&mut self, synced: &WorkItem) {
        self.pr_number = synced.pr_number;
        self.pr_url = synced.pr_url.clone();
        self.head_sha = synced.head_sha.clone();
        self.pr_state = synced.pr_state;
        self.check_state = synced.check_state;
        self.latest_tag = synced.latest_tag.clone();
        self.tag_run_url = synced.tag_run_url.clone();
        self.review_requests = synced.review_requests;
        self.issue_comments = synced.issue_comments;
        self.review_comments = synced.review_comments;
        self.last_error = synced.last_error.clone();
        self.last_synced_at = synced.last_synced_at;
        self.updated_at = self.updated_at.max(synced.updated_at);
    }
}

/// Per-source-repository settings for tag resolution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRepoConfig {
    pub repo: RepoId,
    /// Branch merged PRs land on; falls back to the PR's base branch
    #[serde(default)]
    pub target_branch: Option<String>,
    /// Workflow file name or numeric id that publishes the tag
    pub workflow_id: String,
}

/// Location of the nested deploy-tag key in a mobile config file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeclaredKey {
    /// Top-level `key: value`
    Flat { key: String },
    /// `parent:` followed by an indented `child: value`
    Nested { parent: String, child: String },
}

impl DeclaredKey {
    /// Flat key helper
    pub fn flat(key: impl Into<String>) -> Self {
        Self::Flat { key: key.into() }
    }

    /// Nested key helper
    pub fn nested(parent: impl Into<String>, child: impl Into<String>) -> Self {
        Self::Nested {
            parent: parent.into(),
            child: child.into(),
        }
    }
}

impl fmt::Display for DeclaredKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Flat { key } => write!(f, "{}", key),
            Self::Nested { parent, child } => write!(f, "{}.{}", parent, child),
        }
    }
}

fn default_config_path() -> String {
    "deploy/config.yml".to_string()
}

fn default_config_key() -> DeclaredKey {
    DeclaredKey::nested("deploy", "tag")
}

/// Mobile deployment repository backed by a local working copy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRepoConfig {
    pub repo: RepoId,
    pub local_path: std::path::PathBuf,
    /// Environment branch the config lives on and PRs target
    pub env_branch: String,
    #[serde(default = "default_config_path")]
    pub config_path: String,
    #[serde(default = "default_config_key")]
    pub config_key: DeclaredKey,
}

fn default_path_template() -> String {
    "{module}/values-{environment}.yaml".to_string()
}

fn default_version_key() -> String {
    "tag".to_string()
}

/// Web values repository updated entirely through the API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebDeployTarget {
    pub repo: RepoId,
    pub base_branch: String,
    #[serde(default = "default_path_template")]
    pub path_template: String,
    #[serde(default = "default_version_key")]
    pub version_key: String,
}

impl WebDeployTarget {
    /// Deterministic values-file path for a (module, environment) pair
    pub fn file_path(&self, module: &str, environment: &str) -> String {
        self.path_template
            .replace("{module}", module)
            .replace("{environment}", environment)
    }
}

fn default_trigger_key() -> String {
    "deploy".to_string()
}

/// Deployment-trigger API endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployTriggerConfig {
    /// Full URL executions are POSTed to
    pub endpoint: String,
    /// Pipeline identifier passed in every payload
    pub pipeline: String,
    /// Secret store key holding the API key
    #[serde(default = "default_trigger_key")]
    pub api_key_name: String,
}

/// Pull request as returned by a single refresh
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrSnapshot {
    pub number: u64,
    pub url: String,
    /// Raw provider state (`open`, `closed`)
    pub state: String,
    pub merged_at: Option<String>,
    pub head_sha: String,
    pub base_branch: String,
}

impl PrSnapshot {
    /// Derive the tracked state: merged wins over the provider state
    pub fn derived_state(&self) -> PrState {
        if self.merged_at.is_some() {
            return PrState::Merged;
        }
        match self.state.as_str() {
            "open" => PrState::Open,
            "closed" => PrState::Closed,
            _ => PrState::NoPr,
        }
    }
}

/// Activity counters fetched for one PR
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PrSignals {
    pub review_requests: u32,
    pub issue_comments: u32,
    pub review_comments: u32,
}

/// State captured before a refresh for delta comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SignalSnapshot {
    pub pr_state: PrState,
    pub check_state: CheckState,
    pub review_requests: u32,
    pub issue_comments: u32,
    pub review_comments: u32,
}

/// Workflow run status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowStatus {
    Queued,
    InProgress,
    Completed,
}

/// Workflow run conclusion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowConclusion {
    Success,
    Failure,
    Cancelled,
    Skipped,
    TimedOut,
    Neutral,
}

/// Workflow run metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowRun {
    pub id: u64,
    pub name: String,
    pub status: WorkflowStatus,
    pub conclusion: Option<WorkflowConclusion>,
    pub branch: String,
    pub head_sha: String,
    pub html_url: String,
    /// Unix epoch seconds
    pub created_at: i64,
}

/// Job within a workflow run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowJob {
    pub id: u64,
    pub name: String,
    pub status: WorkflowStatus,
    pub conclusion: Option<WorkflowConclusion>,
    pub run_id: u64,
}

/// Decoded repository file and its blob sha
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileContent {
    pub path: String,
    pub text: String,
    pub sha: String,
}

/// Read-modify-write update of a repository file
#[derive(Debug, Clone)]
pub struct FileUpdate<'a> {
    pub path: &'a str,
    pub branch: &'a str,
    /// New content as plain text; encoded on the wire
    pub content: &'a str,
    /// Blob sha the edit was based on
    pub previous_sha: &'a str,
    pub message: &'a str,
}

/// Pull request creation input
#[derive(Debug, Clone)]
pub struct NewPullRequest<'a> {
    pub title: &'a str,
    pub head: &'a str,
    pub base: &'a str,
    pub body: &'a str,
}

/// Newly created pull request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedPullRequest {
    pub number: u64,
    pub url: String,
}

/// Merge strategy for `merge_pull_request`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeMethod {
    Merge,
    Squash,
    Rebase,
}

impl MergeMethod {
    /// Get string representation
    #[inline]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Merge => "merge",
            Self::Squash => "squash",
            Self::Rebase => "rebase",
        }
    }
}

/// Body sent to the deployment-trigger API for one (module, environment) pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TriggerPayload {
    pub pipeline: String,
    pub module: String,
    pub environment: String,
    pub version: String,
    pub ticket: String,
}

/// Module name → version, first writer wins
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleVersionMap(BTreeMap<String, String>);

impl ModuleVersionMap {
    /// Create an empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert unless the module already has a version. Returns true if inserted.
    pub fn insert_if_absent(&mut self, module: &str, version: &str) -> bool {
        if self.0.contains_key(module) {
            return false;
        }
        self.0.insert(module.to_string(), version.to_string());
        true
    }

    /// Fold another map in without overwriting existing entries
    pub fn merge_first_wins(&mut self, other: ModuleVersionMap) {
        for (module, version) in other.0 {
            self.0.entry(module).or_insert(version);
        }
    }

    /// Version recorded for a module
    pub fn get(&self, module: &str) -> Option<&str> {
        self.0.get(module).map(String::as_str)
    }

    /// True if the module has a version
    pub fn contains(&self, module: &str) -> bool {
        self.0.contains_key(module)
    }

    /// Modules from `wanted` with no non-empty version, in input order
    pub fn missing<'a, S: AsRef<str>>(&self, wanted: &'a [S]) -> Vec<&'a str> {
        wanted
            .iter()
            .map(AsRef::as_ref)
            .filter(|m| self.get(m).map_or(true, |v| v.trim().is_empty()))
            .collect()
    }

    /// Number of modules with a version
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when no module has a version
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate (module, version) pairs in module order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(m, v)| (m.as_str(), v.as_str()))
    }
}

impl FromIterator<(String, String)> for ModuleVersionMap {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (module, version) in iter {
            map.insert_if_absent(&module, &version);
        }
        map
    }
}
