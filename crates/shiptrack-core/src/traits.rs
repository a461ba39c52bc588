//! Collaborator traits the core is generic over
//!
//! Async methods return `impl Future + Send` so resolvers and pipelines stay
//! statically dispatched and can be driven from a spawned Tokio task. Tests
//! substitute in-memory fakes for every trait here.

use std::future::Future;
use std::path::Path;

use crate::error::Result;
use crate::types::{
    CheckState, CreatedPullRequest, FileContent, FileUpdate, MergeMethod, NewPullRequest,
    PrSignals, PrSnapshot, RepoId, TriggerPayload, WorkflowJob, WorkflowRun,
};

/// Hosting provider REST operations, one method per interaction.
///
/// Implementations never retry; every non-2xx status is an error.
pub trait HostingApi: Send + Sync {
    /// Most recent PR (any state) whose head is `owner:head_branch`
    fn find_pull_request<'a>(
        &'a self,
        repo: &'a RepoId,
        head_branch: &'a str,
    ) -> impl Future<Output = Result<Option<PrSnapshot>>> + Send + 'a;

    /// Combined commit status for a sha
    fn commit_status<'a>(
        &'a self,
        repo: &'a RepoId,
        sha: &'a str,
    ) -> impl Future<Output = Result<CheckState>> + Send + 'a;

    /// Reviewer and comment counters, fetched concurrently
    fn pull_request_signals<'a>(
        &'a self,
        repo: &'a RepoId,
        number: u64,
    ) -> impl Future<Output = Result<PrSignals>> + Send + 'a;

    /// Newest successful run among the last 10 completed runs of a workflow
    fn latest_successful_run<'a>(
        &'a self,
        repo: &'a RepoId,
        workflow_id: &'a str,
        branch: &'a str,
    ) -> impl Future<Output = Result<Option<WorkflowRun>>> + Send + 'a;

    /// Most recent runs on a branch regardless of conclusion, newest first
    fn list_runs<'a>(
        &'a self,
        repo: &'a RepoId,
        branch: &'a str,
        limit: u32,
    ) -> impl Future<Output = Result<Vec<WorkflowRun>>> + Send + 'a;

    /// Jobs of a workflow run
    fn jobs<'a>(
        &'a self,
        repo: &'a RepoId,
        run_id: u64,
    ) -> impl Future<Output = Result<Vec<WorkflowJob>>> + Send + 'a;

    /// Raw log text of a job
    fn job_logs<'a>(
        &'a self,
        repo: &'a RepoId,
        job_id: u64,
    ) -> impl Future<Output = Result<String>> + Send + 'a;

    /// Head sha of a branch
    fn branch_sha<'a>(
        &'a self,
        repo: &'a RepoId,
        branch: &'a str,
    ) -> impl Future<Output = Result<String>> + Send + 'a;

    /// Create `refs/heads/{name}`; `Error::AlreadyExists` if present
    fn create_branch<'a>(
        &'a self,
        repo: &'a RepoId,
        name: &'a str,
        base_sha: &'a str,
    ) -> impl Future<Output = Result<()>> + Send + 'a;

    /// Decoded file text plus blob sha at a ref
    fn file_contents<'a>(
        &'a self,
        repo: &'a RepoId,
        path: &'a str,
        git_ref: &'a str,
    ) -> impl Future<Output = Result<FileContent>> + Send + 'a;

    /// Commit new content; fails with `Error::Conflict` on a stale sha
    fn update_file<'a>(
        &'a self,
        repo: &'a RepoId,
        update: FileUpdate<'a>,
    ) -> impl Future<Output = Result<()>> + Send + 'a;

    /// Open a pull request
    fn create_pull_request<'a>(
        &'a self,
        repo: &'a RepoId,
        pr: NewPullRequest<'a>,
    ) -> impl Future<Output = Result<CreatedPullRequest>> + Send + 'a;

    /// Merge a pull request
    fn merge_pull_request<'a>(
        &'a self,
        repo: &'a RepoId,
        number: u64,
        method: MergeMethod,
    ) -> impl Future<Output = Result<()>> + Send + 'a;
}

/// External deployment-trigger API
pub trait DeployTrigger: Send + Sync {
    /// Start one deployment execution and return its URL
    fn trigger<'a>(
        &'a self,
        payload: &'a TriggerPayload,
    ) -> impl Future<Output = Result<String>> + Send + 'a;
}

/// Local version-control collaborator operating on a working copy.
///
/// Failures carry the raw process output as an `Error::Vcs` message.
pub trait Vcs: Send + Sync {
    /// Check out `branch`; with `create`, create or reset it at the current HEAD
    fn checkout<'a>(
        &'a self,
        path: &'a Path,
        branch: &'a str,
        create: bool,
    ) -> impl Future<Output = Result<()>> + Send + 'a;

    /// Pull `branch` from the default remote
    fn pull<'a>(
        &'a self,
        path: &'a Path,
        branch: &'a str,
    ) -> impl Future<Output = Result<()>> + Send + 'a;

    /// Stage all changes and commit
    fn commit<'a>(
        &'a self,
        path: &'a Path,
        message: &'a str,
    ) -> impl Future<Output = Result<()>> + Send + 'a;

    /// Push `branch` to the default remote
    fn push<'a>(
        &'a self,
        path: &'a Path,
        branch: &'a str,
    ) -> impl Future<Output = Result<()>> + Send + 'a;
}

/// Fire-and-forget user notifications
pub trait Notifier: Send + Sync {
    /// Deliver a notification; delivery is not confirmed
    fn notify(&self, title: &str, body: &str);
}

/// Credential storage keyed by a short name (e.g. `github`)
pub trait SecretStore: Send + Sync {
    /// Load a credential; read fresh on every call
    fn load_token(&self, key: &str) -> Result<String>;

    /// Store a credential
    fn save_token(&self, key: &str, value: &str) -> Result<()>;
}
