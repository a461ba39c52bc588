//! In-memory collaborators shared by the integration tests

#![allow(dead_code)]

use parking_lot::Mutex;
use shiptrack_core::error::{Error, Result};
use shiptrack_core::traits::{DeployTrigger, HostingApi, Notifier, Vcs};
use shiptrack_core::types::{
    CheckState, CreatedPullRequest, FileContent, FileUpdate, MergeMethod, NewPullRequest,
    PrSignals, PrSnapshot, RepoId, TriggerPayload, WorkflowConclusion, WorkflowJob, WorkflowRun,
    WorkflowStatus,
};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub fn repo() -> RepoId {
    RepoId::new("acme", "app")
}

pub fn merged_pr(number: u64) -> PrSnapshot {
    PrSnapshot {
        number,
        url: format!("https://github.com/acme/app/pull/{}", number),
        state: "closed".to_string(),
        merged_at: Some("2024-05-01T10:00:00Z".to_string()),
        head_sha: format!("sha{}", number),
        base_branch: "main".to_string(),
    }
}

pub fn open_pr(number: u64) -> PrSnapshot {
    PrSnapshot {
        state: "open".to_string(),
        merged_at: None,
        ..merged_pr(number)
    }
}

pub fn run(id: u64, conclusion: WorkflowConclusion) -> WorkflowRun {
    WorkflowRun {
        id,
        name: "Release".to_string(),
        status: WorkflowStatus::Completed,
        conclusion: Some(conclusion),
        branch: "main".to_string(),
        head_sha: format!("run-sha-{}", id),
        html_url: format!("https://github.com/acme/app/actions/runs/{}", id),
        created_at: 1_700_000_000 + id as i64,
    }
}

pub fn job(id: u64, run_id: u64, name: &str) -> WorkflowJob {
    WorkflowJob {
        id,
        name: name.to_string(),
        status: WorkflowStatus::Completed,
        conclusion: Some(WorkflowConclusion::Success),
        run_id,
    }
}

#[derive(Default)]
pub struct HostingState {
    pub pull_requests: HashMap<String, PrSnapshot>,
    pub statuses: HashMap<String, CheckState>,
    pub signals: HashMap<u64, PrSignals>,
    pub successful_runs: HashMap<String, WorkflowRun>,
    pub recent_runs: Vec<WorkflowRun>,
    pub jobs: HashMap<u64, Vec<WorkflowJob>>,
    pub logs: HashMap<u64, String>,
    pub branches: HashMap<String, String>,
    pub files: HashMap<String, FileContent>,
    pub fail_ops: HashSet<&'static str>,
    pub fail_paths: HashSet<String>,
    pub malformed_jobs: HashSet<u64>,

    pub calls: Vec<String>,
    pub created_branches: Vec<String>,
    pub updates: Vec<(String, String, String)>,
    pub created_prs: Vec<(String, String, String, String)>,
    pub merged: Vec<(u64, MergeMethod)>,
}

/// Scriptable `HostingApi`
#[derive(Default)]
pub struct FakeHosting {
    pub state: Mutex<HostingState>,
    pub delay: Option<Duration>,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl FakeHosting {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn calls(&self, op: &str) -> usize {
        self.state.lock().calls.iter().filter(|c| c.as_str() == op).count()
    }

    pub fn set_pr(&self, branch: &str, pr: Option<PrSnapshot>) {
        let mut state = self.state.lock();
        match pr {
            Some(pr) => state.pull_requests.insert(branch.to_string(), pr),
            None => state.pull_requests.remove(branch),
        };
    }

    pub fn set_file(&self, path: &str, text: &str) {
        self.state.lock().files.insert(
            path.to_string(),
            FileContent {
                path: path.to_string(),
                text: text.to_string(),
                sha: format!("blob-{}", path),
            },
        );
    }

    pub fn fail(&self, op: &'static str) {
        self.state.lock().fail_ops.insert(op);
    }

    /// Record the call and apply any scripted failure
    fn enter(&self, op: &'static str) -> Result<()> {
        let mut state = self.state.lock();
        state.calls.push(op.to_string());
        if state.fail_ops.contains(op) {
            return Err(Error::ServerError(format!("{} failed", op)));
        }
        Ok(())
    }
}

impl HostingApi for FakeHosting {
    fn find_pull_request<'a>(
        &'a self,
        _repo: &'a RepoId,
        head_branch: &'a str,
    ) -> impl Future<Output = Result<Option<PrSnapshot>>> + Send + 'a {
        async move {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            self.enter("find_pull_request")?;
            Ok(self.state.lock().pull_requests.get(head_branch).cloned())
        }
    }

    fn commit_status<'a>(
        &'a self,
        _repo: &'a RepoId,
        sha: &'a str,
    ) -> impl Future<Output = Result<CheckState>> + Send + 'a {
        async move {
            self.enter("commit_status")?;
            Ok(self
                .state
                .lock()
                .statuses
                .get(sha)
                .copied()
                .unwrap_or_default())
        }
    }

    fn pull_request_signals<'a>(
        &'a self,
        _repo: &'a RepoId,
        number: u64,
    ) -> impl Future<Output = Result<PrSignals>> + Send + 'a {
        async move {
            self.enter("pull_request_signals")?;
            Ok(self
                .state
                .lock()
                .signals
                .get(&number)
                .copied()
                .unwrap_or_default())
        }
    }

    fn latest_successful_run<'a>(
        &'a self,
        _repo: &'a RepoId,
        workflow_id: &'a str,
        branch: &'a str,
    ) -> impl Future<Output = Result<Option<WorkflowRun>>> + Send + 'a {
        async move {
            self.enter("latest_successful_run")?;
            let key = format!("{}@{}", workflow_id, branch);
            Ok(self.state.lock().successful_runs.get(&key).cloned())
        }
    }

    fn list_runs<'a>(
        &'a self,
        _repo: &'a RepoId,
        _branch: &'a str,
        limit: u32,
    ) -> impl Future<Output = Result<Vec<WorkflowRun>>> + Send + 'a {
        async move {
            self.enter("list_runs")?;
            let state = self.state.lock();
            Ok(state.recent_runs.iter().take(limit as usize).cloned().collect())
        }
    }

    fn jobs<'a>(
        &'a self,
        _repo: &'a RepoId,
        run_id: u64,
    ) -> impl Future<Output = Result<Vec<WorkflowJob>>> + Send + 'a {
        async move {
            self.enter("jobs")?;
            let state = self.state.lock();
            if state.malformed_jobs.contains(&run_id) {
                return Err(Error::MalformedResponse(format!("jobs of run {}", run_id)));
            }
            Ok(state.jobs.get(&run_id).cloned().unwrap_or_default())
        }
    }

    fn job_logs<'a>(
        &'a self,
        _repo: &'a RepoId,
        job_id: u64,
    ) -> impl Future<Output = Result<String>> + Send + 'a {
        async move {
            self.enter("job_logs")?;
            self.state
                .lock()
                .logs
                .get(&job_id)
                .cloned()
                .ok_or_else(|| Error::NotFound(format!("logs of job {}", job_id)))
        }
    }

    fn branch_sha<'a>(
        &'a self,
        _repo: &'a RepoId,
        branch: &'a str,
    ) -> impl Future<Output = Result<String>> + Send + 'a {
        async move {
            self.enter("branch_sha")?;
            self.state
                .lock()
                .branches
                .get(branch)
                .cloned()
                .ok_or_else(|| Error::NotFound(format!("branch {}", branch)))
        }
    }

    fn create_branch<'a>(
        &'a self,
        _repo: &'a RepoId,
        name: &'a str,
        base_sha: &'a str,
    ) -> impl Future<Output = Result<()>> + Send + 'a {
        async move {
            self.enter("create_branch")?;
            let mut state = self.state.lock();
            if state.branches.contains_key(name) {
                return Err(Error::AlreadyExists(format!("branch {}", name)));
            }
            state.branches.insert(name.to_string(), base_sha.to_string());
            state.created_branches.push(name.to_string());
            Ok(())
        }
    }

    fn file_contents<'a>(
        &'a self,
        _repo: &'a RepoId,
        path: &'a str,
        _git_ref: &'a str,
    ) -> impl Future<Output = Result<FileContent>> + Send + 'a {
        async move {
            self.enter("file_contents")?;
            self.state
                .lock()
                .files
                .get(path)
                .cloned()
                .ok_or_else(|| Error::NotFound(format!("file {}", path)))
        }
    }

    fn update_file<'a>(
        &'a self,
        _repo: &'a RepoId,
        update: FileUpdate<'a>,
    ) -> impl Future<Output = Result<()>> + Send + 'a {
        async move {
            self.enter("update_file")?;
            let mut state = self.state.lock();
            if state.fail_paths.contains(update.path) {
                return Err(Error::Conflict(format!("{} is stale", update.path)));
            }
            state.updates.push((
                update.path.to_string(),
                update.branch.to_string(),
                update.content.to_string(),
            ));
            Ok(())
        }
    }

    fn create_pull_request<'a>(
        &'a self,
        _repo: &'a RepoId,
        pr: NewPullRequest<'a>,
    ) -> impl Future<Output = Result<CreatedPullRequest>> + Send + 'a {
        async move {
            self.enter("create_pull_request")?;
            let mut state = self.state.lock();
            state.created_prs.push((
                pr.title.to_string(),
                pr.head.to_string(),
                pr.base.to_string(),
                pr.body.to_string(),
            ));
            let number = 100 + state.created_prs.len() as u64;
            Ok(CreatedPullRequest {
                number,
                url: format!("https://github.com/acme/deploy/pull/{}", number),
            })
        }
    }

    fn merge_pull_request<'a>(
        &'a self,
        _repo: &'a RepoId,
        number: u64,
        method: MergeMethod,
    ) -> impl Future<Output = Result<()>> + Send + 'a {
        async move {
            self.enter("merge_pull_request")?;
            self.state.lock().merged.push((number, method));
            Ok(())
        }
    }
}

/// Deployment trigger answering from a script keyed by `module/environment`
#[derive(Default)]
pub struct FakeTrigger {
    pub malformed: HashSet<String>,
    pub unauthorized: bool,
    pub payloads: Mutex<Vec<TriggerPayload>>,
}

impl DeployTrigger for FakeTrigger {
    fn trigger<'a>(
        &'a self,
        payload: &'a TriggerPayload,
    ) -> impl Future<Output = Result<String>> + Send + 'a {
        async move {
            if self.unauthorized {
                return Err(Error::Unauthenticated("bad api key".to_string()));
            }
            self.payloads.lock().push(payload.clone());
            let key = format!("{}/{}", payload.module, payload.environment);
            if self.malformed.contains(&key) {
                return Err(Error::MalformedResponse(format!("{} has no url", key)));
            }
            Ok(format!("https://deploy.example.com/executions/{}", key))
        }
    }
}

/// Records VCS calls; optionally fails one operation
#[derive(Default)]
pub struct FakeVcs {
    pub calls: Mutex<Vec<String>>,
    pub fail_on: Option<&'static str>,
}

impl FakeVcs {
    fn record(&self, call: String, op: &'static str) -> Result<()> {
        self.calls.lock().push(call);
        if self.fail_on == Some(op) {
            return Err(Error::Vcs(format!("fatal: {} failed", op)));
        }
        Ok(())
    }
}

impl Vcs for FakeVcs {
    fn checkout<'a>(
        &'a self,
        _path: &'a Path,
        branch: &'a str,
        create: bool,
    ) -> impl Future<Output = Result<()>> + Send + 'a {
        async move { self.record(format!("checkout {} {}", branch, create), "checkout") }
    }

    fn pull<'a>(
        &'a self,
        _path: &'a Path,
        branch: &'a str,
    ) -> impl Future<Output = Result<()>> + Send + 'a {
        async move { self.record(format!("pull {}", branch), "pull") }
    }

    fn commit<'a>(
        &'a self,
        _path: &'a Path,
        message: &'a str,
    ) -> impl Future<Output = Result<()>> + Send + 'a {
        async move { self.record(format!("commit {}", message), "commit") }
    }

    fn push<'a>(
        &'a self,
        _path: &'a Path,
        branch: &'a str,
    ) -> impl Future<Output = Result<()>> + Send + 'a {
        async move { self.record(format!("push {}", branch), "push") }
    }
}

/// Keeps every notification
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    pub fn titles(&self) -> Vec<String> {
        self.sent.lock().iter().map(|(t, _)| t.clone()).collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, title: &str, body: &str) {
        self.sent.lock().push((title.to_string(), body.to_string()));
    }
}

pub fn temp_path(dir: &tempfile::TempDir, name: &str) -> PathBuf {
    dir.path().join(name)
}
