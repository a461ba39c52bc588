//! GitHub Actions workflow run, job, and log endpoints

use super::client::GitHubApiClient;
use crate::error::{Error, Result};
use crate::types::{RepoId, WorkflowConclusion, WorkflowJob, WorkflowRun, WorkflowStatus};
use reqwest::Method;
use serde::Deserialize;

/// Completed runs considered when looking for the latest success
const SUCCESS_WINDOW: u32 = 10;

/// GitHub API response for workflow runs list
#[derive(Debug, Deserialize)]
struct WorkflowRunsResponse {
    #[allow(dead_code)]
    total_count: u32,
    workflow_runs: Vec<GitHubWorkflowRun>,
}

/// GitHub API workflow run object
#[derive(Debug, Deserialize)]
struct GitHubWorkflowRun {
    id: u64,
    #[serde(default)]
    name: String,
    status: String,
    conclusion: Option<String>,
    head_branch: String,
    head_sha: String,
    html_url: String,
    created_at: String,
}

/// GitHub API response for workflow jobs list
#[derive(Debug, Deserialize)]
struct WorkflowJobsResponse {
    #[allow(dead_code)]
    total_count: u32,
    jobs: Vec<GitHubWorkflowJob>,
}

/// GitHub API job object
#[derive(Debug, Deserialize)]
struct GitHubWorkflowJob {
    id: u64,
    name: String,
    status: String,
    conclusion: Option<String>,
}

/// Parse workflow status string to enum
fn parse_status(s: &str) -> WorkflowStatus {
    match s {
        "queued" => WorkflowStatus::Queued,
        "in_progress" => WorkflowStatus::InProgress,
        _ => WorkflowStatus::Completed,
    }
}

/// Parse workflow conclusion string to enum
fn parse_conclusion(s: &str) -> WorkflowConclusion {
    match s {
        "success" => WorkflowConclusion::Success,
        "failure" => WorkflowConclusion::Failure,
        "cancelled" => WorkflowConclusion::Cancelled,
        "skipped" => WorkflowConclusion::Skipped,
        "timed_out" => WorkflowConclusion::TimedOut,
        _ => WorkflowConclusion::Neutral,
    }
}

/// Convert GitHub API workflow run to our type
fn convert_workflow_run(run: GitHubWorkflowRun) -> WorkflowRun {
    let status = parse_status(&run.status);
    let conclusion = run.conclusion.as_deref().map(parse_conclusion);

    // Parse ISO 8601 timestamp to Unix epoch
    let created_at = chrono::DateTime::parse_from_rfc3339(&run.created_at)
        .map(|dt| dt.timestamp())
        .unwrap_or(0);

    WorkflowRun {
        id: run.id,
        name: run.name,
        status,
        conclusion,
        branch: run.head_branch,
        head_sha: run.head_sha,
        html_url: run.html_url,
        created_at,
    }
}

/// Convert GitHub API job to our type
fn convert_workflow_job(job: GitHubWorkflowJob, run_id: u64) -> WorkflowJob {
    WorkflowJob {
        id: job.id,
        name: job.name,
        status: parse_status(&job.status),
        conclusion: job.conclusion.as_deref().map(parse_conclusion),
        run_id,
    }
}

/// Newest run first; the API already orders this way but pages can interleave
fn newest_first(mut runs: Vec<WorkflowRun>) -> Vec<WorkflowRun> {
    runs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    runs
}

impl GitHubApiClient {
    /// Latest successful run of a workflow on a branch
    ///
    /// Endpoint: GET /repos/{owner}/{repo}/actions/workflows/{workflow_id}/runs
    /// Query params: branch, status=completed, per_page=10
    pub async fn latest_successful_run(
        &self,
        repo: &RepoId,
        workflow_id: &str,
        branch: &str,
    ) -> Result<Option<WorkflowRun>> {
        let url = self.repo_url(repo, &format!("/actions/workflows/{}/runs", workflow_id));
        let per_page = SUCCESS_WINDOW.to_string();

        let response: WorkflowRunsResponse = self
            .get_json(
                &url,
                &[
                    ("branch", branch),
                    ("status", "completed"),
                    ("per_page", per_page.as_str()),
                ],
                "Failed to fetch workflow runs",
            )
            .await?;

        let runs = newest_first(
            response
                .workflow_runs
                .into_iter()
                .map(convert_workflow_run)
                .collect(),
        );

        Ok(runs
            .into_iter()
            .find(|run| run.conclusion == Some(WorkflowConclusion::Success)))
    }

    /// Most recent runs on a branch, any workflow and any conclusion
    ///
    /// Endpoint: GET /repos/{owner}/{repo}/actions/runs
    /// Query params: branch, per_page
    pub async fn list_runs(
        &self,
        repo: &RepoId,
        branch: &str,
        limit: u32,
    ) -> Result<Vec<WorkflowRun>> {
        let url = self.repo_url(repo, "/actions/runs");
        let per_page = limit.clamp(1, 100).to_string();

        let mut query = vec![("per_page", per_page.as_str())];
        // Empty branch = all branches
        if !branch.is_empty() {
            query.push(("branch", branch));
        }

        let response: WorkflowRunsResponse = self
            .get_json(&url, &query, "Failed to fetch workflow runs")
            .await?;

        let mut runs = newest_first(
            response
                .workflow_runs
                .into_iter()
                .map(convert_workflow_run)
                .collect(),
        );
        runs.truncate(limit as usize);
        Ok(runs)
    }

    /// List jobs for a workflow run
    ///
    /// Endpoint: GET /repos/{owner}/{repo}/actions/runs/{run_id}/jobs
    pub async fn list_jobs(&self, repo: &RepoId, run_id: u64) -> Result<Vec<WorkflowJob>> {
        let url = self.repo_url(repo, &format!("/actions/runs/{}/jobs", run_id));

        let response: WorkflowJobsResponse = self
            .get_json(&url, &[("per_page", "100")], "Failed to fetch workflow jobs")
            .await?;

        Ok(response
            .jobs
            .into_iter()
            .map(|job| convert_workflow_job(job, run_id))
            .collect())
    }

    /// Raw log text for a job
    ///
    /// Endpoint: GET /repos/{owner}/{repo}/actions/jobs/{job_id}/logs
    /// The API answers with a redirect to short-lived blob storage; reqwest
    /// follows it and drops the Authorization header on the cross-host hop.
    pub async fn job_logs(&self, repo: &RepoId, job_id: u64) -> Result<String> {
        let url = self.repo_url(repo, &format!("/actions/jobs/{}/logs", job_id));
        let context = "Failed to fetch job logs";

        let request = self.request(Method::GET, &url)?;
        let response = self.send(request, context).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Http(format!("{}: {}", context, e)))?;

        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}
