//! GitHub REST API client: construction, request plumbing, status mapping

use crate::error::{Error, Result};
use crate::traits::{HostingApi, SecretStore};
use crate::types::{
    CheckState, CreatedPullRequest, FileContent, FileUpdate, MergeMethod, NewPullRequest,
    PrSignals, PrSnapshot, RepoId, WorkflowJob, WorkflowRun,
};
use reqwest::header::ACCEPT;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Fixed client identifier sent with every request
pub const USER_AGENT: &str = concat!("shiptrack/", env!("CARGO_PKG_VERSION"));

/// Public GitHub API root
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Secret store key holding the GitHub token
pub const DEFAULT_TOKEN_KEY: &str = "github";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Error body shape returned by the API
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
}

/// GitHub API client.
///
/// Holds no credential itself: the token is loaded from the secret store on
/// every request.
pub struct GitHubApiClient {
    pub(crate) client: reqwest::Client,
    pub(crate) base_url: String,
    secrets: Arc<dyn SecretStore>,
    token_key: String,
}

impl std::fmt::Debug for GitHubApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubApiClient")
            .field("base_url", &self.base_url)
            .field("token_key", &self.token_key)
            .finish_non_exhaustive()
    }
}

impl GitHubApiClient {
    /// Create a new GitHub API client
    pub fn new(base_url: impl Into<String>, secrets: Arc<dyn SecretStore>) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            secrets,
            token_key: DEFAULT_TOKEN_KEY.to_string(),
        }
    }

    /// Create from environment variables (`GITHUB_API_URL`)
    pub fn from_env(secrets: Arc<dyn SecretStore>) -> Self {
        let base_url =
            std::env::var("GITHUB_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        Self::new(base_url, secrets)
    }

    /// Use a different secret store key for the token
    pub fn with_token_key(mut self, key: impl Into<String>) -> Self {
        self.token_key = key.into();
        self
    }

    /// API root this client talks to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `{base}/repos/{owner}/{name}{path}`
    pub(crate) fn repo_url(&self, repo: &RepoId, path: &str) -> String {
        format!(
            "{}/repos/{}/{}{}",
            self.base_url, repo.owner, repo.name, path
        )
    }

    /// Start an authenticated request
    pub(crate) fn request(&self, method: Method, url: &str) -> Result<RequestBuilder> {
        let token = self.secrets.load_token(&self.token_key).map_err(|e| {
            Error::Unauthenticated(format!(
                "no usable credential '{}': {}",
                self.token_key,
                e.message()
            ))
        })?;

        Ok(self
            .client
            .request(method, url)
            .header(ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
            .bearer_auth(token))
    }

    /// Send without interpreting the status
    pub(crate) async fn dispatch(&self, request: RequestBuilder, context: &str) -> Result<Response> {
        request
            .send()
            .await
            .map_err(|e| Error::Http(format!("{}: {}", context, e)))
    }

    /// Send and fail on any non-2xx status
    pub(crate) async fn send(&self, request: RequestBuilder, context: &str) -> Result<Response> {
        let response = self.dispatch(request, context).await?;
        check_status(response, context).await
    }

    /// GET a JSON document
    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
        context: &str,
    ) -> Result<T> {
        let mut request = self.request(Method::GET, url)?;
        if !query.is_empty() {
            request = request.query(query);
        }
        let response = self.send(request, context).await?;
        decode_json(response, context).await
    }
}

/// Decode a 2xx body; undecodable bodies are `MalformedResponse`
pub(crate) async fn decode_json<T: DeserializeOwned>(response: Response, context: &str) -> Result<T> {
    let bytes = response
        .bytes()
        .await
        .map_err(|e| Error::Http(format!("{}: failed to read body: {}", context, e)))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| Error::MalformedResponse(format!("{}: {}", context, e)))
}

/// Turn a non-2xx response into the error taxonomy
pub(crate) async fn check_status(response: Response, context: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let rate_remaining = response
        .headers()
        .get("x-ratelimit-remaining")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = response.text().await.unwrap_or_default();

    Err(status_error(
        status,
        rate_remaining.as_deref(),
        &api_message(&body),
        context,
    ))
}

/// Extract `message` from an API error body, falling back to the raw text
pub(crate) fn api_message(body: &str) -> String {
    serde_json::from_str::<ApiErrorBody>(body)
        .ok()
        .and_then(|b| b.message)
        .unwrap_or_else(|| body.chars().take(200).collect())
}

/// Map a status code to an error variant
pub(crate) fn status_error(
    status: StatusCode,
    rate_remaining: Option<&str>,
    detail: &str,
    context: &str,
) -> Error {
    let msg = if detail.is_empty() {
        format!("{}: GitHub API returned {}", context, status)
    } else {
        format!("{}: GitHub API returned {}: {}", context, status, detail)
    };

    match status.as_u16() {
        401 => Error::Unauthenticated(msg),
        403 if rate_remaining == Some("0") => Error::RateLimited(msg),
        429 => Error::RateLimited(msg),
        403 => Error::Unauthenticated(msg),
        404 => Error::NotFound(msg),
        409 => Error::Conflict(msg),
        500..=599 => Error::ServerError(msg),
        _ => Error::Http(msg),
    }
}

impl HostingApi for GitHubApiClient {
    fn find_pull_request<'a>(
        &'a self,
        repo: &'a RepoId,
        head_branch: &'a str,
    ) -> impl Future<Output = Result<Option<PrSnapshot>>> + Send + 'a {
        Self::find_pull_request(self, repo, head_branch)
    }

    fn commit_status<'a>(
        &'a self,
        repo: &'a RepoId,
        sha: &'a str,
    ) -> impl Future<Output = Result<CheckState>> + Send + 'a {
        Self::commit_status(self, repo, sha)
    }

    fn pull_request_signals<'a>(
        &'a self,
        repo: &'a RepoId,
        number: u64,
    ) -> impl Future<Output = Result<PrSignals>> + Send + 'a {
        Self::pull_request_signals(self, repo, number)
    }

    fn latest_successful_run<'a>(
        &'a self,
        repo: &'a RepoId,
        workflow_id: &'a str,
        branch: &'a str,
    ) -> impl Future<Output = Result<Option<WorkflowRun>>> + Send + 'a {
        Self::latest_successful_run(self, repo, workflow_id, branch)
    }

    fn list_runs<'a>(
        &'a self,
        repo: &'a RepoId,
        branch: &'a str,
        limit: u32,
    ) -> impl Future<Output = Result<Vec<WorkflowRun>>> + Send + 'a {
        Self::list_runs(self, repo, branch, limit)
    }

    fn jobs<'a>(
        &'a self,
        repo: &'a RepoId,
        run_id: u64,
    ) -> impl Future<Output = Result<Vec<WorkflowJob>>> + Send + 'a {
        Self::list_jobs(self, repo, run_id)
    }

    fn job_logs<'a>(
        &'a self,
        repo: &'a RepoId,
        job_id: u64,
    ) -> impl Future<Output = Result<String>> + Send + 'a {
        Self::job_logs(self, repo, job_id)
    }

    fn branch_sha<'a>(
        &'a self,
        repo: &'a RepoId,
        branch: &'a str,
    ) -> impl Future<Output = Result<String>> + Send + 'a {
        Self::branch_sha(self, repo, branch)
    }

    fn create_branch<'a>(
        &'a self,
        repo: &'a RepoId,
        name: &'a str,
        base_sha: &'a str,
    ) -> impl Future<Output = Result<()>> + Send + 'a {
        Self::create_branch(self, repo, name, base_sha)
    }

    fn file_contents<'a>(
        &'a self,
        repo: &'a RepoId,
        path: &'a str,
        git_ref: &'a str,
    ) -> impl Future<Output = Result<FileContent>> + Send + 'a {
        Self::file_contents(self, repo, path, git_ref)
    }

    fn update_file<'a>(
        &'a self,
        repo: &'a RepoId,
        update: FileUpdate<'a>,
    ) -> impl Future<Output = Result<()>> + Send + 'a {
        Self::update_file(self, repo, update)
    }

    fn create_pull_request<'a>(
        &'a self,
        repo: &'a RepoId,
        pr: NewPullRequest<'a>,
    ) -> impl Future<Output = Result<CreatedPullRequest>> + Send + 'a {
        Self::create_pull_request(self, repo, pr)
    }

    fn merge_pull_request<'a>(
        &'a self,
        repo: &'a RepoId,
        number: u64,
        method: MergeMethod,
    ) -> impl Future<Output = Result<()>> + Send + 'a {
        Self::merge_pull_request(self, repo, number, method)
    }
}
