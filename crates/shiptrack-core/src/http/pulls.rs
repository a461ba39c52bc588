//! Pull request, commit status, and PR activity endpoints

use super::client::{decode_json, GitHubApiClient};
use crate::error::{Error, Result};
use crate::types::{
    CheckState, CreatedPullRequest, MergeMethod, NewPullRequest, PrSignals, PrSnapshot, RepoId,
};
use reqwest::Method;
use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};

/// Safety limit when paging through comment lists
const MAX_COMMENT_PAGES: u32 = 50;

/// GitHub API pull request object (fields we read)
#[derive(Debug, Deserialize)]
struct GitHubPull {
    number: u64,
    html_url: String,
    state: String,
    merged_at: Option<String>,
    head: GitHubPullRef,
    base: GitHubPullRef,
}

#[derive(Debug, Deserialize)]
struct GitHubPullRef {
    #[serde(default)]
    sha: String,
    #[serde(rename = "ref")]
    ref_name: String,
}

/// GitHub API combined status
#[derive(Debug, Deserialize)]
struct GitHubCombinedStatus {
    state: String,
}

/// GitHub API requested reviewers
#[derive(Debug, Deserialize)]
struct GitHubRequestedReviewers {
    #[serde(default)]
    users: Vec<IgnoredAny>,
    #[serde(default)]
    teams: Vec<IgnoredAny>,
}

#[derive(Debug, Serialize)]
struct CreatePullBody<'a> {
    title: &'a str,
    head: &'a str,
    base: &'a str,
    body: &'a str,
}

#[derive(Debug, Deserialize)]
struct GitHubCreatedPull {
    number: u64,
    html_url: String,
}

#[derive(Debug, Serialize)]
struct MergeBody {
    merge_method: &'static str,
}

#[derive(Debug, Deserialize)]
struct GitHubMergeResult {
    #[serde(default)]
    merged: bool,
    #[serde(default)]
    message: String,
}

impl From<GitHubPull> for PrSnapshot {
    fn from(pull: GitHubPull) -> Self {
        PrSnapshot {
            number: pull.number,
            url: pull.html_url,
            state: pull.state,
            merged_at: pull.merged_at,
            head_sha: pull.head.sha,
            base_branch: pull.base.ref_name,
        }
    }
}

impl GitHubApiClient {
    /// Find the most recent PR whose head is `owner:head_branch`
    ///
    /// Endpoint: GET /repos/{owner}/{repo}/pulls?head=&state=all&per_page=1
    pub async fn find_pull_request(
        &self,
        repo: &RepoId,
        head_branch: &str,
    ) -> Result<Option<PrSnapshot>> {
        let url = self.repo_url(repo, "/pulls");
        let head = format!("{}:{}", repo.owner, head_branch);

        let pulls: Vec<GitHubPull> = self
            .get_json(
                &url,
                &[
                    ("head", head.as_str()),
                    ("state", "all"),
                    ("sort", "created"),
                    ("direction", "desc"),
                    ("per_page", "1"),
                ],
                "Failed to fetch pull requests",
            )
            .await?;

        Ok(pulls.into_iter().next().map(PrSnapshot::from))
    }

    /// Combined status of a commit
    ///
    /// Endpoint: GET /repos/{owner}/{repo}/commits/{sha}/status
    pub async fn commit_status(&self, repo: &RepoId, sha: &str) -> Result<CheckState> {
        let url = self.repo_url(repo, &format!("/commits/{}/status", sha));
        let status: GitHubCombinedStatus = self
            .get_json(&url, &[], "Failed to fetch commit status")
            .await?;
        Ok(CheckState::from_provider(&status.state))
    }

    /// Requested reviewers plus issue and review comment counts.
    ///
    /// The three requests are independent and run concurrently.
    pub async fn pull_request_signals(&self, repo: &RepoId, number: u64) -> Result<PrSignals> {
        let reviewers_url = self.repo_url(repo, &format!("/pulls/{}/requested_reviewers", number));
        let issue_comments_url = self.repo_url(repo, &format!("/issues/{}/comments", number));
        let review_comments_url = self.repo_url(repo, &format!("/pulls/{}/comments", number));

        let (review_requests, issue_comments, review_comments) = futures::try_join!(
            self.requested_reviewer_count(&reviewers_url),
            self.count_items(&issue_comments_url, "Failed to fetch issue comments"),
            self.count_items(&review_comments_url, "Failed to fetch review comments"),
        )?;

        Ok(PrSignals {
            review_requests,
            issue_comments,
            review_comments,
        })
    }

    async fn requested_reviewer_count(&self, url: &str) -> Result<u32> {
        let reviewers: GitHubRequestedReviewers = self
            .get_json(url, &[], "Failed to fetch requested reviewers")
            .await?;
        Ok((reviewers.users.len() + reviewers.teams.len()) as u32)
    }

    /// Count the elements of a paginated list endpoint
    async fn count_items(&self, url: &str, context: &str) -> Result<u32> {
        let mut total = 0u32;
        let mut page = 1u32;

        loop {
            let page_str = page.to_string();
            let request = self
                .request(Method::GET, url)?
                .query(&[("per_page", "100"), ("page", page_str.as_str())]);
            let response = self.send(request, context).await?;

            // Check for pagination via Link header
            let has_next = response
                .headers()
                .get("Link")
                .and_then(|v| v.to_str().ok())
                .map(|link| link.contains("rel=\"next\""))
                .unwrap_or(false);

            let items: Vec<IgnoredAny> = decode_json(response, context).await?;
            total += items.len() as u32;

            if !has_next || items.is_empty() {
                break;
            }

            page += 1;

            // Safety limit
            if page > MAX_COMMENT_PAGES {
                break;
            }
        }

        Ok(total)
    }

    /// Open a pull request
    ///
    /// Endpoint: POST /repos/{owner}/{repo}/pulls
    pub async fn create_pull_request(
        &self,
        repo: &RepoId,
        pr: NewPullRequest<'_>,
    ) -> Result<CreatedPullRequest> {
        let url = self.repo_url(repo, "/pulls");
        let context = "Failed to create pull request";
        let request = self.request(Method::POST, &url)?.json(&CreatePullBody {
            title: pr.title,
            head: pr.head,
            base: pr.base,
            body: pr.body,
        });

        let response = self.send(request, context).await?;
        let created: GitHubCreatedPull = decode_json(response, context).await?;
        Ok(CreatedPullRequest {
            number: created.number,
            url: created.html_url,
        })
    }

    /// Merge a pull request
    ///
    /// Endpoint: PUT /repos/{owner}/{repo}/pulls/{number}/merge
    pub async fn merge_pull_request(
        &self,
        repo: &RepoId,
        number: u64,
        method: MergeMethod,
    ) -> Result<()> {
        let url = self.repo_url(repo, &format!("/pulls/{}/merge", number));
        let context = "Failed to merge pull request";
        let request = self.request(Method::PUT, &url)?.json(&MergeBody {
            merge_method: method.as_str(),
        });

        let response = self.send(request, context).await?;
        let result: GitHubMergeResult = decode_json(response, context).await?;
        if !result.merged {
            return Err(Error::Conflict(format!(
                "{}: #{} not merged: {}",
                context, number, result.message
            )));
        }
        Ok(())
    }
}
