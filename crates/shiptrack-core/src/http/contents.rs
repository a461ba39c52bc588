//! Git refs and repository contents endpoints

use super::client::{api_message, check_status, decode_json, GitHubApiClient};
use crate::error::{Error, Result};
use crate::types::{FileContent, FileUpdate, RepoId};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
struct GitHubRef {
    object: GitHubRefObject,
}

#[derive(Debug, Deserialize)]
struct GitHubRefObject {
    sha: String,
}

#[derive(Debug, Serialize)]
struct CreateRefBody<'a> {
    #[serde(rename = "ref")]
    ref_name: String,
    sha: &'a str,
}

/// GitHub API file contents object
#[derive(Debug, Deserialize)]
struct GitHubContent {
    path: String,
    sha: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    encoding: String,
}

#[derive(Debug, Serialize)]
struct UpdateContentBody<'a> {
    message: &'a str,
    content: String,
    sha: &'a str,
    branch: &'a str,
}

/// Decode a contents payload into text
fn decode_content(content: GitHubContent) -> Result<FileContent> {
    let text = match content.encoding.as_str() {
        "base64" => {
            // The API wraps base64 at 60 columns
            let compact: String = content
                .content
                .chars()
                .filter(|c| !c.is_ascii_whitespace())
                .collect();
            let bytes = STANDARD.decode(compact.as_bytes())?;
            String::from_utf8(bytes).map_err(|e| {
                Error::MalformedResponse(format!("{} is not UTF-8: {}", content.path, e))
            })?
        }
        "" | "utf-8" => content.content,
        other => {
            return Err(Error::MalformedResponse(format!(
                "{} has unsupported encoding '{}'",
                content.path, other
            )))
        }
    };

    Ok(FileContent {
        path: content.path,
        text,
        sha: content.sha,
    })
}

impl GitHubApiClient {
    /// Head sha of a branch
    ///
    /// Endpoint: GET /repos/{owner}/{repo}/git/ref/heads/{branch}
    pub async fn branch_sha(&self, repo: &RepoId, branch: &str) -> Result<String> {
        let url = self.repo_url(repo, &format!("/git/ref/heads/{}", branch));
        let reference: GitHubRef = self
            .get_json(&url, &[], "Failed to resolve branch")
            .await?;
        Ok(reference.object.sha)
    }

    /// Create a branch pointing at `base_sha`.
    ///
    /// Endpoint: POST /repos/{owner}/{repo}/git/refs
    /// A 422 means the ref already exists and maps to `Error::AlreadyExists`
    /// so callers can treat re-creation as success.
    pub async fn create_branch(&self, repo: &RepoId, name: &str, base_sha: &str) -> Result<()> {
        let url = self.repo_url(repo, "/git/refs");
        let context = "Failed to create branch";
        let request = self.request(Method::POST, &url)?.json(&CreateRefBody {
            ref_name: format!("refs/heads/{}", name),
            sha: base_sha,
        });

        let response = self.dispatch(request, context).await?;
        if response.status() == StatusCode::UNPROCESSABLE_ENTITY {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::AlreadyExists(format!(
                "branch '{}' in {}: {}",
                name,
                repo,
                api_message(&body)
            )));
        }
        check_status(response, context).await?;
        Ok(())
    }

    /// File text and blob sha at a ref
    ///
    /// Endpoint: GET /repos/{owner}/{repo}/contents/{path}?ref=
    pub async fn file_contents(
        &self,
        repo: &RepoId,
        path: &str,
        git_ref: &str,
    ) -> Result<FileContent> {
        let url = self.repo_url(repo, &format!("/contents/{}", path.trim_start_matches('/')));
        let content: GitHubContent = self
            .get_json(&url, &[("ref", git_ref)], "Failed to fetch file contents")
            .await?;
        decode_content(content)
    }

    /// Commit new file content on a branch
    ///
    /// Endpoint: PUT /repos/{owner}/{repo}/contents/{path}
    /// `previous_sha` must match the current blob or the API answers 409.
    pub async fn update_file(&self, repo: &RepoId, update: FileUpdate<'_>) -> Result<()> {
        let url = self.repo_url(
            repo,
            &format!("/contents/{}", update.path.trim_start_matches('/')),
        );
        let context = "Failed to update file";
        let request = self.request(Method::PUT, &url)?.json(&UpdateContentBody {
            message: update.message,
            content: STANDARD.encode(update.content.as_bytes()),
            sha: update.previous_sha,
            branch: update.branch,
        });

        let response = self.send(request, context).await?;
        // Body carries the new commit; only its well-formedness matters here
        let _: serde_json::Value = decode_json(response, context).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_decode_wrapped_base64() {
        let encoded = STANDARD.encode("deploy:\n  tag: 1.0.0\n");
        let wrapped = format!("{}\n{}\n", &encoded[..10], &encoded[10..]);
        let file = decode_content(GitHubContent {
            path: "deploy/config.yml".into(),
            sha: "blob1".into(),
            content: wrapped,
            encoding: "base64".into(),
        })
        .unwrap();
        assert_eq!(file.text, "deploy:\n  tag: 1.0.0\n");
        assert_eq!(file.sha, "blob1");
    }

    #[test]
    fn test_decode_rejects_bad_base64() {
        let err = decode_content(GitHubContent {
            path: "x".into(),
            sha: "s".into(),
            content: "!!!".into(),
            encoding: "base64".into(),
        })
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedResponse);
    }

    #[test]
    fn test_decode_rejects_unknown_encoding() {
        let err = decode_content(GitHubContent {
            path: "x".into(),
            sha: "s".into(),
            content: String::new(),
            encoding: "none".into(),
        })
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedResponse);
    }
}
