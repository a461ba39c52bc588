//! Mobile flavor: bump the deploy tag in a local working copy and open a PR

use super::sanitize_ref_component;
use crate::error::{Error, Result};
use crate::scrape::replace_declared_version;
use crate::traits::{HostingApi, Vcs};
use crate::types::{DeploymentRepoConfig, NewPullRequest, WorkItem};
use std::borrow::Cow;
use tracing::info;

/// Branch and PR opened by a mobile release
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MobileReleaseResult {
    pub branch: String,
    pub pr_number: u64,
    pub pr_url: String,
}

/// `chore/update-mobile-tag-{sanitized tag}`
pub fn branch_name(tag: &str) -> String {
    format!("chore/update-mobile-tag-{}", sanitize_ref_component(tag))
}

/// Mobile release pipeline over one deployment repository
pub struct MobileRelease<'a, H, V> {
    api: &'a H,
    vcs: &'a V,
}

impl<'a, H: HostingApi, V: Vcs> MobileRelease<'a, H, V> {
    pub fn new(api: &'a H, vcs: &'a V) -> Self {
        Self { api, vcs }
    }

    /// Write the item's tag into the deployment config and open a PR.
    ///
    /// Any failing step aborts the whole sequence.
    pub async fn update_deployment_config(
        &self,
        deploy: &DeploymentRepoConfig,
        item: &WorkItem,
    ) -> Result<MobileReleaseResult> {
        let tag = item
            .latest_tag
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::MissingTag(format!("{} has no resolved tag", item.ticket)))?;

        let branch = branch_name(tag);
        let path = deploy.local_path.as_path();

        self.vcs.checkout(path, &deploy.env_branch, false).await?;
        self.vcs.pull(path, &deploy.env_branch).await?;
        self.vcs.checkout(path, &branch, true).await?;

        let config_file = path.join(&deploy.config_path);
        let text = tokio::fs::read_to_string(&config_file).await?;
        let updated = match replace_declared_version(&text, &deploy.config_key, tag) {
            Cow::Owned(updated) if updated != text => updated,
            _ => {
                return Err(Error::InvalidConfigFile(format!(
                    "{} has no '{}' to set to {}",
                    deploy.config_path, deploy.config_key, tag
                )))
            }
        };
        tokio::fs::write(&config_file, updated).await?;

        let message = format!("Update mobile deploy tag to {}", tag);
        self.vcs.commit(path, &message).await?;
        self.vcs.push(path, &branch).await?;

        let body = pr_body(item, tag);
        let pr = self
            .api
            .create_pull_request(
                &deploy.repo,
                NewPullRequest {
                    title: &message,
                    head: &branch,
                    base: &deploy.env_branch,
                    body: &body,
                },
            )
            .await?;

        info!(repo = %deploy.repo, branch = %branch, pr = pr.number, "Opened mobile release PR");
        Ok(MobileReleaseResult {
            branch,
            pr_number: pr.number,
            pr_url: pr.url,
        })
    }
}

fn pr_body(item: &WorkItem, tag: &str) -> String {
    let mut body = format!(
        "Ticket: {}\nSource: {} ({})\nTag: {}\n",
        item.ticket, item.repo, item.branch, tag
    );
    if let Some(url) = &item.pr_url {
        body.push_str(&format!("Source PR: {}\n", url));
    }
    if let Some(url) = &item.tag_run_url {
        body.push_str(&format!("Build: {}\n", url));
    }
    body
}
