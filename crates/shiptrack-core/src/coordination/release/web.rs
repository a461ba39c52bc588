//! Web flavor: patch values files across a module × environment matrix,
//! open one PR, optionally merge it and trigger deployments

use super::{sanitize_ref_component, PairOutcome, PairStatus, SkipReason};
use crate::error::{Error, ErrorKind, Result};
use crate::scrape::replace_declared_version;
use crate::traits::{DeployTrigger, HostingApi};
use crate::types::{
    DeclaredKey, FileUpdate, MergeMethod, ModuleVersionMap, NewPullRequest, TriggerPayload,
    WebDeployTarget, WorkItem,
};
use chrono::{DateTime, Utc};
use std::borrow::Cow;
use tracing::{debug, info, warn};

/// Inputs shared by the PR and trigger steps
#[derive(Debug, Clone, Copy)]
pub struct WebDeployRequest<'a> {
    pub item: &'a WorkItem,
    pub modules: &'a [String],
    pub environments: &'a [String],
    pub versions: &'a ModuleVersionMap,
}

impl WebDeployRequest<'_> {
    /// Fail with every selected module lacking a version
    pub fn validate(&self) -> Result<()> {
        let missing = self.versions.missing(self.modules);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::MissingVersions(
                missing.into_iter().map(str::to_string).collect(),
            ))
        }
    }

    /// Selected (module, environment) pairs, module-major
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.modules.iter().flat_map(move |module| {
            self.environments
                .iter()
                .map(move |env| (module.as_str(), env.as_str()))
        })
    }
}

/// PR opened by the web pipeline plus per-pair outcomes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebDeploymentPr {
    pub branch: String,
    pub pr_number: u64,
    pub pr_url: String,
    pub updated_files: usize,
    pub outcomes: Vec<PairOutcome>,
}

/// Execution URLs from the trigger fan-out
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TriggerReport {
    pub execution_urls: Vec<String>,
    /// (module, environment, reason) for triggers whose response was unusable
    pub skipped: Vec<(String, String, String)>,
}

/// `chore/deploy-{sanitized ticket}-{YYYYmmddHHMMSS}`
pub fn branch_name(ticket: &str, now: DateTime<Utc>) -> String {
    format!(
        "chore/deploy-{}-{}",
        sanitize_ref_component(ticket),
        now.format("%Y%m%d%H%M%S")
    )
}

/// Web release pipeline against one values repository
pub struct WebRelease<'a, H> {
    api: &'a H,
    target: &'a WebDeployTarget,
}

impl<'a, H: HostingApi> WebRelease<'a, H> {
    pub fn new(api: &'a H, target: &'a WebDeployTarget) -> Self {
        Self { api, target }
    }

    /// Open a deployment PR using the current time for the branch suffix
    pub async fn create_deployment_pr(
        &self,
        request: &WebDeployRequest<'_>,
    ) -> Result<WebDeploymentPr> {
        self.create_deployment_pr_at(request, Utc::now()).await
    }

    /// Open a deployment PR on a branch stamped with `now`.
    ///
    /// Pairs that cannot be fetched, patched or updated are skipped; only an
    /// empty result fails the call.
    pub async fn create_deployment_pr_at(
        &self,
        request: &WebDeployRequest<'_>,
        now: DateTime<Utc>,
    ) -> Result<WebDeploymentPr> {
        request.validate()?;

        let repo = &self.target.repo;
        let branch = branch_name(&request.item.ticket, now);
        let base_sha = self.api.branch_sha(repo, &self.target.base_branch).await?;

        match self.api.create_branch(repo, &branch, &base_sha).await {
            Ok(()) => debug!(%repo, branch = %branch, "Created branch"),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                info!(%repo, branch = %branch, "Branch already exists, reusing it")
            }
            Err(e) => return Err(e),
        }

        let key = DeclaredKey::flat(self.target.version_key.clone());
        let mut outcomes = Vec::new();
        for (module, environment) in request.pairs() {
            // validate() guarantees a version for every selected module
            let version = request.versions.get(module).unwrap_or_default();
            let path = self.target.file_path(module, environment);
            let status = self
                .update_pair(&branch, &path, &key, module, environment, version)
                .await;

            if let PairStatus::Skipped(reason) = &status {
                warn!(module, environment, path = %path, %reason, "Skipped values file");
            }
            outcomes.push(PairOutcome {
                module: module.to_string(),
                environment: environment.to_string(),
                path,
                status,
            });
        }

        let updated_files = outcomes.iter().filter(|o| o.is_updated()).count();
        if updated_files == 0 {
            return Err(Error::NoFilesUpdated);
        }

        let title = format!(
            "Deploy {}: {} to {}",
            request.item.ticket,
            request.modules.join(", "),
            request.environments.join(", ")
        );
        let body = pr_body(request.item, updated_files);
        let pr = self
            .api
            .create_pull_request(
                repo,
                NewPullRequest {
                    title: &title,
                    head: &branch,
                    base: &self.target.base_branch,
                    body: &body,
                },
            )
            .await?;

        info!(%repo, pr = pr.number, updated_files, "Opened deployment PR");
        Ok(WebDeploymentPr {
            branch,
            pr_number: pr.number,
            pr_url: pr.url,
            updated_files,
            outcomes,
        })
    }

    /// Fetch, patch and commit one values file
    async fn update_pair(
        &self,
        branch: &str,
        path: &str,
        key: &DeclaredKey,
        module: &str,
        environment: &str,
        version: &str,
    ) -> PairStatus {
        let repo = &self.target.repo;
        let file = match self.api.file_contents(repo, path, branch).await {
            Ok(file) => file,
            Err(e) => return PairStatus::Skipped(SkipReason::FetchFailed(e.to_string())),
        };

        let updated = match replace_declared_version(&file.text, key, version) {
            Cow::Borrowed(_) => return PairStatus::Skipped(SkipReason::KeyMissing),
            Cow::Owned(updated) if updated == file.text => {
                return PairStatus::Skipped(SkipReason::AlreadyCurrent)
            }
            Cow::Owned(updated) => updated,
        };

        let message = format!("Deploy {} {} to {}", module, version, environment);
        let update = FileUpdate {
            path,
            branch,
            content: &updated,
            previous_sha: &file.sha,
            message: &message,
        };
        match self.api.update_file(repo, update).await {
            Ok(()) => PairStatus::Updated,
            Err(e) => PairStatus::Skipped(SkipReason::UpdateFailed(e.to_string())),
        }
    }

    /// Squash-merge a deployment PR
    pub async fn merge_deployment_pr(&self, number: u64) -> Result<()> {
        self.api
            .merge_pull_request(&self.target.repo, number, MergeMethod::Squash)
            .await?;
        info!(repo = %self.target.repo, pr = number, "Merged deployment PR");
        Ok(())
    }
}

/// Trigger one deployment per selected pair.
///
/// A malformed trigger response skips that pair; any other failure aborts.
pub async fn trigger_deployments<T: DeployTrigger>(
    trigger: &T,
    pipeline: &str,
    request: &WebDeployRequest<'_>,
) -> Result<TriggerReport> {
    request.validate()?;

    let mut report = TriggerReport::default();
    for (module, environment) in request.pairs() {
        let payload = TriggerPayload {
            pipeline: pipeline.to_string(),
            module: module.to_string(),
            environment: environment.to_string(),
            version: request.versions.get(module).unwrap_or_default().to_string(),
            ticket: request.item.ticket.clone(),
        };

        match trigger.trigger(&payload).await {
            Ok(url) => {
                info!(module, environment, execution = %url, "Triggered deployment");
                report.execution_urls.push(url);
            }
            Err(e) if e.kind() == ErrorKind::MalformedResponse => {
                warn!(module, environment, error = %e, "Skipping trigger");
                report
                    .skipped
                    .push((module.to_string(), environment.to_string(), e.to_string()));
            }
            Err(e) => return Err(e),
        }
    }
    Ok(report)
}

fn pr_body(item: &WorkItem, updated_files: usize) -> String {
    let mut body = format!(
        "Ticket: {}\nSource: {} ({})\n",
        item.ticket, item.repo, item.branch
    );
    if let Some(url) = &item.pr_url {
        body.push_str(&format!("Source PR: {}\n", url));
    }
    body.push_str(&format!("Updated files: {}\n", updated_files));
    body
}
