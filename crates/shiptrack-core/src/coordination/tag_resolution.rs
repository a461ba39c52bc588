//! Resolve the published tag of the latest successful build

use crate::error::{Error, Result};
use crate::scrape::extract_tag;
use crate::traits::HostingApi;
use crate::types::RepoId;
use tracing::debug;

/// Job whose log carries the tag line
pub const BUILD_JOB_NAME: &str = "build-and-publish";

/// Tag plus the run it was read from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTag {
    pub tag: String,
    pub run_url: String,
}

/// Read-only lookup: latest successful run → build job → log → tag.
///
/// Never mutates remote state, so it is safe to retry.
pub async fn resolve_tag<H: HostingApi>(
    api: &H,
    repo: &RepoId,
    workflow_id: &str,
    branch: &str,
) -> Result<ResolvedTag> {
    let run = api
        .latest_successful_run(repo, workflow_id, branch)
        .await?
        .ok_or_else(|| {
            Error::NoRun(format!(
                "workflow '{}' has no successful run on {} in {}",
                workflow_id, branch, repo
            ))
        })?;
    debug!(%repo, branch, run_id = run.id, "Resolving tag from run");

    let jobs = api.jobs(repo, run.id).await?;
    let job = jobs
        .iter()
        .find(|job| job.name == BUILD_JOB_NAME)
        .ok_or_else(|| Error::NoBuildJob(format!("run {} in {}", run.id, repo)))?;

    let log = api.job_logs(repo, job.id).await?;
    let tag = extract_tag(&log).map_err(|e| {
        Error::MissingTag(format!("job {} of run {}: {}", job.id, run.id, e))
    })?;

    Ok(ResolvedTag {
        tag: tag.to_string(),
        run_url: run.html_url,
    })
}
