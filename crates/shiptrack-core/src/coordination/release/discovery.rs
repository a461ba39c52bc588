//! Discover module versions from recent container publish/scan jobs

use crate::error::Result;
use crate::scrape::extract_module_versions_into;
use crate::traits::HostingApi;
use crate::types::{ModuleVersionMap, RepoId, WorkflowJob};
use tracing::{debug, warn};

/// Most recent runs inspected per discovery
pub const DISCOVERY_RUN_LIMIT: u32 = 50;

/// Job name fragments (lowercase) whose logs carry image references
const SCANNED_JOBS: [&str; 2] = ["docker publish", "container scan"];

#[inline]
fn is_scanned_job(job: &WorkflowJob) -> bool {
    let name = job.name.to_lowercase();
    SCANNED_JOBS.iter().any(|fragment| name.contains(fragment))
}

/// Versions for `modules` found in recent runs on `branch`, newest run first.
///
/// Partial results are normal. Job listing and log failures skip that run or
/// job; only the initial run listing can fail the call.
pub async fn discover_versions<H: HostingApi, S: AsRef<str>>(
    api: &H,
    repo: &RepoId,
    branch: &str,
    modules: &[S],
) -> Result<ModuleVersionMap> {
    let mut found = ModuleVersionMap::new();
    if modules.is_empty() {
        return Ok(found);
    }

    let runs = api.list_runs(repo, branch, DISCOVERY_RUN_LIMIT).await?;
    debug!(%repo, branch, runs = runs.len(), "Discovering module versions");

    'runs: for run in runs.iter().take(DISCOVERY_RUN_LIMIT as usize) {
        let jobs = match api.jobs(repo, run.id).await {
            Ok(jobs) => jobs,
            Err(e) => {
                warn!(%repo, run_id = run.id, error = %e, "Skipping run");
                continue;
            }
        };

        for job in jobs.iter().filter(|job| is_scanned_job(job)) {
            let pending: Vec<&str> = found.missing(modules);
            if pending.is_empty() {
                break 'runs;
            }

            let log = match api.job_logs(repo, job.id).await {
                Ok(log) => log,
                Err(e) => {
                    warn!(%repo, run_id = run.id, job = %job.name, error = %e, "Skipping job log");
                    continue;
                }
            };

            let added = extract_module_versions_into(&log, &pending, &mut found);
            if added > 0 {
                debug!(run_id = run.id, job = %job.name, added, "Found module versions");
            }
        }

        if found.missing(modules).is_empty() {
            break;
        }
    }

    Ok(found)
}
