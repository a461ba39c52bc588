//! Derive work-item state from the hosting API

use crate::coordination::signals::{compute_delta, describe, NotificationEvent, NotificationPrefs};
use crate::coordination::tag_resolution::{resolve_tag, ResolvedTag};
use crate::error::{Error, Result};
use crate::traits::{HostingApi, Notifier};
use crate::types::{PrSnapshot, PrState, SourceRepoConfig, WorkItem};
use tracing::{debug, info, warn};

/// What one refresh did to a work item
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshOutcome {
    /// Events handed to the notifier
    pub events: Vec<NotificationEvent>,
    /// Tag recorded by this refresh
    pub resolved_tag: Option<ResolvedTag>,
    /// Error text recorded on the item
    pub error: Option<String>,
}

impl RefreshOutcome {
    #[inline]
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Refreshes single work items against the hosting API
pub struct WorkItemResolver<'a, H> {
    api: &'a H,
    notifier: &'a dyn Notifier,
    source_repos: &'a [SourceRepoConfig],
    prefs: NotificationPrefs,
}

impl<'a, H: HostingApi> WorkItemResolver<'a, H> {
    pub fn new(
        api: &'a H,
        notifier: &'a dyn Notifier,
        source_repos: &'a [SourceRepoConfig],
        prefs: NotificationPrefs,
    ) -> Self {
        Self {
            api,
            notifier,
            source_repos,
            prefs,
        }
    }

    /// Refresh one item in place.
    ///
    /// PR, check and signal fields are computed on a copy and committed only
    /// when every fetch succeeded; a failure leaves them as they were and
    /// records the error text. Tag resolution runs after the commit, so its
    /// failure keeps the fresh PR fields. Sync time is stamped either way.
    pub async fn refresh(&self, item: &mut WorkItem) -> RefreshOutcome {
        let mut outcome = RefreshOutcome::default();
        let prev = item.signal_snapshot();

        let mut next = item.clone();
        let pr = match self.sync_pull_request(&mut next).await {
            Ok(pr) => pr,
            Err(e) => {
                warn!(ticket = %item.ticket, branch = %item.branch, error = %e, "Refresh failed");
                outcome.error = Some(e.to_string());
                item.last_error = outcome.error.clone();
                item.touch_synced();
                return outcome;
            }
        };
        *item = next;

        for kind in compute_delta(&prev, &item.signal_snapshot(), &self.prefs) {
            let event = describe(kind, &item.ticket, &item.branch);
            self.notifier.notify(&event.title, &event.body);
            outcome.events.push(event);
        }

        let needs_tag = item.pr_state == PrState::Merged && item.latest_tag.is_none();
        let result = match pr {
            Some(pr) if needs_tag => self.record_tag(item, &pr).await.map(|tag| {
                outcome.resolved_tag = Some(tag);
            }),
            _ => Ok(()),
        };

        match result {
            Ok(()) => item.last_error = None,
            Err(e) => {
                warn!(ticket = %item.ticket, error = %e, "Tag resolution failed");
                outcome.error = Some(e.to_string());
                item.last_error = outcome.error.clone();
            }
        }
        item.touch_synced();
        outcome
    }

    /// PR lookup, then check state and signals concurrently
    async fn sync_pull_request(&self, item: &mut WorkItem) -> Result<Option<PrSnapshot>> {
        let pr = match self.api.find_pull_request(&item.repo, &item.branch).await? {
            Some(pr) => pr,
            None => {
                debug!(repo = %item.repo, branch = %item.branch, "No pull request");
                item.clear_pull_request();
                return Ok(None);
            }
        };

        let same_pr = item.pr_number == Some(pr.number);
        item.pr_number = Some(pr.number);
        item.pr_url = Some(pr.url.clone());
        item.head_sha = Some(pr.head_sha.clone());
        item.pr_state = pr.derived_state();

        let (check_state, signals) = futures::try_join!(
            self.api.commit_status(&item.repo, &pr.head_sha),
            self.api.pull_request_signals(&item.repo, pr.number),
        )?;
        item.check_state = check_state;

        // Counters never go backwards within one PR
        if same_pr {
            item.review_requests = item.review_requests.max(signals.review_requests);
            item.issue_comments = item.issue_comments.max(signals.issue_comments);
            item.review_comments = item.review_comments.max(signals.review_comments);
        } else {
            item.review_requests = signals.review_requests;
            item.issue_comments = signals.issue_comments;
            item.review_comments = signals.review_comments;
        }

        debug!(
            repo = %item.repo,
            pr = pr.number,
            state = item.pr_state.as_str(),
            checks = item.check_state.as_str(),
            "Pull request synced"
        );
        Ok(Some(pr))
    }

    /// Resolve and record the tag of a merged PR
    async fn record_tag(&self, item: &mut WorkItem, pr: &PrSnapshot) -> Result<ResolvedTag> {
        let config = self
            .source_repos
            .iter()
            .find(|c| c.repo == item.repo)
            .ok_or_else(|| {
                Error::Config(format!(
                    "{} is not a configured source repository; cannot resolve its tag",
                    item.repo
                ))
            })?;

        let branch = config
            .target_branch
            .as_deref()
            .filter(|b| !b.is_empty())
            .unwrap_or(&pr.base_branch);

        let resolved = resolve_tag(self.api, &item.repo, &config.workflow_id, branch).await?;
        info!(ticket = %item.ticket, tag = %resolved.tag, "Resolved tag");

        item.latest_tag = Some(resolved.tag.clone());
        item.tag_run_url = Some(resolved.run_url.clone());
        Ok(resolved)
    }
}
