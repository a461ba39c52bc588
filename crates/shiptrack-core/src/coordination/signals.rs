//! Notification delta between two signal snapshots

use crate::types::{CheckState, PrState, SignalSnapshot};
use serde::{Deserialize, Serialize};

fn enabled() -> bool {
    true
}

/// Per-category notification switches (all on by default)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPrefs {
    #[serde(default = "enabled")]
    pub merged: bool,
    #[serde(default = "enabled")]
    pub checks_failed: bool,
    #[serde(default = "enabled")]
    pub review_requested: bool,
    #[serde(default = "enabled")]
    pub comments: bool,
}

impl Default for NotificationPrefs {
    fn default() -> Self {
        Self {
            merged: true,
            checks_failed: true,
            review_requested: true,
            comments: true,
        }
    }
}

impl NotificationPrefs {
    /// Every category disabled
    pub const fn none() -> Self {
        Self {
            merged: false,
            checks_failed: false,
            review_requested: false,
            comments: false,
        }
    }

    #[inline]
    pub const fn allows(&self, kind: NotificationKind) -> bool {
        match kind {
            NotificationKind::Merged => self.merged,
            NotificationKind::ChecksFailed => self.checks_failed,
            NotificationKind::ReviewRequested => self.review_requested,
            NotificationKind::Comments => self.comments,
        }
    }
}

/// Notification category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    Merged,
    ChecksFailed,
    ReviewRequested,
    Comments,
}

/// One event to hand to the notifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationEvent {
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
}

/// Whether a category's transition condition holds
fn transitioned(kind: NotificationKind, prev: &SignalSnapshot, next: &SignalSnapshot) -> bool {
    match kind {
        NotificationKind::Merged => {
            prev.pr_state != PrState::Merged && next.pr_state == PrState::Merged
        }
        NotificationKind::ChecksFailed => {
            prev.check_state != CheckState::Failing && next.check_state == CheckState::Failing
        }
        NotificationKind::ReviewRequested => next.review_requests > prev.review_requests,
        NotificationKind::Comments => {
            next.issue_comments > prev.issue_comments
                || next.review_comments > prev.review_comments
        }
    }
}

/// Categories that fire for a transition, in a fixed order.
///
/// At most one entry per category.
pub fn compute_delta(
    prev: &SignalSnapshot,
    next: &SignalSnapshot,
    prefs: &NotificationPrefs,
) -> Vec<NotificationKind> {
    [
        NotificationKind::Merged,
        NotificationKind::ChecksFailed,
        NotificationKind::ReviewRequested,
        NotificationKind::Comments,
    ]
    .into_iter()
    .filter(|&kind| prefs.allows(kind) && transitioned(kind, prev, next))
    .collect()
}

/// Render an event for a work item
pub fn describe(kind: NotificationKind, ticket: &str, branch: &str) -> NotificationEvent {
    let (title, body) = match kind {
        NotificationKind::Merged => (
            format!("{} merged", ticket),
            format!("Pull request for {} was merged", branch),
        ),
        NotificationKind::ChecksFailed => (
            format!("{} checks failing", ticket),
            format!("Checks on {} are failing", branch),
        ),
        NotificationKind::ReviewRequested => (
            format!("{} review requested", ticket),
            format!("New review request on {}", branch),
        ),
        NotificationKind::Comments => (
            format!("{} new comments", ticket),
            format!("New comments on the pull request for {}", branch),
        ),
    };
    NotificationEvent { kind, title, body }
}
