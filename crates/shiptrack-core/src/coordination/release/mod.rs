//! Release pipelines: mobile config bump, web values-repo PR, deploy fan-out

pub mod discovery;
pub mod mobile;
pub mod web;

pub use discovery::{discover_versions, DISCOVERY_RUN_LIMIT};
pub use mobile::{MobileRelease, MobileReleaseResult};
pub use web::{trigger_deployments, TriggerReport, WebDeployRequest, WebDeploymentPr, WebRelease};

use std::borrow::Cow;
use std::fmt;

/// Map every character outside `[A-Za-z0-9._-]` to `-`
pub fn sanitize_ref_component(raw: &str) -> Cow<'_, str> {
    let ok = |c: char| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-');
    if raw.chars().all(ok) {
        Cow::Borrowed(raw)
    } else {
        Cow::Owned(raw.chars().map(|c| if ok(c) { c } else { '-' }).collect())
    }
}

/// Why a (module, environment) pair was not updated
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// File has no declared version key
    KeyMissing,
    /// File already declares the requested version
    AlreadyCurrent,
    FetchFailed(String),
    UpdateFailed(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::KeyMissing => write!(f, "version key not found"),
            SkipReason::AlreadyCurrent => write!(f, "already at requested version"),
            SkipReason::FetchFailed(msg) => write!(f, "fetch failed: {}", msg),
            SkipReason::UpdateFailed(msg) => write!(f, "update failed: {}", msg),
        }
    }
}

/// Result for one unit of the module × environment matrix
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairStatus {
    Updated,
    Skipped(SkipReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairOutcome {
    pub module: String,
    pub environment: String,
    pub path: String,
    pub status: PairStatus,
}

impl PairOutcome {
    #[inline]
    pub fn is_updated(&self) -> bool {
        self.status == PairStatus::Updated
    }
}
