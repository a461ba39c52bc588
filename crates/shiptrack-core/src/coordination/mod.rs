//! Work-item synchronization and release orchestration

pub mod driver;
pub mod release;
pub mod resolver;
pub mod signals;
pub mod tag_resolution;

pub use driver::{DriverConfig, RefreshScope, RefreshSummary, SyncDriver};
pub use resolver::{RefreshOutcome, WorkItemResolver};
pub use signals::{compute_delta, NotificationEvent, NotificationKind, NotificationPrefs};
pub use tag_resolution::{resolve_tag, ResolvedTag, BUILD_JOB_NAME};
