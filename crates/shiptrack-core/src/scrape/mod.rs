//! Pure text scanners for CI logs and declared-version config files
//!
//! Nothing in this module performs I/O; every function is deterministic in
//! its input text.

pub mod modules;
pub mod patch;
pub mod tag;

pub use modules::{extract_module_versions, extract_module_versions_into};
pub use patch::replace_declared_version;
pub use tag::extract_tag;

use crate::error::Error;

/// Failure to pull a value out of log text
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ScrapeError {
    /// The gated push marker never appears, so the log is not a publish step
    #[error("log does not contain \"{}\"", tag::PUBLISH_MARKER)]
    MissingMarker,
    /// Marker present but no non-empty tag line
    #[error("log does not contain a non-empty \"{}\" line", tag::TAG_PREFIX)]
    NoMatch,
}

impl From<ScrapeError> for Error {
    fn from(err: ScrapeError) -> Self {
        match err {
            ScrapeError::MissingMarker => Error::MissingMarker,
            ScrapeError::NoMatch => Error::NoMatch,
        }
    }
}
