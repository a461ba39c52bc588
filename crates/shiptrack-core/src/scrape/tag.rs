//! Tag extraction from a `build-and-publish` job log

use super::ScrapeError;
use memchr::memmem;

/// Marker emitted by the gated artifact push step
pub const PUBLISH_MARKER: &str = "Push Artifact (Gated)";

/// Prefix of the line announcing the published tag
pub const TAG_PREFIX: &str = "New Tag is ";

/// Extract the published tag from raw job log text.
///
/// The log must contain [`PUBLISH_MARKER`] somewhere; otherwise it is not a
/// publish log and `MissingMarker` is returned without scanning further.
/// Lines are then scanned bottom-up and the first one containing
/// [`TAG_PREFIX`] with a non-empty remainder wins, so the most recent
/// emission is returned when the tag is printed more than once.
///
/// # Example
///
/// ```
/// use shiptrack_core::scrape::extract_tag;
///
/// let log = "Push Artifact (Gated)\nNew Tag is 1.0.0\nnoise\nNew Tag is 1.0.1\n";
/// assert_eq!(extract_tag(log).unwrap(), "1.0.1");
/// ```
pub fn extract_tag(log_text: &str) -> Result<&str, ScrapeError> {
    if memmem::find(log_text.as_bytes(), PUBLISH_MARKER.as_bytes()).is_none() {
        return Err(ScrapeError::MissingMarker);
    }

    log_text
        .lines()
        .rev()
        .filter_map(|line| {
            let start = line.find(TAG_PREFIX)? + TAG_PREFIX.len();
            let tag = line[start..].trim();
            (!tag.is_empty()).then_some(tag)
        })
        .next()
        .ok_or(ScrapeError::NoMatch)
}
