#![no_main]

use libfuzzer_sys::fuzz_target;
use shiptrack_core::scrape::tag::{PUBLISH_MARKER, TAG_PREFIX};
use shiptrack_core::{extract_tag, ScrapeError};

fuzz_target!(|data: &[u8]| {
    let text = String::from_utf8_lossy(data);

    match extract_tag(&text) {
        Ok(tag) => {
            // A tag is a trimmed, non-empty slice of the input
            assert!(!tag.is_empty());
            assert_eq!(tag, tag.trim());
            assert!(text.contains(tag));
        }
        Err(ScrapeError::MissingMarker) => assert!(!text.contains(PUBLISH_MARKER)),
        Err(ScrapeError::NoMatch) => assert!(text.contains(PUBLISH_MARKER)),
    }

    // Appending a fresh emission always makes it the winner
    let log = format!("{}\n{}\n{}fuzz-1\n", PUBLISH_MARKER, text, TAG_PREFIX);
    assert_eq!(extract_tag(&log), Ok("fuzz-1"));
});
