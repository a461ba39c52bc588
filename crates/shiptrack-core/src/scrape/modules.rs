//! Module version extraction from container publish/scan logs

use crate::types::ModuleVersionMap;
use once_cell::sync::Lazy;
use regex::Regex;

/// `c1/c2/c3/c4/<module>:<version>`, the module segment sits right before the
/// trailing `:version` and is preceded by four path components.
static IMAGE_REF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[A-Za-z0-9._-]+(?:/[A-Za-z0-9._-]+){3}/([A-Za-z0-9._-]+):([A-Za-z0-9._+-]+)")
        .expect("image reference pattern is valid")
});

/// Scan a log for image references of allowed modules.
///
/// Only modules listed in `allowed` are captured; the first occurrence in the
/// text wins for each module.
pub fn extract_module_versions<S: AsRef<str>>(log_text: &str, allowed: &[S]) -> ModuleVersionMap {
    let mut map = ModuleVersionMap::new();
    extract_module_versions_into(log_text, allowed, &mut map);
    map
}

/// Incremental variant: add matches to `map` without overwriting existing
/// entries. Returns the number of newly resolved modules.
pub fn extract_module_versions_into<S: AsRef<str>>(
    log_text: &str,
    allowed: &[S],
    map: &mut ModuleVersionMap,
) -> usize {
    if allowed.is_empty() {
        return 0;
    }

    let mut added = 0;
    for caps in IMAGE_REF.captures_iter(log_text) {
        let (Some(module), Some(version)) = (caps.get(1), caps.get(2)) else {
            continue;
        };
        let module = module.as_str();
        if !allowed.iter().any(|m| m.as_ref() == module) {
            continue;
        }
        if map.insert_if_absent(module, version.as_str()) {
            added += 1;
            if allowed.iter().all(|m| map.contains(m.as_ref())) {
                break;
            }
        }
    }
    added
}
