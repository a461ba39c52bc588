#![no_main]

use libfuzzer_sys::fuzz_target;
use shiptrack_core::extract_module_versions;

const ALLOWED: [&str; 3] = ["api", "web", "worker"];

fuzz_target!(|data: &[u8]| {
    let text = String::from_utf8_lossy(data);
    let found = extract_module_versions(&text, &ALLOWED);

    assert!(found.len() <= ALLOWED.len());
    for (module, version) in found.iter() {
        assert!(ALLOWED.contains(&module));
        assert!(!version.is_empty());
        assert!(text.contains(&format!("/{}:{}", module, version)));
    }
});
