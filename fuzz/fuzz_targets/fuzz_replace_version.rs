#![no_main]

use libfuzzer_sys::fuzz_target;
use shiptrack_core::replace_declared_version;
use shiptrack_core::types::DeclaredKey;
use std::borrow::Cow;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    let keys = [DeclaredKey::flat("tag"), DeclaredKey::nested("deploy", "tag")];
    for key in &keys {
        match replace_declared_version(text, key, "9.9.9") {
            Cow::Borrowed(out) => assert_eq!(out, text),
            Cow::Owned(out) => {
                // Exactly one line differs; line count never changes
                assert_eq!(out.lines().count(), text.lines().count());
                let changed = out
                    .lines()
                    .zip(text.lines())
                    .filter(|(a, b)| a != b)
                    .count();
                assert!(changed <= 1);
                assert!(out.contains("9.9.9"));
            }
        }
    }
});
