#![no_main]

//! Fuzz target for changed-files manifest decoding.

use libfuzzer_sys::fuzz_target;
use suiteplan_context::ChangeInfo;

fuzz_target!(|data: &[u8]| {
    let Ok(s) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(info) = ChangeInfo::from_json(s) {
        for path in info.changed_files() {
            assert!(path.contains('/'));
        }
    }
});
