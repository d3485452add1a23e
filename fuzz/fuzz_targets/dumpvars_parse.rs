#![no_main]

//! Fuzz target for the build engine's `NAME='value'` variable dump.

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(s) = std::str::from_utf8(data) else {
        return;
    };
    let _ = suiteplan_core::adapters::parse_dumpvars(s);
});
