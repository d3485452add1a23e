#![no_main]

//! Fuzz target for build-context decoding and the lookups the planner runs over it.

use libfuzzer_sys::fuzz_target;
use std::sync::Arc;
use suiteplan_context::BuildContext;
use suiteplan_domain::{ExcludeUnusedTargetOptimizer, NullOptimizer, OptimizedBuildTarget};

fuzz_target!(|data: &[u8]| {
    let Ok(s) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(ctx) = BuildContext::from_json(s) else {
        return;
    };

    // Download patterns are arbitrary regexes; none of these may panic.
    let _ = ctx.build_target_used("general-tests");
    let _ = ctx.file_download_options();
    for info in ctx.test_infos() {
        let _ = info.build_target_used("cts");
    }

    let ctx = Arc::new(ctx);
    let opt = ExcludeUnusedTargetOptimizer::new(
        "catbox",
        Arc::clone(&ctx),
        Box::new(NullOptimizer::new("catbox")),
        None,
    );
    if let Ok(resolved) = opt.resolve() {
        let _ = opt.package_outputs(&resolved);
    }
});
