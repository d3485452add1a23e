//! Human-readable output for `plan` and `list-optimizers`.

use std::fmt::Write;
use suiteplan_domain::{OPTIMIZED_BUILD_FLAG, OptimizerRegistry, PlanReport, ResolvedTarget};

fn outcome(r: &ResolvedTarget) -> String {
    if !r.optimized {
        "as-is".to_string()
    } else if r.modules.is_empty() {
        "excluded".to_string()
    } else {
        format!("narrowed to {} modules", r.modules.len())
    }
}

pub fn plan_text(report: &PlanReport) -> String {
    let mut out = String::new();
    let width = report
        .resolutions
        .iter()
        .map(|r| r.target.len())
        .max()
        .unwrap_or(0);

    let _ = writeln!(out, "Build targets:");
    if report.build_targets.is_empty() {
        let _ = writeln!(out, "  (none)");
    }
    for target in &report.build_targets {
        let _ = writeln!(out, "  {target}");
    }

    let _ = writeln!(out, "\nResolutions:");
    for r in &report.resolutions {
        let _ = write!(out, "  {:<width$}  {}", r.target, outcome(r));
        if let Some(why) = &r.rationale {
            let _ = write!(out, " ({why})");
        }
        out.push('\n');
    }

    if !report.packaging_steps.is_empty() {
        let _ = writeln!(out, "\nPackaging:");
        for target in &report.packaging_steps {
            let _ = writeln!(out, "  {target}");
        }
    }
    out
}

pub fn optimizers_text(registry: &OptimizerRegistry) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Available optimizers (all require {OPTIMIZED_BUILD_FLAG}):\n");
    let _ = writeln!(out, "  {:<24} FLAG", "TARGET");
    let _ = writeln!(out, "  {:<24} ----", "------");
    for (target, flag) in registry.targets() {
        let _ = writeln!(out, "  {:<24} {}", target, flag);
    }
    out
}
