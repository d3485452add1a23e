//! Per-target build optimizers.
//!
//! Every optimizer is opt-in through its own feature flag in the build context. The gate lives in
//! the blanket [`OptimizedBuildTarget`] impl for [`GatedOptimizer`], so a variant only supplies
//! its flag name and the logic that runs once the flag is on. With the flag off the target is
//! built exactly as requested and nothing is packaged.

use crate::CommandSpec;
use crate::ports::{BuildVariables, TestMappingResolver};
use camino::Utf8PathBuf;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use suiteplan_context::{BuildContext, ChangeInfo};
use tracing::debug;

mod exclude_unused;
mod null;

pub use exclude_unused::{ExcludeUnusedTargetOptimizer, default_outputs};
pub use general_tests::{GeneralTestsOptimizer, REQUIRED_MODULES};
pub use null::NullOptimizer;

/// Invocation-wide inputs shared by every optimizer.
pub struct PlanEnv {
    /// Source tree root (`$TOP`).
    pub src_top: Utf8PathBuf,
    /// Where archives are written.
    pub dist_dir: Utf8PathBuf,
    /// Zip tool executable.
    pub zip_tool: Utf8PathBuf,
    /// Changed files, if the diff is known.
    pub change_info: Option<ChangeInfo>,
    pub test_mappings: Option<Arc<dyn TestMappingResolver>>,
    pub build_vars: Arc<dyn BuildVariables>,
}

impl std::fmt::Debug for PlanEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlanEnv")
            .field("src_top", &self.src_top)
            .field("dist_dir", &self.dist_dir)
            .field("zip_tool", &self.zip_tool)
            .field("change_info", &self.change_info)
            .field("test_mappings", &self.test_mappings.is_some())
            .finish_non_exhaustive()
    }
}

/// Outcome of resolving one requested target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedTarget {
    pub target: String,
    pub modules: BTreeSet<String>,
    /// True when optimizer logic reshaped the module set.
    pub optimized: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
}

impl ResolvedTarget {
    /// Build `target` exactly as requested.
    pub fn passthrough(target: impl Into<String>, rationale: Option<String>) -> Self {
        let target = target.into();
        Self {
            modules: BTreeSet::from([target.clone()]),
            target,
            optimized: false,
            rationale,
        }
    }

    pub fn optimized(target: impl Into<String>, modules: BTreeSet<String>) -> Self {
        Self {
            target: target.into(),
            modules,
            optimized: true,
            rationale: None,
        }
    }
}

/// A strategy deciding what to build for one requested target and how to package it.
///
/// Resolution and packaging are separate stages: packaging consumes the [`ResolvedTarget`] that
/// resolution produced, after the build engine has run.
pub trait OptimizedBuildTarget {
    fn target(&self) -> &str;

    fn resolve(&self) -> anyhow::Result<ResolvedTarget>;

    fn package_outputs(&self, resolved: &ResolvedTarget) -> anyhow::Result<Vec<CommandSpec>>;
}

/// An optimizer switched on by a build-context feature flag.
pub trait GatedOptimizer {
    fn optimized_target(&self) -> &str;

    fn build_context(&self) -> &BuildContext;

    fn enabled_flag(&self) -> String;

    fn resolve_impl(&self) -> anyhow::Result<ResolvedTarget>;

    fn package_outputs_impl(&self, resolved: &ResolvedTarget) -> anyhow::Result<Vec<CommandSpec>>;

    fn is_enabled(&self) -> bool {
        self.build_context()
            .is_feature_enabled(&self.enabled_flag())
    }
}

impl<T: GatedOptimizer> OptimizedBuildTarget for T {
    fn target(&self) -> &str {
        self.optimized_target()
    }

    fn resolve(&self) -> anyhow::Result<ResolvedTarget> {
        if !self.is_enabled() {
            let flag = self.enabled_flag();
            debug!(target = self.optimized_target(), %flag, "optimization flag not enabled");
            return Ok(ResolvedTarget::passthrough(
                self.optimized_target(),
                Some(format!("feature flag {flag} not enabled")),
            ));
        }
        self.resolve_impl()
    }

    fn package_outputs(&self, resolved: &ResolvedTarget) -> anyhow::Result<Vec<CommandSpec>> {
        if !self.is_enabled() {
            return Ok(Vec::new());
        }
        self.package_outputs_impl(resolved)
    }
}
