use crate::CommandSpec;
use crate::optimizers::{GatedOptimizer, OptimizedBuildTarget, ResolvedTarget};
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::Arc;
use suiteplan_context::BuildContext;
use tracing::{info, warn};

/// Archive names a suite target conventionally produces.
pub fn default_outputs(target: &str) -> Vec<String> {
    vec![
        format!("{target}.zip"),
        format!("android-{target}.zip"),
        format!("{target}_list.zip"),
        format!("{target}_host-shared-libs.zip"),
        format!("{target}_configs.zip"),
    ]
}

/// Skips a target entirely when no scheduled test downloads any of its outputs.
///
/// When the target is needed, resolution and packaging are delegated to `fallback`.
pub struct ExcludeUnusedTargetOptimizer {
    target: String,
    context: Arc<BuildContext>,
    fallback: Box<dyn OptimizedBuildTarget>,
    outputs: Option<Vec<String>>,
}

impl ExcludeUnusedTargetOptimizer {
    pub fn new(
        target: impl Into<String>,
        context: Arc<BuildContext>,
        fallback: Box<dyn OptimizedBuildTarget>,
        outputs: Option<Vec<String>>,
    ) -> Self {
        Self {
            target: target.into(),
            context,
            fallback,
            outputs,
        }
    }

    pub fn potential_outputs(&self) -> Vec<String> {
        match &self.outputs {
            Some(outputs) => outputs.clone(),
            None => default_outputs(&self.target),
        }
    }

    fn target_used(&self) -> bool {
        let outputs = self.potential_outputs();
        self.context
            .file_download_options()
            .into_iter()
            .any(|pattern| match Regex::new(&format!("^(?:{pattern})")) {
                Ok(re) => outputs.iter().any(|o| re.is_match(o)),
                Err(e) => {
                    warn!(target = %self.target, %pattern, error = %e, "invalid download pattern, keeping target");
                    true
                }
            })
    }
}

impl GatedOptimizer for ExcludeUnusedTargetOptimizer {
    fn optimized_target(&self) -> &str {
        &self.target
    }

    fn build_context(&self) -> &BuildContext {
        &self.context
    }

    fn enabled_flag(&self) -> String {
        format!("{}_atp_exclusion", self.target)
    }

    fn resolve_impl(&self) -> anyhow::Result<ResolvedTarget> {
        if !self.target_used() {
            info!(target = %self.target, "no scheduled test downloads this target, excluding it");
            return Ok(ResolvedTarget::optimized(self.target.clone(), BTreeSet::new()));
        }

        let mut resolved = self.fallback.resolve()?;
        if resolved.rationale.is_none() {
            resolved.rationale = Some("outputs are downloaded by a scheduled test".to_string());
        }
        Ok(resolved)
    }

    fn package_outputs_impl(&self, resolved: &ResolvedTarget) -> anyhow::Result<Vec<CommandSpec>> {
        if resolved.modules.is_empty() {
            return Ok(Vec::new());
        }
        self.fallback.package_outputs(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizers::NullOptimizer;
    use crate::optimizers::test_support::context;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const FEATURES: &[&str] = &["optimized_build", "catbox_atp_exclusion"];

    fn downloading(patterns: &[&str]) -> serde_json::Value {
        json!([{ "extraOptions": [{ "key": "additional-files-filter", "values": patterns }] }])
    }

    fn optimizer(ctx: Arc<BuildContext>, outputs: Option<Vec<String>>) -> ExcludeUnusedTargetOptimizer {
        ExcludeUnusedTargetOptimizer::new(
            "catbox",
            ctx,
            Box::new(NullOptimizer::new("catbox")),
            outputs,
        )
    }

    #[test]
    fn unused_target_is_excluded() {
        let opt = optimizer(context(FEATURES, downloading(&["general-tests.zip"])), None);
        let resolved = opt.resolve().unwrap();
        assert!(resolved.modules.is_empty());
        assert!(opt.package_outputs(&resolved).unwrap().is_empty());
    }

    #[test]
    fn no_test_infos_excludes_target() {
        let opt = optimizer(context(FEATURES, json!([])), None);
        assert!(opt.resolve().unwrap().modules.is_empty());
    }

    #[test]
    fn exact_output_name_keeps_target() {
        let opt = optimizer(context(FEATURES, downloading(&["android-catbox.zip"])), None);
        let resolved = opt.resolve().unwrap();
        assert_eq!(resolved.modules, BTreeSet::from(["catbox".to_string()]));
    }

    #[test]
    fn regex_pattern_keeps_target() {
        let opt = optimizer(context(FEATURES, downloading(&[".*catbox_configs.*"])), None);
        assert_eq!(
            opt.resolve().unwrap().modules,
            BTreeSet::from(["catbox".to_string()])
        );
    }

    #[test]
    fn match_is_anchored_at_start() {
        let opt = optimizer(context(FEATURES, downloading(&["catbox.zip"])), None);
        assert!(!opt.resolve().unwrap().modules.is_empty());

        let opt = optimizer(context(FEATURES, downloading(&["x-catbox.zip"])), None);
        assert!(opt.resolve().unwrap().modules.is_empty());
    }

    #[test]
    fn explicit_outputs_replace_naming_convention() {
        let outputs = Some(vec!["test_target_output.zip".to_string()]);

        let opt = optimizer(
            context(FEATURES, downloading(&["test_target_output.zip"])),
            outputs.clone(),
        );
        assert!(!opt.resolve().unwrap().modules.is_empty());

        let opt = optimizer(context(FEATURES, downloading(&["catbox.zip"])), outputs);
        assert!(opt.resolve().unwrap().modules.is_empty());
    }

    #[test]
    fn invalid_pattern_keeps_target() {
        let opt = optimizer(context(FEATURES, downloading(&["(unclosed"])), None);
        assert!(!opt.resolve().unwrap().modules.is_empty());
    }

    #[test]
    fn disabled_flag_keeps_target() {
        let opt = optimizer(context(&["optimized_build"], downloading(&[])), None);
        assert_eq!(
            opt.resolve().unwrap().modules,
            BTreeSet::from(["catbox".to_string()])
        );
    }

    #[test]
    fn default_outputs_follow_naming_convention() {
        assert_eq!(
            default_outputs("cts"),
            vec![
                "cts.zip",
                "android-cts.zip",
                "cts_list.zip",
                "cts_host-shared-libs.zip",
                "cts_configs.zip",
            ]
        );
    }
}
