use crate::optimizers::{
    ExcludeUnusedTargetOptimizer, GeneralTestsOptimizer, NullOptimizer, OptimizedBuildTarget,
    PlanEnv,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use suiteplan_context::BuildContext;

/// Builds the optimizer for one requested target.
pub type OptimizerFactory =
    Box<dyn Fn(&str, Arc<BuildContext>, Arc<PlanEnv>) -> Box<dyn OptimizedBuildTarget>>;

/// Builds the optimizer a wrapping strategy delegates to.
pub type FallbackFactory = fn(&str) -> Box<dyn OptimizedBuildTarget>;

/// Suite targets dropped when no scheduled test downloads their outputs.
pub const DEFAULT_EXCLUSION_TARGETS: &[&str] = &["catbox", "csuite", "cts", "device-tests", "vts"];

const GENERAL_TESTS: &str = "general-tests";

/// Caller-supplied additions to the built-in registrations.
#[derive(Debug, Clone, Default)]
pub struct RegistryConfig {
    pub exclusion_targets: Vec<String>,
    /// Explicit output archive names, overriding the naming convention.
    pub exclusion_outputs: BTreeMap<String, Vec<String>>,
}

struct Registration {
    enabled_flag: String,
    factory: OptimizerFactory,
}

/// Immutable mapping from target name to optimizer factory.
#[derive(Default)]
pub struct OptimizerRegistry {
    entries: BTreeMap<String, Registration>,
}

impl OptimizerRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Register `factory` for `target`; a later registration for the same target wins.
    pub fn with(
        mut self,
        target: impl Into<String>,
        enabled_flag: impl Into<String>,
        factory: OptimizerFactory,
    ) -> Self {
        self.entries.insert(
            target.into(),
            Registration {
                enabled_flag: enabled_flag.into(),
                factory,
            },
        );
        self
    }

    pub fn factory(&self, target: &str) -> Option<&OptimizerFactory> {
        self.entries.get(target).map(|r| &r.factory)
    }

    /// `(target, enabled flag)` pairs in target order.
    pub fn targets(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(t, r)| (t.as_str(), r.enabled_flag.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for OptimizerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.targets()).finish()
    }
}

pub fn null_fallback(target: &str) -> Box<dyn OptimizedBuildTarget> {
    Box::new(NullOptimizer::new(target))
}

pub fn general_tests_factory() -> OptimizerFactory {
    Box::new(
        |target: &str, ctx: Arc<BuildContext>, env: Arc<PlanEnv>| -> Box<dyn OptimizedBuildTarget> {
            Box::new(GeneralTestsOptimizer::new(target, ctx, env))
        },
    )
}

pub fn exclude_unused_factory(
    fallback: FallbackFactory,
    outputs: Option<Vec<String>>,
) -> OptimizerFactory {
    Box::new(
        move |target: &str, ctx: Arc<BuildContext>, _env: Arc<PlanEnv>| -> Box<dyn OptimizedBuildTarget> {
            Box::new(ExcludeUnusedTargetOptimizer::new(
                target,
                ctx,
                fallback(target),
                outputs.clone(),
            ))
        },
    )
}

/// The optimizers shipped with suiteplan, plus configured exclusion targets.
pub fn builtin_registry(cfg: &RegistryConfig) -> OptimizerRegistry {
    let mut registry = OptimizerRegistry::empty().with(
        GENERAL_TESTS,
        "general_tests_optimized",
        general_tests_factory(),
    );

    let exclusion_targets = DEFAULT_EXCLUSION_TARGETS
        .iter()
        .map(|t| t.to_string())
        .chain(cfg.exclusion_targets.iter().cloned())
        .chain(cfg.exclusion_outputs.keys().cloned());
    for target in exclusion_targets {
        let outputs = cfg.exclusion_outputs.get(&target).cloned();
        let flag = format!("{target}_atp_exclusion");
        registry = registry.with(target, flag, exclude_unused_factory(null_fallback, outputs));
    }
    registry
}
