use crate::optimizers::{OptimizedBuildTarget, PlanEnv, ResolvedTarget};
use crate::registry::OptimizerRegistry;
use crate::CommandSpec;
use anyhow::Context;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;
use suiteplan_context::BuildContext;
use tracing::{debug, info};

/// Global switch: without it every requested target is built as-is.
pub const OPTIMIZED_BUILD_FLAG: &str = "optimized_build";

/// A post-build action producing one target's archives.
pub struct PackagingStep {
    optimizer: Box<dyn OptimizedBuildTarget>,
    resolved: ResolvedTarget,
}

impl PackagingStep {
    pub fn target(&self) -> &str {
        self.optimizer.target()
    }

    /// Commands to run once the build engine has populated the output tree.
    pub fn commands(&self) -> anyhow::Result<Vec<CommandSpec>> {
        self.optimizer
            .package_outputs(&self.resolved)
            .with_context(|| format!("package outputs for {}", self.target()))
    }
}

impl std::fmt::Debug for PackagingStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackagingStep")
            .field("target", &self.target())
            .field("resolved", &self.resolved)
            .finish()
    }
}

/// What to hand to the build engine, and what to run after it succeeds.
#[derive(Debug, Default)]
pub struct BuildPlan {
    pub build_targets: BTreeSet<String>,
    pub resolutions: Vec<ResolvedTarget>,
    pub packaging_steps: Vec<PackagingStep>,
}

/// Serializable summary of a [`BuildPlan`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanReport {
    pub build_targets: Vec<String>,
    pub resolutions: Vec<ResolvedTarget>,
    pub packaging_steps: Vec<String>,
}

impl BuildPlan {
    pub fn report(&self) -> PlanReport {
        PlanReport {
            build_targets: self.build_targets.iter().cloned().collect(),
            resolutions: self.resolutions.clone(),
            packaging_steps: self
                .packaging_steps
                .iter()
                .map(|s| s.target().to_string())
                .collect(),
        }
    }
}

pub struct BuildPlanner<'r> {
    context: Arc<BuildContext>,
    env: Arc<PlanEnv>,
    registry: &'r OptimizerRegistry,
}

impl<'r> BuildPlanner<'r> {
    pub fn new(
        context: Arc<BuildContext>,
        env: Arc<PlanEnv>,
        registry: &'r OptimizerRegistry,
    ) -> Self {
        Self {
            context,
            env,
            registry,
        }
    }

    pub fn create_build_plan(&self, targets: &[String]) -> anyhow::Result<BuildPlan> {
        let started = Instant::now();
        let mut plan = BuildPlan::default();
        let mut seen = BTreeSet::new();

        if !self.context.is_feature_enabled(OPTIMIZED_BUILD_FLAG) {
            info!("{OPTIMIZED_BUILD_FLAG} not enabled, building requested targets as-is");
            for target in targets {
                if seen.insert(target.as_str()) {
                    plan.build_targets.insert(target.clone());
                    plan.resolutions.push(ResolvedTarget::passthrough(
                        target.clone(),
                        Some(format!("feature flag {OPTIMIZED_BUILD_FLAG} not enabled")),
                    ));
                }
            }
            return Ok(plan);
        }

        for target in targets {
            if !seen.insert(target.as_str()) {
                continue;
            }

            let Some(factory) = self.registry.factory(target) else {
                debug!(%target, "no optimizer registered");
                plan.build_targets.insert(target.clone());
                plan.resolutions.push(ResolvedTarget::passthrough(
                    target.clone(),
                    Some("no optimizer registered".to_string()),
                ));
                continue;
            };

            let optimizer = factory(target, Arc::clone(&self.context), Arc::clone(&self.env));
            let resolved = optimizer
                .resolve()
                .with_context(|| format!("resolve build targets for {target}"))?;
            debug!(%target, modules = ?resolved.modules, optimized = resolved.optimized, "resolved");

            plan.build_targets.extend(resolved.modules.iter().cloned());
            plan.resolutions.push(resolved.clone());
            plan.packaging_steps.push(PackagingStep {
                optimizer,
                resolved,
            });
        }

        info!(
            requested = targets.len(),
            build_targets = plan.build_targets.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "build plan created"
        );
        Ok(plan)
    }
}
