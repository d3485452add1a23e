//! Domain logic: turn a build context + requested targets into a concrete build plan.
//!
//! This crate owns *what* gets built and packaged and why. It does not run anything itself; the
//! build engine, variable queries and the zip tool are reached through [`ports`] or returned as
//! ready-to-run [`CommandSpec`]s for the caller to execute.

mod command;
pub mod optimizers;
mod planner;
pub mod ports;
mod registry;
mod zip;

pub use command::CommandSpec;
pub use optimizers::{
    ExcludeUnusedTargetOptimizer, GatedOptimizer, GeneralTestsOptimizer, NullOptimizer,
    OptimizedBuildTarget, PlanEnv, ResolvedTarget,
};
pub use planner::{BuildPlan, BuildPlanner, OPTIMIZED_BUILD_FLAG, PackagingStep, PlanReport};
pub use registry::{
    DEFAULT_EXCLUSION_TARGETS, FallbackFactory, OptimizerFactory, OptimizerRegistry,
    RegistryConfig, builtin_registry, exclude_unused_factory, general_tests_factory,
    null_fallback,
};
pub use zip::{ZipCommand, ZipEntry};
