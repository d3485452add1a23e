//! Embeddable core library for suiteplan.
//!
//! Provides a clap-free entry point suitable for linking into another CI driver.
//!
//! # Port traits
//!
//! Every subprocess goes through [`CommandRunner`](ports::CommandRunner). The [`adapters`]
//! module provides the process-backed runner and the build-variable and test-mapping adapters
//! built on top of it.
//!
//! # Entry points
//!
//! - [`run_plan`](pipeline::run_plan) - load inputs and produce a build plan
//! - [`run_build`](pipeline::run_build) - plan, invoke the build engine, then package

pub mod adapters;
pub mod pipeline;
pub mod ports;
pub mod settings;

pub use pipeline::{BuildOutcome, ToolError, execute_build_plan, run_build, run_plan};
pub use settings::BuildSettings;

// Re-export so embedders don't need suiteplan-domain directly.
pub use suiteplan_domain::{BuildPlan, CommandSpec, PlanReport, RegistryConfig};
