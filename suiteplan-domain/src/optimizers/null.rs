use crate::CommandSpec;
use crate::optimizers::{OptimizedBuildTarget, ResolvedTarget};

/// Builds the target as requested and packages nothing.
#[derive(Debug, Clone)]
pub struct NullOptimizer {
    target: String,
}

impl NullOptimizer {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
        }
    }
}

impl OptimizedBuildTarget for NullOptimizer {
    fn target(&self) -> &str {
        &self.target
    }

    fn resolve(&self) -> anyhow::Result<ResolvedTarget> {
        Ok(ResolvedTarget::passthrough(self.target.clone(), None))
    }

    fn package_outputs(&self, _resolved: &ResolvedTarget) -> anyhow::Result<Vec<CommandSpec>> {
        Ok(Vec::new())
    }
}
