//! Port traits abstracting subprocess execution away from the pipeline.

use suiteplan_domain::CommandSpec;

/// Captured result of a finished subprocess.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

/// Runs external commands to completion.
pub trait CommandRunner {
    /// Run with inherited stdio and return the exit code.
    fn run(&self, cmd: &CommandSpec) -> anyhow::Result<i32>;

    /// Run feeding `stdin`, capturing stdout and stderr.
    fn output(&self, cmd: &CommandSpec, stdin: Option<&[u8]>) -> anyhow::Result<ProcessOutput>;
}
