//! Default subprocess-backed port implementations.

use crate::ports::{CommandRunner, ProcessOutput};
use anyhow::{Context, bail};
use camino::Utf8PathBuf;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use std::process::{Command, Stdio};
use std::sync::Arc;
use suiteplan_domain::CommandSpec;
use suiteplan_domain::ports::{BuildVariables, TestMappingResolver, TestMappings};
use tracing::debug;

/// Runs commands as child processes of the current one, inheriting its environment.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner;

impl CommandRunner for ProcessRunner {
    fn run(&self, cmd: &CommandSpec) -> anyhow::Result<i32> {
        debug!(command = %cmd, "running");
        let status = Command::new(&cmd.program)
            .args(&cmd.args)
            .status()
            .with_context(|| format!("spawn {}", cmd.program))?;
        Ok(status.code().unwrap_or(-1))
    }

    fn output(&self, cmd: &CommandSpec, stdin: Option<&[u8]>) -> anyhow::Result<ProcessOutput> {
        debug!(command = %cmd, "running with captured output");
        let mut child = Command::new(&cmd.program)
            .args(&cmd.args)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("spawn {}", cmd.program))?;

        if let (Some(bytes), Some(mut pipe)) = (stdin, child.stdin.take()) {
            pipe.write_all(bytes)
                .with_context(|| format!("write stdin of {}", cmd.program))?;
        }

        let output = child
            .wait_with_output()
            .with_context(|| format!("wait for {}", cmd.program))?;
        Ok(ProcessOutput {
            code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Build variables answered by the build engine's `--dumpvars-mode`.
pub struct DumpVarsQuery {
    build_engine: Utf8PathBuf,
    runner: Arc<dyn CommandRunner>,
}

impl DumpVarsQuery {
    pub fn new(build_engine: impl Into<Utf8PathBuf>, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            build_engine: build_engine.into(),
            runner,
        }
    }

    pub fn command(&self, names: &[&str]) -> CommandSpec {
        CommandSpec::new(self.build_engine.as_str())
            .arg("--dumpvars-mode")
            .arg(format!("--abs-vars={}", names.join(" ")))
    }
}

impl BuildVariables for DumpVarsQuery {
    fn query(&self, names: &[&str]) -> anyhow::Result<BTreeMap<String, String>> {
        let out = self.runner.output(&self.command(names), None)?;
        if out.code != 0 {
            bail!(
                "dumpvars failed with return code {}: {}",
                out.code,
                out.stderr.trim()
            );
        }
        if out.stdout.trim().is_empty() {
            bail!("dumpvars produced no output");
        }

        let mut vars = parse_dumpvars(&out.stdout)?;
        let missing: Vec<&str> = names
            .iter()
            .copied()
            .filter(|n| !vars.contains_key(*n))
            .collect();
        if !missing.is_empty() {
            bail!("dumpvars did not report: {}", missing.join(", "));
        }
        vars.retain(|k, _| names.contains(&k.as_str()));
        Ok(vars)
    }
}

/// Parse `NAME='value'` lines. Blank lines are skipped.
pub fn parse_dumpvars(stdout: &str) -> anyhow::Result<BTreeMap<String, String>> {
    let mut vars = BTreeMap::new();
    for line in stdout.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let Some((name, value)) = line.split_once('=') else {
            bail!("malformed dumpvars line: {line}");
        };
        let value = value
            .strip_prefix('\'')
            .and_then(|v| v.strip_suffix('\''))
            .unwrap_or(value);
        vars.insert(name.trim().to_string(), value.to_string());
    }
    Ok(vars)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MappingQuery<'a> {
    changed_files: &'a BTreeSet<String>,
    scope: &'a BTreeSet<String>,
}

/// TEST_MAPPING lookup delegated to an external command.
///
/// The command receives `{"changedFiles": [..], "scope": [..]}` on stdin and prints the mappings
/// as JSON on stdout.
pub struct CommandTestMappingResolver {
    command: Vec<String>,
    runner: Arc<dyn CommandRunner>,
}

impl CommandTestMappingResolver {
    pub fn new(command: Vec<String>, runner: Arc<dyn CommandRunner>) -> Self {
        Self { command, runner }
    }
}

impl TestMappingResolver for CommandTestMappingResolver {
    fn test_mappings(
        &self,
        changed_files: &BTreeSet<String>,
        scope: &BTreeSet<String>,
    ) -> anyhow::Result<TestMappings> {
        let Some((program, args)) = self.command.split_first() else {
            bail!("test mapping command is empty");
        };
        let cmd = CommandSpec::new(program.as_str()).args(args.iter().cloned());
        let input = serde_json::to_vec(&MappingQuery {
            changed_files,
            scope,
        })
        .context("encode test mapping query")?;

        let out = self.runner.output(&cmd, Some(&input))?;
        if out.code != 0 {
            bail!(
                "test mapping command failed with return code {}: {}",
                out.code,
                out.stderr.trim()
            );
        }
        serde_json::from_str(&out.stdout).context("decode test mapping output")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    /// Replays a canned output and records what it was asked to run.
    struct CannedRunner {
        output: ProcessOutput,
        seen: Mutex<Vec<(CommandSpec, Option<Vec<u8>>)>>,
    }

    impl CannedRunner {
        fn new(code: i32, stdout: &str) -> Arc<Self> {
            Arc::new(Self {
                output: ProcessOutput {
                    code,
                    stdout: stdout.to_string(),
                    stderr: "boom".to_string(),
                },
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    impl CommandRunner for CannedRunner {
        fn run(&self, cmd: &CommandSpec) -> anyhow::Result<i32> {
            self.seen.lock().unwrap().push((cmd.clone(), None));
            Ok(self.output.code)
        }

        fn output(&self, cmd: &CommandSpec, stdin: Option<&[u8]>) -> anyhow::Result<ProcessOutput> {
            self.seen
                .lock()
                .unwrap()
                .push((cmd.clone(), stdin.map(<[u8]>::to_vec)));
            Ok(self.output.clone())
        }
    }

    #[test]
    fn parse_dumpvars_strips_quotes() {
        let vars = parse_dumpvars("PRODUCT_OUT='/out/target/product/x'\n\nHOST_OUT=/out/host\n").unwrap();
        assert_eq!(vars["PRODUCT_OUT"], "/out/target/product/x");
        assert_eq!(vars["HOST_OUT"], "/out/host");
    }

    #[test]
    fn parse_dumpvars_rejects_lines_without_equals() {
        assert!(parse_dumpvars("garbage").is_err());
    }

    #[test]
    fn dumpvars_query_builds_single_abs_vars_argument() {
        let runner = CannedRunner::new(0, "HOST_OUT='/h'\nPRODUCT_OUT='/p'\n");
        let query = DumpVarsQuery::new("/top/build/soong/soong_ui.bash", runner.clone());
        let vars = query.query(&["HOST_OUT", "PRODUCT_OUT"]).unwrap();
        assert_eq!(vars.len(), 2);

        let seen = runner.seen.lock().unwrap();
        assert_eq!(
            seen[0].0.argv(),
            vec![
                "/top/build/soong/soong_ui.bash",
                "--dumpvars-mode",
                "--abs-vars=HOST_OUT PRODUCT_OUT",
            ]
        );
    }

    #[test]
    fn dumpvars_query_fails_on_nonzero_exit() {
        let query = DumpVarsQuery::new("engine", CannedRunner::new(1, "HOST_OUT='/h'"));
        let err = query.query(&["HOST_OUT"]).unwrap_err();
        assert!(err.to_string().contains("return code 1"));
    }

    #[test]
    fn dumpvars_query_fails_on_empty_output() {
        let query = DumpVarsQuery::new("engine", CannedRunner::new(0, "  \n"));
        assert!(query.query(&["HOST_OUT"]).is_err());
    }

    #[test]
    fn dumpvars_query_fails_on_unreported_variable() {
        let query = DumpVarsQuery::new("engine", CannedRunner::new(0, "HOST_OUT='/h'"));
        let err = query.query(&["HOST_OUT", "SOONG_HOST_OUT"]).unwrap_err();
        assert!(err.to_string().contains("SOONG_HOST_OUT"));
    }

    #[test]
    fn mapping_resolver_sends_query_on_stdin() {
        let runner = CannedRunner::new(
            0,
            r#"{"a/TEST_MAPPING": {"presubmit": [{"name": "mod_a"}]}}"#,
        );
        let resolver = CommandTestMappingResolver::new(
            vec!["resolve-mappings".to_string(), "--json".to_string()],
            runner.clone(),
        );
        let mappings = resolver
            .test_mappings(
                &BTreeSet::from(["a/file.rs".to_string()]),
                &BTreeSet::from(["presubmit".to_string()]),
            )
            .unwrap();
        assert_eq!(mappings["a/TEST_MAPPING"]["presubmit"][0].name, "mod_a");

        let seen = runner.seen.lock().unwrap();
        assert_eq!(seen[0].0.argv(), vec!["resolve-mappings", "--json"]);
        let sent: serde_json::Value = serde_json::from_slice(seen[0].1.as_ref().unwrap()).unwrap();
        assert_eq!(
            sent,
            serde_json::json!({ "changedFiles": ["a/file.rs"], "scope": ["presubmit"] })
        );
    }

    #[test]
    fn mapping_resolver_propagates_failure() {
        let resolver = CommandTestMappingResolver::new(
            vec!["resolve-mappings".to_string()],
            CannedRunner::new(3, ""),
        );
        assert!(
            resolver
                .test_mappings(&BTreeSet::new(), &BTreeSet::new())
                .is_err()
        );
    }
}
