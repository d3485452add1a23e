//! Plan and build pipelines, extracted from the CLI.
//!
//! Every subprocess goes through the [`CommandRunner`] port so embedders and tests can replace
//! the build engine and the zip tool.

use crate::adapters::{CommandTestMappingResolver, DumpVarsQuery};
use crate::ports::CommandRunner;
use crate::settings::BuildSettings;
use anyhow::Context;
use std::sync::Arc;
use std::time::Instant;
use suiteplan_context::{load_build_context, load_change_info};
use suiteplan_domain::ports::TestMappingResolver;
use suiteplan_domain::{BuildPlan, BuildPlanner, CommandSpec, PlanEnv, builtin_registry};
use tracing::{debug, info};

/// Error type for pipeline results. Exit code 1 for tool errors, the engine's code for builds.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Missing required environment variables: {}", .vars.join(", "))]
    MissingEnv { vars: Vec<String> },
    #[error("Build command failed with return code: {code}")]
    BuildFailed { code: i32 },
    #[error("{0:#}")]
    Internal(#[from] anyhow::Error),
}

impl ToolError {
    pub fn exit_code(&self) -> i32 {
        match self {
            ToolError::BuildFailed { code } if *code > 0 => *code,
            _ => 1,
        }
    }
}

/// Outcome of `run_build`.
#[derive(Debug)]
pub struct BuildOutcome {
    pub plan: BuildPlan,
    /// Every requested target resolved to nothing, so the engine was not run: `--make-mode`
    /// with no goals would build the default goal instead.
    pub build_skipped: bool,
    pub packaging_commands: usize,
}

/// Load the build context and changed-files manifest, then plan `settings.targets`.
pub fn run_plan(
    settings: &BuildSettings,
    runner: Arc<dyn CommandRunner>,
) -> Result<BuildPlan, ToolError> {
    let context = load_build_context(settings.build_context.as_deref())
        .context("load build context")?;
    let change_info =
        load_change_info(settings.change_info.as_deref()).context("load change info")?;

    let test_mappings: Option<Arc<dyn TestMappingResolver>> =
        if settings.test_mapping_command.is_empty() {
            None
        } else {
            Some(Arc::new(CommandTestMappingResolver::new(
                settings.test_mapping_command.clone(),
                Arc::clone(&runner),
            )))
        };

    let env = PlanEnv {
        src_top: settings.top.clone(),
        dist_dir: settings.dist_dir.clone(),
        zip_tool: settings.zip_tool_path(),
        change_info,
        test_mappings,
        build_vars: Arc::new(DumpVarsQuery::new(settings.build_engine_path(), runner)),
    };
    debug!(?env, "plan environment");

    let registry = builtin_registry(&settings.registry);
    let planner = BuildPlanner::new(Arc::new(context), Arc::new(env), &registry);
    Ok(planner.create_build_plan(&settings.targets)?)
}

/// Plan, run the build engine, then run every packaging command.
pub fn run_build(
    settings: &BuildSettings,
    runner: Arc<dyn CommandRunner>,
) -> Result<BuildOutcome, ToolError> {
    let plan = run_plan(settings, Arc::clone(&runner))?;
    execute_build_plan(plan, settings, runner.as_ref())
}

/// Hand `plan.build_targets` to the build engine and package the results.
///
/// Packaging only starts once the engine exits 0. The first failing command aborts the run.
pub fn execute_build_plan(
    plan: BuildPlan,
    settings: &BuildSettings,
    runner: &dyn CommandRunner,
) -> Result<BuildOutcome, ToolError> {
    let started = Instant::now();

    let build_skipped = plan.build_targets.is_empty() && !settings.targets.is_empty();
    if build_skipped {
        info!("every requested target was excluded, skipping the build engine");
    } else {
        let cmd = CommandSpec::new(settings.build_engine_path().as_str())
            .arg("--make-mode")
            .args(plan.build_targets.iter().cloned());
        info!(command = %cmd, "running build");
        let code = runner.run(&cmd).context("run build engine")?;
        if code != 0 {
            return Err(ToolError::BuildFailed { code });
        }
    }

    let mut packaging_commands = 0;
    for step in &plan.packaging_steps {
        for cmd in step.commands()? {
            info!(target = step.target(), command = %cmd, "packaging");
            let code = runner
                .run(&cmd)
                .with_context(|| format!("run packaging for {}", step.target()))?;
            if code != 0 {
                return Err(ToolError::BuildFailed { code });
            }
            packaging_commands += 1;
        }
    }

    info!(
        build_targets = plan.build_targets.len(),
        packaging_commands,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "build finished"
    );
    Ok(BuildOutcome {
        plan,
        build_skipped,
        packaging_commands,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::ProcessOutput;
    use camino::{Utf8Path, Utf8PathBuf};
    use fs_err as fs;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Records every command and answers dumpvars and mapping queries from fixed strings.
    #[derive(Default)]
    struct RecordingRunner {
        runs: Mutex<Vec<CommandSpec>>,
        fail_on_run: Option<(usize, i32)>,
        dumpvars: String,
        mappings: String,
    }

    impl RecordingRunner {
        fn argvs(&self) -> Vec<Vec<String>> {
            self.runs
                .lock()
                .unwrap()
                .iter()
                .map(|c| c.argv().into_iter().map(String::from).collect())
                .collect()
        }
    }

    impl CommandRunner for RecordingRunner {
        fn run(&self, cmd: &CommandSpec) -> anyhow::Result<i32> {
            let mut runs = self.runs.lock().unwrap();
            runs.push(cmd.clone());
            match self.fail_on_run {
                Some((index, code)) if index + 1 == runs.len() => Ok(code),
                _ => Ok(0),
            }
        }

        fn output(&self, cmd: &CommandSpec, _stdin: Option<&[u8]>) -> anyhow::Result<ProcessOutput> {
            let stdout = if cmd.args.first().map(String::as_str) == Some("--dumpvars-mode") {
                self.dumpvars.clone()
            } else {
                self.mappings.clone()
            };
            Ok(ProcessOutput {
                code: 0,
                stdout,
                stderr: String::new(),
            })
        }
    }

    fn utf8(dir: &TempDir) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf8 temp dir")
    }

    fn write_json(path: &Utf8Path, value: serde_json::Value) {
        fs::write(path, serde_json::to_string(&value).unwrap()).unwrap();
    }

    fn settings(top: &Utf8Path, features: &[&str], targets: &[&str]) -> BuildSettings {
        let ctx = top.join("build_context.json");
        write_json(
            &ctx,
            json!({ "enabledBuildFeatures": features, "testContext": { "testInfos": [] } }),
        );
        let mut settings = BuildSettings::new(top);
        settings.build_context = Some(ctx);
        settings.targets = targets.iter().map(|t| t.to_string()).collect();
        settings
    }

    #[test]
    fn missing_env_maps_to_exit_code_one() {
        let err = ToolError::MissingEnv {
            vars: vec!["TOP".to_string()],
        };
        assert_eq!(err.exit_code(), 1);
        assert_eq!(ToolError::BuildFailed { code: 7 }.exit_code(), 7);
        assert_eq!(ToolError::BuildFailed { code: -1 }.exit_code(), 1);
    }

    #[test]
    fn plan_without_build_context_passes_targets_through() {
        let dir = TempDir::new().unwrap();
        let mut settings = BuildSettings::new(utf8(&dir));
        settings.targets = vec!["general-tests".to_string(), "droid".to_string()];

        let plan = run_plan(&settings, Arc::new(RecordingRunner::default())).unwrap();
        assert_eq!(
            plan.report().build_targets,
            vec!["droid".to_string(), "general-tests".to_string()]
        );
        assert!(plan.packaging_steps.is_empty());
    }

    #[test]
    fn malformed_build_context_is_an_error() {
        let dir = TempDir::new().unwrap();
        let top = utf8(&dir);
        fs::write(top.join("ctx.json"), "{not json").unwrap();
        let mut settings = BuildSettings::new(&top);
        settings.build_context = Some(top.join("ctx.json"));

        let err = run_plan(&settings, Arc::new(RecordingRunner::default())).unwrap_err();
        assert!(matches!(err, ToolError::Internal(_)));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn build_runs_engine_with_planned_targets() {
        let dir = TempDir::new().unwrap();
        let top = utf8(&dir);
        let settings = settings(
            &top,
            &["optimized_build", "catbox_atp_exclusion"],
            &["catbox", "droid"],
        );
        let runner = Arc::new(RecordingRunner::default());

        let outcome = run_build(&settings, runner.clone()).unwrap();
        assert!(!outcome.build_skipped);
        assert_eq!(outcome.packaging_commands, 0);
        assert_eq!(
            runner.argvs(),
            vec![vec![
                top.join("build/soong/soong_ui.bash").to_string(),
                "--make-mode".to_string(),
                "droid".to_string(),
            ]]
        );
    }

    #[test]
    fn build_failure_surfaces_engine_code_and_skips_packaging() {
        let dir = TempDir::new().unwrap();
        let top = utf8(&dir);
        let settings = settings(&top, &["optimized_build"], &["general-tests"]);
        let runner = Arc::new(RecordingRunner {
            fail_on_run: Some((0, 42)),
            ..Default::default()
        });

        let err = run_build(&settings, runner.clone()).unwrap_err();
        assert!(matches!(err, ToolError::BuildFailed { code: 42 }));
        assert_eq!(err.to_string(), "Build command failed with return code: 42");
        assert_eq!(runner.argvs().len(), 1);
    }

    #[test]
    fn fully_excluded_request_skips_engine() {
        let dir = TempDir::new().unwrap();
        let top = utf8(&dir);
        let settings = settings(&top, &["optimized_build", "cts_atp_exclusion"], &["cts"]);
        let runner = Arc::new(RecordingRunner::default());

        let outcome = run_build(&settings, runner.clone()).unwrap();
        assert!(outcome.build_skipped);
        assert!(runner.argvs().is_empty());
    }

    #[test]
    fn optimized_general_tests_build_then_package() {
        let dir = TempDir::new().unwrap();
        let top = utf8(&dir);
        let host_out = top.join("out/host/linux-x86");
        let product_out = top.join("out/target/product/vsoc_x86_64");
        fs::create_dir_all(host_out.join("testcases/mod_a")).unwrap();
        fs::create_dir_all(&product_out).unwrap();
        fs::write(host_out.join("testcases/mod_a/mod_a.config"), "<configuration/>").unwrap();

        let ctx = top.join("build_context.json");
        write_json(
            &ctx,
            json!({
                "enabledBuildFeatures": ["optimized_build", "general_tests_optimized"],
                "testContext": { "testInfos": [
                    { "extraOptions": [{ "key": "test-mapping-test-group", "values": ["presubmit"] }] }
                ]},
            }),
        );
        let change = top.join("change_info.json");
        write_json(
            &change,
            json!({ "changes": [{ "projectPath": "pkg/a", "revisions": [{ "fileInfos": [{ "path": "A.java" }] }] }] }),
        );

        let mut settings = BuildSettings::new(&top);
        settings.build_context = Some(ctx);
        settings.change_info = Some(change);
        settings.test_mapping_command = vec!["resolve-mappings".to_string()];
        settings.targets = vec!["general-tests".to_string()];

        let runner = Arc::new(RecordingRunner {
            dumpvars: "PRODUCT_OUT='out/target/product/vsoc_x86_64'\n\
                       SOONG_HOST_OUT='out/soong/host/linux-x86'\n\
                       HOST_OUT='out/host/linux-x86'\n"
                .to_string(),
            mappings: json!({ "pkg/a/TEST_MAPPING": { "presubmit": [{ "name": "mod_a" }] } })
                .to_string(),
            ..Default::default()
        });

        let outcome = run_build(&settings, runner.clone()).unwrap();
        assert_eq!(outcome.packaging_commands, 3);

        let argvs = runner.argvs();
        assert_eq!(argvs.len(), 4);
        assert_eq!(
            argvs[0][1..],
            [
                "--make-mode",
                "compatibility-host-util",
                "cts-tradefed",
                "mod_a",
                "soong_zip",
                "vts-tradefed",
            ]
        );
        assert!(argvs[1].contains(&top.join("out/dist/general-tests_configs.zip").to_string()));
        assert!(argvs[2].contains(&top.join("out/dist/general-tests_list.zip").to_string()));
        assert!(argvs[3].contains(&top.join("out/dist/general-tests.zip").to_string()));
        assert_eq!(
            fs::read_to_string(host_out.join("general-tests_list")).unwrap(),
            "host/testcases/mod_a/mod_a.config\n"
        );
    }
}
