mod config;
mod render;

use anyhow::Context;
use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use config::{CliOverrides, ConfigMerger};
use std::collections::BTreeMap;
use std::process::ExitCode;
use std::sync::Arc;
use suiteplan_core::adapters::ProcessRunner;
use suiteplan_core::{BuildSettings, ToolError};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "suiteplan",
    version,
    about = "Plan, build and package CI test-suite targets from a build context."
)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Plan, invoke the build engine, then package the planned archives.
    Build(RunArgs),
    /// Show what would be built and packaged, without running anything.
    Plan(PlanArgs),
    /// List the targets that have an optimizer and the flag enabling each.
    ListOptimizers(ListArgs),
}

#[derive(Debug, Parser)]
struct RunArgs {
    /// Build targets requested by CI.
    targets: Vec<String>,

    /// Build-context JSON document.
    #[arg(long, env = "BUILD_CONTEXT")]
    build_context: Option<Utf8PathBuf>,

    /// Changed-files manifest.
    #[arg(long, env = "CHANGE_INFO")]
    change_info: Option<Utf8PathBuf>,

    /// Directory archives are written to (default: $TOP/out/dist).
    #[arg(long, env = "DIST_DIR")]
    dist_dir: Option<Utf8PathBuf>,

    /// Config file (default: $TOP/suiteplan.toml if present).
    #[arg(long, env = "SUITEPLAN_CONFIG")]
    config: Option<Utf8PathBuf>,

    /// Build engine entry point, relative to $TOP unless absolute.
    #[arg(long)]
    build_engine: Option<Utf8PathBuf>,

    /// Zip tool, relative to $TOP unless absolute.
    #[arg(long)]
    zip_tool: Option<Utf8PathBuf>,

    /// TEST_MAPPING resolver command line, split on whitespace.
    #[arg(long)]
    test_mapping_command: Option<String>,

    /// Extra target handled by the unused-target exclusion optimizer.
    #[arg(long = "exclude-target")]
    exclude_targets: Vec<String>,
}

#[derive(Debug, Parser)]
struct PlanArgs {
    #[command(flatten)]
    run: RunArgs,

    /// Output format (text, json).
    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,
}

#[derive(Debug, Parser)]
struct ListArgs {
    /// Config file (default: $TOP/suiteplan.toml if present).
    #[arg(long, env = "SUITEPLAN_CONFIG")]
    config: Option<Utf8PathBuf>,

    /// Output format (text, json).
    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.cmd {
        Command::Build(args) => cmd_build(args),
        Command::Plan(args) => cmd_plan(args),
        Command::ListOptimizers(args) => cmd_list_optimizers(args),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::from(u8::try_from(e.exit_code()).unwrap_or(1))
        }
    }
}

fn process_env() -> BTreeMap<String, String> {
    std::env::vars().collect()
}

/// Environment first, then the config file, then explicit flags.
fn settings_from(args: RunArgs) -> Result<BuildSettings, ToolError> {
    let mut settings = BuildSettings::from_env(&process_env())?;

    let file_config = config::load_or_default(args.config.as_deref(), Some(settings.top.as_path()))
        .context("load suiteplan.toml config")?;
    let cli = CliOverrides {
        build_engine: args.build_engine,
        zip_tool: args.zip_tool,
        test_mapping_command: args
            .test_mapping_command
            .as_deref()
            .map(|c| c.split_whitespace().map(String::from).collect())
            .unwrap_or_default(),
        exclusion_targets: args.exclude_targets,
    };
    settings = ConfigMerger::new(file_config).merge(settings, &cli);

    if let Some(ctx) = args.build_context {
        settings.build_context = Some(ctx);
    }
    if let Some(change) = args.change_info {
        settings.change_info = Some(change);
    }
    if let Some(dist) = args.dist_dir {
        settings.dist_dir = dist;
    }
    settings.targets = args.targets;
    Ok(settings)
}

fn cmd_build(args: RunArgs) -> Result<(), ToolError> {
    let settings = settings_from(args)?;
    let outcome = suiteplan_core::run_build(&settings, Arc::new(ProcessRunner))?;
    info!(
        build_targets = outcome.plan.build_targets.len(),
        packaging_commands = outcome.packaging_commands,
        build_skipped = outcome.build_skipped,
        "done"
    );
    Ok(())
}

fn cmd_plan(args: PlanArgs) -> Result<(), ToolError> {
    let settings = settings_from(args.run)?;
    let plan = suiteplan_core::run_plan(&settings, Arc::new(ProcessRunner))?;
    let report = plan.report();
    match args.format {
        OutputFormat::Text => print!("{}", render::plan_text(&report)),
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&report).context("serialize plan")?
        ),
    }
    Ok(())
}

fn cmd_list_optimizers(args: ListArgs) -> Result<(), ToolError> {
    let top = std::env::var("TOP").ok().map(Utf8PathBuf::from);
    let file_config = config::load_or_default(args.config.as_deref(), top.as_deref())
        .context("load suiteplan.toml config")?;
    let registry = suiteplan_domain::builtin_registry(&file_config.registry_config());

    match args.format {
        OutputFormat::Text => print!("{}", render::optimizers_text(&registry)),
        OutputFormat::Json => {
            let entries: Vec<_> = registry
                .targets()
                .map(|(target, flag)| {
                    serde_json::json!({
                        "target": target,
                        "enabled_flag": flag,
                    })
                })
                .collect();
            println!(
                "{}",
                serde_json::to_string_pretty(&entries).context("serialize optimizers")?
            );
        }
    }
    Ok(())
}
