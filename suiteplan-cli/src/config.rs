//! Configuration file loading for suiteplan.
//!
//! Discovers and loads `suiteplan.toml` from the source tree root.
//! Merges config file settings with CLI arguments (CLI takes precedence).

use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use fs_err as fs;
use serde::Deserialize;
use std::collections::BTreeMap;
use suiteplan_core::{BuildSettings, RegistryConfig};
use tracing::debug;

/// The config file name to search for.
pub const CONFIG_FILE_NAME: &str = "suiteplan.toml";

/// Top-level configuration from suiteplan.toml.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SuiteplanConfig {
    pub tools: ToolsConfig,
    pub test_mapping: TestMappingConfig,
    pub exclusion: ExclusionConfig,
}

/// Tool locations, relative to `TOP` unless absolute.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub build_engine: Option<Utf8PathBuf>,
    pub zip_tool: Option<Utf8PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TestMappingConfig {
    /// Program and arguments of the TEST_MAPPING resolver.
    pub command: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ExclusionConfig {
    /// Extra targets skipped when no scheduled test downloads them.
    pub targets: Vec<String>,

    /// Explicit output archives per target, replacing the naming convention.
    pub outputs: BTreeMap<String, Vec<String>>,
}

impl SuiteplanConfig {
    pub fn registry_config(&self) -> RegistryConfig {
        RegistryConfig {
            exclusion_targets: self.exclusion.targets.clone(),
            exclusion_outputs: self.exclusion.outputs.clone(),
        }
    }
}

/// Discover the suiteplan.toml config file under `top`.
pub fn discover_config(top: &Utf8Path) -> Option<Utf8PathBuf> {
    let config_path = top.join(CONFIG_FILE_NAME);
    if config_path.is_file() {
        debug!("found config file at {}", config_path);
        Some(config_path)
    } else {
        debug!("no config file found at {}", config_path);
        None
    }
}

pub fn load_config(path: &Utf8Path) -> anyhow::Result<SuiteplanConfig> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read config file {}", path))?;
    parse_config(&contents).with_context(|| format!("parse config file {}", path))
}

pub fn parse_config(contents: &str) -> anyhow::Result<SuiteplanConfig> {
    let config: SuiteplanConfig = toml::from_str(contents).context("invalid TOML")?;
    Ok(config)
}

/// Load the explicit config if given, else discover one under `top`, else defaults.
pub fn load_or_default(
    explicit: Option<&Utf8Path>,
    top: Option<&Utf8Path>,
) -> anyhow::Result<SuiteplanConfig> {
    if let Some(path) = explicit {
        return load_config(path);
    }
    match top.and_then(discover_config) {
        Some(path) => load_config(&path),
        None => Ok(SuiteplanConfig::default()),
    }
}

/// Values given on the command line. `None`/empty means "not given".
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub build_engine: Option<Utf8PathBuf>,
    pub zip_tool: Option<Utf8PathBuf>,
    pub test_mapping_command: Vec<String>,
    pub exclusion_targets: Vec<String>,
}

/// Builder for merging config file with CLI arguments.
pub struct ConfigMerger {
    config: SuiteplanConfig,
}

impl ConfigMerger {
    pub fn new(config: SuiteplanConfig) -> Self {
        Self { config }
    }

    /// Layer the file and then the CLI on top of `settings`.
    ///
    /// CLI exclusion targets extend the file's list; every other CLI value replaces it.
    pub fn merge(self, mut settings: BuildSettings, cli: &CliOverrides) -> BuildSettings {
        let mut registry = self.config.registry_config();
        for target in &cli.exclusion_targets {
            if !registry.exclusion_targets.contains(target) {
                registry.exclusion_targets.push(target.clone());
            }
        }
        settings.registry = registry;

        if let Some(engine) = cli.build_engine.clone().or(self.config.tools.build_engine) {
            settings.build_engine = engine;
        }
        if let Some(zip) = cli.zip_tool.clone().or(self.config.tools.zip_tool) {
            settings.zip_tool = zip;
        }
        settings.test_mapping_command = if cli.test_mapping_command.is_empty() {
            self.config.test_mapping.command
        } else {
            cli.test_mapping_command.clone()
        };
        settings
    }
}
