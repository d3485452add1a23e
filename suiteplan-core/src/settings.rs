//! Clap-free settings for the plan and build pipelines.

use crate::pipeline::ToolError;
use camino::{Utf8Path, Utf8PathBuf};
use std::collections::BTreeMap;
use suiteplan_domain::RegistryConfig;

/// Variables every invocation needs from the CI environment.
pub const REQUIRED_ENV_VARS: &[&str] = &["TARGET_PRODUCT", "TARGET_RELEASE", "TOP"];

pub const DEFAULT_BUILD_ENGINE: &str = "build/soong/soong_ui.bash";
pub const DEFAULT_ZIP_TOOL: &str = "prebuilts/build-tools/linux-x86/bin/soong_zip";

/// Settings for one plan or build invocation.
#[derive(Debug, Clone)]
pub struct BuildSettings {
    /// Source tree root (`$TOP`).
    pub top: Utf8PathBuf,
    pub dist_dir: Utf8PathBuf,
    pub build_context: Option<Utf8PathBuf>,
    pub change_info: Option<Utf8PathBuf>,

    // Tools, relative to `top` unless absolute.
    pub build_engine: Utf8PathBuf,
    pub zip_tool: Utf8PathBuf,

    /// Program plus arguments answering TEST_MAPPING queries. Empty disables the lookup.
    pub test_mapping_command: Vec<String>,

    pub registry: RegistryConfig,

    /// Targets requested on the command line.
    pub targets: Vec<String>,
}

impl BuildSettings {
    /// Settings rooted at `top` with every optional input unset.
    pub fn new(top: impl Into<Utf8PathBuf>) -> Self {
        let top = top.into();
        Self {
            dist_dir: top.join("out").join("dist"),
            top,
            build_context: None,
            change_info: None,
            build_engine: Utf8PathBuf::from(DEFAULT_BUILD_ENGINE),
            zip_tool: Utf8PathBuf::from(DEFAULT_ZIP_TOOL),
            test_mapping_command: Vec::new(),
            registry: RegistryConfig::default(),
            targets: Vec::new(),
        }
    }

    /// Read `TOP`, `DIST_DIR`, `BUILD_CONTEXT` and `CHANGE_INFO` from `env`.
    ///
    /// Fails with [`ToolError::MissingEnv`] unless all of [`REQUIRED_ENV_VARS`] are set.
    pub fn from_env(env: &BTreeMap<String, String>) -> Result<Self, ToolError> {
        check_required_env(env)?;
        let top = env
            .get("TOP")
            .map(Utf8PathBuf::from)
            .ok_or_else(|| ToolError::MissingEnv {
                vars: vec!["TOP".to_string()],
            })?;

        let mut settings = Self::new(top);
        if let Some(dist) = non_empty(env, "DIST_DIR") {
            settings.dist_dir = Utf8PathBuf::from(dist);
        }
        settings.build_context = non_empty(env, "BUILD_CONTEXT").map(Utf8PathBuf::from);
        settings.change_info = non_empty(env, "CHANGE_INFO").map(Utf8PathBuf::from);
        Ok(settings)
    }

    pub fn build_engine_path(&self) -> Utf8PathBuf {
        under_top(&self.top, &self.build_engine)
    }

    pub fn zip_tool_path(&self) -> Utf8PathBuf {
        under_top(&self.top, &self.zip_tool)
    }
}

/// Report every unset or empty required variable at once, sorted by name.
pub fn check_required_env(env: &BTreeMap<String, String>) -> Result<(), ToolError> {
    let mut missing: Vec<String> = REQUIRED_ENV_VARS
        .iter()
        .filter(|name| non_empty(env, name).is_none())
        .map(|name| name.to_string())
        .collect();
    if missing.is_empty() {
        return Ok(());
    }
    missing.sort();
    Err(ToolError::MissingEnv { vars: missing })
}

fn non_empty<'a>(env: &'a BTreeMap<String, String>, name: &str) -> Option<&'a str> {
    env.get(name).map(String::as_str).filter(|v| !v.is_empty())
}

fn under_top(top: &Utf8Path, path: &Utf8Path) -> Utf8PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        top.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn env(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn missing_vars_are_reported_together_and_sorted() {
        let err = check_required_env(&env(&[("TARGET_PRODUCT", "aosp_x86_64")])).unwrap_err();
        match err {
            ToolError::MissingEnv { vars } => assert_eq!(vars, vec!["TARGET_RELEASE", "TOP"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn empty_value_counts_as_missing() {
        let err = check_required_env(&env(&[
            ("TARGET_PRODUCT", "p"),
            ("TARGET_RELEASE", ""),
            ("TOP", "/top"),
        ]))
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Missing required environment variables: TARGET_RELEASE"
        );
    }

    #[test]
    fn dist_dir_defaults_under_top() {
        let settings = BuildSettings::from_env(&env(&[
            ("TARGET_PRODUCT", "p"),
            ("TARGET_RELEASE", "r"),
            ("TOP", "/src"),
        ]))
        .unwrap();
        assert_eq!(settings.dist_dir, Utf8PathBuf::from("/src/out/dist"));
        assert_eq!(settings.build_context, None);
        assert_eq!(
            settings.build_engine_path(),
            Utf8PathBuf::from("/src/build/soong/soong_ui.bash")
        );
    }

    #[test]
    fn optional_paths_come_from_env() {
        let settings = BuildSettings::from_env(&env(&[
            ("TARGET_PRODUCT", "p"),
            ("TARGET_RELEASE", "r"),
            ("TOP", "/src"),
            ("DIST_DIR", "/dist"),
            ("BUILD_CONTEXT", "/ctx.json"),
            ("CHANGE_INFO", "/change.json"),
        ]))
        .unwrap();
        assert_eq!(settings.dist_dir, Utf8PathBuf::from("/dist"));
        assert_eq!(settings.build_context, Some(Utf8PathBuf::from("/ctx.json")));
        assert_eq!(settings.change_info, Some(Utf8PathBuf::from("/change.json")));
    }

    #[test]
    fn absolute_tool_path_is_kept() {
        let mut settings = BuildSettings::new("/src");
        settings.zip_tool = Utf8PathBuf::from("/usr/bin/soong_zip");
        assert_eq!(settings.zip_tool_path(), Utf8PathBuf::from("/usr/bin/soong_zip"));
    }
}
