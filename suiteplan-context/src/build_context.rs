use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeSet;

/// `extraOptions` keys whose values are artifact-download patterns.
///
/// A scheduled test only ever fetches files matched by one of these, so together they describe
/// every build output the test run can possibly consume.
pub const DOWNLOAD_OPTS: &[&str] = &[
    "test-config-only-zip",
    "test-zip-file-filter",
    "extra-host-shared-lib-zip",
    "sandbox-tests-zips",
    "additional-files-filter",
    "cts-package-name",
];

/// `extraOptions` key marking a test as driven by TEST_MAPPING groups.
pub const TEST_MAPPING_GROUP_OPT: &str = "test-mapping-test-group";

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawBuildContext {
    enabled_build_features: Vec<String>,
    test_context: RawTestContext,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawTestContext {
    test_infos: Vec<RawTestInfo>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawTestInfo {
    extra_options: Vec<RawExtraOption>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawExtraOption {
    key: Option<String>,
    values: Vec<String>,
}

/// Immutable view over the CI build-context document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildContext {
    enabled_build_features: BTreeSet<String>,
    test_infos: BTreeSet<TestInfo>,
}

impl BuildContext {
    /// Decode a build-context document. Missing keys default to empty.
    pub fn from_json(s: &str) -> serde_json::Result<Self> {
        let raw: RawBuildContext = serde_json::from_str(s)?;
        Ok(Self::from_raw(raw))
    }

    /// Same as [`BuildContext::from_json`] for an already parsed value.
    pub fn from_value(v: serde_json::Value) -> serde_json::Result<Self> {
        let raw: RawBuildContext = serde_json::from_value(v)?;
        Ok(Self::from_raw(raw))
    }

    /// A context with nothing enabled and nothing scheduled.
    pub fn empty() -> Self {
        Self::default()
    }

    fn from_raw(raw: RawBuildContext) -> Self {
        Self {
            enabled_build_features: raw.enabled_build_features.into_iter().collect(),
            test_infos: raw
                .test_context
                .test_infos
                .into_iter()
                .map(TestInfo::from_raw)
                .collect(),
        }
    }

    pub fn enabled_build_features(&self) -> &BTreeSet<String> {
        &self.enabled_build_features
    }

    pub fn is_feature_enabled(&self, flag: &str) -> bool {
        self.enabled_build_features.contains(flag)
    }

    pub fn test_infos(&self) -> impl Iterator<Item = &TestInfo> {
        self.test_infos.iter()
    }

    /// True if any scheduled test would download one of `target`'s outputs.
    pub fn build_target_used(&self, target: &str) -> bool {
        self.test_infos.iter().any(|t| t.build_target_used(target))
    }

    /// Every download pattern declared by every scheduled test.
    pub fn file_download_options(&self) -> BTreeSet<&str> {
        self.test_infos
            .iter()
            .flat_map(|t| t.file_download_options.iter().map(String::as_str))
            .collect()
    }
}

/// Metadata for one scheduled test invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct TestInfo {
    is_test_mapping: bool,
    test_mapping_test_groups: BTreeSet<String>,
    file_download_options: BTreeSet<String>,
}

impl TestInfo {
    fn from_raw(raw: RawTestInfo) -> Self {
        let mut info = Self::default();
        for opt in raw.extra_options {
            let Some(key) = opt.key.as_deref() else {
                continue;
            };

            if key == TEST_MAPPING_GROUP_OPT {
                info.is_test_mapping = true;
                info.test_mapping_test_groups
                    .extend(opt.values.iter().cloned());
            }

            if DOWNLOAD_OPTS.contains(&key) {
                info.file_download_options.extend(opt.values);
            }
        }
        info
    }

    pub fn is_test_mapping(&self) -> bool {
        self.is_test_mapping
    }

    pub fn test_mapping_test_groups(&self) -> &BTreeSet<String> {
        &self.test_mapping_test_groups
    }

    pub fn file_download_options(&self) -> &BTreeSet<String> {
        &self.file_download_options
    }

    /// Whether `target` appears as a whole word in one of this test's download patterns.
    ///
    /// Approximates "would this test's artifact filter capture the target's output".
    pub fn build_target_used(&self, target: &str) -> bool {
        let pattern = format!(r"\b(?:{})\b", regex::escape(target));
        let Ok(re) = Regex::new(&pattern) else {
            // An escaped literal always compiles; keep the target if it somehow does not.
            return true;
        };
        self.file_download_options.iter().any(|opt| re.is_match(opt))
    }
}
