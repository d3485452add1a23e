//! Port traits for the external collaborators the planner consults.
//!
//! Production implementations shell out (see `suiteplan-core`); the in-memory versions here back
//! tests and embedders that already hold the answers.

use anyhow::bail;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// One test module declared in a TEST_MAPPING group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestMappingEntry {
    /// Module name. Entries without one are ignored.
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,

    /// Regexes over changed file paths. Empty means the module runs for any change.
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub file_patterns: Vec<String>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl TestMappingEntry {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            file_patterns: Vec::new(),
        }
    }

    pub fn with_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.file_patterns = patterns.into_iter().map(Into::into).collect();
        self
    }
}

/// `{mapping file: {group: [entry]}}` as returned by the resolver.
pub type TestMappings = BTreeMap<String, BTreeMap<String, Vec<TestMappingEntry>>>;

/// Resolves the TEST_MAPPING declarations reachable from a set of changed files.
pub trait TestMappingResolver {
    fn test_mappings(
        &self,
        changed_files: &BTreeSet<String>,
        scope: &BTreeSet<String>,
    ) -> anyhow::Result<TestMappings>;
}

/// Build-variable query interface of the build engine.
///
/// Implementations must fail if any requested variable is undefined.
pub trait BuildVariables {
    fn query(&self, names: &[&str]) -> anyhow::Result<BTreeMap<String, String>>;
}

/// Resolver returning a fixed answer regardless of input.
#[derive(Debug, Clone, Default)]
pub struct StaticTestMappings {
    mappings: TestMappings,
}

impl StaticTestMappings {
    pub fn new(mappings: TestMappings) -> Self {
        Self { mappings }
    }
}

impl TestMappingResolver for StaticTestMappings {
    fn test_mappings(
        &self,
        _changed_files: &BTreeSet<String>,
        _scope: &BTreeSet<String>,
    ) -> anyhow::Result<TestMappings> {
        Ok(self.mappings.clone())
    }
}

/// Build variables backed by a map.
#[derive(Debug, Clone, Default)]
pub struct StaticBuildVariables {
    vars: BTreeMap<String, String>,
}

impl StaticBuildVariables {
    pub fn new<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: vars
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl BuildVariables for StaticBuildVariables {
    fn query(&self, names: &[&str]) -> anyhow::Result<BTreeMap<String, String>> {
        let missing: Vec<&str> = names
            .iter()
            .copied()
            .filter(|n| !self.vars.contains_key(*n))
            .collect();
        if !missing.is_empty() {
            bail!("undefined build variables: {}", missing.join(", "));
        }
        Ok(names
            .iter()
            .filter_map(|n| self.vars.get(*n).map(|v| (n.to_string(), v.clone())))
            .collect())
    }
}
