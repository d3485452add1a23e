use serde::Deserialize;
use std::collections::BTreeSet;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawChangeInfo {
    changes: Vec<RawChange>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawChange {
    project_path: String,
    revisions: Vec<RawRevision>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawRevision {
    file_infos: Vec<RawFileInfo>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawFileInfo {
    path: String,
}

/// Files touched by the change under test, as repository-relative paths.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeInfo {
    changed_files: BTreeSet<String>,
}

impl ChangeInfo {
    /// Decode a changed-files manifest, flattening every revision of every project.
    pub fn from_json(s: &str) -> serde_json::Result<Self> {
        let raw: RawChangeInfo = serde_json::from_str(s)?;
        let mut changed_files = BTreeSet::new();
        for change in raw.changes {
            for revision in change.revisions {
                for file_info in revision.file_infos {
                    changed_files.insert(format!("{}/{}", change.project_path, file_info.path));
                }
            }
        }
        Ok(Self { changed_files })
    }

    pub fn from_files<I, S>(files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            changed_files: files.into_iter().map(Into::into).collect(),
        }
    }

    pub fn changed_files(&self) -> &BTreeSet<String> {
        &self.changed_files
    }
}
