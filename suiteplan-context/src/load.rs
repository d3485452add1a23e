use crate::{BuildContext, ChangeInfo};
use camino::Utf8Path;
use fs_err as fs;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ContextLoadError {
    #[error("io error reading {path}: {message}")]
    Io { path: String, message: String },

    #[error("failed to decode JSON file {path}: {message}")]
    Json { path: String, message: String },
}

/// Load the build context, or an empty one when no file is available.
///
/// An unset path or a path that is not a regular file means "no context": nothing is optimized.
/// A file that exists but does not decode is an error.
pub fn load_build_context(path: Option<&Utf8Path>) -> Result<BuildContext, ContextLoadError> {
    let Some(path) = path.filter(|p| p.is_file()) else {
        info!("no build context file, using an empty build context");
        return Ok(BuildContext::empty());
    };

    let contents = read(path)?;
    let ctx = BuildContext::from_json(&contents).map_err(|e| ContextLoadError::Json {
        path: path.to_string(),
        message: e.to_string(),
    })?;

    debug!(
        path = %path,
        features = ?ctx.enabled_build_features(),
        test_infos = ctx.test_infos().count(),
        "loaded build context"
    );
    Ok(ctx)
}

/// Load the changed-files manifest if one is available.
///
/// `None` means the diff is unknown, which callers must treat as "everything may have changed".
pub fn load_change_info(path: Option<&Utf8Path>) -> Result<Option<ChangeInfo>, ContextLoadError> {
    let Some(path) = path else {
        debug!("no changed-files manifest configured");
        return Ok(None);
    };

    if !path.is_file() {
        warn!(path = %path, "changed-files manifest not found, treating diff as unknown");
        return Ok(None);
    }

    let contents = read(path)?;
    let info = ChangeInfo::from_json(&contents).map_err(|e| ContextLoadError::Json {
        path: path.to_string(),
        message: e.to_string(),
    })?;

    debug!(path = %path, files = info.changed_files().len(), "loaded changed-files manifest");
    Ok(Some(info))
}

fn read(path: &Utf8Path) -> Result<String, ContextLoadError> {
    fs::read_to_string(path).map_err(|e| ContextLoadError::Io {
        path: path.to_string(),
        message: e.to_string(),
    })
}
