//! Directory diff between a generated tree and tracked manifest paths.

use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

use crate::rewrite::BACKUP_SUFFIX;

#[derive(Error, Debug)]
pub enum DiffError {
    #[error("failed to walk {root}: {source}")]
    Walk {
        root: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

/// Relative paths (`/`-separated) to add and to prune.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiffResult {
    pub new: BTreeSet<String>,
    pub stale: BTreeSet<String>,
}

impl DiffResult {
    pub fn is_empty(&self) -> bool {
        self.new.is_empty() && self.stale.is_empty()
    }
}

/// `true` for rewrite backups such as `main.mm.bak` or `Foo.BAK`.
pub fn is_backup_file(path: &str) -> bool {
    let suffix = BACKUP_SUFFIX.len();
    path.len() >= suffix
        && path
            .get(path.len() - suffix..)
            .is_some_and(|tail| tail.eq_ignore_ascii_case(BACKUP_SUFFIX))
}

/// Every file under `root`, relative to it. A missing root yields nothing.
pub fn relative_files(root: &Path) -> Result<BTreeSet<String>, DiffError> {
    let mut files = BTreeSet::new();
    if !root.is_dir() {
        return Ok(files);
    }

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|source| DiffError::Walk {
            root: root.to_path_buf(),
            source,
        })?;
        if entry.file_type().is_dir() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        files.insert(join_components(relative));
    }

    Ok(files)
}

fn join_components(relative: &Path) -> String {
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Compare the files under `source_root` with `tracked`.
///
/// Backups are never reported as new. Paths compare case-sensitively.
pub fn diff_directory(
    source_root: &Path,
    tracked: &BTreeSet<String>,
) -> Result<DiffResult, DiffError> {
    let source = relative_files(source_root)?;

    let new = source
        .iter()
        .filter(|path| !tracked.contains(*path) && !is_backup_file(path))
        .cloned()
        .collect();
    let stale = tracked
        .iter()
        .filter(|path| !source.contains(*path))
        .cloned()
        .collect();

    Ok(DiffResult { new, stale })
}
