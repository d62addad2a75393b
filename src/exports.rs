//! `Exports.xcconfig` generation.
//!
//! The host project includes this file to learn which Unity runtime produced
//! the embedded export and where that export lives on disk.

use crate::rewrite::atomic_write;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

pub const EXPORTS_FILE_NAME: &str = "Exports.xcconfig";

#[derive(Error, Debug)]
pub enum ExportsError {
    #[error("failed to create {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExportsOutcome {
    Written { file: PathBuf },
    Unchanged { file: PathBuf },
}

impl ExportsOutcome {
    pub fn file(&self) -> &Path {
        match self {
            ExportsOutcome::Written { file } | ExportsOutcome::Unchanged { file } => file,
        }
    }
}

pub fn render_exports(unity_version: &str, export_path: &Path) -> String {
    format!(
        "UNITY_RUNTIME_VERSION = {};\nUNITY_IOS_EXPORT_PATH = {};\n",
        unity_version.trim(),
        export_path.display()
    )
}

/// Write the exports file at `path`, creating parent directories.
///
/// Identical content is left alone so the host project is not rebuilt.
pub fn write_exports(
    path: &Path,
    unity_version: &str,
    export_path: &Path,
) -> Result<ExportsOutcome, ExportsError> {
    let content = render_exports(unity_version, export_path);

    if fs::read(path).is_ok_and(|existing| existing == content.as_bytes()) {
        debug!(file = %path.display(), "exports unchanged");
        return Ok(ExportsOutcome::Unchanged {
            file: path.to_path_buf(),
        });
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| ExportsError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    atomic_write(path, content.as_bytes()).map_err(|source| ExportsError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    info!(file = %path.display(), version = unity_version.trim(), "wrote exports");

    Ok(ExportsOutcome::Written {
        file: path.to_path_buf(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render() {
        let text = render_exports(" 2017.4.1f1\n", Path::new("/builds/ios"));
        assert_eq!(
            text,
            "UNITY_RUNTIME_VERSION = 2017.4.1f1;\nUNITY_IOS_EXPORT_PATH = /builds/ios;\n"
        );
    }

    #[test]
    fn test_write_then_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Demo").join("Unity").join(EXPORTS_FILE_NAME);

        let first = write_exports(&path, "2018.2.0f2", Path::new("/tmp/export")).unwrap();
        assert!(matches!(first, ExportsOutcome::Written { .. }));
        assert!(fs::read_to_string(&path)
            .unwrap()
            .contains("UNITY_RUNTIME_VERSION = 2018.2.0f2;"));

        let second = write_exports(&path, "2018.2.0f2", Path::new("/tmp/export")).unwrap();
        assert!(matches!(second, ExportsOutcome::Unchanged { .. }));

        let third = write_exports(&path, "2018.3.0f1", Path::new("/tmp/export")).unwrap();
        assert!(matches!(third, ExportsOutcome::Written { .. }));
        assert_eq!(third.file(), path.as_path());
    }
}
