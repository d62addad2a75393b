//! Project manifest reconciliation.
//!
//! The IDE project is only ever touched through [`ProjectManifest`]: list the
//! paths tracked under a prefix, look a path up, add or remove a file
//! reference, resolve a build target. [`ManifestDocument`] is the bundled
//! implementation; anything else that can answer those questions can be
//! synced the same way.

pub mod diff;
pub mod document;
pub mod sync;

pub use diff::{diff_directory, is_backup_file, relative_files, DiffError, DiffResult};
pub use document::{ManifestDocument, ManifestError};
pub use sync::{
    plan_group, resolve_target, sync_group, sync_groups, GroupReport, SyncError, TrackedGroup,
};

use serde::Serialize;
use std::fmt;

/// Opaque id of a build target inside the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct TargetHandle(pub String);

/// Opaque id of a file reference inside the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct FileRef(pub String);

impl fmt::Display for TargetHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for FileRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The operations manifest sync needs from a project description.
///
/// Paths are project-relative and `/`-separated.
pub trait ProjectManifest {
    /// Resolve a build target by its name.
    fn target_handle(&self, name: &str) -> Option<TargetHandle>;

    /// Names of every build target, for diagnostics.
    fn target_names(&self) -> Vec<String>;

    /// Every tracked file path that lives under `prefix/`.
    fn tracked_paths(&self, prefix: &str) -> Vec<String>;

    fn find_file(&self, path: &str) -> Option<FileRef>;

    fn contains_path(&self, path: &str) -> bool {
        self.find_file(path).is_some()
    }

    /// Add a file reference and attach it to `target`'s build.
    fn add_file(&mut self, path: &str, target: &TargetHandle) -> Result<FileRef, ManifestError>;

    /// Remove a file reference. Returns `false` if it was not present.
    fn remove_file(&mut self, file: &FileRef) -> Result<bool, ManifestError>;
}
