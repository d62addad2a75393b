//! Reconcile tracked manifest groups with a freshly generated tree.

use crate::manifest::diff::{diff_directory, DiffError, DiffResult};
use crate::manifest::document::ManifestError;
use crate::manifest::{ProjectManifest, TargetHandle};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("target '{name}' not found in manifest{}", did_you_mean(.suggestion))]
    TargetNotFound {
        name: String,
        suggestion: Option<String>,
    },

    #[error(transparent)]
    Diff(#[from] DiffError),

    #[error(transparent)]
    Manifest(#[from] ManifestError),
}

fn did_you_mean(suggestion: &Option<String>) -> String {
    suggestion
        .as_ref()
        .map(|s| format!(" (did you mean '{s}'?)"))
        .unwrap_or_default()
}

/// A build-output subtree and the manifest prefix it is mirrored under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedGroup {
    /// Directory relative to the build-output root.
    pub source: String,
    /// Manifest path prefix, without trailing slash.
    pub prefix: String,
}

impl TrackedGroup {
    pub fn new(source: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            prefix: prefix.into(),
        }
    }

    /// Classes, Libraries, Data and Frameworks under `project_name`.
    pub fn defaults(project_name: &str) -> Vec<TrackedGroup> {
        vec![
            Self::new("Classes", format!("{project_name}/Unity/Classes")),
            Self::new("Libraries", format!("{project_name}/Unity/Libraries")),
            Self::new("Data", format!("{project_name}/Data")),
            Self::new("Frameworks", format!("{project_name}/Frameworks")),
        ]
    }

    fn prefix_dir(&self) -> &str {
        self.prefix.trim_end_matches('/')
    }

    fn manifest_path(&self, relative: &str) -> String {
        format!("{}/{}", self.prefix_dir(), relative)
    }

    fn source_root(&self, build_root: &Path) -> std::path::PathBuf {
        self.source
            .split('/')
            .filter(|part| !part.is_empty())
            .fold(build_root.to_path_buf(), |path, part| path.join(part))
    }
}

/// What one group sync added and removed, as full manifest paths.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GroupReport {
    pub source: String,
    pub prefix: String,
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

impl GroupReport {
    pub fn is_unchanged(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

pub fn resolve_target<M>(manifest: &M, name: &str) -> Result<TargetHandle, SyncError>
where
    M: ProjectManifest + ?Sized,
{
    manifest
        .target_handle(name)
        .ok_or_else(|| SyncError::TargetNotFound {
            name: name.to_string(),
            suggestion: closest_name(name, &manifest.target_names()),
        })
}

fn closest_name(name: &str, candidates: &[String]) -> Option<String> {
    candidates
        .iter()
        .map(|candidate| (strsim::jaro_winkler(name, candidate), candidate))
        .filter(|(score, _)| *score >= 0.8)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, candidate)| candidate.clone())
}

/// Diff a group without touching the manifest.
pub fn plan_group<M>(
    manifest: &M,
    group: &TrackedGroup,
    build_root: &Path,
) -> Result<DiffResult, SyncError>
where
    M: ProjectManifest + ?Sized,
{
    let dir = format!("{}/", group.prefix_dir());
    let tracked: BTreeSet<String> = manifest
        .tracked_paths(group.prefix_dir())
        .into_iter()
        .filter_map(|path| path.strip_prefix(&dir).map(str::to_string))
        .collect();

    Ok(diff_directory(&group.source_root(build_root), &tracked)?)
}

/// Add references for new files and drop references for vanished ones.
///
/// The diff is computed before the first mutation.
pub fn sync_group<M>(
    manifest: &mut M,
    target_name: &str,
    group: &TrackedGroup,
    build_root: &Path,
) -> Result<GroupReport, SyncError>
where
    M: ProjectManifest + ?Sized,
{
    let target = resolve_target(&*manifest, target_name)?;
    let diff = plan_group(&*manifest, group, build_root)?;

    let mut report = GroupReport {
        source: group.source.clone(),
        prefix: group.prefix.clone(),
        ..GroupReport::default()
    };

    for relative in &diff.new {
        let path = group.manifest_path(relative);
        if manifest.contains_path(&path) {
            continue;
        }
        manifest.add_file(&path, &target)?;
        info!(group = %group.source, %path, "added file reference");
        report.added.push(path);
    }

    for relative in &diff.stale {
        let path = group.manifest_path(relative);
        let Some(file) = manifest.find_file(&path) else {
            continue;
        };
        if manifest.remove_file(&file)? {
            info!(group = %group.source, %path, "removed file reference");
            report.removed.push(path);
        }
    }

    if report.is_unchanged() {
        debug!(group = %group.source, "group already in sync");
    }
    Ok(report)
}

/// Sync each group in order. Groups finished before an error keep their changes.
pub fn sync_groups<M>(
    manifest: &mut M,
    target_name: &str,
    groups: &[TrackedGroup],
    build_root: &Path,
) -> Result<Vec<GroupReport>, SyncError>
where
    M: ProjectManifest + ?Sized,
{
    groups
        .iter()
        .map(|group| sync_group(&mut *manifest, target_name, group, build_root))
        .collect()
}
