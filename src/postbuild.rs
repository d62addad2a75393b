//! The post-build pass: patch the export, write exports, sync the manifest.

use crate::catalog::{PatchCatalog, PatchError, PatchOutcome};
use crate::config::{PostBuildConfig, ValidationError};
use crate::exports::{write_exports, ExportsError, ExportsOutcome};
use crate::manifest::{
    plan_group, resolve_target, sync_groups, DiffResult, GroupReport, ManifestDocument,
    ManifestError, SyncError,
};
use crate::rewrite::{restore_backup, RewriteError};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use tracing::{error, info};

/// Build platform reported by the caller. Only iOS exports are processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Ios,
    Tvos,
    Android,
    Standalone,
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ios" | "iphone" => Ok(Platform::Ios),
            "tvos" | "appletv" => Ok(Platform::Tvos),
            "android" => Ok(Platform::Android),
            "standalone" | "desktop" => Ok(Platform::Standalone),
            other => Err(format!(
                "unknown platform '{other}' (expected ios, tvos, android or standalone)"
            )),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Platform::Ios => "ios",
            Platform::Tvos => "tvos",
            Platform::Android => "android",
            Platform::Standalone => "standalone",
        };
        f.write_str(name)
    }
}

/// One finished native build.
#[derive(Debug, Clone)]
pub struct BuildRequest {
    pub build_dir: PathBuf,
    pub platform: Platform,
    pub unity_version: String,
}

#[derive(Error, Debug)]
pub enum PostBuildError {
    #[error("invalid configuration:\n{0}")]
    InvalidConfig(#[from] ValidationError),

    #[error("rule '{rule}' failed: {source}")]
    Patch {
        rule: &'static str,
        #[source]
        source: PatchError,
    },

    #[error(transparent)]
    Exports(#[from] ExportsError),

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Restore(#[from] RewriteError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleReport {
    pub rule: &'static str,
    #[serde(flatten)]
    pub outcome: PatchOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub manifest: PathBuf,
    pub groups: Vec<GroupReport>,
    pub saved: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupPlan {
    pub source: String,
    pub prefix: String,
    #[serde(flatten)]
    pub diff: DiffResult,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PassReport {
    Skipped {
        reason: String,
    },
    Completed {
        rules: Vec<RuleReport>,
        exports: ExportsOutcome,
        sync: SyncReport,
    },
}

/// Apply every catalog rule to the export.
///
/// All rules run; if any failed, the first failure is returned after the
/// others have been logged.
pub fn patch_export(
    catalog: &PatchCatalog,
    build_dir: &Path,
    unity_version: &str,
    marker: &str,
) -> Result<Vec<RuleReport>, PostBuildError> {
    let mut reports = Vec::new();
    let mut first_error = None;

    for (rule, result) in catalog.apply(build_dir, unity_version, marker) {
        match result {
            Ok(outcome) => reports.push(RuleReport { rule, outcome }),
            Err(source) => {
                error!(rule, error = %source, "rule failed");
                if first_error.is_none() {
                    first_error = Some(PostBuildError::Patch { rule, source });
                }
            }
        }
    }

    match first_error {
        Some(err) => Err(err),
        None => Ok(reports),
    }
}

/// Sync every configured group into the manifest and save it if it changed.
///
/// Groups finished before a failure stay in the saved manifest.
pub fn sync_project(
    config: &PostBuildConfig,
    build_dir: &Path,
) -> Result<SyncReport, PostBuildError> {
    let path = config.manifest_path();
    let mut manifest = ManifestDocument::load(&path)?;

    let result = sync_groups(
        &mut manifest,
        config.target_name(),
        &config.groups(),
        build_dir,
    );

    let saved = manifest.is_dirty();
    if saved {
        manifest.save()?;
        info!(manifest = %path.display(), "saved manifest");
    }

    Ok(SyncReport {
        manifest: path,
        groups: result?,
        saved,
    })
}

/// Pending manifest changes per group; nothing is written.
pub fn plan_project(
    config: &PostBuildConfig,
    build_dir: &Path,
) -> Result<Vec<GroupPlan>, PostBuildError> {
    let manifest = ManifestDocument::load(config.manifest_path())?;
    resolve_target(&manifest, config.target_name())?;

    config
        .groups()
        .into_iter()
        .map(|group| -> Result<GroupPlan, PostBuildError> {
            let diff = plan_group(&manifest, &group, build_dir)?;
            Ok(GroupPlan {
                source: group.source,
                prefix: group.prefix,
                diff,
            })
        })
        .collect()
}

/// Put every rule target's backup back in place. Returns the restored files.
pub fn restore_export(
    catalog: &PatchCatalog,
    build_dir: &Path,
) -> Result<Vec<PathBuf>, PostBuildError> {
    let mut restored = Vec::new();
    for target in catalog.targets(build_dir) {
        if restore_backup(&target)? {
            info!(file = %target.display(), "restored backup");
            restored.push(target);
        }
    }
    Ok(restored)
}

/// Run the whole pass for one build.
pub fn run_post_build(
    config: &PostBuildConfig,
    request: &BuildRequest,
) -> Result<PassReport, PostBuildError> {
    if !config.enabled {
        info!("post-build processing disabled");
        return Ok(PassReport::Skipped {
            reason: "post-build processing is disabled".to_string(),
        });
    }
    if request.platform != Platform::Ios {
        info!(platform = %request.platform, "not an iOS build");
        return Ok(PassReport::Skipped {
            reason: format!("platform {} is not ios", request.platform),
        });
    }
    config.validate()?;

    info!(
        build_dir = %request.build_dir.display(),
        version = request.unity_version.trim(),
        project = %config.project_name,
        "running post-build pass"
    );

    let rules = patch_export(
        &PatchCatalog::builtin(),
        &request.build_dir,
        &request.unity_version,
        &config.marker,
    )?;
    let exports = write_exports(
        &config.exports_path(),
        &request.unity_version,
        &request.build_dir,
    )?;
    let sync = sync_project(config, &request.build_dir)?;

    Ok(PassReport::Completed {
        rules,
        exports,
        sync,
    })
}
