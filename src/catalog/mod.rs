//! Patch catalog - applies the built-in rules to a build-output tree
//!
//! This module provides rule application that:
//! - Filters rules by the reported Unity version
//! - Skips rules whose target file is absent from this export
//! - Rewrites targets through the backup-preserving line rewriter
//! - Reports a result for each rule, including read-only checks

pub mod rules;
pub mod version;

pub use rules::{PatchRule, RuleAction, RuleTransform, BUILTIN_RULES, DEFAULT_MARKER};
pub use version::{Applicability, UnityVersion, VersionError};

use crate::rewrite::{rewrite_file, rewrite_str, same_lines, RewriteError, RewriteOutcome};
use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Result of applying a single rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
#[must_use = "PatchOutcome should be checked"]
pub enum PatchOutcome {
    /// Rule changed the file (or would, for a check)
    Applied { file: PathBuf },
    /// File already carried the patch; content unchanged
    AlreadyApplied { file: PathBuf },
    /// Rule does not apply to this version
    SkippedVersion { reason: String },
    /// Target file is not part of this export
    SkippedMissing { file: PathBuf },
}

impl fmt::Display for PatchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatchOutcome::Applied { file } => write!(f, "Applied to {}", file.display()),
            PatchOutcome::AlreadyApplied { file } => {
                write!(f, "Already applied to {}", file.display())
            }
            PatchOutcome::SkippedVersion { reason } => write!(f, "Skipped (version): {}", reason),
            PatchOutcome::SkippedMissing { file } => {
                write!(f, "Skipped (missing): {}", file.display())
            }
        }
    }
}

#[derive(Error, Debug)]
pub enum PatchError {
    #[error("version error: {0}")]
    Version(#[from] VersionError),

    #[error("rewrite error: {0}")]
    Rewrite(#[from] RewriteError),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type RuleResults = Vec<(&'static str, Result<PatchOutcome, PatchError>)>;

/// The set of rules applied to every export.
#[derive(Debug, Clone)]
pub struct PatchCatalog {
    rules: Vec<PatchRule>,
}

impl Default for PatchCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PatchCatalog {
    pub fn builtin() -> Self {
        Self {
            rules: BUILTIN_RULES.to_vec(),
        }
    }

    pub fn with_rules(rules: Vec<PatchRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[PatchRule] {
        &self.rules
    }

    /// Absolute paths of every rule target under `build_root`.
    pub fn targets(&self, build_root: &Path) -> Vec<PathBuf> {
        self.rules
            .iter()
            .map(|rule| target_path(build_root, rule))
            .collect()
    }

    /// Apply every rule to the export at `build_root`.
    ///
    /// Rules are independent: a failure in one does not stop the others.
    pub fn apply(&self, build_root: &Path, version: &str, marker: &str) -> RuleResults {
        self.rules
            .iter()
            .map(|rule| (rule.id, apply_rule(rule, build_root, version, marker)))
            .collect()
    }

    /// Evaluate every rule without touching the file system.
    ///
    /// Mirrors [`PatchCatalog::apply`]: `Applied` means "would change".
    pub fn check(&self, build_root: &Path, version: &str, marker: &str) -> RuleResults {
        self.rules
            .iter()
            .map(|rule| (rule.id, check_rule(rule, build_root, version, marker)))
            .collect()
    }
}

fn target_path(build_root: &Path, rule: &PatchRule) -> PathBuf {
    rule.target
        .split('/')
        .fold(build_root.to_path_buf(), |path, part| path.join(part))
}

fn version_gate(rule: &PatchRule, version: &str) -> Result<Option<PatchOutcome>, PatchError> {
    if rule.applicability.evaluate(version)? {
        return Ok(None);
    }
    let reason = format!(
        "Unity {} does not satisfy {}",
        version.trim(),
        rule.applicability
    );
    debug!(rule = rule.id, %reason, "skipping rule");
    Ok(Some(PatchOutcome::SkippedVersion { reason }))
}

fn apply_rule(
    rule: &PatchRule,
    build_root: &Path,
    version: &str,
    marker: &str,
) -> Result<PatchOutcome, PatchError> {
    if let Some(skipped) = version_gate(rule, version)? {
        return Ok(skipped);
    }

    let path = target_path(build_root, rule);
    match rewrite_file(&path, rule.transform(marker))? {
        RewriteOutcome::Missing { file } => {
            debug!(rule = rule.id, file = %file.display(), "target not in export");
            Ok(PatchOutcome::SkippedMissing { file })
        }
        RewriteOutcome::Rewritten {
            file,
            changed,
            stats,
            ..
        } => {
            if changed {
                info!(
                    rule = rule.id,
                    file = %file.display(),
                    lines_in = stats.lines_in,
                    lines_out = stats.lines_out,
                    "patched"
                );
                Ok(PatchOutcome::Applied { file })
            } else {
                debug!(rule = rule.id, file = %file.display(), "already patched");
                Ok(PatchOutcome::AlreadyApplied { file })
            }
        }
    }
}

fn check_rule(
    rule: &PatchRule,
    build_root: &Path,
    version: &str,
    marker: &str,
) -> Result<PatchOutcome, PatchError> {
    if let Some(skipped) = version_gate(rule, version)? {
        return Ok(skipped);
    }

    let path = target_path(build_root, rule);
    if !path.is_file() {
        return Ok(PatchOutcome::SkippedMissing { file: path });
    }

    let io_err = |source| PatchError::Io {
        path: path.clone(),
        source,
    };
    let content = fs::read_to_string(&path).map_err(io_err)?;
    let patched = rewrite_str(&content, rule.transform(marker)).map_err(io_err)?;

    if same_lines(patched.as_bytes(), content.as_bytes()) {
        Ok(PatchOutcome::AlreadyApplied { file: path })
    } else {
        Ok(PatchOutcome::Applied { file: path })
    }
}
