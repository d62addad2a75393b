use crate::catalog::DEFAULT_MARKER;
use crate::exports::EXPORTS_FILE_NAME;
use crate::manifest::TrackedGroup;
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

/// Everything the post-build pass needs to know about the host project.
///
/// ```toml
/// project_root = "~/src/DemoApp"
/// project_name = "DemoApp"
/// target = "DemoApp"
///
/// [[groups]]
/// source = "Data"
/// prefix = "DemoApp/Data"
/// ```
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct PostBuildConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Directory containing the host project. `~/` and relative paths are
    /// resolved when used.
    #[serde(default = "default_project_root")]
    pub project_root: PathBuf,
    #[serde(default)]
    pub project_name: String,
    /// Build target receiving new file references; defaults to the project name.
    #[serde(default)]
    pub target: Option<String>,
    /// Manifest location, relative to the project root.
    #[serde(default)]
    pub manifest: Option<PathBuf>,
    #[serde(default = "default_marker")]
    pub marker: String,
    /// Tracked groups; the four standard groups when empty.
    #[serde(default)]
    pub groups: Vec<TrackedGroup>,
}

fn default_enabled() -> bool {
    true
}

fn default_project_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_marker() -> String {
    DEFAULT_MARKER.to_string()
}

impl Default for PostBuildConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            project_root: default_project_root(),
            project_name: String::new(),
            target: None,
            manifest: None,
            marker: default_marker(),
            groups: Vec::new(),
        }
    }
}

impl PostBuildConfig {
    pub fn new(project_root: impl Into<PathBuf>, project_name: impl Into<String>) -> Self {
        Self {
            project_root: project_root.into(),
            project_name: project_name.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();

        if self.project_name.trim().is_empty() {
            issues.push(ValidationIssue::MissingField {
                field: "project_name",
            });
        }
        if self.project_root.as_os_str().is_empty() {
            issues.push(ValidationIssue::MissingField {
                field: "project_root",
            });
        }
        if self.marker.trim().is_empty() {
            issues.push(ValidationIssue::MissingField { field: "marker" });
        }
        if self.target.as_deref().is_some_and(|t| t.trim().is_empty()) {
            issues.push(ValidationIssue::MissingField { field: "target" });
        }

        let mut seen = HashSet::new();
        for (index, group) in self.groups.iter().enumerate() {
            if group.source.trim().is_empty() {
                issues.push(ValidationIssue::InvalidGroup {
                    index,
                    message: "source is empty".to_string(),
                });
            }
            if group.prefix.trim_end_matches('/').trim().is_empty() {
                issues.push(ValidationIssue::InvalidGroup {
                    index,
                    message: "prefix is empty".to_string(),
                });
            }
            if !seen.insert(group.source.as_str()) {
                issues.push(ValidationIssue::DuplicateGroup {
                    source: group.source.clone(),
                });
            }
        }

        for (index, group) in self.groups.iter().enumerate() {
            for other in &self.groups[index + 1..] {
                if prefixes_overlap(&group.prefix, &other.prefix) {
                    issues.push(ValidationIssue::OverlappingGroups {
                        first: group.source.clone(),
                        second: other.source.clone(),
                    });
                }
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }

    pub fn target_name(&self) -> &str {
        self.target.as_deref().unwrap_or(&self.project_name)
    }

    pub fn groups(&self) -> Vec<TrackedGroup> {
        if self.groups.is_empty() {
            TrackedGroup::defaults(&self.project_name)
        } else {
            self.groups.clone()
        }
    }

    pub fn resolved_project_root(&self) -> PathBuf {
        resolve_path(&self.project_root)
    }

    /// `<root>/<manifest>`, or `<root>/<name>.manifest.toml` when unset.
    pub fn manifest_path(&self) -> PathBuf {
        let root = self.resolved_project_root();
        match &self.manifest {
            Some(manifest) => root.join(manifest),
            None => root.join(format!("{}.manifest.toml", self.project_name)),
        }
    }

    pub fn exports_path(&self) -> PathBuf {
        self.resolved_project_root()
            .join(&self.project_name)
            .join("Unity")
            .join(EXPORTS_FILE_NAME)
    }
}

/// Equal prefixes, or one nested under the other at a `/` boundary.
fn prefixes_overlap(a: &str, b: &str) -> bool {
    let (a, b) = (a.trim_end_matches('/'), b.trim_end_matches('/'));
    if a.is_empty() || b.is_empty() {
        return false;
    }
    let nested = |outer: &str, inner: &str| {
        inner
            .strip_prefix(outer)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
    };
    nested(a, b) || nested(b, a)
}

/// Expand a leading `~/` and anchor relative paths at the current directory.
pub fn resolve_path(path: &Path) -> PathBuf {
    let expanded = match path.strip_prefix("~") {
        Ok(rest) => match home::home_dir() {
            Some(home) => home.join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    };

    if expanded.is_absolute() {
        return expanded;
    }
    match std::env::current_dir() {
        Ok(cwd) => cwd.join(expanded),
        Err(_) => expanded,
    }
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    MissingField { field: &'static str },
    InvalidGroup { index: usize, message: String },
    DuplicateGroup { source: String },
    OverlappingGroups { first: String, second: String },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::MissingField { field } => {
                write!(f, "config missing required field '{field}'")
            }
            ValidationIssue::InvalidGroup { index, message } => {
                write!(f, "group {index} has invalid configuration: {message}")
            }
            ValidationIssue::DuplicateGroup { source } => {
                write!(f, "group source '{source}' is listed more than once")
            }
            ValidationIssue::OverlappingGroups { first, second } => write!(
                f,
                "groups '{first}' and '{second}' have overlapping manifest prefixes"
            ),
        }
    }
}
