use crate::config::schema::{PostBuildConfig, ValidationError};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// File name looked up by [`discover`].
pub const CONFIG_FILE_NAME: &str = "xcode-embed.toml";

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Toml {
        path: Option<PathBuf>,
        source: toml_edit::de::Error,
    },
    Validation {
        path: Option<PathBuf>,
        source: ValidationError,
    },
}

impl ConfigError {
    fn with_path(self, path: &Path) -> Self {
        let path = path.to_path_buf();
        match self {
            ConfigError::Toml { path: None, source } => ConfigError::Toml {
                path: Some(path),
                source,
            },
            ConfigError::Validation { path: None, source } => ConfigError::Validation {
                path: Some(path),
                source,
            },
            other => other,
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(f, "failed to read config from {}: {}", path.display(), source)
            }
            ConfigError::Toml { path, source } => match path {
                Some(path) => write!(
                    f,
                    "failed to parse config TOML ({}): {}",
                    path.display(),
                    source
                ),
                None => write!(f, "failed to parse config TOML: {}", source),
            },
            ConfigError::Validation { path, source } => match path {
                Some(path) => write!(f, "invalid config ({}): {}", path.display(), source),
                None => write!(f, "invalid config: {}", source),
            },
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Toml { source, .. } => Some(source),
            ConfigError::Validation { source, .. } => Some(source),
        }
    }
}

/// Parse a config without validating it, so callers can fill in overrides first.
pub fn parse_str(input: &str) -> Result<PostBuildConfig, ConfigError> {
    toml_edit::de::from_str(input).map_err(|source| ConfigError::Toml { path: None, source })
}

pub fn parse_path(path: impl AsRef<Path>) -> Result<PostBuildConfig, ConfigError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_str(&contents).map_err(|error| error.with_path(path))
}

pub fn load_from_str(input: &str) -> Result<PostBuildConfig, ConfigError> {
    let config = parse_str(input)?;
    config
        .validate()
        .map_err(|source| ConfigError::Validation { path: None, source })?;
    Ok(config)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<PostBuildConfig, ConfigError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    load_from_str(&contents).map_err(|error| error.with_path(path))
}

/// Look for `xcode-embed.toml` in `dir` and its ancestors.
pub fn discover(dir: &Path) -> Option<PathBuf> {
    dir.ancestors()
        .map(|ancestor| ancestor.join(CONFIG_FILE_NAME))
        .find(|candidate| candidate.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::TrackedGroup;

    #[test]
    fn test_load_minimal() {
        let config = load_from_str("project_name = \"DemoApp\"\n").unwrap();
        assert!(config.enabled);
        assert_eq!(config.project_root, PathBuf::from("."));
        assert_eq!(config.groups().len(), 4);
    }

    #[test]
    fn test_load_full() {
        let input = r#"
enabled = false
project_root = "~/src/demo"
project_name = "DemoApp"
target = "DemoAppTarget"
manifest = "DemoApp.manifest.toml"
marker = "demo-marker"

[[groups]]
source = "Data"
prefix = "DemoApp/Data"
"#;
        let config = load_from_str(input).unwrap();
        assert!(!config.enabled);
        assert_eq!(config.target_name(), "DemoAppTarget");
        assert_eq!(config.marker, "demo-marker");
        assert_eq!(config.groups(), vec![TrackedGroup::new("Data", "DemoApp/Data")]);
    }

    #[test]
    fn test_validation_error() {
        let err = load_from_str("project_name = \"\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Validation { path: None, .. }));
        assert!(err.to_string().contains("project_name"));

        assert!(parse_str("project_name = \"\"\n").is_ok());
    }

    #[test]
    fn test_toml_error_carries_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "project_name = [").unwrap();

        let err = load_from_path(&path).unwrap_err();
        match &err {
            ConfigError::Toml { path: Some(p), .. } => assert_eq!(p, &path),
            other => panic!("unexpected error: {other}"),
        }
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_missing_file() {
        let err = load_from_path("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_discover_walks_up() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        fs::create_dir_all(&nested).unwrap();

        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "project_name = \"X\"\n").unwrap();
        assert_eq!(discover(&nested), Some(path));
    }
}
