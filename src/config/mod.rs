pub mod loader;
pub mod schema;

pub use loader::{
    discover, load_from_path, load_from_str, parse_path, parse_str, ConfigError, CONFIG_FILE_NAME,
};
pub use schema::{resolve_path, PostBuildConfig, ValidationError, ValidationIssue};
