//! xcode-embed: post-process a Unity iOS export for embedding in an Xcode project
//!
//! Two jobs run after every native build:
//!
//! - Generated sources are patched by a fixed catalog of line rules, each one
//!   idempotent thanks to an edit marker and each rewrite leaving a `.bak`
//!   of the previous content.
//! - The generated tree is reconciled against the host project's manifest,
//!   adding references for new files and pruning references to vanished ones.
//!
//! # Architecture
//!
//! Every rule is data ([`PatchRule`]) interpreted by one engine: a
//! [`ScopeTracker`] decides where a line sits, the rule's action decides what
//! to emit, and [`rewrite_file`] streams the result into place atomically.
//! Manifest sync only talks to the project through [`ProjectManifest`].
//!
//! # Example
//!
//! ```no_run
//! use xcode_embed::{run_post_build, BuildRequest, Platform, PostBuildConfig};
//! use std::path::PathBuf;
//!
//! let config = PostBuildConfig::new("/work/DemoApp", "DemoApp");
//! let request = BuildRequest {
//!     build_dir: PathBuf::from("/builds/ios"),
//!     platform: Platform::Ios,
//!     unity_version: "2018.2.0f2".to_string(),
//! };
//!
//! match run_post_build(&config, &request) {
//!     Ok(report) => println!("{report:?}"),
//!     Err(e) => eprintln!("post-build failed: {e}"),
//! }
//! ```

pub mod catalog;
pub mod config;
pub mod exports;
pub mod manifest;
pub mod postbuild;
pub mod rewrite;
pub mod scope;

// Re-exports
pub use catalog::{
    Applicability, PatchCatalog, PatchError, PatchOutcome, PatchRule, UnityVersion, VersionError,
    BUILTIN_RULES, DEFAULT_MARKER,
};
pub use config::{load_from_path, load_from_str, ConfigError, PostBuildConfig};
pub use exports::{write_exports, ExportsError, ExportsOutcome};
pub use manifest::{
    diff_directory, sync_group, sync_groups, DiffResult, GroupReport, ManifestDocument,
    ManifestError, ProjectManifest, SyncError, TrackedGroup,
};
pub use postbuild::{
    run_post_build, BuildRequest, PassReport, Platform, PostBuildError, RuleReport, SyncReport,
};
pub use rewrite::{rewrite_file, rewrite_str, LineTransform, RewriteError, RewriteOutcome};
pub use scope::{LineEvent, MarkerPolicy, ScopeSpec, ScopeState, ScopeTracker};
