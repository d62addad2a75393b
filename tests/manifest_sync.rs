//! Integration tests: manifest reconciliation against a generated tree

mod common;

use common::{setup_export, setup_project, write, PROJECT_NAME};
use std::fs;
use xcode_embed::config::PostBuildConfig;
use xcode_embed::manifest::{ManifestDocument, ProjectManifest, SyncError, TrackedGroup};
use xcode_embed::postbuild::{
    plan_project, run_post_build, sync_project, BuildRequest, Platform, PostBuildError,
};

#[test]
fn test_first_sync_adds_every_group() {
    let export = setup_export();
    let project = setup_project();
    let config = PostBuildConfig::new(project.path(), PROJECT_NAME);

    let report = sync_project(&config, export.path()).unwrap();
    assert!(report.saved);
    assert_eq!(report.groups.len(), 4);

    let manifest = ManifestDocument::load(config.manifest_path()).unwrap();
    assert!(manifest.contains_path("DemoApp/Unity/Classes/main.mm"));
    assert!(manifest.contains_path("DemoApp/Unity/Classes/Native/Bulk_Generics_0.cpp"));
    assert!(manifest.contains_path("DemoApp/Unity/Libraries/libiPhone-lib.a"));
    assert!(manifest.contains_path("DemoApp/Data/Managed/Metadata/global-metadata.dat"));
    assert!(manifest.contains_path("DemoApp/AppDelegate.swift"));

    let target = manifest.target_handle(PROJECT_NAME).unwrap();
    assert_eq!(
        manifest.file_targets("DemoApp/Data/level0"),
        vec![target.0.clone()]
    );
}

#[test]
fn test_second_sync_changes_nothing() {
    let export = setup_export();
    let project = setup_project();
    let config = PostBuildConfig::new(project.path(), PROJECT_NAME);

    sync_project(&config, export.path()).unwrap();
    let saved = fs::read_to_string(config.manifest_path()).unwrap();

    let report = sync_project(&config, export.path()).unwrap();
    assert!(!report.saved);
    assert!(report.groups.iter().all(|g| g.is_unchanged()));
    assert_eq!(fs::read_to_string(config.manifest_path()).unwrap(), saved);

    for plan in plan_project(&config, export.path()).unwrap() {
        assert!(plan.diff.is_empty(), "{}", plan.prefix);
    }
}

#[test]
fn test_vanished_files_are_pruned() {
    let export = setup_export();
    let project = setup_project();
    let config = PostBuildConfig::new(project.path(), PROJECT_NAME);
    sync_project(&config, export.path()).unwrap();

    fs::remove_file(export.path().join("Data/level0")).unwrap();
    write(export.path(), "Data/level1", "level");

    let plans = plan_project(&config, export.path()).unwrap();
    let data = plans.iter().find(|p| p.source == "Data").unwrap();
    assert!(data.diff.new.contains("level1"));
    assert!(data.diff.stale.contains("level0"));

    let report = sync_project(&config, export.path()).unwrap();
    let data = report.groups.iter().find(|g| g.source == "Data").unwrap();
    assert_eq!(data.added, vec!["DemoApp/Data/level1".to_string()]);
    assert_eq!(data.removed, vec!["DemoApp/Data/level0".to_string()]);

    let manifest = ManifestDocument::load(config.manifest_path()).unwrap();
    assert!(!manifest.contains_path("DemoApp/Data/level0"));
    assert!(manifest.contains_path("DemoApp/Data/level1"));
}

#[test]
fn test_backups_never_reach_the_manifest() {
    let export = setup_export();
    let project = setup_project();
    let config = PostBuildConfig::new(project.path(), PROJECT_NAME);
    write(export.path(), "Classes/main.mm.bak", "old");
    write(export.path(), "Classes/UI/SplashScreen.mm.BAK", "old");

    sync_project(&config, export.path()).unwrap();

    let manifest = ManifestDocument::load(config.manifest_path()).unwrap();
    assert!(manifest
        .all_paths()
        .iter()
        .all(|p| !p.to_ascii_lowercase().ends_with(".bak")));
}

#[test]
fn test_missing_group_directory_prunes_its_entries() {
    let export = setup_export();
    let project = setup_project();
    let config = PostBuildConfig::new(project.path(), PROJECT_NAME);
    sync_project(&config, export.path()).unwrap();

    fs::remove_dir_all(export.path().join("Libraries")).unwrap();
    let report = sync_project(&config, export.path()).unwrap();
    let libraries = report.groups.iter().find(|g| g.source == "Libraries").unwrap();
    assert_eq!(
        libraries.removed,
        vec!["DemoApp/Unity/Libraries/libiPhone-lib.a".to_string()]
    );
}

#[test]
fn test_unknown_target_aborts_without_saving() {
    let export = setup_export();
    let project = setup_project();
    let mut config = PostBuildConfig::new(project.path(), PROJECT_NAME);
    config.target = Some("DemoAp".to_string());
    let before = fs::read_to_string(config.manifest_path()).unwrap();

    let err = sync_project(&config, export.path()).unwrap_err();
    match err {
        PostBuildError::Sync(SyncError::TargetNotFound { suggestion, .. }) => {
            assert_eq!(suggestion.as_deref(), Some(PROJECT_NAME));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(fs::read_to_string(config.manifest_path()).unwrap(), before);
}

#[test]
fn test_custom_groups_only() {
    let export = setup_export();
    let project = setup_project();
    let mut config = PostBuildConfig::new(project.path(), PROJECT_NAME);
    config.groups = vec![TrackedGroup::new("Data", "DemoApp/Resources/Data")];

    let report = sync_project(&config, export.path()).unwrap();
    assert_eq!(report.groups.len(), 1);

    let manifest = ManifestDocument::load(config.manifest_path()).unwrap();
    assert!(manifest.contains_path("DemoApp/Resources/Data/level0"));
    assert!(manifest.tracked_paths("DemoApp/Unity/Classes").is_empty());
}

#[test]
fn test_nested_group_prefixes_are_rejected_before_sync() {
    let export = setup_export();
    let project = setup_project();
    let before = fs::read_to_string(project.path().join("DemoApp.manifest.toml")).unwrap();

    let mut config = PostBuildConfig::new(project.path(), PROJECT_NAME);
    config.groups = vec![
        TrackedGroup::new("Classes", "DemoApp/Unity"),
        TrackedGroup::new("Libraries", "DemoApp/Unity/Libraries"),
    ];
    let request = BuildRequest {
        build_dir: export.path().to_path_buf(),
        platform: Platform::Ios,
        unity_version: "2018.2.0f2".to_string(),
    };

    let err = run_post_build(&config, &request).unwrap_err();
    assert!(matches!(err, PostBuildError::InvalidConfig(_)), "{err}");
    assert_eq!(fs::read_to_string(config.manifest_path()).unwrap(), before);
    assert!(!config.exports_path().exists());
}

#[test]
fn test_existing_formatting_survives_sync() {
    let export = setup_export();
    let project = setup_project();
    let config = PostBuildConfig::new(project.path(), PROJECT_NAME);

    sync_project(&config, export.path()).unwrap();
    let text = fs::read_to_string(config.manifest_path()).unwrap();
    assert!(text.starts_with("# Xcode project manifest\n"));
    assert!(text.contains("path = \"DemoApp/AppDelegate.swift\"\nid = \"0000000000000001\""));
}
