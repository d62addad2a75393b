//! End-to-end post-build pass
//!
//! 1. Patch the export
//! 2. Write Exports.xcconfig
//! 3. Sync the manifest
//! 4. Run again and check nothing changes

mod common;

use common::{read, setup_export, setup_project, PROJECT_NAME};
use std::fs;
use xcode_embed::catalog::PatchOutcome;
use xcode_embed::exports::ExportsOutcome;
use xcode_embed::manifest::{ManifestDocument, ProjectManifest};
use xcode_embed::postbuild::{run_post_build, BuildRequest, PassReport, Platform};
use xcode_embed::PostBuildConfig;

fn request(build_dir: &std::path::Path, version: &str) -> BuildRequest {
    BuildRequest {
        build_dir: build_dir.to_path_buf(),
        platform: Platform::Ios,
        unity_version: version.to_string(),
    }
}

#[test]
fn test_full_pass_then_rerun() {
    let export = setup_export();
    let project = setup_project();
    let config = PostBuildConfig::new(project.path(), PROJECT_NAME);

    let report = run_post_build(&config, &request(export.path(), "2018.2.0f2")).unwrap();
    let PassReport::Completed {
        rules,
        exports,
        sync,
    } = report
    else {
        panic!("pass was skipped");
    };

    assert_eq!(rules.len(), 5);
    assert!(rules
        .iter()
        .any(|r| r.rule == "rename-main" && matches!(r.outcome, PatchOutcome::Applied { .. })));
    assert!(matches!(exports, ExportsOutcome::Written { .. }));
    assert!(sync.saved);

    let xcconfig = fs::read_to_string(config.exports_path()).unwrap();
    assert_eq!(
        xcconfig,
        format!(
            "UNITY_RUNTIME_VERSION = 2018.2.0f2;\nUNITY_IOS_EXPORT_PATH = {};\n",
            export.path().display()
        )
    );

    // backups exist on disk but are not tracked
    let manifest = ManifestDocument::load(config.manifest_path()).unwrap();
    assert!(export.path().join("Classes/main.mm.bak").exists());
    assert!(!manifest.contains_path("DemoApp/Unity/Classes/main.mm.bak"));
    assert!(manifest.contains_path("DemoApp/Unity/Classes/main.mm"));

    let main_after_first = read(export.path(), "Classes/main.mm");
    let manifest_after_first = fs::read_to_string(config.manifest_path()).unwrap();

    let rerun = run_post_build(&config, &request(export.path(), "2018.2.0f2")).unwrap();
    let PassReport::Completed {
        rules,
        exports,
        sync,
    } = rerun
    else {
        panic!("pass was skipped");
    };
    assert!(rules.iter().all(|r| !matches!(r.outcome, PatchOutcome::Applied { .. })));
    assert!(matches!(exports, ExportsOutcome::Unchanged { .. }));
    assert!(!sync.saved);
    assert!(sync.groups.iter().all(|g| g.is_unchanged()));

    assert_eq!(read(export.path(), "Classes/main.mm"), main_after_first);
    assert_eq!(
        fs::read_to_string(config.manifest_path()).unwrap(),
        manifest_after_first
    );
}

#[test]
fn test_missing_manifest_fails_after_patching() {
    let export = setup_export();
    let project = tempfile::tempdir().unwrap();
    let config = PostBuildConfig::new(project.path(), PROJECT_NAME);

    let err = run_post_build(&config, &request(export.path(), "2018.2.0f2")).unwrap_err();
    assert!(err.to_string().contains("manifest"));

    // rules and exports already ran
    assert!(read(export.path(), "Classes/main.mm").contains("old_main"));
    assert!(config.exports_path().exists());
}

#[test]
fn test_non_ios_build_touches_nothing() {
    let export = setup_export();
    let project = setup_project();
    let config = PostBuildConfig::new(project.path(), PROJECT_NAME);
    let mut req = request(export.path(), "2018.2.0f2");
    req.platform = Platform::Android;

    let report = run_post_build(&config, &req).unwrap();
    assert!(matches!(report, PassReport::Skipped { .. }));
    assert_eq!(read(export.path(), "Classes/main.mm"), common::MAIN_MM);
    assert!(!config.exports_path().exists());
}

#[test]
fn test_report_serializes_to_json() {
    let export = setup_export();
    let project = setup_project();
    let config = PostBuildConfig::new(project.path(), PROJECT_NAME);

    let report = run_post_build(&config, &request(export.path(), "2017.1.1f1")).unwrap();
    let json = serde_json::to_value(&report).unwrap();

    assert_eq!(json["status"], "completed");
    assert_eq!(json["exports"]["status"], "written");
    let rules = json["rules"].as_array().unwrap();
    let metal = rules
        .iter()
        .find(|r| r["rule"] == "metal-stencil-usage")
        .unwrap();
    assert_eq!(metal["status"], "applied");
    let splash = rules
        .iter()
        .find(|r| r["rule"] == "splash-storyboard")
        .unwrap();
    assert_eq!(splash["status"], "skipped_version");
}
