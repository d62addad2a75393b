use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use colored::Colorize;
use similar::{ChangeTag, TextDiff};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use xcode_embed::catalog::{PatchCatalog, PatchOutcome, RuleResults};
use xcode_embed::config::{discover, parse_path, resolve_path, PostBuildConfig};
use xcode_embed::exports::ExportsOutcome;
use xcode_embed::manifest::GroupReport;
use xcode_embed::postbuild::{
    plan_project, restore_export, run_post_build, sync_project, BuildRequest, PassReport,
    Platform, RuleReport,
};
use xcode_embed::rewrite::{backup_path, rewrite_str};

#[derive(Parser)]
#[command(name = "xcode-embed")]
#[command(about = "Embed Unity iOS exports into an Xcode project", long_about = None)]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ProjectArgs {
    /// Config file (defaults to xcode-embed.toml in the current directory or above)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory containing the Xcode project
    #[arg(long)]
    project_root: Option<PathBuf>,

    /// Xcode project name
    #[arg(long)]
    project_name: Option<String>,

    /// Build target that receives new file references
    #[arg(long)]
    target: Option<String>,

    /// Manifest file, relative to the project root
    #[arg(long)]
    manifest: Option<PathBuf>,
}

#[derive(Args)]
struct BuildArgs {
    /// Root of the Unity iOS export
    #[arg(short, long)]
    build_dir: PathBuf,

    /// Unity version that produced the export (e.g. 2018.2.0f2)
    #[arg(short = 'u', long)]
    unity_version: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Patch the export, write Exports.xcconfig and sync the manifest
    Run {
        #[command(flatten)]
        build: BuildArgs,

        #[command(flatten)]
        project: ProjectArgs,

        /// Build platform; anything but ios is skipped
        #[arg(long, default_value = "ios")]
        platform: Platform,

        /// Show unified diff of patched files
        #[arg(short, long)]
        diff: bool,

        /// Print the pass report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Apply the patch rules only
    Patch {
        #[command(flatten)]
        build: BuildArgs,

        #[command(flatten)]
        project: ProjectArgs,

        /// Show what would change without modifying files
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Show unified diff of changes
        #[arg(short, long)]
        diff: bool,

        #[arg(long)]
        json: bool,
    },

    /// Sync the manifest with the export only
    Sync {
        /// Root of the Unity iOS export
        #[arg(short, long)]
        build_dir: PathBuf,

        #[command(flatten)]
        project: ProjectArgs,

        #[arg(long)]
        json: bool,
    },

    /// Report rule and manifest status without changing anything
    Status {
        #[command(flatten)]
        build: BuildArgs,

        #[command(flatten)]
        project: ProjectArgs,
    },

    /// Restore patched files from their backups
    Restore {
        /// Root of the Unity iOS export
        #[arg(short, long)]
        build_dir: PathBuf,
    },

    /// List the built-in patch rules
    List,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Run {
            build,
            project,
            platform,
            diff,
            json,
        } => cmd_run(build, project, platform, diff, json),

        Commands::Patch {
            build,
            project,
            dry_run,
            diff,
            json,
        } => cmd_patch(build, project, dry_run, diff, json),

        Commands::Sync {
            build_dir,
            project,
            json,
        } => cmd_sync(build_dir, project, json),

        Commands::Status { build, project } => cmd_status(build, project),

        Commands::Restore { build_dir } => cmd_restore(build_dir),

        Commands::List => cmd_list(),
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Config file (explicit or discovered) with command-line overrides applied.
///
/// Not validated; callers that need a complete project call `validate`.
fn load_config(args: &ProjectArgs) -> Result<PostBuildConfig> {
    let path = match &args.config {
        Some(path) => Some(path.clone()),
        None => env::current_dir().ok().and_then(|cwd| discover(&cwd)),
    };

    let mut config = match &path {
        Some(path) => {
            tracing::info!(config = %path.display(), "loading config");
            parse_path(path)?
        }
        None => PostBuildConfig::default(),
    };

    if let Some(root) = &args.project_root {
        config.project_root = root.clone();
    }
    if let Some(name) = &args.project_name {
        config.project_name = name.clone();
    }
    if let Some(target) = &args.target {
        config.target = Some(target.clone());
    }
    if let Some(manifest) = &args.manifest {
        config.manifest = Some(manifest.clone());
    }

    Ok(config)
}

fn load_project(args: &ProjectArgs) -> Result<PostBuildConfig> {
    let config = load_config(args)?;
    config
        .validate()
        .context("incomplete project configuration (set --project-name or use a config file)")?;
    Ok(config)
}

/// Helper: Show unified diff between original and modified content
fn display_diff(file: &Path, original: &str, modified: &str) {
    println!(
        "\n{}",
        format!("--- {} (original)", file.display()).dimmed()
    );
    println!("{}", format!("+++ {} (patched)", file.display()).dimmed());

    let diff = TextDiff::from_lines(original, modified);
    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => format!("-{}", change).red(),
            ChangeTag::Insert => format!("+{}", change).green(),
            ChangeTag::Equal => format!(" {}", change).normal(),
        };
        print!("{}", sign);
    }
}

/// Diff a rewritten file against the backup the rewrite left next to it.
fn display_backup_diff(file: &Path) {
    let before = fs::read_to_string(backup_path(file));
    let after = fs::read_to_string(file);
    if let (Ok(before), Ok(after)) = (before, after) {
        if before != after {
            display_diff(file, &before, &after);
        }
    }
}

fn print_outcome(rule: &str, outcome: &PatchOutcome, dry_run: bool) {
    match outcome {
        PatchOutcome::Applied { file } => {
            let verb = if dry_run { "Would apply to" } else { "Applied to" };
            println!("{} {}: {} {}", "✓".green(), rule, verb, file.display());
        }
        PatchOutcome::AlreadyApplied { file } => {
            println!(
                "{} {}: Already applied to {}",
                "⊙".yellow(),
                rule,
                file.display()
            );
        }
        PatchOutcome::SkippedVersion { reason } => {
            println!("{} {}: Skipped ({})", "⊘".cyan(), rule, reason);
        }
        PatchOutcome::SkippedMissing { file } => {
            println!(
                "{} {}: Skipped (not in export: {})",
                "⊘".cyan(),
                rule,
                file.display()
            );
        }
    }
}

fn print_groups(groups: &[GroupReport]) {
    for group in groups {
        if group.is_unchanged() {
            println!("{} {}: up to date", "⊙".yellow(), group.prefix);
            continue;
        }
        println!(
            "{} {}: {} added, {} removed",
            "✓".green(),
            group.prefix,
            group.added.len(),
            group.removed.len()
        );
        for path in &group.added {
            println!("  {} {}", "+".green(), path);
        }
        for path in &group.removed {
            println!("  {} {}", "-".red(), path);
        }
    }
}

fn rule_results_json(results: &RuleResults) -> serde_json::Value {
    let entries = results
        .iter()
        .map(|(rule, result)| match result {
            Ok(outcome) => serde_json::to_value(RuleReport {
                rule: *rule,
                outcome: outcome.clone(),
            })
            .unwrap_or_else(|e| serde_json::json!({ "rule": rule, "error": e.to_string() })),
            Err(e) => serde_json::json!({
                "rule": rule,
                "status": "error",
                "error": e.to_string(),
            }),
        })
        .collect();
    serde_json::Value::Array(entries)
}

fn cmd_run(
    build: BuildArgs,
    project: ProjectArgs,
    platform: Platform,
    show_diff: bool,
    json: bool,
) -> Result<()> {
    let config = load_config(&project)?;
    let request = BuildRequest {
        build_dir: resolve_path(&build.build_dir),
        platform,
        unity_version: build.unity_version,
    };

    let report = run_post_build(&config, &request)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    match report {
        PassReport::Skipped { reason } => {
            println!("{} Skipped: {}", "⊘".cyan(), reason);
        }
        PassReport::Completed {
            rules,
            exports,
            sync,
        } => {
            println!("Export: {}", request.build_dir.display());
            println!("Unity: {}", request.unity_version.trim());
            println!();

            for RuleReport { rule, outcome } in &rules {
                print_outcome(rule, outcome, false);
                if let PatchOutcome::Applied { file } = outcome {
                    if show_diff {
                        display_backup_diff(file);
                    }
                }
            }
            println!();

            match exports {
                ExportsOutcome::Written { file } => {
                    println!("{} Wrote {}", "✓".green(), file.display())
                }
                ExportsOutcome::Unchanged { file } => {
                    println!("{} Unchanged {}", "⊙".yellow(), file.display())
                }
            }
            println!();

            print_groups(&sync.groups);
            if sync.saved {
                println!("Saved {}", sync.manifest.display());
            }
        }
    }

    Ok(())
}

fn cmd_patch(
    build: BuildArgs,
    project: ProjectArgs,
    dry_run: bool,
    show_diff: bool,
    json: bool,
) -> Result<()> {
    let config = load_config(&project)?;
    let build_dir = resolve_path(&build.build_dir);
    let catalog = PatchCatalog::builtin();

    let results = if dry_run {
        catalog.check(&build_dir, &build.unity_version, &config.marker)
    } else {
        catalog.apply(&build_dir, &build.unity_version, &config.marker)
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&rule_results_json(&results))?);
        if results.iter().any(|(_, r)| r.is_err()) {
            std::process::exit(1);
        }
        return Ok(());
    }

    println!("Export: {}", build_dir.display());
    println!("Unity: {}", build.unity_version.trim());
    if dry_run {
        println!("{}", "[DRY RUN - showing what would be applied]".cyan());
    }
    println!();

    let mut applied = 0;
    let mut already_applied = 0;
    let mut skipped = 0;
    let mut failed = 0;

    for (rule_id, result) in &results {
        match result {
            Ok(outcome) => {
                print_outcome(rule_id, outcome, dry_run);
                match outcome {
                    PatchOutcome::Applied { file } => {
                        applied += 1;
                        if show_diff && dry_run {
                            preview_diff(&catalog, rule_id, file, &config.marker);
                        } else if show_diff {
                            display_backup_diff(file);
                        }
                    }
                    PatchOutcome::AlreadyApplied { .. } => already_applied += 1,
                    _ => skipped += 1,
                }
            }
            Err(e) => {
                eprintln!("{} {}: Error - {}", "✗".red(), rule_id, e);
                failed += 1;
            }
        }
    }

    println!();
    println!("{}", "Summary:".bold());
    println!("  {} applied", format!("{}", applied).green());
    println!("  {} already applied", format!("{}", already_applied).yellow());
    println!("  {} skipped", format!("{}", skipped).cyan());
    println!("  {} failed", format!("{}", failed).red());

    if failed > 0 {
        std::process::exit(1);
    }

    Ok(())
}

/// Show the diff a rule would produce, computed in memory.
fn preview_diff(catalog: &PatchCatalog, rule_id: &str, file: &Path, marker: &str) {
    let Some(rule) = catalog.rules().iter().find(|r| r.id == rule_id) else {
        return;
    };
    let Ok(before) = fs::read_to_string(file) else {
        return;
    };
    if let Ok(after) = rewrite_str(&before, rule.transform(marker)) {
        display_diff(file, &before, &after);
    }
}

fn cmd_sync(build_dir: PathBuf, project: ProjectArgs, json: bool) -> Result<()> {
    let config = load_project(&project)?;
    let build_dir = resolve_path(&build_dir);

    let report = sync_project(&config, &build_dir)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Manifest: {}", report.manifest.display());
    println!();
    print_groups(&report.groups);
    if report.saved {
        println!();
        println!("Saved {}", report.manifest.display());
    }

    Ok(())
}

fn cmd_status(build: BuildArgs, project: ProjectArgs) -> Result<()> {
    let config = load_config(&project)?;
    let build_dir = resolve_path(&build.build_dir);

    println!("{}", "Patch Status Report".bold());
    println!("Export: {}", build_dir.display());
    println!("Unity: {}", build.unity_version.trim());
    println!();

    let results =
        PatchCatalog::builtin().check(&build_dir, &build.unity_version, &config.marker);

    let mut applied = Vec::new();
    let mut not_applied = Vec::new();
    let mut skipped = Vec::new();

    for (rule_id, result) in results {
        match result {
            Ok(PatchOutcome::Applied { .. }) => {
                not_applied.push((rule_id, "target found but was not patched".to_string()));
            }
            Ok(PatchOutcome::AlreadyApplied { .. }) => applied.push(rule_id),
            Ok(PatchOutcome::SkippedVersion { reason }) => skipped.push((rule_id, reason)),
            Ok(PatchOutcome::SkippedMissing { file }) => {
                skipped.push((rule_id, format!("{} not in export", file.display())))
            }
            Err(e) => not_applied.push((rule_id, e.to_string())),
        }
    }

    if !applied.is_empty() {
        println!(
            "{} {} ({} rules)",
            "✓".green(),
            "APPLIED".green().bold(),
            applied.len()
        );
        for id in &applied {
            println!("  - {}", id);
        }
        println!();
    }

    if !not_applied.is_empty() {
        println!(
            "{} {} ({} rules)",
            "⊙".yellow(),
            "NOT APPLIED".yellow().bold(),
            not_applied.len()
        );
        for (id, reason) in &not_applied {
            println!("  - {} ({})", id, reason.dimmed());
        }
        println!();
    }

    if !skipped.is_empty() {
        println!(
            "{} {} ({} rules)",
            "⊘".cyan(),
            "SKIPPED".cyan().bold(),
            skipped.len()
        );
        for (id, reason) in &skipped {
            println!("  - {} ({})", id, reason.dimmed());
        }
        println!();
    }

    if config.validate().is_err() {
        println!(
            "{}",
            "No project configured; skipping manifest status".yellow()
        );
        return Ok(());
    }

    println!("{}", "Manifest Status".bold());
    println!("Manifest: {}", config.manifest_path().display());
    for plan in plan_project(&config, &build_dir)? {
        if plan.diff.is_empty() {
            println!("{} {}: up to date", "✓".green(), plan.prefix);
            continue;
        }
        println!(
            "{} {}: {} to add, {} to remove",
            "⊙".yellow(),
            plan.prefix,
            plan.diff.new.len(),
            plan.diff.stale.len()
        );
        for path in &plan.diff.new {
            println!("  {} {}", "+".green(), path);
        }
        for path in &plan.diff.stale {
            println!("  {} {}", "-".red(), path);
        }
    }

    Ok(())
}

fn cmd_restore(build_dir: PathBuf) -> Result<()> {
    let build_dir = resolve_path(&build_dir);
    let restored = restore_export(&PatchCatalog::builtin(), &build_dir)?;

    if restored.is_empty() {
        println!("{}", "No backups found".yellow());
        return Ok(());
    }
    for file in &restored {
        println!("{} Restored {}", "✓".green(), file.display());
    }
    Ok(())
}

fn cmd_list() -> Result<()> {
    let catalog = PatchCatalog::builtin();
    println!("{}", "Built-in rules:".bold());
    for rule in catalog.rules() {
        println!(
            "  {} {} [{}]",
            rule.id.green(),
            rule.target.dimmed(),
            rule.applicability
        );
        println!("      {}", rule.description);
    }
    Ok(())
}
