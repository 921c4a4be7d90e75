//! Command workflows wiring discovery, patching, and the write transaction.
//!
//! Apply is transactional: the candidate is validated in memory, the original
//! is copied verbatim to a backup, the new text is published through a temp
//! file + rename, and a post-write re-read either confirms the result or
//! restores the backup. The manifest on disk is never left half-patched.
use crate::cli::{ApplyArgs, CheckArgs, InitArgs, ScanArgs};
use crate::config::{self, PatchConfig};
use crate::discover;
use crate::document::ManifestDocument;
use crate::engine;
use crate::util::{display_path, now_epoch_ms};
use crate::validate;
use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

pub fn run_init(args: InitArgs) -> Result<()> {
    if args.out.is_file() && !args.force {
        return Err(anyhow!(
            "config already exists at {} (use --force to overwrite)",
            args.out.display()
        ));
    }
    config::write_config(&args.out, &config::default_config())?;
    println!("wrote {}", args.out.display());
    Ok(())
}

pub fn run_scan(args: ScanArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let manifest_path = resolve_manifest_path(&args.project)?;
    let doc = ManifestDocument::load(&manifest_path)
        .with_context(|| format!("read manifest {}", manifest_path.display()))?;
    let candidates = discover_candidates(&doc, &config, &args.source_root)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&candidates)?);
        return Ok(());
    }
    if candidates.is_empty() {
        println!("no unregistered files under {}", args.source_root.display());
        return Ok(());
    }
    for candidate in &candidates {
        let build = if candidate.build_phase { "build" } else { "no-build" };
        println!("{}\t{}\t{}", candidate.display_path(), candidate.file_type, build);
    }
    println!("{} unregistered file(s)", candidates.len());
    Ok(())
}

#[derive(Serialize)]
struct ApplyReport<'a> {
    manifest: String,
    dry_run: bool,
    changed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    backup: Option<String>,
    summary: &'a engine::PatchSummary,
}

pub fn run_apply(args: ApplyArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let manifest_path = resolve_manifest_path(&args.project)?;
    let doc = ManifestDocument::load(&manifest_path)
        .with_context(|| format!("read manifest {}", manifest_path.display()))?;
    let candidates = discover_candidates(&doc, &config, &args.source_root)?;
    let requests: Vec<engine::NewFile> = candidates.iter().map(|c| c.to_new_file()).collect();
    if args.verbose {
        for candidate in &candidates {
            eprintln!("candidate: {}", candidate.display_path());
        }
    }

    let outcome = engine::patch(&doc, &config, &requests)?;
    if !outcome.changed {
        report_apply(&args, &manifest_path, &outcome, None)?;
        return Ok(());
    }

    // Audit the candidate before anything touches disk.
    validate::check_sentinels(&outcome.text, &config)?;

    if args.dry_run {
        report_apply(&args, &manifest_path, &outcome, None)?;
        return Ok(());
    }

    let backup_path = write_backup(&manifest_path, &doc)?;
    tracing::info!(backup = %backup_path.display(), "backup written");
    publish_manifest(&manifest_path, &outcome.text)?;

    // Re-read what was published; restore the backup on any mismatch.
    let written = fs::read_to_string(&manifest_path)
        .with_context(|| format!("re-read manifest {}", manifest_path.display()))?;
    let verified = written == outcome.text
        && validate::sentinel_issues(&written, &config).is_empty();
    if !verified {
        restore_backup(&backup_path, &manifest_path)?;
        return Err(anyhow!(
            "post-write verification failed; manifest restored from {}",
            backup_path.display()
        ));
    }

    report_apply(&args, &manifest_path, &outcome, Some(&backup_path))?;
    Ok(())
}

#[derive(Serialize)]
struct CheckReport {
    manifest: String,
    sentinel_issues: Vec<String>,
    group_tree_issues: Vec<String>,
}

pub fn run_check(args: CheckArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let manifest_path = resolve_manifest_path(&args.project)?;
    let doc = ManifestDocument::load(&manifest_path)
        .with_context(|| format!("read manifest {}", manifest_path.display()))?;
    let report = CheckReport {
        manifest: manifest_path.display().to_string(),
        sentinel_issues: validate::sentinel_issues(&doc.to_text(), &config),
        group_tree_issues: validate::group_tree_issues(&doc, &config)?,
    };
    let issue_count = report.sentinel_issues.len() + report.group_tree_issues.len();
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if issue_count == 0 {
        println!("{}: ok", report.manifest);
    } else {
        for issue in report.sentinel_issues.iter().chain(&report.group_tree_issues) {
            println!("issue: {issue}");
        }
    }
    if issue_count > 0 {
        return Err(anyhow!("manifest check failed with {issue_count} issue(s)"));
    }
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<PatchConfig> {
    let config = config::load_config_or_default(path)?;
    config::validate_config(&config)?;
    Ok(config)
}

/// Accept either the `project.pbxproj` itself or its `.xcodeproj` wrapper.
fn resolve_manifest_path(project: &Path) -> Result<PathBuf> {
    if project.is_dir() {
        let inner = project.join("project.pbxproj");
        if inner.is_file() {
            return Ok(inner);
        }
        return Err(anyhow!(
            "no project.pbxproj under {}",
            project.display()
        ));
    }
    if project.is_file() {
        return Ok(project.to_path_buf());
    }
    Err(anyhow!("manifest {} does not exist", project.display()))
}

fn discover_candidates(
    doc: &ManifestDocument,
    config: &PatchConfig,
    source_root: &Path,
) -> Result<Vec<discover::Candidate>> {
    if !source_root.is_dir() {
        return Err(anyhow!(
            "source root {} is not a directory",
            source_root.display()
        ));
    }
    let existing: HashSet<String> = doc
        .catalog_entries(config)?
        .into_iter()
        .map(|entry| entry.path)
        .collect();
    discover::discover(source_root, config, &existing)
}

/// Copy the original manifest verbatim to a timestamped sibling.
fn write_backup(manifest_path: &Path, doc: &ManifestDocument) -> Result<PathBuf> {
    let file_name = manifest_path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("manifest");
    let backup_path = manifest_path
        .with_file_name(format!("{file_name}.backup.{}", now_epoch_ms()?));
    fs::write(&backup_path, doc.to_text())
        .with_context(|| format!("write backup {}", backup_path.display()))?;
    Ok(backup_path)
}

/// Publish the candidate text through a temp file + rename in place.
fn publish_manifest(manifest_path: &Path, text: &str) -> Result<()> {
    let file_name = manifest_path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("manifest");
    let tmp_path = manifest_path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(format!(".{file_name}.tmp"));
    fs::write(&tmp_path, text).with_context(|| format!("write {}", tmp_path.display()))?;
    fs::rename(&tmp_path, manifest_path)
        .with_context(|| format!("publish {}", manifest_path.display()))?;
    Ok(())
}

fn restore_backup(backup_path: &Path, manifest_path: &Path) -> Result<()> {
    fs::copy(backup_path, manifest_path).with_context(|| {
        format!(
            "restore {} from {}",
            manifest_path.display(),
            backup_path.display()
        )
    })?;
    Ok(())
}

fn report_apply(
    args: &ApplyArgs,
    manifest_path: &Path,
    outcome: &engine::PatchOutcome,
    backup_path: Option<&Path>,
) -> Result<()> {
    if args.json {
        let report = ApplyReport {
            manifest: manifest_path.display().to_string(),
            dry_run: args.dry_run,
            changed: outcome.changed,
            backup: backup_path.map(|path| path.display().to_string()),
            summary: &outcome.summary,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }
    let summary = &outcome.summary;
    if !outcome.changed {
        if summary.skipped_existing.is_empty() {
            println!("manifest already up to date");
        } else {
            println!(
                "manifest already up to date ({} file(s) already registered)",
                summary.skipped_existing.len()
            );
        }
        return Ok(());
    }
    for added in &summary.added {
        let path = if added.group_path.is_empty() {
            added.name.clone()
        } else {
            format!("{}/{}", added.group_path, added.name)
        };
        println!("registered {path}");
    }
    for group in &summary.new_groups {
        println!("created group {group}");
    }
    if args.dry_run {
        println!(
            "dry run: {} file(s), {} group(s); nothing written",
            summary.added.len(),
            summary.new_groups.len()
        );
    } else {
        let backup = backup_path
            .map(|path| display_path(path, manifest_path.parent()))
            .unwrap_or_default();
        println!(
            "patched {} ({} file(s), {} group(s)); backup {}",
            manifest_path.display(),
            summary.added.len(),
            summary.new_groups.len(),
            backup
        );
    }
    Ok(())
}
