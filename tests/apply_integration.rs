use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

const FIXTURE: &str = "\
// !$*UTF8*$!
{
\tarchiveVersion = 1;
\tobjectVersion = 56;
\tobjects = {

/* Begin PBXBuildFile section */
\t\tD10000000000000000000101 /* App.swift in Sources */ = {isa = PBXBuildFile; fileRef = D10000000000000000000001 /* App.swift */; };
/* End PBXBuildFile section */

/* Begin PBXFileReference section */
\t\tD10000000000000000000001 /* App.swift */ = {isa = PBXFileReference; lastKnownFileType = sourcecode.swift; path = App.swift; sourceTree = \"<group>\"; };
/* End PBXFileReference section */

/* Begin PBXGroup section */
\t\tD10000000000000000000010 = {
\t\t\tisa = PBXGroup;
\t\t\tchildren = (
\t\t\t\tD10000000000000000000001 /* App.swift */,
\t\t\t\tD10000000000000000000011 /* Utilities */,
\t\t\t\tD10000000000000000000012 /* Features */,
\t\t\t);
\t\t\tsourceTree = \"<group>\";
\t\t};
\t\tD10000000000000000000011 /* Utilities */ = {
\t\t\tisa = PBXGroup;
\t\t\tchildren = (
\t\t\t);
\t\t\tpath = Utilities;
\t\t\tsourceTree = \"<group>\";
\t\t};
\t\tD10000000000000000000012 /* Features */ = {
\t\t\tisa = PBXGroup;
\t\t\tchildren = (
\t\t\t);
\t\t\tpath = Features;
\t\t\tsourceTree = \"<group>\";
\t\t};
/* End PBXGroup section */

/* Begin PBXProject section */
\t\tD10000000000000000000020 /* Project object */ = {
\t\t\tisa = PBXProject;
\t\t\tmainGroup = D10000000000000000000010;
\t\t};
/* End PBXProject section */

/* Begin PBXSourcesBuildPhase section */
\t\tD10000000000000000000030 /* Sources */ = {
\t\t\tisa = PBXSourcesBuildPhase;
\t\t\tbuildActionMask = 2147483647;
\t\t\tfiles = (
\t\t\t\tD10000000000000000000101 /* App.swift in Sources */,
\t\t\t);
\t\t\trunOnlyForDeploymentPostprocessing = 0;
\t\t};
/* End PBXSourcesBuildPhase section */
\t};
\trootObject = D10000000000000000000020 /* Project object */;
}
";

struct TestProject {
    #[allow(dead_code)]
    dir: tempfile::TempDir,
    manifest: PathBuf,
    source_root: PathBuf,
}

fn write(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent directory");
    }
    fs::write(path, contents).expect("write file");
}

fn setup() -> TestProject {
    let dir = tempfile::tempdir().expect("create temp dir");
    let manifest = dir.path().join("App.xcodeproj/project.pbxproj");
    write(&manifest, FIXTURE);
    let source_root = dir.path().join("App");
    write(&source_root.join("App.swift"), "struct App {}\n");
    write(&source_root.join("Utilities/Logger.swift"), "struct Logger {}\n");
    write(
        &source_root.join("Features/Home/ViewModels/HomeVM.swift"),
        "final class HomeVM {}\n",
    );
    write(
        &source_root.join("Core/Storage/Model.xcdatamodeld/Model.xcdatamodel/contents"),
        "<model/>\n",
    );
    TestProject {
        dir,
        manifest,
        source_root,
    }
}

fn run(project: &TestProject, command: &str, extra: &[&str]) -> Output {
    let bin = env!("CARGO_BIN_EXE_pbxpatch");
    let mut invocation = Command::new(bin);
    invocation
        .arg(command)
        .arg("--project")
        .arg(&project.manifest)
        .args(extra);
    if command != "check" {
        invocation.arg("--source-root").arg(&project.source_root);
    }
    invocation.output().expect("run pbxpatch")
}

fn backups(project: &TestProject) -> Vec<PathBuf> {
    let parent = project.manifest.parent().expect("manifest parent");
    let mut found = Vec::new();
    for entry in fs::read_dir(parent).expect("read project dir") {
        let entry = entry.expect("dir entry");
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with("project.pbxproj.backup.") {
            found.push(entry.path());
        }
    }
    found
}

#[test]
fn scan_lists_only_unregistered_files() {
    let project = setup();
    let output = run(&project, "scan", &["--json"]);
    assert!(output.status.success(), "scan failed: {output:?}");
    let candidates: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("parse scan JSON");
    let names: Vec<&str> = candidates
        .as_array()
        .expect("candidate array")
        .iter()
        .map(|c| c["name"].as_str().expect("name"))
        .collect();
    assert_eq!(
        names,
        vec!["Model.xcdatamodeld", "HomeVM.swift", "Logger.swift"]
    );
}

#[test]
fn apply_registers_files_and_is_idempotent() {
    let project = setup();
    let output = run(&project, "apply", &[]);
    assert!(output.status.success(), "apply failed: {output:?}");

    let patched = fs::read_to_string(&project.manifest).expect("read patched manifest");
    for needle in [
        "/* Logger.swift */ = {isa = PBXFileReference",
        "/* HomeVM.swift */ = {isa = PBXFileReference",
        "/* Model.xcdatamodeld */ = {isa = PBXFileReference; lastKnownFileType = wrapper.xcdatamodeld",
        "/* Logger.swift in Sources */,",
        "/* ViewModels */ = {",
        "/* Storage */ = {",
    ] {
        assert!(patched.contains(needle), "missing {needle:?}");
    }
    assert_eq!(backups(&project).len(), 1);
    let backup = fs::read_to_string(&backups(&project)[0]).expect("read backup");
    assert_eq!(backup, FIXTURE);

    // The patched manifest still passes the structural audit.
    let output = run(&project, "check", &[]);
    assert!(output.status.success(), "check failed: {output:?}");

    // A second run finds nothing to do and leaves the bytes alone.
    let output = run(&project, "apply", &[]);
    assert!(output.status.success(), "re-apply failed: {output:?}");
    let after = fs::read_to_string(&project.manifest).expect("re-read manifest");
    assert_eq!(after, patched);
    assert_eq!(backups(&project).len(), 1, "no-op run must not write a backup");
}

#[test]
fn dry_run_writes_nothing() {
    let project = setup();
    let output = run(&project, "apply", &["--dry-run", "--json"]);
    assert!(output.status.success(), "dry run failed: {output:?}");
    let report: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("parse apply JSON");
    assert_eq!(report["dry_run"], true);
    assert_eq!(report["changed"], true);
    assert_eq!(report["summary"]["added"].as_array().expect("added").len(), 3);
    let untouched = fs::read_to_string(&project.manifest).expect("read manifest");
    assert_eq!(untouched, FIXTURE);
    assert!(backups(&project).is_empty());
}

#[test]
fn missing_anchor_leaves_the_manifest_untouched() {
    let project = setup();
    let broken = FIXTURE.replace("/* Begin PBXFileReference section */\n", "");
    write(&project.manifest, &broken);
    let output = run(&project, "apply", &[]);
    assert!(!output.status.success(), "apply should fail");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("not found"), "unexpected stderr: {stderr}");
    let after = fs::read_to_string(&project.manifest).expect("read manifest");
    assert_eq!(after, broken);
    assert!(backups(&project).is_empty());
}
