//! Candidate discovery under a source root.
//!
//! Walks the tree in sorted order, classifies entries through the config's
//! kind rules, and filters out files the manifest catalog already holds.
//! Bundle directories count as single leaves and are never descended into.
use crate::config::PatchConfig;
use crate::engine::NewFile;
use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// One unregistered file found under the source root.
#[derive(Debug, Clone, Serialize)]
pub struct Candidate {
    pub name: String,
    /// Group path segments relative to the source root.
    pub group_path: Vec<String>,
    pub file_type: String,
    pub build_phase: bool,
}

impl Candidate {
    pub fn to_new_file(&self) -> NewFile {
        NewFile {
            name: self.name.clone(),
            group_path: self.group_path.clone(),
            file_type: self.file_type.clone(),
            build_phase: self.build_phase,
        }
    }

    pub fn display_path(&self) -> String {
        if self.group_path.is_empty() {
            self.name.clone()
        } else {
            format!("{}/{}", self.group_path.join("/"), self.name)
        }
    }
}

/// Discover unregistered candidates under `source_root`.
///
/// `existing` holds the file names the manifest catalog already references.
/// Candidates keep walk order (parents before children, siblings sorted);
/// a second file with an already-seen name is dropped, since catalog
/// identity is the file name.
pub fn discover(
    source_root: &Path,
    config: &PatchConfig,
    existing: &HashSet<String>,
) -> Result<Vec<Candidate>> {
    let mut candidates = Vec::new();
    let mut seen: HashSet<String> = existing.clone();
    walk(source_root, config, &mut Vec::new(), &mut seen, &mut candidates)?;
    Ok(candidates)
}

fn walk(
    dir: &Path,
    config: &PatchConfig,
    group_path: &mut Vec<String>,
    seen: &mut HashSet<String>,
    candidates: &mut Vec<Candidate>,
) -> Result<()> {
    let mut entries: Vec<_> = fs::read_dir(dir)
        .with_context(|| format!("read {}", dir.display()))?
        .collect::<Result<_, _>>()
        .with_context(|| format!("read {}", dir.display()))?;
    entries.sort_by_key(|entry| entry.file_name());
    for entry in entries {
        let Some(name) = entry.file_name().to_str().map(|name| name.to_string()) else {
            tracing::debug!(path = %entry.path().display(), "skipping non-UTF-8 name");
            continue;
        };
        if name.starts_with('.') {
            continue;
        }
        let path = entry.path();
        let rule = config.rule_for(&name);
        if path.is_dir() {
            match rule {
                Some(rule) if rule.bundle => {
                    push_candidate(&name, rule.file_type.clone(), rule.build_phase, group_path, seen, candidates);
                }
                _ => {
                    group_path.push(name);
                    walk(&path, config, group_path, seen, candidates)?;
                    group_path.pop();
                }
            }
        } else if let Some(rule) = rule.filter(|rule| !rule.bundle) {
            push_candidate(&name, rule.file_type.clone(), rule.build_phase, group_path, seen, candidates);
        }
    }
    Ok(())
}

fn push_candidate(
    name: &str,
    file_type: String,
    build_phase: bool,
    group_path: &[String],
    seen: &mut HashSet<String>,
    candidates: &mut Vec<Candidate>,
) {
    if !seen.insert(name.to_string()) {
        tracing::debug!(file = name, "already registered or discovered; skipping");
        return;
    }
    candidates.push(Candidate {
        name: name.to_string(),
        group_path: group_path.to_vec(),
        file_type,
        build_phase,
    });
}

#[cfg(test)]
mod tests {
    use super::discover;
    use crate::config::default_config;
    use std::collections::HashSet;
    use std::fs;
    use std::path::Path;

    fn write(path: &Path, contents: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent directory");
        }
        fs::write(path, contents).expect("write file");
    }

    #[test]
    fn walk_classifies_and_orders_candidates() {
        let root = tempfile::tempdir().expect("temp dir");
        write(&root.path().join("App.swift"), "");
        write(&root.path().join("Utilities/Logger.swift"), "");
        write(&root.path().join("Utilities/README.txt"), "");
        write(&root.path().join(".build/Ignored.swift"), "");
        let candidates =
            discover(root.path(), &default_config(), &HashSet::new()).expect("discover");
        let names: Vec<_> = candidates.iter().map(|c| c.display_path()).collect();
        assert_eq!(names, vec!["App.swift", "Utilities/Logger.swift"]);
        assert!(candidates[1].build_phase);
    }

    #[test]
    fn bundle_directories_are_single_leaves() {
        let root = tempfile::tempdir().expect("temp dir");
        write(
            &root
                .path()
                .join("Core/Storage/Model.xcdatamodeld/Model.xcdatamodel/contents"),
            "",
        );
        let candidates =
            discover(root.path(), &default_config(), &HashSet::new()).expect("discover");
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].name, "Model.xcdatamodeld");
        assert_eq!(candidates[0].group_path, vec!["Core", "Storage"]);
        assert_eq!(candidates[0].file_type, "wrapper.xcdatamodeld");
    }

    #[test]
    fn already_registered_names_are_filtered() {
        let root = tempfile::tempdir().expect("temp dir");
        write(&root.path().join("App.swift"), "");
        write(&root.path().join("New.swift"), "");
        let existing: HashSet<String> = ["App.swift".to_string()].into_iter().collect();
        let candidates = discover(root.path(), &default_config(), &existing).expect("discover");
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].name, "New.swift");
    }
}
