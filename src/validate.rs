//! Post-patch validation and manifest health checks.
//!
//! The sentinel audit gates every write: a candidate document is only
//! published when each section sentinel the run relies on is still present
//! exactly once and in begin/end order.
use crate::config::PatchConfig;
use crate::document::ManifestDocument;
use crate::error::PatchError;
use std::collections::{HashMap, HashSet};

/// Verify that every configured sentinel survives in the candidate exactly
/// once and in order.
pub fn check_sentinels(candidate: &str, config: &PatchConfig) -> Result<(), PatchError> {
    let issues = sentinel_issues(candidate, config);
    if issues.is_empty() {
        Ok(())
    } else {
        Err(PatchError::ValidationFailed(issues.join("; ")))
    }
}

/// Sentinel problems in a document, empty when healthy.
pub fn sentinel_issues(text: &str, config: &PatchConfig) -> Vec<String> {
    let mut issues = Vec::new();
    for (label, pair) in [
        ("file catalog", &config.sections.file_catalog),
        ("build bindings", &config.sections.build_bindings),
        ("build phase", &config.sections.build_phases),
        ("groups", &config.sections.groups),
    ] {
        let begins = text.matches(pair.begin.as_str()).count();
        let ends = text.matches(pair.end.as_str()).count();
        if begins != 1 {
            issues.push(format!("{label} begin sentinel appears {begins} times"));
        }
        if ends != 1 {
            issues.push(format!("{label} end sentinel appears {ends} times"));
        }
        if begins == 1 && ends == 1 {
            let begin = text.find(pair.begin.as_str()).unwrap_or_default();
            let end = text.find(pair.end.as_str()).unwrap_or_default();
            if end < begin {
                issues.push(format!("{label} end sentinel precedes its begin sentinel"));
            }
        }
    }
    issues
}

/// Structural problems in the group tree, empty when healthy.
///
/// Checks the tree invariants: one root, each non-root group referenced by
/// exactly one parent, no cycles, no dangling child references.
pub fn group_tree_issues(
    doc: &ManifestDocument,
    config: &PatchConfig,
) -> Result<Vec<String>, PatchError> {
    let mut issues = Vec::new();
    let records = doc.group_records(config)?;
    let root_id = match &config.root_group_id {
        Some(id) => id.clone(),
        None => match doc.detect_main_group() {
            Some(id) => id,
            None => {
                issues.push("no root group configured or detectable".to_string());
                return Ok(issues);
            }
        },
    };

    let group_ids: HashSet<&str> = records.iter().map(|record| record.id.as_str()).collect();
    if !group_ids.contains(root_id.as_str()) {
        issues.push(format!("root group {root_id} has no group record"));
    }

    let known_leaves: HashSet<String> = doc
        .catalog_entries(config)?
        .into_iter()
        .map(|entry| entry.id)
        .collect();

    let mut parents: HashMap<&str, usize> = HashMap::new();
    for record in &records {
        for child in &record.children {
            if group_ids.contains(child.as_str()) {
                *parents.entry(child.as_str()).or_default() += 1;
            } else if !known_leaves.contains(child) {
                issues.push(format!(
                    "group {} references unknown child {child}",
                    record.id
                ));
            }
        }
    }
    for record in &records {
        let count = parents.get(record.id.as_str()).copied().unwrap_or(0);
        if record.id == root_id {
            if count != 0 {
                issues.push(format!("root group {root_id} is referenced as a child"));
            }
        } else if count == 0 {
            issues.push(format!("group {} is unreachable from any parent", record.id));
        } else if count > 1 {
            issues.push(format!(
                "group {} is referenced by {count} parents",
                record.id
            ));
        }
    }

    // Cycle walk from the root; a back edge revisits an active ancestor.
    let by_id: HashMap<&str, &Vec<String>> = records
        .iter()
        .map(|record| (record.id.as_str(), &record.children))
        .collect();
    let mut stack = vec![(root_id.clone(), vec![root_id.clone()])];
    let mut visited = HashSet::new();
    while let Some((id, trail)) = stack.pop() {
        if !visited.insert(id.clone()) {
            continue;
        }
        let Some(children) = by_id.get(id.as_str()) else {
            continue;
        };
        for child in children.iter() {
            if !by_id.contains_key(child.as_str()) {
                continue;
            }
            if trail.contains(child) {
                issues.push(format!("group {child} is its own ancestor"));
                continue;
            }
            let mut next_trail = trail.clone();
            next_trail.push(child.clone());
            stack.push((child.clone(), next_trail));
        }
    }

    Ok(issues)
}
