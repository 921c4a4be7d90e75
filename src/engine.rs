//! The insertion engine: one composed rewrite of the manifest.
//!
//! All records are rendered and every insertion point is computed against the
//! pre-mutation document, then the output is assembled in a single walk of
//! the original line indices. Later insertions can therefore never perturb an
//! anchor computed earlier in the same pass. A request for a file already in
//! the catalog is a no-op, so repeated runs do not duplicate records.
use crate::anchors;
use crate::config::PatchConfig;
use crate::document::{GroupRecord, ManifestDocument};
use crate::error::PatchError;
use crate::groups::{ChildRef, GroupTreeBuilder, NewGroup};
use crate::ids::IdAllocator;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

/// One file to register, as supplied by discovery.
#[derive(Debug, Clone)]
pub struct NewFile {
    /// File name; the owning group carries the directory.
    pub name: String,
    /// Group path segments relative to the root group.
    pub group_path: Vec<String>,
    /// Catalog content-type tag.
    pub file_type: String,
    /// Whether this kind participates in the build phase.
    pub build_phase: bool,
}

#[derive(Debug, Serialize)]
pub struct AddedFile {
    pub name: String,
    pub group_path: String,
    pub file_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_id: Option<String>,
}

#[derive(Debug, Default, Serialize)]
pub struct PatchSummary {
    pub added: Vec<AddedFile>,
    /// Requests skipped because the catalog already holds the file name.
    pub skipped_existing: Vec<String>,
    /// Full paths of groups synthesized by this run.
    pub new_groups: Vec<String>,
}

#[derive(Debug)]
pub struct PatchOutcome {
    pub text: String,
    /// False when the effective batch was empty; `text` is then
    /// byte-identical to the input.
    pub changed: bool,
    pub summary: PatchSummary,
}

/// Patch the document so every requested file is registered exactly once.
pub fn patch(
    doc: &ManifestDocument,
    config: &PatchConfig,
    requests: &[NewFile],
) -> Result<PatchOutcome, PatchError> {
    let mut summary = PatchSummary::default();
    if requests.is_empty() {
        return Ok(unchanged(doc, summary));
    }

    let existing_paths: HashSet<String> = doc
        .catalog_entries(config)?
        .into_iter()
        .map(|entry| entry.path)
        .collect();

    let mut seen = HashSet::new();
    let mut batch: Vec<&NewFile> = Vec::new();
    for file in requests {
        if !seen.insert(file.name.clone()) {
            tracing::debug!(file = %file.name, "duplicate request for file name");
            continue;
        }
        if existing_paths.contains(&file.name) {
            summary.skipped_existing.push(file.name.clone());
            continue;
        }
        batch.push(file);
    }
    if batch.is_empty() {
        return Ok(unchanged(doc, summary));
    }

    let root_id = match &config.root_group_id {
        Some(id) => id.clone(),
        None => doc
            .detect_main_group()
            .ok_or_else(|| PatchError::missing("project record", "mainGroup reference"))?,
    };

    let mut ids = IdAllocator::seeded(doc.used_ids());

    let mut catalog_lines = Vec::new();
    let mut binding_lines = Vec::new();
    let mut phase_lines = Vec::new();
    let mut assignments: Vec<(Vec<String>, Vec<ChildRef>)> = Vec::new();
    for file in &batch {
        let file_id = ids.allocate()?;
        catalog_lines.push(render_catalog(&file_id, file));
        let build_id = if file.build_phase {
            let build_id = ids.allocate()?;
            binding_lines.push(render_binding(
                &build_id,
                &file_id,
                &file.name,
                &config.phase_name,
            ));
            phase_lines.push(render_membership(&build_id, &file.name, &config.phase_name));
            Some(build_id)
        } else {
            None
        };
        push_assignment(
            &mut assignments,
            &file.group_path,
            ChildRef {
                id: file_id.clone(),
                comment: file.name.clone(),
            },
        );
        summary.added.push(AddedFile {
            name: file.name.clone(),
            group_path: file.group_path.join("/"),
            file_id,
            build_id,
        });
    }

    let records = doc.group_records(config)?;
    let paths = ManifestDocument::group_paths(&records, &root_id);
    let plan = GroupTreeBuilder::new(&paths).plan(&assignments, &mut ids)?;
    summary.new_groups = plan.new_groups.iter().map(|g| g.path.clone()).collect();

    // Every anchor below indexes the pre-mutation document.
    let lines = doc.lines();
    let mut insertions: BTreeMap<usize, Vec<String>> = BTreeMap::new();

    let markers = &config.sections.file_catalog;
    let bounds = anchors::section_bounds(lines, "file catalog", &markers.begin, &markers.end)?;
    insertions.entry(bounds.end).or_default().extend(catalog_lines);

    if !binding_lines.is_empty() {
        let markers = &config.sections.build_bindings;
        let bounds =
            anchors::section_bounds(lines, "build bindings", &markers.begin, &markers.end)?;
        insertions.entry(bounds.end).or_default().extend(binding_lines);

        let markers = &config.sections.build_phases;
        let bounds = anchors::section_bounds(lines, "build phase", &markers.begin, &markers.end)?;
        let header = anchors::line_in_range(
            lines,
            "build phase",
            bounds.begin,
            bounds.end,
            &format!("/* {} */ = {{", config.phase_name),
        )?;
        let record_end = anchors::record_close(lines, "build phase", header)?;
        let files_open =
            anchors::line_in_range(lines, "build phase", header, record_end + 1, "files = (")?;
        let files_close = anchors::list_close(lines, "build phase", files_open)?;
        insertions.entry(files_close).or_default().extend(phase_lines);
    }

    let markers = &config.sections.groups;
    let groups_bounds = anchors::section_bounds(lines, "groups", &markers.begin, &markers.end)?;

    let record_by_id: BTreeMap<&str, &GroupRecord> = records
        .iter()
        .map(|record| (record.id.as_str(), record))
        .collect();
    for (group_id, children) in &plan.appends {
        let record = record_by_id.get(group_id.as_str()).ok_or_else(|| {
            PatchError::missing("groups", &format!("record for group {group_id}"))
        })?;
        let entry = insertions.entry(record.children_close).or_default();
        entry.extend(children.iter().map(render_child));
    }

    if !plan.new_groups.is_empty() {
        let entry = insertions.entry(groups_bounds.end).or_default();
        for group in &plan.new_groups {
            entry.extend(render_group(group));
        }
    }

    Ok(PatchOutcome {
        text: doc.render(&insertions),
        changed: true,
        summary,
    })
}

fn unchanged(doc: &ManifestDocument, summary: PatchSummary) -> PatchOutcome {
    PatchOutcome {
        text: doc.to_text(),
        changed: false,
        summary,
    }
}

fn push_assignment(
    assignments: &mut Vec<(Vec<String>, Vec<ChildRef>)>,
    path: &[String],
    child: ChildRef,
) {
    if let Some((_, children)) = assignments.iter_mut().find(|(p, _)| p.as_slice() == path) {
        children.push(child);
    } else {
        assignments.push((path.to_vec(), vec![child]));
    }
}

/// Quote a manifest value when it needs it, as the format requires.
fn quoted(value: &str) -> String {
    let plain = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '/'));
    if plain {
        value.to_string()
    } else {
        format!("\"{value}\"")
    }
}

fn render_catalog(file_id: &str, file: &NewFile) -> String {
    format!(
        "\t\t{file_id} /* {name} */ = {{isa = PBXFileReference; lastKnownFileType = {file_type}; path = {path}; sourceTree = \"<group>\"; }};",
        name = file.name,
        file_type = file.file_type,
        path = quoted(&file.name),
    )
}

fn render_binding(build_id: &str, file_id: &str, name: &str, phase: &str) -> String {
    format!(
        "\t\t{build_id} /* {name} in {phase} */ = {{isa = PBXBuildFile; fileRef = {file_id} /* {name} */; }};"
    )
}

fn render_membership(build_id: &str, name: &str, phase: &str) -> String {
    format!("\t\t\t\t{build_id} /* {name} in {phase} */,")
}

fn render_child(child: &ChildRef) -> String {
    format!("\t\t\t\t{} /* {} */,", child.id, child.comment)
}

fn render_group(group: &NewGroup) -> Vec<String> {
    let mut lines = Vec::with_capacity(group.children.len() + 7);
    lines.push(format!("\t\t{} /* {} */ = {{", group.id, group.name));
    lines.push("\t\t\tisa = PBXGroup;".to_string());
    lines.push("\t\t\tchildren = (".to_string());
    lines.extend(group.children.iter().map(render_child));
    lines.push("\t\t\t);".to_string());
    lines.push(format!("\t\t\tpath = {};", quoted(&group.name)));
    lines.push("\t\t\tsourceTree = \"<group>\";".to_string());
    lines.push("\t\t};".to_string());
    lines
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
