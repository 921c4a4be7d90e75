//! In-memory manifest model.
//!
//! The document is held as raw lines and reassembled byte-identically when
//! nothing is inserted. All derived views (used IDs, file catalog, group
//! tree) are parsed from the document itself per run, so the patcher never
//! depends on state the manifest does not carry.
use crate::anchors;
use crate::config::PatchConfig;
use crate::error::PatchError;
use regex::Regex;
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::fs;
use std::path::Path;

pub struct ManifestDocument {
    lines: Vec<String>,
    had_trailing_newline: bool,
}

/// One `PBXFileReference`-style record from the file catalog.
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    pub id: String,
    /// The record's `path` field, which for registered files is the file
    /// name; the owning group carries the directory. Falls back to the
    /// record comment when the path field is absent.
    pub path: String,
}

/// One group record, with the line anchors needed to append children.
#[derive(Debug, Clone)]
pub struct GroupRecord {
    pub id: String,
    /// Display name from the record's trailing comment, when present.
    pub comment: Option<String>,
    /// Relative path segment: the `path` field, falling back to `name`.
    pub segment: Option<String>,
    pub children: Vec<String>,
    pub children_close: usize,
}

impl ManifestDocument {
    pub fn from_text(text: &str) -> Self {
        let had_trailing_newline = text.ends_with('\n');
        let mut lines: Vec<String> = text.split('\n').map(|line| line.to_string()).collect();
        if had_trailing_newline {
            lines.pop();
        }
        ManifestDocument {
            lines,
            had_trailing_newline,
        }
    }

    pub fn load(path: &Path) -> Result<Self, PatchError> {
        let text = fs::read_to_string(path)?;
        Ok(Self::from_text(&text))
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Reassemble the document, splicing `insertions[idx]` immediately before
    /// original line `idx`. An empty map reproduces the input byte for byte.
    pub fn render(&self, insertions: &BTreeMap<usize, Vec<String>>) -> String {
        let extra: usize = insertions.values().map(Vec::len).sum();
        let mut out: Vec<&str> = Vec::with_capacity(self.lines.len() + extra);
        for (idx, line) in self.lines.iter().enumerate() {
            if let Some(inserted) = insertions.get(&idx) {
                out.extend(inserted.iter().map(String::as_str));
            }
            out.push(line);
        }
        let mut text = out.join("\n");
        if self.had_trailing_newline {
            text.push('\n');
        }
        text
    }

    pub fn to_text(&self) -> String {
        self.render(&BTreeMap::new())
    }

    /// Every fixed-width hex ID present anywhere in the document, including
    /// IDs minted by earlier patch runs.
    pub fn used_ids(&self) -> HashSet<String> {
        let id = Regex::new(r"\b[0-9A-F]{24}\b").expect("regex for record IDs");
        let mut used = HashSet::new();
        for line in &self.lines {
            for found in id.find_iter(line) {
                used.insert(found.as_str().to_string());
            }
        }
        used
    }

    /// The root group referenced by the project record, if any.
    pub fn detect_main_group(&self) -> Option<String> {
        let main_group =
            Regex::new(r"mainGroup = ([0-9A-F]{24})").expect("regex for mainGroup reference");
        self.lines
            .iter()
            .find_map(|line| main_group.captures(line))
            .map(|captures| captures[1].to_string())
    }

    /// Parse the file-catalog section into `(id, name, path)` entries.
    pub fn catalog_entries(&self, config: &PatchConfig) -> Result<Vec<CatalogEntry>, PatchError> {
        let markers = &config.sections.file_catalog;
        let bounds =
            anchors::section_bounds(&self.lines, "file catalog", &markers.begin, &markers.end)?;
        let header = Regex::new(r"^\s*([0-9A-F]{24}) /\* (.*?) \*/ = \{isa = PBXFileReference;")
            .expect("regex for catalog records");
        let path_field =
            Regex::new(r#"[\s;{]path = ("(?:[^"\\]|\\.)*"|[^;]+);"#).expect("regex for path field");
        let mut entries = Vec::new();
        for line in &self.lines[bounds.begin + 1..bounds.end] {
            let Some(captures) = header.captures(line) else {
                continue;
            };
            let path = path_field
                .captures(line)
                .map(|c| strip_quotes(&c[1]).to_string())
                .unwrap_or_else(|| captures[2].to_string());
            entries.push(CatalogEntry {
                id: captures[1].to_string(),
                path,
            });
        }
        Ok(entries)
    }

    /// Parse every group record in the group section.
    ///
    /// Records without a children list cannot hold files and are skipped.
    pub fn group_records(&self, config: &PatchConfig) -> Result<Vec<GroupRecord>, PatchError> {
        let markers = &config.sections.groups;
        let bounds = anchors::section_bounds(&self.lines, "groups", &markers.begin, &markers.end)?;
        let header = Regex::new(r"^\s*([0-9A-F]{24})(?: /\* (.*?) \*/)? = \{$")
            .expect("regex for group headers");
        let child = Regex::new(r"^\s*([0-9A-F]{24})(?: /\* (?:.*?) \*/)?,$")
            .expect("regex for group children");
        let path_field = Regex::new(r#"^\s*path = ("(?:[^"\\]|\\.)*"|[^;]+);$"#)
            .expect("regex for group path");
        let name_field = Regex::new(r#"^\s*name = ("(?:[^"\\]|\\.)*"|[^;]+);$"#)
            .expect("regex for group name");
        let mut records = Vec::new();
        let mut idx = bounds.begin + 1;
        while idx < bounds.end {
            let Some(captures) = header.captures(&self.lines[idx]) else {
                idx += 1;
                continue;
            };
            let close = anchors::record_close(&self.lines, "groups", idx)?;
            let body = &self.lines[idx..=close];
            if !body.iter().any(|line| line.contains("isa = PBXGroup;")) {
                idx = close + 1;
                continue;
            }
            let Some(open_offset) = body.iter().position(|line| line.contains("children = ("))
            else {
                tracing::debug!(group = %&captures[1], "group record without children list");
                idx = close + 1;
                continue;
            };
            let children_open = idx + open_offset;
            let children_close = anchors::list_close(&self.lines, "groups", children_open)?;
            let children = self.lines[children_open + 1..children_close]
                .iter()
                .filter_map(|line| child.captures(line))
                .map(|c| c[1].to_string())
                .collect();
            let path = body
                .iter()
                .find_map(|line| path_field.captures(line))
                .map(|c| strip_quotes(&c[1]).to_string());
            let name = body
                .iter()
                .find_map(|line| name_field.captures(line))
                .map(|c| strip_quotes(&c[1]).to_string());
            records.push(GroupRecord {
                id: captures[1].to_string(),
                comment: captures.get(2).map(|m| m.as_str().to_string()),
                segment: path.or(name),
                children,
                children_close,
            });
            idx = close + 1;
        }
        Ok(records)
    }

    /// Resolve full slash-joined paths to group IDs by walking from the root.
    ///
    /// The root itself maps from the empty path. Groups not reachable from
    /// the root are left out.
    pub fn group_paths(records: &[GroupRecord], root_id: &str) -> BTreeMap<String, String> {
        let by_id: BTreeMap<&str, &GroupRecord> = records
            .iter()
            .map(|record| (record.id.as_str(), record))
            .collect();
        let mut paths = BTreeMap::new();
        paths.insert(String::new(), root_id.to_string());
        let mut queue = VecDeque::new();
        queue.push_back((String::new(), root_id.to_string()));
        let mut visited = HashSet::new();
        visited.insert(root_id.to_string());
        while let Some((path, id)) = queue.pop_front() {
            let Some(record) = by_id.get(id.as_str()) else {
                continue;
            };
            for child_id in &record.children {
                let Some(child) = by_id.get(child_id.as_str()) else {
                    continue;
                };
                let Some(segment) = child.segment.as_deref().or(child.comment.as_deref()) else {
                    continue;
                };
                if !visited.insert(child_id.clone()) {
                    continue;
                }
                let child_path = if path.is_empty() {
                    segment.to_string()
                } else {
                    format!("{path}/{segment}")
                };
                paths.insert(child_path.clone(), child_id.clone());
                queue.push_back((child_path, child_id.clone()));
            }
        }
        paths
    }
}

/// Strip the surrounding quotes of a quoted manifest value.
pub fn strip_quotes(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .unwrap_or(value)
}
