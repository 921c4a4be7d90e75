//! Patch configuration helpers.
//!
//! The config pins the manifest dialect (section sentinels, build phase
//! name, file-kind rules) so the patcher matches structure explicitly
//! instead of guessing against a nonstandard layout.
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const CONFIG_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatchConfig {
    pub schema_version: u32,
    /// Group receiving path-less entries; detected from the document's
    /// `mainGroup` reference when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_group_id: Option<String>,
    /// Build phase that receives membership lines for build-participating
    /// kinds.
    #[serde(default = "default_phase_name")]
    pub phase_name: String,
    #[serde(default)]
    pub sections: SectionMarkers,
    #[serde(default = "default_kind_rules")]
    pub kind_rules: Vec<KindRule>,
}

/// Literal begin/end sentinels for the four sections the patcher touches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionMarkers {
    pub file_catalog: MarkerPair,
    pub build_bindings: MarkerPair,
    pub build_phases: MarkerPair,
    pub groups: MarkerPair,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkerPair {
    pub begin: String,
    pub end: String,
}

/// Maps a file-name suffix to its catalog tag and build-phase behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KindRule {
    /// File-name suffix, matched case-sensitively (e.g. `.swift`).
    pub suffix: String,
    /// Catalog content-type tag (`lastKnownFileType`).
    pub file_type: String,
    /// Entries of this kind get a build binding and a phase membership line.
    #[serde(default)]
    pub build_phase: bool,
    /// Bundle directories are registered as one leaf and never descended
    /// into.
    #[serde(default)]
    pub bundle: bool,
}

fn default_phase_name() -> String {
    "Sources".to_string()
}

fn marker_pair(kind: &str) -> MarkerPair {
    MarkerPair {
        begin: format!("/* Begin {kind} section */"),
        end: format!("/* End {kind} section */"),
    }
}

impl Default for SectionMarkers {
    fn default() -> Self {
        SectionMarkers {
            file_catalog: marker_pair("PBXFileReference"),
            build_bindings: marker_pair("PBXBuildFile"),
            build_phases: marker_pair("PBXSourcesBuildPhase"),
            groups: marker_pair("PBXGroup"),
        }
    }
}

fn default_kind_rules() -> Vec<KindRule> {
    vec![
        KindRule {
            suffix: ".swift".to_string(),
            file_type: "sourcecode.swift".to_string(),
            build_phase: true,
            bundle: false,
        },
        KindRule {
            suffix: ".xcdatamodeld".to_string(),
            file_type: "wrapper.xcdatamodeld".to_string(),
            build_phase: true,
            bundle: true,
        },
    ]
}

/// Build the default config used when no config file is supplied.
pub fn default_config() -> PatchConfig {
    PatchConfig {
        schema_version: CONFIG_SCHEMA_VERSION,
        root_group_id: None,
        phase_name: default_phase_name(),
        sections: SectionMarkers::default(),
        kind_rules: default_kind_rules(),
    }
}

/// Load a config file, falling back to defaults when none is given.
pub fn load_config_or_default(path: Option<&Path>) -> Result<PatchConfig> {
    match path {
        Some(path) => load_config(path),
        None => Ok(default_config()),
    }
}

pub fn load_config(path: &Path) -> Result<PatchConfig> {
    let bytes = fs::read(path).with_context(|| format!("read config {}", path.display()))?;
    let config: PatchConfig = serde_json::from_slice(&bytes).context("parse patch config JSON")?;
    Ok(config)
}

/// Persist a config to disk in a stable JSON format.
pub fn write_config(path: &Path, config: &PatchConfig) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    let text = serde_json::to_string_pretty(config).context("serialize patch config")?;
    fs::write(path, text.as_bytes()).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

/// Validate config schema and user-provided fields.
pub fn validate_config(config: &PatchConfig) -> Result<()> {
    if config.schema_version != CONFIG_SCHEMA_VERSION {
        return Err(anyhow!(
            "unsupported patch config schema_version {}",
            config.schema_version
        ));
    }
    if config.phase_name.trim().is_empty() {
        return Err(anyhow!("phase_name must be non-empty"));
    }
    for (label, pair) in [
        ("file_catalog", &config.sections.file_catalog),
        ("build_bindings", &config.sections.build_bindings),
        ("build_phases", &config.sections.build_phases),
        ("groups", &config.sections.groups),
    ] {
        if pair.begin.trim().is_empty() || pair.end.trim().is_empty() {
            return Err(anyhow!("section {label} sentinels must be non-empty"));
        }
        if pair.begin == pair.end {
            return Err(anyhow!(
                "section {label} begin and end sentinels must differ"
            ));
        }
    }
    if config.kind_rules.is_empty() {
        return Err(anyhow!("kind_rules must not be empty"));
    }
    for rule in &config.kind_rules {
        if !rule.suffix.starts_with('.') || rule.suffix.len() < 2 {
            return Err(anyhow!(
                "kind rule suffix must start with '.' (got {:?})",
                rule.suffix
            ));
        }
        if rule.file_type.trim().is_empty() {
            return Err(anyhow!("kind rule for {:?} has an empty file_type", rule.suffix));
        }
    }
    Ok(())
}

impl PatchConfig {
    /// Rule matching a candidate file name, longest suffix first.
    pub fn rule_for(&self, name: &str) -> Option<&KindRule> {
        self.kind_rules
            .iter()
            .filter(|rule| name.ends_with(rule.suffix.as_str()))
            .max_by_key(|rule| rule.suffix.len())
    }
}
