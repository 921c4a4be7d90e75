//! Failure kinds surfaced by the core patcher.
//!
//! Every variant leaves the on-disk manifest untouched: anchors and IDs are
//! resolved before any write, and validation failures trigger a restore.
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PatchError {
    #[error("{what} not found in {section}")]
    AnchorNotFound { section: String, what: String },

    #[error("{what} matched {count} times in {section} (expected exactly once)")]
    AmbiguousAnchor {
        section: String,
        what: String,
        count: usize,
    },

    #[error("identifier allocation exhausted after {attempts} candidates")]
    IdCollision { attempts: u64 },

    #[error("manifest validation failed: {0}")]
    ValidationFailed(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PatchError {
    pub fn missing(section: &str, what: &str) -> Self {
        PatchError::AnchorNotFound {
            section: section.to_string(),
            what: what.to_string(),
        }
    }

    pub fn ambiguous(section: &str, what: &str, count: usize) -> Self {
        PatchError::AmbiguousAnchor {
            section: section.to_string(),
            what: what.to_string(),
            count,
        }
    }
}
