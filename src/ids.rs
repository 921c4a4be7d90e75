//! Identifier allocation for new manifest records.
//!
//! The allocator is seeded with every ID already present in the document so a
//! second run against the same manifest can never mint a colliding ID.
use crate::error::PatchError;
use std::collections::HashSet;

/// Manifest record IDs are fixed-width uppercase hex tokens.
pub const ID_LEN: usize = 24;

pub struct IdAllocator {
    used: HashSet<String>,
    cursor: u64,
}

impl IdAllocator {
    /// Seed the allocator with the IDs already present in the document.
    pub fn seeded(used: HashSet<String>) -> Self {
        IdAllocator { used, cursor: 1 }
    }

    /// Hand out the next ID that is free in both the document and this run.
    ///
    /// Candidates are counter-derived, so allocation is deterministic for a
    /// given document. The attempt bound is pigeonhole-safe: after
    /// `used + 1` distinct candidates at least one must be free.
    pub fn allocate(&mut self) -> Result<String, PatchError> {
        let max_attempts = self.used.len() as u64 + 1;
        for _ in 0..max_attempts {
            let candidate = format!("{:0width$X}", self.cursor, width = ID_LEN);
            self.cursor = self.cursor.wrapping_add(1);
            if self.used.insert(candidate.clone()) {
                return Ok(candidate);
            }
        }
        Err(PatchError::IdCollision {
            attempts: max_attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{IdAllocator, ID_LEN};
    use std::collections::HashSet;

    #[test]
    fn allocated_ids_have_fixed_shape() {
        let mut ids = IdAllocator::seeded(HashSet::new());
        let id = ids.allocate().expect("allocate");
        assert_eq!(id.len(), ID_LEN);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
    }

    #[test]
    fn allocation_skips_ids_already_in_document() {
        let mut seeded = HashSet::new();
        seeded.insert(format!("{:024X}", 1u64));
        seeded.insert(format!("{:024X}", 2u64));
        let mut ids = IdAllocator::seeded(seeded);
        let id = ids.allocate().expect("allocate");
        assert_eq!(id, format!("{:024X}", 3u64));
    }

    #[test]
    fn repeated_allocation_never_repeats() {
        let mut ids = IdAllocator::seeded(HashSet::new());
        let mut seen = HashSet::new();
        for _ in 0..100 {
            assert!(seen.insert(ids.allocate().expect("allocate")));
        }
    }
}
