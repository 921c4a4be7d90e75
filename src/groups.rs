//! Group-tree planning.
//!
//! Maps `(path → leaf entries)` assignments onto the manifest's existing
//! group hierarchy, synthesizing missing intermediate groups shallowest
//! first so every parent exists (or is scheduled) before its child links in.
use crate::error::PatchError;
use crate::ids::IdAllocator;
use std::collections::BTreeMap;

/// A child line to be written into some group's children list.
#[derive(Debug, Clone)]
pub struct ChildRef {
    pub id: String,
    pub comment: String,
}

/// A brand-new group record, carrying its own children inline.
#[derive(Debug)]
pub struct NewGroup {
    pub id: String,
    /// Display name and relative path segment (the final path segment).
    pub name: String,
    /// Full slash-joined path, for reporting.
    pub path: String,
    pub children: Vec<ChildRef>,
}

#[derive(Debug, Default)]
pub struct GroupPlan {
    /// New group records in creation order (shallowest path first).
    pub new_groups: Vec<NewGroup>,
    /// Children to append to groups already in the document, keyed by group
    /// ID in first-touched order. Existing child order is never disturbed;
    /// these append at the end of each list.
    pub appends: Vec<(String, Vec<ChildRef>)>,
}

enum Node {
    Existing(String),
    New(usize),
}

pub struct GroupTreeBuilder<'a> {
    /// Full slash-joined path → group ID, as parsed from the document.
    /// The empty path maps to the root group.
    existing: &'a BTreeMap<String, String>,
}

impl<'a> GroupTreeBuilder<'a> {
    pub fn new(existing: &'a BTreeMap<String, String>) -> Self {
        GroupTreeBuilder { existing }
    }

    /// Plan the group records and append operations for a set of leaf
    /// assignments.
    ///
    /// Each distinct missing path yields exactly one new group, however many
    /// leaves land on it.
    pub fn plan(
        &self,
        assignments: &[(Vec<String>, Vec<ChildRef>)],
        ids: &mut IdAllocator,
    ) -> Result<GroupPlan, PatchError> {
        let mut plan = GroupPlan::default();
        let mut resolved: BTreeMap<Vec<String>, Node> = BTreeMap::new();

        // Every ancestor of every target path, shallowest first.
        let mut targets: Vec<Vec<String>> = Vec::new();
        for (path, _) in assignments {
            for depth in 0..=path.len() {
                let prefix = path[..depth].to_vec();
                if !targets.contains(&prefix) {
                    targets.push(prefix);
                }
            }
        }
        targets.sort_by_key(|path| (path.len(), path.clone()));

        for path in targets {
            if let Some(id) = self.existing.get(&path.join("/")) {
                resolved.insert(path, Node::Existing(id.clone()));
                continue;
            }
            let Some(name) = path.last().cloned() else {
                // The empty path resolves only through the existing map.
                return Err(PatchError::missing("groups", "root group"));
            };
            let id = ids.allocate()?;
            let index = plan.new_groups.len();
            plan.new_groups.push(NewGroup {
                id: id.clone(),
                name: name.clone(),
                path: path.join("/"),
                children: Vec::new(),
            });
            let link = ChildRef { id, comment: name };
            // Ancestors sort shallower, so the parent is always resolved.
            match resolved
                .get(&path[..path.len() - 1])
                .ok_or_else(|| PatchError::missing("groups", "parent group"))?
            {
                Node::Existing(parent_id) => {
                    push_append(&mut plan.appends, parent_id, link);
                }
                Node::New(parent_index) => {
                    plan.new_groups[*parent_index].children.push(link);
                }
            }
            resolved.insert(path, Node::New(index));
        }

        for (path, leaves) in assignments {
            match resolved
                .get(path)
                .ok_or_else(|| PatchError::missing("groups", "assignment path"))?
            {
                Node::Existing(id) => {
                    for leaf in leaves {
                        push_append(&mut plan.appends, id, leaf.clone());
                    }
                }
                Node::New(index) => {
                    plan.new_groups[*index].children.extend(leaves.iter().cloned());
                }
            }
        }
        Ok(plan)
    }
}

fn push_append(appends: &mut Vec<(String, Vec<ChildRef>)>, group_id: &str, child: ChildRef) {
    if let Some((_, children)) = appends.iter_mut().find(|(id, _)| id.as_str() == group_id) {
        children.push(child);
    } else {
        appends.push((group_id.to_string(), vec![child]));
    }
}

#[cfg(test)]
mod tests {
    use super::{ChildRef, GroupTreeBuilder};
    use crate::ids::IdAllocator;
    use std::collections::{BTreeMap, HashSet};

    fn leaf(id: &str, name: &str) -> ChildRef {
        ChildRef {
            id: id.to_string(),
            comment: name.to_string(),
        }
    }

    fn segments(path: &str) -> Vec<String> {
        if path.is_empty() {
            return Vec::new();
        }
        path.split('/').map(|s| s.to_string()).collect()
    }

    fn existing(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(path, id)| (path.to_string(), id.to_string()))
            .collect()
    }

    #[test]
    fn leaves_on_existing_groups_become_appends() {
        let existing = existing(&[("", "R0"), ("Utilities", "U1")]);
        let builder = GroupTreeBuilder::new(&existing);
        let mut ids = IdAllocator::seeded(HashSet::new());
        let plan = builder
            .plan(
                &[(segments("Utilities"), vec![leaf("F1", "Logger.swift")])],
                &mut ids,
            )
            .expect("plan");
        assert!(plan.new_groups.is_empty());
        assert_eq!(plan.appends.len(), 1);
        assert_eq!(plan.appends[0].0, "U1");
        assert_eq!(plan.appends[0].1[0].id, "F1");
    }

    #[test]
    fn missing_intermediates_are_created_shallowest_first() {
        let existing = existing(&[("", "R0"), ("Features", "G1")]);
        let builder = GroupTreeBuilder::new(&existing);
        let mut ids = IdAllocator::seeded(HashSet::new());
        let plan = builder
            .plan(
                &[(
                    segments("Features/Home/ViewModels"),
                    vec![leaf("F1", "HomeVM.swift")],
                )],
                &mut ids,
            )
            .expect("plan");
        assert_eq!(plan.new_groups.len(), 2);
        assert_eq!(plan.new_groups[0].name, "Home");
        assert_eq!(plan.new_groups[1].name, "ViewModels");
        // Home links into the existing Features group, ViewModels nests in Home.
        assert_eq!(plan.appends.len(), 1);
        assert_eq!(plan.appends[0].0, "G1");
        assert_eq!(plan.appends[0].1[0].id, plan.new_groups[0].id);
        assert_eq!(plan.new_groups[0].children[0].id, plan.new_groups[1].id);
        assert_eq!(plan.new_groups[1].children[0].id, "F1");
    }

    #[test]
    fn one_group_per_new_path_even_with_many_leaves() {
        let existing = existing(&[("", "R0")]);
        let builder = GroupTreeBuilder::new(&existing);
        let mut ids = IdAllocator::seeded(HashSet::new());
        let plan = builder
            .plan(
                &[(
                    segments("Shared"),
                    vec![leaf("F1", "A.swift"), leaf("F2", "B.swift")],
                )],
                &mut ids,
            )
            .expect("plan");
        assert_eq!(plan.new_groups.len(), 1);
        assert_eq!(plan.new_groups[0].children.len(), 2);
    }

    #[test]
    fn path_less_leaves_attach_to_the_root_group() {
        let existing = existing(&[("", "R0")]);
        let builder = GroupTreeBuilder::new(&existing);
        let mut ids = IdAllocator::seeded(HashSet::new());
        let plan = builder
            .plan(&[(segments(""), vec![leaf("F1", "Main.swift")])], &mut ids)
            .expect("plan");
        assert!(plan.new_groups.is_empty());
        assert_eq!(plan.appends[0].0, "R0");
    }
}
