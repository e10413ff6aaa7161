//! Structural diff between two checksum trees

use super::TreeNode;
use crate::model::Checksum;
use std::collections::HashMap;
use std::fmt::{self, Write};

/// How a node differs between the old and the new tree
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DiffChange {
    /// Present only in the new tree
    Added { value: Checksum },
    /// Present only in the old tree
    Removed { value: Checksum },
    /// Present in both with different values
    Changed { old: Checksum, new: Checksum },
}

/// A node on a path from the root to something that changed
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiffNode {
    pub name: String,
    pub change: DiffChange,
    /// Only the children that differ
    pub children: Vec<DiffNode>,
}

impl DiffNode {
    fn added(node: &TreeNode) -> Self {
        DiffNode {
            name: node.name.clone(),
            change: DiffChange::Added { value: node.value },
            children: Vec::new(),
        }
    }

    fn removed(node: &TreeNode) -> Self {
        DiffNode {
            name: node.name.clone(),
            change: DiffChange::Removed { value: node.value },
            children: Vec::new(),
        }
    }

    /// Number of nodes in this diff, itself included
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(DiffNode::node_count).sum::<usize>()
    }

    /// Indented, human-readable report
    pub fn render(&self) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail
        let _ = self.write_to(&mut out, 0);
        out
    }

    fn write_to(&self, out: &mut String, depth: usize) -> fmt::Result {
        let indent = "  ".repeat(depth);
        match &self.change {
            DiffChange::Added { value } => {
                writeln!(out, "{}+ {}: {}", indent, self.name, value.short())?
            }
            DiffChange::Removed { value } => {
                writeln!(out, "{}- {}: {}", indent, self.name, value.short())?
            }
            DiffChange::Changed { old, new } => writeln!(
                out,
                "{}{}: {} -> {}",
                indent,
                self.name,
                old.short(),
                new.short()
            )?,
        }
        for child in &self.children {
            child.write_to(out, depth + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for DiffNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Diff two trees whose nodes are matched by name.
///
/// Equal values end the walk: an unchanged aggregate means nothing below it
/// changed, so its children are not visited.
pub fn diff(old: &TreeNode, new: &TreeNode) -> Option<DiffNode> {
    if old.value == new.value {
        return None;
    }

    let new_by_name: HashMap<&str, &TreeNode> =
        new.children.iter().map(|c| (c.name.as_str(), c)).collect();
    let mut matched = std::collections::HashSet::new();
    let mut children = Vec::new();

    for old_child in &old.children {
        match new_by_name.get(old_child.name.as_str()) {
            Some(new_child) => {
                matched.insert(old_child.name.as_str());
                if let Some(d) = diff(old_child, new_child) {
                    children.push(d);
                }
            }
            None => children.push(DiffNode::removed(old_child)),
        }
    }
    for new_child in &new.children {
        if !matched.contains(new_child.name.as_str()) {
            children.push(DiffNode::added(new_child));
        }
    }

    Some(DiffNode {
        name: new.name.clone(),
        change: DiffChange::Changed {
            old: old.value,
            new: new.value,
        },
        children,
    })
}

/// Render the diff of two trees, or `Empty diff` when the roots are equal
pub fn render_diff(old: &TreeNode, new: &TreeNode) -> String {
    match diff(old, new) {
        Some(d) => d.render(),
        None => "Empty diff\n".to_string(),
    }
}
