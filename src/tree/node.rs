//! Detached name/value/children projection of a checksum holder

use crate::model::Checksum;

/// A node of a checksum tree, stripped of domain detail.
///
/// Used only for diffing and printing; it never owns any holder.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TreeNode {
    pub name: String,
    pub value: Checksum,
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    pub fn new(name: impl Into<String>, value: Checksum, children: Vec<TreeNode>) -> Self {
        TreeNode {
            name: name.into(),
            value,
            children,
        }
    }

    pub fn leaf(name: impl Into<String>, value: Checksum) -> Self {
        Self::new(name, value, Vec::new())
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Find a direct child by name
    pub fn child(&self, name: &str) -> Option<&TreeNode> {
        self.children.iter().find(|c| c.name == name)
    }
}

/// Anything that can be projected into a [`TreeNode`]
pub trait TreeNodeConvertible {
    fn node(&self) -> TreeNode;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_lookup() {
        let node = TreeNode::new(
            "Kit",
            Checksum::digest(b"kit"),
            vec![TreeNode::leaf("Kit/A.swift", Checksum::digest(b"a"))],
        );
        assert!(!node.is_leaf());
        assert!(node.child("Kit/A.swift").unwrap().is_leaf());
        assert!(node.child("Kit/B.swift").is_none());
    }
}
