//! Checksum trees for printing and diffing
//!
//! Holders project themselves into plain name/value/children nodes, so the
//! diff never depends on the richer graph model:
//! - Each node's value is derived from its children's values
//! - Equal values mean equal subtrees, which keeps diffs of mostly unchanged
//!   trees proportional to what changed

mod diff;
mod node;

pub use diff::{diff, render_diff, DiffChange, DiffNode};
pub use node::{TreeNode, TreeNodeConvertible};
