//! Project-level and root aggregates: the persisted checksum tree

use super::TargetChecksumRecord;
use crate::model::Checksum;
use crate::tree::{TreeNode, TreeNodeConvertible};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;

/// Name of the root node in the persisted tree
pub const ROOT_NAME: &str = "Workspace";

/// The targets of one physical project file
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectChecksumHolder {
    pub name: String,
    pub checksum: Checksum,
    pub targets: Vec<TargetChecksumRecord>,
}

impl ProjectChecksumHolder {
    /// Aggregate target records in declared order
    pub fn new(name: impl Into<String>, targets: Vec<TargetChecksumRecord>) -> Self {
        let checksum = Checksum::aggregate(targets.iter().map(|t| &t.checksum));
        ProjectChecksumHolder {
            name: name.into(),
            checksum,
            targets,
        }
    }
}

/// Root aggregate of one checksum run, tying every project file together.
///
/// This is the single document a run persists; it can be read back and used
/// for projection and diffing without the live project graph.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootChecksumHolder {
    pub name: String,
    pub checksum: Checksum,
    pub projects: Vec<ProjectChecksumHolder>,
}

impl RootChecksumHolder {
    pub fn new(projects: Vec<ProjectChecksumHolder>) -> Self {
        let checksum = Checksum::aggregate(projects.iter().map(|p| &p.checksum));
        RootChecksumHolder {
            name: ROOT_NAME.to_string(),
            checksum,
            projects,
        }
    }

    /// All target records across projects, in document order
    pub fn targets(&self) -> impl Iterator<Item = &TargetChecksumRecord> {
        self.projects.iter().flat_map(|p| p.targets.iter())
    }

    /// Index of target records by name; the first record with a name wins
    pub fn target_index(&self) -> HashMap<&str, &TargetChecksumRecord> {
        let mut index = HashMap::new();
        for target in self.targets() {
            index.entry(target.name.as_str()).or_insert(target);
        }
        index
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Write the document, replacing any previous one atomically
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir).map_err(|e| Error::storage(dir, e))?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| Error::storage(dir, e))?;
        tmp.write_all(self.to_json()?.as_bytes())
            .map_err(|e| Error::storage(tmp.path(), e))?;
        tmp.persist(path)
            .map_err(|e| Error::storage(path, e.error))?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| Error::storage(path, e))?;
        Self::from_json(&content)
    }
}

impl TreeNodeConvertible for RootChecksumHolder {
    fn node(&self) -> TreeNode {
        let index = self.target_index();
        let projects = self
            .projects
            .iter()
            .map(|project| {
                let targets = project
                    .targets
                    .iter()
                    .map(|target| target_node(target, &index))
                    .collect();
                TreeNode::new(project.name.clone(), project.checksum, targets)
            })
            .collect();
        TreeNode::new(self.name.clone(), self.checksum, projects)
    }
}

/// A target's files, then its dependencies as leaves carrying their checksum
fn target_node(
    target: &TargetChecksumRecord,
    index: &HashMap<&str, &TargetChecksumRecord>,
) -> TreeNode {
    let files = target.files.iter().map(|f| f.node());
    let dependencies = target.dependencies.iter().filter_map(|name| {
        index
            .get(name.as_str())
            .map(|dep| TreeNode::leaf(format!("-> {}", name), dep.checksum))
    });
    TreeNode::new(
        target.name.clone(),
        target.checksum,
        files.chain(dependencies).collect(),
    )
}
