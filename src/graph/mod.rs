//! Read-only view of the native project graph
//!
//! The graph is produced by an external reader of the native project file and
//! handed to this crate as a manifest: projects, their targets, each target's
//! declared dependencies, member files split by role, and the product-name
//! candidates the project declares. Nothing here ever writes the project back.

mod traversal;

pub use traversal::topological_order;

use crate::model::ProductType;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Product names a target declares, tried in order when naming its product
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductNameCandidates {
    /// Base name of the product reference
    #[serde(default)]
    pub base_name: Option<String>,
    /// Path of the product reference
    #[serde(default)]
    pub path: Option<String>,
    /// Name derived from the target with the product extension appended
    #[serde(default)]
    pub name_with_extension: Option<String>,
}

impl ProductNameCandidates {
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        [&self.base_name, &self.path, &self.name_with_extension]
            .into_iter()
            .filter_map(|c| c.as_deref())
    }
}

/// One buildable unit of the graph
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetDescriptor {
    pub name: String,
    #[serde(default)]
    pub product_type: ProductType,
    #[serde(default)]
    pub product: ProductNameCandidates,
    /// Names of the targets this one depends on, in declared order
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Compile sources, relative to the source root
    #[serde(default)]
    pub sources: Vec<PathBuf>,
    /// Resources, relative to the source root
    #[serde(default)]
    pub resources: Vec<PathBuf>,
}

impl TargetDescriptor {
    pub fn new(name: impl Into<String>, product_type: ProductType) -> Self {
        TargetDescriptor {
            name: name.into(),
            product_type,
            product: ProductNameCandidates::default(),
            dependencies: Vec::new(),
            sources: Vec::new(),
            resources: Vec::new(),
        }
    }

    pub fn with_product_name(mut self, name: impl Into<String>) -> Self {
        self.product.base_name = Some(name.into());
        self
    }

    pub fn with_dependency(mut self, name: impl Into<String>) -> Self {
        self.dependencies.push(name.into());
        self
    }

    pub fn with_source(mut self, path: impl Into<PathBuf>) -> Self {
        self.sources.push(path.into());
        self
    }

    pub fn with_resource(mut self, path: impl Into<PathBuf>) -> Self {
        self.resources.push(path.into());
        self
    }

    /// Files that count towards the checksum: sources always, resources only for bundles
    pub fn member_files(&self) -> impl Iterator<Item = &PathBuf> {
        let resources: &[PathBuf] = if self.product_type.is_bundle() {
            &self.resources
        } else {
            &[]
        };
        self.sources.iter().chain(resources.iter())
    }
}

/// One physical project file and its targets
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectDescriptor {
    pub name: String,
    #[serde(default)]
    pub targets: Vec<TargetDescriptor>,
}

/// A whole workspace: possibly several project files sharing one source root
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectGraph {
    pub source_root: PathBuf,
    pub projects: Vec<ProjectDescriptor>,
    #[serde(skip)]
    index: HashMap<String, (usize, usize)>,
}

impl ProjectGraph {
    /// Build a graph and validate target names and dependency references
    pub fn new(source_root: impl Into<PathBuf>, projects: Vec<ProjectDescriptor>) -> Result<Self> {
        let mut graph = ProjectGraph {
            source_root: source_root.into(),
            projects,
            index: HashMap::new(),
        };
        graph.reindex()?;
        Ok(graph)
    }

    /// Load a graph manifest from a JSON file.
    /// A relative `sourceRoot` is resolved against the manifest's directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| Error::storage(path, e))?;
        let mut graph: ProjectGraph = serde_json::from_str(&content)?;
        if graph.source_root.is_relative() {
            let base = path.parent().unwrap_or_else(|| Path::new("."));
            graph.source_root = base.join(&graph.source_root);
        }
        graph.reindex()?;
        Ok(graph)
    }

    fn reindex(&mut self) -> Result<()> {
        self.index.clear();
        for (p, project) in self.projects.iter().enumerate() {
            for (t, target) in project.targets.iter().enumerate() {
                if self.index.insert(target.name.clone(), (p, t)).is_some() {
                    return Err(Error::DuplicateTarget {
                        name: target.name.clone(),
                    });
                }
            }
        }
        for target in self.targets() {
            if let Some(missing) = target
                .dependencies
                .iter()
                .find(|d| !self.index.contains_key(d.as_str()))
            {
                return Err(Error::UnknownDependency {
                    target: target.name.clone(),
                    dependency: missing.clone(),
                });
            }
        }
        Ok(())
    }

    /// Look a target up by name
    pub fn target(&self, name: &str) -> Option<&TargetDescriptor> {
        self.index
            .get(name)
            .map(|&(p, t)| &self.projects[p].targets[t])
    }

    /// All targets across all projects, in declared order
    pub fn targets(&self) -> impl Iterator<Item = &TargetDescriptor> {
        self.projects.iter().flat_map(|p| p.targets.iter())
    }

    /// Declared dependencies of a target, resolved
    pub fn dependencies<'a>(
        &'a self,
        target: &'a TargetDescriptor,
    ) -> impl Iterator<Item = &'a TargetDescriptor> + 'a {
        target.dependencies.iter().filter_map(|d| self.target(d))
    }

    pub fn target_count(&self) -> usize {
        self.index.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project(targets: Vec<TargetDescriptor>) -> ProjectDescriptor {
        ProjectDescriptor {
            name: "Pods.xcodeproj".into(),
            targets,
        }
    }

    #[test]
    fn test_resources_only_count_for_bundles() {
        let framework = TargetDescriptor::new("Kit", ProductType::Framework)
            .with_source("Kit/A.swift")
            .with_resource("Kit/Icon.png");
        assert_eq!(framework.member_files().count(), 1);

        let bundle = TargetDescriptor::new("KitResources", ProductType::Bundle)
            .with_source("Kit/B.swift")
            .with_resource("Kit/Icon.png");
        assert_eq!(bundle.member_files().count(), 2);
    }

    #[test]
    fn test_duplicate_target_rejected() {
        let result = ProjectGraph::new(
            "/src",
            vec![project(vec![
                TargetDescriptor::new("Kit", ProductType::Framework),
                TargetDescriptor::new("Kit", ProductType::Framework),
            ])],
        );
        assert!(matches!(result, Err(Error::DuplicateTarget { .. })));
    }

    #[test]
    fn test_unknown_dependency_rejected() {
        let result = ProjectGraph::new(
            "/src",
            vec![project(vec![
                TargetDescriptor::new("App", ProductType::Application).with_dependency("Ghost")
            ])],
        );
        match result {
            Err(Error::UnknownDependency { target, dependency }) => {
                assert_eq!(target, "App");
                assert_eq!(dependency, "Ghost");
            }
            other => panic!("unexpected: {:?}", other.map(|g| g.target_count())),
        }
    }

    #[test]
    fn test_load_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.json");
        std::fs::write(
            &path,
            r#"{
                "sourceRoot": "src",
                "projects": [{
                    "name": "Pods.xcodeproj",
                    "targets": [
                        {"name": "Kit", "productType": "com.apple.product-type.framework",
                         "product": {"baseName": "Kit"}, "sources": ["Kit/A.swift"]},
                        {"name": "App", "dependencies": ["Kit"]}
                    ]
                }]
            }"#,
        )
        .unwrap();

        let graph = ProjectGraph::load(&path).unwrap();
        assert_eq!(graph.source_root, dir.path().join("src"));
        assert_eq!(graph.target_count(), 2);
        let app = graph.target("App").unwrap();
        assert_eq!(app.product_type, ProductType::None);
        let deps: Vec<_> = graph.dependencies(app).map(|t| t.name.as_str()).collect();
        assert_eq!(deps, vec!["Kit"]);
    }

    #[test]
    fn test_load_manifest_with_unlisted_product_type() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.json");
        std::fs::write(
            &path,
            r#"{
                "sourceRoot": "src",
                "projects": [{
                    "name": "App.xcodeproj",
                    "targets": [
                        {"name": "Widget", "productType": "com.apple.product-type.app-extension",
                         "product": {"baseName": "Widget"}, "sources": ["Widget/W.swift"]},
                        {"name": "Kit", "productType": "com.apple.product-type.framework"}
                    ]
                }]
            }"#,
        )
        .unwrap();

        let graph = ProjectGraph::load(&path).unwrap();
        assert_eq!(graph.target("Widget").unwrap().product_type, ProductType::None);
        assert_eq!(graph.target("Kit").unwrap().product_type, ProductType::Framework);
    }
}
