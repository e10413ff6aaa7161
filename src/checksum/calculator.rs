//! Whole-graph checksum runs

use super::{
    ChecksumCache, FileChecksumProducer, ProjectChecksumHolder, RootChecksumHolder,
    TargetChecksumBuilder,
};
use crate::graph::{topological_order, ProjectGraph};
use crate::{Error, Result};
use rayon::prelude::*;
use std::time::Instant;
use tracing::info;

/// Computes the root aggregate for a project graph.
///
/// Root targets are fanned out over the rayon pool; all workers share one
/// memo cache scoped to the run, so each target is computed once no matter
/// how many roots reach it.
pub struct ProjectChecksumCalculator<P: FileChecksumProducer> {
    producer: P,
}

impl<P: FileChecksumProducer> ProjectChecksumCalculator<P> {
    pub fn new(producer: P) -> Self {
        ProjectChecksumCalculator { producer }
    }

    pub fn calculate(&self, graph: &ProjectGraph) -> Result<RootChecksumHolder> {
        let started = Instant::now();

        // Fail fast on cycles before any worker can wait on another
        topological_order(graph)?;

        let cache = ChecksumCache::new();
        let builder = TargetChecksumBuilder::new(&self.producer, graph);
        let targets: Vec<_> = graph.targets().collect();
        targets
            .par_iter()
            .try_for_each(|target| builder.build(target, &cache).map(|_| ()))?;

        let holders = cache.into_holders();
        let projects = graph
            .projects
            .iter()
            .map(|project| {
                let records = project
                    .targets
                    .iter()
                    .map(|t| {
                        holders
                            .get(&t.name)
                            .map(|h| h.to_record())
                            .ok_or_else(|| Error::EmptyTargetChecksum {
                                target_name: t.name.clone(),
                            })
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(ProjectChecksumHolder::new(project.name.clone(), records))
            })
            .collect::<Result<Vec<_>>>()?;

        let root = RootChecksumHolder::new(projects);
        info!(
            targets = holders.len(),
            checksum = %root.checksum.short(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "calculated project checksums"
        );
        Ok(root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::FsChecksumProducer;
    use crate::graph::{ProjectDescriptor, TargetDescriptor};
    use crate::model::ProductType;
    use tempfile::tempdir;

    fn write(root: &std::path::Path, rel: &str, content: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn framework(name: &str) -> TargetDescriptor {
        TargetDescriptor::new(name, ProductType::Framework)
            .with_product_name(name)
            .with_source(format!("{}/{}.swift", name, name))
    }

    #[test]
    fn test_calculate_multi_project_graph() {
        let dir = tempdir().unwrap();
        for name in ["Core", "Net", "App"] {
            write(dir.path(), &format!("{0}/{0}.swift", name), name);
        }

        let graph = ProjectGraph::new(
            dir.path(),
            vec![
                ProjectDescriptor {
                    name: "Pods.xcodeproj".into(),
                    targets: vec![framework("Core"), framework("Net").with_dependency("Core")],
                },
                ProjectDescriptor {
                    name: "App.xcodeproj".into(),
                    targets: vec![framework("App")
                        .with_dependency("Net")
                        .with_dependency("Core")],
                },
            ],
        )
        .unwrap();

        let calculator = ProjectChecksumCalculator::new(FsChecksumProducer::new());
        let first = calculator.calculate(&graph).unwrap();
        let second = calculator.calculate(&graph).unwrap();
        assert_eq!(first, second);

        assert_eq!(first.projects.len(), 2);
        assert_eq!(first.projects[0].targets.len(), 2);
        let app = &first.projects[1].targets[0];
        assert_eq!(app.dependencies, vec!["Net".to_string(), "Core".to_string()]);

        write(dir.path(), "Core/Core.swift", "Core v2");
        let third = calculator.calculate(&graph).unwrap();
        assert_ne!(first.checksum, third.checksum);
        for (before, after) in first.targets().zip(third.targets()) {
            assert_ne!(before.checksum, after.checksum, "{} should change", before.name);
        }
    }

    #[test]
    fn test_missing_file_fails_the_run() {
        let dir = tempdir().unwrap();
        let graph = ProjectGraph::new(
            dir.path(),
            vec![ProjectDescriptor {
                name: "Pods.xcodeproj".into(),
                targets: vec![framework("Core")],
            }],
        )
        .unwrap();

        let result = ProjectChecksumCalculator::new(FsChecksumProducer::new()).calculate(&graph);
        assert!(matches!(result, Err(Error::FileDoesntExist { .. })));
    }

    #[test]
    fn test_cycle_fails_the_run() {
        let dir = tempdir().unwrap();
        let graph = ProjectGraph::new(
            dir.path(),
            vec![ProjectDescriptor {
                name: "Pods.xcodeproj".into(),
                targets: vec![
                    framework("A").with_dependency("B"),
                    framework("B").with_dependency("A"),
                ],
            }],
        )
        .unwrap();

        let result = ProjectChecksumCalculator::new(FsChecksumProducer::new()).calculate(&graph);
        assert!(matches!(result, Err(Error::DependencyCycle { .. })));
    }
}
