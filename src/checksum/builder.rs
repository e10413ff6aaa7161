//! Recursive, memoized target checksum computation

use super::cache::{ChecksumCache, Claim};
use super::{FileChecksumHolder, FileChecksumProducer, TargetChecksumHolder};
use crate::graph::{ProjectGraph, TargetDescriptor};
use crate::model::Checksum;
use crate::{Error, Result};
use std::sync::Arc;
use tracing::debug;

/// Builds [`TargetChecksumHolder`]s bottom-up over a project graph.
///
/// `checksum(T) = combine([combine(deps), combine(files)])`, dependencies in
/// declared order, so a change anywhere below a target changes the target.
pub struct TargetChecksumBuilder<'a, P: FileChecksumProducer + ?Sized> {
    producer: &'a P,
    graph: &'a ProjectGraph,
}

impl<'a, P: FileChecksumProducer + ?Sized> TargetChecksumBuilder<'a, P> {
    pub fn new(producer: &'a P, graph: &'a ProjectGraph) -> Self {
        TargetChecksumBuilder { producer, graph }
    }

    /// Compute the holder for `target`, reusing anything already in `cache`
    pub fn build(
        &self,
        target: &TargetDescriptor,
        cache: &ChecksumCache,
    ) -> Result<Arc<TargetChecksumHolder>> {
        match cache.claim(&target.name)? {
            Claim::Hit(holder) => {
                debug!(target = %target.name, "checksum memo hit");
                Ok(holder)
            }
            Claim::Owned => match self.compute(target, cache) {
                Ok(holder) => {
                    let holder = Arc::new(holder);
                    cache.fulfill(Arc::clone(&holder));
                    Ok(holder)
                }
                Err(e) => {
                    cache.abandon(&target.name);
                    Err(e)
                }
            },
        }
    }

    fn compute(
        &self,
        target: &TargetDescriptor,
        cache: &ChecksumCache,
    ) -> Result<TargetChecksumHolder> {
        let dependencies = self
            .graph
            .dependencies(target)
            .map(|dependency| self.build(dependency, cache))
            .collect::<Result<Vec<_>>>()?;
        let dependencies_checksum = Checksum::aggregate(dependencies.iter().map(|d| &d.checksum));

        let files = target
            .member_files()
            .map(|file| {
                let checksum = self.producer.checksum(&self.graph.source_root.join(file))?;
                Ok(FileChecksumHolder::new(
                    file.to_string_lossy().replace('\\', "/"),
                    checksum,
                ))
            })
            .collect::<Result<Vec<_>>>()?;
        let files_checksum = Checksum::aggregate(files.iter().map(|f| &f.checksum));

        let checksum = Checksum::combine([&dependencies_checksum, &files_checksum])?;
        let product_name = obtain_product_name(target)?;

        debug!(
            target = %target.name,
            checksum = %checksum.short(),
            files = files.len(),
            dependencies = dependencies.len(),
            "computed target checksum"
        );

        Ok(TargetChecksumHolder {
            name: target.name.clone(),
            product_name,
            product_type: target.product_type,
            checksum,
            files,
            dependencies,
        })
    }
}

/// First declared product-name candidate that is valid for the target's product type
fn obtain_product_name(target: &TargetDescriptor) -> Result<String> {
    target
        .product
        .iter()
        .find(|name| target.product_type.is_valid_product_name(name))
        .map(str::to_string)
        .ok_or_else(|| Error::EmptyProductName {
            target: target.name.clone(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{ProductNameCandidates, ProjectDescriptor};
    use crate::model::ProductType;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};

    /// Checksums a path by its name and counts how often each path is asked for
    #[derive(Default)]
    struct CountingProducer {
        calls: Mutex<HashMap<PathBuf, usize>>,
    }

    impl CountingProducer {
        fn calls(&self, path: &str) -> usize {
            self.calls
                .lock()
                .get(&Path::new("/src").join(path))
                .copied()
                .unwrap_or(0)
        }
    }

    impl FileChecksumProducer for CountingProducer {
        fn checksum(&self, path: &Path) -> Result<Checksum> {
            *self.calls.lock().entry(path.to_path_buf()).or_default() += 1;
            Ok(Checksum::digest(path.to_string_lossy().as_bytes()))
        }
    }

    fn graph(targets: Vec<TargetDescriptor>) -> ProjectGraph {
        ProjectGraph::new(
            "/src",
            vec![ProjectDescriptor {
                name: "Pods.xcodeproj".into(),
                targets,
            }],
        )
        .unwrap()
    }

    fn framework(name: &str) -> TargetDescriptor {
        TargetDescriptor::new(name, ProductType::Framework)
            .with_product_name(name)
            .with_source(format!("{}/{}.swift", name, name))
    }

    #[test]
    fn test_composition_law() {
        let g = graph(vec![
            framework("T").with_dependency("D1").with_dependency("D2"),
            framework("D1"),
            framework("D2"),
        ]);
        let producer = CountingProducer::default();
        let builder = TargetChecksumBuilder::new(&producer, &g);
        let cache = ChecksumCache::new();

        let t = builder.build(g.target("T").unwrap(), &cache).unwrap();
        let d1 = cache.get("D1").unwrap();
        let d2 = cache.get("D2").unwrap();

        let deps = Checksum::combine([&d1.checksum, &d2.checksum]).unwrap();
        let files = Checksum::combine([&t.files[0].checksum]).unwrap();
        assert_eq!(t.checksum, Checksum::combine([&deps, &files]).unwrap());
        assert_eq!(t.files[0].name, "T/T.swift");
    }

    #[test]
    fn test_shared_dependency_computed_once() {
        let g = graph(vec![
            framework("A").with_dependency("B").with_dependency("C"),
            framework("B").with_dependency("X"),
            framework("C").with_dependency("X"),
            framework("X"),
        ]);
        let producer = CountingProducer::default();
        let builder = TargetChecksumBuilder::new(&producer, &g);
        let cache = ChecksumCache::new();

        let a = builder.build(g.target("A").unwrap(), &cache).unwrap();
        assert_eq!(producer.calls("X/X.swift"), 1);

        let via_b = &a.dependencies[0].dependencies[0];
        let via_c = &a.dependencies[1].dependencies[0];
        assert!(Arc::ptr_eq(via_b, via_c));
        assert_eq!(via_b, via_c);

        // A second root reuses the memo completely
        builder.build(g.target("C").unwrap(), &cache).unwrap();
        assert_eq!(producer.calls("X/X.swift"), 1);
        assert_eq!(producer.calls("C/C.swift"), 1);
    }

    #[test]
    fn test_dependency_order_matters() {
        let producer = CountingProducer::default();

        let g1 = graph(vec![
            framework("T").with_dependency("D1").with_dependency("D2"),
            framework("D1"),
            framework("D2"),
        ]);
        let g2 = graph(vec![
            framework("T").with_dependency("D2").with_dependency("D1"),
            framework("D1"),
            framework("D2"),
        ]);

        let t1 = TargetChecksumBuilder::new(&producer, &g1)
            .build(g1.target("T").unwrap(), &ChecksumCache::new())
            .unwrap();
        let t2 = TargetChecksumBuilder::new(&producer, &g2)
            .build(g2.target("T").unwrap(), &ChecksumCache::new())
            .unwrap();
        assert_ne!(t1.checksum, t2.checksum);
    }

    #[test]
    fn test_resources_ignored_unless_bundle() {
        let producer = CountingProducer::default();
        let plain = graph(vec![framework("Kit")]);
        let with_resource = graph(vec![framework("Kit").with_resource("Kit/Icon.png")]);

        let a = TargetChecksumBuilder::new(&producer, &plain)
            .build(plain.target("Kit").unwrap(), &ChecksumCache::new())
            .unwrap();
        let b = TargetChecksumBuilder::new(&producer, &with_resource)
            .build(with_resource.target("Kit").unwrap(), &ChecksumCache::new())
            .unwrap();
        assert_eq!(a.checksum, b.checksum);
        assert_eq!(producer.calls("Kit/Icon.png"), 0);
    }

    #[test]
    fn test_hyphenated_framework_name_rejected() {
        let producer = CountingProducer::default();
        let g = graph(vec![
            TargetDescriptor::new("Core-Kit", ProductType::Framework).with_product_name("Core-Kit"),
            TargetDescriptor::new("Core-Lib", ProductType::StaticLibrary)
                .with_product_name("Core-Lib"),
        ]);
        let builder = TargetChecksumBuilder::new(&producer, &g);
        let cache = ChecksumCache::new();

        match builder.build(g.target("Core-Kit").unwrap(), &cache) {
            Err(Error::EmptyProductName { target }) => assert_eq!(target, "Core-Kit"),
            other => panic!("expected EmptyProductName, got {:?}", other.map(|h| h.name.clone())),
        }
        assert!(cache.get("Core-Kit").is_none());

        let lib = builder.build(g.target("Core-Lib").unwrap(), &cache).unwrap();
        assert_eq!(lib.product_name, "Core-Lib");
    }

    #[test]
    fn test_product_name_falls_through_candidates() {
        let producer = CountingProducer::default();
        let mut target = TargetDescriptor::new("Core-Kit", ProductType::Framework);
        target.product = ProductNameCandidates {
            base_name: Some("Core-Kit".into()),
            path: None,
            name_with_extension: Some("CoreKit.framework".into()),
        };
        let g = graph(vec![target]);

        let holder = TargetChecksumBuilder::new(&producer, &g)
            .build(g.target("Core-Kit").unwrap(), &ChecksumCache::new())
            .unwrap();
        assert_eq!(holder.product_name, "CoreKit.framework");
    }

    #[test]
    fn test_cycle_fails_fast() {
        let producer = CountingProducer::default();
        let g = graph(vec![
            framework("A").with_dependency("B"),
            framework("B").with_dependency("A"),
        ]);
        let result = TargetChecksumBuilder::new(&producer, &g)
            .build(g.target("A").unwrap(), &ChecksumCache::new());
        assert!(matches!(result, Err(Error::DependencyCycle { .. })));
    }
}
