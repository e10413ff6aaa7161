//! Leaf checksums for files and directory-like resources

use crate::model::Checksum;
use crate::tree::{TreeNode, TreeNodeConvertible};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use walkdir::WalkDir;

/// Turns the content at a path into a checksum
pub trait FileChecksumProducer: Send + Sync {
    fn checksum(&self, path: &Path) -> Result<Checksum>;
}

impl<P: FileChecksumProducer + ?Sized> FileChecksumProducer for &P {
    fn checksum(&self, path: &Path) -> Result<Checksum> {
        (**self).checksum(path)
    }
}

/// Checksum of one file referenced by a target
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileChecksumHolder {
    /// Path as declared by the target, relative to the source root
    pub name: String,
    pub checksum: Checksum,
}

impl FileChecksumHolder {
    pub fn new(name: impl Into<String>, checksum: Checksum) -> Self {
        FileChecksumHolder {
            name: name.into(),
            checksum,
        }
    }
}

impl TreeNodeConvertible for FileChecksumHolder {
    fn node(&self) -> TreeNode {
        TreeNode::leaf(self.name.clone(), self.checksum)
    }
}

/// Reads content from the filesystem.
///
/// Directories (asset catalogs, bundles) are folded over their regular files in
/// sorted relative-path order, each contributing its path and content.
#[derive(Clone, Copy, Debug, Default)]
pub struct FsChecksumProducer;

impl FsChecksumProducer {
    pub fn new() -> Self {
        FsChecksumProducer
    }

    fn file_checksum(path: &Path) -> Result<Checksum> {
        let data = std::fs::read(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::FileDoesntExist {
                path: path.to_path_buf(),
            },
            _ => Error::storage(path, e),
        })?;
        let checksum = Checksum::digest(&data);
        if checksum.is_zero() {
            return Err(Error::ZeroChecksum {
                path: path.to_path_buf(),
            });
        }
        Ok(checksum)
    }

    fn directory_checksum(path: &Path) -> Result<Checksum> {
        let mut entries = Vec::new();
        let walker = WalkDir::new(path).sort_by_file_name().follow_links(false);
        for entry in walker {
            let entry = entry.map_err(|e| Error::UnableToEnumerateDirectory {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(path)
                .unwrap_or(entry.path())
                .to_string_lossy()
                .replace('\\', "/");
            let content = Self::file_checksum(entry.path())?;
            entries.push((relative, content));
        }

        // WalkDir sorts per directory; sort the full relative paths to be explicit
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        let folded = entries
            .iter()
            .map(|(relative, content)| {
                Checksum::combine([&Checksum::digest(relative.as_bytes()), content])
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Checksum::aggregate(&folded))
    }
}

impl FileChecksumProducer for FsChecksumProducer {
    fn checksum(&self, path: &Path) -> Result<Checksum> {
        let metadata = std::fs::metadata(path).map_err(|_| Error::FileDoesntExist {
            path: path.to_path_buf(),
        })?;
        if metadata.is_dir() {
            Self::directory_checksum(path)
        } else {
            Self::file_checksum(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_file_checksum_is_content_digest() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("A.swift");
        std::fs::write(&path, "struct A {}").unwrap();

        let producer = FsChecksumProducer::new();
        assert_eq!(
            producer.checksum(&path).unwrap(),
            Checksum::digest(b"struct A {}")
        );
    }

    #[test]
    fn test_missing_file() {
        let dir = tempdir().unwrap();
        let result = FsChecksumProducer::new().checksum(&dir.path().join("Gone.swift"));
        assert!(matches!(result, Err(Error::FileDoesntExist { .. })));
    }

    #[test]
    fn test_directory_fold_is_deterministic_and_content_sensitive() {
        let dir = tempdir().unwrap();
        let assets = dir.path().join("Assets.xcassets");
        std::fs::create_dir_all(assets.join("Icon.imageset")).unwrap();
        std::fs::write(assets.join("Contents.json"), "{}").unwrap();
        std::fs::write(assets.join("Icon.imageset/icon.png"), [1u8, 2, 3]).unwrap();

        let producer = FsChecksumProducer::new();
        let first = producer.checksum(&assets).unwrap();
        assert_eq!(first, producer.checksum(&assets).unwrap());

        std::fs::write(assets.join("Icon.imageset/icon.png"), [1u8, 2, 4]).unwrap();
        assert_ne!(first, producer.checksum(&assets).unwrap());
    }

    #[test]
    fn test_directory_fold_sees_renames() {
        let dir = tempdir().unwrap();
        let res = dir.path().join("res");
        std::fs::create_dir_all(&res).unwrap();
        std::fs::write(res.join("a.txt"), "x").unwrap();

        let producer = FsChecksumProducer::new();
        let before = producer.checksum(&res).unwrap();
        std::fs::rename(res.join("a.txt"), res.join("b.txt")).unwrap();
        assert_ne!(before, producer.checksum(&res).unwrap());
    }

    #[test]
    fn test_empty_directory_uses_empty_set() {
        let dir = tempdir().unwrap();
        assert_eq!(
            FsChecksumProducer::new().checksum(dir.path()).unwrap(),
            Checksum::empty_set()
        );
    }
}
