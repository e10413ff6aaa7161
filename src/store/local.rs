//! On-disk cache under a single root directory

use super::{archive, BuildProductCacheKey, BuildProductCacheStorage, BuildProductCacheValue};
use crate::{Error, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Attempts at moving a finished entry into place while other writers race on the same key
const INSTALL_ATTEMPTS: usize = 8;

/// Stores each product at `<cache_dir>/<type>/<name>/<checksum>/<name>.<ext>`.
///
/// Entries are assembled in a staging directory next to their final location
/// and renamed into place, so readers see either the previous entry, no
/// entry, or the complete new one.
#[derive(Clone, Debug)]
pub struct LocalBuildProductCacheStorage {
    cache_dir: PathBuf,
}

impl LocalBuildProductCacheStorage {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        LocalBuildProductCacheStorage {
            cache_dir: cache_dir.into(),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Where the artifact for `key` lives, whether or not it is cached
    pub fn artifact_path(&self, key: &BuildProductCacheKey) -> PathBuf {
        self.cache_dir.join(key.relative_path())
    }

    fn install(&self, key: &BuildProductCacheKey, staged: &Path) -> Result<()> {
        let product_dir = self.cache_dir.join(key.product_dir());
        let entry_dir = self.cache_dir.join(key.entry_dir());
        for _ in 0..INSTALL_ATTEMPTS {
            if entry_dir.exists() {
                debug!(key = %key, "replacing existing cache entry");
                retire(&product_dir, &entry_dir)?;
            }
            match fs::rename(staged, &entry_dir) {
                Ok(()) => return Ok(()),
                // Another writer installed the same key in between; replace it again
                Err(_) if entry_dir.exists() => continue,
                Err(e) => return Err(Error::storage(&entry_dir, e)),
            }
        }
        Err(Error::storage(
            &entry_dir,
            io::Error::new(
                io::ErrorKind::Other,
                "entry kept being replaced by concurrent writers",
            ),
        ))
    }
}

impl BuildProductCacheStorage for LocalBuildProductCacheStorage {
    fn lookup(&self, key: &BuildProductCacheKey) -> Result<Option<BuildProductCacheValue>> {
        key.validate()?;
        let path = self.artifact_path(key);
        match fs::symlink_metadata(&path) {
            Ok(_) => {
                debug!(key = %key, "local cache hit");
                Ok(Some(BuildProductCacheValue::new(key.clone(), path)))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(key = %key, "local cache miss");
                Ok(None)
            }
            Err(e) => Err(Error::storage(path, e)),
        }
    }

    fn store(&self, key: &BuildProductCacheKey, artifact: &Path) -> Result<()> {
        key.validate()?;
        if fs::symlink_metadata(artifact).is_err() {
            return Err(Error::FileDoesntExist {
                path: artifact.to_path_buf(),
            });
        }

        let product_dir = self.cache_dir.join(key.product_dir());
        fs::create_dir_all(&product_dir).map_err(|e| Error::storage(&product_dir, e))?;

        let staging = tempfile::Builder::new()
            .prefix(".staging-")
            .tempdir_in(&product_dir)
            .map_err(|e| Error::storage(&product_dir, e))?;
        copy_tree(artifact, &staging.path().join(key.file_name()))?;

        self.install(key, staging.path())?;
        debug!(key = %key, path = ?self.artifact_path(key), "stored in local cache");
        Ok(())
    }
}

/// Move an entry out of the way in one step, then delete it.
/// Readers never observe a half-deleted entry.
fn retire(product_dir: &Path, entry_dir: &Path) -> Result<()> {
    let trash = tempfile::Builder::new()
        .prefix(".trash-")
        .tempdir_in(product_dir)
        .map_err(|e| Error::storage(product_dir, e))?;
    match fs::rename(entry_dir, trash.path().join("entry")) {
        Ok(()) => Ok(()),
        // Already retired by a concurrent writer
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::storage(entry_dir, e)),
    }
}

/// Copy a file or a directory tree. Symlinks are recreated, not followed.
pub(crate) fn copy_tree(src: &Path, dst: &Path) -> Result<()> {
    let meta = fs::symlink_metadata(src).map_err(|e| Error::storage(src, e))?;
    if meta.file_type().is_symlink() {
        return copy_symlink(src, dst);
    }
    if !meta.is_dir() {
        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::storage(parent, e))?;
        }
        fs::copy(src, dst).map_err(|e| Error::storage(src, e))?;
        return Ok(());
    }

    for entry in WalkDir::new(src).follow_links(false) {
        let entry = entry.map_err(|e| Error::storage(src, e.into()))?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| Error::Corruption(e.to_string()))?;
        let target = dst.join(relative);
        let file_type = entry.file_type();
        if file_type.is_dir() {
            fs::create_dir_all(&target).map_err(|e| Error::storage(&target, e))?;
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target).map_err(|e| Error::storage(entry.path(), e))?;
        }
    }
    Ok(())
}

fn copy_symlink(src: &Path, dst: &Path) -> Result<()> {
    let link = fs::read_link(src).map_err(|e| Error::storage(src, e))?;
    archive::make_symlink(&link.to_string_lossy(), dst)
}
