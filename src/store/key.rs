//! Cache keys and resolved cache hits

use crate::model::{Checksum, ProductType};
use crate::{Error, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// Identifies one cacheable build product
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BuildProductCacheKey {
    pub product_name: String,
    pub product_type: ProductType,
    pub checksum: Checksum,
}

impl BuildProductCacheKey {
    pub fn new(
        product_name: impl Into<String>,
        product_type: ProductType,
        checksum: Checksum,
    ) -> Self {
        BuildProductCacheKey {
            product_name: product_name.into(),
            product_type,
            checksum,
        }
    }

    /// The product name becomes a path component, so it must be exactly one
    /// plain file name: no separators, no `.` or `..`, no NUL.
    pub fn validate(&self) -> Result<()> {
        let name = self.product_name.as_str();
        let unsafe_name = name.is_empty()
            || name == "."
            || name == ".."
            || name.contains(['/', '\\', '\0']);
        if unsafe_name {
            return Err(Error::UnsafeProductName {
                name: self.product_name.clone(),
            });
        }
        Ok(())
    }

    /// Product name as it appears on disk, e.g. `Kit.framework`
    pub fn file_name(&self) -> String {
        let ext = self.product_type.file_extension();
        if ext.is_empty() {
            return self.product_name.clone();
        }
        let suffix = format!(".{}", ext);
        if self.product_name.ends_with(&suffix) {
            self.product_name.clone()
        } else {
            format!("{}{}", self.product_name, suffix)
        }
    }

    /// Directory holding every checksum of this product
    pub fn product_dir(&self) -> PathBuf {
        Path::new(self.product_type.raw_value()).join(&self.product_name)
    }

    /// Directory of this exact entry
    pub fn entry_dir(&self) -> PathBuf {
        self.product_dir().join(self.checksum.to_hex())
    }

    /// `<type>/<name>/<checksum>/<name>.<ext>`, relative to a cache root
    pub fn relative_path(&self) -> PathBuf {
        self.entry_dir().join(self.file_name())
    }
}

impl fmt::Display for BuildProductCacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}",
            self.product_name,
            self.product_type.raw_value(),
            self.checksum
        )
    }
}

/// A cache hit: the key and where its artifact lives.
///
/// Hits from a remote backend live in a scratch directory owned by the value
/// and removed once every clone of it is dropped; copy the artifact out
/// before letting go of the value.
#[derive(Clone, Debug)]
pub struct BuildProductCacheValue {
    pub key: BuildProductCacheKey,
    pub path: PathBuf,
    scratch: Option<Arc<TempDir>>,
}

impl BuildProductCacheValue {
    pub fn new(key: BuildProductCacheKey, path: impl Into<PathBuf>) -> Self {
        BuildProductCacheValue {
            key,
            path: path.into(),
            scratch: None,
        }
    }

    /// A hit whose artifact lives under `scratch`
    pub(crate) fn in_scratch(key: BuildProductCacheKey, path: PathBuf, scratch: TempDir) -> Self {
        BuildProductCacheValue {
            key,
            path,
            scratch: Some(Arc::new(scratch)),
        }
    }

    /// Whether the artifact disappears with this value
    pub fn is_transient(&self) -> bool {
        self.scratch.is_some()
    }
}

impl PartialEq for BuildProductCacheValue {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.path == other.path
    }
}

impl Eq for BuildProductCacheValue {}
