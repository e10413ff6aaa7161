//! Build-product cache storage
//!
//! Every backend answers two questions: is this exact product cached, and
//! put this product in the cache. Backends compose rather than inherit:
//! [`MixedBuildProductCacheStorage`] layers a local and a remote backend.
//!
//! Local layout:
//! ```text
//! <cache_dir>/<product type>/<product name>/<checksum>/<product name>.<ext>
//! ```

pub mod archive;
mod key;
mod local;
mod mixed;
mod remote;

use crate::Result;
use std::path::Path;

pub use key::{BuildProductCacheKey, BuildProductCacheValue};
pub use local::LocalBuildProductCacheStorage;
pub use mixed::MixedBuildProductCacheStorage;
pub use remote::RemoteBuildProductCacheStorage;

/// A place build products can be looked up in and stored to
pub trait BuildProductCacheStorage: Send + Sync {
    /// `Ok(None)` is a miss
    fn lookup(&self, key: &BuildProductCacheKey) -> Result<Option<BuildProductCacheValue>>;

    /// Persist the artifact at `artifact` under `key`, replacing any existing entry
    fn store(&self, key: &BuildProductCacheKey, artifact: &Path) -> Result<()>;
}

impl<S: BuildProductCacheStorage + ?Sized> BuildProductCacheStorage for Box<S> {
    fn lookup(&self, key: &BuildProductCacheKey) -> Result<Option<BuildProductCacheValue>> {
        (**self).lookup(key)
    }

    fn store(&self, key: &BuildProductCacheKey, artifact: &Path) -> Result<()> {
        (**self).store(key, artifact)
    }
}
